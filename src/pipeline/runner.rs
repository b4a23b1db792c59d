// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! External command execution.
//!
//! Every pipeline step is an external program like git or npm. Pipelines only
//! talk to those programs through the [`CommandRunner`] capability, so the
//! real process spawning of [`SystemRunner`] can be swapped out.

use std::{
    ffi::OsString,
    fmt::{Display, Formatter, Result as FmtResult},
    future::Future,
    io,
    path::Path,
    process::Stdio,
};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    process::Command,
};
use tracing::{debug, instrument};

/// Program plus arguments of one pipeline step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: OsString,
    pub args: Vec<OsString>,
}

impl Invocation {
    /// Construct new invocation.
    pub fn new(
        program: impl Into<OsString>,
        args: impl IntoIterator<Item = impl Into<OsString>>,
    ) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl Display for Invocation {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.program.to_string_lossy().as_ref())?;
        for arg in &self.args {
            write!(fmt, " {}", arg.to_string_lossy())?;
        }

        Ok(())
    }
}

/// Result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, or `None` if the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Check if command exited with status zero.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Describe failure of command.
    ///
    /// Prefers stderr, then stdout. If the command printed nothing at all,
    /// then `fallback` builds the message from the exit code.
    pub fn failure_message(&self, fallback: impl FnOnce(&str) -> String) -> String {
        let message = if !self.stderr.is_empty() {
            self.stderr.clone()
        } else if !self.stdout.is_empty() {
            self.stdout.clone()
        } else {
            let code = self
                .code
                .map_or_else(|| "unknown".to_string(), |code| code.to_string());
            fallback(&code)
        };

        message.trim().to_string()
    }
}

/// Run external commands to completion.
pub trait CommandRunner: Send + Sync + 'static {
    /// Run invocation inside `cwd`, and resolve once it exits.
    ///
    /// Only failing to start the program is an error. A non-zero exit is
    /// reported through [`CommandOutput::code`].
    fn run(
        &self,
        invocation: &Invocation,
        cwd: &Path,
    ) -> impl Future<Output = io::Result<CommandOutput>> + Send;
}

/// Command runner that spawns real processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    /// Spawn invocation with piped output.
    ///
    /// Both output streams are drained line by line while the process runs,
    /// and each line is logged at debug level as soon as it arrives.
    #[instrument(skip(self, invocation, cwd), fields(command = %invocation), level = "debug")]
    async fn run(&self, invocation: &Invocation, cwd: &Path) -> io::Result<CommandOutput> {
        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let (stdout, stderr, status) = futures::try_join!(
            drain(stdout, "stdout"),
            drain(stderr, "stderr"),
            child.wait()
        )?;

        Ok(CommandOutput {
            code: status.code(),
            stdout,
            stderr,
        })
    }
}

async fn drain(stream: Option<impl AsyncRead + Unpin>, label: &str) -> io::Result<String> {
    let mut collected = String::new();
    let Some(stream) = stream else {
        return Ok(collected);
    };

    let mut reader = BufReader::new(stream);
    let mut line = Vec::new();
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line).await? == 0 {
            break;
        }

        let text = String::from_utf8_lossy(&line);
        debug!("{label}: {}", text.trim_end());
        collected.push_str(&text);
    }

    Ok(collected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn invocation_display() {
        let invocation = Invocation::new("git", ["commit", "-m", "修改post"]);
        assert_eq!(invocation.to_string(), "git commit -m 修改post");
    }

    #[test]
    fn failure_message_prefers_stderr() {
        let output = CommandOutput {
            code: Some(1),
            stdout: "out\n".into(),
            stderr: "  err\n".into(),
        };
        assert_eq!(output.failure_message(|code| format!("exit {code}")), "err");

        let output = CommandOutput {
            code: Some(1),
            stdout: "out\n".into(),
            stderr: String::new(),
        };
        assert_eq!(output.failure_message(|code| format!("exit {code}")), "out");
    }

    #[test]
    fn failure_message_falls_back_to_exit_code() {
        let output = CommandOutput {
            code: Some(128),
            ..CommandOutput::default()
        };
        assert_eq!(output.failure_message(|code| format!("exit {code}")), "exit 128");
        assert!(!output.success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn system_runner_collects_output_and_exit_code() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let invocation = Invocation::new("sh", ["-c", "pwd; echo oops >&2; exit 3"]);

        let result = SystemRunner.run(&invocation, dir.path()).await?;
        assert_eq!(result.code, Some(3));
        assert_eq!(
            std::path::Path::new(result.stdout.trim()).canonicalize()?,
            dir.path().canonicalize()?
        );
        assert_eq!(result.stderr, "oops\n");
        Ok(())
    }

    #[tokio::test]
    async fn system_runner_reports_missing_program() {
        let dir = tempfile::tempdir().unwrap();
        let invocation = Invocation::new("definitely-not-a-real-program-4242", ["--version"]);

        let result = SystemRunner.run(&invocation, dir.path()).await;
        assert!(result.is_err());
    }
}
