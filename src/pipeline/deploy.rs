// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Build and deploy the blog through its npm scripts.

use crate::{
    pipeline::{
        run_step,
        runner::{CommandRunner, Invocation, SystemRunner},
        PipelineError, Result, Transcript,
    },
    root::RootLocator,
};

use serde::Serialize;
use std::{env, ffi::OsString, path::Path, sync::Arc};
use tracing::{info, instrument};

/// Scripts run by a deployment, in order.
pub const DEPLOY_SCRIPTS: [&str; 2] = ["build", "deploy"];

/// Success message of a full build and deploy.
pub const DEPLOY_DONE: &str = "构建与部署已完成";

/// How to launch `npm run <script>` on this host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptCommand {
    /// Run program with fixed leading arguments, then the script name.
    Direct { program: OsString, args: Vec<OsString> },

    /// Run `npm run <script>` through `cmd.exe`.
    WindowsShell,
}

impl ScriptCommand {
    /// Construct new direct script command.
    pub fn new(
        program: impl Into<OsString>,
        args: impl IntoIterator<Item = impl Into<OsString>>,
    ) -> Self {
        Self::Direct {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Pick script command for the current process.
    ///
    /// When launched from an npm script, reuse the very npm that launched
    /// us through `npm_execpath`. Otherwise fall back to `npm` from `PATH`.
    pub fn from_env() -> Self {
        if cfg!(windows) {
            return Self::WindowsShell;
        }

        match env::var_os("npm_execpath").filter(|path| !path.is_empty()) {
            Some(execpath) => {
                let node = env::var_os("npm_node_execpath")
                    .filter(|path| !path.is_empty())
                    .unwrap_or_else(|| OsString::from("node"));
                Self::new(node, [execpath, OsString::from("run")])
            }
            None => Self::new("npm", ["run"]),
        }
    }

    /// Invocation running target script.
    pub fn invocation(&self, script: &str) -> Invocation {
        match self {
            Self::Direct { program, args } => {
                let mut args = args.clone();
                args.push(script.into());
                Invocation {
                    program: program.clone(),
                    args,
                }
            }
            Self::WindowsShell => {
                let command = format!("npm run {script}");
                Invocation::new("cmd.exe", ["/d", "/s", "/c", command.as_str()])
            }
        }
    }
}

impl Default for ScriptCommand {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Outcome of a successful deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeployOutcome {
    pub message: String,
    pub output: String,
}

/// Build then deploy the blog.
#[derive(Debug)]
pub struct DeployPipeline<R = SystemRunner>
where
    R: CommandRunner,
{
    root: Arc<RootLocator>,
    runner: Arc<R>,
    scripts: ScriptCommand,
}

impl<R> DeployPipeline<R>
where
    R: CommandRunner,
{
    /// Construct new deploy pipeline.
    pub fn new(root: Arc<RootLocator>, runner: Arc<R>, scripts: ScriptCommand) -> Self {
        Self {
            root,
            runner,
            scripts,
        }
    }

    /// Run every deploy script inside the content root.
    ///
    /// # Errors
    ///
    /// - Return [`PipelineError::Root`] if content root is unresolved.
    /// - Return [`PipelineError::Script`] on the first failing script, with
    ///   the transcript of every script up to and including it.
    #[instrument(skip(self), level = "debug")]
    pub async fn run(&self) -> Result<DeployOutcome> {
        let root = self.root.require().await?;
        let mut transcript = Transcript::new();
        self.run_scripts(&root, &mut transcript).await?;

        Ok(DeployOutcome {
            message: DEPLOY_DONE.into(),
            output: transcript.to_string(),
        })
    }

    /// Run every deploy script in order, appending to existing transcript.
    ///
    /// # Errors
    ///
    /// - Return [`PipelineError::Script`] on the first failing script.
    pub(crate) async fn run_scripts(&self, cwd: &Path, transcript: &mut Transcript) -> Result<()> {
        for script in DEPLOY_SCRIPTS {
            let label = format!("npm run {script}");
            info!("{label}");

            let invocation = self.scripts.invocation(script);
            let result = run_step(self.runner.as_ref(), &invocation, cwd, transcript, |output| {
                let message =
                    output.failure_message(|code| format!("npm run {script} 执行失败 (退出码 {code})"));
                PipelineError::Script {
                    script: script.into(),
                    message,
                    transcript: Transcript::new(),
                }
            })
            .await;

            match result {
                Ok(output) => transcript.push(&label, output.stdout.trim()),
                Err(PipelineError::Script {
                    script, message, ..
                }) => {
                    transcript.push(&label, &message);
                    return Err(PipelineError::Script {
                        script,
                        message,
                        transcript: transcript.clone(),
                    });
                }
                Err(error) => return Err(error),
            }
        }

        Ok(())
    }
}
