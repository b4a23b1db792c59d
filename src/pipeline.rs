// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Publishing pipelines.
//!
//! A pipeline is a strictly sequential run of external programs inside the
//! content root: git to record and share article changes, and the blog's own
//! npm scripts to build and deploy the site. Each step's output is labeled
//! and collected into a [`Transcript`] so the author can see what happened,
//! even when a later step fails.

pub mod commit;
pub mod deploy;
pub mod git;
pub mod runner;

use crate::root::RootError;
use runner::{CommandOutput, CommandRunner, Invocation};

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::Path,
};
use tracing::debug;

/// Labeled output of every step run so far.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Transcript {
    sections: Vec<String>,
}

impl Transcript {
    /// Construct new empty transcript.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append output of a step under its label.
    pub fn push(&mut self, label: impl AsRef<str>, output: impl AsRef<str>) {
        self.sections
            .push(format!("{}\n{}", label.as_ref(), output.as_ref()));
    }

    /// Check if no step has been recorded.
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

impl Display for Transcript {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(&self.sections.join("\n\n"))
    }
}

/// Run one step, and hand back its output if it exits cleanly.
///
/// # Errors
///
/// - Return [`PipelineError::Spawn`] if program cannot be started.
/// - Return `on_failure` applied to the finished output if the program
///   exits with non-zero status.
pub(crate) async fn run_step<R>(
    runner: &R,
    invocation: &Invocation,
    cwd: &Path,
    transcript: &Transcript,
    on_failure: impl FnOnce(CommandOutput) -> PipelineError,
) -> Result<CommandOutput>
where
    R: CommandRunner,
{
    debug!("run {invocation}");
    let output = runner
        .run(invocation, cwd)
        .await
        .map_err(|source| PipelineError::Spawn {
            program: invocation.program.to_string_lossy().into_owned(),
            source,
            transcript: transcript.clone(),
        })?;

    if !output.success() {
        return Err(on_failure(output));
    }

    Ok(output)
}

/// Pipeline error types.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Content root is unavailable.
    #[error(transparent)]
    Root(#[from] RootError),

    /// Commit message is blank.
    #[error("提交信息不能为空")]
    EmptyMessage,

    /// Nothing worth committing could be derived from the working tree.
    #[error("没有检测到文章改动")]
    NoChanges,

    /// Git exited with non-zero status.
    #[error("{message}")]
    Git {
        command: String,
        message: String,
        transcript: Transcript,
    },

    /// Build or deploy script exited with non-zero status.
    #[error("{message}")]
    Script {
        script: String,
        message: String,
        transcript: Transcript,
    },

    /// External program could not be started.
    #[error("failed to start {program}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
        transcript: Transcript,
    },
}

impl PipelineError {
    /// Output of the steps that ran before the failure, if any.
    pub fn transcript(&self) -> Option<&Transcript> {
        match self {
            Self::Git { transcript, .. }
            | Self::Script { transcript, .. }
            | Self::Spawn { transcript, .. } => Some(transcript).filter(|t| !t.is_empty()),
            _ => None,
        }
    }
}

/// Friendly result alias :3
pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
