// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Record and share article changes through git.
//!
//! Every git call is scoped to the articles directory of the content root,
//! so unrelated work in the blog repository is never staged behind the
//! author's back.

use crate::{
    path::articles_pathspec,
    pipeline::{
        commit,
        deploy::DeployPipeline,
        run_step,
        runner::{CommandRunner, Invocation, SystemRunner},
        PipelineError, Result, Transcript,
    },
    root::RootLocator,
};

use serde::Serialize;
use std::{path::Path, sync::Arc};
use tracing::{info, instrument};

/// Reply message when there is nothing to commit.
pub const NOTHING_TO_COMMIT: &str = "没有检测到文章改动";

/// Success message of a full publish.
pub const PUBLISH_DONE: &str = "提交、推送并部署完成";

/// Outcome of commit and push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitOutcome {
    /// Working tree was clean, so nothing ran past the status check.
    pub skipped: bool,

    /// Push output, or notice that nothing changed.
    pub message: String,
}

/// Outcome of commit, push, and deploy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishOutcome {
    pub message: String,
    pub commit_message: String,
    pub output: String,
}

/// Git operations on the articles directory.
#[derive(Debug)]
pub struct GitPipeline<R = SystemRunner>
where
    R: CommandRunner,
{
    root: Arc<RootLocator>,
    runner: Arc<R>,
}

impl<R> GitPipeline<R>
where
    R: CommandRunner,
{
    /// Construct new git pipeline.
    pub fn new(root: Arc<RootLocator>, runner: Arc<R>) -> Self {
        Self { root, runner }
    }

    /// Short status of the articles directory.
    ///
    /// # Errors
    ///
    /// - Return [`PipelineError::Root`] if content root is unresolved.
    /// - Return [`PipelineError::Git`] if git fails.
    #[instrument(skip(self), level = "debug")]
    pub async fn status(&self) -> Result<String> {
        let root = self.root.require().await?;
        self.git(&root, &["status", "--short"], &Transcript::new())
            .await
    }

    /// Commit and push every change in the articles directory.
    ///
    /// Nothing beyond the status check runs if the articles directory is
    /// clean.
    ///
    /// # Errors
    ///
    /// - Return [`PipelineError::EmptyMessage`] if message is blank.
    /// - Return [`PipelineError::Root`] if content root is unresolved.
    /// - Return [`PipelineError::Git`] if any git step fails. Later steps
    ///   are not run.
    #[instrument(skip(self, message), level = "debug")]
    pub async fn commit_and_push(&self, message: &str) -> Result<CommitOutcome> {
        let message = message.trim();
        if message.is_empty() {
            return Err(PipelineError::EmptyMessage);
        }

        let root = self.root.require().await?;
        let transcript = Transcript::new();
        let changes = self
            .git(&root, &["status", "--porcelain"], &transcript)
            .await?;
        if changes.is_empty() {
            info!("no article changes to commit");
            return Ok(CommitOutcome {
                skipped: true,
                message: NOTHING_TO_COMMIT.into(),
            });
        }

        self.git(&root, &["add"], &transcript).await?;
        self.git_raw(&root, &["commit", "-m", message], &transcript)
            .await?;
        let pushed = self.git_raw(&root, &["push"], &transcript).await?;
        info!("committed and pushed {message:?}");

        Ok(CommitOutcome {
            skipped: false,
            message: pushed,
        })
    }

    /// Commit with a derived message, push, then build and deploy.
    ///
    /// The commit message summarizes the changed articles. Output of every
    /// step is collected in order.
    ///
    /// # Errors
    ///
    /// - Return [`PipelineError::Root`] if content root is unresolved.
    /// - Return [`PipelineError::NoChanges`] if no commit message can be
    ///   derived from the status of the articles directory.
    /// - Return [`PipelineError::Git`] or [`PipelineError::Script`] on the
    ///   first failing step, carrying the output of every earlier step.
    #[instrument(skip(self, deploy), level = "debug")]
    pub async fn auto_commit_push_deploy(
        &self,
        article_hint: Option<&str>,
        deploy: &DeployPipeline<R>,
    ) -> Result<PublishOutcome> {
        let root = self.root.require().await?;
        let mut transcript = Transcript::new();

        let status = self
            .git(&root, &["status", "--porcelain"], &transcript)
            .await?;
        let commit_message = commit::derive(&status, article_hint);
        if commit_message.is_empty() {
            return Err(PipelineError::NoChanges);
        }
        info!("publish with commit message {commit_message:?}");

        self.git(&root, &["add"], &transcript).await?;
        let committed = self
            .git_raw(&root, &["commit", "-m", &commit_message], &transcript)
            .await?;
        transcript.push(format!("git commit -m \"{commit_message}\""), committed);
        let pushed = self.git_raw(&root, &["push"], &transcript).await?;
        transcript.push("git push", pushed);

        deploy.run_scripts(&root, &mut transcript).await?;

        Ok(PublishOutcome {
            message: PUBLISH_DONE.into(),
            commit_message,
            output: transcript.to_string(),
        })
    }

    /// Run git subcommand limited to the articles directory.
    async fn git(&self, root: &Path, args: &[&str], transcript: &Transcript) -> Result<String> {
        let pathspec = articles_pathspec();
        let mut args = args.to_vec();
        args.push(&pathspec);
        self.git_raw(root, &args, transcript).await
    }

    /// Run git subcommand as given.
    async fn git_raw(
        &self,
        root: &Path,
        args: &[&str],
        transcript: &Transcript,
    ) -> Result<String> {
        let invocation = Invocation::new("git", args.iter().copied());
        let command = invocation.to_string();
        let output = run_step(self.runner.as_ref(), &invocation, root, transcript, |output| {
            PipelineError::Git {
                command,
                message: output.failure_message(|code| format!("Git 命令执行失败 (退出码 {code})")),
                transcript: transcript.clone(),
            }
        })
        .await?;

        Ok(output.stdout.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{
        deploy::ScriptCommand,
        testing::{blog, fail, nowhere, ok, FakeRunner},
    };
    use pretty_assertions::assert_eq;
    use std::io;

    fn pipelines(
        root: Arc<RootLocator>,
        runner: Arc<FakeRunner>,
    ) -> (GitPipeline<FakeRunner>, DeployPipeline<FakeRunner>) {
        let deploy = DeployPipeline::new(root.clone(), runner.clone(), ScriptCommand::new("npm", ["run"]));
        (GitPipeline::new(root, runner), deploy)
    }

    #[tokio::test]
    async fn status_is_trimmed() -> anyhow::Result<()> {
        let (_temp, root) = blog();
        let runner = Arc::new(FakeRunner::new(|_| ok("\n M src/articles/a.md\n\n")));
        let (git, _) = pipelines(root, runner.clone());

        assert_eq!(git.status().await?, "M src/articles/a.md");
        assert_eq!(runner.calls(), vec!["git status --short src/articles"]);
        Ok(())
    }

    #[tokio::test]
    async fn commit_and_push_rejects_blank_message() {
        let (_temp, root) = blog();
        let runner = Arc::new(FakeRunner::new(|_| ok("")));
        let (git, _) = pipelines(root, runner.clone());

        for message in ["", "  \n\t"] {
            let result = git.commit_and_push(message).await;
            assert!(matches!(result, Err(PipelineError::EmptyMessage)));
        }
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn commit_and_push_skips_clean_tree() -> anyhow::Result<()> {
        let (_temp, root) = blog();
        let runner = Arc::new(FakeRunner::new(|_| ok("\n")));
        let (git, _) = pipelines(root, runner.clone());

        let result = git.commit_and_push("msg").await?;
        let expect = CommitOutcome {
            skipped: true,
            message: "没有检测到文章改动".into(),
        };
        assert_eq!(result, expect);
        assert_eq!(runner.calls(), vec!["git status --porcelain src/articles"]);
        Ok(())
    }

    #[tokio::test]
    async fn commit_and_push_runs_steps_in_order() -> anyhow::Result<()> {
        let (_temp, root) = blog();
        let runner = Arc::new(FakeRunner::new(|command| match command {
            "git push" => ok("To origin\n   main -> main\n"),
            command if command.starts_with("git status") => ok("?? src/articles/a.md\n"),
            _ => ok(""),
        }));
        let (git, _) = pipelines(root, runner.clone());

        let result = git.commit_and_push("  修改a  ").await?;
        assert!(!result.skipped);
        assert_eq!(result.message, "To origin\n   main -> main");
        assert_eq!(
            runner.calls(),
            vec![
                "git status --porcelain src/articles",
                "git add src/articles",
                "git commit -m 修改a",
                "git push",
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn commit_and_push_stops_at_failing_step() {
        let (_temp, root) = blog();
        let runner = Arc::new(FakeRunner::new(|command| match command {
            command if command.starts_with("git status") => ok(" M src/articles/a.md"),
            command if command.starts_with("git commit") => ok("stdout only"),
            "git push" => fail(128, ""),
            _ => ok(""),
        }));
        let (git, _) = pipelines(root, runner.clone());

        let error = git.commit_and_push("msg").await.unwrap_err();
        assert_eq!(error.to_string(), "Git 命令执行失败 (退出码 128)");
        assert!(matches!(&error, PipelineError::Git { command, .. } if command == "git push"));
        assert_eq!(runner.calls().len(), 4);

        let runner = Arc::new(FakeRunner::new(|command| match command {
            command if command.starts_with("git status") => ok(" M src/articles/a.md"),
            "git add src/articles" => fail(1, "fatal: index.lock exists\n"),
            _ => ok(""),
        }));
        let (_temp, root) = blog();
        let (git, _) = pipelines(root, runner.clone());
        let error = git.commit_and_push("msg").await.unwrap_err();
        assert_eq!(error.to_string(), "fatal: index.lock exists");
        assert_eq!(
            runner.calls(),
            vec!["git status --porcelain src/articles", "git add src/articles"]
        );
    }

    #[tokio::test]
    async fn unresolved_root_spawns_nothing() {
        let (_temp, root) = nowhere();
        let runner = Arc::new(FakeRunner::new(|_| ok("")));
        let (git, deploy) = pipelines(root, runner.clone());

        assert!(matches!(git.status().await, Err(PipelineError::Root(_))));
        assert!(matches!(git.commit_and_push("msg").await, Err(PipelineError::Root(_))));
        assert!(matches!(
            git.auto_commit_push_deploy(None, &deploy).await,
            Err(PipelineError::Root(_))
        ));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn spawn_failure_is_reported() {
        let (_temp, root) = blog();
        let runner = Arc::new(FakeRunner::new(|_| {
            Err(io::Error::new(io::ErrorKind::NotFound, "git not installed"))
        }));
        let (git, _) = pipelines(root, runner);

        let result = git.status().await;
        assert!(matches!(result, Err(PipelineError::Spawn { program, .. }) if program == "git"));
    }

    #[tokio::test]
    async fn auto_publish_without_derivable_changes() {
        let (_temp, root) = blog();
        let runner = Arc::new(FakeRunner::new(|_| ok(" M src/articles/metadata.js\n")));
        let (git, deploy) = pipelines(root, runner.clone());

        let result = git.auto_commit_push_deploy(None, &deploy).await;
        assert!(matches!(result, Err(PipelineError::NoChanges)));
        assert_eq!(runner.calls(), vec!["git status --porcelain src/articles"]);
    }

    #[tokio::test]
    async fn auto_publish_runs_everything_in_order() -> anyhow::Result<()> {
        let (_temp, root) = blog();
        let runner = Arc::new(FakeRunner::new(|command| match command {
            command if command.starts_with("git status") => {
                ok(" M src/articles/metadata.js\n?? src/articles/intro.md\n")
            }
            command if command.starts_with("git commit") => ok("[main 1a2b3c4] 修改regex\n"),
            "git push" => ok("pushed"),
            "npm run build" => ok("built"),
            "npm run deploy" => ok("deployed"),
            _ => ok(""),
        }));
        let (git, deploy) = pipelines(root, runner.clone());

        let result = git.auto_commit_push_deploy(Some("regex.md"), &deploy).await?;
        assert_eq!(result.message, "提交、推送并部署完成");
        assert_eq!(result.commit_message, "修改regex、新建intro");
        assert_eq!(
            result.output,
            "git commit -m \"修改regex、新建intro\"\n[main 1a2b3c4] 修改regex\n\n\
             git push\npushed\n\n\
             npm run build\nbuilt\n\n\
             npm run deploy\ndeployed"
        );
        assert_eq!(
            runner.calls(),
            vec![
                "git status --porcelain src/articles",
                "git add src/articles",
                "git commit -m 修改regex、新建intro",
                "git push",
                "npm run build",
                "npm run deploy",
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn auto_publish_failed_deploy_keeps_earlier_output() {
        let (_temp, root) = blog();
        let runner = Arc::new(FakeRunner::new(|command| match command {
            command if command.starts_with("git status") => ok("?? src/articles/a.md"),
            "npm run build" => ok("built"),
            "npm run deploy" => fail(1, "deploy failed"),
            _ => ok("done"),
        }));
        let (git, deploy) = pipelines(root, runner.clone());

        let error = git
            .auto_commit_push_deploy(None, &deploy)
            .await
            .unwrap_err();
        assert_eq!(error.to_string(), "deploy failed");
        let transcript = error.transcript().unwrap().to_string();
        assert!(transcript.contains("git push\ndone"));
        assert!(transcript.contains("npm run build\nbuilt"));
        assert!(transcript.ends_with("npm run deploy\ndeploy failed"));
    }

    #[tokio::test]
    async fn auto_publish_failed_push_skips_deploy() {
        let (_temp, root) = blog();
        let runner = Arc::new(FakeRunner::new(|command| match command {
            command if command.starts_with("git status") => ok("?? src/articles/a.md"),
            "git push" => fail(1, "rejected"),
            _ => ok("committed"),
        }));
        let (git, deploy) = pipelines(root, runner.clone());

        let error = git
            .auto_commit_push_deploy(None, &deploy)
            .await
            .unwrap_err();
        assert_eq!(error.to_string(), "rejected");
        assert_eq!(
            error.transcript().unwrap().to_string(),
            "git commit -m \"新建a\"\ncommitted"
        );
        assert_eq!(runner.calls().last().unwrap(), "git push");
    }
}
