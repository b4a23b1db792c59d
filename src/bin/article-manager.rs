// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use article_manager::{
    article::ArticleError,
    path::default_preferences_path,
    Confirm, Gateway, GatewayError, Operation, PickDirectory, PreferenceFile, ResolutionContext,
    RootLocator, ScriptCommand, SystemRunner,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use inquire::{Confirm as ConfirmPrompt, Text};
use serde_json::{json, Value};
use std::{io::Read, path::PathBuf, process::exit, sync::Arc, time::Duration};
use tracing::{error, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "article-manager [options] <command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Answer yes to every confirmation.
    #[arg(short, long, global = true)]
    pub yes: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    async fn run(self) -> Result<()> {
        let prompt = TerminalPrompt {
            assume_yes: self.yes,
            directory: match &self.command {
                Command::SelectRoot(opts) => opts.directory.clone(),
                _ => None,
            },
        };
        let gateway = open_gateway(prompt).await?;

        let operation = match self.command {
            Command::List => Operation::ListArticles,
            Command::Read(opts) => Operation::ReadArticle { name: opts.name },
            Command::Save(opts) => Operation::SaveArticle {
                content: read_content(opts.from)?,
                name: opts.name,
            },
            Command::Delete(opts) => Operation::DeleteArticle { name: opts.name },
            Command::Status => Operation::GitStatus,
            Command::Commit(opts) => Operation::CommitAndPush {
                message: opts.message,
            },
            Command::Metadata(opts) => match opts.command {
                MetadataCommand::List => Operation::ListMetadata,
                MetadataCommand::Save(entry) => Operation::SaveMetadataEntry {
                    payload: entry.into_payload(),
                },
            },
            Command::Deploy => Operation::BuildAndDeploy,
            Command::Publish(opts) => Operation::AutoCommitPushDeploy {
                article_hint: opts.article,
            },
            Command::SelectRoot(_) => Operation::SelectBlogRoot,
            Command::Root => Operation::GetBlogRoot,
            Command::Invoke(opts) => {
                let args = opts
                    .args
                    .iter()
                    .map(|arg| {
                        serde_json::from_str(arg).unwrap_or_else(|_| Value::String(arg.clone()))
                    })
                    .collect::<Vec<Value>>();
                Operation::from_invocation(&opts.channel, &args)?
            }
        };

        let bar = is_long_running(&operation).then(|| spinner(operation.channel()));
        let result = gateway.dispatch(operation).await;
        if let Some(bar) = bar {
            bar.finish_and_clear();
        }

        match result {
            Ok(reply) => {
                println!("{}", serde_json::to_string_pretty(&reply)?);
                Ok(())
            }
            Err(error) => {
                if let Some(transcript) = error.transcript() {
                    eprintln!("{transcript}");
                }
                Err(error.into())
            }
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// List article file names.
    #[command(override_usage = "article-manager list")]
    List,

    /// Print article content.
    #[command(override_usage = "article-manager read <name>")]
    Read(NameOptions),

    /// Write article content from file or standard input.
    #[command(override_usage = "article-manager save [options] <name>")]
    Save(SaveOptions),

    /// Delete article and its metadata entry.
    #[command(override_usage = "article-manager delete [options] <name>")]
    Delete(NameOptions),

    /// Show git status of the articles directory.
    #[command(override_usage = "article-manager status")]
    Status,

    /// Commit and push every article change.
    #[command(override_usage = "article-manager commit <message>")]
    Commit(CommitOptions),

    /// Inspect or edit the metadata index.
    #[command(override_usage = "article-manager metadata <command>")]
    Metadata(MetadataOptions),

    /// Build and deploy the blog.
    #[command(override_usage = "article-manager deploy")]
    Deploy,

    /// Commit with a derived message, push, build, and deploy.
    #[command(override_usage = "article-manager publish [<article>]")]
    Publish(PublishOptions),

    /// Choose the blog repository to manage.
    #[command(override_usage = "article-manager select-root [<directory>]")]
    SelectRoot(SelectRootOptions),

    /// Show the blog repository currently managed.
    #[command(override_usage = "article-manager root")]
    Root,

    /// Perform operation by channel name with JSON arguments.
    #[command(override_usage = "article-manager invoke <channel> [<json>]...")]
    Invoke(InvokeOptions),
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct NameOptions {
    /// Article file name, with or without ".md".
    #[arg(required = true, value_name = "name")]
    pub name: String,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct SaveOptions {
    /// Article file name, with or without ".md".
    #[arg(required = true, value_name = "name")]
    pub name: String,

    /// Read content from file instead of standard input.
    #[arg(short, long, value_name = "path")]
    pub from: Option<PathBuf>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct CommitOptions {
    /// Commit message.
    #[arg(required = true, value_name = "message")]
    pub message: String,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct MetadataOptions {
    #[command(subcommand)]
    pub command: MetadataCommand,
}

#[derive(Debug, Clone, Subcommand)]
enum MetadataCommand {
    /// List metadata entries.
    List,

    /// Insert or replace metadata entry.
    Save(EntryOptions),
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct EntryOptions {
    /// Unique article identifier.
    #[arg(long, value_name = "id", default_value = "")]
    pub id: String,

    /// Article title.
    #[arg(long, value_name = "title", default_value = "")]
    pub title: String,

    /// Publication date.
    #[arg(long, value_name = "date", default_value = "")]
    pub date: String,

    /// Article author.
    #[arg(long, value_name = "author", default_value = "")]
    pub author: String,

    /// Estimated reading time.
    #[arg(long, value_name = "read_time", default_value = "")]
    pub read_time: String,

    /// Short summary.
    #[arg(long, value_name = "summary", default_value = "")]
    pub summary: String,

    /// Article file name.
    #[arg(long, value_name = "file", default_value = "")]
    pub file: String,
}

impl EntryOptions {
    fn into_payload(self) -> Value {
        json!({
            "id": self.id,
            "title": self.title,
            "date": self.date,
            "author": self.author,
            "readTime": self.read_time,
            "summary": self.summary,
            "file": self.file
        })
    }
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct PublishOptions {
    /// Article to name in the commit message when only metadata changed.
    #[arg(value_name = "article")]
    pub article: Option<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct SelectRootOptions {
    /// Blog repository directory. Prompted for when left out.
    #[arg(value_name = "directory")]
    pub directory: Option<PathBuf>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct InvokeOptions {
    /// Operation channel, e.g., "articles:read".
    #[arg(required = true, value_name = "channel")]
    pub channel: String,

    /// Positional arguments. Anything that is not valid JSON is a string.
    #[arg(value_name = "json")]
    pub args: Vec<String>,
}

/// Confirmations and directory choice through the terminal.
#[derive(Debug, Clone)]
struct TerminalPrompt {
    assume_yes: bool,
    directory: Option<PathBuf>,
}

impl Confirm for TerminalPrompt {
    async fn confirm(&self, question: &str) -> bool {
        if self.assume_yes {
            return true;
        }

        let question = question.to_string();
        let answer = tokio::task::spawn_blocking(move || {
            ConfirmPrompt::new(&question).with_default(false).prompt()
        })
        .await;

        match answer {
            Ok(Ok(answer)) => answer,
            Ok(Err(error)) => {
                warn!("confirmation aborted: {error}");
                false
            }
            Err(error) => {
                warn!("confirmation prompt failed: {error}");
                false
            }
        }
    }
}

impl PickDirectory for TerminalPrompt {
    async fn pick_directory(&self) -> Option<PathBuf> {
        if let Some(directory) = &self.directory {
            return Some(directory.clone());
        }

        let answer = tokio::task::spawn_blocking(|| Text::new("选择博客仓库目录").prompt()).await;
        match answer {
            Ok(Ok(directory)) if !directory.trim().is_empty() => {
                Some(PathBuf::from(directory.trim()))
            }
            _ => None,
        }
    }
}

#[tokio::main]
async fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_timer(false)
        .without_time()
        .with_writer(std::io::stderr);
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_default();
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run().await {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

async fn run() -> Result<()> {
    Cli::parse().run().await
}

async fn open_gateway(
    prompt: TerminalPrompt,
) -> Result<Gateway<SystemRunner, TerminalPrompt, TerminalPrompt>> {
    let context = ResolutionContext::from_process()?;
    let preferences = PreferenceFile::new(default_preferences_path()?);
    let root = Arc::new(RootLocator::new(context, preferences));
    if root.current().await.is_none() {
        warn!("blog root not located, select one with `article-manager select-root`");
    }

    Ok(Gateway::new(
        root,
        SystemRunner,
        ScriptCommand::from_env(),
        prompt.clone(),
        prompt,
    ))
}

fn read_content(from: Option<PathBuf>) -> Result<String> {
    let bytes = match from {
        Some(path) => std::fs::read(&path)
            .with_context(|| format!("failed to read content from {:?}", path.display()))?,
        None => {
            let mut bytes = Vec::new();
            std::io::stdin()
                .read_to_end(&mut bytes)
                .context("failed to read content from standard input")?;
            bytes
        }
    };

    String::from_utf8(bytes).map_err(|_| GatewayError::from(ArticleError::WrongType).into())
}

fn is_long_running(operation: &Operation) -> bool {
    matches!(
        operation,
        Operation::BuildAndDeploy
            | Operation::AutoCommitPushDeploy { .. }
            | Operation::CommitAndPush { .. }
    )
}

fn spinner(channel: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    if let Ok(style) =
        ProgressStyle::with_template("{elapsed_precise:.green}  {spinner:.yellow}  {msg}")
    {
        bar.set_style(style);
    }
    bar.set_message(channel.to_string());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}
