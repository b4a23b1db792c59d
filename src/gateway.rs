// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Named operations exposed to the user interface.
//!
//! A UI collaborator never touches the components directly. It sends a
//! channel name like "articles:save" plus JSON arguments, and gets back a
//! JSON reply or an error message meant for the author. The [`Gateway`]
//! owns one instance of every component, all sharing the same
//! [`RootLocator`].

use crate::{
    article::{Article, ArticleError, ArticleRepository, Confirm},
    metadata::{MetadataEntry, MetadataError, MetadataStore},
    path::PathError,
    pipeline::{
        deploy::{DeployOutcome, DeployPipeline, ScriptCommand},
        git::{CommitOutcome, GitPipeline, PublishOutcome},
        runner::CommandRunner,
        PipelineError, Transcript,
    },
    root::{RootError, RootLocator},
};

use serde::Serialize;
use serde_json::Value;
use std::{future::Future, path::PathBuf, sync::Arc};
use tracing::{info, instrument};

/// Let the author pick a directory.
pub trait PickDirectory: Send + Sync {
    /// Present directory picker, and resolve to the chosen directory, or
    /// `None` if the author cancelled.
    fn pick_directory(&self) -> impl Future<Output = Option<PathBuf>> + Send;
}

/// One request from the user interface.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    ListArticles,
    ReadArticle { name: String },
    SaveArticle { name: String, content: String },
    DeleteArticle { name: String },
    GitStatus,
    CommitAndPush { message: String },
    ListMetadata,
    SaveMetadataEntry { payload: Value },
    BuildAndDeploy,
    AutoCommitPushDeploy { article_hint: Option<String> },
    SelectBlogRoot,
    GetBlogRoot,
}

impl Operation {
    /// Every channel name understood by the gateway.
    pub const CHANNELS: [&'static str; 12] = [
        "articles:list",
        "articles:read",
        "articles:save",
        "articles:delete",
        "git:status",
        "git:commitAndPush",
        "metadata:list",
        "metadata:saveEntry",
        "project:buildAndDeploy",
        "project:autoCommitPushDeploy",
        "app:selectBlogRoot",
        "app:getBlogRoot",
    ];

    /// Channel name of operation.
    pub fn channel(&self) -> &'static str {
        match self {
            Self::ListArticles => "articles:list",
            Self::ReadArticle { .. } => "articles:read",
            Self::SaveArticle { .. } => "articles:save",
            Self::DeleteArticle { .. } => "articles:delete",
            Self::GitStatus => "git:status",
            Self::CommitAndPush { .. } => "git:commitAndPush",
            Self::ListMetadata => "metadata:list",
            Self::SaveMetadataEntry { .. } => "metadata:saveEntry",
            Self::BuildAndDeploy => "project:buildAndDeploy",
            Self::AutoCommitPushDeploy { .. } => "project:autoCommitPushDeploy",
            Self::SelectBlogRoot => "app:selectBlogRoot",
            Self::GetBlogRoot => "app:getBlogRoot",
        }
    }

    /// Construct operation from channel name and positional JSON arguments.
    ///
    /// Missing trailing arguments count as `null`.
    ///
    /// # Errors
    ///
    /// - Return [`GatewayError::UnknownOperation`] if channel is not known.
    /// - Return [`ArticleError::InvalidName`] if an article name is not a
    ///   string, or is empty.
    /// - Return [`ArticleError::WrongType`] if article content is not a
    ///   string.
    pub fn from_invocation(channel: &str, args: &[Value]) -> Result<Self> {
        let arg = |index: usize| args.get(index).unwrap_or(&Value::Null);
        let name = || match arg(0) {
            Value::String(name) if !name.is_empty() => Ok(name.clone()),
            _ => Err(GatewayError::Article(ArticleError::InvalidName(
                PathError::EmptyName,
            ))),
        };

        let operation = match channel {
            "articles:list" => Self::ListArticles,
            "articles:read" => Self::ReadArticle { name: name()? },
            "articles:save" => {
                let Value::String(content) = arg(1) else {
                    return Err(ArticleError::WrongType.into());
                };
                Self::SaveArticle {
                    name: name()?,
                    content: content.clone(),
                }
            }
            "articles:delete" => Self::DeleteArticle { name: name()? },
            "git:status" => Self::GitStatus,
            "git:commitAndPush" => Self::CommitAndPush {
                message: arg(0).as_str().unwrap_or_default().to_string(),
            },
            "metadata:list" => Self::ListMetadata,
            "metadata:saveEntry" => Self::SaveMetadataEntry {
                payload: arg(0).clone(),
            },
            "project:buildAndDeploy" => Self::BuildAndDeploy,
            "project:autoCommitPushDeploy" => Self::AutoCommitPushDeploy {
                article_hint: arg(0).as_str().map(str::to_string),
            },
            "app:selectBlogRoot" => Self::SelectBlogRoot,
            "app:getBlogRoot" => Self::GetBlogRoot,
            unknown => return Err(GatewayError::UnknownOperation(unknown.into())),
        };

        Ok(operation)
    }
}

/// Successful result of an operation.
///
/// Serializes to the bare reply shape the user interface expects, e.g.,
/// `{"deleted": true}` or `["a.md", "b.md"]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Reply {
    Names(Vec<String>),
    Article(Article),
    Saved {
        name: String,
    },
    Deleted {
        deleted: bool,
    },
    Status(String),
    Commit(CommitOutcome),
    Metadata(Vec<MetadataEntry>),
    Entry(MetadataEntry),
    Deploy(DeployOutcome),
    Publish(PublishOutcome),
    BlogRoot {
        #[serde(rename = "blogRoot")]
        blog_root: Option<String>,
    },
}

/// Dispatch operations to the components of one content root.
pub struct Gateway<R, C, P>
where
    R: CommandRunner,
    C: Confirm,
    P: PickDirectory,
{
    root: Arc<RootLocator>,
    articles: ArticleRepository,
    metadata: MetadataStore,
    git: GitPipeline<R>,
    deploy: DeployPipeline<R>,
    confirm: C,
    picker: P,
}

impl<R, C, P> Gateway<R, C, P>
where
    R: CommandRunner,
    C: Confirm,
    P: PickDirectory,
{
    /// Construct new gateway.
    pub fn new(
        root: Arc<RootLocator>,
        runner: R,
        scripts: ScriptCommand,
        confirm: C,
        picker: P,
    ) -> Self {
        let runner = Arc::new(runner);
        let metadata = MetadataStore::new(root.clone());

        Self {
            articles: ArticleRepository::new(root.clone(), metadata.clone()),
            git: GitPipeline::new(root.clone(), runner.clone()),
            deploy: DeployPipeline::new(root.clone(), runner, scripts),
            metadata,
            root,
            confirm,
            picker,
        }
    }

    /// Shared content root locator.
    pub fn root(&self) -> &Arc<RootLocator> {
        &self.root
    }

    /// Perform operation.
    ///
    /// # Errors
    ///
    /// - Return [`GatewayError`] wrapping whatever the responsible
    ///   component failed with.
    /// - Return [`GatewayError::DialogCancelled`] if the author cancels the
    ///   directory picker.
    #[instrument(skip_all, fields(channel = operation.channel()), level = "debug")]
    pub async fn dispatch(&self, operation: Operation) -> Result<Reply> {
        let reply = match operation {
            Operation::ListArticles => Reply::Names(self.articles.list_names().await?),
            Operation::ReadArticle { name } => Reply::Article(self.articles.read(&name).await?),
            Operation::SaveArticle { name, content } => Reply::Saved {
                name: self.articles.save(&name, content).await?,
            },
            Operation::DeleteArticle { name } => Reply::Deleted {
                deleted: self.articles.delete(&name, &self.confirm).await?,
            },
            Operation::GitStatus => Reply::Status(self.git.status().await?),
            Operation::CommitAndPush { message } => {
                Reply::Commit(self.git.commit_and_push(&message).await?)
            }
            Operation::ListMetadata => Reply::Metadata(self.metadata.list().await?),
            Operation::SaveMetadataEntry { payload } => {
                let entry = MetadataEntry::from_payload(&payload)?;
                Reply::Entry(self.metadata.upsert(entry).await?)
            }
            Operation::BuildAndDeploy => Reply::Deploy(self.deploy.run().await?),
            Operation::AutoCommitPushDeploy { article_hint } => Reply::Publish(
                self.git
                    .auto_commit_push_deploy(article_hint.as_deref(), &self.deploy)
                    .await?,
            ),
            Operation::SelectBlogRoot => {
                let chosen = self
                    .picker
                    .pick_directory()
                    .await
                    .ok_or(GatewayError::DialogCancelled)?;
                let root = self.root.select(chosen).await?;
                Reply::BlogRoot {
                    blog_root: Some(root.to_string_lossy().into_owned()),
                }
            }
            Operation::GetBlogRoot => Reply::BlogRoot {
                blog_root: self
                    .root
                    .current()
                    .await
                    .map(|root| root.to_string_lossy().into_owned()),
            },
        };

        Ok(reply)
    }

    /// Perform operation named by channel, speaking JSON on both ends.
    ///
    /// # Errors
    ///
    /// - Return author facing message of any failure.
    pub async fn invoke(&self, channel: &str, args: &[Value]) -> std::result::Result<Value, String> {
        let result = match Operation::from_invocation(channel, args) {
            Ok(operation) => self.dispatch(operation).await,
            Err(error) => Err(error),
        };

        match result {
            Ok(reply) => serde_json::to_value(reply).map_err(|error| error.to_string()),
            Err(error) => {
                info!("{channel} failed: {error}");
                Err(error.to_string())
            }
        }
    }
}

/// Failure classes visible to the user interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No content root is configured or discoverable.
    RootNotFound,

    /// Article name is empty or escapes the articles directory.
    InvalidName,

    /// Article does not exist.
    NotFound,

    /// Article content is not text.
    WrongType,

    /// Metadata entry lacks a required field.
    ValidationError,

    /// Metadata index cannot be parsed.
    MetadataParseError,

    /// Commit message is blank.
    EmptyMessage,

    /// No article change to commit.
    NoChanges,

    /// Git exited unsuccessfully.
    GitError,

    /// Build or deploy script exited unsuccessfully.
    ScriptError,

    /// Directory picker closed without a choice.
    DialogCancelled,

    /// Channel name is not known.
    UnknownOperation,

    /// Filesystem or process spawn failure.
    Io,
}

/// Operation gateway error types.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Content root discovery or selection failed.
    #[error(transparent)]
    Root(#[from] RootError),

    /// Article operation failed.
    #[error(transparent)]
    Article(#[from] ArticleError),

    /// Metadata operation failed.
    #[error(transparent)]
    Metadata(#[from] MetadataError),

    /// Git or npm pipeline failed.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// Author closed directory picker without choosing.
    #[error("未选择目录")]
    DialogCancelled,

    /// Channel name is not known.
    #[error("unknown operation {0:?}")]
    UnknownOperation(String),
}

impl GatewayError {
    /// Failure class of error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Root(error) => root_kind(error),
            Self::Article(error) => match error {
                ArticleError::Root(error) => root_kind(error),
                ArticleError::InvalidName(PathError::NoConfigDir) => ErrorKind::Io,
                ArticleError::InvalidName(_) => ErrorKind::InvalidName,
                ArticleError::NotFound { .. } => ErrorKind::NotFound,
                ArticleError::WrongType => ErrorKind::WrongType,
                ArticleError::ReadDir { .. }
                | ArticleError::Read { .. }
                | ArticleError::Write { .. }
                | ArticleError::Remove { .. } => ErrorKind::Io,
            },
            Self::Metadata(error) => match error {
                MetadataError::Root(error) => root_kind(error),
                MetadataError::EmptyPayload
                | MetadataError::MissingId
                | MetadataError::MissingTitle
                | MetadataError::MissingFile => ErrorKind::ValidationError,
                MetadataError::Parse(_) | MetadataError::Read { .. } => {
                    ErrorKind::MetadataParseError
                }
                MetadataError::Write { .. } => ErrorKind::Io,
            },
            Self::Pipeline(error) => match error {
                PipelineError::Root(error) => root_kind(error),
                PipelineError::EmptyMessage => ErrorKind::EmptyMessage,
                PipelineError::NoChanges => ErrorKind::NoChanges,
                PipelineError::Git { .. } => ErrorKind::GitError,
                PipelineError::Script { .. } => ErrorKind::ScriptError,
                PipelineError::Spawn { .. } => ErrorKind::Io,
            },
            Self::DialogCancelled => ErrorKind::DialogCancelled,
            Self::UnknownOperation(_) => ErrorKind::UnknownOperation,
        }
    }

    /// Output of pipeline steps that ran before the failure, if any.
    pub fn transcript(&self) -> Option<&Transcript> {
        match self {
            Self::Pipeline(error) => error.transcript(),
            _ => None,
        }
    }
}

fn root_kind(error: &RootError) -> ErrorKind {
    match error {
        RootError::Unresolved | RootError::MissingArticles { .. } => ErrorKind::RootNotFound,
        RootError::ReadPreferences { .. }
        | RootError::WritePreferences { .. }
        | RootError::Config(_) => ErrorKind::Io,
    }
}

/// Friendly result alias :3
pub type Result<T, E = GatewayError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use simple_test_case::test_case;

    #[test]
    fn every_channel_round_trips_through_its_operation() -> anyhow::Result<()> {
        let args = [json!("post"), json!("body")];
        for channel in Operation::CHANNELS {
            let operation = Operation::from_invocation(channel, &args)?;
            assert_eq!(operation.channel(), channel);
        }
        Ok(())
    }

    #[test]
    fn from_invocation_reads_positional_arguments() -> anyhow::Result<()> {
        let result = Operation::from_invocation("articles:save", &[json!("post.md"), json!("# Hi")])?;
        let expect = Operation::SaveArticle {
            name: "post.md".into(),
            content: "# Hi".into(),
        };
        assert_eq!(result, expect);

        let result = Operation::from_invocation("project:autoCommitPushDeploy", &[])?;
        assert_eq!(result, Operation::AutoCommitPushDeploy { article_hint: None });

        let result = Operation::from_invocation("git:commitAndPush", &[json!(42)])?;
        assert_eq!(result, Operation::CommitAndPush { message: String::new() });
        Ok(())
    }

    #[test_case("articles:read", vec![json!(7)], ErrorKind::InvalidName; "numeric name")]
    #[test_case("articles:delete", vec![], ErrorKind::InvalidName; "missing name")]
    #[test_case("articles:read", vec![json!("")], ErrorKind::InvalidName; "empty name")]
    #[test_case("articles:save", vec![json!("post"), json!([1, 2])], ErrorKind::WrongType; "non text content")]
    #[test_case("articles:save", vec![json!(null), json!(null)], ErrorKind::WrongType; "content checked first")]
    #[test_case("articles:rename", vec![], ErrorKind::UnknownOperation; "unknown channel")]
    #[test]
    fn from_invocation_rejects(channel: &str, args: Vec<Value>, expect: ErrorKind) {
        let error = Operation::from_invocation(channel, &args).unwrap_err();
        pretty_assertions::assert_eq!(error.kind(), expect);
    }

    #[test]
    fn reply_shapes() -> anyhow::Result<()> {
        let reply = Reply::BlogRoot {
            blog_root: Some("/blog".into()),
        };
        assert_eq!(serde_json::to_value(reply)?, json!({ "blogRoot": "/blog" }));

        let reply = Reply::Deleted { deleted: false };
        assert_eq!(serde_json::to_value(reply)?, json!({ "deleted": false }));

        let reply = Reply::Publish(PublishOutcome {
            message: "done".into(),
            commit_message: "新建a".into(),
            output: String::new(),
        });
        assert_eq!(
            serde_json::to_value(reply)?,
            json!({ "message": "done", "commitMessage": "新建a", "output": "" })
        );

        let reply = Reply::Names(vec!["a.md".into()]);
        assert_eq!(serde_json::to_value(reply)?, json!(["a.md"]));
        Ok(())
    }

    #[test]
    fn error_kinds_follow_component_errors() {
        let error = GatewayError::from(RootError::Unresolved);
        assert_eq!(error.kind(), ErrorKind::RootNotFound);
        assert_eq!(error.to_string(), "博客根目录未配置");

        let error = GatewayError::from(PipelineError::NoChanges);
        assert_eq!(error.kind(), ErrorKind::NoChanges);

        let error = GatewayError::from(MetadataError::MissingTitle);
        assert_eq!(error.kind(), ErrorKind::ValidationError);
        assert_eq!(error.to_string(), "请填写文章标题");

        let error = GatewayError::from(ArticleError::InvalidName(PathError::Traversal {
            name: "../x".into(),
        }));
        assert_eq!(error.kind(), ErrorKind::InvalidName);
        assert_eq!(error.to_string(), "文件名不合法");

        assert_eq!(GatewayError::DialogCancelled.to_string(), "未选择目录");
    }
}
