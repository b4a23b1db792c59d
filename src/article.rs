// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Markdown article management.
//!
//! Articles are plain Markdown files living directly inside the articles
//! directory of the content root. They are addressed by base name, e.g.,
//! "regex.md", where the ".md" extension may be left off by the caller.

use crate::{
    metadata::MetadataStore,
    path::{articles_dir, base_name, to_article_path, PathError, ARTICLE_EXTENSION},
    root::{RootError, RootLocator},
};

use serde::Serialize;
use std::{cmp::Ordering, future::Future, io::ErrorKind, path::PathBuf, sync::Arc};
use tracing::{debug, info, instrument, warn};

/// Ask the author to approve a destructive action.
pub trait Confirm: Send + Sync {
    /// Present question, and resolve to the author's decision.
    fn confirm(&self, question: &str) -> impl Future<Output = bool> + Send;
}

/// Article read from disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Article {
    /// Base name of article file.
    pub name: String,

    /// Markdown content.
    pub content: String,
}

/// CRUD access to Markdown articles of the current content root.
#[derive(Debug, Clone)]
pub struct ArticleRepository {
    root: Arc<RootLocator>,
    metadata: MetadataStore,
}

impl ArticleRepository {
    /// Construct new article repository.
    pub fn new(root: Arc<RootLocator>, metadata: MetadataStore) -> Self {
        Self { root, metadata }
    }

    /// List names of all articles.
    ///
    /// Only regular files ending in ".md" directly inside the articles
    /// directory count. Names are ordered case-insensitively, with exact
    /// byte order breaking ties.
    ///
    /// # Errors
    ///
    /// - Return [`ArticleError::Root`] if content root is unresolved.
    /// - Return [`ArticleError::ReadDir`] if articles directory is unreadable.
    pub async fn list_names(&self) -> Result<Vec<String>> {
        let dir = articles_dir(self.root.require().await?);
        let read_dir_error = |err| ArticleError::ReadDir {
            source: err,
            path: dir.clone(),
        };

        let mut reader = tokio::fs::read_dir(&dir).await.map_err(read_dir_error)?;
        let mut names = Vec::new();
        while let Some(entry) = reader.next_entry().await.map_err(read_dir_error)? {
            let is_file = entry
                .file_type()
                .await
                .map(|kind| kind.is_file())
                .unwrap_or(false);
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_file && name.ends_with(ARTICLE_EXTENSION) {
                names.push(name);
            }
        }
        names.sort_by(|lhs, rhs| collate(lhs, rhs));
        debug!("articles: {names:?}");

        Ok(names)
    }

    /// Read an article.
    ///
    /// # Errors
    ///
    /// - Return [`ArticleError::InvalidName`] if name is empty or unsafe.
    /// - Return [`ArticleError::NotFound`] if article does not exist.
    /// - Return [`ArticleError::Read`] if article cannot be read as text.
    pub async fn read(&self, name: &str) -> Result<Article> {
        let path = self.article_path(name).await?;
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(ArticleError::NotFound {
                    name: base_name(&path),
                })
            }
            Err(err) => return Err(ArticleError::Read { source: err, path }),
        };

        Ok(Article {
            name: base_name(&path),
            content,
        })
    }

    /// Create or overwrite an article.
    ///
    /// Returns base name of the written file.
    ///
    /// # Errors
    ///
    /// - Return [`ArticleError::WrongType`] if content is not UTF-8 text.
    /// - Return [`ArticleError::InvalidName`] if name is empty or unsafe.
    /// - Return [`ArticleError::Write`] if article cannot be written.
    #[instrument(skip(self, content), level = "debug")]
    pub async fn save(&self, name: &str, content: impl AsRef<[u8]>) -> Result<String> {
        let content = std::str::from_utf8(content.as_ref()).map_err(|_| ArticleError::WrongType)?;
        let path = self.article_path(name).await?;
        tokio::fs::write(&path, content)
            .await
            .map_err(|err| ArticleError::Write {
                source: err,
                path: path.clone(),
            })?;
        info!("saved article {:?}", path.display());

        Ok(base_name(&path))
    }

    /// Delete an article once the author confirms.
    ///
    /// Returns `false` without touching anything if the author declines.
    /// Metadata entries pointing at the article are dropped on a best effort
    /// basis, where failing to do so is logged but does not stop the delete.
    ///
    /// # Errors
    ///
    /// - Return [`ArticleError::InvalidName`] if name is empty or unsafe.
    /// - Return [`ArticleError::NotFound`] if article does not exist.
    /// - Return [`ArticleError::Remove`] if article cannot be removed.
    #[instrument(skip(self, confirm), level = "debug")]
    pub async fn delete(&self, name: &str, confirm: &impl Confirm) -> Result<bool> {
        let path = self.article_path(name).await?;
        let file = base_name(&path);
        if !confirm.confirm(&format!("确认删除 {file}?")).await {
            debug!("delete of {file:?} declined");
            return Ok(false);
        }

        if let Err(error) = self.metadata.remove_file(&file).await {
            warn!("failed to remove metadata for deleted article: {error}");
        }

        tokio::fs::remove_file(&path).await.map_err(|err| match err.kind() {
            ErrorKind::NotFound => ArticleError::NotFound { name: file.clone() },
            _ => ArticleError::Remove {
                source: err,
                path: path.clone(),
            },
        })?;
        info!("deleted article {:?}", path.display());

        Ok(true)
    }

    async fn article_path(&self, name: &str) -> Result<PathBuf> {
        let dir = articles_dir(self.root.require().await?);
        Ok(to_article_path(dir, name)?)
    }
}

// Case-insensitive code point order. Accented Latin letters sort after "z",
// and CJK names sort by code point rather than by pronunciation.
fn collate(lhs: &str, rhs: &str) -> Ordering {
    lhs.to_lowercase()
        .cmp(&rhs.to_lowercase())
        .then_with(|| lhs.cmp(rhs))
}

/// Article management error types.
#[derive(Debug, thiserror::Error)]
pub enum ArticleError {
    /// Content root is unavailable.
    #[error(transparent)]
    Root(#[from] RootError),

    /// Article name is empty or unsafe.
    #[error(transparent)]
    InvalidName(#[from] PathError),

    /// Article does not exist.
    #[error("文章不存在: {name}")]
    NotFound { name: String },

    /// Article content is not text.
    #[error("文章内容必须是文本")]
    WrongType,

    /// Articles directory cannot be listed.
    #[error("failed to read articles directory at {:?}", path.display())]
    ReadDir {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Article cannot be read.
    #[error("failed to read article at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Article cannot be written.
    #[error("failed to write article at {:?}", path.display())]
    Write {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Article cannot be removed.
    #[error("failed to remove article at {:?}", path.display())]
    Remove {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = ArticleError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        metadata::MetadataEntry,
        path::metadata_path,
        root::{PreferenceFile, ResolutionContext},
    };
    use pretty_assertions::assert_eq;
    use std::{fs, sync::Mutex};
    use tempfile::{tempdir, TempDir};

    struct Answer {
        decision: bool,
        asked: Mutex<Vec<String>>,
    }

    impl Answer {
        fn new(decision: bool) -> Self {
            Self {
                decision,
                asked: Mutex::new(Vec::new()),
            }
        }
    }

    impl Confirm for Answer {
        async fn confirm(&self, question: &str) -> bool {
            self.asked.lock().unwrap().push(question.into());
            self.decision
        }
    }

    fn repository() -> (TempDir, ArticleRepository) {
        let temp = tempdir().unwrap();
        fs::create_dir_all(articles_dir(temp.path())).unwrap();
        let root = Arc::new(RootLocator::new(
            ResolutionContext {
                override_root: Some(temp.path().to_path_buf()),
                ..ResolutionContext::default()
            },
            PreferenceFile::new(temp.path().join("preferences.toml")),
        ));
        let metadata = MetadataStore::new(root.clone());

        (temp, ArticleRepository::new(root, metadata))
    }

    fn entry(id: &str, file: &str) -> MetadataEntry {
        MetadataEntry {
            id: id.into(),
            title: id.into(),
            file: file.into(),
            ..MetadataEntry::default()
        }
    }

    #[tokio::test]
    async fn list_names_sorted_markdown_files_only() -> anyhow::Result<()> {
        let (temp, repo) = repository();
        let dir = articles_dir(temp.path());
        for name in ["b.md", "a.md", "Zebra.md", "notes.txt", "metadata.js"] {
            fs::write(dir.join(name), "")?;
        }
        fs::create_dir(dir.join("drafts.md"))?;

        let result = repo.list_names().await?;
        assert_eq!(result, vec!["a.md", "b.md", "Zebra.md"]);
        Ok(())
    }

    #[test]
    fn collate_non_ascii_by_code_point() {
        let mut names = vec!["正则表达式.md", "Éclair.md", "zebra.md", "中文.md", "post.md", "Post.md"];
        names.sort_by(|lhs, rhs| collate(lhs, rhs));
        assert_eq!(
            names,
            vec!["Post.md", "post.md", "zebra.md", "Éclair.md", "中文.md", "正则表达式.md"]
        );
    }

    #[tokio::test]
    async fn save_then_read_same_file() -> anyhow::Result<()> {
        let (temp, repo) = repository();

        assert_eq!(repo.save("hello", "# Hello\n").await?, "hello.md");
        let result = repo.read("hello.md").await?;
        let expect = Article {
            name: "hello.md".into(),
            content: "# Hello\n".into(),
        };
        assert_eq!(result, expect);
        assert!(articles_dir(temp.path()).join("hello.md").is_file());
        Ok(())
    }

    #[tokio::test]
    async fn read_missing_article() {
        let (_temp, repo) = repository();
        let result = repo.read("ghost").await;
        assert!(matches!(result, Err(ArticleError::NotFound { name }) if name == "ghost.md"));
    }

    #[tokio::test]
    async fn save_rejects_binary_content_and_bad_names() {
        let (_temp, repo) = repository();

        let result = repo.save("bin", vec![0xffu8, 0xfe, 0x00]).await;
        assert!(matches!(result, Err(ArticleError::WrongType)));

        let result = repo.save("a..b.md", "text").await;
        assert!(matches!(
            result,
            Err(ArticleError::InvalidName(PathError::Traversal { .. }))
        ));

        let result = repo.save("", "text").await;
        assert!(matches!(result, Err(ArticleError::InvalidName(PathError::EmptyName))));
    }

    #[tokio::test]
    async fn delete_declined_leaves_everything() -> anyhow::Result<()> {
        let (temp, repo) = repository();
        repo.save("keep", "content").await?;
        repo.metadata.write(&[entry("keep", "keep.md")]).await?;

        let answer = Answer::new(false);
        assert!(!repo.delete("keep", &answer).await?);
        assert_eq!(*answer.asked.lock().unwrap(), vec!["确认删除 keep.md?".to_string()]);
        assert!(articles_dir(temp.path()).join("keep.md").exists());
        assert_eq!(repo.metadata.list().await?, vec![entry("keep", "keep.md")]);
        Ok(())
    }

    #[tokio::test]
    async fn delete_confirmed_drops_file_and_metadata() -> anyhow::Result<()> {
        let (temp, repo) = repository();
        repo.save("gone", "content").await?;
        repo.metadata
            .write(&[entry("gone", "gone.md"), entry("stay", "stay.md")])
            .await?;

        assert!(repo.delete("gone.md", &Answer::new(true)).await?);
        assert!(!articles_dir(temp.path()).join("gone.md").exists());
        assert_eq!(repo.metadata.list().await?, vec![entry("stay", "stay.md")]);
        Ok(())
    }

    #[tokio::test]
    async fn delete_survives_broken_metadata() -> anyhow::Result<()> {
        let (temp, repo) = repository();
        repo.save("gone", "content").await?;
        fs::write(metadata_path(temp.path()), "this is not a module")?;

        assert!(repo.delete("gone", &Answer::new(true)).await?);
        assert!(!articles_dir(temp.path()).join("gone.md").exists());
        Ok(())
    }

    #[tokio::test]
    async fn delete_missing_article() {
        let (_temp, repo) = repository();
        let result = repo.delete("ghost", &Answer::new(true)).await;
        assert!(matches!(result, Err(ArticleError::NotFound { .. })));
    }
}
