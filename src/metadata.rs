// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Article metadata index.
//!
//! Next to the articles lives a generated __metadata index__ listing the
//! descriptive record of every published article. The blog's site generator
//! reads it to render article cards, so its textual layout is part of the
//! contract (see [`codec`]).
//!
//! The index is read fresh on every query, and rewritten wholesale on every
//! mutation. Entries and article files are loosely coupled: an entry may
//! name a file that does not exist, and a file may have no entry.

pub mod codec;

use crate::{
    metadata::codec::CodecError,
    path::metadata_path,
    root::{RootError, RootLocator},
};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{io::ErrorKind, path::PathBuf, sync::Arc};
use tracing::{info, instrument};

/// Field order of every rendered entry.
pub const METADATA_FIELDS: [&str; 7] = [
    "id", "title", "date", "author", "readTime", "summary", "file",
];

/// Descriptive record of one article.
#[derive(Default, Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataEntry {
    pub id: String,
    pub title: String,
    pub date: String,
    pub author: String,
    pub read_time: String,
    pub summary: String,
    pub file: String,
}

impl MetadataEntry {
    /// Build entry from a loosely typed payload.
    ///
    /// Fields that are missing or not strings become empty strings.
    ///
    /// # Errors
    ///
    /// - Return [`MetadataError::EmptyPayload`] if payload is not an object.
    pub fn from_payload(payload: &Value) -> Result<Self> {
        let Value::Object(map) = payload else {
            return Err(MetadataError::EmptyPayload);
        };

        let mut entry = Self::default();
        for field in METADATA_FIELDS {
            if let (Some(slot), Some(Value::String(value))) = (entry.field_mut(field), map.get(field)) {
                *slot = value.clone();
            }
        }

        Ok(entry)
    }

    /// Field name and value pairs in rendering order.
    pub fn fields(&self) -> [(&'static str, &str); 7] {
        [
            ("id", &self.id),
            ("title", &self.title),
            ("date", &self.date),
            ("author", &self.author),
            ("readTime", &self.read_time),
            ("summary", &self.summary),
            ("file", &self.file),
        ]
    }

    /// Mutable access to a field by its rendered name.
    pub fn field_mut(&mut self, name: &str) -> Option<&mut String> {
        match name {
            "id" => Some(&mut self.id),
            "title" => Some(&mut self.title),
            "date" => Some(&mut self.date),
            "author" => Some(&mut self.author),
            "readTime" => Some(&mut self.read_time),
            "summary" => Some(&mut self.summary),
            "file" => Some(&mut self.file),
            _ => None,
        }
    }

    /// Trim surrounding whitespace of every field.
    pub fn trimmed(mut self) -> Self {
        for field in METADATA_FIELDS {
            if let Some(slot) = self.field_mut(field) {
                let trimmed = slot.trim();
                if trimmed.len() != slot.len() {
                    *slot = trimmed.to_string();
                }
            }
        }

        self
    }

    /// Check that required fields are filled in.
    ///
    /// # Errors
    ///
    /// - Return [`MetadataError::MissingId`] if id is empty.
    /// - Return [`MetadataError::MissingTitle`] if title is empty.
    /// - Return [`MetadataError::MissingFile`] if file is empty.
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(MetadataError::MissingId);
        }

        if self.title.is_empty() {
            return Err(MetadataError::MissingTitle);
        }

        if self.file.is_empty() {
            return Err(MetadataError::MissingFile);
        }

        Ok(())
    }
}

/// Read and rewrite the metadata index of the current content root.
#[derive(Debug, Clone)]
pub struct MetadataStore {
    root: Arc<RootLocator>,
}

impl MetadataStore {
    /// Construct new metadata store.
    pub fn new(root: Arc<RootLocator>) -> Self {
        Self { root }
    }

    /// List all entries in index order.
    ///
    /// Returns an empty listing if the index does not exist yet.
    ///
    /// # Errors
    ///
    /// - Return [`MetadataError::Root`] if content root is unresolved.
    /// - Return [`MetadataError::Read`] if index cannot be read.
    /// - Return [`MetadataError::Parse`] if index is malformed.
    pub async fn list(&self) -> Result<Vec<MetadataEntry>> {
        let path = self.path().await?;
        let source = match tokio::fs::read_to_string(&path).await {
            Ok(source) => source,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(MetadataError::Read { source: err, path }),
        };

        Ok(codec::parse(&source)?)
    }

    /// Insert or replace an entry.
    ///
    /// The entry is trimmed and validated first. An existing entry with the
    /// same file or the same id is replaced in place, where the first match
    /// in index order wins. Otherwise the entry is appended.
    ///
    /// # Errors
    ///
    /// - Return [`MetadataError::MissingId`], [`MetadataError::MissingTitle`],
    ///   or [`MetadataError::MissingFile`] if a required field is empty.
    /// - Return any error of [`MetadataStore::list`] or
    ///   [`MetadataStore::write`].
    #[instrument(skip(self, entry), level = "debug")]
    pub async fn upsert(&self, entry: MetadataEntry) -> Result<MetadataEntry> {
        let entry = entry.trimmed();
        entry.validate()?;

        let mut entries = self.list().await?;
        match entries
            .iter()
            .position(|item| item.file == entry.file || item.id == entry.id)
        {
            Some(index) => {
                info!("replace metadata entry {:?}", entry.id);
                entries[index] = entry.clone();
            }
            None => {
                info!("add metadata entry {:?}", entry.id);
                entries.push(entry.clone());
            }
        }
        self.write(&entries).await?;

        Ok(entry)
    }

    /// Drop every entry pointing at given article file.
    ///
    /// Only rewrites the index if something was actually removed. Returns
    /// whether anything was removed.
    ///
    /// # Errors
    ///
    /// - Return any error of [`MetadataStore::list`] or
    ///   [`MetadataStore::write`].
    #[instrument(skip(self), level = "debug")]
    pub async fn remove_file(&self, file: &str) -> Result<bool> {
        let mut entries = self.list().await?;
        let before = entries.len();
        entries.retain(|entry| entry.file != file);
        if entries.len() == before {
            return Ok(false);
        }

        info!("remove metadata of {file:?}");
        self.write(&entries).await?;

        Ok(true)
    }

    /// Replace the whole index with given entries.
    ///
    /// # Errors
    ///
    /// - Return [`MetadataError::Root`] if content root is unresolved.
    /// - Return [`MetadataError::Write`] if index cannot be written.
    pub async fn write(&self, entries: &[MetadataEntry]) -> Result<()> {
        let path = self.path().await?;
        tokio::fs::write(&path, codec::format(entries))
            .await
            .map_err(|err| MetadataError::Write { source: err, path })
    }

    async fn path(&self) -> Result<PathBuf> {
        Ok(metadata_path(self.root.require().await?))
    }
}

/// Metadata index error types.
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    /// Content root is unavailable.
    #[error(transparent)]
    Root(#[from] RootError),

    /// Payload is not an object.
    #[error("元数据为空")]
    EmptyPayload,

    /// Id field is empty.
    #[error("请填写文章 ID")]
    MissingId,

    /// Title field is empty.
    #[error("请填写文章标题")]
    MissingTitle,

    /// File field is empty.
    #[error("请填写文章文件名")]
    MissingFile,

    /// Index is malformed.
    #[error("解析 metadata 失败: {0}")]
    Parse(#[from] CodecError),

    /// Index cannot be read.
    #[error("解析 metadata 失败: cannot read {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Index cannot be written.
    #[error("failed to write metadata index at {:?}", path.display())]
    Write {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = MetadataError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::root::{PreferenceFile, ResolutionContext};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::{tempdir, TempDir};

    fn store() -> (TempDir, MetadataStore) {
        let temp = tempdir().unwrap();
        std::fs::create_dir_all(temp.path().join("src").join("articles")).unwrap();
        let root = RootLocator::new(
            ResolutionContext {
                override_root: Some(temp.path().to_path_buf()),
                ..ResolutionContext::default()
            },
            PreferenceFile::new(temp.path().join("preferences.toml")),
        );

        (temp, MetadataStore::new(Arc::new(root)))
    }

    fn entry(id: &str, file: &str) -> MetadataEntry {
        MetadataEntry {
            id: id.into(),
            title: format!("{id} title"),
            file: file.into(),
            ..MetadataEntry::default()
        }
    }

    #[tokio::test]
    async fn list_missing_index_is_empty() -> anyhow::Result<()> {
        let (_temp, store) = store();
        assert_eq!(store.list().await?, Vec::new());
        Ok(())
    }

    #[tokio::test]
    async fn list_malformed_index_fails() -> anyhow::Result<()> {
        let (temp, store) = store();
        std::fs::write(metadata_path(temp.path()), "export const articlesMeta = 42\n")?;

        let result = store.list().await;
        assert!(matches!(result, Err(MetadataError::Parse(CodecError::NotArray))));
        Ok(())
    }

    #[tokio::test]
    async fn upsert_appends_new_entries() -> anyhow::Result<()> {
        let (_temp, store) = store();
        store.upsert(entry("a", "a.md")).await?;
        store.upsert(entry("b", "b.md")).await?;

        assert_eq!(store.list().await?, vec![entry("a", "a.md"), entry("b", "b.md")]);
        Ok(())
    }

    #[tokio::test]
    async fn upsert_replaces_in_place_by_file_or_id() -> anyhow::Result<()> {
        let (_temp, store) = store();
        store.write(&[entry("a", "a.md"), entry("b", "b.md"), entry("c", "c.md")]).await?;

        store.upsert(entry("renamed", "b.md")).await?;
        store.upsert(entry("c", "moved.md")).await?;

        let expect = vec![entry("a", "a.md"), entry("renamed", "b.md"), entry("c", "moved.md")];
        assert_eq!(store.list().await?, expect);
        Ok(())
    }

    #[tokio::test]
    async fn upsert_first_match_wins() -> anyhow::Result<()> {
        let (_temp, store) = store();
        store.write(&[entry("a", "a.md"), entry("b", "b.md")]).await?;

        // Matches "a" by id and "b" by file, so only "a" is replaced.
        store.upsert(entry("a", "b.md")).await?;

        let expect = vec![entry("a", "b.md"), entry("b", "b.md")];
        assert_eq!(store.list().await?, expect);
        Ok(())
    }

    #[tokio::test]
    async fn upsert_trims_and_round_trips_escapes() -> anyhow::Result<()> {
        let (_temp, store) = store();
        let mut input = entry("  tricky ", " tricky.md\n");
        input.summary = "  a \\ b ' c\r\nd\te  ".into();

        let saved = store.upsert(input).await?;
        let expect = MetadataEntry {
            id: "tricky".into(),
            title: "tricky  title".into(),
            summary: "a \\ b ' c\r\nd\te".into(),
            file: "tricky.md".into(),
            ..MetadataEntry::default()
        };
        assert_eq!(saved, expect);
        assert_eq!(store.list().await?, vec![expect]);
        Ok(())
    }

    #[tokio::test]
    async fn upsert_requires_fields_in_order() {
        let (_temp, store) = store();

        let result = store.upsert(MetadataEntry::default()).await;
        assert!(matches!(result, Err(MetadataError::MissingId)));

        let result = store.upsert(entry("a", "a.md").with_title("  ")).await;
        assert!(matches!(result, Err(MetadataError::MissingTitle)));

        let result = store.upsert(entry("a", "")).await;
        assert!(matches!(result, Err(MetadataError::MissingFile)));

        assert_eq!(store.list().await.unwrap(), Vec::new());
    }

    #[tokio::test]
    async fn remove_file_only_rewrites_on_change() -> anyhow::Result<()> {
        let (temp, store) = store();
        store.write(&[entry("a", "a.md"), entry("b", "b.md")]).await?;

        assert!(store.remove_file("a.md").await?);
        assert_eq!(store.list().await?, vec![entry("b", "b.md")]);

        std::fs::write(metadata_path(temp.path()), "export const articlesMeta = [ { id: 'b', file: 'b.md' } ]")?;
        assert!(!store.remove_file("missing.md").await?);
        let untouched = std::fs::read_to_string(metadata_path(temp.path()))?;
        assert_eq!(untouched, "export const articlesMeta = [ { id: 'b', file: 'b.md' } ]");
        Ok(())
    }

    #[test]
    fn from_payload_coerces_non_strings() -> anyhow::Result<()> {
        let payload = json!({
            "id": "a",
            "title": 42,
            "readTime": "3 min read",
            "file": null,
            "extra": "ignored"
        });

        let result = MetadataEntry::from_payload(&payload)?;
        let expect = MetadataEntry {
            id: "a".into(),
            read_time: "3 min read".into(),
            ..MetadataEntry::default()
        };
        assert_eq!(result, expect);

        let result = MetadataEntry::from_payload(&json!("nope"));
        assert!(matches!(result, Err(MetadataError::EmptyPayload)));
        Ok(())
    }

    impl MetadataEntry {
        fn with_title(mut self, title: &str) -> Self {
            self.title = title.into();
            self
        }
    }
}
