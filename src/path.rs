// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine where articles, the metadata index, and the preference file live
//! relative to a content root, and turn user supplied article names into file
//! paths inside the articles directory.

use std::path::{Path, PathBuf};

/// Relative location of the articles directory inside a content root.
pub const ARTICLES_SEGMENTS: [&str; 2] = ["src", "articles"];

/// File name of the generated metadata index inside the articles directory.
pub const METADATA_FILE_NAME: &str = "metadata.js";

/// Extension every managed article carries.
pub const ARTICLE_EXTENSION: &str = ".md";

/// Determine absolute path to articles directory of a content root.
pub fn articles_dir(root: impl AsRef<Path>) -> PathBuf {
    ARTICLES_SEGMENTS
        .iter()
        .fold(root.as_ref().to_path_buf(), |path, segment| path.join(segment))
}

/// Articles directory relative to the content root with forward slashes.
///
/// This is the pathspec handed to git.
pub fn articles_pathspec() -> String {
    ARTICLES_SEGMENTS.join("/")
}

/// Determine absolute path to metadata index of a content root.
pub fn metadata_path(root: impl AsRef<Path>) -> PathBuf {
    articles_dir(root).join(METADATA_FILE_NAME)
}

/// Check that a directory looks like a content root.
pub async fn has_articles_dir(root: impl AsRef<Path>) -> bool {
    tokio::fs::metadata(articles_dir(root))
        .await
        .is_ok_and(|metadata| metadata.is_dir())
}

/// Determine default absolute path to the preference file.
///
/// Uses `$XDG_CONFIG_HOME/article-manager/preferences.toml` on Linux, and
/// the platform equivalent elsewhere. Does not check if the path returned
/// actually exists.
///
/// # Errors
///
/// - Return [`PathError::NoConfigDir`] if the configuration directory cannot
///   be determined.
pub fn default_preferences_path() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|path| path.join("article-manager").join("preferences.toml"))
        .ok_or(PathError::NoConfigDir)
}

/// Turn an article name into a file path inside the articles directory.
///
/// Backslashes are treated as forward slashes. Any name containing ".."
/// is refused outright, even when the dots are part of an otherwise harmless
/// file name like "a..b.md". The ".md" extension is appended if missing.
///
/// # Errors
///
/// - Return [`PathError::EmptyName`] if name is empty.
/// - Return [`PathError::Traversal`] if name contains "..".
pub fn to_article_path(articles_dir: impl AsRef<Path>, name: impl AsRef<str>) -> Result<PathBuf> {
    let name = name.as_ref();
    if name.is_empty() {
        return Err(PathError::EmptyName);
    }

    let normalized = name.replace('\\', "/");
    if normalized.contains("..") {
        return Err(PathError::Traversal { name: name.into() });
    }

    let final_name = if normalized.ends_with(ARTICLE_EXTENSION) {
        normalized
    } else {
        format!("{normalized}{ARTICLE_EXTENSION}")
    };

    // INVARIANT: Join segment by segment so a leading slash cannot replace the base.
    let path = final_name
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .fold(articles_dir.as_ref().to_path_buf(), |path, segment| {
            path.join(segment)
        });

    Ok(path)
}

/// Extract file name of path as owned string.
pub(crate) fn base_name(path: impl AsRef<Path>) -> String {
    path.as_ref()
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Path resolution error types.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// Configuration directory cannot be determined.
    #[error("cannot determine absolute path to user's configuration directory")]
    NoConfigDir,

    /// Article name is empty.
    #[error("文件名不能为空")]
    EmptyName,

    /// Article name contains a parent traversal.
    #[error("文件名不合法")]
    Traversal { name: String },
}

/// Friendly result alias :3
pub type Result<T, E = PathError> = std::result::Result<T, E>;
