// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Commit message derivation.
//!
//! Turn `git status --porcelain` output into a short summary of which
//! articles were created, modified, or deleted, e.g., "新建intro、修改regex".
//!
//! This is a heuristic over another tool's output. Each status
//! line is reduced to an article name and a verb:
//!
//! - Markdown files give their name without ".md".
//! - The metadata index carries no article name of its own, so the caller's
//!   hint stands in for it. Without a hint the line is dropped.
//! - Anything else gives its base name without extension, or the hint if
//!   nothing remains, or the raw base name as last resort.
//!
//! Status codes holding "?" or "A" mean new, "D" means deleted, and
//! everything else means modified.

use crate::path::{ARTICLE_EXTENSION, METADATA_FILE_NAME};

use std::collections::HashSet;

/// Separator between summary segments.
pub const SEGMENT_SEPARATOR: &str = "、";

/// Verb for untracked or added files.
pub const VERB_NEW: &str = "新建";

/// Verb for modified files.
pub const VERB_MODIFIED: &str = "修改";

/// Verb for deleted files.
pub const VERB_DELETED: &str = "删除";

/// Derive commit message from porcelain status output.
///
/// Returns an empty string if there is nothing to summarize.
pub fn derive(status: &str, article_hint: Option<&str>) -> String {
    let hint = article_hint.map(normalize_article_name).unwrap_or_default();
    let mut segments: Vec<String> = Vec::new();

    for line in status
        .split(['\r', '\n'])
        .map(str::trim)
        .filter(|line| !line.is_empty())
    {
        let (code, path) = split_status_line(line);
        let path = resolve_path(path);
        if path.is_empty() {
            continue;
        }

        let base = file_base_name(&path);
        let is_metadata = base.to_lowercase() == METADATA_FILE_NAME;

        let mut article = base
            .strip_suffix(ARTICLE_EXTENSION)
            .unwrap_or_default()
            .to_string();
        if article.is_empty() && !is_metadata {
            article = strip_extension(&base).to_string();
        }
        if (article.is_empty() || is_metadata) && !hint.is_empty() {
            article = hint.clone();
        }
        if article.is_empty() {
            if is_metadata {
                continue;
            }
            article = base.clone();
        }

        let segment = format!("{}{article}", verb(code));
        if is_metadata && segments.contains(&segment) {
            continue;
        }
        segments.push(segment);
    }

    let mut seen = HashSet::new();
    segments.retain(|segment| seen.insert(segment.clone()));
    segments.join(SEGMENT_SEPARATOR)
}

/// Reduce a file reference to a bare article name.
///
/// Returns an empty string for blank input and for the metadata index.
pub fn normalize_article_name(value: &str) -> String {
    let cleaned = value.replace('\\', "/");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return String::new();
    }

    let base = match cleaned.rsplit('/').next() {
        Some(last) if !last.is_empty() => last,
        _ => cleaned,
    };
    if base.to_lowercase() == METADATA_FILE_NAME {
        return String::new();
    }

    base.strip_suffix(ARTICLE_EXTENSION)
        .unwrap_or(base)
        .to_string()
}

// Porcelain lines look like "XY path", but the line arrives trimmed, so an
// unstaged change " M path" shows up as "M path". Take the two character
// code, and whatever follows it without the separating blanks.
fn split_status_line(line: &str) -> (&str, &str) {
    match line.char_indices().nth(2) {
        Some((index, _)) => (&line[..index], line[index..].trim()),
        None => (line, ""),
    }
}

fn resolve_path(path: &str) -> String {
    let mut path = path;
    if path.contains("->") {
        // INVARIANT: Renames resolve to the new path.
        path = path.split("->").nth(1).unwrap_or(path).trim();
    }

    let unquoted = path
        .strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(path);

    unquoted.to_string()
}

fn file_base_name(path: &str) -> String {
    let trimmed = path.trim_end_matches(['/', '\\']);
    trimmed
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(trimmed)
        .to_string()
}

// Drop a trailing ".ext" where ext is non-empty.
fn strip_extension(base: &str) -> &str {
    match base.rfind('.') {
        Some(index) if index + 1 < base.len() => &base[..index],
        _ => base,
    }
}

fn verb(code: &str) -> &'static str {
    if code.contains('?') || code.contains('A') {
        VERB_NEW
    } else if code.contains('D') {
        VERB_DELETED
    } else {
        VERB_MODIFIED
    }
}
