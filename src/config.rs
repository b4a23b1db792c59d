// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the preference file that remembers which content
//! root the author last worked in. File I/O is left to the caller to figure
//! out.

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    path::PathBuf,
    str::FromStr,
};

/// Environment variable that forces a specific content root.
pub const BLOG_ROOT_ENV: &str = "BLOG_ROOT";

/// Persisted preferences.
///
/// Survives process restarts so the content root only has to be discovered
/// or selected once.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct Preferences {
    /// Last content root that was resolved or selected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blog_root: Option<PathBuf>,
}

impl FromStr for Preferences {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut preferences: Preferences =
            toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: An empty root is the same as no root at all.
        if preferences
            .blog_root
            .as_ref()
            .is_some_and(|root| root.as_os_str().is_empty())
        {
            preferences.blog_root = None;
        }

        Ok(preferences)
    }
}

impl Display for Preferences {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// Expand a user supplied path like "~/blog" or "$HOME/blog".
///
/// # Errors
///
/// - Return [`ConfigError::ShellExpansion`] if a referenced variable is unset.
pub fn expand_path(raw: impl AsRef<str>) -> Result<PathBuf> {
    let expanded = shellexpand::full(raw.as_ref().trim()).map_err(ConfigError::ShellExpansion)?;
    Ok(PathBuf::from(expanded.into_owned()))
}

/// Read content root override from the environment.
///
/// Returns `None` when the variable is unset or blank.
///
/// # Errors
///
/// - Return [`ConfigError::ShellExpansion`] if expansion of the value fails.
pub fn blog_root_override() -> Result<Option<PathBuf>> {
    match std::env::var(BLOG_ROOT_ENV) {
        Ok(value) if !value.trim().is_empty() => expand_path(value).map(Some),
        _ => Ok(None),
    }
}

/// Configuration error types.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;
