// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Content root discovery.
//!
//! The __content root__ is the blog repository that holds the articles
//! directory at `src/articles`. Every file and git operation runs relative to
//! it, so it has to be found before anything useful can happen.
//!
//! # Discovery
//!
//! The manager can be launched from a development checkout, from an unpacked
//! release next to the blog, or from anywhere at all once the author picked a
//! directory by hand. Thus, discovery walks a ranked list of candidate
//! directories and settles on the first one that contains `src/articles`:
//!
//! 1. `BLOG_ROOT` environment override.
//! 2. Root remembered in the preference file.
//! 3. Current working directory.
//! 4. Application directory, its parent, and its grandparent.
//! 5. Parent and grandparent of the resource directory.
//! 6. Executable directory and its parent.
//!
//! Whatever root is found gets written back to the preference file, so later
//! runs short circuit to it.

use crate::{
    config::{blog_root_override, ConfigError, Preferences},
    path::has_articles_dir,
};

use std::{
    collections::HashSet,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard, PoisonError},
};
use tokio::fs::{create_dir_all, read_to_string, write};
use tracing::{debug, info, instrument, warn};

/// Places to look for a content root besides the preference file.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ResolutionContext {
    /// Explicit override, always tried first.
    pub override_root: Option<PathBuf>,

    /// Current working directory.
    pub cwd: Option<PathBuf>,

    /// Directory the application is installed in.
    pub app_dir: Option<PathBuf>,

    /// Directory holding bundled resources of a packaged install.
    pub resource_dir: Option<PathBuf>,

    /// Directory of the running executable.
    pub executable_dir: Option<PathBuf>,
}

impl ResolutionContext {
    /// Gather resolution context from the running process.
    ///
    /// # Errors
    ///
    /// - Return [`RootError::Config`] if the `BLOG_ROOT` override cannot be
    ///   expanded.
    pub fn from_process() -> Result<Self> {
        let executable_dir = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf));

        Ok(Self {
            override_root: blog_root_override()?,
            cwd: std::env::current_dir().ok(),
            app_dir: executable_dir.clone(),
            resource_dir: executable_dir.as_ref().map(|dir| dir.join("resources")),
            executable_dir,
        })
    }
}

/// Preference file on disk.
#[derive(Debug, Clone)]
pub struct PreferenceFile {
    path: PathBuf,
}

impl PreferenceFile {
    /// Construct new preference file handle.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load preferences.
    ///
    /// A missing file yields default preferences.
    ///
    /// # Errors
    ///
    /// - Return [`RootError::ReadPreferences`] if file cannot be read.
    /// - Return [`RootError::Config`] if file cannot be parsed.
    pub async fn load(&self) -> Result<Preferences> {
        match read_to_string(&self.path).await {
            Ok(content) => Ok(content.parse()?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Preferences::default()),
            Err(err) => Err(RootError::ReadPreferences {
                source: err,
                path: self.path.clone(),
            }),
        }
    }

    /// Save preferences.
    ///
    /// Creates parent directories of the preference file when missing.
    ///
    /// # Errors
    ///
    /// - Return [`RootError::WritePreferences`] if file cannot be written.
    pub async fn save(&self, preferences: &Preferences) -> Result<()> {
        let write_error = |err| RootError::WritePreferences {
            source: err,
            path: self.path.clone(),
        };

        if let Some(parent) = self.path.parent() {
            create_dir_all(parent).await.map_err(write_error)?;
        }

        write(&self.path, preferences.to_string())
            .await
            .map_err(write_error)
    }
}

/// Locate and remember the content root.
///
/// Owned once by the application and shared with every component that
/// touches files or spawns processes. The resolved root is cached for the
/// lifetime of the locator, and re-derived if the cached directory stops
/// looking like a content root.
#[derive(Debug)]
pub struct RootLocator {
    context: ResolutionContext,
    preferences: PreferenceFile,
    cached: Mutex<Option<PathBuf>>,
}

impl RootLocator {
    /// Construct new root locator.
    pub fn new(context: ResolutionContext, preferences: PreferenceFile) -> Self {
        Self {
            context,
            preferences,
            cached: Mutex::new(None),
        }
    }

    /// Ranked, deduplicated list of candidate content roots.
    pub async fn candidates(&self) -> Vec<PathBuf> {
        let remembered = match self.preferences.load().await {
            Ok(preferences) => preferences.blog_root,
            Err(error) => {
                warn!("ignore unreadable preference file: {error}");
                None
            }
        };

        let context = &self.context;
        let mut ranked = Vec::new();
        ranked.extend(context.override_root.clone());
        ranked.extend(remembered);
        ranked.extend(context.cwd.clone());
        if let Some(app_dir) = &context.app_dir {
            ranked.extend(lineage(app_dir, 2));
        }
        if let Some(resource_dir) = &context.resource_dir {
            ranked.extend(lineage(resource_dir, 2).into_iter().skip(1));
        }
        if let Some(executable_dir) = &context.executable_dir {
            ranked.extend(lineage(executable_dir, 1));
        }

        let mut seen = HashSet::new();
        ranked
            .into_iter()
            .filter(|candidate| !candidate.as_os_str().is_empty())
            .map(|candidate| absolutize(&candidate))
            .filter(|candidate| seen.insert(candidate.clone()))
            .collect()
    }

    /// Discover content root from scratch.
    ///
    /// Returns `None` if no candidate qualifies. A found root is cached and
    /// persisted.
    #[instrument(skip(self), level = "debug")]
    pub async fn resolve(&self) -> Option<PathBuf> {
        let mut found = None;
        for candidate in self.candidates().await {
            let qualifies = has_articles_dir(&candidate).await;
            debug!("candidate {:?} qualifies: {qualifies}", candidate.display());
            if qualifies {
                found = Some(candidate);
                break;
            }
        }

        match &found {
            Some(root) => {
                info!("using blog root {:?}", root.display());
                self.remember(root).await;
            }
            None => warn!("blog root could not be located"),
        }

        *self.lock() = found.clone();
        found
    }

    /// Current content root, resolving lazily.
    pub async fn current(&self) -> Option<PathBuf> {
        let cached = self.lock().clone();
        match cached {
            Some(root) if has_articles_dir(&root).await => Some(root),
            _ => self.resolve().await,
        }
    }

    /// Current content root for operations that cannot run without one.
    ///
    /// # Errors
    ///
    /// - Return [`RootError::Unresolved`] if no content root can be found.
    pub async fn require(&self) -> Result<PathBuf> {
        self.current().await.ok_or(RootError::Unresolved)
    }

    /// Make a directory chosen by the author the content root.
    ///
    /// # Errors
    ///
    /// - Return [`RootError::MissingArticles`] if chosen directory lacks an
    ///   articles directory.
    #[instrument(skip(self, dir), level = "debug")]
    pub async fn select(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let chosen = absolutize(dir.as_ref());
        if !has_articles_dir(&chosen).await {
            return Err(RootError::MissingArticles { path: chosen });
        }

        info!("select blog root {:?}", chosen.display());
        self.remember(&chosen).await;
        *self.lock() = Some(chosen.clone());

        Ok(chosen)
    }

    async fn remember(&self, root: &Path) {
        if let Err(error) = self.persist(root).await {
            warn!("cannot remember blog root: {error}");
        }
    }

    async fn persist(&self, root: &Path) -> Result<()> {
        let mut preferences = self.preferences.load().await?;
        if preferences.blog_root.as_deref() == Some(root) {
            return Ok(());
        }

        preferences.blog_root = Some(root.to_path_buf());
        self.preferences.save(&preferences).await
    }

    // INVARIANT: Guard never lives across an await point.
    fn lock(&self) -> MutexGuard<'_, Option<PathBuf>> {
        self.cached.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn lineage(path: &Path, depth: usize) -> Vec<PathBuf> {
    let path = absolutize(path);
    path.ancestors()
        .take(depth + 1)
        .map(Path::to_path_buf)
        .collect()
}

fn absolutize(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Content root discovery error types.
#[derive(Debug, thiserror::Error)]
pub enum RootError {
    /// No candidate directory contains an articles directory.
    #[error("博客根目录未配置")]
    Unresolved,

    /// Chosen directory is not a content root.
    #[error("选定目录下不存在 src/articles")]
    MissingArticles { path: PathBuf },

    /// Preference file cannot be read.
    #[error("failed to read preference file at {:?}", path.display())]
    ReadPreferences {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Preference file cannot be written.
    #[error("failed to write preference file at {:?}", path.display())]
    WritePreferences {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Preference file or override cannot be interpreted.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Friendly result alias :3
pub type Result<T, E = RootError> = std::result::Result<T, E>;
