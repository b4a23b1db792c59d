// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Manage the Markdown articles of a static blog.
//!
//! A blog is a repository whose __content root__ holds an `src/articles`
//! directory. That directory contains one Markdown file per article, and a
//! metadata index named "metadata.js" that the blog's own site generator
//! reads. This library edits both, and publishes the result by committing
//! and pushing through git, followed by the blog's npm build and deploy
//! scripts.
//!
//! Every component works against one shared [`RootLocator`], and every
//! named operation a user interface may request goes through [`Gateway`].

pub mod article;
pub mod config;
pub mod gateway;
pub mod metadata;
pub mod path;
pub mod pipeline;
pub mod root;

pub use article::{Article, ArticleRepository, Confirm};
pub use gateway::{ErrorKind, Gateway, GatewayError, Operation, PickDirectory, Reply};
pub use metadata::{MetadataEntry, MetadataStore};
pub use pipeline::{
    deploy::{DeployPipeline, ScriptCommand},
    git::GitPipeline,
    runner::{CommandOutput, CommandRunner, Invocation, SystemRunner},
};
pub use root::{PreferenceFile, ResolutionContext, RootLocator};
