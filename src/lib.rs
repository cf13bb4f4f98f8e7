//! micropub-rs: a Micropub server storing posts in a git repository
//!
//! Posts are frontmatter-annotated text files, one per post, named
//! `{YYYY-MM-DD}-{slug}.md`. Every create, update and delete is staged,
//! committed and published through a [`store::VersionedBackend`].

pub mod commands;
pub mod config;
pub mod content;
pub mod error;
pub mod events;
pub mod server;
pub mod store;

pub use error::{BackendError, StoreError};

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use store::{ContentStore, GitBackend};

/// The main application
#[derive(Debug, Clone)]
pub struct Micropub {
    /// Service configuration
    pub config: config::ServiceConfig,
    /// Base directory
    pub base_dir: PathBuf,
    /// Content repository
    pub repo_dir: PathBuf,
}

impl Micropub {
    /// Create a new instance from a directory
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        let config = config::ServiceConfig::load_dir(&base_dir)?;
        Ok(Self::with_config(base_dir, config))
    }

    /// Create an instance from an already loaded configuration
    pub fn with_config(base_dir: PathBuf, config: config::ServiceConfig) -> Self {
        let repo_dir = config.repo_dir(&base_dir);
        Self {
            config,
            base_dir,
            repo_dir,
        }
    }

    /// Git backend for the content repository
    pub fn backend(&self) -> GitBackend {
        GitBackend::from_config(self.repo_dir.clone(), &self.config)
    }

    /// Content store over the git backend
    pub fn store(&self) -> ContentStore {
        ContentStore::new(Arc::new(self.backend())).with_collision_policy(self.config.collision)
    }

    /// Initialize the content repository
    pub fn init(&self) -> Result<()> {
        commands::init::run(self)
    }

    /// Delete a post
    pub fn delete_post(&self, url: &str) -> Result<()> {
        commands::delete::run(self, url)
    }
}
