//! Service configuration (_config.yml)

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration file name, relative to the base directory
pub const CONFIG_FILE: &str = "_config.yml";

/// Environment variable overriding `repo_path`
pub const REPO_PATH_ENV: &str = "GIT_REPO_PATH";

/// Main service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Content repository, relative paths resolve against the base directory
    pub repo_path: PathBuf,

    /// What to do when a new post's identifier is already taken
    pub collision: CollisionPolicy,

    #[serde(default)]
    pub publish: PublishConfig,

    /// Commit identity; falls back to the repository's git config
    pub author: Option<CommitAuthor>,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub events: EventsConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            repo_path: PathBuf::from("content"),
            collision: CollisionPolicy::default(),
            publish: PublishConfig::default(),
            author: None,
            server: ServerConfig::default(),
            events: EventsConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let config: ServiceConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load `_config.yml` from `base_dir` (defaults when absent), apply the
    /// `GIT_REPO_PATH` override and validate.
    pub fn load_dir<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let config_path = base_dir.as_ref().join(CONFIG_FILE);

        let mut config = if config_path.exists() {
            tracing::debug!("Loading configuration from {:?}", config_path);
            Self::load(&config_path)?
        } else {
            tracing::debug!("No {} found, using defaults", CONFIG_FILE);
            Self::default()
        };

        config.apply_repo_override(std::env::var(REPO_PATH_ENV).ok());
        config.validate()?;
        Ok(config)
    }

    /// Replace `repo_path` with a non-empty override
    pub fn apply_repo_override(&mut self, repo_path: Option<String>) {
        if let Some(path) = repo_path.filter(|p| !p.trim().is_empty()) {
            tracing::info!("Overriding repo_path with {}", REPO_PATH_ENV);
            self.repo_path = PathBuf::from(path);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.repo_path.as_os_str().is_empty() {
            bail!(
                "repo_path is required in {} or via {}",
                CONFIG_FILE,
                REPO_PATH_ENV
            );
        }
        Ok(())
    }

    /// Absolute repository path for a base directory
    pub fn repo_dir(&self, base_dir: &Path) -> PathBuf {
        if self.repo_path.is_absolute() {
            self.repo_path.clone()
        } else {
            base_dir.join(&self.repo_path)
        }
    }
}

/// Policy for a new post whose identifier already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollisionPolicy {
    /// Append `-2`, `-3`, ... to the slug until it is free
    #[default]
    Suffix,
    /// Refuse to create the post
    Reject,
}

/// How committed changes are published
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishStrategy {
    /// Keep commits local
    #[default]
    Local,
    /// Push the current branch to the remote
    Direct,
    /// Push each change to a fresh remote branch, merged by an external hook
    Branch,
}

/// Publish configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    pub strategy: PublishStrategy,
    pub remote: String,
    pub branch_prefix: String,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            strategy: PublishStrategy::default(),
            remote: "origin".to_string(),
            branch_prefix: "post-".to_string(),
        }
    }
}

/// Git commit identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitAuthor {
    pub name: String,
    pub email: String,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub ip: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ip: "localhost".to_string(),
            port: 8080,
        }
    }
}

/// Post event queue configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Events buffered before new ones are dropped
    pub capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self { capacity: 64 }
    }
}
