//! Initialize a Micropub content directory

use anyhow::Result;
use std::fs;
use std::path::Path;

use crate::config::CONFIG_FILE;
use crate::Micropub;

const DEFAULT_CONFIG: &str = r#"# micropub-rs configuration

# Content repository, relative to this file (GIT_REPO_PATH overrides it)
repo_path: content

# What to do when a new post's file name is taken: suffix | reject
collision: suffix

# How commits leave this machine: local | direct | branch
publish:
  strategy: local
  remote: origin
  branch_prefix: post-

# Commit identity; defaults to the repository's git config
# author:
#   name: Jane Doe
#   email: jane@example.com

server:
  ip: localhost
  port: 8080

events:
  capacity: 64
"#;

/// Initialize a content directory in `target_dir`.
///
/// Writes a default `_config.yml` unless one exists, then creates the
/// content repository.
pub fn init_dir(target_dir: &Path) -> Result<Micropub> {
    fs::create_dir_all(target_dir)?;

    let config_path = target_dir.join(CONFIG_FILE);
    if config_path.exists() {
        tracing::info!("Keeping existing {:?}", config_path);
    } else {
        fs::write(&config_path, DEFAULT_CONFIG)?;
        tracing::debug!("Wrote {:?}", config_path);
    }

    let app = Micropub::new(target_dir)?;
    run(&app)?;
    Ok(app)
}

/// Create the content repository of an existing instance
pub fn run(app: &Micropub) -> Result<()> {
    app.store().initialize()?;
    tracing::info!("Content repository ready at {:?}", app.repo_dir);
    Ok(())
}
