//! Git-backed storage
//!
//! Each post is a file at the repository root. Versioning shells out to the
//! `git` binary; any nonzero exit becomes [`BackendError::Command`] carrying
//! git's diagnostic output. Nothing is retried.

use chrono::Utc;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::NamedTempFile;

use super::VersionedBackend;
use crate::config::{CommitAuthor, PublishConfig, PublishStrategy, ServiceConfig};
use crate::error::BackendError;

/// Backend storing posts as files in a git working tree
#[derive(Debug, Clone)]
pub struct GitBackend {
    root: PathBuf,
    author: Option<CommitAuthor>,
    publish: PublishConfig,
}

impl GitBackend {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: root.into(),
            author: None,
            publish: PublishConfig::default(),
        }
    }

    /// Build a backend for `repo_dir` using the author and publish settings
    pub fn from_config(repo_dir: PathBuf, config: &ServiceConfig) -> Self {
        Self::new(repo_dir)
            .with_author(config.author.clone())
            .with_publish(config.publish.clone())
    }

    pub fn with_author(mut self, author: Option<CommitAuthor>) -> Self {
        self.author = author;
        self
    }

    pub fn with_publish(mut self, publish: PublishConfig) -> Self {
        self.publish = publish;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Run git in the repository root, returning trimmed stdout
    fn git<S: AsRef<str>>(&self, args: &[S]) -> Result<String, BackendError> {
        let args: Vec<&str> = args.iter().map(AsRef::as_ref).collect();
        let command = format!("git {}", args.join(" "));
        tracing::debug!("Running `{}` in {:?}", command, self.root);

        let output = Command::new("git")
            .args(&args)
            .current_dir(&self.root)
            .output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let stderr = if stderr.is_empty() {
                String::from_utf8_lossy(&output.stdout).trim().to_string()
            } else {
                stderr
            };
            return Err(BackendError::Command {
                command,
                status: output.status,
                stderr,
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl VersionedBackend for GitBackend {
    fn initialize(&self) -> Result<(), BackendError> {
        fs::create_dir_all(&self.root)?;

        if self.root.join(".git").exists() {
            tracing::debug!("Git repository already present at {:?}", self.root);
            return Ok(());
        }

        self.git(&["init"])?;
        tracing::info!("Initialized git repository at {:?}", self.root);
        Ok(())
    }

    fn exists(&self, name: &str) -> Result<bool, BackendError> {
        Ok(self.path(name).is_file())
    }

    fn read(&self, name: &str) -> Result<Option<String>, BackendError> {
        let path = self.path(name);
        if !path.is_file() {
            return Ok(None);
        }
        match fs::read_to_string(path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write to a temporary file in the repository root, then rename it over
    /// the entry so readers never see a partial file.
    fn write(&self, name: &str, text: &str) -> Result<(), BackendError> {
        let mut file = NamedTempFile::new_in(&self.root)?;
        file.write_all(text.as_bytes())?;
        file.persist(self.path(name)).map_err(|e| e.error)?;
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<bool, BackendError> {
        let path = self.path(name);
        if !path.is_file() {
            return Ok(false);
        }
        match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn stage(&self, name: &str) -> Result<(), BackendError> {
        if self.path(name).exists() {
            self.git(&["add", "--", name])?;
        } else {
            self.git(&["rm", "--cached", "--ignore-unmatch", "--quiet", "--", name])?;
        }
        Ok(())
    }

    fn commit(&self, message: &str) -> Result<(), BackendError> {
        let mut args: Vec<String> = Vec::new();
        if let Some(author) = &self.author {
            args.push("-c".to_string());
            args.push(format!("user.name={}", author.name));
            args.push("-c".to_string());
            args.push(format!("user.email={}", author.email));
        }
        // Updates that leave a post unchanged still get an audit entry
        args.extend(["commit", "--allow-empty", "-m", message].map(String::from));

        self.git(args.as_slice())?;
        Ok(())
    }

    fn publish(&self) -> Result<(), BackendError> {
        let remote = self.publish.remote.as_str();

        match self.publish.strategy {
            PublishStrategy::Local => {
                tracing::debug!("Publish strategy is local, not pushing");
            }
            PublishStrategy::Direct => {
                self.git(&["push", remote, "HEAD"])?;
            }
            PublishStrategy::Branch => {
                let branch = format!("{}{}", self.publish.branch_prefix, Utc::now().timestamp());
                let refspec = format!("HEAD:refs/heads/{}", branch);
                self.git(&["push", remote, refspec.as_str()])?;
                tracing::info!("Pushed branch '{}' to {}, awaiting merge", branch, remote);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::Properties;
    use crate::error::StoreError;
    use crate::store::{ContentStore, FixedClock, UpdateDirectives};
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn git_available() -> bool {
        Command::new("git")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn test_backend() -> (TempDir, GitBackend) {
        let dir = tempfile::tempdir().unwrap();
        let backend = GitBackend::new(dir.path().join("content")).with_author(Some(CommitAuthor {
            name: "Test".to_string(),
            email: "test@example.com".to_string(),
        }));
        (dir, backend)
    }

    #[test]
    fn test_entry_io_without_git() {
        let (_dir, backend) = test_backend();
        fs::create_dir_all(backend.root()).unwrap();

        assert!(!backend.exists("a.md").unwrap());
        assert_eq!(backend.read("a.md").unwrap(), None);

        backend.write("a.md", "hello").unwrap();
        assert!(backend.exists("a.md").unwrap());
        assert_eq!(backend.read("a.md").unwrap().as_deref(), Some("hello"));

        assert!(backend.remove("a.md").unwrap());
        assert!(!backend.remove("a.md").unwrap());
    }

    #[test]
    fn test_initialize_is_idempotent() {
        if !git_available() {
            return;
        }
        let (_dir, backend) = test_backend();

        backend.initialize().unwrap();
        assert!(backend.root().join(".git").exists());
        backend.initialize().unwrap();
    }

    #[test]
    fn test_stage_commit_publish_local() {
        if !git_available() {
            return;
        }
        let (_dir, backend) = test_backend();
        backend.initialize().unwrap();

        backend.write("2024-01-02-hello.md", "---\ntitle: Hello\n---\n\nWorld").unwrap();
        backend.stage("2024-01-02-hello.md").unwrap();
        backend.commit("Add post: Hello").unwrap();
        backend.publish().unwrap();

        let log = backend.git(&["log", "--format=%s"]).unwrap();
        assert_eq!(log, "Add post: Hello");

        backend.remove("2024-01-02-hello.md").unwrap();
        backend.stage("2024-01-02-hello.md").unwrap();
        backend.commit("Delete post: 2024-01-02-hello.md").unwrap();

        let tracked = backend.git(&["ls-files"]).unwrap();
        assert!(tracked.is_empty());
    }

    #[test]
    fn test_stage_untracked_missing_entry_is_noop() {
        if !git_available() {
            return;
        }
        let (_dir, backend) = test_backend();
        backend.initialize().unwrap();

        backend.stage("never-written.md").unwrap();
    }

    #[test]
    fn test_push_without_remote_fails() {
        if !git_available() {
            return;
        }
        let (_dir, backend) = test_backend();
        let backend = backend.with_publish(PublishConfig {
            strategy: PublishStrategy::Direct,
            ..Default::default()
        });
        backend.initialize().unwrap();
        backend.write("a.md", "x").unwrap();
        backend.stage("a.md").unwrap();
        backend.commit("Add post: a").unwrap();

        match backend.publish() {
            Err(BackendError::Command { command, stderr, .. }) => {
                assert_eq!(command, "git push origin HEAD");
                assert!(!stderr.is_empty());
            }
            other => panic!("expected command failure, got {:?}", other),
        }
    }

    #[test]
    fn test_stage_outside_repository_fails() {
        if !git_available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let backend = GitBackend::new(dir.path().join("missing"));

        assert!(matches!(backend.stage("a.md"), Err(BackendError::Io(_))));
    }

    #[test]
    fn test_directory_entry_is_not_a_post() {
        let (_dir, backend) = test_backend();
        fs::create_dir_all(backend.root().join("2024-01-02-dir.md")).unwrap();

        assert!(!backend.exists("2024-01-02-dir.md").unwrap());
        assert_eq!(backend.read("2024-01-02-dir.md").unwrap(), None);
        assert!(!backend.remove("2024-01-02-dir.md").unwrap());

        let store = ContentStore::new(Arc::new(backend.clone()));
        assert!(matches!(
            store.read("/2024-01-02-dir.md"),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.delete("/2024-01-02-dir.md"),
            Err(StoreError::NotFound(_))
        ));
        assert!(backend.root().join("2024-01-02-dir.md").is_dir());
    }

    fn git_store(backend: &GitBackend) -> ContentStore {
        let clock = FixedClock::parse("2024-01-02T10:00:00Z").unwrap();
        ContentStore::new(Arc::new(backend.clone())).with_clock(Arc::new(clock))
    }

    fn props(value: serde_json::Value) -> Properties {
        value.as_object().unwrap().clone()
    }

    fn replace_title(title: &str) -> UpdateDirectives {
        UpdateDirectives::from_request(&json!({"replace": {"title": [title]}})).unwrap()
    }

    /// Make every commit in the repository fail
    #[cfg(unix)]
    fn install_failing_hook(backend: &GitBackend) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let hooks = backend.root().join(".git").join("hooks");
        fs::create_dir_all(&hooks).unwrap();
        let hook = hooks.join("pre-commit");
        fs::write(&hook, "#!/bin/sh\nexit 1\n").unwrap();
        fs::set_permissions(&hook, fs::Permissions::from_mode(0o755)).unwrap();
        hook
    }

    fn status(backend: &GitBackend) -> String {
        backend.git(&["status", "--porcelain"]).unwrap()
    }

    #[test]
    fn test_failed_push_on_create_leaves_nothing_staged() {
        if !git_available() {
            return;
        }
        let (_dir, backend) = test_backend();
        backend.initialize().unwrap();

        let pushing = backend.clone().with_publish(PublishConfig {
            strategy: PublishStrategy::Direct,
            ..Default::default()
        });
        let err = git_store(&pushing)
            .create(&props(json!({"title": "Hello", "content": "World"})))
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Backend(BackendError::Command { .. })
        ));
        assert!(!backend.root().join("2024-01-02-hello.md").exists());
        assert!(status(&backend).is_empty());

        let store = git_store(&backend);
        store
            .create(&props(json!({"title": "Other", "content": "Text"})))
            .unwrap();

        let last = backend
            .git(&["log", "-1", "--name-status", "--format=%s"])
            .unwrap();
        let mut lines = last.lines().filter(|line| !line.is_empty());
        assert_eq!(lines.next(), Some("Add post: Other"));
        assert_eq!(lines.collect::<Vec<_>>(), vec!["A\t2024-01-02-other.md"]);

        let log = backend.git(&["log", "--format=%s"]).unwrap();
        assert!(log.contains("Delete post: 2024-01-02-hello.md"));
        assert!(store.exists("/2024-01-02-other.md").unwrap());
        assert!(!store.exists("/2024-01-02-hello.md").unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_commit_on_update_restores_entry() {
        if !git_available() {
            return;
        }
        let (_dir, backend) = test_backend();
        backend.initialize().unwrap();
        let store = git_store(&backend);

        let id = store
            .create(&props(json!({"title": "Hello", "content": "World"})))
            .unwrap();
        let before = backend.read(id.as_str()).unwrap().unwrap();

        let hook = install_failing_hook(&backend);
        let err = store.update(id.as_str(), &replace_title("New")).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Backend(BackendError::Command { .. })
        ));
        assert_eq!(backend.read(id.as_str()).unwrap().unwrap(), before);
        assert!(status(&backend).is_empty());

        fs::remove_file(hook).unwrap();
        store.update(id.as_str(), &replace_title("New")).unwrap();
        assert_eq!(store.read(id.as_str()).unwrap().title(), "New");
        let subject = backend.git(&["log", "-1", "--format=%s"]).unwrap();
        assert_eq!(subject, "Update post: 2024-01-02-hello.md");
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_commit_on_delete_restores_entry() {
        if !git_available() {
            return;
        }
        let (_dir, backend) = test_backend();
        backend.initialize().unwrap();
        let store = git_store(&backend);

        let id = store
            .create(&props(json!({"title": "Hello", "content": "World"})))
            .unwrap();
        let before = backend.read(id.as_str()).unwrap().unwrap();

        install_failing_hook(&backend);
        assert!(store.delete(id.as_str()).is_err());
        assert_eq!(backend.read(id.as_str()).unwrap().unwrap(), before);
        assert!(status(&backend).is_empty());
        assert_eq!(store.read(id.as_str()).unwrap().title(), "Hello");
    }

    #[test]
    fn test_reads_during_updates_see_whole_documents() {
        if !git_available() {
            return;
        }
        let (_dir, backend) = test_backend();
        backend.initialize().unwrap();
        let store = git_store(&backend);

        let body = "lorem ipsum dolor sit amet\n".repeat(40_000);
        let id = store
            .create(&props(json!({"title": "Title 0", "content": body})))
            .unwrap();
        let body_len = store.read(id.as_str()).unwrap().body.len();

        let done = AtomicBool::new(false);
        std::thread::scope(|scope| {
            scope.spawn(|| {
                for n in 1..=20 {
                    store
                        .update(id.as_str(), &replace_title(&format!("Title {}", n)))
                        .unwrap();
                }
                done.store(true, Ordering::SeqCst);
            });

            let mut reads = 0;
            while !done.load(Ordering::SeqCst) || reads == 0 {
                let doc = store.read(id.as_str()).unwrap();
                assert!(doc.title().starts_with("Title "));
                assert_eq!(doc.body.len(), body_len);
                reads += 1;
            }
        });

        assert_eq!(store.read(id.as_str()).unwrap().title(), "Title 20");
    }
}
