//! In-memory backend for deterministic testing.
//!
//! Entries live in a map shared by all clones, so a test can hand one clone
//! to a [`ContentStore`](super::ContentStore) and inspect another. Every
//! mutating call is recorded, and any step can be forced to fail with
//! [`MemoryBackend::fail_on`].
//!
//! # Example
//!
//! ```
//! use micropub_rs::store::{FailOn, MemoryBackend, VersionedBackend};
//!
//! let backend = MemoryBackend::new().fail_on(FailOn::Publish);
//! backend.write("a.md", "text").unwrap();
//! backend.stage("a.md").unwrap();
//! backend.commit("Add post: a").unwrap();
//! assert!(backend.publish().is_err());
//! assert_eq!(backend.published_count(), 0);
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::VersionedBackend;
use crate::error::BackendError;

/// Memory-backed stand-in for [`GitBackend`](super::GitBackend).
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<Mutex<MemoryInner>>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    initialized: bool,
    entries: BTreeMap<String, String>,
    staged: BTreeSet<String>,
    commits: Vec<CommitRecord>,
    /// Number of commits made visible by `publish`
    published: usize,
    fail_on: Option<FailOn>,
    operations: Vec<Operation>,
}

/// Which backend step should fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOn {
    Write,
    Stage,
    Commit,
    Publish,
}

impl FailOn {
    fn name(self) -> &'static str {
        match self {
            FailOn::Write => "write",
            FailOn::Stage => "stage",
            FailOn::Commit => "commit",
            FailOn::Publish => "publish",
        }
    }
}

/// A recorded commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    pub message: String,
    /// Entries staged when the commit was made
    pub files: Vec<String>,
}

/// Recorded mutating call, for test verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Initialize,
    Write(String),
    Remove(String),
    Stage(String),
    Commit(String),
    Publish,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend holding existing entries
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let backend = Self::new();
        {
            let mut inner = backend.state();
            inner.initialized = true;
            inner.entries = entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect();
        }
        backend
    }

    /// Make every call of the given step fail until cleared
    pub fn fail_on(self, fail_on: FailOn) -> Self {
        self.set_fail_on(fail_on);
        self
    }

    pub fn set_fail_on(&self, fail_on: FailOn) {
        self.state().fail_on = Some(fail_on);
    }

    pub fn clear_fail_on(&self) {
        self.state().fail_on = None;
    }

    pub fn is_initialized(&self) -> bool {
        self.state().initialized
    }

    /// Stored text of an entry
    pub fn entry(&self, name: &str) -> Option<String> {
        self.state().entries.get(name).cloned()
    }

    /// Names of all entries, sorted
    pub fn entry_names(&self) -> Vec<String> {
        self.state().entries.keys().cloned().collect()
    }

    pub fn commits(&self) -> Vec<CommitRecord> {
        self.state().commits.clone()
    }

    pub fn commit_messages(&self) -> Vec<String> {
        self.state()
            .commits
            .iter()
            .map(|c| c.message.clone())
            .collect()
    }

    /// Number of commits that have been published
    pub fn published_count(&self) -> usize {
        self.state().published
    }

    pub fn operations(&self) -> Vec<Operation> {
        self.state().operations.clone()
    }

    fn state(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MemoryInner {
    fn check(&self, step: FailOn) -> Result<(), BackendError> {
        if self.fail_on == Some(step) {
            return Err(BackendError::Injected {
                operation: step.name(),
            });
        }
        Ok(())
    }
}

impl VersionedBackend for MemoryBackend {
    fn initialize(&self) -> Result<(), BackendError> {
        let mut inner = self.state();
        inner.operations.push(Operation::Initialize);
        inner.initialized = true;
        Ok(())
    }

    fn exists(&self, name: &str) -> Result<bool, BackendError> {
        Ok(self.state().entries.contains_key(name))
    }

    fn read(&self, name: &str) -> Result<Option<String>, BackendError> {
        Ok(self.state().entries.get(name).cloned())
    }

    fn write(&self, name: &str, text: &str) -> Result<(), BackendError> {
        let mut inner = self.state();
        inner.operations.push(Operation::Write(name.to_string()));
        inner.check(FailOn::Write)?;
        inner.entries.insert(name.to_string(), text.to_string());
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<bool, BackendError> {
        let mut inner = self.state();
        inner.operations.push(Operation::Remove(name.to_string()));
        Ok(inner.entries.remove(name).is_some())
    }

    fn stage(&self, name: &str) -> Result<(), BackendError> {
        let mut inner = self.state();
        inner.operations.push(Operation::Stage(name.to_string()));
        inner.check(FailOn::Stage)?;
        inner.staged.insert(name.to_string());
        Ok(())
    }

    fn commit(&self, message: &str) -> Result<(), BackendError> {
        let mut inner = self.state();
        inner.operations.push(Operation::Commit(message.to_string()));
        inner.check(FailOn::Commit)?;
        let files = std::mem::take(&mut inner.staged).into_iter().collect();
        inner.commits.push(CommitRecord {
            message: message.to_string(),
            files,
        });
        Ok(())
    }

    fn publish(&self) -> Result<(), BackendError> {
        let mut inner = self.state();
        inner.operations.push(Operation::Publish);
        inner.check(FailOn::Publish)?;
        inner.published = inner.commits.len();
        Ok(())
    }
}
