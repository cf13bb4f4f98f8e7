//! Content store
//!
//! [`ContentStore`] turns Micropub property bags into stored documents and
//! runs every mutation through the backend's stage, commit and publish
//! sequence. Mutations are serialized by a single writer lock.

mod backend;
mod clock;
mod git;
mod memory;
mod merge;

pub use backend::VersionedBackend;
pub use clock::{Clock, FixedClock, SystemClock};
pub use git::GitBackend;
pub use memory::{CommitRecord, FailOn, MemoryBackend, Operation};
pub use merge::UpdateDirectives;

use chrono::{NaiveDate, SecondsFormat};
use serde_yaml::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::CollisionPolicy;
use crate::content::properties::{self, Properties};
use crate::content::{slugify, Document, FrontMatter, PostId, DEFAULT_TITLE};
use crate::error::{BackendError, StoreError};

/// Failure of the stage / commit / publish sequence
enum RecordError {
    /// Nothing was committed
    Uncommitted(BackendError),
    /// Committed locally, but the publish step failed
    Unpublished(BackendError),
}

/// Post storage on top of a [`VersionedBackend`]
pub struct ContentStore {
    backend: Arc<dyn VersionedBackend>,
    clock: Arc<dyn Clock>,
    collision: CollisionPolicy,
    writer: Mutex<()>,
}

impl ContentStore {
    pub fn new(backend: Arc<dyn VersionedBackend>) -> Self {
        Self {
            backend,
            clock: Arc::new(SystemClock),
            collision: CollisionPolicy::default(),
            writer: Mutex::new(()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_collision_policy(mut self, collision: CollisionPolicy) -> Self {
        self.collision = collision;
        self
    }

    /// Bootstrap the backing repository
    pub fn initialize(&self) -> Result<(), StoreError> {
        self.backend.initialize()?;
        Ok(())
    }

    /// Create a post from a Micropub property bag.
    ///
    /// Returns the identifier of the new post; its `Display` form is the
    /// URL path. On any failure the entry is discarded and the identifier
    /// stays unresolvable. When the add was already committed, the removal
    /// is committed on its own so nothing stays staged.
    pub fn create(&self, props: &Properties) -> Result<PostId, StoreError> {
        let body = props
            .get("content")
            .and_then(properties::content_text)
            .filter(|body| !body.trim().is_empty())
            .ok_or_else(|| StoreError::Validation("missing content".to_string()))?;

        let title = props
            .get("title")
            .and_then(properties::scalar_text)
            .filter(|title| !title.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_TITLE.to_string());

        let now = self.clock.now();

        let mut frontmatter = FrontMatter::new();
        for (key, value) in props {
            if properties::is_reserved(key) {
                continue;
            }
            frontmatter.insert(key.as_str(), properties::to_yaml(value)?);
        }
        frontmatter.insert("title", Value::String(title.clone()));
        frontmatter.insert(
            "date",
            Value::String(now.to_rfc3339_opts(SecondsFormat::Secs, true)),
        );

        let _guard = self.lock();

        let id = self.allocate_id(now.date_naive(), &slugify(&title))?;
        let doc = Document::new(id, frontmatter, body);
        let text = doc.render()?;
        let name = doc.id.as_str();

        if let Err(e) = self.backend.write(name, &text) {
            self.discard(name, None);
            return Err(e.into());
        }

        match self.record(name, &format!("Add post: {}", title)) {
            Ok(()) => {}
            Err(RecordError::Uncommitted(e)) => {
                self.discard(name, None);
                return Err(e.into());
            }
            Err(RecordError::Unpublished(e)) => {
                self.discard(name, Some(&format!("Delete post: {}", name)));
                return Err(e.into());
            }
        }

        tracing::info!("Created post {}", doc.id);
        Ok(doc.id)
    }

    /// Apply `replace` / `add` directives to an existing post
    pub fn update(&self, url: &str, directives: &UpdateDirectives) -> Result<(), StoreError> {
        let id = PostId::parse(url)?;
        if directives.is_empty() {
            return Err(StoreError::Validation(
                "update needs a replace or add directive".to_string(),
            ));
        }

        let _guard = self.lock();

        let name = id.as_str();
        let previous = self
            .backend
            .read(name)?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        let mut doc = Document::parse(id.clone(), &previous)?;
        directives.apply(&mut doc)?;
        let text = doc.render()?;

        if let Err(e) = self.backend.write(name, &text) {
            self.restore(name, &previous);
            return Err(e.into());
        }

        self.finish(name, &previous, &format!("Update post: {}", name))?;

        tracing::info!("Updated post {}", id);
        Ok(())
    }

    /// Remove an existing post
    pub fn delete(&self, url: &str) -> Result<(), StoreError> {
        let id = PostId::parse(url)?;

        let _guard = self.lock();

        let name = id.as_str();
        let previous = self
            .backend
            .read(name)?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if !self.backend.remove(name)? {
            return Err(StoreError::NotFound(id.to_string()));
        }

        self.finish(name, &previous, &format!("Delete post: {}", name))?;

        tracing::info!("Deleted post {}", id);
        Ok(())
    }

    /// Load and decode an existing post
    pub fn read(&self, url: &str) -> Result<Document, StoreError> {
        let id = PostId::parse(url)?;
        let text = self
            .backend
            .read(id.as_str())?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        Document::parse(id, &text)
    }

    pub fn exists(&self, url: &str) -> Result<bool, StoreError> {
        let id = match PostId::parse(url) {
            Ok(id) => id,
            Err(StoreError::NotFound(_)) => return Ok(false),
            Err(e) => return Err(e),
        };
        Ok(self.backend.exists(id.as_str())?)
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// First free identifier for `date` and `slug` under the collision policy
    fn allocate_id(&self, date: NaiveDate, slug: &str) -> Result<PostId, StoreError> {
        let id = PostId::for_post(date, slug, None);
        if !self.backend.exists(id.as_str())? {
            return Ok(id);
        }

        match self.collision {
            CollisionPolicy::Reject => Err(StoreError::Conflict(id.to_string())),
            CollisionPolicy::Suffix => {
                let mut n = 2;
                loop {
                    let candidate = PostId::for_post(date, slug, Some(n));
                    if !self.backend.exists(candidate.as_str())? {
                        tracing::debug!("{} is taken, using {}", id, candidate);
                        return Ok(candidate);
                    }
                    n += 1;
                }
            }
        }
    }

    fn record(&self, name: &str, message: &str) -> Result<(), RecordError> {
        self.backend.stage(name).map_err(RecordError::Uncommitted)?;
        self.backend
            .commit(message)
            .map_err(RecordError::Uncommitted)?;
        self.backend.publish().map_err(RecordError::Unpublished)?;
        Ok(())
    }

    /// Record a mutation of an existing post, restoring `previous` when
    /// nothing was committed. A publish failure leaves the local commit.
    fn finish(&self, name: &str, previous: &str, message: &str) -> Result<(), StoreError> {
        match self.record(name, message) {
            Ok(()) => Ok(()),
            Err(RecordError::Uncommitted(e)) => {
                self.restore(name, previous);
                Err(e.into())
            }
            Err(RecordError::Unpublished(e)) => {
                tracing::warn!("'{}' committed locally but not published: {}", message, e);
                Err(e.into())
            }
        }
    }

    /// Drop a new entry after a failed create, committing the removal
    /// under `message` when the add had been committed
    fn discard(&self, name: &str, message: Option<&str>) {
        let result = self
            .backend
            .remove(name)
            .and_then(|_| self.backend.stage(name))
            .and_then(|_| match message {
                Some(message) => self.backend.commit(message),
                None => Ok(()),
            });
        match result {
            Ok(()) => tracing::warn!("Discarded entry {} after failed create", name),
            Err(e) => tracing::warn!("Failed to discard entry {}: {}", name, e),
        }
    }

    /// Put back the text an entry had before a failed mutation
    fn restore(&self, name: &str, previous: &str) {
        let result = self
            .backend
            .write(name, previous)
            .and_then(|_| self.backend.stage(name));
        match result {
            Ok(()) => tracing::warn!("Restored entry {} after failed change", name),
            Err(e) => tracing::warn!("Failed to restore entry {}: {}", name, e),
        }
    }
}
