//! Versioned persistence backend trait

use crate::error::BackendError;

/// Storage for post entries plus the stage / commit / publish sequence.
///
/// Entries are addressed by name (the post identifier). Implementations must
/// be interchangeable: [`ContentStore`](super::ContentStore) never inspects
/// which one it was given.
pub trait VersionedBackend: Send + Sync {
    /// Create the repository when absent. Calling it again is a no-op.
    fn initialize(&self) -> Result<(), BackendError>;

    fn exists(&self, name: &str) -> Result<bool, BackendError>;

    /// Read an entry, `None` when it does not exist
    fn read(&self, name: &str) -> Result<Option<String>, BackendError>;

    /// Create or overwrite an entry
    fn write(&self, name: &str, text: &str) -> Result<(), BackendError>;

    /// Remove an entry, returning whether it existed
    fn remove(&self, name: &str) -> Result<bool, BackendError>;

    /// Stage the current state of an entry, including its removal
    fn stage(&self, name: &str) -> Result<(), BackendError>;

    /// Record staged changes under `message`
    fn commit(&self, message: &str) -> Result<(), BackendError>;

    /// Make committed changes visible downstream
    fn publish(&self) -> Result<(), BackendError>;
}
