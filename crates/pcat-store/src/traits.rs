use std::collections::HashSet;
use std::time::SystemTime;

use async_trait::async_trait;

use crate::error::StoreResult;

/// Flat, name-keyed file storage for a single database.
///
/// All implementations must satisfy these invariants:
/// - The namespace is flat: names never contain path separators.
/// - A committed file is never rewritten in place; it is only added,
///   renamed into place from a staged name, or deleted.
/// - All I/O errors are propagated, never silently ignored.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// List every file name currently present.
    ///
    /// A database that has never been written lists as empty.
    async fn list(&self) -> StoreResult<HashSet<String>>;

    /// Read a file's bytes. Returns `Ok(None)` if the file does not exist.
    async fn read(&self, name: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Write a file, creating the database on demand.
    async fn write(&self, name: &str, bytes: &[u8]) -> StoreResult<()>;

    /// Rename a file, replacing any file already at `to`.
    async fn rename(&self, from: &str, to: &str) -> StoreResult<()>;

    /// Delete a file. Deleting an absent file is [`StoreError::NotFound`].
    ///
    /// [`StoreError::NotFound`]: crate::StoreError::NotFound
    async fn remove(&self, name: &str) -> StoreResult<()>;

    /// Last modification time, or `Ok(None)` if the file does not exist.
    async fn modified(&self, name: &str) -> StoreResult<Option<SystemTime>>;
}
