use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use std::time::SystemTime;

use async_trait::async_trait;

use crate::error::{StoreError, StoreResult};
use crate::traits::FileStore;

#[derive(Clone, Debug)]
struct Entry {
    bytes: Vec<u8>,
    modified: SystemTime,
}

/// In-memory, HashMap-based file store.
///
/// Intended for tests. Besides plain storage it records every read and can
/// be told to fail renames or removals of specific names, which is how the
/// commit and prune failure paths are exercised.
pub struct InMemoryFileStore {
    files: RwLock<HashMap<String, Entry>>,
    reads: RwLock<Vec<String>>,
    failing_renames: RwLock<HashSet<String>>,
    failing_removes: RwLock<HashSet<String>>,
}

impl InMemoryFileStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            files: RwLock::new(HashMap::new()),
            reads: RwLock::new(Vec::new()),
            failing_renames: RwLock::new(HashSet::new()),
            failing_removes: RwLock::new(HashSet::new()),
        }
    }

    /// Insert a file synchronously (test setup).
    pub fn insert(&self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.files.write().expect("lock poisoned").insert(
            name.into(),
            Entry {
                bytes: bytes.into(),
                modified: SystemTime::now(),
            },
        );
    }

    /// Override a file's modification time.
    pub fn set_modified(&self, name: &str, modified: SystemTime) {
        if let Some(entry) = self.files.write().expect("lock poisoned").get_mut(name) {
            entry.modified = modified;
        }
    }

    /// Make every future rename *from* `name` fail.
    pub fn fail_rename_of(&self, name: impl Into<String>) {
        self.failing_renames
            .write()
            .expect("lock poisoned")
            .insert(name.into());
    }

    /// Make every future removal of `name` fail.
    pub fn fail_remove_of(&self, name: impl Into<String>) {
        self.failing_removes
            .write()
            .expect("lock poisoned")
            .insert(name.into());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.files.read().expect("lock poisoned").contains_key(name)
    }

    /// Sorted list of all file names.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .files
            .read()
            .expect("lock poisoned")
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Every name passed to [`FileStore::read`] so far, in call order.
    pub fn reads(&self) -> Vec<String> {
        self.reads.read().expect("lock poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.files.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.read().expect("lock poisoned").is_empty()
    }
}

impl Default for InMemoryFileStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryFileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryFileStore")
            .field("file_count", &self.len())
            .finish()
    }
}

#[async_trait]
impl FileStore for InMemoryFileStore {
    async fn list(&self) -> StoreResult<HashSet<String>> {
        Ok(self
            .files
            .read()
            .expect("lock poisoned")
            .keys()
            .cloned()
            .collect())
    }

    async fn read(&self, name: &str) -> StoreResult<Option<Vec<u8>>> {
        self.reads
            .write()
            .expect("lock poisoned")
            .push(name.to_string());
        let files = self.files.read().expect("lock poisoned");
        Ok(files.get(name).map(|e| e.bytes.clone()))
    }

    async fn write(&self, name: &str, bytes: &[u8]) -> StoreResult<()> {
        self.insert(name, bytes);
        Ok(())
    }

    async fn rename(&self, from: &str, to: &str) -> StoreResult<()> {
        if self.failing_renames.read().expect("lock poisoned").contains(from) {
            return Err(StoreError::Injected(from.to_string()));
        }
        let mut files = self.files.write().expect("lock poisoned");
        let entry = files
            .remove(from)
            .ok_or_else(|| StoreError::NotFound(from.to_string()))?;
        files.insert(to.to_string(), entry);
        Ok(())
    }

    async fn remove(&self, name: &str) -> StoreResult<()> {
        if self.failing_removes.read().expect("lock poisoned").contains(name) {
            return Err(StoreError::Injected(name.to_string()));
        }
        let mut files = self.files.write().expect("lock poisoned");
        files
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    async fn modified(&self, name: &str) -> StoreResult<Option<SystemTime>> {
        let files = self.files.read().expect("lock poisoned");
        Ok(files.get(name).map(|e| e.modified))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_read_list() {
        let store = InMemoryFileStore::new();
        assert!(store.is_empty());
        store.write("root.json", b"{}").await.unwrap();
        assert_eq!(store.read("root.json").await.unwrap().unwrap(), b"{}");
        assert!(store.read("missing.json").await.unwrap().is_none());
        assert_eq!(store.list().await.unwrap().len(), 1);
        assert_eq!(store.reads(), vec!["root.json", "missing.json"]);
    }

    #[tokio::test]
    async fn rename_moves_content() {
        let store = InMemoryFileStore::new();
        store.insert("a_tmp.json", "x");
        store.rename("a_tmp.json", "a.json").await.unwrap();
        assert_eq!(store.names(), vec!["a.json"]);
        assert!(matches!(
            store.rename("a_tmp.json", "a.json").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn injected_failures() {
        let store = InMemoryFileStore::new();
        store.insert("a.json", "x");
        store.fail_rename_of("a.json");
        store.fail_remove_of("a.json");
        assert!(matches!(
            store.rename("a.json", "b.json").await,
            Err(StoreError::Injected(_))
        ));
        assert!(matches!(
            store.remove("a.json").await,
            Err(StoreError::Injected(_))
        ));
        assert!(store.contains("a.json"));
    }

    #[tokio::test]
    async fn modified_can_be_backdated() {
        let store = InMemoryFileStore::new();
        store.insert("a.json", "x");
        store.set_modified("a.json", SystemTime::UNIX_EPOCH);
        assert_eq!(
            store.modified("a.json").await.unwrap(),
            Some(SystemTime::UNIX_EPOCH)
        );
        assert!(store.modified("b.json").await.unwrap().is_none());
    }

    #[test]
    fn debug_format() {
        let store = InMemoryFileStore::new();
        store.insert("x", "y");
        let debug = format!("{store:?}");
        assert!(debug.contains("InMemoryFileStore"));
        assert!(debug.contains("file_count"));
    }
}
