use std::collections::{BTreeSet, HashSet};

use tracing::debug;

use crate::error::StoreResult;
use crate::traits::FileStore;

/// Snapshot of the file names present in one database.
///
/// Taken once per publish request so membership checks never touch the
/// filesystem. The coordinator keeps it current as it renames and deletes,
/// so pruning sees the post-commit state without listing the directory
/// again.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExistenceIndex {
    names: HashSet<String>,
}

impl ExistenceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// List the store once. A database that does not exist yet is empty.
    pub async fn snapshot(store: &dyn FileStore) -> StoreResult<Self> {
        let names = store.list().await?;
        debug!(count = names.len(), "took existence snapshot");
        Ok(Self { names })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn insert(&mut self, name: impl Into<String>) -> bool {
        self.names.insert(name.into())
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.names.remove(name)
    }

    /// Record a completed rename.
    pub fn rename(&mut self, from: &str, to: &str) {
        self.names.remove(from);
        self.names.insert(to.to_string());
    }

    /// Names present in the index but absent from `keep`, sorted.
    pub fn difference(&self, keep: &BTreeSet<String>) -> BTreeSet<String> {
        self.names
            .iter()
            .filter(|name| !keep.contains(name.as_str()))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for ExistenceIndex {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().map(Into::into).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryFileStore;

    #[tokio::test]
    async fn snapshot_of_empty_store() {
        let store = InMemoryFileStore::new();
        let index = ExistenceIndex::snapshot(&store).await.unwrap();
        assert!(index.is_empty());
    }

    #[tokio::test]
    async fn snapshot_does_not_follow_later_writes() {
        let store = InMemoryFileStore::new();
        store.insert("root.json", "{}");
        let index = ExistenceIndex::snapshot(&store).await.unwrap();
        store.insert("release_a.json", "{}");
        assert!(index.contains("root.json"));
        assert!(!index.contains("release_a.json"));
    }

    #[test]
    fn rename_updates_membership() {
        let mut index: ExistenceIndex = ["root.json_x.json", "blob_a"].into_iter().collect();
        index.rename("root.json_x.json", "root.json");
        assert!(index.contains("root.json"));
        assert!(!index.contains("root.json_x.json"));
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn difference_yields_orphans() {
        let index: ExistenceIndex = ["root.json", "release_a.json", "release_b.json"]
            .into_iter()
            .collect();
        let keep: BTreeSet<String> = ["root.json", "release_a.json", "product_p@1.json"]
            .into_iter()
            .map(String::from)
            .collect();
        let orphans = index.difference(&keep);
        assert_eq!(orphans.into_iter().collect::<Vec<_>>(), vec!["release_b.json"]);
    }
}
