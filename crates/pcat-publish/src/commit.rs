//! Commit and prune.
//!
//! Commit renames every staged file of a batch to its final name. Renames
//! are independent of each other and run concurrently; a failed rename is
//! recorded and does not undo the others, so a commit is atomic per file but
//! not per batch. Prune then deletes every file that the post-commit graph
//! no longer reaches.

use std::collections::BTreeSet;

use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{debug, info, instrument, warn};

use pcat_store::{ExistenceIndex, FileStore};

use crate::resolver::StagedBatch;

/// A file whose rename or deletion failed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FailedFile {
    pub name: String,
    pub error: String,
}

/// Result of renaming a staged batch into place.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommitReport {
    /// Final names now visible.
    pub renamed: Vec<String>,
    /// Staged names that are still staged.
    pub failed: Vec<FailedFile>,
}

impl CommitReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn attempted(&self) -> usize {
        self.renamed.len() + self.failed.len()
    }
}

/// Result of deleting a set of files.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RemovalReport {
    pub removed: Vec<String>,
    pub failed: Vec<FailedFile>,
}

impl RemovalReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Applies a completed publish to one database.
pub struct CommitCoordinator<'a> {
    store: &'a dyn FileStore,
}

impl<'a> CommitCoordinator<'a> {
    pub fn new(store: &'a dyn FileStore) -> Self {
        Self { store }
    }

    /// Rename every staged file to its final name.
    ///
    /// `existing` and `referenced` are updated as each rename completes so a
    /// following [`prune`](Self::prune) sees final names only.
    #[instrument(skip_all, fields(staged = staged.len()))]
    pub async fn commit(
        &self,
        staged: &StagedBatch,
        existing: &mut ExistenceIndex,
        referenced: &mut BTreeSet<String>,
    ) -> CommitReport {
        let mut renames: FuturesUnordered<_> = staged
            .pairs()
            .map(|(staged_name, final_name)| async move {
                let result = self.store.rename(staged_name, final_name).await;
                (staged_name, final_name, result)
            })
            .collect();

        let mut report = CommitReport::default();
        while let Some((staged_name, final_name, result)) = renames.next().await {
            match result {
                Ok(()) => {
                    existing.rename(staged_name, final_name);
                    referenced.remove(staged_name);
                    referenced.insert(final_name.to_string());
                    report.renamed.push(final_name.to_string());
                }
                Err(e) => {
                    warn!(from = staged_name, to = final_name, error = %e, "rename failed");
                    report.failed.push(FailedFile {
                        name: staged_name.to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        report.renamed.sort();
        report.failed.sort_by(|a, b| a.name.cmp(&b.name));
        debug!(
            renamed = report.renamed.len(),
            failed = report.failed.len(),
            "commit finished"
        );
        report
    }

    /// Delete every file in `existing` that is not in `referenced`.
    ///
    /// There is no grace period. A failed deletion is recorded and leaves
    /// the orphan for the next prune; it never stops the other deletions.
    #[instrument(skip_all)]
    pub async fn prune(
        &self,
        existing: &mut ExistenceIndex,
        referenced: &BTreeSet<String>,
    ) -> RemovalReport {
        let orphans = existing.difference(referenced);
        let report = remove_all(self.store, orphans.iter().map(String::as_str)).await;
        for name in &report.removed {
            existing.remove(name);
        }
        info!(
            removed = report.removed.len(),
            failed = report.failed.len(),
            "pruned orphans"
        );
        report
    }

    /// Delete the staged files of a batch without committing them.
    pub async fn discard(&self, staged: &StagedBatch, existing: &mut ExistenceIndex) -> RemovalReport {
        let report = remove_all(self.store, staged.pairs().map(|(staged_name, _)| staged_name)).await;
        for name in &report.removed {
            existing.remove(name);
        }
        report
    }
}

/// Delete `names` concurrently, collecting every failure.
pub(crate) async fn remove_all<'n>(
    store: &dyn FileStore,
    names: impl Iterator<Item = &'n str>,
) -> RemovalReport {
    let mut removals: FuturesUnordered<_> = names
        .map(|name| async move { (name, store.remove(name).await) })
        .collect();

    let mut report = RemovalReport::default();
    while let Some((name, result)) = removals.next().await {
        match result {
            Ok(()) => report.removed.push(name.to_string()),
            Err(e) => {
                warn!(name, error = %e, "delete failed");
                report.failed.push(FailedFile {
                    name: name.to_string(),
                    error: e.to_string(),
                });
            }
        }
    }
    report.removed.sort();
    report.failed.sort_by(|a, b| a.name.cmp(&b.name));
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcat_store::InMemoryFileStore;
    use pcat_types::TempSuffix;

    fn stage(store: &InMemoryFileStore, suffix: &TempSuffix, names: &[&str]) -> StagedBatch {
        let staged: Vec<String> = names.iter().map(|n| suffix.stage(n)).collect();
        for name in &staged {
            store.insert(name.as_str(), "{}");
        }
        StagedBatch::from_staged_names(suffix, &staged)
    }

    #[tokio::test]
    async fn commit_renames_and_updates_sets() {
        let store = InMemoryFileStore::new();
        let suffix = TempSuffix::new();
        let batch = stage(&store, &suffix, &["root.json", "release_a.json", "blob_ff"]);
        let mut existing = ExistenceIndex::snapshot(&store).await.unwrap();
        let mut referenced: BTreeSet<String> =
            ["root.json", "release_a.json", "blob_ff"].map(String::from).into();

        let report = CommitCoordinator::new(&store)
            .commit(&batch, &mut existing, &mut referenced)
            .await;

        assert!(report.is_complete());
        assert_eq!(report.renamed, vec!["blob_ff", "release_a.json", "root.json"]);
        assert_eq!(store.names(), vec!["blob_ff", "release_a.json", "root.json"]);
        assert!(existing.contains("root.json"));
        assert!(!existing.contains(&suffix.stage("root.json")));
        assert_eq!(referenced.len(), 3);
    }

    #[tokio::test]
    async fn one_failed_rename_does_not_stop_the_others() {
        let store = InMemoryFileStore::new();
        let suffix = TempSuffix::new();
        let names = ["root.json", "release_a.json", "product_p@1.json", "table_t@1.json"];
        let batch = stage(&store, &suffix, &names);
        store.fail_rename_of(suffix.stage("product_p@1.json"));
        let mut existing = ExistenceIndex::snapshot(&store).await.unwrap();
        let mut referenced: BTreeSet<String> = names.map(String::from).into();

        let report = CommitCoordinator::new(&store)
            .commit(&batch, &mut existing, &mut referenced)
            .await;

        assert!(!report.is_complete());
        assert_eq!(report.attempted(), 4);
        assert_eq!(report.renamed.len(), 3);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].name, suffix.stage("product_p@1.json"));
        assert!(store.contains("root.json"));
        assert!(store.contains("table_t@1.json"));
        assert!(store.contains(&suffix.stage("product_p@1.json")));
        assert!(existing.contains(&suffix.stage("product_p@1.json")));
    }

    #[tokio::test]
    async fn prune_deletes_unreferenced_files() {
        let store = InMemoryFileStore::new();
        for name in ["root.json", "release_a.json", "release_old.json", "blob_old"] {
            store.insert(name, "{}");
        }
        let mut existing = ExistenceIndex::snapshot(&store).await.unwrap();
        let referenced: BTreeSet<String> = ["root.json", "release_a.json"].map(String::from).into();

        let report = CommitCoordinator::new(&store)
            .prune(&mut existing, &referenced)
            .await;

        assert_eq!(report.removed, vec!["blob_old", "release_old.json"]);
        assert_eq!(store.names(), vec!["release_a.json", "root.json"]);
        assert_eq!(existing.len(), 2);
    }

    #[tokio::test]
    async fn failed_deletion_does_not_abort_prune() {
        let store = InMemoryFileStore::new();
        for name in ["root.json", "release_x.json", "release_y.json", "release_z.json"] {
            store.insert(name, "{}");
        }
        store.fail_remove_of("release_y.json");
        let mut existing = ExistenceIndex::snapshot(&store).await.unwrap();
        let referenced: BTreeSet<String> = ["root.json"].map(String::from).into();

        let report = CommitCoordinator::new(&store)
            .prune(&mut existing, &referenced)
            .await;

        assert_eq!(report.removed, vec!["release_x.json", "release_z.json"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].name, "release_y.json");
        assert!(existing.contains("release_y.json"));
        assert_eq!(store.names(), vec!["release_y.json", "root.json"]);
    }

    #[tokio::test]
    async fn discard_removes_only_staged_files() {
        let store = InMemoryFileStore::new();
        store.insert("root.json", "{}");
        let suffix = TempSuffix::new();
        let batch = stage(&store, &suffix, &["root.json"]);
        let mut existing = ExistenceIndex::snapshot(&store).await.unwrap();

        let report = CommitCoordinator::new(&store).discard(&batch, &mut existing).await;

        assert!(report.is_complete());
        assert_eq!(store.names(), vec!["root.json"]);
        assert_eq!(existing.len(), 1);
    }
}
