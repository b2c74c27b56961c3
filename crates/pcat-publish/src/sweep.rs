use std::time::{Duration, SystemTime};

use tracing::{debug, info};

use pcat_store::FileStore;
use pcat_types::is_staged_name;

use crate::commit::{remove_all, RemovalReport};
use crate::error::PublishResult;

/// Delete staged files older than `ttl`.
///
/// Uploads staged by an `ifcomplete` publish that never became complete
/// stay behind under their temp names. They are invisible to readers but
/// would otherwise accumulate until the next prune.
pub async fn sweep_stale_temp_files(store: &dyn FileStore, ttl: Duration) -> PublishResult<RemovalReport> {
    let cutoff = SystemTime::now().checked_sub(ttl).unwrap_or(SystemTime::UNIX_EPOCH);

    let mut stale = Vec::new();
    for name in store.list().await?.into_iter().filter(|n| is_staged_name(n)) {
        match store.modified(&name).await? {
            Some(modified) if modified <= cutoff => stale.push(name),
            Some(_) => debug!(name = %name, "staged file is still fresh"),
            None => {}
        }
    }

    let report = remove_all(store, stale.iter().map(String::as_str)).await;
    if !report.removed.is_empty() {
        info!(removed = report.removed.len(), "swept stale staged files");
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcat_store::InMemoryFileStore;
    use pcat_types::TempSuffix;

    #[tokio::test]
    async fn removes_only_old_staged_files() {
        let store = InMemoryFileStore::new();
        let suffix = TempSuffix::new();
        let old = suffix.stage("root.json");
        let fresh = TempSuffix::new().stage("release_a.json");
        store.insert(&*old, "{}");
        store.insert(&*fresh, "{}");
        store.insert("release_b.json", "{}");
        store.set_modified(&old, SystemTime::UNIX_EPOCH);
        store.set_modified("release_b.json", SystemTime::UNIX_EPOCH);

        let report = sweep_stale_temp_files(&store, Duration::from_secs(3600))
            .await
            .unwrap();

        assert_eq!(report.removed, vec![old]);
        assert!(store.contains(&fresh));
        assert!(store.contains("release_b.json"));
    }

    #[tokio::test]
    async fn zero_ttl_sweeps_every_staged_file() {
        let store = InMemoryFileStore::new();
        store.insert(TempSuffix::new().stage("blob_ab"), "x");
        store.insert("blob_ab", "x");
        tokio::time::sleep(Duration::from_millis(5)).await;

        let report = sweep_stale_temp_files(&store, Duration::ZERO).await.unwrap();
        assert_eq!(report.removed.len(), 1);
        assert_eq!(store.names(), vec!["blob_ab"]);
    }
}
