use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Per-database publish locks.
///
/// A publish snapshots the directory, resolves, renames and prunes; a second
/// publish interleaving with that sequence could prune files the first one
/// is about to read. Holding the database's guard for the whole sequence
/// serialises publishes to one database while leaving others independent.
#[derive(Debug, Default)]
pub struct DatabaseLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl DatabaseLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `database_id`.
    pub async fn lock(&self, database_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().expect("lock poisoned");
            Arc::clone(locks.entry(database_id.to_string()).or_default())
        };
        lock.lock_owned().await
    }

    /// Number of databases that have been locked at least once.
    pub fn len(&self) -> usize {
        self.locks.lock().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_database_is_exclusive() {
        let locks = Arc::new(DatabaseLocks::new());
        let guard = locks.lock("a").await;

        let contender = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _guard = locks.lock("a").await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap();
    }

    #[tokio::test]
    async fn different_databases_are_independent() {
        let locks = DatabaseLocks::new();
        let _a = locks.lock("a").await;
        let _b = locks.lock("b").await;
        assert_eq!(locks.len(), 2);
    }
}
