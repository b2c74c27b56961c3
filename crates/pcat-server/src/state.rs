use std::sync::Arc;

use pcat_publish::{DatabaseLocks, PublishHook, Publisher};
use pcat_store::{DiskFileStore, StorageRoot};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};

/// Shared by every request handler.
#[derive(Clone)]
pub struct AppState {
    storage: StorageRoot,
    publisher: Arc<Publisher>,
    locks: Arc<DatabaseLocks>,
    max_upload_bytes: usize,
}

impl AppState {
    pub fn new(config: &ServerConfig, hook: Arc<dyn PublishHook>) -> Self {
        Self {
            storage: StorageRoot::new(&config.storage_root),
            publisher: Arc::new(Publisher::with_hook(config.publish.clone(), hook)),
            locks: Arc::new(DatabaseLocks::new()),
            max_upload_bytes: config.max_upload_bytes,
        }
    }

    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    pub fn locks(&self) -> &DatabaseLocks {
        &self.locks
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    /// The store for a database id given in a request path.
    ///
    /// Ids are UUIDs; any accepted spelling maps to the lower-case
    /// hyphenated form so one database has one directory.
    pub fn database(&self, raw_id: &str) -> ServerResult<(String, DiskFileStore)> {
        let id = Uuid::parse_str(raw_id)
            .map_err(|_| ServerError::InvalidDatabaseId(raw_id.to_string()))?
            .hyphenated()
            .to_string();
        let store = self.storage.database(&id)?;
        Ok((id, store))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcat_publish::LogHook;

    #[test]
    fn database_ids_are_canonical_uuids() {
        let state = AppState::new(&ServerConfig::default(), Arc::new(LogHook));
        let (id, store) = state
            .database("6E6A2B4C-1F0D-4C8E-9E2B-2B6F0F8D9A11")
            .unwrap();
        assert_eq!(id, "6e6a2b4c-1f0d-4c8e-9e2b-2b6f0f8d9a11");
        assert!(store.dir().ends_with(&id));

        assert!(matches!(
            state.database("../etc"),
            Err(ServerError::InvalidDatabaseId(_))
        ));
    }
}
