use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use async_trait::async_trait;
use tracing::debug;

use pcat_types::validate_upload_name;

use crate::error::{StoreError, StoreResult};
use crate::traits::FileStore;

/// The directory holding one sub-directory per database.
#[derive(Clone, Debug)]
pub struct StorageRoot {
    root: PathBuf,
}

impl StorageRoot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// The store for one database. The id must be a single path component.
    pub fn database(&self, database_id: &str) -> StoreResult<DiskFileStore> {
        validate_upload_name(database_id)?;
        Ok(DiskFileStore::new(self.root.join(database_id)))
    }
}

/// A database stored as a flat directory on the local filesystem.
#[derive(Clone, Debug)]
pub struct DiskFileStore {
    dir: PathBuf,
}

impl DiskFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, name: &str) -> StoreResult<PathBuf> {
        validate_upload_name(name)?;
        Ok(self.dir.join(name))
    }
}

#[async_trait]
impl FileStore for DiskFileStore {
    async fn list(&self) -> StoreResult<HashSet<String>> {
        let mut names = HashSet::new();
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(names),
            Err(e) => return Err(StoreError::io(self.dir.display().to_string(), e)),
        };

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::io(self.dir.display().to_string(), e))?
        {
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| StoreError::io(entry.path().display().to_string(), e))?;
            if file_type.is_file() {
                names.insert(entry.file_name().to_string_lossy().into_owned());
            }
        }

        debug!(dir = %self.dir.display(), count = names.len(), "listed database directory");
        Ok(names)
    }

    async fn read(&self, name: &str) -> StoreResult<Option<Vec<u8>>> {
        let path = self.path(name)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(name, e)),
        }
    }

    async fn write(&self, name: &str, bytes: &[u8]) -> StoreResult<()> {
        let path = self.path(name)?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StoreError::io(self.dir.display().to_string(), e))?;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| StoreError::io(name, e))
    }

    async fn rename(&self, from: &str, to: &str) -> StoreResult<()> {
        let from_path = self.path(from)?;
        let to_path = self.path(to)?;
        tokio::fs::rename(&from_path, &to_path)
            .await
            .map_err(|e| StoreError::io(from, e))
    }

    async fn remove(&self, name: &str) -> StoreResult<()> {
        let path = self.path(name)?;
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| StoreError::io(name, e))
    }

    async fn modified(&self, name: &str) -> StoreResult<Option<SystemTime>> {
        let path = self.path(name)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) => meta.modified().map(Some).map_err(|e| StoreError::io(name, e)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(name, e)),
        }
    }
}
