//! File storage for the product catalog store.
//!
//! Each database is a flat directory of immutable files named by the
//! grammar in [`pcat_types::file_name`]. This crate abstracts that directory
//! behind the [`FileStore`] trait and provides the [`ExistenceIndex`], a
//! one-shot listing of the directory that a publish request consults instead
//! of issuing a stat per file.
//!
//! # Storage Backends
//!
//! - [`DiskFileStore`] -- one directory on the local filesystem (`tokio::fs`)
//! - [`InMemoryFileStore`] -- `HashMap`-based store with failure injection, for tests
//!
//! # Design Rules
//!
//! 1. Files are write-once: a name is absent or permanently immutable.
//! 2. Staged uploads become visible only through `rename`.
//! 3. Reads of committed files are always safe; only add and delete mutate.
//! 4. All I/O errors are propagated, never silently ignored.

pub mod disk;
pub mod error;
pub mod index;
pub mod memory;
pub mod traits;

pub use disk::{DiskFileStore, StorageRoot};
pub use error::{StoreError, StoreResult};
pub use index::ExistenceIndex;
pub use memory::InMemoryFileStore;
pub use traits::FileStore;
