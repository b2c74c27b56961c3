//! Foundation types for the product catalog store.
//!
//! A catalog is stored as a flat directory of immutable, content-referenced
//! files. This crate provides the file-name grammar that maps logical
//! objects to canonical names and back, the JSON payload shapes of each
//! object kind, and the wire types shared by the publish protocol.
//!
//! # Key Types
//!
//! - [`CatalogFile`] -- A logical object together with its identifiers
//! - [`FileKind`] -- The kind of object a file name denotes
//! - [`TempSuffix`] -- The `_<uuid>.json` suffix staged uploads carry
//! - [`FileWithRefs`] -- The minimal shape every `.json` object parses as
//! - [`SaveMode`] / [`PublishResponse`] -- Publish request and response

pub mod error;
pub mod file_name;
pub mod object;
pub mod publish;
pub mod temp;

pub use error::TypeError;
pub use file_name::{
    classify, is_leaf, normalize, validate_upload_name, CatalogFile, FileKind, ROOT_FILE_NAME,
};
pub use object::{
    FileRefMap, FileWithRefs, LatestTransaction, ProductFile, ProductTableFile, RefMap,
    ReleaseFile, RootFile, TransactionFile, TreeFile,
};
pub use publish::{PublishResponse, SaveMode};
pub use temp::{is_staged_name, split_staged_name, TempSuffix};
