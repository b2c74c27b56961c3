//! Canonical file names for catalog objects.
//!
//! Every object lives in a flat per-database directory under a name that
//! encodes its kind and identity:
//!
//! ```text
//! root.json
//! release_<id>.json
//! transaction_<tx>.json
//! product_<id>@<tx>.json
//! table_<id>@<tx>.json
//! tree_<id>@<hash>.json
//! blob_<hash>
//! ```
//!
//! String identifiers are lower-cased when a name is built, so lookups must
//! lower-case too (see [`normalize`]). Only blob names lack the `.json`
//! suffix, which is what makes them leaves of the reference graph.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// The single entry point of every database.
pub const ROOT_FILE_NAME: &str = "root.json";

pub(crate) const JSON_SUFFIX: &str = ".json";

/// The kind of object a file name denotes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Root,
    Release,
    Transaction,
    Product,
    Table,
    Tree,
    Blob,
}

impl FileKind {
    /// The name prefix (before the first `_`) used for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Root => "root",
            Self::Release => "release",
            Self::Transaction => "transaction",
            Self::Product => "product",
            Self::Table => "table",
            Self::Tree => "tree",
            Self::Blob => "blob",
        }
    }

    /// Whether objects of this kind are JSON documents that may carry refs.
    pub fn has_refs(&self) -> bool {
        !matches!(self, Self::Blob)
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileKind {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "root" => Ok(Self::Root),
            "release" => Ok(Self::Release),
            "transaction" => Ok(Self::Transaction),
            "product" => Ok(Self::Product),
            "table" => Ok(Self::Table),
            "tree" => Ok(Self::Tree),
            "blob" => Ok(Self::Blob),
            other => Err(TypeError::UnknownKind(other.to_string())),
        }
    }
}

/// A logical catalog object identified by its kind and identifiers.
///
/// Construct through the kind-specific builders, which lower-case string
/// identifiers, then render with [`CatalogFile::file_name`]. Parsing a
/// rendered name yields an equal value.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CatalogFile {
    Root,
    Release { release_id: String },
    Transaction { tx: u64 },
    Product { product_id: String, tx: u64 },
    Table { table_id: String, tx: u64 },
    Tree { tree_id: String, hash: String },
    Blob { hash: String },
}

impl CatalogFile {
    pub fn root() -> Self {
        Self::Root
    }

    pub fn release(release_id: &str) -> Self {
        Self::Release {
            release_id: release_id.to_lowercase(),
        }
    }

    pub fn transaction(tx: u64) -> Self {
        Self::Transaction { tx }
    }

    pub fn product(product_id: &str, tx: u64) -> Self {
        Self::Product {
            product_id: product_id.to_lowercase(),
            tx,
        }
    }

    pub fn table(table_id: &str, tx: u64) -> Self {
        Self::Table {
            table_id: table_id.to_lowercase(),
            tx,
        }
    }

    pub fn tree(tree_id: &str, hash: &str) -> Self {
        Self::Tree {
            tree_id: tree_id.to_lowercase(),
            hash: hash.to_lowercase(),
        }
    }

    pub fn blob(hash: &str) -> Self {
        Self::Blob {
            hash: hash.to_lowercase(),
        }
    }

    pub fn kind(&self) -> FileKind {
        match self {
            Self::Root => FileKind::Root,
            Self::Release { .. } => FileKind::Release,
            Self::Transaction { .. } => FileKind::Transaction,
            Self::Product { .. } => FileKind::Product,
            Self::Table { .. } => FileKind::Table,
            Self::Tree { .. } => FileKind::Tree,
            Self::Blob { .. } => FileKind::Blob,
        }
    }

    /// Render the canonical file name.
    pub fn file_name(&self) -> String {
        match self {
            Self::Root => ROOT_FILE_NAME.to_string(),
            Self::Release { release_id } => format!("release_{release_id}.json"),
            Self::Transaction { tx } => format!("transaction_{tx}.json"),
            Self::Product { product_id, tx } => format!("product_{product_id}@{tx}.json"),
            Self::Table { table_id, tx } => format!("table_{table_id}@{tx}.json"),
            Self::Tree { tree_id, hash } => format!("tree_{tree_id}@{hash}.json"),
            Self::Blob { hash } => format!("blob_{hash}"),
        }
    }

    /// Parse a canonical file name back into its identifiers.
    ///
    /// # Examples
    ///
    /// ```
    /// use pcat_types::CatalogFile;
    ///
    /// let file = CatalogFile::parse("product_ffe9@533250.json").unwrap();
    /// assert_eq!(file, CatalogFile::product("ffe9", 533250));
    /// assert!(CatalogFile::parse("product_ffe9.json").is_err());
    /// ```
    pub fn parse(name: &str) -> Result<Self, TypeError> {
        let (kind, identifier) = classify(name)?;
        if kind.has_refs() && !name.ends_with(JSON_SUFFIX) {
            return Err(TypeError::invalid(name, "missing .json suffix"));
        }
        if kind != FileKind::Root && identifier.is_empty() {
            return Err(TypeError::invalid(name, "empty identifier"));
        }

        match kind {
            FileKind::Root => {
                if name == ROOT_FILE_NAME {
                    Ok(Self::Root)
                } else {
                    Err(TypeError::invalid(name, "root file must be named root.json"))
                }
            }
            FileKind::Release => Ok(Self::Release {
                release_id: identifier.to_string(),
            }),
            FileKind::Transaction => Ok(Self::Transaction {
                tx: parse_tx(identifier)?,
            }),
            FileKind::Product => {
                let (id, tx) = split_at_sign(name, identifier)?;
                Ok(Self::Product {
                    product_id: id.to_string(),
                    tx: parse_tx(tx)?,
                })
            }
            FileKind::Table => {
                let (id, tx) = split_at_sign(name, identifier)?;
                Ok(Self::Table {
                    table_id: id.to_string(),
                    tx: parse_tx(tx)?,
                })
            }
            FileKind::Tree => {
                let (id, hash) = split_at_sign(name, identifier)?;
                Ok(Self::Tree {
                    tree_id: id.to_string(),
                    hash: hash.to_string(),
                })
            }
            FileKind::Blob => {
                if name.ends_with(JSON_SUFFIX) {
                    return Err(TypeError::invalid(name, "blob names carry no suffix"));
                }
                Ok(Self::Blob {
                    hash: identifier.to_string(),
                })
            }
        }
    }
}

impl fmt::Display for CatalogFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_name())
    }
}

impl FromStr for CatalogFile {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Split a file name into its kind and identifier.
///
/// The kind is the part before the first `_`; the identifier is the rest
/// with any `.json` suffix stripped. `root.json` has an empty identifier.
///
/// ```
/// use pcat_types::{classify, FileKind};
///
/// assert_eq!(
///     classify("product_324234234@12312.json").unwrap(),
///     (FileKind::Product, "324234234@12312")
/// );
/// assert_eq!(classify("blob_deadbeef").unwrap(), (FileKind::Blob, "deadbeef"));
/// ```
pub fn classify(name: &str) -> Result<(FileKind, &str), TypeError> {
    let stem = name.strip_suffix(JSON_SUFFIX).unwrap_or(name);
    match stem.split_once('_') {
        Some((prefix, identifier)) => Ok((prefix.parse()?, identifier)),
        None => match stem.parse()? {
            FileKind::Root => Ok((FileKind::Root, "")),
            _ => Err(TypeError::invalid(name, "missing identifier")),
        },
    }
}

/// A file is a leaf of the reference graph iff it is not a JSON document.
pub fn is_leaf(name: &str) -> bool {
    !name.ends_with(JSON_SUFFIX)
}

/// Lower-case a file name for lookup against the canonical store.
pub fn normalize(name: &str) -> String {
    name.to_lowercase()
}

/// Reject client-supplied names that could escape the database directory.
pub fn validate_upload_name(name: &str) -> Result<(), TypeError> {
    if name.is_empty() {
        return Err(TypeError::invalid(name, "file name must not be empty"));
    }
    if name == "." || name.contains("..") {
        return Err(TypeError::invalid(name, "must not contain '..'"));
    }
    if name.contains(['/', '\\', '\0']) {
        return Err(TypeError::invalid(name, "must not contain path separators"));
    }
    Ok(())
}

fn split_at_sign<'a>(name: &str, identifier: &'a str) -> Result<(&'a str, &'a str), TypeError> {
    match identifier.split_once('@') {
        Some((left, right)) if !left.is_empty() && !right.is_empty() => Ok((left, right)),
        _ => Err(TypeError::invalid(name, "expected <id>@<version>")),
    }
}

fn parse_tx(s: &str) -> Result<u64, TypeError> {
    s.parse().map_err(|_| TypeError::InvalidTx(s.to_string()))
}
