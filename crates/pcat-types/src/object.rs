//! JSON payloads of catalog objects.
//!
//! Every non-blob object is a `{ "data": ..., "refs": ... }` document. The
//! `data` section never holds file names directly: it holds small integer
//! ref ids that index into the object's `refs` map. Shared children (for
//! example one table used by many products) thereby appear once per file.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::file_name::CatalogFile;

/// Symbolic name -> ref id, as found in `data` sections.
pub type FileRefMap = BTreeMap<String, u32>;

/// Ref id -> file name of a child object.
pub type RefMap = BTreeMap<u32, String>;

/// The minimal shape every `.json` object must parse as.
///
/// Objects without outgoing references (trees) omit `refs` entirely.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileWithRefs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refs: Option<RefMap>,
}

impl FileWithRefs {
    /// Parse the refs of a JSON object, ignoring everything else.
    pub fn from_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    /// File names of every direct child.
    pub fn child_names(&self) -> impl Iterator<Item = &str> {
        self.refs.iter().flat_map(|refs| refs.values().map(String::as_str))
    }
}

// ---------------------------------------------------------------------------
// Root
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RootFile {
    pub data: RootData,
    #[serde(default)]
    pub refs: RefMap,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RootData {
    /// Marker name -> ref id of a release or transaction file.
    #[serde(default)]
    pub markers: FileRefMap,
    pub latest: LatestTransaction,
    /// Tree name -> ref id of a tree file.
    #[serde(default)]
    pub trees: FileRefMap,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestTransaction {
    pub tx: u64,
    pub date: u64,
    pub transaction: u64,
}

impl RootFile {
    /// File name a marker points at, if the marker and its ref exist.
    pub fn marker_file(&self, marker: &str) -> Option<&str> {
        resolve(&self.data.markers, &self.refs, marker)
    }

    /// File name of a named tree.
    pub fn tree_file(&self, tree: &str) -> Option<&str> {
        resolve(&self.data.trees, &self.refs, tree)
    }

    /// The newest transaction, named directly by number rather than by ref.
    pub fn latest_transaction_file(&self) -> CatalogFile {
        CatalogFile::transaction(self.data.latest.transaction)
    }
}

// ---------------------------------------------------------------------------
// Release / Transaction
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReleaseFile {
    pub data: ReleaseData,
    #[serde(default)]
    pub refs: RefMap,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReleaseData {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub products: FileRefMap,
}

/// All products as they looked at a given transaction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransactionFile {
    pub data: TransactionData,
    #[serde(default)]
    pub refs: RefMap,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransactionData {
    pub tx: u64,
    pub date: u64,
    #[serde(default)]
    pub products: FileRefMap,
}

impl ReleaseFile {
    pub fn product_file(&self, product_key: &str) -> Option<&str> {
        resolve(&self.data.products, &self.refs, product_key)
    }
}

impl TransactionFile {
    pub fn product_file(&self, product_key: &str) -> Option<&str> {
        resolve(&self.data.products, &self.refs, product_key)
    }
}

// ---------------------------------------------------------------------------
// Product / ProductTable
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductFile {
    pub data: ProductData,
    #[serde(default)]
    pub refs: RefMap,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductData {
    pub id: String,
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub retired: bool,
    #[serde(default)]
    pub tables: FileRefMap,
}

impl ProductFile {
    pub fn table_file(&self, table: &str) -> Option<&str> {
        resolve(&self.data.tables, &self.refs, table)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductTableFile {
    pub data: ProductTableData,
    #[serde(default)]
    pub refs: RefMap,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductTableData {
    pub id: String,
    pub module: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub columns: Vec<TableColumn>,
    #[serde(default)]
    pub rows: Vec<Vec<Cell>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TableColumn {
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    Text,
    LongText,
    PropertyFilter,
    PropertyValues,
    Blob,
    FixedDiscrete,
    DynamicDiscrete,
    Number,
    Product,
    Property,
    Quantity,
    Unit,
    TextId,
    PrimaryKey,
    ForeignKey,
}

/// A table cell: text, number, or empty.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Text(String),
    Number(f64),
    Null,
}

impl ProductTableFile {
    /// Blob files referenced by cells of `Blob` columns.
    ///
    /// Blobs are located by naming convention only; they do not go through
    /// `refs` unless the publisher also lists them there.
    pub fn blob_files(&self) -> Vec<CatalogFile> {
        let blob_columns: Vec<usize> = self
            .data
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.column_type == ColumnType::Blob)
            .map(|(i, _)| i)
            .collect();

        let mut files = Vec::new();
        for row in &self.data.rows {
            for &i in &blob_columns {
                if let Some(Cell::Text(hash)) = row.get(i) {
                    if !hash.is_empty() {
                        files.push(CatalogFile::blob(hash));
                    }
                }
            }
        }
        files
    }
}

// ---------------------------------------------------------------------------
// Tree
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TreeFile {
    pub id: String,
    pub name: String,
    pub relations: Vec<TreeRelation>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeRelation {
    pub child_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub sort_no: i64,
}

fn resolve<'a>(symbols: &FileRefMap, refs: &'a RefMap, key: &str) -> Option<&'a str> {
    symbols
        .get(key)
        .and_then(|id| refs.get(id))
        .map(String::as_str)
}
