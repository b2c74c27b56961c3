//! Temporary names for staged uploads.
//!
//! A staged file is written as `<final-name>_<uuid>.json`. The suffix always
//! ends in `.json` so a staged JSON object is still recognised as a node
//! with refs, and the uuid keeps concurrent uploads of the same name apart.

use std::fmt;

use uuid::Uuid;

use crate::file_name::{CatalogFile, JSON_SUFFIX};

/// The per-request suffix appended to every staged file name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TempSuffix(String);

impl TempSuffix {
    /// Generate a fresh suffix of the form `_<uuid-v4>.json`.
    pub fn new() -> Self {
        Self::from_uuid(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(format!("_{id}{JSON_SUFFIX}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The staged name for a final file name.
    pub fn stage(&self, final_name: &str) -> String {
        format!("{final_name}{}", self.0)
    }

    /// The final name for a staged name, or `None` if it carries another suffix.
    pub fn strip<'a>(&self, staged_name: &'a str) -> Option<&'a str> {
        staged_name
            .strip_suffix(self.0.as_str())
            .filter(|name| !name.is_empty())
    }
}

impl Default for TempSuffix {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TempSuffix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether a name is a canonical file name followed by a staging suffix.
pub fn is_staged_name(name: &str) -> bool {
    split_staged_name(name).is_some()
}

/// Split a staged name into its final name and the suffix it was staged
/// with, e.g. `root.json_<uuid>.json` into `("root.json", "_<uuid>.json")`.
pub fn split_staged_name(name: &str) -> Option<(&str, &str)> {
    let stem = name.strip_suffix(JSON_SUFFIX)?;
    let (prefix, id) = stem.rsplit_once('_')?;
    if Uuid::parse_str(id).is_err() || CatalogFile::parse(prefix).is_err() {
        return None;
    }
    Some(name.split_at(prefix.len()))
}
