use serde::{Deserialize, Serialize};

/// How uploaded files are persisted, from the `save` query parameter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveMode {
    /// Stage under temp names; commit only once nothing is missing.
    #[serde(rename = "ifcomplete")]
    IfComplete,
    /// Stage under temp names and always discard them (dry run).
    No,
    /// Files were written directly under their final names.
    #[default]
    Direct,
}

impl SaveMode {
    /// Parse the raw `save` query value. Absent or unrecognised values mean
    /// [`SaveMode::Direct`].
    pub fn from_query(value: Option<&str>) -> Self {
        match value {
            Some("ifcomplete") => Self::IfComplete,
            Some("no") => Self::No,
            _ => Self::Direct,
        }
    }

    /// Whether uploads in this mode are written under temp names.
    pub fn is_staged(&self) -> bool {
        matches!(self, Self::IfComplete | Self::No)
    }
}

/// Body returned by every publish request.
///
/// An empty list means the uploaded graph is fully reachable on the server.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishResponse {
    pub missing_files: Vec<String>,
}

impl PublishResponse {
    pub fn new(missing_files: Vec<String>) -> Self {
        Self { missing_files }
    }

    pub fn is_complete(&self) -> bool {
        self.missing_files.is_empty()
    }
}
