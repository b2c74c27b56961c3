use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid file name {name:?}: {reason}")]
    InvalidFileName { name: String, reason: String },

    #[error("unknown file kind: {0}")]
    UnknownKind(String),

    #[error("invalid transaction number: {0}")]
    InvalidTx(String),
}

impl TypeError {
    pub(crate) fn invalid(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidFileName {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}
