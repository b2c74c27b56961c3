use pcat_types::TypeError;

/// Errors from file store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The named file does not exist.
    #[error("file not found: {0}")]
    NotFound(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error on {name}: {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// The file name is not acceptable for this store.
    #[error("invalid file name: {0}")]
    InvalidName(#[from] TypeError),

    /// A failure injected by a test backend.
    #[error("injected failure on {0}")]
    Injected(String),
}

impl StoreError {
    pub(crate) fn io(name: impl Into<String>, source: std::io::Error) -> Self {
        let name = name.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound(name)
        } else {
            Self::Io { name, source }
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
