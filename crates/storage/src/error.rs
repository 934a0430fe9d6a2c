/// All errors that can be returned by a DocumentStore implementation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Compare-and-swap conflict: the stored content no longer has the hash
    /// the caller based its change on.
    #[error("concurrent conflict on {path}: expected {expected}, found {}", .actual.as_deref().unwrap_or("no document"))]
    ConcurrentConflict {
        path: String,
        expected: String,
        actual: Option<String>,
    },

    /// No document stored at the given path.
    #[error("document not found: {path}")]
    NotFound { path: String },

    /// The path resolves outside the store root.
    #[error("path escapes the store root: {path}")]
    OutsideRoot { path: String },

    /// Filesystem failure while reading or persisting.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    pub(crate) fn io(path: &str, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.to_owned(),
            source,
        }
    }
}
