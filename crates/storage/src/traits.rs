use crate::error::StorageError;
use crate::record::StoredDocument;

/// What the writer believes is currently stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expected {
    /// Overwrite whatever is there.
    Any,
    /// Only create; fail if a document already exists.
    Absent,
    /// Only replace content with this hash.
    Hash(String),
}

impl Expected {
    /// The precondition matching a previously observed read.
    pub fn observed(current: Option<&StoredDocument>) -> Self {
        match current {
            Some(doc) => Expected::Hash(doc.hash.clone()),
            None => Expected::Absent,
        }
    }

    pub(crate) fn check(&self, path: &str, current: Option<&str>) -> Result<(), StorageError> {
        let ok = match (self, current) {
            (Expected::Any, _) => true,
            (Expected::Absent, None) => true,
            (Expected::Hash(h), Some(actual)) => h == actual,
            _ => false,
        };
        if ok {
            return Ok(());
        }
        Err(StorageError::ConcurrentConflict {
            path: path.to_owned(),
            expected: match self {
                Expected::Hash(h) => h.clone(),
                Expected::Absent => "no document".to_owned(),
                Expected::Any => "any".to_owned(),
            },
            actual: current.map(str::to_owned),
        })
    }
}

/// The storage trait for OCTAVE documents.
///
/// ## Compare-and-swap
///
/// `write` checks `expected` against the hash of the stored content and
/// replaces it in one step. Two writers presenting the same stale hash can
/// never both succeed: the second sees the first's content and gets
/// `Err(StorageError::ConcurrentConflict { .. })`.
///
/// ## Atomicity
///
/// A reader observes either the old or the new content, never a mix.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` to be shared across
/// server handlers and threads.
pub trait DocumentStore: Send + Sync + 'static {
    /// Read the document at `path`.
    ///
    /// Returns `Err(StorageError::NotFound)` if nothing is stored there.
    fn read(&self, path: &str) -> Result<StoredDocument, StorageError>;

    /// Replace (or create) the document at `path` if `expected` holds.
    fn write(
        &self,
        path: &str,
        content: &str,
        expected: &Expected,
    ) -> Result<StoredDocument, StorageError>;

    /// Read, treating a missing document as `None`.
    fn read_optional(&self, path: &str) -> Result<Option<StoredDocument>, StorageError> {
        match self.read(path) {
            Ok(doc) => Ok(Some(doc)),
            Err(StorageError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
