use octave_core::eject::EjectError;
use octave_core::schema::ValidationError;
use octave_core::{ErrorCode, OctaveError};
use octave_storage::StorageError;
use serde::{Serialize, Serializer};
use serde_json::json;

/// All errors returned by the boundary operations.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error(transparent)]
    Core(#[from] OctaveError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Eject(#[from] EjectError),

    /// The document failed validation and was not written.
    #[error("document is invalid ({} error(s)); nothing was written", errors.len())]
    Invalid { errors: Vec<ValidationError> },

    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl ToolError {
    pub(crate) fn request(message: impl Into<String>) -> Self {
        ToolError::InvalidRequest {
            message: message.into(),
        }
    }

    /// Stable code for the boundary: `E0xx` for core codes, a named code
    /// otherwise.
    pub fn code(&self) -> &'static str {
        match self {
            ToolError::Core(e) => e.code().as_str(),
            ToolError::Storage(StorageError::ConcurrentConflict { .. }) => {
                ErrorCode::BaseHashMismatch.as_str()
            }
            ToolError::Storage(StorageError::NotFound { .. }) => "NOT_FOUND",
            ToolError::Storage(StorageError::OutsideRoot { .. }) => "PATH_OUTSIDE_ROOT",
            ToolError::Storage(StorageError::Io { .. }) | ToolError::Io { .. } => "IO_ERROR",
            ToolError::Eject(_) => "EJECT_FAILED",
            ToolError::Invalid { .. } => ErrorCode::ConstraintViolation.as_str(),
            ToolError::InvalidRequest { .. } => "INVALID_REQUEST",
        }
    }

    /// Whether the caller sent something wrong, as opposed to a server fault.
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            ToolError::Storage(StorageError::Io { .. }) | ToolError::Io { .. } | ToolError::Eject(_)
        )
    }

    pub fn to_json_value(&self) -> serde_json::Value {
        match self {
            ToolError::Core(e) => e.to_json_value(),
            ToolError::Storage(StorageError::ConcurrentConflict {
                path,
                expected,
                actual,
            }) => json!({
                "kind": "write",
                "code": self.code(),
                "path": path,
                "expected_hash": expected,
                "actual_hash": actual,
                "message": self.to_string(),
                "rationale": ErrorCode::BaseHashMismatch.rationale(),
            }),
            ToolError::Invalid { errors } => json!({
                "kind": "validation",
                "code": self.code(),
                "message": self.to_string(),
                "validation_errors": errors,
            }),
            other => json!({
                "kind": "tool",
                "code": other.code(),
                "message": other.to_string(),
            }),
        }
    }
}

impl Serialize for ToolError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json_value().serialize(serializer)
    }
}
