//! octave-tools: the three boundary operations over the OCTAVE core.
//!
//! - [`validate()`] -- canonicalize and validate content against a schema
//! - [`write()`] -- canonicalize, validate and store with compare-and-swap
//! - [`eject()`] -- project a document (or a schema template) for a reader
//!
//! Requests and responses are serde types; the CLI and HTTP server
//! exchange them as JSON.

mod eject;
mod error;
mod validate;
mod write;

pub use eject::{eject, EjectRequest, EjectResponse};
pub use error::ToolError;
pub use validate::{validate, ValidateRequest, ValidateResponse};
pub use write::{parse_value_text, write, WriteRequest, WriteResponse};
