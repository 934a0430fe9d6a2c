#![allow(clippy::result_large_err)]
//! octave-core: OCTAVE document language core library.
//!
//! Turns OCTAVE source text into canonical text, recording every change
//! made on the way, and validates documents against holographic schemas.
//!
//! # Public API
//!
//! Key types are re-exported at the crate root for convenience:
//!
//! - [`canonicalize()`] -- lex, parse, validate and emit in one call
//! - [`tokenize()`] / [`parse()`] / [`emit()`] -- the individual stages
//! - [`Schema`] -- a loaded schema; [`SchemaSource`] resolves one by name
//! - [`eject()`] -- projections for other readers and formats
//! - [`OctaveError`] -- the error type of every fallible stage

/// OCTAVE language version emitted in diagnostics and tool output.
pub const OCTAVE_VERSION: &str = "1.0";

pub mod ast;
pub mod eject;
pub mod emit;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod pipeline;
pub mod repair;
pub mod schema;

// ── Convenience re-exports: key types ────────────────────────────────

pub use ast::{Assignment, Ast, Block, Document, Entry, SectionTarget, SetOutcome, Value};
pub use error::{Diagnostic, ErrorCode, ErrorKind, LexError, OctaveError, ParseError, SchemaError};
pub use repair::{RepairConfig, RepairEntry, RepairLog, RepairTier};
pub use schema::{
    FileSystemSchemas, InMemorySchemas, Schema, SchemaSource, ValidationError, ValidationStatus,
};

// ── Convenience re-exports: pipeline entry points ────────────────────

pub use eject::{eject, template, EjectFormat, EjectMode, Ejection};
pub use emit::emit;
pub use lexer::tokenize;
pub use parser::{parse, parse_with_warnings};
pub use pipeline::{canonicalize, canonicalize_against, select_schema, Canonicalized};
