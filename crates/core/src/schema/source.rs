//! Schema lookup by name.
//!
//! The [`SchemaSource`] trait keeps schema resolution out of the pure
//! pipeline. [`FileSystemSchemas`] reads `<dir>/<NAME>.oct.md`;
//! [`InMemorySchemas`] serves tests and embedded callers.

use super::Schema;
use crate::error::{OctaveError, SchemaError};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const SCHEMA_EXTENSION: &str = "oct.md";

/// Resolves a schema name to a loaded [`Schema`].
pub trait SchemaSource {
    /// Raw OCTAVE text of the named schema.
    fn read_schema(&self, name: &str) -> Result<String, SchemaError>;

    fn load(&self, name: &str) -> Result<Schema, OctaveError> {
        let text = self.read_schema(name)?;
        let schema = Schema::from_source(&text)?;
        tracing::debug!(schema = name, "schema resolved");
        Ok(schema)
    }
}

/// Schema names are plain words; anything else could escape the directory.
fn check_name(name: &str) -> Result<(), SchemaError> {
    if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(SchemaError::not_found(
            name,
            "schema names may only contain letters, digits and '_'",
        ))
    }
}

/// Directory-backed schemas.
pub struct FileSystemSchemas {
    dir: PathBuf,
}

impl FileSystemSchemas {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileSystemSchemas { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", name, SCHEMA_EXTENSION))
    }
}

impl SchemaSource for FileSystemSchemas {
    fn read_schema(&self, name: &str) -> Result<String, SchemaError> {
        check_name(name)?;
        let path = self.path_for(name);
        std::fs::read_to_string(&path)
            .map_err(|e| SchemaError::not_found(name, format!("{}: {}", path.display(), e)))
    }
}

/// Schemas held in memory, keyed by name.
#[derive(Default)]
pub struct InMemorySchemas {
    schemas: HashMap<String, String>,
}

impl InMemorySchemas {
    pub fn new(schemas: HashMap<String, String>) -> Self {
        Self { schemas }
    }

    pub fn with(mut self, name: &str, text: &str) -> Self {
        self.schemas.insert(name.to_owned(), text.to_owned());
        self
    }
}

impl SchemaSource for InMemorySchemas {
    fn read_schema(&self, name: &str) -> Result<String, SchemaError> {
        check_name(name)?;
        self.schemas
            .get(name)
            .cloned()
            .ok_or_else(|| SchemaError::not_found(name, "no such schema in memory"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    const TINY: &str = "===TINY===\nX::[1∧REQ]\n===END===\n";

    #[test]
    fn in_memory_load() {
        let source = InMemorySchemas::default().with("TINY", TINY);
        let schema = source.load("TINY").unwrap();
        assert_eq!(schema.fields.len(), 1);
    }

    #[test]
    fn in_memory_not_found() {
        let err = InMemorySchemas::default().load("MISSING").unwrap_err();
        assert_eq!(err.code(), ErrorCode::SchemaNotFound);
    }

    #[test]
    fn filesystem_load_and_path_escape() {
        let dir = std::env::temp_dir().join(format!("octave-schemas-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("TINY.oct.md"), TINY).unwrap();
        let source = FileSystemSchemas::new(&dir);
        assert_eq!(source.load("TINY").unwrap().name, "TINY");
        assert_eq!(
            source.load("../TINY").unwrap_err().code(),
            ErrorCode::SchemaNotFound
        );
        assert_eq!(
            source.load("NOPE").unwrap_err().code(),
            ErrorCode::SchemaNotFound
        );
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
