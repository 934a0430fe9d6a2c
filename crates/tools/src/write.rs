use crate::ToolError;
use octave_core::ast::{Ast, Entry};
use octave_core::{
    canonicalize_against, emit, parse, parse_with_warnings, tokenize, OctaveError, RepairConfig, RepairEntry,
    SchemaSource, SetOutcome, Value, ValidationStatus,
};
use octave_storage::{DocumentStore, Expected};
use serde::{Deserialize, Serialize};
use similar::TextDiff;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WriteRequest {
    pub target_path: String,
    /// Full replacement text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Dot-joined field path -> OCTAVE value text, applied to the first
    /// document of the stored content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changes: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_hash: Option<String>,
    #[serde(default)]
    pub fix: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteResponse {
    pub success: bool,
    pub path: String,
    /// Unified line diff from the previous content.
    pub diff: String,
    pub canonical: String,
    pub hash: String,
    pub validation_status: ValidationStatus,
    pub repair_log: Vec<RepairEntry>,
}

/// Parse the text of a single OCTAVE value, e.g. `[a,b]` or `§INDEX`.
pub fn parse_value_text(text: &str) -> Result<Value, ToolError> {
    if text.contains('\n') {
        return Err(ToolError::request("a change value must be a single line"));
    }
    let src = format!("===VALUE===\nVALUE::{}\n===END===\n", text);
    let lexed = tokenize(&src).map_err(OctaveError::from)?;
    let ast = parse(lexed.tokens).map_err(OctaveError::from)?.ast;
    ast.documents
        .into_iter()
        .next()
        .and_then(|d| d.sections.into_iter().next())
        .and_then(|e| match e {
            Entry::Assignment(a) => Some(a.value),
            Entry::Block(_) | Entry::Comment(_) => None,
        })
        .ok_or_else(|| ToolError::request(format!("not a value: {}", text)))
}

fn parse_lenient(src: &str) -> Result<Ast, ToolError> {
    let lexed = tokenize(src).map_err(OctaveError::from)?;
    Ok(parse_with_warnings(lexed.tokens, None).map_err(OctaveError::from)?.ast)
}

fn apply_changes(current: &str, changes: &BTreeMap<String, String>) -> Result<String, ToolError> {
    let mut ast = parse_lenient(current)?;
    let doc = ast
        .documents
        .first_mut()
        .ok_or_else(|| ToolError::request("stored content has no document"))?;
    for (path, text) in changes {
        let value = parse_value_text(text)?;
        let segments: Vec<&str> = path.split('.').collect();
        match doc.set_value(&segments, value) {
            SetOutcome::Replaced | SetOutcome::Inserted => {}
            SetOutcome::NotAValue => {
                return Err(ToolError::request(format!("{} is a block, not a value", path)))
            }
            SetOutcome::MissingParent => {
                return Err(ToolError::request(format!("no block for {}", path)))
            }
        }
    }
    Ok(emit(&ast))
}

fn unified_diff(path: &str, old: &str, new: &str) -> String {
    TextDiff::from_lines(old, new)
        .unified_diff()
        .context_radius(3)
        .header(&format!("a/{}", path), &format!("b/{}", path))
        .to_string()
}

/// Canonicalize, validate (when a schema is named) and store.
///
/// An invalid document is not written. The store write is a compare-and-swap
/// against `base_hash` when given, else against the content read here.
pub fn write(
    req: &WriteRequest,
    store: &dyn DocumentStore,
    schemas: &dyn SchemaSource,
) -> Result<WriteResponse, ToolError> {
    let current = store.read_optional(&req.target_path)?;
    if let (Some(base), Some(doc)) = (&req.base_hash, &current) {
        if *base != doc.hash {
            return Err(octave_storage::StorageError::ConcurrentConflict {
                path: doc.path.clone(),
                expected: base.clone(),
                actual: Some(doc.hash.clone()),
            }
            .into());
        }
    }

    let src = match (&req.content, &req.changes) {
        (Some(c), None) => c.clone(),
        (None, Some(changes)) => {
            let existing = current.as_ref().ok_or_else(|| {
                ToolError::request(format!("{} does not exist; send content", req.target_path))
            })?;
            apply_changes(&existing.content, changes)?
        }
        (Some(_), Some(_)) => return Err(ToolError::request("give either content or changes, not both")),
        (None, None) => return Err(ToolError::request("content or changes is required")),
    };

    let schema = req.schema.as_deref().map(|n| schemas.load(n)).transpose()?;
    // the previous version only feeds APPEND_ONLY; unparseable content has none
    let previous = current
        .as_ref()
        .and_then(|doc| parse_lenient(&doc.content).ok());
    let config = RepairConfig {
        fix: req.fix,
        lenient: true,
        envelope_hint: req.schema.clone(),
    };
    let out = canonicalize_against(&src, &config, schema.as_ref(), previous.as_ref())?;
    if !out.is_valid() {
        tracing::warn!(
            path = %req.target_path,
            errors = out.validation_errors.len(),
            "write refused: document invalid"
        );
        return Err(ToolError::Invalid {
            errors: out.validation_errors,
        });
    }

    let expected = match &req.base_hash {
        Some(h) => Expected::Hash(h.clone()),
        None => Expected::observed(current.as_ref()),
    };
    let stored = store.write(&req.target_path, &out.canonical, &expected)?;
    let old = current.as_ref().map(|d| d.content.as_str()).unwrap_or("");
    let diff = unified_diff(&stored.path, old, &stored.content);

    Ok(WriteResponse {
        success: true,
        path: stored.path,
        diff,
        hash: stored.hash,
        canonical: out.canonical,
        validation_status: out.validation_status,
        repair_log: out.repair_log.into_entries(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use octave_core::SectionTarget;

    #[test]
    fn value_text_parses_every_value_form() {
        assert_eq!(
            parse_value_text("#INDEX").unwrap(),
            Value::Target(SectionTarget::new("INDEX"))
        );
        assert_eq!(parse_value_text("42").unwrap(), Value::Number("42".into()));
        assert!(matches!(parse_value_text("[a,b]").unwrap(), Value::List(_)));
        assert_eq!(parse_value_text("a\nb").unwrap_err().code(), "INVALID_REQUEST");
        assert_eq!(parse_value_text("a:b").unwrap_err().code(), "E001");
    }

    #[test]
    fn changes_replace_and_insert() {
        let mut changes = BTreeMap::new();
        changes.insert("CFG.DEPTH".to_owned(), "3".to_owned());
        changes.insert("NEW".to_owned(), "\"x\"".to_owned());
        let out = apply_changes("===D===\nCFG:\n  DEPTH::1\n===END===\n", &changes).unwrap();
        assert_eq!(out, "===D===\nCFG:\n  DEPTH::3\nNEW::\"x\"\n===END===\n");
    }

    #[test]
    fn changes_never_restructure() {
        let mut changes = BTreeMap::new();
        changes.insert("CFG".to_owned(), "1".to_owned());
        let err = apply_changes("===D===\nCFG:\n  DEPTH::1\n===END===\n", &changes).unwrap_err();
        assert_eq!(err.code(), "INVALID_REQUEST");
        let mut changes = BTreeMap::new();
        changes.insert("NOPE.X".to_owned(), "1".to_owned());
        let err = apply_changes("===D===\n===END===\n", &changes).unwrap_err();
        assert_eq!(err.code(), "INVALID_REQUEST");
    }

    #[test]
    fn diff_is_unified() {
        let d = unified_diff("a.oct.md", "K::1\n", "K::2\n");
        assert!(d.starts_with("--- a/a.oct.md\n+++ b/a.oct.md\n"));
        assert!(d.contains("-K::1\n+K::2\n"));
    }
}
