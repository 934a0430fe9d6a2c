//! Full canonicalization pipeline: source text -> canonical text.
//!
//! This is a thin orchestrator that calls each stage in order and threads
//! a single repair log through them. Every stage is pure; the result is
//! freshly owned.

use crate::ast::Ast;
use crate::emit::emit;
use crate::error::{ErrorCode, OctaveError, ParseError};
use crate::lexer::tokenize;
use crate::parser::{parse, parse_with_warnings};
use crate::repair::{RepairConfig, RepairLog};
use crate::schema::{validate_document, Route, Schema, ValidationError, ValidationStatus};

/// Everything one pipeline call produces.
#[derive(Debug, Clone, PartialEq)]
pub struct Canonicalized {
    pub ast: Ast,
    pub canonical: String,
    pub repair_log: RepairLog,
    pub validation_status: ValidationStatus,
    pub validation_errors: Vec<ValidationError>,
    pub routes: Vec<Route>,
}

impl Canonicalized {
    pub fn is_valid(&self) -> bool {
        self.validation_status != ValidationStatus::Invalid
    }
}

/// Lex, parse, validate (when a schema is bound) and emit.
pub fn canonicalize(
    src: &str,
    config: &RepairConfig,
    schema: Option<&Schema>,
) -> Result<Canonicalized, OctaveError> {
    canonicalize_against(src, config, schema, None)
}

/// As [`canonicalize`], with the previously stored version of the content
/// for `APPEND_ONLY` checks. Documents are matched by envelope name.
pub fn canonicalize_against(
    src: &str,
    config: &RepairConfig,
    schema: Option<&Schema>,
    previous: Option<&Ast>,
) -> Result<Canonicalized, OctaveError> {
    let mut log = RepairLog::new();

    // Lexing: alias normalization
    let lexed = tokenize(src)?;
    log.extend(lexed.repairs);

    // Parsing: layout normalization
    let parsed = if config.lenient {
        parse_with_warnings(lexed.tokens, config.envelope_hint.as_deref())?
    } else {
        parse(lexed.tokens)?
    };
    log.extend(parsed.repairs);
    let mut ast = parsed.ast;

    // Validation and value-level repair
    let mut validation_errors = Vec::new();
    let mut routes = Vec::new();
    let validation_status = match schema {
        None => ValidationStatus::Unvalidated,
        Some(schema) => {
            for doc in &mut ast.documents {
                let prev = previous.and_then(|p| p.documents.iter().find(|d| d.name == doc.name));
                let v = validate_document(doc, schema, config, prev, &mut log);
                *doc = v.document;
                validation_errors.extend(v.errors);
                routes.extend(v.routes);
            }
            if validation_errors.is_empty() {
                ValidationStatus::Validated
            } else {
                ValidationStatus::Invalid
            }
        }
    };

    let canonical = emit(&ast);
    tracing::debug!(
        documents = ast.documents.len(),
        repairs = log.len(),
        status = ?validation_status,
        "canonicalized"
    );
    Ok(Canonicalized {
        ast,
        canonical,
        repair_log: log,
        validation_status,
        validation_errors,
        routes,
    })
}

/// Pick the schema for a document: the explicit name, else META `TYPE`,
/// else the envelope name. A document with none of these is E002.
pub fn select_schema(src: &str, explicit: Option<&str>) -> Result<String, OctaveError> {
    if let Some(name) = explicit {
        return Ok(name.to_owned());
    }
    if src.trim().is_empty() {
        return Err(no_selector());
    }
    let lexed = tokenize(src)?;
    let parsed = parse_with_warnings(lexed.tokens, None)?;
    let synthesized = parsed
        .repairs
        .iter()
        .any(|r| r.rule_id == "envelope_synthesized");
    let doc = parsed.ast.documents.first();
    let from_meta = doc
        .and_then(|d| d.meta_value("TYPE"))
        .and_then(|v| v.as_text())
        .map(str::to_owned);
    match (from_meta, doc) {
        (Some(name), _) => Ok(name),
        (None, Some(d)) if !synthesized => Ok(d.name.clone()),
        _ => Err(no_selector()),
    }
}

fn no_selector() -> OctaveError {
    ParseError::new(
        ErrorCode::MissingSchemaSelector,
        1,
        1,
        "",
        "no schema name given and the document has no envelope or META TYPE",
    )
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unvalidated_without_schema() {
        let out = canonicalize("===D===\nK::1\n===END===\n", &RepairConfig::default(), None).unwrap();
        assert_eq!(out.validation_status, ValidationStatus::Unvalidated);
        assert!(out.validation_errors.is_empty());
        assert!(out.repair_log.is_empty());
    }

    #[test]
    fn lexical_entries_precede_parse_entries() {
        let out = canonicalize("K :: A->B\n", &RepairConfig::default(), None).unwrap();
        let rules: Vec<&str> = out
            .repair_log
            .entries()
            .iter()
            .map(|e| e.rule_id.as_str())
            .collect();
        assert_eq!(
            rules,
            vec!["ascii_alias_flow", "envelope_synthesized", "assign_whitespace_collapsed"]
        );
        assert_eq!(out.canonical, "===INFERRED===\nK::A→B\n===END===\n");
    }

    #[test]
    fn strict_config_refuses_missing_envelope() {
        let err = canonicalize("K::1\n", &RepairConfig::strict(), None).unwrap_err();
        assert_eq!(err.code(), ErrorCode::MalformedEnvelope);
    }

    #[test]
    fn schema_selection() {
        assert_eq!(select_schema("", Some("X")).unwrap(), "X");
        assert_eq!(
            select_schema("===DOC===\nMETA:\n  TYPE::SESSION\n===END===\n", None).unwrap(),
            "SESSION"
        );
        assert_eq!(select_schema("===DOC===\nK::1\n===END===\n", None).unwrap(), "DOC");
        assert_eq!(
            select_schema("K::1\n", None).unwrap_err().code(),
            ErrorCode::MissingSchemaSelector
        );
        assert_eq!(
            select_schema("\n", None).unwrap_err().code(),
            ErrorCode::MissingSchemaSelector
        );
    }
}
