//! Constraint evaluation and value-level repair.
//!
//! Each bound field's chain is evaluated left to right and stops at the
//! first failure. With `fix` on, a failing constraint may be resolved by a
//! REPAIR (exactly one valid result) or refused as a FORBIDDEN attempt; it
//! is never resolved by guessing. Missing fields are reported, not filled.

use super::holographic::parse_decimal;
use super::{Constraint, FieldSchema, Schema, TypeKind};
use crate::ast::{Document, Entry, Value};
use crate::error::ErrorCode;
use crate::lexer::{is_single_token, TokenKind};
use crate::repair::{ForbiddenAction, RepairConfig, RepairEntry, RepairLog};
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Iso8601;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationStatus {
    /// No schema bound
    Unvalidated,
    Validated,
    Invalid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub code: ErrorCode,
    pub document: String,
    pub path: String,
    /// The failing constraint, canonical text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constraint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub message: String,
    pub rationale: String,
}

/// Where a validated field's value is directed downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub path: String,
    pub target: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Validation {
    /// The document with REPAIR-tier corrections applied
    pub document: Document,
    pub status: ValidationStatus,
    pub errors: Vec<ValidationError>,
    pub routes: Vec<Route>,
}

/// Why a single constraint failed.
enum Failure {
    Missing,
    Violation(String),
}

/// Result of attempting a repair for a failed constraint.
enum Attempt {
    Repaired(Value),
    Ambiguous(Vec<String>),
    Forbidden(ForbiddenAction),
    Impossible,
}

struct Checker<'a> {
    doc_name: &'a str,
    config: &'a RepairConfig,
    previous: Option<&'a Document>,
    log: &'a mut RepairLog,
    errors: Vec<ValidationError>,
}

impl<'a> Checker<'a> {
    fn error(
        &mut self,
        code: ErrorCode,
        path: &str,
        constraint: Option<&Constraint>,
        value: Option<&Value>,
        message: impl Into<String>,
    ) {
        self.errors.push(ValidationError {
            code,
            document: self.doc_name.to_owned(),
            path: path.to_owned(),
            constraint: constraint.map(ToString::to_string),
            value: value.map(ToString::to_string),
            message: message.into(),
            rationale: code.rationale().to_owned(),
        });
    }

    fn forbidden(&mut self, action: ForbiddenAction, path: &str, current: &str) {
        tracing::warn!(path, action = %action, "forbidden repair refused");
        self.log.push(RepairEntry::forbidden(action, path, current));
        self.error(
            ErrorCode::ForbiddenRepair,
            path,
            None,
            None,
            format!("refused to {}: {}", action, action.reason()),
        );
    }
}

/// Validate one document against a schema.
///
/// `previous` is the prior version of the document, used by `APPEND_ONLY`.
pub fn validate_document(
    doc: &Document,
    schema: &Schema,
    config: &RepairConfig,
    previous: Option<&Document>,
    log: &mut RepairLog,
) -> Validation {
    let mut repaired = doc.clone();
    let mut routes = Vec::new();
    let mut checker = Checker {
        doc_name: &doc.name,
        config,
        previous,
        log,
        errors: Vec::new(),
    };

    for block in &schema.blocks {
        let segments: Vec<&str> = block.segments.iter().map(String::as_str).collect();
        if let Some(Entry::Assignment(a)) = doc.find(&segments) {
            let current = a.value.to_string();
            if config.fix {
                checker.forbidden(ForbiddenAction::ReparentBlock, &block.path, &current);
            } else {
                checker.error(
                    ErrorCode::ConstraintViolation,
                    &block.path,
                    None,
                    Some(&a.value),
                    "schema declares a block here, the document has a value",
                );
            }
        }
    }

    for field in &schema.fields {
        let segments = field.segments();
        match doc.find(&segments) {
            None => check_missing(&mut checker, field),
            Some(Entry::Block(_)) => {
                if config.fix {
                    checker.forbidden(ForbiddenAction::ReparentBlock, &field.path, "<block>");
                } else {
                    checker.error(
                        ErrorCode::ConstraintViolation,
                        &field.path,
                        None,
                        None,
                        "schema declares a value here, the document has a block",
                    );
                }
            }
            Some(Entry::Comment(_)) => check_missing(&mut checker, field),
            Some(Entry::Assignment(a)) => {
                let Some(value) = check_chain(&mut checker, field, &a.value) else {
                    continue;
                };
                if value != a.value {
                    repaired.set_value(&segments, value.clone());
                }
                if let Some(target) = &field.target {
                    routes.push(Route {
                        path: field.path.clone(),
                        target: target.to_string(),
                        value: value.to_string(),
                    });
                }
            }
        }
    }

    let errors = checker.errors;
    let status = if errors.is_empty() {
        ValidationStatus::Validated
    } else {
        ValidationStatus::Invalid
    };
    tracing::debug!(
        document = %doc.name,
        schema = %schema.name,
        errors = errors.len(),
        routes = routes.len(),
        "validated"
    );
    Validation {
        document: repaired,
        status,
        errors,
        routes,
    }
}

/// The first of REQ/OPT in the chain decides whether absence is allowed.
fn check_missing(checker: &mut Checker<'_>, field: &FieldSchema) {
    let decisive = field
        .constraints
        .iter()
        .find(|c| matches!(c, Constraint::Required | Constraint::Optional));
    if !matches!(decisive, Some(Constraint::Required)) {
        return;
    }
    if checker.config.fix {
        checker.forbidden(ForbiddenAction::InsertRequiredField, &field.path, "<missing>");
    } else {
        checker.error(
            ErrorCode::ConstraintViolation,
            &field.path,
            Some(&Constraint::Required),
            None,
            "required field is missing",
        );
    }
}

/// Evaluate a chain on a present value. Returns the (possibly repaired)
/// value when every constraint passes.
fn check_chain(checker: &mut Checker<'_>, field: &FieldSchema, original: &Value) -> Option<Value> {
    let mut value = original.clone();
    let previous = checker
        .previous
        .and_then(|p| p.value_at(&field.segments()))
        .cloned();

    for constraint in &field.constraints {
        let failure = match check(constraint, &value, previous.as_ref()) {
            Ok(()) => continue,
            Err(f) => f,
        };
        let message = match failure {
            Failure::Missing => "required field is null".to_owned(),
            Failure::Violation(m) => m,
        };
        if !checker.config.fix {
            checker.error(
                ErrorCode::ConstraintViolation,
                &field.path,
                Some(constraint),
                Some(&value),
                message,
            );
            return None;
        }

        match attempt_repair(constraint, &value) {
            Attempt::Repaired(fixed) => {
                let rule = match constraint {
                    Constraint::Enum(_) => "enum_case_fold",
                    _ => "type_coercion",
                };
                checker.log.push(RepairEntry::repair(
                    rule,
                    &field.path,
                    value.to_string(),
                    fixed.to_string(),
                ));
                value = fixed;
                if let Err(f) = check(constraint, &value, previous.as_ref()) {
                    let message = match f {
                        Failure::Missing => "required field is null".to_owned(),
                        Failure::Violation(m) => m,
                    };
                    checker.error(
                        ErrorCode::ConstraintViolation,
                        &field.path,
                        Some(constraint),
                        Some(&value),
                        message,
                    );
                    return None;
                }
            }
            Attempt::Ambiguous(candidates) => {
                checker.error(
                    ErrorCode::AmbiguousEnumRepair,
                    &field.path,
                    Some(constraint),
                    Some(&value),
                    format!(
                        "{} matches several members case-insensitively: {}",
                        value,
                        candidates.join(", ")
                    ),
                );
                return None;
            }
            Attempt::Forbidden(action) => {
                let current = value.to_string();
                checker.forbidden(action, &field.path, &current);
                return None;
            }
            Attempt::Impossible => {
                checker.error(
                    ErrorCode::ConstraintViolation,
                    &field.path,
                    Some(constraint),
                    Some(&value),
                    message,
                );
                return None;
            }
        }
    }
    Some(value)
}

/// Text used by text-oriented constraints.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) | Value::Identifier(s) | Value::Number(s) => Some(s.clone()),
        Value::Boolean(b) => Some(b.to_string()),
        Value::Target(t) => Some(t.to_string()),
        _ => None,
    }
}

fn check(constraint: &Constraint, value: &Value, previous: Option<&Value>) -> Result<(), Failure> {
    let violation = |m: String| Err(Failure::Violation(m));
    match constraint {
        Constraint::Required => {
            if matches!(value, Value::Null) {
                Err(Failure::Missing)
            } else {
                Ok(())
            }
        }
        Constraint::Optional => Ok(()),
        Constraint::ConstEquals(expected) => {
            let same_text = matches!(
                (value.as_text(), expected.as_text()),
                (Some(a), Some(b)) if a == b
            );
            if value == expected || same_text {
                Ok(())
            } else {
                violation(format!("expected {}", expected))
            }
        }
        Constraint::Regex(re) => match scalar_text(value) {
            Some(text) if re.is_match(&text) => Ok(()),
            Some(_) => violation(format!("does not match /{}/", re.source)),
            None => violation(format!("a {} cannot match a pattern", value.type_name())),
        },
        Constraint::Enum(members) => match scalar_text(value) {
            Some(text) if members.iter().any(|m| *m == text) => Ok(()),
            _ => violation(format!("must be one of {}", members.join(", "))),
        },
        Constraint::Type(kind) => {
            if kind.admits(value) {
                Ok(())
            } else {
                violation(format!("expected {}, found {}", kind.name(), value.type_name()))
            }
        }
        Constraint::Directory => match value.as_text() {
            Some(p) if p.ends_with('/') => Ok(()),
            _ => violation("expected a directory path ending in '/'".to_owned()),
        },
        Constraint::AppendOnly => {
            let Value::List(now) = value else {
                return violation(format!("expected a list, found {}", value.type_name()));
            };
            match previous {
                None => Ok(()),
                Some(Value::List(before)) => {
                    let kept = before.items.len() <= now.items.len()
                        && before.items.iter().zip(&now.items).all(|(a, b)| a == b);
                    if kept {
                        Ok(())
                    } else {
                        violation("existing items were changed or removed".to_owned())
                    }
                }
                Some(other) => violation(format!(
                    "previous value was a {}, not a list",
                    other.type_name()
                )),
            }
        }
        Constraint::Range { min, max } => {
            let n = match value {
                Value::Number(raw) => parse_decimal(raw),
                _ => None,
            };
            match n {
                Some(n) if *min <= n && n <= *max => Ok(()),
                Some(n) => violation(format!("{} is outside [{}, {}]", n, min, max)),
                None => violation(format!("expected a number, found {}", value.type_name())),
            }
        }
        Constraint::MaxLength(limit) | Constraint::MinLength(limit) => {
            let len = match value {
                Value::String(s) | Value::Identifier(s) => s.chars().count(),
                Value::List(l) => l.items.len(),
                other => {
                    return violation(format!("a {} has no length", other.type_name()));
                }
            };
            let ok = match constraint {
                Constraint::MaxLength(_) => len <= *limit,
                _ => len >= *limit,
            };
            if ok {
                Ok(())
            } else {
                violation(format!("length {} violates {}", len, constraint))
            }
        }
        Constraint::Date => {
            let parsed = value
                .as_text()
                .map(|t| time::Date::parse(t, format_description!("[year]-[month]-[day]")));
            match parsed {
                Some(Ok(_)) => Ok(()),
                _ => violation("expected a YYYY-MM-DD date".to_owned()),
            }
        }
        Constraint::Iso8601 => {
            let ok = value.as_text().is_some_and(|t| {
                OffsetDateTime::parse(t, &Iso8601::DEFAULT).is_ok()
                    || PrimitiveDateTime::parse(t, &Iso8601::DEFAULT).is_ok()
            });
            if ok {
                Ok(())
            } else {
                violation("expected an ISO 8601 date-time".to_owned())
            }
        }
    }
}

/// Text that emits as a NUMBER token and reads back as the same number.
fn is_numeric_text(s: &str) -> bool {
    is_single_token(s, TokenKind::Number) && parse_decimal(s).is_some()
}

/// Enum members keep the value's spelling kind unless a bare word would
/// read back as something else (`true`, `in progress`).
fn enum_member_value(original: &Value, member: &str) -> Value {
    match original {
        Value::Identifier(_) if is_single_token(member, TokenKind::Identifier) => {
            Value::Identifier(member.to_owned())
        }
        _ => Value::String(member.to_owned()),
    }
}

/// The single repair a failed constraint admits, if any.
fn attempt_repair(constraint: &Constraint, value: &Value) -> Attempt {
    match constraint {
        Constraint::Enum(members) => {
            let Some(text) = value.as_text() else {
                return Attempt::Impossible;
            };
            let folded = text.to_lowercase();
            let candidates: Vec<&String> = members
                .iter()
                .filter(|m| m.to_lowercase() == folded)
                .collect();
            match candidates.as_slice() {
                [] => Attempt::Impossible,
                [only] => Attempt::Repaired(enum_member_value(value, only)),
                many => Attempt::Ambiguous(many.iter().map(|s| (*s).clone()).collect()),
            }
        }
        Constraint::Type(kind) => coerce(*kind, value),
        _ => Attempt::Impossible,
    }
}

fn coerce(kind: TypeKind, value: &Value) -> Attempt {
    match (kind, value) {
        (TypeKind::Number, Value::String(s) | Value::Identifier(s)) if is_numeric_text(s) => {
            Attempt::Repaired(Value::Number(s.clone()))
        }
        (TypeKind::Number, Value::Boolean(_)) => {
            Attempt::Forbidden(ForbiddenAction::RewriteValueMeaning)
        }
        (TypeKind::Boolean, Value::String(s) | Value::Identifier(s))
            if s == "true" || s == "false" =>
        {
            Attempt::Repaired(Value::Boolean(s == "true"))
        }
        (TypeKind::Boolean, Value::Number(_)) => {
            Attempt::Forbidden(ForbiddenAction::RewriteValueMeaning)
        }
        (TypeKind::String, Value::Number(raw)) => Attempt::Repaired(Value::String(raw.clone())),
        (TypeKind::String, Value::Identifier(s)) => Attempt::Repaired(Value::String(s.clone())),
        (TypeKind::String, Value::Boolean(_)) => {
            Attempt::Forbidden(ForbiddenAction::RewriteValueMeaning)
        }
        (TypeKind::Target, Value::Identifier(_) | Value::String(_)) => {
            Attempt::Forbidden(ForbiddenAction::InventRoutingTarget)
        }
        (TypeKind::List, v) if v.is_scalar() => {
            Attempt::Forbidden(ForbiddenAction::RewriteValueMeaning)
        }
        _ => Attempt::Impossible,
    }
}
