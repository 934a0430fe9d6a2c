//! Schema engine: holographic pattern extraction, schema loading and
//! constraint validation.
//!
//! A schema is itself an OCTAVE document. Every non-META assignment is a
//! holographic pattern `[example∧CONSTRAINT…→§TARGET]`; blocks group fields
//! and may declare a target inherited by the fields below them.

use crate::ast::{Document, Entry, SectionTarget, Value};
use crate::error::{ErrorCode, OctaveError, SchemaError};
use crate::lexer::tokenize;
use crate::parser::parse_with_warnings;
use regex::Regex;
use rust_decimal::Decimal;
use std::fmt;

pub mod holographic;
pub mod source;
pub mod validate;

pub use holographic::{interpret, HolographicPattern};
pub use source::{FileSystemSchemas, InMemorySchemas, SchemaSource};
pub use validate::{validate_document, Route, Validation, ValidationError, ValidationStatus};

// ──────────────────────────────────────────────
// Constraints
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    String,
    Number,
    Boolean,
    List,
    Target,
}

impl TypeKind {
    pub fn from_name(name: &str) -> Option<TypeKind> {
        match name {
            "STRING" => Some(TypeKind::String),
            "NUMBER" => Some(TypeKind::Number),
            "BOOLEAN" => Some(TypeKind::Boolean),
            "LIST" => Some(TypeKind::List),
            "TARGET" => Some(TypeKind::Target),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TypeKind::String => "STRING",
            TypeKind::Number => "NUMBER",
            TypeKind::Boolean => "BOOLEAN",
            TypeKind::List => "LIST",
            TypeKind::Target => "TARGET",
        }
    }

    /// Identifiers count as strings.
    pub fn admits(self, value: &Value) -> bool {
        match self {
            TypeKind::String => matches!(value, Value::String(_) | Value::Identifier(_)),
            TypeKind::Number => matches!(value, Value::Number(_)),
            TypeKind::Boolean => matches!(value, Value::Boolean(_)),
            TypeKind::List => matches!(value, Value::List(_)),
            TypeKind::Target => matches!(value, Value::Target(_)),
        }
    }
}

/// A compiled `REGEX["…"]` argument. Equality is by source text.
#[derive(Debug, Clone)]
pub struct RegexPattern {
    pub source: String,
    compiled: Regex,
}

impl RegexPattern {
    pub fn new(source: &str) -> Result<Self, regex::Error> {
        Ok(RegexPattern {
            source: source.to_owned(),
            compiled: Regex::new(source)?,
        })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.compiled.is_match(text)
    }
}

impl PartialEq for RegexPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

/// The closed constraint vocabulary, evaluated left to right, fail-fast.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    Required,
    Optional,
    ConstEquals(Value),
    Regex(RegexPattern),
    Enum(Vec<String>),
    Type(TypeKind),
    Directory,
    AppendOnly,
    Range { min: Decimal, max: Decimal },
    MaxLength(usize),
    MinLength(usize),
    Date,
    Iso8601,
}

impl Constraint {
    pub fn name(&self) -> &'static str {
        match self {
            Constraint::Required => "REQ",
            Constraint::Optional => "OPT",
            Constraint::ConstEquals(_) => "CONST",
            Constraint::Regex(_) => "REGEX",
            Constraint::Enum(_) => "ENUM",
            Constraint::Type(_) => "TYPE",
            Constraint::Directory => "DIR",
            Constraint::AppendOnly => "APPEND_ONLY",
            Constraint::Range { .. } => "RANGE",
            Constraint::MaxLength(_) => "MAX_LENGTH",
            Constraint::MinLength(_) => "MIN_LENGTH",
            Constraint::Date => "DATE",
            Constraint::Iso8601 => "ISO8601",
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::ConstEquals(v) => write!(f, "CONST[{}]", v),
            Constraint::Regex(r) => write!(f, "REGEX[{}]", crate::emit::quote(&r.source)),
            Constraint::Enum(members) => write!(f, "ENUM[{}]", members.join(",")),
            Constraint::Type(k) => write!(f, "TYPE[{}]", k.name()),
            Constraint::Range { min, max } => write!(f, "RANGE[{},{}]", min, max),
            Constraint::MaxLength(n) => write!(f, "MAX_LENGTH[{}]", n),
            Constraint::MinLength(n) => write!(f, "MIN_LENGTH[{}]", n),
            other => f.write_str(other.name()),
        }
    }
}

// ──────────────────────────────────────────────
// Schema
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct FieldSchema {
    /// Dot-joined key path
    pub path: String,
    pub segments: Vec<String>,
    pub example: Option<Value>,
    pub constraints: Vec<Constraint>,
    /// Own target, else the nearest enclosing block's
    pub target: Option<SectionTarget>,
}

impl FieldSchema {
    pub fn segments(&self) -> Vec<&str> {
        self.segments.iter().map(String::as_str).collect()
    }

    /// `REQ∧ENUM[a,b]`
    pub fn constraint_chain(&self) -> String {
        self.constraints
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("∧")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockSchema {
    pub path: String,
    pub segments: Vec<String>,
    pub target: Option<SectionTarget>,
}

/// A loaded schema. Immutable once built and safe to share across threads.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    pub name: String,
    pub version: Option<String>,
    /// Fields in declaration order
    pub fields: Vec<FieldSchema>,
    pub blocks: Vec<BlockSchema>,
}

impl Schema {
    /// Lex, parse (leniently) and load the first document of `src`.
    pub fn from_source(src: &str) -> Result<Schema, OctaveError> {
        let lexed = tokenize(src)?;
        let parsed = parse_with_warnings(lexed.tokens, None)?;
        let doc = parsed.ast.documents.first().ok_or_else(|| {
            SchemaError::new(ErrorCode::MalformedPattern, "", "schema source has no document")
        })?;
        Ok(Schema::from_document(doc)?)
    }

    pub fn from_document(doc: &Document) -> Result<Schema, SchemaError> {
        let mut schema = Schema {
            name: doc.name.clone(),
            version: doc.meta_value("VERSION").map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            }),
            fields: Vec::new(),
            blocks: Vec::new(),
        };
        let mut prefix = Vec::new();
        load_entries(&mut schema, &doc.sections, &mut prefix, None)?;
        tracing::debug!(
            schema = %schema.name,
            fields = schema.fields.len(),
            blocks = schema.blocks.len(),
            "schema loaded"
        );
        Ok(schema)
    }

    pub fn field(&self, path: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.path == path)
    }

    pub fn block(&self, path: &str) -> Option<&BlockSchema> {
        self.blocks.iter().find(|b| b.path == path)
    }
}

fn load_entries(
    schema: &mut Schema,
    entries: &[Entry],
    prefix: &mut Vec<String>,
    inherited: Option<&SectionTarget>,
) -> Result<(), SchemaError> {
    for entry in entries {
        match entry {
            Entry::Comment(_) => {}
            Entry::Assignment(a) => {
                prefix.push(a.key.clone());
                let path = prefix.join(".");
                let pattern = match &a.value {
                    Value::List(list) => interpret(list)
                        .map_err(|e| e.in_schema(&schema.name).at_path(&path))?,
                    other => {
                        return Err(SchemaError::new(
                            ErrorCode::MalformedPattern,
                            &schema.name,
                            format!(
                                "field is a {}, not a holographic pattern [example∧CONSTRAINT→§TARGET]",
                                other.type_name()
                            ),
                        )
                        .at_path(&path))
                    }
                };
                schema.fields.push(FieldSchema {
                    path,
                    segments: prefix.clone(),
                    example: pattern.example,
                    constraints: pattern.constraints,
                    target: pattern.target.or_else(|| inherited.cloned()),
                });
                prefix.pop();
            }
            Entry::Block(b) => {
                prefix.push(b.key.clone());
                let target = b.target.as_ref().or(inherited);
                schema.blocks.push(BlockSchema {
                    path: prefix.join("."),
                    segments: prefix.clone(),
                    target: target.cloned(),
                });
                load_entries(schema, &b.children, prefix, target)?;
                prefix.pop();
            }
        }
    }
    Ok(())
}
