use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of error codes used by every stage of the pipeline.
///
/// Each code carries a fixed one-line rationale explaining why the input is
/// refused instead of guessed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    #[serde(rename = "E001")]
    SingleColonAssignment,
    #[serde(rename = "E002")]
    MissingSchemaSelector,
    #[serde(rename = "E003")]
    UnexpectedToken,
    #[serde(rename = "E004")]
    MalformedEnvelope,
    #[serde(rename = "E005")]
    TabCharacter,
    #[serde(rename = "E006")]
    IllegalCharacter,
    #[serde(rename = "E007")]
    UnterminatedString,
    #[serde(rename = "E008")]
    UnterminatedLiteralZone,
    #[serde(rename = "E009")]
    NestedLiteralZone,
    #[serde(rename = "E010")]
    BareSectionMarker,
    #[serde(rename = "E011")]
    InconsistentIndentation,
    #[serde(rename = "E012")]
    UnknownConstraint,
    #[serde(rename = "E013")]
    MalformedPattern,
    #[serde(rename = "E014")]
    SchemaNotFound,
    #[serde(rename = "E015")]
    AmbiguousEnumRepair,
    #[serde(rename = "E016")]
    ForbiddenRepair,
    #[serde(rename = "E017")]
    ConstraintViolation,
    #[serde(rename = "E018")]
    UnbalancedList,
    #[serde(rename = "E019")]
    InlineMapNesting,
    #[serde(rename = "E020")]
    BaseHashMismatch,
    #[serde(rename = "E021")]
    DuplicateKey,
}

/// Which stage of the pipeline a code belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Lex,
    Parse,
    Schema,
    Validation,
    Repair,
    Write,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::SingleColonAssignment => "E001",
            ErrorCode::MissingSchemaSelector => "E002",
            ErrorCode::UnexpectedToken => "E003",
            ErrorCode::MalformedEnvelope => "E004",
            ErrorCode::TabCharacter => "E005",
            ErrorCode::IllegalCharacter => "E006",
            ErrorCode::UnterminatedString => "E007",
            ErrorCode::UnterminatedLiteralZone => "E008",
            ErrorCode::NestedLiteralZone => "E009",
            ErrorCode::BareSectionMarker => "E010",
            ErrorCode::InconsistentIndentation => "E011",
            ErrorCode::UnknownConstraint => "E012",
            ErrorCode::MalformedPattern => "E013",
            ErrorCode::SchemaNotFound => "E014",
            ErrorCode::AmbiguousEnumRepair => "E015",
            ErrorCode::ForbiddenRepair => "E016",
            ErrorCode::ConstraintViolation => "E017",
            ErrorCode::UnbalancedList => "E018",
            ErrorCode::InlineMapNesting => "E019",
            ErrorCode::BaseHashMismatch => "E020",
            ErrorCode::DuplicateKey => "E021",
        }
    }

    pub fn kind(self) -> ErrorKind {
        match self {
            ErrorCode::SingleColonAssignment
            | ErrorCode::TabCharacter
            | ErrorCode::IllegalCharacter
            | ErrorCode::UnterminatedString
            | ErrorCode::UnterminatedLiteralZone
            | ErrorCode::NestedLiteralZone => ErrorKind::Lex,
            ErrorCode::MissingSchemaSelector
            | ErrorCode::UnexpectedToken
            | ErrorCode::MalformedEnvelope
            | ErrorCode::BareSectionMarker
            | ErrorCode::InconsistentIndentation
            | ErrorCode::UnbalancedList
            | ErrorCode::InlineMapNesting
            | ErrorCode::DuplicateKey => ErrorKind::Parse,
            ErrorCode::UnknownConstraint
            | ErrorCode::MalformedPattern
            | ErrorCode::SchemaNotFound => ErrorKind::Schema,
            ErrorCode::AmbiguousEnumRepair | ErrorCode::ConstraintViolation => {
                ErrorKind::Validation
            }
            ErrorCode::ForbiddenRepair => ErrorKind::Repair,
            ErrorCode::BaseHashMismatch => ErrorKind::Write,
        }
    }

    /// Why the input is refused rather than guessed at.
    pub fn rationale(self) -> &'static str {
        match self {
            ErrorCode::SingleColonAssignment => {
                "a single ':' only opens a block; assignments use '::' and the intended form cannot be guessed"
            }
            ErrorCode::MissingSchemaSelector => {
                "no schema name was supplied and the document has no envelope or META TYPE to select one"
            }
            ErrorCode::UnexpectedToken => {
                "this token cannot appear here and the parser does not guess at intended structure"
            }
            ErrorCode::MalformedEnvelope => {
                "documents are wrapped in ===NAME=== ... ===END=== with META first; any other layout is ambiguous"
            }
            ErrorCode::TabCharacter => {
                "a tab has no fixed width, so the indentation depth would be a guess; use two spaces"
            }
            ErrorCode::IllegalCharacter => {
                "the character is not part of the notation and has no canonical equivalent"
            }
            ErrorCode::UnterminatedString => "the string never closes, so its extent would be a guess",
            ErrorCode::UnterminatedLiteralZone => {
                "the literal zone never closes, so its extent would be a guess"
            }
            ErrorCode::NestedLiteralZone => {
                "a fence inside an open literal zone could either close or nest it; neither is picked"
            }
            ErrorCode::BareSectionMarker => {
                "a section marker must be immediately followed by a name; the bare marker is never kept or dropped"
            }
            ErrorCode::InconsistentIndentation => {
                "the indentation does not return to an enclosing level, so the intended parent is ambiguous"
            }
            ErrorCode::UnknownConstraint => {
                "the constraint is not in the closed constraint vocabulary or its argument is invalid"
            }
            ErrorCode::MalformedPattern => {
                "holographic patterns have the shape [example∧CONSTRAINT…→§TARGET]"
            }
            ErrorCode::SchemaNotFound => "the named schema could not be located",
            ErrorCode::AmbiguousEnumRepair => {
                "more than one enum member matches case-insensitively; picking one would be a guess"
            }
            ErrorCode::ForbiddenRepair => {
                "the change would require inventing content rather than resolving an existing value"
            }
            ErrorCode::ConstraintViolation => "the value does not satisfy the declared constraint",
            ErrorCode::UnbalancedList => {
                "the list brackets are not balanced, so the list extent would be a guess"
            }
            ErrorCode::InlineMapNesting => {
                "inline map values must be atoms; nesting would be ambiguous with list syntax"
            }
            ErrorCode::BaseHashMismatch => {
                "the file changed since the supplied base hash; overwriting would discard that change"
            }
            ErrorCode::DuplicateKey => {
                "a key may appear once per level; keeping either occurrence would silently drop the other"
            }
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A positioned syntax error: code, location, the triggering snippet and the
/// code's rationale.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub code: ErrorCode,
    pub line: u32,
    pub column: u32,
    pub snippet: String,
    pub message: String,
    pub rationale: &'static str,
}

impl Diagnostic {
    pub fn new(
        code: ErrorCode,
        line: u32,
        column: u32,
        snippet: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Diagnostic {
            code,
            line,
            column,
            snippet: snippet.into(),
            message: message.into(),
            rationale: code.rationale(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at {}:{}: {} near {:?} ({})",
            self.code, self.line, self.column, self.message, self.snippet, self.rationale
        )
    }
}

/// Fatal lexical error. No token stream is produced.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[error("lex error {0}")]
#[serde(transparent)]
pub struct LexError(pub Diagnostic);

/// Fatal parse error. No partial AST is produced.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[error("parse error {0}")]
#[serde(transparent)]
pub struct ParseError(pub Diagnostic);

impl LexError {
    pub fn new(
        code: ErrorCode,
        line: u32,
        column: u32,
        snippet: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        LexError(Diagnostic::new(code, line, column, snippet, message))
    }

    pub fn code(&self) -> ErrorCode {
        self.0.code
    }
}

impl ParseError {
    pub fn new(
        code: ErrorCode,
        line: u32,
        column: u32,
        snippet: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        ParseError(Diagnostic::new(code, line, column, snippet, message))
    }

    pub fn code(&self) -> ErrorCode {
        self.0.code
    }
}

/// A schema could not be loaded or located.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[error("schema error {code} in '{schema}'{}: {message} ({rationale})", .path.as_ref().map(|p| format!(" at field {p}")).unwrap_or_default())]
pub struct SchemaError {
    pub code: ErrorCode,
    pub schema: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    pub snippet: String,
    pub message: String,
    pub rationale: &'static str,
}

impl SchemaError {
    pub fn new(code: ErrorCode, schema: &str, message: impl Into<String>) -> Self {
        SchemaError {
            code,
            schema: schema.to_owned(),
            path: None,
            line: None,
            column: None,
            snippet: String::new(),
            message: message.into(),
            rationale: code.rationale(),
        }
    }

    pub fn not_found(schema: &str, detail: impl fmt::Display) -> Self {
        SchemaError::new(
            ErrorCode::SchemaNotFound,
            schema,
            format!("schema '{}' not found: {}", schema, detail),
        )
    }

    pub fn in_schema(mut self, schema: &str) -> Self {
        self.schema = schema.to_owned();
        self
    }

    pub fn at_path(mut self, path: &str) -> Self {
        self.path = Some(path.to_owned());
        self
    }

    pub fn at_token(mut self, line: u32, column: u32, snippet: &str) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self.snippet = snippet.to_owned();
        self
    }
}

/// Any fatal error of the core pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OctaveError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl OctaveError {
    pub fn code(&self) -> ErrorCode {
        match self {
            OctaveError::Lex(e) => e.code(),
            OctaveError::Parse(e) => e.code(),
            OctaveError::Schema(e) => e.code,
        }
    }

    /// JSON rendering used at the tool boundary.
    pub fn to_json_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            serde_json::json!({
                "kind": "internal",
                "code": self.code(),
                "message": format!("error serialization failed: {}", e),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_serialize_as_numbered_strings() {
        let v = serde_json::to_value(ErrorCode::TabCharacter).unwrap();
        assert_eq!(v, serde_json::json!("E005"));
        assert_eq!(ErrorCode::BaseHashMismatch.as_str(), "E020");
    }

    #[test]
    fn lex_error_json_carries_rationale_and_position() {
        let err: OctaveError =
            LexError::new(ErrorCode::TabCharacter, 3, 1, "\t", "tab character").into();
        let json = err.to_json_value();
        assert_eq!(json["kind"], "lex");
        assert_eq!(json["code"], "E005");
        assert_eq!(json["line"], 3);
        assert!(json["rationale"].as_str().unwrap().contains("two spaces"));
    }

    #[test]
    fn every_code_has_a_kind_and_rationale() {
        let codes = [
            ErrorCode::SingleColonAssignment,
            ErrorCode::MissingSchemaSelector,
            ErrorCode::NestedLiteralZone,
            ErrorCode::AmbiguousEnumRepair,
            ErrorCode::ForbiddenRepair,
        ];
        for code in codes {
            assert!(!code.rationale().is_empty());
        }
        assert_eq!(ErrorCode::SingleColonAssignment.kind(), ErrorKind::Lex);
        assert_eq!(ErrorCode::NestedLiteralZone.kind(), ErrorKind::Lex);
        assert_eq!(ErrorCode::InlineMapNesting.kind(), ErrorKind::Parse);
        assert_eq!(ErrorCode::DuplicateKey.kind(), ErrorKind::Parse);
        assert_eq!(ErrorCode::DuplicateKey.as_str(), "E021");
    }
}
