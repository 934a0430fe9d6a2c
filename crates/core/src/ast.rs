//! Syntax tree for OCTAVE documents.
//!
//! Produced by the parser, consumed by the emitter, the schema engine and
//! the eject projections. Nodes own their data; list nodes additionally keep
//! a shared handle on the token slice they were parsed from.

use crate::lexer::Token;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

// ──────────────────────────────────────────────
// Token spans
// ──────────────────────────────────────────────

/// A range into the token buffer of one parse call.
///
/// The buffer is shared, so a span stays valid for as long as any node
/// holding it is alive.
#[derive(Clone)]
pub struct TokenSpan {
    buffer: Arc<[Token]>,
    range: Range<usize>,
}

impl TokenSpan {
    pub fn new(buffer: Arc<[Token]>, range: Range<usize>) -> Self {
        let end = range.end.min(buffer.len());
        let start = range.start.min(end);
        TokenSpan {
            buffer,
            range: start..end,
        }
    }

    /// A span over no tokens, for nodes built outside the parser.
    pub fn empty() -> Self {
        TokenSpan {
            buffer: Arc::from(Vec::new()),
            range: 0..0,
        }
    }

    pub fn tokens(&self) -> &[Token] {
        &self.buffer[self.range.clone()]
    }

    pub fn range(&self) -> Range<usize> {
        self.range.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    /// Sub-span; `start..end` is relative to this span.
    pub fn slice(&self, start: usize, end: usize) -> TokenSpan {
        let base = self.range.start;
        TokenSpan::new(
            self.buffer.clone(),
            (base + start).min(self.range.end)..(base + end).min(self.range.end),
        )
    }

    /// Line of the first token, if any.
    pub fn line(&self) -> Option<u32> {
        self.tokens().first().map(|t| t.line)
    }
}

impl fmt::Debug for TokenSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenSpan({:?})", self.range)
    }
}

// ──────────────────────────────────────────────
// Documents
// ──────────────────────────────────────────────

/// A whole file: one or more enveloped documents.
#[derive(Debug, Clone, PartialEq)]
pub struct Ast {
    pub documents: Vec<Document>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Envelope name (`===NAME===`)
    pub name: String,
    pub meta: Option<Vec<Entry>>,
    /// Whether a `---` line follows META
    pub separator: bool,
    pub sections: Vec<Entry>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    Assignment(Assignment),
    Block(Block),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub key: String,
    pub value: Value,
    /// Trailing `// …` comment
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub key: String,
    /// Routing target inherited by every field below the block
    pub target: Option<SectionTarget>,
    pub children: Vec<Entry>,
    pub comment: Option<String>,
}

impl Entry {
    pub fn key(&self) -> Option<&str> {
        match self {
            Entry::Assignment(a) => Some(&a.key),
            Entry::Block(b) => Some(&b.key),
            Entry::Comment(_) => None,
        }
    }
}

/// Outcome of [`Document::set_value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    Replaced,
    Inserted,
    /// The path (or one of its parents) names a block where a value was expected
    NotAValue,
    /// An intermediate block does not exist
    MissingParent,
}

fn find_entry<'e>(entries: &'e [Entry], segments: &[&str]) -> Option<&'e Entry> {
    let (first, rest) = segments.split_first()?;
    let entry = entries.iter().find(|e| e.key() == Some(*first))?;
    if rest.is_empty() {
        return Some(entry);
    }
    match entry {
        Entry::Block(b) => find_entry(&b.children, rest),
        Entry::Assignment(_) | Entry::Comment(_) => None,
    }
}

fn set_in(entries: &mut Vec<Entry>, segments: &[&str], value: Value) -> SetOutcome {
    let Some((first, rest)) = segments.split_first() else {
        return SetOutcome::MissingParent;
    };
    let Some(i) = entries.iter().position(|e| e.key() == Some(*first)) else {
        if !rest.is_empty() {
            return SetOutcome::MissingParent;
        }
        entries.push(Entry::Assignment(Assignment {
            key: (*first).to_owned(),
            value,
            comment: None,
        }));
        return SetOutcome::Inserted;
    };
    match (&mut entries[i], rest.is_empty()) {
        (Entry::Assignment(a), true) => {
            a.value = value;
            SetOutcome::Replaced
        }
        (Entry::Block(b), false) => set_in(&mut b.children, rest, value),
        _ => SetOutcome::NotAValue,
    }
}

impl Document {
    /// Find the entry at a key path (`["BLOCK", "FIELD"]`) among the sections.
    pub fn find(&self, segments: &[&str]) -> Option<&Entry> {
        find_entry(&self.sections, segments)
    }

    /// Value of the assignment at a key path, if there is one.
    pub fn value_at(&self, segments: &[&str]) -> Option<&Value> {
        match self.find(segments)? {
            Entry::Assignment(a) => Some(&a.value),
            Entry::Block(_) | Entry::Comment(_) => None,
        }
    }

    pub fn meta_value(&self, key: &str) -> Option<&Value> {
        let meta = self.meta.as_ref()?;
        match find_entry(meta, &[key])? {
            Entry::Assignment(a) => Some(&a.value),
            Entry::Block(_) | Entry::Comment(_) => None,
        }
    }

    /// Replace the value at a key path, or append a new assignment to an
    /// existing parent. Never creates blocks.
    pub fn set_value(&mut self, segments: &[&str], value: Value) -> SetOutcome {
        set_in(&mut self.sections, segments, value)
    }
}

// ──────────────────────────────────────────────
// Values
// ──────────────────────────────────────────────

/// A routing target. `name` excludes the marker; the canonical spelling is
/// always `§name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SectionTarget {
    pub name: String,
}

impl SectionTarget {
    pub fn new(name: impl Into<String>) -> Self {
        SectionTarget { name: name.into() }
    }
}

impl fmt::Display for SectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "§{}", self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Synthesis,
    Concat,
    Tension,
    Alternative,
    Constraint,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Synthesis => "⊕",
            BinaryOp::Concat => "⧺",
            BinaryOp::Tension => "⇌",
            BinaryOp::Alternative => "∨",
            BinaryOp::Constraint => "∧",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ListValue {
    pub items: Vec<Value>,
    /// Tokens from `[` through `]` inclusive
    pub span: TokenSpan,
}

impl ListValue {
    pub fn new(items: Vec<Value>) -> Self {
        ListValue {
            items,
            span: TokenSpan::empty(),
        }
    }
}

// Structural equality; the source span is provenance, not content.
impl PartialEq for ListValue {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlowExpression {
    pub steps: Vec<Value>,
}

/// Fenced verbatim content. `lines` are kept byte-for-byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralZone {
    pub fence: String,
    pub info: String,
    pub lines: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    /// Numeric literal, verbatim
    Number(String),
    Boolean(bool),
    Null,
    Identifier(String),
    Target(SectionTarget),
    List(ListValue),
    InlineMap(Vec<(String, Value)>),
    Flow(FlowExpression),
    Binary {
        op: BinaryOp,
        left: Box<Value>,
        right: Box<Value>,
    },
    /// `NAME[args]`
    Tagged {
        tag: String,
        args: ListValue,
    },
    Literal(LiteralZone),
}

impl Value {
    /// Short lowercase name of the variant, for messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::Number(_) => "number",
            Value::Boolean(_) => "boolean",
            Value::Null => "null",
            Value::Identifier(_) => "identifier",
            Value::Target(_) => "target",
            Value::List(_) => "list",
            Value::InlineMap(_) => "inline map",
            Value::Flow(_) => "flow",
            Value::Binary { .. } => "expression",
            Value::Tagged { .. } => "tagged value",
            Value::Literal(_) => "literal zone",
        }
    }

    /// Textual content of string-like scalars.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::Identifier(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Value::String(_)
                | Value::Number(_)
                | Value::Boolean(_)
                | Value::Null
                | Value::Identifier(_)
                | Value::Target(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> Document {
        Document {
            name: "D".into(),
            meta: Some(vec![Entry::Assignment(Assignment {
                key: "TYPE".into(),
                value: Value::Identifier("SESSION".into()),
                comment: None,
            })]),
            separator: false,
            sections: vec![Entry::Block(Block {
                key: "OUTER".into(),
                target: None,
                children: vec![Entry::Assignment(Assignment {
                    key: "INNER".into(),
                    value: Value::Number("1".into()),
                    comment: None,
                })],
                comment: None,
            })],
        }
    }

    #[test]
    fn lookup_by_key_path() {
        let d = doc();
        assert_eq!(
            d.value_at(&["OUTER", "INNER"]),
            Some(&Value::Number("1".into()))
        );
        assert!(d.value_at(&["OUTER"]).is_none());
        assert_eq!(
            d.meta_value("TYPE").and_then(Value::as_text),
            Some("SESSION")
        );
    }

    #[test]
    fn set_value_replaces_or_appends_but_never_creates_blocks() {
        let mut d = doc();
        assert_eq!(
            d.set_value(&["OUTER", "INNER"], Value::Number("2".into())),
            SetOutcome::Replaced
        );
        assert_eq!(
            d.set_value(&["OUTER", "NEW"], Value::Boolean(true)),
            SetOutcome::Inserted
        );
        assert_eq!(
            d.set_value(&["MISSING", "X"], Value::Null),
            SetOutcome::MissingParent
        );
        assert_eq!(d.set_value(&["OUTER"], Value::Null), SetOutcome::NotAValue);
        assert_eq!(d.value_at(&["OUTER", "NEW"]), Some(&Value::Boolean(true)));
    }

    #[test]
    fn list_equality_ignores_span() {
        assert_eq!(
            ListValue::new(vec![Value::Null]),
            ListValue::new(vec![Value::Null])
        );
        assert_eq!(TokenSpan::empty().tokens().len(), 0);
    }
}
