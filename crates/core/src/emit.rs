//! AST → canonical text.
//!
//! Canonical form: `===NAME===` envelope, META first, exactly two spaces per
//! level, `KEY::value` with no spaces inside values (strings excepted),
//! canonical operator symbols, `\n` after every line. Emission is total.

use crate::ast::{Ast, Block, Document, Entry, LiteralZone, Value};
use std::fmt;
use std::fmt::Write as _;

pub fn emit(ast: &Ast) -> String {
    ast.documents
        .iter()
        .map(emit_document)
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn emit_document(doc: &Document) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "==={}===", doc.name);
    if let Some(meta) = &doc.meta {
        out.push_str("META:\n");
        emit_entries(&mut out, meta, 1);
    }
    if doc.separator {
        out.push_str("---\n");
    }
    emit_entries(&mut out, &doc.sections, 0);
    out.push_str("===END===\n");
    out
}

pub fn emit_entries(out: &mut String, entries: &[Entry], depth: usize) {
    for entry in entries {
        emit_entry(out, entry, depth);
    }
}

fn emit_entry(out: &mut String, entry: &Entry, depth: usize) {
    let indent = "  ".repeat(depth);
    match entry {
        Entry::Comment(text) => {
            out.push_str(&indent);
            out.push_str(&comment(text));
            out.push('\n');
        }
        Entry::Assignment(a) => {
            out.push_str(&indent);
            out.push_str(&a.key);
            out.push_str("::");
            match &a.value {
                Value::Literal(zone) => emit_literal(out, zone, &indent),
                other => out.push_str(&emit_value(other)),
            }
            if let Some(c) = &a.comment {
                out.push(' ');
                out.push_str(&comment(c));
            }
            out.push('\n');
        }
        Entry::Block(b) => {
            out.push_str(&indent);
            out.push_str(&block_header(b));
            if let Some(c) = &b.comment {
                out.push(' ');
                out.push_str(&comment(c));
            }
            out.push('\n');
            emit_entries(out, &b.children, depth + 1);
        }
    }
}

fn block_header(b: &Block) -> String {
    match &b.target {
        Some(t) => format!("{}→{}:", b.key, t),
        None => format!("{}:", b.key),
    }
}

fn comment(text: &str) -> String {
    if text.is_empty() {
        "//".to_owned()
    } else {
        format!("// {}", text)
    }
}

fn emit_literal(out: &mut String, zone: &LiteralZone, indent: &str) {
    out.push_str(&zone.fence);
    out.push_str(&zone.info);
    out.push('\n');
    for line in &zone.lines {
        out.push_str(line);
        out.push('\n');
    }
    out.push_str(indent);
    out.push_str(&zone.fence);
}

/// Quote and escape a string value.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

pub fn emit_value(value: &Value) -> String {
    match value {
        Value::String(s) => quote(s),
        Value::Number(raw) => raw.clone(),
        Value::Boolean(b) => b.to_string(),
        Value::Null => "null".to_owned(),
        Value::Identifier(s) => s.clone(),
        Value::Target(t) => t.to_string(),
        Value::List(l) => format!(
            "[{}]",
            l.items.iter().map(emit_value).collect::<Vec<_>>().join(",")
        ),
        Value::InlineMap(pairs) => format!(
            "[{}]",
            pairs
                .iter()
                .map(|(k, v)| format!("{}::{}", k, emit_value(v)))
                .collect::<Vec<_>>()
                .join(",")
        ),
        Value::Flow(f) => f
            .steps
            .iter()
            .map(emit_value)
            .collect::<Vec<_>>()
            .join("→"),
        Value::Binary { op, left, right } => {
            format!("{}{}{}", emit_value(left), op.symbol(), emit_value(right))
        }
        Value::Tagged { tag, args } => format!(
            "{}[{}]",
            tag,
            args.items.iter().map(emit_value).collect::<Vec<_>>().join(",")
        ),
        Value::Literal(zone) => {
            let mut out = String::new();
            emit_literal(&mut out, zone, "");
            out
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&emit_value(self))
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&emit_document(self))
    }
}
