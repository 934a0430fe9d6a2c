//! Projections of a document for different readers.
//!
//! `canonical` and `authoring` keep every field. `executive` and `developer`
//! drop content and list every omitted field path. Only the native format
//! carries everything; the others list what they drop in `format_losses`.

use crate::ast::{Assignment, Ast, Block, Document, Entry, Value};
use crate::emit::{emit, emit_value};
use crate::schema::Schema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map};
use std::fmt::Write as _;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EjectMode {
    #[default]
    Canonical,
    /// Canonical plus each bound field's constraint chain as a comment
    Authoring,
    /// Top-level fields only: no META, no blocks, no literal zones
    Executive,
    /// Everything except META
    Developer,
}

impl EjectMode {
    pub fn is_lossy(self) -> bool {
        matches!(self, EjectMode::Executive | EjectMode::Developer)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EjectFormat {
    #[default]
    Native,
    Json,
    Yaml,
    Markdown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ejection {
    pub output: String,
    /// Set when the output cannot be read back to the same document
    pub lossy: bool,
    pub fields_omitted: Vec<String>,
    /// `path: what` for everything the output format cannot carry
    pub format_losses: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum EjectError {
    #[error("JSON rendering failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("YAML rendering failed: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub fn eject(
    ast: &Ast,
    schema: Option<&Schema>,
    mode: EjectMode,
    format: EjectFormat,
) -> Result<Ejection, EjectError> {
    let mut omitted = Vec::new();
    let projected = Ast {
        documents: ast
            .documents
            .iter()
            .map(|d| project(d, schema, mode, &mut omitted))
            .collect(),
    };

    let output = match format {
        EjectFormat::Native => emit(&projected),
        EjectFormat::Json => serde_json::to_string_pretty(&to_json(&projected))? + "\n",
        EjectFormat::Yaml => serde_yaml::to_string(&to_json(&projected))?,
        EjectFormat::Markdown => to_markdown(&projected),
    };
    let mut format_losses = Vec::new();
    for doc in &projected.documents {
        format_lost(doc, format, &mut format_losses);
    }
    tracing::debug!(
        ?mode,
        ?format,
        omitted = omitted.len(),
        format_losses = format_losses.len(),
        "ejected"
    );
    Ok(Ejection {
        output,
        lossy: mode.is_lossy() || !format_losses.is_empty(),
        fields_omitted: omitted,
        format_losses,
    })
}

/// A blank document built from the schema's examples.
pub fn template(schema: &Schema) -> Ast {
    let mut meta = vec![Entry::Assignment(Assignment {
        key: "TYPE".to_owned(),
        value: Value::Identifier(schema.name.clone()),
        comment: None,
    })];
    if let Some(v) = &schema.version {
        meta.push(Entry::Assignment(Assignment {
            key: "VERSION".to_owned(),
            value: Value::String(v.clone()),
            comment: None,
        }));
    }
    let mut sections = Vec::new();
    for field in &schema.fields {
        let example = field.example.clone().unwrap_or(Value::Null);
        insert_field(&mut sections, schema, &field.segments, 0, example);
    }
    Ast {
        documents: vec![Document {
            name: schema.name.clone(),
            meta: Some(meta),
            separator: true,
            sections,
        }],
    }
}

fn insert_field(entries: &mut Vec<Entry>, schema: &Schema, segments: &[String], depth: usize, value: Value) {
    let Some(key) = segments.get(depth) else { return };
    if depth + 1 == segments.len() {
        entries.push(Entry::Assignment(Assignment {
            key: key.clone(),
            value,
            comment: None,
        }));
        return;
    }
    let existing = entries
        .iter()
        .position(|e| matches!(e, Entry::Block(b) if b.key == *key));
    let index = match existing {
        Some(i) => i,
        None => {
            let effective = schema
                .block(&segments[..=depth].join("."))
                .and_then(|b| b.target.clone());
            let inherited = if depth == 0 {
                None
            } else {
                schema
                    .block(&segments[..depth].join("."))
                    .and_then(|b| b.target.clone())
            };
            entries.push(Entry::Block(Block {
                key: key.clone(),
                target: if effective != inherited { effective } else { None },
                children: Vec::new(),
                comment: None,
            }));
            entries.len() - 1
        }
    };
    if let Entry::Block(b) = &mut entries[index] {
        insert_field(&mut b.children, schema, segments, depth + 1, value);
    }
}

// ──────────────────────────────────────────────
// Mode projections
// ──────────────────────────────────────────────

fn project(doc: &Document, schema: Option<&Schema>, mode: EjectMode, omitted: &mut Vec<String>) -> Document {
    match mode {
        EjectMode::Canonical => doc.clone(),
        EjectMode::Authoring => {
            let mut out = doc.clone();
            if let Some(schema) = schema {
                let mut prefix = Vec::new();
                annotate(&mut out.sections, schema, &mut prefix);
            }
            out
        }
        EjectMode::Developer => {
            let mut out = doc.clone();
            omit_meta(&mut out, omitted);
            out
        }
        EjectMode::Executive => {
            let mut out = doc.clone();
            omit_meta(&mut out, omitted);
            out.sections = doc
                .sections
                .iter()
                .filter(|e| match e {
                    Entry::Block(b) => {
                        collect_paths(&b.children, &b.key, omitted);
                        false
                    }
                    Entry::Assignment(a) if matches!(a.value, Value::Literal(_)) => {
                        omitted.push(a.key.clone());
                        false
                    }
                    Entry::Assignment(_) | Entry::Comment(_) => true,
                })
                .cloned()
                .collect();
            out
        }
    }
}

fn omit_meta(doc: &mut Document, omitted: &mut Vec<String>) {
    if let Some(meta) = doc.meta.take() {
        collect_paths(&meta, "META", omitted);
    }
    doc.separator = false;
}

/// Every field path below `prefix`; an empty block records itself.
fn collect_paths(entries: &[Entry], prefix: &str, out: &mut Vec<String>) {
    let before = out.len();
    for e in entries {
        match e {
            Entry::Assignment(a) => out.push(format!("{}.{}", prefix, a.key)),
            Entry::Block(b) => collect_paths(&b.children, &format!("{}.{}", prefix, b.key), out),
            Entry::Comment(_) => {}
        }
    }
    if out.len() == before {
        out.push(prefix.to_owned());
    }
}

fn annotate(entries: &mut [Entry], schema: &Schema, prefix: &mut Vec<String>) {
    for e in entries {
        match e {
            Entry::Assignment(a) => {
                prefix.push(a.key.clone());
                let path = prefix.join(".");
                prefix.pop();
                if matches!(a.value, Value::Literal(_)) {
                    continue;
                }
                let Some(field) = schema.field(&path) else { continue };
                let mut chain = field.constraint_chain();
                if let Some(t) = &field.target {
                    let _ = write!(chain, "→{}", t);
                }
                if chain.is_empty() {
                    continue;
                }
                a.comment = Some(match a.comment.take() {
                    Some(existing) => format!("{}; {}", existing, chain),
                    None => chain,
                });
            }
            Entry::Block(b) => {
                prefix.push(b.key.clone());
                annotate(&mut b.children, schema, prefix);
                prefix.pop();
            }
            Entry::Comment(_) => {}
        }
    }
}

// ──────────────────────────────────────────────
// JSON / YAML
// ──────────────────────────────────────────────

pub fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::String(s) | Value::Identifier(s) => json!(s),
        Value::Number(raw) => serde_json::from_str::<serde_json::Number>(raw)
            .map(serde_json::Value::Number)
            .unwrap_or_else(|_| json!(raw)),
        Value::Boolean(b) => json!(b),
        Value::Null => serde_json::Value::Null,
        Value::Target(t) => json!(t.to_string()),
        Value::List(l) => serde_json::Value::Array(l.items.iter().map(value_to_json).collect()),
        Value::InlineMap(pairs) => {
            let mut m = Map::new();
            for (k, v) in pairs {
                m.insert(k.clone(), value_to_json(v));
            }
            serde_json::Value::Object(m)
        }
        Value::Literal(z) => json!({
            "info": z.info,
            "content": z.lines.join("\n"),
        }),
        Value::Flow(_) | Value::Binary { .. } | Value::Tagged { .. } => json!(emit_value(value)),
    }
}

fn entries_to_json(entries: &[Entry]) -> serde_json::Value {
    let mut m = Map::new();
    for e in entries {
        match e {
            Entry::Assignment(a) => {
                m.insert(a.key.clone(), value_to_json(&a.value));
            }
            Entry::Block(b) => {
                m.insert(b.key.clone(), entries_to_json(&b.children));
            }
            Entry::Comment(_) => {}
        }
    }
    serde_json::Value::Object(m)
}

pub fn to_json(ast: &Ast) -> serde_json::Value {
    let documents: Vec<serde_json::Value> = ast
        .documents
        .iter()
        .map(|d| {
            json!({
                "name": d.name,
                "meta": d.meta.as_deref().map(entries_to_json),
                "fields": entries_to_json(&d.sections),
            })
        })
        .collect();
    json!({ "documents": documents })
}

// ──────────────────────────────────────────────
// Markdown
// ──────────────────────────────────────────────

fn to_markdown(ast: &Ast) -> String {
    let mut out = String::new();
    for (i, doc) in ast.documents.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let _ = writeln!(out, "# {}\n", doc.name);
        if let Some(meta) = &doc.meta {
            out.push_str("| Field | Value |\n|---|---|\n");
            for e in meta {
                if let Entry::Assignment(a) = e {
                    let _ = writeln!(out, "| {} | `{}` |", a.key, emit_value(&a.value));
                }
            }
            out.push('\n');
        }
        markdown_entries(&mut out, &doc.sections, 2);
    }
    out
}

fn markdown_entries(out: &mut String, entries: &[Entry], level: usize) {
    for e in entries {
        match e {
            Entry::Comment(text) => {
                let _ = writeln!(out, "> {}\n", text);
            }
            Entry::Assignment(Assignment {
                key,
                value: Value::Literal(z),
                ..
            }) => {
                let _ = writeln!(out, "**{}**\n", key);
                let _ = writeln!(out, "{}{}", z.fence, z.info);
                for line in &z.lines {
                    let _ = writeln!(out, "{}", line);
                }
                let _ = writeln!(out, "{}\n", z.fence);
            }
            Entry::Assignment(a) => {
                let _ = writeln!(out, "- **{}**: `{}`", a.key, emit_value(&a.value));
            }
            Entry::Block(b) => {
                let _ = writeln!(out, "\n{} {}", "#".repeat(level.min(6)), b.key);
                if let Some(t) = &b.target {
                    let _ = writeln!(out, "\nRoutes to `{}`.", t);
                }
                out.push('\n');
                markdown_entries(out, &b.children, level + 1);
            }
        }
    }
}

// ──────────────────────────────────────────────
// Format losses
// ──────────────────────────────────────────────

fn format_lost(doc: &Document, format: EjectFormat, out: &mut Vec<String>) {
    match format {
        EjectFormat::Native => {}
        EjectFormat::Json | EjectFormat::Yaml => {
            if let Some(meta) = &doc.meta {
                json_lost(meta, "META", "META", out);
            }
            json_lost(&doc.sections, "", &doc.name, out);
        }
        EjectFormat::Markdown => {
            if let Some(meta) = &doc.meta {
                markdown_lost(meta, "META", true, out);
            }
            markdown_lost(&doc.sections, "", false, out);
        }
    }
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_owned()
    } else {
        format!("{}.{}", prefix, key)
    }
}

/// `owner` names full-line comments: the enclosing block, or the document.
fn json_lost(entries: &[Entry], prefix: &str, owner: &str, out: &mut Vec<String>) {
    for e in entries {
        match e {
            Entry::Comment(_) => out.push(format!("{}: comment", owner)),
            Entry::Assignment(a) => {
                let path = join(prefix, &a.key);
                if a.comment.is_some() {
                    out.push(format!("{}: trailing comment", path));
                }
                if let Some(what) = json_value_lost(&a.value) {
                    out.push(format!("{}: {}", path, what));
                }
            }
            Entry::Block(b) => {
                let path = join(prefix, &b.key);
                if b.target.is_some() {
                    out.push(format!("{}: routing target", path));
                }
                if b.comment.is_some() {
                    out.push(format!("{}: trailing comment", path));
                }
                json_lost(&b.children, &path, &path, out);
            }
        }
    }
}

/// The first part of a value that JSON only keeps as text.
fn json_value_lost(value: &Value) -> Option<&'static str> {
    match value {
        Value::String(_) | Value::Boolean(_) | Value::Null => None,
        Value::Identifier(_) => Some("bare word read back as a string"),
        Value::Target(_) => Some("section target read back as a string"),
        Value::Flow(_) | Value::Binary { .. } | Value::Tagged { .. } => {
            Some("expression read back as a string")
        }
        Value::Number(raw) => match value_to_json(value) {
            serde_json::Value::Number(n) if n.to_string() == *raw => None,
            _ => Some("number spelling"),
        },
        Value::Literal(z) if z.fence != "```" => Some("literal fence"),
        Value::Literal(_) => None,
        Value::List(l) => l.items.iter().find_map(json_value_lost),
        Value::InlineMap(pairs) => pairs.iter().find_map(|(_, v)| json_value_lost(v)),
    }
}

/// Markdown renders values in native spelling but drops trailing comments
/// and anything in META other than plain assignments.
fn markdown_lost(entries: &[Entry], prefix: &str, in_meta: bool, out: &mut Vec<String>) {
    for e in entries {
        match e {
            Entry::Comment(_) if in_meta => out.push(format!("{}: comment", prefix)),
            Entry::Comment(_) => {}
            Entry::Assignment(a) => {
                if a.comment.is_some() {
                    out.push(format!("{}: trailing comment", join(prefix, &a.key)));
                }
            }
            Entry::Block(b) => {
                let path = join(prefix, &b.key);
                if in_meta {
                    out.push(format!("{}: nested block", path));
                    continue;
                }
                if b.comment.is_some() {
                    out.push(format!("{}: trailing comment", path));
                }
                markdown_lost(&b.children, &path, false, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::parse;

    const DOC: &str = "===D===
META:
  TYPE::S
---
STATUS::ACTIVE
CODE::```sh
run
```
CFG:
  DEPTH::2
  INNER:
    LEAF::x
===END===
";

    const SCHEMA: &str = "===S===
META:
  VERSION::\"2\"
STATUS::[ACTIVE∧REQ∧ENUM[ACTIVE,DONE]→§INDEX]
CFG→§STORE:
  DEPTH::[1∧TYPE[NUMBER]]
===END===
";

    fn ast() -> Ast {
        parse(tokenize(DOC).unwrap().tokens).unwrap().ast
    }

    #[test]
    fn canonical_is_lossless() {
        let out = eject(&ast(), None, EjectMode::Canonical, EjectFormat::Native).unwrap();
        assert_eq!(out.output, DOC);
        assert!(!out.lossy);
        assert!(out.fields_omitted.is_empty());
        assert!(out.format_losses.is_empty());
    }

    #[test]
    fn authoring_annotates_bound_fields() {
        let schema = Schema::from_source(SCHEMA).unwrap();
        let out = eject(&ast(), Some(&schema), EjectMode::Authoring, EjectFormat::Native).unwrap();
        assert!(!out.lossy);
        assert!(out
            .output
            .contains("STATUS::ACTIVE // REQ∧ENUM[ACTIVE,DONE]→§INDEX\n"));
        assert!(out.output.contains("  DEPTH::2 // TYPE[NUMBER]→§STORE\n"));
        // still parses back to the same content
        let again = parse(tokenize(&out.output).unwrap().tokens).unwrap().ast;
        assert_eq!(again.documents[0].value_at(&["CFG", "DEPTH"]), ast().documents[0].value_at(&["CFG", "DEPTH"]));
    }

    #[test]
    fn executive_lists_every_omission() {
        let out = eject(&ast(), None, EjectMode::Executive, EjectFormat::Native).unwrap();
        assert!(out.lossy);
        assert_eq!(
            out.fields_omitted,
            vec!["META.TYPE", "CODE", "CFG.DEPTH", "CFG.INNER.LEAF"]
        );
        assert_eq!(out.output, "===D===\nSTATUS::ACTIVE\n===END===\n");
    }

    #[test]
    fn developer_drops_only_meta() {
        let out = eject(&ast(), None, EjectMode::Developer, EjectFormat::Native).unwrap();
        assert!(out.lossy);
        assert_eq!(out.fields_omitted, vec!["META.TYPE"]);
        assert!(out.output.contains("LEAF::x"));
        assert!(!out.output.contains("META"));
    }

    #[test]
    fn json_and_yaml_shapes() {
        let out = eject(&ast(), None, EjectMode::Canonical, EjectFormat::Json).unwrap();
        let v: serde_json::Value = serde_json::from_str(&out.output).unwrap();
        assert_eq!(v["documents"][0]["name"], "D");
        assert_eq!(v["documents"][0]["meta"]["TYPE"], "S");
        assert_eq!(v["documents"][0]["fields"]["CFG"]["DEPTH"], 2);
        assert_eq!(v["documents"][0]["fields"]["CODE"]["content"], "run");

        let out = eject(&ast(), None, EjectMode::Canonical, EjectFormat::Yaml).unwrap();
        let y: serde_yaml::Value = serde_yaml::from_str(&out.output).unwrap();
        assert_eq!(y["documents"][0]["fields"]["STATUS"], serde_yaml::Value::from("ACTIVE"));
    }

    const ANNOTATED: &str = "===D===
// header
NAME::\"x\"
STATUS::ACTIVE // current
N::12e3
FLOW::A→B
CFG→§STORE:
  DEPTH::2
===END===
";

    #[test]
    fn json_and_yaml_list_what_they_cannot_carry() {
        let ast = parse(tokenize(ANNOTATED).unwrap().tokens).unwrap().ast;
        let expected = vec![
            "D: comment",
            "STATUS: trailing comment",
            "STATUS: bare word read back as a string",
            "N: number spelling",
            "FLOW: expression read back as a string",
            "CFG: routing target",
        ];
        for mode in [EjectMode::Canonical, EjectMode::Authoring] {
            for format in [EjectFormat::Json, EjectFormat::Yaml] {
                let out = eject(&ast, None, mode, format).unwrap();
                assert!(out.lossy, "{:?} {:?}", mode, format);
                assert!(out.fields_omitted.is_empty());
                assert_eq!(out.format_losses, expected, "{:?} {:?}", mode, format);
            }
        }
    }

    #[test]
    fn plain_values_survive_json() {
        let src = "===D===\nNAME::\"x\"\nN::2\nOK::true\nL::[\"a\",0.5]\n===END===\n";
        let ast = parse(tokenize(src).unwrap().tokens).unwrap().ast;
        let out = eject(&ast, None, EjectMode::Canonical, EjectFormat::Json).unwrap();
        assert!(!out.lossy);
        assert!(out.format_losses.is_empty());
    }

    #[test]
    fn markdown_drops_trailing_comments_only() {
        let ast = parse(tokenize(ANNOTATED).unwrap().tokens).unwrap().ast;
        let out = eject(&ast, None, EjectMode::Canonical, EjectFormat::Markdown).unwrap();
        assert!(out.lossy);
        assert_eq!(out.format_losses, vec!["STATUS: trailing comment"]);
        assert!(out.output.contains("> header"));
    }

    #[test]
    fn markdown_has_headings_and_code() {
        let out = eject(&ast(), None, EjectMode::Canonical, EjectFormat::Markdown).unwrap();
        assert!(out.output.starts_with("# D\n"));
        assert!(out.output.contains("- **STATUS**: `ACTIVE`"));
        assert!(out.output.contains("## CFG"));
        assert!(out.output.contains("```sh\nrun\n```"));
    }

    #[test]
    fn template_from_schema_examples() {
        let schema = Schema::from_source(SCHEMA).unwrap();
        let t = template(&schema);
        let text = emit(&t);
        assert_eq!(
            text,
            "===S===\nMETA:\n  TYPE::S\n  VERSION::\"2\"\n---\nSTATUS::ACTIVE\nCFG→§STORE:\n  DEPTH::1\n===END===\n"
        );
    }
}
