//! Holographic pattern interpreter.
//!
//! Works on the token slice retained by the list node, classifying each
//! token by its lexical kind. A quoted `"∧"` is a STRING token and therefore
//! an example value; only a CONSTRAINT token separates constraints.

use super::{Constraint, RegexPattern, TypeKind};
use crate::ast::{ListValue, SectionTarget, Value};
use crate::error::{ErrorCode, SchemaError};
use crate::lexer::{Token, TokenKind};
use rust_decimal::Decimal;

/// `[example∧CONSTRAINT∧…→§TARGET]`
#[derive(Debug, Clone, PartialEq)]
pub struct HolographicPattern {
    pub example: Option<Value>,
    pub constraints: Vec<Constraint>,
    pub target: Option<SectionTarget>,
}

const BARE_CONSTRAINTS: &[&str] = &["REQ", "OPT", "DIR", "APPEND_ONLY", "DATE", "ISO8601"];
const TAGGED_CONSTRAINTS: &[&str] = &[
    "CONST",
    "REGEX",
    "ENUM",
    "TYPE",
    "RANGE",
    "MAX_LENGTH",
    "MIN_LENGTH",
];

fn malformed(t: &Token, msg: impl Into<String>) -> SchemaError {
    SchemaError::new(ErrorCode::MalformedPattern, "", msg).at_token(t.line, t.column, &t.raw)
}

fn unknown(t: &Token, msg: impl Into<String>) -> SchemaError {
    SchemaError::new(ErrorCode::UnknownConstraint, "", msg).at_token(t.line, t.column, &t.raw)
}

struct Cursor<'t> {
    tokens: &'t [Token],
    pos: usize,
    /// Position of `tokens[0]` inside the list's span
    offset: usize,
}

impl<'t> Cursor<'t> {
    fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos)
    }

    fn kind(&self) -> Option<TokenKind> {
        self.peek().map(|t| t.kind)
    }

    fn next(&mut self) -> Option<&'t Token> {
        let t = self.tokens.get(self.pos);
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    /// Index just past the `]` matching the `[` at the cursor.
    fn matching_close(&self) -> Option<usize> {
        let mut depth = 0usize;
        for (i, t) in self.tokens[self.pos..].iter().enumerate() {
            match t.kind {
                TokenKind::ListStart => depth += 1,
                TokenKind::ListEnd => {
                    depth = depth.checked_sub(1)?;
                    if depth == 0 {
                        return Some(self.pos + i + 1);
                    }
                }
                _ => {}
            }
        }
        None
    }

    /// The identifier at the cursor names a constraint (so there is no
    /// example before it).
    fn at_constraint_name(&self) -> bool {
        let Some(t) = self.peek() else { return false };
        if t.kind != TokenKind::Identifier {
            return false;
        }
        if BARE_CONSTRAINTS.contains(&t.value.as_str()) {
            return true;
        }
        TAGGED_CONSTRAINTS.contains(&t.value.as_str())
            && self
                .tokens
                .get(self.pos + 1)
                .is_some_and(|n| n.kind == TokenKind::ListStart && t.is_adjacent_to(n))
    }
}

/// Interpret a list value as a holographic pattern.
pub fn interpret(list: &ListValue) -> Result<HolographicPattern, SchemaError> {
    let all = list.span.tokens();
    let (Some(open), Some(close)) = (all.first(), all.last()) else {
        return Err(SchemaError::new(
            ErrorCode::MalformedPattern,
            "",
            "pattern has no source tokens",
        ));
    };
    if all.len() < 2 || open.kind != TokenKind::ListStart || close.kind != TokenKind::ListEnd {
        return Err(malformed(open, "pattern must be a bracketed list"));
    }
    let mut cur = Cursor {
        tokens: &all[1..all.len() - 1],
        pos: 0,
        offset: 1,
    };
    if cur.peek().is_none() {
        return Err(malformed(open, "empty pattern"));
    }

    let example = if cur.at_constraint_name() {
        None
    } else {
        Some(read_example(&mut cur, list)?)
    };

    let mut constraints = Vec::new();
    let mut need_operator = example.is_some();
    loop {
        if need_operator {
            if cur.kind() != Some(TokenKind::Constraint) {
                break;
            }
            cur.next();
        }
        constraints.push(read_constraint(&mut cur, open)?);
        need_operator = true;
    }

    let mut target = None;
    if cur.kind() == Some(TokenKind::Flow) {
        let arrow = cur.next();
        target = Some(read_target(&mut cur).ok_or_else(|| {
            malformed(arrow.unwrap_or(open), "→ must be followed by §TARGET")
        })?);
    }

    if let Some(extra) = cur.peek() {
        return Err(malformed(
            extra,
            format!("unexpected {:?} in pattern", extra.kind),
        ));
    }

    Ok(HolographicPattern {
        example,
        constraints,
        target,
    })
}

fn read_target(cur: &mut Cursor<'_>) -> Option<SectionTarget> {
    let marker = cur.peek()?;
    if marker.kind != TokenKind::SectionMarker {
        return None;
    }
    let name = cur.tokens.get(cur.pos + 1)?;
    if !matches!(name.kind, TokenKind::Identifier | TokenKind::Number) || !marker.is_adjacent_to(name) {
        return None;
    }
    cur.pos += 2;
    Some(SectionTarget::new(name.raw.clone()))
}

/// A single scalar token (or `§NAME`) as a value.
fn scalar(cur: &mut Cursor<'_>) -> Option<Value> {
    let t = cur.peek()?;
    let v = match t.kind {
        TokenKind::String => Value::String(t.value.clone()),
        TokenKind::Number => Value::Number(t.raw.clone()),
        TokenKind::Boolean => Value::Boolean(t.value == "true"),
        TokenKind::Null => Value::Null,
        TokenKind::Identifier => Value::Identifier(t.value.clone()),
        TokenKind::SectionMarker => return read_target(cur).map(Value::Target),
        _ => return None,
    };
    cur.pos += 1;
    Some(v)
}

fn read_example(cur: &mut Cursor<'_>, list: &ListValue) -> Result<Value, SchemaError> {
    let Some(first) = cur.peek() else {
        return Err(SchemaError::new(ErrorCode::MalformedPattern, "", "missing example"));
    };
    if first.kind != TokenKind::ListStart {
        return scalar(cur).ok_or_else(|| {
            malformed(first, format!("{:?} cannot be a pattern example", first.kind))
        });
    }

    let start = cur.pos;
    let end = cur
        .matching_close()
        .ok_or_else(|| malformed(first, "unbalanced list in example"))?;
    let mut inner = Cursor {
        tokens: &cur.tokens[start + 1..end - 1],
        pos: 0,
        offset: cur.offset + start + 1,
    };
    let items = read_items(&mut inner, first)?;
    let span = list.span.slice(cur.offset + start, cur.offset + end);
    cur.pos = end;
    Ok(Value::List(ListValue { items, span }))
}

/// Comma separated scalars.
fn read_items(cur: &mut Cursor<'_>, at: &Token) -> Result<Vec<Value>, SchemaError> {
    let mut items = Vec::new();
    while cur.peek().is_some() {
        let Some(item) = scalar(cur) else {
            let t = cur.peek().unwrap_or(at);
            return Err(malformed(t, "list arguments must be scalars"));
        };
        items.push(item);
        match cur.kind() {
            None => break,
            Some(TokenKind::Comma) => {
                cur.next();
            }
            Some(other) => {
                let t = cur.peek().unwrap_or(at);
                return Err(malformed(t, format!("expected ',' found {:?}", other)));
            }
        }
    }
    Ok(items)
}

fn read_constraint(cur: &mut Cursor<'_>, open: &Token) -> Result<Constraint, SchemaError> {
    let Some(name_tok) = cur.next() else {
        return Err(malformed(open, "pattern ends after ∧"));
    };
    if name_tok.kind != TokenKind::Identifier {
        return Err(malformed(
            name_tok,
            format!("expected a constraint name after ∧, found {:?}", name_tok.kind),
        ));
    }
    let name = name_tok.value.as_str();

    let args = if cur.kind() == Some(TokenKind::ListStart)
        && cur.peek().is_some_and(|t| name_tok.is_adjacent_to(t))
    {
        let start = cur.pos;
        let end = cur
            .matching_close()
            .ok_or_else(|| malformed(name_tok, "unbalanced constraint arguments"))?;
        let mut inner = Cursor {
            tokens: &cur.tokens[start + 1..end - 1],
            pos: 0,
            offset: 0,
        };
        let items = read_items(&mut inner, name_tok)?;
        cur.pos = end;
        Some(items)
    } else {
        None
    };

    let constraint = match (name, args) {
        ("REQ", None) => Constraint::Required,
        ("OPT", None) => Constraint::Optional,
        ("DIR", None) => Constraint::Directory,
        ("APPEND_ONLY", None) => Constraint::AppendOnly,
        ("DATE", None) => Constraint::Date,
        ("ISO8601", None) => Constraint::Iso8601,
        ("CONST", Some(mut a)) if a.len() == 1 => Constraint::ConstEquals(a.remove(0)),
        ("REGEX", Some(a)) => match a.as_slice() {
            [Value::String(p)] => Constraint::Regex(
                RegexPattern::new(p)
                    .map_err(|e| unknown(name_tok, format!("invalid regex {:?}: {}", p, e)))?,
            ),
            _ => return Err(unknown(name_tok, "REGEX takes one quoted pattern")),
        },
        ("ENUM", Some(a)) if !a.is_empty() => {
            let mut members = Vec::with_capacity(a.len());
            for v in &a {
                match v {
                    Value::Identifier(s) | Value::String(s) | Value::Number(s) => {
                        members.push(s.clone())
                    }
                    other => {
                        return Err(unknown(
                            name_tok,
                            format!("ENUM member cannot be a {}", other.type_name()),
                        ))
                    }
                }
            }
            Constraint::Enum(members)
        }
        ("TYPE", Some(a)) => match a.as_slice() {
            [Value::Identifier(k)] => Constraint::Type(
                TypeKind::from_name(k)
                    .ok_or_else(|| unknown(name_tok, format!("unknown type {}", k)))?,
            ),
            _ => return Err(unknown(name_tok, "TYPE takes one type name")),
        },
        ("RANGE", Some(a)) => match a.as_slice() {
            [Value::Number(lo), Value::Number(hi)] => {
                let min = parse_decimal(lo)
                    .ok_or_else(|| unknown(name_tok, format!("invalid number {}", lo)))?;
                let max = parse_decimal(hi)
                    .ok_or_else(|| unknown(name_tok, format!("invalid number {}", hi)))?;
                if min > max {
                    return Err(unknown(name_tok, "RANGE minimum exceeds maximum"));
                }
                Constraint::Range { min, max }
            }
            _ => return Err(unknown(name_tok, "RANGE takes two numbers")),
        },
        ("MAX_LENGTH", Some(a)) | ("MIN_LENGTH", Some(a)) => {
            let n = match a.as_slice() {
                [Value::Number(n)] => n.parse::<usize>().ok(),
                _ => None,
            }
            .ok_or_else(|| unknown(name_tok, format!("{} takes one non-negative integer", name)))?;
            if name == "MAX_LENGTH" {
                Constraint::MaxLength(n)
            } else {
                Constraint::MinLength(n)
            }
        }
        (other, args) => {
            let msg = if BARE_CONSTRAINTS.contains(&other) || TAGGED_CONSTRAINTS.contains(&other)
            {
                if args.is_some() {
                    format!("{} takes no arguments", other)
                } else {
                    format!("{} requires arguments", other)
                }
            } else {
                format!("unknown constraint {}", other)
            };
            return Err(unknown(name_tok, msg));
        }
    };
    Ok(constraint)
}

/// Exact decimal from a number literal, including exponent forms.
pub(crate) fn parse_decimal(raw: &str) -> Option<Decimal> {
    raw.parse::<Decimal>()
        .ok()
        .or_else(|| Decimal::from_scientific(raw).ok())
}
