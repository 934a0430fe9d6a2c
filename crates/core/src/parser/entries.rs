use super::Parser;
use crate::ast::{Assignment, Block, Entry, SectionTarget, Value};
use crate::error::{ErrorCode, ParseError};
use crate::lexer::TokenKind;
use crate::repair::RepairEntry;

impl Parser {
    /// Width of the current line's indentation, without consuming it.
    fn line_indent(&self) -> usize {
        if self.kind() == TokenKind::Indent {
            self.cur().raw.len()
        } else {
            0
        }
    }

    /// Entries of one indentation level. Stops at a dedent, at the end of
    /// the envelope or at end of input.
    pub(super) fn parse_entries(&mut self, depth: usize) -> Result<Vec<Entry>, ParseError> {
        let mut entries: Vec<Entry> = Vec::new();
        loop {
            match self.kind() {
                TokenKind::Eof | TokenKind::EnvelopeEnd | TokenKind::EnvelopeStart => break,
                TokenKind::Newline => {
                    self.advance();
                    continue;
                }
                _ => {}
            }

            let width = self.line_indent();
            let level = self.indents[depth];
            if width < level {
                if !self.indents[..depth].contains(&width) {
                    return Err(self.err(
                        ErrorCode::InconsistentIndentation,
                        format!(
                            "dedent to {} spaces matches no enclosing level ({:?})",
                            width,
                            &self.indents[..depth]
                        ),
                    ));
                }
                break;
            }

            let comment_line = self.peek_kind(usize::from(width > 0)) == TokenKind::Comment;
            if width > level && !comment_line {
                return Err(self.err(
                    ErrorCode::InconsistentIndentation,
                    format!(
                        "unexpected indentation of {} spaces; this level uses {}",
                        width, level
                    ),
                ));
            }

            if width > 0 {
                self.advance();
            }
            let canonical = depth * 2;
            if width != canonical {
                self.log(RepairEntry::normalization(
                    "indent_normalized",
                    " ".repeat(width),
                    " ".repeat(canonical),
                    Some(self.cur().line),
                ));
            }

            if depth == 0 && self.is_key("META") {
                return Err(self.err(
                    ErrorCode::MalformedEnvelope,
                    "META must be the first element of the envelope",
                ));
            }
            if self.kind() == TokenKind::Separator {
                return Err(self.err(
                    ErrorCode::UnexpectedToken,
                    "'---' may only follow the META block",
                ));
            }
            let key_token = self.cur().clone();
            let entry = self.parse_entry(depth)?;
            if let Some(key) = entry.key() {
                if entries.iter().any(|e| e.key() == Some(key)) {
                    return Err(self.err_at(
                        &key_token,
                        ErrorCode::DuplicateKey,
                        format!("'{}' is already defined at this level", key),
                    ));
                }
            }
            entries.push(entry);
        }
        Ok(entries)
    }

    /// One line: comment, assignment or block header (plus its children).
    pub(super) fn parse_entry(&mut self, depth: usize) -> Result<Entry, ParseError> {
        if self.kind() == TokenKind::Comment {
            let text = self.take_comment(false);
            self.expect_line_end()?;
            return Ok(Entry::Comment(text));
        }

        if self.kind() != TokenKind::Identifier {
            return Err(self.err(
                ErrorCode::UnexpectedToken,
                format!("expected a key, found {:?}", self.kind()),
            ));
        }
        let key_index = self.pos;
        let key = self.advance();

        match self.kind() {
            TokenKind::Assign => {
                let assign = self.advance();
                if !key.is_adjacent_to(&assign) || !assign.is_adjacent_to(self.cur()) {
                    let before = self.source_text(key_index, self.pos);
                    self.log(RepairEntry::normalization(
                        "assign_whitespace_collapsed",
                        before,
                        format!("{}::", key.value),
                        Some(key.line),
                    ));
                }
                let value = self.parse_assignment_value(depth)?;
                let comment = self.trailing_comment();
                self.expect_line_end()?;
                Ok(Entry::Assignment(Assignment {
                    key: key.value,
                    value,
                    comment,
                }))
            }
            TokenKind::Block | TokenKind::Flow => {
                let target = if self.kind() == TokenKind::Flow {
                    self.advance();
                    match self.parse_atom()? {
                        Value::Target(t) => Some(t),
                        other => {
                            return Err(self.err_at(
                                &key,
                                ErrorCode::UnexpectedToken,
                                format!(
                                    "a block routes to a §TARGET, found a {}",
                                    other.type_name()
                                ),
                            ))
                        }
                    }
                } else {
                    None
                };
                if self.kind() != TokenKind::Block {
                    return Err(self.err(
                        ErrorCode::UnexpectedToken,
                        "expected ':' to close the block header",
                    ));
                }
                self.advance();
                if self.has_gaps(key_index, self.pos) {
                    let before = self.source_text(key_index, self.pos);
                    let after = block_header(&key.value, target.as_ref());
                    self.log(RepairEntry::normalization(
                        "block_whitespace_collapsed",
                        before,
                        after,
                        Some(key.line),
                    ));
                }
                let comment = self.trailing_comment();
                self.expect_line_end()?;
                let children = self.parse_children(depth)?;
                Ok(Entry::Block(Block {
                    key: key.value,
                    target,
                    children,
                    comment,
                }))
            }
            _ => Err(self.err(
                ErrorCode::UnexpectedToken,
                format!("expected '::' or ':' after key '{}'", key.value),
            )),
        }
    }

    fn parse_children(&mut self, depth: usize) -> Result<Vec<Entry>, ParseError> {
        let width = self.line_indent();
        if self.kind() != TokenKind::Indent || width <= self.indents[depth] {
            return Ok(Vec::new());
        }
        self.indents.truncate(depth + 1);
        self.indents.push(width);
        let children = self.parse_entries(depth + 1);
        self.indents.truncate(depth + 1);
        children
    }

    /// Value of an assignment through the end of the line (excluding a
    /// trailing comment). Multi-word bare text becomes a string.
    fn parse_assignment_value(&mut self, depth: usize) -> Result<Value, ParseError> {
        let start = self.pos;
        if matches!(
            self.kind(),
            TokenKind::Newline | TokenKind::Eof | TokenKind::Comment
        ) {
            return Err(self.err(ErrorCode::UnexpectedToken, "assignment has no value"));
        }
        if self.kind() == TokenKind::LiteralZone {
            return self.parse_literal(depth);
        }

        let value = self.parse_value()?;

        if !at_value_end(self.kind()) {
            let end = self.line_content_end();
            let words = self.tokens[start..end].iter().all(|t| {
                matches!(
                    t.kind,
                    TokenKind::Identifier | TokenKind::Number | TokenKind::Boolean | TokenKind::Null
                )
            });
            if !words {
                return Err(self.err(
                    ErrorCode::UnexpectedToken,
                    format!("unexpected {:?} after value", self.kind()),
                ));
            }
            let text = self.source_text(start, end);
            let quoted = crate::emit::quote(&text);
            self.log(RepairEntry::normalization(
                "bare_multiword_quoted",
                text.clone(),
                quoted,
                Some(self.tokens[start].line),
            ));
            self.pos = end;
            return Ok(Value::String(text));
        }

        if self.has_gaps(start, self.pos) {
            let before = self.source_text(start, self.pos);
            let after = crate::emit::emit_value(&value);
            self.log(RepairEntry::normalization(
                "value_whitespace_collapsed",
                before,
                after,
                Some(self.tokens[start].line),
            ));
        }
        Ok(value)
    }

    /// Index of the first token at or after the cursor that ends the line.
    fn line_content_end(&self) -> usize {
        let mut i = self.pos;
        while i < self.tokens.len() && !at_value_end(self.tokens[i].kind) {
            i += 1;
        }
        i
    }

    /// Consume a comment token, logging non-canonical spacing.
    fn take_comment(&mut self, trailing: bool) -> String {
        let prev_end = self
            .pos
            .checked_sub(1)
            .map(|i| self.tokens[i].clone())
            .filter(|p| trailing && p.line == self.cur().line);
        let t = self.advance();
        let canonical = if t.value.is_empty() {
            "//".to_owned()
        } else {
            format!("// {}", t.value)
        };
        let spaced_once = prev_end.map_or(true, |p| p.end_column() + 1 == t.column);
        if t.raw != canonical || !spaced_once {
            self.log(RepairEntry::normalization(
                "comment_normalized",
                t.raw.clone(),
                canonical,
                Some(t.line),
            ));
        }
        t.value
    }

    fn trailing_comment(&mut self) -> Option<String> {
        if self.kind() == TokenKind::Comment {
            Some(self.take_comment(true))
        } else {
            None
        }
    }
}

fn at_value_end(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Newline | TokenKind::Eof | TokenKind::Comment
    )
}

fn block_header(key: &str, target: Option<&SectionTarget>) -> String {
    match target {
        Some(t) => format!("{}→{}:", key, t),
        None => format!("{}:", key),
    }
}
