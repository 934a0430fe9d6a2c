use super::Parser;
use crate::ast::{BinaryOp, FlowExpression, ListValue, LiteralZone, SectionTarget, TokenSpan, Value};
use crate::error::{ErrorCode, ParseError};
use crate::lexer::TokenKind;
use crate::repair::RepairEntry;

impl Parser {
    /// value := binary (→ binary)*
    pub(super) fn parse_value(&mut self) -> Result<Value, ParseError> {
        let first = self.parse_binary()?;
        if self.kind() != TokenKind::Flow {
            return Ok(first);
        }
        let mut steps = vec![first];
        while self.kind() == TokenKind::Flow {
            self.advance();
            steps.push(self.parse_binary()?);
        }
        Ok(Value::Flow(FlowExpression { steps }))
    }

    /// binary := atom (op binary)?, right-associative.
    fn parse_binary(&mut self) -> Result<Value, ParseError> {
        let left = self.parse_atom()?;
        let op = match self.kind() {
            TokenKind::Synthesis => BinaryOp::Synthesis,
            TokenKind::Concat => BinaryOp::Concat,
            TokenKind::Tension => BinaryOp::Tension,
            TokenKind::Alternative => BinaryOp::Alternative,
            TokenKind::Constraint => BinaryOp::Constraint,
            _ => return Ok(left),
        };
        self.advance();
        let right = self.parse_binary()?;
        Ok(Value::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    /// Every token kind is listed: a kind that cannot start a value is an
    /// error, never a fallback to bare-word handling.
    pub(super) fn parse_atom(&mut self) -> Result<Value, ParseError> {
        match self.kind() {
            TokenKind::String => {
                let t = self.advance();
                let canonical = crate::emit::quote(&t.value);
                if t.raw != canonical {
                    self.log(RepairEntry::normalization(
                        "string_escape_normalized",
                        t.raw,
                        canonical,
                        Some(t.line),
                    ));
                }
                Ok(Value::String(t.value))
            }
            TokenKind::Number => Ok(Value::Number(self.advance().raw)),
            TokenKind::Boolean => Ok(Value::Boolean(self.advance().value == "true")),
            TokenKind::Null => {
                self.advance();
                Ok(Value::Null)
            }
            TokenKind::Identifier => {
                let t = self.advance();
                if self.kind() == TokenKind::ListStart && t.is_adjacent_to(self.cur()) {
                    return match self.parse_list()? {
                        Value::List(args) => Ok(Value::Tagged { tag: t.value, args }),
                        _ => Err(self.err_at(
                            &t,
                            ErrorCode::UnexpectedToken,
                            format!("arguments of {} must be a plain list", t.value),
                        )),
                    };
                }
                Ok(Value::Identifier(t.value))
            }
            TokenKind::SectionMarker => {
                let marker = self.advance();
                let named = matches!(self.kind(), TokenKind::Identifier | TokenKind::Number)
                    && marker.is_adjacent_to(self.cur());
                if !named {
                    return Err(self.err_at(
                        &marker,
                        ErrorCode::BareSectionMarker,
                        "section marker is not followed by a name",
                    ));
                }
                let name = self.advance().raw;
                Ok(Value::Target(SectionTarget { name }))
            }
            TokenKind::ListStart => self.parse_list(),
            TokenKind::LiteralZone => Err(self.err(
                ErrorCode::UnexpectedToken,
                "a literal zone must be the whole value of an assignment",
            )),
            TokenKind::ListEnd => Err(self.err(ErrorCode::UnbalancedList, "unmatched ']'")),
            TokenKind::Eof => Err(self.err(ErrorCode::UnexpectedToken, "unexpected end of input")),
            TokenKind::Assign
            | TokenKind::Block
            | TokenKind::Comma
            | TokenKind::Flow
            | TokenKind::Constraint
            | TokenKind::Alternative
            | TokenKind::Synthesis
            | TokenKind::Concat
            | TokenKind::Tension
            | TokenKind::EnvelopeStart
            | TokenKind::EnvelopeEnd
            | TokenKind::Separator
            | TokenKind::Comment
            | TokenKind::Indent
            | TokenKind::Newline => Err(self.err(
                ErrorCode::UnexpectedToken,
                format!("a value cannot start with {:?}", self.kind()),
            )),
        }
    }

    /// `[ … ]` as a list, or as an inline map when every item is `KEY::atom`.
    fn parse_list(&mut self) -> Result<Value, ParseError> {
        let open_index = self.pos;
        let open = self.advance();
        let mut items = Vec::new();
        let mut pairs = Vec::new();

        loop {
            match self.kind() {
                TokenKind::ListEnd => {
                    self.advance();
                    break;
                }
                TokenKind::Eof | TokenKind::EnvelopeEnd | TokenKind::EnvelopeStart => {
                    return Err(self.err_at(&open, ErrorCode::UnbalancedList, "list is never closed"))
                }
                TokenKind::Comma => {
                    return Err(self.err(ErrorCode::UnexpectedToken, "empty list item"));
                }
                _ => {}
            }

            if self.kind() == TokenKind::Comment {
                return Err(self.comment_in_list());
            }
            if self.kind() == TokenKind::Identifier && self.peek_kind(1) == TokenKind::Assign {
                let key_token = self.advance();
                self.advance();
                if pairs.iter().any(|(k, _)| *k == key_token.value) {
                    return Err(self.err_at(
                        &key_token,
                        ErrorCode::DuplicateKey,
                        format!("'{}' appears twice in this inline map", key_token.value),
                    ));
                }
                pairs.push((key_token.value, self.parse_map_value()?));
            } else {
                items.push(self.parse_value()?);
            }
            if !pairs.is_empty() && !items.is_empty() {
                return Err(self.err(
                    ErrorCode::UnexpectedToken,
                    "list mixes KEY::value pairs with plain items",
                ));
            }

            match self.kind() {
                TokenKind::Comma => {
                    let comma = self.advance();
                    if self.kind() == TokenKind::ListEnd {
                        self.log(RepairEntry::normalization(
                            "trailing_comma_removed",
                            ",",
                            "",
                            Some(comma.line),
                        ));
                    }
                }
                TokenKind::ListEnd => {}
                TokenKind::Eof | TokenKind::EnvelopeEnd | TokenKind::EnvelopeStart => {
                    return Err(self.err_at(&open, ErrorCode::UnbalancedList, "list is never closed"))
                }
                TokenKind::Comment => return Err(self.comment_in_list()),
                other => {
                    return Err(self.err(
                        ErrorCode::UnexpectedToken,
                        format!("expected ',' or ']' in list, found {:?}", other),
                    ))
                }
            }
        }

        if !pairs.is_empty() {
            return Ok(Value::InlineMap(pairs));
        }
        let span = TokenSpan::new(self.tokens.clone(), open_index..self.pos);
        Ok(Value::List(ListValue { items, span }))
    }

    fn comment_in_list(&self) -> ParseError {
        self.err(
            ErrorCode::UnexpectedToken,
            "comments cannot appear inside a list: a list is one value and has no place to keep them; move the comment above the assignment",
        )
    }

    /// Inline map values are atoms only.
    fn parse_map_value(&mut self) -> Result<Value, ParseError> {
        if self.kind() == TokenKind::ListStart {
            return Err(self.err(
                ErrorCode::InlineMapNesting,
                "inline map values cannot be lists",
            ));
        }
        let value = self.parse_atom()?;
        if !value.is_scalar()
            || matches!(
                self.kind(),
                TokenKind::Flow
                    | TokenKind::Synthesis
                    | TokenKind::Concat
                    | TokenKind::Tension
                    | TokenKind::Alternative
                    | TokenKind::Constraint
            )
        {
            return Err(self.err(
                ErrorCode::InlineMapNesting,
                "inline map values must be single atoms",
            ));
        }
        Ok(value)
    }

    /// A literal zone as an assignment value. Content is kept verbatim;
    /// only the fences are canonicalized.
    pub(super) fn parse_literal(&mut self, depth: usize) -> Result<Value, ParseError> {
        let t = self.advance();
        let raw_lines: Vec<&str> = t.raw.split('\n').collect();
        let (Some(opening), Some(closing)) = (raw_lines.first(), raw_lines.last()) else {
            return Err(self.err_at(&t, ErrorCode::UnterminatedLiteralZone, "empty literal zone"));
        };
        if raw_lines.len() < 2 {
            return Err(self.err_at(
                &t,
                ErrorCode::UnterminatedLiteralZone,
                "literal zone has no closing fence",
            ));
        }
        let fence_len = opening.chars().take_while(|c| *c == '`').count();
        let fence = opening[..fence_len].to_owned();
        let info = opening[fence_len..].trim().to_owned();
        let lines: Vec<String> = raw_lines[1..raw_lines.len() - 1]
            .iter()
            .map(|l| (*l).to_owned())
            .collect();

        let canonical_open = format!("{}{}", fence, info);
        let canonical_close = format!("{}{}", "  ".repeat(depth), fence);
        if *opening != canonical_open || *closing != canonical_close {
            self.log(RepairEntry::normalization(
                "literal_fence_normalized",
                format!("{} … {}", opening, closing),
                format!("{} … {}", canonical_open, canonical_close),
                Some(t.line),
            ));
        }
        Ok(Value::Literal(LiteralZone { fence, info, lines }))
    }
}
