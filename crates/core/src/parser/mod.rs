//! Token stream → AST.
//! The parser never guesses: anything ambiguous is a ParseError carrying a
//! fixed code. Layout rewrites it does perform (indentation, spacing,
//! quoting, synthesized envelopes) are appended to the repair list.

use crate::ast::{Ast, Document, Entry};
use crate::error::{ErrorCode, ParseError};
use crate::lexer::{Token, TokenKind};
use crate::repair::RepairEntry;
use std::sync::Arc;

mod entries;
mod values;

/// Output of [`parse`] / [`parse_with_warnings`].
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed {
    pub ast: Ast,
    pub repairs: Vec<RepairEntry>,
}

/// Strict parse: every document must be enveloped and closed.
pub fn parse(tokens: Vec<Token>) -> Result<Parsed, ParseError> {
    Parser::new(tokens, false, None).parse_file()
}

/// Lenient parse: a single implicit document gets a synthesized envelope and
/// a missing `===END===` is supplied. Both are logged.
pub fn parse_with_warnings(
    tokens: Vec<Token>,
    envelope_hint: Option<&str>,
) -> Result<Parsed, ParseError> {
    Parser::new(tokens, true, envelope_hint).parse_file()
}

// ──────────────────────────────────────────────
// Parser
// ──────────────────────────────────────────────

struct Parser {
    tokens: Arc<[Token]>,
    pos: usize,
    lenient: bool,
    envelope_hint: Option<String>,
    /// Source widths of the open indentation levels
    indents: Vec<usize>,
    repairs: Vec<RepairEntry>,
}

impl Parser {
    fn new(mut tokens: Vec<Token>, lenient: bool, envelope_hint: Option<&str>) -> Self {
        if tokens.last().map(|t| t.kind) != Some(TokenKind::Eof) {
            let (line, column) = tokens.last().map(|t| (t.line, t.end_column())).unwrap_or((1, 1));
            tokens.push(Token {
                kind: TokenKind::Eof,
                raw: String::new(),
                value: String::new(),
                line,
                column,
            });
        }
        Parser {
            tokens: Arc::from(tokens),
            pos: 0,
            lenient,
            envelope_hint: envelope_hint.map(str::to_owned),
            indents: vec![0],
            repairs: Vec::new(),
        }
    }

    fn cur(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn kind(&self) -> TokenKind {
        self.cur().kind
    }

    fn peek_kind(&self, offset: usize) -> TokenKind {
        let i = (self.pos + offset).min(self.tokens.len() - 1);
        self.tokens[i].kind
    }

    fn advance(&mut self) -> Token {
        let t = self.cur().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        t
    }

    fn err(&self, code: ErrorCode, msg: impl Into<String>) -> ParseError {
        let t = self.cur();
        ParseError::new(code, t.line, t.column, t.raw.clone(), msg)
    }

    fn err_at(&self, token: &Token, code: ErrorCode, msg: impl Into<String>) -> ParseError {
        ParseError::new(code, token.line, token.column, token.raw.clone(), msg)
    }

    fn log(&mut self, entry: RepairEntry) {
        self.repairs.push(entry);
    }

    fn skip_newlines(&mut self) {
        while self.kind() == TokenKind::Newline {
            self.advance();
        }
    }

    /// Accept the end of a logical line.
    fn expect_line_end(&mut self) -> Result<(), ParseError> {
        match self.kind() {
            TokenKind::Newline => {
                self.advance();
                Ok(())
            }
            TokenKind::Eof => Ok(()),
            _ => Err(self.err(
                ErrorCode::UnexpectedToken,
                format!("expected end of line, found {:?}", self.kind()),
            )),
        }
    }

    /// Source text of `tokens[range]`, spacing reconstructed from positions.
    fn source_text(&self, start: usize, end: usize) -> String {
        let mut out = String::new();
        let mut prev: Option<&Token> = None;
        for t in &self.tokens[start..end] {
            if let Some(p) = prev {
                if p.line == t.line {
                    let gap = t.column.saturating_sub(p.end_column()) as usize;
                    out.push_str(&" ".repeat(gap));
                } else {
                    out.push('\n');
                    out.push_str(&" ".repeat(t.column.saturating_sub(1) as usize));
                }
            }
            out.push_str(&t.raw);
            prev = Some(t);
        }
        out
    }

    /// True when some pair of consecutive tokens in the range is separated.
    fn has_gaps(&self, start: usize, end: usize) -> bool {
        self.tokens[start..end]
            .windows(2)
            .any(|w| !w[0].is_adjacent_to(&w[1]))
    }

    // -- File and envelope level ---------------------------------

    fn parse_file(mut self) -> Result<Parsed, ParseError> {
        self.skip_newlines();
        let mut documents = Vec::new();

        match self.kind() {
            TokenKind::Eof => {
                return Err(self.err(ErrorCode::MalformedEnvelope, "input contains no document"))
            }
            TokenKind::EnvelopeStart => {
                while self.kind() == TokenKind::EnvelopeStart {
                    documents.push(self.parse_document()?);
                    self.skip_newlines();
                }
            }
            _ if self.lenient => {
                documents.push(self.parse_implicit_document()?);
                self.skip_newlines();
            }
            _ => {
                return Err(self.err(
                    ErrorCode::MalformedEnvelope,
                    "document is not wrapped in ===NAME=== ... ===END===",
                ))
            }
        }

        if self.kind() != TokenKind::Eof {
            return Err(self.err(
                ErrorCode::MalformedEnvelope,
                "content outside of an envelope",
            ));
        }

        tracing::debug!(
            documents = documents.len(),
            repairs = self.repairs.len(),
            lenient = self.lenient,
            "parsed"
        );
        Ok(Parsed {
            ast: Ast { documents },
            repairs: self.repairs,
        })
    }

    fn parse_document(&mut self) -> Result<Document, ParseError> {
        let start = self.advance();
        self.expect_line_end()?;
        let (meta, separator, sections) = self.parse_body()?;

        match self.kind() {
            TokenKind::EnvelopeEnd => {
                self.advance();
                self.expect_line_end()?;
            }
            _ if self.lenient => {
                self.log(RepairEntry::normalization(
                    "envelope_end_synthesized",
                    "",
                    "===END===",
                    Some(self.cur().line),
                ));
            }
            _ => {
                return Err(self.err_at(
                    &start,
                    ErrorCode::MalformedEnvelope,
                    format!("envelope ==={}=== is never closed with ===END===", start.value),
                ))
            }
        }

        Ok(Document {
            name: start.value,
            meta,
            separator,
            sections,
        })
    }

    fn parse_implicit_document(&mut self) -> Result<Document, ParseError> {
        let mark = self.repairs.len();
        let (meta, separator, sections) = self.parse_body()?;
        if self.kind() == TokenKind::EnvelopeEnd {
            self.advance();
            self.expect_line_end()?;
        }

        let mut doc = Document {
            name: String::new(),
            meta,
            separator,
            sections,
        };
        let from_meta = doc
            .meta_value("TYPE")
            .and_then(|v| v.as_text())
            .filter(|n| !n.is_empty() && n.chars().all(|c| c.is_alphanumeric() || c == '_'))
            .map(str::to_owned);
        doc.name = self
            .envelope_hint
            .clone()
            .or(from_meta)
            .unwrap_or_else(|| "INFERRED".to_owned());

        // The envelope logically precedes everything found inside it.
        self.repairs.insert(
            mark,
            RepairEntry::normalization(
                "envelope_synthesized",
                "",
                format!("==={}===", doc.name),
                Some(1),
            ),
        );
        Ok(doc)
    }

    fn is_key(&self, name: &str) -> bool {
        let t = self.cur();
        t.kind == TokenKind::Identifier
            && t.value == name
            && matches!(
                self.peek_kind(1),
                TokenKind::Assign | TokenKind::Block | TokenKind::Flow
            )
    }

    /// META, optional separator and the top-level entries of one document.
    fn parse_body(&mut self) -> Result<(Option<Vec<Entry>>, bool, Vec<Entry>), ParseError> {
        self.indents = vec![0];
        self.skip_newlines();

        let mut meta = None;
        if self.is_key("META") {
            let at = self.cur().clone();
            match self.parse_entry(0)? {
                Entry::Block(b) if b.target.is_none() => meta = Some(b.children),
                _ => {
                    return Err(self.err_at(
                        &at,
                        ErrorCode::MalformedEnvelope,
                        "META must be a plain block (META:)",
                    ))
                }
            }
        }

        let mut separator = false;
        if self.kind() == TokenKind::Separator {
            self.advance();
            self.expect_line_end()?;
            separator = true;
        }

        let sections = self.parse_entries(0)?;
        Ok((meta, separator, sections))
    }
}

#[cfg(test)]
mod tests;
