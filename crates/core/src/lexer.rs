//! Source text → flat, position-tagged token stream.
//!
//! The lexer performs only lexical normalization: ASCII aliases become their
//! canonical symbols (each substitution is logged as a NORMALIZATION entry),
//! whitespace is classified into INDENT/NEWLINE tokens, and tabs are refused.
//! `tokenize` is a pure function of its input.

use crate::error::{ErrorCode, LexError};
use crate::repair::RepairEntry;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenKind {
    /// Quoted string; `value` holds the unescaped content
    String,
    /// Numeric literal, kept verbatim
    Number,
    Boolean,
    Null,
    Identifier,
    /// `::`
    Assign,
    /// `:` at end of line
    Block,
    /// `§` (alias `#`)
    SectionMarker,
    ListStart,
    ListEnd,
    Comma,
    /// `→` (alias `->`)
    Flow,
    /// `∧`
    Constraint,
    /// `∨`
    Alternative,
    /// `⊕` (alias `+`)
    Synthesis,
    /// `⧺` (alias `~`)
    Concat,
    /// `⇌` (alias ` vs `)
    Tension,
    /// `===NAME===`; `value` holds NAME
    EnvelopeStart,
    /// `===END===`
    EnvelopeEnd,
    /// `---`
    Separator,
    /// `// …`; `value` holds the trimmed text
    Comment,
    /// Fenced verbatim zone; `raw` holds both fences and the content
    LiteralZone,
    /// Leading spaces of a line; `value` holds the width
    Indent,
    Newline,
    Eof,
}

impl TokenKind {
    /// Canonical spelling of operator kinds.
    pub fn symbol(self) -> Option<&'static str> {
        match self {
            TokenKind::Assign => Some("::"),
            TokenKind::Block => Some(":"),
            TokenKind::SectionMarker => Some("§"),
            TokenKind::ListStart => Some("["),
            TokenKind::ListEnd => Some("]"),
            TokenKind::Comma => Some(","),
            TokenKind::Flow => Some("→"),
            TokenKind::Constraint => Some("∧"),
            TokenKind::Alternative => Some("∨"),
            TokenKind::Synthesis => Some("⊕"),
            TokenKind::Concat => Some("⧺"),
            TokenKind::Tension => Some("⇌"),
            TokenKind::Separator => Some("---"),
            TokenKind::String
            | TokenKind::Number
            | TokenKind::Boolean
            | TokenKind::Null
            | TokenKind::Identifier
            | TokenKind::EnvelopeStart
            | TokenKind::EnvelopeEnd
            | TokenKind::Comment
            | TokenKind::LiteralZone
            | TokenKind::Indent
            | TokenKind::Newline
            | TokenKind::Eof => None,
        }
    }
}

/// A lexical token. Never mutated after the lexer produces it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    /// Exact source text of the token
    pub raw: String,
    /// Normalized value (canonical symbol, unescaped string, envelope name…)
    pub value: String,
    pub line: u32,
    pub column: u32,
}

impl Token {
    /// Column just past the token (only meaningful for single-line tokens).
    pub fn end_column(&self) -> u32 {
        self.column + self.raw.chars().count() as u32
    }

    /// True when `next` starts exactly where this token ends.
    pub fn is_adjacent_to(&self, next: &Token) -> bool {
        self.line == next.line && self.end_column() == next.column
    }
}

/// Output of [`tokenize`]: the tokens plus one entry per alias substitution.
#[derive(Debug, Clone, PartialEq)]
pub struct Lexed {
    pub tokens: Vec<Token>,
    pub repairs: Vec<RepairEntry>,
}

pub fn tokenize(src: &str) -> Result<Lexed, LexError> {
    let lexed = Lexer::new(src).run()?;
    tracing::debug!(
        tokens = lexed.tokens.len(),
        aliases = lexed.repairs.len(),
        "tokenized"
    );
    Ok(lexed)
}

/// Whether `text` lexes, without any alias rewrite, as exactly one token of
/// `kind` spanning all of it.
pub(crate) fn is_single_token(text: &str, kind: TokenKind) -> bool {
    let Ok(lexed) = Lexer::new(text).run() else {
        return false;
    };
    if !lexed.repairs.is_empty() {
        return false;
    }
    let mut significant = lexed
        .tokens
        .iter()
        .filter(|t| !matches!(t.kind, TokenKind::Newline | TokenKind::Eof));
    matches!(
        (significant.next(), significant.next()),
        (Some(t), None) if t.kind == kind && t.raw == text
    )
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    col: u32,
    /// Bracket nesting; line structure is insignificant inside brackets.
    depth: usize,
    line_has_tokens: bool,
    tokens: Vec<Token>,
    repairs: Vec<RepairEntry>,
}

fn is_word_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

impl Lexer {
    fn new(src: &str) -> Self {
        Lexer {
            chars: src.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
            depth: 0,
            line_has_tokens: false,
            tokens: Vec::new(),
            repairs: Vec::new(),
        }
    }

    fn at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) {
        if let Some(c) = self.at(0) {
            self.pos += 1;
            if c == '\n' {
                self.line += 1;
                self.col = 1;
            } else {
                self.col += 1;
            }
        }
    }

    fn bump_n(&mut self, n: usize) {
        for _ in 0..n {
            self.bump();
        }
    }

    /// Text from the current position to the end of the line (exclusive).
    fn rest_of_line(&self) -> String {
        self.chars[self.pos..]
            .iter()
            .take_while(|c| **c != '\n')
            .collect::<String>()
            .trim_end_matches('\r')
            .to_owned()
    }

    fn push(&mut self, kind: TokenKind, raw: String, value: String, line: u32, column: u32) {
        self.tokens.push(Token {
            kind,
            raw,
            value,
            line,
            column,
        });
        self.line_has_tokens = true;
    }

    fn push_symbol(&mut self, kind: TokenKind, width: usize) {
        let (line, column) = (self.line, self.col);
        let raw: String = self.chars[self.pos..self.pos + width].iter().collect();
        let value = kind.symbol().unwrap_or_default().to_owned();
        self.bump_n(width);
        self.push(kind, raw, value, line, column);
    }

    fn push_alias(&mut self, kind: TokenKind, width: usize, rule_id: &str) {
        let (line, column) = (self.line, self.col);
        let raw: String = self.chars[self.pos..self.pos + width].iter().collect();
        let value = kind.symbol().unwrap_or_default().to_owned();
        self.repairs.push(RepairEntry::normalization(
            rule_id,
            raw.clone(),
            value.clone(),
            Some(line),
        ));
        self.bump_n(width);
        self.push(kind, raw, value, line, column);
    }

    fn error(&self, code: ErrorCode, message: impl Into<String>) -> LexError {
        LexError::new(code, self.line, self.col, self.rest_of_line(), message)
    }

    fn run(mut self) -> Result<Lexed, LexError> {
        while self.pos < self.chars.len() {
            if self.col == 1 && self.depth == 0 && self.scan_line_start()? {
                continue;
            }
            if self.col == 1 && self.depth > 0 && self.rest_of_line().trim_start().starts_with("===") {
                return Err(self.error(
                    ErrorCode::UnbalancedList,
                    "envelope line reached inside an open list",
                ));
            }
            let Some(c) = self.at(0) else { break };
            match c {
                ' ' => self.bump(),
                '\t' => return Err(self.error(ErrorCode::TabCharacter, "tab character")),
                '\r' => {
                    if self.at(1) == Some('\n') {
                        self.bump();
                    } else {
                        return Err(self.error(ErrorCode::IllegalCharacter, "bare carriage return"));
                    }
                }
                '\n' => {
                    if self.depth == 0 && self.line_has_tokens {
                        let (line, column) = (self.line, self.col);
                        self.tokens.push(Token {
                            kind: TokenKind::Newline,
                            raw: "\n".to_owned(),
                            value: String::new(),
                            line,
                            column,
                        });
                    }
                    self.bump();
                    self.line_has_tokens = false;
                }
                '/' if self.at(1) == Some('/') => self.lex_comment(),
                '"' => self.lex_string()?,
                '`' => self.lex_literal_zone()?,
                ':' => self.lex_colon()?,
                '-' if self.at(1) == Some('>') => self.push_alias(TokenKind::Flow, 2, "ascii_alias_flow"),
                '-' if self.at(1).is_some_and(|d| d.is_ascii_digit()) => self.lex_number(),
                '+' => self.push_alias(TokenKind::Synthesis, 1, "ascii_alias_synthesis"),
                '~' => self.push_alias(TokenKind::Concat, 1, "ascii_alias_concat"),
                '\u{2192}' => self.push_symbol(TokenKind::Flow, 1),
                '\u{2295}' => self.push_symbol(TokenKind::Synthesis, 1),
                '\u{29FA}' => self.push_symbol(TokenKind::Concat, 1),
                '\u{21CC}' => self.push_symbol(TokenKind::Tension, 1),
                '\u{2227}' => self.push_symbol(TokenKind::Constraint, 1),
                '\u{2228}' => self.push_symbol(TokenKind::Alternative, 1),
                '\u{00A7}' => self.push_symbol(TokenKind::SectionMarker, 1),
                '#' => {
                    let next = self.at(1);
                    let standalone = matches!(next, None | Some(' ') | Some('\n') | Some('\r'));
                    let before_name = next.is_some_and(|n| n.is_alphanumeric() || n == '_');
                    if standalone || before_name {
                        self.push_alias(TokenKind::SectionMarker, 1, "ascii_alias_section_marker");
                    } else {
                        return Err(self.error(
                            ErrorCode::IllegalCharacter,
                            "'#' is only a section marker alias when standalone or before a name",
                        ));
                    }
                }
                '[' => {
                    self.push_symbol(TokenKind::ListStart, 1);
                    self.depth += 1;
                }
                ']' => {
                    self.push_symbol(TokenKind::ListEnd, 1);
                    self.depth = self.depth.saturating_sub(1);
                }
                ',' => self.push_symbol(TokenKind::Comma, 1),
                d if d.is_ascii_digit() => self.lex_number(),
                w if is_word_start(w) => self.lex_word(),
                other => {
                    return Err(self.error(
                        ErrorCode::IllegalCharacter,
                        format!("unexpected character '{}'", other),
                    ))
                }
            }
        }

        if self.depth == 0 && self.line_has_tokens {
            let (line, column) = (self.line, self.col);
            self.tokens.push(Token {
                kind: TokenKind::Newline,
                raw: String::new(),
                value: String::new(),
                line,
                column,
            });
        }
        let (line, column) = (self.line, self.col);
        self.tokens.push(Token {
            kind: TokenKind::Eof,
            raw: String::new(),
            value: String::new(),
            line,
            column,
        });
        Ok(Lexed {
            tokens: self.tokens,
            repairs: self.repairs,
        })
    }

    /// Classify the start of a line. Returns true when the whole line was
    /// consumed (blank line) or emitted as a single line token.
    fn scan_line_start(&mut self) -> Result<bool, LexError> {
        let mut width = 0usize;
        while self.at(width) == Some(' ') {
            width += 1;
        }
        match self.at(width) {
            None => {
                self.bump_n(width);
                return Ok(true);
            }
            Some('\n') => {
                self.bump_n(width + 1);
                return Ok(true);
            }
            Some('\r') if self.at(width + 1) == Some('\n') => {
                self.bump_n(width + 2);
                return Ok(true);
            }
            Some('\t') => {
                self.bump_n(width);
                return Err(self.error(ErrorCode::TabCharacter, "tab character in indentation"));
            }
            _ => {}
        }

        let rest: String = self.chars[self.pos + width..]
            .iter()
            .take_while(|c| **c != '\n')
            .collect::<String>()
            .trim_end()
            .to_owned();

        if rest.starts_with("===") {
            if rest.contains('\t') {
                return Err(self.error(ErrorCode::TabCharacter, "tab character"));
            }
            if width > 0 {
                return Err(self.error(
                    ErrorCode::MalformedEnvelope,
                    "envelope markers must start at column 1",
                ));
            }
            let inner = rest
                .strip_prefix("===")
                .and_then(|r| r.strip_suffix("==="))
                .filter(|n| !n.is_empty() && n.chars().all(|c| c.is_alphanumeric() || c == '_'));
            let Some(name) = inner.map(str::to_owned) else {
                return Err(self.error(ErrorCode::MalformedEnvelope, "malformed envelope line"));
            };
            let kind = if name == "END" {
                TokenKind::EnvelopeEnd
            } else {
                TokenKind::EnvelopeStart
            };
            let (line, column) = (self.line, self.col);
            // Skip to the line break; the main loop emits the NEWLINE.
            while self.at(0).is_some_and(|c| c != '\n' && c != '\r') {
                self.bump();
            }
            self.push(kind, rest, name, line, column);
            return Ok(true);
        }

        if rest == "---" && width == 0 {
            let (line, column) = (self.line, self.col);
            while self.at(0).is_some_and(|c| c != '\n' && c != '\r') {
                self.bump();
            }
            self.push(TokenKind::Separator, rest, "---".to_owned(), line, column);
            return Ok(true);
        }

        if width > 0 {
            let (line, column) = (self.line, self.col);
            self.bump_n(width);
            self.push(TokenKind::Indent, " ".repeat(width), width.to_string(), line, column);
        }
        Ok(false)
    }

    fn lex_comment(&mut self) {
        let (line, column) = (self.line, self.col);
        let raw = self.rest_of_line().trim_end().to_owned();
        let text = raw[2..].trim().to_owned();
        self.bump_n(raw.chars().count());
        self.push(TokenKind::Comment, raw, text, line, column);
    }

    fn lex_string(&mut self) -> Result<(), LexError> {
        let (line, column) = (self.line, self.col);
        let start = self.pos;
        self.bump();
        let mut s = String::new();
        loop {
            match self.at(0) {
                None | Some('\n') => {
                    return Err(LexError::new(
                        ErrorCode::UnterminatedString,
                        line,
                        column,
                        self.chars[start..self.pos].iter().collect::<String>(),
                        "unterminated string literal",
                    ))
                }
                Some('\t') => return Err(self.error(ErrorCode::TabCharacter, "tab character in string")),
                Some('"') => {
                    self.bump();
                    break;
                }
                Some('\\') => {
                    self.bump();
                    match self.at(0) {
                        Some('"') => s.push('"'),
                        Some('\\') => s.push('\\'),
                        Some('n') => s.push('\n'),
                        Some('t') => s.push('\t'),
                        Some('r') => s.push('\r'),
                        Some(other) if other != '\n' => {
                            s.push('\\');
                            s.push(other);
                        }
                        _ => {
                            return Err(LexError::new(
                                ErrorCode::UnterminatedString,
                                line,
                                column,
                                self.chars[start..self.pos].iter().collect::<String>(),
                                "unterminated escape in string",
                            ))
                        }
                    }
                    self.bump();
                }
                Some(c) => {
                    s.push(c);
                    self.bump();
                }
            }
        }
        let raw: String = self.chars[start..self.pos].iter().collect();
        self.push(TokenKind::String, raw, s, line, column);
        Ok(())
    }

    fn lex_literal_zone(&mut self) -> Result<(), LexError> {
        let (line, column) = (self.line, self.col);
        let mut fence_len = 0usize;
        while self.at(fence_len) == Some('`') {
            fence_len += 1;
        }
        let after_assign = self
            .tokens
            .last()
            .is_some_and(|t| t.kind == TokenKind::Assign && t.line == line);
        if fence_len < 3 || !after_assign {
            return Err(self.error(
                ErrorCode::IllegalCharacter,
                "backticks only open a literal zone directly after '::'",
            ));
        }
        let fence = "`".repeat(fence_len);
        let opening = self.rest_of_line().trim_end().to_owned();
        if opening.contains('\t') {
            return Err(self.error(ErrorCode::TabCharacter, "tab character"));
        }
        if opening[fence_len..].contains('`') {
            return Err(self.error(ErrorCode::IllegalCharacter, "backtick in literal zone info"));
        }
        let unterminated = || {
            LexError::new(
                ErrorCode::UnterminatedLiteralZone,
                line,
                column,
                opening.clone(),
                format!("literal zone opened with {} is never closed", fence),
            )
        };

        // consume the opening line including its line break
        while self.at(0).is_some_and(|c| c != '\n') {
            self.bump();
        }
        if self.at(0).is_none() {
            return Err(unterminated());
        }
        self.bump();

        let mut raw_lines = vec![opening.clone()];
        loop {
            if self.at(0).is_none() {
                return Err(unterminated());
            }
            let text = self.rest_of_line();
            if text.contains('\t') {
                return Err(self.error(ErrorCode::TabCharacter, "tab character in literal zone"));
            }
            let trimmed = text.trim();
            if trimmed == fence {
                raw_lines.push(text.clone());
                while self.at(0).is_some_and(|c| c != '\n' && c != '\r') {
                    self.bump();
                }
                break;
            }
            if trimmed.starts_with("```") {
                return Err(LexError::new(
                    ErrorCode::NestedLiteralZone,
                    self.line,
                    self.col,
                    text.clone(),
                    format!("fence inside a literal zone opened at line {}", line),
                ));
            }
            raw_lines.push(text);
            while self.at(0).is_some_and(|c| c != '\n') {
                self.bump();
            }
            self.bump();
        }

        let content = raw_lines[1..raw_lines.len() - 1].join("\n");
        self.push(TokenKind::LiteralZone, raw_lines.join("\n"), content, line, column);
        Ok(())
    }

    fn lex_colon(&mut self) -> Result<(), LexError> {
        if self.at(1) == Some(':') {
            self.push_symbol(TokenKind::Assign, 2);
            return Ok(());
        }
        let mut j = 1;
        while self.at(j) == Some(' ') {
            j += 1;
        }
        let ends_line = match self.at(j) {
            None | Some('\n') | Some('\r') => true,
            Some('/') => self.at(j + 1) == Some('/'),
            _ => false,
        };
        if ends_line {
            self.push_symbol(TokenKind::Block, 1);
            Ok(())
        } else {
            Err(self.error(
                ErrorCode::SingleColonAssignment,
                "single ':' followed by a value; use '::' for assignment",
            ))
        }
    }

    /// Identifier continuation, stopping before `->` and `//`.
    fn continues_word(&self, offset: usize) -> bool {
        match self.at(offset) {
            Some('-') => self.at(offset + 1) != Some('>'),
            Some('/') => self.at(offset + 1) != Some('/'),
            Some(c) => c.is_alphanumeric() || c == '_' || c == '.',
            None => false,
        }
    }

    fn lex_number(&mut self) {
        let (line, column) = (self.line, self.col);
        let start = self.pos;
        let mut len = 0usize;
        if self.at(0) == Some('-') {
            len += 1;
        }
        while self.at(len).is_some_and(|c| c.is_ascii_digit()) {
            len += 1;
        }
        if self.at(len) == Some('.') && self.at(len + 1).is_some_and(|c| c.is_ascii_digit()) {
            len += 1;
            while self.at(len).is_some_and(|c| c.is_ascii_digit()) {
                len += 1;
            }
        }
        if matches!(self.at(len), Some('e') | Some('E')) {
            let exp_digit = |o: usize| self.at(o).is_some_and(|c| c.is_ascii_digit());
            if exp_digit(len + 1) {
                len += 2;
            } else if matches!(self.at(len + 1), Some('+') | Some('-')) && exp_digit(len + 2) {
                len += 3;
            }
            while self.at(len).is_some_and(|c| c.is_ascii_digit()) {
                len += 1;
            }
        }

        // A digit run glued to word characters (dates, versions) is a bare word.
        let mut kind = TokenKind::Number;
        if self.continues_word(len) {
            kind = TokenKind::Identifier;
            while self.continues_word(len) {
                len += 1;
            }
        }
        let raw: String = self.chars[start..start + len].iter().collect();
        self.bump_n(len);
        self.push(kind, raw.clone(), raw, line, column);
    }

    fn lex_word(&mut self) {
        let (line, column) = (self.line, self.col);
        let start = self.pos;
        let mut len = 1usize;
        while self.continues_word(len) {
            len += 1;
        }
        let word: String = self.chars[start..start + len].iter().collect();

        if word == "vs" {
            let spaced_before = start > 0 && self.chars[start - 1] == ' ';
            let spaced_after = self.at(len) == Some(' ');
            if spaced_before && spaced_after {
                self.push_alias(TokenKind::Tension, 2, "ascii_alias_tension");
                return;
            }
        }

        let kind = match word.as_str() {
            "true" | "false" => TokenKind::Boolean,
            "null" => TokenKind::Null,
            _ => TokenKind::Identifier,
        };
        self.bump_n(len);
        self.push(kind, word.clone(), word, line, column);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src).unwrap().tokens.iter().map(|t| t.kind).collect()
    }

    #[test]
    fn assignment_line() {
        assert_eq!(
            kinds("KEY::value\n"),
            vec![
                TokenKind::Identifier,
                TokenKind::Assign,
                TokenKind::Identifier,
                TokenKind::Newline,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn ascii_aliases_are_normalized_and_logged() {
        let lexed = tokenize("F::A->B+C~D\nT::X vs Y\nR::#SELF\n").unwrap();
        let values: Vec<&str> = lexed
            .tokens
            .iter()
            .filter(|t| t.kind.symbol().is_some())
            .map(|t| t.value.as_str())
            .collect();
        assert_eq!(values, vec!["::", "→", "⊕", "⧺", "::", "⇌", "::", "§"]);
        let rules: Vec<&str> = lexed.repairs.iter().map(|r| r.rule_id.as_str()).collect();
        assert_eq!(
            rules,
            vec![
                "ascii_alias_flow",
                "ascii_alias_synthesis",
                "ascii_alias_concat",
                "ascii_alias_tension",
                "ascii_alias_section_marker"
            ]
        );
        assert_eq!(lexed.repairs[0].before, "->");
        assert_eq!(lexed.repairs[0].after, "→");
        assert!(lexed.repairs.iter().all(|r| !r.semantics_changed));
    }

    #[test]
    fn vs_needs_word_boundaries() {
        let lexed = tokenize("K::versus\nvs::1\n").unwrap();
        assert!(lexed.repairs.is_empty());
        assert!(lexed.tokens.iter().all(|t| t.kind != TokenKind::Tension));
    }

    #[test]
    fn tab_is_an_error_not_a_repair() {
        let err = tokenize("BLOCK:\n\tKEY::1\n").unwrap_err();
        assert_eq!(err.code(), ErrorCode::TabCharacter);
        assert_eq!(err.0.line, 2);
    }

    #[test]
    fn single_colon_assignment_is_rejected() {
        let err = tokenize("KEY: value\n").unwrap_err();
        assert_eq!(err.code(), ErrorCode::SingleColonAssignment);
        assert_eq!(err.0.column, 4);
    }

    #[test]
    fn block_colon_may_be_followed_by_comment() {
        assert_eq!(
            kinds("BLOCK: // note\n"),
            vec![
                TokenKind::Identifier,
                TokenKind::Block,
                TokenKind::Comment,
                TokenKind::Newline,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn constraint_and_alternative_have_no_ascii_alias() {
        assert_eq!(
            tokenize("K::A&B\n").unwrap_err().code(),
            ErrorCode::IllegalCharacter
        );
        assert_eq!(
            tokenize("K::A|B\n").unwrap_err().code(),
            ErrorCode::IllegalCharacter
        );
    }

    #[test]
    fn operator_inside_string_stays_a_string() {
        let lexed = tokenize("K::[\"∧\"∧REQ]\n").unwrap();
        assert_eq!(lexed.tokens[3].kind, TokenKind::String);
        assert_eq!(lexed.tokens[3].value, "∧");
        assert_eq!(lexed.tokens[4].kind, TokenKind::Constraint);
    }

    #[test]
    fn newlines_inside_brackets_are_insignificant() {
        assert_eq!(
            kinds("L::[\n  a,\n  b\n]\n"),
            vec![
                TokenKind::Identifier,
                TokenKind::Assign,
                TokenKind::ListStart,
                TokenKind::Identifier,
                TokenKind::Comma,
                TokenKind::Identifier,
                TokenKind::ListEnd,
                TokenKind::Newline,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn envelope_and_indent_tokens() {
        let lexed = tokenize("===DOC===\nMETA:\n  TYPE::X\n===END===\n").unwrap();
        assert_eq!(lexed.tokens[0].kind, TokenKind::EnvelopeStart);
        assert_eq!(lexed.tokens[0].value, "DOC");
        let indent = lexed
            .tokens
            .iter()
            .find(|t| t.kind == TokenKind::Indent)
            .unwrap();
        assert_eq!(indent.value, "2");
        assert!(lexed.tokens.iter().any(|t| t.kind == TokenKind::EnvelopeEnd));
    }

    #[test]
    fn malformed_envelope_line() {
        let err = tokenize("===DOC\n").unwrap_err();
        assert_eq!(err.code(), ErrorCode::MalformedEnvelope);
    }

    #[test]
    fn dates_and_versions_are_bare_words() {
        let lexed = tokenize("D::2024-01-31\nV::1.2.3\nN::-4.5e3\n").unwrap();
        let words: Vec<(TokenKind, &str)> = lexed
            .tokens
            .iter()
            .filter(|t| matches!(t.kind, TokenKind::Identifier | TokenKind::Number))
            .map(|t| (t.kind, t.raw.as_str()))
            .collect();
        assert!(words.contains(&(TokenKind::Identifier, "2024-01-31")));
        assert!(words.contains(&(TokenKind::Identifier, "1.2.3")));
        assert!(words.contains(&(TokenKind::Number, "-4.5e3")));
    }

    #[test]
    fn literal_zone_is_verbatim() {
        let src = "CODE::```rust\nfn main() {\n    let a = 1; // ->\n}\n```\nNEXT::1\n";
        let lexed = tokenize(src).unwrap();
        let zone = lexed
            .tokens
            .iter()
            .find(|t| t.kind == TokenKind::LiteralZone)
            .unwrap();
        assert_eq!(zone.value, "fn main() {\n    let a = 1; // ->\n}");
        assert!(lexed.repairs.is_empty(), "no aliasing inside literal zones");
        assert!(lexed
            .tokens
            .iter()
            .any(|t| t.kind == TokenKind::Identifier && t.value == "NEXT"));
    }

    #[test]
    fn nested_literal_zone_is_an_error() {
        let src = "CODE::```md\nouter\n```rust\ninner\n```\n```\n";
        let err = tokenize(src).unwrap_err();
        assert_eq!(err.code(), ErrorCode::NestedLiteralZone);
        assert_eq!(err.0.line, 3);
    }

    #[test]
    fn unterminated_literal_zone() {
        let err = tokenize("CODE::```\nabc\n").unwrap_err();
        assert_eq!(err.code(), ErrorCode::UnterminatedLiteralZone);
    }

    #[test]
    fn unterminated_string() {
        let err = tokenize("K::\"abc\n").unwrap_err();
        assert_eq!(err.code(), ErrorCode::UnterminatedString);
        assert_eq!(err.0.column, 4);
    }

    #[test]
    fn single_token_check_follows_the_number_grammar() {
        for ok in ["5", "-5", "0.25", "12e3", "-4.5E-2"] {
            assert!(is_single_token(ok, TokenKind::Number), "{}", ok);
        }
        for bad in ["+5", ".5", "5.", "1_000", " 5", "5 ", "1e", "0x10", "5\n6", ""] {
            assert!(!is_single_token(bad, TokenKind::Number), "{:?}", bad);
        }
        assert!(is_single_token("ACTIVE", TokenKind::Identifier));
        assert!(!is_single_token("true", TokenKind::Identifier));
        assert!(!is_single_token("in progress", TokenKind::Identifier));
    }

    #[test]
    fn tokenize_is_deterministic() {
        let src = "===A===\nK::[x, y]->#Z\n===END===\n";
        assert_eq!(tokenize(src).unwrap(), tokenize(src).unwrap());
    }
}
