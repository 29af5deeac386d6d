// skiff-parser - Lexer for Skiff
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Lexer (tokeniser) for Skiff source code.
//!
//! Converts a source string into a flat token stream in a single forward
//! pass. Interpolated string templates use a dedicated sub-mode that emits
//! start/text/expression/end tokens; the expression bodies stay opaque here
//! and are re-lexed by the parser.

use std::fmt;
use std::rc::Rc;

use crate::span::{Location, SourceSpan};
use crate::token::{classify_identifier, Token, TokenKind};

/// Lexer error carrying the offending span.
#[derive(Debug, Clone)]
pub struct LexError {
    pub message: String,
    pub span: SourceSpan,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Lex error at {}:{}:{}: {}",
            self.span.file, self.span.start.line, self.span.start.column, self.message
        )
    }
}

impl std::error::Error for LexError {}

/// Lex a whole source file into tokens.
pub fn lex(file_path: &str, source: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(file_path, source).lex()
}

/// The lexer converts source code into tokens.
pub struct Lexer {
    file: Rc<str>,
    chars: Vec<char>,
    index: usize,
    location: Location,
}

impl Lexer {
    /// Create a new lexer for the given file path and source text.
    pub fn new(file_path: &str, source: &str) -> Self {
        Self {
            file: Rc::from(file_path),
            chars: source.chars().collect(),
            index: 0,
            location: Location::default(),
        }
    }

    /// Create a lexer that starts counting from an explicit location.
    ///
    /// Used when re-lexing an interpolation expression so its spans remain
    /// correct relative to the enclosing file.
    pub fn with_start(file_path: &str, source: &str, start: Location) -> Self {
        Self {
            file: Rc::from(file_path),
            chars: source.chars().collect(),
            index: 0,
            location: start,
        }
    }

    /// Lex the entire input.
    pub fn lex(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();

        loop {
            self.skip_whitespace();

            let c = match self.peek(0) {
                Some(c) => c,
                None => return Ok(tokens),
            };
            let next = self.peek(1);

            match c {
                '0'..='9' => tokens.push(self.read_number()),

                '/' if matches!(next, Some('/') | Some('*')) => {
                    tokens.push(self.read_comment()?);
                }

                '(' | ')' | '+' | '-' | '/' | '*' | '!' | '=' | '>' | '<' | '&' | '|' | '^'
                | '%' | '?' => tokens.push(self.read_operator()),

                '.' if next == Some('.') => tokens.push(self.read_operator()),
                ':' if next == Some(':') => tokens.push(self.read_operator()),

                '#' if next.is_some_and(|n| n.is_alphanumeric()) => tokens.push(self.read_tag()),

                ',' | '.' | ';' | ':' | '{' | '}' | '[' | ']' | '@' | '#' => {
                    let start = self.location;
                    self.advance(1);
                    tokens.push(self.token_from(start, 1, c.to_string(), TokenKind::Punctuation));
                }

                '\'' => tokens.push(self.read_char()?),
                '"' => tokens.push(self.read_string()?),
                '`' => self.read_interpolated(&mut tokens)?,

                _ if c == '_' || c.is_alphabetic() => tokens.push(self.read_identifier()),

                other => {
                    let start = self.location;
                    let mut end = start;
                    end.advance_by(1);
                    return Err(self.error_at(
                        start,
                        end,
                        format!("Unexpected character `{}`", other),
                    ));
                }
            }
        }
    }

    // ========================================================================
    // Character access
    // ========================================================================

    #[inline]
    fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.index + offset).copied()
    }

    #[inline]
    fn advance(&mut self, by: usize) {
        self.index += by;
        self.location.advance_by(by as u32);
    }

    #[inline]
    fn advance_newline(&mut self) {
        self.index += 1;
        self.location.newline();
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek(0) {
            match c {
                '\n' => self.advance_newline(),
                ' ' | '\t' | '\r' => self.advance(1),
                _ => return,
            }
        }
    }

    /// Skip whitespace up to and including the first newline. Lets a
    /// template's first text line start at column 1.
    fn skip_whitespace_to_next_line(&mut self) {
        while let Some(c) = self.peek(0) {
            match c {
                ' ' | '\t' | '\r' => self.advance(1),
                '\n' => {
                    self.advance_newline();
                    return;
                }
                _ => return,
            }
        }
    }

    fn token_from(&self, start: Location, length: u32, text: String, kind: TokenKind) -> Token {
        Token::new(
            SourceSpan::new(Rc::clone(&self.file), length, start, self.location),
            text,
            kind,
        )
    }

    fn error_at(&self, start: Location, end: Location, message: String) -> LexError {
        LexError {
            message,
            span: SourceSpan::new(Rc::clone(&self.file), 0, start, end),
        }
    }

    // ========================================================================
    // Token scanners
    // ========================================================================

    /// Scan a numeric literal. The decimal-point count classifies the token:
    /// zero → Int, one → Double, two or more → Version. Underscores separate
    /// digit groups and are stripped from the token text.
    fn read_number(&mut self) -> Token {
        let start = self.location;
        let start_index = self.index;
        let mut decimal_count = 0u32;

        loop {
            match self.peek(0) {
                Some('.') if self.peek(1).is_some_and(|c| c.is_ascii_digit()) => {
                    decimal_count += 1;
                    self.advance(1);
                }
                Some('_') if decimal_count == 0 => self.advance(1),
                Some('0'..='9') => self.advance(1),
                _ => break,
            }
        }

        let kind = match decimal_count {
            0 => TokenKind::Int,
            1 => TokenKind::Double,
            _ => TokenKind::Version,
        };

        let text: String = self.chars[start_index..self.index]
            .iter()
            .filter(|&&c| c != '_')
            .collect();
        self.token_from(start, (self.index - start_index) as u32, text, kind)
    }

    fn read_identifier(&mut self) -> Token {
        let start = self.location;
        let start_index = self.index;

        while let Some(c) = self.peek(0) {
            if c == '_' || c.is_alphanumeric() {
                self.advance(1);
            } else {
                break;
            }
        }

        let text: String = self.chars[start_index..self.index].iter().collect();
        let kind = classify_identifier(&text);
        self.token_from(start, (self.index - start_index) as u32, text, kind)
    }

    /// Scan a `#name@version` package tag as a single token.
    fn read_tag(&mut self) -> Token {
        let start = self.location;
        let start_index = self.index;
        self.advance(1); // #

        while let Some(c) = self.peek(0) {
            if c == '.' || c.is_alphanumeric() {
                self.advance(1);
            } else {
                break;
            }
        }

        if self.peek(0) == Some('@') {
            self.advance(1);
            while let Some(c) = self.peek(0) {
                if c == '.' || c == '-' || c.is_alphanumeric() {
                    self.advance(1);
                } else {
                    break;
                }
            }
        }

        let text: String = self.chars[start_index..self.index].iter().collect();
        self.token_from(start, (self.index - start_index) as u32, text, TokenKind::Tag)
    }

    fn read_char(&mut self) -> Result<Token, LexError> {
        let start = self.location;
        let start_index = self.index;
        self.advance(1); // opening quote

        let value = match self.peek(0) {
            Some('\'') => {
                let mut end = self.location;
                end.advance_by(1);
                return Err(self.error_at(start, end, "Empty char literal".into()));
            }
            Some('\\') => match self.peek(1) {
                Some(c @ ('\'' | '"' | '\\' | '0' | 'a' | 'b' | 'f' | 'n' | 'r' | 't' | 'v')) => {
                    self.advance(2);
                    unescape(c)
                }
                _ => {
                    let mut end = self.location;
                    end.advance_by(2);
                    return Err(self.error_at(
                        start,
                        end,
                        "Invalid escape character sequence".into(),
                    ));
                }
            },
            Some(c) => {
                self.advance(1);
                c
            }
            None => {
                return Err(self.error_at(start, self.location, "Unterminated char literal".into()))
            }
        };

        if self.peek(0) != Some('\'') {
            return Err(self.error_at(
                start,
                self.location,
                "Expected closing single quote for char literal".into(),
            ));
        }
        self.advance(1);

        let length = (self.index - start_index) as u32;
        Ok(self.token_from(start, length, value.to_string(), TokenKind::Char))
    }

    /// Scan a double-quoted string. The token text keeps the surrounding
    /// quotes with escape sequences already decoded; strings may span lines.
    fn read_string(&mut self) -> Result<Token, LexError> {
        let start = self.location;
        let start_index = self.index;
        let mut text = String::from('"');
        self.advance(1); // opening quote

        loop {
            match self.peek(0) {
                Some('\\') => {
                    match self.peek(1) {
                        Some(
                            c @ ('\'' | '"' | '\\' | '0' | 'a' | 'b' | 'f' | 'n' | 'r' | 't' | 'v'),
                        ) => text.push(unescape(c)),
                        Some(other) => {
                            let escape_start = self.location;
                            let mut end = escape_start;
                            end.advance_by(2);
                            return Err(self.error_at(
                                escape_start,
                                end,
                                format!("Invalid escape character sequence `\\{}`", other),
                            ));
                        }
                        None => {
                            return Err(self.error_at(
                                start,
                                self.location,
                                "Unterminated string literal".into(),
                            ))
                        }
                    }
                    self.advance(2);
                }

                Some('"') => {
                    self.advance(1);
                    text.push('"');
                    let length = (self.index - start_index) as u32;
                    return Ok(self.token_from(start, length, text, TokenKind::String));
                }

                Some('\n') => {
                    text.push('\n');
                    self.advance_newline();
                }

                Some(c) => {
                    text.push(c);
                    self.advance(1);
                }

                None => {
                    return Err(self.error_at(
                        start,
                        self.location,
                        "Unterminated string literal".into(),
                    ))
                }
            }
        }
    }

    /// Scan a backtick-delimited interpolated template, emitting a start
    /// token, alternating text and opaque `{expr}` tokens, and an end token.
    fn read_interpolated(&mut self, tokens: &mut Vec<Token>) -> Result<(), LexError> {
        let open_start = self.location;
        self.advance(1); // `
        tokens.push(self.token_from(
            open_start,
            1,
            "`".to_string(),
            TokenKind::InterpolationStart,
        ));

        // Multi-line templates: let the first text line start at column 1.
        self.skip_whitespace_to_next_line();

        let mut part_start = self.location;
        let mut part_index = self.index;

        loop {
            match self.peek(0) {
                Some('\n') => self.advance_newline(),

                Some('\\') => self.advance(2),

                Some('`') => {
                    if part_index < self.index {
                        let text: String = self.chars[part_index..self.index].iter().collect();
                        tokens.push(Token::new(
                            SourceSpan::new(
                                Rc::clone(&self.file),
                                (self.index - part_index) as u32,
                                part_start,
                                self.location,
                            ),
                            text,
                            TokenKind::InterpolationText,
                        ));
                    }

                    let end_start = self.location;
                    self.advance(1);
                    tokens.push(self.token_from(
                        end_start,
                        1,
                        "`".to_string(),
                        TokenKind::InterpolationEnd,
                    ));
                    return Ok(());
                }

                Some('{') => {
                    if part_index < self.index {
                        let text: String = self.chars[part_index..self.index].iter().collect();
                        tokens.push(Token::new(
                            SourceSpan::new(
                                Rc::clone(&self.file),
                                (self.index - part_index) as u32,
                                part_start,
                                self.location,
                            ),
                            text,
                            TokenKind::InterpolationText,
                        ));
                    }

                    part_start = self.location;
                    part_index = self.index;
                    self.advance(1); // {

                    let mut depth = 0i32;
                    loop {
                        match self.peek(0) {
                            Some('{') => {
                                depth += 1;
                                self.advance(1);
                            }
                            Some('}') => {
                                depth -= 1;
                                self.advance(1);
                                if depth < 0 {
                                    break;
                                }
                            }
                            Some('\n') => self.advance_newline(),
                            Some(_) => self.advance(1),
                            None => {
                                return Err(self.error_at(
                                    part_start,
                                    self.location,
                                    "Unterminated interpolation expression".into(),
                                ))
                            }
                        }
                    }

                    // Token text includes the surrounding braces.
                    let text: String = self.chars[part_index..self.index].iter().collect();
                    tokens.push(Token::new(
                        SourceSpan::new(
                            Rc::clone(&self.file),
                            (self.index - part_index) as u32,
                            part_start,
                            self.location,
                        ),
                        text,
                        TokenKind::Interpolation,
                    ));
                    part_start = self.location;
                    part_index = self.index;
                }

                Some(_) => self.advance(1),

                None => {
                    return Err(self.error_at(
                        open_start,
                        self.location,
                        "Unterminated string template".into(),
                    ))
                }
            }
        }
    }

    fn read_comment(&mut self) -> Result<Token, LexError> {
        let start = self.location;
        let start_index = self.index;
        self.advance(1); // first /
        let block = self.peek(0) == Some('*');
        self.advance(1);

        loop {
            match self.peek(0) {
                None if !block => break,
                None => {
                    return Err(self.error_at(start, self.location, "Unterminated comment".into()))
                }

                Some('\n') if !block => {
                    self.advance_newline();
                    break;
                }

                Some('*') if block && self.peek(1) == Some('/') => {
                    self.advance(2);
                    break;
                }

                Some('\n') => self.advance_newline(),
                Some(_) => self.advance(1),
            }
        }

        let text: String = self.chars[start_index..self.index].iter().collect();
        Ok(self.token_from(
            start,
            (self.index - start_index) as u32,
            text.trim_end_matches('\n').to_string(),
            TokenKind::Comment,
        ))
    }

    fn read_operator(&mut self) -> Token {
        let c = self.peek(0).unwrap_or('\0');
        let next = self.peek(1);

        let op: &str = match (c, next) {
            ('<', Some('=')) => "<=",
            ('<', Some('>')) => "<>",
            ('<', Some('<')) => "<<",
            ('>', Some('=')) => ">=",
            ('>', Some('>')) => ">>",
            ('+', Some('+')) => "++",
            ('+', Some('=')) => "+=",
            ('-', Some('-')) => "--",
            ('-', Some('=')) => "-=",
            ('=', Some('>')) => "=>",
            ('=', Some('=')) => "==",
            ('!', Some('=')) => "!=",
            ('&', Some('&')) => "&&",
            ('|', Some('|')) => "||",
            (':', Some(':')) => "::",
            ('.', Some('.')) => {
                if self.peek(2) == Some('=') {
                    "..="
                } else {
                    ".."
                }
            }
            ('+', _) => "+",
            ('-', _) => "-",
            ('/', _) => "/",
            ('*', _) => "*",
            ('!', _) => "!",
            ('=', _) => "=",
            ('>', _) => ">",
            ('<', _) => "<",
            ('&', _) => "&",
            ('|', _) => "|",
            ('^', _) => "^",
            ('%', _) => "%",
            ('?', _) => "?",
            ('(', _) => "(",
            (')', _) => ")",
            (':', _) => ":",
            _ => ".",
        };

        let start = self.location;
        self.advance(op.chars().count());
        let kind = if op == ".." || op == "..=" {
            TokenKind::RangeOperator
        } else {
            TokenKind::Operator
        };
        self.token_from(start, op.chars().count() as u32, op.to_string(), kind)
    }
}

fn unescape(c: char) -> char {
    match c {
        '0' => '\0',
        'a' => '\x07',
        'b' => '\x08',
        'f' => '\x0C',
        'n' => '\n',
        'r' => '\r',
        't' => '\t',
        'v' => '\x0B',
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex("test.skf", source)
            .expect("lex failed")
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn lexes_numbers() {
        let tokens = lex("test.skf", "42 3.14 1.2.3").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Int);
        assert_eq!(tokens[1].kind, TokenKind::Double);
        assert_eq!(tokens[2].kind, TokenKind::Version);
    }

    #[test]
    fn strips_underscores_from_numbers() {
        let tokens = lex("test.skf", "1_000").unwrap();
        assert_eq!(tokens[0].text, "1000");
        assert_eq!(tokens[0].span.length, 5);
    }

    #[test]
    fn classifies_keywords() {
        assert_eq!(kinds("let"), vec![TokenKind::Keyword]);
        assert_eq!(kinds("is"), vec![TokenKind::Operator]);
        assert_eq!(kinds("true"), vec![TokenKind::Boolean]);
        assert_eq!(kinds("foo"), vec![TokenKind::Identifier]);
    }

    #[test]
    fn lexes_two_char_operators() {
        let tokens = lex("test.skf", "a += 1").unwrap();
        assert_eq!(tokens[1].text, "+=");
        assert_eq!(tokens[1].kind, TokenKind::Operator);
    }

    #[test]
    fn lexes_range_operators() {
        let tokens = lex("test.skf", "0..10").unwrap();
        assert_eq!(tokens[1].kind, TokenKind::RangeOperator);
        assert_eq!(tokens[1].text, "..");

        let tokens = lex("test.skf", "0..=10").unwrap();
        assert_eq!(tokens[1].text, "..=");
    }

    #[test]
    fn interpolation_emits_part_tokens() {
        let tokens = lex("test.skf", "`a{1+1}b`").unwrap();
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::InterpolationStart,
                TokenKind::InterpolationText,
                TokenKind::Interpolation,
                TokenKind::InterpolationText,
                TokenKind::InterpolationEnd,
            ]
        );
        assert_eq!(tokens[2].text, "{1+1}");
    }

    #[test]
    fn unterminated_string_reports_opening_quote() {
        let err = lex("test.skf", "  \"abc").unwrap_err();
        assert_eq!(err.span.start.column, 3);
        assert!(err.message.contains("Unterminated string"));
    }

    #[test]
    fn empty_char_literal_is_an_error() {
        let err = lex("test.skf", "''").unwrap_err();
        assert!(err.message.contains("Empty char literal"));
    }

    #[test]
    fn tag_is_one_token() {
        let tokens = lex("test.skf", "#http@1.2.0").unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Tag);
        assert_eq!(tokens[0].text, "#http@1.2.0");
    }

    #[test]
    fn block_comment_must_terminate() {
        assert!(lex("test.skf", "/* open").is_err());
        let tokens = lex("test.skf", "/* ok */ 1").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Comment);
        assert_eq!(tokens[1].kind, TokenKind::Int);
    }

    #[test]
    fn spans_track_lines() {
        let tokens = lex("test.skf", "a\n  b").unwrap();
        assert_eq!(tokens[1].span.start.line, 2);
        assert_eq!(tokens[1].span.start.column, 3);
    }
}
