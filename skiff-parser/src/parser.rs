// skiff-parser - Parser for Skiff
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Recursive descent parser for Skiff source code.
//!
//! Builds [`Expr`] trees from tokens using operator-precedence climbing.
//! Interpolated string templates are re-entrant: each opaque `{expr}` token
//! is re-lexed and re-parsed with an offset-adjusted start location so error
//! spans remain correct for the whole file.

use std::fmt;
use std::rc::Rc;

use crate::ast::{
    BinaryOp, Expr, FieldDef, FunctionDef, InterpolatedPart, MatchArm, ObjectField, Param,
    Pattern, TraitFn, UnionVariant,
};
use crate::lexer::{LexError, Lexer};
use crate::span::{Location, SourceSpan};
use crate::token::{Token, TokenKind};

/// Parser error kinds. Every variant carries enough to render a diagnostic
/// pointing back at the source.
#[derive(Debug, Clone)]
pub enum ParseError {
    UnexpectedToken { token: String, span: SourceSpan },
    UnexpectedEof,
    Expected {
        expected: String,
        found: String,
        span: SourceSpan,
    },
    Lex(LexError),
}

impl ParseError {
    /// The span of the offending input, when one exists.
    pub fn span(&self) -> Option<&SourceSpan> {
        match self {
            ParseError::UnexpectedToken { span, .. } => Some(span),
            ParseError::UnexpectedEof => None,
            ParseError::Expected { span, .. } => Some(span),
            ParseError::Lex(e) => Some(&e.span),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::UnexpectedToken { token, span } => {
                write!(
                    f,
                    "Syntax error at {}:{}:{}: unexpected token {}",
                    span.file, span.start.line, span.start.column, token
                )
            }
            ParseError::UnexpectedEof => write!(f, "Syntax error: unexpected end of input"),
            ParseError::Expected {
                expected,
                found,
                span,
            } => write!(
                f,
                "Syntax error at {}:{}:{}: expected {} but found {}",
                span.file, span.start.line, span.start.column, expected, found
            ),
            ParseError::Lex(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ParseError {}

impl From<LexError> for ParseError {
    fn from(e: LexError) -> Self {
        ParseError::Lex(e)
    }
}

/// Result alias for parser operations.
pub type Result<T> = std::result::Result<T, ParseError>;

/// Lex and parse a whole source file.
pub fn parse_source(file_path: &str, source: &str) -> Result<Vec<Expr>> {
    let tokens = crate::lexer::lex(file_path, source)?;
    Parser::new(tokens).parse()
}

/// The parser converts tokens into [`Expr`] nodes.
pub struct Parser {
    tokens: Vec<Token>,
    index: usize,
    file: Rc<str>,
}

impl Parser {
    /// Create a parser over a token stream.
    pub fn new(tokens: Vec<Token>) -> Self {
        let file = tokens
            .first()
            .map(|t| Rc::clone(&t.span.file))
            .unwrap_or_else(|| Rc::from(""));
        Self {
            tokens,
            index: 0,
            file,
        }
    }

    /// Parse the whole program: a sequence of top-level expressions.
    /// Comments are dropped; `;` separators are consumed.
    pub fn parse(&mut self) -> Result<Vec<Expr>> {
        let mut expressions = Vec::new();

        while self.index < self.tokens.len() {
            let expression = self.parse_expression(0)?;
            if !matches!(expression, Expr::Comment { .. }) {
                expressions.push(expression);
            }

            if self.current_is_char(';') {
                self.move_next();
            }
        }

        Ok(expressions)
    }

    // ========================================================================
    // Token cursor
    // ========================================================================

    #[inline]
    fn current(&self) -> Option<&Token> {
        self.tokens.get(self.index)
    }

    #[inline]
    fn peek(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.index + offset)
    }

    #[inline]
    fn move_next(&mut self) {
        self.index += 1;
    }

    fn take(&mut self) -> Result<Token> {
        let token = self.tokens.get(self.index).cloned().ok_or(ParseError::UnexpectedEof)?;
        self.move_next();
        Ok(token)
    }

    fn current_is_char(&self, c: char) -> bool {
        self.current().is_some_and(|t| t.is_char(c))
    }

    fn current_is_text(&self, text: &str) -> bool {
        self.current().is_some_and(|t| t.is_text(text))
    }

    fn try_consume_char(&mut self, c: char) -> bool {
        if self.current_is_char(c) {
            self.move_next();
            true
        } else {
            false
        }
    }

    fn try_consume_char_token(&mut self, c: char) -> Option<Token> {
        if self.current_is_char(c) {
            self.take().ok()
        } else {
            None
        }
    }

    fn try_consume_text(&mut self, text: &str) -> Option<Token> {
        if self.current_is_text(text) {
            self.take().ok()
        } else {
            None
        }
    }

    fn expect_and_consume_char(&mut self, c: char) -> Result<Token> {
        match self.current() {
            Some(token) if token.is_char(c) => self.take(),
            Some(token) => Err(ParseError::Expected {
                expected: format!("`{}`", c),
                found: token.to_string(),
                span: token.span.clone(),
            }),
            None => Err(ParseError::UnexpectedEof),
        }
    }

    fn expect_and_consume_text(&mut self, text: &str) -> Result<Token> {
        match self.current() {
            Some(token) if token.is_text(text) => self.take(),
            Some(token) => Err(ParseError::Expected {
                expected: format!("`{}`", text),
                found: token.to_string(),
                span: token.span.clone(),
            }),
            None => Err(ParseError::UnexpectedEof),
        }
    }

    fn expect_and_consume_kinds(&mut self, kinds: &[TokenKind]) -> Result<Token> {
        match self.current() {
            Some(token) if kinds.contains(&token.kind) => self.take(),
            Some(token) => {
                let names: Vec<String> = kinds.iter().map(|k| k.to_string()).collect();
                Err(ParseError::Expected {
                    expected: names.join(" or "),
                    found: token.kind.to_string(),
                    span: token.span.clone(),
                })
            }
            None => Err(ParseError::UnexpectedEof),
        }
    }

    fn expected_here(&self, expected: impl Into<String>) -> ParseError {
        match self.current() {
            Some(token) => ParseError::Expected {
                expected: expected.into(),
                found: token.to_string(),
                span: token.span.clone(),
            },
            None => ParseError::UnexpectedEof,
        }
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    /// Operator precedence. Assignment binds loosest; `is` binds tightest.
    fn precedence_of(op: &str) -> u8 {
        match op {
            "=" | "+=" | "-=" | "*=" | "/=" | "%=" | "<<=" | ">>=" | "&=" | "^=" | "|=" => 1,
            "||" => 2,
            "&&" => 3,
            "|" => 4,
            "^" => 5,
            "&" => 6,
            "==" | "!=" => 7,
            "<" | "<=" | ">" | ">=" => 8,
            ">>" | "<<" => 9,
            "+" | "-" => 10,
            "*" | "/" | "%" => 11,
            "is" => 12,
            _ => 0,
        }
    }

    /// Parse an expression with precedence climbing.
    pub fn parse_expression(&mut self, parent_precedence: u8) -> Result<Expr> {
        if self.current_is_text("open") {
            return self.parse_open();
        }

        let mut expression = self.parse_primary()?;

        // Uppercase identifier followed by `{` is typed object instantiation.
        if let Expr::Identifier { name, span } = &expression {
            if name.chars().next().is_some_and(|c| c.is_uppercase()) && self.current_is_char('{') {
                let type_name = name.clone();
                let type_span = span.clone();
                return self.parse_instantiation(type_name, type_span);
            }
        }

        if self
            .current()
            .is_some_and(|t| t.kind == TokenKind::RangeOperator)
        {
            return self.parse_range(Some(expression));
        }

        loop {
            if let Some(question) = self.try_consume_text("?") {
                let span = expression.span().extend(&question.span);
                expression = Expr::InlineTry {
                    body: Box::new(expression),
                    span,
                };
            }

            if let Some(op) = self.try_consume_text("++") {
                let span = expression.span().extend(&op.span);
                expression = Expr::Increment {
                    target: Box::new(expression),
                    span,
                };
            } else if let Some(op) = self.try_consume_text("--") {
                let span = expression.span().extend(&op.span);
                expression = Expr::Decrement {
                    target: Box::new(expression),
                    span,
                };
            } else if self.current_is_text("=") {
                self.move_next();
                let value = self.parse_expression(0)?;
                let span = expression.span().extend(value.span());
                return Ok(Expr::Assignment {
                    target: Box::new(expression),
                    value: Box::new(value),
                    span,
                });
            } else if self.current_is_char('.') {
                self.move_next();
                let property = self.parse_primary()?;
                let span = expression.span().extend(property.span());
                expression = Expr::MemberAccess {
                    object: Box::new(expression),
                    property: Box::new(property),
                    span,
                };
            } else if self.current_is_text("(") {
                self.move_next();
                let args = self.parse_call_arguments()?;
                let close = self.expect_and_consume_text(")")?;
                let span = expression.span().extend(&close.span);
                expression = Expr::Call {
                    callee: Box::new(expression),
                    args,
                    span,
                };
            } else if self.current_is_char('[') {
                self.move_next();
                let index = self.parse_expression(0)?;
                let close = self.expect_and_consume_char(']')?;
                let span = expression.span().extend(&close.span);
                expression = Expr::Index {
                    object: Box::new(expression),
                    index: Box::new(index),
                    span,
                };
            } else {
                let (op_text, op_span) = match self.current() {
                    Some(t) if t.kind == TokenKind::Operator => (t.text.clone(), t.span.clone()),
                    _ => break,
                };

                let precedence = Self::precedence_of(&op_text);
                if precedence <= parent_precedence {
                    break;
                }

                self.move_next();
                let right = self.parse_expression(precedence)?;

                // Compound assignment desugars to `x = x op y`.
                if op_text == "+=" || op_text == "-=" {
                    let op = if op_text == "+=" {
                        BinaryOp::Add
                    } else {
                        BinaryOp::Sub
                    };
                    let span = expression.span().extend(right.span());
                    expression = Expr::Assignment {
                        target: Box::new(expression.clone()),
                        value: Box::new(Expr::Binary {
                            left: Box::new(expression),
                            op,
                            op_span: op_span.clone(),
                            right: Box::new(right),
                            span: span.clone(),
                        }),
                        span,
                    };
                    continue;
                }

                let op = BinaryOp::from_str(&op_text).ok_or(ParseError::Expected {
                    expected: "a binary operator".into(),
                    found: format!("`{}`", op_text),
                    span: op_span.clone(),
                })?;

                let span = expression.span().extend(right.span());
                expression = Expr::Binary {
                    left: Box::new(expression),
                    op,
                    op_span,
                    right: Box::new(right),
                    span,
                };
            }
        }

        Ok(expression)
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let token = match self.current() {
            Some(t) => t.clone(),
            None => return Err(ParseError::UnexpectedEof),
        };

        match token.kind {
            TokenKind::Comment => {
                self.move_next();
                Ok(Expr::Comment {
                    text: token.text,
                    span: token.span,
                })
            }

            TokenKind::Int => {
                self.move_next();
                let value = token.text.parse::<i64>().map_err(|_| ParseError::Expected {
                    expected: "an integer literal in range".into(),
                    found: format!("`{}`", token.text),
                    span: token.span.clone(),
                })?;
                Ok(Expr::Int {
                    value,
                    span: token.span,
                })
            }

            TokenKind::Double => {
                self.move_next();
                let value = token.text.parse::<f64>().map_err(|_| ParseError::Expected {
                    expected: "a double literal".into(),
                    found: format!("`{}`", token.text),
                    span: token.span.clone(),
                })?;
                Ok(Expr::Double {
                    value,
                    span: token.span,
                })
            }

            TokenKind::String => {
                self.move_next();
                Ok(Expr::Str {
                    value: token.text.trim_matches('"').to_string(),
                    span: token.span,
                })
            }

            TokenKind::Char => {
                self.move_next();
                let value = token.text.chars().next().unwrap_or('\0');
                Ok(Expr::Char {
                    value,
                    span: token.span,
                })
            }

            TokenKind::Boolean => {
                self.move_next();
                Ok(Expr::Bool {
                    value: token.text == "true",
                    span: token.span,
                })
            }

            TokenKind::InterpolationStart => self.parse_interpolation(token),

            TokenKind::Operator if token.text == "(" => self.parse_group_or_tuple(),

            TokenKind::Operator => {
                self.move_next();
                Ok(Expr::OperatorLit {
                    text: token.text,
                    span: token.span,
                })
            }

            TokenKind::Keyword => match token.text.as_str() {
                "return" => self.parse_return(),
                "try" => self.parse_try(),
                "let" => self.parse_let(),
                "if" => self.parse_if(),
                "use" => self.parse_use(),
                "mod" => self.parse_module(),
                "fun" => Ok(Expr::Function(self.parse_function_definition()?)),
                "type" => self.parse_type_definition(),
                "trait" => self.parse_trait_definition(),
                "impl" => self.parse_impl_block(),
                "for" => self.parse_for(),
                "union" => self.parse_union_definition(),
                "match" => self.parse_match(),
                "while" => self.parse_while(),
                "open" => self.parse_open(),
                "defer" => self.parse_defer(),
                "clear" | "new" => {
                    self.move_next();
                    Ok(Expr::Keyword {
                        name: token.text,
                        span: token.span,
                    })
                }
                _ => Err(ParseError::UnexpectedToken {
                    token: token.to_string(),
                    span: token.span,
                }),
            },

            TokenKind::Identifier => self.parse_identifier(),

            TokenKind::Punctuation if token.text == "[" => self.parse_array_literal(),
            TokenKind::Punctuation if token.text == "{" => self.parse_object_literal(),
            TokenKind::Punctuation if token.text == "." => {
                self.move_next();
                Ok(Expr::Dot { span: token.span })
            }

            TokenKind::RangeOperator => self.parse_range(None),

            TokenKind::Tag => {
                self.move_next();
                let body = token.text.trim_start_matches('#');
                let (name, version) = match body.split_once('@') {
                    Some((name, version)) => (name.to_string(), Some(version.to_string())),
                    None => (body.to_string(), None),
                };
                Ok(Expr::Tag {
                    name,
                    version,
                    span: token.span,
                })
            }

            _ => Err(ParseError::UnexpectedToken {
                token: token.to_string(),
                span: token.span,
            }),
        }
    }

    fn parse_identifier(&mut self) -> Result<Expr> {
        let token = self.expect_and_consume_kinds(&[TokenKind::Identifier, TokenKind::Keyword])?;
        if token.text == "self" {
            Ok(Expr::Keyword {
                name: token.text,
                span: token.span,
            })
        } else {
            Ok(Expr::Identifier {
                name: token.text,
                span: token.span,
            })
        }
    }

    /// A type annotation: a simple identifier or a dotted qualified name.
    fn parse_type_annotation(&mut self) -> Result<(String, SourceSpan)> {
        let first = self.expect_and_consume_kinds(&[TokenKind::Identifier, TokenKind::Keyword])?;
        let mut name = first.text;
        let mut span = first.span;

        while self
            .current()
            .is_some_and(|t| t.is_char('.'))
        {
            self.move_next();
            let part = self.expect_and_consume_kinds(&[TokenKind::Identifier, TokenKind::Keyword])?;
            name.push('.');
            name.push_str(&part.text);
            span = span.extend(&part.span);
        }

        Ok((name, span))
    }

    // ========================================================================
    // Groups, tuples, literals
    // ========================================================================

    fn parse_group_or_tuple(&mut self) -> Result<Expr> {
        let open = self.expect_and_consume_text("(")?;
        let expression = self.parse_expression(0)?;

        if matches!(expression, Expr::Identifier { .. }) && self.current_is_char(',') {
            let mut parts = vec![expression];
            while self.try_consume_char(',') {
                parts.push(self.parse_identifier()?);
            }
            let close = self.expect_and_consume_text(")")?;
            return Ok(Expr::Tuple {
                parts,
                span: open.span.extend(&close.span),
            });
        }

        self.expect_and_consume_text(")")?;
        Ok(expression)
    }

    fn parse_array_literal(&mut self) -> Result<Expr> {
        let open = self.expect_and_consume_char('[')?;
        let mut elements = Vec::new();

        while !self.current_is_char(']') {
            elements.push(self.parse_expression(0)?);
            self.try_consume_char(',');
        }

        let close = self.expect_and_consume_char(']')?;
        Ok(Expr::ArrayLit {
            elements,
            span: open.span.extend(&close.span),
        })
    }

    fn parse_object_fields(&mut self) -> Result<Vec<ObjectField>> {
        let mut fields = Vec::new();

        while !self.current_is_char('}') {
            let identifier = self.expect_and_consume_kinds(&[TokenKind::Identifier])?;
            let value = if self.try_consume_text("=").is_some() {
                Some(self.parse_expression(0)?)
            } else {
                None
            };

            let span = match &value {
                Some(v) => identifier.span.extend(v.span()),
                None => identifier.span.clone(),
            };
            fields.push(ObjectField {
                name: identifier.text,
                value,
                span,
            });

            self.try_consume_char(',');
        }

        Ok(fields)
    }

    fn parse_object_literal(&mut self) -> Result<Expr> {
        let open = self.expect_and_consume_char('{')?;
        let fields = self.parse_object_fields()?;
        let close = self.expect_and_consume_char('}')?;
        Ok(Expr::ObjectLit {
            fields,
            span: open.span.extend(&close.span),
        })
    }

    fn parse_instantiation(&mut self, type_name: String, type_span: SourceSpan) -> Result<Expr> {
        self.expect_and_consume_char('{')?;
        let fields = self.parse_object_fields()?;
        let close = self.expect_and_consume_char('}')?;
        let span = type_span.extend(&close.span);
        Ok(Expr::Instantiate {
            type_name,
            type_span,
            fields,
            span,
        })
    }

    fn parse_interpolation(&mut self, start: Token) -> Result<Expr> {
        self.move_next(); // consume the backtick
        let mut parts = Vec::new();

        loop {
            let token = match self.current() {
                Some(t) => t.clone(),
                None => return Err(ParseError::UnexpectedEof),
            };

            match token.kind {
                TokenKind::InterpolationEnd => {
                    self.move_next();
                    return Ok(Expr::Interpolated {
                        parts,
                        span: start.span.extend(&token.span),
                    });
                }

                TokenKind::InterpolationText => {
                    self.move_next();
                    parts.push(InterpolatedPart::Text {
                        value: token.text,
                        span: token.span,
                    });
                }

                TokenKind::Interpolation => {
                    self.move_next();

                    // Strip the surrounding braces, then re-lex and re-parse
                    // from a start location just inside the `{`.
                    let inner: String = {
                        let chars: Vec<char> = token.text.chars().collect();
                        chars[1..chars.len() - 1].iter().collect()
                    };
                    let inner_start = Location::new(
                        token.span.start.line,
                        token.span.start.column + 1,
                    );
                    let tokens =
                        Lexer::with_start(&self.file, &inner, inner_start).lex()?;
                    let mut parser = Parser::new(tokens);
                    let mut expressions = parser.parse()?;
                    if expressions.is_empty() {
                        return Err(ParseError::Expected {
                            expected: "an interpolation expression".into(),
                            found: "an empty interpolation".into(),
                            span: token.span,
                        });
                    }
                    parts.push(InterpolatedPart::Expr(expressions.remove(0)));
                }

                _ => {
                    return Err(ParseError::UnexpectedToken {
                        token: token.to_string(),
                        span: token.span,
                    })
                }
            }
        }
    }

    fn parse_range(&mut self, left: Option<Expr>) -> Result<Expr> {
        let op = match self.current() {
            Some(t) if t.kind == TokenKind::RangeOperator => self.take()?,
            _ => return Err(self.expected_here("a range operator")),
        };
        let inclusive = op.text == "..=";

        let right = match self.current() {
            Some(t) if t.is_char('{') => None,
            None => None,
            _ => Some(self.parse_expression(0)?),
        };

        let start_span = left
            .as_ref()
            .map(|e| e.span().clone())
            .unwrap_or_else(|| op.span.clone());
        let end_span = right
            .as_ref()
            .map(|e| e.span().clone())
            .unwrap_or_else(|| op.span.clone());

        Ok(Expr::Range {
            start: left.map(Box::new),
            end: right.map(Box::new),
            inclusive,
            span: start_span.extend(&end_span),
        })
    }

    // ========================================================================
    // Statement-like constructs
    // ========================================================================

    fn parse_return(&mut self) -> Result<Expr> {
        let keyword = self.expect_and_consume_text("return")?;

        let value = match self.current() {
            None => None,
            Some(t) if t.is_char(';') || t.is_char('}') => None,
            Some(t) if t.is_char('{') => Some(self.parse_block()?),
            _ => Some(self.parse_expression(0)?),
        };

        let span = match &value {
            Some(v) => keyword.span.extend(v.span()),
            None => keyword.span.clone(),
        };
        Ok(Expr::Return {
            value: value.map(Box::new),
            span,
        })
    }

    fn parse_try(&mut self) -> Result<Expr> {
        let keyword = self.expect_and_consume_text("try")?;
        let body = if self.current_is_char('{') {
            self.parse_block()?
        } else {
            self.parse_expression(0)?
        };
        let span = keyword.span.extend(body.span());
        Ok(Expr::Try {
            body: Box::new(body),
            span,
        })
    }

    fn parse_defer(&mut self) -> Result<Expr> {
        let keyword = self.take()?;
        let body = self.parse_expression(0)?;
        let span = keyword.span.extend(body.span());
        Ok(Expr::Defer {
            body: Box::new(body),
            span,
        })
    }

    fn parse_block(&mut self) -> Result<Expr> {
        let open = self.expect_and_consume_char('{')?;

        let mut body = Vec::new();
        while !self.current_is_char('}') {
            if self.current().is_none() {
                return Err(ParseError::UnexpectedEof);
            }
            let expression = if self.current_is_char('{') {
                self.parse_block()?
            } else {
                self.parse_expression(0)?
            };
            if !matches!(expression, Expr::Comment { .. }) {
                body.push(expression);
            }
            if self.current_is_char(';') {
                self.move_next();
            }
        }

        let close = self.expect_and_consume_char('}')?;
        Ok(Expr::Block {
            body,
            span: open.span.extend(&close.span),
        })
    }

    /// Block body as a statement list (for loops and function bodies).
    fn parse_block_body(&mut self) -> Result<(Vec<Expr>, SourceSpan)> {
        match self.parse_block()? {
            Expr::Block { body, span } => Ok((body, span)),
            _ => unreachable!("parse_block always returns a block"),
        }
    }

    fn parse_let(&mut self) -> Result<Expr> {
        let keyword = self.take()?; // let

        let mutable = self.try_consume_text("mut").is_some();

        let name_token = self.expect_and_consume_kinds(&[TokenKind::Identifier])?;

        let ty = if self.try_consume_char(':') {
            Some(self.parse_type_annotation()?.0)
        } else {
            None
        };

        let equals = self.expect_and_consume_text("=")?;
        let value = self.parse_expression(0).map_err(|e| match e {
            ParseError::UnexpectedEof => ParseError::Expected {
                expected: "a value for the let binding".into(),
                found: "end of input".into(),
                span: equals.span.clone(),
            },
            other => other,
        })?;
        self.try_consume_char(';');

        let span = keyword.span.extend(value.span());
        Ok(Expr::Let {
            mutable,
            name: name_token.text,
            name_span: name_token.span,
            ty,
            value: Box::new(value),
            span,
        })
    }

    fn parse_if(&mut self) -> Result<Expr> {
        let keyword = self.take()?; // if
        let condition = self.parse_expression(0)?;

        if !self.current_is_char('{') {
            return Err(self.expected_here("a bracket to start an if body"));
        }
        let then_branch = self.parse_block()?;

        if self.try_consume_text("else").is_none() {
            let span = keyword.span.extend(then_branch.span());
            return Ok(Expr::If {
                condition: Box::new(condition),
                then_branch: Box::new(then_branch),
                else_branch: None,
                span,
            });
        }

        let else_branch = match self.current() {
            Some(t) if t.is_text("if") => self.parse_if()?,
            Some(t) if t.is_char('{') => self.parse_block()?,
            _ => return Err(self.expected_here("`if` or `{` after `else`")),
        };

        let span = keyword.span.extend(else_branch.span());
        Ok(Expr::If {
            condition: Box::new(condition),
            then_branch: Box::new(then_branch),
            else_branch: Some(Box::new(else_branch)),
            span,
        })
    }

    fn parse_while(&mut self) -> Result<Expr> {
        let keyword = self.expect_and_consume_text("while")?;
        let condition = self.parse_expression(0)?;
        let (body, body_span) = self.parse_block_body()?;

        let span = keyword.span.extend(&body_span);
        Ok(Expr::While {
            condition: Box::new(condition),
            body,
            span,
        })
    }

    fn parse_for(&mut self) -> Result<Expr> {
        let keyword = self.take()?; // for

        let binding = self.expect_and_consume_kinds(&[TokenKind::Identifier])?;
        self.expect_and_consume_text("in")?;
        let iterable = self.parse_expression(0)?;
        let (body, body_span) = self.parse_block_body()?;

        let span = keyword.span.extend(&body_span);
        Ok(Expr::For {
            binding: binding.text,
            binding_span: binding.span,
            iterable: Box::new(iterable),
            body,
            span,
        })
    }

    fn parse_match(&mut self) -> Result<Expr> {
        let keyword = self.expect_and_consume_text("match")?;
        let subject = self.parse_expression(0)?;
        self.expect_and_consume_char('{')?;

        let mut arms = Vec::new();

        let close;
        loop {
            if let Some(token) = self.try_consume_char_token('}') {
                close = token;
                break;
            }

            let pattern = match self.current() {
                Some(t) if t.is_text("_") => {
                    let token = self.take()?;
                    Pattern::Discard { span: token.span }
                }
                Some(t) if t.kind == TokenKind::Identifier => {
                    let identifier = self.take()?;
                    let parts = self.parse_positional_pattern()?;
                    let span = identifier.span.clone();
                    Pattern::Variant {
                        name: identifier.text,
                        span,
                        parts,
                    }
                }
                _ => Pattern::Constant(self.parse_expression(0)?),
            };

            self.expect_and_consume_text("=>")?;
            let body = if self.current_is_char('{') {
                self.parse_block()?
            } else {
                self.parse_expression(0)?
            };

            let span = pattern.span().extend(body.span());
            arms.push(MatchArm {
                pattern,
                body,
                span,
            });

            self.try_consume_char(',');
        }

        let span = keyword.span.extend(&close.span);
        Ok(Expr::Match {
            subject: Box::new(subject),
            arms,
            span,
        })
    }

    /// `(part, ...)` after a variant name in a match arm. Parts are literals
    /// or identifier binders.
    fn parse_positional_pattern(&mut self) -> Result<Option<Vec<Expr>>> {
        if self.try_consume_text("(").is_none() {
            return Ok(None);
        }

        let mut parts = Vec::new();
        while self.try_consume_text(")").is_none() {
            let part = match self.current() {
                Some(t) => match t.kind {
                    TokenKind::String
                    | TokenKind::Int
                    | TokenKind::Double
                    | TokenKind::Char
                    | TokenKind::Boolean => self.parse_primary()?,
                    TokenKind::Identifier => self.parse_identifier()?,
                    _ => {
                        return Err(ParseError::Expected {
                            expected: "a literal or binder in tuple pattern".into(),
                            found: t.to_string(),
                            span: t.span.clone(),
                        })
                    }
                },
                None => return Err(ParseError::UnexpectedEof),
            };
            parts.push(part);
            self.try_consume_char(',');
        }

        Ok(Some(parts))
    }

    // ========================================================================
    // Definitions
    // ========================================================================

    fn parse_function_definition(&mut self) -> Result<FunctionDef> {
        let keyword = self.expect_and_consume_text("fun")?;
        let name = self.expect_and_consume_kinds(&[TokenKind::Identifier])?;

        let (has_self, params) = self.parse_function_parameters()?;
        let return_type = self.parse_function_return_type()?;
        let (body, body_span) = self.parse_block_body()?;

        let span = keyword.span.extend(&body_span);
        Ok(FunctionDef {
            name: name.text,
            name_span: name.span,
            has_self,
            params,
            return_type,
            body,
            span,
        })
    }

    fn parse_function_parameters(&mut self) -> Result<(bool, Vec<Param>)> {
        self.expect_and_consume_text("(")?;

        let mut has_self = false;
        let mut params = Vec::new();

        while self.try_consume_text(")").is_none() {
            let name = self.expect_and_consume_kinds(&[TokenKind::Identifier, TokenKind::Keyword])?;

            if name.text == "self" {
                has_self = true;
                self.try_consume_char(',');
                continue;
            }

            self.expect_and_consume_char(':')?;
            let (ty, ty_span) = self.parse_type_annotation()?;

            params.push(Param {
                span: name.span.extend(&ty_span),
                name: name.text,
                ty,
            });

            self.try_consume_char(',');
        }

        Ok((has_self, params))
    }

    fn parse_function_return_type(&mut self) -> Result<Option<String>> {
        if self.try_consume_char(':') {
            Ok(Some(self.parse_type_annotation()?.0))
        } else {
            Ok(None)
        }
    }

    fn expect_uppercase(&self, name: &str, span: &SourceSpan) -> Result<()> {
        if name.chars().next().is_some_and(|c| c.is_lowercase()) {
            return Err(ParseError::Expected {
                expected: "a type name starting with an uppercase letter".into(),
                found: format!("`{}`", name),
                span: span.clone(),
            });
        }
        Ok(())
    }

    fn parse_type_definition(&mut self) -> Result<Expr> {
        let keyword = self.expect_and_consume_text("type")?;
        let name = self.expect_and_consume_kinds(&[TokenKind::Identifier])?;
        self.expect_uppercase(&name.text, &name.span)?;

        if !self.try_consume_char('{') {
            let span = keyword.span.extend(&name.span);
            return Ok(Expr::TypeDef {
                name: name.text,
                name_span: name.span,
                fields: Vec::new(),
                methods: Vec::new(),
                span,
            });
        }

        let mut fields = Vec::new();
        while !self.current_is_char('}') {
            let public = self.try_consume_text("pub").is_some();

            // Methods always come after the fields.
            if self.current_is_text("fun") {
                break;
            }

            let mutable = self.try_consume_text("mut").is_some();
            let field_name = self.expect_and_consume_kinds(&[TokenKind::Identifier])?;
            self.expect_and_consume_char(':')?;
            let (mut ty, ty_span) = self.parse_type_annotation()?;
            let mut end_span = ty_span;

            // `Type[]` is a vector-of-type annotation.
            if self.current_is_char('[')
                && self.peek(1).is_some_and(|t| t.is_char(']'))
            {
                self.move_next();
                let close = self.take()?;
                ty.push_str("[]");
                end_span = end_span.extend(&close.span);
            }

            let default = if self.try_consume_text("=").is_some() {
                Some(self.parse_expression(0)?)
            } else {
                None
            };
            if let Some(d) = &default {
                end_span = end_span.extend(d.span());
            }

            fields.push(FieldDef {
                public,
                mutable,
                span: field_name.span.extend(&end_span),
                name: field_name.text,
                ty,
                default,
            });

            if !self.try_consume_char(',') {
                break;
            }
        }

        let mut methods = Vec::new();
        while !self.current_is_char('}') {
            self.try_consume_text("pub");
            methods.push(self.parse_function_definition()?);
        }

        let close = self.expect_and_consume_char('}')?;
        let span = keyword.span.extend(&close.span);
        Ok(Expr::TypeDef {
            name: name.text,
            name_span: name.span,
            fields,
            methods,
            span,
        })
    }

    fn parse_trait_definition(&mut self) -> Result<Expr> {
        let keyword = self.take()?; // trait
        let name = self.expect_and_consume_kinds(&[TokenKind::Identifier])?;
        self.expect_uppercase(&name.text, &name.span)?;

        self.expect_and_consume_char('{')?;

        let mut associated_types = Vec::new();
        let mut functions = Vec::new();

        while !self.current_is_char('}') {
            match self.current() {
                Some(t) if t.is_text("fun") => {
                    let fun_token = self.take()?;
                    let fn_name = self.expect_and_consume_kinds(&[TokenKind::Identifier])?;
                    let (_, params) = self.parse_function_parameters()?;
                    let return_type = self.parse_function_return_type()?;

                    functions.push(TraitFn {
                        span: fun_token.span.extend(&fn_name.span),
                        name: fn_name.text,
                        params,
                        return_type,
                    });
                }
                Some(t) if t.is_text("type") => {
                    self.move_next();
                    let alias = self.expect_and_consume_kinds(&[TokenKind::Identifier])?;
                    associated_types.push(alias.text);
                }
                Some(t) => {
                    return Err(ParseError::Expected {
                        expected: "`fun` or `type` in trait body".into(),
                        found: t.to_string(),
                        span: t.span.clone(),
                    })
                }
                None => return Err(ParseError::UnexpectedEof),
            }

            self.try_consume_char(',');
        }

        let close = self.expect_and_consume_char('}')?;
        let span = keyword.span.extend(&close.span);
        Ok(Expr::TraitDef {
            name: name.text,
            associated_types,
            functions,
            span,
        })
    }

    fn parse_impl_block(&mut self) -> Result<Expr> {
        let keyword = self.take()?; // impl
        let trait_name = self.expect_and_consume_kinds(&[TokenKind::Identifier])?;
        self.expect_uppercase(&trait_name.text, &trait_name.span)?;

        self.expect_and_consume_text("for")?;
        let type_name = self.expect_and_consume_kinds(&[TokenKind::Identifier])?;

        self.expect_and_consume_char('{')?;

        let mut functions = Vec::new();
        while !self.current_is_char('}') {
            match self.current() {
                Some(t) if t.is_text("fun") => functions.push(self.parse_function_definition()?),
                Some(t) if t.is_text("type") => {
                    // Associated type binding: `type Alias = Concrete`.
                    self.move_next();
                    self.expect_and_consume_kinds(&[TokenKind::Identifier])?;
                    self.expect_and_consume_text("=")?;
                    self.expect_and_consume_kinds(&[TokenKind::Identifier])?;
                }
                Some(t) => {
                    return Err(ParseError::Expected {
                        expected: "`fun` or `type` in impl body".into(),
                        found: t.to_string(),
                        span: t.span.clone(),
                    })
                }
                None => return Err(ParseError::UnexpectedEof),
            }

            self.try_consume_char(',');
        }

        let close = self.expect_and_consume_char('}')?;
        let span = keyword.span.extend(&close.span);
        Ok(Expr::ImplBlock {
            trait_name: trait_name.text,
            type_name: type_name.text,
            functions,
            span,
        })
    }

    fn parse_union_definition(&mut self) -> Result<Expr> {
        let keyword = self.expect_and_consume_text("union")?;
        let name = self.expect_and_consume_kinds(&[TokenKind::Identifier])?;
        self.expect_uppercase(&name.text, &name.span)?;

        self.expect_and_consume_char('{')?;

        let mut variants = Vec::new();
        let close;
        loop {
            if let Some(token) = self.try_consume_char_token('}') {
                close = token;
                break;
            }

            let variant_name = self.expect_and_consume_kinds(&[TokenKind::Identifier])?;
            let mut fields = Vec::new();
            let mut variant_span = variant_name.span.clone();

            if self.try_consume_text("(").is_some() {
                loop {
                    if let Some(token) = self.try_consume_text(")") {
                        variant_span = variant_span.extend(&token.span);
                        break;
                    }
                    let field = self.expect_and_consume_kinds(&[TokenKind::Identifier])?;
                    fields.push(field.text);
                    self.try_consume_char(',');
                }
            }

            self.try_consume_char(',');

            variants.push(UnionVariant {
                name: variant_name.text,
                fields,
                span: variant_span,
            });
        }

        let span = keyword.span.extend(&close.span);
        Ok(Expr::UnionDef {
            name: name.text,
            variants,
            span,
        })
    }

    // ========================================================================
    // Modules and misc
    // ========================================================================

    fn parse_use(&mut self) -> Result<Expr> {
        let keyword = self.expect_and_consume_text("use")?;
        let (path, path_span) = self.parse_type_annotation()?;
        Ok(Expr::Use {
            path,
            span: keyword.span.extend(&path_span),
        })
    }

    fn parse_module(&mut self) -> Result<Expr> {
        let keyword = self.expect_and_consume_text("mod")?;
        let name = self.expect_and_consume_kinds(&[TokenKind::Identifier])?;
        let span = keyword.span.extend(&name.span);
        Ok(Expr::Module {
            name: name.text,
            span,
        })
    }

    fn parse_open(&mut self) -> Result<Expr> {
        let keyword = self.expect_and_consume_text("open")?;
        match self.current() {
            Some(t) if t.kind == TokenKind::String => {
                let token = self.take()?;
                let span = keyword.span.extend(&token.span);
                Ok(Expr::Open {
                    path: token.text.trim_matches('"').to_string(),
                    span,
                })
            }
            // Bare `open` in expression position is an ordinary identifier
            // (shell-style command name).
            _ => Ok(Expr::Identifier {
                name: keyword.text,
                span: keyword.span,
            }),
        }
    }

    fn parse_call_arguments(&mut self) -> Result<Vec<Expr>> {
        let mut args = Vec::new();

        while !self.current_is_text(")") {
            let expression = self.parse_expression(0)?;

            if self.try_consume_text("=>").is_some() {
                let body = if self.current_is_char('{') {
                    self.parse_block()?
                } else {
                    self.parse_expression(0)?
                };

                let param = match &expression {
                    Expr::Identifier { name, .. } => name.clone(),
                    other => {
                        return Err(ParseError::Expected {
                            expected: "a parameter name before `=>`".into(),
                            found: other.describe().into(),
                            span: other.span().clone(),
                        })
                    }
                };

                let span = expression.span().extend(body.span());
                args.push(Expr::Lambda {
                    params: vec![param],
                    body: Box::new(body),
                    span,
                });
            } else {
                args.push(expression);
            }

            if !self.try_consume_char(',') {
                break;
            }
        }

        Ok(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Vec<Expr> {
        parse_source("test.skf", source).expect("parse failed")
    }

    #[test]
    fn precedence_multiplication_binds_tighter() {
        let exprs = parse("1 + 2 * 3");
        match &exprs[0] {
            Expr::Binary {
                op: BinaryOp::Add,
                right,
                ..
            } => {
                assert!(matches!(
                    right.as_ref(),
                    Expr::Binary {
                        op: BinaryOp::Mul,
                        ..
                    }
                ));
            }
            other => panic!("expected add at the root, got {:?}", other),
        }
    }

    #[test]
    fn compound_assignment_desugars() {
        let exprs = parse("x += 1");
        match &exprs[0] {
            Expr::Assignment { value, .. } => {
                assert!(matches!(
                    value.as_ref(),
                    Expr::Binary {
                        op: BinaryOp::Add,
                        ..
                    }
                ));
            }
            other => panic!("expected assignment, got {:?}", other),
        }
    }

    #[test]
    fn interpolation_has_three_parts() {
        let exprs = parse("`a{1+1}b`");
        match &exprs[0] {
            Expr::Interpolated { parts, .. } => {
                assert_eq!(parts.len(), 3);
                assert!(matches!(&parts[0], InterpolatedPart::Text { value, .. } if value == "a"));
                assert!(matches!(&parts[1], InterpolatedPart::Expr(_)));
                assert!(matches!(&parts[2], InterpolatedPart::Text { value, .. } if value == "b"));
            }
            other => panic!("expected interpolation, got {:?}", other),
        }
    }

    #[test]
    fn lowercase_type_name_is_rejected() {
        let err = parse_source("test.skf", "type point { x: Int }").unwrap_err();
        match err {
            ParseError::Expected { expected, .. } => {
                assert!(expected.contains("uppercase"));
            }
            other => panic!("expected naming error, got {:?}", other),
        }
    }

    #[test]
    fn missing_let_value_is_a_syntax_error() {
        let err = parse_source("test.skf", "let x =").unwrap_err();
        match err {
            ParseError::Expected { expected, .. } => {
                assert!(expected.contains("value for the let binding"));
            }
            other => panic!("expected a named syntax error, got {:?}", other),
        }
    }

    #[test]
    fn match_arms_parse_patterns() {
        let exprs = parse("match x { 1 => 2, Some(v) => v, _ => 0 }");
        match &exprs[0] {
            Expr::Match { arms, .. } => {
                assert_eq!(arms.len(), 3);
                assert!(matches!(arms[0].pattern, Pattern::Constant(_)));
                assert!(matches!(arms[1].pattern, Pattern::Variant { .. }));
                assert!(matches!(arms[2].pattern, Pattern::Discard { .. }));
            }
            other => panic!("expected match, got {:?}", other),
        }
    }

    #[test]
    fn member_call_and_index_chain() {
        let exprs = parse("a.b(1)[2]");
        assert!(matches!(&exprs[0], Expr::Index { object, .. }
            if matches!(object.as_ref(), Expr::Call { .. })));
    }

    #[test]
    fn typed_instantiation_requires_uppercase() {
        let exprs = parse("Point { x = 1, y = 2 }");
        assert!(matches!(&exprs[0], Expr::Instantiate { type_name, .. } if type_name == "Point"));
    }
}
