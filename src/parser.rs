//! Recursive-descent parser from tokens to s-expressions.
//!
//! ```text
//! expr    := atom | list | quoted
//! list    := '(' expr* ')'
//! quoted  := '\'' expr
//! atom    := number | symbol | boolean | string
//! ```
//!
//! Quote sugar `'x` becomes the list `(quote x)`. Comments are skipped wherever an
//! expression or a closing parenthesis could appear.

use crate::ast::Value;
use crate::lexer::{Lexer, Token};
use crate::number::Number;
use crate::{Error, MAX_PARSE_DEPTH, ParseErrorKind};

/// Parser settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseConfig {
    /// Deepest list/quote nesting accepted before failing with `TooDeeplyNested`
    pub max_depth: usize,
}

impl Default for ParseConfig {
    fn default() -> Self {
        ParseConfig {
            max_depth: MAX_PARSE_DEPTH,
        }
    }
}

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    config: ParseConfig,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str) -> Self {
        Self::with_config(input, ParseConfig::default())
    }

    pub fn with_config(input: &'a str, config: ParseConfig) -> Self {
        Parser {
            lexer: Lexer::new(input),
            config,
        }
    }

    /// The next expression, or `None` once the input is exhausted.
    pub fn next_expr(&mut self) -> Result<Option<Value>, Error> {
        self.expression(0)
    }

    /// The next expression, with end of input reported as `Nil`.
    ///
    /// Use [`Parser::next_expr`] when a literal `()` has to be told apart from the
    /// end of input.
    pub fn parse_one(&mut self) -> Result<Value, Error> {
        Ok(self.next_expr()?.unwrap_or(Value::Nil))
    }

    /// Every remaining expression, in source order, as a proper list.
    pub fn parse_all(&mut self) -> Result<Value, Error> {
        let mut exprs = Vec::new();
        while let Some(expr) = self.next_expr()? {
            exprs.push(expr);
        }
        Ok(Value::list(exprs))
    }

    fn expression(&mut self, depth: usize) -> Result<Option<Value>, Error> {
        if depth >= self.config.max_depth {
            return Err(self.lexer.error(
                ParseErrorKind::TooDeeplyNested,
                format!(
                    "Expression too deeply nested (max depth: {})",
                    self.config.max_depth
                ),
                None,
            ));
        }

        loop {
            let value = match self.lexer.next_token()? {
                Token::Eof => return Ok(None),
                Token::Comment => continue,
                Token::LeftParen => self.list(depth)?,
                Token::Quote => {
                    // End of input after a quote quotes the empty list
                    let quoted = self.expression(depth + 1)?.unwrap_or(Value::Nil);
                    Value::list([Value::symbol("quote"), quoted])
                }
                Token::RightParen => {
                    return Err(self.lexer.error(
                        ParseErrorKind::UnexpectedToken,
                        "Unexpected ')' outside list",
                        Some(")".into()),
                    ));
                }
                Token::Number(text) => self.number(text)?,
                Token::Bool(b) => Value::Bool(b),
                Token::Symbol(name) => Value::symbol(name),
                Token::Str(text) => Value::string(text),
            };
            return Ok(Some(value));
        }
    }

    /// Elements up to the matching `)`; the `(` has been consumed.
    fn list(&mut self, depth: usize) -> Result<Value, Error> {
        let mut items = Vec::new();
        loop {
            match self.lexer.next_token()? {
                Token::Comment => continue,
                Token::RightParen => return Ok(Value::list(items)),
                Token::Eof => return Err(self.unbalanced()),
                token => {
                    self.lexer.push_back(token);
                    match self.expression(depth + 1)? {
                        Some(item) => items.push(item),
                        None => return Err(self.unbalanced()),
                    }
                }
            }
        }
    }

    fn number(&self, text: &str) -> Result<Value, Error> {
        Number::parse(text).map(Value::Number).ok_or_else(|| {
            self.lexer.error(
                ParseErrorKind::InvalidNumber,
                format!("Invalid number string: {text}"),
                Some(text.to_owned()),
            )
        })
    }

    fn unbalanced(&self) -> Error {
        self.lexer.error(
            ParseErrorKind::UnbalancedParenthesis,
            "Unbalanced parenthesis",
            None,
        )
    }
}

/// Parse the first expression of `input`; `Nil` if there is none.
pub fn parse_one(input: &str) -> Result<Value, Error> {
    Parser::new(input).parse_one()
}

/// Parse every expression of `input` into a proper list.
pub fn parse_all(input: &str) -> Result<Value, Error> {
    Parser::new(input).parse_all()
}
