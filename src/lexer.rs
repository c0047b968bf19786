//! Tokenizer with one token of pushback.
//!
//! The lexer walks a borrowed source string and hands out [`Token`]s that borrow
//! their text from it. The parser peeks by reading a token and pushing it back;
//! the slot holds a single token, and pushing twice without a read in between is
//! a bug in the caller, so it panics rather than returning an error.

use nom::{
    IResult, Parser,
    bytes::complete::{take_till, take_while},
    character::complete::{char, one_of, satisfy},
    combinator::{opt, recognize},
    sequence::{pair, preceded},
};

use crate::{Error, ParseError, ParseErrorKind};

/// Allowed non-alphanumeric characters in symbol names
pub(crate) const SYMBOL_SPECIAL_CHARS: &str = "+-*/<=>!?_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    Eof,
    LeftParen,
    RightParen,
    Quote,
    Symbol(&'a str),
    /// Raw number text; validated when the parser builds the rational
    Number(&'a str),
    Bool(bool),
    /// String contents without the quotes
    Str(&'a str),
    Comment,
}

fn is_symbol_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || SYMBOL_SPECIAL_CHARS.contains(c)
}

fn is_symbol_start(c: char) -> bool {
    c.is_ascii_alphabetic() || SYMBOL_SPECIAL_CHARS.contains(c)
}

fn is_number_char(c: char) -> bool {
    c.is_ascii_digit() || c == '.' || c == '/'
}

/// Characters allowed inside a string literal
fn is_string_char(c: char) -> bool {
    c != '"' && !c.is_control()
}

fn whitespace(input: &str) -> IResult<&str, &str> {
    take_while(char::is_whitespace).parse(input)
}

/// `-?digit` followed greedily by digits, `.` and `/`
fn number_text(input: &str) -> IResult<&str, &str> {
    recognize((
        opt(char('-')),
        satisfy(|c| c.is_ascii_digit()),
        take_while(is_number_char),
    ))
    .parse(input)
}

fn symbol_text(input: &str) -> IResult<&str, &str> {
    recognize(pair(satisfy(is_symbol_start), take_while(is_symbol_char))).parse(input)
}

fn comment_text(input: &str) -> IResult<&str, &str> {
    recognize(pair(char(';'), take_till(|c| c == '\n'))).parse(input)
}

fn boolean(input: &str) -> IResult<&str, bool> {
    preceded(char('#'), one_of("tf"))
        .map(|c| c == 't')
        .parse(input)
}

/// Opening quote and body; the caller checks for the closing quote.
fn string_body(input: &str) -> IResult<&str, &str> {
    preceded(char('"'), take_while(is_string_char)).parse(input)
}

fn closing_quote(input: &str) -> IResult<&str, char> {
    char('"').parse(input)
}

pub struct Lexer<'a> {
    input: &'a str,
    rest: &'a str,
    pushed: Option<Token<'a>>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer {
            input,
            rest: input,
            pushed: None,
        }
    }

    /// Byte offset of the next unread character.
    pub fn offset(&self) -> usize {
        self.input.len() - self.rest.len()
    }

    pub fn input(&self) -> &'a str {
        self.input
    }

    /// Return a token so the next call to [`Lexer::next_token`] yields it again.
    ///
    /// # Panics
    ///
    /// If a pushed-back token has not been consumed yet.
    pub fn push_back(&mut self, token: Token<'a>) {
        assert!(
            self.pushed.is_none(),
            "token pushed back twice without an intervening read"
        );
        self.pushed = Some(token);
    }

    pub fn next_token(&mut self) -> Result<Token<'a>, Error> {
        if let Some(token) = self.pushed.take() {
            return Ok(token);
        }

        if let Ok((rest, _)) = whitespace(self.rest) {
            self.rest = rest;
        }

        let Some(c) = self.rest.chars().next() else {
            return Ok(Token::Eof);
        };

        let after: &'a str = &self.rest[c.len_utf8()..];
        let (rest, token) = match c {
            '(' => (after, Token::LeftParen),
            ')' => (after, Token::RightParen),
            '\'' => (after, Token::Quote),
            ';' => match comment_text(self.rest) {
                Ok((rest, _)) => (rest, Token::Comment),
                Err(_) => return Err(self.unexpected_character(c)),
            },
            '#' => match boolean(self.rest) {
                Ok((rest, b)) => (rest, Token::Bool(b)),
                Err(_) => return Err(self.malformed_boolean()),
            },
            '"' => self.string_literal()?,
            _ => {
                if let Ok((rest, text)) = number_text(self.rest) {
                    (rest, Token::Number(text))
                } else if let Ok((rest, text)) = symbol_text(self.rest) {
                    (rest, Token::Symbol(text))
                } else {
                    return Err(self.unexpected_character(c));
                }
            }
        };

        self.rest = rest;
        Ok(token)
    }

    fn string_literal(&self) -> Result<(&'a str, Token<'a>), Error> {
        match string_body(self.rest) {
            Ok((rest, body)) => match closing_quote(rest) {
                Ok((rest, _)) => Ok((rest, Token::Str(body))),
                Err(_) => Err(self.error(
                    ParseErrorKind::UnterminatedString,
                    format!("Unterminated string literal: {body}"),
                    Some(format!("\"{body}")),
                )),
            },
            Err(_) => Err(self.unexpected_character('"')),
        }
    }

    fn malformed_boolean(&self) -> Error {
        let found: String = self.rest.chars().take(2).collect();
        self.error(
            ParseErrorKind::MalformedInput,
            format!("Malformed input: {found}"),
            Some(found.clone()),
        )
    }

    fn unexpected_character(&self, c: char) -> Error {
        self.error(
            ParseErrorKind::UnexpectedCharacter,
            format!("Unexpected character: '{c}'"),
            Some(c.to_string()),
        )
    }

    pub(crate) fn error(
        &self,
        kind: ParseErrorKind,
        message: impl Into<String>,
        found: Option<String>,
    ) -> Error {
        Error::ParseError(ParseError::with_context(
            kind,
            message,
            self.input,
            self.offset(),
            found,
        ))
    }
}
