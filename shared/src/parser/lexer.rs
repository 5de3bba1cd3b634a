//! Tokenizer for log lines, built on nom.
//!
//! Tokens are separated by optional whitespace. The recognized kinds are identifiers,
//! numeric literals, double-quoted strings and the `:` / `=` symbols; any other
//! character becomes a single-character [`TokenKind::Unexpected`] token so the parser
//! can report it.

use nom::{
    branch::alt,
    bytes::complete::{escaped, take_while},
    character::complete::{anychar, char, digit0, digit1, multispace0, none_of, one_of, satisfy},
    combinator::{consumed, opt, recognize, value},
    IResult, Parser,
};
use std::fmt;

use super::{column, QuoteError, ParseError};

/// Kind of a scanned token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Letter or `_`, followed by letters, digits or `_`.
    Ident,
    /// Integer or floating point literal, optionally signed.
    Number,
    /// Double-quoted string literal, quotes included.
    String,
    /// `:`
    Colon,
    /// `=`
    Equals,
    /// Any other character.
    Unexpected(char),
}

/// A token and its position in the source line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    /// The token kind.
    pub kind: TokenKind,
    /// The exact source text of the token.
    pub text: &'a str,
    /// Byte offset of the token in the source line.
    pub offset: usize,
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::Ident => write!(f, "identifier '{}'", self.text),
            TokenKind::Number => write!(f, "number {}", self.text),
            TokenKind::String => write!(f, "string {}", self.text),
            TokenKind::Colon => write!(f, "':'"),
            TokenKind::Equals => write!(f, "'='"),
            TokenKind::Unexpected(c) => write!(f, "{c:?}"),
        }
    }
}

/// Iterator over the tokens of one line.
///
/// Yields `Err` at most once, for an unterminated string literal, and then stops.
#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    src: &'a str,
    rest: &'a str,
}

impl<'a> Lexer<'a> {
    /// Creates a lexer over `src`.
    #[must_use]
    pub fn new(src: &'a str) -> Self {
        Self { src, rest: src }
    }

    /// Byte offset of the first unconsumed character.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.src.len() - self.rest.len()
    }

    fn advance(&mut self, rest: &'a str) {
        self.rest = rest;
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Token<'a>, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Ok((rest, _)) = multispace0::<_, nom::error::Error<&str>>(self.rest) {
            self.advance(rest);
        }
        if self.rest.is_empty() {
            return None;
        }

        let offset = self.offset();
        if let Ok((rest, (text, kind))) = consumed(token).parse(self.rest) {
            self.advance(rest);
            return Some(Ok(Token { kind, text, offset }));
        }

        if self.rest.starts_with('"') {
            self.advance("");
            return Some(Err(ParseError::InvalidString {
                column: column(self.src, offset),
                reason: QuoteError::Unterminated,
            }));
        }

        let (rest, c) = anychar::<_, nom::error::Error<&str>>(self.rest).ok()?;
        self.advance(rest);
        Some(Ok(Token {
            kind: TokenKind::Unexpected(c),
            text: &self.src[offset..self.offset()],
            offset,
        }))
    }
}

fn token(input: &str) -> IResult<&str, TokenKind> {
    alt((
        value(TokenKind::Colon, char(':')),
        value(TokenKind::Equals, char('=')),
        value(TokenKind::String, quoted),
        value(TokenKind::Number, number),
        value(TokenKind::Ident, identifier),
    ))
    .parse(input)
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize((
        satisfy(|c| c.is_alphabetic() || c == '_'),
        take_while(|c: char| c.is_alphanumeric() || c == '_'),
    ))
    .parse(input)
}

fn number(input: &str) -> IResult<&str, &str> {
    recognize((
        opt(one_of("+-")),
        alt((
            recognize((digit1, opt((char('.'), digit0)))),
            recognize((char('.'), digit1)),
        )),
        opt((one_of("eE"), opt(one_of("+-")), digit1)),
    ))
    .parse(input)
}

fn quoted(input: &str) -> IResult<&str, &str> {
    alt((
        recognize((char('"'), char('"'))),
        recognize((
            char('"'),
            escaped(none_of("\"\\"), '\\', anychar),
            char('"'),
        )),
    ))
    .parse(input)
}
