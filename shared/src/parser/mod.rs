//! Log line parser.
//!
//! A line is a whitespace-separated sequence of items. Each item is either a metric
//! (`name:number`) or a label (`name=value`, where the value is an identifier, a number or
//! a double-quoted string):
//!
//! ```text
//! status:200 method=GET path="/api/v1" request_time:0.023
//! ```
//!
//! Every label of a line applies to every metric of that line. Any deviation from the
//! grammar rejects the whole line.
//!
//! # Example
//!
//! ```
//! use shared::parser::parse_line;
//!
//! let line = parse_line(r#"status:200 method=GET path="/api/v1" latency:0.023"#).unwrap();
//!
//! assert_eq!(line.observations.len(), 2);
//! assert_eq!(line.labels.names(), ["method", "path"]);
//! assert_eq!(line.labels.get("path"), Some("/api/v1"));
//! ```

mod lexer;
mod quoting;

pub use lexer::{Lexer, Token, TokenKind};
pub use quoting::{quote, unquote, QuoteError};

use crate::models::{Observation, ParsedLine};
use std::fmt;
use thiserror::Error;

/// What the parser was looking for when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expected {
    /// An item name.
    Identifier,
    /// `:` or `=` after an item name.
    Separator,
    /// A numeric metric value.
    Number,
    /// A label value.
    LabelValue,
}

impl fmt::Display for Expected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identifier => write!(f, "identifier"),
            Self::Separator => write!(f, "':' or '='"),
            Self::Number => write!(f, "number"),
            Self::LabelValue => write!(f, "identifier, number or string"),
        }
    }
}

/// Errors that can occur while parsing a log line.
///
/// Columns are 1-based and count characters, not bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// A token of the wrong kind, or a premature end of input.
    #[error("{expected} expected at column {column}, found {found}")]
    UnexpectedToken {
        /// Column of the offending token.
        column: usize,
        /// What the grammar required.
        expected: Expected,
        /// Description of what was found.
        found: String,
    },

    /// A numeric literal that is not a finite `f64`.
    #[error("Invalid number '{literal}' at column {column}")]
    InvalidNumber {
        /// Column of the literal.
        column: usize,
        /// The literal text.
        literal: String,
    },

    /// A malformed quoted string.
    #[error("Invalid string at column {column}: {reason}")]
    InvalidString {
        /// Column of the opening quote.
        column: usize,
        /// Why the string was rejected.
        reason: QuoteError,
    },

    /// A label name that already appeared earlier on the line.
    #[error("Duplicate label '{name}' at column {column}")]
    DuplicateLabel {
        /// Column of the repeated name.
        column: usize,
        /// The label name.
        name: String,
    },
}

impl ParseError {
    /// Column at which the error was detected.
    #[must_use]
    pub fn column(&self) -> usize {
        match self {
            Self::UnexpectedToken { column, .. }
            | Self::InvalidNumber { column, .. }
            | Self::InvalidString { column, .. }
            | Self::DuplicateLabel { column, .. } => *column,
        }
    }
}

/// Parses one log line into its observations and labels.
///
/// An empty line is valid and yields an empty [`ParsedLine`].
///
/// # Errors
///
/// Returns a `ParseError` as soon as the line deviates from the grammar; no partial
/// result is returned.
///
/// # Examples
///
/// ```
/// use shared::parser::{parse_line, ParseError};
///
/// let line = parse_line(r#"a:1 b="x" c:2.5"#).unwrap();
/// assert_eq!(line.observations[1].name, "c");
/// assert_eq!(line.labels.get("b"), Some("x"));
///
/// assert!(matches!(parse_line("a 1"), Err(ParseError::UnexpectedToken { .. })));
/// ```
pub fn parse_line(line: &str) -> Result<ParsedLine, ParseError> {
    LineParser::new(line).parse()
}

/// 1-based character column of a byte offset in `src`.
fn column(src: &str, offset: usize) -> usize {
    src[..offset].chars().count() + 1
}

struct LineParser<'a> {
    src: &'a str,
    lexer: Lexer<'a>,
}

impl<'a> LineParser<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            lexer: Lexer::new(src),
        }
    }

    fn parse(mut self) -> Result<ParsedLine, ParseError> {
        let mut parsed = ParsedLine::default();

        while let Some(name) = self.next_token()? {
            if name.kind != TokenKind::Ident {
                return Err(self.unexpected(Some(name), Expected::Identifier));
            }

            match self.next_token()? {
                Some(Token {
                    kind: TokenKind::Colon,
                    ..
                }) => {
                    let value = self.metric_value()?;
                    parsed.observations.push(Observation::new(name.text, value));
                }
                Some(Token {
                    kind: TokenKind::Equals,
                    ..
                }) => {
                    let value = self.label_value()?;
                    if !parsed.labels.insert(name.text, value) {
                        return Err(ParseError::DuplicateLabel {
                            column: column(self.src, name.offset),
                            name: name.text.to_string(),
                        });
                    }
                }
                other => return Err(self.unexpected(other, Expected::Separator)),
            }
        }

        Ok(parsed)
    }

    fn next_token(&mut self) -> Result<Option<Token<'a>>, ParseError> {
        self.lexer.next().transpose()
    }

    fn metric_value(&mut self) -> Result<f64, ParseError> {
        match self.next_token()? {
            Some(token) if token.kind == TokenKind::Number => token
                .text
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| ParseError::InvalidNumber {
                    column: column(self.src, token.offset),
                    literal: token.text.to_string(),
                }),
            other => Err(self.unexpected(other, Expected::Number)),
        }
    }

    fn label_value(&mut self) -> Result<String, ParseError> {
        match self.next_token()? {
            Some(token) => match token.kind {
                TokenKind::Ident | TokenKind::Number => Ok(token.text.to_string()),
                TokenKind::String => {
                    unquote(token.text).map_err(|reason| ParseError::InvalidString {
                        column: column(self.src, token.offset),
                        reason,
                    })
                }
                _ => Err(self.unexpected(Some(token), Expected::LabelValue)),
            },
            None => Err(self.unexpected(None, Expected::LabelValue)),
        }
    }

    fn unexpected(&self, found: Option<Token<'_>>, expected: Expected) -> ParseError {
        match found {
            Some(token) => ParseError::UnexpectedToken {
                column: column(self.src, token.offset),
                expected,
                found: token.to_string(),
            },
            None => ParseError::UnexpectedToken {
                column: column(self.src, self.src.len()),
                expected,
                found: "end of input".to_string(),
            },
        }
    }
}
