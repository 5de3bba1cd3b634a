//! Quoting and unquoting of double-quoted label values.

use std::str::Chars;
use thiserror::Error;

/// Reasons a quoted string literal can be rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuoteError {
    /// The literal has no closing quote.
    #[error("unterminated quoted string")]
    Unterminated,

    /// The literal is not wrapped in double quotes.
    #[error("string is not double-quoted")]
    NotQuoted,

    /// A bare double quote or newline appears inside the literal.
    #[error("unescaped {0:?} inside quoted string")]
    Unescaped(char),

    /// The literal ends in the middle of an escape sequence.
    #[error("truncated escape sequence")]
    TruncatedEscape,

    /// An escape sequence that is not recognized.
    #[error("unknown escape sequence '\\{0}'")]
    UnknownEscape(char),

    /// A non-hexadecimal digit inside a `\x`, `\u` or `\U` escape.
    #[error("invalid hex digit {0:?} in escape sequence")]
    InvalidHexDigit(char),

    /// A non-octal digit inside a `\NNN` escape.
    #[error("invalid octal digit {0:?} in escape sequence")]
    InvalidOctalDigit(char),

    /// A numeric escape that does not denote a valid character.
    #[error("escape sequence denotes invalid character U+{0:X}")]
    InvalidCodePoint(u32),
}

/// Removes the surrounding quotes from `literal` and resolves its escape sequences.
///
/// Supported escapes are `\a \b \f \n \r \t \v \\ \"`, three-digit octal `\NNN` and `\xHH`
/// (both ASCII only), `\uHHHH` and `\UHHHHHHHH`. A single quote needs no escape and `\'`
/// is rejected.
///
/// # Errors
///
/// Returns a [`QuoteError`] if the literal is not properly quoted or contains an invalid
/// escape sequence.
///
/// # Examples
///
/// ```
/// use shared::parser::unquote;
///
/// assert_eq!(unquote(r#""hello world""#).unwrap(), "hello world");
/// assert_eq!(unquote(r#""tab\there""#).unwrap(), "tab\there");
/// assert!(unquote(r#""bad"#).is_err());
/// ```
pub fn unquote(literal: &str) -> Result<String, QuoteError> {
    let inner = literal.strip_prefix('"').ok_or(QuoteError::NotQuoted)?;
    let inner = inner.strip_suffix('"').ok_or(QuoteError::Unterminated)?;

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.push(unescape(&mut chars)?),
            '"' | '\n' => return Err(QuoteError::Unescaped(c)),
            c => out.push(c),
        }
    }
    Ok(out)
}

fn unescape(chars: &mut Chars<'_>) -> Result<char, QuoteError> {
    let c = chars.next().ok_or(QuoteError::TruncatedEscape)?;
    let resolved = match c {
        'a' => '\u{07}',
        'b' => '\u{08}',
        'f' => '\u{0C}',
        'n' => '\n',
        'r' => '\r',
        't' => '\t',
        'v' => '\u{0B}',
        '\\' | '"' => c,
        '0'..='7' => ascii(octal(c, chars)?)?,
        'x' => ascii(hex(chars, 2)?)?,
        'u' => code_point(hex(chars, 4)?)?,
        'U' => code_point(hex(chars, 8)?)?,
        other => return Err(QuoteError::UnknownEscape(other)),
    };
    Ok(resolved)
}

fn hex(chars: &mut Chars<'_>, digits: usize) -> Result<u32, QuoteError> {
    let mut v = 0u32;
    for _ in 0..digits {
        let c = chars.next().ok_or(QuoteError::TruncatedEscape)?;
        let d = c.to_digit(16).ok_or(QuoteError::InvalidHexDigit(c))?;
        v = (v << 4) | d;
    }
    Ok(v)
}

fn octal(first: char, chars: &mut Chars<'_>) -> Result<u32, QuoteError> {
    let mut v = first.to_digit(8).ok_or(QuoteError::InvalidOctalDigit(first))?;
    for _ in 0..2 {
        let c = chars.next().ok_or(QuoteError::TruncatedEscape)?;
        let d = c.to_digit(8).ok_or(QuoteError::InvalidOctalDigit(c))?;
        v = (v << 3) | d;
    }
    Ok(v)
}

/// Byte escapes must stay within ASCII to yield valid UTF-8.
fn ascii(v: u32) -> Result<char, QuoteError> {
    if v > 0x7F {
        return Err(QuoteError::InvalidCodePoint(v));
    }
    code_point(v)
}

fn code_point(v: u32) -> Result<char, QuoteError> {
    char::from_u32(v).ok_or(QuoteError::InvalidCodePoint(v))
}

/// Wraps `value` in double quotes, escaping it so that [`unquote`] returns it unchanged.
///
/// # Examples
///
/// ```
/// use shared::parser::{quote, unquote};
///
/// let quoted = quote("say \"hi\"");
/// assert_eq!(quoted, r#""say \"hi\"""#);
/// assert_eq!(unquote(&quoted).unwrap(), "say \"hi\"");
/// ```
#[must_use]
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", u32::from(c))),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
