//! Splits alias strings into words and parameter slots.

use crate::decl::{Alias, AliasToken, AliasTokenKind};
use crate::error::{ErrorCode, ParseError};
use crate::position::{Position, Range};
use crate::token::Token;
use std::path::Path;

/// Tokenizes the alias written in the string literal `token`.
///
/// Token ranges are absolute source ranges; a parameter slot's range covers
/// its `<` and `>` delimiters.
pub(crate) fn parse_alias(file: &Path, token: &Token) -> Result<Alias, ParseError> {
    let raw = token
        .literal
        .strip_prefix('"')
        .map(|s| s.strip_suffix('"').unwrap_or(s))
        .unwrap_or(&token.literal);
    let line = token.range.start.line;
    let mut column = token.range.start.column + 1;
    let malformed = |start: u32, end: u32, message: &str| {
        ParseError::new(
            file,
            Range::new(Position::new(line, start), Position::new(line, end)),
            ErrorCode::MALFORMED_ALIAS,
            message,
        )
    };

    let mut tokens = Vec::new();
    let mut chars = raw.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            column += c.len_utf16() as u32;
        } else if c == '<' {
            let start = column;
            chars.next();
            column += 1;
            let mut name = String::new();
            loop {
                match chars.next() {
                    Some('>') => {
                        column += 1;
                        break;
                    }
                    Some(c) if c.is_alphanumeric() || c == '_' => {
                        name.push(c);
                        column += c.len_utf16() as u32;
                    }
                    _ => {
                        return Err(malformed(start, column, "parameter slot is not closed with '>'"));
                    }
                }
            }
            if name.is_empty() {
                return Err(malformed(start, column, "parameter slot has no name"));
            }
            tokens.push(AliasToken {
                kind: AliasTokenKind::Param,
                literal: format!("<{name}>"),
                range: Range::new(Position::new(line, start), Position::new(line, column)),
            });
        } else if c.is_alphanumeric() || c == '_' {
            let start = column;
            let mut word = String::new();
            while let Some(&c) = chars.peek() {
                if !(c.is_alphanumeric() || c == '_') {
                    break;
                }
                word.push(c);
                column += c.len_utf16() as u32;
                chars.next();
            }
            tokens.push(AliasToken {
                kind: AliasTokenKind::Word,
                literal: word,
                range: Range::new(Position::new(line, start), Position::new(line, column)),
            });
        } else {
            let end = column + c.len_utf16() as u32;
            return Err(malformed(column, end, &format!("unexpected character '{c}' in alias")));
        }
    }

    match tokens.first() {
        None => Err(ParseError::new(
            file,
            token.range,
            ErrorCode::MALFORMED_ALIAS,
            "alias is empty",
        )),
        Some(first) if first.kind == AliasTokenKind::Param => Err(ParseError::new(
            file,
            first.range,
            ErrorCode::MALFORMED_ALIAS,
            "alias must start with a word",
        )),
        Some(_) => Ok(Alias {
            text: raw.to_string(),
            range: token.range,
            tokens,
        }),
    }
}
