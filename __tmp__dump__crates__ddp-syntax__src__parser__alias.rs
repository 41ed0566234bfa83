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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenKind;

    fn string_token(literal: &str, column: u32) -> Token {
        Token {
            kind: TokenKind::String,
            literal: literal.into(),
            range: Range::new(
                Position::new(4, column),
                Position::new(4, column + literal.len() as u32),
            ),
            comment: None,
        }
    }

    #[test]
    fn test_words_and_params() {
        let alias = parse_alias(Path::new("a.ddp"), &string_token("\"add <a> and <b>\"", 10)).unwrap();
        let literals: Vec<_> = alias.tokens.iter().map(|t| t.literal.as_str()).collect();
        assert_eq!(literals, ["add", "<a>", "and", "<b>"]);
        assert_eq!(alias.text, "add <a> and <b>");

        // `"` sits at column 10, so `add` starts at 11 and `<a>` at 15.
        assert_eq!(alias.tokens[0].range.start.column, 11);
        assert_eq!(alias.tokens[1].range.start.column, 15);
        assert_eq!(alias.tokens[1].range.end.column, 18);
        assert_eq!(alias.tokens[1].name_range().start.column, 16);
        assert_eq!(alias.tokens[1].name_range().end.column, 17);
        assert_eq!(alias.params().count(), 2);
        assert_eq!(alias.words().count(), 2);
    }

    #[test]
    fn test_alias_must_start_with_word() {
        let err = parse_alias(Path::new("a.ddp"), &string_token("\"<a> plus <b>\"", 1)).unwrap_err();
        assert_eq!(err.code, ErrorCode::MALFORMED_ALIAS);
    }

    #[test]
    fn test_unclosed_slot() {
        let err = parse_alias(Path::new("a.ddp"), &string_token("\"add <a and\"", 1)).unwrap_err();
        assert!(err.message.contains("not closed"));
    }

    #[test]
    fn test_empty_alias() {
        assert!(parse_alias(Path::new("a.ddp"), &string_token("\"  \"", 1)).is_err());
    }

    #[test]
    fn test_punctuation_is_rejected() {
        let err = parse_alias(Path::new("a.ddp"), &string_token("\"add, <a>\"", 1)).unwrap_err();
        assert_eq!(err.range.start.column, 5);
    }
}


