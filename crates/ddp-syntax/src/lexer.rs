//! Turns source text into tokens.
//!
//! Token shapes are recognized by a scanner generated with `logos`.
//! [`tokenize`] wraps it to track line and UTF-16 column positions, report
//! lexical errors and attach comments to the token that follows them.

use crate::error::{ErrorCode, ParseError};
use crate::position::{Position, Range};
use crate::token::{Token, TokenKind};
use logos::Logos;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommentEnd {
    Closed,
    Unclosed,
}

/// Logos token enum, converted to [`TokenKind`] by the wrapping lexer.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"\s+")]
enum RawToken {
    // =========================================================================
    // TRIVIA
    // =========================================================================
    #[token("[", nested_comment)]
    Comment(CommentEnd),

    // =========================================================================
    // LITERALS
    // =========================================================================
    #[regex(r"[\p{Alphabetic}_][\p{Alphabetic}\p{N}_]*")]
    Ident,

    #[regex(r"[0-9]+")]
    Int,

    #[regex(r"[0-9]+\.[0-9]+")]
    Float,

    #[regex(r#""([^"\\\n]|\\[^\n])*""#)]
    String,

    // Stops at the end of the line.
    #[regex(r#""([^"\\\n]|\\[^\n])*\\?"#)]
    UnterminatedString,

    // =========================================================================
    // KEYWORDS
    // =========================================================================
    #[token("alias")]
    Alias,
    #[token("and")]
    And,
    #[token("else")]
    Else,
    #[token("false")]
    False,
    #[token("from")]
    From,
    #[token("func")]
    Func,
    #[token("if")]
    If,
    #[token("import")]
    Import,
    #[token("list")]
    List,
    #[token("not")]
    Not,
    #[token("of")]
    Of,
    #[token("or")]
    Or,
    #[token("public")]
    Public,
    #[token("return")]
    Return,
    #[token("struct")]
    Struct,
    #[token("true")]
    True,
    #[token("type")]
    Type,
    #[token("var")]
    Var,
    #[token("while")]
    While,

    // =========================================================================
    // PUNCTUATION (two-character operators win by length)
    // =========================================================================
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<=")]
    LessEq,
    #[token(">=")]
    GreaterEq,
    #[token("=")]
    Assign,
    #[token("<")]
    Less,
    #[token(">")]
    Greater,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token(";")]
    Semicolon,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
}

/// Consumes a `[ ... ]` comment after its opening bracket. Brackets nest.
fn nested_comment(lex: &mut logos::Lexer<'_, RawToken>) -> CommentEnd {
    let mut depth = 1usize;
    for (i, c) in lex.remainder().char_indices() {
        match c {
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    lex.bump(i + 1);
                    return CommentEnd::Closed;
                }
            }
            _ => {}
        }
    }
    lex.bump(lex.remainder().len());
    CommentEnd::Unclosed
}

impl From<RawToken> for TokenKind {
    fn from(token: RawToken) -> Self {
        match token {
            RawToken::Ident => Self::Ident,
            RawToken::Int => Self::Int,
            RawToken::Float => Self::Float,
            RawToken::String | RawToken::UnterminatedString => Self::String,
            RawToken::Alias => Self::Alias,
            RawToken::And => Self::And,
            RawToken::Else => Self::Else,
            RawToken::False => Self::False,
            RawToken::From => Self::From,
            RawToken::Func => Self::Func,
            RawToken::If => Self::If,
            RawToken::Import => Self::Import,
            RawToken::List => Self::List,
            RawToken::Not => Self::Not,
            RawToken::Of => Self::Of,
            RawToken::Or => Self::Or,
            RawToken::Public => Self::Public,
            RawToken::Return => Self::Return,
            RawToken::Struct => Self::Struct,
            RawToken::True => Self::True,
            RawToken::Type => Self::Type,
            RawToken::Var => Self::Var,
            RawToken::While => Self::While,
            RawToken::EqEq => Self::EqEq,
            RawToken::NotEq => Self::NotEq,
            RawToken::LessEq => Self::LessEq,
            RawToken::GreaterEq => Self::GreaterEq,
            RawToken::Assign => Self::Assign,
            RawToken::Less => Self::Less,
            RawToken::Greater => Self::Greater,
            RawToken::LParen => Self::LParen,
            RawToken::RParen => Self::RParen,
            RawToken::LBrace => Self::LBrace,
            RawToken::RBrace => Self::RBrace,
            RawToken::Comma => Self::Comma,
            RawToken::Colon => Self::Colon,
            RawToken::Semicolon => Self::Semicolon,
            RawToken::Plus => Self::Plus,
            RawToken::Minus => Self::Minus,
            RawToken::Star => Self::Star,
            RawToken::Slash => Self::Slash,
            // comments are consumed by the lexer before conversion
            RawToken::Comment(_) => Self::Illegal,
        }
    }
}

/// Lexer wrapping the logos-generated scanner.
struct Lexer<'a> {
    file: &'a Path,
    src: &'a str,
    inner: logos::Lexer<'a, RawToken>,
    offset: usize,
    line: u32,
    column: u32,
    comment: Option<String>,
    errors: Vec<ParseError>,
}

/// Tokenizes `source`. The returned token list always ends with an
/// [`TokenKind::Eof`] token.
///
/// Comments are written in square brackets and may nest. The text of a
/// comment is attached to the token that follows it.
///
/// # Examples
///
/// ```
/// use ddp_syntax::lexer::tokenize;
/// use ddp_syntax::token::TokenKind;
/// use std::path::Path;
///
/// let (tokens, errors) = tokenize(Path::new("a.ddp"), "[doc] var x = 1;");
/// assert!(errors.is_empty());
/// assert_eq!(tokens[0].kind, TokenKind::Var);
/// assert_eq!(tokens[0].comment.as_deref(), Some("doc"));
/// assert_eq!(tokens.last().unwrap().kind, TokenKind::Eof);
/// ```
pub fn tokenize(file: &Path, source: &str) -> (Vec<Token>, Vec<ParseError>) {
    let mut lexer = Lexer {
        file,
        src: source,
        inner: RawToken::lexer(source),
        offset: 0,
        line: 1,
        column: 1,
        comment: None,
        errors: Vec::new(),
    };
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token();
        let done = token.kind == TokenKind::Eof;
        tokens.push(token);
        if done {
            break;
        }
    }
    (tokens, lexer.errors)
}

impl Lexer<'_> {
    /// Moves the position forward to byte `offset` and returns it.
    fn advance_to(&mut self, offset: usize) -> Position {
        for c in self.src[self.offset..offset].chars() {
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += c.len_utf16() as u32;
            }
        }
        self.offset = offset;
        Position::new(self.line, self.column)
    }

    fn error(&mut self, range: Range, code: ErrorCode, message: impl Into<String>) {
        self.errors
            .push(ParseError::new(self.file, range, code, message));
    }

    fn next_token(&mut self) -> Token {
        loop {
            let Some(raw) = self.inner.next() else {
                let end = self.advance_to(self.src.len());
                return Token {
                    kind: TokenKind::Eof,
                    literal: String::new(),
                    range: Range::new(end, end),
                    comment: self.comment.take(),
                };
            };

            let span = self.inner.span();
            let slice = self.inner.slice();
            let start = self.advance_to(span.start);
            let range = Range::new(start, self.advance_to(span.end));

            let kind = match raw {
                Ok(RawToken::Comment(CommentEnd::Closed)) => {
                    let text = &slice[1..slice.len() - 1];
                    self.comment = Some(text.trim().to_string());
                    continue;
                }
                Ok(RawToken::Comment(CommentEnd::Unclosed)) => {
                    self.error(range, ErrorCode::UNTERMINATED_COMMENT, "comment is never closed");
                    self.comment = None;
                    continue;
                }
                Ok(RawToken::UnterminatedString) => {
                    self.error(
                        range,
                        ErrorCode::UNTERMINATED_STRING,
                        "string literal is never closed",
                    );
                    TokenKind::String
                }
                Ok(raw) => raw.into(),
                Err(()) => {
                    let c = slice.chars().next().unwrap_or_default();
                    self.error(
                        range,
                        ErrorCode::ILLEGAL_CHARACTER,
                        format!("unexpected character '{}'", c),
                    );
                    TokenKind::Illegal
                }
            };

            return Token {
                kind,
                literal: slice.to_string(),
                range,
                comment: self.comment.take(),
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::KEYWORDS;

    fn kinds(src: &str) -> Vec<TokenKind> {
        let (tokens, errors) = tokenize(Path::new("t.ddp"), src);
        assert!(errors.is_empty(), "{errors:?}");
        tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("= == != < <= > >= + - * /"),
            vec![
                TokenKind::Assign,
                TokenKind::EqEq,
                TokenKind::NotEq,
                TokenKind::Less,
                TokenKind::LessEq,
                TokenKind::Greater,
                TokenKind::GreaterEq,
                TokenKind::Plus,
                TokenKind::Minus,
                TokenKind::Star,
                TokenKind::Slash,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_every_keyword_lexes_as_keyword() {
        for kw in KEYWORDS {
            let kinds = kinds(kw);
            assert_eq!(kinds.len(), 2, "{kw}");
            assert!(kinds[0].is_keyword(), "{kw}");
        }
        assert_eq!(kinds("variable")[0], TokenKind::Ident);
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            kinds("12 3.5 7"),
            vec![TokenKind::Int, TokenKind::Float, TokenKind::Int, TokenKind::Eof]
        );
    }

    #[test]
    fn test_trailing_dot_is_not_part_of_number() {
        let (tokens, errors) = tokenize(Path::new("t.ddp"), "7.");
        assert_eq!(tokens[0].kind, TokenKind::Int);
        assert_eq!(tokens[1].kind, TokenKind::Illegal);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_positions_are_one_based() {
        let (tokens, _) = tokenize(Path::new("t.ddp"), "var x\n  = 10;");
        assert_eq!(tokens[0].range, Range::new(Position::new(1, 1), Position::new(1, 4)));
        assert_eq!(tokens[1].range, Range::new(Position::new(1, 5), Position::new(1, 6)));
        assert_eq!(tokens[2].range.start, Position::new(2, 3));
        assert_eq!(tokens[3].literal, "10");
    }

    #[test]
    fn test_columns_count_utf16_units() {
        let (tokens, _) = tokenize(Path::new("t.ddp"), "\"😀\" x");
        assert_eq!(tokens[0].range.end.column, 5);
        assert_eq!(tokens[1].range.start.column, 6);
    }

    #[test]
    fn test_eof_sits_after_trailing_whitespace() {
        let (tokens, _) = tokenize(Path::new("t.ddp"), "x\n\n");
        let eof = tokens.last().unwrap();
        assert_eq!(eof.range.start, Position::new(3, 1));
    }

    #[test]
    fn test_nested_comment_attaches_to_next_token() {
        let (tokens, errors) = tokenize(Path::new("t.ddp"), "[outer [inner] text]\nfunc");
        assert!(errors.is_empty());
        assert_eq!(tokens[0].kind, TokenKind::Func);
        assert_eq!(tokens[0].comment.as_deref(), Some("outer [inner] text"));
        assert_eq!(tokens[0].range.start, Position::new(2, 1));
    }

    #[test]
    fn test_later_comment_replaces_earlier() {
        let (tokens, _) = tokenize(Path::new("t.ddp"), "[first] [second] var");
        assert_eq!(tokens[0].comment.as_deref(), Some("second"));
    }

    #[test]
    fn test_unterminated_comment() {
        let (tokens, errors) = tokenize(Path::new("t.ddp"), "[never closed");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].comment, None);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, ErrorCode::UNTERMINATED_COMMENT);
    }

    #[test]
    fn test_escaped_quote_stays_in_string() {
        let (tokens, errors) = tokenize(Path::new("t.ddp"), r#""a \" b" x"#);
        assert!(errors.is_empty());
        assert_eq!(tokens[0].kind, TokenKind::String);
        assert_eq!(tokens[0].string_value(), "a \" b");
        assert_eq!(tokens[1].kind, TokenKind::Ident);
    }

    #[test]
    fn test_unterminated_string_stops_at_newline() {
        let (tokens, errors) = tokenize(Path::new("t.ddp"), "\"abc\nvar");
        assert_eq!(errors[0].code, ErrorCode::UNTERMINATED_STRING);
        assert_eq!(tokens[0].literal, "\"abc");
        assert_eq!(tokens[1].kind, TokenKind::Var);
    }

    #[test]
    fn test_illegal_character() {
        let (tokens, errors) = tokenize(Path::new("t.ddp"), "x $ y");
        assert_eq!(tokens[1].kind, TokenKind::Illegal);
        assert_eq!(tokens[2].kind, TokenKind::Ident);
        assert_eq!(errors[0].code, ErrorCode::ILLEGAL_CHARACTER);
    }

    #[test]
    fn test_keywords_and_unicode_identifiers() {
        assert_eq!(
            kinds("import größe from"),
            vec![
                TokenKind::Import,
                TokenKind::Ident,
                TokenKind::From,
                TokenKind::Eof
            ]
        );
    }
}
