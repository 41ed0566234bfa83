//! Turns source text into tokens.

use crate::error::{ErrorCode, ParseError};
use crate::position::{Position, Range};
use crate::token::{Token, TokenKind};
use std::path::Path;

struct Lexer<'a> {
    file: &'a Path,
    src: &'a str,
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
    fn peek(&self) -> Option<char> {
        self.src[self.offset..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        self.src[self.offset..].chars().nth(1)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.offset += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += c.len_utf16() as u32;
        }
        Some(c)
    }

    fn pos(&self) -> Position {
        Position::new(self.line, self.column)
    }

    fn error(&mut self, range: Range, code: ErrorCode, message: impl Into<String>) {
        self.errors
            .push(ParseError::new(self.file, range, code, message));
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('[') => self.comment(),
                _ => break,
            }
        }
    }

    fn comment(&mut self) {
        let start = self.pos();
        let text_start = self.offset + 1;
        self.bump();
        let mut depth = 1;
        while depth > 0 {
            match self.bump() {
                Some('[') => depth += 1,
                Some(']') => depth -= 1,
                Some(_) => {}
                None => {
                    self.error(
                        Range::new(start, self.pos()),
                        ErrorCode::UNTERMINATED_COMMENT,
                        "comment is never closed",
                    );
                    self.comment = None;
                    return;
                }
            }
        }
        let text = &self.src[text_start..self.offset - 1];
        self.comment = Some(text.trim().to_string());
    }

    fn next_token(&mut self) -> Token {
        self.skip_trivia();
        let start = self.pos();
        let start_offset = self.offset;
        let comment = self.comment.take();

        let Some(c) = self.bump() else {
            return Token {
                kind: TokenKind::Eof,
                literal: String::new(),
                range: Range::new(start, start),
                comment,
            };
        };

        let kind = match c {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            ';' => TokenKind::Semicolon,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '=' => self.either('=', TokenKind::EqEq, TokenKind::Assign),
            '<' => self.either('=', TokenKind::LessEq, TokenKind::Less),
            '>' => self.either('=', TokenKind::GreaterEq, TokenKind::Greater),
            '!' if self.peek() == Some('=') => {
                self.bump();
                TokenKind::NotEq
            }
            '"' => self.string(start),
            c if c.is_ascii_digit() => self.number(),
            c if c.is_alphabetic() || c == '_' => {
                while self
                    .peek()
                    .is_some_and(|c| c.is_alphanumeric() || c == '_')
                {
                    self.bump();
                }
                TokenKind::keyword(&self.src[start_offset..self.offset]).unwrap_or(TokenKind::Ident)
            }
            other => {
                self.error(
                    Range::new(start, self.pos()),
                    ErrorCode::ILLEGAL_CHARACTER,
                    format!("unexpected character '{}'", other),
                );
                TokenKind::Illegal
            }
        };

        Token {
            kind,
            literal: self.src[start_offset..self.offset].to_string(),
            range: Range::new(start, self.pos()),
            comment,
        }
    }

    fn either(&mut self, next: char, matched: TokenKind, otherwise: TokenKind) -> TokenKind {
        if self.peek() == Some(next) {
            self.bump();
            matched
        } else {
            otherwise
        }
    }

    fn number(&mut self) -> TokenKind {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
        }
        if self.peek() == Some('.') && self.peek_second().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
            }
            return TokenKind::Float;
        }
        TokenKind::Int
    }

    // Strings end at the closing quote or the end of the line.
    fn string(&mut self, start: Position) -> TokenKind {
        loop {
            match self.peek() {
                Some('"') => {
                    self.bump();
                    return TokenKind::String;
                }
                Some('\\') => {
                    self.bump();
                    if self.peek().is_some_and(|c| c != '\n') {
                        self.bump();
                    }
                }
                Some('\n') | None => {
                    self.error(
                        Range::new(start, self.pos()),
                        ErrorCode::UNTERMINATED_STRING,
                        "string literal is never closed",
                    );
                    return TokenKind::String;
                }
                Some(_) => {
                    self.bump();
                }
            }
        }
    }
}
