use crate::position::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Ident,
    Int,
    Float,
    String,

    Import,
    From,
    Public,
    Var,
    Func,
    Struct,
    Type,
    Alias,
    If,
    Else,
    While,
    Return,
    True,
    False,
    And,
    Or,
    Not,
    List,
    Of,

    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Semicolon,
    Assign,
    EqEq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    Plus,
    Minus,
    Star,
    Slash,

    Illegal,
    Eof,
}

impl TokenKind {
    pub fn is_keyword(self) -> bool {
        matches!(
            self,
            Self::Import
                | Self::From
                | Self::Public
                | Self::Var
                | Self::Func
                | Self::Struct
                | Self::Type
                | Self::Alias
                | Self::If
                | Self::Else
                | Self::While
                | Self::Return
                | Self::True
                | Self::False
                | Self::And
                | Self::Or
                | Self::Not
                | Self::List
                | Self::Of
        )
    }

    /// Tokens that can appear as a word of an alias.
    pub fn is_word(self) -> bool {
        self == Self::Ident || self.is_keyword()
    }
}

/// All keywords of the language, in declaration order.
pub const KEYWORDS: &[&str] = &[
    "import", "from", "public", "var", "func", "struct", "type", "alias", "if", "else", "while",
    "return", "true", "false", "and", "or", "not", "list", "of",
];

/// Built-in type names.
pub const BUILTIN_TYPES: &[&str] = &["int", "float", "bool", "text"];

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Raw source text of the token. String literals keep their quotes.
    pub literal: String,
    pub range: Range,
    /// Comment directly preceding this token, without its brackets.
    pub comment: Option<String>,
}

impl Token {
    /// Contents of a string literal with escapes resolved.
    pub fn string_value(&self) -> String {
        let inner = self
            .literal
            .strip_prefix('"')
            .map(|s| s.strip_suffix('"').unwrap_or(s))
            .unwrap_or(&self.literal);
        unescape(inner)
    }
}

pub(crate) fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
