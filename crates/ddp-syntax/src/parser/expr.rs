use super::stmt::{PResult, Parser};
use crate::ast::{
    BadExpr, BinaryExpr, BinaryOp, CallArg, Expr, FuncCall, Grouping, IdentExpr, Literal,
    LiteralValue, StructLiteral, UnaryExpr, UnaryOp,
};
use crate::decl::{AliasTokenKind, Decl, DeclKind, FuncSig};
use crate::error::{ErrorCode, ParseError};
use crate::position::Range;
use crate::token::TokenKind;
use std::sync::Arc;

type Level = &'static [(TokenKind, BinaryOp)];

const OR: Level = &[(TokenKind::Or, BinaryOp::Or)];
const AND: Level = &[(TokenKind::And, BinaryOp::And)];
const EQUALITY: Level = &[(TokenKind::EqEq, BinaryOp::Eq), (TokenKind::NotEq, BinaryOp::NotEq)];
const COMPARISON: Level = &[
    (TokenKind::Less, BinaryOp::Less),
    (TokenKind::LessEq, BinaryOp::LessEq),
    (TokenKind::Greater, BinaryOp::Greater),
    (TokenKind::GreaterEq, BinaryOp::GreaterEq),
];
const TERM: Level = &[(TokenKind::Plus, BinaryOp::Add), (TokenKind::Minus, BinaryOp::Sub)];
const FACTOR: Level = &[(TokenKind::Star, BinaryOp::Mul), (TokenKind::Slash, BinaryOp::Div)];

impl Parser<'_, '_> {
    pub(super) fn expression(&mut self) -> PResult<Expr> {
        self.binary(OR, Self::and)
    }

    fn and(&mut self) -> PResult<Expr> {
        self.binary(AND, Self::equality)
    }

    fn equality(&mut self) -> PResult<Expr> {
        self.binary(EQUALITY, Self::comparison)
    }

    fn comparison(&mut self) -> PResult<Expr> {
        self.binary(COMPARISON, Self::term)
    }

    fn term(&mut self) -> PResult<Expr> {
        self.binary(TERM, Self::factor)
    }

    fn factor(&mut self) -> PResult<Expr> {
        self.binary(FACTOR, Self::unary)
    }

    fn binary(&mut self, ops: Level, next: fn(&mut Self) -> PResult<Expr>) -> PResult<Expr> {
        let mut lhs = next(self)?;
        while let Some(op) = ops
            .iter()
            .find(|(kind, _)| self.check(*kind))
            .map(|(_, op)| *op)
        {
            self.advance();
            let rhs = next(self)?;
            let range = Range::cover(lhs.range(), rhs.range());
            lhs = Expr::Binary(BinaryExpr {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                range,
            });
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> PResult<Expr> {
        let op = match self.peek().kind {
            TokenKind::Not => UnaryOp::Not,
            TokenKind::Minus => UnaryOp::Negate,
            _ => return self.primary(),
        };
        let first = self.advance();
        let operand = self.unary()?;
        Ok(Expr::Unary(UnaryExpr {
            op,
            range: Range::cover(first.range, operand.range()),
            operand: Box::new(operand),
        }))
    }

    fn primary(&mut self) -> PResult<Expr> {
        if let Some(call) = self.alias_call() {
            return Ok(call);
        }

        let token = self.peek().clone();
        let value = match token.kind {
            TokenKind::Int => match token.literal.parse() {
                Ok(n) => LiteralValue::Int(n),
                Err(_) => {
                    self.advance();
                    return Ok(self.bad(token.range, ErrorCode::INVALID_NUMBER, "integer literal is too large"));
                }
            },
            TokenKind::Float => match token.literal.parse() {
                Ok(n) => LiteralValue::Float(n),
                Err(_) => {
                    self.advance();
                    return Ok(self.bad(token.range, ErrorCode::INVALID_NUMBER, "invalid float literal"));
                }
            },
            TokenKind::String => LiteralValue::Text(token.string_value()),
            TokenKind::True => LiteralValue::Bool(true),
            TokenKind::False => LiteralValue::Bool(false),
            TokenKind::LParen => {
                self.advance();
                let inner = self.expression()?;
                let close = self.expect(TokenKind::RParen, "')'")?;
                return Ok(Expr::Grouping(Grouping {
                    inner: Box::new(inner),
                    range: Range::cover(token.range, close.range),
                }));
            }
            TokenKind::Ident => {
                self.advance();
                return Ok(self.ident(token.literal, token.range));
            }
            _ => {
                let mut error = self.unexpected("an expression");
                error.code = ErrorCode::EXPECTED_EXPRESSION;
                return Err(error);
            }
        };
        self.advance();
        Ok(Expr::Literal(Literal {
            value,
            range: token.range,
        }))
    }

    fn ident(&mut self, name: String, range: Range) -> Expr {
        match self.scopes.lookup(self.scope, &name) {
            Some(decl) if decl.is_value() => Expr::Ident(IdentExpr {
                decl: Arc::clone(decl),
                name,
                range,
            }),
            Some(decl) => {
                let message = format!("'{}' is a {}, not a variable", name, decl.kind_name());
                self.bad(range, ErrorCode::NOT_A_VARIABLE, message)
            }
            None => self.bad(
                range,
                ErrorCode::UNDECLARED_NAME,
                format!("name '{name}' was not declared"),
            ),
        }
    }

    fn bad(&mut self, range: Range, code: ErrorCode, message: impl Into<String>) -> Expr {
        let error = ParseError::new(&self.file, range, code, message);
        self.error(error.clone());
        Expr::Bad(BadExpr { error, range })
    }

    /// Tries every visible alias starting with the current word, longest
    /// first. A failed attempt leaves no trace.
    fn alias_call(&mut self) -> Option<Expr> {
        let token = self.peek();
        if !token.kind.is_word() {
            return None;
        }
        let candidates: Vec<(Arc<Decl>, usize)> = self
            .aliases
            .iter()
            .filter(|(decl, index)| {
                decl.aliases()[*index]
                    .tokens
                    .first()
                    .is_some_and(|first| first.literal == token.literal)
            })
            .cloned()
            .collect();

        for (decl, index) in candidates {
            let pos = self.pos;
            let errors = self.errors.len();
            if let Some(expr) = self.match_alias(&decl, index) {
                return Some(expr);
            }
            self.pos = pos;
            self.errors.truncate(errors);
        }
        None
    }

    fn match_alias(&mut self, decl: &Arc<Decl>, index: usize) -> Option<Expr> {
        let alias = decl.aliases()[index].clone();
        let start = self.peek().range;
        let mut args = Vec::new();
        let mut word_ranges = Vec::new();

        for token in &alias.tokens {
            match token.kind {
                AliasTokenKind::Word => {
                    let next = self.peek();
                    if !next.kind.is_word() || next.literal != token.literal {
                        return None;
                    }
                    word_ranges.push(next.range);
                    self.advance();
                }
                AliasTokenKind::Param => {
                    let value = self.unary().ok()?;
                    args.push(CallArg {
                        param: token.param_name().unwrap_or_default().to_string(),
                        value,
                    });
                }
            }
        }

        let range = Range::cover(start, self.prev_range());
        let expr = if decl.structure().is_some() {
            Expr::StructLiteral(StructLiteral {
                decl: Arc::clone(decl),
                alias: index,
                args,
                word_ranges,
                range,
            })
        } else {
            Expr::Call(FuncCall {
                func: self.instantiate(decl),
                alias: index,
                args,
                word_ranges,
                range,
            })
        };
        Some(expr)
    }

    /// Returns the instantiation of a generic function for this module.
    fn instantiate(&mut self, decl: &Arc<Decl>) -> Arc<Decl> {
        let Some(sig) = decl.func().filter(|_| decl.is_generic()) else {
            return Arc::clone(decl);
        };
        let key = (decl.module, decl.name.clone());
        if let Some(existing) = self.instantiations.get(&key) {
            return Arc::clone(existing);
        }
        let instance = Arc::new(Decl {
            name: decl.name.clone(),
            name_range: decl.name_range,
            range: decl.range,
            module: self.module_id,
            module_path: self.file.clone(),
            is_public: false,
            comment: decl.comment.clone(),
            kind: DeclKind::Func(FuncSig {
                params: sig.params.clone(),
                return_type: sig.return_type.clone(),
                aliases: sig.aliases.clone(),
                generic_params: Vec::new(),
                template: Some(Arc::clone(decl)),
                is_extern: sig.is_extern,
            }),
        });
        self.instantiations.insert(key, Arc::clone(&instance));
        instance
    }
}

/// Display name of the type an expression evaluates to.
pub(crate) fn type_name(expr: &Expr) -> String {
    match expr {
        Expr::Literal(lit) => match lit.value {
            LiteralValue::Int(_) => "int",
            LiteralValue::Float(_) => "float",
            LiteralValue::Text(_) => "text",
            LiteralValue::Bool(_) => "bool",
        }
        .to_string(),
        Expr::Ident(ident) => ident
            .decl
            .value_type()
            .map_or_else(|| "?".to_string(), |ty| ty.display.clone()),
        Expr::Unary(unary) => match unary.op {
            UnaryOp::Not => "bool".to_string(),
            UnaryOp::Negate => type_name(&unary.operand),
        },
        Expr::Binary(binary) => match binary.op {
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => {
                type_name(&binary.lhs)
            }
            _ => "bool".to_string(),
        },
        Expr::Grouping(group) => type_name(&group.inner),
        Expr::Call(call) => call
            .func
            .func()
            .and_then(|sig| sig.return_type.as_ref())
            .map_or_else(|| "none".to_string(), |ty| ty.display.clone()),
        Expr::StructLiteral(lit) => lit.decl.name.clone(),
        Expr::Bad(_) => "?".to_string(),
    }
}
