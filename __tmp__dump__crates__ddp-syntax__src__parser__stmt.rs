use super::alias::parse_alias;
use super::{Session, resolve_import_path};
use crate::ast::{
    AssignStmt, BadStmt, Block, ExprStmt, FuncDeclStmt, IdentExpr, IfStmt, ImportStmt,
    ImportSymbol, ReturnStmt, Stmt, StringLit, StructDeclStmt, TypeAliasStmt, VarDeclStmt,
    WhileStmt,
};
use crate::decl::{Alias, Decl, DeclKind, FuncSig, StructSig, TypeRef};
use crate::error::{ErrorCode, ParseError};
use crate::lexer::tokenize;
use crate::module::{Module, ModuleId};
use crate::position::{Position, Range};
use crate::scope::{ScopeId, Scopes};
use crate::token::{BUILTIN_TYPES, Token, TokenKind};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub(crate) type PResult<T> = std::result::Result<T, ParseError>;

/// Recursive descent parser for one file.
pub(crate) struct Parser<'s, 'a> {
    session: &'s mut Session<'a>,
    pub(super) file: PathBuf,
    pub(super) tokens: Vec<Token>,
    pub(super) pos: usize,
    pub(super) module_id: ModuleId,
    pub(super) scopes: Scopes,
    root: ScopeId,
    pub(super) scope: ScopeId,
    /// Errors found in this file.
    pub(super) errors: Vec<ParseError>,
    /// Errors of imported modules.
    imported_errors: Vec<ParseError>,
    public_decls: BTreeMap<String, Arc<Decl>>,
    /// Callable aliases in scope as (declaration, alias index).
    pub(super) aliases: Vec<(Arc<Decl>, usize)>,
    pub(super) instantiations: HashMap<(ModuleId, String), Arc<Decl>>,
    generics: Vec<String>,
    function_depth: usize,
}

impl<'s, 'a> Parser<'s, 'a> {
    pub(crate) fn new(session: &'s mut Session<'a>, file: &Path, source: &str) -> Self {
        let (tokens, errors) = tokenize(file, source);
        let mut scopes = Scopes::new();
        let root = scopes.push(None, Range::default());
        Self {
            session,
            file: file.to_path_buf(),
            tokens,
            pos: 0,
            module_id: ModuleId::next(),
            scopes,
            root,
            scope: root,
            errors,
            imported_errors: Vec::new(),
            public_decls: BTreeMap::new(),
            aliases: Vec::new(),
            instantiations: HashMap::new(),
            generics: Vec::new(),
            function_depth: 0,
        }
    }

    pub(crate) fn parse_module(mut self) -> Module {
        let mut statements = Vec::new();
        while !self.check(TokenKind::Eof) {
            statements.push(self.statement(true));
        }
        let end = self.peek().range.end;
        self.scopes
            .set_range(self.root, Range::new(Position::new(1, 1), end));

        for error in &self.errors {
            self.session.report(error.clone());
        }
        let mut errors = self.imported_errors;
        errors.extend(self.errors);

        Module {
            id: self.module_id,
            file_name: self.file,
            statements,
            scopes: self.scopes,
            root_scope: self.root,
            public_decls: self.public_decls,
            errors,
        }
    }

    // Token helpers

    pub(super) fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    pub(super) fn peek_at(&self, n: usize) -> &Token {
        &self.tokens[(self.pos + n).min(self.tokens.len() - 1)]
    }

    pub(super) fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    pub(super) fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    pub(super) fn eat(&mut self, kind: TokenKind) -> Option<Token> {
        self.check(kind).then(|| self.advance())
    }

    pub(super) fn expect(&mut self, kind: TokenKind, what: &str) -> PResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(what))
        }
    }

    pub(super) fn unexpected(&self, what: &str) -> ParseError {
        let token = self.peek();
        let found = if token.kind == TokenKind::Eof {
            "end of file".to_string()
        } else {
            format!("'{}'", token.literal)
        };
        ParseError::new(
            &self.file,
            token.range,
            ErrorCode::UNEXPECTED_TOKEN,
            format!("expected {what}, found {found}"),
        )
    }

    /// Range of the last consumed token.
    pub(super) fn prev_range(&self) -> Range {
        self.pos
            .checked_sub(1)
            .map_or(self.peek().range, |i| self.tokens[i].range)
    }

    pub(super) fn error(&mut self, error: ParseError) {
        self.errors.push(error);
    }

    pub(super) fn error_at(&mut self, range: Range, code: ErrorCode, message: impl Into<String>) {
        let error = ParseError::new(&self.file, range, code, message);
        self.error(error);
    }

    fn new_decl(
        &self,
        name: &Token,
        range: Range,
        is_public: bool,
        comment: Option<String>,
        kind: DeclKind,
    ) -> Decl {
        Decl {
            name: name.literal.clone(),
            name_range: name.range,
            range,
            module: self.module_id,
            module_path: self.file.clone(),
            is_public,
            comment,
            kind,
        }
    }

    /// Adds a declaration of this module to the current scope.
    fn declare(&mut self, decl: &Arc<Decl>) {
        if let Err(existing) = self.scopes.declare(self.scope, Arc::clone(decl)) {
            self.error_at(
                decl.name_range,
                ErrorCode::ALREADY_DECLARED,
                format!(
                    "'{}' is already declared as a {}",
                    decl.name,
                    existing.kind_name()
                ),
            );
            return;
        }
        if self.scope == self.root && decl.is_public {
            self.public_decls
                .insert(decl.name.clone(), Arc::clone(decl));
        }
        self.register_aliases(decl);
    }

    fn declare_imported(&mut self, decl: &Arc<Decl>, range: Range) {
        match self.scopes.declare(self.root, Arc::clone(decl)) {
            Ok(()) => self.register_aliases(decl),
            Err(existing) if Arc::ptr_eq(&existing, decl) => {}
            Err(_) => self.error_at(
                range,
                ErrorCode::ALREADY_DECLARED,
                format!("imported name '{}' is already declared", decl.name),
            ),
        }
    }

    fn register_aliases(&mut self, decl: &Arc<Decl>) {
        for index in 0..decl.aliases().len() {
            self.aliases.push((Arc::clone(decl), index));
        }
        // Longest aliases are tried first.
        self.aliases
            .sort_by_key(|(d, i)| std::cmp::Reverse(d.aliases()[*i].tokens.len()));
    }

    // Statements

    fn statement(&mut self, top_level: bool) -> Stmt {
        let start = self.pos;
        let start_range = self.peek().range;
        match self.statement_inner(top_level) {
            Ok(stmt) => stmt,
            Err(error) => {
                self.error(error.clone());
                self.synchronize(start);
                let end = if self.pos > start {
                    self.prev_range()
                } else {
                    start_range
                };
                Stmt::Bad(BadStmt {
                    error,
                    range: Range::cover(start_range, end),
                })
            }
        }
    }

    /// Skips to the end of the broken statement.
    fn synchronize(&mut self, start: usize) {
        if self.pos == start {
            self.advance();
        }
        loop {
            match self.peek().kind {
                TokenKind::Eof | TokenKind::RBrace => return,
                TokenKind::Semicolon => {
                    self.advance();
                    return;
                }
                TokenKind::Import
                | TokenKind::Public
                | TokenKind::Var
                | TokenKind::Func
                | TokenKind::Struct
                | TokenKind::Type
                | TokenKind::If
                | TokenKind::While
                | TokenKind::Return => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn statement_inner(&mut self, top_level: bool) -> PResult<Stmt> {
        match self.peek().kind {
            TokenKind::Import => {
                if !top_level {
                    self.error_at(
                        self.peek().range,
                        ErrorCode::MISPLACED_DECLARATION,
                        "imports are only allowed at the top level",
                    );
                }
                self.import_stmt()
            }
            TokenKind::Public
            | TokenKind::Var
            | TokenKind::Func
            | TokenKind::Struct
            | TokenKind::Type => self.declaration(top_level),
            TokenKind::If => self.if_stmt().map(Stmt::If),
            TokenKind::While => self.while_stmt(),
            TokenKind::Return => self.return_stmt(),
            TokenKind::LBrace => self.block(Vec::new()).map(Stmt::Block),
            TokenKind::Ident if self.peek_at(1).kind == TokenKind::Assign => self.assign_stmt(),
            _ => {
                let expr = self.expression()?;
                let semi = self.expect(TokenKind::Semicolon, "';'")?;
                Ok(Stmt::Expr(ExprStmt {
                    range: Range::cover(expr.range(), semi.range),
                    expr,
                }))
            }
        }
    }

    fn import_stmt(&mut self) -> PResult<Stmt> {
        let first = self.advance();
        let mut symbols = Vec::new();
        if self.check(TokenKind::Ident) {
            loop {
                let name = self.expect(TokenKind::Ident, "an imported name")?;
                symbols.push(ImportSymbol {
                    name: name.literal,
                    range: name.range,
                    decl: None,
                });
                if self.eat(TokenKind::Comma).is_none() {
                    break;
                }
            }
            self.expect(TokenKind::From, "'from'")?;
        }
        let path_token = self.expect(TokenKind::String, "an import path")?;
        let semi = self.expect(TokenKind::Semicolon, "';'")?;
        let range = Range::cover(first.range, semi.range);
        let path = StringLit {
            value: path_token.string_value(),
            range: path_token.range,
        };

        let dir = self.file.parent().unwrap_or_else(|| Path::new("")).to_path_buf();
        let resolved_path = resolve_import_path(&dir, &path.value);
        let module = match self.session.import(&self.file, &resolved_path, path.range) {
            Ok(module) => {
                self.imported_errors.extend(module.errors.iter().cloned());
                self.bring_into_scope(&module, &mut symbols, range);
                Some(module)
            }
            Err(error) => {
                self.error(error);
                None
            }
        };

        Ok(Stmt::Import(ImportStmt {
            range,
            path,
            symbols,
            resolved_path,
            module,
        }))
    }

    fn bring_into_scope(&mut self, module: &Module, symbols: &mut [ImportSymbol], range: Range) {
        if symbols.is_empty() {
            for decl in module.public_decls.values() {
                self.declare_imported(decl, range);
            }
            return;
        }
        for symbol in symbols {
            if let Some(decl) = module.public_decls.get(&symbol.name) {
                symbol.decl = Some(Arc::clone(decl));
                self.declare_imported(decl, symbol.range);
            } else if module
                .scopes
                .get(module.root_scope)
                .get(&symbol.name)
                .is_some()
            {
                self.error_at(
                    symbol.range,
                    ErrorCode::NOT_PUBLIC,
                    format!("'{}' is not public", symbol.name),
                );
            } else {
                self.error_at(
                    symbol.range,
                    ErrorCode::UNDECLARED_NAME,
                    format!(
                        "'{}' is not declared in '{}'",
                        symbol.name,
                        module.file_name.display()
                    ),
                );
            }
        }
    }

    fn declaration(&mut self, top_level: bool) -> PResult<Stmt> {
        let first = self.peek().clone();
        let is_public = self.eat(TokenKind::Public).is_some();
        if is_public && !top_level {
            self.error_at(
                first.range,
                ErrorCode::MISPLACED_DECLARATION,
                "only top-level declarations can be public",
            );
        }
        let kind = self.peek().kind;
        if !top_level && matches!(kind, TokenKind::Func | TokenKind::Struct | TokenKind::Type) {
            self.error_at(
                self.peek().range,
                ErrorCode::MISPLACED_DECLARATION,
                format!("'{}' declarations are only allowed at the top level", self.peek().literal),
            );
        }
        match kind {
            TokenKind::Var => self.var_decl(&first, is_public),
            TokenKind::Func => self.func_decl(&first, is_public),
            TokenKind::Struct => self.struct_decl(&first, is_public),
            TokenKind::Type => self.type_alias(&first, is_public),
            _ => Err(self.unexpected("a declaration")),
        }
    }

    fn var_decl(&mut self, first: &Token, is_public: bool) -> PResult<Stmt> {
        self.advance();
        let name = self.expect(TokenKind::Ident, "a variable name")?;
        let ty = if self.eat(TokenKind::Colon).is_some() {
            Some(self.parse_type()?)
        } else {
            None
        };
        let init = if self.eat(TokenKind::Assign).is_some() {
            Some(self.expression()?)
        } else {
            None
        };
        let semi = self.expect(TokenKind::Semicolon, "';'")?;
        let ty = match (ty, &init) {
            (Some(ty), _) => ty,
            (None, Some(init)) => TypeRef {
                display: super::expr::type_name(init),
                range: name.range,
                name_range: name.range,
                decl: None,
            },
            (None, None) => {
                return Err(ParseError::new(
                    &self.file,
                    name.range,
                    ErrorCode::UNKNOWN_TYPE,
                    format!("variable '{}' needs a type or a value", name.literal),
                ));
            }
        };

        let range = Range::cover(first.range, semi.range);
        let decl = Arc::new(self.new_decl(
            &name,
            range,
            is_public,
            first.comment.clone(),
            DeclKind::Var { ty },
        ));
        self.declare(&decl);
        Ok(Stmt::Var(VarDeclStmt { decl, init, range }))
    }

    fn func_decl(&mut self, first: &Token, is_public: bool) -> PResult<Stmt> {
        self.advance();
        let name = self.expect(TokenKind::Ident, "a function name")?;
        let mut generics = Vec::new();
        if self.eat(TokenKind::Less).is_some() {
            loop {
                generics.push(self.expect(TokenKind::Ident, "a type parameter")?.literal);
                if self.eat(TokenKind::Comma).is_none() {
                    break;
                }
            }
            self.expect(TokenKind::Greater, "'>'")?;
        }
        let outer = std::mem::replace(&mut self.generics, generics.clone());
        let result = self.func_rest(first, is_public, &name, generics);
        self.generics = outer;
        result
    }

    fn func_rest(
        &mut self,
        first: &Token,
        is_public: bool,
        name: &Token,
        generics: Vec<String>,
    ) -> PResult<Stmt> {
        self.expect(TokenKind::LParen, "'('")?;
        let mut params: Vec<Arc<Decl>> = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                let param = self.expect(TokenKind::Ident, "a parameter name")?;
                self.expect(TokenKind::Colon, "':'")?;
                let ty = self.parse_type()?;
                if params.iter().any(|p| p.name == param.literal) {
                    self.error_at(
                        param.range,
                        ErrorCode::ALREADY_DECLARED,
                        format!("parameter '{}' is declared twice", param.literal),
                    );
                }
                let range = Range::cover(param.range, ty.range);
                params.push(Arc::new(self.new_decl(
                    &param,
                    range,
                    false,
                    param.comment.clone(),
                    DeclKind::Param { ty },
                )));
                if self.eat(TokenKind::Comma).is_none() {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, "')'")?;
        let return_type = if self.eat(TokenKind::Colon).is_some() {
            Some(self.parse_type()?)
        } else {
            None
        };
        let names: Vec<String> = params.iter().map(|p| p.name.clone()).collect();
        let aliases = self.alias_clause(&names, true)?;
        let is_extern = self.check(TokenKind::Semicolon);

        let signature = Range::cover(first.range, self.prev_range());
        let decl = Arc::new(self.new_decl(
            name,
            signature,
            is_public,
            first.comment.clone(),
            DeclKind::Func(FuncSig {
                params: params.clone(),
                return_type,
                aliases,
                generic_params: generics,
                template: None,
                is_extern,
            }),
        ));
        self.declare(&decl);

        let body = if is_extern {
            self.advance();
            None
        } else {
            self.function_depth += 1;
            let body = self.block(params);
            self.function_depth -= 1;
            Some(body?)
        };

        Ok(Stmt::Func(FuncDeclStmt {
            decl,
            body,
            range: Range::cover(first.range, self.prev_range()),
        }))
    }

    fn alias_clause(&mut self, names: &[String], require_all: bool) -> PResult<Vec<Alias>> {
        let mut aliases = Vec::new();
        if self.eat(TokenKind::Alias).is_none() {
            return Ok(aliases);
        }
        loop {
            let token = self.expect(TokenKind::String, "an alias string")?;
            match parse_alias(&self.file, &token).and_then(|a| self.validate_alias(a, names, require_all)) {
                Ok(alias) => aliases.push(alias),
                Err(error) => self.error(error),
            }
            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
        }
        Ok(aliases)
    }

    fn validate_alias(&self, alias: Alias, names: &[String], require_all: bool) -> PResult<Alias> {
        let mut seen: Vec<&str> = Vec::new();
        for token in alias.params() {
            let Some(name) = token.param_name() else {
                continue;
            };
            if !names.iter().any(|n| n == name) {
                return Err(ParseError::new(
                    &self.file,
                    token.range,
                    ErrorCode::MALFORMED_ALIAS,
                    format!("alias refers to unknown parameter '{name}'"),
                ));
            }
            if seen.contains(&name) {
                return Err(ParseError::new(
                    &self.file,
                    token.range,
                    ErrorCode::MALFORMED_ALIAS,
                    format!("parameter '{name}' appears twice in alias"),
                ));
            }
            seen.push(name);
        }
        if require_all && let Some(missing) = names.iter().find(|n| !seen.contains(&n.as_str())) {
            return Err(ParseError::new(
                &self.file,
                alias.range,
                ErrorCode::MALFORMED_ALIAS,
                format!("alias does not mention parameter '{missing}'"),
            ));
        }
        Ok(alias)
    }

    fn struct_decl(&mut self, first: &Token, is_public: bool) -> PResult<Stmt> {
        self.advance();
        let name = self.expect(TokenKind::Ident, "a struct name")?;
        self.expect(TokenKind::LBrace, "'{'")?;
        let mut fields: Vec<VarDeclStmt> = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.check(TokenKind::Eof) {
            let field_first = self.peek().clone();
            let field_public = self.eat(TokenKind::Public).is_some();
            let field = self.expect(TokenKind::Ident, "a field name")?;
            self.expect(TokenKind::Colon, "':'")?;
            let ty = self.parse_type()?;
            let init = if self.eat(TokenKind::Assign).is_some() {
                Some(self.expression()?)
            } else {
                None
            };
            if fields.iter().any(|f| f.decl.name == field.literal) {
                self.error_at(
                    field.range,
                    ErrorCode::ALREADY_DECLARED,
                    format!("field '{}' is declared twice", field.literal),
                );
            }
            let range = Range::cover(field_first.range, self.prev_range());
            let decl = Arc::new(self.new_decl(
                &field,
                range,
                field_public,
                field_first.comment.clone(),
                DeclKind::Field { ty },
            ));
            fields.push(VarDeclStmt { decl, init, range });
            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
        }
        self.expect(TokenKind::RBrace, "'}'")?;
        let names: Vec<String> = fields.iter().map(|f| f.decl.name.clone()).collect();
        let aliases = self.alias_clause(&names, false)?;
        self.eat(TokenKind::Semicolon);

        let range = Range::cover(first.range, self.prev_range());
        let decl = Arc::new(self.new_decl(
            &name,
            range,
            is_public,
            first.comment.clone(),
            DeclKind::Struct(StructSig {
                fields: fields.iter().map(|f| Arc::clone(&f.decl)).collect(),
                aliases,
            }),
        ));
        self.declare(&decl);
        Ok(Stmt::Struct(StructDeclStmt {
            decl,
            fields,
            range,
        }))
    }

    fn type_alias(&mut self, first: &Token, is_public: bool) -> PResult<Stmt> {
        self.advance();
        let name = self.expect(TokenKind::Ident, "a type name")?;
        self.expect(TokenKind::Assign, "'='")?;
        let underlying = self.parse_type()?;
        let semi = self.expect(TokenKind::Semicolon, "';'")?;
        let range = Range::cover(first.range, semi.range);
        let decl = Arc::new(self.new_decl(
            &name,
            range,
            is_public,
            first.comment.clone(),
            DeclKind::TypeAlias { underlying },
        ));
        self.declare(&decl);
        Ok(Stmt::TypeAlias(TypeAliasStmt { decl, range }))
    }

    pub(super) fn parse_type(&mut self) -> PResult<TypeRef> {
        if let Some(list) = self.eat(TokenKind::List) {
            self.expect(TokenKind::Of, "'of'")?;
            let inner = self.parse_type()?;
            return Ok(TypeRef {
                display: format!("list of {}", inner.display),
                range: Range::cover(list.range, inner.range),
                name_range: inner.name_range,
                decl: inner.decl,
            });
        }
        let name = self.expect(TokenKind::Ident, "a type")?;
        let decl = if BUILTIN_TYPES.contains(&name.literal.as_str())
            || self.generics.contains(&name.literal)
        {
            None
        } else {
            match self.scopes.lookup(self.scope, &name.literal) {
                Some(decl) if decl.is_type() => Some(Arc::clone(decl)),
                _ => {
                    self.error_at(
                        name.range,
                        ErrorCode::UNKNOWN_TYPE,
                        format!("unknown type '{}'", name.literal),
                    );
                    None
                }
            }
        };
        Ok(TypeRef {
            display: name.literal,
            range: name.range,
            name_range: name.range,
            decl,
        })
    }

    /// Parses `{ ... }` in a new scope holding `params`.
    fn block(&mut self, params: Vec<Arc<Decl>>) -> PResult<Block> {
        let open = self.expect(TokenKind::LBrace, "'{'")?;
        let scope = self.scopes.push(Some(self.scope), open.range);
        for param in params {
            // duplicates were reported with the signature
            let _ = self.scopes.declare(scope, param);
        }
        let outer = std::mem::replace(&mut self.scope, scope);

        let mut stmts = Vec::new();
        let mut returned = false;
        let mut warned = false;
        while !self.check(TokenKind::RBrace) && !self.check(TokenKind::Eof) {
            let stmt = self.statement(false);
            if returned && !warned {
                let warning = ParseError::warning(
                    &self.file,
                    stmt.range(),
                    ErrorCode::UNREACHABLE_CODE,
                    "unreachable code",
                );
                self.error(warning);
                warned = true;
            }
            returned |= matches!(stmt, Stmt::Return(_));
            stmts.push(stmt);
        }
        let close = match self.eat(TokenKind::RBrace) {
            Some(token) => token.range,
            None => {
                let error = self.unexpected("'}'");
                self.error(error);
                self.prev_range()
            }
        };

        self.scope = outer;
        let range = Range::cover(open.range, close);
        self.scopes.set_range(scope, range);
        Ok(Block {
            stmts,
            scope,
            range,
        })
    }

    fn if_stmt(&mut self) -> PResult<IfStmt> {
        let first = self.advance();
        let cond = self.expression()?;
        let then = self.block(Vec::new())?;
        let otherwise = if self.eat(TokenKind::Else).is_some() {
            let stmt = if self.check(TokenKind::If) {
                Stmt::If(self.if_stmt()?)
            } else {
                Stmt::Block(self.block(Vec::new())?)
            };
            Some(Box::new(stmt))
        } else {
            None
        };
        Ok(IfStmt {
            cond,
            then,
            otherwise,
            range: Range::cover(first.range, self.prev_range()),
        })
    }

    fn while_stmt(&mut self) -> PResult<Stmt> {
        let first = self.advance();
        let cond = self.expression()?;
        let body = self.block(Vec::new())?;
        Ok(Stmt::While(WhileStmt {
            cond,
            body,
            range: Range::cover(first.range, self.prev_range()),
        }))
    }

    fn return_stmt(&mut self) -> PResult<Stmt> {
        let first = self.advance();
        if self.function_depth == 0 {
            self.error_at(
                first.range,
                ErrorCode::RETURN_OUTSIDE_FUNCTION,
                "return outside of a function",
            );
        }
        let value = if self.check(TokenKind::Semicolon) {
            None
        } else {
            Some(self.expression()?)
        };
        let semi = self.expect(TokenKind::Semicolon, "';'")?;
        Ok(Stmt::Return(ReturnStmt {
            value,
            range: Range::cover(first.range, semi.range),
        }))
    }

    fn assign_stmt(&mut self) -> PResult<Stmt> {
        let name = self.advance();
        self.advance();
        let value = self.expression()?;
        let semi = self.expect(TokenKind::Semicolon, "';'")?;
        let range = Range::cover(name.range, semi.range);

        let (code, message) = match self.scopes.lookup(self.scope, &name.literal) {
            Some(decl) if decl.is_value() => {
                let decl = Arc::clone(decl);
                return Ok(Stmt::Assign(AssignStmt {
                    target: IdentExpr {
                        name: name.literal,
                        range: name.range,
                        decl,
                    },
                    value,
                    range,
                }));
            }
            Some(decl) => (
                ErrorCode::NOT_A_VARIABLE,
                format!("cannot assign to {} '{}'", decl.kind_name(), name.literal),
            ),
            None => (
                ErrorCode::UNDECLARED_NAME,
                format!("name '{}' was not declared", name.literal),
            ),
        };
        let error = ParseError::new(&self.file, name.range, code, message);
        self.error(error.clone());
        Ok(Stmt::Bad(BadStmt { error, range }))
    }
}


