//! Declarations and their signatures.
//!
//! A declaration is shared as `Arc<Decl>` between the statement that
//! introduced it, the scope it lives in and every expression referring to
//! it. Identity is pointer identity, see [`same_decl`].

use crate::module::ModuleId;
use crate::position::Range;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug)]
pub struct Decl {
    pub name: String,
    pub name_range: Range,
    /// Range of the whole declaration.
    pub range: Range,
    pub module: ModuleId,
    pub module_path: PathBuf,
    pub is_public: bool,
    pub comment: Option<String>,
    pub kind: DeclKind,
}

#[derive(Debug)]
pub enum DeclKind {
    Var { ty: TypeRef },
    Param { ty: TypeRef },
    Field { ty: TypeRef },
    Func(FuncSig),
    Struct(StructSig),
    TypeAlias { underlying: TypeRef },
}

/// Reference to a type in a signature.
#[derive(Debug, Clone)]
pub struct TypeRef {
    /// Display form, e.g. `list of int`.
    pub display: String,
    pub range: Range,
    /// Range of the named part (`Point` in `list of Point`).
    pub name_range: Range,
    /// User-defined type this refers to. `None` for built-in and generic types.
    pub decl: Option<Arc<Decl>>,
}

#[derive(Debug)]
pub struct FuncSig {
    pub params: Vec<Arc<Decl>>,
    pub return_type: Option<TypeRef>,
    pub aliases: Vec<Alias>,
    pub generic_params: Vec<String>,
    /// Set on generic instantiations; points at the declared template.
    pub template: Option<Arc<Decl>>,
    pub is_extern: bool,
}

#[derive(Debug)]
pub struct StructSig {
    pub fields: Vec<Arc<Decl>>,
    pub aliases: Vec<Alias>,
}

/// An alternate call syntax such as `"add <a> and <b>"`.
#[derive(Debug, Clone)]
pub struct Alias {
    /// Alias text without quotes.
    pub text: String,
    /// Range of the string literal including quotes.
    pub range: Range,
    pub tokens: Vec<AliasToken>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AliasTokenKind {
    Word,
    Param,
}

#[derive(Debug, Clone)]
pub struct AliasToken {
    pub kind: AliasTokenKind,
    /// Token text. Parameter slots keep their delimiters, e.g. `<a>`.
    pub literal: String,
    pub range: Range,
}

impl AliasToken {
    /// Name of a parameter slot without delimiters.
    pub fn param_name(&self) -> Option<&str> {
        if self.kind != AliasTokenKind::Param {
            return None;
        }
        self.literal.strip_prefix('<')?.strip_suffix('>')
    }

    /// Range of the name inside a parameter slot, excluding `<` and `>`.
    pub fn name_range(&self) -> Range {
        let mut range = self.range;
        if self.kind == AliasTokenKind::Param {
            range.start.column += 1;
            range.end.column = range.end.column.saturating_sub(1);
        }
        range
    }
}

impl Alias {
    pub fn params(&self) -> impl Iterator<Item = &AliasToken> {
        self.tokens
            .iter()
            .filter(|t| t.kind == AliasTokenKind::Param)
    }

    pub fn words(&self) -> impl Iterator<Item = &AliasToken> {
        self.tokens.iter().filter(|t| t.kind == AliasTokenKind::Word)
    }
}

impl Decl {
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            DeclKind::Var { .. } => "variable",
            DeclKind::Param { .. } => "parameter",
            DeclKind::Field { .. } => "field",
            DeclKind::Func(_) => "function",
            DeclKind::Struct(_) => "struct",
            DeclKind::TypeAlias { .. } => "type",
        }
    }

    /// Type of a variable, parameter or field.
    pub fn value_type(&self) -> Option<&TypeRef> {
        match &self.kind {
            DeclKind::Var { ty } | DeclKind::Param { ty } | DeclKind::Field { ty } => Some(ty),
            _ => None,
        }
    }

    pub fn func(&self) -> Option<&FuncSig> {
        match &self.kind {
            DeclKind::Func(sig) => Some(sig),
            _ => None,
        }
    }

    pub fn structure(&self) -> Option<&StructSig> {
        match &self.kind {
            DeclKind::Struct(sig) => Some(sig),
            _ => None,
        }
    }

    pub fn aliases(&self) -> &[Alias] {
        match &self.kind {
            DeclKind::Func(sig) => &sig.aliases,
            DeclKind::Struct(sig) => &sig.aliases,
            _ => &[],
        }
    }

    pub fn is_value(&self) -> bool {
        matches!(
            self.kind,
            DeclKind::Var { .. } | DeclKind::Param { .. } | DeclKind::Field { .. }
        )
    }

    pub fn is_type(&self) -> bool {
        matches!(self.kind, DeclKind::Struct(_) | DeclKind::TypeAlias { .. })
    }

    /// The generic template for an instantiation, otherwise `None`.
    pub fn template(&self) -> Option<&Arc<Decl>> {
        self.func().and_then(|sig| sig.template.as_ref())
    }

    pub fn is_generic(&self) -> bool {
        self.func().is_some_and(|sig| !sig.generic_params.is_empty())
    }

    /// Short signature used in hover text.
    pub fn signature(&self) -> String {
        let public = if self.is_public { "public " } else { "" };
        match &self.kind {
            DeclKind::Var { ty } => format!("{public}var {}: {}", self.name, ty.display),
            DeclKind::Param { ty } => format!("(parameter) {}: {}", self.name, ty.display),
            DeclKind::Field { ty } => format!("(field) {}: {}", self.name, ty.display),
            DeclKind::Func(sig) => {
                let generics = if sig.generic_params.is_empty() {
                    String::new()
                } else {
                    format!("<{}>", sig.generic_params.join(", "))
                };
                let params = sig
                    .params
                    .iter()
                    .map(|p| {
                        let ty = p.value_type().map_or("?", |t| t.display.as_str());
                        format!("{}: {}", p.name, ty)
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                let ret = sig
                    .return_type
                    .as_ref()
                    .map(|t| format!(": {}", t.display))
                    .unwrap_or_default();
                format!("{public}func {}{generics}({params}){ret}", self.name)
            }
            DeclKind::Struct(sig) => {
                let fields = sig
                    .fields
                    .iter()
                    .map(|f| {
                        let ty = f.value_type().map_or("?", |t| t.display.as_str());
                        format!("{}: {}", f.name, ty)
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{public}struct {} {{ {fields} }}", self.name)
            }
            DeclKind::TypeAlias { underlying } => {
                format!("{public}type {} = {}", self.name, underlying.display)
            }
        }
    }
}

/// Declaration identity.
pub fn same_decl(a: &Arc<Decl>, b: &Arc<Decl>) -> bool {
    Arc::ptr_eq(a, b)
}

/// Follows a generic instantiation back to its template.
pub fn origin(decl: &Arc<Decl>) -> &Arc<Decl> {
    decl.template().unwrap_or(decl)
}
