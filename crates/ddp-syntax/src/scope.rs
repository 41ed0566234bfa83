//! Symbol tables.
//!
//! Scopes live in an arena owned by their module and point at their
//! enclosing scope by id. Visitors that resolve names keep a current
//! [`ScopeId`] and swap it when entering and leaving blocks.

use crate::decl::Decl;
use crate::position::{Position, Range};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(u32);

#[derive(Debug)]
pub struct Scope {
    pub enclosing: Option<ScopeId>,
    pub range: Range,
    decls: HashMap<String, Arc<Decl>>,
    order: Vec<String>,
}

impl Scope {
    pub fn get(&self, name: &str) -> Option<&Arc<Decl>> {
        self.decls.get(name)
    }

    /// Declarations in the order they were added.
    pub fn decls(&self) -> impl Iterator<Item = &Arc<Decl>> {
        self.order.iter().filter_map(|name| self.decls.get(name))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct Scopes {
    scopes: Vec<Scope>,
}

impl Scopes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, enclosing: Option<ScopeId>, range: Range) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope {
            enclosing,
            range,
            decls: HashMap::new(),
            order: Vec::new(),
        });
        id
    }

    pub fn get(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0 as usize]
    }

    pub fn set_range(&mut self, id: ScopeId, range: Range) {
        self.scopes[id.0 as usize].range = range;
    }

    /// Adds `decl` to the scope. Returns the previous declaration if the
    /// name is already taken in this scope; the scope is left unchanged then.
    pub fn declare(&mut self, id: ScopeId, decl: Arc<Decl>) -> Result<(), Arc<Decl>> {
        let scope = &mut self.scopes[id.0 as usize];
        if let Some(existing) = scope.decls.get(&decl.name) {
            return Err(Arc::clone(existing));
        }
        scope.order.push(decl.name.clone());
        scope.decls.insert(decl.name.clone(), decl);
        Ok(())
    }

    /// Looks `name` up in `id` and its enclosing scopes.
    pub fn lookup(&self, id: ScopeId, name: &str) -> Option<&Arc<Decl>> {
        self.chain(id).find_map(|scope| scope.get(name))
    }

    /// `id` followed by all of its enclosing scopes.
    pub fn chain(&self, id: ScopeId) -> impl Iterator<Item = &Scope> {
        let mut next = Some(id);
        std::iter::from_fn(move || {
            let scope = self.get(next?);
            next = scope.enclosing;
            Some(scope)
        })
    }

    /// Innermost scope whose range contains `pos`, starting from `root`.
    pub fn innermost_at(&self, root: ScopeId, pos: Position) -> ScopeId {
        let mut best = root;
        let mut best_range: Option<Range> = None;
        for (idx, scope) in self.scopes.iter().enumerate() {
            let id = ScopeId(idx as u32);
            if id == root || !scope.range.contains(pos) {
                continue;
            }
            if best_range.is_none_or(|r| r.encloses(&scope.range)) {
                best = id;
                best_range = Some(scope.range);
            }
        }
        best
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decl::{DeclKind, TypeRef};
    use crate::module::ModuleId;
    use std::path::PathBuf;

    fn var(name: &str) -> Arc<Decl> {
        Arc::new(Decl {
            name: name.into(),
            name_range: Range::default(),
            range: Range::default(),
            module: ModuleId::next(),
            module_path: PathBuf::from("s.ddp"),
            is_public: false,
            comment: None,
            kind: DeclKind::Var {
                ty: TypeRef {
                    display: "int".into(),
                    range: Range::default(),
                    name_range: Range::default(),
                    decl: None,
                },
            },
        })
    }

    fn lines(start: u32, end: u32) -> Range {
        Range::new(Position::new(start, 1), Position::new(end, 1))
    }

    #[test]
    fn test_lookup_walks_enclosing_scopes() {
        let mut scopes = Scopes::new();
        let root = scopes.push(None, lines(1, 100));
        let inner = scopes.push(Some(root), lines(2, 5));
        scopes.declare(root, var("x")).unwrap();
        scopes.declare(inner, var("y")).unwrap();

        assert!(scopes.lookup(inner, "x").is_some());
        assert!(scopes.lookup(inner, "y").is_some());
        assert!(scopes.lookup(root, "y").is_none());
        assert_eq!(scopes.chain(inner).count(), 2);
    }

    #[test]
    fn test_redeclaration_is_rejected() {
        let mut scopes = Scopes::new();
        let root = scopes.push(None, lines(1, 10));
        let first = var("x");
        scopes.declare(root, Arc::clone(&first)).unwrap();
        let existing = scopes.declare(root, var("x")).unwrap_err();
        assert!(Arc::ptr_eq(&existing, &first));
        assert_eq!(scopes.get(root).len(), 1);
    }

    #[test]
    fn test_shadowing_in_inner_scope() {
        let mut scopes = Scopes::new();
        let root = scopes.push(None, lines(1, 10));
        let inner = scopes.push(Some(root), lines(2, 4));
        let outer_x = var("x");
        let inner_x = var("x");
        scopes.declare(root, Arc::clone(&outer_x)).unwrap();
        scopes.declare(inner, Arc::clone(&inner_x)).unwrap();
        assert!(Arc::ptr_eq(scopes.lookup(inner, "x").unwrap(), &inner_x));
        assert!(Arc::ptr_eq(scopes.lookup(root, "x").unwrap(), &outer_x));
    }

    #[test]
    fn test_innermost_at() {
        let mut scopes = Scopes::new();
        let root = scopes.push(None, lines(1, 20));
        let outer = scopes.push(Some(root), lines(2, 10));
        let inner = scopes.push(Some(outer), lines(4, 6));
        let sibling = scopes.push(Some(root), lines(12, 15));

        assert_eq!(scopes.innermost_at(root, Position::new(5, 3)), inner);
        assert_eq!(scopes.innermost_at(root, Position::new(8, 1)), outer);
        assert_eq!(scopes.innermost_at(root, Position::new(13, 1)), sibling);
        assert_eq!(scopes.innermost_at(root, Position::new(18, 1)), root);
    }

    #[test]
    fn test_decls_keep_declaration_order() {
        let mut scopes = Scopes::new();
        let root = scopes.push(None, lines(1, 2));
        for name in ["c", "a", "b"] {
            scopes.declare(root, var(name)).unwrap();
        }
        let names: Vec<_> = scopes.get(root).decls().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["c", "a", "b"]);
    }
}
