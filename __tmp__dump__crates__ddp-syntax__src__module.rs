use crate::ast::{ImportStmt, Stmt};
use crate::decl::Decl;
use crate::error::ParseError;
use crate::scope::{ScopeId, Scopes};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_MODULE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a parsed module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(u64);

impl ModuleId {
    pub fn next() -> Self {
        Self(NEXT_MODULE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// The parsed and scoped representation of one source file.
///
/// Modules are immutable once produced. Every parse creates a new module
/// with a fresh [`ModuleId`].
#[derive(Debug)]
pub struct Module {
    pub id: ModuleId,
    pub file_name: PathBuf,
    pub statements: Vec<Stmt>,
    pub scopes: Scopes,
    pub root_scope: ScopeId,
    pub public_decls: BTreeMap<String, Arc<Decl>>,
    /// Every error reported while producing this module, including the
    /// errors of modules it imports.
    pub errors: Vec<ParseError>,
}

impl Module {
    /// Top-level import statements.
    pub fn imports(&self) -> impl Iterator<Item = &ImportStmt> {
        self.statements.iter().filter_map(|stmt| match stmt {
            Stmt::Import(import) => Some(import),
            _ => None,
        })
    }

    /// Declarations of the root scope in declaration order.
    pub fn root_decls(&self) -> impl Iterator<Item = &Arc<Decl>> {
        self.scopes.get(self.root_scope).decls()
    }

    /// Whether `path` is this module or is reached through its imports.
    pub fn reaches(&self, path: &Path) -> bool {
        let mut seen = HashSet::new();
        self.reaches_inner(path, &mut seen)
    }

    fn reaches_inner(&self, path: &Path, seen: &mut HashSet<ModuleId>) -> bool {
        if !seen.insert(self.id) {
            return false;
        }
        if self.file_name == path {
            return true;
        }
        self.imports().any(|import| {
            import
                .module
                .as_ref()
                .is_some_and(|m| m.reaches_inner(path, seen))
        })
    }

    /// Finds the module for `path` among this module and its imports.
    pub fn find_imported(&self, path: &Path) -> Option<Arc<Self>> {
        let mut seen = HashSet::new();
        let mut stack: Vec<Arc<Self>> = self.imports().filter_map(|i| i.module.clone()).collect();
        while let Some(module) = stack.pop() {
            if !seen.insert(module.id) {
                continue;
            }
            if module.file_name == path {
                return Some(module);
            }
            stack.extend(module.imports().filter_map(|i| i.module.clone()));
        }
        None
    }

    /// Directory imports are resolved against.
    pub fn directory(&self) -> &Path {
        self.file_name.parent().unwrap_or_else(|| Path::new(""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_ids_are_unique() {
        let a = ModuleId::next();
        let b = ModuleId::next();
        assert_ne!(a, b);
        assert!(b > a);
    }
}


