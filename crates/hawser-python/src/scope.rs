//! Scope tree and name tables.
//!
//! Each module has one [`ScopeTree`] mirroring its AST: the root scope is
//! the module, nested scopes appear in source order, and line ranges nest
//! without overlap. Lookup walks outward skipping class scopes, matching
//! closure semantics: a class body's locals are class attributes, not
//! enclosing-function locals.

use std::collections::{HashMap, HashSet};

use crate::names::PyName;
use crate::objects::DefId;

/// Scope index within one module's tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub u32);

impl std::fmt::Display for ScopeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "scope_{}", self.0)
    }
}

/// Kind of scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    Module,
    Class,
    Function,
}

/// A scope with its name table.
#[derive(Debug, Clone)]
pub struct Scope {
    pub id: ScopeId,
    pub kind: ScopeKind,
    /// Class or function name; `None` for the module scope.
    pub name: Option<String>,
    pub parent: Option<ScopeId>,
    pub children: Vec<ScopeId>,
    pub start_line: u32,
    pub end_line: u32,
    pub names: HashMap<String, PyName>,
    /// Names rerouted to module scope by a `global` declaration.
    pub globals: HashSet<String>,
    /// The class/function entity whose body this scope is.
    pub def: Option<DefId>,
}

impl Scope {
    fn new(id: ScopeId, kind: ScopeKind, name: Option<String>, parent: Option<ScopeId>) -> Self {
        Scope {
            id,
            kind,
            name,
            parent,
            children: Vec::new(),
            start_line: 1,
            end_line: 1,
            names: HashMap::new(),
            globals: HashSet::new(),
            def: None,
        }
    }
}

/// The scope tree of one module; index 0 is always the module scope.
#[derive(Debug, Clone)]
pub struct ScopeTree {
    scopes: Vec<Scope>,
}

impl Default for ScopeTree {
    fn default() -> Self {
        ScopeTree::new()
    }
}

impl ScopeTree {
    /// A tree holding just the module scope.
    pub fn new() -> Self {
        ScopeTree {
            scopes: vec![Scope::new(ScopeId(0), ScopeKind::Module, None, None)],
        }
    }

    /// The module (root) scope id.
    pub fn module_scope(&self) -> ScopeId {
        ScopeId(0)
    }

    pub fn get(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id.0 as usize]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Scope> {
        self.scopes.iter()
    }

    /// Create a child scope under `parent`.
    pub fn add_child(&mut self, parent: ScopeId, kind: ScopeKind, name: Option<String>) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope::new(id, kind, name, Some(parent)));
        self.get_mut(parent).children.push(id);
        id
    }

    /// The narrowest scope whose line range contains `lineno`.
    ///
    /// A child's header line belongs to the child, so a name in a `def`
    /// header resolves against the defining scope's conventions handled by
    /// the caller.
    pub fn inner_scope_for_line(&self, lineno: u32) -> ScopeId {
        let mut current = self.module_scope();
        loop {
            let scope = self.get(current);
            let child = scope.children.iter().copied().find(|&c| {
                let child = self.get(c);
                child.start_line <= lineno && lineno <= child.end_line
            });
            match child {
                Some(c) => current = c,
                None => return current,
            }
        }
    }

    /// Resolve `name` starting at `scope`: local names first, then parent
    /// scopes skipping classes, ending at module globals. A `global`
    /// declaration reroutes straight to the module scope.
    ///
    /// Star imports are consulted by the caller after this returns `None`;
    /// they are expanded lazily at attribute lookup, not here.
    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<(ScopeId, &PyName)> {
        let mut current = Some(scope);
        let mut first = true;
        while let Some(id) = current {
            let s = self.get(id);
            if s.globals.contains(name) {
                let module = self.get(self.module_scope());
                return module
                    .names
                    .get(name)
                    .map(|n| (self.module_scope(), n));
            }
            // Class scopes only see their own names from their own body.
            let visible = first || s.kind != ScopeKind::Class;
            if visible {
                if let Some(n) = s.names.get(name) {
                    return Some((id, n));
                }
            }
            current = s.parent;
            first = false;
        }
        None
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::names::{Assignment, PyName};
    use hawser_ast::nodes::{Expr, ExprKind, Number, Span};

    fn assigned(lineno: u32) -> PyName {
        PyName::Assigned {
            assignments: vec![Assignment::plain(
                Expr {
                    kind: ExprKind::Num(Number::Int),
                    span: Span::new(0, 1),
                    lineno,
                },
                lineno,
            )],
            lineno,
        }
    }

    #[test]
    fn lookup_walks_to_module_scope() {
        let mut tree = ScopeTree::new();
        tree.get_mut(ScopeId(0)).names.insert("g".into(), assigned(1));
        let func = tree.add_child(ScopeId(0), ScopeKind::Function, Some("f".into()));
        let (owner, _) = tree.lookup(func, "g").unwrap();
        assert_eq!(owner, ScopeId(0));
    }

    #[test]
    fn class_scope_is_skipped_in_closure_lookup() {
        let mut tree = ScopeTree::new();
        let class = tree.add_child(ScopeId(0), ScopeKind::Class, Some("C".into()));
        tree.get_mut(class).names.insert("attr".into(), assigned(2));
        let method = tree.add_child(class, ScopeKind::Function, Some("m".into()));
        // A method body does not see class attributes as free names.
        assert!(tree.lookup(method, "attr").is_none());
        // The class body itself does.
        assert!(tree.lookup(class, "attr").is_some());
    }

    #[test]
    fn global_declaration_reroutes() {
        let mut tree = ScopeTree::new();
        tree.get_mut(ScopeId(0)).names.insert("x".into(), assigned(1));
        let func = tree.add_child(ScopeId(0), ScopeKind::Function, Some("f".into()));
        tree.get_mut(func).names.insert("x".into(), assigned(3));
        tree.get_mut(func).globals.insert("x".into());
        let (owner, _) = tree.lookup(func, "x").unwrap();
        assert_eq!(owner, ScopeId(0));
    }

    #[test]
    fn inner_scope_for_line_descends() {
        let mut tree = ScopeTree::new();
        tree.get_mut(ScopeId(0)).end_line = 10;
        let func = tree.add_child(ScopeId(0), ScopeKind::Function, Some("f".into()));
        tree.get_mut(func).start_line = 2;
        tree.get_mut(func).end_line = 5;
        assert_eq!(tree.inner_scope_for_line(1), ScopeId(0));
        assert_eq!(tree.inner_scope_for_line(3), func);
        assert_eq!(tree.inner_scope_for_line(7), ScopeId(0));
    }
}
