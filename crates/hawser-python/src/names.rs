//! Name bindings: the tagged sum recorded in scope name tables.
//!
//! A [`PyName`] pairs an identifier's provenance with the data inference
//! needs to produce its entity. The variants form a tagged sum with a
//! single resolution path (see `inference`); they are never modelled as a
//! trait hierarchy. `Unbound` is the local degradation of failed
//! resolution and must not propagate beyond its scope.

use hawser_ast::nodes::{Expr, Span};

use crate::objects::{DefId, ModuleId};
use crate::scope::ScopeId;

// ============================================================================
// Module References
// ============================================================================

/// An unresolved reference to another module, as written in an import.
///
/// `level` counts leading dots of a relative import; resolution happens
/// lazily against the importing module's folder so that import cycles and
/// missing modules degrade instead of failing scope construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleRef {
    pub name: String,
    pub level: u32,
}

impl ModuleRef {
    pub fn absolute(name: impl Into<String>) -> Self {
        ModuleRef {
            name: name.into(),
            level: 0,
        }
    }
}

// ============================================================================
// Assignments
// ============================================================================

/// How an assignment site produces its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignKind {
    /// `x = EXPR`: the expression itself is the value.
    Plain,
    /// `for x in EXPR`: the element type of the iterable is the value.
    Iter,
    /// `with EXPR as x`: the context-manager enter result is the value.
    Enter,
    /// `except EXPR as x`: an instance of the handler type is the value.
    ExceptAs,
}

/// One recorded assignment site.
///
/// `path` destructures tuple targets: `a, (b, c) = rhs` records `b` with
/// path `[1, 0]`, selecting positional elements of the inferred RHS.
#[derive(Debug, Clone)]
pub struct Assignment {
    pub expr: Expr,
    pub path: Vec<usize>,
    pub kind: AssignKind,
    pub lineno: u32,
}

impl Assignment {
    pub fn plain(expr: Expr, lineno: u32) -> Self {
        Assignment {
            expr,
            path: Vec::new(),
            kind: AssignKind::Plain,
            lineno,
        }
    }
}

// ============================================================================
// PyName
// ============================================================================

/// A binding in a scope's name table.
#[derive(Debug, Clone)]
pub enum PyName {
    /// Accumulates every assignment site; the inferred type is the merge
    /// of all of them.
    Assigned {
        assignments: Vec<Assignment>,
        lineno: u32,
    },
    /// A class or function definition.
    Defined(DefId),
    /// `from M import original` (possibly aliased).
    Imported {
        module: ModuleRef,
        original: String,
        lineno: u32,
    },
    /// `import M` or the module position of a from-import.
    ImportedModule { module: ModuleRef, lineno: u32 },
    /// The `index`-th parameter of a function.
    Parameter {
        def: DefId,
        index: usize,
        span: Span,
        lineno: u32,
    },
    /// Referenced but unresolved.
    Unbound,
}

impl PyName {
    /// The line this name was bound on, when known.
    pub fn lineno(&self) -> Option<u32> {
        match self {
            PyName::Assigned { lineno, .. }
            | PyName::Imported { lineno, .. }
            | PyName::ImportedModule { lineno, .. }
            | PyName::Parameter { lineno, .. } => Some(*lineno),
            PyName::Defined(_) | PyName::Unbound => None,
        }
    }

    /// Push an assignment site, converting other variants into an
    /// assigned name when a later statement rebinds them.
    pub fn push_assignment(&mut self, assignment: Assignment) {
        match self {
            PyName::Assigned { assignments, .. } => assignments.push(assignment),
            _ => {
                let lineno = assignment.lineno;
                *self = PyName::Assigned {
                    assignments: vec![assignment],
                    lineno,
                };
            }
        }
    }
}

// ============================================================================
// Binding Identity
// ============================================================================

/// Who owns a binding: a scope's name table or a class's
/// instance-attribute table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingOwner {
    Scope(ScopeId),
    Instance(DefId),
}

/// Stable identity of a binding: every name is owned by exactly one owner
/// in one module. Occurrence finding compares these.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BindingKey {
    pub module: ModuleId,
    pub owner: BindingOwner,
    pub name: String,
}

impl BindingKey {
    pub fn new(module: ModuleId, owner: BindingOwner, name: impl Into<String>) -> Self {
        BindingKey {
            module,
            owner,
            name: name.into(),
        }
    }
}

/// What an offset resolves to for identity comparison: a binding, or a
/// whole module (import statements name modules, not bindings).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TargetIdent {
    Binding(BindingKey),
    Module(ModuleId),
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use hawser_ast::nodes::{ExprKind, Number};

    fn int_expr() -> Expr {
        Expr {
            kind: ExprKind::Num(Number::Int),
            span: Span::new(0, 1),
            lineno: 1,
        }
    }

    #[test]
    fn push_assignment_accumulates() {
        let mut name = PyName::Assigned {
            assignments: vec![Assignment::plain(int_expr(), 1)],
            lineno: 1,
        };
        name.push_assignment(Assignment::plain(int_expr(), 3));
        let PyName::Assigned { assignments, .. } = name else {
            panic!("expected assigned");
        };
        assert_eq!(assignments.len(), 2);
    }

    #[test]
    fn rebinding_an_import_becomes_assigned() {
        let mut name = PyName::Imported {
            module: ModuleRef::absolute("m"),
            original: "x".into(),
            lineno: 1,
        };
        name.push_assignment(Assignment::plain(int_expr(), 2));
        assert!(matches!(name, PyName::Assigned { .. }));
    }
}
