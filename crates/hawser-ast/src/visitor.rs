//! Visitor dispatch and structural iteration over the AST.
//!
//! [`Visitor`] has one overridable method per node family with default
//! implementations that recurse into structural children via [`walk_stmt`]
//! and [`walk_expr`]. [`call_for_stmts`] is the early-exit variant: the
//! callback can report a subtree as handled to stop descent there.

use crate::nodes::{Expr, ExprKind, Stmt, StmtKind};

/// Visitor over statements and expressions.
///
/// Override the methods you care about; defaults recurse structurally.
pub trait Visitor: Sized {
    fn visit_stmt(&mut self, stmt: &Stmt) {
        walk_stmt(self, stmt);
    }

    fn visit_expr(&mut self, expr: &Expr) {
        walk_expr(self, expr);
    }
}

/// Recurse into the structural children of `stmt`.
pub fn walk_stmt<V: Visitor>(visitor: &mut V, stmt: &Stmt) {
    match &stmt.kind {
        StmtKind::Expr(e) => visitor.visit_expr(e),
        StmtKind::Assign { targets, value } => {
            for target in targets {
                visitor.visit_expr(target);
            }
            visitor.visit_expr(value);
        }
        StmtKind::AugAssign { target, value, .. } => {
            visitor.visit_expr(target);
            visitor.visit_expr(value);
        }
        StmtKind::ClassDef {
            bases,
            decorators,
            body,
            ..
        } => {
            for deco in decorators {
                visitor.visit_expr(deco);
            }
            for base in bases {
                visitor.visit_expr(base);
            }
            for child in body {
                visitor.visit_stmt(child);
            }
        }
        StmtKind::FunctionDef {
            params,
            decorators,
            body,
            ..
        } => {
            for deco in decorators {
                visitor.visit_expr(deco);
            }
            for param in &params.args {
                if let Some(default) = &param.default {
                    visitor.visit_expr(default);
                }
            }
            for child in body {
                visitor.visit_stmt(child);
            }
        }
        StmtKind::Return { value } => {
            if let Some(value) = value {
                visitor.visit_expr(value);
            }
        }
        StmtKind::If { test, body, orelse } | StmtKind::While { test, body, orelse } => {
            visitor.visit_expr(test);
            for child in body {
                visitor.visit_stmt(child);
            }
            for child in orelse {
                visitor.visit_stmt(child);
            }
        }
        StmtKind::For {
            target,
            iter,
            body,
            orelse,
        } => {
            visitor.visit_expr(target);
            visitor.visit_expr(iter);
            for child in body {
                visitor.visit_stmt(child);
            }
            for child in orelse {
                visitor.visit_stmt(child);
            }
        }
        StmtKind::With {
            context,
            target,
            body,
        } => {
            visitor.visit_expr(context);
            if let Some(target) = target {
                visitor.visit_expr(target);
            }
            for child in body {
                visitor.visit_stmt(child);
            }
        }
        StmtKind::Try {
            body,
            handlers,
            orelse,
            finalbody,
        } => {
            for child in body {
                visitor.visit_stmt(child);
            }
            for handler in handlers {
                if let Some(typ) = &handler.typ {
                    visitor.visit_expr(typ);
                }
                for child in &handler.body {
                    visitor.visit_stmt(child);
                }
            }
            for child in orelse {
                visitor.visit_stmt(child);
            }
            for child in finalbody {
                visitor.visit_stmt(child);
            }
        }
        StmtKind::Raise { exc } => {
            if let Some(exc) = exc {
                visitor.visit_expr(exc);
            }
        }
        StmtKind::Delete { targets } => {
            for target in targets {
                visitor.visit_expr(target);
            }
        }
        StmtKind::Import { .. }
        | StmtKind::ImportFrom { .. }
        | StmtKind::Global { .. }
        | StmtKind::Pass
        | StmtKind::Break
        | StmtKind::Continue => {}
    }
}

/// Recurse into the structural children of `expr`.
pub fn walk_expr<V: Visitor>(visitor: &mut V, expr: &Expr) {
    match &expr.kind {
        ExprKind::Name(_)
        | ExprKind::Num(_)
        | ExprKind::Str
        | ExprKind::NoneLit
        | ExprKind::BoolLit(_) => {}
        ExprKind::Attribute { value, .. } => visitor.visit_expr(value),
        ExprKind::Subscript { value, index } => {
            visitor.visit_expr(value);
            visitor.visit_expr(index);
        }
        ExprKind::Slice { lower, upper, step } => {
            for part in [lower, upper, step].into_iter().flatten() {
                visitor.visit_expr(part);
            }
        }
        ExprKind::Call {
            func,
            args,
            keywords,
        } => {
            visitor.visit_expr(func);
            for arg in args {
                visitor.visit_expr(arg);
            }
            for (_, value) in keywords {
                visitor.visit_expr(value);
            }
        }
        ExprKind::Tuple(items) | ExprKind::List(items) | ExprKind::Set(items) => {
            for item in items {
                visitor.visit_expr(item);
            }
        }
        ExprKind::Dict(items) => {
            for (key, value) in items {
                visitor.visit_expr(key);
                visitor.visit_expr(value);
            }
        }
        ExprKind::Lambda { params, body } => {
            for param in &params.args {
                if let Some(default) = &param.default {
                    visitor.visit_expr(default);
                }
            }
            visitor.visit_expr(body);
        }
        ExprKind::BoolExpr { values, .. } => {
            for value in values {
                visitor.visit_expr(value);
            }
        }
        ExprKind::BinExpr { left, right, .. } => {
            visitor.visit_expr(left);
            visitor.visit_expr(right);
        }
        ExprKind::UnaryExpr { operand, .. } => visitor.visit_expr(operand),
        ExprKind::Compare { left, rest } => {
            visitor.visit_expr(left);
            for (_, right) in rest {
                visitor.visit_expr(right);
            }
        }
        ExprKind::IfExpr { test, body, orelse } => {
            visitor.visit_expr(test);
            visitor.visit_expr(body);
            visitor.visit_expr(orelse);
        }
        ExprKind::ListComp { element, generators }
        | ExprKind::SetComp { element, generators }
        | ExprKind::GeneratorExp { element, generators } => {
            for generator in generators {
                visitor.visit_expr(&generator.target);
                visitor.visit_expr(&generator.iter);
                for cond in &generator.ifs {
                    visitor.visit_expr(cond);
                }
            }
            visitor.visit_expr(element);
        }
        ExprKind::DictComp {
            key,
            value,
            generators,
        } => {
            for generator in generators {
                visitor.visit_expr(&generator.target);
                visitor.visit_expr(&generator.iter);
                for cond in &generator.ifs {
                    visitor.visit_expr(cond);
                }
            }
            visitor.visit_expr(key);
            visitor.visit_expr(value);
        }
        ExprKind::Yield { value } => {
            if let Some(value) = value {
                visitor.visit_expr(value);
            }
        }
        ExprKind::Starred(inner) => visitor.visit_expr(inner),
    }
}

/// Whether a `call_for_stmts` callback consumed the subtree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Descend {
    /// Keep recursing into this statement's children.
    Continue,
    /// The callback handled the subtree; do not descend.
    Handled,
}

/// Call `f` for `stmt` and, unless it reports [`Descend::Handled`], for
/// every nested statement in pre-order.
pub fn call_for_stmts<F: FnMut(&Stmt) -> Descend>(stmt: &Stmt, f: &mut F) {
    if f(stmt) == Descend::Handled {
        return;
    }
    for child in child_stmts(stmt) {
        call_for_stmts(child, f);
    }
}

/// The directly nested statements of `stmt`.
pub fn child_stmts(stmt: &Stmt) -> Vec<&Stmt> {
    let mut result = Vec::new();
    match &stmt.kind {
        StmtKind::ClassDef { body, .. }
        | StmtKind::FunctionDef { body, .. }
        | StmtKind::With { body, .. } => result.extend(body),
        StmtKind::If { body, orelse, .. }
        | StmtKind::While { body, orelse, .. }
        | StmtKind::For { body, orelse, .. } => {
            result.extend(body);
            result.extend(orelse);
        }
        StmtKind::Try {
            body,
            handlers,
            orelse,
            finalbody,
        } => {
            result.extend(body);
            for handler in handlers {
                result.extend(&handler.body);
            }
            result.extend(orelse);
            result.extend(finalbody);
        }
        _ => {}
    }
    result
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[derive(Default)]
    struct NameCollector {
        names: Vec<String>,
    }

    impl Visitor for NameCollector {
        fn visit_expr(&mut self, expr: &Expr) {
            if let ExprKind::Name(name) = &expr.kind {
                self.names.push(name.clone());
            }
            walk_expr(self, expr);
        }
    }

    #[test]
    fn collects_names_through_nesting() {
        let module = parse("def f(a):\n    return g(a) + h[b]\n").unwrap();
        let mut collector = NameCollector::default();
        for stmt in &module.body {
            collector.visit_stmt(stmt);
        }
        assert_eq!(collector.names, vec!["g", "a", "h", "b"]);
    }

    #[test]
    fn call_for_stmts_stops_on_handled() {
        let module = parse("class C:\n    def m(self):\n        pass\nx = 1\n").unwrap();
        let mut seen = Vec::new();
        for stmt in &module.body {
            call_for_stmts(stmt, &mut |s| {
                let label = format!("{:?}", std::mem::discriminant(&s.kind));
                seen.push(label);
                if matches!(s.kind, StmtKind::ClassDef { .. }) {
                    Descend::Handled
                } else {
                    Descend::Continue
                }
            });
        }
        // The method inside the class is never visited.
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn comprehension_children_are_walked() {
        let module = parse("[y for y in ys if y]\n").unwrap();
        let mut collector = NameCollector::default();
        for stmt in &module.body {
            collector.visit_stmt(stmt);
        }
        assert_eq!(collector.names, vec!["y", "ys", "y", "y"]);
    }
}
