//! Scope and name binding: AST → scope tree + definition table.
//!
//! A builder pass walks the module populating name tables per the binding
//! rules:
//!
//! - `x = EXPR` accumulates an assignment site on `x`
//! - `x, y = EXPR` records destructuring paths into the one RHS
//! - `self.x = EXPR` in a method body (receiver = first parameter) feeds
//!   the enclosing class's instance-attribute table; nested `def`/`class`
//!   bodies inside the method do not qualify
//! - `for`/`with`/`except as` targets bind through their protocols
//! - `import a.b` binds the leftmost segment unless aliased
//! - `from M import *` is recorded on the module, expanded lazily at
//!   attribute lookup
//! - `global x` reroutes `x` to the module's name table

use hawser_ast::nodes::{
    Comprehension, Expr, ExprKind, Module, Stmt, StmtKind,
};
use hawser_core::text::LineIndex;
use tracing::trace;

use crate::names::{AssignKind, Assignment, ModuleRef, PyName};
use crate::objects::{DefId, DefInfo, DefKind};
use crate::scope::{ScopeId, ScopeKind, ScopeTree};

/// The per-module result of scope construction.
#[derive(Debug, Clone, Default)]
pub struct ModuleAnalysis {
    pub scopes: ScopeTree,
    pub defs: Vec<DefInfo>,
    /// Star imports recorded on the module, expanded at attribute lookup.
    pub star_imports: Vec<ModuleRef>,
    /// Spans of import statements, for the occurrence import filter.
    pub import_spans: Vec<hawser_ast::nodes::Span>,
}

impl ModuleAnalysis {
    pub fn def(&self, id: DefId) -> &DefInfo {
        &self.defs[id.0 as usize]
    }
}

/// Build the scope tree and definition table for a parsed module.
pub fn analyze(ast: &Module, lines: &LineIndex) -> ModuleAnalysis {
    let mut builder = Builder {
        analysis: ModuleAnalysis::default(),
        lines,
    };
    builder.analysis.scopes.get_mut(ScopeId(0)).end_line = lines.len();
    builder.walk_body(ScopeId(0), &ast.body, None);
    trace!(
        scopes = builder.analysis.scopes.iter().count(),
        defs = builder.analysis.defs.len(),
        "scope construction finished"
    );
    builder.analysis
}

struct Builder<'a> {
    analysis: ModuleAnalysis,
    lines: &'a LineIndex,
}

impl Builder<'_> {
    fn end_line(&self, stmt: &Stmt) -> u32 {
        self.lines.line_number(stmt.span.end.saturating_sub(1))
    }

    fn bind(&mut self, scope: ScopeId, name: &str, pyname: PyName) {
        self.analysis
            .scopes
            .get_mut(scope)
            .names
            .insert(name.to_string(), pyname);
    }

    fn bind_assignment(&mut self, scope: ScopeId, name: &str, assignment: Assignment) {
        let names = &mut self.analysis.scopes.get_mut(scope).names;
        match names.get_mut(name) {
            Some(existing) => existing.push_assignment(assignment),
            None => {
                let lineno = assignment.lineno;
                names.insert(
                    name.to_string(),
                    PyName::Assigned {
                        assignments: vec![assignment],
                        lineno,
                    },
                );
            }
        }
    }

    // ------------------------------------------------------------------
    // Statement walking
    // ------------------------------------------------------------------

    /// Walk a statement list in `scope`. `function` is the enclosing
    /// function definition collecting return/yield expressions.
    fn walk_body(&mut self, scope: ScopeId, body: &[Stmt], function: Option<DefId>) {
        for stmt in body {
            self.walk_stmt(scope, stmt, function);
        }
    }

    fn walk_stmt(&mut self, scope: ScopeId, stmt: &Stmt, function: Option<DefId>) {
        match &stmt.kind {
            StmtKind::ClassDef {
                name,
                name_span,
                bases,
                decorators,
                body,
            } => {
                let class_scope =
                    self.analysis
                        .scopes
                        .add_child(scope, ScopeKind::Class, Some(name.clone()));
                let def_id = DefId(self.analysis.defs.len() as u32);
                self.analysis.defs.push(DefInfo::new_class(
                    name.clone(),
                    *name_span,
                    stmt.lineno,
                    class_scope,
                    scope,
                    bases.clone(),
                    decorators.clone(),
                ));
                {
                    let s = self.analysis.scopes.get_mut(class_scope);
                    s.start_line = stmt.lineno;
                    s.def = Some(def_id);
                }
                let end = self.end_line(stmt);
                self.analysis.scopes.get_mut(class_scope).end_line = end;
                self.bind(scope, name, PyName::Defined(def_id));
                self.walk_body(class_scope, body, None);
            }
            StmtKind::FunctionDef {
                name,
                name_span,
                params,
                decorators,
                body,
            } => {
                let func_scope =
                    self.analysis
                        .scopes
                        .add_child(scope, ScopeKind::Function, Some(name.clone()));
                let def_id = DefId(self.analysis.defs.len() as u32);
                self.analysis.defs.push(DefInfo::new_function(
                    name.clone(),
                    *name_span,
                    stmt.lineno,
                    func_scope,
                    scope,
                    params.clone(),
                    decorators.clone(),
                ));
                {
                    let s = self.analysis.scopes.get_mut(func_scope);
                    s.start_line = stmt.lineno;
                    s.def = Some(def_id);
                }
                let end = self.end_line(stmt);
                self.analysis.scopes.get_mut(func_scope).end_line = end;
                self.bind(scope, name, PyName::Defined(def_id));

                // Parameters, in declaration order; the trailing special
                // parameters keep their positional indices.
                let mut index = 0usize;
                for param in &params.args {
                    self.bind(
                        func_scope,
                        &param.name,
                        PyName::Parameter {
                            def: def_id,
                            index,
                            span: param.span,
                            lineno: stmt.lineno,
                        },
                    );
                    index += 1;
                }
                for special in [&params.vararg, &params.kwarg].into_iter().flatten() {
                    self.bind(
                        func_scope,
                        &special.name,
                        PyName::Parameter {
                            def: def_id,
                            index,
                            span: special.span,
                            lineno: stmt.lineno,
                        },
                    );
                    index += 1;
                }

                self.walk_body(func_scope, body, Some(def_id));

                // Inside a class body, the method's own `self.x = ...`
                // assignments feed the class's instance-attribute table.
                let parent_kind = self.analysis.scopes.get(scope).kind;
                if parent_kind == ScopeKind::Class {
                    if let Some(class_def) = self.analysis.scopes.get(scope).def {
                        if let Some(first) = params.args.first() {
                            let self_name = first.name.clone();
                            self.collect_self_attrs(class_def, &self_name, body);
                        }
                    }
                }
            }
            StmtKind::Assign { targets, value } => {
                for target in targets {
                    self.bind_target(scope, target, value, Vec::new(), AssignKind::Plain);
                }
                self.scan_exprs(scope, stmt, function);
            }
            StmtKind::AugAssign { target, value, .. } => {
                if let ExprKind::Name(name) = &target.kind {
                    self.bind_assignment(
                        scope,
                        name,
                        Assignment::plain(value.clone(), stmt.lineno),
                    );
                }
                self.scan_exprs(scope, stmt, function);
            }
            StmtKind::For {
                target,
                iter,
                body,
                orelse,
            } => {
                self.bind_target(scope, target, iter, Vec::new(), AssignKind::Iter);
                self.scan_exprs(scope, stmt, function);
                self.walk_body(scope, body, function);
                self.walk_body(scope, orelse, function);
            }
            StmtKind::With {
                context,
                target,
                body,
            } => {
                if let Some(target) = target {
                    self.bind_target(scope, target, context, Vec::new(), AssignKind::Enter);
                }
                self.scan_exprs(scope, stmt, function);
                self.walk_body(scope, body, function);
            }
            StmtKind::Try {
                body,
                handlers,
                orelse,
                finalbody,
            } => {
                self.walk_body(scope, body, function);
                for handler in handlers {
                    if let (Some(name), Some(typ)) = (&handler.name, &handler.typ) {
                        self.bind_assignment(
                            scope,
                            name,
                            Assignment {
                                expr: typ.clone(),
                                path: Vec::new(),
                                kind: AssignKind::ExceptAs,
                                lineno: handler.lineno,
                            },
                        );
                    }
                    self.walk_body(scope, &handler.body, function);
                }
                self.walk_body(scope, orelse, function);
                self.walk_body(scope, finalbody, function);
            }
            StmtKind::If { body, orelse, .. } | StmtKind::While { body, orelse, .. } => {
                self.scan_exprs(scope, stmt, function);
                self.walk_body(scope, body, function);
                self.walk_body(scope, orelse, function);
            }
            StmtKind::Import { names } => {
                self.analysis.import_spans.push(stmt.span);
                for alias in names {
                    match &alias.asname {
                        Some(asname) => self.bind(
                            scope,
                            asname,
                            PyName::ImportedModule {
                                module: ModuleRef::absolute(alias.name.clone()),
                                lineno: stmt.lineno,
                            },
                        ),
                        None => {
                            // Without an alias only the leftmost dotted
                            // segment becomes a name.
                            let root = alias.name.split('.').next().unwrap_or(&alias.name);
                            self.bind(
                                scope,
                                root,
                                PyName::ImportedModule {
                                    module: ModuleRef::absolute(root),
                                    lineno: stmt.lineno,
                                },
                            );
                        }
                    }
                }
            }
            StmtKind::ImportFrom {
                module,
                level,
                names,
                is_star,
                ..
            } => {
                self.analysis.import_spans.push(stmt.span);
                let module_ref = ModuleRef {
                    name: module.clone(),
                    level: *level,
                };
                if *is_star {
                    self.analysis.star_imports.push(module_ref);
                } else {
                    for alias in names {
                        let bound = alias.asname.as_deref().unwrap_or(&alias.name);
                        self.bind(
                            scope,
                            bound,
                            PyName::Imported {
                                module: module_ref.clone(),
                                original: alias.name.clone(),
                                lineno: stmt.lineno,
                            },
                        );
                    }
                }
            }
            StmtKind::Global { names } => {
                for (name, _) in names {
                    self.analysis
                        .scopes
                        .get_mut(scope)
                        .globals
                        .insert(name.clone());
                    // Make sure the module table owns the binding so every
                    // occurrence of the global resolves to one owner.
                    let module_scope = self.analysis.scopes.module_scope();
                    if !self
                        .analysis
                        .scopes
                        .get(module_scope)
                        .names
                        .contains_key(name)
                    {
                        self.bind(
                            module_scope,
                            name,
                            PyName::Assigned {
                                assignments: Vec::new(),
                                lineno: stmt.lineno,
                            },
                        );
                    }
                }
            }
            StmtKind::Return { value } => {
                if let (Some(def), Some(value)) = (function, value) {
                    self.analysis.defs[def.0 as usize].returned.push(value.clone());
                }
                self.scan_exprs(scope, stmt, function);
            }
            StmtKind::Expr(_) | StmtKind::Raise { .. } | StmtKind::Delete { .. } => {
                self.scan_exprs(scope, stmt, function);
            }
            StmtKind::Pass | StmtKind::Break | StmtKind::Continue => {}
        }
    }

    /// Bind one assignment target, recursing through tuple/list structure
    /// with positional paths. Attribute and subscript targets are not
    /// scope bindings.
    fn bind_target(
        &mut self,
        scope: ScopeId,
        target: &Expr,
        value: &Expr,
        path: Vec<usize>,
        kind: AssignKind,
    ) {
        match &target.kind {
            ExprKind::Name(name) => {
                self.bind_assignment(
                    scope,
                    name,
                    Assignment {
                        expr: value.clone(),
                        path,
                        kind,
                        lineno: target.lineno,
                    },
                );
            }
            ExprKind::Tuple(items) | ExprKind::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    let mut item_path = path.clone();
                    item_path.push(i);
                    self.bind_target(scope, item, value, item_path, kind);
                }
            }
            ExprKind::Starred(inner) => {
                self.bind_target(scope, inner, value, path, kind);
            }
            _ => {}
        }
    }

    // ------------------------------------------------------------------
    // Expression scanning
    // ------------------------------------------------------------------

    /// Scan the statement's own expressions for comprehension targets and
    /// yields. Nested statements are walked separately, so this never
    /// crosses a scope boundary.
    fn scan_exprs(&mut self, scope: ScopeId, stmt: &Stmt, function: Option<DefId>) {
        let mut exprs: Vec<&Expr> = Vec::new();
        match &stmt.kind {
            StmtKind::Expr(e) => exprs.push(e),
            StmtKind::Assign { targets, value } => {
                exprs.extend(targets.iter());
                exprs.push(value);
            }
            StmtKind::AugAssign { target, value, .. } => {
                exprs.push(target);
                exprs.push(value);
            }
            StmtKind::Return { value } => exprs.extend(value.iter()),
            StmtKind::If { test, .. } | StmtKind::While { test, .. } => exprs.push(test),
            StmtKind::For { iter, .. } => exprs.push(iter),
            StmtKind::With { context, .. } => exprs.push(context),
            StmtKind::Raise { exc } => exprs.extend(exc.iter()),
            StmtKind::Delete { targets } => exprs.extend(targets.iter()),
            _ => {}
        }
        for expr in exprs {
            self.scan_expr(scope, expr, function);
        }
    }

    fn scan_expr(&mut self, scope: ScopeId, expr: &Expr, function: Option<DefId>) {
        match &expr.kind {
            ExprKind::ListComp { element, generators }
            | ExprKind::SetComp { element, generators }
            | ExprKind::GeneratorExp { element, generators } => {
                self.bind_comprehension(scope, generators, function);
                self.scan_expr(scope, element, function);
            }
            ExprKind::DictComp {
                key,
                value,
                generators,
            } => {
                self.bind_comprehension(scope, generators, function);
                self.scan_expr(scope, key, function);
                self.scan_expr(scope, value, function);
            }
            ExprKind::Yield { value } => {
                if let Some(def) = function {
                    let info = &mut self.analysis.defs[def.0 as usize];
                    info.is_generator = true;
                    if let Some(value) = value {
                        info.yielded.push((**value).clone());
                    }
                }
                if let Some(value) = value {
                    self.scan_expr(scope, value, function);
                }
            }
            ExprKind::Attribute { value, .. } => self.scan_expr(scope, value, function),
            ExprKind::Subscript { value, index } => {
                self.scan_expr(scope, value, function);
                self.scan_expr(scope, index, function);
            }
            ExprKind::Call {
                func,
                args,
                keywords,
            } => {
                self.scan_expr(scope, func, function);
                for arg in args {
                    self.scan_expr(scope, arg, function);
                }
                for (_, value) in keywords {
                    self.scan_expr(scope, value, function);
                }
            }
            ExprKind::Tuple(items) | ExprKind::List(items) | ExprKind::Set(items) => {
                for item in items {
                    self.scan_expr(scope, item, function);
                }
            }
            ExprKind::Dict(items) => {
                for (k, v) in items {
                    self.scan_expr(scope, k, function);
                    self.scan_expr(scope, v, function);
                }
            }
            ExprKind::BoolExpr { values, .. } => {
                for value in values {
                    self.scan_expr(scope, value, function);
                }
            }
            ExprKind::BinExpr { left, right, .. } => {
                self.scan_expr(scope, left, function);
                self.scan_expr(scope, right, function);
            }
            ExprKind::UnaryExpr { operand, .. } => self.scan_expr(scope, operand, function),
            ExprKind::Compare { left, rest } => {
                self.scan_expr(scope, left, function);
                for (_, right) in rest {
                    self.scan_expr(scope, right, function);
                }
            }
            ExprKind::IfExpr { test, body, orelse } => {
                self.scan_expr(scope, test, function);
                self.scan_expr(scope, body, function);
                self.scan_expr(scope, orelse, function);
            }
            ExprKind::Starred(inner) => self.scan_expr(scope, inner, function),
            // Lambda bodies are opaque to scope construction.
            ExprKind::Lambda { .. }
            | ExprKind::Name(_)
            | ExprKind::Num(_)
            | ExprKind::Str
            | ExprKind::NoneLit
            | ExprKind::BoolLit(_)
            | ExprKind::Slice { .. } => {}
        }
    }

    fn bind_comprehension(
        &mut self,
        scope: ScopeId,
        generators: &[Comprehension],
        function: Option<DefId>,
    ) {
        for generator in generators {
            self.bind_target(
                scope,
                &generator.target,
                &generator.iter,
                Vec::new(),
                AssignKind::Iter,
            );
            self.scan_expr(scope, &generator.iter, function);
            for cond in &generator.ifs {
                self.scan_expr(scope, cond, function);
            }
        }
    }

    // ------------------------------------------------------------------
    // Instance attributes
    // ------------------------------------------------------------------

    /// Collect `self.x = ...` assignments from a method body into the
    /// class's instance-attribute table. Control flow is descended;
    /// nested `def`/`class` bodies are not (they are other scopes).
    fn collect_self_attrs(&mut self, class_def: DefId, self_name: &str, body: &[Stmt]) {
        for stmt in body {
            match &stmt.kind {
                StmtKind::Assign { targets, value } => {
                    for target in targets {
                        self.collect_self_target(class_def, self_name, target, value);
                    }
                }
                StmtKind::For {
                    target: _,
                    iter: _,
                    body,
                    orelse,
                } => {
                    self.collect_self_attrs(class_def, self_name, body);
                    self.collect_self_attrs(class_def, self_name, orelse);
                }
                StmtKind::If { body, orelse, .. } | StmtKind::While { body, orelse, .. } => {
                    self.collect_self_attrs(class_def, self_name, body);
                    self.collect_self_attrs(class_def, self_name, orelse);
                }
                StmtKind::With { body, .. } => {
                    self.collect_self_attrs(class_def, self_name, body);
                }
                StmtKind::Try {
                    body,
                    handlers,
                    orelse,
                    finalbody,
                } => {
                    self.collect_self_attrs(class_def, self_name, body);
                    for handler in handlers {
                        self.collect_self_attrs(class_def, self_name, &handler.body);
                    }
                    self.collect_self_attrs(class_def, self_name, orelse);
                    self.collect_self_attrs(class_def, self_name, finalbody);
                }
                // Nested definitions are separate scopes; their `self` is
                // not this method's first parameter.
                StmtKind::FunctionDef { .. } | StmtKind::ClassDef { .. } => {}
                _ => {}
            }
        }
    }

    fn collect_self_target(
        &mut self,
        class_def: DefId,
        self_name: &str,
        target: &Expr,
        value: &Expr,
    ) {
        match &target.kind {
            ExprKind::Attribute { value: recv, attr, .. } => {
                if matches!(&recv.kind, ExprKind::Name(n) if n == self_name) {
                    let attrs = &mut self.analysis.defs[class_def.0 as usize].instance_attrs;
                    let assignment = Assignment::plain(value.clone(), target.lineno);
                    match attrs.get_mut(attr) {
                        Some(existing) => existing.push_assignment(assignment),
                        None => {
                            attrs.insert(
                                attr.clone(),
                                PyName::Assigned {
                                    assignments: vec![assignment],
                                    lineno: target.lineno,
                                },
                            );
                        }
                    }
                }
            }
            ExprKind::Tuple(items) | ExprKind::List(items) => {
                for item in items {
                    self.collect_self_target(class_def, self_name, item, value);
                }
            }
            _ => {}
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use hawser_ast::parser::parse;

    fn analyzed(source: &str) -> ModuleAnalysis {
        let ast = parse(source).unwrap();
        let lines = LineIndex::new(source);
        analyze(&ast, &lines)
    }

    mod bindings {
        use super::*;

        #[test]
        fn assignment_binds_in_module_scope() {
            let analysis = analyzed("x = 1\n");
            let module = analysis.scopes.get(ScopeId(0));
            assert!(matches!(
                module.names.get("x"),
                Some(PyName::Assigned { .. })
            ));
        }

        #[test]
        fn chained_assignment_binds_all_targets() {
            let analysis = analyzed("a = b = 1\n");
            let module = analysis.scopes.get(ScopeId(0));
            assert!(module.names.contains_key("a"));
            assert!(module.names.contains_key("b"));
        }

        #[test]
        fn tuple_targets_carry_paths() {
            let analysis = analyzed("a, (b, c) = value\n");
            let module = analysis.scopes.get(ScopeId(0));
            let PyName::Assigned { assignments, .. } = module.names.get("c").unwrap() else {
                panic!("expected assigned");
            };
            assert_eq!(assignments[0].path, vec![1, 1]);
        }

        #[test]
        fn multiple_assignments_accumulate() {
            let analysis = analyzed("x = 1\nx = 'two'\n");
            let module = analysis.scopes.get(ScopeId(0));
            let PyName::Assigned { assignments, .. } = module.names.get("x").unwrap() else {
                panic!("expected assigned");
            };
            assert_eq!(assignments.len(), 2);
        }

        #[test]
        fn for_target_binds_with_iter_kind() {
            let analysis = analyzed("for item in items:\n    pass\n");
            let module = analysis.scopes.get(ScopeId(0));
            let PyName::Assigned { assignments, .. } = module.names.get("item").unwrap() else {
                panic!("expected assigned");
            };
            assert_eq!(assignments[0].kind, AssignKind::Iter);
        }

        #[test]
        fn with_target_binds_with_enter_kind() {
            let analysis = analyzed("with open(p) as f:\n    pass\n");
            let module = analysis.scopes.get(ScopeId(0));
            let PyName::Assigned { assignments, .. } = module.names.get("f").unwrap() else {
                panic!("expected assigned");
            };
            assert_eq!(assignments[0].kind, AssignKind::Enter);
        }

        #[test]
        fn except_as_binds() {
            let analysis = analyzed("try:\n    pass\nexcept ValueError as e:\n    pass\n");
            let module = analysis.scopes.get(ScopeId(0));
            let PyName::Assigned { assignments, .. } = module.names.get("e").unwrap() else {
                panic!("expected assigned");
            };
            assert_eq!(assignments[0].kind, AssignKind::ExceptAs);
        }

        #[test]
        fn comprehension_target_binds_in_enclosing_scope() {
            let analysis = analyzed("squares = [i * i for i in ns]\n");
            let module = analysis.scopes.get(ScopeId(0));
            assert!(module.names.contains_key("i"));
        }
    }

    mod imports {
        use super::*;

        #[test]
        fn plain_import_binds_leftmost_segment() {
            let analysis = analyzed("import a.b\n");
            let module = analysis.scopes.get(ScopeId(0));
            let Some(PyName::ImportedModule { module: m, .. }) = module.names.get("a") else {
                panic!("expected imported module");
            };
            assert_eq!(m.name, "a");
            assert!(!module.names.contains_key("a.b"));
        }

        #[test]
        fn aliased_import_binds_full_path() {
            let analysis = analyzed("import a.b as c\n");
            let module = analysis.scopes.get(ScopeId(0));
            let Some(PyName::ImportedModule { module: m, .. }) = module.names.get("c") else {
                panic!("expected imported module");
            };
            assert_eq!(m.name, "a.b");
        }

        #[test]
        fn from_import_records_original() {
            let analysis = analyzed("from pkg.mod import g as h\n");
            let module = analysis.scopes.get(ScopeId(0));
            let Some(PyName::Imported { module: m, original, .. }) = module.names.get("h") else {
                panic!("expected imported name");
            };
            assert_eq!(m.name, "pkg.mod");
            assert_eq!(original, "g");
            assert!(!module.names.contains_key("g"));
        }

        #[test]
        fn star_import_is_recorded_on_module() {
            let analysis = analyzed("from mod import *\n");
            assert_eq!(analysis.star_imports.len(), 1);
            assert_eq!(analysis.star_imports[0].name, "mod");
            assert!(analysis.scopes.get(ScopeId(0)).names.is_empty());
        }

        #[test]
        fn import_spans_are_collected() {
            let analysis = analyzed("import a\nx = 1\nfrom b import c\n");
            assert_eq!(analysis.import_spans.len(), 2);
        }
    }

    mod scopes {
        use super::*;

        #[test]
        fn function_scope_holds_parameters() {
            let analysis = analyzed("def f(a, b=1, *rest, **kw):\n    pass\n");
            let func_scope = analysis.scopes.get(ScopeId(1));
            assert_eq!(func_scope.kind, ScopeKind::Function);
            for (name, index) in [("a", 0usize), ("b", 1), ("rest", 2), ("kw", 3)] {
                let Some(PyName::Parameter { index: i, .. }) = func_scope.names.get(name) else {
                    panic!("expected parameter {}", name);
                };
                assert_eq!(*i, index);
            }
        }

        #[test]
        fn scope_ranges_nest() {
            let analysis = analyzed("class C:\n    def m(self):\n        pass\nx = 1\n");
            let class_scope = analysis.scopes.get(ScopeId(1));
            let method_scope = analysis.scopes.get(ScopeId(2));
            assert_eq!(class_scope.kind, ScopeKind::Class);
            assert_eq!(class_scope.start_line, 1);
            assert!(class_scope.end_line >= 3);
            assert_eq!(method_scope.start_line, 2);
            assert!(method_scope.end_line >= 3);
            assert!(method_scope.start_line >= class_scope.start_line);
            assert!(method_scope.end_line <= class_scope.end_line);
        }

        #[test]
        fn global_reroutes_to_module_table() {
            let analysis = analyzed("def f():\n    global counter\n    counter = 1\n");
            let func = ScopeId(1);
            let (owner, _) = analysis.scopes.lookup(func, "counter").unwrap();
            assert_eq!(owner, ScopeId(0));
        }
    }

    mod instance_attrs {
        use super::*;

        #[test]
        fn self_assignment_feeds_class_table() {
            let analysis = analyzed("class C:\n    def m(self):\n        self.x = 1\n");
            let class = analysis.def(DefId(0));
            assert_eq!(class.kind, DefKind::Class);
            assert!(class.instance_attrs.contains_key("x"));
        }

        #[test]
        fn self_assignment_inside_nested_def_does_not_qualify() {
            let source = "class C:\n    def m(self):\n        def inner(self):\n            self.y = 1\n        self.x = 1\n";
            let analysis = analyzed(source);
            let class = analysis.def(DefId(0));
            assert!(class.instance_attrs.contains_key("x"));
            assert!(!class.instance_attrs.contains_key("y"));
        }

        #[test]
        fn self_assignment_inside_control_flow_qualifies() {
            let source = "class C:\n    def m(self, flag):\n        if flag:\n            self.x = 1\n";
            let analysis = analyzed(source);
            let class = analysis.def(DefId(0));
            assert!(class.instance_attrs.contains_key("x"));
        }

        #[test]
        fn returns_and_yields_are_collected() {
            let analysis = analyzed("def f():\n    return 1\ndef g():\n    yield 'x'\n");
            let f = analysis.def(DefId(0));
            assert_eq!(f.returned.len(), 1);
            assert!(!f.is_generator);
            let g = analysis.def(DefId(1));
            assert!(g.is_generator);
            assert_eq!(g.yielded.len(), 1);
        }
    }
}
