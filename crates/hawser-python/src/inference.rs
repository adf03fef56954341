//! Type inference: expression → entity by static propagation.
//!
//! The evaluator follows the protocol rules: literals become parameterised
//! containers, names resolve through the scope chain and import
//! unwrapping, attribute access goes through the receiver type's
//! attribute map, calls produce instances (classes) or returned objects
//! (functions), and iteration/subscript/context protocols are consulted
//! on the receiver's type. Inference may return `Unknown` but never
//! diverges: every walk is bounded by a per-query visited set keyed by
//! (function, argument-signature hash) and by a configurable depth
//! counter for parameter-from-caller propagation.
//!
//! Failed attribute and name lookups degrade to `Unknown` locally; they
//! are never tunnelled to callers.

use std::cell::{Cell, RefCell};
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use hawser_ast::nodes::{Expr, ExprKind, Number, Stmt, StmtKind, UnaryOp};
use hawser_ast::visitor::child_stmts;
use tracing::trace;

use crate::builtins;
use crate::names::{
    AssignKind, Assignment, BindingKey, BindingOwner, ModuleRef, PyName, TargetIdent,
};
use crate::objects::{BuiltinEntity, DefId, DefKind, Entity, FunctionKind, ModuleId};
use crate::project::{lookup_binding, ModuleEntry, Project};
use crate::resolver;
use crate::scope::{ScopeId, ScopeKind};

// ============================================================================
// Inference Context
// ============================================================================

/// Per-query inference state: recursion guards and active call frames.
///
/// A context is created per analysis query and discarded afterwards; the
/// durable memoization lives in the project's concluded tables.
pub struct Ctx<'p> {
    pub project: &'p Project,
    /// (function, argument-signature hash) pairs currently being inferred.
    visited: RefCell<HashSet<(ModuleId, DefId, u64)>>,
    /// Import chains being unwrapped, to tolerate import cycles.
    import_guard: RefCell<HashSet<(ModuleId, String)>>,
    /// Assignment sites being evaluated; breaks `x = x + 1` style
    /// self-reference and assignment cycles across names.
    assign_guard: RefCell<HashSet<(ModuleId, hawser_ast::nodes::Span)>>,
    /// Star-import expansion guard.
    star_guard: RefCell<HashSet<ModuleId>>,
    /// Call-chain depth for parameter-from-caller propagation.
    depth: Cell<u32>,
    /// Active call frames: argument entities for the function being
    /// evaluated, consulted by parameter resolution.
    frames: RefCell<Vec<((ModuleId, DefId), Vec<Entity>)>>,
}

impl<'p> Ctx<'p> {
    pub fn new(project: &'p Project) -> Self {
        Ctx {
            project,
            visited: RefCell::new(HashSet::new()),
            import_guard: RefCell::new(HashSet::new()),
            assign_guard: RefCell::new(HashSet::new()),
            star_guard: RefCell::new(HashSet::new()),
            depth: Cell::new(0),
            frames: RefCell::new(Vec::new()),
        }
    }

    fn max_depth(&self) -> u32 {
        self.project.config().max_inference_depth
    }

    fn frame_args(&self, key: (ModuleId, DefId)) -> Option<Vec<Entity>> {
        self.frames
            .borrow()
            .iter()
            .rev()
            .find(|(k, _)| *k == key)
            .map(|(_, args)| args.clone())
    }
}

fn args_signature(args: &[Entity]) -> u64 {
    let mut hasher = DefaultHasher::new();
    args.hash(&mut hasher);
    hasher.finish()
}

// ============================================================================
// Expression Evaluation
// ============================================================================

/// Infer the entity of `expr` evaluated in `scope` of `entry`.
pub fn eval_expr(ctx: &Ctx, entry: &ModuleEntry, scope: ScopeId, expr: &Expr) -> Entity {
    match &expr.kind {
        ExprKind::Num(Number::Int) => Entity::int(),
        ExprKind::Num(Number::Float) => Entity::Builtin(BuiltinEntity::Float),
        ExprKind::Str => Entity::str(),
        ExprKind::NoneLit => Entity::None,
        ExprKind::BoolLit(_) => Entity::Builtin(BuiltinEntity::Bool),
        ExprKind::Name(name) => resolve_name(ctx, entry, scope, name),
        ExprKind::Attribute { value, attr, .. } => {
            let receiver = eval_expr(ctx, entry, scope, value);
            entity_attribute(ctx, &receiver, attr)
        }
        ExprKind::Call {
            func,
            args,
            keywords: _,
        } => {
            let callee = eval_expr(ctx, entry, scope, func);
            let arg_entities: Vec<Entity> = args
                .iter()
                .map(|a| eval_expr(ctx, entry, scope, a))
                .collect();
            eval_call(ctx, &callee, &arg_entities)
        }
        ExprKind::Subscript { value, index } => {
            let receiver = eval_expr(ctx, entry, scope, value);
            if matches!(index.kind, ExprKind::Slice { .. }) {
                return builtins::slice_result(&receiver);
            }
            subscript_entity(ctx, &receiver)
        }
        ExprKind::Tuple(items) => Entity::Builtin(BuiltinEntity::Tuple(
            items
                .iter()
                .map(|item| eval_expr(ctx, entry, scope, item))
                .collect(),
        )),
        ExprKind::List(items) => Entity::list_of(merge_evals(ctx, entry, scope, items)),
        ExprKind::Set(items) => Entity::Builtin(BuiltinEntity::Set(Box::new(merge_evals(
            ctx, entry, scope, items,
        )))),
        ExprKind::Dict(items) => {
            let mut key = Entity::Unknown;
            let mut value = Entity::Unknown;
            for (k, v) in items {
                key = key.merge(eval_expr(ctx, entry, scope, k));
                value = value.merge(eval_expr(ctx, entry, scope, v));
            }
            Entity::dict_of(key, value)
        }
        ExprKind::ListComp { element, .. } => {
            Entity::list_of(eval_expr(ctx, entry, scope, element))
        }
        ExprKind::SetComp { element, .. } => Entity::Builtin(BuiltinEntity::Set(Box::new(
            eval_expr(ctx, entry, scope, element),
        ))),
        ExprKind::GeneratorExp { element, .. } => Entity::Builtin(BuiltinEntity::Generator(
            Box::new(eval_expr(ctx, entry, scope, element)),
        )),
        ExprKind::DictComp { key, value, .. } => Entity::dict_of(
            eval_expr(ctx, entry, scope, key),
            eval_expr(ctx, entry, scope, value),
        ),
        ExprKind::BinExpr { left, right, .. } => {
            let l = eval_expr(ctx, entry, scope, left);
            let r = eval_expr(ctx, entry, scope, right);
            builtins::binary_op_result(&l, &r)
        }
        ExprKind::BoolExpr { values, .. } => merge_evals(ctx, entry, scope, values),
        ExprKind::UnaryExpr { op, operand } => match op {
            UnaryOp::Not => Entity::Builtin(BuiltinEntity::Bool),
            _ => eval_expr(ctx, entry, scope, operand),
        },
        ExprKind::Compare { .. } => Entity::Builtin(BuiltinEntity::Bool),
        ExprKind::IfExpr { body, orelse, .. } => eval_expr(ctx, entry, scope, body)
            .merge(eval_expr(ctx, entry, scope, orelse)),
        ExprKind::Starred(inner) => eval_expr(ctx, entry, scope, inner),
        ExprKind::Yield { .. } | ExprKind::Lambda { .. } | ExprKind::Slice { .. } => {
            Entity::Unknown
        }
    }
}

fn merge_evals(ctx: &Ctx, entry: &ModuleEntry, scope: ScopeId, exprs: &[Expr]) -> Entity {
    let mut result = Entity::Unknown;
    for expr in exprs {
        result = result.merge(eval_expr(ctx, entry, scope, expr));
    }
    result
}

/// Call semantics: classes construct instances, functions return their
/// inferred result, builtins go through the protocol tables, and callable
/// instances recurse through `__call__`.
pub fn eval_call(ctx: &Ctx, callee: &Entity, args: &[Entity]) -> Entity {
    match callee {
        Entity::Class(_, _) => Entity::instance_of(callee.clone()),
        Entity::Function(m, d) => {
            let Some(entry) = ctx.project.module_by_id(*m) else {
                return Entity::Unknown;
            };
            returned_object(ctx, &entry, *d, Some(args.to_vec()))
        }
        Entity::Builtin(BuiltinEntity::Method { receiver, name }) => {
            builtins::method_call_result(receiver, name, args)
        }
        Entity::Instance(_) => {
            let call = entity_attribute(ctx, callee, "__call__");
            if call.is_unknown() {
                Entity::Unknown
            } else {
                eval_call(ctx, &call, args)
            }
        }
        _ => Entity::Unknown,
    }
}

// ============================================================================
// Name Resolution
// ============================================================================

/// Resolve a simple name in a scope to its entity: scope chain, then
/// star imports, then builtins.
pub fn resolve_name(ctx: &Ctx, entry: &ModuleEntry, scope: ScopeId, name: &str) -> Entity {
    if let Some((_, pyname)) = entry.analysis.scopes.lookup(scope, name) {
        let pyname = pyname.clone();
        return resolve_pyname(ctx, entry, &pyname);
    }
    if let Some((star_entry, pyname)) = star_import_pyname(ctx, entry, name) {
        return resolve_pyname(ctx, &star_entry, &pyname);
    }
    builtins::builtin_name(name).unwrap_or(Entity::Unknown)
}

/// Resolve a binding to its entity. `entry` is the module owning the
/// binding; assignment expressions are evaluated in the scope enclosing
/// their line.
pub fn resolve_pyname(ctx: &Ctx, entry: &ModuleEntry, pyname: &PyName) -> Entity {
    match pyname {
        PyName::Assigned { assignments, .. } => {
            let mut result = Entity::Unknown;
            for assignment in assignments {
                result = result.merge(eval_assignment(ctx, entry, assignment));
                if !result.is_unknown() {
                    break;
                }
            }
            result
        }
        PyName::Defined(def) => match entry.analysis.def(*def).kind {
            DefKind::Class => Entity::Class(entry.id, *def),
            DefKind::Function => Entity::Function(entry.id, *def),
        },
        PyName::Imported {
            module, original, ..
        } => {
            let Some(target) = module_entry_of_ref(ctx, entry, module) else {
                return Entity::Unknown;
            };
            let guard_key = (target.id, original.clone());
            if !ctx.import_guard.borrow_mut().insert(guard_key.clone()) {
                return Entity::Unknown;
            }
            let result = entity_attribute(ctx, &Entity::Module(target.id), original);
            ctx.import_guard.borrow_mut().remove(&guard_key);
            result
        }
        PyName::ImportedModule { module, .. } => resolve_module_ref(ctx, entry, module),
        PyName::Parameter { def, index, .. } => parameter_entity(ctx, entry, *def, *index),
        PyName::Unbound => Entity::Unknown,
    }
}

/// Evaluate one assignment site, applying its protocol kind and
/// destructuring path.
fn eval_assignment(ctx: &Ctx, entry: &ModuleEntry, assignment: &Assignment) -> Entity {
    let guard_key = (entry.id, assignment.expr.span);
    if !ctx.assign_guard.borrow_mut().insert(guard_key) {
        return Entity::Unknown;
    }
    let scope = entry
        .analysis
        .scopes
        .inner_scope_for_line(assignment.lineno);
    let mut entity = eval_expr(ctx, entry, scope, &assignment.expr);
    entity = match assignment.kind {
        AssignKind::Plain => entity,
        AssignKind::Iter => iterate_entity(ctx, &entity),
        AssignKind::Enter => enter_entity(ctx, &entity),
        AssignKind::ExceptAs => match entity {
            Entity::Class(_, _) => Entity::instance_of(entity),
            Entity::Builtin(BuiltinEntity::Tuple(classes)) => {
                let mut merged = Entity::Unknown;
                for class in classes {
                    if matches!(class, Entity::Class(_, _)) {
                        merged = merged.merge(Entity::instance_of(class));
                    }
                }
                merged
            }
            _ => Entity::Unknown,
        },
    };
    for &index in &assignment.path {
        entity = match &entity {
            Entity::Builtin(BuiltinEntity::Tuple(items)) => {
                items.get(index).cloned().unwrap_or_default()
            }
            other => builtins::subscript_result(other, Some(index)),
        };
    }
    ctx.assign_guard.borrow_mut().remove(&guard_key);
    entity
}

// ============================================================================
// Protocols
// ============================================================================

/// `__iter__().__next__()` on an entity.
pub fn iterate_entity(ctx: &Ctx, entity: &Entity) -> Entity {
    match entity {
        Entity::Builtin(_) => builtins::iterated_element(entity),
        Entity::Instance(_) => {
            let iterator = call_protocol(ctx, entity, "__iter__");
            match iterator {
                Entity::Builtin(BuiltinEntity::Iterator(e))
                | Entity::Builtin(BuiltinEntity::Generator(e)) => (*e).clone(),
                Entity::Instance(_) => {
                    let next = call_protocol(ctx, &iterator, "next");
                    if next.is_unknown() {
                        call_protocol(ctx, &iterator, "__next__")
                    } else {
                        next
                    }
                }
                _ => Entity::Unknown,
            }
        }
        _ => Entity::Unknown,
    }
}

/// The context-manager enter protocol on an entity.
pub fn enter_entity(ctx: &Ctx, entity: &Entity) -> Entity {
    match entity {
        Entity::Builtin(BuiltinEntity::File) => entity.clone(),
        Entity::Instance(_) => {
            let entered = call_protocol(ctx, entity, "__enter__");
            if entered.is_unknown() {
                // Context managers commonly return themselves.
                entity.clone()
            } else {
                entered
            }
        }
        _ => Entity::Unknown,
    }
}

fn subscript_entity(ctx: &Ctx, receiver: &Entity) -> Entity {
    match receiver {
        Entity::Builtin(_) => builtins::subscript_result(receiver, None),
        Entity::Instance(_) => call_protocol(ctx, receiver, "__getitem__"),
        _ => Entity::Unknown,
    }
}

fn call_protocol(ctx: &Ctx, receiver: &Entity, method: &str) -> Entity {
    let bound = entity_attribute(ctx, receiver, method);
    if bound.is_unknown() {
        return Entity::Unknown;
    }
    eval_call(ctx, &bound, &[])
}

// ============================================================================
// Attribute Lookup
// ============================================================================

/// `E.a`: look `a` up on the entity's type. A missing attribute is
/// `Unknown`, never an error to the caller.
pub fn entity_attribute(ctx: &Ctx, entity: &Entity, name: &str) -> Entity {
    match entity {
        Entity::Module(id) => {
            let Some(entry) = ctx.project.module_by_id(*id) else {
                return Entity::Unknown;
            };
            match module_attribute_pyname(ctx, &entry, name) {
                Some((owner_entry, pyname)) => resolve_pyname(ctx, &owner_entry, &pyname),
                None => Entity::Unknown,
            }
        }
        Entity::Package(path) => package_attribute(ctx, path, name),
        Entity::Class(m, d) => {
            let Some(entry) = ctx.project.module_by_id(*m) else {
                return Entity::Unknown;
            };
            match class_attributes(ctx, &entry, *d).get(name) {
                Some((key, pyname)) => {
                    let Some(owner_entry) = ctx.project.module_by_id(key.module) else {
                        return Entity::Unknown;
                    };
                    resolve_pyname(ctx, &owner_entry, pyname)
                }
                None => Entity::Unknown,
            }
        }
        Entity::Instance(class) => entity_attribute(ctx, class, name),
        Entity::Builtin(b) => builtins::attribute(b, name).unwrap_or(Entity::Unknown),
        _ => Entity::Unknown,
    }
}

/// A package exposes its children (submodules and subpackages) and the
/// attributes of its initializer module.
fn package_attribute(ctx: &Ctx, package_path: &str, name: &str) -> Entity {
    let workspace = ctx.project.workspace();
    let child_module = format!("{}/{}.py", package_path, name);
    if workspace.has_resource(&child_module) {
        if let Ok(entry) = ctx.project.module_for_path(&child_module) {
            return Entity::Module(entry.id);
        }
    }
    let child_package = format!("{}/{}", package_path, name);
    if workspace.has_resource(&child_package) {
        return Entity::Package(child_package);
    }
    if let Some(init) = resolver::package_init(workspace, package_path) {
        if let Ok(entry) = ctx.project.module_for_path(&init) {
            return entity_attribute(ctx, &Entity::Module(entry.id), name);
        }
    }
    Entity::Unknown
}

/// A module attribute: its global name table, then star imports expanded
/// lazily with a cycle guard.
pub fn module_attribute_pyname(
    ctx: &Ctx,
    entry: &ModuleEntry,
    name: &str,
) -> Option<(Rc<ModuleEntry>, PyName)> {
    let module_scope = entry.analysis.scopes.module_scope();
    if let Some(pyname) = entry.analysis.scopes.get(module_scope).names.get(name) {
        let own = ctx.project.module_by_id(entry.id)?;
        return Some((own, pyname.clone()));
    }
    star_import_pyname(ctx, entry, name)
}

fn star_import_pyname(
    ctx: &Ctx,
    entry: &ModuleEntry,
    name: &str,
) -> Option<(Rc<ModuleEntry>, PyName)> {
    if !ctx.star_guard.borrow_mut().insert(entry.id) {
        return None;
    }
    let mut result = None;
    for star in &entry.analysis.star_imports {
        if let Some(target) = module_entry_of_ref(ctx, entry, star) {
            if let Some(found) = module_attribute_pyname(ctx, &target, name) {
                result = Some(found);
                break;
            }
        }
    }
    ctx.star_guard.borrow_mut().remove(&entry.id);
    result
}

// ============================================================================
// Module Reference Resolution
// ============================================================================

/// Resolve a module reference to its entity (module or package).
pub fn resolve_module_ref(ctx: &Ctx, entry: &ModuleEntry, module: &ModuleRef) -> Entity {
    let found = resolver::find_module(
        ctx.project.workspace(),
        &ctx.project.config().source_folders,
        &module.name,
        module.level,
        Some(entry.folder()),
    );
    match found {
        Ok(found) if found.is_package => Entity::Package(found.path),
        Ok(found) => match ctx.project.module_for_path(&found.path) {
            Ok(target) => Entity::Module(target.id),
            Err(_) => Entity::Unknown,
        },
        Err(_) => Entity::Unknown,
    }
}

/// Resolve a module reference to a loadable module entry (a package
/// resolves to its initializer when present).
pub fn module_entry_of_ref(
    ctx: &Ctx,
    entry: &ModuleEntry,
    module: &ModuleRef,
) -> Option<Rc<ModuleEntry>> {
    let found = resolver::find_module(
        ctx.project.workspace(),
        &ctx.project.config().source_folders,
        &module.name,
        module.level,
        Some(entry.folder()),
    )
    .ok()?;
    let path = if found.is_package {
        resolver::package_init(ctx.project.workspace(), &found.path).unwrap_or(found.path)
    } else {
        found.path
    };
    ctx.project.module_for_path(&path).ok()
}

// ============================================================================
// Classes
// ============================================================================

/// The resolved base-class entities of a class, memoized as concluded
/// data with an in-progress flag so inheritance cycles terminate.
pub fn class_bases(ctx: &Ctx, entry: &ModuleEntry, def: DefId) -> Vec<Entity> {
    let key = (entry.id, def);
    let generation = ctx.project.generation();
    if let Some(cached) = ctx.project.concluded_bases.get(&key, generation) {
        return cached;
    }
    if !ctx.project.concluded_bases.enter(&key, generation) {
        return Vec::new();
    }
    let info = entry.analysis.def(def);
    let mut bases = Vec::new();
    for base in &info.bases {
        let entity = eval_expr(ctx, entry, info.parent_scope, base);
        if matches!(entity, Entity::Class(_, _)) {
            bases.push(entity);
        }
    }
    ctx.project.concluded_bases.store(&key, generation, bases.clone());
    ctx.project.concluded_bases.exit(&key);
    bases
}

/// Every attribute of a class: its own body names and instance
/// attributes, plus inherited names merged from base classes in reverse
/// declaration order so the first-declared base wins. Memoized;
/// invalidated when the defining module's AST is rebuilt; cycles get an
/// empty (unknown) concluded map.
pub fn class_attributes(
    ctx: &Ctx,
    entry: &ModuleEntry,
    def: DefId,
) -> HashMap<String, (BindingKey, PyName)> {
    let key = (entry.id, def);
    let generation = ctx.project.generation();
    if let Some(cached) = ctx.project.concluded_attrs.get(&key, generation) {
        return cached;
    }
    if !ctx.project.concluded_attrs.enter(&key, generation) {
        return HashMap::new();
    }
    let mut result: HashMap<String, (BindingKey, PyName)> = HashMap::new();
    for base in class_bases(ctx, entry, def).iter().rev() {
        if let Entity::Class(m, d) = base {
            if let Some(base_entry) = ctx.project.module_by_id(*m) {
                result.extend(class_attributes(ctx, &base_entry, *d));
            }
        }
    }
    let info = entry.analysis.def(def);
    for (name, pyname) in &info.instance_attrs {
        result.insert(
            name.clone(),
            (
                BindingKey::new(entry.id, BindingOwner::Instance(def), name.clone()),
                pyname.clone(),
            ),
        );
    }
    for (name, pyname) in &entry.analysis.scopes.get(info.scope).names {
        result.insert(
            name.clone(),
            (
                BindingKey::new(entry.id, BindingOwner::Scope(info.scope), name.clone()),
                pyname.clone(),
            ),
        );
    }
    ctx.project
        .concluded_attrs
        .store(&key, generation, result.clone());
    ctx.project.concluded_attrs.exit(&key);
    result
}

// ============================================================================
// Functions
// ============================================================================

/// Classify a function by its parent and decorators. Only the exact
/// `staticmethod`/`classmethod` entities change the classification;
/// unknown decorators leave a plain method.
pub fn function_kind(ctx: &Ctx, entry: &ModuleEntry, def: DefId) -> FunctionKind {
    let info = entry.analysis.def(def);
    if entry.analysis.scopes.get(info.parent_scope).kind != ScopeKind::Class {
        return FunctionKind::Function;
    }
    for decorator in &info.decorators {
        let entity = eval_expr(ctx, entry, info.parent_scope, decorator);
        if let Entity::Builtin(BuiltinEntity::Method { receiver, name }) = &entity {
            if **receiver == BuiltinEntity::Function {
                match name.as_str() {
                    "staticmethod" => return FunctionKind::StaticMethod,
                    "classmethod" => return FunctionKind::ClassMethod,
                    _ => {}
                }
            }
        }
    }
    FunctionKind::Method
}

/// The class a method belongs to, when its parent scope is a class body.
fn owning_class(entry: &ModuleEntry, def: DefId) -> Option<Entity> {
    let info = entry.analysis.def(def);
    let parent = entry.analysis.scopes.get(info.parent_scope);
    if parent.kind != ScopeKind::Class {
        return None;
    }
    parent.def.map(|class_def| Entity::Class(entry.id, class_def))
}

/// The returned object of a function for a given argument list.
///
/// Generators return `Generator[T]` where `T` is the union of yielded
/// expressions; otherwise the union over every `return EXPR`. Runtime
/// hint evidence is merged in. Re-entering the same (function, args)
/// pair returns `Unknown`.
pub fn returned_object(
    ctx: &Ctx,
    entry: &ModuleEntry,
    def: DefId,
    args: Option<Vec<Entity>>,
) -> Entity {
    let info = entry.analysis.def(def);
    let args_vec = args.unwrap_or_default();
    let signature = args_signature(&args_vec);
    let visit_key = (entry.id, def, signature);
    if !ctx.visited.borrow_mut().insert(visit_key) {
        return Entity::Unknown;
    }
    let generation = ctx.project.generation();
    let memo_key = (entry.id, def);
    let memoizable = args_vec.is_empty();
    if memoizable {
        if let Some(cached) = ctx.project.concluded_returns.get(&memo_key, generation) {
            ctx.visited.borrow_mut().remove(&visit_key);
            return cached;
        }
    }
    trace!(function = %info.name, "inferring returned object");
    ctx.frames.borrow_mut().push(((entry.id, def), args_vec));
    let mut result = if info.is_generator {
        let mut element = Entity::Unknown;
        for expr in &info.yielded {
            element = element.merge(eval_expr(ctx, entry, info.scope, expr));
        }
        Entity::Builtin(BuiltinEntity::Generator(Box::new(element)))
    } else {
        let mut merged = Entity::Unknown;
        for expr in &info.returned {
            merged = merged.merge(eval_expr(ctx, entry, info.scope, expr));
        }
        merged
    };
    if result.is_unknown() {
        if let Some(evidence) = ctx.project.evidence_for((entry.id, def)) {
            for returned in evidence.returns {
                result = result.merge(returned);
            }
        }
    }
    ctx.frames.borrow_mut().pop();
    ctx.visited.borrow_mut().remove(&visit_key);
    if memoizable && !result.is_unknown() {
        ctx.project
            .concluded_returns
            .store(&memo_key, generation, result.clone());
    }
    result
}

/// The entity of a function's `index`-th parameter.
///
/// Sources, in order: the implicit receiver for methods, the active call
/// frame, the special trailing `*args`/`**kwargs` shapes, runtime hint
/// evidence, and finally call sites observed across the workspace.
pub fn parameter_entity(ctx: &Ctx, entry: &ModuleEntry, def: DefId, index: usize) -> Entity {
    let info = entry.analysis.def(def);
    let kind = function_kind(ctx, entry, def);
    if index == 0 {
        match kind {
            FunctionKind::Method => {
                if let Some(class) = owning_class(entry, def) {
                    return Entity::instance_of(class);
                }
            }
            FunctionKind::ClassMethod => {
                if let Some(class) = owning_class(entry, def) {
                    return class;
                }
            }
            _ => {}
        }
    }

    // Explicit call arguments from the frame being evaluated.
    let arg_index = match kind {
        FunctionKind::Method | FunctionKind::ClassMethod => index.checked_sub(1),
        _ => Some(index),
    };
    if let (Some(args), Some(i)) = (ctx.frame_args((entry.id, def)), arg_index) {
        if let Some(arg) = args.get(i) {
            if !arg.is_unknown() {
                return arg.clone();
            }
        }
    }

    // Trailing special parameters.
    let positional = info.params.args.len();
    if info.params.vararg.is_some() && index == positional {
        return Entity::list_of(Entity::Unknown);
    }
    let kwarg_index = positional + usize::from(info.params.vararg.is_some());
    if info.params.kwarg.is_some() && index == kwarg_index {
        return Entity::dict_of(Entity::str(), Entity::Unknown);
    }

    // Runtime hint evidence.
    if let Some(evidence) = ctx.project.evidence_for((entry.id, def)) {
        if let Some(observed) = evidence.params.get(index) {
            let mut merged = Entity::Unknown;
            for entity in observed {
                merged = merged.merge(entity.clone());
            }
            if !merged.is_unknown() {
                return merged;
            }
        }
    }

    // Call sites across the workspace.
    let site_args = call_site_parameters(ctx, entry, def);
    site_args.get(index).cloned().unwrap_or_default()
}

/// Parameter entities observed at call sites across the workspace,
/// memoized as concluded data. Depth-bounded: beyond the configured
/// call-chain depth the result degrades to unknown without polluting the
/// memo table.
fn call_site_parameters(ctx: &Ctx, entry: &ModuleEntry, def: DefId) -> Vec<Entity> {
    let key = (entry.id, def);
    let generation = ctx.project.generation();
    if let Some(cached) = ctx.project.concluded_params.get(&key, generation) {
        return cached;
    }
    if ctx.depth.get() >= ctx.max_depth() {
        return Vec::new();
    }
    if !ctx.project.concluded_params.enter(&key, generation) {
        return Vec::new();
    }
    ctx.depth.set(ctx.depth.get() + 1);

    let info = entry.analysis.def(def);
    let target_binding = BindingKey::new(
        entry.id,
        BindingOwner::Scope(info.parent_scope),
        info.name.clone(),
    );
    let kind = function_kind(ctx, entry, def);
    let mut merged: Vec<Entity> = vec![Entity::Unknown; info.params.len()];

    let files = ctx.project.workspace().source_files().unwrap_or_default();
    for resource in files {
        let Ok(caller) = ctx.project.resource_to_module(&resource) else {
            continue;
        };
        collect_calls_into(ctx, &caller, &target_binding, info.name.as_str(), kind, &mut merged);
    }

    ctx.depth.set(ctx.depth.get() - 1);
    ctx.project
        .concluded_params
        .store(&key, generation, merged.clone());
    ctx.project.concluded_params.exit(&key);
    merged
}

/// Scan one module for calls of the target function and merge the
/// inferred argument entities into `merged` by parameter index.
fn collect_calls_into(
    ctx: &Ctx,
    caller: &ModuleEntry,
    target: &BindingKey,
    target_name: &str,
    kind: FunctionKind,
    merged: &mut Vec<Entity>,
) {
    let mut calls: Vec<(&Expr, u32)> = Vec::new();
    for stmt in &caller.ast.body {
        collect_calls_rec(stmt, target_name, &mut calls);
    }
    for (call, lineno) in calls {
        let ExprKind::Call { func, args, .. } = &call.kind else {
            continue;
        };
        let scope = caller.analysis.scopes.inner_scope_for_line(lineno);
        let (matches, self_offset) = match &func.kind {
            ExprKind::Name(name) => {
                let resolved = resolve_binding(ctx, caller, scope, name);
                (resolved == Some(TargetIdent::Binding(target.clone())), 0usize)
            }
            ExprKind::Attribute { value, attr, .. } => {
                if attr != target_name {
                    (false, 0)
                } else {
                    let receiver = eval_expr(ctx, caller, scope, value);
                    let bound = attribute_target(ctx, &receiver, attr);
                    let offset = match (&receiver, kind) {
                        (Entity::Instance(_), FunctionKind::Method)
                        | (Entity::Class(_, _), FunctionKind::ClassMethod) => 1,
                        _ => 0,
                    };
                    (bound.as_ref() == Some(target), offset)
                }
            }
            _ => (false, 0),
        };
        if !matches {
            continue;
        }
        for (position, arg) in args.iter().enumerate() {
            if matches!(arg.kind, ExprKind::Starred(_)) {
                continue;
            }
            let param_index = position + self_offset;
            if param_index >= merged.len() {
                break;
            }
            let entity = eval_expr(ctx, caller, scope, arg);
            let combined = merged[param_index].clone().merge(entity);
            merged[param_index] = combined;
        }
    }
}

/// Recurse into nested statements collecting matching call expressions.
fn collect_calls_rec<'a>(stmt: &'a Stmt, target_name: &str, out: &mut Vec<(&'a Expr, u32)>) {
    collect_call_exprs_of_stmt(stmt, target_name, out);
    for child in child_stmts(stmt) {
        collect_calls_rec(child, target_name, out);
    }
}

fn collect_call_exprs_of_stmt<'a>(
    stmt: &'a Stmt,
    target_name: &str,
    out: &mut Vec<(&'a Expr, u32)>,
) {
    // A hand-rolled walk keeps the expression lifetime tied to `stmt`.
    fn walk<'a>(expr: &'a Expr, target_name: &str, out: &mut Vec<(&'a Expr, u32)>) {
        if let ExprKind::Call { func, .. } = &expr.kind {
            let callee_name = match &func.kind {
                ExprKind::Name(n) => Some(n.as_str()),
                ExprKind::Attribute { attr, .. } => Some(attr.as_str()),
                _ => None,
            };
            if callee_name == Some(target_name) {
                out.push((expr, expr.lineno));
            }
        }
        for child in expr_children(expr) {
            walk(child, target_name, out);
        }
    }
    for expr in stmt_exprs(stmt) {
        walk(expr, target_name, out);
    }
}

fn stmt_exprs(stmt: &hawser_ast::nodes::Stmt) -> Vec<&Expr> {
    match &stmt.kind {
        StmtKind::Expr(e) => vec![e],
        StmtKind::Assign { targets, value } => {
            let mut v: Vec<&Expr> = targets.iter().collect();
            v.push(value);
            v
        }
        StmtKind::AugAssign { target, value, .. } => vec![target, value],
        StmtKind::Return { value } => value.iter().collect(),
        StmtKind::If { test, .. } | StmtKind::While { test, .. } => vec![test],
        StmtKind::For { iter, .. } => vec![iter],
        StmtKind::With { context, .. } => vec![context],
        StmtKind::Raise { exc } => exc.iter().collect(),
        StmtKind::Delete { targets } => targets.iter().collect(),
        _ => Vec::new(),
    }
}

fn expr_children(expr: &Expr) -> Vec<&Expr> {
    match &expr.kind {
        ExprKind::Attribute { value, .. } => vec![&**value],
        ExprKind::Subscript { value, index } => vec![&**value, &**index],
        ExprKind::Call {
            func,
            args,
            keywords,
        } => {
            let mut v: Vec<&Expr> = vec![&**func];
            v.extend(args.iter());
            v.extend(keywords.iter().map(|(_, e)| e));
            v
        }
        ExprKind::Tuple(items) | ExprKind::List(items) | ExprKind::Set(items) => {
            items.iter().collect()
        }
        ExprKind::Dict(items) => items.iter().flat_map(|(k, v)| [k, v]).collect(),
        ExprKind::BoolExpr { values, .. } => values.iter().collect(),
        ExprKind::BinExpr { left, right, .. } => vec![&**left, &**right],
        ExprKind::UnaryExpr { operand, .. } => vec![&**operand],
        ExprKind::Compare { left, rest } => {
            let mut v: Vec<&Expr> = vec![&**left];
            v.extend(rest.iter().map(|(_, e)| e));
            v
        }
        ExprKind::IfExpr { test, body, orelse } => vec![&**test, &**body, &**orelse],
        ExprKind::ListComp { element, generators }
        | ExprKind::SetComp { element, generators }
        | ExprKind::GeneratorExp { element, generators } => {
            let mut v: Vec<&Expr> = vec![&**element];
            for g in generators {
                v.push(&g.iter);
                v.extend(g.ifs.iter());
            }
            v
        }
        ExprKind::DictComp {
            key,
            value,
            generators,
        } => {
            let mut v: Vec<&Expr> = vec![&**key, &**value];
            for g in generators {
                v.push(&g.iter);
                v.extend(g.ifs.iter());
            }
            v
        }
        ExprKind::Yield { value } => value.iter().map(|b| &**b).collect(),
        ExprKind::Starred(inner) => vec![&**inner],
        ExprKind::Slice { lower, upper, step } => [lower, upper, step]
            .into_iter()
            .flatten()
            .map(|b| &**b)
            .collect(),
        ExprKind::Lambda { body, .. } => vec![&**body],
        _ => Vec::new(),
    }
}

// ============================================================================
// Binding Identity
// ============================================================================

/// Resolve a simple name in a scope to its owning binding identity,
/// unwrapping import bindings to the original definition when the target
/// module resolves. Unresolvable names return `None` (unbound).
pub fn resolve_binding(
    ctx: &Ctx,
    entry: &ModuleEntry,
    scope: ScopeId,
    name: &str,
) -> Option<TargetIdent> {
    if let Some((owner, pyname)) = entry.analysis.scopes.lookup(scope, name) {
        let pyname = pyname.clone();
        return Some(binding_identity(ctx, entry, owner, name, &pyname));
    }
    // Star imports expose the other module's binding directly.
    for star in &entry.analysis.star_imports {
        if let Some(target) = module_entry_of_ref(ctx, entry, star) {
            if ctx.star_guard.borrow().contains(&target.id) {
                continue;
            }
            ctx.star_guard.borrow_mut().insert(target.id);
            let found =
                resolve_binding(ctx, &target, target.analysis.scopes.module_scope(), name);
            ctx.star_guard.borrow_mut().remove(&target.id);
            if found.is_some() {
                return found;
            }
        }
    }
    None
}

/// The identity of a known binding, unwrapping imports.
pub fn binding_identity(
    ctx: &Ctx,
    entry: &ModuleEntry,
    owner: ScopeId,
    name: &str,
    pyname: &PyName,
) -> TargetIdent {
    match pyname {
        PyName::Imported {
            module, original, ..
        } => {
            let guard_key = (entry.id, name.to_string());
            if ctx.import_guard.borrow_mut().insert(guard_key.clone()) {
                let unwrapped = module_entry_of_ref(ctx, entry, module).and_then(|target| {
                    module_attribute_binding(ctx, &target, original)
                });
                ctx.import_guard.borrow_mut().remove(&guard_key);
                if let Some(target) = unwrapped {
                    return target;
                }
            }
            TargetIdent::Binding(BindingKey::new(entry.id, BindingOwner::Scope(owner), name))
        }
        PyName::ImportedModule { module, .. } => {
            match module_entry_of_ref(ctx, entry, module) {
                Some(target) => TargetIdent::Module(target.id),
                None => {
                    TargetIdent::Binding(BindingKey::new(entry.id, BindingOwner::Scope(owner), name))
                }
            }
        }
        _ => TargetIdent::Binding(BindingKey::new(entry.id, BindingOwner::Scope(owner), name)),
    }
}

/// The binding identity of a module attribute (global scope + stars).
pub fn module_attribute_binding(
    ctx: &Ctx,
    entry: &ModuleEntry,
    name: &str,
) -> Option<TargetIdent> {
    resolve_binding(ctx, entry, entry.analysis.scopes.module_scope(), name)
}

/// The binding identity of `receiver.name` for occurrence comparison.
pub fn attribute_target(ctx: &Ctx, receiver: &Entity, name: &str) -> Option<BindingKey> {
    match receiver {
        Entity::Module(id) => {
            let entry = ctx.project.module_by_id(*id)?;
            match module_attribute_binding(ctx, &entry, name)? {
                TargetIdent::Binding(key) => Some(key),
                TargetIdent::Module(_) => None,
            }
        }
        Entity::Class(m, d) => {
            let entry = ctx.project.module_by_id(*m)?;
            class_attributes(ctx, &entry, *d)
                .get(name)
                .map(|(key, _)| key.clone())
        }
        Entity::Instance(class) => attribute_target(ctx, class, name),
        Entity::Package(path) => {
            let init = resolver::package_init(ctx.project.workspace(), path)?;
            let entry = ctx.project.module_for_path(&init).ok()?;
            match module_attribute_binding(ctx, &entry, name)? {
                TargetIdent::Binding(key) => Some(key),
                TargetIdent::Module(_) => None,
            }
        }
        _ => None,
    }
}

/// Look up a binding key's `PyName` and resolve its entity.
pub fn entity_of_binding(ctx: &Ctx, key: &BindingKey) -> Entity {
    let Some(entry) = ctx.project.module_by_id(key.module) else {
        return Entity::Unknown;
    };
    match lookup_binding(&entry, key) {
        Some(pyname) => resolve_pyname(ctx, &entry, &pyname),
        None => Entity::Unknown,
    }
}
