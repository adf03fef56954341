//! Occurrence finding: every textual range referring to a binding.
//!
//! Two stages per file: a cheap whole-word regex prescan over the raw
//! text, then a precise check that resolves the candidate offset through
//! the cached module and compares binding identity with the target.
//! Filters compose: identity match, in-hierarchy (same-named methods on
//! related classes), imports on/off, and an `unsure` mode that reports
//! offsets whose identity cannot be determined (attribute on an
//! unknown-typed receiver).
//!
//! Results stream lazily in (resource-enumeration-order,
//! in-file-offset-order). The task handle is polled between resources;
//! cancellation leaves already-yielded results valid and simply ends the
//! stream.

use std::collections::{HashSet, VecDeque};

use hawser_ast::nodes::{Stmt, StmtKind};
use hawser_ast::parser;
use hawser_ast::visitor::child_stmts;
use hawser_core::error::{HawserError, HawserResult};
use hawser_core::task::TaskHandle;
use hawser_core::workspace::Resource;
use regex::Regex;
use tracing::debug;

use crate::inference::{self, Ctx};
use crate::locator::WordLocator;
use crate::names::{BindingKey, BindingOwner, PyName, TargetIdent};
use crate::objects::{DefKind, Entity, ModuleId};
use crate::project::{lookup_binding, ModuleEntry, NameAtOffset, Project};
use crate::scope::ScopeKind;

// ============================================================================
// Options and Records
// ============================================================================

/// Filters for an occurrence search.
#[derive(Debug, Clone)]
pub struct FindOptions {
    /// Also yield offsets whose identity cannot be decided.
    pub unsure: bool,
    /// For methods, accept same-named methods on related classes.
    pub in_hierarchy: bool,
    /// Count appearances inside import statements.
    pub imports: bool,
    /// Restrict the search to these resources (default: all source files).
    pub resources: Option<Vec<Resource>>,
}

impl Default for FindOptions {
    fn default() -> Self {
        FindOptions {
            unsure: false,
            in_hierarchy: false,
            imports: true,
            resources: None,
        }
    }
}

/// One textual occurrence of the target.
#[derive(Debug, Clone)]
pub struct Occurrence {
    pub resource: Resource,
    pub start: usize,
    pub end: usize,
    /// Start of the enclosing primary chain.
    pub primary_start: usize,
    /// The occurrence writes the name (assignment target or definition).
    pub is_written: bool,
    /// Identity could not be decided precisely.
    pub is_unsure: bool,
    pub lineno: u32,
}

// ============================================================================
// Offset Resolution
// ============================================================================

/// Resolve the binding referred to at `offset`, the precise half of the
/// occurrence check and the engine behind `pyname_at`.
pub(crate) fn name_at_offset(
    ctx: &Ctx,
    entry: &ModuleEntry,
    offset: usize,
) -> Option<NameAtOffset> {
    let locator = WordLocator::new(&entry.source);
    let (word, span) = locator.word_at(offset)?;
    let lineno = entry.lines.line_number(offset);

    // Imports are handled from the AST: the statement names modules and
    // foreign bindings, not local ones.
    if let Some(target) = import_target_at(ctx, entry, offset, word) {
        return Some(NameAtOffset {
            word: word.to_string(),
            span,
            target,
        });
    }

    let holding = entry.analysis.scopes.inner_scope_for_line(lineno);
    // A def/class header name is bound in the defining scope, not in the
    // scope the header opens.
    let lookup_scope = {
        let scope = entry.analysis.scopes.get(holding);
        if locator.is_name_in_def_header(offset)
            && scope.start_line == lineno
            && scope.name.as_deref() == Some(word)
        {
            scope.parent.unwrap_or(holding)
        } else {
            holding
        }
    };

    let (primary, _) = locator.primary_at(offset)?;
    let target = if primary.contains('.') && primary != word {
        // Attribute position: evaluate the receiver chain and look the
        // final word up on it.
        let receiver_text = primary
            .strip_suffix(word)
            .and_then(|p| p.trim_end().strip_suffix('.'))
            .map(str::trim_end)?
            .to_string();
        let receiver = eval_fragment(ctx, entry, lookup_scope, &receiver_text)?;
        let key = inference::attribute_target(ctx, &receiver, word)?;
        TargetIdent::Binding(key)
    } else {
        inference::resolve_binding(ctx, entry, lookup_scope, word)?
    };
    Some(NameAtOffset {
        word: word.to_string(),
        span,
        target,
    })
}

/// The entity the primary at `offset` evaluates to.
pub(crate) fn entity_at_offset(ctx: &Ctx, entry: &ModuleEntry, offset: usize) -> Option<Entity> {
    let locator = WordLocator::new(&entry.source);
    let (primary, _) = locator.primary_at(offset)?;
    let lineno = entry.lines.line_number(offset);
    let holding = entry.analysis.scopes.inner_scope_for_line(lineno);
    if let Some(entity) = eval_fragment(ctx, entry, holding, &primary) {
        if !entity.is_unknown() {
            return Some(entity);
        }
    }
    // Fall back to the binding of the bare word.
    let found = name_at_offset(ctx, entry, offset)?;
    match found.target {
        TargetIdent::Binding(key) => Some(inference::entity_of_binding(ctx, &key)),
        TargetIdent::Module(id) => Some(Entity::Module(id)),
    }
}

/// Parse a primary fragment as an expression and evaluate it in `scope`.
fn eval_fragment(
    ctx: &Ctx,
    entry: &ModuleEntry,
    scope: crate::scope::ScopeId,
    fragment: &str,
) -> Option<Entity> {
    let module = parser::parse(fragment).ok()?;
    let stmt = module.body.first()?;
    let StmtKind::Expr(expr) = &stmt.kind else {
        return None;
    };
    Some(inference::eval_expr(ctx, entry, scope, expr))
}

/// When `offset` is inside an import statement, resolve what the word at
/// that position names: a module (import or from-module position) or the
/// original binding in the imported module (from-name position).
fn import_target_at(
    ctx: &Ctx,
    entry: &ModuleEntry,
    offset: usize,
    word: &str,
) -> Option<TargetIdent> {
    let stmt = find_import_stmt(&entry.ast.body, offset)?;
    match &stmt.kind {
        StmtKind::Import { names } => {
            for alias in names {
                if !alias.span.contains(offset) {
                    continue;
                }
                // `import a.b.c` with the cursor on `b` names module a.b.
                let rel = (offset - alias.span.start).min(alias.name.len());
                let prefix_end = alias.name[rel..]
                    .find('.')
                    .map(|i| rel + i)
                    .unwrap_or(alias.name.len());
                let dotted = &alias.name[..prefix_end];
                let module_ref = crate::names::ModuleRef::absolute(dotted);
                let target = inference::module_entry_of_ref(ctx, entry, &module_ref)?;
                return Some(TargetIdent::Module(target.id));
            }
            None
        }
        StmtKind::ImportFrom {
            module,
            module_span,
            level,
            names,
            ..
        } => {
            if module_span.contains(offset) {
                // Resolve the dotted prefix ending at the cursor's word.
                let rel = offset.checked_sub(module_span.start)?;
                let text = &entry.source[module_span.start..module_span.end];
                let prefix_end = text[rel..].find('.').map(|i| rel + i).unwrap_or(text.len());
                let dotted = text[..prefix_end].trim_start_matches('.');
                let module_ref = crate::names::ModuleRef {
                    name: dotted.to_string(),
                    level: *level,
                };
                let target = inference::module_entry_of_ref(ctx, entry, &module_ref)?;
                return Some(TargetIdent::Module(target.id));
            }
            for alias in names {
                if alias.span.contains(offset) && alias.name == word {
                    let module_ref = crate::names::ModuleRef {
                        name: module.clone(),
                        level: *level,
                    };
                    let target = inference::module_entry_of_ref(ctx, entry, &module_ref)?;
                    return inference::module_attribute_binding(ctx, &target, word);
                }
            }
            None
        }
        _ => None,
    }
}

fn find_import_stmt<'a>(body: &'a [Stmt], offset: usize) -> Option<&'a Stmt> {
    for stmt in body {
        if matches!(
            stmt.kind,
            StmtKind::Import { .. } | StmtKind::ImportFrom { .. }
        ) && stmt.span.contains(offset)
        {
            return Some(stmt);
        }
        if stmt.span.contains(offset) {
            if let Some(found) = find_import_stmt_children(stmt, offset) {
                return Some(found);
            }
        }
    }
    None
}

fn find_import_stmt_children<'a>(stmt: &'a Stmt, offset: usize) -> Option<&'a Stmt> {
    for child in child_stmts(stmt) {
        if matches!(
            child.kind,
            StmtKind::Import { .. } | StmtKind::ImportFrom { .. }
        ) && child.span.contains(offset)
        {
            return Some(child);
        }
        if child.span.contains(offset) {
            if let Some(found) = find_import_stmt_children(child, offset) {
                return Some(found);
            }
        }
    }
    None
}

fn in_import_span(entry: &ModuleEntry, offset: usize) -> bool {
    entry
        .analysis
        .import_spans
        .iter()
        .any(|span| span.contains(offset))
}

// ============================================================================
// Finder
// ============================================================================

/// Resolved search target: the identity set and the textual names to
/// prescan for.
#[derive(Debug)]
pub struct OccurrenceFinder<'p> {
    project: &'p Project,
    idents: HashSet<TargetIdent>,
    names: Vec<String>,
    options: FindOptions,
}

impl<'p> OccurrenceFinder<'p> {
    /// Build a finder for the name at `offset` in `resource`.
    pub fn new(
        project: &'p Project,
        resource: &Resource,
        offset: usize,
        options: FindOptions,
    ) -> HawserResult<Self> {
        let entry = project.resource_to_module(resource)?;
        let ctx = Ctx::new(project);
        let found = name_at_offset(&ctx, &entry, offset)
            .ok_or_else(|| HawserError::bad_identifier(resource.path(), offset))?;

        let mut idents = HashSet::new();
        let mut names = vec![found.word.clone()];
        if let TargetIdent::Binding(key) = &found.target {
            // An alias and its original are one occurrence set; scan for
            // both spellings.
            if key.name != found.word {
                names.push(key.name.clone());
            }
            if options.in_hierarchy {
                idents.extend(hierarchy_targets(&ctx, key));
            }
        }
        idents.insert(found.target);
        debug!(?names, targets = idents.len(), "occurrence target resolved");
        Ok(OccurrenceFinder {
            project,
            idents,
            names,
            options,
        })
    }

    /// The lazy stream of occurrences.
    pub fn occurrences(self, task: TaskHandle) -> HawserResult<Occurrences<'p>> {
        let resources = match &self.options.resources {
            Some(resources) => resources.clone(),
            None => self.project.workspace().source_files()?,
        };
        Ok(Occurrences {
            finder: self,
            resources,
            next: 0,
            buffer: VecDeque::new(),
            task,
        })
    }

    fn scan_resource(&self, resource: &Resource) -> Vec<Occurrence> {
        let Ok(entry) = self.project.resource_to_module(resource) else {
            // Unparsable modules contribute no occurrences; the scan
            // continues with the remaining resources.
            return Vec::new();
        };
        let locator = WordLocator::new(&entry.source);
        let ctx = Ctx::new(self.project);
        let mut result = Vec::new();
        for name in &self.names {
            let pattern = match Regex::new(&format!(r"\b{}\b", regex::escape(name))) {
                Ok(p) => p,
                Err(_) => continue,
            };
            for found in pattern.find_iter(&entry.source) {
                let offset = found.start();
                if locator.is_in_string(offset) || locator.is_in_comment(offset) {
                    continue;
                }
                if !self.options.imports && in_import_span(&entry, offset) {
                    continue;
                }
                let resolved = name_at_offset(&ctx, &entry, offset);
                let is_unsure = match &resolved {
                    Some(at) => {
                        if !self.idents.contains(&at.target) {
                            continue;
                        }
                        false
                    }
                    None => {
                        if !self.options.unsure {
                            continue;
                        }
                        true
                    }
                };
                let primary_start = locator
                    .primary_at(offset)
                    .map(|(_, span)| span.start)
                    .unwrap_or(offset);
                result.push(Occurrence {
                    resource: resource.clone(),
                    start: offset,
                    end: found.end(),
                    primary_start,
                    is_written: locator.is_assigned_here(offset)
                        || locator.is_name_in_def_header(offset),
                    is_unsure,
                    lineno: entry.lines.line_number(offset),
                });
            }
        }
        result.sort_by_key(|o| o.start);
        result
    }
}

/// Lazy occurrence sequence; yields in (resource order, offset order)
/// and polls the task handle between resources.
pub struct Occurrences<'p> {
    finder: OccurrenceFinder<'p>,
    resources: Vec<Resource>,
    next: usize,
    buffer: VecDeque<Occurrence>,
    task: TaskHandle,
}

impl Iterator for Occurrences<'_> {
    type Item = Occurrence;

    fn next(&mut self) -> Option<Occurrence> {
        loop {
            if let Some(occurrence) = self.buffer.pop_front() {
                return Some(occurrence);
            }
            if self.next >= self.resources.len() || self.task.is_stopped() {
                return None;
            }
            let resource = self.resources[self.next].clone();
            self.next += 1;
            self.task.started_job(resource.path());
            self.buffer.extend(self.finder.scan_resource(&resource));
            self.task.finished_job();
        }
    }
}

// ============================================================================
// Hierarchy Expansion
// ============================================================================

/// For a method target, the same-named methods declared on related
/// classes (super- and subclasses), as additional identities.
fn hierarchy_targets(ctx: &Ctx, key: &BindingKey) -> HashSet<TargetIdent> {
    let mut result = HashSet::new();
    let Some(entry) = ctx.project.module_by_id(key.module) else {
        return result;
    };
    // The target must be a function defined in a class body.
    let BindingOwner::Scope(owner_scope) = key.owner else {
        return result;
    };
    let Some(PyName::Defined(def)) = lookup_binding(&entry, key) else {
        return result;
    };
    if entry.analysis.def(def).kind != DefKind::Function {
        return result;
    }
    let owner = entry.analysis.scopes.get(owner_scope);
    if owner.kind != ScopeKind::Class {
        return result;
    }
    let Some(target_class_def) = owner.def else {
        return result;
    };
    let target_class = (entry.id, target_class_def);

    let Ok(files) = ctx.project.workspace().source_files() else {
        return result;
    };
    for resource in files {
        let Ok(other) = ctx.project.resource_to_module(&resource) else {
            continue;
        };
        for (def_index, info) in other.analysis.defs.iter().enumerate() {
            if info.kind != DefKind::Class {
                continue;
            }
            let class = (other.id, crate::objects::DefId(def_index as u32));
            if class != target_class
                && !is_ancestor(ctx, class, target_class)
                && !is_ancestor(ctx, target_class, class)
            {
                continue;
            }
            let scope = other.analysis.scopes.get(info.scope);
            if matches!(scope.names.get(&key.name), Some(PyName::Defined(_))) {
                result.insert(TargetIdent::Binding(BindingKey::new(
                    other.id,
                    BindingOwner::Scope(info.scope),
                    key.name.clone(),
                )));
            }
        }
    }
    result
}

/// Whether `ancestor` appears in `class`'s transitive base classes.
fn is_ancestor(
    ctx: &Ctx,
    class: (ModuleId, crate::objects::DefId),
    ancestor: (ModuleId, crate::objects::DefId),
) -> bool {
    let mut visited = HashSet::new();
    let mut stack = vec![class];
    while let Some(current) = stack.pop() {
        if !visited.insert(current) {
            continue;
        }
        let Some(entry) = ctx.project.module_by_id(current.0) else {
            continue;
        };
        for base in inference::class_bases(ctx, &entry, current.1) {
            if let Entity::Class(m, d) = base {
                if (m, d) == ancestor {
                    return true;
                }
                stack.push((m, d));
            }
        }
    }
    false
}

// ============================================================================
// Convenience Entry Point
// ============================================================================

/// Find all occurrences eagerly under a fresh task handle.
pub fn find_occurrences(
    project: &Project,
    resource: &Resource,
    offset: usize,
    options: FindOptions,
) -> HawserResult<Vec<Occurrence>> {
    let finder = OccurrenceFinder::new(project, resource, offset, options)?;
    Ok(finder.occurrences(TaskHandle::new())?.collect())
}

// ============================================================================
// Tests
// ============================================================================
