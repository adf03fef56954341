//! The project: workspace-wide analysis cache and query API.
//!
//! [`Project`] owns the module cache (path + content hash → parsed and
//! scope-analyzed module), the concluded-data tables, and the runtime
//! hint evidence. All caches live on the project value; there are no
//! process-wide singletons. Module text is ground truth: whenever a
//! resource's bytes change, its cached module is rebuilt under the same
//! [`ModuleId`] and the generation counter invalidates every concluded
//! fact derived from the old tree.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::hash::Hash;
use std::path::PathBuf;
use std::rc::Rc;

use hawser_ast::nodes::Span;
use hawser_ast::parser;
use hawser_core::config::WorkspaceConfig;
use hawser_core::error::{HawserError, HawserResult};
use hawser_core::text::LineIndex;
use hawser_core::workspace::{ContentHash, Resource, Workspace};
use tracing::debug;

use crate::analyzer::{self, ModuleAnalysis};
use crate::inference::Ctx;
use crate::names::{BindingKey, BindingOwner, PyName, TargetIdent};
use crate::objects::{DefId, Entity, ModuleId};
use crate::occurrences;

// ============================================================================
// Module Entries
// ============================================================================

/// One analyzed module: source text, AST, line index and scope tree.
///
/// Entries are immutable snapshots shared by queries via `Rc`; the cache
/// replaces the whole entry when the underlying bytes change.
#[derive(Debug)]
pub struct ModuleEntry {
    pub id: ModuleId,
    pub path: String,
    pub resource: Resource,
    pub source: String,
    pub hash: ContentHash,
    pub ast: hawser_ast::nodes::Module,
    pub lines: LineIndex,
    pub analysis: ModuleAnalysis,
}

impl ModuleEntry {
    /// The folder containing this module, for relative import resolution.
    pub fn folder(&self) -> &str {
        self.resource.parent_path()
    }
}

// ============================================================================
// Concluded Data
// ============================================================================

/// A memoized derived fact: value slot, the generation it was computed
/// against, and an in-progress flag that short-circuits cycles.
#[derive(Debug, Clone)]
struct ConcludedData<V> {
    value: Option<V>,
    generation: u64,
    in_progress: bool,
}

/// Table of concluded data, invalidated wholesale by generation bumps.
#[derive(Debug)]
pub(crate) struct ConcludedTable<K, V> {
    map: RefCell<HashMap<K, ConcludedData<V>>>,
}

impl<K: Eq + Hash + Clone, V: Clone> Default for ConcludedTable<K, V> {
    fn default() -> Self {
        ConcludedTable {
            map: RefCell::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash + Clone, V: Clone> ConcludedTable<K, V> {
    pub fn get(&self, key: &K, generation: u64) -> Option<V> {
        let map = self.map.borrow();
        let data = map.get(key)?;
        if data.generation != generation {
            return None;
        }
        data.value.clone()
    }

    /// Mark a computation as started. Returns `false` when the key is
    /// already being computed, so the caller must return "unknown" instead
    /// of recursing.
    pub fn enter(&self, key: &K, generation: u64) -> bool {
        let mut map = self.map.borrow_mut();
        let data = map.entry(key.clone()).or_insert(ConcludedData {
            value: None,
            generation,
            in_progress: false,
        });
        if data.in_progress {
            return false;
        }
        if data.generation != generation {
            // A stale value from a previous generation must not be
            // observable while the new one is being computed.
            data.value = None;
        }
        data.in_progress = true;
        data.generation = generation;
        true
    }

    pub fn store(&self, key: &K, generation: u64, value: V) {
        self.map.borrow_mut().insert(
            key.clone(),
            ConcludedData {
                value: Some(value),
                generation,
                in_progress: false,
            },
        );
    }

    pub fn exit(&self, key: &K) {
        if let Some(data) = self.map.borrow_mut().get_mut(key) {
            data.in_progress = false;
        }
    }
}

// ============================================================================
// Hint Evidence
// ============================================================================

/// Parameter/return evidence for one function, merged from runtime hints.
///
/// Evidence lists keep insertion order so presentation layers preferring
/// recency can take the last element; inference unions conservatively.
#[derive(Debug, Clone, Default)]
pub struct FnEvidence {
    pub params: Vec<Vec<Entity>>,
    pub returns: Vec<Entity>,
}

// ============================================================================
// Project
// ============================================================================

/// A name resolved at an offset.
#[derive(Debug, Clone)]
pub struct NameAtOffset {
    /// The word at the offset.
    pub word: String,
    /// Span of the word.
    pub span: Span,
    /// Identity of what it refers to.
    pub target: TargetIdent,
}

/// The root analysis container for one workspace.
pub struct Project {
    workspace: Workspace,
    ids: RefCell<HashMap<String, ModuleId>>,
    modules: RefCell<Vec<Option<Rc<ModuleEntry>>>>,
    generation: Cell<u64>,
    pub(crate) concluded_bases: ConcludedTable<(ModuleId, DefId), Vec<Entity>>,
    pub(crate) concluded_returns: ConcludedTable<(ModuleId, DefId), Entity>,
    pub(crate) concluded_params: ConcludedTable<(ModuleId, DefId), Vec<Entity>>,
    pub(crate) concluded_attrs:
        ConcludedTable<(ModuleId, DefId), HashMap<String, (BindingKey, PyName)>>,
    hints: RefCell<HashMap<(ModuleId, DefId), FnEvidence>>,
}

impl std::fmt::Debug for Project {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Project")
            .field("root", &self.workspace.root())
            .finish()
    }
}

impl Project {
    /// Open the project rooted at `root` with default configuration.
    pub fn open(root: impl Into<PathBuf>) -> HawserResult<Self> {
        Ok(Project::new(Workspace::open(root)?))
    }

    /// Open with explicit configuration.
    pub fn with_config(root: impl Into<PathBuf>, config: WorkspaceConfig) -> HawserResult<Self> {
        Ok(Project::new(Workspace::with_config(root, config)?))
    }

    fn new(workspace: Workspace) -> Self {
        Project {
            workspace,
            ids: RefCell::new(HashMap::new()),
            modules: RefCell::new(Vec::new()),
            generation: Cell::new(0),
            concluded_bases: ConcludedTable::default(),
            concluded_returns: ConcludedTable::default(),
            concluded_params: ConcludedTable::default(),
            concluded_attrs: ConcludedTable::default(),
            hints: RefCell::new(HashMap::new()),
        }
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn config(&self) -> &WorkspaceConfig {
        self.workspace.config()
    }

    /// Generation of derived data; bumped whenever any module is rebuilt.
    pub(crate) fn generation(&self) -> u64 {
        self.generation.get()
    }

    // ------------------------------------------------------------------
    // Module cache
    // ------------------------------------------------------------------

    fn id_for(&self, path: &str) -> ModuleId {
        let mut ids = self.ids.borrow_mut();
        if let Some(&id) = ids.get(path) {
            return id;
        }
        let id = ModuleId(ids.len() as u32);
        ids.insert(path.to_string(), id);
        self.modules.borrow_mut().push(None);
        id
    }

    /// The analyzed module for a file resource, cached by content hash.
    pub fn resource_to_module(&self, resource: &Resource) -> HawserResult<Rc<ModuleEntry>> {
        self.module_for_path(resource.path())
    }

    /// The analyzed module for a root-relative path.
    pub fn module_for_path(&self, path: &str) -> HawserResult<Rc<ModuleEntry>> {
        let id = self.id_for(path);
        let resource = self
            .workspace
            .resource(path)
            .map_err(|_| HawserError::resource_not_found(path))?;
        let current_hash = if resource.is_folder() {
            // A package folder without an initializer has no text; its
            // identity is the path itself.
            ContentHash::compute(path.as_bytes())
        } else {
            self.workspace
                .content_hash(&resource)
                .map_err(|_| HawserError::resource_not_found(path))?
        };
        if let Some(entry) = self.modules.borrow()[id.0 as usize].clone() {
            if entry.hash == current_hash {
                return Ok(entry);
            }
        }
        let entry = Rc::new(self.build_entry(id, path, current_hash)?);
        self.modules.borrow_mut()[id.0 as usize] = Some(entry.clone());
        // Any rebuild invalidates concluded data derived from the old
        // tree, in this module and in its dependents.
        self.generation.set(self.generation.get() + 1);
        Ok(entry)
    }

    fn build_entry(
        &self,
        id: ModuleId,
        path: &str,
        hash: ContentHash,
    ) -> HawserResult<ModuleEntry> {
        let resource = self.workspace.resource(path)?;
        let source = if resource.is_folder() {
            // A package without an initializer analyzes as empty.
            String::new()
        } else {
            self.workspace.read(&resource)?
        };
        let ast = match parser::parse(&source) {
            Ok(ast) => ast,
            Err(err) => {
                if self.config().ignore_syntax_errors {
                    debug!(path, line = err.line, "ignoring syntax error");
                    hawser_ast::nodes::Module::empty()
                } else {
                    return Err(HawserError::syntax(path, err.line, err.message));
                }
            }
        };
        let lines = LineIndex::new(&source);
        let analysis = analyzer::analyze(&ast, &lines);
        debug!(path, %id, "analyzed module");
        Ok(ModuleEntry {
            id,
            path: path.to_string(),
            resource,
            source,
            hash,
            ast,
            lines,
            analysis,
        })
    }

    /// Look a module up by dotted name, searching the source roots (and
    /// `current_folder` first, when given).
    pub fn module(
        &self,
        name: &str,
        current_folder: Option<&str>,
    ) -> HawserResult<Rc<ModuleEntry>> {
        let found = crate::resolver::find_module(
            &self.workspace,
            &self.config().source_folders,
            name,
            0,
            current_folder,
        )?;
        if found.is_package {
            match crate::resolver::package_init(&self.workspace, &found.path) {
                Some(init) => self.module_for_path(&init),
                None => self.module_for_path(&found.path),
            }
        } else {
            self.module_for_path(&found.path)
        }
    }

    /// A previously assigned module entry by id, if still cached.
    pub fn module_by_id(&self, id: ModuleId) -> Option<Rc<ModuleEntry>> {
        self.modules.borrow().get(id.0 as usize)?.clone()
    }

    /// Path registered for a module id.
    pub fn path_of(&self, id: ModuleId) -> Option<String> {
        self.ids
            .borrow()
            .iter()
            .find(|(_, &v)| v == id)
            .map(|(k, _)| k.clone())
    }

    // ------------------------------------------------------------------
    // Hints
    // ------------------------------------------------------------------

    /// Merge one observed call into a function's evidence.
    pub fn add_call_evidence(
        &self,
        function: (ModuleId, DefId),
        args: Vec<Entity>,
        returned: Entity,
    ) {
        let mut hints = self.hints.borrow_mut();
        let evidence = hints.entry(function).or_default();
        if evidence.params.len() < args.len() {
            evidence.params.resize(args.len(), Vec::new());
        }
        for (index, arg) in args.into_iter().enumerate() {
            if !arg.is_unknown() {
                evidence.params[index].push(arg);
            }
        }
        if !returned.is_unknown() {
            evidence.returns.push(returned);
        }
    }

    pub fn evidence_for(&self, function: (ModuleId, DefId)) -> Option<FnEvidence> {
        self.hints.borrow().get(&function).cloned()
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// The binding referred to at `offset` in `resource`.
    pub fn pyname_at(&self, resource: &Resource, offset: usize) -> HawserResult<NameAtOffset> {
        let module = self.resource_to_module(resource)?;
        let ctx = Ctx::new(self);
        occurrences::name_at_offset(&ctx, &module, offset)
            .ok_or_else(|| HawserError::bad_identifier(resource.path(), offset))
    }

    /// The entity the primary at `offset` evaluates to.
    pub fn entity_at(&self, resource: &Resource, offset: usize) -> HawserResult<Entity> {
        let module = self.resource_to_module(resource)?;
        let ctx = Ctx::new(self);
        occurrences::entity_at_offset(&ctx, &module, offset)
            .ok_or_else(|| HawserError::bad_identifier(resource.path(), offset))
    }

    /// Every occurrence of the binding at `offset`, eagerly collected.
    /// Long-running callers hold an [`crate::occurrences::OccurrenceFinder`]
    /// instead and stream with their own task handle.
    pub fn find_occurrences(
        &self,
        resource: &Resource,
        offset: usize,
        options: crate::occurrences::FindOptions,
    ) -> HawserResult<Vec<crate::occurrences::Occurrence>> {
        occurrences::find_occurrences(self, resource, offset, options)
    }

    /// Where the name at `offset` was defined: `(resource, lineno)`.
    pub fn definition_location(
        &self,
        resource: &Resource,
        offset: usize,
    ) -> HawserResult<Option<(Resource, u32)>> {
        let found = self.pyname_at(resource, offset)?;
        Ok(self.location_of_target(&found.target))
    }

    pub(crate) fn location_of_target(&self, target: &TargetIdent) -> Option<(Resource, u32)> {
        match target {
            TargetIdent::Module(id) => {
                let entry = self.module_by_id(*id)?;
                Some((entry.resource.clone(), 1))
            }
            TargetIdent::Binding(key) => {
                let entry = self.module_by_id(key.module)?;
                let pyname = lookup_binding(&entry, key)?;
                let lineno = match &pyname {
                    PyName::Defined(def) => entry.analysis.def(*def).lineno,
                    other => other.lineno().unwrap_or(1),
                };
                Some((entry.resource.clone(), lineno))
            }
        }
    }
}

/// Fetch the `PyName` a binding key addresses inside its module.
pub(crate) fn lookup_binding(entry: &ModuleEntry, key: &BindingKey) -> Option<PyName> {
    match key.owner {
        BindingOwner::Scope(scope) => entry.analysis.scopes.get(scope).names.get(&key.name).cloned(),
        BindingOwner::Instance(def) => {
            entry.analysis.def(def).instance_attrs.get(&key.name).cloned()
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn project_with(files: &[(&str, &str)]) -> (TempDir, Project) {
        let dir = TempDir::new().unwrap();
        let project = Project::open(dir.path()).unwrap();
        for (path, content) in files {
            if let Some(parent) = std::path::Path::new(path).parent() {
                let parent = parent.to_string_lossy();
                if !parent.is_empty() && !project.workspace().has_resource(&parent) {
                    project.workspace().create_folder(&parent).unwrap();
                }
            }
            let resource = project.workspace().create_file(path).unwrap();
            project.workspace().write(&resource, content).unwrap();
        }
        (dir, project)
    }

    #[test]
    fn modules_are_cached_by_content() {
        let (_dir, project) = project_with(&[("mod.py", "x = 1\n")]);
        let resource = project.workspace().resource("mod.py").unwrap();
        let first = project.resource_to_module(&resource).unwrap();
        let second = project.resource_to_module(&resource).unwrap();
        assert!(Rc::ptr_eq(&first, &second));
    }

    #[test]
    fn editing_invalidates_and_keeps_module_id() {
        let (_dir, project) = project_with(&[("mod.py", "x = 1\n")]);
        let resource = project.workspace().resource("mod.py").unwrap();
        let first = project.resource_to_module(&resource).unwrap();
        let generation = project.generation();
        project.workspace().write(&resource, "x = 2\ny = 3\n").unwrap();
        let second = project.resource_to_module(&resource).unwrap();
        assert!(!Rc::ptr_eq(&first, &second));
        assert_eq!(first.id, second.id);
        assert!(project.generation() > generation);
    }

    #[test]
    fn syntax_error_surfaces_in_strict_mode() {
        let (_dir, project) = project_with(&[("bad.py", "def broken(:\n")]);
        let resource = project.workspace().resource("bad.py").unwrap();
        let err = project.resource_to_module(&resource).unwrap_err();
        assert!(matches!(err, HawserError::ModuleSyntax { line: 1, .. }));
    }

    #[test]
    fn syntax_error_demotes_to_empty_when_ignored() {
        let dir = TempDir::new().unwrap();
        let config = WorkspaceConfig {
            ignore_syntax_errors: true,
            ..WorkspaceConfig::default()
        };
        let project = Project::with_config(dir.path(), config).unwrap();
        let resource = project.workspace().create_file("bad.py").unwrap();
        project.workspace().write(&resource, "def broken(:\n").unwrap();
        let entry = project.resource_to_module(&resource).unwrap();
        assert!(entry.ast.body.is_empty());
    }

    #[test]
    fn module_lookup_by_dotted_name() {
        let (_dir, project) = project_with(&[
            ("pkg/__init__.py", ""),
            ("pkg/mod.py", "value = 1\n"),
        ]);
        let entry = project.module("pkg.mod", None).unwrap();
        assert_eq!(entry.path, "pkg/mod.py");
        // A package resolves to its initializer module.
        let init = project.module("pkg", None).unwrap();
        assert_eq!(init.path, "pkg/__init__.py");
    }

    #[test]
    fn missing_module_is_module_not_found() {
        let (_dir, project) = project_with(&[]);
        assert!(matches!(
            project.module("ghost", None),
            Err(HawserError::ModuleNotFound { .. })
        ));
    }

    #[test]
    fn concluded_table_generation_invalidation() {
        let table: ConcludedTable<u32, String> = ConcludedTable::default();
        assert!(table.enter(&1, 7));
        table.store(&1, 7, "cached".into());
        assert_eq!(table.get(&1, 7), Some("cached".into()));
        assert_eq!(table.get(&1, 8), None);
    }

    #[test]
    fn concluded_table_detects_cycles() {
        let table: ConcludedTable<u32, String> = ConcludedTable::default();
        assert!(table.enter(&1, 0));
        assert!(!table.enter(&1, 0));
        table.exit(&1);
        assert!(table.enter(&1, 0));
    }

    #[test]
    fn call_evidence_accumulates() {
        let (_dir, project) = project_with(&[]);
        let key = (ModuleId(0), DefId(0));
        project.add_call_evidence(key, vec![Entity::int()], Entity::str());
        project.add_call_evidence(key, vec![Entity::str()], Entity::Unknown);
        let evidence = project.evidence_for(key).unwrap();
        assert_eq!(evidence.params[0].len(), 2);
        assert_eq!(evidence.returns, vec![Entity::str()]);
    }
}
