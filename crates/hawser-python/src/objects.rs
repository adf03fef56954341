//! The object model: entities and AST-backed definitions.
//!
//! An [`Entity`] is the compile-time value assigned to a source construct.
//! Cross-entity edges are indices ([`ModuleId`], [`DefId`]) into the
//! workspace's module table rather than embedded values, so cyclic graphs
//! (mutual imports, inheritance cycles, instances of their own class)
//! need no ownership gymnastics and resolve lazily.

use std::collections::HashMap;
use std::fmt;

use hawser_ast::nodes::{Expr, Params, Span};

use crate::names::PyName;
use crate::scope::ScopeId;

// ============================================================================
// Ids
// ============================================================================

/// Index of a module in the workspace module table. Stable per path for
/// the lifetime of a project; content changes rebuild the analysis under
/// the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(pub u32);

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mod_{}", self.0)
    }
}

/// Index of a class/function definition within its module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DefId(pub u32);

impl fmt::Display for DefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "def_{}", self.0)
    }
}

// ============================================================================
// Definitions
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefKind {
    Class,
    Function,
}

/// Classification of a function by its decorators and parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Function,
    Method,
    StaticMethod,
    ClassMethod,
}

/// An AST-backed class or function definition.
///
/// The pieces inference needs are extracted at scope-build time so the
/// definition is self-contained: bases and decorators for classes,
/// parameters and collected return/yield expressions for functions, and
/// the instance-attribute table fed by `self.x = ...` in method bodies.
#[derive(Debug, Clone)]
pub struct DefInfo {
    pub kind: DefKind,
    pub name: String,
    pub name_span: Span,
    pub lineno: u32,
    /// The scope of this definition's body.
    pub scope: ScopeId,
    /// The scope the definition appears in.
    pub parent_scope: ScopeId,
    /// Base-class expressions, evaluated lazily (classes only).
    pub bases: Vec<Expr>,
    pub decorators: Vec<Expr>,
    /// Formal parameters (functions only).
    pub params: Params,
    /// Every `return EXPR` in the body (functions only).
    pub returned: Vec<Expr>,
    /// Every `yield EXPR` in the body; any yield makes a generator.
    pub yielded: Vec<Expr>,
    pub is_generator: bool,
    /// Instance attributes bound via `self.x = ...` in this class's
    /// methods (classes only).
    pub instance_attrs: HashMap<String, PyName>,
}

impl DefInfo {
    pub fn new_class(
        name: String,
        name_span: Span,
        lineno: u32,
        scope: ScopeId,
        parent_scope: ScopeId,
        bases: Vec<Expr>,
        decorators: Vec<Expr>,
    ) -> Self {
        DefInfo {
            kind: DefKind::Class,
            name,
            name_span,
            lineno,
            scope,
            parent_scope,
            bases,
            decorators,
            params: Params::default(),
            returned: Vec::new(),
            yielded: Vec::new(),
            is_generator: false,
            instance_attrs: HashMap::new(),
        }
    }

    pub fn new_function(
        name: String,
        name_span: Span,
        lineno: u32,
        scope: ScopeId,
        parent_scope: ScopeId,
        params: Params,
        decorators: Vec<Expr>,
    ) -> Self {
        DefInfo {
            kind: DefKind::Function,
            name,
            name_span,
            lineno,
            scope,
            parent_scope,
            bases: Vec::new(),
            decorators,
            params,
            returned: Vec::new(),
            yielded: Vec::new(),
            is_generator: false,
            instance_attrs: HashMap::new(),
        }
    }
}

// ============================================================================
// Entities
// ============================================================================

/// Built-in entities: atomic types, containers parameterised by the
/// entity they hold, and the `Type`/`Function` sentinels used as the
/// types of classes and functions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BuiltinEntity {
    Str,
    Int,
    Float,
    Bool,
    List(Box<Entity>),
    Dict(Box<Entity>, Box<Entity>),
    Tuple(Vec<Entity>),
    Set(Box<Entity>),
    Iterator(Box<Entity>),
    Generator(Box<Entity>),
    File,
    /// The type of classes.
    Type,
    /// The type of functions.
    Function,
    /// A bound method on a builtin receiver, e.g. `"hi".upper`.
    Method {
        receiver: Box<BuiltinEntity>,
        name: String,
    },
}

impl BuiltinEntity {
    /// The wire/identity tag for this builtin kind.
    pub fn kind_name(&self) -> &'static str {
        match self {
            BuiltinEntity::Str => "str",
            BuiltinEntity::Int => "int",
            BuiltinEntity::Float => "float",
            BuiltinEntity::Bool => "bool",
            BuiltinEntity::List(_) => "list",
            BuiltinEntity::Dict(_, _) => "dict",
            BuiltinEntity::Tuple(_) => "tuple",
            BuiltinEntity::Set(_) => "set",
            BuiltinEntity::Iterator(_) => "iter",
            BuiltinEntity::Generator(_) => "generator",
            BuiltinEntity::File => "file",
            BuiltinEntity::Type => "type",
            BuiltinEntity::Function => "function",
            BuiltinEntity::Method { .. } => "method",
        }
    }
}

/// The compile-time value of a source construct.
///
/// `Unknown` is a legitimate inference result, never an error: missing
/// attributes, unresolved names and cut-off recursion all degrade to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Entity {
    #[default]
    Unknown,
    None,
    Module(ModuleId),
    /// A folder package addressed by its resource path; its associated
    /// module (the initializer) is resolved on demand.
    Package(String),
    Class(ModuleId, DefId),
    Function(ModuleId, DefId),
    /// An object typed by a class entity.
    Instance(Box<Entity>),
    Builtin(BuiltinEntity),
}

impl Entity {
    pub fn is_unknown(&self) -> bool {
        matches!(self, Entity::Unknown)
    }

    /// The entity representing this entity's type: classes are typed by
    /// the `Type` sentinel, functions by `Function`, instances by their
    /// class.
    pub fn get_type(&self) -> Entity {
        match self {
            Entity::Class(_, _) => Entity::Builtin(BuiltinEntity::Type),
            Entity::Function(_, _) => Entity::Builtin(BuiltinEntity::Function),
            Entity::Instance(class) => (**class).clone(),
            Entity::Builtin(b) => Entity::Builtin(b.clone()),
            Entity::Module(_) | Entity::Package(_) | Entity::None | Entity::Unknown => {
                Entity::Unknown
            }
        }
    }

    pub fn instance_of(class: Entity) -> Entity {
        Entity::Instance(Box::new(class))
    }

    pub fn str() -> Entity {
        Entity::Builtin(BuiltinEntity::Str)
    }

    pub fn int() -> Entity {
        Entity::Builtin(BuiltinEntity::Int)
    }

    pub fn list_of(element: Entity) -> Entity {
        Entity::Builtin(BuiltinEntity::List(Box::new(element)))
    }

    pub fn dict_of(key: Entity, value: Entity) -> Entity {
        Entity::Builtin(BuiltinEntity::Dict(Box::new(key), Box::new(value)))
    }

    /// Merge two inference results: the first known value wins, so
    /// accumulated assignment sites degrade gracefully.
    pub fn merge(self, other: Entity) -> Entity {
        if self.is_unknown() {
            other
        } else {
            self
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_is_typed_by_type_sentinel() {
        let class = Entity::Class(ModuleId(0), DefId(0));
        assert_eq!(class.get_type(), Entity::Builtin(BuiltinEntity::Type));
    }

    #[test]
    fn instance_is_typed_by_its_class() {
        let class = Entity::Class(ModuleId(0), DefId(1));
        let instance = Entity::instance_of(class.clone());
        assert_eq!(instance.get_type(), class);
    }

    #[test]
    fn merge_prefers_first_known() {
        assert_eq!(Entity::Unknown.merge(Entity::int()), Entity::int());
        assert_eq!(Entity::str().merge(Entity::int()), Entity::str());
    }

    #[test]
    fn builtin_kind_names_are_stable() {
        assert_eq!(BuiltinEntity::Str.kind_name(), "str");
        assert_eq!(
            BuiltinEntity::List(Box::new(Entity::Unknown)).kind_name(),
            "list"
        );
        assert_eq!(
            BuiltinEntity::Generator(Box::new(Entity::Unknown)).kind_name(),
            "generator"
        );
    }
}
