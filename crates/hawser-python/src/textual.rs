//! Textual identity: stable, serializable entity forms.
//!
//! Used to persist inference-derived knowledge across runs and to
//! correlate dynamic trace records with static entities. Forms mirror
//! the classic tuple shapes:
//!
//! - `("defined", absolute_module_path[, dotted_name])`
//! - `("instance", <defined-form>)`
//! - `("builtin", kind, <element-forms...>)`
//! - `("unknown",)` / `("none",)`
//!
//! Decoding is forward compatible: unknown tags decode to `Unknown`.

use serde_json::{json, Value};

use crate::inference::Ctx;
use crate::names::PyName;
use crate::objects::{BuiltinEntity, DefId, DefKind, Entity};
use crate::project::ModuleEntry;

/// The wire identity of an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Textual {
    Unknown,
    None,
    Defined {
        /// Absolute filesystem path of the defining module.
        path: String,
        /// Dotted address inside the module; empty for the module itself.
        name: String,
    },
    Instance(Box<Textual>),
    Builtin {
        kind: String,
        params: Vec<Textual>,
    },
}

// ============================================================================
// Encoding
// ============================================================================

/// The dotted address of a definition inside its module.
pub fn dotted_name(entry: &ModuleEntry, def: DefId) -> String {
    let info = entry.analysis.def(def);
    let mut parts = vec![info.name.clone()];
    let mut scope = Some(info.parent_scope);
    while let Some(id) = scope {
        let s = entry.analysis.scopes.get(id);
        if let Some(name) = &s.name {
            parts.push(name.clone());
        }
        scope = s.parent;
    }
    parts.reverse();
    parts.join(".")
}

/// Serialize an entity's identity.
pub fn entity_to_textual(ctx: &Ctx, entity: &Entity) -> Textual {
    match entity {
        Entity::Unknown => Textual::Unknown,
        Entity::None => Textual::None,
        Entity::Module(id) => match ctx.project.module_by_id(*id) {
            Some(entry) => Textual::Defined {
                path: absolute_path(ctx, &entry.path),
                name: String::new(),
            },
            None => Textual::Unknown,
        },
        Entity::Package(path) => Textual::Defined {
            path: absolute_path(ctx, path),
            name: String::new(),
        },
        Entity::Class(m, d) | Entity::Function(m, d) => match ctx.project.module_by_id(*m) {
            Some(entry) => Textual::Defined {
                path: absolute_path(ctx, &entry.path),
                name: dotted_name(&entry, *d),
            },
            None => Textual::Unknown,
        },
        Entity::Instance(class) => {
            let inner = entity_to_textual(ctx, class);
            match inner {
                Textual::Defined { .. } => Textual::Instance(Box::new(inner)),
                other => other,
            }
        }
        Entity::Builtin(builtin) => builtin_to_textual(ctx, builtin),
    }
}

fn builtin_to_textual(ctx: &Ctx, builtin: &BuiltinEntity) -> Textual {
    let params = match builtin {
        BuiltinEntity::List(e)
        | BuiltinEntity::Set(e)
        | BuiltinEntity::Iterator(e)
        | BuiltinEntity::Generator(e) => vec![entity_to_textual(ctx, e)],
        BuiltinEntity::Dict(k, v) => {
            vec![entity_to_textual(ctx, k), entity_to_textual(ctx, v)]
        }
        BuiltinEntity::Tuple(items) => items.iter().map(|e| entity_to_textual(ctx, e)).collect(),
        BuiltinEntity::Method { receiver, name } if **receiver == BuiltinEntity::Function => {
            return Textual::Builtin {
                kind: "function".to_string(),
                params: vec![Textual::Defined {
                    path: String::new(),
                    name: name.clone(),
                }],
            };
        }
        _ => Vec::new(),
    };
    Textual::Builtin {
        kind: builtin.kind_name().to_string(),
        params,
    }
}

fn absolute_path(ctx: &Ctx, relative: &str) -> String {
    let mut path = ctx.project.workspace().root().to_path_buf();
    for part in relative.split('/').filter(|p| !p.is_empty()) {
        path.push(part);
    }
    path.to_string_lossy().into_owned()
}

// ============================================================================
// Decoding
// ============================================================================

/// Resolve a textual form back to its entity. Returns `Unknown` for
/// anything that no longer resolves.
pub fn textual_to_entity(ctx: &Ctx, textual: &Textual) -> Entity {
    match textual {
        Textual::Unknown => Entity::Unknown,
        Textual::None => Entity::None,
        Textual::Defined { path, name } => defined_to_entity(ctx, path, name),
        Textual::Instance(inner) => {
            let class = textual_to_entity(ctx, inner);
            if matches!(class, Entity::Class(_, _)) {
                Entity::instance_of(class)
            } else {
                Entity::Unknown
            }
        }
        Textual::Builtin { kind, params } => builtin_from_parts(ctx, kind, params),
    }
}

fn defined_to_entity(ctx: &Ctx, path: &str, name: &str) -> Entity {
    let root = ctx.project.workspace().root().to_string_lossy().into_owned();
    let relative = match path.strip_prefix(&root) {
        Some(rest) => rest.trim_start_matches(['/', '\\']).replace('\\', "/"),
        None => return Entity::Unknown,
    };
    let Ok(entry) = ctx.project.module_for_path(&relative) else {
        return Entity::Unknown;
    };
    if name.is_empty() {
        return Entity::Module(entry.id);
    }
    // Walk the dotted address through nested definition scopes.
    let mut scope = entry.analysis.scopes.module_scope();
    let mut def = None;
    for segment in name.split('.') {
        let Some(PyName::Defined(d)) = entry.analysis.scopes.get(scope).names.get(segment) else {
            return Entity::Unknown;
        };
        def = Some(*d);
        scope = entry.analysis.def(*d).scope;
    }
    match def {
        Some(d) => match entry.analysis.def(d).kind {
            DefKind::Class => Entity::Class(entry.id, d),
            DefKind::Function => Entity::Function(entry.id, d),
        },
        None => Entity::Unknown,
    }
}

fn builtin_from_parts(ctx: &Ctx, kind: &str, params: &[Textual]) -> Entity {
    let param = |i: usize| {
        params
            .get(i)
            .map(|t| textual_to_entity(ctx, t))
            .unwrap_or(Entity::Unknown)
    };
    match kind {
        "str" => Entity::str(),
        "int" => Entity::int(),
        "float" => Entity::Builtin(BuiltinEntity::Float),
        "bool" => Entity::Builtin(BuiltinEntity::Bool),
        "list" => Entity::list_of(param(0)),
        "dict" => Entity::dict_of(param(0), param(1)),
        "tuple" => Entity::Builtin(BuiltinEntity::Tuple(
            params.iter().map(|t| textual_to_entity(ctx, t)).collect(),
        )),
        "set" => Entity::Builtin(BuiltinEntity::Set(Box::new(param(0)))),
        "iter" => Entity::Builtin(BuiltinEntity::Iterator(Box::new(param(0)))),
        "generator" => Entity::Builtin(BuiltinEntity::Generator(Box::new(param(0)))),
        "file" => Entity::Builtin(BuiltinEntity::File),
        "function" => match params.first() {
            Some(Textual::Defined { name, .. }) => Entity::Builtin(BuiltinEntity::Method {
                receiver: Box::new(BuiltinEntity::Function),
                name: name.clone(),
            }),
            _ => Entity::Unknown,
        },
        // Forward compatibility: unknown builtin kinds are ignored.
        _ => Entity::Unknown,
    }
}

// ============================================================================
// JSON Wire Form
// ============================================================================

impl Textual {
    /// Encode as the JSON array form.
    pub fn to_json(&self) -> Value {
        match self {
            Textual::Unknown => json!(["unknown"]),
            Textual::None => json!(["none"]),
            Textual::Defined { path, name } => {
                if name.is_empty() {
                    json!(["defined", path])
                } else {
                    json!(["defined", path, name])
                }
            }
            Textual::Instance(inner) => json!(["instance", inner.to_json()]),
            Textual::Builtin { kind, params } => {
                let mut parts = vec![json!("builtin"), json!(kind)];
                parts.extend(params.iter().map(|p| p.to_json()));
                Value::Array(parts)
            }
        }
    }

    /// Decode from the JSON array form; unknown tags decode to
    /// `Unknown` so newer writers do not break older readers.
    pub fn from_json(value: &Value) -> Textual {
        let Some(parts) = value.as_array() else {
            return Textual::Unknown;
        };
        let Some(tag) = parts.first().and_then(Value::as_str) else {
            return Textual::Unknown;
        };
        match tag {
            "none" => Textual::None,
            "defined" => {
                let path = parts.get(1).and_then(Value::as_str).unwrap_or_default();
                let name = parts.get(2).and_then(Value::as_str).unwrap_or_default();
                Textual::Defined {
                    path: path.to_string(),
                    name: name.to_string(),
                }
            }
            "instance" => match parts.get(1) {
                Some(inner) => Textual::Instance(Box::new(Textual::from_json(inner))),
                None => Textual::Unknown,
            },
            "builtin" => {
                let kind = parts.get(1).and_then(Value::as_str).unwrap_or_default();
                Textual::Builtin {
                    kind: kind.to_string(),
                    params: parts[2.min(parts.len())..]
                        .iter()
                        .map(Textual::from_json)
                        .collect(),
                }
            }
            _ => Textual::Unknown,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
