//! Built-in type knowledge: name table, attribute lookup and protocols.
//!
//! Built-in entities are immutable values shared freely. Method results
//! are computed from protocol tables rather than stored attribute maps:
//! `"hi".upper` evaluates to a bound [`BuiltinEntity::Method`] whose call
//! result comes from [`method_call_result`]. Iteration, subscript and
//! arithmetic protocols live here too, so inference stays a thin
//! dispatcher.

use crate::objects::{BuiltinEntity, Entity};

/// Resolve a global built-in name, consulted after scope lookup fails.
pub fn builtin_name(name: &str) -> Option<Entity> {
    const FUNCTIONS: &[&str] = &[
        "str", "unicode", "int", "float", "bool", "list", "dict", "tuple", "set", "open",
        "file", "len", "range", "xrange", "iter", "enumerate", "sorted", "reversed", "sum",
        "abs", "min", "max", "repr", "zip", "isinstance", "issubclass", "getattr", "setattr",
        "hasattr", "staticmethod", "classmethod", "property", "super", "type", "object",
        "Exception", "ValueError", "TypeError", "KeyError", "IndexError", "AttributeError",
        "RuntimeError", "StopIteration", "IOError", "OSError", "NotImplementedError",
    ];
    if FUNCTIONS.contains(&name) {
        return Some(Entity::Builtin(BuiltinEntity::Method {
            receiver: Box::new(BuiltinEntity::Function),
            name: name.to_string(),
        }));
    }
    None
}

/// Result of calling a built-in free function by name.
///
/// `args` are the inferred call arguments; container constructors inspect
/// the first one to parameterise their element type.
pub fn function_call_result(name: &str, args: &[Entity]) -> Entity {
    let first = args.first();
    match name {
        "str" | "unicode" | "repr" => Entity::str(),
        "int" | "len" | "sum" | "abs" => Entity::int(),
        "float" => Entity::Builtin(BuiltinEntity::Float),
        "bool" | "isinstance" | "issubclass" | "hasattr" => Entity::Builtin(BuiltinEntity::Bool),
        "list" | "sorted" | "reversed" => {
            Entity::list_of(first.map(iterated_element).unwrap_or_default())
        }
        "dict" => Entity::dict_of(Entity::Unknown, Entity::Unknown),
        "tuple" => Entity::Builtin(BuiltinEntity::Tuple(Vec::new())),
        "set" => Entity::Builtin(BuiltinEntity::Set(Box::new(
            first.map(iterated_element).unwrap_or_default(),
        ))),
        "open" | "file" => Entity::Builtin(BuiltinEntity::File),
        "range" | "xrange" => Entity::list_of(Entity::int()),
        "iter" => Entity::Builtin(BuiltinEntity::Iterator(Box::new(
            first.map(iterated_element).unwrap_or_default(),
        ))),
        "enumerate" => Entity::Builtin(BuiltinEntity::Iterator(Box::new(Entity::Builtin(
            BuiltinEntity::Tuple(vec![
                Entity::int(),
                first.map(iterated_element).unwrap_or_default(),
            ]),
        )))),
        // Decorator constructors pass their function through.
        "staticmethod" | "classmethod" | "property" => {
            first.cloned().unwrap_or(Entity::Unknown)
        }
        // Exception constructors yield instances of themselves; without a
        // class entity for them the instance is opaque.
        _ => Entity::Unknown,
    }
}

/// Attribute lookup on a built-in receiver: known method names become
/// bound methods, everything else is absent.
pub fn attribute(receiver: &BuiltinEntity, name: &str) -> Option<Entity> {
    if !has_method(receiver, name) {
        return None;
    }
    Some(Entity::Builtin(BuiltinEntity::Method {
        receiver: Box::new(receiver.clone()),
        name: name.to_string(),
    }))
}

fn has_method(receiver: &BuiltinEntity, name: &str) -> bool {
    let table: &[&str] = match receiver {
        BuiltinEntity::Str => &[
            "upper", "lower", "strip", "lstrip", "rstrip", "title", "capitalize", "swapcase",
            "replace", "join", "center", "ljust", "rjust", "zfill", "expandtabs", "split",
            "rsplit", "splitlines", "startswith", "endswith", "isdigit", "isalpha", "islower",
            "isupper", "isspace", "find", "rfind", "index", "rindex", "count", "encode",
            "decode", "format", "__getitem__", "__iter__",
        ],
        BuiltinEntity::List(_) => &[
            "append", "extend", "insert", "remove", "reverse", "sort", "pop", "index", "count",
            "__getitem__", "__iter__",
        ],
        BuiltinEntity::Dict(_, _) => &[
            "get", "pop", "keys", "values", "items", "iterkeys", "itervalues", "iteritems",
            "copy", "update", "setdefault", "has_key", "clear", "__getitem__", "__iter__",
        ],
        BuiltinEntity::Set(_) => &[
            "add", "discard", "remove", "pop", "copy", "union", "intersection", "difference",
            "__iter__",
        ],
        BuiltinEntity::Tuple(_) => &["count", "index", "__getitem__", "__iter__"],
        BuiltinEntity::File => &[
            "read", "readline", "readlines", "write", "writelines", "close", "flush", "seek",
            "tell", "__iter__",
        ],
        BuiltinEntity::Iterator(_) => &["next", "__next__", "__iter__"],
        BuiltinEntity::Generator(_) => &["next", "__next__", "send", "close", "__iter__"],
        _ => &[],
    };
    table.contains(&name)
}

/// Result of calling a bound built-in method.
pub fn method_call_result(receiver: &BuiltinEntity, name: &str, args: &[Entity]) -> Entity {
    match receiver {
        // Free functions are modelled as methods on the Function sentinel.
        BuiltinEntity::Function => function_call_result(name, args),
        BuiltinEntity::Str => match name {
            "upper" | "lower" | "strip" | "lstrip" | "rstrip" | "title" | "capitalize"
            | "swapcase" | "replace" | "join" | "center" | "ljust" | "rjust" | "zfill"
            | "expandtabs" | "encode" | "decode" | "format" | "__getitem__" => Entity::str(),
            "split" | "rsplit" | "splitlines" => Entity::list_of(Entity::str()),
            "startswith" | "endswith" | "isdigit" | "isalpha" | "islower" | "isupper"
            | "isspace" => Entity::Builtin(BuiltinEntity::Bool),
            "find" | "rfind" | "index" | "rindex" | "count" => Entity::int(),
            "__iter__" => Entity::Builtin(BuiltinEntity::Iterator(Box::new(Entity::str()))),
            _ => Entity::Unknown,
        },
        BuiltinEntity::List(element) => match name {
            "pop" | "__getitem__" => (**element).clone(),
            "index" | "count" => Entity::int(),
            "__iter__" => Entity::Builtin(BuiltinEntity::Iterator(element.clone())),
            "append" | "extend" | "insert" | "remove" | "reverse" | "sort" => Entity::None,
            _ => Entity::Unknown,
        },
        BuiltinEntity::Dict(key, value) => match name {
            "get" | "pop" | "__getitem__" | "setdefault" => (**value).clone(),
            "keys" => Entity::list_of((**key).clone()),
            "values" => Entity::list_of((**value).clone()),
            "items" => Entity::list_of(Entity::Builtin(BuiltinEntity::Tuple(vec![
                (**key).clone(),
                (**value).clone(),
            ]))),
            "iterkeys" => Entity::Builtin(BuiltinEntity::Iterator(key.clone())),
            "itervalues" => Entity::Builtin(BuiltinEntity::Iterator(value.clone())),
            "iteritems" => Entity::Builtin(BuiltinEntity::Iterator(Box::new(Entity::Builtin(
                BuiltinEntity::Tuple(vec![(**key).clone(), (**value).clone()]),
            )))),
            "copy" => Entity::Builtin(receiver.clone()),
            "has_key" => Entity::Builtin(BuiltinEntity::Bool),
            "__iter__" => Entity::Builtin(BuiltinEntity::Iterator(key.clone())),
            "update" | "clear" => Entity::None,
            _ => Entity::Unknown,
        },
        BuiltinEntity::Set(element) => match name {
            "pop" => (**element).clone(),
            "copy" | "union" | "intersection" | "difference" => Entity::Builtin(receiver.clone()),
            "__iter__" => Entity::Builtin(BuiltinEntity::Iterator(element.clone())),
            "add" | "discard" | "remove" => Entity::None,
            _ => Entity::Unknown,
        },
        BuiltinEntity::Tuple(elements) => match name {
            "count" | "index" => Entity::int(),
            "__getitem__" => merge_all(elements),
            "__iter__" => {
                Entity::Builtin(BuiltinEntity::Iterator(Box::new(merge_all(elements))))
            }
            _ => Entity::Unknown,
        },
        BuiltinEntity::File => match name {
            "read" | "readline" => Entity::str(),
            "readlines" => Entity::list_of(Entity::str()),
            "__iter__" => Entity::Builtin(BuiltinEntity::Iterator(Box::new(Entity::str()))),
            "write" | "writelines" | "close" | "flush" | "seek" => Entity::None,
            "tell" => Entity::int(),
            _ => Entity::Unknown,
        },
        BuiltinEntity::Iterator(element) | BuiltinEntity::Generator(element) => match name {
            "next" | "__next__" | "send" => (**element).clone(),
            "__iter__" => Entity::Builtin(BuiltinEntity::Iterator(element.clone())),
            _ => Entity::Unknown,
        },
        _ => Entity::Unknown,
    }
}

/// The element produced by iterating an entity (`__iter__().__next__()`).
pub fn iterated_element(entity: &Entity) -> Entity {
    match entity {
        Entity::Builtin(b) => match b {
            BuiltinEntity::List(e)
            | BuiltinEntity::Set(e)
            | BuiltinEntity::Iterator(e)
            | BuiltinEntity::Generator(e) => (**e).clone(),
            BuiltinEntity::Dict(k, _) => (**k).clone(),
            BuiltinEntity::Tuple(elements) => merge_all(elements),
            BuiltinEntity::Str | BuiltinEntity::File => Entity::str(),
            _ => Entity::Unknown,
        },
        _ => Entity::Unknown,
    }
}

/// The result of subscripting an entity, using the literal index when the
/// receiver is a tuple and the index is known.
pub fn subscript_result(entity: &Entity, index: Option<usize>) -> Entity {
    match entity {
        Entity::Builtin(b) => match b {
            BuiltinEntity::List(e) => (**e).clone(),
            BuiltinEntity::Dict(_, v) => (**v).clone(),
            BuiltinEntity::Str => Entity::str(),
            BuiltinEntity::Tuple(elements) => match index {
                Some(i) => elements.get(i).cloned().unwrap_or_default(),
                None => merge_all(elements),
            },
            _ => Entity::Unknown,
        },
        _ => Entity::Unknown,
    }
}

/// The result of slicing: the same container shape.
pub fn slice_result(entity: &Entity) -> Entity {
    match entity {
        Entity::Builtin(b) => match b {
            BuiltinEntity::List(_) | BuiltinEntity::Str | BuiltinEntity::Tuple(_) => {
                entity.clone()
            }
            _ => Entity::Unknown,
        },
        _ => Entity::Unknown,
    }
}

/// Numeric/sequence result of a binary arithmetic operation.
pub fn binary_op_result(left: &Entity, right: &Entity) -> Entity {
    use BuiltinEntity::{Float, Int, List, Str};
    match (left, right) {
        (Entity::Builtin(Str), _) | (_, Entity::Builtin(Str)) => {
            if matches!((left, right), (Entity::Builtin(Str), Entity::Builtin(Str))) {
                Entity::str()
            } else {
                // String formatting with `%` or repetition keeps str on
                // the left.
                match left {
                    Entity::Builtin(Str) => Entity::str(),
                    _ => Entity::Unknown,
                }
            }
        }
        (Entity::Builtin(Float), _) | (_, Entity::Builtin(Float)) => {
            Entity::Builtin(BuiltinEntity::Float)
        }
        (Entity::Builtin(Int), Entity::Builtin(Int)) => Entity::int(),
        (Entity::Builtin(List(a)), Entity::Builtin(List(b))) => {
            Entity::list_of((**a).clone().merge((**b).clone()))
        }
        _ => Entity::Unknown,
    }
}

fn merge_all(entities: &[Entity]) -> Entity {
    let mut result = Entity::Unknown;
    for entity in entities {
        result = result.merge(entity.clone());
    }
    result
}

// ============================================================================
// Tests
// ============================================================================
