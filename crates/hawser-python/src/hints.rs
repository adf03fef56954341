//! Runtime hints: the tracer channel and the persisted inference store.
//!
//! An optional tracer process running the analyzed program streams
//! newline-delimited JSON records `(callee, args, returned)` in textual
//! form. Records whose callee resolves to a function inside the
//! workspace contribute parameter and return evidence to inference;
//! records that resolve to nothing are discarded.
//!
//! The persisted store writes the collected evidence as JSON keyed by
//! absolute module path under an optional workspace folder. The format
//! is forward compatible: unknown tags are ignored on load.

use std::io::BufRead;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::{debug, trace};

use hawser_core::error::{HawserError, HawserResult};

use crate::inference::Ctx;
use crate::objects::Entity;
use crate::project::Project;
use crate::textual::{dotted_name, entity_to_textual, textual_to_entity, Textual};

/// One observed call, already decoded from the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HintRecord {
    pub callee: Textual,
    pub args: Vec<Textual>,
    pub returned: Textual,
}

impl HintRecord {
    /// Decode one JSON line: `[callee, [args...], returned]`.
    pub fn from_json(value: &Value) -> Option<HintRecord> {
        let parts = value.as_array()?;
        let callee = Textual::from_json(parts.first()?);
        let args = parts
            .get(1)?
            .as_array()?
            .iter()
            .map(Textual::from_json)
            .collect();
        let returned = Textual::from_json(parts.get(2)?);
        Some(HintRecord {
            callee,
            args,
            returned,
        })
    }

    pub fn to_json(&self) -> Value {
        json!([
            self.callee.to_json(),
            self.args.iter().map(Textual::to_json).collect::<Vec<_>>(),
            self.returned.to_json(),
        ])
    }
}

/// Read newline-delimited JSON hint records from a stream (a file or a
/// socket reader). Damaged lines are skipped.
pub fn read_records(reader: impl BufRead) -> Vec<HintRecord> {
    let mut records = Vec::new();
    for line in reader.lines() {
        let Ok(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }
        let Ok(value) = serde_json::from_str::<Value>(&line) else {
            trace!("skipping damaged hint line");
            continue;
        };
        if let Some(record) = HintRecord::from_json(&value) {
            records.push(record);
        }
    }
    records
}

/// Feed hint records into the project's evidence tables.
///
/// Returns how many records resolved to a workspace function; the rest
/// are discarded.
pub fn apply_records(project: &Project, records: &[HintRecord]) -> usize {
    let ctx = Ctx::new(project);
    let mut applied = 0;
    for record in records {
        let callee = textual_to_entity(&ctx, &record.callee);
        let Entity::Function(module, def) = callee else {
            continue;
        };
        let args: Vec<Entity> = record
            .args
            .iter()
            .map(|t| textual_to_entity(&ctx, t))
            .collect();
        let returned = textual_to_entity(&ctx, &record.returned);
        project.add_call_evidence((module, def), args, returned);
        applied += 1;
    }
    debug!(applied, total = records.len(), "applied hint records");
    applied
}

// ============================================================================
// Persisted Store
// ============================================================================

/// Folder under the workspace root holding persisted inference records.
pub const STORE_FOLDER: &str = ".hawser";

/// Write the project's current evidence to the persisted store, one JSON
/// document keyed by absolute module path.
pub fn save_store(project: &Project) -> HawserResult<()> {
    let workspace = project.workspace();
    if !workspace.has_resource(STORE_FOLDER) {
        workspace.create_folder(STORE_FOLDER)?;
    }
    let mut by_module: serde_json::Map<String, Value> = serde_json::Map::new();
    let ctx = Ctx::new(project);
    for resource in workspace.source_files()? {
        let Ok(entry) = project.resource_to_module(&resource) else {
            continue;
        };
        let mut functions = Vec::new();
        for (index, info) in entry.analysis.defs.iter().enumerate() {
            let def = crate::objects::DefId(index as u32);
            let Some(evidence) = project.evidence_for((entry.id, def)) else {
                continue;
            };
            let params: Vec<Value> = evidence
                .params
                .iter()
                .map(|observed| {
                    Value::Array(
                        observed
                            .iter()
                            .map(|e| entity_to_textual(&ctx, e).to_json())
                            .collect(),
                    )
                })
                .collect();
            let returns: Vec<Value> = evidence
                .returns
                .iter()
                .map(|e| entity_to_textual(&ctx, e).to_json())
                .collect();
            let kind = match info.kind {
                crate::objects::DefKind::Function => "function",
                crate::objects::DefKind::Class => "class",
            };
            functions.push(json!({
                "name": dotted_name(&entry, def),
                "kind": kind,
                "params": params,
                "returns": returns,
            }));
        }
        if functions.is_empty() {
            continue;
        }
        let absolute = workspace.root().join(&entry.path);
        by_module.insert(
            absolute.to_string_lossy().into_owned(),
            json!({ "functions": functions }),
        );
    }
    let saved_at = DateTime::<Utc>::from(SystemTime::now()).to_rfc3339();
    let document = json!({
        "version": 1,
        "saved_at": saved_at,
        "modules": Value::Object(by_module),
    });
    let store_path = format!("{}/objectdb.json", STORE_FOLDER);
    let file = if workspace.has_resource(&store_path) {
        workspace.resource(&store_path)?
    } else {
        workspace.create_file(&store_path)?
    };
    workspace.write(&file, &serde_json::to_string_pretty(&document).map_err(
        |e| HawserError::workspace(format!("serializing store: {}", e)),
    )?)?;
    Ok(())
}

/// Load the persisted store back into the project's evidence tables.
/// Unknown fields and tags are ignored.
pub fn load_store(project: &Project) -> HawserResult<usize> {
    let workspace = project.workspace();
    let store_path = format!("{}/objectdb.json", STORE_FOLDER);
    if !workspace.has_resource(&store_path) {
        return Ok(0);
    }
    let file = workspace.resource(&store_path)?;
    let text = workspace.read(&file)?;
    let Ok(document) = serde_json::from_str::<Value>(&text) else {
        return Ok(0);
    };
    let ctx = Ctx::new(project);
    let mut applied = 0;
    let modules = document
        .get("modules")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    for (path, module_doc) in modules {
        let functions = module_doc
            .get("functions")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        for function in functions {
            let Some(name) = function.get("name").and_then(Value::as_str) else {
                continue;
            };
            let callee = Textual::Defined {
                path: path.clone(),
                name: name.to_string(),
            };
            let Entity::Function(module, def) = textual_to_entity(&ctx, &callee) else {
                continue;
            };
            let params: Vec<Vec<Entity>> = function
                .get("params")
                .and_then(Value::as_array)
                .map(|observed| {
                    observed
                        .iter()
                        .map(|group| {
                            group
                                .as_array()
                                .map(|entities| {
                                    entities
                                        .iter()
                                        .map(|v| {
                                            textual_to_entity(&ctx, &Textual::from_json(v))
                                        })
                                        .collect()
                                })
                                .unwrap_or_default()
                        })
                        .collect()
                })
                .unwrap_or_default();
            let returns: Vec<Entity> = function
                .get("returns")
                .and_then(Value::as_array)
                .map(|values| {
                    values
                        .iter()
                        .map(|v| textual_to_entity(&ctx, &Textual::from_json(v)))
                        .collect()
                })
                .unwrap_or_default();
            for returned in &returns {
                project.add_call_evidence((module, def), Vec::new(), returned.clone());
            }
            for (index, observed) in params.iter().enumerate() {
                for entity in observed {
                    let mut args = vec![Entity::Unknown; index + 1];
                    args[index] = entity.clone();
                    project.add_call_evidence((module, def), args, Entity::Unknown);
                }
            }
            applied += 1;
        }
    }
    Ok(applied)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reads_records_and_skips_damage() {
        let data = concat!(
            "[[\"builtin\", \"function\", [\"defined\", \"\", \"len\"]], [[\"builtin\", \"list\", [\"unknown\"]]], [\"builtin\", \"int\"]]\n",
            "not json at all\n",
            "\n",
            "[[\"defined\", \"/ws/mod.py\", \"f\"], [[\"builtin\", \"str\"]], [\"builtin\", \"str\"]]\n",
        );
        let records = read_records(Cursor::new(data));
        assert_eq!(records.len(), 2);
        assert_eq!(
            records[1].callee,
            Textual::Defined {
                path: "/ws/mod.py".to_string(),
                name: "f".to_string(),
            }
        );
        assert_eq!(records[1].args.len(), 1);
    }

    #[test]
    fn record_json_roundtrip() {
        let record = HintRecord {
            callee: Textual::Defined {
                path: "/ws/mod.py".to_string(),
                name: "C.m".to_string(),
            },
            args: vec![Textual::Builtin {
                kind: "int".to_string(),
                params: Vec::new(),
            }],
            returned: Textual::None,
        };
        let json = record.to_json();
        assert_eq!(HintRecord::from_json(&json), Some(record));
    }
}
