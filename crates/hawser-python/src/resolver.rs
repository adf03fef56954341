//! Module resolution: dotted names ↔ workspace resources.
//!
//! A name `a.b.c` is resolved by walking the configured source roots in
//! order until a matching folder chain ending in a `c.py` leaf (a module)
//! or a `c` folder (a package) is found. Relative imports with level N
//! resolve against the importing module's package, stripping N-1 trailing
//! components first. A miss is a distinct `ModuleNotFound` error; scope
//! construction demotes it to an unbound name rather than failing the
//! analysis.

use hawser_core::error::{HawserError, HawserResult};
use hawser_core::workspace::Workspace;

/// A resolved module or package location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundModule {
    /// Root-relative resource path: a `.py` file for modules, a folder
    /// for packages.
    pub path: String,
    pub is_package: bool,
}

/// Resolve `name` with relative `level` against the workspace.
///
/// `current_folder` is the folder of the importing module, required for
/// relative imports and consulted before the source roots for absolute
/// ones, so sibling modules win.
pub fn find_module(
    workspace: &Workspace,
    source_folders: &[String],
    name: &str,
    level: u32,
    current_folder: Option<&str>,
) -> HawserResult<FoundModule> {
    if level > 0 {
        let Some(current) = current_folder else {
            return Err(HawserError::module_not_found(name));
        };
        let base = strip_components(current, level - 1)
            .ok_or_else(|| HawserError::module_not_found(name))?;
        if name.is_empty() {
            // `from . import x` names the package itself.
            return if workspace.has_resource(&base) {
                Ok(FoundModule {
                    path: base,
                    is_package: true,
                })
            } else {
                Err(HawserError::module_not_found(name))
            };
        }
        return resolve_in(workspace, &base, name)
            .ok_or_else(|| HawserError::module_not_found(name));
    }

    let mut roots: Vec<&str> = Vec::new();
    if let Some(current) = current_folder {
        roots.push(current);
    }
    roots.extend(source_folders.iter().map(|s| s.as_str()));
    for root in roots {
        if let Some(found) = resolve_in(workspace, root, name) {
            return Ok(found);
        }
    }
    Err(HawserError::module_not_found(name))
}

/// Strip `count` trailing components from a `/`-separated folder path.
fn strip_components(folder: &str, count: u32) -> Option<String> {
    let mut parts: Vec<&str> = if folder.is_empty() {
        Vec::new()
    } else {
        folder.split('/').collect()
    };
    for _ in 0..count {
        parts.pop()?;
    }
    Some(parts.join("/"))
}

fn join(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", base, name)
    }
}

/// Resolve a dotted name under one base folder.
fn resolve_in(workspace: &Workspace, base: &str, name: &str) -> Option<FoundModule> {
    let mut folder = base.to_string();
    let segments: Vec<&str> = name.split('.').collect();
    let (last, packages) = segments.split_last()?;
    for package in packages {
        let candidate = join(&folder, package);
        if !workspace.has_resource(&candidate) {
            return None;
        }
        folder = candidate;
    }
    let module_file = join(&folder, &format!("{}.py", last));
    if workspace.has_resource(&module_file) {
        return Some(FoundModule {
            path: module_file,
            is_package: false,
        });
    }
    let package_folder = join(&folder, last);
    if workspace.has_resource(&package_folder) {
        return Some(FoundModule {
            path: package_folder,
            is_package: true,
        });
    }
    None
}

/// The initializer file of a package folder, if present.
pub fn package_init(workspace: &Workspace, package_path: &str) -> Option<String> {
    let init = join(package_path, "__init__.py");
    workspace.has_resource(&init).then_some(init)
}

/// The dotted module name of a resource path under the source roots, used
/// for textual identity.
pub fn module_name_of(source_folders: &[String], path: &str) -> String {
    let trimmed = path.strip_suffix(".py").unwrap_or(path);
    let trimmed = trimmed.strip_suffix("/__init__").unwrap_or(trimmed);
    let mut best = trimmed;
    for folder in source_folders {
        if folder.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix(&format!("{}/", folder)) {
            best = rest;
            break;
        }
    }
    best.replace('/', ".")
}

// ============================================================================
// Tests
// ============================================================================
