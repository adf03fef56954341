//! Rename: replace every occurrence of a binding with a new name.
//!
//! Preconditions surface before any text is produced: the offset must
//! resolve to an identifier and the new name must itself be a valid
//! identifier. The result is all-or-nothing: one replacement text per
//! touched resource, computed from the occurrence stream; occurrences
//! whose current spelling differs from the queried name (import
//! aliases) are left alone so aliases survive renames of their
//! original.

use std::collections::BTreeMap;

use hawser_core::error::{HawserError, HawserResult};
use hawser_core::task::TaskHandle;
use hawser_core::workspace::Resource;
use tracing::debug;

use crate::occurrences::{FindOptions, OccurrenceFinder};
use crate::project::Project;

/// A computed replacement for one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEdit {
    pub resource: Resource,
    pub new_text: String,
    /// Offsets replaced, in ascending order.
    pub replaced_offsets: Vec<usize>,
}

/// Options controlling rename scope.
#[derive(Debug, Clone, Default)]
pub struct RenameOptions {
    /// Also rename same-named methods across the class hierarchy.
    pub in_hierarchy: bool,
    /// Leave appearances inside import statements untouched.
    pub skip_imports: bool,
}

/// A prepared rename of the name at one offset.
#[derive(Debug)]
pub struct Rename<'p> {
    project: &'p Project,
    resource: Resource,
    offset: usize,
    old_name: String,
}

impl<'p> Rename<'p> {
    /// Prepare a rename; fails with `BadIdentifier` when the offset does
    /// not sit on a resolvable identifier.
    pub fn new(project: &'p Project, resource: &Resource, offset: usize) -> HawserResult<Self> {
        let found = project.pyname_at(resource, offset)?;
        Ok(Rename {
            project,
            resource: resource.clone(),
            offset,
            old_name: found.word,
        })
    }

    /// The identifier being renamed.
    pub fn old_name(&self) -> &str {
        &self.old_name
    }

    /// Compute the per-resource replacement texts.
    pub fn changes(
        &self,
        new_name: &str,
        options: &RenameOptions,
        task: &TaskHandle,
    ) -> HawserResult<Vec<FileEdit>> {
        validate_identifier(new_name)?;
        if new_name == self.old_name {
            return Err(HawserError::precondition(format!(
                "new name is identical to the old name '{}'",
                self.old_name
            )));
        }
        let finder = OccurrenceFinder::new(
            self.project,
            &self.resource,
            self.offset,
            FindOptions {
                unsure: false,
                in_hierarchy: options.in_hierarchy,
                imports: !options.skip_imports,
                resources: None,
            },
        )?;

        // Group occurrence offsets per resource; replacements apply back
        // to front so earlier offsets stay valid.
        let mut by_resource: BTreeMap<String, (Resource, Vec<(usize, usize)>)> = BTreeMap::new();
        for occurrence in finder.occurrences(task.clone())? {
            let text = self
                .project
                .resource_to_module(&occurrence.resource)?
                .source[occurrence.start..occurrence.end]
                .to_string();
            if text != self.old_name {
                continue;
            }
            by_resource
                .entry(occurrence.resource.path().to_string())
                .or_insert_with(|| (occurrence.resource.clone(), Vec::new()))
                .1
                .push((occurrence.start, occurrence.end));
        }
        task.check_stopped()?;

        let mut edits = Vec::new();
        for (_, (resource, mut spans)) in by_resource {
            let entry = self.project.resource_to_module(&resource)?;
            let mut text = entry.source.clone();
            spans.sort();
            spans.dedup();
            for &(start, end) in spans.iter().rev() {
                text.replace_range(start..end, new_name);
            }
            debug!(path = resource.path(), count = spans.len(), "rename edit");
            edits.push(FileEdit {
                resource,
                new_text: text,
                replaced_offsets: spans.iter().map(|&(s, _)| s).collect(),
            });
        }
        Ok(edits)
    }
}

/// Validate a proposed identifier.
fn validate_identifier(name: &str) -> HawserResult<()> {
    const KEYWORDS: &[&str] = &[
        "and", "or", "not", "if", "else", "elif", "while", "for", "in", "is", "def", "class",
        "return", "yield", "import", "from", "as", "pass", "break", "continue", "global", "del",
        "raise", "try", "except", "finally", "with", "lambda", "assert", "None", "True", "False",
    ];
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .map(|c| c.is_alphabetic() || c == '_')
        .unwrap_or(false);
    let valid_rest = chars.all(|c| c.is_alphanumeric() || c == '_');
    if !valid_start || !valid_rest {
        return Err(HawserError::precondition(format!(
            "'{}' is not a valid identifier",
            name
        )));
    }
    if KEYWORDS.contains(&name) {
        return Err(HawserError::precondition(format!(
            "'{}' is a reserved word",
            name
        )));
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_validation() {
        assert!(validate_identifier("new_name").is_ok());
        assert!(validate_identifier("_private").is_ok());
        assert!(validate_identifier("Name2").is_ok());
        assert!(validate_identifier("2name").is_err());
        assert!(validate_identifier("has space").is_err());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("class").is_err());
    }
}
