//! Semantic analysis for the target language.
//!
//! The pipeline: parse (cached per content hash) → scope and name binding →
//! cross-module import resolution → type inference → occurrence finding.
//! Refactorings consume the analyzer through [`project::Project`]; the one
//! kept in-tree is [`ops::rename`], the canonical consumer of the
//! occurrence finder.

pub mod analyzer;
pub mod builtins;
pub mod hints;
pub mod inference;
pub mod locator;
pub mod names;
pub mod objects;
pub mod occurrences;
pub mod ops;
pub mod project;
pub mod resolver;
pub mod scope;
pub mod textual;

pub use objects::Entity;
pub use project::Project;
