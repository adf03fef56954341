//! Refactoring operations consuming the analyzer.
//!
//! Rename is the canonical consumer of the occurrence finder; further
//! operations compose the same workspace queries. Operations compute
//! replacement texts and never write to disk themselves; applying a
//! change set belongs to the tooling layer.

pub mod rename;
