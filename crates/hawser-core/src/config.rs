//! Workspace configuration.
//!
//! Deserialized from an optional JSON file in the workspace settings
//! folder. Unknown fields are ignored so newer tools can write settings an
//! older core does not understand.

use serde::{Deserialize, Serialize};

/// Settings governing parsing and inference behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Treat unparsable modules as empty instead of failing the analysis.
    pub ignore_syntax_errors: bool,
    /// Source roots searched by the module resolver, in order, relative to
    /// the workspace root. The empty string is the root itself.
    pub source_folders: Vec<String>,
    /// Validate persisted inference records against current module hashes
    /// on load.
    pub validate_objectdb: bool,
    /// Bound on call-chain depth for parameter-from-caller propagation.
    pub max_inference_depth: u32,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        WorkspaceConfig {
            ignore_syntax_errors: false,
            source_folders: vec![String::new()],
            validate_objectdb: false,
            max_inference_depth: 4,
        }
    }
}

impl WorkspaceConfig {
    /// Parse a configuration from JSON, ignoring unknown fields.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

// ============================================================================
// Tests
// ============================================================================
