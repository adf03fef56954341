//! Error types and error code constants for hawser.
//!
//! This module provides a unified error type (`HawserError`) that bridges
//! domain-specific errors from different subsystems (workspace, parser,
//! analysis, refactoring) into a common format suitable for tooling output.
//!
//! ## Error Code Mapping
//!
//! - `2`: Invalid input (bad offset, malformed identifier)
//! - `3`: Resolution errors (resource/module/name/attribute not found)
//! - `4`: Syntax errors in analyzed sources
//! - `5`: Refactoring precondition violations
//! - `10`: Internal errors (I/O failures, invariant breaches)
//!
//! ## Propagation Policy
//!
//! `AttributeNotFound` and `NameNotFound` are caught locally by inference
//! and attribute lookup, which degrade to "unknown" instead of tunnelling
//! them to callers. `ModuleSyntaxError` surfaces unless the workspace is
//! configured to ignore syntax errors. `RefactoringPrecondition` always
//! surfaces with an explanatory message.

use std::fmt;

use thiserror::Error;

// ============================================================================
// Error Codes
// ============================================================================

/// Stable integer codes for tooling output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ErrorCode {
    /// Invalid input from caller (bad offset, malformed identifier).
    InvalidInput = 2,
    /// Resolution errors (resource, module, name or attribute not found).
    ResolutionError = 3,
    /// Syntax error in an analyzed source file.
    SyntaxError = 4,
    /// Refactoring precondition violated.
    PreconditionFailed = 5,
    /// Internal errors (I/O failures, invariant breaches).
    InternalError = 10,
}

impl ErrorCode {
    /// Get the numeric code value.
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ============================================================================
// Unified Error Type
// ============================================================================

/// Unified error type for the analysis core.
///
/// Each variant carries enough context to produce a helpful message. The
/// variants follow the analysis error taxonomy: resource-level failures,
/// parse failures, resolution failures, and refactoring preconditions.
#[derive(Debug, Error)]
pub enum HawserError {
    /// The path does not correspond to an existing resource.
    #[error("resource not found: {path}")]
    ResourceNotFound { path: String },

    /// I/O failure or workspace invariant breach (e.g. creating a file
    /// where a folder exists).
    #[error("workspace error: {message}")]
    Workspace { message: String },

    /// Parse failed; carries file, line and message.
    #[error("syntax error in {file}:{line}: {message}")]
    ModuleSyntax {
        file: String,
        line: u32,
        message: String,
    },

    /// The module resolver could not locate a name.
    #[error("module not found: {name}")]
    ModuleNotFound { name: String },

    /// Attribute lookup on a known entity found nothing.
    #[error("attribute not found: {name}")]
    AttributeNotFound { name: String },

    /// Scope lookup found nothing.
    #[error("name not found: {name}")]
    NameNotFound { name: String },

    /// An offset does not correspond to a resolvable identifier.
    #[error("no identifier at {file}:{offset}")]
    BadIdentifier { file: String, offset: usize },

    /// A defined operation received input violating its contract.
    #[error("precondition failed: {message}")]
    Precondition { message: String },

    /// A long-running task was stopped via its task handle.
    #[error("task interrupted")]
    Interrupted,
}

// ============================================================================
// Error Code Mapping
// ============================================================================

impl From<&HawserError> for ErrorCode {
    fn from(err: &HawserError) -> Self {
        match err {
            HawserError::ResourceNotFound { .. } => ErrorCode::ResolutionError,
            HawserError::Workspace { .. } => ErrorCode::InternalError,
            HawserError::ModuleSyntax { .. } => ErrorCode::SyntaxError,
            HawserError::ModuleNotFound { .. } => ErrorCode::ResolutionError,
            HawserError::AttributeNotFound { .. } => ErrorCode::ResolutionError,
            HawserError::NameNotFound { .. } => ErrorCode::ResolutionError,
            HawserError::BadIdentifier { .. } => ErrorCode::InvalidInput,
            HawserError::Precondition { .. } => ErrorCode::PreconditionFailed,
            HawserError::Interrupted => ErrorCode::InternalError,
        }
    }
}

impl From<std::io::Error> for HawserError {
    fn from(err: std::io::Error) -> Self {
        HawserError::Workspace {
            message: format!("IO error: {}", err),
        }
    }
}

// ============================================================================
// Convenience Constructors
// ============================================================================

impl HawserError {
    /// Create a resource-not-found error.
    pub fn resource_not_found(path: impl Into<String>) -> Self {
        HawserError::ResourceNotFound { path: path.into() }
    }

    /// Create a workspace error.
    pub fn workspace(message: impl Into<String>) -> Self {
        HawserError::Workspace {
            message: message.into(),
        }
    }

    /// Create a module syntax error.
    pub fn syntax(file: impl Into<String>, line: u32, message: impl Into<String>) -> Self {
        HawserError::ModuleSyntax {
            file: file.into(),
            line,
            message: message.into(),
        }
    }

    /// Create a module-not-found error.
    pub fn module_not_found(name: impl Into<String>) -> Self {
        HawserError::ModuleNotFound { name: name.into() }
    }

    /// Create a bad-identifier error.
    pub fn bad_identifier(file: impl Into<String>, offset: usize) -> Self {
        HawserError::BadIdentifier {
            file: file.into(),
            offset,
        }
    }

    /// Create a precondition error.
    pub fn precondition(message: impl Into<String>) -> Self {
        HawserError::Precondition {
            message: message.into(),
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> ErrorCode {
        ErrorCode::from(self)
    }
}

/// Result type for core operations.
pub type HawserResult<T> = Result<T, HawserError>;

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    mod error_code_mapping {
        use super::*;

        #[test]
        fn resource_not_found_maps_to_resolution_error() {
            let err = HawserError::resource_not_found("pkg/mod.py");
            assert_eq!(err.error_code(), ErrorCode::ResolutionError);
            assert_eq!(err.error_code().code(), 3);
        }

        #[test]
        fn module_syntax_maps_to_syntax_error() {
            let err = HawserError::syntax("mod.py", 3, "unexpected indent");
            assert_eq!(err.error_code(), ErrorCode::SyntaxError);
            assert_eq!(err.error_code().code(), 4);
        }

        #[test]
        fn bad_identifier_maps_to_invalid_input() {
            let err = HawserError::bad_identifier("mod.py", 17);
            assert_eq!(err.error_code(), ErrorCode::InvalidInput);
        }

        #[test]
        fn precondition_maps_to_precondition_failed() {
            let err = HawserError::precondition("selection straddles a scope boundary");
            assert_eq!(err.error_code(), ErrorCode::PreconditionFailed);
            assert_eq!(err.error_code().code(), 5);
        }

        #[test]
        fn workspace_maps_to_internal_error() {
            let err = HawserError::workspace("file exists where a folder was requested");
            assert_eq!(err.error_code(), ErrorCode::InternalError);
            assert_eq!(err.error_code().code(), 10);
        }
    }

    mod error_display {
        use super::*;

        #[test]
        fn module_syntax_display() {
            let err = HawserError::syntax("pkg/mod.py", 42, "invalid syntax");
            assert_eq!(err.to_string(), "syntax error in pkg/mod.py:42: invalid syntax");
        }

        #[test]
        fn bad_identifier_display() {
            let err = HawserError::bad_identifier("mod.py", 9);
            assert_eq!(err.to_string(), "no identifier at mod.py:9");
        }

        #[test]
        fn io_error_bridges_to_workspace() {
            let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
            let err = HawserError::from(io);
            assert!(err.to_string().contains("denied"));
            assert_eq!(err.error_code(), ErrorCode::InternalError);
        }
    }
}
