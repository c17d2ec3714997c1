//! Error handling module for ASH
//!
//! Provides centralized error handling with proper error types using thiserror.
//! Loading, versioning and module errors all funnel into [`AshError`];
//! execution-time outcomes have their own types in `invoke` and `step_state`.

use crate::fault::FunctionFault;
use crate::invoke::FatalReason;
use thiserror::Error;

/// Main error type for ASH
#[derive(Error, Debug)]
pub enum AshError {
    /// IO errors (recipe files, backups, module files)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Recipe file could not be read or parsed
    #[error("Failed to load recipe {path}: {reason}")]
    Load { path: String, reason: String },

    /// Parsed root is neither a versioned mapping nor a legacy array
    #[error("Unrecognized recipe shape: {0}")]
    UnrecognizedShape(String),

    /// Version string is not of the form `major.minor`
    #[error("Invalid recipe version '{0}'")]
    InvalidVersion(String),

    /// Version is newer than supported, or has no migration path
    #[error("Recipe version {found} is not supported (current version is {supported})")]
    UnsupportedVersion { found: String, supported: String },

    /// A pairwise migration rejected its input
    #[error("Cannot migrate recipe from v{from} to v{to}: {reason}")]
    Migration {
        from: String,
        to: String,
        reason: String,
    },

    /// A step object is malformed
    #[error("{step}: {reason}")]
    InvalidStep { step: String, reason: String },

    /// Sibling module could not be loaded
    #[error("Module error ({module}): {reason}")]
    Module { module: String, reason: String },

    /// Runner configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Step state machine transition errors
    #[error("Step transition error: {0}")]
    StepTransition(String),

    /// A step function failed
    #[error("Step function error: {0}")]
    Fault(#[from] FunctionFault),

    /// A step could not continue
    #[error("Step aborted: {0}")]
    Fatal(#[from] FatalReason),
}

/// Result type alias for ASH operations
pub type Result<T> = std::result::Result<T, AshError>;

// Convenient error constructors
impl AshError {
    /// Create a load error for a recipe path
    pub fn load(path: impl AsRef<std::path::Path>, reason: impl Into<String>) -> Self {
        Self::Load {
            path: path.as_ref().display().to_string(),
            reason: reason.into(),
        }
    }

    /// Create an invalid step error
    pub fn invalid_step(step: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidStep {
            step: step.into(),
            reason: reason.into(),
        }
    }

    /// Create a module error
    pub fn module(module: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Module {
            module: module.into(),
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Returns true for errors that make the recipe's version unusable
    pub fn is_version_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidVersion(_) | Self::UnsupportedVersion { .. } | Self::Migration { .. }
        )
    }
}
