//! Error types for streamcore.
//!
//! Uses thiserror for structured errors with context. Errors are designed to:
//! - Surface at wiring/configuration time, so per-step processing can assume a valid graph
//! - Include actionable information (which stream, which parameter, what range)
//! - Never be silently clamped or replaced by a default

use crate::core::types::{PortDirection, PortId, TypeTag};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for a module in a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModuleId(pub Uuid);

impl ModuleId {
    /// Create a new random module ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a module ID from a UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for ModuleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// Unique identifier for a connection record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Create a new random connection ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// Top-level error type for stream and module operations.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Type mismatch on stream '{stream}': expected {expected}, got {found}")]
    TypeMismatch {
        stream: String,
        expected: TypeTag,
        found: TypeTag,
    },

    #[error("Stream '{stream}' accepts at most {capacity} connection(s)")]
    CapacityExceeded { stream: String, capacity: usize },

    #[error("Operation '{operation}' is not supported by stream '{stream}'")]
    UnsupportedOperation {
        stream: String,
        operation: &'static str,
    },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("{direction} port {id} not found")]
    NotFound { direction: PortDirection, id: PortId },

    #[error("Stream '{stream}' is not connected")]
    NotConnected { stream: String },

    #[error("Cannot (de)serialize stream '{stream}': {reason}")]
    Serialization { stream: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised while configuring parameters, ports and requirements.
///
/// These are all detected before the first step runs.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConfigurationError {
    #[error("Parameter '{parameter}' is out of range: {value} not in {range}")]
    OutOfRange {
        parameter: String,
        value: String,
        range: String,
    },

    #[error("{} parameters are invalid: {}", .0.len(), join_errors(.0))]
    InvalidParameters(Vec<ConfigurationError>),

    #[error("Parameter '{name}' already exists in module '{module}'")]
    DuplicateParameter { module: String, name: String },

    #[error("Parameter '{name}' not found in module '{module}'")]
    UnknownParameter { module: String, name: String },

    #[error("Invalid value for '{parameter}': {reason}")]
    InvalidValue { parameter: String, reason: String },

    #[error("Parameter '{name}' is locked")]
    LockedParameter { name: String },

    #[error("{direction} port id {id} is already in use")]
    DuplicatePort { direction: PortDirection, id: PortId },

    #[error("Multi stream '{stream}' needs a backing array of at least one slot")]
    EmptyBacking { stream: String },

    #[error("Stream '{stream}' requires {required}, producer provides {provided}")]
    IncompatibleRequirement {
        stream: String,
        required: String,
        provided: String,
    },
}

fn join_errors(errors: &[ConfigurationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

// ============================================================================
// Error Utilities
// ============================================================================

impl CoreError {
    /// Check if this error was raised by configuration rather than wiring or I/O.
    pub fn is_configuration(&self) -> bool {
        matches!(self, CoreError::Configuration(_))
    }

    /// Get suggestion for fixing this error.
    pub fn suggested_fix(&self) -> Option<String> {
        match self {
            CoreError::TypeMismatch { expected, found, .. } => Some(format!(
                "Connect a {} output, or insert a module converting {} to {}",
                expected, found, expected
            )),
            CoreError::CapacityExceeded { capacity, .. } => Some(format!(
                "Size the backing array above {} before wiring",
                capacity
            )),
            CoreError::NotConnected { stream } => {
                Some(format!("Connect an output to '{}' first", stream))
            }
            CoreError::Configuration(inner) => inner.suggested_fix(),
            _ => None,
        }
    }
}

impl ConfigurationError {
    /// Get suggestion for fixing this error.
    pub fn suggested_fix(&self) -> Option<String> {
        match self {
            ConfigurationError::OutOfRange {
                parameter, range, ..
            } => Some(format!("Set '{}' within {}", parameter, range)),
            ConfigurationError::DuplicatePort { id, .. } => {
                Some(format!("Register the port under an id other than {}", id))
            }
            ConfigurationError::EmptyBacking { .. } => {
                Some("Resize the slot array before creating the stream".to_string())
            }
            _ => None,
        }
    }

    /// Names of the parameters involved in this error.
    pub fn parameters(&self) -> Vec<&str> {
        match self {
            ConfigurationError::OutOfRange { parameter, .. }
            | ConfigurationError::InvalidValue { parameter, .. } => vec![parameter.as_str()],
            ConfigurationError::DuplicateParameter { name, .. }
            | ConfigurationError::UnknownParameter { name, .. }
            | ConfigurationError::LockedParameter { name } => vec![name.as_str()],
            ConfigurationError::InvalidParameters(errors) => {
                errors.iter().flat_map(|e| e.parameters()).collect()
            }
            _ => vec![],
        }
    }
}

/// Result type alias for stream and module operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigurationError>;
