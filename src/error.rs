//! Error types for the Terralift provisioning system.
//!
//! This module provides a comprehensive error hierarchy for all phases of
//! the deployment lifecycle: configuration, graph construction, engine
//! communication, and realization.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the Terralift provisioning system.
#[derive(Debug, Error)]
pub enum TerraliftError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Graph construction errors.
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    /// Deployment engine API errors.
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Realization-phase errors.
    #[error("Deploy error: {0}")]
    Deploy(#[from] DeployError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The stack file was not found.
    #[error("Stack file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The stack file could not be parsed.
    #[error("Failed to parse stack file: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Stack validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// Environment variable is missing.
    #[error("Missing environment variable: {name}")]
    MissingEnvVar {
        /// Name of the missing variable.
        name: String,
    },

    /// An output reference expression could not be parsed.
    #[error("Invalid output reference '{expr}': {message}")]
    InvalidReference {
        /// The offending expression.
        expr: String,
        /// Description of the problem.
        message: String,
    },
}

/// Graph construction errors.
#[derive(Debug, Error)]
pub enum GraphError {
    /// Inserting an edge would create a dependency cycle.
    #[error("Dependency cycle detected: {path}")]
    Cycle {
        /// Human-readable description of the cycle path.
        path: String,
    },

    /// Two declarations share the same (type, name) identity.
    #[error("Duplicate {resource_type} declaration: {name}")]
    DuplicateName {
        /// Type tag of the resource.
        resource_type: String,
        /// The duplicated logical name.
        name: String,
    },

    /// An explicit dependency names a declaration that does not exist.
    #[error("Unknown dependency target: {reference}")]
    UnknownDependency {
        /// The unresolved reference.
        reference: String,
    },

    /// A handle references a node outside this graph.
    #[error("Output handle for '{handle}' does not belong to this graph")]
    ForeignHandle {
        /// Description of the offending handle.
        handle: String,
    },
}

/// Deployment engine API errors.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Authentication with the engine failed.
    #[error("Engine authentication failed: {message}")]
    AuthenticationFailed {
        /// Description of the auth failure.
        message: String,
    },

    /// API request failed.
    #[error("Engine API request failed: {status} - {message}")]
    ApiRequestFailed {
        /// HTTP status code.
        status: u16,
        /// Error message from the engine.
        message: String,
    },

    /// Network error.
    #[error("Network error communicating with engine: {message}")]
    NetworkError {
        /// Description of the network error.
        message: String,
    },

    /// Invalid response from the engine.
    #[error("Invalid response from engine: {message}")]
    InvalidResponse {
        /// Description of the response issue.
        message: String,
    },
}

/// Realization-phase errors.
#[derive(Debug, Error)]
pub enum DeployError {
    /// A declaration failed to realize.
    #[error("Failed to realize {resource_type} '{name}': {reason}")]
    RealizationFailed {
        /// Type tag of the resource.
        resource_type: String,
        /// Logical name of the resource.
        name: String,
        /// Reason for the failure.
        reason: String,
    },

    /// A dependency's output could never be produced.
    #[error("Unresolved dependency '{handle}': {reason}")]
    UnresolvedDependency {
        /// Description of the handle that could not resolve.
        handle: String,
        /// Why the producer never delivered a value.
        reason: String,
    },

    /// The producer realized but did not emit the requested attribute.
    #[error("Resource '{producer}' produced no output named '{attribute}'")]
    MissingOutput {
        /// The producer declaration.
        producer: String,
        /// The requested output attribute.
        attribute: String,
    },

    /// The deployment was aborted.
    #[error("Deployment aborted: {reason}")]
    Aborted {
        /// Reason for the abort.
        reason: String,
    },
}

/// Result type alias for Terralift operations.
pub type Result<T> = std::result::Result<T, TerraliftError>;

impl TerraliftError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates a validation error without a specific field.
    #[must_use]
    pub fn validation_general(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: None,
        }
    }
}

impl EngineError {
    /// Creates an API request error.
    #[must_use]
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiRequestFailed {
            status,
            message: message.into(),
        }
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkError {
            message: message.into(),
        }
    }
}

impl DeployError {
    /// Creates an unresolved-dependency error.
    #[must_use]
    pub fn unresolved(handle: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnresolvedDependency {
            handle: handle.into(),
            reason: reason.into(),
        }
    }
}
