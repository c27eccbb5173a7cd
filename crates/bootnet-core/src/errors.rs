//! Unified error type for bootnet
//!
//! One error enum covers generation time (configuration, validation,
//! rendering) and run time (coordination stalls, external command failures,
//! write-once violations). Generation-time errors abort before any output is
//! written; run-time errors abort the node that hit them.

use crate::config::ValidationIssue;
use crate::signal::SignalKey;

/// Error type for all bootnet operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum BootstrapError {
    /// Malformed or missing configuration input
    #[error("Config error: {message}")]
    Config {
        /// Description of what could not be loaded or parsed
        message: String,
    },

    /// Structurally invalid validator set or unsafe field contents
    #[error("Validation failed: {}", join_issues(.issues))]
    Validation {
        /// Every issue found, in field order
        issues: Vec<ValidationIssue>,
    },

    /// A node gave up waiting for signals that were never published
    #[error(
        "Coordination stall: {validator} waited {waited_ms}ms for {}",
        join_keys(.missing)
    )]
    CoordinationStall {
        /// Validator that stalled
        validator: String,
        /// Signals still absent when the wait was abandoned
        missing: Vec<SignalKey>,
        /// How long the wait lasted
        waited_ms: u64,
    },

    /// The node binary exited unsuccessfully
    #[error("Command failed: `{command}` exited with {status}: {stderr}")]
    CommandFailed {
        /// Rendered command line
        command: String,
        /// Exit status description
        status: String,
        /// Captured standard error (possibly truncated)
        stderr: String,
    },

    /// A signal was re-published with different content
    #[error("Signal conflict: {signal} already published with different content")]
    SignalConflict {
        /// Signal that was already present
        signal: SignalKey,
    },

    /// Shared or local storage failure
    #[error("Storage error: {message}")]
    Storage {
        /// Error message describing the storage failure
        message: String,
    },

    /// Manifest or script rendering failure
    #[error("Render error: {message}")]
    Render {
        /// Error message describing the rendering failure
        message: String,
    },

    /// Internal invariant violation
    #[error("Internal error: {message}")]
    Internal {
        /// Error message describing the internal error
        message: String,
    },
}

impl BootstrapError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a validation error from a single issue
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            issues: vec![ValidationIssue::new(field, message)],
        }
    }

    /// Create a validation error carrying several issues
    pub fn validation_issues(issues: Vec<ValidationIssue>) -> Self {
        Self::Validation { issues }
    }

    /// Create a coordination stall error
    pub fn stall(validator: impl Into<String>, missing: Vec<SignalKey>, waited_ms: u64) -> Self {
        Self::CoordinationStall {
            validator: validator.into(),
            missing,
            waited_ms,
        }
    }

    /// Create an external command failure
    pub fn command_failed(
        command: impl Into<String>,
        status: impl Into<String>,
        stderr: impl Into<String>,
    ) -> Self {
        Self::CommandFailed {
            command: command.into(),
            status: status.into(),
            stderr: stderr.into(),
        }
    }

    /// Create a write-once violation error
    pub fn signal_conflict(signal: SignalKey) -> Self {
        Self::SignalConflict { signal }
    }

    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Create a render error
    pub fn render(message: impl Into<String>) -> Self {
        Self::Render {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Standard Result type for bootnet operations
pub type Result<T> = std::result::Result<T, BootstrapError>;

fn join_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn join_keys(keys: &[SignalKey]) -> String {
    keys.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<std::io::Error> for BootstrapError {
    fn from(err: std::io::Error) -> Self {
        Self::storage(err.to_string())
    }
}

impl From<serde_json::Error> for BootstrapError {
    fn from(err: serde_json::Error) -> Self {
        Self::config(err.to_string())
    }
}

impl From<toml::de::Error> for BootstrapError {
    fn from(err: toml::de::Error) -> Self {
        Self::config(err.to_string())
    }
}
