//! Error types for the memory engine
//!
//! Lookups on unknown conversations or documents are never errors; they answer
//! with empty collections. The only failures are invalid configuration, caught
//! at construction, and malformed snapshots.

use thiserror::Error;

/// Errors produced by the memory engine
#[derive(Debug, Error)]
pub enum MemoryError {
    /// A configuration value violates its constraint
    #[error("invalid value for '{field}': {constraint} (got {value})")]
    Validation {
        /// Name of the offending field
        field: String,
        /// Constraint that was violated
        constraint: String,
        /// The rejected value, rendered for display
        value: String,
    },

    /// A snapshot or config document could not be (de)serialized
    #[error("serialization failed during {operation}: {source}")]
    Serialization {
        /// What was being serialized
        operation: String,
        /// Underlying serde error
        #[source]
        source: serde_json::Error,
    },
}

impl MemoryError {
    /// Create a validation error
    pub fn validation(
        field: impl Into<String>,
        constraint: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::Validation {
            field: field.into(),
            constraint: constraint.into(),
            value: value.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(operation: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Serialization {
            operation: operation.into(),
            source,
        }
    }

    /// Whether this error comes from configuration validation
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}

/// Result alias used across the engine
pub type MemoryResult<T> = Result<T, MemoryError>;
