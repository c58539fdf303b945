//! Error types for name and ID parsing.

use thiserror::Error;

/// Errors that can occur when parsing or validating names and IDs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdError {
    /// The input string is empty.
    #[error("{kind} cannot be empty")]
    Empty { kind: &'static str },

    /// The input is shorter or longer than allowed.
    #[error("{kind} '{value}' must be between {min} and {max} characters")]
    InvalidLength {
        kind: &'static str,
        value: String,
        min: usize,
        max: usize,
    },

    /// The input does not match the required pattern.
    #[error("{kind} '{value}' does not match pattern '{pattern}'")]
    InvalidFormat {
        kind: &'static str,
        value: String,
        pattern: &'static str,
    },

    /// The request ID has an invalid prefix or ULID portion.
    #[error("invalid request ID '{0}'")]
    InvalidRequestId(String),
}

impl IdError {
    /// Returns true if this error indicates the input was empty.
    pub fn is_empty(&self) -> bool {
        matches!(self, IdError::Empty { .. })
    }
}
