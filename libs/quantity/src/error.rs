//! Error types for quantity parsing.

use thiserror::Error;

/// Errors that can occur when parsing quantities and units.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QuantityError {
    /// The quantity text is empty.
    #[error("quantity cannot be empty")]
    Empty,

    /// The numeric part or the suffix of the quantity is invalid.
    #[error("malformed quantity '{input}': {reason}")]
    Malformed { input: String, reason: &'static str },

    /// The unit suffix is not part of the supported vocabulary.
    #[error("unknown unit suffix '{0}'")]
    UnknownUnit(String),
}

impl QuantityError {
    pub(crate) fn malformed(input: &str, reason: &'static str) -> Self {
        Self::Malformed {
            input: input.to_string(),
            reason,
        }
    }
}
