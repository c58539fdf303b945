//! Error types for scheme compilation and submission validation.

use qm_quantity::Unit;
use thiserror::Error;

use crate::ValueType;

/// Errors raised while loading or compiling a scheme document.
///
/// These are configuration errors: a scheme that fails to compile must
/// never be served.
#[derive(Debug, Error)]
pub enum SchemeError {
    /// The document is not valid JSON or does not have the scheme shape.
    #[error("could not parse quota scheme: {0}")]
    Parse(#[from] serde_json::Error),

    /// The document parsed but violates a scheme rule.
    #[error("invalid quota scheme '{scheme}' at '{field}': {reason}")]
    InvalidDocument {
        scheme: String,
        field: String,
        reason: String,
    },
}

impl SchemeError {
    pub(crate) fn invalid(
        scheme: &str,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidDocument {
            scheme: scheme.to_string(),
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Reasons a quota submission is rejected.
///
/// Every variant names the offending field so the caller can correct it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubmissionError {
    /// The body is not JSON or does not have the submission shape.
    #[error("invalid quota submission: {0}")]
    Malformed(String),

    #[error("label '{label}' is not declared by the quota scheme")]
    UnknownLabel { label: String },

    #[error("label '{label}' is required")]
    MissingLabel { label: String },

    #[error("label '{label}' has invalid value '{value}'")]
    InvalidLabelValue { label: String, value: String },

    #[error("quota object '{object}' is not declared by the quota scheme")]
    UnknownQuotaObject { object: String },

    #[error("quota object '{object}' is required")]
    MissingQuotaObject { object: String },

    #[error("quota parameter '{parameter}' is not declared for quota object '{object}'")]
    UnknownParameter { object: String, parameter: String },

    #[error("quota parameter '{parameter}' of quota object '{object}' is required")]
    MissingParameter { object: String, parameter: String },

    #[error("value '{value}' of '{object}.{parameter}' is not a valid {expected} number")]
    InvalidValue {
        object: String,
        parameter: String,
        value: String,
        expected: ValueType,
    },

    #[error("units '{units}' are not allowed for '{object}.{parameter}' (allowed: {allowed})")]
    UnsupportedUnit {
        object: String,
        parameter: String,
        units: String,
        allowed: String,
    },
}

impl SubmissionError {
    /// Dotted path of the rejected field within the submission.
    pub fn field(&self) -> String {
        match self {
            Self::Malformed(_) => String::new(),
            Self::UnknownLabel { label }
            | Self::MissingLabel { label }
            | Self::InvalidLabelValue { label, .. } => format!("labels.{label}"),
            Self::UnknownQuotaObject { object } | Self::MissingQuotaObject { object } => {
                format!("quota.{object}")
            }
            Self::UnknownParameter { object, parameter }
            | Self::MissingParameter { object, parameter } => {
                format!("quota.{object}.{parameter}")
            }
            Self::InvalidValue {
                object, parameter, ..
            } => format!("quota.{object}.{parameter}.value"),
            Self::UnsupportedUnit {
                object, parameter, ..
            } => format!("quota.{object}.{parameter}.units"),
        }
    }

    pub(crate) fn unsupported_unit(
        object: &str,
        parameter: &str,
        units: &str,
        allowed: &[Unit],
    ) -> Self {
        let allowed = allowed
            .iter()
            .map(|u| format!("'{u}'"))
            .collect::<Vec<_>>()
            .join(", ");
        Self::UnsupportedUnit {
            object: object.to_string(),
            parameter: parameter.to_string(),
            units: units.to_string(),
            allowed,
        }
    }
}
