//! Scheme and submission document shapes.

use std::fmt;

use qm_quantity::Unit;
use serde::{Deserialize, Serialize};

use crate::{OrderedMap, SchemeError, SubmissionError};

/// An administrator-authored quota scheme.
///
/// Declares which labels and which quota objects/parameters operators may
/// submit for the clusters that reference it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SchemeDocument {
    /// Scheme name, referenced by cluster documents.
    pub name: String,

    /// Document revision.
    pub version: u32,

    /// Label key → extra value pattern (empty string for none).
    #[serde(default)]
    pub labels: OrderedMap<String>,

    /// Quota object name → parameter name → parameter spec.
    pub quota: OrderedMap<OrderedMap<ParameterSpec>>,
}

impl SchemeDocument {
    pub fn from_json(text: &str) -> Result<Self, SchemeError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Declaration of a single quota parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ParameterSpec {
    /// Human readable parameter name.
    pub display_name: String,

    /// Unit suffixes operators may use.
    pub allowed_units: AllowedUnits,

    /// Numeric shape of submitted values.
    pub value_type: ValueType,
}

/// Either a single unit or a list of at least two distinct units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AllowedUnits {
    One(Unit),
    Many(Vec<Unit>),
}

impl AllowedUnits {
    /// Units in declaration order; the first one is the display unit.
    pub fn to_vec(&self) -> Vec<Unit> {
        match self {
            Self::One(unit) => vec![*unit],
            Self::Many(units) => units.clone(),
        }
    }
}

/// Numeric shape of a parameter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    /// Non-negative whole number (`12`).
    Integer,

    /// Non-negative number with optional fraction (`1.5`).
    Decimal,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Decimal => "decimal",
        }
    }

    /// Anchored pattern submitted values of this type must match.
    pub fn pattern(&self) -> &'static str {
        match self {
            Self::Integer => r"^[0-9]+$",
            Self::Decimal => r"^[0-9]+(\.[0-9]+)?$",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Submissions
// =============================================================================

/// A quota change submitted by an operator.
///
/// ```json
/// {
///   "labels": { "team": "payments" },
///   "quota": { "compute": { "limits.cpu": { "value": "4", "units": "" } } }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuotaSubmission {
    #[serde(default)]
    pub labels: OrderedMap<String>,

    pub quota: OrderedMap<OrderedMap<QuantityInput>>,
}

impl QuotaSubmission {
    pub fn from_slice(body: &[u8]) -> Result<Self, SubmissionError> {
        serde_json::from_slice(body).map_err(|e| SubmissionError::Malformed(e.to_string()))
    }
}

/// A submitted value with its unit suffix, both as raw text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuantityInput {
    pub value: String,
    pub units: String,
}

impl QuantityInput {
    pub fn new(value: impl Into<String>, units: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            units: units.into(),
        }
    }
}
