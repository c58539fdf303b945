//! Quota scheme compiler.
//!
//! A scheme document is compiled once, at load time, into a pair of
//! closed-contract validators:
//!
//! - [`LabelValidator`]: exactly the declared label keys, each value a
//!   Kubernetes label value that also satisfies the declared pattern
//! - [`QuotaValidator`]: exactly the declared quota objects and parameters,
//!   each value matching its type's shape and using an allowed unit
//!
//! Submissions never re-derive rules; they run against the compiled form.

use std::collections::HashSet;
use std::sync::LazyLock;

use qm_quantity::{Quantity, Unit};
use regex::Regex;

use crate::{
    OrderedMap, QuantityInput, QuotaSubmission, SchemeDocument, SchemeError, SubmissionError,
    ValueType,
};

/// DNS-1123 subdomain: scheme names and quota object names.
static SUBDOMAIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$")
        .expect("subdomain pattern is valid")
});

/// Kubernetes resource names such as `limits.cpu` or `count/pods`.
static RESOURCE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9]([-A-Za-z0-9_./]*[A-Za-z0-9])?$").expect("resource pattern is valid")
});

/// Name segment of a label key, and any label value.
static NAME_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(([A-Za-z0-9][-A-Za-z0-9_.]*)?[A-Za-z0-9])?$").expect("token pattern is valid")
});

static INTEGER_VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(ValueType::Integer.pattern()).expect("integer pattern is valid"));

static DECIMAL_VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(ValueType::Decimal.pattern()).expect("decimal pattern is valid"));

const MAX_NAME_TOKEN_LEN: usize = 63;
const MAX_SUBDOMAIN_LEN: usize = 253;

fn is_subdomain(s: &str) -> bool {
    !s.is_empty() && s.len() <= MAX_SUBDOMAIN_LEN && SUBDOMAIN.is_match(s)
}

fn is_label_key(key: &str) -> bool {
    let (prefix, name) = match key.rsplit_once('/') {
        Some((prefix, name)) => (Some(prefix), name),
        None => (None, key),
    };
    if prefix.is_some_and(|p| !is_subdomain(p)) {
        return false;
    }
    !name.is_empty() && name.len() <= MAX_NAME_TOKEN_LEN && NAME_TOKEN.is_match(name)
}

/// Returns true if `value` is a syntactically valid Kubernetes label value.
pub fn is_label_value(value: &str) -> bool {
    value.len() <= MAX_NAME_TOKEN_LEN && NAME_TOKEN.is_match(value)
}

impl ValueType {
    /// Returns true if `value` has the shape this type requires.
    pub fn matches(&self, value: &str) -> bool {
        match self {
            Self::Integer => INTEGER_VALUE.is_match(value),
            Self::Decimal => DECIMAL_VALUE.is_match(value),
        }
    }
}

// =============================================================================
// Compiled Rules
// =============================================================================

/// Compiled rule for one quota parameter.
#[derive(Debug, Clone)]
pub struct ParameterRule {
    pub name: String,
    pub display_name: String,
    pub value_type: ValueType,
    units: Vec<Unit>,
}

impl ParameterRule {
    /// Allowed units in declaration order.
    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    /// Unit used when presenting current values.
    pub fn display_unit(&self) -> Unit {
        self.units[0]
    }

    fn check(&self, object: &str, input: &QuantityInput) -> Result<Quantity, SubmissionError> {
        let invalid_value = || SubmissionError::InvalidValue {
            object: object.to_string(),
            parameter: self.name.clone(),
            value: input.value.clone(),
            expected: self.value_type,
        };

        if !self.value_type.matches(&input.value) {
            return Err(invalid_value());
        }

        let unit = Unit::from_suffix(&input.units)
            .filter(|unit| self.units.contains(unit))
            .ok_or_else(|| {
                SubmissionError::unsupported_unit(object, &self.name, &input.units, &self.units)
            })?;

        Quantity::from_parts(&input.value, unit).map_err(|_| invalid_value())
    }
}

/// Compiled rule for one quota object.
#[derive(Debug, Clone)]
pub struct ObjectRule {
    pub name: String,
    pub parameters: Vec<ParameterRule>,
}

impl ObjectRule {
    pub fn parameter(&self, name: &str) -> Option<&ParameterRule> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

/// Desired hard value for one parameter, validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredParameter {
    pub name: String,
    pub quantity: Quantity,
}

/// Desired hard values for one quota object, in scheme order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredObject {
    pub name: String,
    pub parameters: Vec<DesiredParameter>,
}

/// A submission that passed both validators, in scheme order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedSubmission {
    pub labels: Vec<(String, String)>,
    pub quota: Vec<DesiredObject>,
}

/// Validates the `quota` section of a submission.
#[derive(Debug, Clone)]
pub struct QuotaValidator {
    objects: Vec<ObjectRule>,
}

impl QuotaValidator {
    pub fn objects(&self) -> &[ObjectRule] {
        &self.objects
    }

    pub fn validate(
        &self,
        quota: &OrderedMap<OrderedMap<QuantityInput>>,
    ) -> Result<Vec<DesiredObject>, SubmissionError> {
        if let Some(object) = quota
            .keys()
            .find(|name| !self.objects.iter().any(|o| o.name == *name))
        {
            return Err(SubmissionError::UnknownQuotaObject {
                object: object.to_string(),
            });
        }

        let mut desired = Vec::with_capacity(self.objects.len());
        for rule in &self.objects {
            let Some(submitted) = quota.get(&rule.name) else {
                return Err(SubmissionError::MissingQuotaObject {
                    object: rule.name.clone(),
                });
            };

            if let Some(parameter) = submitted.keys().find(|name| rule.parameter(name).is_none()) {
                return Err(SubmissionError::UnknownParameter {
                    object: rule.name.clone(),
                    parameter: parameter.to_string(),
                });
            }

            let mut parameters = Vec::with_capacity(rule.parameters.len());
            for parameter in &rule.parameters {
                let Some(input) = submitted.get(&parameter.name) else {
                    return Err(SubmissionError::MissingParameter {
                        object: rule.name.clone(),
                        parameter: parameter.name.clone(),
                    });
                };
                parameters.push(DesiredParameter {
                    name: parameter.name.clone(),
                    quantity: parameter.check(&rule.name, input)?,
                });
            }

            desired.push(DesiredObject {
                name: rule.name.clone(),
                parameters,
            });
        }

        Ok(desired)
    }
}

/// Compiled rule for one label.
#[derive(Debug, Clone)]
pub struct LabelRule {
    pub key: String,
    pattern: Option<Regex>,
}

impl LabelRule {
    fn accepts(&self, value: &str) -> bool {
        is_label_value(value) && self.pattern.as_ref().is_none_or(|p| p.is_match(value))
    }
}

/// Validates the `labels` section of a submission.
#[derive(Debug, Clone, Default)]
pub struct LabelValidator {
    rules: Vec<LabelRule>,
}

impl LabelValidator {
    pub fn rules(&self) -> &[LabelRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn validate(
        &self,
        labels: &OrderedMap<String>,
    ) -> Result<Vec<(String, String)>, SubmissionError> {
        if let Some(label) = labels
            .keys()
            .find(|key| !self.rules.iter().any(|r| r.key == *key))
        {
            return Err(SubmissionError::UnknownLabel {
                label: label.to_string(),
            });
        }

        self.rules
            .iter()
            .map(|rule| {
                let value = labels
                    .get(&rule.key)
                    .ok_or_else(|| SubmissionError::MissingLabel {
                        label: rule.key.clone(),
                    })?;
                if !rule.accepts(value) {
                    return Err(SubmissionError::InvalidLabelValue {
                        label: rule.key.clone(),
                        value: value.clone(),
                    });
                }
                Ok((rule.key.clone(), value.clone()))
            })
            .collect()
    }
}

// =============================================================================
// Compilation
// =============================================================================

/// A scheme document together with its compiled validators.
#[derive(Debug, Clone)]
pub struct CompiledScheme {
    document: SchemeDocument,
    labels: LabelValidator,
    quota: QuotaValidator,
}

impl CompiledScheme {
    pub fn name(&self) -> &str {
        &self.document.name
    }

    pub fn version(&self) -> u32 {
        self.document.version
    }

    /// The document this scheme was compiled from.
    pub fn document(&self) -> &SchemeDocument {
        &self.document
    }

    pub fn label_validator(&self) -> &LabelValidator {
        &self.labels
    }

    pub fn quota_validator(&self) -> &QuotaValidator {
        &self.quota
    }

    /// Quota object rules in declaration order.
    pub fn objects(&self) -> &[ObjectRule] {
        self.quota.objects()
    }

    /// Runs both validators; labels are checked first.
    pub fn validate(
        &self,
        submission: &QuotaSubmission,
    ) -> Result<ValidatedSubmission, SubmissionError> {
        let labels = self.labels.validate(&submission.labels)?;
        let quota = self.quota.validate(&submission.quota)?;
        Ok(ValidatedSubmission { labels, quota })
    }
}

/// Parses and compiles a scheme document from JSON text.
pub fn compile_str(text: &str) -> Result<CompiledScheme, SchemeError> {
    compile(SchemeDocument::from_json(text)?)
}

/// Checks the document's own shape and builds its validators.
pub fn compile(document: SchemeDocument) -> Result<CompiledScheme, SchemeError> {
    let scheme = document.name.as_str();

    if !is_subdomain(scheme) {
        return Err(SchemeError::invalid(
            scheme,
            "name",
            "must be a lowercase DNS subdomain",
        ));
    }

    if document.quota.is_empty() {
        return Err(SchemeError::invalid(
            scheme,
            "quota",
            "must declare at least one quota object",
        ));
    }

    let mut objects = Vec::with_capacity(document.quota.len());
    for (object_name, parameters) in document.quota.iter() {
        let field = format!("quota.{object_name}");
        if !is_subdomain(object_name) {
            return Err(SchemeError::invalid(
                scheme,
                field,
                "quota object name must be a lowercase DNS subdomain",
            ));
        }
        if parameters.is_empty() {
            return Err(SchemeError::invalid(
                scheme,
                field,
                "must declare at least one parameter",
            ));
        }

        let mut rules = Vec::with_capacity(parameters.len());
        for (parameter_name, spec) in parameters.iter() {
            let field = format!("quota.{object_name}.{parameter_name}");
            if !RESOURCE_NAME.is_match(parameter_name) {
                return Err(SchemeError::invalid(
                    scheme,
                    field,
                    "parameter name must be a resource name",
                ));
            }
            if spec.display_name.trim().is_empty() {
                return Err(SchemeError::invalid(
                    scheme,
                    format!("{field}.displayName"),
                    "must not be empty",
                ));
            }

            let units = spec.allowed_units.to_vec();
            if units.is_empty() {
                return Err(SchemeError::invalid(
                    scheme,
                    format!("{field}.allowedUnits"),
                    "must not be empty",
                ));
            }
            if units.len() == 1 && matches!(spec.allowed_units, crate::AllowedUnits::Many(_)) {
                return Err(SchemeError::invalid(
                    scheme,
                    format!("{field}.allowedUnits"),
                    "a list must contain at least two units; use a single string for one unit",
                ));
            }
            let distinct: HashSet<Unit> = units.iter().copied().collect();
            if distinct.len() != units.len() {
                return Err(SchemeError::invalid(
                    scheme,
                    format!("{field}.allowedUnits"),
                    "units must be unique",
                ));
            }

            rules.push(ParameterRule {
                name: parameter_name.to_string(),
                display_name: spec.display_name.clone(),
                value_type: spec.value_type,
                units,
            });
        }

        objects.push(ObjectRule {
            name: object_name.to_string(),
            parameters: rules,
        });
    }

    let mut labels = Vec::with_capacity(document.labels.len());
    for (key, pattern) in document.labels.iter() {
        let field = format!("labels.{key}");
        if !is_label_key(key) {
            return Err(SchemeError::invalid(
                scheme,
                field,
                "must be a valid label key",
            ));
        }
        let pattern = if pattern.is_empty() {
            None
        } else {
            let anchored = Regex::new(&format!("^(?:{pattern})$"))
                .map_err(|e| SchemeError::invalid(scheme, field, e.to_string()))?;
            Some(anchored)
        };
        labels.push(LabelRule {
            key: key.to_string(),
            pattern,
        });
    }

    Ok(CompiledScheme {
        labels: LabelValidator { rules: labels },
        quota: QuotaValidator { objects },
        document,
    })
}
