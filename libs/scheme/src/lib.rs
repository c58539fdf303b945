//! # qm-scheme
//!
//! Quota schemes: the administrator-authored documents that decide which
//! labels and quota parameters operators may set on a project.
//!
//! A [`SchemeDocument`] is parsed from JSON with its key order preserved,
//! then [`compile`]d into a [`CompiledScheme`]. The compiled form validates
//! [`QuotaSubmission`]s as closed contracts: no unknown keys, no missing
//! keys, every value of the declared type and unit.
//!
//! ```
//! use qm_scheme::{compile_str, QuotaSubmission};
//!
//! let scheme = compile_str(
//!     r#"{"name": "basic", "version": 1, "quota": {
//!         "pods": {"count": {"displayName": "Pods", "allowedUnits": "", "valueType": "integer"}}
//!     }}"#,
//! )
//! .unwrap();
//!
//! let ok = QuotaSubmission::from_slice(
//!     br#"{"quota": {"pods": {"count": {"value": "10", "units": ""}}}}"#,
//! )
//! .unwrap();
//! assert!(scheme.validate(&ok).is_ok());
//! ```

mod compiler;
mod document;
mod error;
mod ordered;

pub use compiler::{
    compile, compile_str, is_label_value, CompiledScheme, DesiredObject, DesiredParameter,
    LabelRule, LabelValidator, ObjectRule, ParameterRule, QuotaValidator, ValidatedSubmission,
};
pub use document::{
    AllowedUnits, ParameterSpec, QuantityInput, QuotaSubmission, SchemeDocument, ValueType,
};
pub use error::{SchemeError, SubmissionError};
pub use ordered::OrderedMap;
