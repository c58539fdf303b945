//! Quota reconciliation primitives.
//!
//! This library holds the pure part of a quota write: given the desired
//! values of a validated submission and the live state of a project's quota
//! objects, decide which patches to send. Key concepts:
//!
//! - **Desired state**: per-object hard values from a validated submission.
//! - **Live state**: the `hard` and `used` amounts the cluster reports.
//! - **Plan**: the minimal, ordered set of patches, or a rejection.
//!
//! # Invariants
//!
//! - A new hard value is never lower than the current usage
//! - A rejected plan contains no patches for any object
//! - Patches follow scheme declaration order
//! - Objects whose hard values already match are not patched
//!
//! Network access lives in the service; everything here is deterministic
//! given the same inputs.

mod phase;
mod plan;
mod render;
mod state;

pub use phase::ReconcilePhase;
pub use plan::{plan_patches, Patch, PatchPlan};
pub use render::render_quota;
pub use state::{ProjectQuotaState, QuotaObjectState};

use thiserror::Error;

/// Reconciliation errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    /// A submitted hard value is lower than what the project already uses.
    #[error(
        "quota '{object}.{parameter}' cannot be set to {requested}: current usage is {used}"
    )]
    QuotaBelowUsage {
        object: String,
        parameter: String,
        requested: String,
        used: String,
    },

    /// The cluster does not have an object or limit the scheme declares.
    #[error("{}", inconsistent_message(.object, .parameter.as_deref()))]
    InconsistentClusterState {
        object: String,
        parameter: Option<String>,
    },

    /// The cluster reported a value that is not a quantity.
    #[error("cluster reported invalid quantity '{value}' for '{object}.{parameter}'")]
    InvalidClusterQuantity {
        object: String,
        parameter: String,
        value: String,
    },

    /// The cluster returned a quota object of an unexpected shape.
    #[error("cluster returned malformed quota object '{object}': {reason}")]
    MalformedClusterObject { object: String, reason: String },
}

fn inconsistent_message(object: &str, parameter: Option<&str>) -> String {
    match parameter {
        Some(parameter) => {
            format!("quota object '{object}' on the cluster has no hard limit for '{parameter}'")
        }
        None => format!("quota object '{object}' does not exist on the cluster"),
    }
}

impl ReconcileError {
    pub(crate) fn missing_object(object: &str) -> Self {
        Self::InconsistentClusterState {
            object: object.to_string(),
            parameter: None,
        }
    }

    pub(crate) fn missing_limit(object: &str, parameter: &str) -> Self {
        Self::InconsistentClusterState {
            object: object.to_string(),
            parameter: Some(parameter.to_string()),
        }
    }

    /// Returns true for errors caused by the submitted values.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::QuotaBelowUsage { .. })
    }
}
