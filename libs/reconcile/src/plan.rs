//! Patch planning.

use std::cmp::Ordering;

use qm_quantity::Quantity;
use qm_scheme::DesiredObject;
use serde_json::json;

use crate::{ProjectQuotaState, ReconcileError};

/// New hard values for one quota object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
    pub quota_object_name: String,

    /// Parameter name and formatted quantity, in scheme order.
    pub hard_values: Vec<(String, String)>,
}

impl Patch {
    /// `{"parameter": "value", ...}`
    pub fn hard_json(&self) -> serde_json::Value {
        self.hard_values
            .iter()
            .map(|(parameter, value)| (parameter.clone(), json!(value)))
            .collect::<serde_json::Map<_, _>>()
            .into()
    }

    /// Strategic merge patch body for the ResourceQuota.
    pub fn body(&self) -> serde_json::Value {
        json!({ "spec": { "hard": self.hard_json() } })
    }
}

/// Outcome of planning a quota write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchPlan {
    /// Patches to apply, in scheme order.
    pub patches: Vec<Patch>,

    /// Objects whose hard values already match.
    pub unchanged: Vec<String>,
}

impl PatchPlan {
    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }
}

/// Diffs desired hard values against live state.
///
/// Every declared parameter is checked before any patch is produced, so a
/// rejection never leaves a partial plan. Usage the cluster does not report
/// counts as zero; a missing hard limit or object is an inconsistency.
pub fn plan_patches(
    desired: &[DesiredObject],
    live: &ProjectQuotaState,
) -> Result<PatchPlan, ReconcileError> {
    let zero = Quantity::zero();
    let mut plan = PatchPlan::default();

    for object in desired {
        let state = live.require(&object.name)?;
        let mut changed = false;

        for parameter in &object.parameters {
            let hard = state
                .hard
                .get(&parameter.name)
                .ok_or_else(|| ReconcileError::missing_limit(&object.name, &parameter.name))?;

            let used = match state.used.get(&parameter.name) {
                Some(used) => used,
                None => {
                    tracing::warn!(
                        object = %object.name,
                        parameter = %parameter.name,
                        "cluster reports no usage, assuming zero"
                    );
                    &zero
                }
            };

            if parameter.quantity.compare(used) == Ordering::Less {
                return Err(ReconcileError::QuotaBelowUsage {
                    object: object.name.clone(),
                    parameter: parameter.name.clone(),
                    requested: parameter.quantity.format(),
                    used: used.format(),
                });
            }

            changed |= parameter.quantity.compare(hard) != Ordering::Equal;
        }

        if changed {
            plan.patches.push(Patch {
                quota_object_name: object.name.clone(),
                hard_values: object
                    .parameters
                    .iter()
                    .map(|p| (p.name.clone(), p.quantity.format()))
                    .collect(),
            });
        } else {
            plan.unchanged.push(object.name.clone());
        }
    }

    Ok(plan)
}
