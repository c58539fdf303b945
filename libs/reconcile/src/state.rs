//! Live quota state as reported by the cluster.

use std::collections::BTreeMap;

use qm_quantity::Quantity;
use serde::Deserialize;

use crate::ReconcileError;

/// Hard limits and current usage of one quota object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuotaObjectState {
    pub hard: BTreeMap<String, Quantity>,
    pub used: BTreeMap<String, Quantity>,
}

#[derive(Debug, Default, Deserialize)]
struct ResourceQuota {
    #[serde(default)]
    spec: ResourceQuotaSpec,
    #[serde(default)]
    status: ResourceQuotaStatus,
}

#[derive(Debug, Default, Deserialize)]
struct ResourceQuotaSpec {
    #[serde(default)]
    hard: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
struct ResourceQuotaStatus {
    #[serde(default)]
    used: BTreeMap<String, String>,
}

impl QuotaObjectState {
    /// Reads `spec.hard` and `status.used` from a ResourceQuota object.
    pub fn from_resource_quota(
        object: &str,
        resource: &serde_json::Value,
    ) -> Result<Self, ReconcileError> {
        let quota = ResourceQuota::deserialize(resource).map_err(|e| {
            ReconcileError::MalformedClusterObject {
                object: object.to_string(),
                reason: e.to_string(),
            }
        })?;

        Ok(Self {
            hard: parse_amounts(object, quota.spec.hard)?,
            used: parse_amounts(object, quota.status.used)?,
        })
    }
}

fn parse_amounts(
    object: &str,
    raw: BTreeMap<String, String>,
) -> Result<BTreeMap<String, Quantity>, ReconcileError> {
    raw.into_iter()
        .map(|(parameter, value)| match Quantity::parse(&value) {
            Ok(quantity) => Ok((parameter, quantity)),
            Err(_) => Err(ReconcileError::InvalidClusterQuantity {
                object: object.to_string(),
                parameter,
                value,
            }),
        })
        .collect()
}

/// Live state of every quota object fetched for a project.
///
/// Built fresh for each request; never cached.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectQuotaState {
    objects: BTreeMap<String, QuotaObjectState>,
}

impl ProjectQuotaState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, object: impl Into<String>, state: QuotaObjectState) {
        self.objects.insert(object.into(), state);
    }

    pub fn get(&self, object: &str) -> Option<&QuotaObjectState> {
        self.objects.get(object)
    }

    /// Like [`get`](Self::get), but a missing object is an inconsistency.
    pub fn require(&self, object: &str) -> Result<&QuotaObjectState, ReconcileError> {
        self.get(object)
            .ok_or_else(|| ReconcileError::missing_object(object))
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}
