//! Audit trail.
//!
//! Every change this service makes to a cluster, and every rejected write,
//! is logged as one event with `target: "audit"` so the log pipeline can
//! route it separately.

use tracing::{info, warn};

use crate::context::RequestContext;

pub const TARGET: &str = "audit";

pub fn quota_updated(ctx: &RequestContext, project: &str, object: &str, hard: &serde_json::Value) {
    info!(
        target: "audit",
        action = "quota_updated",
        request_id = %ctx.request_id,
        user = %ctx.username,
        cluster = %ctx.cluster.id,
        project,
        object,
        hard = %hard,
        "quota object updated"
    );
}

pub fn labels_updated(ctx: &RequestContext, project: &str, labels: &[(String, String)]) {
    let labels = labels
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",");
    info!(
        target: "audit",
        action = "labels_updated",
        request_id = %ctx.request_id,
        user = %ctx.username,
        cluster = %ctx.cluster.id,
        project,
        labels = %labels,
        "project labels updated"
    );
}

pub fn project_created(ctx: &RequestContext, project: &str) {
    info!(
        target: "audit",
        action = "project_created",
        request_id = %ctx.request_id,
        user = %ctx.username,
        cluster = %ctx.cluster.id,
        project,
        "project created"
    );
}

pub fn project_labeled(ctx: &RequestContext, project: &str, label: &str) {
    info!(
        target: "audit",
        action = "project_labeled",
        request_id = %ctx.request_id,
        user = %ctx.username,
        cluster = %ctx.cluster.id,
        project,
        label,
        "project marked as managed"
    );
}

pub fn admin_assigned(ctx: &RequestContext, project: &str, subject: &str) {
    info!(
        target: "audit",
        action = "admin_assigned",
        request_id = %ctx.request_id,
        user = %ctx.username,
        cluster = %ctx.cluster.id,
        project,
        subject,
        "project admin assigned"
    );
}

pub fn write_rejected(ctx: &RequestContext, project: &str, reason: &dyn std::fmt::Display) {
    warn!(
        target: "audit",
        action = "write_rejected",
        request_id = %ctx.request_id,
        user = %ctx.username,
        cluster = %ctx.cluster.id,
        project,
        reason = %reason,
        "quota write rejected"
    );
}
