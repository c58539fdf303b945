//! Quota reconciler: drives reads and writes of a project's quota objects.
//!
//! A write walks the [`ReconcilePhase`] state machine. Validation and the
//! never-below-usage check both complete before the first mutating call, so
//! a rejected submission never changes the cluster. Once patches are being
//! applied a failure stops the sequence; earlier patches stay applied.

use std::sync::Arc;

use qm_id::{ProjectName, Username};
use qm_reconcile::{
    plan_patches, render_quota, ProjectQuotaState, QuotaObjectState, ReconcileError,
    ReconcilePhase,
};
use qm_scheme::{OrderedMap, QuantityInput, QuotaSubmission, SubmissionError};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::audit;
use crate::cluster::{resources, ClusterApi, ClusterApiError};
use crate::config::{ManagedLabel, UsernameFormat};
use crate::context::RequestContext;

#[derive(Debug, Error)]
pub enum OperationError {
    #[error(transparent)]
    Submission(#[from] SubmissionError),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error(transparent)]
    Cluster(#[from] ClusterApiError),

    #[error("project '{0}' is not managed by the quota manager")]
    ProjectNotManaged(String),
}

/// Result of a successful quota write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOutcome {
    pub dry_run: bool,

    /// Quota objects patched, in scheme order.
    pub patched: Vec<String>,

    /// Quota objects whose hard values already matched.
    pub unchanged: Vec<String>,

    pub labels_updated: bool,
}

/// Current phase of one write, logged on every transition.
struct PhaseLog<'a> {
    request_id: &'a str,
    project: &'a str,
    current: ReconcilePhase,
}

impl<'a> PhaseLog<'a> {
    fn start(request_id: &'a str, project: &'a str) -> Self {
        debug!(request_id, project, phase = %ReconcilePhase::Received, "quota write phase");
        Self {
            request_id,
            project,
            current: ReconcilePhase::Received,
        }
    }

    fn advance(&mut self, next: ReconcilePhase) {
        debug_assert!(
            self.current.can_advance_to(next),
            "illegal phase transition {} -> {next}",
            self.current
        );
        debug!(
            request_id = self.request_id,
            project = self.project,
            from = %self.current,
            phase = %next,
            "quota write phase"
        );
        self.current = next;
    }
}

pub struct QuotaReconciler {
    api: Arc<dyn ClusterApi>,
    managed_label: ManagedLabel,
    username_format: UsernameFormat,
}

impl QuotaReconciler {
    pub fn new(
        api: Arc<dyn ClusterApi>,
        managed_label: ManagedLabel,
        username_format: UsernameFormat,
    ) -> Self {
        Self {
            api,
            managed_label,
            username_format,
        }
    }

    /// Projects on the context's cluster that carry the managed label.
    pub async fn list_projects(&self, ctx: &RequestContext) -> Result<Vec<String>, OperationError> {
        Ok(resources::list_labeled_namespaces(
            self.api.as_ref(),
            &ctx.cluster,
            self.managed_label.name.as_str(),
            &self.managed_label.value,
        )
        .await?)
    }

    /// Current hard limits in each parameter's display unit, in scheme order.
    pub async fn read_quota(
        &self,
        ctx: &RequestContext,
        project: &ProjectName,
    ) -> Result<OrderedMap<OrderedMap<QuantityInput>>, OperationError> {
        self.ensure_managed(ctx, project).await?;
        let live = self.fetch_state(ctx, project).await?;
        Ok(render_quota(ctx.scheme.objects(), &live)?)
    }

    /// Validates a submission and applies it to a managed project.
    pub async fn write_quota(
        &self,
        ctx: &RequestContext,
        project: &ProjectName,
        submission: &QuotaSubmission,
        dry_run: bool,
    ) -> Result<WriteOutcome, OperationError> {
        self.ensure_managed(ctx, project).await?;
        self.apply(ctx, project, submission, dry_run).await
    }

    /// Creates a project, sets its quota and makes `admin` its administrator.
    ///
    /// The submission is validated before anything is created.
    pub async fn create_project(
        &self,
        ctx: &RequestContext,
        project: &ProjectName,
        admin: &Username,
        submission: &QuotaSubmission,
    ) -> Result<WriteOutcome, OperationError> {
        if let Err(e) = ctx.scheme.validate(submission) {
            audit::write_rejected(ctx, project.as_str(), &e);
            return Err(e.into());
        }

        let api = self.api.as_ref();
        resources::create_project_request(api, &ctx.cluster, project.as_str()).await?;
        audit::project_created(ctx, project.as_str());

        let outcome = self.apply(ctx, project, submission, false).await?;

        let label = (
            self.managed_label.name.to_string(),
            self.managed_label.value.clone(),
        );
        resources::patch_namespace_labels(
            api,
            &ctx.cluster,
            project.as_str(),
            std::slice::from_ref(&label),
            false,
        )
        .await?;
        audit::project_labeled(ctx, project.as_str(), &format!("{}={}", label.0, label.1));

        let subject = self.username_format.format(admin);
        resources::create_admin_role_binding(api, &ctx.cluster, project.as_str(), &subject)
            .await?;
        audit::admin_assigned(ctx, project.as_str(), &subject);

        info!(
            request_id = %ctx.request_id,
            cluster = %ctx.cluster.id,
            project = %project,
            admin = %subject,
            "project created"
        );
        Ok(outcome)
    }

    async fn ensure_managed(
        &self,
        ctx: &RequestContext,
        project: &ProjectName,
    ) -> Result<(), OperationError> {
        let managed = self.list_projects(ctx).await?;
        if managed.iter().any(|p| p == project.as_str()) {
            Ok(())
        } else {
            Err(OperationError::ProjectNotManaged(project.to_string()))
        }
    }

    /// Fetches every quota object the scheme declares.
    async fn fetch_state(
        &self,
        ctx: &RequestContext,
        project: &ProjectName,
    ) -> Result<ProjectQuotaState, OperationError> {
        let mut state = ProjectQuotaState::new();
        for object in ctx.scheme.objects() {
            let resource = resources::get_resource_quota(
                self.api.as_ref(),
                &ctx.cluster,
                project.as_str(),
                &object.name,
            )
            .await?
            .ok_or_else(|| ReconcileError::InconsistentClusterState {
                object: object.name.clone(),
                parameter: None,
            })?;
            state.insert(
                object.name.clone(),
                QuotaObjectState::from_resource_quota(&object.name, &resource)?,
            );
        }
        Ok(state)
    }

    async fn apply(
        &self,
        ctx: &RequestContext,
        project: &ProjectName,
        submission: &QuotaSubmission,
        dry_run: bool,
    ) -> Result<WriteOutcome, OperationError> {
        let mut phase = PhaseLog::start(&ctx.request_id, project.as_str());

        let validated = match ctx.scheme.validate(submission) {
            Ok(validated) => validated,
            Err(e) => {
                if !dry_run {
                    audit::write_rejected(ctx, project.as_str(), &e);
                }
                phase.advance(ReconcilePhase::Rejected);
                return Err(e.into());
            }
        };
        phase.advance(ReconcilePhase::Validated);

        let live = match self.fetch_state(ctx, project).await {
            Ok(live) => live,
            Err(e) => {
                phase.advance(ReconcilePhase::Failed);
                return Err(e);
            }
        };
        phase.advance(ReconcilePhase::Fetched);

        let plan = match plan_patches(&validated.quota, &live) {
            Ok(plan) => plan,
            Err(e) => {
                if e.is_client_error() {
                    if !dry_run {
                        audit::write_rejected(ctx, project.as_str(), &e);
                    }
                    phase.advance(ReconcilePhase::Rejected);
                } else {
                    phase.advance(ReconcilePhase::Failed);
                }
                return Err(e.into());
            }
        };
        phase.advance(ReconcilePhase::Diffed);

        phase.advance(ReconcilePhase::Applying);
        let mut outcome = WriteOutcome {
            dry_run,
            unchanged: plan.unchanged,
            ..WriteOutcome::default()
        };

        let api = self.api.as_ref();
        if !ctx.scheme.label_validator().is_empty() && !validated.labels.is_empty() {
            if let Err(e) = resources::patch_namespace_labels(
                api,
                &ctx.cluster,
                project.as_str(),
                &validated.labels,
                dry_run,
            )
            .await
            {
                phase.advance(ReconcilePhase::Failed);
                return Err(e.into());
            }
            if !dry_run {
                audit::labels_updated(ctx, project.as_str(), &validated.labels);
            }
            outcome.labels_updated = true;
        }

        for patch in &plan.patches {
            if let Err(e) =
                resources::patch_resource_quota(api, &ctx.cluster, project.as_str(), patch, dry_run)
                    .await
            {
                error!(
                    request_id = %ctx.request_id,
                    cluster = %ctx.cluster.id,
                    project = %project,
                    object = %patch.quota_object_name,
                    applied = ?outcome.patched,
                    error = %e,
                    "quota patch failed, earlier patches remain applied"
                );
                phase.advance(ReconcilePhase::Failed);
                return Err(e.into());
            }
            if !dry_run {
                audit::quota_updated(
                    ctx,
                    project.as_str(),
                    &patch.quota_object_name,
                    &patch.hard_json(),
                );
            }
            outcome.patched.push(patch.quota_object_name.clone());
        }

        phase.advance(ReconcilePhase::Applied);
        Ok(outcome)
    }
}
