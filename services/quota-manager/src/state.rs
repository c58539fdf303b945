//! Application state shared across request handlers.

use std::sync::Arc;

use crate::cluster::ClusterApi;
use crate::reconciler::QuotaReconciler;
use crate::registry::Registry;

/// Shared application state.
///
/// Everything in here is built at startup and read-only afterwards.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    registry: Arc<Registry>,
    cluster_api: Arc<dyn ClusterApi>,
    reconciler: QuotaReconciler,
    quota_managers_group: String,
}

impl AppState {
    pub fn new(
        registry: Arc<Registry>,
        cluster_api: Arc<dyn ClusterApi>,
        reconciler: QuotaReconciler,
        quota_managers_group: impl Into<String>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                registry,
                cluster_api,
                reconciler,
                quota_managers_group: quota_managers_group.into(),
            }),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    pub fn cluster_api(&self) -> &dyn ClusterApi {
        self.inner.cluster_api.as_ref()
    }

    pub fn reconciler(&self) -> &QuotaReconciler {
        &self.inner.reconciler
    }

    pub fn quota_managers_group(&self) -> &str {
        &self.inner.quota_managers_group
    }
}
