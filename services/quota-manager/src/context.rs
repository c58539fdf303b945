use std::sync::Arc;

use qm_id::Username;
use qm_scheme::CompiledScheme;

use crate::registry::Cluster;

/// Who is acting, on which cluster, under which scheme.
///
/// Built once the caller is authorized and passed explicitly to every
/// reconciler operation.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub username: Username,
    pub cluster: Arc<Cluster>,
    pub scheme: Arc<CompiledScheme>,
}
