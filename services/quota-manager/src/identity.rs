//! Identity collaborator: who is calling, and may they manage quotas.

use qm_id::Username;
use thiserror::Error;
use tracing::debug;

use crate::cluster::{resources, ClusterApi, ClusterApiError};
use crate::registry::Cluster;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("invalid or expired token")]
    InvalidToken,

    #[error("user '{username}' is not a quota manager")]
    NotQuotaManager { username: String },

    #[error(transparent)]
    Cluster(#[from] ClusterApiError),
}

/// Resolves a bearer token to a username through a TokenReview.
pub async fn authenticate(
    api: &dyn ClusterApi,
    cluster: &Cluster,
    token: &str,
) -> Result<Username, IdentityError> {
    let username = resources::review_token(api, cluster, token)
        .await?
        .ok_or(IdentityError::InvalidToken)?;

    Username::parse(&username).map_err(|e| {
        debug!(cluster = %cluster.id, error = %e, "token review returned unusable username");
        IdentityError::InvalidToken
    })
}

/// Fails unless `username` is listed in `group` on the cluster.
///
/// A group that does not exist has no members.
pub async fn require_group_member(
    api: &dyn ClusterApi,
    cluster: &Cluster,
    group: &str,
    username: &Username,
) -> Result<(), IdentityError> {
    let members = match resources::group_users(api, cluster, group).await {
        Ok(members) => members,
        Err(e) if e.is_not_found() => Vec::new(),
        Err(e) => return Err(e.into()),
    };

    if members.iter().any(|member| member == username.as_str()) {
        Ok(())
    } else {
        Err(IdentityError::NotQuotaManager {
            username: username.to_string(),
        })
    }
}
