//! Typed operations on cluster resources.
//!
//! Thin wrappers that build the API paths and bodies the quota manager
//! needs and pick the interesting fields out of the responses.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::json;

use super::{ApiRequest, ClusterApi, ClusterApiError};
use crate::registry::Cluster;

pub const NAMESPACES: &str = "/api/v1/namespaces";
pub const PROJECT_REQUESTS: &str = "/apis/project.openshift.io/v1/projectrequests";
pub const TOKEN_REVIEWS: &str = "/apis/authentication.k8s.io/v1/tokenreviews";

pub fn namespace_path(namespace: &str) -> String {
    format!("{NAMESPACES}/{namespace}")
}

pub fn resource_quota_path(namespace: &str, name: &str) -> String {
    format!("{NAMESPACES}/{namespace}/resourcequotas/{name}")
}

pub fn role_bindings_path(namespace: &str) -> String {
    format!("/apis/rbac.authorization.k8s.io/v1/namespaces/{namespace}/rolebindings")
}

pub fn group_path(group: &str) -> String {
    format!("/apis/user.openshift.io/v1/groups/{group}")
}

fn unexpected(what: &str, e: serde_json::Error) -> ClusterApiError {
    ClusterApiError::UnexpectedResponse(format!("{what}: {e}"))
}

#[derive(Deserialize)]
struct ObjectList {
    #[serde(default)]
    items: Vec<Object>,
}

#[derive(Deserialize)]
struct Object {
    metadata: ObjectMeta,
}

#[derive(Deserialize)]
struct ObjectMeta {
    name: String,
}

/// Names of namespaces carrying `label_name=label_value`, sorted.
pub async fn list_labeled_namespaces(
    api: &dyn ClusterApi,
    cluster: &Cluster,
    label_name: &str,
    label_value: &str,
) -> Result<Vec<String>, ClusterApiError> {
    let response = api
        .send(
            cluster,
            ApiRequest::get(NAMESPACES)
                .with_query("labelSelector", format!("{label_name}={label_value}")),
        )
        .await?;
    let list = ObjectList::deserialize(&response).map_err(|e| unexpected("namespace list", e))?;

    let mut names: Vec<_> = list.items.into_iter().map(|o| o.metadata.name).collect();
    names.sort();
    Ok(names)
}

/// Fetches a ResourceQuota; `None` if it does not exist.
pub async fn get_resource_quota(
    api: &dyn ClusterApi,
    cluster: &Cluster,
    namespace: &str,
    name: &str,
) -> Result<Option<serde_json::Value>, ClusterApiError> {
    match api
        .send(cluster, ApiRequest::get(resource_quota_path(namespace, name)))
        .await
    {
        Ok(quota) => Ok(Some(quota)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Replaces the listed `spec.hard` entries of a ResourceQuota.
pub async fn patch_resource_quota(
    api: &dyn ClusterApi,
    cluster: &Cluster,
    namespace: &str,
    patch: &qm_reconcile::Patch,
    dry_run: bool,
) -> Result<(), ClusterApiError> {
    api.send(
        cluster,
        ApiRequest::patch(
            resource_quota_path(namespace, &patch.quota_object_name),
            patch.body(),
        )
        .with_dry_run(dry_run),
    )
    .await?;
    Ok(())
}

/// Sets labels on a namespace, leaving other labels untouched.
pub async fn patch_namespace_labels(
    api: &dyn ClusterApi,
    cluster: &Cluster,
    namespace: &str,
    labels: &[(String, String)],
    dry_run: bool,
) -> Result<(), ClusterApiError> {
    let labels: BTreeMap<_, _> = labels.iter().cloned().collect();
    api.send(
        cluster,
        ApiRequest::patch(
            namespace_path(namespace),
            json!({ "metadata": { "labels": labels } }),
        )
        .with_dry_run(dry_run),
    )
    .await?;
    Ok(())
}

/// Requests a new project (namespace plus default template objects).
pub async fn create_project_request(
    api: &dyn ClusterApi,
    cluster: &Cluster,
    project: &str,
) -> Result<(), ClusterApiError> {
    api.send(
        cluster,
        ApiRequest::post(
            PROJECT_REQUESTS,
            json!({
                "kind": "ProjectRequest",
                "apiVersion": "project.openshift.io/v1",
                "metadata": { "name": project }
            }),
        ),
    )
    .await?;
    Ok(())
}

/// Binds `user` to the `admin` ClusterRole inside `namespace`.
pub async fn create_admin_role_binding(
    api: &dyn ClusterApi,
    cluster: &Cluster,
    namespace: &str,
    user: &str,
) -> Result<(), ClusterApiError> {
    api.send(
        cluster,
        ApiRequest::post(
            role_bindings_path(namespace),
            json!({
                "kind": "RoleBinding",
                "apiVersion": "rbac.authorization.k8s.io/v1",
                "metadata": { "name": format!("admin-{user}"), "namespace": namespace },
                "roleRef": {
                    "apiGroup": "rbac.authorization.k8s.io",
                    "kind": "ClusterRole",
                    "name": "admin"
                },
                "subjects": [
                    { "apiGroup": "rbac.authorization.k8s.io", "kind": "User", "name": user }
                ]
            }),
        ),
    )
    .await?;
    Ok(())
}

/// Reviews a bearer token; `None` if the cluster does not recognise it.
pub async fn review_token(
    api: &dyn ClusterApi,
    cluster: &Cluster,
    token: &str,
) -> Result<Option<String>, ClusterApiError> {
    let review = api
        .send(
            cluster,
            ApiRequest::post(
                TOKEN_REVIEWS,
                json!({
                    "kind": "TokenReview",
                    "apiVersion": "authentication.k8s.io/v1",
                    "spec": { "token": token }
                }),
            ),
        )
        .await?;

    Ok(review
        .pointer("/status/user/username")
        .and_then(|v| v.as_str())
        .filter(|name| !name.is_empty())
        .map(str::to_string))
}

/// Members of a user group. A group without a user list has no members.
pub async fn group_users(
    api: &dyn ClusterApi,
    cluster: &Cluster,
    group: &str,
) -> Result<Vec<String>, ClusterApiError> {
    let response = api.send(cluster, ApiRequest::get(group_path(group))).await?;
    Ok(response
        .get("users")
        .and_then(|users| users.as_array())
        .map(|users| {
            users
                .iter()
                .filter_map(|u| u.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default())
}
