//! In-memory cluster for tests and development.
//!
//! Understands the handful of endpoints the quota manager calls. Every
//! cluster shares one world; recorded requests carry the cluster id.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use qm_id::ClusterId;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;

use super::resources::{PROJECT_REQUESTS, TOKEN_REVIEWS};
use super::{ApiRequest, ClusterApi, ClusterApiError};
use crate::registry::Cluster;

/// A mutating request seen by the mock.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub cluster: ClusterId,
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
    pub dry_run: bool,
}

struct InjectedFailure {
    method: Method,
    path: String,
    error: ClusterApiError,
}

#[derive(Default)]
struct World {
    namespaces: BTreeMap<String, BTreeMap<String, String>>,
    quotas: BTreeMap<(String, String), Value>,
    project_template: Vec<(String, Value)>,
    role_bindings: BTreeMap<String, Vec<Value>>,
    groups: BTreeMap<String, Vec<String>>,
    tokens: BTreeMap<String, String>,
    requests: Vec<RecordedRequest>,
    failures: Vec<InjectedFailure>,
}

/// Mock cluster API.
#[derive(Default)]
pub struct MockClusterApi {
    world: Mutex<World>,
}

fn not_found(kind: &str, name: &str) -> ClusterApiError {
    ClusterApiError::Status {
        status_code: 404,
        message: format!("{kind} \"{name}\" not found"),
    }
}

fn already_exists(kind: &str, name: &str) -> ClusterApiError {
    ClusterApiError::Status {
        status_code: 409,
        message: format!("{kind} \"{name}\" already exists"),
    }
}

fn unsupported(request: &ApiRequest) -> ClusterApiError {
    ClusterApiError::Status {
        status_code: 404,
        message: format!("the server could not find {} {}", request.method, request.path),
    }
}

fn resource_quota(name: &str, hard: Value, used: Value) -> Value {
    json!({
        "apiVersion": "v1",
        "kind": "ResourceQuota",
        "metadata": { "name": name },
        "spec": { "hard": hard },
        "status": { "hard": {}, "used": used }
    })
}

fn string_map(pairs: &[(&str, &str)]) -> Value {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
        .collect::<serde_json::Map<_, _>>()
        .into()
}

impl MockClusterApi {
    pub fn new() -> Self {
        Self::default()
    }

    fn world(&self) -> MutexGuard<'_, World> {
        self.world.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes `token` review as `username`.
    pub fn add_token(&self, token: &str, username: &str) {
        self.world()
            .tokens
            .insert(token.to_string(), username.to_string());
    }

    pub fn add_group(&self, group: &str, users: &[&str]) {
        self.world().groups.insert(
            group.to_string(),
            users.iter().map(|u| u.to_string()).collect(),
        );
    }

    pub fn add_namespace(&self, namespace: &str, labels: &[(&str, &str)]) {
        self.world().namespaces.insert(
            namespace.to_string(),
            labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
    }

    pub fn set_resource_quota(
        &self,
        namespace: &str,
        name: &str,
        hard: &[(&str, &str)],
        used: &[(&str, &str)],
    ) {
        self.world().quotas.insert(
            (namespace.to_string(), name.to_string()),
            resource_quota(name, string_map(hard), string_map(used)),
        );
    }

    /// ResourceQuota created in every project made through a ProjectRequest.
    pub fn add_project_template_quota(&self, name: &str, hard: &[(&str, &str)]) {
        self.world()
            .project_template
            .push((name.to_string(), string_map(hard)));
    }

    /// Fails the next `method` request to exactly `path` with `error`.
    pub fn fail_next(&self, method: Method, path: impl Into<String>, error: ClusterApiError) {
        self.world().failures.push(InjectedFailure {
            method,
            path: path.into(),
            error,
        });
    }

    /// Mutating requests received so far, dry runs included.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.world().requests.clone()
    }

    /// Current `spec.hard` of a ResourceQuota.
    pub fn hard_values(&self, namespace: &str, name: &str) -> Option<BTreeMap<String, String>> {
        let world = self.world();
        let quota = world
            .quotas
            .get(&(namespace.to_string(), name.to_string()))?;
        serde_json::from_value(quota.pointer("/spec/hard")?.clone()).ok()
    }

    pub fn namespace_labels(&self, namespace: &str) -> Option<BTreeMap<String, String>> {
        self.world().namespaces.get(namespace).cloned()
    }

    pub fn role_bindings(&self, namespace: &str) -> Vec<Value> {
        self.world()
            .role_bindings
            .get(namespace)
            .cloned()
            .unwrap_or_default()
    }
}

impl World {
    fn take_failure(&mut self, request: &ApiRequest) -> Option<ClusterApiError> {
        let index = self
            .failures
            .iter()
            .position(|f| f.method == request.method && f.path == request.path)?;
        Some(self.failures.remove(index).error)
    }

    fn handle(&mut self, request: &ApiRequest) -> Result<Value, ClusterApiError> {
        let segments: Vec<&str> = request.path.trim_start_matches('/').split('/').collect();
        let body = request.body.clone().unwrap_or(Value::Null);

        match (request.method.clone(), segments.as_slice()) {
            (Method::GET, ["api", "v1", "namespaces"]) => Ok(self.list_namespaces(request)),
            (Method::PATCH, ["api", "v1", "namespaces", namespace]) => {
                self.patch_namespace(namespace, &body, request.dry_run)
            }
            (Method::GET, ["api", "v1", "namespaces", namespace, "resourcequotas", name]) => self
                .quotas
                .get(&(namespace.to_string(), name.to_string()))
                .cloned()
                .ok_or_else(|| not_found("resourcequotas", name)),
            (Method::PATCH, ["api", "v1", "namespaces", namespace, "resourcequotas", name]) => {
                self.patch_quota(namespace, name, &body, request.dry_run)
            }
            (
                Method::POST,
                ["apis", "rbac.authorization.k8s.io", "v1", "namespaces", namespace, "rolebindings"],
            ) => {
                if !self.namespaces.contains_key(*namespace) {
                    return Err(not_found("namespaces", namespace));
                }
                if !request.dry_run {
                    self.role_bindings
                        .entry(namespace.to_string())
                        .or_default()
                        .push(body.clone());
                }
                Ok(body)
            }
            (Method::GET, ["apis", "user.openshift.io", "v1", "groups", group]) => self
                .groups
                .get(*group)
                .map(|users| json!({ "kind": "Group", "metadata": { "name": group }, "users": users }))
                .ok_or_else(|| not_found("groups.user.openshift.io", group)),
            (Method::POST, _) if request.path == PROJECT_REQUESTS => {
                self.create_project(&body, request.dry_run)
            }
            (Method::POST, _) if request.path == TOKEN_REVIEWS => Ok(self.review_token(&body)),
            _ => Err(unsupported(request)),
        }
    }

    fn list_namespaces(&self, request: &ApiRequest) -> Value {
        let selector = request
            .query
            .iter()
            .find(|(k, _)| k == "labelSelector")
            .and_then(|(_, v)| v.split_once('='));

        let items: Vec<Value> = self
            .namespaces
            .iter()
            .filter(|(_, labels)| {
                selector.is_none_or(|(key, value)| labels.get(key).is_some_and(|v| v == value))
            })
            .map(|(name, labels)| json!({ "metadata": { "name": name, "labels": labels } }))
            .collect();
        json!({ "kind": "NamespaceList", "items": items })
    }

    fn patch_namespace(
        &mut self,
        namespace: &str,
        body: &Value,
        dry_run: bool,
    ) -> Result<Value, ClusterApiError> {
        let labels = self
            .namespaces
            .get_mut(namespace)
            .ok_or_else(|| not_found("namespaces", namespace))?;
        let mut updated = labels.clone();
        if let Some(patch) = body.pointer("/metadata/labels").and_then(Value::as_object) {
            for (key, value) in patch {
                match value.as_str() {
                    Some(value) => updated.insert(key.clone(), value.to_string()),
                    None => updated.remove(key),
                };
            }
        }
        let response = json!({ "metadata": { "name": namespace, "labels": updated } });
        if !dry_run {
            *labels = updated;
        }
        Ok(response)
    }

    fn patch_quota(
        &mut self,
        namespace: &str,
        name: &str,
        body: &Value,
        dry_run: bool,
    ) -> Result<Value, ClusterApiError> {
        let quota = self
            .quotas
            .get_mut(&(namespace.to_string(), name.to_string()))
            .ok_or_else(|| not_found("resourcequotas", name))?;
        let mut updated = quota.clone();
        if let (Some(patch), Some(hard)) = (
            body.pointer("/spec/hard").and_then(Value::as_object),
            updated
                .pointer_mut("/spec/hard")
                .and_then(Value::as_object_mut),
        ) {
            for (key, value) in patch {
                hard.insert(key.clone(), value.clone());
            }
        }
        if !dry_run {
            *quota = updated.clone();
        }
        Ok(updated)
    }

    fn create_project(&mut self, body: &Value, dry_run: bool) -> Result<Value, ClusterApiError> {
        let name = body
            .pointer("/metadata/name")
            .and_then(Value::as_str)
            .ok_or_else(|| ClusterApiError::Status {
                status_code: 422,
                message: "ProjectRequest metadata.name is required".to_string(),
            })?
            .to_string();
        if self.namespaces.contains_key(&name) {
            return Err(already_exists("projects.project.openshift.io", &name));
        }
        if !dry_run {
            self.namespaces.insert(name.clone(), BTreeMap::new());
            for (quota, hard) in &self.project_template {
                self.quotas.insert(
                    (name.clone(), quota.clone()),
                    resource_quota(quota, hard.clone(), json!({})),
                );
            }
        }
        Ok(json!({ "kind": "Project", "metadata": { "name": name } }))
    }

    fn review_token(&self, body: &Value) -> Value {
        let token = body.pointer("/spec/token").and_then(Value::as_str);
        match token.and_then(|t| self.tokens.get(t)) {
            Some(username) => json!({
                "kind": "TokenReview",
                "status": { "authenticated": true, "user": { "username": username } }
            }),
            None => json!({ "kind": "TokenReview", "status": { "authenticated": false } }),
        }
    }
}

#[async_trait]
impl ClusterApi for MockClusterApi {
    async fn send(&self, cluster: &Cluster, request: ApiRequest) -> Result<Value, ClusterApiError> {
        let mut world = self.world();
        debug!(
            cluster = %cluster.id,
            method = %request.method,
            path = %request.path,
            dry_run = request.dry_run,
            "[MOCK] cluster API request"
        );

        if request.method != Method::GET {
            world.requests.push(RecordedRequest {
                cluster: cluster.id.clone(),
                method: request.method.clone(),
                path: request.path.clone(),
                body: request.body.clone(),
                dry_run: request.dry_run,
            });
        }

        if let Some(error) = world.take_failure(&request) {
            return Err(error);
        }
        world.handle(&request)
    }
}
