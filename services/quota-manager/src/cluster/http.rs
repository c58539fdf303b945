//! reqwest-backed cluster API client.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use qm_id::ClusterId;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use tracing::{debug, error};

use super::{ApiRequest, ClusterApi, ClusterApiError, STRATEGIC_MERGE_PATCH};
use crate::registry::{Cluster, Registry};

/// Talks to each registered cluster with its own HTTP client.
///
/// Clients carry the cluster's bearer credential, its optional CA bundle
/// and a fixed per-call timeout. Timed out calls are not retried.
pub struct HttpClusterApi {
    clients: HashMap<ClusterId, reqwest::Client>,
}

/// The `Status` object returned with API errors.
#[derive(Deserialize)]
struct StatusBody {
    message: Option<String>,
}

impl HttpClusterApi {
    /// Builds one client per cluster in the registry.
    pub fn new(registry: &Registry, timeout: Duration) -> Result<Self, ClusterApiError> {
        let mut clients = HashMap::new();
        for cluster in registry.clusters() {
            clients.insert(cluster.id.clone(), build_client(cluster, timeout)?);
        }
        Ok(Self { clients })
    }

    fn client(&self, cluster: &Cluster) -> Result<&reqwest::Client, ClusterApiError> {
        self.clients
            .get(&cluster.id)
            .ok_or_else(|| ClusterApiError::Client {
                cluster: cluster.id.to_string(),
                reason: "cluster was not registered when the client was built".to_string(),
            })
    }
}

fn build_client(cluster: &Cluster, timeout: Duration) -> Result<reqwest::Client, ClusterApiError> {
    let client_err = |reason: String| ClusterApiError::Client {
        cluster: cluster.id.to_string(),
        reason,
    };

    let mut auth = HeaderValue::from_str(&format!("Bearer {}", cluster.credential_token()))
        .map_err(|_| client_err("credential token is not a valid header value".to_string()))?;
    auth.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, auth);
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    let mut builder = reqwest::Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .user_agent(concat!("quota-manager/", env!("CARGO_PKG_VERSION")));

    if let Some(path) = &cluster.ca_cert_path {
        let pem = std::fs::read(path)
            .map_err(|e| client_err(format!("cannot read CA bundle '{}': {e}", path.display())))?;
        let cert = reqwest::Certificate::from_pem(&pem)
            .map_err(|e| client_err(format!("invalid CA bundle '{}': {e}", path.display())))?;
        builder = builder.add_root_certificate(cert);
    }

    builder.build().map_err(|e| client_err(e.to_string()))
}

#[async_trait]
impl ClusterApi for HttpClusterApi {
    async fn send(
        &self,
        cluster: &Cluster,
        request: ApiRequest,
    ) -> Result<serde_json::Value, ClusterApiError> {
        let client = self.client(cluster)?;
        let url = format!("{}{}", cluster.api_endpoint, request.path);
        debug!(
            cluster = %cluster.id,
            method = %request.method,
            path = %request.path,
            dry_run = request.dry_run,
            "cluster API request"
        );

        let mut builder = client
            .request(request.method.clone(), &url)
            .query(&request.wire_query());
        if let Some(body) = &request.body {
            let content_type = if request.patch {
                STRATEGIC_MERGE_PATCH
            } else {
                "application/json"
            };
            let bytes = serde_json::to_vec(body)
                .map_err(|e| ClusterApiError::Transport(e.to_string()))?;
            builder = builder.header(CONTENT_TYPE, content_type).body(bytes);
        }

        let response = builder.send().await.map_err(|e| {
            error!(
                cluster = %cluster.id,
                method = %request.method,
                path = %request.path,
                error = %e,
                "cluster API request failed"
            );
            ClusterApiError::Transport(e.to_string())
        })?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ClusterApiError::Transport(e.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_slice::<StatusBody>(&bytes)
                .ok()
                .and_then(|body| body.message)
                .unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("unknown error")
                        .to_string()
                });
            debug!(
                cluster = %cluster.id,
                status = status.as_u16(),
                message = %message,
                "cluster API returned error"
            );
            return Err(ClusterApiError::Status {
                status_code: status.as_u16(),
                message,
            });
        }

        if bytes.is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_slice(&bytes).map_err(|e| ClusterApiError::UnexpectedResponse(e.to_string()))
    }
}
