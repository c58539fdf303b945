//! Cluster API collaborator.
//!
//! Every call the quota manager makes to a managed cluster goes through the
//! [`ClusterApi`] trait:
//! - [`HttpClusterApi`] talks to the real API server over HTTPS
//! - [`MockClusterApi`] keeps an in-memory cluster for tests and development
//!
//! Typed operations built on top of it live in [`resources`].

mod http;
mod mock;
pub mod resources;

pub use http::HttpClusterApi;
pub use mock::{MockClusterApi, RecordedRequest};

use async_trait::async_trait;
use reqwest::Method;
use thiserror::Error;

use crate::registry::Cluster;

/// Content type used for every PATCH.
pub const STRATEGIC_MERGE_PATCH: &str = "application/strategic-merge-patch+json";

/// Errors returned by the cluster API.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClusterApiError {
    /// The API server answered with a non-success status.
    #[error("cluster API returned {status_code}: {message}")]
    Status { status_code: u16, message: String },

    /// The request never completed (timeout, connection refused, TLS).
    #[error("cluster API request failed: {0}")]
    Transport(String),

    /// The API server answered with a body of an unexpected shape.
    #[error("unexpected cluster API response: {0}")]
    UnexpectedResponse(String),

    /// A client for the cluster could not be built.
    #[error("cannot configure client for cluster '{cluster}': {reason}")]
    Client { cluster: String, reason: String },
}

impl ClusterApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status_code: 404, .. })
    }
}

/// A single call against a cluster's API server.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,

    /// Absolute API path, e.g. `/api/v1/namespaces`.
    pub path: String,

    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,

    /// Send the body as a strategic merge patch.
    pub patch: bool,

    /// Ask the server to validate without persisting (`dryRun=All`).
    pub dry_run: bool,
}

impl ApiRequest {
    fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            patch: false,
            dry_run: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            body: Some(body),
            ..Self::new(Method::POST, path)
        }
    }

    pub fn patch(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            body: Some(body),
            patch: true,
            ..Self::new(Method::PATCH, path)
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Query pairs as sent on the wire, including `dryRun`.
    pub fn wire_query(&self) -> Vec<(String, String)> {
        let mut query = self.query.clone();
        if self.dry_run {
            query.push(("dryRun".to_string(), "All".to_string()));
        }
        query
    }
}

/// Performs API calls against a managed cluster.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Send a request and return the parsed JSON response body.
    async fn send(
        &self,
        cluster: &Cluster,
        request: ApiRequest,
    ) -> Result<serde_json::Value, ClusterApiError>;
}
