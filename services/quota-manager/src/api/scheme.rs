//! Scheme and input-validation descriptions for clients.

use axum::{routing::get, Json, Router};
use qm_id::{ProjectName, Username};
use qm_scheme::{OrderedMap, SchemeDocument};
use serde::{Deserialize, Serialize};

use crate::context::RequestContext;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/scheme", get(scheme))
        .route("/labels", get(labels))
        .route("/validation/project", get(project_validation))
        .route("/validation/username", get(username_validation))
}

/// The quota scheme governing the requested cluster.
async fn scheme(ctx: RequestContext) -> Json<SchemeDocument> {
    Json(ctx.scheme.document().clone())
}

/// Label keys the scheme declares and their extra value patterns.
async fn labels(ctx: RequestContext) -> Json<OrderedMap<String>> {
    Json(ctx.scheme.document().labels.clone())
}

/// JSON-schema style description of a string field.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StringRule {
    #[serde(rename = "type")]
    pub kind: String,
    pub pattern: String,
    pub min_length: usize,
    pub max_length: usize,
}

impl StringRule {
    fn new(pattern: &str, min_length: usize, max_length: usize) -> Self {
        Self {
            kind: "string".to_string(),
            pattern: pattern.to_string(),
            min_length,
            max_length,
        }
    }
}

async fn project_validation(_ctx: RequestContext) -> Json<StringRule> {
    Json(StringRule::new(
        ProjectName::PATTERN,
        ProjectName::MIN_LEN,
        ProjectName::MAX_LEN,
    ))
}

async fn username_validation(_ctx: RequestContext) -> Json<StringRule> {
    Json(StringRule::new(
        Username::PATTERN,
        Username::MIN_LEN,
        Username::MAX_LEN,
    ))
}
