use std::sync::Arc;

use qm_quota_manager::{
    api::{self, UsernameResponse, WriteResponse},
    cluster::{resources, ClusterApiError, MockClusterApi, RecordedRequest},
    config::{ManagedLabel, UsernameFormat},
    reconciler::QuotaReconciler,
    registry::{Registry, Source},
    state::AppState,
};
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};
use tokio::net::TcpListener;

const SCHEME: &str = r#"{
    "name": "standard",
    "version": 3,
    "labels": { "team": "" },
    "quota": {
        "compute": {
            "limits.cpu": { "displayName": "CPU", "allowedUnits": ["", "m"], "valueType": "decimal" },
            "limits.memory": { "displayName": "Memory", "allowedUnits": ["Gi", "Mi"], "valueType": "integer" }
        },
        "pods": {
            "count": { "displayName": "Pods", "allowedUnits": "", "valueType": "integer" }
        }
    }
}"#;

const MANAGED: (&str, &str) = ("quota.example.com/managed", "true");

fn cluster_doc(display_name: &str, production: bool) -> String {
    format!(
        r#"{{
            "displayName": "{display_name}",
            "apiEndpoint": "https://api.{display_name}.example.com:6443",
            "isProduction": {production},
            "credentialToken": "sha256~service",
            "schemeRef": "standard"
        }}"#
    )
}

struct ApiFixture {
    base_url: String,
    cluster: Arc<MockClusterApi>,
    client: reqwest::Client,
}

impl ApiFixture {
    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn get(&self, path: &str, token: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .unwrap()
    }

    async fn put(&self, path: &str, token: &str, body: Value) -> reqwest::Response {
        self.client
            .put(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    fn patches(&self) -> Vec<RecordedRequest> {
        self.cluster
            .requests()
            .into_iter()
            .filter(|r| r.method == Method::PATCH)
            .collect()
    }
}

async fn start_api() -> ApiFixture {
    let registry = Registry::load(
        vec![Source::new("standard.json", SCHEME)],
        vec![
            Source::new("dev.json", cluster_doc("dev", false)),
            Source::new("prod.json", cluster_doc("prod", true)),
        ],
    )
    .unwrap();

    let cluster = Arc::new(MockClusterApi::new());
    cluster.add_token("alice-token", "alice");
    cluster.add_token("bob-token", "bob");
    cluster.add_group("quota-managers", &["alice"]);
    cluster.add_namespace("team-a", &[MANAGED]);
    cluster.add_namespace("kube-system", &[]);
    cluster.set_resource_quota(
        "team-a",
        "compute",
        &[("limits.cpu", "2"), ("limits.memory", "4Gi")],
        &[("limits.cpu", "500m"), ("limits.memory", "1Gi")],
    );
    cluster.set_resource_quota("team-a", "pods", &[("count", "8")], &[("count", "5")]);

    let reconciler = QuotaReconciler::new(
        cluster.clone(),
        ManagedLabel {
            name: MANAGED.0.parse().unwrap(),
            value: MANAGED.1.to_string(),
        },
        UsernameFormat::default(),
    );
    let state = AppState::new(
        Arc::new(registry),
        cluster.clone(),
        reconciler,
        "quota-managers",
    );
    let app = api::create_router(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    ApiFixture {
        base_url: format!("http://{addr}"),
        cluster,
        client: reqwest::Client::new(),
    }
}

fn submission(cpu: &str, memory: &str, pods: &str) -> Value {
    json!({
        "labels": { "team": "payments" },
        "quota": {
            "compute": {
                "limits.cpu": { "value": cpu, "units": "" },
                "limits.memory": { "value": memory, "units": "Gi" }
            },
            "pods": { "count": { "value": pods, "units": "" } }
        }
    })
}

async fn problem(resp: reqwest::Response) -> Value {
    assert_eq!(
        resp.headers()["content-type"],
        "application/problem+json",
        "error responses are problem details"
    );
    resp.json().await.unwrap()
}

#[tokio::test]
async fn healthz_and_clusters_are_public() {
    let fixture = start_api().await;

    let resp = fixture.client.get(fixture.url("/healthz")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["clusters"], 2);

    let resp = fixture.client.get(fixture.url("/clusters")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(
        body,
        json!({
            "dev": { "displayName": "dev", "production": false },
            "prod": { "displayName": "prod", "production": true }
        })
    );
}

#[tokio::test]
async fn username_needs_no_group_membership() {
    let fixture = start_api().await;

    let resp = fixture
        .client
        .get(fixture.url("/username?cluster=dev&token=bob-token"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: UsernameResponse = resp.json().await.unwrap();
    assert_eq!(body.username, "bob");
}

#[tokio::test]
async fn caller_must_be_authenticated_quota_manager() {
    let fixture = start_api().await;

    let resp = fixture
        .client
        .get(fixture.url("/quota?cluster=dev&project=team-a"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(problem(resp).await["code"], "missing_token");

    let resp = fixture.get("/quota?cluster=dev&project=team-a", "stolen").await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(problem(resp).await["code"], "invalid_token");

    let resp = fixture.get("/quota?cluster=dev&project=team-a", "bob-token").await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = fixture
        .client
        .get(fixture.url("/quota?cluster=dev&project=team-a&token=alice-token"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn unknown_or_missing_cluster_is_a_client_error() {
    let fixture = start_api().await;

    let resp = fixture.get("/projects?cluster=staging", "alice-token").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = problem(resp).await;
    assert_eq!(body["code"], "unknown_cluster");
    assert!(body["request_id"].as_str().unwrap().starts_with("req_"));

    let resp = fixture.get("/projects", "alice-token").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(problem(resp).await["code"], "missing_parameter");
}

#[tokio::test]
async fn request_id_header_is_echoed_in_errors() {
    let fixture = start_api().await;

    let resp = fixture
        .client
        .get(fixture.url("/projects?cluster=staging"))
        .bearer_auth("alice-token")
        .header("x-request-id", "req_from_client")
        .send()
        .await
        .unwrap();
    assert_eq!(problem(resp).await["request_id"], "req_from_client");
}

#[tokio::test]
async fn lists_managed_projects_only() {
    let fixture = start_api().await;

    let resp = fixture.get("/projects?cluster=dev", "alice-token").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "projects": ["team-a"] }));
}

#[tokio::test]
async fn read_quota_in_display_units() {
    let fixture = start_api().await;
    fixture.cluster.set_resource_quota(
        "team-a",
        "compute",
        &[("limits.cpu", "1500m"), ("limits.memory", "2048Mi")],
        &[],
    );

    let resp = fixture.get("/quota?cluster=dev&project=team-a", "alice-token").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let text = resp.text().await.unwrap();
    let body: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(
        body,
        json!({
            "compute": {
                "limits.cpu": { "value": "1.5", "units": "" },
                "limits.memory": { "value": "2", "units": "Gi" }
            },
            "pods": { "count": { "value": "8", "units": "" } }
        })
    );
    assert!(text.find("compute").unwrap() < text.find("pods").unwrap());
}

#[tokio::test]
async fn quota_below_usage_is_rejected_without_patches() {
    let fixture = start_api().await;

    let resp = fixture
        .put(
            "/quota?cluster=dev&project=team-a",
            "alice-token",
            submission("2", "4", "3"),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = problem(resp).await;
    assert_eq!(body["code"], "quota_below_usage");
    assert_eq!(body["details"][0]["field"], "quota.pods.count.value");
    assert!(body["detail"].as_str().unwrap().contains('5'));

    assert!(fixture.patches().is_empty());
    assert_eq!(fixture.cluster.hard_values("team-a", "pods").unwrap()["count"], "8");
}

#[tokio::test]
async fn write_patches_labels_then_changed_objects() {
    let fixture = start_api().await;

    let resp = fixture
        .put(
            "/quota?cluster=dev&project=team-a",
            "alice-token",
            submission("2", "4", "10"),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: WriteResponse = resp.json().await.unwrap();
    assert!(!body.dry_run);
    assert_eq!(body.patched, vec!["pods"]);
    assert_eq!(body.unchanged, vec!["compute"]);

    let patches = fixture.patches();
    assert_eq!(patches.len(), 2);
    assert_eq!(patches[0].path, resources::namespace_path("team-a"));
    assert_eq!(
        patches[1].path,
        resources::resource_quota_path("team-a", "pods")
    );
    assert_eq!(
        patches[1].body,
        Some(json!({ "spec": { "hard": { "count": "10" } } }))
    );
    assert_eq!(fixture.cluster.hard_values("team-a", "pods").unwrap()["count"], "10");
    assert_eq!(
        fixture.cluster.namespace_labels("team-a").unwrap()["team"],
        "payments"
    );
}

#[tokio::test]
async fn dry_run_changes_nothing() {
    let fixture = start_api().await;

    let resp = fixture
        .put(
            "/quota?cluster=dev&project=team-a&dryRun=true",
            "alice-token",
            submission("4", "8", "20"),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: WriteResponse = resp.json().await.unwrap();
    assert!(body.dry_run);
    assert_eq!(body.patched, vec!["compute", "pods"]);

    let patches = fixture.patches();
    assert_eq!(patches.len(), 3);
    assert!(patches.iter().all(|p| p.dry_run));
    assert_eq!(fixture.cluster.hard_values("team-a", "pods").unwrap()["count"], "8");
    assert_eq!(
        fixture.cluster.hard_values("team-a", "compute").unwrap()["limits.cpu"],
        "2"
    );
    assert!(!fixture
        .cluster
        .namespace_labels("team-a")
        .unwrap()
        .contains_key("team"));
}

#[tokio::test]
async fn invalid_dry_run_flag_is_rejected() {
    let fixture = start_api().await;

    let resp = fixture
        .put(
            "/quota?cluster=dev&project=team-a&dryRun=maybe",
            "alice-token",
            submission("4", "8", "20"),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(problem(resp).await["code"], "invalid_parameter");
    assert!(fixture.patches().is_empty());
}

#[tokio::test]
async fn undeclared_quota_object_is_rejected() {
    let fixture = start_api().await;
    let mut body = submission("2", "4", "10");
    body["quota"]["storage"] = json!({ "requests.storage": { "value": "1", "units": "Gi" } });

    let resp = fixture
        .put("/quota?cluster=dev&project=team-a", "alice-token", body)
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = problem(resp).await;
    assert_eq!(body["code"], "invalid_submission");
    assert_eq!(body["details"][0]["field"], "quota.storage");
    assert!(fixture.patches().is_empty());
}

#[tokio::test]
async fn malformed_value_names_the_parameter() {
    let fixture = start_api().await;

    let resp = fixture
        .put(
            "/quota?cluster=dev&project=team-a",
            "alice-token",
            submission("2", "4.5", "10"),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = problem(resp).await;
    assert_eq!(body["details"][0]["field"], "quota.compute.limits.memory.value");
}

#[tokio::test]
async fn malformed_body_is_rejected() {
    let fixture = start_api().await;

    let resp = fixture
        .client
        .put(fixture.url("/quota?cluster=dev&project=team-a"))
        .bearer_auth("alice-token")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(problem(resp).await["code"], "invalid_submission");
}

#[tokio::test]
async fn unmanaged_project_is_refused() {
    let fixture = start_api().await;

    let resp = fixture
        .get("/quota?cluster=dev&project=kube-system", "alice-token")
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(problem(resp).await["code"], "project_not_managed");
}

#[tokio::test]
async fn missing_quota_object_is_a_gateway_error() {
    let fixture = start_api().await;
    fixture.cluster.add_namespace("team-b", &[MANAGED]);
    fixture.cluster.set_resource_quota(
        "team-b",
        "compute",
        &[("limits.cpu", "1"), ("limits.memory", "1Gi")],
        &[],
    );

    let resp = fixture.get("/quota?cluster=dev&project=team-b", "alice-token").await;
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    let body = problem(resp).await;
    assert_eq!(body["code"], "inconsistent_cluster_state");
    assert!(body["detail"].as_str().unwrap().contains("pods"));
}

#[tokio::test]
async fn upstream_failures_map_to_gateway_and_service_errors() {
    let fixture = start_api().await;

    fixture.cluster.fail_next(
        Method::PATCH,
        resources::resource_quota_path("team-a", "pods"),
        ClusterApiError::Status {
            status_code: 422,
            message: "admission webhook \"quota.example.com\" denied the request".to_string(),
        },
    );
    let resp = fixture
        .put(
            "/quota?cluster=dev&project=team-a",
            "alice-token",
            submission("2", "4", "10"),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    let body = problem(resp).await;
    assert_eq!(body["code"], "upstream_error");
    assert!(body["detail"].as_str().unwrap().contains("admission webhook"));

    fixture.cluster.fail_next(
        Method::GET,
        resources::resource_quota_path("team-a", "compute"),
        ClusterApiError::Transport("operation timed out".to_string()),
    );
    let resp = fixture.get("/quota?cluster=dev&project=team-a", "alice-token").await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = problem(resp).await;
    assert_eq!(body["detail"], "cluster request failed");
}

#[tokio::test]
async fn create_project_sets_quota_label_and_admin() {
    let fixture = start_api().await;
    fixture
        .cluster
        .add_project_template_quota("compute", &[("limits.cpu", "1"), ("limits.memory", "1Gi")]);
    fixture
        .cluster
        .add_project_template_quota("pods", &[("count", "4")]);

    let resp = fixture
        .client
        .post(fixture.url("/projects?cluster=dev&project=team-new&admin=carol"))
        .bearer_auth("alice-token")
        .json(&submission("2", "4", "10"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let labels = fixture.cluster.namespace_labels("team-new").unwrap();
    assert_eq!(labels[MANAGED.0], MANAGED.1);
    assert_eq!(labels["team"], "payments");
    assert_eq!(fixture.cluster.hard_values("team-new", "pods").unwrap()["count"], "10");
    let bindings = fixture.cluster.role_bindings("team-new");
    assert_eq!(bindings[0]["subjects"][0]["name"], "carol");

    let resp = fixture.get("/projects?cluster=dev", "alice-token").await;
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "projects": ["team-a", "team-new"] }));
}

#[tokio::test]
async fn create_project_rejects_invalid_names() {
    let fixture = start_api().await;

    let resp = fixture
        .client
        .post(fixture.url("/projects?cluster=dev&project=Team_New&admin=carol"))
        .bearer_auth("alice-token")
        .json(&submission("2", "4", "10"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = problem(resp).await;
    assert_eq!(body["code"], "invalid_name");
    assert_eq!(body["details"][0]["field"], "project");

    let resp = fixture
        .client
        .post(fixture.url("/projects?cluster=dev&project=team-new"))
        .bearer_auth("alice-token")
        .json(&submission("2", "4", "10"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(problem(resp).await["code"], "missing_parameter");
    assert!(fixture.cluster.namespace_labels("team-new").is_none());
}

#[tokio::test]
async fn scheme_labels_and_validation_rules() {
    let fixture = start_api().await;

    let scheme: Value = fixture
        .get("/scheme?cluster=dev", "alice-token")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(scheme["name"], "standard");
    assert_eq!(scheme["version"], 3);
    assert_eq!(scheme["quota"]["pods"]["count"]["valueType"], "integer");

    let labels: Value = fixture
        .get("/labels?cluster=dev", "alice-token")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(labels, json!({ "team": "" }));

    let rule: Value = fixture
        .get("/validation/project?cluster=dev", "alice-token")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(rule["type"], "string");
    assert_eq!(rule["pattern"], qm_id::ProjectName::PATTERN);
    assert_eq!(rule["maxLength"], 63);

    let resp = fixture.get("/validation/username?cluster=dev", "bob-token").await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn concurrent_registry_reads_are_identical() {
    let fixture = Arc::new(start_api().await);

    let mut handles = Vec::new();
    for i in 0..16 {
        let fixture = fixture.clone();
        handles.push(tokio::spawn(async move {
            let clusters = fixture
                .client
                .get(fixture.url("/clusters"))
                .send()
                .await
                .unwrap()
                .text()
                .await
                .unwrap();
            let cluster = if i % 2 == 0 { "dev" } else { "prod" };
            let scheme = fixture
                .get(&format!("/scheme?cluster={cluster}"), "alice-token")
                .await
                .text()
                .await
                .unwrap();
            (clusters, scheme)
        }));
    }

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap());
    }
    let (first_clusters, first_scheme) = &results[0];
    for (clusters, scheme) in &results {
        assert_eq!(clusters, first_clusters);
        assert_eq!(scheme, first_scheme);
    }
}
