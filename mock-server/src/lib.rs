use std::{collections::HashMap, sync::Arc};

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const USERNAME: &str = "user@example.com";
pub const PASSWORD: &str = "hunter2";
pub const ACCESS_TOKEN: &str = "mock-access-token";
pub const REFRESH_TOKEN: &str = "mock-refresh-token";
pub const API_VERSION: &str = "v1.4.34";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub uuid: Uuid,
    pub status: String,
    pub client_tool_name: Option<String>,
    pub api_version: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    #[serde(rename = "swcID")]
    pub swc_id: String,
    pub swc_title: String,
    pub severity: String,
    pub description: String,
}

#[derive(Deserialize)]
pub struct Login {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub client_tool_name: Option<String>,
    pub data: Value,
}

#[derive(Deserialize)]
pub struct Page {
    pub offset: Option<usize>,
}

#[derive(Default)]
pub struct Store {
    pub analyses: HashMap<Uuid, Analysis>,
    pub issues: HashMap<Uuid, Vec<Issue>>,
}

pub type Db = Arc<RwLock<Store>>;

/// Stub of the analysis API: login, version, submission, listing, status and issues.
pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Store::default()));
    Router::new()
        .route("/v1/auth/login", post(login))
        .route("/v1/version", get(version))
        .route("/v1/analyses", get(list_analyses).post(submit_analysis))
        .route("/v1/analyses/{uuid}", get(analysis_status))
        .route("/v1/analyses/{uuid}/issues", get(analysis_issues))
        .with_state(db)
}

/// Answers every request, on any path, with `status` and `body`.
pub fn scripted(status: StatusCode, body: impl Into<String>) -> Router {
    let body = body.into();
    Router::new().fallback(move || {
        let body = body.clone();
        async move { (status, body) }
    })
}

/// Reflects the received request back as a JSON document.
pub fn echo() -> Router {
    Router::new().fallback(echo_request)
}

pub async fn run(listener: TcpListener, router: Router) -> Result<(), std::io::Error> {
    axum::serve(listener, router).await
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value == format!("Bearer {ACCESS_TOKEN}"))
}

async fn login(Json(input): Json<Login>) -> Response {
    if input.username != USERNAME || input.password != PASSWORD {
        return error(StatusCode::UNAUTHORIZED, "Wrong credentials");
    }
    Json(json!({
        "jwtTokens": { "access": ACCESS_TOKEN, "refresh": REFRESH_TOKEN }
    }))
    .into_response()
}

async fn version() -> Json<Value> {
    Json(json!({
        "api": API_VERSION,
        "maru": "0.5.2",
        "mythril": "0.21.17",
        "harvey": "0.0.34",
        "hash": "6e5b1f3b0fa14c7ba7d5f2d4b11b5f70"
    }))
}

async fn submit_analysis(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<Submission>,
) -> Response {
    if !authorized(&headers) {
        return error(StatusCode::UNAUTHORIZED, "Unauthorized");
    }
    if !input.data.is_object() {
        return error(StatusCode::BAD_REQUEST, "data must be an object");
    }
    let analysis = Analysis {
        uuid: Uuid::new_v4(),
        status: "Queued".to_string(),
        client_tool_name: input.client_tool_name,
        api_version: API_VERSION.to_string(),
    };
    let issues = if input.data.get("sources").is_some() {
        vec![Issue {
            swc_id: "SWC-110".to_string(),
            swc_title: "Assert Violation".to_string(),
            severity: "Low".to_string(),
            description: "A reachable exception has been detected.".to_string(),
        }]
    } else {
        Vec::new()
    };
    let mut store = db.write().await;
    store.issues.insert(analysis.uuid, issues);
    store.analyses.insert(analysis.uuid, analysis.clone());
    Json(analysis).into_response()
}

async fn list_analyses(
    State(db): State<Db>,
    headers: HeaderMap,
    Query(page): Query<Page>,
) -> Response {
    if !authorized(&headers) {
        return error(StatusCode::UNAUTHORIZED, "Unauthorized");
    }
    let store = db.read().await;
    let mut analyses: Vec<Analysis> = store.analyses.values().cloned().collect();
    analyses.sort_by_key(|analysis| analysis.uuid);
    let total = analyses.len();
    let analyses: Vec<Analysis> = analyses
        .into_iter()
        .skip(page.offset.unwrap_or(0))
        .collect();
    Json(json!({ "analyses": analyses, "total": total })).into_response()
}

async fn analysis_status(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(uuid): Path<String>,
) -> Response {
    if !authorized(&headers) {
        return error(StatusCode::UNAUTHORIZED, "Unauthorized");
    }
    let Ok(uuid) = Uuid::parse_str(&uuid) else {
        return error(StatusCode::BAD_REQUEST, "bad uuid");
    };
    let store = db.read().await;
    match store.analyses.get(&uuid) {
        Some(analysis) => Json(analysis.clone()).into_response(),
        None => error(StatusCode::NOT_FOUND, "Analysis not found"),
    }
}

async fn analysis_issues(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(uuid): Path<String>,
) -> Response {
    if !authorized(&headers) {
        return error(StatusCode::UNAUTHORIZED, "Unauthorized");
    }
    let Ok(uuid) = Uuid::parse_str(&uuid) else {
        return error(StatusCode::BAD_REQUEST, "bad uuid");
    };
    let store = db.read().await;
    match store.issues.get(&uuid) {
        Some(issues) => Json(json!({ "issues": issues })).into_response(),
        None => error(StatusCode::NOT_FOUND, "Analysis not found"),
    }
}

async fn echo_request(
    method: Method,
    uri: Uri,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<Value> {
    let headers: HashMap<String, String> = headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                value.to_str().unwrap_or_default().to_string(),
            )
        })
        .collect();
    Json(json!({
        "method": method.as_str(),
        "path": uri.path(),
        "query": query,
        "headers": headers,
        "body": String::from_utf8_lossy(&body),
    }))
}
