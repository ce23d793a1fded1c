//! End-to-end pipeline tests against the live mock server.
//!
//! # Design
//! Each test boots a mock-server router on a random port in a background
//! tokio runtime, then drives `ApiHandler` over real HTTP with the default
//! ureq transport. Covers the status gate as the real agent sees it, auth
//! header precedence and the full login/submit/status/issues flow.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::http::{header, StatusCode};
use axum::routing::get;
use mythx_core::models::{
    Analysis, AnalysisData, AnalysisList, AnalysisListRequest, AnalysisStatus,
    AnalysisStatusRequest, AnalysisSubmissionRequest, AuthLoginRequest, AuthLoginResponse,
    DetectedIssuesRequest, DetectedIssuesResponse, VersionRequest, VersionResponse,
};
use mythx_core::{
    ApiError, ApiHandler, ApiRequest, ApiResponse, ClientToolNameMiddleware, Endpoints,
    Environment, Headers, HttpMethod, Middleware, Params, PipelineConfig, RequestDescriptor,
};
use rstest::rstest;
use serde::Deserialize;
use serde_json::Value;

/// Start `router` on a random port and return its address.
fn spawn(router: axum::Router) -> SocketAddr {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener, router).await
        })
        .unwrap();
    });

    addr
}

fn handler(addr: SocketAddr, middlewares: Vec<Arc<dyn Middleware>>) -> ApiHandler {
    let endpoints = Endpoints::empty()
        .with(Environment::Staging, &format!("http://{addr}"))
        .unwrap();
    ApiHandler::new(PipelineConfig::new(middlewares, true).with_endpoints(endpoints))
}

/// Any request against the echo router; the response is the reflected request.
struct EchoRequest {
    method: HttpMethod,
    headers: Headers,
    params: Params,
}

impl ApiRequest for EchoRequest {
    fn endpoint(&self) -> std::borrow::Cow<'_, str> {
        "/v1/echo".into()
    }

    fn method(&self) -> HttpMethod {
        self.method
    }

    fn parameters(&self) -> Params {
        self.params.clone()
    }

    fn headers(&self) -> Headers {
        self.headers.clone()
    }
}

#[derive(Debug, Deserialize)]
struct Echoed {
    method: String,
    path: String,
    query: std::collections::HashMap<String, String>,
    headers: std::collections::HashMap<String, String>,
    body: String,
}

impl ApiResponse for Echoed {
    fn from_json(raw: &str) -> Result<Self, ApiError> {
        mythx_core::response::from_json(raw)
    }
}

/// Uppercases a marker header so the echo shows the request leg ran.
struct Shout;

impl Middleware for Shout {
    fn process_request(&self, mut request: RequestDescriptor) -> Result<RequestDescriptor, ApiError> {
        if let Some(value) = request.headers.get("x-marker") {
            let loud = value.to_ascii_uppercase();
            request.headers.insert("x-marker", loud);
        }
        Ok(request)
    }
}

#[rstest]
#[case::empty("")]
#[case::single_field(r#"{"issues":[]}"#)]
#[case::large_array(&format!("[{}]", vec![r#"{"swcID":"SWC-110","severity":"Low"}"#; 400].join(",")))]
fn status_200_returns_body_verbatim(#[case] body: &str) {
    let addr = spawn(mock_server::scripted(StatusCode::OK, body.to_string()));
    let handler = handler(addr, Vec::new());

    let descriptor = handler.assemble_request(&VersionRequest).unwrap();
    let raw = handler.send_request(descriptor, None).unwrap();
    assert_eq!(raw, body);
}

#[rstest]
#[case(201)]
#[case(400)]
#[case(401)]
#[case(404)]
#[case(500)]
#[case(503)]
fn non_200_status_is_api_error(#[case] status: u16) {
    let body = r#"{"error":"scripted failure"}"#;
    let addr = spawn(mock_server::scripted(StatusCode::from_u16(status).unwrap(), body));
    let handler = handler(addr, Vec::new());

    let err = handler
        .execute::<_, VersionResponse>(&VersionRequest, None)
        .unwrap_err();
    match &err {
        ApiError::Api { status: s, body: b } => {
            assert_eq!(*s, status);
            assert_eq!(b, body);
        }
        other => panic!("expected ApiError::Api, got {other:?}"),
    }
    assert!(err.to_string().contains(&status.to_string()));
    assert!(err.to_string().contains(body));
}

#[test]
fn redirect_is_not_followed() {
    let followed = Arc::new(AtomicUsize::new(0));
    let counter = followed.clone();
    let router = axum::Router::new()
        .route(
            "/v1/version",
            get(|| async { (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, "/v1/moved")], "moved") }),
        )
        .route(
            "/v1/moved",
            get(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { "{}" }
            }),
        );
    let addr = spawn(router);
    let handler = handler(addr, Vec::new());

    let descriptor = handler.assemble_request(&VersionRequest).unwrap();
    let err = handler.send_request(descriptor, None).unwrap_err();
    assert!(matches!(err, ApiError::Api { status: 301, ref body } if body == "moved"), "got {err:?}");
    assert_eq!(followed.load(Ordering::SeqCst), 0);
}

#[test]
fn non_utf8_error_body_keeps_status() {
    let router = axum::Router::new().fallback(|| async {
        (StatusCode::INTERNAL_SERVER_ERROR, vec![b'x', 0xff, 0xfe])
    });
    let addr = spawn(router);
    let handler = handler(addr, Vec::new());

    let err = handler
        .execute::<_, VersionResponse>(&VersionRequest, None)
        .unwrap_err();
    match err {
        ApiError::Api { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "x\u{fffd}\u{fffd}");
        }
        other => panic!("expected ApiError::Api, got {other:?}"),
    }
}

#[test]
fn body_over_ten_mib_is_returned_whole() {
    let body = "a".repeat(11 * 1024 * 1024);
    let addr = spawn(mock_server::scripted(StatusCode::OK, body.clone()));
    let handler = handler(addr, Vec::new());

    let descriptor = handler.assemble_request(&VersionRequest).unwrap();
    let raw = handler.send_request(descriptor, None).unwrap();
    assert_eq!(raw.len(), body.len());
    assert!(raw == body);
}

#[test]
fn auth_header_overrides_request_header_on_the_wire() {
    let addr = spawn(mock_server::echo());
    let handler = handler(addr, vec![Arc::new(Shout)]);

    let request = EchoRequest {
        method: HttpMethod::Get,
        headers: [("Authorization", "Bearer from-request"), ("X-Marker", "quiet")]
            .into_iter()
            .collect(),
        params: [("offset", "10"), ("q", "a b")].into_iter().collect(),
    };
    let auth: Headers = [("authorization", "Bearer from-auth")].into_iter().collect();

    let echoed: Echoed = handler.execute(&request, Some(&auth)).unwrap();
    assert_eq!(echoed.method, "GET");
    assert_eq!(echoed.path, "/v1/echo");
    assert_eq!(echoed.headers["authorization"], "Bearer from-auth");
    assert_eq!(echoed.headers["x-marker"], "QUIET");
    assert_eq!(echoed.query["offset"], "10");
    assert_eq!(echoed.query["q"], "a b");
    assert!(echoed.body.is_empty());
}

#[test]
fn scenario_against_live_server() {
    let addr = spawn(mock_server::app());
    let handler = handler(addr, Vec::new());

    let login = AuthLoginRequest {
        username: mock_server::USERNAME.to_string(),
        password: mock_server::PASSWORD.to_string(),
    };
    let tokens: AuthLoginResponse = handler.execute(&login, None).unwrap();
    let auth = tokens.auth_header();

    let request = DetectedIssuesRequest { uuid: "abc-123".to_string() };
    let descriptor = handler.assemble_request(&request).unwrap();
    assert_eq!(descriptor.url.as_str(), format!("http://{addr}/v1/analyses/abc-123/issues"));

    let err = handler.send_request(descriptor, Some(&auth)).unwrap_err();
    assert_eq!(err.status(), Some(400));
    assert!(err.to_string().contains("bad uuid"));
}

#[test]
fn wrong_credentials_surface_as_401() {
    let addr = spawn(mock_server::app());
    let handler = handler(addr, Vec::new());

    let login = AuthLoginRequest {
        username: mock_server::USERNAME.to_string(),
        password: "wrong".to_string(),
    };
    let err = handler.execute::<_, AuthLoginResponse>(&login, None).unwrap_err();
    assert_eq!(err.status(), Some(401));
    assert!(err.to_string().contains("Wrong credentials"));
}

#[test]
fn submission_lifecycle() {
    let addr = spawn(mock_server::app());
    let handler = handler(addr, vec![Arc::new(ClientToolNameMiddleware::new("mythx-core"))]);

    // Step 1: version needs no auth.
    let version: VersionResponse = handler.execute(&VersionRequest, None).unwrap();
    assert_eq!(version.api, mock_server::API_VERSION);

    // Step 2: log in.
    let login = AuthLoginRequest {
        username: mock_server::USERNAME.to_string(),
        password: mock_server::PASSWORD.to_string(),
    };
    let tokens: AuthLoginResponse = handler.execute(&login, None).unwrap();
    assert_eq!(tokens.jwt_tokens.access, mock_server::ACCESS_TOKEN);
    let auth = tokens.auth_header();

    // Step 3: without the auth header the API refuses.
    let err = handler
        .execute::<_, AnalysisList>(&AnalysisListRequest::default(), None)
        .unwrap_err();
    assert_eq!(err.status(), Some(401));

    // Step 4: submit; the middleware stamps the tool name.
    let submission = AnalysisSubmissionRequest {
        client_tool_name: None,
        data: AnalysisData {
            sources: Some([("A.sol".to_string(), Value::Object(Default::default()))].into_iter().collect()),
            main_source: Some("A.sol".to_string()),
            ..Default::default()
        },
    };
    let analysis: Analysis = handler.execute(&submission, Some(&auth)).unwrap();
    assert_eq!(analysis.status, AnalysisStatus::Queued);
    assert_eq!(analysis.client_tool_name.as_deref(), Some("mythx-core"));

    // Step 5: status round trip.
    let status_request = AnalysisStatusRequest { uuid: analysis.uuid.to_string() };
    let fetched: Analysis = handler.execute(&status_request, Some(&auth)).unwrap();
    assert_eq!(fetched, analysis);

    // Step 6: the listing includes it; offset past the end is empty.
    let list: AnalysisList = handler.execute(&AnalysisListRequest::default(), Some(&auth)).unwrap();
    assert_eq!(list.total, 1);
    assert_eq!(list.analyses, vec![analysis.clone()]);
    let paged = AnalysisListRequest { offset: Some(1), ..Default::default() };
    let list: AnalysisList = handler.execute(&paged, Some(&auth)).unwrap();
    assert_eq!(list.total, 1);
    assert!(list.analyses.is_empty());

    // Step 7: issues.
    let issues_request = DetectedIssuesRequest { uuid: analysis.uuid.to_string() };
    let issues: DetectedIssuesResponse = handler.execute(&issues_request, Some(&auth)).unwrap();
    assert_eq!(issues.len(), 1);
    assert!(issues.contains_swc("SWC-110"));

    // Step 8: unknown analysis.
    let missing = AnalysisStatusRequest { uuid: uuid::Uuid::nil().to_string() };
    let err = handler.execute::<_, Analysis>(&missing, Some(&auth)).unwrap_err();
    assert_eq!(err.status(), Some(404));
}

#[test]
fn unreachable_server_is_transport_error() {
    // Bind then drop to get a port nobody is listening on.
    let addr = std::net::TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap();
    let handler = handler(addr, Vec::new());
    let err = handler
        .execute::<_, VersionResponse>(&VersionRequest, None)
        .unwrap_err();
    assert!(matches!(err, ApiError::Transport(_)), "got {err:?}");
}
