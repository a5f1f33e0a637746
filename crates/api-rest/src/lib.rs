//! # API REST
//!
//! REST API implementation for the PV save service.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - Shared-secret token checks
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON bodies, CORS, body limits)
//!
//! Saving itself is delegated to `pvsave-core`.

#![warn(rust_2018_idioms)]

mod error;

pub use error::ApiError;

use api_shared::{
    authorise, ErrorRes, HealthRes, HealthService, ListPatientsRes, PatientEntry, SavePatientReq,
    SavePatientRes, TOKEN_HEADER,
};
use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, DefaultBodyLimit, Query, State},
    http::HeaderMap,
    response::Json,
    routing::{get, post},
    Router,
};
use pvsave_core::{IndexOutcome, SaveConfig, SaveService};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Application state shared across REST API handlers
///
/// Holds the startup configuration and the save service bound to its directory.
#[derive(Clone)]
struct AppState {
    cfg: Arc<SaveConfig>,
    save_service: Arc<SaveService>,
}

#[derive(OpenApi)]
#[openapi(
    paths(health, save_patient, list_patients),
    components(schemas(
        HealthRes,
        SavePatientReq,
        SavePatientRes,
        ErrorRes,
        ListPatientsRes,
        PatientEntry,
    ))
)]
struct ApiDoc;

/// Raw query pairs in request order. Repeated keys are kept, so the first `token` wins.
type QueryPairs = Option<Query<Vec<(String, String)>>>;

/// Builds the application router for `cfg`.
pub fn router(cfg: Arc<SaveConfig>) -> Router {
    let state = AppState {
        save_service: Arc::new(SaveService::new(cfg.save_dir())),
        cfg: cfg.clone(),
    };

    Router::new()
        .route("/health", get(health))
        .route("/save-patient", post(save_patient))
        .route("/patients", get(list_patients))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::max(cfg.max_body_bytes()))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Binds `0.0.0.0:<port>` and serves the router until the server stops.
///
/// # Errors
/// Returns an error if:
/// - the address cannot be bound, or
/// - the HTTP server fails while running.
pub async fn serve(cfg: Arc<SaveConfig>) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port()));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("-- Listening on {}", listener.local_addr()?);

    axum::serve(listener, router(cfg)).await?;
    Ok(())
}

fn check_token(state: &AppState, headers: &HeaderMap, query: &QueryPairs) -> Result<(), ApiError> {
    let header = headers.get(TOKEN_HEADER).and_then(|v| v.to_str().ok());
    let query_token = query
        .as_ref()
        .and_then(|Query(pairs)| pairs.iter().find(|(k, _)| k == "token"))
        .map(|(_, v)| v.as_str());
    authorise(state.cfg.token(), header, query_token)?;
    Ok(())
}

fn log_index_outcome(filename: &str, outcome: &IndexOutcome) {
    match outcome {
        IndexOutcome::Created | IndexOutcome::Rewritten => {}
        IndexOutcome::Appended { cause } => {
            tracing::warn!("index rewrite failed for {}, row appended: {}", filename, cause);
        }
        IndexOutcome::Failed {
            cause,
            fallback: Some(fallback),
        } => {
            tracing::warn!(
                "index update failed for {}: {}; append also failed: {}",
                filename,
                cause,
                fallback
            );
        }
        IndexOutcome::Failed {
            cause,
            fallback: None,
        } => {
            tracing::warn!("index update skipped for {}: {}", filename, cause);
        }
    }
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint
///
/// Never requires a token, so load balancers can probe it.
#[axum::debug_handler]
async fn health() -> Json<HealthRes> {
    Json(HealthService::check_health())
}

#[utoipa::path(
    post,
    path = "/save-patient",
    request_body = SavePatientReq,
    params(
        ("x-save-token" = Option<String>, Header, description = "Shared-secret token"),
        ("token" = Option<String>, Query, description = "Shared-secret token, if the header is not set")
    ),
    responses(
        (status = 200, description = "Record saved", body = SavePatientRes),
        (status = 400, description = "Body is not valid JSON", body = ErrorRes),
        (status = 401, description = "Missing or wrong token", body = ErrorRes),
        (status = 413, description = "Body larger than the configured limit", body = ErrorRes),
        (status = 500, description = "Record could not be written", body = ErrorRes)
    )
)]
/// Save a patient record
///
/// The body is parsed as JSON whatever its content type. The record is written to
/// `<save dir>/<sanitised name>.json` and the index is updated on a best-effort basis.
///
/// # Errors
/// Returns:
/// - `401 Unauthorized` if a token is configured and the request does not carry it,
/// - `400 Bad Request` if the body is not JSON,
/// - `413 Payload Too Large` if the body exceeds the configured limit,
/// - `500 Internal Server Error` if the record file cannot be written.
#[axum::debug_handler]
async fn save_patient(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: QueryPairs,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<SavePatientRes>, ApiError> {
    check_token(&state, &headers, &query)?;

    let body = body.map_err(|rejection| {
        tracing::warn!("Save patient body rejected: {}", rejection.body_text());
        ApiError::Rejected(rejection.status(), rejection.body_text())
    })?;
    let payload: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid JSON: {e}")))?;

    let saved = state.save_service.save_payload(payload).map_err(|e| {
        tracing::error!("Save patient error: {:?}", e);
        ApiError::Internal(e.to_string())
    })?;

    log_index_outcome(&saved.filename, &saved.index);
    tracing::info!("saved {}", saved.path.display());

    Ok(Json(SavePatientRes::from(&saved)))
}

#[utoipa::path(
    get,
    path = "/patients",
    params(
        ("x-save-token" = Option<String>, Header, description = "Shared-secret token"),
        ("token" = Option<String>, Query, description = "Shared-secret token, if the header is not set")
    ),
    responses(
        (status = 200, description = "Indexed patients, newest first", body = ListPatientsRes),
        (status = 401, description = "Missing or wrong token", body = ErrorRes),
        (status = 500, description = "Index could not be read", body = ErrorRes)
    )
)]
/// List saved patients from the index
#[axum::debug_handler]
async fn list_patients(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: QueryPairs,
) -> Result<Json<ListPatientsRes>, ApiError> {
    check_token(&state, &headers, &query)?;

    let entries = state.save_service.list_patients().map_err(|e| {
        tracing::error!("List patients error: {:?}", e);
        ApiError::Internal(e.to_string())
    })?;

    Ok(Json(ListPatientsRes {
        ok: true,
        patients: entries.into_iter().map(PatientEntry::from).collect(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn app(dir: &Path, token: Option<&str>) -> Router {
        let cfg = SaveConfig::new(dir.to_path_buf(), 0, token.map(str::to_owned)).unwrap();
        router(Arc::new(cfg))
    }

    fn with_token(mut req: Request<Body>, token: &str) -> Request<Body> {
        req.headers_mut()
            .insert("x-save-token", token.parse().unwrap());
        req
    }

    fn post(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_owned()))
            .expect("request")
    }

    async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(req).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        (status, serde_json::from_slice(&bytes).expect("json body"))
    }

    fn index_lines(dir: &Path) -> Vec<String> {
        fs::read_to_string(dir.join("pv_one_patients.csv"))
            .unwrap()
            .lines()
            .map(str::to_owned)
            .collect()
    }

    #[tokio::test]
    async fn test_save_wrapped_payload() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("saved");

        let (status, body) = send(
            app(&dir, None),
            post("/save-patient", r#"{"name":"Jane Doe","data":{"age":30}}"#),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], json!(true));
        assert_eq!(body["filename"], json!("Jane Doe.json"));
        let path = dir.canonicalize().unwrap().join("Jane Doe.json");
        assert_eq!(body["path"], json!(path.display().to_string()));

        let stored: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(stored, json!({"name": "Jane Doe", "data": {"age": 30}}));

        let lines = index_lines(&dir);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "filename,mtime,name");
        assert!(lines[1].starts_with("\"Jane Doe.json\","));
        assert!(lines[1].ends_with(",\"Jane Doe\""));
    }

    #[tokio::test]
    async fn test_save_bare_payload_uses_placeholder() {
        let temp = TempDir::new().unwrap();

        let (status, body) = send(app(temp.path(), None), post("/save-patient", r#"{"age":5}"#)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["filename"], json!("patient.json"));
        let stored: Value =
            serde_json::from_str(&fs::read_to_string(temp.path().join("patient.json")).unwrap())
                .unwrap();
        assert_eq!(stored, json!({"name": null, "data": {"age": 5}}));
    }

    #[tokio::test]
    async fn test_content_type_not_required() {
        let temp = TempDir::new().unwrap();
        let req = Request::builder()
            .method("POST")
            .uri("/save-patient")
            .header("content-type", "text/plain")
            .body(Body::from(r#"{"name":"Plain"}"#))
            .unwrap();

        let (status, body) = send(app(temp.path(), None), req).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["filename"], json!("Plain.json"));
    }

    #[tokio::test]
    async fn test_malformed_body_rejected_without_side_effects() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("saved");

        let (status, body) = send(app(&dir, None), post("/save-patient", "{not json")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["ok"], json!(false));
        assert!(body["error"].as_str().unwrap().starts_with("Invalid JSON: "));
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_malformed_body_leaves_index_unchanged() {
        let temp = TempDir::new().unwrap();
        let (status, _) = send(
            app(temp.path(), None),
            post("/save-patient", r#"{"name":"A","data":{}}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let before = fs::read_to_string(temp.path().join("pv_one_patients.csv")).unwrap();

        let (status, _) = send(app(temp.path(), None), post("/save-patient", "")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let after = fs::read_to_string(temp.path().join("pv_one_patients.csv")).unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_missing_or_wrong_token_rejected() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("saved");
        let payload = r#"{"name":"Jane","data":{}}"#;

        let (status, body) = send(app(&dir, Some("s3cret")), post("/save-patient", payload)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({"ok": false, "error": "Unauthorized"}));

        let mut req = post("/save-patient", payload);
        req.headers_mut()
            .insert("x-save-token", "nope".parse().unwrap());
        let (status, _) = send(app(&dir, Some("s3cret")), req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(
            app(&dir, Some("s3cret")),
            post("/save-patient?token=nope", payload),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_rejected_token_leaves_existing_files_untouched() {
        let temp = TempDir::new().unwrap();
        let (status, _) = send(
            app(temp.path(), None),
            post("/save-patient", r#"{"name":"Jane","data":{"v":1}}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let record_path = temp.path().join("Jane.json");
        let index_path = temp.path().join("pv_one_patients.csv");
        let record_before = fs::read(&record_path).unwrap();
        let index_before = fs::read(&index_path).unwrap();

        let payload = r#"{"name":"Jane","data":{"v":2}}"#;
        let requests = [
            post("/save-patient", payload),
            with_token(post("/save-patient", payload), "nope"),
            post("/save-patient?token=nope", payload),
        ];
        for req in requests {
            let (status, body) = send(app(temp.path(), Some("s3cret")), req).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(body, json!({"ok": false, "error": "Unauthorized"}));
        }

        assert_eq!(fs::read(&record_path).unwrap(), record_before);
        assert_eq!(fs::read(&index_path).unwrap(), index_before);
    }

    #[tokio::test]
    async fn test_repeated_query_token_uses_first_value() {
        let temp = TempDir::new().unwrap();

        let (status, body) = send(
            app(temp.path(), None),
            post("/save-patient?token=a&token=b", r#"{"name":"Open"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["filename"], json!("Open.json"));

        let (status, _) = send(
            app(temp.path(), Some("a")),
            post("/save-patient?token=a&token=b", r#"{"name":"First"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(
            app(temp.path(), Some("b")),
            post("/save-patient?token=a&token=b", r#"{"name":"Second"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["ok"], json!(false));
        assert!(!temp.path().join("Second.json").exists());
    }

    #[tokio::test]
    async fn test_oversized_body_rejected_as_json() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("saved");
        let cfg = SaveConfig::new(dir.clone(), 0, None)
            .unwrap()
            .with_max_body_bytes(16);

        let (status, body) = send(
            router(Arc::new(cfg)),
            post("/save-patient", r#"{"name":"Far Too Long For The Limit"}"#),
        )
        .await;

        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body["ok"], json!(false));
        assert!(body["error"].as_str().is_some_and(|e| !e.is_empty()));
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_token_checked_before_parsing() {
        let temp = TempDir::new().unwrap();

        let (status, _) = send(
            app(temp.path(), Some("s3cret")),
            post("/save-patient", "{not json"),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_token_via_header_or_query() {
        let temp = TempDir::new().unwrap();

        let mut req = post("/save-patient", r#"{"name":"Header"}"#);
        req.headers_mut()
            .insert("x-save-token", "s3cret".parse().unwrap());
        let (status, _) = send(app(temp.path(), Some("s3cret")), req).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(
            app(temp.path(), Some("s3cret")),
            post("/save-patient?token=s3cret", r#"{"name":"Query"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        assert!(temp.path().join("Header.json").is_file());
        assert!(temp.path().join("Query.json").is_file());
    }

    #[tokio::test]
    async fn test_storage_failure_is_internal_error() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("blocker");
        fs::write(&blocker, "file").unwrap();

        let (status, body) = send(
            app(&blocker.join("saved"), None),
            post("/save-patient", r#"{"name":"X"}"#),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["ok"], json!(false));
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("failed to create storage directory"));
    }

    #[tokio::test]
    async fn test_repeat_saves_listed_newest_first() {
        let temp = TempDir::new().unwrap();

        for name in ["A", "B", "A"] {
            let body = json!({"name": name, "data": {"n": name}}).to_string();
            let (status, _) = send(app(temp.path(), None), post("/save-patient", &body)).await;
            assert_eq!(status, StatusCode::OK);
        }

        let req = Request::builder()
            .uri("/patients")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(app(temp.path(), None), req).await;

        assert_eq!(status, StatusCode::OK);
        let names: Vec<_> = body["patients"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["filename"].as_str().unwrap().to_owned())
            .collect();
        assert_eq!(names, vec!["A.json", "B.json"]);
        assert_eq!(index_lines(temp.path()).len(), 3);
    }

    #[tokio::test]
    async fn test_list_requires_token_when_configured() {
        let temp = TempDir::new().unwrap();

        let req = Request::builder()
            .uri("/patients")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(app(temp.path(), Some("s3cret")), req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let req = Request::builder()
            .uri("/patients?token=s3cret")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(app(temp.path(), Some("s3cret")), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"ok": true, "patients": []}));
    }

    #[tokio::test]
    async fn test_health_is_open() {
        let temp = TempDir::new().unwrap();

        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(app(temp.path(), Some("s3cret")), req).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], json!(true));
    }
}
