//! HTTP interface to the tag store.
//!
//! | Method | Path | Success | Failure |
//! |---|---|---|---|
//! | POST | `/api/save` | 200 text | 400 missing or falsy tag/data, 500 write failure |
//! | GET | `/api/load/{tag}` | 200 payload, `{}` if unknown | 400 blank tag |
//! | GET | `/api/tags` | 200 array of tags | |
//! | DELETE | `/api/delete/{tag}` | 200 text | 400 blank tag, 404 unknown, 500 write failure |
//! | GET | `/api/health` | 200 text | |

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::Value;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};

use crate::error::{Error, Result};
use crate::store::TagStore;

const SAVED: &str = "Data saved successfully";
const DELETED: &str = "Data deleted successfully";
const MISSING_TAG_OR_DATA: &str = "Missing tag or data";
const MISSING_TAG: &str = "Missing tag";
const TAG_NOT_FOUND: &str = "Tag not found";
const SAVE_FAILED: &str = "Error saving data";
const DELETE_FAILED: &str = "Error deleting data";
const LOAD_FAILED: &str = "Error loading data";
const HEALTHY: &str = "Server is healthy";

/// Shared handler state.
#[derive(Debug, Clone)]
pub struct AppState {
    store: Arc<TagStore>,
}

/// A status code with a short plain-text message.
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: &'static str,
}

impl ApiError {
    fn new(status: StatusCode, message: &'static str) -> Self {
        Self { status, message }
    }

    /// Map a store error, using `fallback` for anything that isn't a caller
    /// mistake.
    fn from_store(err: &Error, invalid: &'static str, fallback: &'static str) -> Self {
        match err {
            Error::InvalidInput { .. } => Self::new(StatusCode::BAD_REQUEST, invalid),
            Error::NotFound { .. } => Self::new(StatusCode::NOT_FOUND, TAG_NOT_FOUND),
            other => {
                error!("Request failed: {other}");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, fallback)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, self.message).into_response()
    }
}

/// Build the router over a shared store.
pub fn router(store: Arc<TagStore>) -> Router {
    Router::new()
        .route("/api/save", post(save))
        .route("/api/load/", get(missing_tag))
        .route("/api/load/{tag}", get(load))
        .route("/api/tags", get(tags))
        .route("/api/delete/", delete(missing_tag))
        .route("/api/delete/{tag}", delete(delete_tag))
        .route("/api/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(AppState { store })
}

/// Serve the API on `addr` until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the address can't be bound or the server fails.
pub async fn serve(store: TagStore, addr: SocketAddr) -> Result<()> {
    let demo = store.is_demo();
    let path = store.path().to_path_buf();
    let app = router(Arc::new(store));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        demo,
        store = %path.display(),
        "Serving on http://{}",
        listener.local_addr()?
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {e}");
    }
}

/// Run a blocking store call off the async workers.
async fn with_store<T, F>(state: &AppState, f: F) -> Result<T>
where
    F: FnOnce(&TagStore) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let store = Arc::clone(&state.store);
    tokio::task::spawn_blocking(move || f(&store))
        .await
        .map_err(|e| Error::internal(format!("store task failed: {e}")))?
}

async fn save(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> std::result::Result<&'static str, ApiError> {
    let (tag, data) = parse_save_body(&headers, &body)
        .ok_or_else(|| ApiError::new(StatusCode::BAD_REQUEST, MISSING_TAG_OR_DATA))?;
    with_store(&state, move |store| store.save(&tag, data))
        .await
        .map_err(|e| ApiError::from_store(&e, MISSING_TAG_OR_DATA, SAVE_FAILED))?;
    Ok(SAVED)
}

/// Extract `tag` and `data` from a save request.
///
/// Anything other than a JSON object body with a non-empty string `tag` and
/// a truthy `data` yields `None`.
fn parse_save_body(headers: &HeaderMap, body: &[u8]) -> Option<(String, Value)> {
    if !is_json_content(headers) {
        return None;
    }
    let Value::Object(mut fields) = serde_json::from_slice(body).ok()? else {
        return None;
    };
    let tag = match fields.remove("tag")? {
        Value::String(tag) if !tag.is_empty() => tag,
        _ => return None,
    };
    let data = fields.remove("data").filter(is_truthy)?;
    Some((tag, data))
}

fn is_json_content(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .is_some_and(|mime| {
            let mime = mime.trim().to_ascii_lowercase();
            mime == "application/json" || mime.ends_with("+json")
        })
}

/// `false`, `0`, `""` and `null` don't count as data.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n.abs() > 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

async fn load(
    State(state): State<AppState>,
    Path(tag): Path<String>,
) -> std::result::Result<Json<Value>, ApiError> {
    let payload = with_store(&state, move |store| store.load(&tag))
        .await
        .map_err(|e| ApiError::from_store(&e, MISSING_TAG, LOAD_FAILED))?;
    Ok(Json(payload.unwrap_or_else(|| Value::Object(serde_json::Map::new()))))
}

async fn tags(State(state): State<AppState>) -> std::result::Result<Json<Vec<String>>, ApiError> {
    let tags = with_store(&state, |store| Ok(store.list_tags()))
        .await
        .map_err(|e| ApiError::from_store(&e, MISSING_TAG, LOAD_FAILED))?;
    Ok(Json(tags))
}

async fn delete_tag(
    State(state): State<AppState>,
    Path(tag): Path<String>,
) -> std::result::Result<&'static str, ApiError> {
    with_store(&state, move |store| store.delete_tag(&tag))
        .await
        .map_err(|e| ApiError::from_store(&e, MISSING_TAG, DELETE_FAILED))?;
    Ok(DELETED)
}

async fn missing_tag() -> ApiError {
    ApiError::new(StatusCode::BAD_REQUEST, MISSING_TAG)
}

async fn health() -> &'static str {
    HEALTHY
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Method, Request};
    use serde_json::json;
    use tempfile::TempDir;
    use tower::ServiceExt;

    use crate::store::{DemoSeed, DEMO_TAG};

    fn create_test_app() -> (TempDir, Router) {
        crate::logging::init_test_logging();
        let dir = tempfile::tempdir().unwrap();
        let store = TagStore::open(dir.path().join("db.json")).unwrap();
        (dir, router(Arc::new(store)))
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, String) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        call(app, request).await
    }

    async fn call(app: &Router, request: Request<Body>) -> (StatusCode, String) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let (_dir, app) = create_test_app();
        let snapshot = json!({
            "generalInfo": {"organisationName": "Acme"},
            "scope1Data": [{"id": "1", "quantity": "10", "emissionFactor": "2.5"}],
            "step": 2
        });

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/save",
            Some(json!({"tag": "q1-2024", "data": snapshot})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, SAVED);

        let (status, body) = send(&app, Method::GET, "/api/load/q1-2024", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(serde_json::from_str::<Value>(&body).unwrap(), snapshot);
    }

    #[tokio::test]
    async fn test_save_missing_fields() {
        let (_dir, app) = create_test_app();
        for body in [
            json!({"data": {}}),
            json!({"tag": "t"}),
            json!({"tag": "t", "data": null}),
            json!({"tag": "", "data": {}}),
        ] {
            let (status, text) = send(&app, Method::POST, "/api/save", Some(body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(text, MISSING_TAG_OR_DATA);
        }
    }

    #[tokio::test]
    async fn test_save_rejects_non_string_tag_and_falsy_data() {
        let (_dir, app) = create_test_app();
        for body in [
            json!({"tag": 42, "data": {"step": 1}}),
            json!({"tag": ["t"], "data": {"step": 1}}),
            json!({"tag": "t", "data": false}),
            json!({"tag": "t", "data": 0}),
            json!({"tag": "t", "data": ""}),
            json!(["t", {}]),
        ] {
            let (status, text) = send(&app, Method::POST, "/api/save", Some(body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(text, MISSING_TAG_OR_DATA);
        }

        let (_, body) = send(&app, Method::GET, "/api/tags", None).await;
        assert_eq!(serde_json::from_str::<Value>(&body).unwrap(), json!([]));
    }

    #[tokio::test]
    async fn test_save_accepts_truthy_scalar_data() {
        let (_dir, app) = create_test_app();
        let (status, _) = send(
            &app,
            Method::POST,
            "/api/save",
            Some(json!({"tag": "t", "data": 7})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = send(&app, Method::GET, "/api/load/t", None).await;
        assert_eq!(serde_json::from_str::<Value>(&body).unwrap(), json!(7));
    }

    #[tokio::test]
    async fn test_save_without_json_content_type() {
        let (_dir, app) = create_test_app();
        let payload = json!({"tag": "t", "data": {"step": 1}}).to_string();

        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/save")
            .body(Body::from(payload.clone()))
            .unwrap();
        assert_eq!(
            call(&app, request).await,
            (StatusCode::BAD_REQUEST, MISSING_TAG_OR_DATA.to_string())
        );

        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/save")
            .header(header::CONTENT_TYPE, "text/plain")
            .body(Body::from(payload))
            .unwrap();
        assert_eq!(call(&app, request).await.0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_save_malformed_json_body() {
        let (_dir, app) = create_test_app();
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/save")
            .header(header::CONTENT_TYPE, "application/json; charset=utf-8")
            .body(Body::from("{ not json"))
            .unwrap();
        assert_eq!(
            call(&app, request).await,
            (StatusCode::BAD_REQUEST, MISSING_TAG_OR_DATA.to_string())
        );
    }

    #[tokio::test]
    async fn test_load_unknown_tag_is_empty_object() {
        let (_dir, app) = create_test_app();
        let (status, body) = send(&app, Method::GET, "/api/load/nope", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(serde_json::from_str::<Value>(&body).unwrap(), json!({}));
    }

    #[tokio::test]
    async fn test_empty_tag_params() {
        let (_dir, app) = create_test_app();

        let (status, body) = send(&app, Method::GET, "/api/load/", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, MISSING_TAG);

        let (status, _) = send(&app, Method::DELETE, "/api/delete/", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, Method::GET, "/api/load/%20", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_tags_listing() {
        let (_dir, app) = create_test_app();
        for tag in ["A", "B"] {
            send(
                &app,
                Method::POST,
                "/api/save",
                Some(json!({"tag": tag, "data": {}})),
            )
            .await;
        }

        let (status, body) = send(&app, Method::GET, "/api/tags", None).await;
        assert_eq!(status, StatusCode::OK);
        let mut tags: Vec<String> = serde_json::from_str(&body).unwrap();
        tags.sort();
        assert_eq!(tags, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_delete_flow() {
        let (_dir, app) = create_test_app();
        send(
            &app,
            Method::POST,
            "/api/save",
            Some(json!({"tag": "old", "data": {"step": 1}})),
        )
        .await;

        let (status, body) = send(&app, Method::DELETE, "/api/delete/old", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, DELETED);

        let (_, body) = send(&app, Method::GET, "/api/load/old", None).await;
        assert_eq!(serde_json::from_str::<Value>(&body).unwrap(), json!({}));

        let (status, body) = send(&app, Method::DELETE, "/api/delete/old", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, TAG_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_demo_tag_listed() {
        let dir = tempfile::tempdir().unwrap();
        let seed = DemoSeed::from_value(json!({"step": 2}));
        let store = TagStore::open_with_demo(dir.path().join("db.json"), seed).unwrap();
        let app = router(Arc::new(store));

        let (_, body) = send(&app, Method::GET, "/api/tags", None).await;
        let tags: Vec<String> = serde_json::from_str(&body).unwrap();
        assert_eq!(tags, vec![DEMO_TAG]);

        let (_, body) = send(&app, Method::GET, "/api/load/DEMO", None).await;
        assert_eq!(serde_json::from_str::<Value>(&body).unwrap(), json!({"step": 2}));
    }

    #[tokio::test]
    async fn test_health() {
        let (_dir, app) = create_test_app();
        let (status, body) = send(&app, Method::GET, "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, HEALTHY);
    }

    #[tokio::test]
    async fn test_cors_preflight_allowed() {
        let (_dir, app) = create_test_app();
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/save")
            .header(header::ORIGIN, "http://localhost:5173")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert!(response.status().is_success());
        assert!(response
            .headers()
            .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    }
}
