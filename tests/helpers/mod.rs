//! Shared test helpers for integration tests.

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::routing::get;
use http::{Request, Response, StatusCode, header};
use tower::ServiceExt;

use kv_logger::{KeyValueLoggerLayer, MemorySink};

/// Test application: a small router wrapped with the logger layer and a
/// memory sink capturing every emitted line.
pub struct TestApp {
    pub router: Router,
    pub sink: MemorySink,
}

impl TestApp {
    /// Build a test app, letting the caller customize the layer.
    pub fn new(customize: impl FnOnce(KeyValueLoggerLayer) -> KeyValueLoggerLayer) -> Self {
        let sink = MemorySink::new();
        let layer = customize(KeyValueLoggerLayer::new().sink(sink.clone()));
        Self {
            router: routes().layer(layer),
            sink,
        }
    }

    /// Drive one GET request through the router.
    pub async fn get(&self, path: &str) -> Response<Body> {
        self.request(
            Request::builder()
                .uri(path)
                .body(Body::empty())
                .expect("valid request"),
        )
        .await
    }

    pub async fn request(&self, req: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(req)
            .await
            .expect("router is infallible")
    }
}

/// Routes mirroring the endpoints the logger's behavior is specified
/// against: success, the 4xx family, an ignorable path, and a cascade pass.
pub fn routes() -> Router {
    Router::new()
        .route(
            "/200",
            get(|| async {
                (
                    [
                        (header::CONTENT_TYPE, "text/plain"),
                        (header::CONTENT_LENGTH, "7"),
                    ],
                    "Success",
                )
            }),
        )
        .route(
            "/422",
            get(|| async {
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    axum::Json(serde_json::json!({"errors": {"key": "val"}})),
                )
            }),
        )
        .route(
            "/401",
            get(|| async { (StatusCode::UNAUTHORIZED, "Unauthorized") }),
        )
        .route("/400", get(|| async { (StatusCode::BAD_REQUEST, "Fail") }))
        .route("/ignore-me", get(|| async { "ignored" }))
        .route(
            "/pass",
            get(|| async { (StatusCode::NOT_FOUND, [("x-cascade", "pass")], "") }),
        )
}

/// Collect a response body into a string.
pub async fn body_string(res: Response<Body>) -> String {
    let bytes = to_bytes(res.into_body(), usize::MAX)
        .await
        .expect("body collects");
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}
