//! The request logger itself: a tower [`Layer`]/[`Service`] pair.
//!
//! [`KeyValueLoggerLayer`] wraps an inner service and, for every request
//! whose path is not ignored, emits exactly one pipe-delimited `key=value`
//! line to the configured sink. Logging is a pure side effect: the request,
//! the response, and any inner-service error pass through unmodified.

use std::fmt;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::body::{Body, to_bytes};
use chrono::{SecondsFormat, Utc};
use futures::future::BoxFuture;
use http::{HeaderMap, Request, Response, header};
use regex::Regex;
use tower::{Layer, Service};

use crate::config::LoggerConfig;
use crate::error::ConfigError;
use crate::extract;
use crate::record::LogRecord;
use crate::session::SessionData;
use crate::sink::{LogSink, StdoutSink};

/// Value of the constant `log_source` field on every emitted line.
pub const LOG_SOURCE: &str = "key_value_logger";

/// Response header composition frameworks use to signal "let a sibling app
/// try this request". A `pass` value suppresses the log line, because the
/// authoritative line belongs to whichever handler ultimately serves it.
const CASCADE_HEADER: &str = "x-cascade";

/// Layer that applies [`KeyValueLogger`] to an inner service.
///
/// ```no_run
/// use axum::{Router, routing::get};
/// use kv_logger::KeyValueLoggerLayer;
///
/// let app: Router = Router::new()
///     .route("/", get(|| async { "ok" }))
///     .layer(KeyValueLoggerLayer::new().log_failure_response_bodies(true));
/// ```
#[derive(Clone)]
pub struct KeyValueLoggerLayer {
    sink: Arc<dyn LogSink>,
    log_failure_response_bodies: bool,
    user_id_key: String,
    ignore_paths: Option<Regex>,
}

impl KeyValueLoggerLayer {
    /// Layer with defaults: stdout sink, no failure bodies, `user_id`
    /// session key, no ignored paths.
    pub fn new() -> Self {
        Self {
            sink: Arc::new(StdoutSink::new()),
            log_failure_response_bodies: false,
            user_id_key: "user_id".to_string(),
            ignore_paths: None,
        }
    }

    /// Build a layer from a deserialized [`LoggerConfig`], compiling the
    /// `ignore_paths` pattern.
    pub fn from_config(config: &LoggerConfig) -> Result<Self, ConfigError> {
        let ignore_paths = config
            .ignore_paths
            .as_deref()
            .map(Regex::new)
            .transpose()?;
        Ok(Self {
            sink: Arc::new(StdoutSink::new()),
            log_failure_response_bodies: config.log_failure_response_bodies,
            user_id_key: config.user_id_key.clone(),
            ignore_paths,
        })
    }

    /// Replace the log sink.
    pub fn sink(mut self, sink: impl LogSink + 'static) -> Self {
        self.sink = Arc::new(sink);
        self
    }

    /// Include response bodies of 4xx responses in the log line.
    pub fn log_failure_response_bodies(mut self, enabled: bool) -> Self {
        self.log_failure_response_bodies = enabled;
        self
    }

    /// Session key looked up to populate the `user_id` field.
    pub fn user_id_key(mut self, key: impl Into<String>) -> Self {
        self.user_id_key = key.into();
        self
    }

    /// Pass requests whose path matches `pattern` through without logging.
    pub fn ignore_paths(mut self, pattern: Regex) -> Self {
        self.ignore_paths = Some(pattern);
        self
    }
}

impl Default for KeyValueLoggerLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for KeyValueLoggerLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyValueLoggerLayer")
            .field(
                "log_failure_response_bodies",
                &self.log_failure_response_bodies,
            )
            .field("user_id_key", &self.user_id_key)
            .field("ignore_paths", &self.ignore_paths.as_ref().map(Regex::as_str))
            .finish_non_exhaustive()
    }
}

impl<S> Layer<S> for KeyValueLoggerLayer {
    type Service = KeyValueLogger<S>;

    fn layer(&self, inner: S) -> Self::Service {
        KeyValueLogger {
            inner,
            settings: Arc::new(Settings {
                sink: Arc::clone(&self.sink),
                log_failure_response_bodies: self.log_failure_response_bodies,
                user_id_key: self.user_id_key.clone(),
                ignore_paths: self.ignore_paths.clone(),
            }),
        }
    }
}

/// Immutable per-layer settings shared by all wrapped services.
struct Settings {
    sink: Arc<dyn LogSink>,
    log_failure_response_bodies: bool,
    user_id_key: String,
    ignore_paths: Option<Regex>,
}

impl Settings {
    /// Render and write one line. A sink failure is isolated here: it is
    /// reported on the diagnostic stream and never reaches the request.
    fn emit(&self, record: &LogRecord) {
        if let Err(err) = self.sink.write_line(&record.render()) {
            tracing::warn!(error = %err, "request log line dropped: sink write failed");
        }
    }
}

/// Middleware service produced by [`KeyValueLoggerLayer`].
pub struct KeyValueLogger<S> {
    inner: S,
    settings: Arc<Settings>,
}

impl<S: Clone> Clone for KeyValueLogger<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            settings: Arc::clone(&self.settings),
        }
    }
}

impl<S: fmt::Debug> fmt::Debug for KeyValueLogger<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyValueLogger")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

impl<S, B> Service<Request<B>> for KeyValueLogger<S>
where
    S: Service<Request<B>, Response = Response<Body>> + Clone + Send + 'static,
    S::Error: Send,
    S::Future: Send + 'static,
    B: Send + 'static,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Response<Body>, S::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), S::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        // The clone takes the place of the instance whose readiness was
        // polled; the polled instance is moved into the future.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let settings = Arc::clone(&self.settings);

        Box::pin(async move {
            if let Some(pattern) = &settings.ignore_paths {
                if pattern.is_match(req.uri().path()) {
                    return inner.call(req).await;
                }
            }

            let record = capture_request(&req, &settings);
            let mut finalizer = Finalizer::new(record, Arc::clone(&settings));

            match inner.call(req).await {
                Ok(res) => {
                    let suppress = is_cascade_pass(res.headers());
                    let status = res.status().as_u16();
                    finalizer.push("status", status.to_string());
                    finalizer.push(
                        "content-length",
                        extract::header_str(res.headers(), header::CONTENT_LENGTH)
                            .unwrap_or(""),
                    );
                    finalizer.push(
                        "content_type",
                        extract::header_str(res.headers(), header::CONTENT_TYPE)
                            .unwrap_or(""),
                    );

                    let res = if settings.log_failure_response_bodies
                        && (400..=499).contains(&status)
                    {
                        let (parts, body) = res.into_parts();
                        match to_bytes(body, usize::MAX).await {
                            Ok(bytes) => {
                                finalizer.push(
                                    "response_body",
                                    String::from_utf8_lossy(&bytes).into_owned(),
                                );
                                Response::from_parts(parts, Body::from(bytes))
                            }
                            Err(err) => {
                                // The body stream already failed for the
                                // client; there is nothing left to return.
                                tracing::debug!(
                                    error = %err,
                                    "could not collect 4xx response body for logging"
                                );
                                Response::from_parts(parts, Body::empty())
                            }
                        }
                    } else {
                        res
                    };

                    finalizer.finish(!suppress);
                    Ok(res)
                }
                Err(err) => {
                    // No response was constructed, so the cascade check
                    // cannot apply; the 500 line is always emitted.
                    finalizer.push("status", "500");
                    finalizer.finish(true);
                    Err(err)
                }
            }
        })
    }
}

/// Pre-call capture of request metadata, in emission order.
fn capture_request<B>(req: &Request<B>, settings: &Settings) -> LogRecord {
    let headers = req.headers();
    let mut record = LogRecord::new();
    record.push("ts", Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true));
    if let Some(id) = extract::header_str(headers, "x-request-id") {
        record.push("request_id", id);
    }
    record.push("method", req.method().as_str());
    record.push("url", req.uri().path());
    record.push("params", req.uri().query().unwrap_or(""));
    record.push(
        "user_id",
        req.extensions()
            .get::<SessionData>()
            .and_then(|session| session.get(&settings.user_id_key))
            .unwrap_or(""),
    );
    record.push("scheme", extract::scheme(req));
    record.push(
        "user_agent",
        extract::header_str(headers, header::USER_AGENT).unwrap_or(""),
    );
    record.push("remote_ip", extract::remote_ip(req));
    record.push("http_version", extract::http_version(req.version()));
    if let Some(marker) = extract::header_str(headers, "x-mobile-device") {
        record.push("mobile_device", marker);
    }
    record.push(
        "requested_content_type",
        extract::header_str(headers, header::CONTENT_TYPE).unwrap_or(""),
    );
    record.push("log_source", LOG_SOURCE);
    record
}

fn is_cascade_pass(headers: &HeaderMap) -> bool {
    extract::header_str(headers, CASCADE_HEADER) == Some("pass")
}

/// Elapsed wall-clock milliseconds since `start`, rounded to 5 decimals.
fn format_runtime(start: Instant) -> String {
    let ms = start.elapsed().as_secs_f64() * 1000.0;
    ((ms * 100_000.0).round() / 100_000.0).to_string()
}

/// Guarantees the `runtime` field and the emission decision happen exactly
/// once per non-ignored request: on normal return, on inner-service error,
/// or when the response future is dropped before completion.
struct Finalizer {
    record: Option<LogRecord>,
    start: Instant,
    settings: Arc<Settings>,
}

impl Finalizer {
    fn new(record: LogRecord, settings: Arc<Settings>) -> Self {
        Self {
            record: Some(record),
            start: Instant::now(),
            settings,
        }
    }

    fn push(&mut self, key: &'static str, value: impl Into<String>) {
        if let Some(record) = self.record.as_mut() {
            record.push(key, value);
        }
    }

    /// Append `runtime` and, unless suppressed, write the line. Idempotent:
    /// the record is taken on first call.
    fn finish(&mut self, emit: bool) {
        if let Some(mut record) = self.record.take() {
            record.push("runtime", format_runtime(self.start));
            if emit {
                self.settings.emit(&record);
            }
        }
    }
}

impl Drop for Finalizer {
    fn drop(&mut self) {
        if self.record.is_none() {
            return;
        }
        // The response future was dropped mid-flight (request aborted,
        // client gone). Log it the way an inner-service failure is logged.
        if let Some(record) = self.record.as_mut() {
            if !record.contains("status") {
                record.push("status", "500");
            }
        }
        self.finish(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;

    fn settings(sink: MemorySink) -> Arc<Settings> {
        Arc::new(Settings {
            sink: Arc::new(sink),
            log_failure_response_bodies: false,
            user_id_key: "user_id".to_string(),
            ignore_paths: None,
        })
    }

    fn request() -> Request<()> {
        Request::builder()
            .method("GET")
            .uri("/widgets?page=2")
            .header("user-agent", "test-agent/1.0")
            .body(())
            .unwrap()
    }

    #[test]
    fn capture_order_matches_wire_format() {
        let sink = MemorySink::new();
        let record = capture_request(&request(), &settings(sink));
        let line = record.render();
        let keys: Vec<&str> = line
            .split(crate::record::SEPARATOR)
            .map(|pair| pair.split('=').next().unwrap_or(""))
            .collect();
        assert_eq!(
            keys,
            [
                "ts",
                "method",
                "url",
                "params",
                "user_id",
                "scheme",
                "user_agent",
                "remote_ip",
                "http_version",
                "requested_content_type",
                "log_source",
            ]
        );
        assert!(line.contains("method=GET"));
        assert!(line.contains("url=/widgets"));
        assert!(line.contains("params=page=2"));
        assert!(line.contains("log_source=key_value_logger"));
    }

    #[test]
    fn optional_fields_appear_when_present() {
        let mut req = Request::builder()
            .method("GET")
            .uri("/widgets")
            .header("x-request-id", "req-123")
            .header("x-mobile-device", "iphone")
            .body(())
            .unwrap();
        let mut session = SessionData::new();
        session.insert("user_id", "42");
        req.extensions_mut().insert(session);

        let sink = MemorySink::new();
        let line = capture_request(&req, &settings(sink)).render();
        assert!(line.contains("request_id=req-123"));
        assert!(line.contains("mobile_device=iphone"));
        assert!(line.contains("user_id=42"));
    }

    #[test]
    fn cascade_pass_detection() {
        let mut headers = HeaderMap::new();
        assert!(!is_cascade_pass(&headers));
        headers.insert("x-cascade", "pass".parse().unwrap());
        assert!(is_cascade_pass(&headers));
        headers.insert("x-cascade", "missing".parse().unwrap());
        assert!(!is_cascade_pass(&headers));
    }

    #[test]
    fn finalizer_emits_exactly_once() {
        let sink = MemorySink::new();
        let mut finalizer = Finalizer::new(LogRecord::new(), settings(sink.clone()));
        finalizer.push("status", "200");
        finalizer.finish(true);
        finalizer.finish(true);
        drop(finalizer);
        assert_eq!(sink.lines().len(), 1);
        assert!(sink.lines()[0].contains("runtime="));
    }

    #[test]
    fn suppressed_finalizer_emits_nothing() {
        let sink = MemorySink::new();
        let mut finalizer = Finalizer::new(LogRecord::new(), settings(sink.clone()));
        finalizer.finish(false);
        drop(finalizer);
        assert!(sink.lines().is_empty());
    }

    #[test]
    fn dropped_finalizer_logs_a_500() {
        let sink = MemorySink::new();
        let finalizer = Finalizer::new(LogRecord::new(), settings(sink.clone()));
        drop(finalizer);
        let lines = sink.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("status=500"));
        assert!(lines[0].contains("runtime="));
    }

    #[test]
    fn runtime_is_non_negative() {
        let value: f64 = format_runtime(Instant::now()).parse().unwrap();
        assert!(value >= 0.0);
    }
}
