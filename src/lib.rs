//! # kv-logger
//!
//! Key=value request logging middleware for axum/tower pipelines.
//!
//! [`KeyValueLoggerLayer`] wraps an inner service and emits exactly one
//! pipe-delimited log line per request, summarizing request and response
//! metadata:
//!
//! ```text
//! ts=2024-05-01T12:00:00.000Z|method=GET|url=/widgets|params=page=2|user_id=42|scheme=http|user_agent=curl/8.0|remote_ip=203.0.113.7|http_version=HTTP/1.1|requested_content_type=|log_source=key_value_logger|status=200|content-length=17|content_type=application/json|runtime=1.532
//! ```
//!
//! Logging is strictly a side channel: the response (or the inner service's
//! error) reaches the caller unmodified, a malformed field degrades to an
//! empty value, and a sink failure is reported via `tracing` instead of
//! surfacing to the client.
//!
//! ```no_run
//! use axum::{Router, routing::get};
//! use kv_logger::KeyValueLoggerLayer;
//!
//! let app: Router = Router::new()
//!     .route("/widgets", get(|| async { "ok" }))
//!     .layer(
//!         KeyValueLoggerLayer::new()
//!             .log_failure_response_bodies(true)
//!             .ignore_paths(regex::Regex::new("^/health").unwrap()),
//!     );
//! ```

pub mod config;
pub mod error;
pub mod middleware;
pub mod record;
pub mod session;
pub mod sink;

mod extract;

pub use config::LoggerConfig;
pub use error::ConfigError;
pub use middleware::{KeyValueLogger, KeyValueLoggerLayer, LOG_SOURCE};
pub use record::LogRecord;
pub use session::SessionData;
pub use sink::{LogSink, MemorySink, StdoutSink, TracingSink};
