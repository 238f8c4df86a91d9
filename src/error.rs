//! Construction-time errors.
//!
//! Request handling itself never fails on the logger's account: field
//! extraction degrades to empty values and sink failures are isolated. The
//! only fallible operation this crate exposes is building a layer from a
//! [`LoggerConfig`](crate::LoggerConfig).

use thiserror::Error;

/// Error building a [`KeyValueLoggerLayer`](crate::KeyValueLoggerLayer)
/// from configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The `ignore_paths` pattern is not a valid regular expression.
    #[error("invalid ignore_paths pattern: {0}")]
    IgnorePattern(#[from] regex::Error),
}
