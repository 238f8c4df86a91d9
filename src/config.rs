//! Logger configuration schema.
//!
//! Mirrors the builder surface of [`KeyValueLoggerLayer`] as a plain serde
//! struct so embedding applications can carry the logger section in their
//! own TOML/environment configuration and build the layer from it.
//!
//! [`KeyValueLoggerLayer`]: crate::KeyValueLoggerLayer

use serde::{Deserialize, Serialize};

/// Request logger configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggerConfig {
    /// Include the response body in the log line for 4xx responses.
    #[serde(default)]
    pub log_failure_response_bodies: bool,
    /// Session key looked up to populate the `user_id` field.
    #[serde(default = "default_user_id_key")]
    pub user_id_key: String,
    /// Optional regular expression; requests whose path matches are passed
    /// through without any logging.
    #[serde(default)]
    pub ignore_paths: Option<String>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            log_failure_response_bodies: false,
            user_id_key: default_user_id_key(),
            ignore_paths: None,
        }
    }
}

fn default_user_id_key() -> String {
    "user_id".to_string()
}
