//! Session data attached to requests.
//!
//! The middleware does not implement sessions. It only reads a single field
//! from whatever session state an upstream layer (authentication middleware,
//! a session store, a test fixture) has attached to the request extensions.

use std::collections::HashMap;

/// Key/value session state reachable from a request.
///
/// Upstream layers insert this into the request extensions; the logger looks
/// up the configured user-id key in it. A request without session data is
/// perfectly valid and logs an empty `user_id`.
#[derive(Debug, Clone, Default)]
pub struct SessionData {
    values: HashMap<String, String>,
}

impl SessionData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a session value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Look up a session value by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

impl FromIterator<(String, String)> for SessionData {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_is_none() {
        let mut session = SessionData::new();
        session.insert("user_id", "42");
        assert_eq!(session.get("user_id"), Some("42"));
        assert_eq!(session.get("tenant_id"), None);
    }
}
