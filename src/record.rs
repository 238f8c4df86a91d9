//! Per-request log record.
//!
//! A [`LogRecord`] is an append-only list of `(key, value)` pairs owned by a
//! single in-flight request. Insertion order is emission order, and a pair is
//! never removed or rewritten once pushed. The record is rendered into one
//! pipe-delimited line and discarded as soon as the line is written.

/// Separator between `key=value` pairs in the emitted line.
pub const SEPARATOR: char = '|';

/// Ordered, append-only collection of `key=value` fields for one request.
#[derive(Debug, Default)]
pub struct LogRecord {
    fields: Vec<(&'static str, String)>,
}

impl LogRecord {
    /// Create an empty record.
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Append a field. Keys are not deduplicated; callers append each key
    /// at most once over the request lifecycle.
    pub fn push(&mut self, key: &'static str, value: impl Into<String>) {
        self.fields.push((key, value.into()));
    }

    /// Whether a field with the given key has already been appended.
    pub fn contains(&self, key: &str) -> bool {
        self.fields.iter().any(|(k, _)| *k == key)
    }

    /// Whether no field has been appended yet.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Render the record as a single `|`-delimited line.
    ///
    /// Values are sanitized so a record always serializes to exactly one
    /// line: embedded newlines become spaces. Keys are crate-controlled
    /// constants and need no sanitization.
    pub fn render(&self) -> String {
        let mut line = String::with_capacity(self.fields.len() * 16);
        for (i, (key, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                line.push(SEPARATOR);
            }
            line.push_str(key);
            line.push('=');
            if value.contains(['\n', '\r']) {
                for ch in value.chars() {
                    line.push(if ch == '\n' || ch == '\r' { ' ' } else { ch });
                }
            } else {
                line.push_str(value);
            }
        }
        line
    }
}
