//! Log sinks.
//!
//! A sink is the single shared mutable resource of the middleware. The only
//! operation it must support is writing one complete line; implementations
//! guarantee that concurrent callers never interleave the bytes of two lines.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

/// Line-oriented write target for emitted log lines.
///
/// `write_line` receives the rendered line without a trailing newline and
/// must write it atomically with respect to other callers: the bytes of one
/// line are never split by another line's bytes.
pub trait LogSink: Send + Sync {
    /// Write one complete log line.
    fn write_line(&self, line: &str) -> io::Result<()>;
}

/// Default sink: writes lines to standard output.
///
/// The line and its trailing newline are assembled into one buffer and
/// written with a single `write_all` while holding the stdout lock, so
/// concurrent requests cannot interleave within a line.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutSink;

impl StdoutSink {
    pub fn new() -> Self {
        Self
    }
}

impl LogSink for StdoutSink {
    fn write_line(&self, line: &str) -> io::Result<()> {
        let mut buf = String::with_capacity(line.len() + 1);
        buf.push_str(line);
        buf.push('\n');
        let mut out = io::stdout().lock();
        out.write_all(buf.as_bytes())
    }
}

/// Sink that forwards each line to the `tracing` pipeline at INFO level.
///
/// Useful when the embedding application already routes `tracing` output to
/// files or a collector and wants request lines to follow the same path.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl TracingSink {
    pub fn new() -> Self {
        Self
    }
}

impl LogSink for TracingSink {
    fn write_line(&self, line: &str) -> io::Result<()> {
        tracing::info!(target: "kv_logger::access", "{line}");
        Ok(())
    }
}

/// In-memory sink that captures emitted lines.
///
/// Clones share the same buffer, so a test (or an embedder) can hand one
/// clone to the middleware and inspect captured lines through another.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all lines captured so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }
}

impl LogSink for MemorySink {
    fn write_line(&self, line: &str) -> io::Result<()> {
        let mut lines = self
            .lines
            .lock()
            .map_err(|_| io::Error::other("memory sink lock poisoned"))?;
        lines.push(line.to_string());
        Ok(())
    }
}
