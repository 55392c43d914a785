//! Bounded narration log for asynchronous stages.
//!
//! The log is append-only and keeps only the most recent
//! [`MAX_LOG_ENTRIES`] entries; older entries fall off the front.
//! Appends are visible to `snapshot()` and to the optional sink
//! immediately, so narration interleaves with the work it describes.

use std::collections::VecDeque;

use serde::Serialize;

/// Maximum number of entries retained by a [`LogChannel`].
pub const MAX_LOG_ENTRIES: usize = 50;

/// Severity of a narration entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
    Thinking,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Success => "success",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Thinking => "thinking",
        }
    }

    fn log_level(&self) -> log::Level {
        match self {
            Severity::Thinking => log::Level::Debug,
            Severity::Info | Severity::Success => log::Level::Info,
            Severity::Warning => log::Level::Warn,
            Severity::Error => log::Level::Error,
        }
    }
}

/// One immutable narration entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    /// Rendering key, unique within the channel that produced it.
    pub id: u64,
    /// Local wall-clock time of the append, `HH:MM:SS`.
    pub timestamp: String,
    pub message: String,
    pub severity: Severity,
}

/// Callback invoked synchronously for every appended entry.
pub type NarrationSink = Box<dyn FnMut(&LogEntry) + Send>;

/// Bounded, ordered, append-only sequence of narration entries.
pub struct LogChannel {
    entries: VecDeque<LogEntry>,
    next_id: u64,
    sink: Option<NarrationSink>,
}

impl Default for LogChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LogChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogChannel")
            .field("entries", &self.entries)
            .field("next_id", &self.next_id)
            .field("sink", &self.sink.is_some())
            .finish()
    }
}

impl LogChannel {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::with_capacity(MAX_LOG_ENTRIES),
            next_id: 0,
            sink: None,
        }
    }

    /// Install a sink that observes every subsequent append.
    pub fn set_sink(&mut self, sink: impl FnMut(&LogEntry) + Send + 'static) {
        self.sink = Some(Box::new(sink));
    }

    /// Append one entry stamped with the current local time.
    pub fn append(&mut self, message: impl Into<String>, severity: Severity) {
        let timestamp = chrono::Local::now().format("%H:%M:%S").to_string();
        self.append_at(message, severity, timestamp);
    }

    /// Append with an explicit timestamp string.
    pub fn append_at(&mut self, message: impl Into<String>, severity: Severity, timestamp: String) {
        let entry = LogEntry {
            id: self.next_id,
            timestamp,
            message: message.into(),
            severity,
        };
        self.next_id += 1;

        log::log!(target: "auditgrid::narration", severity.log_level(), "{}", entry.message);

        if let Some(sink) = self.sink.as_mut() {
            sink(&entry);
        }

        self.entries.push_back(entry);
        while self.entries.len() > MAX_LOG_ENTRIES {
            self.entries.pop_front();
        }
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.append(message, Severity::Info);
    }

    pub fn success(&mut self, message: impl Into<String>) {
        self.append(message, Severity::Success);
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.append(message, Severity::Warning);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.append(message, Severity::Error);
    }

    pub fn thinking(&mut self, message: impl Into<String>) {
        self.append(message, Severity::Thinking);
    }

    /// Current entries, oldest first.
    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop all entries (module reset). Ids keep counting.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
