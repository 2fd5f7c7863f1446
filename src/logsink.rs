//! Injected sink for human-readable progress lines.
//!
//! The pipeline never logs progress through a global object; it is handed
//! a `LogSink` instead. The CLI forwards lines to `tracing`, tests collect
//! them in memory, and a live log panel can drain a channel.

use chrono::{DateTime, Local};
use std::fmt;
use std::sync::mpsc::Sender;
use std::sync::Mutex;

/// Severity of a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
}

/// A timestamped progress or warning message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub at: DateTime<Local>,
    pub level: LogLevel,
    pub message: String,
}

impl LogLine {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            at: Local::now(),
            level,
            message: message.into(),
        }
    }
}

impl fmt::Display for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.at.format("%H:%M:%S"), self.message)
    }
}

/// Destination for pipeline progress lines.
pub trait LogSink: Send + Sync {
    fn emit(&self, line: LogLine);

    fn info(&self, message: &str) {
        self.emit(LogLine::new(LogLevel::Info, message));
    }

    fn warn(&self, message: &str) {
        self.emit(LogLine::new(LogLevel::Warn, message));
    }
}

/// Forwards lines to the `tracing` subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn emit(&self, line: LogLine) {
        match line.level {
            LogLevel::Info => tracing::info!("{}", line.message),
            LogLevel::Warn => tracing::warn!("{}", line.message),
        }
    }
}

/// Keeps every line in memory.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<LogLine>>,
}

#[cfg(test)]
impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the collected lines.
    pub fn lines(&self) -> Vec<LogLine> {
        self.lines
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }

    pub fn warnings(&self) -> Vec<LogLine> {
        self.lines()
            .into_iter()
            .filter(|l| l.level == LogLevel::Warn)
            .collect()
    }
}

#[cfg(test)]
impl LogSink for MemorySink {
    fn emit(&self, line: LogLine) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line);
        }
    }
}

/// Sends lines over a channel, e.g. to a UI thread.
#[derive(Debug)]
pub struct ChannelSink {
    tx: Mutex<Sender<LogLine>>,
}

impl ChannelSink {
    pub fn new(tx: Sender<LogLine>) -> Self {
        Self { tx: Mutex::new(tx) }
    }
}

impl LogSink for ChannelSink {
    fn emit(&self, line: LogLine) {
        // A closed receiver means nobody is watching anymore.
        if let Ok(tx) = self.tx.lock() {
            let _ = tx.send(line);
        }
    }
}
