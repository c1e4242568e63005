//! Log records and the pluggable log sink.
//!
//! DESIGN
//! ======
//! Components and the bus report activity as [`LogRecord`]s. The engine hands
//! every record to a single sink; the default sink forwards to `tracing` at a
//! level picked from the record's severity, and tooling can swap it with
//! [`Engine::set_log_sink`] to build its own activity feed.

use serde::Serialize;
use tree::NodeId;

use crate::engine::Engine;

/// Messages longer than this many characters are cut and suffixed with `…`.
pub const MAX_LOG_MESSAGE_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
    /// Something that should be impossible happened.
    Wtf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogRecord {
    /// Identifier of the instance speaking, if any.
    pub speaker: Option<String>,
    pub message: String,
    pub channel: Option<String>,
    pub severity: Option<Severity>,
}

pub type LogSink = Box<dyn Fn(&LogRecord)>;

/// Cap `message` at [`MAX_LOG_MESSAGE_CHARS`] characters.
#[must_use]
pub fn truncate_message(message: &str) -> String {
    match message.char_indices().nth(MAX_LOG_MESSAGE_CHARS) {
        Some((cut, _)) => format!("{}…", &message[..cut]),
        None => message.to_owned(),
    }
}

/// Default sink: one `tracing` event per record.
#[must_use]
pub fn tracing_sink() -> LogSink {
    Box::new(|record: &LogRecord| {
        let speaker = record.speaker.as_deref().unwrap_or("-");
        let channel = record.channel.as_deref().unwrap_or("-");
        match record.severity {
            Some(Severity::Error | Severity::Wtf) => {
                tracing::error!(speaker, channel, severity = ?record.severity, "{}", record.message);
            }
            Some(Severity::Warning) => tracing::warn!(speaker, channel, "{}", record.message),
            Some(Severity::Debug) => tracing::debug!(speaker, channel, "{}", record.message),
            Some(Severity::Info) | None => tracing::info!(speaker, channel, "{}", record.message),
        }
    })
}

impl Engine {
    /// Replace the log sink. The previous sink is dropped.
    pub fn set_log_sink(&mut self, sink: LogSink) {
        self.sink = sink;
    }

    /// Build a record for `speaker` and hand it to the sink.
    pub fn log(&self, speaker: Option<NodeId>, message: &str, channel: Option<&str>, severity: Option<Severity>) {
        let record = LogRecord {
            speaker: speaker.map(|node| self.display_name(node)),
            message: truncate_message(message),
            channel: channel.map(str::to_owned),
            severity,
        };
        (self.sink)(&record);
    }
}

#[cfg(test)]
#[path = "log_test.rs"]
mod tests;
