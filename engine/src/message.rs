//! Channels and the message envelope delivered to listeners.

use std::fmt;

use serde::Serialize;
use serde_json::Value;
use tree::NodeId;

/// A channel name, or the sentinel meaning "not connected".
///
/// Channels are plain strings; the sentinel is never delivered on. An empty
/// string read from markup or configuration is the sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(untagged)]
pub enum Channel {
    #[default]
    Empty,
    Named(String),
}

impl Channel {
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        if name.is_empty() { Self::Empty } else { Self::Named(name) }
    }

    /// Interpret an attribute value. A missing or empty value is the sentinel.
    pub fn from_attribute(value: Option<&str>) -> Self {
        value.map_or(Self::Empty, Self::named)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Empty => None,
            Self::Named(name) => Some(name),
        }
    }
}

impl From<&str> for Channel {
    fn from(name: &str) -> Self {
        Self::named(name)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("(none)"),
            Self::Named(name) => f.write_str(name),
        }
    }
}

/// What a listener receives.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Channel the message was sent on. Never the sentinel.
    pub channel: String,
    pub data: Value,
    pub extra: Value,
    /// Emitting instance.
    pub source: NodeId,
    /// Identifier of the emitting instance at emit time, used for self-filtering.
    pub source_id: Option<String>,
}

impl Message {
    /// Data rendered the way log lines show it: strings bare, everything else as JSON.
    #[must_use]
    pub fn data_text(&self) -> String {
        value_text(&self.data)
    }
}

pub(crate) fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
