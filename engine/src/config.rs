//! Engine configuration read from the environment.

use crate::message::Channel;

/// Comma-separated default channel sequence. Empty entries are the sentinel.
pub const DEFAULT_CHANNELS_ENV: &str = "SWITCHBOARD_DEFAULT_CHANNELS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Sequence handed out to default broadcasts and the default listener.
    pub default_channels: Vec<Channel>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { default_channels: vec![Channel::Empty] }
    }
}

impl EngineConfig {
    /// Build config from `SWITCHBOARD_DEFAULT_CHANNELS`, falling back to a
    /// single sentinel channel when unset.
    #[must_use]
    pub fn from_env() -> Self {
        match std::env::var(DEFAULT_CHANNELS_ENV) {
            Ok(raw) => Self { default_channels: parse_channels(&raw) },
            Err(_) => Self::default(),
        }
    }

    #[must_use]
    pub fn with_default_channels(mut self, channels: Vec<Channel>) -> Self {
        self.default_channels = channels;
        self
    }
}

/// Split a comma list into channels. Never returns an empty sequence.
#[must_use]
pub fn parse_channels(raw: &str) -> Vec<Channel> {
    raw.split(',').map(|entry| Channel::named(entry.trim())).collect()
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
