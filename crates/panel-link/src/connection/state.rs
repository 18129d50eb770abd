//! Connection state

use crate::error::LinkError;
use crate::protocol::ChannelKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Connection state of one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No socket; a retry may be pending
    Disconnected,
    /// Socket opening
    Connecting,
    /// Open, handshake sent, waiting for the acknowledgment
    Identifying,
    /// Open, handshake sent, no acknowledgment expected
    Connected,
    /// Handshake acknowledged
    Identified,
    /// Retries exhausted; only an explicit start leaves this state
    GivingUp,
}

impl ConnectionState {
    /// Commands may be sent
    #[must_use]
    pub const fn is_sendable(self) -> bool {
        matches!(self, Self::Connected | Self::Identified)
    }

    /// A socket exists or is being opened
    #[must_use]
    pub const fn is_live(self) -> bool {
        matches!(
            self,
            Self::Connecting | Self::Identifying | Self::Connected | Self::Identified
        )
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Identifying => "identifying",
            Self::Connected => "connected",
            Self::Identified => "identified",
            Self::GivingUp => "giving_up",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Published snapshot of a channel's connection
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionStatus {
    pub channel: ChannelKind,
    pub url: String,
    pub state: ConnectionState,
    /// Consecutive failed attempts since the last reset
    pub attempts: u32,
    pub last_error: Option<LinkError>,
    /// Delay of the pending retry, if one is scheduled
    pub retry_in: Option<Duration>,
    /// When `state` was last entered
    pub since: DateTime<Utc>,
}

impl ConnectionStatus {
    #[must_use]
    pub fn new(channel: ChannelKind, url: impl Into<String>) -> Self {
        Self {
            channel,
            url: url.into(),
            state: ConnectionState::Disconnected,
            attempts: 0,
            last_error: None,
            retry_in: None,
            since: Utc::now(),
        }
    }

    /// Pending retry delay in whole milliseconds, saturating at `u64::MAX`
    #[must_use]
    pub fn retry_in_ms(&self) -> Option<u64> {
        self.retry_in
            .map(|delay| u64::try_from(delay.as_millis()).unwrap_or(u64::MAX))
    }

    /// Equal apart from the timestamp
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        self.state == other.state
            && self.attempts == other.attempts
            && self.last_error == other.last_error
            && self.retry_in == other.retry_in
    }
}
