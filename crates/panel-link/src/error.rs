//! Link error types
//!
//! Failures that a channel records in its connection status. None of these
//! are returned from the command path; they surface through
//! [`ConnectionStatus::last_error`](crate::connection::ConnectionStatus) and logs.

/// Connection-level failures recorded by a supervisor
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinkError {
    /// Network, DNS or TLS failure before the socket opened
    #[error("Failed to open transport: {0}")]
    TransportOpen(String),

    /// An open socket went away
    #[error("Connection closed ({}): {reason}", describe_code(.code))]
    ConnectionClosed { code: Option<u16>, reason: String },

    /// The server refused the identify handshake
    #[error("Handshake rejected ({code}): {reason}")]
    HandshakeRejected { code: u16, reason: String },

    #[error("Protocol parse error: {0}")]
    ProtocolParse(String),

    #[error("Command dropped: connection is not open")]
    SendWhileDisconnected,

    /// Terminal: automatic reconnects are exhausted
    #[error("Gave up after {attempts} reconnect attempts")]
    RetryExhausted { attempts: u32 },
}

fn describe_code(code: &Option<u16>) -> String {
    code.map_or_else(|| "no code".to_string(), |c| c.to_string())
}

impl LinkError {
    /// Stable error code for logs
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::TransportOpen(_) => "TRANSPORT_OPEN",
            Self::ConnectionClosed { .. } => "CONNECTION_CLOSED",
            Self::HandshakeRejected { .. } => "HANDSHAKE_REJECTED",
            Self::ProtocolParse(_) => "PROTOCOL_PARSE",
            Self::SendWhileDisconnected => "SEND_WHILE_DISCONNECTED",
            Self::RetryExhausted { .. } => "RETRY_EXHAUSTED",
        }
    }

    /// Whether this error ends automatic reconnection
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::RetryExhausted { .. })
    }
}

/// Why an inbound frame could not be routed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolParseError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Unknown discriminant: {0}")]
    UnknownDiscriminant(String),

    #[error("Invalid payload for {kind}: {reason}")]
    InvalidPayload { kind: String, reason: String },
}

impl ProtocolParseError {
    pub fn invalid_payload(kind: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::InvalidPayload {
            kind: kind.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<serde_json::Error> for ProtocolParseError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidJson(err.to_string())
    }
}

impl From<ProtocolParseError> for LinkError {
    fn from(err: ProtocolParseError) -> Self {
        Self::ProtocolParse(err.to_string())
    }
}
