//! RPC socket close codes

use serde::{Deserialize, Serialize};

/// Close codes the RPC server sends when it drops a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum RpcCloseCode {
    UnknownReason = 4000,
    MessageDecodeError = 4002,
    MissingDataField = 4003,
    InvalidDataFieldType = 4004,
    InvalidDataFieldValue = 4005,
    UnknownOpCode = 4006,
    /// Sent a request before Identify
    NotIdentified = 4007,
    AlreadyIdentified = 4008,
    AuthenticationFailed = 4009,
    UnsupportedRpcVersion = 4010,
    /// Session kicked by the server operator
    SessionInvalidated = 4011,
    UnsupportedFeature = 4012,
}

impl RpcCloseCode {
    #[must_use]
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            4000 => Some(Self::UnknownReason),
            4002 => Some(Self::MessageDecodeError),
            4003 => Some(Self::MissingDataField),
            4004 => Some(Self::InvalidDataFieldType),
            4005 => Some(Self::InvalidDataFieldValue),
            4006 => Some(Self::UnknownOpCode),
            4007 => Some(Self::NotIdentified),
            4008 => Some(Self::AlreadyIdentified),
            4009 => Some(Self::AuthenticationFailed),
            4010 => Some(Self::UnsupportedRpcVersion),
            4011 => Some(Self::SessionInvalidated),
            4012 => Some(Self::UnsupportedFeature),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// The server declined the identify handshake
    #[must_use]
    pub const fn is_handshake_rejection(self) -> bool {
        matches!(
            self,
            Self::AuthenticationFailed | Self::UnsupportedRpcVersion | Self::SessionInvalidated
        )
    }

    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::UnknownReason => "Unknown reason",
            Self::MessageDecodeError => "Message could not be decoded",
            Self::MissingDataField => "Missing data field",
            Self::InvalidDataFieldType => "Invalid data field type",
            Self::InvalidDataFieldValue => "Invalid data field value",
            Self::UnknownOpCode => "Unknown op code",
            Self::NotIdentified => "Not identified",
            Self::AlreadyIdentified => "Already identified",
            Self::AuthenticationFailed => "Authentication failed",
            Self::UnsupportedRpcVersion => "Unsupported RPC version",
            Self::SessionInvalidated => "Session invalidated",
            Self::UnsupportedFeature => "Unsupported feature",
        }
    }
}

impl std::fmt::Display for RpcCloseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.description(), self.as_u16())
    }
}
