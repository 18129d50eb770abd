//! RPC operation codes
//!
//! Op codes of the broadcast-software RPC socket (OBS WebSocket v5 numbering).

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// RPC operation codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RpcOpCode {
    /// Sent by the server on connect (server only)
    Hello = 0,
    /// Client registers its RPC version and credential (client only)
    Identify = 1,
    /// Identify accepted (server only)
    Identified = 2,
    /// Client updates session parameters (client only)
    Reidentify = 3,
    /// Server pushes an event (server only)
    Event = 5,
    /// Client request (client only)
    Request = 6,
    /// Response to a request (server only)
    RequestResponse = 7,
    /// Batch of requests (client only)
    RequestBatch = 8,
    /// Response to a batch (server only)
    RequestBatchResponse = 9,
}

impl RpcOpCode {
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Hello),
            1 => Some(Self::Identify),
            2 => Some(Self::Identified),
            3 => Some(Self::Reidentify),
            5 => Some(Self::Event),
            6 => Some(Self::Request),
            7 => Some(Self::RequestResponse),
            8 => Some(Self::RequestBatch),
            9 => Some(Self::RequestBatchResponse),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Hello => "Hello",
            Self::Identify => "Identify",
            Self::Identified => "Identified",
            Self::Reidentify => "Reidentify",
            Self::Event => "Event",
            Self::Request => "Request",
            Self::RequestResponse => "RequestResponse",
            Self::RequestBatch => "RequestBatch",
            Self::RequestBatchResponse => "RequestBatchResponse",
        }
    }
}

impl Serialize for RpcOpCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for RpcOpCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = u8::deserialize(deserializer)?;
        Self::from_u8(value)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid op code: {value}")))
    }
}

impl std::fmt::Display for RpcOpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name(), self.as_u8())
    }
}
