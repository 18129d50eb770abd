//! Handshake and RPC payload definitions

use super::{EventFrame, RpcFrame, RpcOpCode};
use crate::error::ProtocolParseError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

/// `client_type` tag of a control surface on the chat-bot channel
pub const WEB_CLIENT: &str = "WEB_CLIENT";

/// Role announced on the overlay channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientRole {
    /// Pushes settings
    ControlPanel,
    /// Receives settings
    Overlay,
}

impl ClientRole {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ControlPanel => "control_panel",
            Self::Overlay => "overlay",
        }
    }
}

impl FromStr for ClientRole {
    type Err = ProtocolParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "control_panel" => Ok(Self::ControlPanel),
            "overlay" => Ok(Self::Overlay),
            other => Err(ProtocolParseError::UnknownDiscriminant(format!(
                "client role {other}"
            ))),
        }
    }
}

impl std::fmt::Display for ClientRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the two audio decks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeckId {
    #[serde(rename = "channel-1")]
    One,
    #[serde(rename = "channel-2")]
    Two,
}

impl DeckId {
    pub const ALL: [Self; 2] = [Self::One, Self::Two];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::One => "channel-1",
            Self::Two => "channel-2",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "channel-1" => Some(Self::One),
            "channel-2" => Some(Self::Two),
            _ => None,
        }
    }
}

impl std::fmt::Display for DeckId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identify payload (op=1 `d`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifyPayload {
    #[serde(rename = "rpcVersion")]
    pub rpc_version: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication: Option<String>,
}

impl IdentifyPayload {
    #[must_use]
    pub fn new(rpc_version: u32) -> Self {
        Self {
            rpc_version,
            authentication: None,
        }
    }

    #[must_use]
    pub fn with_authentication(mut self, authentication: Option<String>) -> Self {
        self.authentication = authentication;
        self
    }
}

/// First frame a channel sends after the socket opens
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakePayload {
    /// `{event:"connect", data:<page path>}`
    AudioConnect { page_path: String },
    /// `{event:"connect", client:<role>}`
    OverlayConnect { role: ClientRole },
    /// `{event:"CONNECT", client_type:"WEB_CLIENT"}`
    BotConnect,
    /// `{op:1, d:{rpcVersion, authentication?}}`
    Identify(IdentifyPayload),
}

impl HandshakePayload {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        match self {
            Self::AudioConnect { page_path } => EventFrame::event("connect")
                .with_data(Value::String(page_path.clone()))
                .to_json(),
            Self::OverlayConnect { role } => {
                EventFrame::event("connect").with_client(role.as_str()).to_json()
            }
            Self::BotConnect => EventFrame::event("CONNECT")
                .with_client_type(WEB_CLIENT)
                .to_json(),
            Self::Identify(payload) => RpcFrame::identify(payload)?.to_json(),
        }
    }

    /// Parse a handshake frame as the server receives it
    pub fn from_json(json: &str) -> Result<Self, ProtocolParseError> {
        let value: Value = serde_json::from_str(json)?;

        if value.get("op").is_some() {
            let frame: RpcFrame = serde_json::from_value(value)
                .map_err(|e| ProtocolParseError::invalid_payload("rpc frame", e))?;
            return match frame.op {
                RpcOpCode::Identify => frame
                    .as_identify()
                    .map(Self::Identify)
                    .ok_or_else(|| ProtocolParseError::invalid_payload("Identify", "missing d")),
                other => Err(ProtocolParseError::UnknownDiscriminant(other.to_string())),
            };
        }

        let frame: EventFrame = serde_json::from_value(value)
            .map_err(|e| ProtocolParseError::invalid_payload("event frame", e))?;

        match frame.event.as_deref() {
            Some("connect") => {
                if let Some(client) = frame.client.as_deref() {
                    return Ok(Self::OverlayConnect {
                        role: client.parse()?,
                    });
                }
                match frame.data {
                    Some(Value::String(page_path)) => Ok(Self::AudioConnect { page_path }),
                    _ => Err(ProtocolParseError::invalid_payload(
                        "connect",
                        "expected a client role or a page path",
                    )),
                }
            }
            Some("CONNECT") if frame.client_type.as_deref() == Some(WEB_CLIENT) => {
                Ok(Self::BotConnect)
            }
            Some("CONNECT") => Err(ProtocolParseError::invalid_payload(
                "CONNECT",
                "client_type must be WEB_CLIENT",
            )),
            Some(other) => Err(ProtocolParseError::UnknownDiscriminant(other.to_string())),
            None => Err(ProtocolParseError::UnknownDiscriminant(
                "missing event".to_string(),
            )),
        }
    }
}

/// Server event (op=5 `d`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcEvent {
    pub event_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_intent: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_data: Option<Value>,
}

/// Client request (op=6 `d`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcRequest {
    pub request_type: String,
    pub request_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_data: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestStatus {
    pub result: bool,
    pub code: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Response to a request (op=7 `d`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcRequestResponse {
    pub request_type: String,
    pub request_id: String,
    pub request_status: RequestStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_data: Option<Value>,
}
