//! Frame envelopes
//!
//! The panel backend channels speak event-keyed JSON objects; the RPC socket
//! speaks `{op, d}` envelopes.

use super::{IdentifyPayload, RpcEvent, RpcOpCode, RpcRequest, RpcRequestResponse};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event-keyed frame used by the audio, overlay and chat-bot channels
///
/// Every field is optional on the wire; which ones are present depends on
/// the channel and the event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventFrame {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,

    /// Secondary discriminant (`volume`, `reload_on_finish`, ...)
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl EventFrame {
    /// Create a frame tagged with an event name
    #[must_use]
    pub fn event(name: impl Into<String>) -> Self {
        Self {
            event: Some(name.into()),
            ..Self::default()
        }
    }

    /// Create a frame keyed only by `type`
    #[must_use]
    pub fn typed(kind: impl Into<String>) -> Self {
        Self {
            kind: Some(kind.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    #[must_use]
    pub fn with_client(mut self, client: impl Into<String>) -> Self {
        self.client = Some(client.into());
        self
    }

    #[must_use]
    pub fn with_client_type(mut self, client_type: impl Into<String>) -> Self {
        self.client_type = Some(client_type.into());
        self
    }

    #[must_use]
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    #[must_use]
    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl std::fmt::Display for EventFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.event, &self.kind) {
            (Some(event), Some(kind)) => write!(f, "EventFrame(event={event}, type={kind})"),
            (Some(event), None) => write!(f, "EventFrame(event={event})"),
            (None, Some(kind)) => write!(f, "EventFrame(type={kind})"),
            (None, None) => write!(f, "EventFrame(untagged)"),
        }
    }
}

/// Op-numbered envelope of the RPC socket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcFrame {
    pub op: RpcOpCode,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub d: Option<Value>,
}

impl RpcFrame {
    #[must_use]
    pub fn new(op: RpcOpCode, d: Option<Value>) -> Self {
        Self { op, d }
    }

    /// Create an Identify frame (op=1)
    pub fn identify(payload: &IdentifyPayload) -> Result<Self, serde_json::Error> {
        Ok(Self::new(RpcOpCode::Identify, Some(serde_json::to_value(payload)?)))
    }

    /// Create a Request frame (op=6)
    pub fn request(request: &RpcRequest) -> Result<Self, serde_json::Error> {
        Ok(Self::new(RpcOpCode::Request, Some(serde_json::to_value(request)?)))
    }

    /// Try to parse as an Identify payload (op=1)
    pub fn as_identify(&self) -> Option<IdentifyPayload> {
        self.payload_for(RpcOpCode::Identify)
    }

    /// Try to parse as an Event payload (op=5)
    pub fn as_event(&self) -> Option<RpcEvent> {
        self.payload_for(RpcOpCode::Event)
    }

    /// Try to parse as a RequestResponse payload (op=7)
    pub fn as_request_response(&self) -> Option<RpcRequestResponse> {
        self.payload_for(RpcOpCode::RequestResponse)
    }

    fn payload_for<T: serde::de::DeserializeOwned>(&self, op: RpcOpCode) -> Option<T> {
        if self.op != op {
            return None;
        }
        self.d
            .as_ref()
            .and_then(|d| serde_json::from_value(d.clone()).ok())
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl std::fmt::Display for RpcFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RpcFrame(op={})", self.op)
    }
}
