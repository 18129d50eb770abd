//! Broadcast-software RPC channel
//!
//! Speaks the op-numbered protocol: identify on open, wait for `Identified`,
//! then exchange requests and events.

use super::ChannelOptions;
use crate::connection::{spawn_supervisor, ChannelPolicy, ConnectionStatus, SupervisorHandle};
use crate::error::ProtocolParseError;
use crate::protocol::{
    ChannelKind, HandshakePayload, IdentifyPayload, RpcEvent, RpcFrame, RpcOpCode, RpcRequest,
    RpcRequestResponse,
};
use crate::router::{ChannelRouter, Inbound};
use crate::store::Slot;
use crate::transport::Transport;
use panel_common::ObsConfig;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

/// Most recent traffic seen on the RPC socket
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ObsState {
    pub last_event: Option<RpcEvent>,
    pub last_response: Option<RpcRequestResponse>,
    /// Any other frame, such as batch responses or a reidentify
    pub last_message: Option<RpcFrame>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ObsUpdate {
    Event(RpcEvent),
    Response(RpcRequestResponse),
    Other(RpcFrame),
}

pub struct ObsRouter {
    identify: IdentifyPayload,
    state: Slot<ObsState>,
}

impl ObsRouter {
    pub fn new(identify: IdentifyPayload, state: Slot<ObsState>) -> Self {
        Self { identify, state }
    }
}

fn payload<T: DeserializeOwned>(frame: RpcFrame, kind: &str) -> Result<T, ProtocolParseError> {
    let d = frame
        .d
        .ok_or_else(|| ProtocolParseError::invalid_payload(kind, "missing d"))?;
    serde_json::from_value(d).map_err(|e| ProtocolParseError::invalid_payload(kind, e))
}

impl ChannelRouter for ObsRouter {
    type Message = ObsUpdate;

    fn channel(&self) -> ChannelKind {
        ChannelKind::Obs
    }

    fn policy(&self) -> ChannelPolicy {
        ChannelPolicy::AWAIT_ACK
    }

    fn handshake(&self) -> HandshakePayload {
        HandshakePayload::Identify(self.identify.clone())
    }

    fn classify(&self, frame: &str) -> Result<Inbound<ObsUpdate>, ProtocolParseError> {
        let frame = RpcFrame::from_json(frame)?;

        match frame.op {
            RpcOpCode::Hello => Ok(Inbound::Ignored("hello")),
            RpcOpCode::Identified => Ok(Inbound::HandshakeAck),
            RpcOpCode::Event => payload(frame, "Event").map(|e| Inbound::Message(ObsUpdate::Event(e))),
            RpcOpCode::RequestResponse => payload(frame, "RequestResponse")
                .map(|r| Inbound::Message(ObsUpdate::Response(r))),
            _ => Ok(Inbound::Message(ObsUpdate::Other(frame))),
        }
    }

    fn apply(&mut self, update: ObsUpdate) {
        self.state.update(|state| match update {
            ObsUpdate::Event(event) => state.last_event = Some(event),
            ObsUpdate::Response(response) => state.last_response = Some(response),
            ObsUpdate::Other(frame) => state.last_message = Some(frame),
        });
    }
}

/// Client for the external RPC socket
#[derive(Debug, Clone)]
pub struct ObsClient {
    link: SupervisorHandle,
    state: Slot<ObsState>,
}

impl ObsClient {
    pub fn spawn(
        options: ChannelOptions,
        transport: Arc<dyn Transport>,
        identify: IdentifyPayload,
    ) -> Self {
        let state = Slot::default();
        let router = ObsRouter::new(identify, state.clone());
        let link = spawn_supervisor(options.url, transport, router, options.retry);
        Self { link, state }
    }

    /// Identify payload from configuration; the password is sent as the token
    #[must_use]
    pub fn identify_from(config: &ObsConfig) -> IdentifyPayload {
        IdentifyPayload::new(config.rpc_version).with_authentication(config.password.clone())
    }

    pub fn start(&self) {
        self.link.start();
    }

    pub fn close(&self) {
        self.link.shutdown();
    }

    /// Send a request with a fresh id and return that id
    ///
    /// Like every command it is dropped unless the session is identified.
    pub fn send_request(&self, request_type: impl Into<String>, request_data: Option<Value>) -> String {
        let request = RpcRequest {
            request_type: request_type.into(),
            request_id: Uuid::new_v4().to_string(),
            request_data,
        };

        match RpcFrame::request(&request) {
            Ok(frame) => self.link.send_json(&frame),
            Err(e) => {
                tracing::error!(channel = %ChannelKind::Obs, error = %e, "Failed to encode request");
            }
        }
        request.request_id
    }

    #[must_use]
    pub fn state(&self) -> &Slot<ObsState> {
        &self.state
    }

    #[must_use]
    pub fn link(&self) -> &SupervisorHandle {
        &self.link
    }

    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.link.status()
    }
}
