//! Message routing
//!
//! A [`ChannelRouter`] classifies inbound frames by discriminant and folds
//! them into the channel's state slots.

use crate::connection::ChannelPolicy;
use crate::error::ProtocolParseError;
use crate::protocol::{ChannelKind, HandshakePayload};
use std::fmt;

/// Result of classifying one inbound frame
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound<M> {
    /// Completes the handshake; consumed by the supervisor, never applied
    HandshakeAck,
    /// State update for [`ChannelRouter::apply`]
    Message(M),
    /// Recognised but carries nothing to store
    Ignored(&'static str),
}

/// What `dispatch` did with a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    HandshakeAck,
    Applied,
    Ignored,
    Dropped,
}

/// Channel-specific vocabulary and state
pub trait ChannelRouter: Send + 'static {
    type Message: fmt::Debug + Send;

    fn channel(&self) -> ChannelKind;

    fn policy(&self) -> ChannelPolicy;

    /// Handshake for a new connection attempt
    fn handshake(&self) -> HandshakePayload;

    /// Frames sent right after the handshake on every new connection
    fn initial_requests(&self) -> Vec<String> {
        Vec::new()
    }

    fn classify(&self, frame: &str) -> Result<Inbound<Self::Message>, ProtocolParseError>;

    fn apply(&mut self, message: Self::Message);

    /// Classify and apply a frame. Never fails: bad frames are logged and dropped.
    fn dispatch(&mut self, frame: &str) -> Dispatch {
        match self.classify(frame) {
            Ok(Inbound::HandshakeAck) => Dispatch::HandshakeAck,
            Ok(Inbound::Message(message)) => {
                tracing::trace!(channel = %self.channel(), message = ?message, "Applying frame");
                self.apply(message);
                Dispatch::Applied
            }
            Ok(Inbound::Ignored(reason)) => {
                tracing::debug!(channel = %self.channel(), reason, "Ignoring frame");
                Dispatch::Ignored
            }
            Err(e) => {
                tracing::warn!(
                    channel = %self.channel(),
                    error = %e,
                    frame_len = frame.len(),
                    "Dropping unroutable frame"
                );
                Dispatch::Dropped
            }
        }
    }
}

/// Parse a frame into a JSON object, the common first step of every router
pub(crate) fn parse_object(
    frame: &str,
) -> Result<serde_json::Map<String, serde_json::Value>, ProtocolParseError> {
    let value: serde_json::Value = serde_json::from_str(frame)?;
    match value {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(ProtocolParseError::invalid_payload(
            "frame",
            format!("expected a JSON object, got {}", json_kind(&other)),
        )),
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
