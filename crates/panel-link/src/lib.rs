//! # panel-link
//!
//! Reconnecting WebSocket clients for the control panel channels: audio decks,
//! overlay settings, the chat-bot bridge and the broadcast-software RPC socket.
//!
//! Every channel is the same three layers: a [`transport::Transport`] that owns one
//! socket, a [`connection::SupervisorHandle`] actor that handles handshake and backoff, and a
//! [`router::ChannelRouter`] that folds inbound frames into [`store::Slot`]s.

pub mod channels;
pub mod connection;
pub mod error;
pub mod protocol;
pub mod router;
pub mod store;
pub mod transport;

pub use channels::{AudioClient, ChannelOptions, ChatBotClient, ObsClient, OverlayClient};
pub use connection::{ConnectionState, ConnectionStatus, RetryPolicy, SupervisorHandle};
pub use error::{LinkError, ProtocolParseError};
pub use protocol::ChannelKind;
pub use store::{FileSnapshotStore, MemorySnapshotStore, SnapshotStore, Slot, Subscription};
pub use transport::{Transport, WsTransport};
