//! Wire protocol definitions
//!
//! Frame shapes for the event-keyed panel channels and the op-numbered RPC socket,
//! plus the handshake payloads each channel sends on open.

mod channel;
mod close_codes;
mod messages;
mod opcodes;
mod payloads;

pub use channel::ChannelKind;
pub use close_codes::RpcCloseCode;
pub use messages::{EventFrame, RpcFrame};
pub use opcodes::RpcOpCode;
pub use payloads::{
    ClientRole, DeckId, HandshakePayload, IdentifyPayload, RequestStatus, RpcEvent, RpcRequest,
    RpcRequestResponse, WEB_CLIENT,
};
