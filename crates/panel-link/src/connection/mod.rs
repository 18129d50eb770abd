//! Connection lifecycle
//!
//! [`ReconnectMachine`] decides; the supervisor task executes its effects.

mod machine;
mod state;
mod supervisor;

pub use machine::{
    AttemptReset, ChannelPolicy, Effect, HandshakeMode, ReconnectMachine, RetryPolicy,
    SupervisorEvent,
};
pub use state::{ConnectionState, ConnectionStatus};
pub use supervisor::{spawn_supervisor, SupervisorHandle};
