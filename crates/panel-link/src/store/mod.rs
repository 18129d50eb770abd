//! Local state store
//!
//! Reactive slots holding each channel's mirror of server state, and the
//! key-value snapshot store used to restore settings across restarts.

mod slot;
mod snapshot;

pub use slot::{Slot, Subscription};
pub use snapshot::{
    load_json, save_json, FileSnapshotStore, MemorySnapshotStore, SnapshotStore,
    CONTROL_PANEL_SETTINGS_KEY,
};
