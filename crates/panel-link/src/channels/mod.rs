//! The four channel clients
//!
//! Each client owns one supervisor plus the state slots its router writes to.
//! Clients are constructed by the caller with an injected transport; nothing
//! here is global.

mod audio;
mod chat_bot;
mod lenient;
mod obs;
mod overlay;

pub use audio::{
    AudioClient, AudioCommand, AudioControl, AudioDecks, AudioEffect, AudioRouter, AudioUpdate,
    DeckPatch, DeckState, NowPlaying, QueueItem,
};
pub use chat_bot::{
    BotCommand, BotUpdate, ChatBotClient, ChatBotRouter, ChatterRoster, ChatterSettings,
    UserSettings,
};
pub use obs::{ObsClient, ObsRouter, ObsState, ObsUpdate};
pub use overlay::{ControlPanelSettings, OverlayClient, OverlayRouter};

use crate::connection::RetryPolicy;
use crate::protocol::ChannelKind;
use panel_common::ClientConfig;

/// Where a channel connects and how it backs off
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelOptions {
    pub url: String,
    pub retry: RetryPolicy,
}

impl ChannelOptions {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            retry: RetryPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Options for `kind` from the client configuration
    ///
    /// Returns `None` for the RPC channel when no URL is configured.
    #[must_use]
    pub fn for_channel(config: &ClientConfig, kind: ChannelKind) -> Option<Self> {
        let url = match kind.endpoint() {
            Some(endpoint) => config.endpoint.channel_url(endpoint),
            None => config.obs.url.clone()?,
        };
        Some(Self::new(url).with_retry(RetryPolicy::from(&config.reconnect)))
    }
}
