use serde::{Deserialize, Serialize};
use std::fmt;

/// The logical channels a control surface talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Audio,
    Overlay,
    ChatBot,
    Obs,
}

impl ChannelKind {
    pub const ALL: [Self; 4] = [Self::Audio, Self::Overlay, Self::ChatBot, Self::Obs];

    /// Path segment under `/websockets/` on the panel backend.
    ///
    /// The RPC socket belongs to the broadcast software, not the panel
    /// backend, so it has no path here.
    #[must_use]
    pub const fn endpoint(self) -> Option<&'static str> {
        match self {
            Self::Audio => Some("audio"),
            Self::Overlay => Some("overlay"),
            Self::ChatBot => Some("twitch_bot"),
            Self::Obs => None,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Overlay => "overlay",
            Self::ChatBot => "chat_bot",
            Self::Obs => "obs",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
