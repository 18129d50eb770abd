//! Chat-bot bridge channel
//!
//! Mirrors the bot's chatter roster and per-chatter TTS settings, and pushes
//! settings edits back to the bot through the panel backend.

use super::{lenient, ChannelOptions};
use crate::connection::{spawn_supervisor, ChannelPolicy, ConnectionStatus, SupervisorHandle};
use crate::error::ProtocolParseError;
use crate::protocol::{ChannelKind, EventFrame, HandshakePayload, WEB_CLIENT};
use crate::router::{parse_object, ChannelRouter, Inbound};
use crate::store::Slot;
use crate::transport::Transport;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// TTS settings of one chatter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatterSettings {
    #[serde(default, deserialize_with = "lenient::null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub is_muted: bool,
    #[serde(default)]
    pub message_replace: Option<String>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub tts_length: Option<f64>,
    #[serde(default, alias = "kill_TTS", deserialize_with = "lenient::flag")]
    pub kill_tts: bool,
}

/// Who is in chat and how each chatter is configured
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatterRoster {
    #[serde(default, deserialize_with = "lenient::null_as_default")]
    pub chatter_list: Vec<String>,
    #[serde(default)]
    pub current_chatter: Option<String>,
    /// Keyed by chat handle
    #[serde(
        default,
        rename = "chatters_data",
        deserialize_with = "lenient::null_as_default"
    )]
    pub settings: HashMap<String, ChatterSettings>,
}

/// Stored settings of one user, as answered to `GET_USER_SETTINGS`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserSettings {
    #[serde(default, alias = "name")]
    pub username: Option<String>,
    #[serde(default, deserialize_with = "lenient::optional_flag")]
    pub is_muted: Option<bool>,
    #[serde(default)]
    pub message_replace: Option<String>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub tts_length: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BotCommand {
    GetSettings,
    GetUserSettings { username: String },
    UpdateSettings(ChatterSettings),
}

impl BotCommand {
    #[must_use]
    pub fn to_frame(&self) -> EventFrame {
        let frame = match self {
            Self::GetSettings => EventFrame::event("GET_SETTINGS"),
            Self::GetUserSettings { username } => EventFrame::event("GET_USER_SETTINGS")
                .with_data(json!({ "username": username })),
            Self::UpdateSettings(settings) => EventFrame::event("UPDATE_SETTINGS")
                .with_data(serde_json::to_value(settings).unwrap_or(Value::Null)),
        };
        frame.with_client_type(WEB_CLIENT)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BotUpdate {
    Roster(ChatterRoster),
    UserSettings(Option<UserSettings>),
}

pub struct ChatBotRouter {
    roster: Slot<ChatterRoster>,
    user_settings: Slot<Option<UserSettings>>,
}

impl ChatBotRouter {
    pub fn new(roster: Slot<ChatterRoster>, user_settings: Slot<Option<UserSettings>>) -> Self {
        Self {
            roster,
            user_settings,
        }
    }
}

impl ChannelRouter for ChatBotRouter {
    type Message = BotUpdate;

    fn channel(&self) -> ChannelKind {
        ChannelKind::ChatBot
    }

    fn policy(&self) -> ChannelPolicy {
        ChannelPolicy::FIRE_AND_FORGET
    }

    fn handshake(&self) -> HandshakePayload {
        HandshakePayload::BotConnect
    }

    fn classify(&self, frame: &str) -> Result<Inbound<BotUpdate>, ProtocolParseError> {
        let mut map = parse_object(frame)?;
        let data = map.remove("data").unwrap_or(Value::Null);

        match map.get("event").and_then(Value::as_str) {
            Some("UPDATE") => ChatterRoster::deserialize(data)
                .map(|roster| Inbound::Message(BotUpdate::Roster(roster)))
                .map_err(|e| ProtocolParseError::invalid_payload("UPDATE", e)),
            Some("USER_SETTINGS") => Option::<UserSettings>::deserialize(data)
                .map(|settings| Inbound::Message(BotUpdate::UserSettings(settings)))
                .map_err(|e| ProtocolParseError::invalid_payload("USER_SETTINGS", e)),
            Some(other) => Err(ProtocolParseError::UnknownDiscriminant(other.to_string())),
            None => Err(ProtocolParseError::UnknownDiscriminant(
                "missing event".to_string(),
            )),
        }
    }

    fn apply(&mut self, update: BotUpdate) {
        match update {
            BotUpdate::Roster(roster) => self.roster.set(roster),
            BotUpdate::UserSettings(settings) => self.user_settings.set(settings),
        }
    }
}

/// Client for the `twitch_bot` channel
#[derive(Debug, Clone)]
pub struct ChatBotClient {
    link: SupervisorHandle,
    roster: Slot<ChatterRoster>,
    user_settings: Slot<Option<UserSettings>>,
    selected: Slot<Option<String>>,
}

impl ChatBotClient {
    /// `selected` is the chatter picked in the UI; it may be shared with other views
    pub fn spawn(
        options: ChannelOptions,
        transport: Arc<dyn Transport>,
        selected: Slot<Option<String>>,
    ) -> Self {
        let roster = Slot::default();
        let user_settings = Slot::new(None);
        let router = ChatBotRouter::new(roster.clone(), user_settings.clone());
        let link = spawn_supervisor(options.url, transport, router, options.retry);
        Self {
            link,
            roster,
            user_settings,
            selected,
        }
    }

    pub fn start(&self) {
        self.link.start();
    }

    pub fn close(&self) {
        self.link.shutdown();
    }

    pub fn send_command(&self, command: &BotCommand) {
        self.link.send_json(&command.to_frame());
    }

    pub fn request_settings(&self) {
        self.send_command(&BotCommand::GetSettings);
    }

    pub fn request_user_settings(&self, username: impl Into<String>) {
        self.send_command(&BotCommand::GetUserSettings {
            username: username.into(),
        });
    }

    /// Apply a chatter's settings to the local roster, then send them
    ///
    /// A blank name falls back to the selected chatter. Without either the
    /// update is dropped.
    pub fn update_settings(&self, mut settings: ChatterSettings) {
        if settings.name.trim().is_empty() {
            match self.selected.get() {
                Some(name) => settings.name = name,
                None => {
                    tracing::warn!(channel = %ChannelKind::ChatBot, "No chatter selected, settings update dropped");
                    return;
                }
            }
        }

        self.roster.update(|roster| {
            roster
                .settings
                .insert(settings.name.clone(), settings.clone());
        });
        self.send_command(&BotCommand::UpdateSettings(settings));
    }

    /// Settings of `name` in the current roster
    #[must_use]
    pub fn chatter_settings(&self, name: &str) -> Option<ChatterSettings> {
        self.roster.with(|roster| roster.settings.get(name).cloned())
    }

    #[must_use]
    pub fn roster(&self) -> &Slot<ChatterRoster> {
        &self.roster
    }

    #[must_use]
    pub fn user_settings(&self) -> &Slot<Option<UserSettings>> {
        &self.user_settings
    }

    #[must_use]
    pub fn selected_chatter(&self) -> &Slot<Option<String>> {
        &self.selected
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
