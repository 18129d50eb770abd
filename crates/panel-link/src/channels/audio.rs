//! Audio deck channel
//!
//! Mirrors now-playing, queue and autoplay state for both decks and forwards
//! transport commands to the player backend.

use super::{lenient, ChannelOptions};
use crate::connection::{spawn_supervisor, ChannelPolicy, ConnectionStatus, SupervisorHandle};
use crate::error::ProtocolParseError;
use crate::protocol::{ChannelKind, DeckId, EventFrame, HandshakePayload};
use crate::router::{parse_object, ChannelRouter, Inbound};
use crate::store::Slot;
use crate::transport::Transport;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;

/// Track currently loaded on a deck
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NowPlaying {
    #[serde(default, deserialize_with = "lenient::null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient::null_as_default")]
    pub artist: String,
    /// Seconds into the track; the player sometimes sends it as a string
    #[serde(default, deserialize_with = "lenient::number")]
    pub position: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    #[serde(default, deserialize_with = "lenient::null_as_default")]
    pub title: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeckState {
    pub now_playing: Option<NowPlaying>,
    pub queue: Vec<QueueItem>,
    /// Autoplay was acknowledged by the player
    pub autoplay_engaged: bool,
    /// `None` until the player reports it
    pub playing: Option<bool>,
}

impl DeckState {
    fn merge(&mut self, patch: DeckPatch) {
        if let Some(now_playing) = patch.now_playing {
            self.now_playing = Some(now_playing);
        }
        if let Some(queue) = patch.queue {
            self.queue = queue;
        }
        if let Some(playing) = patch.playing {
            self.playing = Some(playing);
        }
    }
}

/// Both decks, keyed by [`DeckId`]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AudioDecks {
    #[serde(rename = "channel-1")]
    pub one: DeckState,
    #[serde(rename = "channel-2")]
    pub two: DeckState,
}

impl AudioDecks {
    #[must_use]
    pub fn deck(&self, id: DeckId) -> &DeckState {
        match id {
            DeckId::One => &self.one,
            DeckId::Two => &self.two,
        }
    }

    pub fn deck_mut(&mut self, id: DeckId) -> &mut DeckState {
        match id {
            DeckId::One => &mut self.one,
            DeckId::Two => &mut self.two,
        }
    }
}

/// Fields a status frame carries for one deck; absent fields are left alone
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeckPatch {
    pub now_playing: Option<NowPlaying>,
    pub queue: Option<Vec<QueueItem>>,
    pub playing: Option<bool>,
}

impl DeckPatch {
    fn from_value(value: &Value) -> Result<Self, ProtocolParseError> {
        let Some(fields) = value.as_object() else {
            return Ok(Self::default());
        };

        // `current_audio` is an empty string while nothing is loaded
        let now_playing = match fields.get("current_audio") {
            Some(current @ Value::Object(_)) => Some(
                NowPlaying::deserialize(current)
                    .map_err(|e| ProtocolParseError::invalid_payload("current_audio", e))?,
            ),
            _ => None,
        };
        let queue = match fields.get("queue") {
            Some(queue @ Value::Array(_)) => Some(
                Vec::<QueueItem>::deserialize(queue)
                    .map_err(|e| ProtocolParseError::invalid_payload("queue", e))?,
            ),
            _ => None,
        };

        Ok(Self {
            now_playing,
            queue,
            playing: fields.get("is_playing").and_then(lenient::flag_from),
        })
    }
}

/// Player control verbs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioControl {
    Play,
    Pause,
    Skip,
    AutoPlay,
}

impl AudioControl {
    /// Wire name used when sending the command
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Play => "play",
            Self::Pause => "pause",
            Self::Skip => "skip",
            Self::AutoPlay => "auto_play",
        }
    }

    /// Parse the command named in an acknowledgment
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "play" => Some(Self::Play),
            "pause" => Some(Self::Pause),
            "skip" => Some(Self::Skip),
            "autoplay" | "auto_play" => Some(Self::AutoPlay),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioEffect {
    FadeIn,
    FadeOut,
}

impl AudioEffect {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FadeIn => "fade_in",
            Self::FadeOut => "fade_out",
        }
    }
}

/// Commands understood by the player backend
#[derive(Debug, Clone, PartialEq)]
pub enum AudioCommand {
    Control { deck: DeckId, control: AudioControl },
    Volume { deck: DeckId, value: f64 },
    Effect {
        deck: DeckId,
        effect: AudioEffect,
        enabled: bool,
    },
    ReloadOnFinish(bool),
    PlayerHidden(bool),
    /// Ask the player to push its full status
    InfoRequest,
}

impl AudioCommand {
    #[must_use]
    pub fn play(deck: DeckId) -> Self {
        Self::Control {
            deck,
            control: AudioControl::Play,
        }
    }

    #[must_use]
    pub fn pause(deck: DeckId) -> Self {
        Self::Control {
            deck,
            control: AudioControl::Pause,
        }
    }

    #[must_use]
    pub fn skip(deck: DeckId) -> Self {
        Self::Control {
            deck,
            control: AudioControl::Skip,
        }
    }

    #[must_use]
    pub fn auto_play(deck: DeckId) -> Self {
        Self::Control {
            deck,
            control: AudioControl::AutoPlay,
        }
    }

    #[must_use]
    pub fn to_frame(&self) -> EventFrame {
        match self {
            Self::Control { deck, control } => EventFrame::event("audio_control")
                .with_data(Value::String(control.as_str().to_string()))
                .with_channel(deck.as_str()),
            Self::Volume { deck, value } => EventFrame::event("audio_control")
                .with_kind("volume")
                .with_data(json!({ "value": value, "channel": deck.as_str() })),
            Self::Effect {
                deck,
                effect,
                enabled,
            } => EventFrame::event("effects").with_data(json!({
                "effect": effect.as_str(),
                "state": enabled,
                "channel": deck.as_str(),
            })),
            Self::ReloadOnFinish(value) => {
                EventFrame::typed("reload_on_finish").with_data(json!({ "value": value }))
            }
            Self::PlayerHidden(hidden) => {
                EventFrame::typed("player_hidden").with_value(Value::Bool(*hidden))
            }
            Self::InfoRequest => EventFrame::event("info_request"),
        }
    }
}

/// Decoded inbound audio frame
#[derive(Debug, Clone, PartialEq)]
pub enum AudioUpdate {
    Decks(Vec<(DeckId, DeckPatch)>),
    /// Player acknowledged a control command
    Control {
        control: AudioControl,
        deck: Option<DeckId>,
    },
}

pub struct AudioRouter {
    page_path: String,
    decks: Slot<AudioDecks>,
}

impl AudioRouter {
    pub fn new(page_path: impl Into<String>, decks: Slot<AudioDecks>) -> Self {
        Self {
            page_path: page_path.into(),
            decks,
        }
    }

    fn classify_control(map: &Map<String, Value>) -> Result<AudioUpdate, ProtocolParseError> {
        let data = map.get("data");
        let command = match data {
            Some(Value::String(command)) => Some(command.as_str()),
            Some(Value::Object(fields)) => fields.get("command").and_then(Value::as_str),
            _ => None,
        }
        .ok_or_else(|| ProtocolParseError::invalid_payload("audio_control", "missing command"))?;

        let control = AudioControl::parse(command).ok_or_else(|| {
            ProtocolParseError::UnknownDiscriminant(format!("audio_control {command}"))
        })?;

        let channel = data
            .and_then(|d| d.get("channel"))
            .or_else(|| map.get("channel"))
            .and_then(Value::as_str);

        Ok(AudioUpdate::Control {
            control,
            deck: channel.and_then(DeckId::parse),
        })
    }
}

impl ChannelRouter for AudioRouter {
    type Message = AudioUpdate;

    fn channel(&self) -> ChannelKind {
        ChannelKind::Audio
    }

    fn policy(&self) -> ChannelPolicy {
        ChannelPolicy::FIRE_AND_FORGET
    }

    fn handshake(&self) -> HandshakePayload {
        HandshakePayload::AudioConnect {
            page_path: self.page_path.clone(),
        }
    }

    fn initial_requests(&self) -> Vec<String> {
        AudioCommand::InfoRequest.to_frame().to_json().into_iter().collect()
    }

    fn classify(&self, frame: &str) -> Result<Inbound<AudioUpdate>, ProtocolParseError> {
        let map = parse_object(frame)?;
        let event = map.get("event").and_then(Value::as_str);

        match event {
            Some("audio_control") => return Self::classify_control(&map).map(Inbound::Message),
            Some("audio_state_updated") => return Ok(Inbound::Ignored("audio_state_updated")),
            _ => {}
        }

        // Status pushes arrive with or without an event tag
        if let Some(Value::Object(data)) = map.get("data") {
            let mut patches = Vec::new();
            let mut unreadable = None;
            for id in DeckId::ALL {
                let Some(value) = data.get(id.as_str()) else {
                    continue;
                };
                match DeckPatch::from_value(value) {
                    Ok(patch) => patches.push((id, patch)),
                    Err(e) => {
                        tracing::warn!(
                            channel = %ChannelKind::Audio,
                            deck = id.as_str(),
                            error = %e,
                            "Skipping unreadable deck status"
                        );
                        unreadable.get_or_insert(e);
                    }
                }
            }
            if !patches.is_empty() {
                return Ok(Inbound::Message(AudioUpdate::Decks(patches)));
            }
            if let Some(e) = unreadable {
                return Err(e);
            }
        }

        Err(ProtocolParseError::UnknownDiscriminant(
            event.unwrap_or("missing event").to_string(),
        ))
    }

    fn apply(&mut self, update: AudioUpdate) {
        match update {
            AudioUpdate::Decks(patches) => self.decks.update(|decks| {
                for (id, patch) in patches {
                    decks.deck_mut(id).merge(patch);
                }
            }),
            AudioUpdate::Control {
                control,
                deck: Some(deck),
            } => self.decks.update(|decks| {
                let state = decks.deck_mut(deck);
                match control {
                    AudioControl::AutoPlay => state.autoplay_engaged = true,
                    AudioControl::Play => state.playing = Some(true),
                    AudioControl::Pause => state.playing = Some(false),
                    AudioControl::Skip => {}
                }
            }),
            AudioUpdate::Control {
                control,
                deck: None,
            } => {
                tracing::debug!(control = control.as_str(), "Control acknowledgment without deck");
            }
        }
    }
}

/// Client for the `audio` channel
#[derive(Debug, Clone)]
pub struct AudioClient {
    link: SupervisorHandle,
    decks: Slot<AudioDecks>,
}

impl AudioClient {
    /// Spawn the channel's supervisor; call [`start`](Self::start) to connect
    pub fn spawn(
        options: ChannelOptions,
        transport: Arc<dyn Transport>,
        page_path: impl Into<String>,
    ) -> Self {
        let decks = Slot::default();
        let router = AudioRouter::new(page_path, decks.clone());
        let link = spawn_supervisor(options.url, transport, router, options.retry);
        Self { link, decks }
    }

    pub fn start(&self) {
        self.link.start();
    }

    pub fn close(&self) {
        self.link.shutdown();
    }

    /// Dropped with a warning unless connected
    pub fn send_command(&self, command: &AudioCommand) {
        self.link.send_json(&command.to_frame());
    }

    #[must_use]
    pub fn decks(&self) -> &Slot<AudioDecks> {
        &self.decks
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
