//! Overlay settings channel

use super::ChannelOptions;
use crate::connection::{spawn_supervisor, ChannelPolicy, ConnectionStatus, SupervisorHandle};
use crate::error::ProtocolParseError;
use crate::protocol::{ChannelKind, ClientRole, EventFrame, HandshakePayload};
use crate::router::{parse_object, ChannelRouter, Inbound};
use crate::store::{load_json, save_json, Slot, SnapshotStore, CONTROL_PANEL_SETTINGS_KEY};
use crate::transport::Transport;
use panel_common::AppResult;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Particle overlay parameters, as pushed by the control panel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ControlPanelSettings {
    pub particle_count: f64,
    pub particle_speed: f64,
    pub base_size: f64,
    pub base_hue: f64,
    pub number_of_stars: f64,
    pub black_particles: bool,
    pub black_stars: bool,
    pub trail_length: f64,
    pub rotation_speed: f64,
    pub star_speed: f64,
    pub star_size: f64,
    pub star_offset: f64,
    pub wander_strength: f64,
    pub collision_force: f64,
    pub trail_color: f64,
}

impl Default for ControlPanelSettings {
    fn default() -> Self {
        Self {
            particle_count: 50.0,
            particle_speed: 0.8,
            base_size: 15.0,
            base_hue: 180.0,
            number_of_stars: 3.0,
            black_particles: false,
            black_stars: false,
            trail_length: 5.0,
            rotation_speed: 0.03,
            star_speed: 0.02,
            star_size: 0.2,
            star_offset: 1.02,
            wander_strength: 0.1,
            collision_force: 0.5,
            trail_color: 0.0,
        }
    }
}

impl ControlPanelSettings {
    /// Wire names of every field
    pub const FIELDS: [&'static str; 15] = [
        "particleCount",
        "particleSpeed",
        "baseSize",
        "baseHue",
        "numberOfStars",
        "blackParticles",
        "blackStars",
        "trailLength",
        "rotationSpeed",
        "starSpeed",
        "starSize",
        "starOffset",
        "wanderStrength",
        "collisionForce",
        "trailColor",
    ];

    fn from_object(fields: &Map<String, Value>) -> Result<Self, ProtocolParseError> {
        if !Self::FIELDS.iter().any(|key| fields.contains_key(*key)) {
            return Err(ProtocolParseError::UnknownDiscriminant(
                "no settings fields".to_string(),
            ));
        }
        Self::deserialize(Value::Object(fields.clone()))
            .map_err(|e| ProtocolParseError::invalid_payload("ControlPanelSettings", e))
    }

    /// Frame the control panel sends to update the overlay
    #[must_use]
    pub fn to_frame(&self) -> EventFrame {
        let data = serde_json::to_value(self).unwrap_or(Value::Null);
        EventFrame {
            client: Some(ClientRole::ControlPanel.as_str().to_string()),
            data: Some(data),
            ..EventFrame::default()
        }
    }
}

pub struct OverlayRouter {
    role: ClientRole,
    settings: Slot<Option<ControlPanelSettings>>,
}

impl OverlayRouter {
    pub fn new(role: ClientRole, settings: Slot<Option<ControlPanelSettings>>) -> Self {
        Self { role, settings }
    }
}

impl ChannelRouter for OverlayRouter {
    type Message = ControlPanelSettings;

    fn channel(&self) -> ChannelKind {
        ChannelKind::Overlay
    }

    fn policy(&self) -> ChannelPolicy {
        ChannelPolicy::FIRE_AND_FORGET
    }

    fn handshake(&self) -> HandshakePayload {
        HandshakePayload::OverlayConnect { role: self.role }
    }

    fn classify(&self, frame: &str) -> Result<Inbound<ControlPanelSettings>, ProtocolParseError> {
        let map = parse_object(frame)?;

        // A relayed control panel update wraps the settings in `data`
        if map.contains_key("client") {
            return match map.get("data") {
                Some(Value::Object(fields)) => {
                    ControlPanelSettings::from_object(fields).map(Inbound::Message)
                }
                _ => Err(ProtocolParseError::invalid_payload(
                    "overlay update",
                    "missing settings object",
                )),
            };
        }

        ControlPanelSettings::from_object(&map).map(Inbound::Message)
    }

    fn apply(&mut self, settings: ControlPanelSettings) {
        self.settings.set(Some(settings));
    }
}

/// Client for the `overlay` channel
#[derive(Clone)]
pub struct OverlayClient {
    link: SupervisorHandle,
    settings: Slot<Option<ControlPanelSettings>>,
    store: Arc<dyn SnapshotStore>,
}

impl std::fmt::Debug for OverlayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayClient")
            .field("link", &self.link)
            .field("settings", &self.settings)
            .finish()
    }
}

impl OverlayClient {
    pub fn spawn(
        options: ChannelOptions,
        transport: Arc<dyn Transport>,
        role: ClientRole,
        store: Arc<dyn SnapshotStore>,
    ) -> Self {
        let settings = Slot::new(None);
        let router = OverlayRouter::new(role, settings.clone());
        let link = spawn_supervisor(options.url, transport, router, options.retry);
        Self {
            link,
            settings,
            store,
        }
    }

    pub fn start(&self) {
        self.link.start();
    }

    pub fn close(&self) {
        self.link.shutdown();
    }

    /// Load the saved settings into the slot
    ///
    /// Returns what was restored; the slot is left untouched when nothing was saved.
    pub async fn restore_settings(&self) -> AppResult<Option<ControlPanelSettings>> {
        let restored: Option<ControlPanelSettings> =
            load_json(self.store.as_ref(), CONTROL_PANEL_SETTINGS_KEY).await?;
        if let Some(settings) = &restored {
            tracing::debug!(channel = %ChannelKind::Overlay, "Restored control panel settings");
            self.settings.set(Some(settings.clone()));
        }
        Ok(restored)
    }

    /// Persist, apply locally, then send to the server
    ///
    /// The local update and the send happen even when persisting fails; the
    /// persistence error is returned afterwards.
    pub async fn send_settings(&self, settings: ControlPanelSettings) -> AppResult<()> {
        let saved = save_json(self.store.as_ref(), CONTROL_PANEL_SETTINGS_KEY, &settings).await;
        if let Err(e) = &saved {
            tracing::warn!(channel = %ChannelKind::Overlay, error = %e, "Failed to persist settings");
        }

        self.link.send_json(&settings.to_frame());
        self.settings.set(Some(settings));
        saved
    }

    #[must_use]
    pub fn settings(&self) -> &Slot<Option<ControlPanelSettings>> {
        &self.settings
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
