//! Client configuration structs
//!
//! Loads configuration from environment variables (and a `.env` file when present).

use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Main client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    pub app: AppSettings,
    pub endpoint: EndpointConfig,
    pub reconnect: ReconnectConfig,
    pub audio: AudioConfig,
    pub overlay: OverlayConfig,
    pub obs: ObsConfig,
    pub storage: StorageConfig,
}

/// General application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_env")]
    pub env: Environment,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

/// Where the panel backend terminates the channel sockets
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Use `wss` instead of `ws`
    #[serde(default)]
    pub secure: bool,
}

impl EndpointConfig {
    /// Socket scheme, upgraded to the secure variant when configured
    #[must_use]
    pub fn scheme(&self) -> &'static str {
        if self.secure {
            "wss"
        } else {
            "ws"
        }
    }

    /// URL of a backend channel: `scheme://host:port/websockets/<channel>`
    #[must_use]
    pub fn channel_url(&self, channel: &str) -> String {
        format!(
            "{}://{}:{}/websockets/{}",
            self.scheme(),
            self.host,
            self.port,
            channel.trim_start_matches('/')
        )
    }
}

/// Reconnect backoff configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
}

impl ReconnectConfig {
    #[must_use]
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
        }
    }
}

/// Audio deck channel settings
#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    /// Page path announced in the `connect` handshake
    #[serde(default = "default_audio_page_path")]
    pub page_path: String,
}

/// Overlay channel settings
#[derive(Debug, Clone, Deserialize)]
pub struct OverlayConfig {
    /// Client role announced in the handshake (`control_panel` or `overlay`)
    #[serde(default = "default_overlay_role")]
    pub role: String,
}

/// External broadcast-software RPC socket settings
#[derive(Debug, Clone, Deserialize)]
pub struct ObsConfig {
    /// Socket URL; the RPC channel is disabled when unset
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_rpc_version")]
    pub rpc_version: u32,
}

/// Local snapshot storage
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_snapshot_dir")]
    pub snapshot_dir: PathBuf,
}

// Default value functions
fn default_app_name() -> String {
    "panel-link".to_string()
}

fn default_env() -> Environment {
    Environment::Development
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    8100
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_audio_page_path() -> String {
    "/audio_channels".to_string()
}

fn default_overlay_role() -> String {
    "control_panel".to_string()
}

fn default_rpc_version() -> u32 {
    1
}

fn default_snapshot_dir() -> PathBuf {
    PathBuf::from(".panel-state")
}

const OVERLAY_ROLES: &[&str] = &["control_panel", "overlay"];

impl ClientConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if a variable is set to a value that cannot be parsed
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let overlay_role = lookup("OVERLAY_ROLE").unwrap_or_else(default_overlay_role);
        if !OVERLAY_ROLES.contains(&overlay_role.as_str()) {
            return Err(ConfigError::InvalidValue("OVERLAY_ROLE", overlay_role));
        }

        Ok(Self {
            app: AppSettings {
                name: lookup("APP_NAME").unwrap_or_else(default_app_name),
                env: lookup("APP_ENV")
                    .and_then(|s| match s.to_lowercase().as_str() {
                        "production" => Some(Environment::Production),
                        "staging" => Some(Environment::Staging),
                        "development" => Some(Environment::Development),
                        _ => None,
                    })
                    .unwrap_or_default(),
            },
            endpoint: EndpointConfig {
                host: lookup("PANEL_HOST").unwrap_or_else(default_host),
                port: parse_var(&lookup, "PANEL_PORT")?.unwrap_or_else(default_port),
                secure: parse_var(&lookup, "PANEL_SECURE")?.unwrap_or(false),
            },
            reconnect: ReconnectConfig {
                max_attempts: parse_var(&lookup, "RECONNECT_MAX_ATTEMPTS")?
                    .unwrap_or_else(default_max_attempts),
                initial_delay_ms: parse_var(&lookup, "RECONNECT_INITIAL_DELAY_MS")?
                    .unwrap_or_else(default_initial_delay_ms),
            },
            audio: AudioConfig {
                page_path: lookup("AUDIO_PAGE_PATH").unwrap_or_else(default_audio_page_path),
            },
            overlay: OverlayConfig { role: overlay_role },
            obs: ObsConfig {
                url: lookup("OBS_URL").filter(|s| !s.trim().is_empty()),
                password: lookup("OBS_PASSWORD").filter(|s| !s.is_empty()),
                rpc_version: parse_var(&lookup, "OBS_RPC_VERSION")?
                    .unwrap_or_else(default_rpc_version),
            },
            storage: StorageConfig {
                snapshot_dir: lookup("SNAPSHOT_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(default_snapshot_dir),
            },
        })
    }
}

/// Parse an optional variable, rejecting values that are set but malformed
fn parse_var<F, T>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue(key, raw)),
        None => Ok(None),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
