//! Configuration structs

mod client_config;

pub use client_config::{
    AppSettings, AudioConfig, ClientConfig, ConfigError, EndpointConfig, Environment, ObsConfig,
    OverlayConfig, ReconnectConfig, StorageConfig,
};
