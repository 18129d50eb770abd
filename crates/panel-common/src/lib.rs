//! # panel-common
//!
//! Shared utilities for the panel link clients: configuration, error handling, and telemetry.

pub mod config;
pub mod error;
pub mod telemetry;

// Re-export commonly used types at crate root
pub use config::{
    AppSettings, AudioConfig, ClientConfig, ConfigError, EndpointConfig, Environment, ObsConfig,
    OverlayConfig, ReconnectConfig, StorageConfig,
};
pub use error::{AppError, AppResult};
pub use telemetry::{
    init_tracing, init_tracing_with_config, try_init_tracing, try_init_tracing_with_config,
    TracingConfig, TracingError,
};
