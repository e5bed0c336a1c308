//! # warden-config
//!
//! Configuration for the mediation layer — `warden.toml` schema,
//! defaults, validation, and a loader with env-var overrides.

pub mod loader;
pub mod schema;

pub use loader::ConfigLoader;
pub use schema::{
    AssistantConfig, AutonomyConfig, IpcConfig, LoggingConfig, StoreConfig, WardenConfig,
};
