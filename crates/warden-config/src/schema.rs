use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use warden_core::AutonomyTier;

/// Root configuration — maps to `warden.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WardenConfig {
    pub assistant: AssistantConfig,
    pub autonomy: AutonomyConfig,
    pub ipc: IpcConfig,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
}

// ── Assistant ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// Display name used in escalation prompts, so suggestions read
    /// as coming from the user's named assistant.
    pub name: String,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            name: "Your assistant".into(),
        }
    }
}

// ── Autonomy ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutonomyConfig {
    /// Tier applied to any domain without a persisted override.
    pub default_tier: AutonomyTier,
}

impl Default for AutonomyConfig {
    fn default() -> Self {
        Self {
            default_tier: AutonomyTier::Guardian,
        }
    }
}

// ── IPC ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IpcConfig {
    /// Gateway listen address, host:port.
    pub listen: String,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Path to the hex-encoded 32-byte signing key. When unset the
    /// `WARDEN_SIGNING_KEY` env var supplies the key.
    pub signing_key_path: Option<PathBuf>,
}

impl Default for IpcConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:9470".into(),
            request_timeout_secs: 30,
            signing_key_path: None,
        }
    }
}

// ── Store ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite database path. Defaults under the warden home dir.
    pub path: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { path: None }
    }
}

impl StoreConfig {
    /// Resolved database path: explicit > ~/.warden/warden.db.
    pub fn resolved_path(&self) -> PathBuf {
        if let Some(p) = &self.path {
            return p.clone();
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".warden")
            .join("warden.db")
    }
}

// ── Logging ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Tracing filter, e.g. "info" or "warden_ipc=debug,info".
    pub level: String,
    /// "text" or "json".
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl WardenConfig {
    /// Validate the config. Returns warnings for odd-but-usable
    /// values; errors abort startup.
    pub fn validate(&self) -> Result<Vec<String>, String> {
        let mut warnings = Vec::new();

        if self.assistant.name.trim().is_empty() {
            return Err("assistant.name must not be empty".into());
        }
        if self.ipc.request_timeout_secs == 0 {
            return Err("ipc.request_timeout_secs must be at least 1".into());
        }
        if self.ipc.request_timeout_secs > 300 {
            warnings.push(format!(
                "ipc.request_timeout_secs = {} is unusually long",
                self.ipc.request_timeout_secs
            ));
        }
        if self.logging.format != "text" && self.logging.format != "json" {
            return Err(format!(
                "logging.format must be \"text\" or \"json\", got {:?}",
                self.logging.format
            ));
        }

        Ok(warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = WardenConfig::default();
        assert!(config.validate().unwrap().is_empty());
        assert_eq!(config.autonomy.default_tier, AutonomyTier::Guardian);
        assert_eq!(config.ipc.request_timeout_secs, 30);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: WardenConfig = toml::from_str(
            r#"
            [assistant]
            name = "Ada"

            [autonomy]
            default_tier = "partner"
            "#,
        )
        .unwrap();
        assert_eq!(config.assistant.name, "Ada");
        assert_eq!(config.autonomy.default_tier, AutonomyTier::Partner);
        assert_eq!(config.ipc.listen, "127.0.0.1:9470");
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut config = WardenConfig::default();
        config.ipc.request_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn long_timeout_only_warns() {
        let mut config = WardenConfig::default();
        config.ipc.request_timeout_secs = 600;
        assert_eq!(config.validate().unwrap().len(), 1);
    }
}
