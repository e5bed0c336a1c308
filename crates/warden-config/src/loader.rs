use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::schema::WardenConfig;
use warden_core::{Result, WardenError};

/// Loads the Warden configuration from disk with env overrides.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Resolve the config path: explicit path > WARDEN_CONFIG env >
    /// ~/.warden/warden.toml
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(p) = explicit {
            return p.to_path_buf();
        }
        if let Ok(p) = std::env::var("WARDEN_CONFIG") {
            return PathBuf::from(p);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".warden")
            .join("warden.toml")
    }

    /// Load the config from disk, falling back to defaults when the
    /// file does not exist.
    pub fn load(path: Option<&Path>) -> Result<WardenConfig> {
        let config_path = Self::resolve_path(path);
        let config = if config_path.exists() {
            info!(?config_path, "loading configuration");
            let raw = std::fs::read_to_string(&config_path)?;
            toml::from_str::<WardenConfig>(&raw).map_err(|e| {
                WardenError::Config(format!("failed to parse {}: {}", config_path.display(), e))
            })?
        } else {
            warn!(?config_path, "config file not found, using defaults");
            WardenConfig::default()
        };

        let config = Self::apply_env_overrides(config);

        match config.validate() {
            Ok(warnings) => {
                for w in &warnings {
                    warn!("{}", w);
                }
            }
            Err(e) => return Err(WardenError::Config(e)),
        }

        Ok(config)
    }

    /// Apply env var overrides (WARDEN_DEFAULT_TIER, WARDEN_IPC_LISTEN, ...)
    fn apply_env_overrides(mut config: WardenConfig) -> WardenConfig {
        if let Ok(v) = std::env::var("WARDEN_DEFAULT_TIER") {
            match v.parse() {
                Ok(tier) => config.autonomy.default_tier = tier,
                Err(_) => warn!(value = %v, "ignoring invalid WARDEN_DEFAULT_TIER"),
            }
        }
        if let Ok(v) = std::env::var("WARDEN_IPC_LISTEN") {
            config.ipc.listen = v;
        }
        if let Ok(v) = std::env::var("WARDEN_LOG_LEVEL") {
            config.logging.level = v;
        }
        if let Ok(v) = std::env::var("WARDEN_ASSISTANT_NAME") {
            config.assistant.name = v;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_path_wins() {
        let p = Path::new("/tmp/warden-test.toml");
        assert_eq!(ConfigLoader::resolve_path(Some(p)), p);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigLoader::load(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config.ipc.request_timeout_secs, 30);
    }

    #[test]
    fn file_values_are_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("warden.toml");
        std::fs::write(
            &path,
            r#"
            [assistant]
            name = "Marlowe"

            [ipc]
            listen = "127.0.0.1:7777"
            "#,
        )
        .unwrap();
        let config = ConfigLoader::load(Some(&path)).unwrap();
        assert_eq!(config.assistant.name, "Marlowe");
        assert_eq!(config.ipc.listen, "127.0.0.1:7777");
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("warden.toml");
        std::fs::write(&path, "not = [valid").unwrap();
        assert!(ConfigLoader::load(Some(&path)).is_err());
    }
}
