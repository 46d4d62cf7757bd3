//! Application Configuration
//!
//! Defaults, then an optional JSON file named by `DINO_CONFIG`, then
//! environment overrides. Override values that fail to parse are logged and
//! ignored.

use std::net::SocketAddr;
use std::path::Path;

use serde::{Serialize, Deserialize};
use tracing::warn;

use crate::game::config::{Pacing, SimConfig};
use crate::network::server::GatewayConfig;

/// Variable naming a JSON config file.
pub const CONFIG_PATH_VAR: &str = "DINO_CONFIG";
/// Overrides `gateway.bind_addr`.
pub const BIND_ADDR_VAR: &str = "DINO_BIND_ADDR";
/// Overrides `sim.frame_rate`.
pub const FRAME_RATE_VAR: &str = "DINO_FRAME_RATE";

/// Everything the binary needs.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Physics constants and frame rate.
    pub sim: SimConfig,
    /// Difficulty pacing for live sessions.
    pub pacing: Pacing,
    /// Store gateway.
    pub gateway: GatewayConfig,
}

/// Config loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// File that failed.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The config file is not valid JSON for [`AppConfig`].
    #[error("Invalid config in {path}: {source}")]
    Parse {
        /// File that failed.
        path: String,
        /// Underlying error.
        source: serde_json::Error,
    },
}

impl AppConfig {
    /// Load from the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Load using `env` to look up variables.
    pub fn load_with<F>(env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match env(CONFIG_PATH_VAR) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        config.apply_overrides(&env);
        config.sanitize();
        Ok(config)
    }

    /// Parse a JSON config file. Missing fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    fn apply_overrides<F>(&mut self, env: &F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = env(BIND_ADDR_VAR) {
            match raw.parse::<SocketAddr>() {
                Ok(addr) => self.gateway.bind_addr = addr,
                Err(e) => warn!("Ignoring {}={:?}: {}", BIND_ADDR_VAR, raw, e),
            }
        }

        if let Some(raw) = env(FRAME_RATE_VAR) {
            match raw.parse::<u32>() {
                Ok(rate) => self.sim.frame_rate = rate,
                Err(e) => warn!("Ignoring {}={:?}: {}", FRAME_RATE_VAR, raw, e),
            }
        }
    }

    fn sanitize(&mut self) {
        if self.sim.frame_rate == 0 {
            warn!("Frame rate 0 is invalid, using {}", crate::DEFAULT_FRAME_RATE);
            self.sim.frame_rate = crate::DEFAULT_FRAME_RATE;
        }
        if self.gateway.max_connections == 0 {
            warn!("max_connections 0 is invalid, using default");
            self.gateway.max_connections = GatewayConfig::default().max_connections;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: BTreeMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_env() {
        let config = AppConfig::load_with(env_of(&[])).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.sim.frame_rate, 60);
    }

    #[test]
    fn test_env_overrides() {
        let config = AppConfig::load_with(env_of(&[
            (BIND_ADDR_VAR, "127.0.0.1:9000"),
            (FRAME_RATE_VAR, "120"),
        ]))
        .unwrap();

        assert_eq!(config.gateway.bind_addr, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(config.sim.frame_rate, 120);
    }

    #[test]
    fn test_bad_overrides_fall_back() {
        let config = AppConfig::load_with(env_of(&[
            (BIND_ADDR_VAR, "not an address"),
            (FRAME_RATE_VAR, "0"),
        ]))
        .unwrap();

        assert_eq!(config.gateway.bind_addr, GatewayConfig::default().bind_addr);
        assert_eq!(config.sim.frame_rate, crate::DEFAULT_FRAME_RATE);
    }

    #[test]
    fn test_from_file() {
        let path = std::env::temp_dir().join(format!("dino-config-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(
            &path,
            r#"{"sim":{"gravity":1.2},"pacing":{"mode":"stages","stage_ms":5000,"speeds":[3,5],"gap":450}}"#,
        )
        .unwrap();

        let path_str = path.display().to_string();
        let config = AppConfig::load_with(env_of(&[(CONFIG_PATH_VAR, path_str.as_str())])).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.sim.gravity, 1.2);
        assert_eq!(config.sim.jump_velocity, -15.0);
        assert_eq!(
            config.pacing,
            Pacing::Stages { stage_ms: 5000.0, speeds: vec![3.0, 5.0], gap: 450.0 }
        );
    }

    #[test]
    fn test_missing_file_is_error() {
        let result = AppConfig::load_with(env_of(&[(CONFIG_PATH_VAR, "/nonexistent/dino.json")]));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
