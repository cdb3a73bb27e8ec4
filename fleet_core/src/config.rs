//! Engine tuning knobs.
//!
//! Loaded from a JSON file named by `FLEETGLASS_CONFIG_PATH`, falling back
//! to built-in defaults when unset or unreadable.

use std::{
    env, fs, io,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use thiserror::Error;

use fleet_proto::SanitizeOptions;

/// Runtime configuration for the sync engine.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Corridor half-width in meters applied when an assignment does not
    /// carry its own deviation radius.
    pub default_deviation_radius_m: f64,
    /// Charge percentage at or above which a slotted battery counts as
    /// swap-ready rather than charging.
    pub battery_ready_threshold: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_deviation_radius_m: 2000.0,
            battery_ready_threshold: 80.0,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn from_file(path: &Path) -> Result<Self, EngineConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| EngineConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = EngineConfig::from_json_str(&contents)?;
        Ok(config)
    }

    /// The subset of knobs the payload sanitizer needs.
    pub fn sanitize_options(&self) -> SanitizeOptions {
        SanitizeOptions {
            default_deviation_radius_m: self.default_deviation_radius_m,
            battery_ready_threshold: self.battery_ready_threshold,
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineConfigError {
    #[error("failed to parse engine config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read engine config from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Load engine configuration from the environment, or defaults.
pub fn load_engine_config_from_env() -> EngineConfig {
    let Some(path) = env::var("FLEETGLASS_CONFIG_PATH").ok().map(PathBuf::from) else {
        tracing::info!(target: "fleetglass::config", "engine_config.loaded=default");
        return EngineConfig::default();
    };

    match EngineConfig::from_file(&path) {
        Ok(config) => {
            tracing::info!(
                target: "fleetglass::config",
                path = %path.display(),
                "engine_config.loaded=file"
            );
            config
        }
        Err(err) => {
            tracing::warn!(
                target: "fleetglass::config",
                path = %path.display(),
                error = %err,
                "engine_config.load_failed"
            );
            EngineConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = EngineConfig::default();
        assert_eq!(config.default_deviation_radius_m, 2000.0);
        assert_eq!(config.battery_ready_threshold, 80.0);
    }

    #[test]
    fn partial_json_fills_from_defaults() {
        let config = EngineConfig::from_json_str(r#"{ "battery_ready_threshold": 90 }"#).unwrap();
        assert_eq!(config.battery_ready_threshold, 90.0);
        assert_eq!(config.default_deviation_radius_m, 2000.0);
    }

    #[test]
    fn sanitize_options_mirror_config() {
        let config = EngineConfig {
            default_deviation_radius_m: 750.0,
            battery_ready_threshold: 60.0,
        };
        let options = config.sanitize_options();
        assert_eq!(options.default_deviation_radius_m, 750.0);
        assert_eq!(options.battery_ready_threshold, 60.0);
    }
}
