//! The runtime's configuration document.
//!
//! The wire format (originally XML, parsed against a fixed-path convention)
//! is out of scope; what the runtime needs is *a* deserializable tree with a
//! logging attribute at the root and a per-net sub-tree. `toml` plays that
//! role here, following the same `serde` + `toml` pairing used elsewhere in
//! this codebase's neighborhood for configuration.

use crate::error::ConfigError;
use serde::Deserialize;
use smx_logging::LoggingConfig;
use std::collections::HashMap;
use std::path::Path;

/// The root configuration document.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub net: HashMap<String, NetConfig>,
}

impl Config {
    /// Reads and parses a configuration document from `path`.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(toml::from_str(&text)?)
    }

    /// The sub-tree for a given net, or a permissive default if the
    /// document doesn't mention it.
    pub fn net_config(&self, name: &str) -> NetConfig {
        self.net.get(name).cloned().unwrap_or_default()
    }
}

/// A single net's configuration sub-tree.
///
/// Attributes beyond `profiler` are passed opaquely to box code via `extra`.
#[derive(Debug, Clone, Deserialize)]
pub struct NetConfig {
    #[serde(default = "default_profiler")]
    pub profiler: String,
    #[serde(flatten)]
    pub extra: toml::value::Table,
}

fn default_profiler() -> String {
    "on".to_string()
}

impl Default for NetConfig {
    fn default() -> Self {
        NetConfig {
            profiler: default_profiler(),
            extra: toml::value::Table::new(),
        }
    }
}

impl NetConfig {
    /// Whether this net's profiler port should stay live. `"off"` and `"0"`
    /// disable it; anything else (including an absent attribute) leaves it
    /// enabled.
    pub fn profiler_enabled(&self) -> bool {
        !matches!(self.profiler.as_str(), "off" | "0")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profiler_defaults_to_enabled() {
        assert!(NetConfig::default().profiler_enabled());
    }

    #[test]
    fn profiler_off_and_zero_disable() {
        let mut net = NetConfig::default();
        net.profiler = "off".to_string();
        assert!(!net.profiler_enabled());
        net.profiler = "0".to_string();
        assert!(!net.profiler_enabled());
    }

    #[test]
    fn parses_logging_and_net_sections() {
        let toml_text = r#"
            [logging]
            level = "debug"

            [net.sensor]
            profiler = "off"
            rate_hz = 100
        "#;
        let config: Config = toml::from_str(toml_text).unwrap();
        assert_eq!(config.logging.level, "debug");
        let sensor = config.net_config("sensor");
        assert!(!sensor.profiler_enabled());
        assert_eq!(sensor.extra.get("rate_hz").and_then(|v| v.as_integer()), Some(100));
    }

    #[test]
    fn unknown_net_gets_permissive_default() {
        let config = Config::default();
        assert!(config.net_config("anything").profiler_enabled());
    }
}
