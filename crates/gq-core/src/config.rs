//! Engine configuration.
//!
//! TOML is the supported file source; every field also has a default, so
//! an empty/missing file still produces a usable [`Config`]. Follows the
//! same raw-then-validated split the forwarder's config loader uses: an
//! all-`Option` [`RawConfig`] layered under the fully-populated runtime
//! struct.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Fully-resolved engine configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub request_timeout_ms: u64,
    pub master_pacing_delay_ms: u64,
    pub max_datagram_bytes: usize,
    pub rcon_reassembly_timeout_ms: u64,
    pub priority_aging_ms: u64,
}

impl Config {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn master_pacing_delay(&self) -> Duration {
        Duration::from_millis(self.master_pacing_delay_ms)
    }

    pub fn rcon_reassembly_timeout(&self) -> Duration {
        Duration::from_millis(self.rcon_reassembly_timeout_ms)
    }

    pub fn priority_aging(&self) -> Duration {
        Duration::from_millis(self.priority_aging_ms)
    }

    /// Loads configuration from a TOML file, falling back to defaults for
    /// any field the file omits. A missing file is not an error: returns
    /// [`Config::default`].
    pub fn load(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Config::default());
        }
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Config, ConfigError> {
        let raw: RawConfig = toml::from_str(text).map_err(|e| ConfigError::Toml(e.to_string()))?;
        let defaults = Config::default();
        Ok(Config {
            request_timeout_ms: raw.request_timeout_ms.unwrap_or(defaults.request_timeout_ms),
            master_pacing_delay_ms: raw
                .master_pacing_delay_ms
                .unwrap_or(defaults.master_pacing_delay_ms),
            max_datagram_bytes: raw.max_datagram_bytes.unwrap_or(defaults.max_datagram_bytes),
            rcon_reassembly_timeout_ms: raw
                .rcon_reassembly_timeout_ms
                .unwrap_or(defaults.rcon_reassembly_timeout_ms),
            priority_aging_ms: raw.priority_aging_ms.unwrap_or(defaults.priority_aging_ms),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            request_timeout_ms: 3000,
            master_pacing_delay_ms: 13,
            max_datagram_bytes: 1400,
            rcon_reassembly_timeout_ms: 10_000,
            priority_aging_ms: 1000,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    request_timeout_ms: Option<u64>,
    master_pacing_delay_ms: Option<u64>,
    max_datagram_bytes: Option<usize>,
    rcon_reassembly_timeout_ms: Option<u64>,
    priority_aging_ms: Option<u64>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(String),
    #[error("failed to parse config TOML: {0}")]
    Toml(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_have_expected_values() {
        let cfg = Config::default();
        assert_eq!(cfg.request_timeout_ms, 3000);
        assert_eq!(cfg.master_pacing_delay_ms, 13);
        assert_eq!(cfg.max_datagram_bytes, 1400);
        assert_eq!(cfg.rcon_reassembly_timeout_ms, 10_000);
        assert_eq!(cfg.priority_aging_ms, 1000);
    }

    #[test]
    fn partial_toml_fills_remaining_from_defaults() {
        let cfg = Config::from_toml_str("master_pacing_delay_ms = 25\n").unwrap();
        assert_eq!(cfg.master_pacing_delay_ms, 25);
        assert_eq!(cfg.request_timeout_ms, Config::default().request_timeout_ms);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let cfg = Config::load("/nonexistent/path/gamequery.toml").unwrap();
        assert_eq!(cfg, Config::default());
    }
}
