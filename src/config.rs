use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::board::RELAY_CHANNELS;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("parsing TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(&'static str),
}

/// Injected board configuration. Defaults match the stock rig wiring.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BoardConfig {
    pub baud: u32,
    pub direction_pin: u8,
    pub step_pin: u8,
    pub hv_pin: u8,
    /// Output pin for each relay channel, indexed by channel.
    pub relay_pins: [u8; RELAY_CHANNELS],
    pub speed_max: u8,
    /// Echo every accepted inbound message after its reply.
    pub debug_echo: bool,
    /// DATA_UPDATE period while a test runs; 0 disables it.
    pub telemetry_interval_ms: u64,
    /// Silence after which a half-received frame is reported as truncated.
    pub frame_timeout_ms: u64,
    /// Silence after which the session is treated as lost; 0 disables it.
    pub inactive_timeout_ms: u64,
    /// Drop HV, open relays and halt the motor on STOP.
    pub safe_stop: bool,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            baud: 115_200,
            direction_pin: 9,
            step_pin: 10,
            hv_pin: 3,
            relay_pins: [2, 4, 5, 6, 7, 8, 12, 13],
            speed_max: 100,
            debug_echo: false,
            telemetry_interval_ms: 500,
            frame_timeout_ms: 50,
            inactive_timeout_ms: 0,
            safe_stop: true,
        }
    }
}

impl BoardConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let cfg: BoardConfig = toml::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.speed_max == 0 {
            return Err(ConfigError::Invalid("speed_max must be at least 1"));
        }
        if self.baud == 0 {
            return Err(ConfigError::Invalid("baud must be non-zero"));
        }
        let mut seen = Vec::with_capacity(RELAY_CHANNELS + 3);
        for pin in self
            .relay_pins
            .iter()
            .chain([&self.direction_pin, &self.step_pin, &self.hv_pin])
        {
            if seen.contains(pin) {
                return Err(ConfigError::Invalid("pin assigned twice"));
            }
            seen.push(*pin);
        }
        Ok(())
    }

    pub fn telemetry_interval(&self) -> Option<Duration> {
        millis(self.telemetry_interval_ms)
    }

    pub fn frame_timeout(&self) -> Duration {
        Duration::from_millis(self.frame_timeout_ms)
    }

    pub fn inactive_timeout(&self) -> Option<Duration> {
        millis(self.inactive_timeout_ms)
    }
}

fn millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}
