use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::{Error, Result};

/// Runtime settings. Every field has a default, so an empty JSON object is a valid config file.
#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Name (or part of it) of the port carrying pad presses
    pub input_port: String,
    /// Port on which the device announces its own layout switches
    pub daw_input_port: String,
    pub output_port: String,
    pub storage_path: String,
    /// Pause between entering programmer mode and restoring the last page
    pub startup_delay_ms: u64,
    /// Softer presses on the page-1 icons are ignored
    pub min_velocity: u8,
    /// Milliseconds per unit of missing velocity between fader ramp steps
    pub fader_step_multiplier: u64,
    /// Period of the idle hue animation; `None` disables it
    pub color_wheel_interval_ms: Option<u64>,
    pub color_wheel_pads: Vec<u8>,
    pub share_link_prefix: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_port: "LPProMK3 MIDI".to_owned(),
            daw_input_port: "MIDIIN3 (LPProMK3 MIDI)".to_owned(),
            output_port: "LPProMK3 MIDI".to_owned(),
            storage_path: "launchpad-remote.json".to_owned(),
            startup_delay_ms: 1000,
            min_velocity: 20,
            fader_step_multiplier: 2,
            color_wheel_interval_ms: None,
            color_wheel_pads: vec![99],
            share_link_prefix: "https://song.link/i/".to_owned(),
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)
            .map_err(|e| Error::Config(format!("reading {}: {}", path.display(), e)))?;
        let config = Self::from_json(&data)?;
        log::debug!("loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_json(data: &[u8]) -> Result<Self> {
        let config: Config = serde_json::from_slice(data)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.min_velocity > 127 {
            return Err(Error::Config(format!(
                "min_velocity {} is above the MIDI range",
                self.min_velocity
            )));
        }
        if self.color_wheel_interval_ms == Some(0) {
            return Err(Error::Config("color_wheel_interval_ms must be positive".to_owned()));
        }
        Ok(())
    }

    pub fn startup_delay(&self) -> Duration {
        Duration::from_millis(self.startup_delay_ms)
    }

    pub fn color_wheel_interval(&self) -> Option<Duration> {
        self.color_wheel_interval_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_take_defaults() {
        let config = Config::from_json(br#"{"min_velocity": 30}"#).unwrap();
        assert_eq!(config.min_velocity, 30);
        assert_eq!(config.fader_step_multiplier, 2);
        assert_eq!(config.color_wheel_pads, vec![99]);
        assert_eq!(Config::from_json(b"{}").unwrap(), Config::default());
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(matches!(
            Config::from_json(br#"{"min_velocity": 200}"#),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Config::from_json(br#"{"color_wheel_interval_ms": 0}"#),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Config::from_json(b"[1, 2]"),
            Err(Error::Serialization(_))
        ));
    }
}
