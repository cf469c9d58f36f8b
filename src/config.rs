//! # Emulator Configuration
//!
//! One TOML file configures the listener host and every emulated module.
//! Every field has a default, so an empty file (or no file) is valid.
//!
//! ## Example: TOML Configuration
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//!
//! [heater_shaker]
//! port = 9003
//! serial_number = "hs_lab_2"
//!
//! [heater_shaker.temperature]
//! degrees_per_tick = 0.5
//!
//! [smoothie.left]
//! model = "p300_single_v2.0"
//! id = "P3HSV202020060308"
//! ```

// src/config.rs - Single configuration file
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::emulator::ModuleKind;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("{field} must be a positive finite rate, got {value}")]
    InvalidRate { field: &'static str, value: f64 },
}

/// Main configuration struct for the listener and every module.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub heater_shaker: HeaterShakerSettings,
    #[serde(default)]
    pub temp_deck: TempDeckSettings,
    #[serde(default)]
    pub thermocycler: ThermocyclerSettings,
    #[serde(default)]
    pub mag_deck: MagDeckSettings,
    #[serde(default)]
    pub smoothie: SmoothieSettings,
}

impl Config {
    /// Checks every simulator ramp rate. A rate that is not a positive
    /// finite number would never settle on its target.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let rates = [
            ("heater_shaker.temperature.degrees_per_tick", self.heater_shaker.temperature.degrees_per_tick),
            ("heater_shaker.rpm.rpm_per_tick", self.heater_shaker.rpm.rpm_per_tick),
            ("temp_deck.temperature.degrees_per_tick", self.temp_deck.temperature.degrees_per_tick),
            ("thermocycler.lid_temperature.degrees_per_tick", self.thermocycler.lid_temperature.degrees_per_tick),
            ("thermocycler.plate_temperature.degrees_per_tick", self.thermocycler.plate_temperature.degrees_per_tick),
        ];
        for (field, value) in rates {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::InvalidRate { field, value });
            }
        }
        Ok(())
    }

    /// TCP port the given module listens on.
    pub fn port_for(&self, kind: ModuleKind) -> u16 {
        match kind {
            ModuleKind::HeaterShaker => self.heater_shaker.port,
            ModuleKind::TempDeck => self.temp_deck.port,
            ModuleKind::Thermocycler => self.thermocycler.port,
            ModuleKind::MagDeck => self.mag_deck.port,
            ModuleKind::Smoothie => self.smoothie.port,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: default_host() }
    }
}

/// Ramp settings for a temperature simulator.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TemperatureModelSettings {
    #[serde(default = "default_degrees_per_tick")]
    pub degrees_per_tick: f64,
    #[serde(default = "default_starting_temperature")]
    pub starting: f64,
}

impl Default for TemperatureModelSettings {
    fn default() -> Self {
        Self {
            degrees_per_tick: default_degrees_per_tick(),
            starting: default_starting_temperature(),
        }
    }
}

/// Ramp settings for an rpm simulator.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RpmModelSettings {
    #[serde(default = "default_rpm_per_tick")]
    pub rpm_per_tick: f64,
    #[serde(default)]
    pub starting: f64,
}

impl Default for RpmModelSettings {
    fn default() -> Self {
        Self {
            rpm_per_tick: default_rpm_per_tick(),
            starting: 0.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HeaterShakerSettings {
    pub port: u16,
    pub serial_number: String,
    pub model: String,
    pub version: String,
    pub temperature: TemperatureModelSettings,
    pub rpm: RpmModelSettings,
}

impl Default for HeaterShakerSettings {
    fn default() -> Self {
        Self {
            port: 9003,
            serial_number: "heater_shaker_emulator".to_string(),
            model: "v01".to_string(),
            version: "v0.0.1".to_string(),
            temperature: TemperatureModelSettings::default(),
            rpm: RpmModelSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TempDeckSettings {
    pub port: u16,
    pub serial_number: String,
    pub model: String,
    pub version: String,
    pub temperature: TemperatureModelSettings,
}

impl Default for TempDeckSettings {
    fn default() -> Self {
        Self {
            port: 9998,
            serial_number: "temperature_emulator".to_string(),
            model: "temp_deck_v20".to_string(),
            version: "v2.0.1".to_string(),
            temperature: TemperatureModelSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ThermocyclerSettings {
    pub port: u16,
    pub serial_number: String,
    pub model: String,
    pub version: String,
    pub lid_temperature: TemperatureModelSettings,
    pub plate_temperature: TemperatureModelSettings,
}

impl Default for ThermocyclerSettings {
    fn default() -> Self {
        Self {
            port: 9997,
            serial_number: "thermocycler_emulator".to_string(),
            model: "v02".to_string(),
            version: "v1.1.0".to_string(),
            lid_temperature: TemperatureModelSettings::default(),
            plate_temperature: TemperatureModelSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MagDeckSettings {
    pub port: u16,
    pub serial_number: String,
    pub model: String,
    pub version: String,
    /// Plate height reported after a probe.
    pub probe_height: f64,
}

impl Default for MagDeckSettings {
    fn default() -> Self {
        Self {
            port: 9999,
            serial_number: "magnetic_emulator".to_string(),
            model: "mag_deck_v20".to_string(),
            version: "2.0.0".to_string(),
            probe_height: 45.0,
        }
    }
}

/// Contents of a pipette's onboard memory.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PipetteSettings {
    pub model: String,
    pub id: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SmoothieSettings {
    pub port: u16,
    /// Reported in the `version` response.
    pub version: String,
    pub default_speed: f64,
    pub left: PipetteSettings,
    pub right: PipetteSettings,
}

impl Default for SmoothieSettings {
    fn default() -> Self {
        Self {
            port: 9996,
            version: "EMULATOR".to_string(),
            default_speed: 400.0,
            left: PipetteSettings {
                model: "p20_single_v2.0".to_string(),
                id: "P20SV202020070101".to_string(),
            },
            right: PipetteSettings {
                model: "p300_multi_v2.0".to_string(),
                id: "P3HMV202020041605".to_string(),
            },
        }
    }
}

// Default value functions
fn default_host() -> String { "127.0.0.1".to_string() }
fn default_degrees_per_tick() -> f64 { 2.0 }
fn default_starting_temperature() -> f64 { 23.0 }
fn default_rpm_per_tick() -> f64 { 100.0 }

/// Load and validate configuration from a TOML file at the given path.
pub fn load_config(path: &str) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path).inspect_err(|e| {
        tracing::error!("Failed to read config file '{}': {}", path, e);
    })?;
    let config: Config = toml::from_str(&contents).inspect_err(|e| {
        tracing::error!("Failed to parse config TOML in '{}': {}", path, e);
    })?;
    config.validate().inspect_err(|e| {
        tracing::error!("Rejected config '{}': {}", path, e);
    })?;
    Ok(config)
}
