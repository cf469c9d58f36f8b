//! Per-device GCODE emulators.
//!
//! Each emulator owns its simulated state and a closed set of supported
//! GCODEs. A raw line goes in, the exact firmware response (before wire
//! framing) comes out.

pub mod heater_shaker;
pub mod mag_deck;
pub mod smoothie;
pub mod temp_deck;
pub mod thermocycler;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Config;
use crate::gcode::{parse_line, Command, ParamValue, ParseError};

pub use heater_shaker::{HeaterShakerEmulator, LatchStatus};
pub use mag_deck::MagDeckEmulator;
pub use smoothie::SmoothieEmulator;
pub use temp_deck::TempDeckEmulator;
pub use thermocycler::{LidStatus, ThermocyclerEmulator};

/// Line terminator used unless a device overrides it.
pub const DEFAULT_TERMINATOR: &[u8] = b"\r\n\r\n";
/// Acknowledgement written after every handled line unless a device overrides it.
pub const DEFAULT_ACK: &[u8] = b"ok\r\nok\r\n";

#[derive(Debug, Error)]
pub enum EmulatorError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("{gcode}: missing required parameter '{letter}'")]
    MissingParameter { gcode: String, letter: char },
    #[error("{gcode}: parameter '{letter}' must be a number")]
    InvalidParameter { gcode: String, letter: char },
    #[error("{gcode}: malformed payload '{body}'")]
    MalformedPayload { gcode: String, body: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ModuleKind {
    HeaterShaker,
    TempDeck,
    Thermocycler,
    MagDeck,
    Smoothie,
}

impl ModuleKind {
    pub const ALL: [ModuleKind; 5] = [
        ModuleKind::HeaterShaker,
        ModuleKind::TempDeck,
        ModuleKind::Thermocycler,
        ModuleKind::MagDeck,
        ModuleKind::Smoothie,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ModuleKind::HeaterShaker => "heater-shaker",
            ModuleKind::TempDeck => "temp-deck",
            ModuleKind::Thermocycler => "thermocycler",
            ModuleKind::MagDeck => "mag-deck",
            ModuleKind::Smoothie => "smoothie",
        }
    }
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Common surface of every device emulator.
pub trait ModuleEmulator: Send {
    fn kind(&self) -> ModuleKind;

    /// Restores the power-on state from the configured settings.
    fn reset(&mut self);

    /// Runs one command. `Ok(None)` means the command produced no response text.
    fn handle_command(&mut self, command: &Command) -> Result<Option<String>, EmulatorError>;

    /// Parses `line` and dispatches its commands left to right.
    ///
    /// Non-empty results are joined with a single space. Returns `Ok(None)`
    /// when no command produced output.
    fn handle(&mut self, line: &str) -> Result<Option<String>, EmulatorError> {
        let commands = parse_line(line)?;
        let mut responses = Vec::with_capacity(commands.len());
        for command in &commands {
            tracing::debug!(module = %self.kind(), gcode = command.gcode(), body = command.body(), "dispatching command");
            if let Some(response) = self.handle_command(command)? {
                if !response.is_empty() {
                    responses.push(response);
                }
            }
        }
        if responses.is_empty() {
            Ok(None)
        } else {
            Ok(Some(responses.join(" ")))
        }
    }

    /// Byte sequence that ends an incoming command line.
    fn terminator(&self) -> &'static [u8] {
        DEFAULT_TERMINATOR
    }

    /// Bytes the transport writes after each handled line.
    fn ack(&self) -> &'static [u8] {
        DEFAULT_ACK
    }
}

/// Builds a fresh emulator for `kind` from the loaded configuration.
pub fn build_emulator(kind: ModuleKind, config: &Config) -> Box<dyn ModuleEmulator> {
    match kind {
        ModuleKind::HeaterShaker => Box::new(HeaterShakerEmulator::new(config.heater_shaker.clone())),
        ModuleKind::TempDeck => Box::new(TempDeckEmulator::new(config.temp_deck.clone())),
        ModuleKind::Thermocycler => Box::new(ThermocyclerEmulator::new(config.thermocycler.clone())),
        ModuleKind::MagDeck => Box::new(MagDeckEmulator::new(config.mag_deck.clone())),
        ModuleKind::Smoothie => Box::new(SmoothieEmulator::new(config.smoothie.clone())),
    }
}

pub(crate) fn unhandled(kind: ModuleKind, command: &Command) -> Result<Option<String>, EmulatorError> {
    tracing::trace!(module = %kind, gcode = command.gcode(), "ignoring unsupported gcode");
    Ok(None)
}

/// Numeric parameter that must be present.
pub(crate) fn required_number(command: &Command, letter: char) -> Result<f64, EmulatorError> {
    optional_number(command, letter)?.ok_or_else(|| EmulatorError::MissingParameter {
        gcode: command.gcode().to_string(),
        letter,
    })
}

/// Numeric parameter that may be absent but must be a number when given.
pub(crate) fn optional_number(command: &Command, letter: char) -> Result<Option<f64>, EmulatorError> {
    match command.param(letter) {
        None => Ok(None),
        Some(ParamValue::Number(value)) => Ok(Some(*value)),
        Some(_) => Err(EmulatorError::InvalidParameter {
            gcode: command.gcode().to_string(),
            letter,
        }),
    }
}

/// Float as the heater-shaker firmware prints it: always with a decimal part.
pub(crate) fn fmt_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

/// Shortest form: `0`, `23`, `23.5`.
pub(crate) fn fmt_compact(value: f64) -> String {
    format!("{value}")
}

pub(crate) fn fmt_or_none(value: Option<f64>, fmt: fn(f64) -> String) -> String {
    value.map(fmt).unwrap_or_else(|| "none".to_string())
}

pub(crate) fn device_info(serial_number: &str, model: &str, version: &str) -> String {
    format!("serial:{serial_number} model:{model} version:{version}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_formatting() {
        assert_eq!(fmt_float(23.0), "23.0");
        assert_eq!(fmt_float(55.5), "55.5");
        assert_eq!(fmt_float(-4.0), "-4.0");
        assert_eq!(fmt_compact(0.0), "0");
        assert_eq!(fmt_compact(23.0), "23");
        assert_eq!(fmt_compact(23.25), "23.25");
        assert_eq!(fmt_or_none(None, fmt_float), "none");
        assert_eq!(fmt_or_none(Some(4.0), fmt_compact), "4");
    }

    #[test]
    fn test_parameter_helpers() {
        let command = parse_line("M104 S55 H").unwrap().remove(0);
        assert_eq!(required_number(&command, 'S').unwrap(), 55.0);
        assert_eq!(optional_number(&command, 'V').unwrap(), None);
        assert!(matches!(
            required_number(&command, 'V'),
            Err(EmulatorError::MissingParameter { letter: 'V', .. })
        ));
        assert!(matches!(
            optional_number(&command, 'H'),
            Err(EmulatorError::InvalidParameter { letter: 'H', .. })
        ));
    }

    #[test]
    fn test_build_every_kind() {
        let config = Config::default();
        for kind in ModuleKind::ALL {
            let emulator = build_emulator(kind, &config);
            assert_eq!(emulator.kind(), kind);
        }
    }
}
