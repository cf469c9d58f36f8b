// src/emulator/mag_deck.rs
use crate::config::MagDeckSettings;
use crate::gcode::Command;

use super::{device_info, fmt_compact, optional_number, unhandled, EmulatorError, ModuleEmulator, ModuleKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MagDeckGCode {
    Home,
    Move,
    ProbePlate,
    GetPlateHeight,
    GetCurrentPosition,
    DeviceInfo,
    ProgrammingMode,
}

impl MagDeckGCode {
    pub const ALL: [Self; 7] = [
        Self::Home,
        Self::Move,
        Self::ProbePlate,
        Self::GetPlateHeight,
        Self::GetCurrentPosition,
        Self::DeviceInfo,
        Self::ProgrammingMode,
    ];

    pub fn from_gcode(gcode: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|g| g.as_str() == gcode)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Home => "G28.2",
            Self::Move => "G0",
            Self::ProbePlate => "M836",
            Self::GetPlateHeight => "M837",
            Self::GetCurrentPosition => "M114.2",
            Self::DeviceInfo => "M115",
            Self::ProgrammingMode => "dfu",
        }
    }
}

/// Magnet carriage. Moves are instantaneous; there is nothing to ramp.
pub struct MagDeckEmulator {
    settings: MagDeckSettings,
    height: f64,
    position: f64,
}

impl MagDeckEmulator {
    pub fn new(settings: MagDeckSettings) -> Self {
        Self {
            settings,
            height: 0.0,
            position: 0.0,
        }
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn position(&self) -> f64 {
        self.position
    }
}

impl ModuleEmulator for MagDeckEmulator {
    fn kind(&self) -> ModuleKind {
        ModuleKind::MagDeck
    }

    fn reset(&mut self) {
        self.height = 0.0;
        self.position = 0.0;
    }

    fn handle_command(&mut self, command: &Command) -> Result<Option<String>, EmulatorError> {
        let Some(gcode) = MagDeckGCode::from_gcode(command.gcode()) else {
            return unhandled(self.kind(), command);
        };
        match gcode {
            MagDeckGCode::Home => {
                self.position = 0.0;
                Ok(None)
            }
            MagDeckGCode::Move => {
                if let Some(z) = optional_number(command, 'Z')? {
                    self.position = z;
                }
                Ok(None)
            }
            MagDeckGCode::ProbePlate => {
                self.height = self.settings.probe_height;
                Ok(None)
            }
            MagDeckGCode::GetPlateHeight => Ok(Some(format!("height:{}", fmt_compact(self.height)))),
            MagDeckGCode::GetCurrentPosition => Ok(Some(format!("Z:{}", fmt_compact(self.position)))),
            MagDeckGCode::DeviceInfo => Ok(Some(device_info(
                &self.settings.serial_number,
                &self.settings.model,
                &self.settings.version,
            ))),
            MagDeckGCode::ProgrammingMode => Ok(None),
        }
    }
}
