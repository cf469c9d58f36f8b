// src/emulator/temp_deck.rs
use crate::config::TempDeckSettings;
use crate::gcode::Command;
use crate::simulation::{Temperature, TEMPERATURE_ROOM};

use super::{device_info, fmt_compact, required_number, unhandled, EmulatorError, ModuleEmulator, ModuleKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TempDeckGCode {
    GetTemp,
    SetTemp,
    DeviceInfo,
    Disengage,
    ProgrammingMode,
}

impl TempDeckGCode {
    pub const ALL: [Self; 5] = [
        Self::GetTemp,
        Self::SetTemp,
        Self::DeviceInfo,
        Self::Disengage,
        Self::ProgrammingMode,
    ];

    pub fn from_gcode(gcode: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|g| g.as_str() == gcode)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GetTemp => "M105",
            Self::SetTemp => "M104",
            Self::DeviceInfo => "M115",
            Self::Disengage => "M18",
            Self::ProgrammingMode => "dfu",
        }
    }
}

pub struct TempDeckEmulator {
    settings: TempDeckSettings,
    temperature: Temperature,
}

impl TempDeckEmulator {
    pub fn new(settings: TempDeckSettings) -> Self {
        let temperature = Temperature::new(settings.temperature.degrees_per_tick, settings.temperature.starting);
        Self { settings, temperature }
    }

    pub fn temperature(&self) -> &Temperature {
        &self.temperature
    }

    fn get_temp(&mut self) -> String {
        let response = format!(
            "T:{} C:{}",
            fmt_compact(self.temperature.target().unwrap_or(0.0)),
            fmt_compact(self.temperature.current())
        );
        self.temperature.tick();
        response
    }
}

impl ModuleEmulator for TempDeckEmulator {
    fn kind(&self) -> ModuleKind {
        ModuleKind::TempDeck
    }

    fn reset(&mut self) {
        *self = Self::new(self.settings.clone());
    }

    fn handle_command(&mut self, command: &Command) -> Result<Option<String>, EmulatorError> {
        let Some(gcode) = TempDeckGCode::from_gcode(command.gcode()) else {
            return unhandled(self.kind(), command);
        };
        match gcode {
            TempDeckGCode::GetTemp => Ok(Some(self.get_temp())),
            TempDeckGCode::SetTemp => {
                self.temperature.set_target(Some(required_number(command, 'S')?));
                Ok(None)
            }
            TempDeckGCode::DeviceInfo => Ok(Some(device_info(
                &self.settings.serial_number,
                &self.settings.model,
                &self.settings.version,
            ))),
            TempDeckGCode::Disengage => {
                self.temperature.deactivate(TEMPERATURE_ROOM);
                Ok(None)
            }
            TempDeckGCode::ProgrammingMode => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TemperatureModelSettings;

    fn cold_deck() -> TempDeckEmulator {
        TempDeckEmulator::new(TempDeckSettings {
            temperature: TemperatureModelSettings {
                degrees_per_tick: 2.0,
                starting: 0.0,
            },
            ..TempDeckSettings::default()
        })
    }

    #[test]
    fn test_initial_report() {
        let mut deck = cold_deck();
        assert_eq!(deck.handle("M105").unwrap().as_deref(), Some("T:0 C:0"));
    }

    #[test]
    fn test_set_is_silent_and_get_ramps() {
        let mut deck = cold_deck();
        assert_eq!(deck.handle("M104 S5").unwrap(), None);
        assert_eq!(deck.handle("M105").unwrap().as_deref(), Some("T:5 C:0"));
        assert_eq!(deck.handle("M105").unwrap().as_deref(), Some("T:5 C:2"));
        assert_eq!(deck.handle("M105").unwrap().as_deref(), Some("T:5 C:4"));
        assert_eq!(deck.handle("M105").unwrap().as_deref(), Some("T:5 C:5"));
    }

    #[test]
    fn test_disengage_settles_at_room_temperature() {
        let mut deck = cold_deck();
        deck.handle("M104 S4 M105").unwrap();
        deck.handle("M18").unwrap();
        assert_eq!(deck.handle("M105").unwrap().as_deref(), Some("T:0 C:23"));
    }

    #[test]
    fn test_device_info() {
        let mut deck = TempDeckEmulator::new(TempDeckSettings::default());
        assert_eq!(
            deck.handle("M115").unwrap().as_deref(),
            Some("serial:temperature_emulator model:temp_deck_v20 version:v2.0.1")
        );
    }

    #[test]
    fn test_missing_setpoint_fails() {
        let mut deck = cold_deck();
        assert!(matches!(deck.handle("M104"), Err(EmulatorError::MissingParameter { .. })));
    }

    #[test]
    fn test_default_framing() {
        let deck = cold_deck();
        assert_eq!(deck.terminator(), b"\r\n\r\n");
        assert_eq!(deck.ack(), b"ok\r\nok\r\n");
    }
}
