// src/emulator/heater_shaker.rs
use crate::config::HeaterShakerSettings;
use crate::gcode::Command;
use crate::simulation::{Rpm, Temperature, TEMPERATURE_ROOM};

use super::{fmt_float, fmt_or_none, required_number, unhandled, EmulatorError, ModuleEmulator, ModuleKind};

/// Token appended to every response the heater-shaker produces.
pub const ACK: &str = "ok\r\nok\r\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaterShakerGCode {
    SetRpm,
    GetRpm,
    SetTemperature,
    GetTemperature,
    DeactivateHeater,
    Home,
    GetLabwareLatchState,
    OpenLabwareLatch,
    CloseLabwareLatch,
    GetVersion,
    EnterBootloader,
}

impl HeaterShakerGCode {
    pub fn from_gcode(gcode: &str) -> Option<Self> {
        Some(match gcode {
            "M3" => Self::SetRpm,
            "M123" => Self::GetRpm,
            "M104" => Self::SetTemperature,
            "M105" => Self::GetTemperature,
            "M106" => Self::DeactivateHeater,
            "G28" => Self::Home,
            "M241" => Self::GetLabwareLatchState,
            "M242" => Self::OpenLabwareLatch,
            "M243" => Self::CloseLabwareLatch,
            "M115" => Self::GetVersion,
            "dfu" => Self::EnterBootloader,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SetRpm => "M3",
            Self::GetRpm => "M123",
            Self::SetTemperature => "M104",
            Self::GetTemperature => "M105",
            Self::DeactivateHeater => "M106",
            Self::Home => "G28",
            Self::GetLabwareLatchState => "M241",
            Self::OpenLabwareLatch => "M242",
            Self::CloseLabwareLatch => "M243",
            Self::GetVersion => "M115",
            Self::EnterBootloader => "dfu",
        }
    }
}

/// Labware latch state as reported by the firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatchStatus {
    Opening,
    IdleOpen,
    Closing,
    IdleClosed,
    IdleUnknown,
    Unknown,
}

impl LatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LatchStatus::Opening => "opening",
            LatchStatus::IdleOpen => "idle_open",
            LatchStatus::Closing => "closing",
            LatchStatus::IdleClosed => "idle_closed",
            LatchStatus::IdleUnknown => "idle_unknown",
            LatchStatus::Unknown => "unknown",
        }
    }
}

pub struct HeaterShakerEmulator {
    settings: HeaterShakerSettings,
    temperature: Temperature,
    rpm: Rpm,
    latch_status: LatchStatus,
}

impl HeaterShakerEmulator {
    pub fn new(settings: HeaterShakerSettings) -> Self {
        let temperature = Temperature::new(settings.temperature.degrees_per_tick, settings.temperature.starting);
        let rpm = Rpm::new(settings.rpm.rpm_per_tick, settings.rpm.starting);
        Self {
            settings,
            temperature,
            rpm,
            latch_status: LatchStatus::IdleOpen,
        }
    }

    pub fn temperature(&self) -> &Temperature {
        &self.temperature
    }

    pub fn rpm(&self) -> &Rpm {
        &self.rpm
    }

    pub fn latch_status(&self) -> LatchStatus {
        self.latch_status
    }

    fn set_rpm(&mut self, command: &Command) -> Result<String, EmulatorError> {
        self.rpm.set_target(Some(required_number(command, 'S')?));
        Ok(HeaterShakerGCode::SetRpm.as_str().to_string())
    }

    fn get_rpm(&mut self) -> String {
        let response = format!(
            "{} C:{} T:{}",
            HeaterShakerGCode::GetRpm.as_str(),
            fmt_float(self.rpm.current()),
            fmt_or_none(self.rpm.target(), fmt_float)
        );
        self.rpm.tick();
        response
    }

    fn set_temperature(&mut self, command: &Command) -> Result<String, EmulatorError> {
        self.temperature.set_target(Some(required_number(command, 'S')?));
        Ok(HeaterShakerGCode::SetTemperature.as_str().to_string())
    }

    fn get_temperature(&mut self) -> String {
        let response = format!(
            "{} C:{} T:{}",
            HeaterShakerGCode::GetTemperature.as_str(),
            fmt_float(self.temperature.current()),
            fmt_or_none(self.temperature.target(), fmt_float)
        );
        self.temperature.tick();
        response
    }

    fn get_version(&self) -> String {
        format!(
            "{} FW:{} HW:{} SerialNo:{}",
            HeaterShakerGCode::GetVersion.as_str(),
            self.settings.version,
            self.settings.model,
            self.settings.serial_number
        )
    }

    fn dispatch(&mut self, gcode: HeaterShakerGCode, command: &Command) -> Result<String, EmulatorError> {
        Ok(match gcode {
            HeaterShakerGCode::SetRpm => self.set_rpm(command)?,
            HeaterShakerGCode::GetRpm => self.get_rpm(),
            HeaterShakerGCode::SetTemperature => self.set_temperature(command)?,
            HeaterShakerGCode::GetTemperature => self.get_temperature(),
            HeaterShakerGCode::DeactivateHeater => {
                self.temperature.deactivate(TEMPERATURE_ROOM);
                gcode.as_str().to_string()
            }
            HeaterShakerGCode::Home => {
                // the plate coasts to a stop
                self.rpm.set_target(None);
                gcode.as_str().to_string()
            }
            HeaterShakerGCode::GetLabwareLatchState => {
                format!("{} STATUS:{}", gcode.as_str(), self.latch_status.as_str().to_uppercase())
            }
            HeaterShakerGCode::OpenLabwareLatch => {
                self.latch_status = LatchStatus::IdleOpen;
                gcode.as_str().to_string()
            }
            HeaterShakerGCode::CloseLabwareLatch => {
                self.latch_status = LatchStatus::IdleClosed;
                gcode.as_str().to_string()
            }
            HeaterShakerGCode::GetVersion => self.get_version(),
            HeaterShakerGCode::EnterBootloader => gcode.as_str().to_string(),
        })
    }
}

impl ModuleEmulator for HeaterShakerEmulator {
    fn kind(&self) -> ModuleKind {
        ModuleKind::HeaterShaker
    }

    fn reset(&mut self) {
        *self = Self::new(self.settings.clone());
    }

    fn handle_command(&mut self, command: &Command) -> Result<Option<String>, EmulatorError> {
        let Some(gcode) = HeaterShakerGCode::from_gcode(command.gcode()) else {
            return unhandled(self.kind(), command);
        };
        let response = self.dispatch(gcode, command)?;
        Ok(Some(format!("{response} {ACK}")))
    }

    fn terminator(&self) -> &'static [u8] {
        b"\n"
    }

    /// Acks travel inside each response, so the transport adds none.
    fn ack(&self) -> &'static [u8] {
        b""
    }
}
