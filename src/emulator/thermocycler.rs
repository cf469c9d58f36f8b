// src/emulator/thermocycler.rs
use crate::config::ThermocyclerSettings;
use crate::gcode::Command;
use crate::simulation::{Temperature, TemperatureWithHold, TEMPERATURE_ROOM};

use super::{
    device_info, fmt_compact, fmt_or_none, optional_number, unhandled, EmulatorError, ModuleEmulator, ModuleKind,
};

/// Lid setpoint used when M140 carries no `S`.
pub const DEFAULT_LID_TARGET: f64 = 105.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThermocyclerGCode {
    OpenLid,
    CloseLid,
    GetLidStatus,
    SetLidTemp,
    GetLidTemp,
    DeactivateLid,
    SetPlateTemp,
    GetPlateTemp,
    SetRampRate,
    DeactivateAll,
    DeactivateBlock,
    EditPidParams,
    DeviceInfo,
    EnterProgramming,
}

impl ThermocyclerGCode {
    pub const ALL: [Self; 14] = [
        Self::OpenLid,
        Self::CloseLid,
        Self::GetLidStatus,
        Self::SetLidTemp,
        Self::GetLidTemp,
        Self::DeactivateLid,
        Self::SetPlateTemp,
        Self::GetPlateTemp,
        Self::SetRampRate,
        Self::DeactivateAll,
        Self::DeactivateBlock,
        Self::EditPidParams,
        Self::DeviceInfo,
        Self::EnterProgramming,
    ];

    pub fn from_gcode(gcode: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|g| g.as_str() == gcode)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenLid => "M126",
            Self::CloseLid => "M127",
            Self::GetLidStatus => "M119",
            Self::SetLidTemp => "M140",
            Self::GetLidTemp => "M141",
            Self::DeactivateLid => "M108",
            Self::SetPlateTemp => "M104",
            Self::GetPlateTemp => "M105",
            Self::SetRampRate => "M566",
            Self::DeactivateAll => "M18",
            Self::DeactivateBlock => "M14",
            Self::EditPidParams => "M301",
            Self::DeviceInfo => "M115",
            Self::EnterProgramming => "dfu",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LidStatus {
    Unknown,
    Closed,
    InBetween,
    Open,
    Max,
}

impl LidStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LidStatus::Unknown => "unknown",
            LidStatus::Closed => "closed",
            LidStatus::InBetween => "in_between",
            LidStatus::Open => "open",
            LidStatus::Max => "max",
        }
    }
}

pub struct ThermocyclerEmulator {
    settings: ThermocyclerSettings,
    lid_temperature: Temperature,
    plate_temperature: TemperatureWithHold,
    lid_status: LidStatus,
    plate_volume: Option<f64>,
    plate_ramp_rate: Option<f64>,
}

impl ThermocyclerEmulator {
    pub fn new(settings: ThermocyclerSettings) -> Self {
        let lid_temperature = Temperature::new(
            settings.lid_temperature.degrees_per_tick,
            settings.lid_temperature.starting,
        );
        let plate_temperature = TemperatureWithHold::new(
            settings.plate_temperature.degrees_per_tick,
            settings.plate_temperature.starting,
        );
        Self {
            settings,
            lid_temperature,
            plate_temperature,
            lid_status: LidStatus::Closed,
            plate_volume: None,
            plate_ramp_rate: None,
        }
    }

    pub fn lid_temperature(&self) -> &Temperature {
        &self.lid_temperature
    }

    pub fn plate_temperature(&self) -> &TemperatureWithHold {
        &self.plate_temperature
    }

    pub fn lid_status(&self) -> LidStatus {
        self.lid_status
    }

    pub fn plate_volume(&self) -> Option<f64> {
        self.plate_volume
    }

    pub fn plate_ramp_rate(&self) -> Option<f64> {
        self.plate_ramp_rate
    }

    fn get_lid_temp(&mut self) -> String {
        let lid = &mut self.lid_temperature;
        let response = format!(
            "T:{} C:{} H:none Total_H:none At_target?:{}",
            fmt_compact(lid.target().unwrap_or(0.0)),
            fmt_compact(lid.current()),
            u8::from(lid.at_target())
        );
        lid.tick();
        response
    }

    fn get_plate_temp(&mut self) -> String {
        let plate = &mut self.plate_temperature;
        let response = format!(
            "T:{} C:{} H:{} Total_H:{} At_target?:{}",
            fmt_compact(plate.target().unwrap_or(0.0)),
            fmt_compact(plate.current()),
            fmt_or_none(plate.time_remaining(), fmt_compact),
            fmt_or_none(plate.total_hold(), fmt_compact),
            u8::from(plate.at_target())
        );
        plate.tick();
        response
    }

    fn set_plate_temp(&mut self, command: &Command) -> Result<(), EmulatorError> {
        if let Some(target) = optional_number(command, 'S')? {
            self.plate_temperature.set_target(Some(target));
        }
        if let Some(hold) = optional_number(command, 'H')? {
            self.plate_temperature.set_hold(hold);
        }
        if let Some(volume) = optional_number(command, 'V')? {
            self.plate_volume = Some(volume);
        }
        Ok(())
    }
}

impl ModuleEmulator for ThermocyclerEmulator {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Thermocycler
    }

    fn reset(&mut self) {
        *self = Self::new(self.settings.clone());
    }

    fn handle_command(&mut self, command: &Command) -> Result<Option<String>, EmulatorError> {
        let Some(gcode) = ThermocyclerGCode::from_gcode(command.gcode()) else {
            return unhandled(self.kind(), command);
        };
        match gcode {
            // Lid motion is not modelled; the reported status stays where reset left it.
            ThermocyclerGCode::OpenLid | ThermocyclerGCode::CloseLid => Ok(None),
            ThermocyclerGCode::GetLidStatus => Ok(Some(format!("Lid:{}", self.lid_status.as_str()))),
            ThermocyclerGCode::SetLidTemp => {
                let target = optional_number(command, 'S')?.unwrap_or(DEFAULT_LID_TARGET);
                self.lid_temperature.set_target(Some(target));
                Ok(None)
            }
            ThermocyclerGCode::GetLidTemp => Ok(Some(self.get_lid_temp())),
            ThermocyclerGCode::DeactivateLid => {
                self.lid_temperature.deactivate(TEMPERATURE_ROOM);
                Ok(None)
            }
            ThermocyclerGCode::SetPlateTemp => {
                self.set_plate_temp(command)?;
                Ok(None)
            }
            ThermocyclerGCode::GetPlateTemp => Ok(Some(self.get_plate_temp())),
            ThermocyclerGCode::SetRampRate => {
                if let Some(rate) = optional_number(command, 'S')? {
                    self.plate_ramp_rate = Some(rate);
                }
                Ok(None)
            }
            ThermocyclerGCode::DeactivateAll => {
                self.lid_temperature.deactivate(TEMPERATURE_ROOM);
                self.plate_temperature.deactivate(TEMPERATURE_ROOM);
                Ok(None)
            }
            ThermocyclerGCode::DeactivateBlock => {
                self.plate_temperature.deactivate(TEMPERATURE_ROOM);
                Ok(None)
            }
            ThermocyclerGCode::EditPidParams | ThermocyclerGCode::EnterProgramming => Ok(None),
            ThermocyclerGCode::DeviceInfo => Ok(Some(device_info(
                &self.settings.serial_number,
                &self.settings.model,
                &self.settings.version,
            ))),
        }
    }

    fn terminator(&self) -> &'static [u8] {
        b"\r\n"
    }
}
