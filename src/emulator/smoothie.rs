// src/emulator/smoothie.rs - gantry controller
use std::collections::VecDeque;

use crate::config::SmoothieSettings;
use crate::gcode::{Command, ParamValue};

use super::{optional_number, unhandled, EmulatorError, ModuleEmulator, ModuleKind};

pub const AXES: [char; 6] = ['X', 'Y', 'Z', 'A', 'B', 'C'];

/// Position each axis reports after homing.
pub const HOMED_POSITION: [f64; 6] = [418.0, 353.0, 218.0, 218.0, 19.0, 19.0];

const BUILD_DATE: &str = "Jan 28 2018 15:26:57";

/// Saved speeds kept by `M120`. Pushing past this drops the oldest.
pub const SPEED_STACK_DEPTH: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmoothieGCode {
    Move,
    Dwell,
    Home,
    HomingStatus,
    AbsoluteCoords,
    RelativeCoords,
    CurrentPosition,
    LimitSwitchStatus,
    PushSpeed,
    PopSpeed,
    DisengageMotor,
    StepsPerMm,
    SetMaxSpeed,
    Acceleration,
    Wait,
    SetCurrent,
    ResetFromError,
    PipetteHome,
    PipetteMaxTravel,
    PipetteDebounce,
    PipetteRetract,
    ReadInstrumentId,
    WriteInstrumentId,
    ReadInstrumentModel,
    WriteInstrumentModel,
    Version,
}

impl SmoothieGCode {
    pub const ALL: [Self; 26] = [
        Self::Move,
        Self::Dwell,
        Self::Home,
        Self::HomingStatus,
        Self::AbsoluteCoords,
        Self::RelativeCoords,
        Self::CurrentPosition,
        Self::LimitSwitchStatus,
        Self::PushSpeed,
        Self::PopSpeed,
        Self::DisengageMotor,
        Self::StepsPerMm,
        Self::SetMaxSpeed,
        Self::Acceleration,
        Self::Wait,
        Self::SetCurrent,
        Self::ResetFromError,
        Self::PipetteHome,
        Self::PipetteMaxTravel,
        Self::PipetteDebounce,
        Self::PipetteRetract,
        Self::ReadInstrumentId,
        Self::WriteInstrumentId,
        Self::ReadInstrumentModel,
        Self::WriteInstrumentModel,
        Self::Version,
    ];

    pub fn from_gcode(gcode: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|g| g.as_str() == gcode)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Move => "G0",
            Self::Dwell => "G4",
            Self::Home => "G28.2",
            Self::HomingStatus => "G28.6",
            Self::AbsoluteCoords => "G90",
            Self::RelativeCoords => "G91",
            Self::CurrentPosition => "M114.2",
            Self::LimitSwitchStatus => "M119",
            Self::PushSpeed => "M120",
            Self::PopSpeed => "M121",
            Self::DisengageMotor => "M18",
            Self::StepsPerMm => "M92",
            Self::SetMaxSpeed => "M203.1",
            Self::Acceleration => "M204",
            Self::Wait => "M400",
            Self::SetCurrent => "M907",
            Self::ResetFromError => "M999",
            Self::PipetteHome => "M365.0",
            Self::PipetteMaxTravel => "M365.1",
            Self::PipetteDebounce => "M365.2",
            Self::PipetteRetract => "M365.3",
            Self::ReadInstrumentId => "M369",
            Self::WriteInstrumentId => "M370",
            Self::ReadInstrumentModel => "M371",
            Self::WriteInstrumentModel => "M372",
            Self::Version => "version",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mount {
    Left,
    Right,
}

impl Mount {
    fn from_letter(letter: char) -> Option<Self> {
        match letter {
            'L' => Some(Mount::Left),
            'R' => Some(Mount::Right),
            _ => None,
        }
    }

    fn letter(&self) -> char {
        match self {
            Mount::Left => 'L',
            Mount::Right => 'R',
        }
    }

    fn index(&self) -> usize {
        match self {
            Mount::Left => 0,
            Mount::Right => 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct PipetteMemory {
    model: String,
    id: String,
}

pub struct SmoothieEmulator {
    settings: SmoothieSettings,
    position: [f64; 6],
    homed: [bool; 6],
    relative: bool,
    speed: f64,
    speed_stack: VecDeque<f64>,
    pipettes: [PipetteMemory; 2],
}

impl SmoothieEmulator {
    pub fn new(settings: SmoothieSettings) -> Self {
        let pipettes = [
            PipetteMemory {
                model: settings.left.model.clone(),
                id: settings.left.id.clone(),
            },
            PipetteMemory {
                model: settings.right.model.clone(),
                id: settings.right.id.clone(),
            },
        ];
        Self {
            speed: settings.default_speed,
            settings,
            position: [0.0; 6],
            homed: [false; 6],
            relative: false,
            speed_stack: VecDeque::with_capacity(SPEED_STACK_DEPTH),
            pipettes,
        }
    }

    pub fn position(&self, axis: char) -> Option<f64> {
        axis_index(axis).map(|i| self.position[i])
    }

    pub fn is_homed(&self, axis: char) -> Option<bool> {
        axis_index(axis).map(|i| self.homed[i])
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn pipette_model(&self, mount: Mount) -> &str {
        &self.pipettes[mount.index()].model
    }

    pub fn pipette_id(&self, mount: Mount) -> &str {
        &self.pipettes[mount.index()].id
    }

    fn move_gantry(&mut self, command: &Command) -> Result<(), EmulatorError> {
        if let Some(speed) = optional_number(command, 'F')? {
            self.speed = speed;
        }
        for (i, axis) in AXES.iter().enumerate() {
            if let Some(value) = optional_number(command, *axis)? {
                if self.relative {
                    self.position[i] += value;
                } else {
                    self.position[i] = value;
                }
            }
        }
        Ok(())
    }

    fn home(&mut self, command: &Command) {
        let requested: Vec<usize> = command
            .params()
            .iter()
            .filter_map(|(letter, _)| axis_index(*letter))
            .collect();
        let axes: Vec<usize> = if requested.is_empty() {
            (0..AXES.len()).collect()
        } else {
            requested
        };
        for i in axes {
            self.position[i] = HOMED_POSITION[i];
            self.homed[i] = true;
        }
    }

    fn homing_status(&self) -> String {
        AXES.iter()
            .zip(self.homed.iter())
            .map(|(axis, homed)| format!("{axis}:{}", u8::from(*homed)))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn current_position(&self) -> String {
        let axes = AXES
            .iter()
            .zip(self.position.iter())
            .map(|(axis, value)| format!("{axis}:{value:.4}"))
            .collect::<Vec<_>>()
            .join(" ");
        format!("ok MCS: {axes}")
    }

    fn limit_switch_status(&self) -> String {
        let switches = AXES
            .iter()
            .map(|axis| format!("{axis}_max:0"))
            .collect::<Vec<_>>()
            .join(" ");
        format!("{switches} _pins Probe: 0")
    }

    fn version(&self) -> String {
        format!(
            "Build version: {}, Build date: {BUILD_DATE}, MCU: LPC1769, System Clock: 120MHz",
            self.settings.version
        )
    }

    fn read_pipette(&self, command: &Command, field: fn(&PipetteMemory) -> &str) -> Result<String, EmulatorError> {
        let mount = command_mount(command)?;
        let data = field(&self.pipettes[mount.index()]);
        Ok(format!("{}:{}", mount.letter(), hex::encode(data.as_bytes())))
    }

    fn write_pipette(
        &mut self,
        command: &Command,
        field: fn(&mut PipetteMemory) -> &mut String,
    ) -> Result<(), EmulatorError> {
        let malformed = || EmulatorError::MalformedPayload {
            gcode: command.gcode().to_string(),
            body: command.body().to_string(),
        };
        let mut chars = command.body().chars();
        let mount = chars.next().and_then(Mount::from_letter).ok_or_else(malformed)?;
        let bytes = hex::decode(chars.as_str().trim()).map_err(|_| malformed())?;
        let value = String::from_utf8(bytes).map_err(|_| malformed())?;
        *field(&mut self.pipettes[mount.index()]) = value.trim_end_matches('\0').to_string();
        Ok(())
    }
}

impl ModuleEmulator for SmoothieEmulator {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Smoothie
    }

    fn reset(&mut self) {
        *self = Self::new(self.settings.clone());
    }

    fn handle_command(&mut self, command: &Command) -> Result<Option<String>, EmulatorError> {
        let Some(gcode) = SmoothieGCode::from_gcode(command.gcode()) else {
            return unhandled(self.kind(), command);
        };
        match gcode {
            SmoothieGCode::Move => {
                self.move_gantry(command)?;
                Ok(None)
            }
            SmoothieGCode::Home => {
                self.home(command);
                Ok(None)
            }
            SmoothieGCode::HomingStatus => Ok(Some(self.homing_status())),
            SmoothieGCode::AbsoluteCoords => {
                self.relative = false;
                Ok(None)
            }
            SmoothieGCode::RelativeCoords => {
                self.relative = true;
                Ok(None)
            }
            SmoothieGCode::CurrentPosition => Ok(Some(self.current_position())),
            SmoothieGCode::LimitSwitchStatus => Ok(Some(self.limit_switch_status())),
            SmoothieGCode::PushSpeed => {
                if self.speed_stack.len() == SPEED_STACK_DEPTH {
                    self.speed_stack.pop_front();
                }
                self.speed_stack.push_back(self.speed);
                Ok(None)
            }
            SmoothieGCode::PopSpeed => {
                if let Some(speed) = self.speed_stack.pop_back() {
                    self.speed = speed;
                }
                Ok(None)
            }
            SmoothieGCode::DisengageMotor => {
                let all = !AXES.iter().any(|axis| command.has_param(*axis));
                for (i, axis) in AXES.iter().enumerate() {
                    if all || command.has_param(*axis) {
                        self.homed[i] = false;
                    }
                }
                Ok(None)
            }
            SmoothieGCode::ReadInstrumentId => self.read_pipette(command, |p| p.id.as_str()).map(Some),
            SmoothieGCode::ReadInstrumentModel => self.read_pipette(command, |p| p.model.as_str()).map(Some),
            SmoothieGCode::WriteInstrumentId => {
                self.write_pipette(command, |p| &mut p.id)?;
                Ok(None)
            }
            SmoothieGCode::WriteInstrumentModel => {
                self.write_pipette(command, |p| &mut p.model)?;
                Ok(None)
            }
            SmoothieGCode::Version => Ok(Some(self.version())),
            SmoothieGCode::Dwell
            | SmoothieGCode::StepsPerMm
            | SmoothieGCode::SetMaxSpeed
            | SmoothieGCode::Acceleration
            | SmoothieGCode::Wait
            | SmoothieGCode::SetCurrent
            | SmoothieGCode::ResetFromError
            | SmoothieGCode::PipetteHome
            | SmoothieGCode::PipetteMaxTravel
            | SmoothieGCode::PipetteDebounce
            | SmoothieGCode::PipetteRetract => Ok(None),
        }
    }
}

fn axis_index(axis: char) -> Option<usize> {
    AXES.iter().position(|a| *a == axis)
}

fn command_mount(command: &Command) -> Result<Mount, EmulatorError> {
    command
        .params()
        .iter()
        .find_map(|(letter, value)| match value {
            ParamValue::Flag => Mount::from_letter(*letter),
            _ => None,
        })
        .ok_or_else(|| EmulatorError::MissingParameter {
            gcode: command.gcode().to_string(),
            letter: 'L',
        })
}
