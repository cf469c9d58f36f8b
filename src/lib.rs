//! Software stand-ins for lab module firmware.
//!
//! Each emulator speaks its device's line-oriented GCODE protocol, keeps a
//! tick-driven model of the physical state, and answers with the exact text
//! the real firmware would send.

pub mod communication;
pub mod config;
pub mod emulator;
pub mod gcode;
pub mod simulation;

pub use config::{load_config, Config, ConfigError};
pub use emulator::{build_emulator, EmulatorError, ModuleEmulator, ModuleKind};
pub use gcode::{parse_line, Command, ParamValue, ParseError};
