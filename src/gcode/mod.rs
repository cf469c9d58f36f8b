// src/gcode/mod.rs
pub mod parser;


pub use parser::{parse_line, Command, GCodeLineParser, ParamValue, ParseError};
