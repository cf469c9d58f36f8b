//! Byte transport for the emulators: framing plus a TCP listener per module.

pub mod connection;
pub mod framing;
pub mod server;

use thiserror::Error;

use crate::emulator::EmulatorError;

pub use connection::ConnectionHandler;
pub use framing::{frame_response, read_frames};
pub use server::EmulatorServer;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("emulator error: {0}")]
    Emulator(#[from] EmulatorError),
}
