// src/communication/connection.rs - one emulator per connection
use futures::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use super::framing::{frame_response, read_frames};
use super::TransportError;
use crate::emulator::ModuleEmulator;

/// Drives a single emulator over a byte stream until the peer disconnects.
pub struct ConnectionHandler<S> {
    stream: S,
    emulator: Box<dyn ModuleEmulator>,
}

impl<S> ConnectionHandler<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    pub fn new(stream: S, emulator: Box<dyn ModuleEmulator>) -> Self {
        Self { stream, emulator }
    }

    /// Serves lines until EOF.
    ///
    /// An emulator error ends the connection and is returned to the caller.
    pub async fn run(self) -> Result<(), TransportError> {
        let Self { stream, mut emulator } = self;
        let terminator = emulator.terminator();
        let ack = emulator.ack();
        let (reader, mut writer) = tokio::io::split(stream);

        let frames = read_frames(reader, terminator);
        tokio::pin!(frames);

        let mut lines = 0usize;
        while let Some(frame) = frames.next().await {
            let line = frame?;
            lines += 1;
            let response = match emulator.handle(&line) {
                Ok(response) => response,
                Err(e) => {
                    tracing::error!(module = %emulator.kind(), line = %line, error = %e, "dropping connection");
                    return Err(TransportError::Emulator(e));
                }
            };
            tracing::debug!(module = %emulator.kind(), request = %line, response = ?response, "handled line");
            writer.write_all(&frame_response(response.as_deref(), terminator, ack)).await?;
            writer.flush().await?;
        }
        tracing::info!(module = %emulator.kind(), lines, "peer closed connection");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::emulator::{build_emulator, ModuleKind};

    #[tokio::test]
    async fn test_mag_deck_session() {
        let config = Config::default();
        let stream = tokio_test::io::Builder::new()
            .read(b"G0 Z10\r\n\r\n")
            .write(b"ok\r\nok\r\n")
            .read(b"M114.2\r\n\r\n")
            .write(b"Z:10\r\n\r\nok\r\nok\r\n")
            .build();
        let handler = ConnectionHandler::new(stream, build_emulator(ModuleKind::MagDeck, &config));
        handler.run().await.unwrap();
    }

    #[tokio::test]
    async fn test_malformed_line_drops_connection() {
        let config = Config::default();
        let stream = tokio_test::io::Builder::new().read(b"M104 SABC\r\n\r\n").build();
        let handler = ConnectionHandler::new(stream, build_emulator(ModuleKind::TempDeck, &config));
        assert!(matches!(handler.run().await, Err(TransportError::Emulator(_))));
    }
}
