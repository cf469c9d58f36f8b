// src/communication/server.rs - TCP listeners for emulated modules
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::Instrument;
use uuid::Uuid;

use super::connection::ConnectionHandler;
use super::TransportError;
use crate::config::Config;
use crate::emulator::{build_emulator, ModuleKind};

/// Serves each module on its own listener. Every accepted connection gets a
/// freshly built emulator; nothing is shared between connections.
#[derive(Clone)]
pub struct EmulatorServer {
    config: Arc<Config>,
}

impl EmulatorServer {
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Binds the configured host and port for `kind`.
    pub async fn bind(&self, kind: ModuleKind) -> Result<TcpListener, TransportError> {
        let addr = format!("{}:{}", self.config.server.host, self.config.port_for(kind));
        let listener = TcpListener::bind(&addr).await?;
        tracing::info!(module = %kind, addr = %listener.local_addr()?, "emulator listening");
        Ok(listener)
    }

    /// Binds and serves `kind` until the listener fails.
    pub async fn serve(&self, kind: ModuleKind) -> Result<(), TransportError> {
        let listener = self.bind(kind).await?;
        self.serve_listener(kind, listener).await
    }

    /// Accept loop over an already bound listener.
    pub async fn serve_listener(&self, kind: ModuleKind, listener: TcpListener) -> Result<(), TransportError> {
        loop {
            let (socket, peer) = listener.accept().await?;
            self.spawn_connection(kind, socket, peer);
        }
    }

    fn spawn_connection(&self, kind: ModuleKind, socket: tokio::net::TcpStream, peer: SocketAddr) {
        let connection_id = Uuid::new_v4();
        let span = tracing::info_span!("connection", module = %kind, id = %connection_id, peer = %peer);
        let emulator = build_emulator(kind, &self.config);
        tokio::spawn(
            async move {
                tracing::info!("connection accepted");
                if let Err(e) = socket.set_nodelay(true) {
                    tracing::warn!(error = %e, "could not disable nagle");
                }
                match ConnectionHandler::new(socket, emulator).run().await {
                    Ok(()) => tracing::info!("connection closed"),
                    Err(e) => tracing::error!(error = %e, "connection dropped"),
                }
            }
            .instrument(span),
        );
    }
}
