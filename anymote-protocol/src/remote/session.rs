//! Command session
//!
//! Every event is encoded with [`RemoteCommand::to_bytes`] and written as one
//! frame. Nothing is read back, so the only errors are transport errors.

use tracing::{debug, info};

use crate::codec::RemoteCommand;
use crate::proto::keycodes::{KeyAction, Keycode};
use crate::transport::{FrameTransport, TlsConnection, TransportConfig};
use crate::{CertificateInfo, Result};

/// Sends remote-control events over one connection
pub struct CommandSession<T: FrameTransport> {
    transport: T,
}

impl CommandSession<TlsConnection> {
    /// Open a TLS connection to the command port
    ///
    /// The device only accepts the connection from a paired certificate.
    pub async fn connect(
        host: &str,
        port: u16,
        local_cert: &CertificateInfo,
        config: &TransportConfig,
    ) -> Result<Self> {
        let connection = TlsConnection::connect(host, port, local_cert, config).await?;
        info!("Command session open to {}", connection.remote_addr());
        Ok(Self::new(connection))
    }
}

impl<T: FrameTransport> CommandSession<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Send any command
    pub async fn send(&mut self, command: &RemoteCommand) -> Result<()> {
        debug!("Sending {:?}", command);
        self.transport.send_frame(&command.to_bytes()).await
    }

    pub async fn key_event(&mut self, keycode: Keycode, action: KeyAction) -> Result<()> {
        self.send(&RemoteCommand::key(keycode, action)).await
    }

    /// Key down immediately followed by key up
    pub async fn press(&mut self, keycode: Keycode) -> Result<()> {
        self.key_event(keycode, KeyAction::Down).await?;
        self.key_event(keycode, KeyAction::Up).await
    }

    /// Ask the device to open `uri`
    pub async fn fling(&mut self, uri: &str) -> Result<()> {
        self.send(&RemoteCommand::fling(uri)).await
    }

    /// Move the pointer by a relative offset
    pub async fn mouse(&mut self, dx: i32, dy: i32) -> Result<()> {
        self.send(&RemoteCommand::mouse(dx, dy)).await
    }

    pub async fn scroll(&mut self, x_scroll: i32, y_scroll: i32) -> Result<()> {
        self.send(&RemoteCommand::scroll(x_scroll, y_scroll)).await
    }

    /// Release the transport; calling it again is a no-op
    pub async fn close(&mut self) -> Result<()> {
        self.transport.close().await
    }
}
