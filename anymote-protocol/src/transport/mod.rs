//! Transport Layer
//!
//! Both protocols run over TLS and send envelopes as length-prefixed frames.
//! [`FrameTransport`] is the seam the pairing and command sessions are
//! written against: [`TlsConnection`] implements it for real devices and
//! [`FramedStream`] for any in-memory stream.

pub mod framing;
pub mod tls;
pub mod tls_config;

use crate::Result;
use async_trait::async_trait;
use tokio::time::Duration;

pub use framing::{read_frame, write_frame, FramedStream, MAX_FRAME_SIZE};
pub use tls::TlsConnection;

/// Default port of the pairing protocol
pub const DEFAULT_PAIRING_PORT: u16 = 9552;

/// Default port of the command protocol
pub const DEFAULT_COMMAND_PORT: u16 = 9551;

/// Default timeout for establishing TCP and TLS
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Sends and receives whole frames
#[async_trait]
pub trait FrameTransport: Send {
    /// Send `payload` as one frame
    async fn send_frame(&mut self, payload: &[u8]) -> Result<()>;

    /// Wait for the next frame and return its payload
    async fn receive_frame(&mut self) -> Result<Vec<u8>>;

    /// Release the connection; calling it again is a no-op
    async fn close(&mut self) -> Result<()>;
}

#[async_trait]
impl<T: FrameTransport + ?Sized> FrameTransport for Box<T> {
    async fn send_frame(&mut self, payload: &[u8]) -> Result<()> {
        (**self).send_frame(payload).await
    }

    async fn receive_frame(&mut self) -> Result<Vec<u8>> {
        (**self).receive_frame().await
    }

    async fn close(&mut self) -> Result<()> {
        (**self).close().await
    }
}

/// Connection settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Deadline for TCP connect and TLS handshake, each
    pub connect_timeout: Duration,

    /// Deadline for receiving one frame; `None` waits indefinitely
    pub read_timeout: Option<Duration>,

    /// When set, the device certificate must have this SHA-256 fingerprint
    /// (`XX:XX:..` format, case-insensitive)
    pub pinned_peer_fingerprint: Option<String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: None,
            pinned_peer_fingerprint: None,
        }
    }
}
