//! Length-prefixed framing
//!
//! Both protocols send each envelope as a 4-byte big-endian length followed
//! by exactly that many bytes.

use crate::{ProtocolError, Result};
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{timeout, Duration};
use tracing::{debug, error};

use super::FrameTransport;

/// Size of the length prefix
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Maximum frame payload size (1MB)
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Write one frame: length prefix then payload, flushed
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    // The receive-side cap applies to what we send too
    if payload.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::Framing(format!(
            "refusing to send {} byte frame (max: {})",
            payload.len(),
            MAX_FRAME_SIZE
        )));
    }

    let len = payload.len() as u32;
    let mut frame = Vec::with_capacity(LENGTH_PREFIX_SIZE + payload.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(payload);

    // write_all reports WriteZero when the peer stops accepting bytes
    writer
        .write_all(&frame)
        .await
        .map_err(|e| ProtocolError::from_frame_io(e, "writing frame"))?;
    writer
        .flush()
        .await
        .map_err(|e| ProtocolError::from_frame_io(e, "flushing frame"))?;

    debug!("Wrote frame ({} payload bytes)", payload.len());
    Ok(())
}

/// Read one frame and return its payload
pub async fn read_frame<R>(reader: &mut R) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut len_bytes = [0u8; LENGTH_PREFIX_SIZE];
    reader
        .read_exact(&mut len_bytes)
        .await
        .map_err(|e| ProtocolError::from_frame_io(e, "reading frame length"))?;

    let len = u32::from_be_bytes(len_bytes) as usize;
    if len > MAX_FRAME_SIZE {
        error!("Frame too large: {} bytes", len);
        return Err(ProtocolError::PacketSizeExceeded(len, MAX_FRAME_SIZE));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await.map_err(|e| {
        ProtocolError::from_frame_io(e, &format!("reading {}-byte frame payload", len))
    })?;

    debug!("Read frame ({} payload bytes)", len);
    Ok(payload)
}

/// Framed transport over any byte stream
///
/// Used for loopback connections in tests and by [`super::TlsConnection`]
/// for the TLS stream.
pub struct FramedStream<S> {
    stream: S,
    read_timeout: Option<Duration>,
    closed: bool,
}

impl<S> FramedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            read_timeout: None,
            closed: false,
        }
    }

    /// Bound how long `receive_frame` waits for a full frame
    pub fn with_read_timeout(mut self, read_timeout: Option<Duration>) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(ProtocolError::Connection("connection already closed".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl<S> FrameTransport for FramedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn send_frame(&mut self, payload: &[u8]) -> Result<()> {
        self.ensure_open()?;
        write_frame(&mut self.stream, payload).await
    }

    async fn receive_frame(&mut self) -> Result<Vec<u8>> {
        self.ensure_open()?;
        match self.read_timeout {
            Some(limit) => timeout(limit, read_frame(&mut self.stream))
                .await
                .map_err(|_| ProtocolError::Timeout(format!("no frame within {:?}", limit)))?,
            None => read_frame(&mut self.stream).await,
        }
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.stream
            .shutdown()
            .await
            .map_err(|e| ProtocolError::Connection(format!("shutdown failed: {}", e)))
    }
}
