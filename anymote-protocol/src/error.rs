//! Error handling for the Anymote and Polo protocols
//!
//! Every fallible operation in this crate returns [`Result`], an alias for
//! `Result<T, ProtocolError>`. Errors from the underlying libraries (I/O,
//! OpenSSL, prost) convert automatically through `From`, so `?` works across
//! the transport, codec and pairing layers.
//!
//! ## Error Matching
//!
//! ```rust,no_run
//! use anymote_protocol::{MessageType, ProtocolError, Result};
//!
//! # async fn example(session: &mut anymote_protocol::PairingSession<anymote_protocol::TlsConnection>) -> Result<()> {
//! match session.send_pairing_request("living-room", "AnyMote").await {
//!     Ok(ack) => println!("Device answered: {:?}", ack.server_name),
//!     Err(ProtocolError::ProtocolMismatch { actual, expected }) => {
//!         eprintln!("Device replied with {:?} instead of {:?}", actual, expected);
//!     }
//!     Err(e) => return Err(e),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Categories
//!
//! ### Transport
//! `Connection`, `Framing`, `Timeout`, `Io` and `PacketSizeExceeded` come from
//! the socket, the TLS session or the length-prefixed framing.
//!
//! ### Codec
//! `Decode` is raised when an envelope carries an unknown message type or a
//! payload that does not parse against its schema.
//!
//! ### Pairing
//! `ProtocolMismatch`, `PeerRejected`, `InvalidState` and `Pairing` are raised
//! by the pairing state machine and the secret derivation.
//!
//! ### Certificates
//! `Certificate`, `CertificateValidation` and `Tls` come from OpenSSL.

use crate::proto::polo::{MessageType, Status};
use thiserror::Error;

/// Result type for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors that can occur during protocol operations
///
/// # Examples
///
/// ```rust
/// use anymote_protocol::{MessageType, ProtocolError};
///
/// let error = ProtocolError::ProtocolMismatch {
///     actual: MessageType::SecretAck,
///     expected: MessageType::PairingRequestAck,
/// };
/// assert_eq!(
///     error.to_string(),
///     "Protocol mismatch: received SecretAck, expected PairingRequestAck"
/// );
///
/// let error = ProtocolError::InvalidArgument("odd-length code".to_string());
/// assert_eq!(error.to_string(), "Invalid argument: odd-length code");
/// ```
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// I/O error not attributable to a more specific category
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS session error
    ///
    /// Automatically converted from `openssl::ssl::Error`.
    #[error("TLS error: {0}")]
    Tls(#[from] openssl::ssl::Error),

    /// Certificate generation, parsing or key handling error
    ///
    /// Automatically converted from `openssl::error::ErrorStack`.
    #[error("Certificate error: {0}")]
    Certificate(#[from] openssl::error::ErrorStack),

    /// The device certificate does not match the pinned fingerprint, or the
    /// client certificate and key do not belong together
    #[error("Certificate validation error: {0}")]
    CertificateValidation(String),

    /// Failure to open or negotiate a connection
    ///
    /// Raised by `connect` for any socket or TLS failure, including a missed
    /// connect deadline, and by sends on a closed connection.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Length-prefixed framing failure
    ///
    /// The peer closed the stream before a full frame was transferred, or a
    /// write did not transfer the full frame.
    #[error("Framing error: {0}")]
    Framing(String),

    /// Envelope or payload could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// The peer answered a pairing step with the wrong message type
    #[error("Protocol mismatch: received {actual:?}, expected {expected:?}")]
    ProtocolMismatch {
        /// Type tag carried by the received envelope
        actual: MessageType,
        /// Acknowledgement type the current step waits for
        expected: MessageType,
    },

    /// The peer answered with a non-OK status
    #[error("Peer rejected the request with status {0:?}")]
    PeerRejected(Status),

    /// A pairing step was invoked out of sequence
    #[error("Invalid pairing state: expected {expected}, currently {actual}")]
    InvalidState {
        /// State the step requires
        expected: &'static str,
        /// State the session is in
        actual: &'static str,
    },

    /// Secret derivation failed (unusable certificate key material)
    #[error("Pairing error: {0}")]
    Pairing(String),

    /// Malformed caller-supplied argument (e.g. pairing code)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// No frame arrived within the configured read timeout
    #[error("Timeout: {0}")]
    Timeout(String),

    /// The peer announced a frame length above `MAX_FRAME_SIZE`
    #[error("Frame size exceeded: {0} bytes (max: {1})")]
    PacketSizeExceeded(usize, usize),
}

impl From<prost::DecodeError> for ProtocolError {
    fn from(error: prost::DecodeError) -> Self {
        ProtocolError::Decode(error.to_string())
    }
}

impl ProtocolError {
    /// Classify an I/O error raised while reading or writing a frame
    pub fn from_frame_io(error: std::io::Error, context: &str) -> Self {
        use std::io::ErrorKind;

        match error.kind() {
            ErrorKind::TimedOut => ProtocolError::Timeout(format!("{}: {}", context, error)),
            ErrorKind::UnexpectedEof
            | ErrorKind::WriteZero
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe => ProtocolError::Framing(format!("{}: {}", context, error)),
            _ => ProtocolError::Io(error),
        }
    }

    /// Check if this error is recoverable by reconnecting and resending
    ///
    /// # Examples
    ///
    /// ```rust
    /// use anymote_protocol::ProtocolError;
    ///
    /// let error = ProtocolError::Framing("peer closed".to_string());
    /// assert!(error.is_recoverable());
    ///
    /// let error = ProtocolError::InvalidArgument("bad code".to_string());
    /// assert!(!error.is_recoverable());
    /// ```
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ProtocolError::Timeout(_)
                | ProtocolError::Connection(_)
                | ProtocolError::Framing(_)
                | ProtocolError::Io(_)
        )
    }

    /// Get a user-friendly error message suitable for display
    pub fn user_message(&self) -> String {
        match self {
            ProtocolError::Connection(msg) => {
                format!("Could not connect: {}. Check the host and port.", msg)
            }
            ProtocolError::Timeout(msg) => {
                format!("Connection timeout: {}. Check network connection.", msg)
            }
            ProtocolError::Framing(msg) => {
                format!("Connection interrupted: {}.", msg)
            }
            ProtocolError::Decode(msg) => format!("Invalid data received: {}.", msg),
            ProtocolError::ProtocolMismatch { actual, expected } => format!(
                "Device sent {:?} while {:?} was expected. Restart pairing.",
                actual, expected
            ),
            ProtocolError::PeerRejected(Status::BadSecret) => {
                "The device rejected the code. Check the code on screen and retry.".to_string()
            }
            ProtocolError::PeerRejected(status) => {
                format!("The device rejected the request ({:?}).", status)
            }
            ProtocolError::InvalidState { expected, actual } => format!(
                "Pairing steps called out of order (in {}, needs {}).",
                actual, expected
            ),
            ProtocolError::Pairing(msg) => {
                format!("Pairing failed: {}. You may need a new certificate.", msg)
            }
            ProtocolError::InvalidArgument(msg) => format!("Invalid input: {}.", msg),
            ProtocolError::PacketSizeExceeded(size, max) => {
                format!("Frame too large ({} bytes, max {} bytes).", size, max)
            }
            ProtocolError::CertificateValidation(msg) => {
                format!("Certificate validation failed: {}. You may need to re-pair.", msg)
            }
            ProtocolError::Io(e) => format!("I/O error: {}.", e),
            ProtocolError::Tls(e) => format!("Secure connection error: {}.", e),
            ProtocolError::Certificate(e) => format!("Certificate error: {}.", e),
        }
    }
}
