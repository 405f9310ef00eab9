//! Anymote Protocol Implementation
//!
//! This library implements the client side of the two protocols used to
//! remote-control a networked TV device:
//!
//! - the **pairing protocol** (port 9552), which binds a client certificate
//!   to the device through a code shown on screen, and
//! - the **command protocol** (port 9551), which carries key presses,
//!   pointer motion and URL launches once paired.
//!
//! Both run over mutually-certificated TLS and exchange length-prefixed
//! protocol buffer envelopes.

pub mod certificate;
pub mod codec;
pub mod pairing;
pub mod proto;
pub mod remote;
pub mod transport;

mod error;
pub use certificate::CertificateInfo;
pub use codec::{Envelope, PairingMessage, RemoteCommand};
pub use error::{ProtocolError, Result};
pub use pairing::{PairingSession, PairingState};
pub use proto::{KeyAction, Keycode, MessageType, Status, PROTOCOL_VERSION};
pub use remote::CommandSession;
pub use transport::{FrameTransport, FramedStream, TlsConnection, TransportConfig};
