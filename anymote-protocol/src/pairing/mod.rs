//! Device pairing
//!
//! Pairing establishes trust between the client certificate and a device
//! before the command port accepts events.
//!
//! ## Pairing Protocol
//!
//! 1. **TLS Connection**: The client connects to the pairing port (9552),
//!    presenting its certificate and capturing the device certificate
//! 2. **Pairing Request**: The client names itself and the service
//! 3. **Options**: The client offers a 4 symbol hexadecimal code; the device
//!    answers with what it supports
//! 4. **Configuration**: Both sides fix the encoding and the client role
//! 5. **Secret**: The device shows a code, the user types it, and the client
//!    sends a digest binding the code to both certificates
//!
//! ## Usage
//!
//! ```no_run
//! use anymote_protocol::pairing::{PairingSession, DEFAULT_SERVICE_NAME};
//! use anymote_protocol::transport::{TransportConfig, DEFAULT_PAIRING_PORT};
//! use anymote_protocol::CertificateInfo;
//!
//! # async fn example() -> anymote_protocol::Result<()> {
//! let cert = CertificateInfo::generate("my-remote")?;
//! let mut session = PairingSession::connect(
//!     "192.168.1.20",
//!     DEFAULT_PAIRING_PORT,
//!     cert,
//!     &TransportConfig::default(),
//! )
//! .await?;
//!
//! session.send_pairing_request("my-remote", DEFAULT_SERVICE_NAME).await?;
//! session.send_options().await?;
//! session.send_default_configuration().await?;
//! let ack = session.send_secret("1A2B").await?;
//! println!("{}", hex::encode_upper(ack));
//! # Ok(())
//! # }
//! ```

pub mod secret;
pub mod session;

pub use secret::{
    code_check_matches, decode_hex_code, derive_secret, rsa_key_material, RsaKeyMaterial,
    SECRET_LENGTH,
};
pub use session::{
    PairingSession, PairingState, DEFAULT_CLIENT_ROLE, DEFAULT_ENCODING_TYPE,
    DEFAULT_SERVICE_NAME, DEFAULT_SYMBOL_LENGTH,
};
