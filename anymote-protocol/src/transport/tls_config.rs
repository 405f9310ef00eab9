//! TLS client configuration
//!
//! Devices present self-signed certificates and expect the client to
//! present its own certificate, so the connector carries the client
//! certificate and skips chain verification.

use crate::{CertificateInfo, ProtocolError, Result};
use openssl::pkey::PKey;
use openssl::ssl::{SslConnector, SslMethod, SslVerifyMode};
use openssl::x509::X509;
use std::sync::Arc;
use tracing::debug;

/// Create a TLS connector presenting `our_cert` during the handshake
///
/// The peer certificate chain is not verified; pinning, when wanted, is
/// applied after the handshake by [`super::TlsConnection::connect`].
pub fn create_client_config(our_cert: &CertificateInfo) -> Result<Arc<SslConnector>> {
    debug!("Creating TLS client config for {}", our_cert.common_name);

    let mut connector_builder = SslConnector::builder(SslMethod::tls_client()).map_err(|e| {
        ProtocolError::CertificateValidation(format!("Failed to create SSL connector: {}", e))
    })?;

    // Devices use self-signed certificates
    connector_builder.set_verify(SslVerifyMode::NONE);

    let cert = X509::from_der(&our_cert.certificate).map_err(|e| {
        ProtocolError::CertificateValidation(format!("Failed to parse certificate: {}", e))
    })?;

    let pkey = PKey::private_key_from_der(&our_cert.private_key).map_err(|e| {
        ProtocolError::CertificateValidation(format!("Failed to parse private key: {}", e))
    })?;

    connector_builder.set_certificate(&cert).map_err(|e| {
        ProtocolError::CertificateValidation(format!("Failed to set certificate: {}", e))
    })?;

    connector_builder.set_private_key(&pkey).map_err(|e| {
        ProtocolError::CertificateValidation(format!("Failed to set private key: {}", e))
    })?;

    connector_builder.check_private_key().map_err(|e| {
        ProtocolError::CertificateValidation(format!("Private key does not match certificate: {}", e))
    })?;

    Ok(Arc::new(connector_builder.build()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_client_config() {
        let our_cert = CertificateInfo::generate("device1").unwrap();
        assert!(create_client_config(&our_cert).is_ok());
    }

    #[test]
    fn test_mismatched_key_rejected() {
        let a = CertificateInfo::generate("a").unwrap();
        let b = CertificateInfo::generate("b").unwrap();
        let franken = CertificateInfo {
            private_key: b.private_key,
            ..a
        };
        assert!(matches!(
            create_client_config(&franken),
            Err(ProtocolError::CertificateValidation(_))
        ));
    }
}
