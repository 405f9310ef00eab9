//! TLS Transport
//!
//! Opens a TCP connection to the device, runs the TLS client handshake with
//! the client certificate and exposes the session as a [`FrameTransport`].
//! The peer certificate is captured right after the handshake because the
//! pairing secret is derived from it.

use crate::{CertificateInfo, ProtocolError, Result};
use async_trait::async_trait;
use openssl::ssl::Ssl;
use std::net::SocketAddr;
use std::pin::Pin;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_openssl::SslStream;
use tracing::{debug, error, info, warn};

use super::framing::FramedStream;
use super::{tls_config, FrameTransport, TransportConfig};

/// TLS connection to a device
///
/// Dropping the connection releases the socket; [`FrameTransport::close`]
/// additionally sends the TLS close-notify and may be called any number of
/// times.
pub struct TlsConnection {
    framed: FramedStream<SslStream<TcpStream>>,
    remote_addr: SocketAddr,
    peer_certificate: Vec<u8>,
}

impl TlsConnection {
    /// Connect to `host:port` presenting `our_cert`
    ///
    /// Any socket or TLS failure, including a missed connect deadline, is
    /// reported as [`ProtocolError::Connection`]. Only a peer that fails the
    /// fingerprint pin is reported as [`ProtocolError::CertificateValidation`].
    pub async fn connect(
        host: &str,
        port: u16,
        our_cert: &CertificateInfo,
        config: &TransportConfig,
    ) -> Result<Self> {
        info!("Connecting to {}:{} via TLS", host, port);

        let connector = tls_config::create_client_config(our_cert)
            .map_err(|e| ProtocolError::Connection(format!("TLS setup failed: {}", e)))?;

        let tcp_stream = timeout(config.connect_timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| {
                ProtocolError::Connection(format!(
                    "connecting to {}:{} timed out after {:?}",
                    host, port, config.connect_timeout
                ))
            })?
            .map_err(|e| ProtocolError::Connection(format!("connecting to {}:{}: {}", host, port, e)))?;

        let remote_addr = tcp_stream
            .peer_addr()
            .map_err(|e| ProtocolError::Connection(format!("reading peer address: {}", e)))?;
        debug!("TCP connection established to {}", remote_addr);

        let ssl: Ssl = connector
            .configure()
            .map_err(|e| ProtocolError::Connection(format!("TLS setup failed: {}", e)))?
            .verify_hostname(false)
            .into_ssl(host)
            .map_err(|e| ProtocolError::Connection(format!("TLS setup failed: {}", e)))?;

        let mut tls_stream = SslStream::new(ssl, tcp_stream)
            .map_err(|e| ProtocolError::Connection(format!("TLS setup failed: {}", e)))?;

        timeout(config.connect_timeout, Pin::new(&mut tls_stream).connect())
            .await
            .map_err(|_| {
                ProtocolError::Connection(format!(
                    "TLS handshake with {} timed out after {:?}",
                    remote_addr, config.connect_timeout
                ))
            })?
            .map_err(|e| {
                error!("TLS handshake failed: {}", e);
                ProtocolError::Connection(format!("TLS handshake with {} failed: {}", remote_addr, e))
            })?;

        let peer_certificate = tls_stream
            .ssl()
            .peer_certificate()
            .ok_or_else(|| {
                ProtocolError::Connection(format!("{} presented no certificate", remote_addr))
            })?
            .to_der()
            .map_err(|e| {
                ProtocolError::Connection(format!("unreadable certificate from {}: {}", remote_addr, e))
            })?;

        let peer_fingerprint = CertificateInfo::calculate_fingerprint(&peer_certificate);
        if let Some(pinned) = &config.pinned_peer_fingerprint {
            if !pinned.eq_ignore_ascii_case(&peer_fingerprint) {
                warn!(
                    "Peer {} fingerprint {} does not match pinned {}",
                    remote_addr, peer_fingerprint, pinned
                );
                return Err(ProtocolError::CertificateValidation(format!(
                    "peer fingerprint {} does not match pinned fingerprint",
                    peer_fingerprint
                )));
            }
        }

        info!(
            "TLS connection established to {} (peer fingerprint {})",
            remote_addr, peer_fingerprint
        );

        Ok(Self {
            framed: FramedStream::new(tls_stream).with_read_timeout(config.read_timeout),
            remote_addr,
            peer_certificate,
        })
    }

    /// Get remote address
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// DER-encoded certificate the device presented during the handshake
    pub fn peer_certificate(&self) -> &[u8] {
        &self.peer_certificate
    }

    pub fn is_closed(&self) -> bool {
        self.framed.is_closed()
    }
}

#[async_trait]
impl FrameTransport for TlsConnection {
    async fn send_frame(&mut self, payload: &[u8]) -> Result<()> {
        debug!("Sending {} bytes to {}", payload.len(), self.remote_addr);
        self.framed.send_frame(payload).await
    }

    async fn receive_frame(&mut self) -> Result<Vec<u8>> {
        debug!("Waiting for frame from {}", self.remote_addr);
        self.framed.receive_frame().await
    }

    async fn close(&mut self) -> Result<()> {
        if self.framed.is_closed() {
            return Ok(());
        }
        debug!("Closing TLS connection to {}", self.remote_addr);
        self.framed.close().await
    }
}

impl Drop for TlsConnection {
    fn drop(&mut self) {
        if !self.framed.is_closed() {
            debug!("Dropping open TLS connection to {}", self.remote_addr);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::framing::{read_frame, write_frame};
    use openssl::pkey::PKey;
    use openssl::ssl::{SslAcceptor, SslMethod, SslVerifyMode};
    use openssl::x509::X509;
    use tokio::net::TcpListener;

    /// Minimal TLS echo device that asks for a client certificate
    async fn spawn_echo_device(
        device_cert: CertificateInfo,
    ) -> (u16, tokio::task::JoinHandle<Vec<u8>>) {
        let mut builder = SslAcceptor::mozilla_intermediate_v5(SslMethod::tls_server()).unwrap();
        builder
            .set_certificate(&X509::from_der(&device_cert.certificate).unwrap())
            .unwrap();
        builder
            .set_private_key(&PKey::private_key_from_der(&device_cert.private_key).unwrap())
            .unwrap();
        builder.set_verify_callback(SslVerifyMode::PEER, |_, _| true);
        let acceptor = builder.build();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let task = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let ssl = Ssl::new(acceptor.context()).unwrap();
            let mut stream = SslStream::new(ssl, tcp).unwrap();
            Pin::new(&mut stream).accept().await.unwrap();

            let client_cert = stream.ssl().peer_certificate().unwrap().to_der().unwrap();
            let frame = read_frame(&mut stream).await.unwrap();
            write_frame(&mut stream, &frame).await.unwrap();
            client_cert
        });

        (port, task)
    }

    #[tokio::test]
    async fn test_tls_frame_echo_and_peer_certificate() {
        let client_cert = CertificateInfo::generate("client").unwrap();
        let device_cert = CertificateInfo::generate("device").unwrap();
        let (port, device) = spawn_echo_device(device_cert.clone()).await;

        let mut conn =
            TlsConnection::connect("127.0.0.1", port, &client_cert, &TransportConfig::default())
                .await
                .unwrap();
        assert_eq!(conn.peer_certificate(), device_cert.certificate.as_slice());

        conn.send_frame(b"hello").await.unwrap();
        assert_eq!(conn.receive_frame().await.unwrap(), b"hello");

        conn.close().await.unwrap();
        conn.close().await.unwrap();
        assert!(conn.is_closed());

        // The device saw our certificate
        assert_eq!(device.await.unwrap(), client_cert.certificate);
    }

    #[tokio::test]
    async fn test_pin_mismatch_rejected() {
        let client_cert = CertificateInfo::generate("client").unwrap();
        let device_cert = CertificateInfo::generate("device").unwrap();
        let (port, _device) = spawn_echo_device(device_cert).await;

        let config = TransportConfig {
            pinned_peer_fingerprint: Some(client_cert.fingerprint.clone()),
            ..TransportConfig::default()
        };
        let result = TlsConnection::connect("127.0.0.1", port, &client_cert, &config).await;
        assert!(matches!(result, Err(ProtocolError::CertificateValidation(_))));
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let client_cert = CertificateInfo::generate("client").unwrap();
        let result =
            TlsConnection::connect("127.0.0.1", port, &client_cert, &TransportConfig::default())
                .await;
        assert!(matches!(result, Err(ProtocolError::Connection(_))));
    }

    #[tokio::test]
    async fn test_silent_device_times_out_as_connection_error() {
        // Accepts TCP but never answers the TLS handshake
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let _device = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            drop(tcp);
        });

        let client_cert = CertificateInfo::generate("client").unwrap();
        let config = TransportConfig {
            connect_timeout: std::time::Duration::from_millis(200),
            ..TransportConfig::default()
        };
        match TlsConnection::connect("127.0.0.1", port, &client_cert, &config).await {
            Err(ProtocolError::Connection(msg)) => assert!(msg.contains("timed out")),
            Err(other) => panic!("expected a connection error, got {:?}", other),
            Ok(_) => panic!("handshake should not complete"),
        }
    }

    #[tokio::test]
    async fn test_unusable_client_certificate_is_connection_error() {
        let a = CertificateInfo::generate("a").unwrap();
        let b = CertificateInfo::generate("b").unwrap();
        let mismatched = CertificateInfo {
            private_key: b.private_key,
            ..a
        };
        let result =
            TlsConnection::connect("127.0.0.1", 1, &mismatched, &TransportConfig::default()).await;
        assert!(matches!(result, Err(ProtocolError::Connection(_))));
    }
}
