//! Pairing session
//!
//! Drives the client side of the pairing exchange. Each step sends one
//! message and waits for the one reply that may follow it:
//!
//! | step                     | sends            | expects             |
//! |--------------------------|------------------|---------------------|
//! | `send_pairing_request`   | `PairingRequest` | `PairingRequestAck` |
//! | `send_options`           | `Options`        | `Options`           |
//! | `send_configuration`     | `Configuration`  | `ConfigurationAck`  |
//! | `send_secret`            | `Secret`         | `SecretAck`         |
//!
//! A step called out of order fails with [`ProtocolError::InvalidState`]
//! before anything is written, and so does a code that is not hexadecimal.
//! Once a step has started, any failure leaves the session in
//! [`PairingState::Failed`]; the caller starts over with a new connection.

use serde::Serialize;
use tracing::{debug, info, warn};

use super::secret::{code_check_matches, decode_hex_code, derive_secret};
use crate::codec::{self, PairingMessage};
use crate::proto::polo::{
    Configuration, ConfigurationAck, Encoding, EncodingType, MessageType, Options, PairingRequest,
    PairingRequestAck, RoleType, Secret, Status,
};
use crate::transport::{FrameTransport, TlsConnection, TransportConfig};
use crate::{CertificateInfo, ProtocolError, Result};

/// Service name sent with the pairing request
pub const DEFAULT_SERVICE_NAME: &str = "AnyMote";

/// Encoding offered and configured unless the caller picks another
pub const DEFAULT_ENCODING_TYPE: EncodingType = EncodingType::Hexadecimal;

/// Number of symbols in the on-screen code
pub const DEFAULT_SYMBOL_LENGTH: u32 = 4;

/// The client enters the code the device displays
pub const DEFAULT_CLIENT_ROLE: RoleType = RoleType::Input;

/// Progress of a pairing session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PairingState {
    Init,
    RequestSent,
    RequestAcked,
    OptionsSent,
    OptionsAcked,
    ConfigurationSent,
    ConfigurationAcked,
    SecretSent,
    /// The device accepted the secret
    Completed,
    /// A step failed; the session cannot continue
    Failed,
}

impl PairingState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PairingState::Init => "Init",
            PairingState::RequestSent => "RequestSent",
            PairingState::RequestAcked => "RequestAcked",
            PairingState::OptionsSent => "OptionsSent",
            PairingState::OptionsAcked => "OptionsAcked",
            PairingState::ConfigurationSent => "ConfigurationSent",
            PairingState::ConfigurationAcked => "ConfigurationAcked",
            PairingState::SecretSent => "SecretSent",
            PairingState::Completed => "Completed",
            PairingState::Failed => "Failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PairingState::Completed | PairingState::Failed)
    }
}

impl std::fmt::Display for PairingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Client side of one pairing exchange
pub struct PairingSession<T: FrameTransport> {
    transport: T,
    local_cert: CertificateInfo,
    peer_cert: Vec<u8>,
    state: PairingState,
}

impl PairingSession<TlsConnection> {
    /// Open a TLS connection to the pairing port and start a session on it
    pub async fn connect(
        host: &str,
        port: u16,
        local_cert: CertificateInfo,
        config: &TransportConfig,
    ) -> Result<Self> {
        let connection = TlsConnection::connect(host, port, &local_cert, config).await?;
        let peer_cert = connection.peer_certificate().to_vec();
        Ok(Self::new(connection, local_cert, peer_cert))
    }
}

impl<T: FrameTransport> PairingSession<T> {
    /// Start a session on an established transport
    ///
    /// `peer_cert` is the DER certificate the device presented; the secret is
    /// bound to it.
    pub fn new(transport: T, local_cert: CertificateInfo, peer_cert: Vec<u8>) -> Self {
        Self {
            transport,
            local_cert,
            peer_cert,
            state: PairingState::Init,
        }
    }

    pub fn state(&self) -> PairingState {
        self.state
    }

    pub fn peer_certificate(&self) -> &[u8] {
        &self.peer_cert
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Announce the client and the service it wants to pair with
    pub async fn send_pairing_request(
        &mut self,
        client_name: &str,
        service_name: &str,
    ) -> Result<PairingRequestAck> {
        info!(
            "Sending pairing request (client '{}', service '{}')",
            client_name, service_name
        );
        let request = PairingMessage::PairingRequest(PairingRequest {
            service_name: service_name.to_string(),
            client_name: Some(client_name.to_string()),
        });

        let ack = self
            .step(
                PairingState::Init,
                PairingState::RequestSent,
                request,
                MessageType::PairingRequestAck,
                |reply| match reply {
                    PairingMessage::PairingRequestAck(ack) => Some(ack),
                    _ => None,
                },
            )
            .await?;
        self.state = PairingState::RequestAcked;
        info!(
            "Pairing request acknowledged by '{}'",
            ack.server_name.as_deref().unwrap_or("unnamed device")
        );
        Ok(ack)
    }

    /// Offer the hexadecimal input encoding and return the device's options
    pub async fn send_options(&mut self) -> Result<Options> {
        let offer = PairingMessage::Options(Options {
            input_encodings: vec![Encoding::new(DEFAULT_ENCODING_TYPE, DEFAULT_SYMBOL_LENGTH)],
            output_encodings: Vec::new(),
            preferred_role: Some(DEFAULT_CLIENT_ROLE as i32),
        });

        let options = self
            .step(
                PairingState::RequestAcked,
                PairingState::OptionsSent,
                offer,
                MessageType::Options,
                |reply| match reply {
                    PairingMessage::Options(options) => Some(options),
                    _ => None,
                },
            )
            .await?;
        self.state = PairingState::OptionsAcked;
        debug!(
            "Device options: {} input, {} output encodings",
            options.input_encodings.len(),
            options.output_encodings.len()
        );
        Ok(options)
    }

    /// Fix the encoding and the client role
    pub async fn send_configuration(
        &mut self,
        encoding_type: EncodingType,
        symbol_length: u32,
        client_role: RoleType,
    ) -> Result<ConfigurationAck> {
        debug!(
            "Configuring {:?} encoding, {} symbols, role {:?}",
            encoding_type, symbol_length, client_role
        );
        let configuration = PairingMessage::Configuration(Configuration::new(
            encoding_type,
            symbol_length,
            client_role,
        ));

        let ack = self
            .step(
                PairingState::OptionsAcked,
                PairingState::ConfigurationSent,
                configuration,
                MessageType::ConfigurationAck,
                |reply| match reply {
                    PairingMessage::ConfigurationAck(ack) => Some(ack),
                    _ => None,
                },
            )
            .await?;
        self.state = PairingState::ConfigurationAcked;
        Ok(ack)
    }

    /// [`send_configuration`](Self::send_configuration) with the hexadecimal,
    /// four symbol, input role defaults
    pub async fn send_default_configuration(&mut self) -> Result<ConfigurationAck> {
        self.send_configuration(DEFAULT_ENCODING_TYPE, DEFAULT_SYMBOL_LENGTH, DEFAULT_CLIENT_ROLE)
            .await
    }

    /// Prove knowledge of the on-screen `code`
    ///
    /// Returns the secret carried by the device's acknowledgement. A code
    /// that is not hexadecimal fails with [`ProtocolError::InvalidArgument`]
    /// and leaves the session in `ConfigurationAcked`, so the caller can ask
    /// for the code again.
    pub async fn send_secret(&mut self, code: &str) -> Result<Vec<u8>> {
        self.require(PairingState::ConfigurationAcked)?;

        let digest = match self.digest_for(code) {
            Ok(digest) => digest,
            Err(e @ ProtocolError::InvalidArgument(_)) => return Err(e),
            Err(e) => return Err(self.fail(e)),
        };
        let secret = PairingMessage::Secret(Secret {
            secret: digest.to_vec(),
        });

        let ack = self
            .step(
                PairingState::ConfigurationAcked,
                PairingState::SecretSent,
                secret,
                MessageType::SecretAck,
                |reply| match reply {
                    PairingMessage::SecretAck(ack) => Some(ack),
                    _ => None,
                },
            )
            .await?;
        self.state = PairingState::Completed;
        info!("Pairing completed");
        Ok(ack.secret)
    }

    /// Release the transport; calling it again is a no-op
    pub async fn close(&mut self) -> Result<()> {
        self.transport.close().await
    }

    fn digest_for(&self, code: &str) -> Result<[u8; 32]> {
        let code_bytes = decode_hex_code(code)?;
        let digest = derive_secret(code, &self.local_cert.certificate, &self.peer_cert)?;
        if !code_check_matches(&code_bytes, &digest) {
            warn!("Pairing code check value does not match; the code was probably mistyped");
        }
        Ok(digest)
    }

    fn require(&self, expected: PairingState) -> Result<()> {
        if self.state != expected {
            return Err(ProtocolError::InvalidState {
                expected: expected.as_str(),
                actual: self.state.as_str(),
            });
        }
        Ok(())
    }

    fn fail(&mut self, error: ProtocolError) -> ProtocolError {
        warn!("Pairing failed in state {}: {}", self.state, error);
        self.state = PairingState::Failed;
        error
    }

    /// Send `message` from state `from` and unwrap the reply with `accept`
    ///
    /// A reply `accept` does not take is a [`ProtocolError::ProtocolMismatch`]
    /// against `expected`. Every error after the state check fails the session.
    async fn step<R>(
        &mut self,
        from: PairingState,
        sent: PairingState,
        message: PairingMessage,
        expected: MessageType,
        accept: fn(PairingMessage) -> Option<R>,
    ) -> Result<R> {
        self.require(from)?;

        let reply = match self.exchange(sent, message).await {
            Ok(reply) => reply,
            Err(e) => return Err(self.fail(e)),
        };

        let actual = reply.message_type();
        match accept(reply) {
            Some(value) => {
                debug!("Received {:?}", actual);
                Ok(value)
            }
            None => Err(self.fail(ProtocolError::ProtocolMismatch { actual, expected })),
        }
    }

    /// Write `message`, enter `sent` and read back an OK reply
    async fn exchange(
        &mut self,
        sent: PairingState,
        message: PairingMessage,
    ) -> Result<PairingMessage> {
        debug!("Sending {:?}", message.message_type());
        self.transport
            .send_frame(&codec::encode_to_vec(message))
            .await?;
        self.state = sent;

        let bytes = self.transport.receive_frame().await?;
        let status = codec::decode_status(&bytes)?;
        if status != Status::Ok {
            return Err(ProtocolError::PeerRejected(status));
        }

        Ok(codec::decode(&bytes)?.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::polo::{OuterMessage, SecretAck};
    use crate::transport::FramedStream;
    use prost::Message;
    use tokio::io::{duplex, DuplexStream};

    type Device = FramedStream<DuplexStream>;

    fn session_pair() -> (PairingSession<FramedStream<DuplexStream>>, Device, CertificateInfo) {
        let (client, device) = duplex(8192);
        let local = CertificateInfo::generate("client").unwrap();
        let peer = CertificateInfo::generate("device").unwrap();
        let session = PairingSession::new(FramedStream::new(client), local, peer.certificate.clone());
        (session, FramedStream::new(device), peer)
    }

    async fn expect(device: &mut Device, expected: MessageType) -> PairingMessage {
        let envelope = codec::decode(&device.receive_frame().await.unwrap()).unwrap();
        assert_eq!(envelope.message_type(), expected);
        envelope.message
    }

    async fn reply(device: &mut Device, message: PairingMessage) {
        device.send_frame(&codec::encode_to_vec(message)).await.unwrap();
    }

    fn request_ack() -> PairingMessage {
        PairingMessage::PairingRequestAck(PairingRequestAck {
            server_name: Some("Living Room TV".to_string()),
        })
    }

    fn device_options() -> PairingMessage {
        PairingMessage::Options(Options {
            input_encodings: vec![Encoding::new(EncodingType::Hexadecimal, 4)],
            output_encodings: vec![],
            preferred_role: Some(RoleType::Input as i32),
        })
    }

    #[tokio::test]
    async fn test_full_pairing() {
        let (mut session, mut device, peer) = session_pair();
        let local_der = session.local_cert.certificate.clone();

        let device_task = tokio::spawn(async move {
            match expect(&mut device, MessageType::PairingRequest).await {
                PairingMessage::PairingRequest(req) => {
                    assert_eq!(req.service_name, DEFAULT_SERVICE_NAME);
                    assert_eq!(req.client_name.as_deref(), Some("rust-test"));
                }
                other => panic!("unexpected {:?}", other),
            }
            reply(&mut device, request_ack()).await;

            match expect(&mut device, MessageType::Options).await {
                PairingMessage::Options(offer) => {
                    assert_eq!(
                        offer.input_encodings,
                        vec![Encoding::new(EncodingType::Hexadecimal, 4)]
                    );
                    assert_eq!(offer.preferred_role, Some(RoleType::Input as i32));
                }
                other => panic!("unexpected {:?}", other),
            }
            reply(&mut device, device_options()).await;

            match expect(&mut device, MessageType::Configuration).await {
                PairingMessage::Configuration(config) => {
                    assert_eq!(
                        config,
                        Configuration::new(EncodingType::Hexadecimal, 4, RoleType::Input)
                    );
                }
                other => panic!("unexpected {:?}", other),
            }
            reply(&mut device, PairingMessage::ConfigurationAck(ConfigurationAck {})).await;

            let secret = match expect(&mut device, MessageType::Secret).await {
                PairingMessage::Secret(secret) => secret.secret,
                other => panic!("unexpected {:?}", other),
            };
            let expected = derive_secret("1A2B", &local_der, &peer.certificate).unwrap();
            assert_eq!(secret, expected.to_vec());
            reply(
                &mut device,
                PairingMessage::SecretAck(SecretAck {
                    secret: vec![0xCA, 0xFE],
                }),
            )
            .await;
        });

        let ack = session
            .send_pairing_request("rust-test", DEFAULT_SERVICE_NAME)
            .await
            .unwrap();
        assert_eq!(ack.server_name.as_deref(), Some("Living Room TV"));
        assert_eq!(session.state(), PairingState::RequestAcked);

        session.send_options().await.unwrap();
        assert_eq!(session.state(), PairingState::OptionsAcked);

        session.send_default_configuration().await.unwrap();
        assert_eq!(session.state(), PairingState::ConfigurationAcked);

        let ack_secret = session.send_secret("1A2B").await.unwrap();
        assert_eq!(ack_secret, vec![0xCA, 0xFE]);
        assert_eq!(session.state(), PairingState::Completed);
        assert!(session.state().is_terminal());

        device_task.await.unwrap();
        session.close().await.unwrap();
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_wrong_ack_for_request() {
        let (mut session, mut device, _) = session_pair();

        let device_task = tokio::spawn(async move {
            expect(&mut device, MessageType::PairingRequest).await;
            reply(
                &mut device,
                PairingMessage::SecretAck(SecretAck { secret: vec![] }),
            )
            .await;
        });

        let err = session
            .send_pairing_request("rust-test", DEFAULT_SERVICE_NAME)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::ProtocolMismatch {
                actual: MessageType::SecretAck,
                expected: MessageType::PairingRequestAck,
            }
        ));
        assert_eq!(session.state(), PairingState::Failed);
        device_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_wrong_ack_for_options() {
        let (mut session, mut device, _) = session_pair();

        let device_task = tokio::spawn(async move {
            expect(&mut device, MessageType::PairingRequest).await;
            reply(&mut device, request_ack()).await;
            expect(&mut device, MessageType::Options).await;
            reply(&mut device, PairingMessage::ConfigurationAck(ConfigurationAck {})).await;
        });

        session
            .send_pairing_request("rust-test", DEFAULT_SERVICE_NAME)
            .await
            .unwrap();
        let err = session.send_options().await.unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::ProtocolMismatch {
                actual: MessageType::ConfigurationAck,
                expected: MessageType::Options,
            }
        ));
        assert_eq!(session.state(), PairingState::Failed);

        // A failed session accepts no further steps
        assert!(matches!(
            session.send_default_configuration().await,
            Err(ProtocolError::InvalidState { actual: "Failed", .. })
        ));
        device_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_out_of_order_step_does_not_touch_wire() {
        let (mut session, mut device, _) = session_pair();

        let err = session.send_secret("1A2B").await.unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::InvalidState {
                expected: "ConfigurationAcked",
                actual: "Init",
            }
        ));
        assert_eq!(session.state(), PairingState::Init);

        let err = session.send_options().await.unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidState { .. }));
        assert_eq!(session.state(), PairingState::Init);

        // Nothing was written
        session.close().await.unwrap();
        assert!(matches!(
            device.receive_frame().await,
            Err(ProtocolError::Framing(_))
        ));
    }

    #[tokio::test]
    async fn test_peer_rejection_fails_session() {
        let (mut session, mut device, _) = session_pair();

        let device_task = tokio::spawn(async move {
            expect(&mut device, MessageType::PairingRequest).await;
            let rejection = OuterMessage {
                protocol_version: 1,
                status: Status::Error as i32,
                r#type: None,
                payload: None,
            };
            device.send_frame(&rejection.encode_to_vec()).await.unwrap();
        });

        let err = session
            .send_pairing_request("rust-test", DEFAULT_SERVICE_NAME)
            .await
            .unwrap_err();
        assert!(matches!(err, ProtocolError::PeerRejected(Status::Error)));
        assert_eq!(session.state(), PairingState::Failed);
        device_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_device_closing_mid_step_fails_session() {
        let (mut session, device, _) = session_pair();
        drop(device);

        let err = session
            .send_pairing_request("rust-test", DEFAULT_SERVICE_NAME)
            .await
            .unwrap_err();
        assert!(matches!(err, ProtocolError::Framing(_)));
        assert_eq!(session.state(), PairingState::Failed);
    }

    /// Device side of the first three steps
    async fn device_until_configured(device: &mut Device) {
        expect(device, MessageType::PairingRequest).await;
        reply(device, request_ack()).await;
        expect(device, MessageType::Options).await;
        reply(device, device_options()).await;
        expect(device, MessageType::Configuration).await;
    }

    #[tokio::test]
    async fn test_wrong_ack_for_configuration() {
        let (mut session, mut device, _) = session_pair();

        let device_task = tokio::spawn(async move {
            device_until_configured(&mut device).await;
            reply(&mut device, request_ack()).await;
        });

        session
            .send_pairing_request("rust-test", DEFAULT_SERVICE_NAME)
            .await
            .unwrap();
        session.send_options().await.unwrap();
        let err = session.send_default_configuration().await.unwrap_err();
        match err {
            ProtocolError::ProtocolMismatch { actual, expected } => {
                assert_eq!(actual, MessageType::PairingRequestAck);
                assert_eq!(expected, MessageType::ConfigurationAck);
            }
            other => panic!("expected a protocol mismatch, got {:?}", other),
        }
        assert_eq!(session.state(), PairingState::Failed);
        device_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_wrong_ack_for_secret() {
        let (mut session, mut device, _) = session_pair();

        let device_task = tokio::spawn(async move {
            device_until_configured(&mut device).await;
            reply(&mut device, PairingMessage::ConfigurationAck(ConfigurationAck {})).await;
            expect(&mut device, MessageType::Secret).await;
            reply(&mut device, request_ack()).await;
        });

        session
            .send_pairing_request("rust-test", DEFAULT_SERVICE_NAME)
            .await
            .unwrap();
        session.send_options().await.unwrap();
        session.send_default_configuration().await.unwrap();
        let err = session.send_secret("1A2B").await.unwrap_err();
        match err {
            ProtocolError::ProtocolMismatch { actual, expected } => {
                assert_eq!(actual, MessageType::PairingRequestAck);
                assert_eq!(expected, MessageType::SecretAck);
            }
            other => panic!("expected a protocol mismatch, got {:?}", other),
        }
        assert_eq!(session.state(), PairingState::Failed);

        assert!(matches!(
            session.send_secret("1A2B").await,
            Err(ProtocolError::InvalidState { actual: "Failed", .. })
        ));
        device_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_bad_code_can_be_retried() {
        let (mut session, mut device, _) = session_pair();

        let device_task = tokio::spawn(async move {
            device_until_configured(&mut device).await;
            reply(&mut device, PairingMessage::ConfigurationAck(ConfigurationAck {})).await;

            // The first frame after the ack is the retried code's secret
            expect(&mut device, MessageType::Secret).await;
            reply(
                &mut device,
                PairingMessage::SecretAck(SecretAck {
                    secret: vec![0x01],
                }),
            )
            .await;
        });

        session
            .send_pairing_request("rust-test", DEFAULT_SERVICE_NAME)
            .await
            .unwrap();
        session.send_options().await.unwrap();
        session.send_default_configuration().await.unwrap();

        let err = session.send_secret("XYZ").await.unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidArgument(_)));
        assert_eq!(session.state(), PairingState::ConfigurationAcked);

        let ack_secret = session.send_secret("1A2B").await.unwrap();
        assert_eq!(ack_secret, vec![0x01]);
        assert_eq!(session.state(), PairingState::Completed);
        device_task.await.unwrap();
    }

    #[test]
    fn test_state_names() {
        assert_eq!(PairingState::Init.to_string(), "Init");
        assert_eq!(PairingState::SecretSent.as_str(), "SecretSent");
        assert!(!PairingState::OptionsAcked.is_terminal());
        assert!(PairingState::Failed.is_terminal());
    }
}
