//! Message codec
//!
//! Maps the closed set of pairing messages to and from the [`OuterMessage`]
//! envelope. The type tag is derived from the [`PairingMessage`] variant, so
//! an envelope can never claim one type while carrying another payload, and
//! decoding matches every [`MessageType`] exhaustively.
//!
//! Command-port messages use their own envelope, see [`command`].

pub mod command;

use prost::Message;
use tracing::debug;

use crate::proto::polo::{
    Configuration, ConfigurationAck, MessageType, Options, OuterMessage, PairingRequest,
    PairingRequestAck, Secret, SecretAck, Status, PROTOCOL_VERSION,
};
use crate::{ProtocolError, Result};

pub use command::RemoteCommand;

/// A pairing message of any kind
#[derive(Debug, Clone, PartialEq)]
pub enum PairingMessage {
    PairingRequest(PairingRequest),
    PairingRequestAck(PairingRequestAck),
    Options(Options),
    Configuration(Configuration),
    ConfigurationAck(ConfigurationAck),
    Secret(Secret),
    SecretAck(SecretAck),
}

impl PairingMessage {
    /// Type tag this message is carried under
    pub fn message_type(&self) -> MessageType {
        match self {
            PairingMessage::PairingRequest(_) => MessageType::PairingRequest,
            PairingMessage::PairingRequestAck(_) => MessageType::PairingRequestAck,
            PairingMessage::Options(_) => MessageType::Options,
            PairingMessage::Configuration(_) => MessageType::Configuration,
            PairingMessage::ConfigurationAck(_) => MessageType::ConfigurationAck,
            PairingMessage::Secret(_) => MessageType::Secret,
            PairingMessage::SecretAck(_) => MessageType::SecretAck,
        }
    }

    fn encode_payload(&self) -> Vec<u8> {
        match self {
            PairingMessage::PairingRequest(m) => m.encode_to_vec(),
            PairingMessage::PairingRequestAck(m) => m.encode_to_vec(),
            PairingMessage::Options(m) => m.encode_to_vec(),
            PairingMessage::Configuration(m) => m.encode_to_vec(),
            PairingMessage::ConfigurationAck(m) => m.encode_to_vec(),
            PairingMessage::Secret(m) => m.encode_to_vec(),
            PairingMessage::SecretAck(m) => m.encode_to_vec(),
        }
    }

    fn decode_payload(message_type: MessageType, payload: &[u8]) -> Result<Self> {
        let message = match message_type {
            MessageType::PairingRequest => {
                PairingMessage::PairingRequest(PairingRequest::decode(payload)?)
            }
            MessageType::PairingRequestAck => {
                PairingMessage::PairingRequestAck(PairingRequestAck::decode(payload)?)
            }
            MessageType::Options => PairingMessage::Options(Options::decode(payload)?),
            MessageType::Configuration => {
                PairingMessage::Configuration(Configuration::decode(payload)?)
            }
            MessageType::ConfigurationAck => {
                PairingMessage::ConfigurationAck(ConfigurationAck::decode(payload)?)
            }
            MessageType::Secret => PairingMessage::Secret(Secret::decode(payload)?),
            MessageType::SecretAck => PairingMessage::SecretAck(SecretAck::decode(payload)?),
        };
        Ok(message)
    }
}

/// A decoded pairing envelope
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub protocol_version: u32,
    pub status: Status,
    pub message: PairingMessage,
}

impl Envelope {
    /// Envelope with the current protocol version and an OK status
    pub fn new(message: PairingMessage) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            status: Status::Ok,
            message,
        }
    }

    pub fn message_type(&self) -> MessageType {
        self.message.message_type()
    }

    /// Convert into the wire envelope
    pub fn to_outer_message(&self) -> OuterMessage {
        OuterMessage {
            protocol_version: self.protocol_version,
            status: self.status as i32,
            r#type: Some(self.message_type() as i32),
            payload: Some(self.message.encode_payload()),
        }
    }

    /// Serialize to envelope bytes (without the frame length prefix)
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_outer_message().encode_to_vec()
    }
}

/// Wrap `message` in an envelope with version 1 and status OK
pub fn encode(message: PairingMessage) -> OuterMessage {
    Envelope::new(message).to_outer_message()
}

/// Envelope bytes for `message`, ready to be framed
pub fn encode_to_vec(message: PairingMessage) -> Vec<u8> {
    encode(message).encode_to_vec()
}

/// Read only the status of an envelope
///
/// Rejections from a device may omit the type and payload, so callers check
/// the status before decoding the rest.
pub fn decode_status(bytes: &[u8]) -> Result<Status> {
    let outer = OuterMessage::decode(bytes)?;
    Status::try_from(outer.status)
        .map_err(|_| ProtocolError::Decode(format!("unknown status {}", outer.status)))
}

/// Parse envelope bytes and decode the payload selected by its type tag
pub fn decode(bytes: &[u8]) -> Result<Envelope> {
    let outer = OuterMessage::decode(bytes)?;

    let raw_type = outer
        .r#type
        .ok_or_else(|| ProtocolError::Decode("envelope has no message type".to_string()))?;
    let message_type = MessageType::try_from(raw_type)
        .map_err(|_| ProtocolError::Decode(format!("unknown message type {}", raw_type)))?;
    let status = Status::try_from(outer.status)
        .map_err(|_| ProtocolError::Decode(format!("unknown status {}", outer.status)))?;

    let payload = outer.payload.unwrap_or_default();
    let message = PairingMessage::decode_payload(message_type, &payload).map_err(|e| {
        ProtocolError::Decode(format!("{:?} payload does not parse: {}", message_type, e))
    })?;

    debug!(
        "Decoded {:?} envelope (version {}, status {:?}, {} payload bytes)",
        message_type,
        outer.protocol_version,
        status,
        payload.len()
    );

    Ok(Envelope {
        protocol_version: outer.protocol_version,
        status,
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::polo::{Encoding, EncodingType, RoleType};

    fn sample_messages() -> Vec<PairingMessage> {
        vec![
            PairingMessage::PairingRequest(PairingRequest {
                service_name: "AnyMote".to_string(),
                client_name: Some("test".to_string()),
            }),
            PairingMessage::PairingRequestAck(PairingRequestAck {
                server_name: Some("Living Room TV".to_string()),
            }),
            PairingMessage::Options(Options {
                input_encodings: vec![Encoding::new(EncodingType::Hexadecimal, 4)],
                output_encodings: vec![],
                preferred_role: Some(RoleType::Input as i32),
            }),
            PairingMessage::Configuration(Configuration {
                encoding: Some(Encoding::new(EncodingType::Hexadecimal, 4)),
                client_role: RoleType::Input as i32,
            }),
            PairingMessage::ConfigurationAck(ConfigurationAck {}),
            PairingMessage::Secret(Secret {
                secret: vec![0xAB; 32],
            }),
            PairingMessage::SecretAck(SecretAck {
                secret: vec![0x01, 0x02, 0x03],
            }),
        ]
    }

    #[test]
    fn test_envelope_round_trip() {
        for message in sample_messages() {
            let envelope = Envelope::new(message);
            let decoded = decode(&envelope.to_bytes()).unwrap();
            assert_eq!(decoded, envelope);
        }
    }

    #[test]
    fn test_encode_sets_header_fields() {
        let outer = encode(PairingMessage::ConfigurationAck(ConfigurationAck {}));
        assert_eq!(outer.protocol_version, 1);
        assert_eq!(outer.status, Status::Ok as i32);
        assert_eq!(outer.r#type, Some(MessageType::ConfigurationAck as i32));
    }

    #[test]
    fn test_type_tag_follows_variant() {
        for message in sample_messages() {
            let expected = message.message_type();
            let outer = encode(message);
            assert_eq!(outer.r#type, Some(expected as i32));
        }
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let outer = OuterMessage {
            protocol_version: 1,
            status: Status::Ok as i32,
            r#type: Some(99),
            payload: Some(vec![]),
        };
        let err = decode(&outer.encode_to_vec()).unwrap_err();
        assert!(matches!(err, ProtocolError::Decode(msg) if msg.contains("99")));
    }

    #[test]
    fn test_missing_type_is_rejected() {
        let outer = OuterMessage {
            protocol_version: 1,
            status: Status::Ok as i32,
            r#type: None,
            payload: None,
        };
        assert!(matches!(
            decode(&outer.encode_to_vec()),
            Err(ProtocolError::Decode(_))
        ));
    }

    #[test]
    fn test_malformed_payload_is_rejected() {
        let outer = OuterMessage {
            protocol_version: 1,
            status: Status::Ok as i32,
            r#type: Some(MessageType::Secret as i32),
            // field 1, length-delimited, claims 10 bytes but has 1
            payload: Some(vec![0x0A, 0x0A, 0x00]),
        };
        assert!(matches!(
            decode(&outer.encode_to_vec()),
            Err(ProtocolError::Decode(_))
        ));
    }

    #[test]
    fn test_peer_status_is_preserved() {
        let outer = OuterMessage {
            protocol_version: 1,
            status: Status::BadSecret as i32,
            r#type: Some(MessageType::SecretAck as i32),
            payload: Some(SecretAck { secret: vec![] }.encode_to_vec()),
        };
        let envelope = decode(&outer.encode_to_vec()).unwrap();
        assert_eq!(envelope.status, Status::BadSecret);
        assert_eq!(envelope.message_type(), MessageType::SecretAck);
    }

    #[test]
    fn test_status_of_bare_rejection() {
        let outer = OuterMessage {
            protocol_version: 1,
            status: Status::BadConfiguration as i32,
            r#type: None,
            payload: None,
        };
        let bytes = outer.encode_to_vec();
        assert_eq!(decode_status(&bytes).unwrap(), Status::BadConfiguration);
        assert!(decode(&bytes).is_err());

        let bogus = OuterMessage {
            status: 201,
            ..outer
        };
        assert!(matches!(
            decode_status(&bogus.encode_to_vec()),
            Err(ProtocolError::Decode(_))
        ));
    }
}
