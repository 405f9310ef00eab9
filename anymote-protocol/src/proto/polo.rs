//! Pairing protocol ("Polo") message schemas
//!
//! Every frame on the pairing port carries one [`OuterMessage`]. Its `type`
//! field selects which of the inner messages is serialized in `payload`.
//! Field tags and enum values follow the proto2 schema the devices speak.

use prost::Message;
use serde::{Deserialize, Serialize};

/// Version carried in every outer message
pub const PROTOCOL_VERSION: u32 = 1;

/// Type tag of an [`OuterMessage`]
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, prost::Enumeration,
)]
#[repr(i32)]
pub enum MessageType {
    PairingRequest = 10,
    PairingRequestAck = 11,
    Options = 20,
    Configuration = 30,
    ConfigurationAck = 31,
    Secret = 40,
    SecretAck = 41,
}

/// Status carried by an [`OuterMessage`]
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, prost::Enumeration,
)]
#[repr(i32)]
pub enum Status {
    Ok = 200,
    Error = 400,
    BadConfiguration = 401,
    BadSecret = 402,
}

/// Symbol alphabet used to display the pairing code
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, prost::Enumeration,
)]
#[repr(i32)]
pub enum EncodingType {
    Unknown = 0,
    Alphanumeric = 1,
    Numeric = 2,
    Hexadecimal = 3,
    QrCode = 4,
}

/// Which side of the pairing shows the code and which side types it in
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, prost::Enumeration,
)]
#[repr(i32)]
pub enum RoleType {
    Unknown = 0,
    /// The client types the code the device displays
    Input = 1,
    /// The client displays a code the device types
    Output = 2,
}

/// Outer envelope of every pairing frame
#[derive(Clone, PartialEq, Message)]
pub struct OuterMessage {
    #[prost(uint32, required, tag = "1")]
    pub protocol_version: u32,
    #[prost(enumeration = "Status", required, tag = "2")]
    pub status: i32,
    #[prost(enumeration = "MessageType", optional, tag = "3")]
    pub r#type: Option<i32>,
    #[prost(bytes = "vec", optional, tag = "4")]
    pub payload: Option<Vec<u8>>,
}

#[derive(Clone, PartialEq, Message)]
pub struct PairingRequest {
    #[prost(string, required, tag = "1")]
    pub service_name: String,
    #[prost(string, optional, tag = "2")]
    pub client_name: Option<String>,
}

#[derive(Clone, PartialEq, Message)]
pub struct PairingRequestAck {
    #[prost(string, optional, tag = "1")]
    pub server_name: Option<String>,
}

/// One code encoding a peer is able to handle
#[derive(Clone, PartialEq, Message)]
pub struct Encoding {
    #[prost(enumeration = "EncodingType", required, tag = "1")]
    pub r#type: i32,
    #[prost(uint32, required, tag = "2")]
    pub symbol_length: u32,
}

impl Encoding {
    pub fn new(encoding_type: EncodingType, symbol_length: u32) -> Self {
        Self {
            r#type: encoding_type as i32,
            symbol_length,
        }
    }
}

/// Encodings and role a peer supports
///
/// Sent by the client as an offer; the device answers with its own `Options`.
#[derive(Clone, PartialEq, Message)]
pub struct Options {
    #[prost(message, repeated, tag = "1")]
    pub input_encodings: Vec<Encoding>,
    #[prost(message, repeated, tag = "2")]
    pub output_encodings: Vec<Encoding>,
    #[prost(enumeration = "RoleType", optional, tag = "3")]
    pub preferred_role: Option<i32>,
}

/// The encoding and role both peers agreed on
#[derive(Clone, PartialEq, Message)]
pub struct Configuration {
    #[prost(message, optional, tag = "1")]
    pub encoding: Option<Encoding>,
    #[prost(enumeration = "RoleType", required, tag = "2")]
    pub client_role: i32,
}

impl Configuration {
    pub fn new(encoding_type: EncodingType, symbol_length: u32, client_role: RoleType) -> Self {
        Self {
            encoding: Some(Encoding::new(encoding_type, symbol_length)),
            client_role: client_role as i32,
        }
    }
}

#[derive(Clone, PartialEq, Message)]
pub struct ConfigurationAck {}

/// Digest proving knowledge of the displayed code
#[derive(Clone, PartialEq, Message)]
pub struct Secret {
    #[prost(bytes = "vec", required, tag = "1")]
    pub secret: Vec<u8>,
}

#[derive(Clone, PartialEq, Message)]
pub struct SecretAck {
    #[prost(bytes = "vec", required, tag = "1")]
    pub secret: Vec<u8>,
}
