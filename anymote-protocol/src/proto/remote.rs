//! Command protocol ("Anymote") message schemas
//!
//! Each frame on the command port is a [`RemoteMessage`] whose
//! [`RequestMessage`] carries exactly one event.

use prost::Message;

use super::keycodes::{KeyAction, Keycode};

#[derive(Clone, PartialEq, Message)]
pub struct RemoteMessage {
    #[prost(int32, optional, tag = "1")]
    pub sequence_number: Option<i32>,
    #[prost(message, optional, tag = "2")]
    pub request_message: Option<RequestMessage>,
}

#[derive(Clone, PartialEq, Message)]
pub struct RequestMessage {
    #[prost(message, optional, tag = "1")]
    pub key_event_message: Option<KeyEvent>,
    #[prost(message, optional, tag = "2")]
    pub mouse_event_message: Option<MouseEvent>,
    #[prost(message, optional, tag = "3")]
    pub mouse_wheel_message: Option<MouseWheel>,
    #[prost(message, optional, tag = "6")]
    pub fling_message: Option<Fling>,
}

#[derive(Clone, PartialEq, Message)]
pub struct KeyEvent {
    #[prost(enumeration = "Keycode", required, tag = "1")]
    pub keycode: i32,
    #[prost(enumeration = "KeyAction", required, tag = "2")]
    pub action: i32,
}

/// Relative pointer motion
#[derive(Clone, PartialEq, Message)]
pub struct MouseEvent {
    #[prost(int32, required, tag = "1")]
    pub x_delta: i32,
    #[prost(int32, required, tag = "2")]
    pub y_delta: i32,
}

#[derive(Clone, PartialEq, Message)]
pub struct MouseWheel {
    #[prost(int32, required, tag = "1")]
    pub x_scroll: i32,
    #[prost(int32, required, tag = "2")]
    pub y_scroll: i32,
}

/// Ask the device to open the activity registered for `uri`
#[derive(Clone, PartialEq, Message)]
pub struct Fling {
    #[prost(string, required, tag = "1")]
    pub uri: String,
}
