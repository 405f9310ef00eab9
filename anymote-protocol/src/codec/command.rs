//! Command envelope
//!
//! A [`RemoteCommand`] is wrapped in a `RemoteMessage` carrying a single
//! request. Decoding is only needed by tests and simulated devices; the
//! client never reads from the command port.

use prost::Message;

use crate::proto::keycodes::{KeyAction, Keycode};
use crate::proto::remote::{
    Fling, KeyEvent, MouseEvent, MouseWheel, RemoteMessage, RequestMessage,
};
use crate::{ProtocolError, Result};

/// One-way remote-control event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCommand {
    KeyEvent { keycode: Keycode, action: KeyAction },
    Fling { uri: String },
    MouseDelta { dx: i32, dy: i32 },
    MouseWheel { x_scroll: i32, y_scroll: i32 },
}

impl Default for RemoteCommand {
    /// A pointer event that does not move the pointer
    fn default() -> Self {
        RemoteCommand::MouseDelta { dx: 0, dy: 0 }
    }
}

impl RemoteCommand {
    pub fn key(keycode: Keycode, action: KeyAction) -> Self {
        RemoteCommand::KeyEvent { keycode, action }
    }

    pub fn fling(uri: impl Into<String>) -> Self {
        RemoteCommand::Fling { uri: uri.into() }
    }

    pub fn mouse(dx: i32, dy: i32) -> Self {
        RemoteCommand::MouseDelta { dx, dy }
    }

    pub fn scroll(x_scroll: i32, y_scroll: i32) -> Self {
        RemoteCommand::MouseWheel { x_scroll, y_scroll }
    }

    /// Wrap the command in its wire envelope
    pub fn to_remote_message(&self) -> RemoteMessage {
        let mut request = RequestMessage::default();
        match self {
            RemoteCommand::KeyEvent { keycode, action } => {
                request.key_event_message = Some(KeyEvent {
                    keycode: *keycode as i32,
                    action: *action as i32,
                });
            }
            RemoteCommand::Fling { uri } => {
                request.fling_message = Some(Fling { uri: uri.clone() });
            }
            RemoteCommand::MouseDelta { dx, dy } => {
                request.mouse_event_message = Some(MouseEvent {
                    x_delta: *dx,
                    y_delta: *dy,
                });
            }
            RemoteCommand::MouseWheel { x_scroll, y_scroll } => {
                request.mouse_wheel_message = Some(MouseWheel {
                    x_scroll: *x_scroll,
                    y_scroll: *y_scroll,
                });
            }
        }

        RemoteMessage {
            sequence_number: None,
            request_message: Some(request),
        }
    }

    /// Envelope bytes (without the frame length prefix)
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_remote_message().encode_to_vec()
    }

    /// Parse envelope bytes back into a command
    ///
    /// Fails with `Decode` when the request carries no event this client
    /// knows how to send.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let message = RemoteMessage::decode(bytes)?;
        let request = message
            .request_message
            .ok_or_else(|| ProtocolError::Decode("remote message has no request".to_string()))?;

        if let Some(key) = request.key_event_message {
            let keycode = Keycode::try_from(key.keycode)
                .map_err(|_| ProtocolError::Decode(format!("unknown key code {}", key.keycode)))?;
            let action = KeyAction::try_from(key.action)
                .map_err(|_| ProtocolError::Decode(format!("unknown key action {}", key.action)))?;
            return Ok(RemoteCommand::KeyEvent { keycode, action });
        }
        if let Some(mouse) = request.mouse_event_message {
            return Ok(RemoteCommand::MouseDelta {
                dx: mouse.x_delta,
                dy: mouse.y_delta,
            });
        }
        if let Some(wheel) = request.mouse_wheel_message {
            return Ok(RemoteCommand::MouseWheel {
                x_scroll: wheel.x_scroll,
                y_scroll: wheel.y_scroll,
            });
        }
        if let Some(fling) = request.fling_message {
            return Ok(RemoteCommand::Fling { uri: fling.uri });
        }

        Err(ProtocolError::Decode(
            "request carries no supported event".to_string(),
        ))
    }
}
