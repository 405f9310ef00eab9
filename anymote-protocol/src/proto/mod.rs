//! Wire schemas for both protocols
//!
//! The structs here are hand-annotated `prost` messages; field tags and enum
//! values are fixed by the devices and must not be renumbered.

pub mod keycodes;
pub mod polo;
pub mod remote;

pub use keycodes::{KeyAction, Keycode};
pub use polo::{EncodingType, MessageType, RoleType, Status, PROTOCOL_VERSION};
