//! Command protocol
//!
//! Once paired, the client sends remote-control events to the command port
//! (9551). Events are one-way; the device sends nothing back.

pub mod session;

pub use session::CommandSession;
