//! LiveReload wire protocol
//!
//! JSON messages exchanged over push channels and the WebSocket opening
//! handshake that turns a plain connection into one.

pub mod handshake;
pub mod messages;

pub use messages::{ClientCommand, HelloMessage, ReloadMessage, PROTOCOL_OFFICIAL_7};
