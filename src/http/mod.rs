//! HTTP side of the LiveReload port
//!
//! The port answers exactly one plain HTTP resource, the bootstrap script.
//! Everything else is either a WebSocket handshake or a 400.

pub mod asset;
pub mod response;

// Re-export commonly used types
pub use asset::BootstrapAsset;
pub use response::{
    build_asset_response, build_bad_request_response, build_handshake_rejection,
    build_switching_protocols, encode_response, BAD_REQUEST_BODY,
};
