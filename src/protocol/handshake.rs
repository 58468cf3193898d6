// WebSocket handshake module
// Detects upgrade requests and validates them before the 101 is sent

use hyper::header::{
    HeaderMap, CONNECTION, SEC_WEBSOCKET_KEY, SEC_WEBSOCKET_VERSION, UPGRADE,
};
use hyper::{Method, Request};
use tokio_tungstenite::tungstenite::handshake::derive_accept_key;

use crate::error::HandshakeError;

/// True if the request asks to switch protocols:
/// an `Upgrade` header plus an `upgrade` token in `Connection`.
pub fn is_upgrade_request(headers: &HeaderMap) -> bool {
    headers.contains_key(UPGRADE) && connection_has_upgrade(headers)
}

fn connection_has_upgrade(headers: &HeaderMap) -> bool {
    headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("upgrade"))
}

/// Validate an RFC 6455 opening handshake and return the `Sec-WebSocket-Accept` value.
pub fn accept_key<B>(req: &Request<B>) -> Result<String, HandshakeError> {
    if req.method() != Method::GET {
        return Err(HandshakeError::Method(req.method().to_string()));
    }

    let headers = req.headers();

    let upgrade_ok = headers
        .get(UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"));
    if !upgrade_ok {
        return Err(HandshakeError::Upgrade);
    }

    if !connection_has_upgrade(headers) {
        return Err(HandshakeError::Connection);
    }

    if headers.get(SEC_WEBSOCKET_VERSION).map(|v| v.as_bytes()) != Some(b"13".as_slice()) {
        return Err(HandshakeError::Version);
    }

    let key = headers
        .get(SEC_WEBSOCKET_KEY)
        .ok_or(HandshakeError::MissingKey)?;

    Ok(derive_accept_key(key.as_bytes()))
}
