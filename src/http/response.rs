//! HTTP response building module
//!
//! Every plain HTTP response on this port carries `Connection: close`, so the
//! connection ends once the response has been written.

use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::{CONNECTION, CONTENT_LENGTH, CONTENT_TYPE, SEC_WEBSOCKET_ACCEPT, UPGRADE};
use hyper::{Response, StatusCode};

use super::asset::BootstrapAsset;
use crate::error::HandshakeError;

/// Body of the 400 answer for any plain GET other than the bootstrap script
pub const BAD_REQUEST_BODY: &str = "This port only serves livereload.js over HTTP.\n";

/// Build 200 response carrying the bootstrap script
pub fn build_asset_response(asset: &BootstrapAsset) -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "application/javascript")
        .header(CONTENT_LENGTH, asset.len())
        .header(CONNECTION, "close")
        .body(Full::new(asset.body()))
        .unwrap_or_else(|e| {
            log_build_error("200", &e);
            Response::new(Full::new(asset.body()))
        })
}

/// Build 400 response for plain HTTP requests other than the bootstrap script
pub fn build_bad_request_response() -> Response<Full<Bytes>> {
    build_plain_400(BAD_REQUEST_BODY.to_string())
}

/// Build 400 response for a request that asked for an upgrade but failed validation
pub fn build_handshake_rejection(err: &HandshakeError) -> Response<Full<Bytes>> {
    build_plain_400(format!("Bad WebSocket handshake: {err}\n"))
}

/// Build 101 response completing the WebSocket handshake
pub fn build_switching_protocols(accept_key: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::SWITCHING_PROTOCOLS)
        .header(UPGRADE, "websocket")
        .header(CONNECTION, "Upgrade")
        .header(SEC_WEBSOCKET_ACCEPT, accept_key)
        .body(Full::new(Bytes::new()))
        .unwrap_or_else(|e| {
            log_build_error("101", &e);
            build_plain_400("Bad WebSocket handshake\n".to_string())
        })
}

fn build_plain_400(body: String) -> Response<Full<Bytes>> {
    let length = body.len();
    let body = Bytes::from(body);

    Response::builder()
        .status(StatusCode::BAD_REQUEST)
        .header(CONTENT_TYPE, "text/plain")
        .header(CONTENT_LENGTH, length)
        .header(CONNECTION, "close")
        .body(Full::new(body.clone()))
        .unwrap_or_else(|e| {
            log_build_error("400", &e);
            let mut response = Response::new(Full::new(body));
            *response.status_mut() = StatusCode::BAD_REQUEST;
            response
        })
}

/// Serialize a response as HTTP/1.1, for connections answered without hyper
pub async fn encode_response(response: Response<Full<Bytes>>) -> Vec<u8> {
    let (parts, body) = response.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(never) => match never {},
    };

    let mut out = format!(
        "HTTP/1.1 {} {}\r\n",
        parts.status.as_u16(),
        parts.status.canonical_reason().unwrap_or("")
    )
    .into_bytes();
    for (name, value) in &parts.headers {
        out.extend_from_slice(name.as_str().as_bytes());
        out.extend_from_slice(b": ");
        out.extend_from_slice(value.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"\r\n");
    out.extend_from_slice(&body);
    out
}

/// Log response build error
fn log_build_error(status: &str, error: &hyper::http::Error) {
    crate::logger::log_error(&format!("Failed to build {status} response: {error}"));
}
