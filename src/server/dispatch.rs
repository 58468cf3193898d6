//! Protocol dispatcher
//!
//! One port speaks two protocols. The first request on a connection decides,
//! once, which one this connection uses:
//!
//! - not `GET`, or asking for an upgrade: WebSocket handshake, the connection
//!   becomes a push channel
//! - `GET /livereload.js...`: the bootstrap script, then close
//! - any other `GET`: `400 Bad Request`, then close
//!
//! Heads hyper cannot take are classified from whatever request line could
//! be read; with no request line at all the answer is the same 400.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use http_body_util::Full;
use hyper::body::{Body, Bytes, Incoming};
use hyper::{Method, Request, Response};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::channel::{run_channel, ChannelEvent};
use super::connection::ConnectionContext;
use super::fault::spawn_supervised;
use super::sniff::MalformedRequest;
use crate::error::HandshakeError;
use crate::http::asset::{BootstrapAsset, ASSET_URL_PATH};
use crate::http::{self, BAD_REQUEST_BODY};
use crate::logger::{self, AccessLogEntry};
use crate::protocol::handshake;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionRole {
    /// Hand the connection to the WebSocket handshake
    PushChannel,
    /// Serve the bootstrap script
    StaticAsset,
    /// Plain HTTP for anything else
    BadRequest,
}

/// Decide what a connection is from its first request.
///
/// `path` is the request path without query or fragment; the bootstrap
/// script is matched by prefix.
pub fn classify(method: &Method, path: &str, upgrade: bool) -> ConnectionRole {
    if method != Method::GET || upgrade {
        ConnectionRole::PushChannel
    } else if path.starts_with(ASSET_URL_PATH) {
        ConnectionRole::StaticAsset
    } else {
        ConnectionRole::BadRequest
    }
}

/// hyper service entry point for every request on the LiveReload port
pub async fn dispatch(
    mut req: Request<Incoming>,
    peer: SocketAddr,
    ctx: Arc<ConnectionContext>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let started = Instant::now();
    let upgrade = handshake::is_upgrade_request(req.headers());

    let response = match classify(req.method(), req.uri().path(), upgrade) {
        ConnectionRole::PushChannel => return Ok(begin_push_channel(&mut req, peer, &ctx)),
        ConnectionRole::StaticAsset => {
            let response = http::build_asset_response(&ctx.asset);
            log_access(&ctx, &req, peer, &response, ctx.asset.len(), started);
            response
        }
        ConnectionRole::BadRequest => {
            let response = http::build_bad_request_response();
            log_access(&ctx, &req, peer, &response, BAD_REQUEST_BODY.len(), started);
            response
        }
    };

    Ok(response)
}

/// Answer a connection whose first request head hyper would reject.
///
/// Nothing here can become a push channel: without parseable headers there is
/// no handshake to complete.
pub fn respond_to_malformed(
    request: &MalformedRequest,
    asset: &BootstrapAsset,
) -> (ConnectionRole, Response<Full<Bytes>>) {
    let MalformedRequest::RequestLine {
        method,
        path,
        upgrade,
    } = request
    else {
        return (
            ConnectionRole::BadRequest,
            http::build_bad_request_response(),
        );
    };

    let role = classify(method, path, *upgrade);
    let response = match role {
        ConnectionRole::PushChannel => http::build_handshake_rejection(&HandshakeError::Malformed),
        ConnectionRole::StaticAsset => http::build_asset_response(asset),
        ConnectionRole::BadRequest => http::build_bad_request_response(),
    };
    (role, response)
}

/// Write the answer to a malformed first request straight to the socket and
/// shut it down
pub async fn answer_malformed<S>(
    io: &mut S,
    peer: SocketAddr,
    request: &MalformedRequest,
    ctx: &ConnectionContext,
) -> std::io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    let started = Instant::now();
    let (role, response) = respond_to_malformed(request, &ctx.asset);
    logger::log_malformed_request(&peer, &format!("{role:?}"));

    if let Some(format) = ctx.access_log_format.as_deref() {
        let (method, path) = match request {
            MalformedRequest::RequestLine { method, path, .. } => (method.to_string(), path.clone()),
            MalformedRequest::Unreadable => ("-".to_string(), "-".to_string()),
        };
        let mut entry = AccessLogEntry::new(peer.ip().to_string(), method, path);
        entry.status = response.status().as_u16();
        entry.body_bytes = response
            .body()
            .size_hint()
            .exact()
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(0);
        entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        logger::log_access(&entry, format);
    }

    let raw = http::encode_response(response).await;
    io.write_all(&raw).await?;
    io.shutdown().await
}

/// Validate the handshake, answer 101 and hand the upgraded socket to a channel task
fn begin_push_channel(
    req: &mut Request<Incoming>,
    peer: SocketAddr,
    ctx: &ConnectionContext,
) -> Response<Full<Bytes>> {
    let accept_key = match handshake::accept_key(req) {
        Ok(key) => key,
        Err(e) => {
            logger::log_warning(&format!("Rejected handshake from {peer}: {e}"));
            return http::build_handshake_rejection(&e);
        }
    };

    let id = ctx.next_channel_id();
    ctx.mailbox.post(ChannelEvent::Connecting { id, peer });

    let on_upgrade = hyper::upgrade::on(req);
    spawn_supervised("push channel", run_channel(on_upgrade, id, ctx.mailbox.clone()));

    http::build_switching_protocols(&accept_key)
}

fn log_access(
    ctx: &ConnectionContext,
    req: &Request<Incoming>,
    peer: SocketAddr,
    response: &Response<Full<Bytes>>,
    body_bytes: usize,
    started: Instant,
) {
    let Some(format) = ctx.access_log_format.as_deref() else {
        return;
    };

    let mut entry = AccessLogEntry::from_request(peer, req);
    entry.status = response.status().as_u16();
    entry.body_bytes = body_bytes;
    entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
    logger::log_access(&entry, format);
}
