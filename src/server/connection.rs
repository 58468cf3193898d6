// Connection handling module
// Accepts a TCP connection, checks its first request and serves its HTTP phase

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;

use super::channel::ChannelId;
use super::dispatch::{answer_malformed, dispatch};
use super::fault::spawn_supervised;
use super::reactor::Mailbox;
use super::sniff::{read_first_request, FirstRequest, Replay};
use crate::http::BootstrapAsset;
use crate::logger;

/// Everything a connection needs, shared by all connections of one reactor
pub struct ConnectionContext {
    pub asset: BootstrapAsset,
    pub mailbox: Mailbox,
    /// Upper bound on reading the request and writing the response or 101
    pub handshake_timeout: Duration,
    /// Access log format, `None` when access logging is off
    pub access_log_format: Option<String>,
    next_channel_id: AtomicU64,
}

impl ConnectionContext {
    pub fn new(
        asset: BootstrapAsset,
        mailbox: Mailbox,
        handshake_timeout: Duration,
        access_log_format: Option<String>,
    ) -> Self {
        Self {
            asset,
            mailbox,
            handshake_timeout,
            access_log_format,
            next_channel_id: AtomicU64::new(0),
        }
    }

    pub fn next_channel_id(&self) -> ChannelId {
        self.next_channel_id.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// Accept a connection and serve it on its own local task.
///
/// # Arguments
///
/// * `stream` - The TCP stream to handle
/// * `peer_addr` - The peer's socket address
/// * `ctx` - Shared connection context
pub fn accept_connection(
    stream: tokio::net::TcpStream,
    peer_addr: SocketAddr,
    ctx: &Arc<ConnectionContext>,
) {
    logger::log_connection_accepted(&peer_addr);
    spawn_supervised(
        "connection",
        serve_connection(stream, peer_addr, Arc::clone(ctx)),
    );
}

/// Serve the HTTP phase of one connection.
///
/// The first request head is read and checked before hyper sees it. A head
/// hyper would reject is answered by the dispatcher directly. Otherwise the
/// bytes are replayed into hyper. Plain requests get their response with
/// `Connection: close`, so hyper shuts the connection after writing it. A
/// successful handshake resolves this future once the socket has been handed
/// to the channel task.
async fn serve_connection(
    stream: tokio::net::TcpStream,
    peer_addr: SocketAddr,
    ctx: Arc<ConnectionContext>,
) {
    let timeout_duration = ctx.handshake_timeout;

    // Apply timeout and handle result
    if tokio::time::timeout(timeout_duration, serve_http(stream, peer_addr, ctx))
        .await
        .is_err()
    {
        logger::log_warning(&format!(
            "Connection from {peer_addr} timed out after {} seconds",
            timeout_duration.as_secs()
        ));
    }
}

async fn serve_http(
    mut stream: tokio::net::TcpStream,
    peer_addr: SocketAddr,
    ctx: Arc<ConnectionContext>,
) {
    let prefix = match read_first_request(&mut stream).await {
        Ok(FirstRequest::Http(prefix)) => prefix,
        Ok(FirstRequest::Malformed(request)) => {
            if let Err(e) = answer_malformed(&mut stream, peer_addr, &request, &ctx).await {
                logger::log_connection_error(&e);
            }
            return;
        }
        Ok(FirstRequest::Closed) => return,
        Err(e) => {
            logger::log_connection_error(&e);
            return;
        }
    };

    let io = TokioIo::new(Replay::new(prefix, stream));
    let builder = http1::Builder::new();
    let conn = builder
        .serve_connection(
            io,
            service_fn(move |req| dispatch(req, peer_addr, Arc::clone(&ctx))),
        )
        .with_upgrades();

    if let Err(err) = conn.await {
        logger::log_connection_error(&err);
    }
}
