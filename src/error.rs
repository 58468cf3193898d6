//! Error types
//!
//! Startup failures are fatal and surface from `main`. Everything that can go
//! wrong on a single connection is recovered where it happens and only logged.

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// The bootstrap script could not be read at launch.
#[derive(Debug, Error)]
#[error("failed to read bootstrap asset {}: {source}", path.display())]
pub struct AssetError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// Startup and lifecycle failures of the reactor.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid listen address '{addr}': {source}")]
    InvalidAddress {
        addr: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("failed to build reactor runtime: {0}")]
    Runtime(#[source] io::Error),

    #[error("reactor has already been started")]
    AlreadyRunning,

    #[error("reactor thread panicked")]
    ReactorPanicked,
}

/// A request took the upgrade path but is not a valid WebSocket handshake.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HandshakeError {
    #[error("WebSocket handshake requires GET, got {0}")]
    Method(String),

    #[error("missing or invalid Upgrade header")]
    Upgrade,

    #[error("Connection header does not request an upgrade")]
    Connection,

    #[error("unsupported Sec-WebSocket-Version, expected 13")]
    Version,

    #[error("missing Sec-WebSocket-Key header")]
    MissingKey,

    #[error("request headers could not be parsed")]
    Malformed,
}

/// Failure on an upgraded push channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("connection upgrade failed: {0}")]
    Upgrade(#[from] hyper::Error),

    #[error("websocket protocol error: {0}")]
    Protocol(#[from] tungstenite::Error),
}
