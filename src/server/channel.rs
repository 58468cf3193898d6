//! Push channel lifecycle
//!
//! A channel is `Connecting` once its handshake has been answered with a 101,
//! `Open` once the upgraded socket is running, and `Closed` for good after the
//! remote goes away or the socket fails. The transition table lives in
//! [`ChannelState::transition`]; the reactor applies it to every event a
//! channel task reports.

use std::net::SocketAddr;

use futures::{SinkExt, StreamExt};
use hyper::upgrade::OnUpgrade;
use hyper_util::rt::TokioIo;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::Role;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use super::reactor::{Mailbox, ReactorCommand};
use crate::error::ChannelError;

pub type ChannelId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Connecting,
    Open,
    Closed,
}

/// Discriminant of a [`ChannelEvent`], used to drive the state table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Opened,
    Message,
    Error,
    Closed,
}

/// What the reactor must do after a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Send the hello to this channel, then add it to the registry
    Greet,
    /// Look at an inbound application message
    Inspect,
    /// Remove the channel from the registry
    Deregister,
    Nothing,
}

impl ChannelState {
    /// | from       | event          | to     | effect     |
    /// |------------|----------------|--------|------------|
    /// | Connecting | Opened         | Open   | Greet      |
    /// | Open       | Message        | Open   | Inspect    |
    /// | Connecting | Error / Closed | Closed | Deregister |
    /// | Open       | Error / Closed | Closed | Deregister |
    /// | Closed     | any            | Closed | Nothing    |
    ///
    /// Anything else leaves the state alone.
    pub const fn transition(self, event: EventKind) -> (Self, Effect) {
        match (self, event) {
            (Self::Connecting, EventKind::Opened) => (Self::Open, Effect::Greet),
            (Self::Open, EventKind::Message) => (Self::Open, Effect::Inspect),
            (Self::Connecting | Self::Open, EventKind::Error | EventKind::Closed) => {
                (Self::Closed, Effect::Deregister)
            }
            (state, _) => (state, Effect::Nothing),
        }
    }
}

/// Lifecycle event reported by a connection to the reactor
#[derive(Debug)]
pub enum ChannelEvent {
    /// The 101 response has been produced; the upgrade is in flight
    Connecting { id: ChannelId, peer: SocketAddr },
    /// The socket is upgraded; `outbound` feeds the channel's writer
    Opened {
        id: ChannelId,
        outbound: mpsc::UnboundedSender<Message>,
    },
    /// A text frame from the browser
    Message { id: ChannelId, text: String },
    Error { id: ChannelId, error: ChannelError },
    Closed { id: ChannelId },
}

impl ChannelEvent {
    pub const fn id(&self) -> ChannelId {
        match self {
            Self::Connecting { id, .. }
            | Self::Opened { id, .. }
            | Self::Message { id, .. }
            | Self::Error { id, .. }
            | Self::Closed { id } => *id,
        }
    }

    /// `None` for `Connecting`, which creates the channel rather than moving it
    pub const fn kind(&self) -> Option<EventKind> {
        match self {
            Self::Connecting { .. } => None,
            Self::Opened { .. } => Some(EventKind::Opened),
            Self::Message { .. } => Some(EventKind::Message),
            Self::Error { .. } => Some(EventKind::Error),
            Self::Closed { .. } => Some(EventKind::Closed),
        }
    }
}

impl From<ChannelEvent> for ReactorCommand {
    fn from(event: ChannelEvent) -> Self {
        Self::Channel(event)
    }
}

/// Drive one upgraded connection until either side ends it.
///
/// The task owns the socket. The reactor only holds the sending half of
/// `outbound`; once the reactor drops it the socket is closed.
pub async fn run_channel(on_upgrade: OnUpgrade, id: ChannelId, mailbox: Mailbox) {
    let upgraded = match on_upgrade.await {
        Ok(upgraded) => upgraded,
        Err(e) => {
            mailbox.post(ChannelEvent::Error {
                id,
                error: e.into(),
            });
            return;
        }
    };

    let socket = WebSocketStream::from_raw_socket(TokioIo::new(upgraded), Role::Server, None).await;
    let (mut sink, mut stream) = socket.split();
    let (outbound, mut queue) = mpsc::unbounded_channel::<Message>();

    if !mailbox.post(ChannelEvent::Opened { id, outbound }) {
        // Reactor already gone
        let _ = sink.close().await;
        return;
    }

    loop {
        tokio::select! {
            queued = queue.recv() => {
                let Some(message) = queued else {
                    // Deregistered
                    let _ = sink.close().await;
                    break;
                };
                let closing = message.is_close();
                if let Err(e) = sink.send(message).await {
                    mailbox.post(ChannelEvent::Error { id, error: e.into() });
                    break;
                }
                if closing {
                    break;
                }
            }

            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    mailbox.post(ChannelEvent::Message { id, text: text.as_str().to_owned() });
                }
                Some(Ok(Message::Close(_))) | None => {
                    mailbox.post(ChannelEvent::Closed { id });
                    break;
                }
                // Pings are answered by the protocol layer; binary is not part of LiveReload
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    mailbox.post(ChannelEvent::Error { id, error: e.into() });
                    break;
                }
            }
        }
    }
}
