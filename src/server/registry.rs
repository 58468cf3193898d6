// Channel registry module
// The set of open push channels that receive reload broadcasts

use std::net::SocketAddr;

use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use super::channel::ChannelId;

/// Non-owning reference to a push channel.
///
/// The socket itself belongs to the channel task; the handle can only queue
/// frames for it.
#[derive(Debug, Clone)]
pub struct ChannelHandle {
    id: ChannelId,
    peer: SocketAddr,
    outbound: mpsc::UnboundedSender<Message>,
}

impl ChannelHandle {
    pub fn new(
        id: ChannelId,
        peer: SocketAddr,
        outbound: mpsc::UnboundedSender<Message>,
    ) -> Self {
        Self { id, peer, outbound }
    }

    pub const fn id(&self) -> ChannelId {
        self.id
    }

    pub const fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Queue a frame. Returns false if the channel task has already exited.
    pub fn send(&self, message: Message) -> bool {
        self.outbound.send(message).is_ok()
    }

    pub fn send_text(&self, text: &str) -> bool {
        self.send(Message::text(text.to_owned()))
    }
}

/// Currently open push channels, in the order they were opened
#[derive(Debug, Default)]
pub struct ChannelRegistry {
    channels: Vec<ChannelHandle>,
    /// Channels ever added, including ones since removed
    opened_total: u64,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a channel and return how many channels have been added over the
    /// registry's lifetime. A handle whose id is already present is ignored.
    pub fn add(&mut self, handle: ChannelHandle) -> u64 {
        if !self.contains(handle.id()) {
            self.channels.push(handle);
            self.opened_total += 1;
        }
        self.opened_total
    }

    /// Remove a channel. Removing an absent channel is a no-op returning false.
    pub fn remove(&mut self, id: ChannelId) -> bool {
        let before = self.channels.len();
        self.channels.retain(|c| c.id() != id);
        self.channels.len() != before
    }

    pub fn contains(&self, id: ChannelId) -> bool {
        self.channels.iter().any(|c| c.id() == id)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Queue one text frame on every channel, in registry order.
    /// Returns how many channels accepted it.
    pub fn broadcast(&self, text: &str) -> usize {
        let message = Message::text(text.to_owned());
        self.channels
            .iter()
            .filter(|c| c.send(message.clone()))
            .count()
    }

    /// Send a close frame to every channel and empty the registry
    pub fn close_all(&mut self) -> usize {
        let count = self.channels.len();
        for channel in self.channels.drain(..) {
            channel.send(Message::Close(None));
        }
        count
    }
}
