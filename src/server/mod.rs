// Server module entry
// Listener, protocol dispatch, push channels and the reactor that owns them

pub mod channel;
pub mod connection;
pub mod dispatch;
pub mod fault;
pub mod listener;
pub mod reactor;
pub mod registry;
pub mod signal;
pub mod sniff;

// Re-export commonly used types
pub use channel::{ChannelEvent, ChannelId, ChannelState};
pub use dispatch::{classify, ConnectionRole};
pub use listener::create_listener;
pub use reactor::{Mode, Reactor, ReactorHandle, ReactorOptions, ReactorState, SelfTest};
pub use registry::{ChannelHandle, ChannelRegistry};
