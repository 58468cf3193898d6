//! Channel registry reactor
//!
//! One reactor owns the listening socket, every connection task and the
//! channel registry. It runs on a single thread: a current-thread tokio
//! runtime driving a `LocalSet`. The registry is touched only by the reactor
//! loop. Everyone else (connection tasks, other threads calling `reload`)
//! talks to it by posting [`ReactorCommand`]s to its [`Mailbox`].
//!
//! Two modes:
//! - [`Mode::Single`]: `start()` runs the reactor on the calling thread until
//!   it is stopped, and fires the self-test reload on its own timer.
//! - [`Mode::Threaded`]: `start()` moves the reactor to a dedicated thread and
//!   returns; the caller owns the reload cadence.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot, watch, Notify};
use tokio::time::{Instant, Interval};

use super::channel::{ChannelEvent, ChannelId, ChannelState, Effect};
use super::connection::{accept_connection, ConnectionContext};
use super::fault::guarded;
use super::listener::create_listener;
use super::registry::{ChannelHandle, ChannelRegistry};
use super::signal::start_signal_handler;
use crate::config::Config;
use crate::error::ServerError;
use crate::http::BootstrapAsset;
use crate::logger;
use crate::protocol::{ClientCommand, HelloMessage, ReloadMessage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Single,
    Threaded,
}

/// Periodic diagnostic reload
#[derive(Debug, Clone)]
pub struct SelfTest {
    pub interval: Duration,
    pub path: String,
}

pub struct ReactorOptions {
    pub addr: SocketAddr,
    pub mode: Mode,
    pub asset: BootstrapAsset,
    pub server_name: String,
    /// Only honoured in [`Mode::Single`]
    pub self_test: Option<SelfTest>,
    pub handshake_timeout: Duration,
    /// Access log format, `None` disables the access log
    pub access_log_format: Option<String>,
    /// Stop on SIGINT/SIGTERM
    pub handle_signals: bool,
}

impl ReactorOptions {
    /// Options with the protocol defaults and no self-test, signals or access log
    pub fn new(addr: SocketAddr, asset: BootstrapAsset) -> Self {
        Self {
            addr,
            mode: Mode::Single,
            asset,
            server_name: "jekyll".to_string(),
            self_test: None,
            handshake_timeout: Duration::from_secs(30),
            access_log_format: None,
            handle_signals: false,
        }
    }

    pub fn from_config(
        config: &Config,
        asset: BootstrapAsset,
        mode: Mode,
    ) -> Result<Self, ServerError> {
        let interval = config.self_test_interval();
        let self_test = (!interval.is_zero()).then(|| SelfTest {
            interval,
            path: config.livereload.self_test_path.clone(),
        });

        Ok(Self {
            addr: config.socket_addr()?,
            mode,
            asset,
            server_name: config.livereload.server_name.clone(),
            self_test,
            handshake_timeout: config.handshake_timeout(),
            access_log_format: config
                .logging
                .access_log
                .then(|| config.logging.access_log_format.clone()),
            handle_signals: true,
        })
    }
}

/// Everything the reactor loop reacts to besides new connections
#[derive(Debug)]
pub enum ReactorCommand {
    /// Broadcast one reload per path, in order
    Reload(Vec<String>),
    /// Lifecycle event from a connection
    Channel(ChannelEvent),
    /// Report the number of registered channels
    CountChannels(oneshot::Sender<usize>),
}

/// Sending side of the reactor's command queue
#[derive(Debug, Clone)]
pub struct Mailbox {
    tx: mpsc::UnboundedSender<ReactorCommand>,
}

impl Mailbox {
    pub const fn new(tx: mpsc::UnboundedSender<ReactorCommand>) -> Self {
        Self { tx }
    }

    /// Queue a command. Returns false once the reactor has shut down.
    pub fn post(&self, command: impl Into<ReactorCommand>) -> bool {
        self.tx.send(command.into()).is_ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactorState {
    Idle,
    Running,
    Stopped,
}

struct Lifecycle {
    state: watch::Sender<ReactorState>,
    shutdown: Notify,
}

impl Lifecycle {
    fn new() -> Self {
        Self {
            state: watch::Sender::new(ReactorState::Idle),
            shutdown: Notify::new(),
        }
    }

    fn mark(&self, state: ReactorState) {
        self.state.send_replace(state);
    }
}

/// Cloneable, thread-safe control surface of a reactor
#[derive(Clone)]
pub struct ReactorHandle {
    mailbox: Mailbox,
    lifecycle: Arc<Lifecycle>,
}

impl ReactorHandle {
    /// Ask the reactor to broadcast a reload for each path.
    ///
    /// Returns as soon as the request is queued; the reactor thread performs
    /// the sends.
    pub fn reload<I, S>(&self, paths: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let paths: Vec<String> = paths.into_iter().map(Into::into).collect();
        if !self.mailbox.post(ReactorCommand::Reload(paths)) {
            logger::log_warning("Reload requested but the LiveReload reactor is not running");
        }
    }

    /// Stop the reactor. A no-op unless it is running, so it is safe to call
    /// before `start()` and any number of times.
    pub fn stop(&self) {
        if self.state() == ReactorState::Running {
            self.lifecycle.shutdown.notify_one();
        }
    }

    pub fn state(&self) -> ReactorState {
        *self.lifecycle.state.borrow()
    }

    /// Resolves once the reactor loop has exited
    pub async fn stopped(&self) {
        let mut rx = self.lifecycle.state.subscribe();
        let _ = rx.wait_for(|s| *s == ReactorState::Stopped).await;
    }

    /// Number of registered channels, or `None` if the reactor is gone
    pub async fn open_channels(&self) -> Option<usize> {
        let (tx, rx) = oneshot::channel();
        if !self.mailbox.post(ReactorCommand::CountChannels(tx)) {
            return None;
        }
        rx.await.ok()
    }
}

/// The LiveReload reactor: explicit `start`/`stop` lifecycle around the
/// listening loop
pub struct Reactor {
    options: Option<ReactorOptions>,
    inbox: Option<mpsc::UnboundedReceiver<ReactorCommand>>,
    handle: ReactorHandle,
    local_addr: Option<SocketAddr>,
    thread: Option<JoinHandle<()>>,
}

impl Reactor {
    pub fn new(options: ReactorOptions) -> Self {
        let (tx, inbox) = mpsc::unbounded_channel();
        Self {
            options: Some(options),
            inbox: Some(inbox),
            handle: ReactorHandle {
                mailbox: Mailbox::new(tx),
                lifecycle: Arc::new(Lifecycle::new()),
            },
            local_addr: None,
            thread: None,
        }
    }

    pub fn handle(&self) -> ReactorHandle {
        self.handle.clone()
    }

    /// Bound address, known once `start()` has bound the listener
    pub const fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Bind the listener and run the reactor.
    ///
    /// In [`Mode::Single`] this blocks until the reactor is stopped and must
    /// not be called from inside an async runtime. In [`Mode::Threaded`] it
    /// returns once the reactor thread is running.
    pub fn start(&mut self) -> Result<(), ServerError> {
        let (Some(options), Some(inbox)) = (self.options.take(), self.inbox.take()) else {
            return Err(ServerError::AlreadyRunning);
        };

        let addr = options.addr;
        let listener =
            create_listener(addr).map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ServerError::Bind { addr, source })?;
        self.local_addr = Some(local_addr);

        let mode = options.mode;
        let task = ReactorTask {
            listener,
            local_addr,
            options,
            inbox,
            handle: self.handle.clone(),
        };

        self.handle.lifecycle.mark(ReactorState::Running);
        match mode {
            Mode::Single => {
                let runtime = build_runtime().map_err(|e| {
                    self.handle.lifecycle.mark(ReactorState::Stopped);
                    ServerError::Runtime(e)
                })?;
                runtime.block_on(task.run());
            }
            Mode::Threaded => {
                let lifecycle = Arc::clone(&self.handle.lifecycle);
                let thread = std::thread::Builder::new()
                    .name("livereload-reactor".to_string())
                    .spawn(move || match build_runtime() {
                        Ok(runtime) => runtime.block_on(task.run()),
                        Err(e) => {
                            logger::log_error(&format!("Failed to build reactor runtime: {e}"));
                            lifecycle.mark(ReactorState::Stopped);
                        }
                    })
                    .map_err(|e| {
                        self.handle.lifecycle.mark(ReactorState::Stopped);
                        ServerError::Runtime(e)
                    })?;
                self.thread = Some(thread);
            }
        }
        Ok(())
    }

    pub fn reload<I, S>(&self, paths: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.handle.reload(paths);
    }

    pub fn stop(&self) {
        self.handle.stop();
    }

    /// Wait for the reactor thread, if one was started
    pub fn join(&mut self) -> Result<(), ServerError> {
        match self.thread.take() {
            Some(thread) => thread.join().map_err(|_| ServerError::ReactorPanicked),
            None => Ok(()),
        }
    }
}

impl Drop for Reactor {
    fn drop(&mut self) {
        self.stop();
    }
}

/// How long channel tasks get to send their close frames on shutdown
const CLOSE_GRACE: Duration = Duration::from_millis(100);

fn build_runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
}

/// State moved onto the reactor thread
struct ReactorTask {
    listener: std::net::TcpListener,
    local_addr: SocketAddr,
    options: ReactorOptions,
    inbox: mpsc::UnboundedReceiver<ReactorCommand>,
    handle: ReactorHandle,
}

impl ReactorTask {
    async fn run(self) {
        let lifecycle = Arc::clone(&self.handle.lifecycle);
        // Use LocalSet for spawn_local support
        let local = tokio::task::LocalSet::new();
        local.run_until(self.run_loop()).await;
        // Let channel tasks flush their close frames, then drop whatever is left
        local.run_until(tokio::time::sleep(CLOSE_GRACE)).await;
        drop(local);
        lifecycle.mark(ReactorState::Stopped);
        logger::log_reactor_halted();
    }

    async fn run_loop(self) {
        let Self {
            listener,
            local_addr,
            options,
            mut inbox,
            handle,
        } = self;

        let listener = match TcpListener::from_std(listener) {
            Ok(listener) => listener,
            Err(e) => {
                logger::log_error(&format!("Failed to register listener {local_addr}: {e}"));
                return;
            }
        };

        if options.handle_signals {
            start_signal_handler(handle.clone());
        }

        let mut self_test = match (options.mode, &options.self_test) {
            (Mode::Single, Some(test)) => Some((
                tokio::time::interval_at(Instant::now() + test.interval, test.interval),
                test.path.clone(),
            )),
            _ => None,
        };

        let ctx = Arc::new(ConnectionContext::new(
            options.asset,
            handle.mailbox.clone(),
            options.handshake_timeout,
            options.access_log_format,
        ));
        let mut core = ReactorCore::new(options.server_name);

        logger::log_reactor_running(&local_addr);

        loop {
            tokio::select! {
                () = handle.lifecycle.shutdown.notified() => break,

                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, peer_addr)) => accept_connection(stream, peer_addr, &ctx),
                        Err(e) => logger::log_error(&format!("Failed to accept connection: {e}")),
                    }
                }

                Some(command) = inbox.recv() => {
                    guarded("reactor command", || core.handle_command(command));
                }

                path = next_self_test(&mut self_test) => {
                    guarded("self-test reload", || core.reload(&[path]));
                }
            }
        }

        core.shutdown();
        drop(listener);
    }
}

/// Wait for the next self-test tick, or forever when there is no self-test
async fn next_self_test(self_test: &mut Option<(Interval, String)>) -> String {
    match self_test {
        Some((interval, path)) => {
            interval.tick().await;
            path.clone()
        }
        None => std::future::pending().await,
    }
}

struct ChannelEntry {
    state: ChannelState,
    peer: SocketAddr,
}

/// Registry and per-channel state machines, driven one command at a time
pub struct ReactorCore {
    server_name: String,
    registry: ChannelRegistry,
    channels: HashMap<ChannelId, ChannelEntry>,
}

impl ReactorCore {
    pub fn new(server_name: impl Into<String>) -> Self {
        Self {
            server_name: server_name.into(),
            registry: ChannelRegistry::new(),
            channels: HashMap::new(),
        }
    }

    pub const fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    /// Current state of a channel. Unknown ids are reported as `Closed`.
    pub fn channel_state(&self, id: ChannelId) -> ChannelState {
        self.channels
            .get(&id)
            .map_or(ChannelState::Closed, |entry| entry.state)
    }

    pub fn handle_command(&mut self, command: ReactorCommand) {
        match command {
            ReactorCommand::Reload(paths) => self.reload(&paths),
            ReactorCommand::Channel(event) => self.on_channel_event(event),
            ReactorCommand::CountChannels(reply) => {
                let _ = reply.send(self.registry.len());
            }
        }
    }

    pub fn on_channel_event(&mut self, event: ChannelEvent) {
        let id = event.id();
        let Some(kind) = event.kind() else {
            if let ChannelEvent::Connecting { id, peer } = event {
                self.channels.insert(
                    id,
                    ChannelEntry {
                        state: ChannelState::Connecting,
                        peer,
                    },
                );
            }
            return;
        };

        // Channels that already reached Closed are forgotten; further events
        // for them fall through here as no-ops.
        let Some(entry) = self.channels.get_mut(&id) else {
            return;
        };
        let (next, effect) = entry.state.transition(kind);
        entry.state = next;
        let peer = entry.peer;
        if next == ChannelState::Closed {
            self.channels.remove(&id);
        }

        match (effect, event) {
            (Effect::Greet, ChannelEvent::Opened { outbound, .. }) => {
                self.open(ChannelHandle::new(id, peer, outbound));
            }
            (Effect::Inspect, ChannelEvent::Message { text, .. }) => inspect(id, &text),
            (Effect::Deregister, ChannelEvent::Error { error, .. }) => {
                logger::log_livereload_error(&error);
                self.close(id);
            }
            (Effect::Deregister, _) => self.close(id),
            _ => {}
        }
    }

    /// Hello first, then registration, so a channel never sees a reload
    /// before it has been greeted.
    fn open(&mut self, channel: ChannelHandle) {
        match HelloMessage::new(self.server_name.as_str()).to_json() {
            Ok(hello) => {
                channel.send_text(&hello);
            }
            Err(e) => logger::log_livereload_error(&e),
        }

        logger::log_channel_opened(channel.id(), &channel.peer());
        if self.registry.add(channel) == 1 {
            logger::log_browser_connected();
        }
    }

    fn close(&mut self, id: ChannelId) {
        if self.registry.remove(id) {
            logger::log_channel_closed(id);
        }
    }

    /// Send one reload message per path to every registered channel
    pub fn reload(&self, paths: &[String]) {
        for path in paths {
            let payload = match ReloadMessage::new(path.as_str()).to_json() {
                Ok(payload) => payload,
                Err(e) => {
                    logger::log_livereload_error(&e);
                    continue;
                }
            };
            logger::log_reload(path, &payload);
            self.registry.broadcast(&payload);
        }
    }

    /// Close every channel and forget all state
    pub fn shutdown(&mut self) {
        self.registry.close_all();
        self.channels.clear();
    }
}

/// Inbound application messages never change state and are never answered
fn inspect(id: ChannelId, text: &str) {
    match ClientCommand::parse(text) {
        Ok(ClientCommand::Url(url)) => logger::log_url_command(url.as_deref().unwrap_or("")),
        Ok(ClientCommand::Other(command)) => {
            logger::log_ignored_message(id, &format!("command '{command}'"));
        }
        Err(e) => logger::log_ignored_message(id, &format!("not a command ({e})")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChannelError;
    use serde_json::Value;
    use tokio_tungstenite::tungstenite::{self, Message};

    fn peer(id: ChannelId) -> SocketAddr {
        format!("127.0.0.1:{}", 50000 + id).parse().unwrap()
    }

    /// Walk a channel through Connecting and Opened, returning its frame queue
    fn open_channel(core: &mut ReactorCore, id: ChannelId) -> mpsc::UnboundedReceiver<Message> {
        let (outbound, rx) = mpsc::unbounded_channel();
        core.on_channel_event(ChannelEvent::Connecting { id, peer: peer(id) });
        core.on_channel_event(ChannelEvent::Opened { id, outbound });
        rx
    }

    fn drain_json(rx: &mut mpsc::UnboundedReceiver<Message>) -> Vec<Value> {
        let mut out = Vec::new();
        while let Ok(message) = rx.try_recv() {
            if let Message::Text(text) = message {
                out.push(serde_json::from_str(text.as_str()).unwrap());
            }
        }
        out
    }

    #[test]
    fn test_hello_then_registration() {
        let mut core = ReactorCore::new("jekyll");
        let (outbound, mut rx) = mpsc::unbounded_channel();

        core.on_channel_event(ChannelEvent::Connecting { id: 1, peer: peer(1) });
        assert_eq!(core.channel_state(1), ChannelState::Connecting);
        assert!(!core.registry().contains(1));

        core.on_channel_event(ChannelEvent::Opened { id: 1, outbound });
        assert_eq!(core.channel_state(1), ChannelState::Open);
        assert!(core.registry().contains(1));

        let messages = drain_json(&mut rx);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["command"], "hello");
        assert_eq!(messages[0]["serverName"], "jekyll");
    }

    #[test]
    fn test_reload_fans_out_in_order() {
        let mut core = ReactorCore::new("jekyll");
        let mut c1 = open_channel(&mut core, 1);
        let mut c2 = open_channel(&mut core, 2);
        drain_json(&mut c1);
        drain_json(&mut c2);

        core.handle_command(ReactorCommand::Reload(vec![
            "/a.html".to_string(),
            "/b.css".to_string(),
        ]));

        for rx in [&mut c1, &mut c2] {
            let messages = drain_json(rx);
            assert_eq!(messages.len(), 2);
            assert_eq!(messages[0]["command"], "reload");
            assert_eq!(messages[0]["path"], "/a.html");
            assert_eq!(messages[0]["liveCSS"], true);
            assert_eq!(messages[1]["path"], "/b.css");
            assert_eq!(messages[1]["liveCSS"], true);
        }
    }

    #[test]
    fn test_reload_without_channels() {
        let core = ReactorCore::new("jekyll");
        core.reload(&["/index.html".to_string()]);
        assert!(core.registry().is_empty());
    }

    #[test]
    fn test_close_then_error_removes_once() {
        let mut core = ReactorCore::new("jekyll");
        let _c1 = open_channel(&mut core, 1);
        let mut c2 = open_channel(&mut core, 2);
        drain_json(&mut c2);

        core.on_channel_event(ChannelEvent::Closed { id: 1 });
        assert!(!core.registry().contains(1));
        assert_eq!(core.channel_state(1), ChannelState::Closed);

        core.on_channel_event(ChannelEvent::Error {
            id: 1,
            error: ChannelError::Protocol(tungstenite::Error::ConnectionClosed),
        });
        assert!(!core.registry().contains(1));
        assert_eq!(core.registry().len(), 1);

        core.reload(&["/still-works.html".to_string()]);
        assert_eq!(drain_json(&mut c2).len(), 1);
    }

    #[test]
    fn test_error_removes_channel() {
        let mut core = ReactorCore::new("jekyll");
        let _c1 = open_channel(&mut core, 1);

        core.on_channel_event(ChannelEvent::Error {
            id: 1,
            error: ChannelError::Protocol(tungstenite::Error::AlreadyClosed),
        });
        assert!(core.registry().is_empty());
        assert_eq!(core.channel_state(1), ChannelState::Closed);
    }

    #[test]
    fn test_inbound_messages_change_nothing() {
        let mut core = ReactorCore::new("jekyll");
        let mut c1 = open_channel(&mut core, 1);
        drain_json(&mut c1);

        for text in [
            r#"{"command":"ping"}"#,
            r#"{"command":"url","url":"http://localhost:4000/"}"#,
            r#"{"command":"hello","protocols":[]}"#,
            "garbage",
        ] {
            core.on_channel_event(ChannelEvent::Message {
                id: 1,
                text: text.to_string(),
            });
        }

        assert_eq!(core.channel_state(1), ChannelState::Open);
        assert!(core.registry().contains(1));
        assert!(drain_json(&mut c1).is_empty());
    }

    #[test]
    fn test_events_for_unknown_channels_are_ignored() {
        let mut core = ReactorCore::new("jekyll");
        let (outbound, mut rx) = mpsc::unbounded_channel();

        // Opened without Connecting: never registered
        core.on_channel_event(ChannelEvent::Opened { id: 5, outbound });
        core.on_channel_event(ChannelEvent::Closed { id: 6 });

        assert!(core.registry().is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_shutdown_closes_channels() {
        let mut core = ReactorCore::new("jekyll");
        let mut c1 = open_channel(&mut core, 1);
        drain_json(&mut c1);

        core.shutdown();
        assert!(core.registry().is_empty());
        assert!(matches!(c1.try_recv(), Ok(Message::Close(None))));
    }

    #[tokio::test]
    async fn test_count_channels_command() {
        let mut core = ReactorCore::new("jekyll");
        let _c1 = open_channel(&mut core, 1);

        let (tx, rx) = oneshot::channel();
        core.handle_command(ReactorCommand::CountChannels(tx));
        assert_eq!(rx.await.unwrap(), 1);
    }

    #[test]
    fn test_stop_before_start_is_a_no_op() {
        let options = ReactorOptions::new(
            "127.0.0.1:0".parse().unwrap(),
            BootstrapAsset::from_bytes(""),
        );
        let reactor = Reactor::new(options);
        let handle = reactor.handle();

        reactor.stop();
        reactor.stop();
        handle.stop();
        assert_eq!(handle.state(), ReactorState::Idle);
    }

    #[test]
    fn test_options_from_config() {
        let mut config = Config::load_from("does-not-exist/livereload").unwrap();
        config.livereload.server_name = "docs".to_string();
        config.logging.access_log = false;

        let options =
            ReactorOptions::from_config(&config, BootstrapAsset::from_bytes(""), Mode::Threaded)
                .unwrap();
        assert_eq!(options.addr, "127.0.0.1:35729".parse().unwrap());
        assert_eq!(options.mode, Mode::Threaded);
        assert_eq!(options.server_name, "docs");
        assert!(options.access_log_format.is_none());
        assert!(options.handle_signals);

        let test = options.self_test.unwrap();
        assert_eq!(test.interval, Duration::from_secs(5));
        assert_eq!(test.path, "/test.html");

        config.livereload.self_test_interval_secs = 0;
        let options =
            ReactorOptions::from_config(&config, BootstrapAsset::from_bytes(""), Mode::Single)
                .unwrap();
        assert!(options.self_test.is_none());
    }

    fn self_test_options(mode: Mode) -> ReactorOptions {
        let mut options = ReactorOptions::new(
            "127.0.0.1:0".parse().unwrap(),
            BootstrapAsset::from_bytes(""),
        );
        options.mode = mode;
        options.self_test = Some(SelfTest {
            interval: Duration::from_millis(50),
            path: "/test.html".to_string(),
        });
        options
    }

    /// Register a channel through the mailbox, as a connection task would
    fn attach_channel(handle: &ReactorHandle, id: ChannelId) -> mpsc::UnboundedReceiver<Message> {
        let (outbound, rx) = mpsc::unbounded_channel();
        assert!(handle.mailbox.post(ChannelEvent::Connecting { id, peer: peer(id) }));
        assert!(handle.mailbox.post(ChannelEvent::Opened { id, outbound }));
        rx
    }

    async fn next_json(rx: &mut mpsc::UnboundedReceiver<Message>) -> Value {
        loop {
            let message = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("no message from the reactor")
                .expect("channel queue closed");
            if let Message::Text(text) = message {
                return serde_json::from_str(text.as_str()).unwrap();
            }
        }
    }

    #[tokio::test]
    async fn test_self_test_fires_in_single_mode() {
        let mut reactor = Reactor::new(self_test_options(Mode::Single));
        let handle = reactor.handle();
        let mut rx = attach_channel(&handle, 1);

        // Single mode blocks its caller
        let thread = std::thread::spawn(move || reactor.start());

        assert_eq!(next_json(&mut rx).await["command"], "hello");
        let reload = next_json(&mut rx).await;
        assert_eq!(reload["command"], "reload");
        assert_eq!(reload["path"], "/test.html");
        assert_eq!(reload["liveCSS"], true);

        handle.stop();
        tokio::task::spawn_blocking(move || thread.join())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(handle.state(), ReactorState::Stopped);
    }

    #[tokio::test]
    async fn test_self_test_stays_off_in_threaded_mode() {
        let mut reactor = Reactor::new(self_test_options(Mode::Threaded));
        let handle = reactor.handle();
        let mut rx = attach_channel(&handle, 1);
        reactor.start().unwrap();

        assert_eq!(next_json(&mut rx).await["command"], "hello");
        // Several intervals pass without a reload
        assert!(
            tokio::time::timeout(Duration::from_millis(300), rx.recv())
                .await
                .is_err()
        );

        // An explicit reload still goes through
        handle.reload(["/index.html"]);
        assert_eq!(next_json(&mut rx).await["path"], "/index.html");

        reactor.stop();
        tokio::task::spawn_blocking(move || reactor.join())
            .await
            .unwrap()
            .unwrap();
    }
}
