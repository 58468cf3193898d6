//! End-to-end tests against a reactor running on its own thread.

use std::io::Write;
use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use livereload_server::http::BAD_REQUEST_BODY;
use livereload_server::{BootstrapAsset, Mode, Reactor, ReactorOptions, ReactorState, ServerError};
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);
const SCRIPT: &[u8] = b"(function(){ /* livereload client */ })();\n";

fn start_reactor() -> (Reactor, SocketAddr) {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(SCRIPT).unwrap();
    let asset = BootstrapAsset::load(file.path()).unwrap();

    let mut options = ReactorOptions::new("127.0.0.1:0".parse().unwrap(), asset);
    options.mode = Mode::Threaded;
    options.server_name = "test-server".to_string();

    let mut reactor = Reactor::new(options);
    reactor.start().unwrap();
    let addr = reactor.local_addr().unwrap();
    (reactor, addr)
}

async fn shutdown(mut reactor: Reactor) {
    let handle = reactor.handle();
    reactor.stop();
    timeout(WAIT, handle.stopped()).await.unwrap();
    tokio::task::spawn_blocking(move || reactor.join())
        .await
        .unwrap()
        .unwrap();
}

/// Send a raw request and read until the server closes the connection
async fn http_exchange(addr: SocketAddr, request: &str) -> (String, Vec<u8>) {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut raw = Vec::new();
    timeout(WAIT, stream.read_to_end(&mut raw))
        .await
        .expect("server did not close the connection")
        .unwrap();

    let split = raw
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("no header terminator");
    let head = String::from_utf8(raw[..split].to_vec()).unwrap();
    (head, raw[split + 4..].to_vec())
}

fn header<'a>(head: &'a str, name: &str) -> Option<&'a str> {
    head.lines().skip(1).find_map(|line| {
        let (key, value) = line.split_once(':')?;
        key.trim()
            .eq_ignore_ascii_case(name)
            .then(|| value.trim())
    })
}

async fn connect(addr: SocketAddr) -> WsStream {
    let (ws, _) = connect_async(format!("ws://{addr}/livereload")).await.unwrap();
    ws
}

async fn next_json(ws: &mut WsStream) -> Value {
    loop {
        let message = timeout(WAIT, ws.next())
            .await
            .expect("timed out waiting for a message")
            .expect("channel closed")
            .unwrap();
        if let Message::Text(text) = message {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

/// Connect and consume the hello. Once the hello has arrived the channel is registered.
async fn connect_greeted(addr: SocketAddr) -> WsStream {
    let mut ws = connect(addr).await;
    let hello = next_json(&mut ws).await;
    assert_eq!(hello["command"], "hello");
    ws
}

#[tokio::test]
async fn serves_bootstrap_script() {
    let (reactor, addr) = start_reactor();

    for target in ["/livereload.js", "/livereload.js?snipver=1&port=35729"] {
        let request = format!("GET {target} HTTP/1.1\r\nHost: localhost\r\n\r\n");
        let (head, body) = http_exchange(addr, &request).await;

        assert!(head.starts_with("HTTP/1.1 200 OK"), "{head}");
        assert_eq!(header(&head, "content-type"), Some("application/javascript"));
        assert_eq!(
            header(&head, "content-length"),
            Some(SCRIPT.len().to_string().as_str())
        );
        assert_eq!(body, SCRIPT);
    }

    shutdown(reactor).await;
}

#[tokio::test]
async fn other_paths_get_400() {
    let (reactor, addr) = start_reactor();

    for target in ["/", "/index.html", "/js/livereload.js"] {
        let request = format!("GET {target} HTTP/1.1\r\nHost: localhost\r\n\r\n");
        let (head, body) = http_exchange(addr, &request).await;

        assert!(head.starts_with("HTTP/1.1 400 Bad Request"), "{head}");
        assert_eq!(header(&head, "content-type"), Some("text/plain"));
        assert_eq!(body, BAD_REQUEST_BODY.as_bytes());
    }

    shutdown(reactor).await;
}

#[tokio::test]
async fn unparseable_requests_get_the_fallback_400() {
    let (reactor, addr) = start_reactor();

    for request in [
        "garbage\r\n\r\n",
        "\x00\x01\x02 nonsense",
        "GET /index.html HTTP/9.9\r\n\r\n",
        "GET /index.html HTTP/1.1\r\nbad header line\r\n\r\n",
    ] {
        let (head, body) = http_exchange(addr, request).await;

        assert!(head.starts_with("HTTP/1.1 400 Bad Request"), "{request:?}: {head}");
        assert_eq!(header(&head, "content-type"), Some("text/plain"));
        assert_eq!(
            header(&head, "content-length"),
            Some(BAD_REQUEST_BODY.len().to_string().as_str())
        );
        assert_eq!(body, BAD_REQUEST_BODY.as_bytes(), "{request:?}");
    }

    // The server is still serving afterwards
    let (head, body) = http_exchange(addr, "GET /livereload.js HTTP/1.1\r\n\r\n").await;
    assert!(head.starts_with("HTTP/1.1 200 OK"), "{head}");
    assert_eq!(body, SCRIPT);

    shutdown(reactor).await;
}

#[tokio::test]
async fn bad_header_after_asset_request_line_still_serves_script() {
    let (reactor, addr) = start_reactor();

    let (head, body) =
        http_exchange(addr, "GET /livereload.js?snipver=1 HTTP/1.1\r\nbad header line").await;

    assert!(head.starts_with("HTTP/1.1 200 OK"), "{head}");
    assert_eq!(header(&head, "content-type"), Some("application/javascript"));
    assert_eq!(body, SCRIPT);

    shutdown(reactor).await;
}

#[tokio::test]
async fn non_get_is_treated_as_handshake() {
    let (reactor, addr) = start_reactor();

    let request = "POST /livereload.js HTTP/1.1\r\nHost: localhost\r\nContent-Length: 0\r\n\r\n";
    let (head, body) = http_exchange(addr, request).await;

    // Not a valid handshake, and never the script
    assert!(head.starts_with("HTTP/1.1 400 Bad Request"), "{head}");
    assert_ne!(body, SCRIPT);
    assert_eq!(reactor.handle().open_channels().await, Some(0));

    shutdown(reactor).await;
}

#[tokio::test]
async fn hello_is_sent_before_registration() {
    let (reactor, addr) = start_reactor();
    let handle = reactor.handle();

    let mut ws = connect(addr).await;
    let hello = next_json(&mut ws).await;
    assert_eq!(hello["command"], "hello");
    assert_eq!(
        hello["protocols"],
        serde_json::json!(["http://livereload.com/protocols/official-7"])
    );
    assert_eq!(hello["serverName"], "test-server");
    assert_eq!(handle.open_channels().await, Some(1));

    shutdown(reactor).await;
}

#[tokio::test]
async fn reload_reaches_every_channel_in_order() {
    let (reactor, addr) = start_reactor();

    let mut c1 = connect_greeted(addr).await;
    let mut c2 = connect_greeted(addr).await;

    reactor.reload(["/a.html", "/b.css"]);

    for ws in [&mut c1, &mut c2] {
        let first = next_json(ws).await;
        let second = next_json(ws).await;
        assert_eq!(
            first,
            serde_json::json!({"command": "reload", "path": "/a.html", "liveCSS": true})
        );
        assert_eq!(
            second,
            serde_json::json!({"command": "reload", "path": "/b.css", "liveCSS": true})
        );
    }

    shutdown(reactor).await;
}

#[tokio::test]
async fn reload_from_another_thread() {
    let (reactor, addr) = start_reactor();
    let handle = reactor.handle();
    let mut ws = connect_greeted(addr).await;

    std::thread::spawn(move || handle.reload(["/from-thread.html"]))
        .join()
        .unwrap();

    let message = next_json(&mut ws).await;
    assert_eq!(message["path"], "/from-thread.html");

    shutdown(reactor).await;
}

#[tokio::test]
async fn inbound_commands_do_not_disturb_the_channel() {
    let (reactor, addr) = start_reactor();
    let handle = reactor.handle();
    let mut ws = connect_greeted(addr).await;

    ws.send(Message::text(r#"{"command":"ping"}"#)).await.unwrap();
    ws.send(Message::text(r#"{"command":"url","url":"http://localhost:4000/"}"#))
        .await
        .unwrap();
    ws.send(Message::text("not json at all")).await.unwrap();

    reactor.reload(["/after.html"]);

    // No replies to the inbound messages: the next frame is the reload
    let message = next_json(&mut ws).await;
    assert_eq!(message["command"], "reload");
    assert_eq!(message["path"], "/after.html");
    assert_eq!(handle.open_channels().await, Some(1));

    shutdown(reactor).await;
}

#[tokio::test]
async fn closed_channel_leaves_the_registry() {
    let (reactor, addr) = start_reactor();
    let handle = reactor.handle();

    let mut c1 = connect_greeted(addr).await;
    let mut c2 = connect_greeted(addr).await;
    assert_eq!(handle.open_channels().await, Some(2));

    c1.close(None).await.unwrap();

    timeout(WAIT, async {
        while handle.open_channels().await != Some(1) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("closed channel was never removed");

    reactor.reload(["/still-here.html"]);
    assert_eq!(next_json(&mut c2).await["path"], "/still-here.html");

    shutdown(reactor).await;
}

#[tokio::test]
async fn stop_closes_channels_and_listener() {
    let (mut reactor, addr) = start_reactor();
    let handle = reactor.handle();
    let mut ws = connect_greeted(addr).await;

    reactor.stop();
    reactor.stop();
    timeout(WAIT, handle.stopped()).await.unwrap();
    assert_eq!(handle.state(), ReactorState::Stopped);

    // The channel sees a close frame or the end of the stream
    let next = timeout(WAIT, ws.next()).await.unwrap();
    assert!(matches!(next, None | Some(Ok(Message::Close(_))) | Some(Err(_))));

    assert!(TcpStream::connect(addr).await.is_err());
    assert_eq!(handle.open_channels().await, None);

    // Stopping an already stopped reactor is still fine
    handle.stop();
    tokio::task::spawn_blocking(move || reactor.join())
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn start_twice_is_rejected() {
    let (mut reactor, _addr) = start_reactor();

    assert!(matches!(reactor.start(), Err(ServerError::AlreadyRunning)));

    shutdown(reactor).await;
}

#[test]
fn stop_before_start_is_harmless() {
    let mut options = ReactorOptions::new(
        "127.0.0.1:0".parse().unwrap(),
        BootstrapAsset::from_bytes(SCRIPT),
    );
    options.mode = Mode::Threaded;
    let mut reactor = Reactor::new(options);

    reactor.stop();
    reactor.stop();
    assert_eq!(reactor.handle().state(), ReactorState::Idle);

    reactor.start().unwrap();
    assert_eq!(reactor.handle().state(), ReactorState::Running);
    reactor.stop();
    reactor.join().unwrap();
    assert_eq!(reactor.handle().state(), ReactorState::Stopped);
}
