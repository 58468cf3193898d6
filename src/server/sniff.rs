//! First-bytes inspection
//!
//! Before hyper sees a connection, the request head is read and parsed with
//! `httparse`. Well-formed heads are replayed into hyper untouched. Heads hyper
//! would reject get an answer from the dispatcher instead, so every plain HTTP
//! client receives a proper 200 or 400.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use hyper::body::Bytes;
use hyper::header::CONTENT_LENGTH;
use hyper::Method;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, ReadBuf};

/// Request heads larger than this are not worth parsing
pub const MAX_HEAD_BYTES: usize = 8 * 1024;
const MAX_HEADERS: usize = 100;
const READ_CHUNK: usize = 2048;

/// A request head that cannot be handed to hyper
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedRequest {
    /// Not even a method could be read
    Unreadable,
    /// The request line parsed, something after it did not
    RequestLine {
        method: Method,
        /// Target path without query or fragment
        path: String,
        /// A raw `Upgrade:` line was present
        upgrade: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inspection {
    /// A complete head hyper will accept
    Complete,
    Malformed(MalformedRequest),
}

/// Result of reading the start of a connection
#[derive(Debug)]
pub enum FirstRequest {
    /// Everything read so far, to be replayed into hyper
    Http(Bytes),
    Malformed(MalformedRequest),
    /// The peer went away before sending anything
    Closed,
}

/// Inspect the bytes received so far. `None` means more bytes are needed.
pub fn inspect(buf: &[u8]) -> Option<Inspection> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut req = httparse::Request::new(&mut headers);

    match req.parse(buf) {
        Ok(httparse::Status::Partial) => None,
        Ok(httparse::Status::Complete(_)) => {
            let bad_length = req.headers.iter().any(|h| {
                h.name.eq_ignore_ascii_case(CONTENT_LENGTH.as_str())
                    && std::str::from_utf8(h.value)
                        .ok()
                        .and_then(|v| v.trim().parse::<u64>().ok())
                        .is_none()
            });
            if bad_length {
                Some(Inspection::Malformed(request_line(req.method, req.path, buf)))
            } else {
                Some(Inspection::Complete)
            }
        }
        // httparse fills the request line in as it goes, so whatever it got
        // through before the error is still there
        Err(_) => Some(Inspection::Malformed(request_line(req.method, req.path, buf))),
    }
}

fn request_line(method: Option<&str>, target: Option<&str>, buf: &[u8]) -> MalformedRequest {
    let (Some(method), Some(target)) = (method, target) else {
        return MalformedRequest::Unreadable;
    };
    let Ok(method) = Method::from_bytes(method.as_bytes()) else {
        return MalformedRequest::Unreadable;
    };

    let path = target
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .to_string();

    MalformedRequest::RequestLine {
        method,
        path,
        upgrade: has_raw_upgrade_line(buf),
    }
}

/// Look for an `Upgrade:` header line without trusting the rest of the head
fn has_raw_upgrade_line(buf: &[u8]) -> bool {
    buf.split(|&b| b == b'\n').skip(1).any(|line| {
        line.len() > b"upgrade:".len()
            && line[..b"upgrade:".len()].eq_ignore_ascii_case(b"upgrade:")
    })
}

/// Read until the first request head is complete, malformed, or too large.
pub async fn read_first_request<S>(stream: &mut S) -> io::Result<FirstRequest>
where
    S: AsyncRead + Unpin,
{
    let mut buf = Vec::with_capacity(READ_CHUNK);
    let mut chunk = [0_u8; READ_CHUNK];

    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(if buf.is_empty() {
                FirstRequest::Closed
            } else {
                // Peer half-closed mid-head
                FirstRequest::Malformed(match inspect(&buf) {
                    Some(Inspection::Malformed(malformed)) => malformed,
                    _ => MalformedRequest::Unreadable,
                })
            });
        }
        buf.extend_from_slice(&chunk[..n]);

        match inspect(&buf) {
            Some(Inspection::Complete) => return Ok(FirstRequest::Http(Bytes::from(buf))),
            Some(Inspection::Malformed(malformed)) => return Ok(FirstRequest::Malformed(malformed)),
            None if buf.len() >= MAX_HEAD_BYTES => {
                return Ok(FirstRequest::Malformed(MalformedRequest::Unreadable));
            }
            None => {}
        }
    }
}

/// An IO that yields `prefix` before reading from `inner`
#[derive(Debug)]
pub struct Replay<T> {
    prefix: Bytes,
    inner: T,
}

impl<T> Replay<T> {
    pub const fn new(prefix: Bytes, inner: T) -> Self {
        Self { prefix, inner }
    }
}

impl<T: AsyncRead + Unpin> AsyncRead for Replay<T> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if !this.prefix.is_empty() {
            let n = this.prefix.len().min(buf.remaining());
            buf.put_slice(&this.prefix.split_to(n));
            return Poll::Ready(Ok(()));
        }
        Pin::new(&mut this.inner).poll_read(cx, buf)
    }
}

impl<T: AsyncWrite + Unpin> AsyncWrite for Replay<T> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write_vectored(cx, bufs)
    }

    fn is_write_vectored(&self) -> bool {
        self.inner.is_write_vectored()
    }
}
