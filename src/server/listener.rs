// Listener module
// Creates the LiveReload listening socket

use socket2::{Domain, Protocol, Socket, Type};

/// Create a non-blocking `std::net::TcpListener` with `SO_REUSEADDR` enabled.
///
/// The socket is bound on the caller's thread so bind errors surface before
/// the reactor starts, and so `local_addr()` is known up front. The reactor
/// converts it into a tokio listener inside its own runtime.
///
/// # Arguments
///
/// * `addr` - The socket address to bind to
pub fn create_listener(addr: std::net::SocketAddr) -> std::io::Result<std::net::TcpListener> {
    // Create socket with appropriate domain (IPv4 or IPv6)
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };

    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;

    // Allow quick restarts while old connections sit in TIME_WAIT
    socket.set_reuse_address(true)?;

    // Set non-blocking mode for async compatibility
    socket.set_nonblocking(true)?;

    socket.bind(&addr.into())?;

    // Start listening with a backlog queue size of 128
    socket.listen(128)?;

    Ok(socket.into())
}
