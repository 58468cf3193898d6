// Signal handling module
//
// Supported signals:
// - SIGINT:  Stop the reactor (Ctrl+C)
// - SIGTERM: Stop the reactor

use super::reactor::ReactorHandle;
use crate::logger;

/// Start signal handlers (Unix only)
///
/// Spawns a task on the reactor's runtime that stops the reactor on the first
/// SIGINT or SIGTERM. Once the reactor loop returns, `start()` (single mode)
/// or the main thread's wait (threaded mode) returns and the process exits.
#[cfg(unix)]
pub fn start_signal_handler(handle: ReactorHandle) {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let (mut sigint, mut sigterm) =
            match (signal(SignalKind::interrupt()), signal(SignalKind::terminate())) {
                (Ok(sigint), Ok(sigterm)) => (sigint, sigterm),
                (Err(e), _) | (_, Err(e)) => {
                    logger::log_error(&format!("Failed to register signal handlers: {e}"));
                    return;
                }
            };

        tokio::select! {
            _ = sigint.recv() => logger::log_signal("SIGINT"),
            _ = sigterm.recv() => logger::log_signal("SIGTERM"),
        }

        handle.stop();
    });
}

/// Windows fallback - only handles Ctrl+C
#[cfg(not(unix))]
pub fn start_signal_handler(handle: ReactorHandle) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                logger::log_signal("Ctrl+C");
                handle.stop();
            }
            Err(e) => logger::log_error(&format!("Failed to listen for Ctrl+C: {e}")),
        }
    });
}
