//! Logger module
//!
//! Provides logging utilities for the LiveReload server including:
//! - Reactor lifecycle logging
//! - Push channel events and reload broadcasts
//! - Access logging with multiple formats for the plain HTTP side
//! - Error and warning logging
//! - File-based logging support

mod format;
pub mod writer;

pub use format::AccessLogEntry;
pub use writer::LogLevel;

use crate::config::Config;
use std::error::Error;
use std::net::SocketAddr;

/// Initialize the logger with configuration
///
/// Should be called once at application startup. An unknown level falls back
/// to `info`.
pub fn init(config: &Config) -> std::io::Result<()> {
    let level = config.logging.level.parse().unwrap_or(LogLevel::Info);
    writer::init(
        level,
        config.logging.access_log_file.as_deref(),
        config.logging.error_log_file.as_deref(),
    )
}

fn enabled(level: LogLevel) -> bool {
    let current = writer::get().map_or(LogLevel::Info, writer::LogWriter::level);
    level >= current
}

/// Write to info/access log
fn write_info(message: &str) {
    if !enabled(LogLevel::Info) {
        return;
    }
    match writer::get() {
        Some(w) => w.write_info(message),
        None => println!("{message}"),
    }
}

fn write_debug(message: &str) {
    if !enabled(LogLevel::Debug) {
        return;
    }
    match writer::get() {
        Some(w) => w.write_info(message),
        None => println!("{message}"),
    }
}

/// Write to error log
fn write_error(message: &str) {
    match writer::get() {
        Some(w) => w.write_error(message),
        None => eprintln!("{message}"),
    }
}

/// Write to access log specifically
fn write_access(message: &str) {
    if !enabled(LogLevel::Info) {
        return;
    }
    match writer::get() {
        Some(w) => w.write_access(message),
        None => println!("{message}"),
    }
}

pub fn log_mode(threaded: bool) {
    write_info(&format!("Threaded mode? {threaded}"));
}

pub fn log_server_start(addr: &SocketAddr, config: &Config) {
    write_info("======================================");
    write_info("LiveReload server started");
    write_info(&format!("Listening on: ws://{addr}"));
    write_info(&format!("Bootstrap script: http://{addr}/livereload.js"));
    write_info(&format!("Log level: {}", config.logging.level));
    if let Some(ref path) = config.logging.access_log_file {
        write_info(&format!("Access log: {path}"));
    }
    if let Some(ref path) = config.logging.error_log_file {
        write_info(&format!("Error log: {path}"));
    }
    write_info("======================================\n");
}

pub fn log_reactor_running(addr: &SocketAddr) {
    write_info(&format!("Running on {addr}"));
}

pub fn log_reactor_halted() {
    write_info("LiveReload Server: halted");
}

pub fn log_connection_accepted(peer_addr: &SocketAddr) {
    write_debug(&format!("[Connection] Accepted from: {peer_addr}"));
}

pub fn log_connection_error(err: &impl std::fmt::Debug) {
    write_error(&format!("[ERROR] Failed to serve connection: {err:?}"));
}

pub fn log_malformed_request(peer_addr: &SocketAddr, handled_as: &str) {
    write_info(&format!(
        "[Connection] Malformed request from {peer_addr}, answered as {handled_as}"
    ));
}

pub fn log_browser_connected() {
    write_info("Browser connected");
}

pub fn log_channel_opened(id: u64, peer_addr: &SocketAddr) {
    write_debug(&format!("[Channel {id}] Open ({peer_addr})"));
}

pub fn log_channel_closed(id: u64) {
    write_debug(&format!("[Channel {id}] Closed"));
}

pub fn log_reload(path: &str, payload: &str) {
    write_info(&format!("Reloading {path}"));
    write_info(payload);
}

pub fn log_url_command(url: &str) {
    write_info(url);
}

pub fn log_ignored_message(id: u64, detail: &str) {
    write_debug(&format!("[Channel {id}] Ignored message: {detail}"));
}

/// Log an error with its full source chain
pub fn log_livereload_error(err: &dyn Error) {
    write_error(&format!("LiveReload Error: {err}"));
    let mut source = err.source();
    while let Some(cause) = source {
        write_error(&format!("  caused by: {cause}"));
        source = cause.source();
    }
}

/// Log a panic caught at the reactor or task boundary, with where it happened
pub fn log_handler_fault(
    context: &str,
    message: &str,
    location: Option<&str>,
    backtrace: Option<&str>,
) {
    match location {
        Some(location) => write_error(&format!(
            "LiveReload Error: {context} panicked at {location}: {message}"
        )),
        None => write_error(&format!("LiveReload Error: {context} panicked: {message}")),
    }
    if let Some(backtrace) = backtrace {
        for line in backtrace.lines() {
            write_error(&format!("  {line}"));
        }
    }
}

pub fn log_signal(name: &str) {
    write_info(&format!("\n[SIGNAL] {name} received, stopping LiveReload server"));
}

pub fn log_error(message: &str) {
    write_error(&format!("[ERROR] {message}"));
}

pub fn log_warning(message: &str) {
    write_error(&format!("[WARN] {message}"));
}

/// Log formatted access log entry
pub fn log_access(entry: &AccessLogEntry, format: &str) {
    write_access(&entry.format(format));
}
