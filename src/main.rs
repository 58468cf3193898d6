use std::time::Duration;

use clap::{Parser, ValueEnum};
use livereload_server::config::{Config, DEFAULT_CONFIG_NAME};
use livereload_server::error::ServerError;
use livereload_server::{logger, BootstrapAsset, Mode, Reactor, ReactorHandle, ReactorOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CliMode {
    /// Reactor on the main thread with a built-in self-test reload
    Single,
    /// Reactor on a background thread; the main thread drives the reloads
    Threaded,
}

/// LiveReload notification server
#[derive(Debug, Parser)]
#[command(name = "livereload-server", version, about)]
struct Cli {
    #[arg(value_enum, default_value_t = CliMode::Single)]
    mode: CliMode,

    /// Configuration file, without extension
    #[arg(long, default_value = DEFAULT_CONFIG_NAME)]
    config: String,

    /// Listen host, overrides the configuration file
    #[arg(long, env = "LIVERELOAD_HOST")]
    host: Option<String>,

    /// Listen port, overrides the configuration file
    #[arg(long, env = "LIVERELOAD_PORT")]
    port: Option<u16>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut cfg = Config::load_from(&cli.config)?;
    if let Some(host) = cli.host {
        cfg.server.host = host;
    }
    if let Some(port) = cli.port {
        cfg.server.port = port;
    }

    logger::init(&cfg)?;

    // Without the bootstrap script there is nothing useful to serve
    let asset = BootstrapAsset::load(&cfg.livereload.asset_path)?;

    let mode = match cli.mode {
        CliMode::Single => Mode::Single,
        CliMode::Threaded => Mode::Threaded,
    };
    logger::log_mode(mode == Mode::Threaded);

    let options = ReactorOptions::from_config(&cfg, asset, mode)?;
    logger::log_server_start(&options.addr, &cfg);

    let mut reactor = Reactor::new(options);
    reactor.start()?;

    if mode == Mode::Threaded {
        drive_self_test(
            &reactor.handle(),
            cfg.self_test_interval(),
            &cfg.livereload.self_test_path,
        )?;
        reactor.join()?;
    }

    Ok(())
}

/// Threaded mode: issue the diagnostic reload from this thread until the
/// reactor stops.
fn drive_self_test(
    handle: &ReactorHandle,
    interval: Duration,
    path: &str,
) -> Result<(), ServerError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .map_err(ServerError::Runtime)?;

    runtime.block_on(async {
        if interval.is_zero() {
            handle.stopped().await;
            return;
        }

        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => handle.reload([path]),
                () = handle.stopped() => break,
            }
        }
    });

    Ok(())
}
