//! LiveReload notification server
//!
//! Browsers load `livereload.js` over plain HTTP from the LiveReload port,
//! then open a WebSocket to the same port. When files change, the embedding
//! program calls [`Reactor::reload`] (or [`ReactorHandle::reload`]) and every
//! connected browser is told which path to reload.
//!
//! ```no_run
//! use livereload_server::{BootstrapAsset, Mode, Reactor, ReactorOptions};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let asset = BootstrapAsset::load("content/livereload.js")?;
//! let mut options = ReactorOptions::new("127.0.0.1:35729".parse()?, asset);
//! options.mode = Mode::Threaded;
//!
//! let mut reactor = Reactor::new(options);
//! reactor.start()?;
//! reactor.reload(["/index.html", "/css/site.css"]);
//! reactor.stop();
//! reactor.join()?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod logger;
pub mod protocol;
pub mod server;

pub use crate::config::Config;
pub use error::{AssetError, ChannelError, HandshakeError, ServerError};
pub use http::BootstrapAsset;
pub use server::{Mode, Reactor, ReactorHandle, ReactorOptions, ReactorState};
