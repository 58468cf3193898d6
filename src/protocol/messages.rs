//! LiveReload protocol messages
//!
//! See <http://livereload.com/protocols/official-7> for the wire contract.

use serde::{Deserialize, Serialize};

/// Capability URI announced in every hello
pub const PROTOCOL_OFFICIAL_7: &str = "http://livereload.com/protocols/official-7";

/// Greeting sent once to a channel right after its handshake
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HelloMessage {
    command: &'static str,
    protocols: Vec<&'static str>,
    #[serde(rename = "serverName")]
    server_name: String,
}

impl HelloMessage {
    pub fn new(server_name: impl Into<String>) -> Self {
        Self {
            command: "hello",
            protocols: vec![PROTOCOL_OFFICIAL_7],
            server_name: server_name.into(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Instruction to reload one page or asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReloadMessage {
    command: &'static str,
    path: String,
    #[serde(rename = "liveCSS")]
    live_css: bool,
}

impl ReloadMessage {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            command: "reload",
            path: path.into(),
            live_css: true,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Deserialize)]
struct RawClientMessage {
    command: String,
    #[serde(default)]
    url: Option<String>,
}

/// Inbound message from a browser
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    /// The page the browser is showing. Informational only.
    Url(Option<String>),
    /// Anything else, kept only for diagnostics
    Other(String),
}

impl ClientCommand {
    /// Parse a text frame. Fails only if it is not a JSON object with a
    /// string `command` field.
    pub fn parse(text: &str) -> serde_json::Result<Self> {
        let raw: RawClientMessage = serde_json::from_str(text)?;
        Ok(match raw.command.as_str() {
            "url" => Self::Url(raw.url),
            _ => Self::Other(raw.command),
        })
    }
}
