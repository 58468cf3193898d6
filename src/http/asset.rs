//! Bootstrap script loading
//!
//! `livereload.js` is read once at startup and served from memory, so a
//! request never waits on the filesystem.

use std::path::Path;

use hyper::body::Bytes;

use crate::error::AssetError;

/// Public URL path of the bootstrap script
pub const ASSET_URL_PATH: &str = "/livereload.js";

/// The in-memory bootstrap script
#[derive(Debug, Clone)]
pub struct BootstrapAsset {
    body: Bytes,
}

impl BootstrapAsset {
    /// Read the script from disk. Failure here is fatal for the server.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AssetError> {
        let path = path.as_ref();
        let body = std::fs::read(path).map_err(|source| AssetError {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            body: Bytes::from(body),
        })
    }

    pub fn from_bytes(body: impl Into<Bytes>) -> Self {
        Self { body: body.into() }
    }

    /// Cheap clone of the script bytes
    pub fn body(&self) -> Bytes {
        self.body.clone()
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}
