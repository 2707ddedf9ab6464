use bytes::Bytes;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;
use tracing::warn;

use crate::Error;
use crate::Result;

/// Last-write-wins holder of the raw relayed document.
#[derive(Debug, Default)]
pub struct WorkerCache {
    config: RwLock<Option<Bytes>>,
}

impl WorkerCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the cached document.
    ///
    /// # Errors
    /// - `Error::NotFound` for an empty payload
    /// - `Error::Conflict` when the payload is not well-formed JSON
    pub fn save(
        &self,
        payload: Bytes,
    ) -> Result<()> {
        if payload.is_empty() {
            return Err(Error::NotFound);
        }
        if let Err(e) = serde_json::from_slice::<Value>(&payload) {
            warn!("rejecting malformed config payload: {}", e);
            return Err(Error::Conflict);
        }

        debug!(bytes = payload.len(), "worker cache replaced");
        *self.config.write() = Some(payload);
        Ok(())
    }

    /// Decoded copy of the cached document, `Error::NotFound` before the
    /// first save.
    pub fn get(&self) -> Result<Value> {
        let cached = self.config.read().clone().ok_or(Error::NotFound)?;
        serde_json::from_slice(&cached).map_err(|e| {
            warn!("cached config no longer decodes: {}", e);
            Error::Conflict
        })
    }

    pub fn is_empty(&self) -> bool {
        self.config.read().is_none()
    }
}
