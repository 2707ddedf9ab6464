use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;
use tracing::info;
use tracing::instrument;
use tracing::warn;

use crate::metrics::CONFIG_SAVES;
use crate::storage::ConfigStore;
use crate::utils::json::structurally_equal;
use crate::utils::time::timestamp_millis;
use crate::parse_version_tag;
use crate::ConfigRevision;
use crate::Error;
use crate::Result;
use crate::StorageError;
use crate::SystemError;

/// Versioning and dedup policy in front of the [`ConfigStore`].
///
/// Saves on one instance are serialized by an async mutex. Saves racing on
/// different instances meet at the store: the version key is unique, so the
/// loser gets a version conflict, re-reads the latest revision and tries
/// again (re-running the structural comparison) up to `conflict_retries`
/// times.
pub struct ConfigService {
    store: Arc<dyn ConfigStore>,
    save_lock: Mutex<()>,
    conflict_retries: usize,
}

impl ConfigService {
    pub fn new(
        store: Arc<dyn ConfigStore>,
        conflict_retries: usize,
    ) -> Self {
        Self {
            store,
            save_lock: Mutex::new(()),
            conflict_retries,
        }
    }

    /// Stores `data` as the next revision.
    ///
    /// # Errors
    /// - `Error::NotModified` when `data` is structurally equal to the latest revision
    /// - internal errors on storage failure, or when conflicts outlast the retries
    #[instrument(skip(self, data))]
    pub async fn save(
        &self,
        data: Value,
    ) -> Result<ConfigRevision> {
        let _guard = self.save_lock.lock().await;

        let mut conflicts = 0;
        let result = loop {
            match self.try_save(&data).await {
                Err(Error::System(SystemError::Storage(StorageError::VersionConflict(version))))
                    if conflicts < self.conflict_retries =>
                {
                    conflicts += 1;
                    warn!(version, conflicts, "version already created elsewhere, retrying save");
                }
                other => break other,
            }
        };

        let outcome = match &result {
            Ok(_) => "created",
            Err(Error::NotModified) => "not_modified",
            Err(_) => "failed",
        };
        CONFIG_SAVES.with_label_values(&[outcome]).inc();
        result
    }

    async fn try_save(
        &self,
        data: &Value,
    ) -> Result<ConfigRevision> {
        let version = if self.store.count().await? == 0 {
            1
        } else {
            let latest = self.store.get_latest().await?;
            if structurally_equal(&latest.data, data) {
                debug!(version = latest.version, "configuration unchanged");
                return Err(Error::NotModified);
            }
            latest.version + 1
        };

        let revision = ConfigRevision {
            version,
            data: data.clone(),
            created_at: timestamp_millis(),
        };
        self.store.create(&revision).await?;

        info!(version, "configuration revision created");
        Ok(revision)
    }

    /// Latest revision, unless `tag` already names it.
    ///
    /// # Errors
    /// - `Error::NotModified` when the numeric part of `tag` equals the latest version
    /// - `Error::NotFound` before the first save
    pub async fn get(
        &self,
        tag: &str,
    ) -> Result<ConfigRevision> {
        let latest = self.store.get_latest().await?;
        if parse_version_tag(tag) == latest.version {
            return Err(Error::NotModified);
        }
        Ok(latest)
    }
}
