use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use tokio::fs;
use tracing::debug;
use tracing::error;
use tracing::warn;

use crate::constants::DEFAULT_POLL_INTERVAL_SECONDS;
use crate::Registration;
use crate::Result;
use crate::StorageError;

/// What the agent remembers across restarts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentLocalState {
    #[serde(default)]
    pub agent_id: String,
    /// Tag of the last revision received, sent back as `If-None-Match`
    #[serde(default)]
    pub etag: String,
    #[serde(default)]
    pub poll_url: String,
    #[serde(default)]
    pub poll_interval_seconds: u64,
    /// Last document received, relayed again after a restart
    #[serde(default)]
    pub config: Option<Value>,
}

impl AgentLocalState {
    pub fn has_identity(&self) -> bool {
        !self.agent_id.is_empty()
    }

    pub fn apply_registration(
        &mut self,
        registration: &Registration,
    ) {
        self.agent_id = registration.agent_id.clone();
        self.poll_url = registration.poll_url.clone();
        self.poll_interval_seconds = registration.poll_interval_seconds;
    }

    pub fn apply_update(
        &mut self,
        etag: String,
        config: Value,
    ) {
        self.etag = etag;
        self.config = Some(config);
    }

    /// Drops the identity but keeps the cached document and its tag.
    pub fn clear_identity(&mut self) {
        self.agent_id.clear();
    }

    /// Falls back to 30s when the controller assigned nothing usable.
    pub fn poll_interval(&self) -> Duration {
        match self.poll_interval_seconds {
            0 => Duration::from_secs(DEFAULT_POLL_INTERVAL_SECONDS),
            secs => Duration::from_secs(secs),
        }
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait StateStore: Send + Sync + 'static {
    /// `None` when there is no usable prior state; never an error.
    async fn load(&self) -> Option<AgentLocalState>;

    /// Replaces the persisted state wholesale.
    async fn save(
        &self,
        state: &AgentLocalState,
    ) -> Result<()>;
}

/// JSON file, rewritten through a temp file and a rename so a crash never
/// leaves a half-written state behind.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn load(&self) -> Option<AgentLocalState> {
        let raw = match fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("no agent state at {:?}", self.path);
                return None;
            }
            Err(e) => {
                warn!("agent state at {:?} unreadable, starting fresh: {}", self.path, e);
                return None;
            }
        };

        match serde_json::from_slice(&raw) {
            Ok(state) => Some(state),
            Err(e) => {
                warn!("agent state at {:?} is corrupt, starting fresh: {}", self.path, e);
                None
            }
        }
    }

    async fn save(
        &self,
        state: &AgentLocalState,
    ) -> Result<()> {
        let raw = serde_json::to_vec_pretty(state).map_err(StorageError::JsonError)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(|source| StorageError::PathError {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let temp = self.temp_path();
        fs::write(&temp, raw).await.map_err(|source| {
            error!("failed to write agent state: {}", source);
            StorageError::PathError {
                path: temp.clone(),
                source,
            }
        })?;
        fs::rename(&temp, &self.path)
            .await
            .map_err(|source| StorageError::PathError {
                path: self.path.clone(),
                source,
            })?;
        Ok(())
    }
}
