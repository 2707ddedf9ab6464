use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::DEFAULT_POLL_INTERVAL_SECONDS;
use crate::constants::DEFAULT_WATCH_TIMEOUT_MS;
use crate::Error;
use crate::Result;

/// Controller node configuration parameters
///
/// Covers the HTTP listener, the durable store location, what agents are
/// told at registration time, and the update broker.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ControllerConfig {
    /// Network listening address (IP:PORT)
    ///
    /// Default: `127.0.0.1:8080`
    #[serde(default = "default_controller_listen_addr")]
    pub listen_address: SocketAddr,

    /// Sled database directory, used when `store.kind = sled`
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default)]
    pub store: StoreConfig,

    /// Path agents must poll, returned from `/register`
    #[serde(default = "default_poll_url")]
    pub poll_url: String,

    /// Poll interval assigned to newly registered agents
    #[serde(default = "default_poll_interval_seconds")]
    pub poll_interval_seconds: u64,

    /// How long a watch request stays parked before answering 304
    #[serde(default = "default_watch_timeout_ms")]
    pub watch_timeout_ms: u64,

    /// Retries when another controller instance created the same version first
    #[serde(default = "default_save_conflict_retries")]
    pub save_conflict_retries: usize,

    #[serde(default)]
    pub broker: BrokerConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            listen_address: default_controller_listen_addr(),
            db_path: default_db_path(),
            store: StoreConfig::default(),
            poll_url: default_poll_url(),
            poll_interval_seconds: default_poll_interval_seconds(),
            watch_timeout_ms: default_watch_timeout_ms(),
            save_conflict_retries: default_save_conflict_retries(),
            broker: BrokerConfig::default(),
        }
    }
}

impl ControllerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.listen_address.port() == 0 {
            return Err(Error::Config(ConfigError::Message(
                "controller.listen_address must specify a non-zero port".into(),
            )));
        }

        if self.poll_interval_seconds == 0 {
            return Err(Error::Config(ConfigError::Message(
                "controller.poll_interval_seconds must be positive".into(),
            )));
        }

        if self.watch_timeout_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "controller.watch_timeout_ms must be positive".into(),
            )));
        }

        if !self.poll_url.starts_with('/') {
            return Err(Error::Config(ConfigError::Message(format!(
                "controller.poll_url must be an absolute path, got {}",
                self.poll_url
            ))));
        }

        if self.broker.kind == BrokerKind::Redis && self.store.kind != StoreKind::Redis {
            return Err(Error::Config(ConfigError::Message(
                "controller.broker.kind = redis needs a shared store (controller.store.kind = redis)".into(),
            )));
        }

        self.store.validate()?;
        self.broker.validate()
    }

    pub fn watch_timeout(&self) -> Duration {
        Duration::from_millis(self.watch_timeout_ms)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// Embedded database owned by a single controller process
    Sled,
    /// Redis hashes shared by every controller instance
    Redis,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_store_kind")]
    pub kind: StoreKind,

    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// Namespace for every key the store writes
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: default_store_kind(),
            redis_url: default_redis_url(),
            key_prefix: default_key_prefix(),
        }
    }
}

impl StoreConfig {
    pub fn validate(&self) -> Result<()> {
        if self.kind == StoreKind::Redis {
            if self.redis_url.trim().is_empty() {
                return Err(Error::Config(ConfigError::Message(
                    "controller.store.redis_url is required when kind = redis".into(),
                )));
            }
            if self.key_prefix.trim().is_empty() {
                return Err(Error::Config(ConfigError::Message(
                    "controller.store.key_prefix cannot be empty".into(),
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BrokerKind {
    /// In-process channel; only watchers on this instance are woken
    Local,
    /// Redis pub/sub shared by every controller instance
    Redis,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BrokerConfig {
    #[serde(default = "default_broker_kind")]
    pub kind: BrokerKind,

    /// e.g. `redis://:password@127.0.0.1:6379`
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    #[serde(default = "default_channel")]
    pub channel: String,

    /// Fixed delay before resubscribing after the subscription broke
    #[serde(default = "default_resubscribe_delay_ms")]
    pub resubscribe_delay_ms: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            kind: default_broker_kind(),
            redis_url: default_redis_url(),
            channel: default_channel(),
            resubscribe_delay_ms: default_resubscribe_delay_ms(),
        }
    }
}

impl BrokerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.kind == BrokerKind::Redis && self.redis_url.trim().is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "controller.broker.redis_url is required when kind = redis".into(),
            )));
        }
        if self.channel.trim().is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "controller.broker.channel cannot be empty".into(),
            )));
        }
        Ok(())
    }
}

fn default_controller_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}
fn default_db_path() -> PathBuf {
    PathBuf::from("./db/controller")
}
fn default_poll_url() -> String {
    "/config".to_string()
}
fn default_poll_interval_seconds() -> u64 {
    DEFAULT_POLL_INTERVAL_SECONDS
}
fn default_watch_timeout_ms() -> u64 {
    DEFAULT_WATCH_TIMEOUT_MS
}
fn default_save_conflict_retries() -> usize {
    3
}
fn default_store_kind() -> StoreKind {
    StoreKind::Sled
}
fn default_key_prefix() -> String {
    "dconfig".to_string()
}
fn default_broker_kind() -> BrokerKind {
    BrokerKind::Local
}
fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}
fn default_channel() -> String {
    "config_updates".to_string()
}
fn default_resubscribe_delay_ms() -> u64 {
    2000
}
