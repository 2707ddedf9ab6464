use std::path::PathBuf;
use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Agent process configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AgentConfig {
    /// Name reported at registration
    #[serde(default = "default_agent_name")]
    pub name: String,

    /// Controller base URL, e.g. `http://127.0.0.1:8080`
    #[serde(default = "default_controller_url")]
    pub controller_url: String,

    /// Base URL of the worker this agent relays to
    #[serde(default = "default_worker_url")]
    pub worker_url: String,

    /// Persisted `AgentLocalState` file
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,

    /// HTTP client timeout; must outlast a parked watch
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Re-attempt a failed relay of the cached config on every tick
    #[serde(default = "default_relay_retry")]
    pub relay_retry: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            controller_url: default_controller_url(),
            worker_url: default_worker_url(),
            state_path: default_state_path(),
            request_timeout_ms: default_request_timeout_ms(),
            relay_retry: default_relay_retry(),
        }
    }
}

impl AgentConfig {
    pub fn validate(
        &self,
        watch_timeout_ms: u64,
    ) -> Result<()> {
        for (field, url) in [("controller_url", &self.controller_url), ("worker_url", &self.worker_url)] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(Error::Config(ConfigError::Message(format!(
                    "agent.{field} must be an http(s) URL, got {url}"
                ))));
            }
        }

        if self.request_timeout_ms <= watch_timeout_ms {
            return Err(Error::Config(ConfigError::Message(format!(
                "agent.request_timeout_ms ({}) must exceed controller.watch_timeout_ms ({})",
                self.request_timeout_ms, watch_timeout_ms
            ))));
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

fn default_agent_name() -> String {
    "agent".to_string()
}
fn default_controller_url() -> String {
    "http://127.0.0.1:8080".to_string()
}
fn default_worker_url() -> String {
    "http://127.0.0.1:8181".to_string()
}
fn default_state_path() -> PathBuf {
    PathBuf::from("./agent_state.json")
}
fn default_request_timeout_ms() -> u64 {
    90_000
}
fn default_relay_retry() -> bool {
    true
}
