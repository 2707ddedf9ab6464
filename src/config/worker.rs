use std::net::SocketAddr;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WorkerConfig {
    /// Default: `127.0.0.1:8181`
    #[serde(default = "default_worker_listen_addr")]
    pub listen_address: SocketAddr,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            listen_address: default_worker_listen_addr(),
        }
    }
}

impl WorkerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.listen_address.port() == 0 {
            return Err(Error::Config(ConfigError::Message(
                "worker.listen_address must specify a non-zero port".into(),
            )));
        }
        Ok(())
    }
}

fn default_worker_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8181))
}
