//! Configuration management for the controller, agent and worker processes.
//!
//! Provides hierarchical configuration loading and validation with:
//! - Default values as code base
//! - Configuration file support (`CONFIG_PATH`)
//! - Environment variable overrides (`DCONF__SECTION__FIELD`)
//! - Component-wise validation
mod agent;
mod auth;
mod controller;
mod monitoring;
mod retry;
mod worker;
pub use agent::*;
pub use auth::*;
pub use controller::*;
pub use monitoring::*;
pub use retry::*;
pub use worker::*;

use std::env;
use std::fmt::Debug;
use std::path::PathBuf;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;

pub(crate) const ENV_PREFIX: &str = "DCONF";
pub(crate) const CONFIG_PATH_ENV: &str = "CONFIG_PATH";

/// Main configuration container shared by all three processes
///
/// Each binary reads only the sections it needs, so one file can describe
/// a whole deployment:
/// 1. Default values from code implementation
/// 2. Configuration file specified by `CONFIG_PATH`
/// 3. Environment variables (highest priority)
#[derive(Serialize, Deserialize, Clone, Default)]
pub struct Settings {
    /// Bearer secrets for every role
    #[serde(default)]
    pub auth: AuthConfig,
    /// Controller listener, store and broker settings
    #[serde(default)]
    pub controller: ControllerConfig,
    /// Agent identity, endpoints and state file
    #[serde(default)]
    pub agent: AgentConfig,
    /// Worker listener settings
    #[serde(default)]
    pub worker: WorkerConfig,
    /// Backoff policies for agent registration and polling
    #[serde(default)]
    pub retry: RetryPolicies,
    /// Metrics exporter settings
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    /// Log output settings
    #[serde(default)]
    pub log: LogConfig,
}

impl Debug for Settings {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        // auth is left out on purpose, it only holds secrets
        f.debug_struct("Settings")
            .field("controller", &self.controller)
            .field("agent", &self.agent)
            .field("worker", &self.worker)
            .field("retry", &self.retry)
            .field("monitoring", &self.monitoring)
            .field("log", &self.log)
            .finish_non_exhaustive()
    }
}

impl Settings {
    /// Loads configuration from hierarchical sources without validation.
    ///
    /// Configuration sources are merged in the following order (later sources override earlier):
    /// 1. Type defaults (lowest priority)
    /// 2. Configuration file from `CONFIG_PATH` environment variable (if set)
    /// 3. Environment variables with `DCONF__` prefix (highest priority)
    ///
    /// # Note
    /// Callers MUST call `validate()` before using the configuration.
    ///
    /// # Examples
    /// ```ignore
    /// std::env::set_var("CONFIG_PATH", "config/deploy.toml");
    /// std::env::set_var("DCONF__AUTH__ADMIN_SECRET", "s3cret");
    /// let settings = Settings::new()?.validate()?;
    /// ```
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var(CONFIG_PATH_ENV) {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(env_source());

        let settings: Self = builder.build()?.try_deserialize()?;
        Ok(settings)
    }

    /// Applies additional configuration overrides from file without validation.
    ///
    /// Merging order (later sources override earlier):
    /// 1. Current configuration values
    /// 2. New configuration file
    /// 3. Latest environment variables (highest priority)
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let settings: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(env_source())
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    /// Validates every section and returns the validated instance.
    pub fn validate(self) -> Result<Self> {
        self.controller.validate()?;
        self.agent.validate(self.controller.watch_timeout_ms)?;
        self.worker.validate()?;
        self.retry.validate()?;
        self.monitoring.validate()?;
        Ok(self)
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .ignore_empty(true)
        .try_parsing(true)
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LogConfig {
    /// Also write logs to `<log_dir>/<service>.log`
    #[serde(default)]
    pub log_to_file: bool,

    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_to_file: false,
            log_dir: default_log_dir(),
        }
    }
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("./logs")
}
