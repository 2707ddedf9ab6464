use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Basic retry policy template
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Maximum number of retries (0 means unlimited retries)
    #[serde(default)]
    pub max_retries: usize,

    /// Backoff base (unit: milliseconds)
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Maximum backoff time (unit: milliseconds)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl BackoffPolicy {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    fn validate(
        &self,
        name: &str,
    ) -> Result<()> {
        if self.base_delay_ms == 0 {
            return Err(Error::Config(ConfigError::Message(format!(
                "retry.{name}.base_delay_ms must be positive"
            ))));
        }
        if self.base_delay_ms > self.max_delay_ms {
            return Err(Error::Config(ConfigError::Message(format!(
                "retry.{name}.base_delay_ms ({}) exceeds max_delay_ms ({})",
                self.base_delay_ms, self.max_delay_ms
            ))));
        }
        Ok(())
    }
}

/// Divide strategies by agent activity
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RetryPolicies {
    /// Registration never gives up: 1s doubling up to 30s
    #[serde(default = "default_registration_policy")]
    pub registration: BackoffPolicy,

    /// Poll failures: 1s doubling up to 1 minute. Polling never gives up, so
    /// `max_retries` is ignored here.
    #[serde(default = "default_polling_policy")]
    pub polling: BackoffPolicy,
}

impl Default for RetryPolicies {
    fn default() -> Self {
        Self {
            registration: default_registration_policy(),
            polling: default_polling_policy(),
        }
    }
}

impl RetryPolicies {
    pub fn validate(&self) -> Result<()> {
        self.registration.validate("registration")?;
        self.polling.validate("polling")
    }
}

fn default_registration_policy() -> BackoffPolicy {
    BackoffPolicy {
        max_retries: 0,
        base_delay_ms: 1000,
        max_delay_ms: 30_000,
    }
}
fn default_polling_policy() -> BackoffPolicy {
    BackoffPolicy {
        max_retries: 0,
        base_delay_ms: 1000,
        max_delay_ms: 60_000,
    }
}
fn default_base_delay_ms() -> u64 {
    1000
}
fn default_max_delay_ms() -> u64 {
    30_000
}
