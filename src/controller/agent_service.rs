use std::sync::Arc;

use tracing::debug;
use tracing::info;
use tracing::instrument;
use tracing::warn;

use crate::metrics::AGENT_REGISTRATIONS;
use crate::storage::AgentStore;
use crate::utils::time::timestamp_millis;
use crate::Agent;
use crate::Error;
use crate::RegisterRequest;
use crate::Registration;
use crate::Result;

const AGENT_ID_LEN: usize = 21;

/// Agent registry and liveness tracking.
pub struct AgentService {
    store: Arc<dyn AgentStore>,
    poll_url: String,
    poll_interval_seconds: u64,
}

impl AgentService {
    pub fn new(
        store: Arc<dyn AgentStore>,
        poll_url: String,
        poll_interval_seconds: u64,
    ) -> Self {
        Self {
            store,
            poll_url,
            poll_interval_seconds,
        }
    }

    /// Creates a fresh identity. Repeated registrations with the same name
    /// always produce new agents.
    #[instrument(skip(self), fields(name = %request.name, host = %request.host))]
    pub async fn register(
        &self,
        request: RegisterRequest,
    ) -> Result<Registration> {
        let now = timestamp_millis();
        let agent = Agent {
            id: nanoid::nanoid!(AGENT_ID_LEN),
            name: request.name,
            host: request.host,
            poll_interval_seconds: self.poll_interval_seconds,
            created_at: now,
            last_seen: now,
        };

        if let Err(e) = self.store.create(&agent).await {
            AGENT_REGISTRATIONS.with_label_values(&["failed"]).inc();
            return Err(e);
        }
        AGENT_REGISTRATIONS.with_label_values(&["accepted"]).inc();
        info!(agent_id = %agent.id, "agent registered");

        Ok(Registration {
            agent_id: agent.id,
            poll_url: self.poll_url.clone(),
            poll_interval_seconds: agent.poll_interval_seconds,
        })
    }

    /// Liveness gate run on every authenticated poll.
    ///
    /// # Errors
    /// - `Error::NotFound` for unknown ids
    /// - `Error::InActive` when the agent is stale; `last_seen` is left untouched
    #[instrument(skip(self))]
    pub async fn verify(
        &self,
        agent_id: &str,
    ) -> Result<Agent> {
        let mut agent = self.store.get(agent_id).await?;
        let now = timestamp_millis();

        if agent.is_stale(now) {
            warn!(last_seen = agent.last_seen, "agent inactive");
            AGENT_REGISTRATIONS.with_label_values(&["inactive"]).inc();
            return Err(Error::InActive);
        }

        agent.last_seen = now;
        self.store.update(&agent).await?;
        Ok(agent)
    }

    /// Refreshes `last_seen` after a parked watch completes.
    pub async fn touch(
        &self,
        agent_id: &str,
    ) -> Result<()> {
        let mut agent = self.store.get(agent_id).await?;
        agent.last_seen = timestamp_millis();
        self.store.update(&agent).await?;
        debug!(agent_id, "liveness refreshed");
        Ok(())
    }
}
