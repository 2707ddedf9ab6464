use std::collections::BTreeMap;
use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::trace;

use super::AgentStore;
use super::ConfigStore;
use crate::Agent;
use crate::ConfigRevision;
use crate::Error;
use crate::Result;
use crate::StorageError;

/// In-memory revision history
#[derive(Debug, Default)]
pub struct MemConfigStore {
    revisions: RwLock<BTreeMap<u64, ConfigRevision>>,
}

impl MemConfigStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConfigStore for MemConfigStore {
    async fn create(
        &self,
        revision: &ConfigRevision,
    ) -> Result<()> {
        let mut revisions = self.revisions.write();
        if revisions.contains_key(&revision.version) {
            return Err(StorageError::VersionConflict(revision.version).into());
        }
        trace!(version = revision.version, "revision stored in memory");
        revisions.insert(revision.version, revision.clone());
        Ok(())
    }

    async fn get_latest(&self) -> Result<ConfigRevision> {
        self.revisions
            .read()
            .last_key_value()
            .map(|(_, revision)| revision.clone())
            .ok_or(Error::NotFound)
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.revisions.read().len() as u64)
    }
}

/// In-memory agent registry
#[derive(Debug, Default)]
pub struct MemAgentStore {
    agents: RwLock<HashMap<String, Agent>>,
}

impl MemAgentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AgentStore for MemAgentStore {
    async fn create(
        &self,
        agent: &Agent,
    ) -> Result<()> {
        let mut agents = self.agents.write();
        if agents.contains_key(&agent.id) {
            return Err(Error::Conflict);
        }
        agents.insert(agent.id.clone(), agent.clone());
        Ok(())
    }

    async fn get(
        &self,
        agent_id: &str,
    ) -> Result<Agent> {
        self.agents.read().get(agent_id).cloned().ok_or(Error::NotFound)
    }

    async fn update(
        &self,
        agent: &Agent,
    ) -> Result<()> {
        self.agents.write().insert(agent.id.clone(), agent.clone());
        Ok(())
    }
}
