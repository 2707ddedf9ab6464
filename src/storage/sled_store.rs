use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use sled::IVec;
use sled::Tree;
use tracing::error;
use tracing::instrument;
use tracing::trace;

use super::AgentStore;
use super::ConfigStore;
use crate::constants::AGENT_TREE;
use crate::constants::CONFIG_REVISION_TREE;
use crate::Agent;
use crate::ConfigRevision;
use crate::Error;
use crate::Result;
use crate::StorageError;

/// Opens (or creates) the controller database.
pub fn init_sled_db<P: AsRef<Path>>(path: P) -> Result<sled::Db> {
    let path = path.as_ref();
    sled::Config::new()
        .path(path)
        .use_compression(true)
        .open()
        .map_err(|e| {
            error!("failed to open sled db at {:?}: {}", path, e);
            e.into()
        })
}

/// On-disk shape of a revision; the document is kept as JSON bytes since
/// bincode cannot decode self-describing values.
#[derive(Serialize, Deserialize)]
struct RevisionRecord {
    version: u64,
    data: Vec<u8>,
    created_at: u64,
}

impl RevisionRecord {
    fn encode(revision: &ConfigRevision) -> Result<Vec<u8>> {
        let record = RevisionRecord {
            version: revision.version,
            data: serde_json::to_vec(&revision.data).map_err(StorageError::JsonError)?,
            created_at: revision.created_at,
        };
        Ok(bincode::serialize(&record)?)
    }

    fn decode(bytes: &IVec) -> Result<ConfigRevision> {
        let record: RevisionRecord = bincode::deserialize(bytes)?;
        Ok(ConfigRevision {
            version: record.version,
            data: serde_json::from_slice(&record.data).map_err(StorageError::JsonError)?,
            created_at: record.created_at,
        })
    }
}

pub(crate) fn version_to_key(version: u64) -> [u8; 8] {
    version.to_be_bytes()
}

pub(crate) fn key_to_version<K: AsRef<[u8]>>(key: K) -> Result<u64> {
    let bytes = key.as_ref();
    let array: [u8; 8] = bytes
        .try_into()
        .map_err(|_| StorageError::InvalidKeyLength(bytes.len()))?;
    Ok(u64::from_be_bytes(array))
}

/// Revision history in a dedicated tree, ordered by big-endian version key
pub struct SledConfigStore {
    tree: Tree,
}

impl SledConfigStore {
    pub fn new(db: &sled::Db) -> Result<Self> {
        Ok(Self {
            tree: db.open_tree(CONFIG_REVISION_TREE)?,
        })
    }
}

#[async_trait]
impl ConfigStore for SledConfigStore {
    #[instrument(skip(self, revision), fields(version = revision.version))]
    async fn create(
        &self,
        revision: &ConfigRevision,
    ) -> Result<()> {
        let value = RevisionRecord::encode(revision)?;
        let swapped = self
            .tree
            .compare_and_swap(version_to_key(revision.version), None as Option<&[u8]>, Some(value))
            .map_err(|e| {
                error!("failed create new config: {}", e);
                Error::from(e)
            })?;

        if swapped.is_err() {
            return Err(StorageError::VersionConflict(revision.version).into());
        }

        self.tree.flush_async().await?;
        trace!("revision persisted");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_latest(&self) -> Result<ConfigRevision> {
        match self.tree.last()? {
            Some((key, value)) => {
                let revision = RevisionRecord::decode(&value)?;
                debug_assert_eq!(key_to_version(&key).ok(), Some(revision.version));
                Ok(revision)
            }
            None => Err(Error::NotFound),
        }
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.tree.len() as u64)
    }
}

/// Agents keyed by their id
pub struct SledAgentStore {
    tree: Tree,
}

impl SledAgentStore {
    pub fn new(db: &sled::Db) -> Result<Self> {
        Ok(Self {
            tree: db.open_tree(AGENT_TREE)?,
        })
    }
}

#[async_trait]
impl AgentStore for SledAgentStore {
    #[instrument(skip(self, agent), fields(agent_id = %agent.id))]
    async fn create(
        &self,
        agent: &Agent,
    ) -> Result<()> {
        let value = bincode::serialize(agent)?;
        let swapped = self
            .tree
            .compare_and_swap(agent.id.as_bytes(), None as Option<&[u8]>, Some(value))?;
        if swapped.is_err() {
            error!("agent id collision");
            return Err(Error::Conflict);
        }
        self.tree.flush_async().await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get(
        &self,
        agent_id: &str,
    ) -> Result<Agent> {
        match self.tree.get(agent_id.as_bytes())? {
            Some(bytes) => Ok(bincode::deserialize(&bytes)?),
            None => Err(Error::NotFound),
        }
    }

    #[instrument(skip(self, agent), fields(agent_id = %agent.id))]
    async fn update(
        &self,
        agent: &Agent,
    ) -> Result<()> {
        let value = bincode::serialize(agent)?;
        self.tree.insert(agent.id.as_bytes(), value)?;
        Ok(())
    }
}
