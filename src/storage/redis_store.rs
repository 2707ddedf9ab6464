//! Redis-backed stores for controllers that run as several instances.
//!
//! Keys under `{prefix}`:
//! - `{prefix}:revisions`: hash, version → JSON revision record
//! - `{prefix}:latest_version`: highest version created so far
//! - `{prefix}:agents`: hash, agent id → JSON agent record

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use redis::Script;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use tracing::error;
use tracing::info;
use tracing::instrument;
use tracing::trace;

use super::AgentStore;
use super::ConfigStore;
use crate::Agent;
use crate::ConfigRevision;
use crate::Error;
use crate::Result;
use crate::StorageError;
use crate::StoreConfig;

/// Inserts the revision only if its version is free, then raises the
/// latest pointer. Returns 0 on a taken version.
const CREATE_REVISION_SCRIPT: &str = r"
if redis.call('HSETNX', KEYS[1], ARGV[1], ARGV[2]) == 0 then
    return 0
end
local latest = tonumber(redis.call('GET', KEYS[2]) or '0')
if tonumber(ARGV[1]) > latest then
    redis.call('SET', KEYS[2], ARGV[1])
end
return 1
";

#[derive(Debug, Clone)]
pub(crate) struct RedisKeys {
    pub(crate) revisions: String,
    pub(crate) latest_version: String,
    pub(crate) agents: String,
}

impl RedisKeys {
    pub(crate) fn new(prefix: &str) -> Self {
        Self {
            revisions: format!("{prefix}:revisions"),
            latest_version: format!("{prefix}:latest_version"),
            agents: format!("{prefix}:agents"),
        }
    }
}

fn storage_err(e: redis::RedisError) -> Error {
    StorageError::RedisError(e).into()
}

/// Connects once and hands out both stores over the same multiplexed
/// connection.
pub async fn init_redis_stores(config: &StoreConfig) -> Result<(RedisConfigStore, RedisAgentStore)> {
    let client = redis::Client::open(config.redis_url.as_str()).map_err(|e| {
        error!("invalid redis store url: {}", e);
        storage_err(e)
    })?;
    let conn = client.get_multiplexed_async_connection().await.map_err(|e| {
        error!("failed to connect redis store: {}", e);
        storage_err(e)
    })?;
    info!(prefix = %config.key_prefix, "redis store connected");

    let keys = RedisKeys::new(&config.key_prefix);
    Ok((
        RedisConfigStore {
            conn: conn.clone(),
            keys: keys.clone(),
            create_script: Script::new(CREATE_REVISION_SCRIPT),
        },
        RedisAgentStore { conn, keys },
    ))
}

#[derive(Serialize, Deserialize)]
struct RevisionRecord {
    version: u64,
    data: Value,
    created_at: u64,
}

impl RevisionRecord {
    fn encode(revision: &ConfigRevision) -> Result<Vec<u8>> {
        let record = RevisionRecord {
            version: revision.version,
            data: revision.data.clone(),
            created_at: revision.created_at,
        };
        Ok(serde_json::to_vec(&record).map_err(StorageError::JsonError)?)
    }

    fn decode(bytes: &[u8]) -> Result<ConfigRevision> {
        let record: RevisionRecord = serde_json::from_slice(bytes).map_err(StorageError::JsonError)?;
        Ok(ConfigRevision {
            version: record.version,
            data: record.data,
            created_at: record.created_at,
        })
    }
}

pub struct RedisConfigStore {
    conn: MultiplexedConnection,
    keys: RedisKeys,
    create_script: Script,
}

#[async_trait]
impl ConfigStore for RedisConfigStore {
    #[instrument(skip(self, revision), fields(version = revision.version))]
    async fn create(
        &self,
        revision: &ConfigRevision,
    ) -> Result<()> {
        let value = RevisionRecord::encode(revision)?;
        let mut conn = self.conn.clone();
        let created: i64 = self
            .create_script
            .key(&self.keys.revisions)
            .key(&self.keys.latest_version)
            .arg(revision.version)
            .arg(value)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| {
                error!("failed create new config: {}", e);
                storage_err(e)
            })?;

        if created == 0 {
            return Err(StorageError::VersionConflict(revision.version).into());
        }
        trace!("revision persisted");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_latest(&self) -> Result<ConfigRevision> {
        let mut conn = self.conn.clone();
        let latest: Option<u64> = conn.get(&self.keys.latest_version).await.map_err(storage_err)?;
        let Some(version) = latest else {
            return Err(Error::NotFound);
        };

        let bytes: Option<Vec<u8>> = conn
            .hget(&self.keys.revisions, version)
            .await
            .map_err(storage_err)?;
        match bytes {
            Some(bytes) => RevisionRecord::decode(&bytes),
            None => {
                error!(version, "latest version points at a missing revision");
                Err(Error::NotFound)
            }
        }
    }

    async fn count(&self) -> Result<u64> {
        let mut conn = self.conn.clone();
        conn.hlen(&self.keys.revisions).await.map_err(storage_err)
    }
}

pub struct RedisAgentStore {
    conn: MultiplexedConnection,
    keys: RedisKeys,
}

#[async_trait]
impl AgentStore for RedisAgentStore {
    #[instrument(skip(self, agent), fields(agent_id = %agent.id))]
    async fn create(
        &self,
        agent: &Agent,
    ) -> Result<()> {
        let value = serde_json::to_vec(agent).map_err(StorageError::JsonError)?;
        let mut conn = self.conn.clone();
        let inserted: bool = conn
            .hset_nx(&self.keys.agents, &agent.id, value)
            .await
            .map_err(storage_err)?;
        if !inserted {
            error!("agent id collision");
            return Err(Error::Conflict);
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get(
        &self,
        agent_id: &str,
    ) -> Result<Agent> {
        let mut conn = self.conn.clone();
        let bytes: Option<Vec<u8>> = conn.hget(&self.keys.agents, agent_id).await.map_err(storage_err)?;
        match bytes {
            Some(bytes) => Ok(serde_json::from_slice(&bytes).map_err(StorageError::JsonError)?),
            None => Err(Error::NotFound),
        }
    }

    #[instrument(skip(self, agent), fields(agent_id = %agent.id))]
    async fn update(
        &self,
        agent: &Agent,
    ) -> Result<()> {
        let value = serde_json::to_vec(agent).map_err(StorageError::JsonError)?;
        let mut conn = self.conn.clone();
        let _: () = conn.hset(&self.keys.agents, &agent.id, value).await.map_err(storage_err)?;
        Ok(())
    }
}
