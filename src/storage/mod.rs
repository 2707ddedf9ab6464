//! Durable records for the controller.
//!
//! Two append-mostly collections sit behind narrow traits so the engine can
//! be swapped: config revisions (create / latest / count, never updated in
//! place) and agents (create / get / update). Sled backs a single controller
//! process; redis backs several controller instances sharing one history.
//! The in-memory adaptors back tests and throwaway controllers.

mod mem_store;
mod redis_store;
mod sled_store;
pub use mem_store::*;
pub use redis_store::*;
pub use sled_store::*;

#[cfg(test)]
mod mem_store_test;
#[cfg(test)]
mod sled_store_test;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::Agent;
use crate::ConfigRevision;
use crate::Result;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait ConfigStore: Send + Sync + 'static {
    /// Appends a revision.
    ///
    /// Fails with `StorageError::VersionConflict` when the version already
    /// exists, and with an internal error on storage failure.
    async fn create(
        &self,
        revision: &ConfigRevision,
    ) -> Result<()>;

    /// Highest version, or `Error::NotFound` before the first save.
    async fn get_latest(&self) -> Result<ConfigRevision>;

    async fn count(&self) -> Result<u64>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait AgentStore: Send + Sync + 'static {
    async fn create(
        &self,
        agent: &Agent,
    ) -> Result<()>;

    /// `Error::NotFound` for unknown ids.
    async fn get(
        &self,
        agent_id: &str,
    ) -> Result<Agent>;

    async fn update(
        &self,
        agent: &Agent,
    ) -> Result<()>;
}
