use std::sync::Arc;

use async_trait::async_trait;
use tracing_test::traced_test;

use super::storage_test::StoreBuilder;
use super::storage_test::StoreTestSuite;
use super::AgentStore;
use super::ConfigStore;
use super::MemAgentStore;
use super::MemConfigStore;
use crate::Result;

struct MemStoreBuilder;

#[async_trait]
impl StoreBuilder for MemStoreBuilder {
    async fn build(&self) -> Result<(Arc<dyn ConfigStore>, Arc<dyn AgentStore>)> {
        Ok((Arc::new(MemConfigStore::new()), Arc::new(MemAgentStore::new())))
    }

    async fn cleanup(&self) -> Result<()> {
        Ok(())
    }
}

#[tokio::test]
#[traced_test]
async fn test_mem_stores() -> Result<()> {
    StoreTestSuite::run_all_tests(MemStoreBuilder).await
}
