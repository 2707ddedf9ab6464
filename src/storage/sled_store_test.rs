use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tempfile::TempDir;
use tracing_test::traced_test;

use super::storage_test::revision;
use super::storage_test::StoreBuilder;
use super::storage_test::StoreTestSuite;
use super::*;
use crate::Result;
use crate::StorageError;
use crate::SystemError;

#[derive(Default)]
struct SledStoreBuilder {
    dirs: Mutex<Vec<TempDir>>,
}

#[async_trait]
impl StoreBuilder for SledStoreBuilder {
    async fn build(&self) -> Result<(Arc<dyn ConfigStore>, Arc<dyn AgentStore>)> {
        let dir = TempDir::new().map_err(StorageError::IoError)?;
        let db = init_sled_db(dir.path().join("db"))?;
        let stores: (Arc<dyn ConfigStore>, Arc<dyn AgentStore>) =
            (Arc::new(SledConfigStore::new(&db)?), Arc::new(SledAgentStore::new(&db)?));
        self.dirs.lock().push(dir);
        Ok(stores)
    }

    async fn cleanup(&self) -> Result<()> {
        self.dirs.lock().clear();
        Ok(())
    }
}

#[tokio::test]
#[traced_test]
async fn test_sled_stores() -> Result<()> {
    StoreTestSuite::run_all_tests(SledStoreBuilder::default()).await
}

/// Sled releases its directory lock only once its background flusher has let
/// go of the last handle, so a reopen right after a drop may briefly fail.
async fn reopen_with_retry(path: &Path) -> sled::Db {
    let mut last_err = None;
    for _ in 0..50 {
        match init_sled_db(path) {
            Ok(db) => return db,
            Err(e) => last_err = Some(e),
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("sled db at {path:?} could not be reopened: {last_err:?}");
}

/// # Case: restart
///
/// Revisions written before the db handle is dropped are still the latest
/// after reopening the same path.
#[tokio::test]
#[traced_test]
async fn test_revisions_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("db");

    let db = init_sled_db(&path).unwrap();
    let store = SledConfigStore::new(&db).unwrap();
    store.create(&revision(1)).await.unwrap();
    store.create(&revision(2)).await.unwrap();
    db.flush_async().await.unwrap();
    drop(store);
    drop(db);

    let db = reopen_with_retry(&path).await;
    let store = SledConfigStore::new(&db).unwrap();
    assert_eq!(store.count().await.unwrap(), 2);
    assert_eq!(store.get_latest().await.unwrap(), revision(2));
}

#[test]
fn test_version_keys_sort_numerically() {
    assert!(version_to_key(9) < version_to_key(10));
    assert!(version_to_key(255) < version_to_key(256));
    assert_eq!(key_to_version(version_to_key(42)).unwrap(), 42);
}

#[test]
fn test_key_to_version_rejects_short_keys() {
    let result = key_to_version([1u8, 2, 3]);
    assert!(matches!(
        result,
        Err(crate::Error::System(SystemError::Storage(StorageError::InvalidKeyLength(3))))
    ));
}
