use std::sync::Arc;

use serde_json::json;
use tracing_test::traced_test;

use super::*;
use crate::storage::MemConfigStore;
use crate::storage::MockConfigStore;
use crate::ConfigRevision;
use crate::Error;
use crate::StorageError;

fn service() -> ConfigService {
    ConfigService::new(Arc::new(MemConfigStore::new()), 3)
}

#[tokio::test]
#[traced_test]
async fn test_first_save_bootstraps_version_one() {
    let service = service();

    let revision = service.save(json!({"x": 1})).await.unwrap();

    assert_eq!(revision.version, 1);
    assert_eq!(revision.data, json!({"x": 1}));
    assert!(logs_contain("configuration revision created"));
}

#[tokio::test]
async fn test_versions_advance_by_one_per_accepted_save() {
    let service = service();

    for (i, value) in [1, 2, 1, 3].into_iter().enumerate() {
        let revision = service.save(json!({"x": value})).await.unwrap();
        assert_eq!(revision.version, i as u64 + 1);
    }
}

#[tokio::test]
async fn test_structurally_equal_save_is_not_modified() {
    let service = service();
    service.save(json!({"a": 1, "b": {"c": [1, 2]}})).await.unwrap();

    let result = service.save(json!({"b": {"c": [1, 2]}, "a": 1.0})).await;

    assert!(matches!(result, Err(Error::NotModified)));
    assert_eq!(service.get("").await.unwrap().version, 1);
}

#[tokio::test]
async fn test_get_honours_version_tag() {
    let service = service();
    assert!(matches!(service.get("").await, Err(Error::NotFound)));

    service.save(json!({"x": 1})).await.unwrap();
    service.save(json!({"x": 2})).await.unwrap();

    assert!(matches!(service.get("v2").await, Err(Error::NotModified)));
    assert_eq!(service.get("v1").await.unwrap().version, 2);
    assert_eq!(service.get("garbage").await.unwrap().version, 2);
    assert_eq!(service.get("").await.unwrap().tag(), "v2");
}

#[tokio::test]
async fn test_concurrent_saves_never_duplicate_versions() {
    let service = Arc::new(service());

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let service = service.clone();
            tokio::spawn(async move { service.save(json!({"writer": i})).await })
        })
        .collect();

    let mut versions = Vec::new();
    for handle in handles {
        versions.push(handle.await.unwrap().unwrap().version);
    }
    versions.sort_unstable();

    assert_eq!(versions, (1..=8).collect::<Vec<u64>>());
}

/// # Case: another instance created the next version first
///
/// ## Setup:
/// 1. latest is v1, first create of v2 conflicts
/// 2. re-read shows v2 written by the other instance
///
/// ## Criterias:
/// 1. the save lands as v3
#[tokio::test]
#[traced_test]
async fn test_version_conflict_rereads_and_retries() {
    let mut store = MockConfigStore::new();
    let v1 = ConfigRevision {
        version: 1,
        data: json!({"x": 1}),
        created_at: 0,
    };
    let v2 = ConfigRevision {
        version: 2,
        data: json!({"x": "other"}),
        created_at: 0,
    };

    store.expect_count().returning(|| Ok(1));
    let mut latest_calls = 0;
    store.expect_get_latest().times(2).returning(move || {
        latest_calls += 1;
        Ok(if latest_calls == 1 { v1.clone() } else { v2.clone() })
    });
    store
        .expect_create()
        .withf(|revision| revision.version == 2)
        .times(1)
        .returning(|_| Err(StorageError::VersionConflict(2).into()));
    store
        .expect_create()
        .withf(|revision| revision.version == 3)
        .times(1)
        .returning(|_| Ok(()));

    let service = ConfigService::new(Arc::new(store), 3);
    let revision = service.save(json!({"x": 2})).await.unwrap();

    assert_eq!(revision.version, 3);
    assert!(logs_contain("retrying save"));
}

#[tokio::test]
async fn test_conflicts_beyond_retry_budget_fail() {
    let mut store = MockConfigStore::new();
    store.expect_count().returning(|| Ok(0));
    store
        .expect_create()
        .times(2)
        .returning(|_| Err(StorageError::VersionConflict(1).into()));

    let service = ConfigService::new(Arc::new(store), 1);
    let result = service.save(json!({"x": 1})).await;

    assert!(matches!(
        result,
        Err(Error::System(crate::SystemError::Storage(StorageError::VersionConflict(1))))
    ));
}
