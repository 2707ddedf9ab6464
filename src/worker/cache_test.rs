use bytes::Bytes;
use serde_json::json;

use super::*;
use crate::Error;

#[test]
fn test_get_before_save_is_not_found() {
    let cache = WorkerCache::new();

    assert!(cache.is_empty());
    assert!(matches!(cache.get(), Err(Error::NotFound)));
}

#[test]
fn test_save_then_get_returns_decoded_copy() {
    let cache = WorkerCache::new();

    cache.save(Bytes::from_static(br#"{"x": 2, "nested": [1, 2]}"#)).unwrap();

    assert_eq!(cache.get().unwrap(), json!({"x": 2, "nested": [1, 2]}));
}

#[test]
fn test_empty_payload_is_not_found() {
    let cache = WorkerCache::new();

    assert!(matches!(cache.save(Bytes::new()), Err(Error::NotFound)));
    assert!(cache.is_empty());
}

#[test]
fn test_malformed_payload_is_conflict_and_keeps_previous() {
    let cache = WorkerCache::new();
    cache.save(Bytes::from_static(br#"{"x": 1}"#)).unwrap();

    assert!(matches!(cache.save(Bytes::from_static(b"{not json")), Err(Error::Conflict)));
    assert_eq!(cache.get().unwrap(), json!({"x": 1}));
}

#[test]
fn test_last_write_wins() {
    let cache = WorkerCache::new();

    cache.save(Bytes::from_static(br#"{"x": 1}"#)).unwrap();
    cache.save(Bytes::from_static(br#"[1, 2, 3]"#)).unwrap();

    assert_eq!(cache.get().unwrap(), json!([1, 2, 3]));
}
