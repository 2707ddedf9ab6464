use serde_json::json;

use crate::utils::json::decode_document;
use crate::utils::json::structurally_equal;
use crate::Error;

#[test]
fn key_order_and_whitespace_do_not_matter() {
    let a = decode_document(br#"{"a":1,"b":{"c":[1,2,3]}}"#).unwrap();
    let b = decode_document(b"{ \"b\" : { \"c\" : [1, 2, 3] },\n  \"a\" : 1 }").unwrap();

    assert!(structurally_equal(&a, &b));
}

#[test]
fn integer_and_float_spelling_of_same_number_are_equal() {
    assert!(structurally_equal(&json!({"x": 1}), &json!({"x": 1.0})));
    assert!(!structurally_equal(&json!({"x": 1}), &json!({"x": 1.5})));
}

#[test]
fn different_values_are_detected() {
    assert!(!structurally_equal(&json!({"x": 1}), &json!({"x": 2})));
    assert!(!structurally_equal(&json!({"x": 1}), &json!({"x": 1, "y": null})));
    assert!(!structurally_equal(&json!({"x": "1"}), &json!({"x": 1})));
}

#[test]
fn array_order_is_significant() {
    assert!(!structurally_equal(&json!([1, 2]), &json!([2, 1])));
    assert!(!structurally_equal(&json!([1, 2]), &json!([1, 2, 3])));
}

#[test]
fn negative_and_large_unsigned_numbers_compare_exactly() {
    assert!(structurally_equal(&json!(-5), &json!(-5)));
    assert!(structurally_equal(&json!(u64::MAX), &json!(u64::MAX)));
    assert!(!structurally_equal(&json!(u64::MAX), &json!(u64::MAX - 1)));
}

#[test]
fn empty_and_malformed_documents_are_rejected() {
    assert!(matches!(decode_document(b""), Err(Error::InvalidInput(_))));
    assert!(matches!(decode_document(b"   \n"), Err(Error::InvalidInput(_))));
    assert!(matches!(decode_document(b"{\"x\":"), Err(Error::InvalidInput(_))));
}
