//! Loading requests and retry options from configuration.
#![cfg(feature = "serde")]

use std::time::Duration;

use undertow::{Method, RequestDescriptor, RequestOptions, RetryPolicy, Value};

#[test]
fn request_loaded_from_json_drives_the_policy() {
    let request: RequestDescriptor = serde_json::from_str(
        r#"{
            "method": "PUT",
            "url": "https://api.example.com/items/9",
            "headers": { "content-type": "application/json" },
            "body": { "name": "widget", "tags": ["a", "b"], "price": 9.5 },
            "request": { "num_retries": 3, "retry_backoff": 50, "idempotent": true },
            "context": { "tenant": "acme" }
        }"#,
    )
    .unwrap();

    assert_eq!(request.method, Method::Put);
    assert!(request.is_retry_eligible());
    assert_eq!(request.body.pointer(&["tags"]).and_then(Value::as_sequence).map(Vec::len), Some(2));
    assert_eq!(request.context.get("tenant"), Some(&Value::from("acme")));

    let policy = RetryPolicy::from_request(&request);
    assert_eq!(policy.max_retries(), 3);
    assert_eq!(policy.total_backoff(), Duration::from_millis(350));
}

#[test]
fn options_round_trip_in_millis() {
    let options = RequestOptions {
        num_retries: Some(2),
        retry_backoff: Some(Duration::from_millis(125)),
        idempotent: None,
    };

    let json = serde_json::to_value(&options).unwrap();
    assert_eq!(json, serde_json::json!({ "num_retries": 2, "retry_backoff": 125 }));

    let back: RequestOptions = serde_json::from_value(json).unwrap();
    assert_eq!(back, options);
}

#[test]
fn invalid_method_is_rejected() {
    let result: Result<RequestDescriptor, _> =
        serde_json::from_str(r#"{ "method": "NOT A METHOD", "url": "/" }"#);
    assert!(result.is_err());
}

#[test]
fn requests_with_opaque_values_cannot_be_serialized() {
    let request = RequestDescriptor::get("/").with_context("handle", Value::opaque(7u32));
    assert!(serde_json::to_string(&request).is_err());
}

#[test]
fn sub_millisecond_backoff_is_rejected_not_truncated() {
    let request =
        RequestDescriptor::get("/").with_retry_backoff(Duration::from_micros(500));

    let err = serde_json::to_string(&request).unwrap_err();
    assert!(err.to_string().contains("whole number of milliseconds"));

    let request = RequestDescriptor::get("/").with_retry_backoff(Duration::from_micros(1_500));
    assert!(serde_json::to_string(&request).is_err());
}

#[test]
fn whole_millisecond_backoff_round_trips() {
    let request = RequestDescriptor::get("/")
        .with_retries(1)
        .with_retry_backoff(Duration::from_secs(2));

    let json = serde_json::to_string(&request).unwrap();
    let back: RequestDescriptor = serde_json::from_str(&json).unwrap();

    assert_eq!(back.options.retry_backoff, Some(Duration::from_secs(2)));
    assert_eq!(back, request);
}
