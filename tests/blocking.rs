//! Tests for the thread-per-call executor.

use std::thread;
use std::time::{Duration, Instant};

use undertow::{Failure, FailureKind, RequestDescriptor, RetryExecutor, Value};

#[test]
fn blocking_retries_with_doubling_backoff() {
    let request = RequestDescriptor::get("/")
        .with_retries(2)
        .with_retry_backoff(Duration::from_millis(5));
    let mut calls = 0;
    let start = Instant::now();

    let result: Result<(), Failure> = RetryExecutor::new().execute_blocking(&request, |_| {
        calls += 1;
        Err(Failure::timeout("slow"))
    });

    assert_eq!(result, Err(Failure::timeout("slow")));
    assert_eq!(calls, 3);
    // 5ms + 10ms
    assert!(start.elapsed() >= Duration::from_millis(15));
}

#[test]
fn blocking_respects_ignore_list() {
    let request = RequestDescriptor::get("/").with_retries(3);
    let mut calls = 0;

    let result: Result<(), Failure> = RetryExecutor::ignoring([FailureKind::Status(401)])
        .execute_blocking(&request, |_| {
            calls += 1;
            Err(Failure::status(401, "unauthorized"))
        });

    assert_eq!(result, Err(Failure::status(401, "unauthorized")));
    assert_eq!(calls, 1);
}

#[test]
fn blocking_attempts_get_fresh_copies() {
    let request = RequestDescriptor::get("/")
        .with_retries(2)
        .with_retry_backoff(Duration::ZERO)
        .with_context("seen", Value::from(Vec::<Value>::new()));
    let mut lengths = Vec::new();

    let result = RetryExecutor::new().execute_blocking(&request, |mut copy| {
        if let Some(seen) = copy
            .context
            .get_mut("seen")
            .and_then(Value::as_sequence_mut)
        {
            seen.push(Value::from(true));
            lengths.push(seen.len());
        }
        if lengths.len() < 3 {
            Err(Failure::connection_failed("refused"))
        } else {
            Ok(lengths.len())
        }
    });

    assert_eq!(result, Ok(3));
    assert_eq!(lengths, vec![1, 1, 1]);
}

#[test]
fn blocking_calls_on_separate_threads_do_not_serialize() {
    let executor = RetryExecutor::<FailureKind>::new();
    let start = Instant::now();

    thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                let request = RequestDescriptor::get("/")
                    .with_retries(1)
                    .with_retry_backoff(Duration::from_millis(100));
                let mut first = true;
                let result = executor.execute_blocking(&request, |_| {
                    if std::mem::take(&mut first) {
                        Err(Failure::timeout("slow"))
                    } else {
                        Ok(())
                    }
                });
                assert_eq!(result, Ok(()));
            });
        }
    });

    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(100));
    assert!(
        elapsed < Duration::from_millis(400),
        "Expected concurrent backoff, got {:?}",
        elapsed
    );
}
