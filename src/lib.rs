//! # Undertow
//!
//! > *"What the wave takes out, the undertow brings back"*
//!
//! A Rust library for retrying failed requests, safely.
//!
//! ## Philosophy
//!
//! **Undertow** sits between an application and whatever actually sends
//! requests over the wire. It takes one request, hands a fresh copy of it to
//! the transport for every attempt, and retries failures that are safe to
//! retry:
//!
//! - Only `GET` requests and requests explicitly marked idempotent
//! - Never failure kinds the caller has asked to ignore
//! - At most `num_retries` times, with exponential backoff
//!
//! When it gives up, the caller sees exactly the failure the last attempt
//! raised. Retries are invisible except for the added latency.
//!
//! ## Quick Example
//!
//! ```rust
//! use undertow::{Failure, RequestDescriptor, RetryExecutor};
//! use std::sync::atomic::{AtomicU32, Ordering};
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let request = RequestDescriptor::post("https://api.example.com/orders")
//!     .idempotent(true)
//!     .with_retries(1)
//!     .with_retry_backoff(Duration::from_millis(10));
//!
//! let calls = AtomicU32::new(0);
//! let result = RetryExecutor::new()
//!     .execute(&request, |_: RequestDescriptor| {
//!         let first = calls.fetch_add(1, Ordering::SeqCst) == 0;
//!         async move {
//!             if first {
//!                 Err(Failure::timeout("upstream took too long"))
//!             } else {
//!                 Ok(201)
//!             }
//!         }
//!     })
//!     .await;
//!
//! assert_eq!(result, Ok(201));
//! assert_eq!(calls.load(Ordering::SeqCst), 2);
//! # });
//! ```
//!
//! ## Features
//!
//! - `async` (default): the tokio-based executor operations
//! - `tracing` (default): debug-level spans and events for every retry
//! - `serde`: `Serialize`/`Deserialize` for requests and values

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod failure;
pub mod request;
pub mod retry;
pub mod testing;
pub mod value;

// Re-exports
pub use failure::{Classify, Failure, FailureKind};
pub use request::{
    Method, MethodParseError, RequestDescriptor, RequestOptions, DEFAULT_RETRY_BACKOFF,
};
#[cfg(feature = "async")]
pub use retry::retry;
pub use retry::{
    GiveUp, Interrupted, Invoke, RetryEvent, RetryExecutor, RetryPolicy, RetryState,
};
pub use value::{Mapping, Value};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::failure::{Classify, Failure, FailureKind};
    pub use crate::request::{Method, RequestDescriptor, RequestOptions};
    #[cfg(feature = "async")]
    pub use crate::retry::retry;
    pub use crate::retry::{Interrupted, Invoke, RetryEvent, RetryExecutor, RetryPolicy};
    pub use crate::value::{Mapping, Value};
}
