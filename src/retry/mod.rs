//! Idempotency-aware retries for a single request/response cycle.
//!
//! This module follows the "pure core, imperative shell" split:
//!
//! - **Pure Core**: [`RetryPolicy`] and [`RetryState`] are just data. The
//!   eligibility check ([`RetryExecutor::check`]) is a pure function of the
//!   request and the failure kind.
//! - **Imperative Shell**: [`RetryExecutor::execute`] runs the attempts,
//!   sleeps between them, and hands back the result.
//!
//! # Quick Start
//!
//! ```rust
//! use undertow::{Failure, FailureKind, RequestDescriptor, RetryExecutor};
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let request = RequestDescriptor::get("https://api.example.com/items")
//!     .with_retries(3)
//!     .with_retry_backoff(Duration::from_millis(1));
//!
//! // Never retry a 404, whatever the method
//! let executor = RetryExecutor::ignoring([FailureKind::Status(404)]);
//!
//! let result = executor
//!     .execute(&request, |_: RequestDescriptor| async {
//!         Err::<(), _>(Failure::status(404, "no such item"))
//!     })
//!     .await;
//!
//! assert_eq!(result, Err(Failure::status(404, "no such item")));
//! # });
//! ```
//!
//! # Backoff
//!
//! The first retry waits `retry_backoff` (50ms unless the request says
//! otherwise), and each later retry waits twice as long as the one before.
//! A zero backoff retries immediately. There is no jitter and no cap.
//!
//! # Error Types
//!
//! - The plain operations return the invoker's own error, untouched.
//! - [`Interrupted`]: returned by the operations that add a cancellation
//!   signal or deadline.

mod error;
mod executor;
mod invoke;
mod policy;

pub use error::Interrupted;
#[cfg(feature = "async")]
pub use executor::retry;
pub use executor::RetryExecutor;
pub use invoke::Invoke;
pub use policy::{GiveUp, RetryEvent, RetryPolicy, RetryState};
