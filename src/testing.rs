//! Testing utilities for code that retries requests.
//!
//! [`ScriptedInvoker`] is a mock downstream: it replays a fixed script of
//! outcomes, records every request copy it receives, and can optionally
//! scribble on those copies to prove they are never shared between attempts.
//!
//! # Examples
//!
//! ```rust
//! use undertow::testing::ScriptedInvoker;
//! use undertow::{assert_attempts, Failure, RequestDescriptor, RetryExecutor};
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let invoker = ScriptedInvoker::new([
//!     Err(Failure::timeout("slow")),
//!     Ok("done"),
//! ]);
//! let request = RequestDescriptor::get("/")
//!     .with_retries(2)
//!     .with_retry_backoff(Duration::ZERO);
//!
//! let result = RetryExecutor::new().execute(&request, invoker.clone()).await;
//!
//! assert_eq!(result, Ok("done"));
//! assert_attempts!(invoker, 2);
//! # });
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::request::RequestDescriptor;
use crate::retry::Invoke;

type Mutation = Arc<dyn Fn(&mut RequestDescriptor) + Send + Sync>;

/// A mock invoker that replays a script of outcomes.
///
/// Clones share the same script and recordings, so keep one clone to inspect
/// after handing another to the executor. Once the script runs out, the last
/// outcome repeats.
pub struct ScriptedInvoker<T, E> {
    state: Arc<Mutex<Script<T, E>>>,
    mutation: Option<Mutation>,
}

struct Script<T, E> {
    outcomes: VecDeque<Result<T, E>>,
    last: Option<Result<T, E>>,
    received: Vec<RequestDescriptor>,
}

impl<T: Clone, E: Clone> ScriptedInvoker<T, E> {
    /// Create an invoker that replays `outcomes` in order.
    ///
    /// # Panics
    ///
    /// Panics if `outcomes` is empty.
    pub fn new<I: IntoIterator<Item = Result<T, E>>>(outcomes: I) -> Self {
        let outcomes: VecDeque<_> = outcomes.into_iter().collect();
        assert!(!outcomes.is_empty(), "ScriptedInvoker needs at least one outcome");
        Self {
            state: Arc::new(Mutex::new(Script {
                outcomes,
                last: None,
                received: Vec::new(),
            })),
            mutation: None,
        }
    }

    /// Fail with `error` `failures` times, then succeed with `value`.
    pub fn failing_then(failures: usize, error: E, value: T) -> Self {
        Self::new(
            std::iter::repeat_n(Err(error), failures).chain(std::iter::once(Ok(value))),
        )
    }

    /// Always fail with `error`.
    pub fn always_failing(error: E) -> Self {
        Self::new([Err(error)])
    }

    /// Mutate every received request after recording it.
    pub fn mutating<F>(mut self, mutation: F) -> Self
    where
        F: Fn(&mut RequestDescriptor) + Send + Sync + 'static,
    {
        self.mutation = Some(Arc::new(mutation));
        self
    }

    /// Number of attempts made so far.
    pub fn calls(&self) -> usize {
        self.lock().received.len()
    }

    /// The requests received so far, as they arrived.
    pub fn received(&self) -> Vec<RequestDescriptor> {
        self.lock().received.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Script<T, E>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_outcome(&self, request: &RequestDescriptor) -> Result<T, E> {
        let mut script = self.lock();
        script.received.push(request.clone());
        match script.outcomes.pop_front() {
            Some(outcome) => {
                script.last = Some(outcome.clone());
                outcome
            }
            // `new` guarantees at least one outcome was replayed before the
            // script can run dry.
            None => match &script.last {
                Some(outcome) => outcome.clone(),
                None => unreachable!("ScriptedInvoker script was empty"),
            },
        }
    }
}

impl<T, E> Clone for ScriptedInvoker<T, E> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            mutation: self.mutation.clone(),
        }
    }
}

impl<T, E> fmt::Debug for ScriptedInvoker<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let calls = self
            .state
            .lock()
            .map(|script| script.received.len())
            .unwrap_or_default();
        f.debug_struct("ScriptedInvoker")
            .field("calls", &calls)
            .field("mutating", &self.mutation.is_some())
            .finish()
    }
}

impl<T: Clone, E: Clone> Invoke for ScriptedInvoker<T, E> {
    type Output = T;
    type Error = E;

    fn invoke(
        &mut self,
        mut request: RequestDescriptor,
    ) -> impl Future<Output = Result<T, E>> {
        let outcome = self.next_outcome(&request);
        if let Some(mutation) = &self.mutation {
            mutation(&mut request);
        }
        std::future::ready(outcome)
    }
}

/// Assert how many attempts a [`ScriptedInvoker`] has seen.
///
/// # Example
///
/// ```rust
/// use undertow::testing::ScriptedInvoker;
/// use undertow::{assert_attempts, Failure, Invoke, RequestDescriptor};
///
/// let mut invoker = ScriptedInvoker::<(), _>::always_failing(Failure::timeout("slow"));
/// assert_attempts!(invoker, 0);
///
/// let _ = futures::executor::block_on(invoker.invoke(RequestDescriptor::get("/")));
/// assert_attempts!(invoker, 1);
/// ```
#[macro_export]
macro_rules! assert_attempts {
    ($invoker:expr, $expected:expr) => {{
        let calls = $invoker.calls();
        if calls != $expected {
            panic!("Expected {} attempts, got {}", $expected, calls);
        }
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Failure, Value};

    fn block_on<F: Future>(future: F) -> F::Output {
        futures::executor::block_on(future)
    }

    #[test]
    fn replays_script_in_order() {
        let mut invoker = ScriptedInvoker::new([Err(Failure::parse("bad")), Ok(1), Ok(2)]);
        let request = RequestDescriptor::get("/");

        assert_eq!(
            block_on(invoker.invoke(request.clone())),
            Err(Failure::parse("bad"))
        );
        assert_eq!(block_on(invoker.invoke(request.clone())), Ok(1));
        assert_eq!(block_on(invoker.invoke(request.clone())), Ok(2));
        assert_eq!(block_on(invoker.invoke(request)), Ok(2));
        assert_attempts!(invoker, 4);
    }

    #[test]
    fn failing_then_builds_script() {
        let mut invoker = ScriptedInvoker::failing_then(2, Failure::timeout("t"), "ok");
        let request = RequestDescriptor::get("/");

        assert!(block_on(invoker.invoke(request.clone())).is_err());
        assert!(block_on(invoker.invoke(request.clone())).is_err());
        assert_eq!(block_on(invoker.invoke(request)), Ok("ok"));
    }

    #[test]
    fn records_before_mutating() {
        let mut invoker = ScriptedInvoker::<(), _>::always_failing(Failure::other("x"))
            .mutating(|request| {
                request.context.insert("touched".into(), Value::from(true));
            });

        let _ = block_on(invoker.invoke(RequestDescriptor::get("/")));

        let received = invoker.received();
        assert_eq!(received.len(), 1);
        assert!(!received[0].context.contains_key("touched"));
    }

    #[test]
    fn clones_share_recordings() {
        let invoker = ScriptedInvoker::<_, Failure>::new([Ok(())]);
        let mut handle = invoker.clone();

        let _ = block_on(handle.invoke(RequestDescriptor::get("/")));

        assert_eq!(invoker.calls(), 1);
        assert!(format!("{:?}", invoker).contains("calls: 1"));
    }

    #[test]
    #[should_panic(expected = "at least one outcome")]
    fn empty_script_panics() {
        let _ = ScriptedInvoker::<(), Failure>::new([]);
    }

    #[test]
    #[should_panic(expected = "Expected 2 attempts, got 0")]
    fn assert_attempts_panics_on_mismatch() {
        let invoker = ScriptedInvoker::<(), Failure>::new([Ok(())]);
        assert_attempts!(invoker, 2);
    }
}
