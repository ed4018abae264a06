//! The retry loop.
//!
//! [`RetryExecutor`] wraps one request/response cycle. Every attempt gets a
//! fresh deep copy of the caller's request; when an attempt fails, the
//! executor decides whether the failure may be retried, sleeps for the
//! current backoff, doubles it, and tries again. When it stops, the caller
//! gets back exactly the failure the last attempt raised.
//!
//! A failure is retried only when all of these hold:
//!
//! - the request is `GET` or marked idempotent,
//! - the failure's kind is not on the executor's ignore-list,
//! - the request's `num_retries` budget is not yet spent.

use std::collections::HashSet;
use std::fmt::Debug;
use std::hash::Hash;
use std::time::Duration;

use crate::failure::Classify;
use crate::request::RequestDescriptor;
use crate::retry::policy::{GiveUp, RetryPolicy, RetryState};

#[cfg(feature = "async")]
use crate::retry::error::Interrupted;
#[cfg(feature = "async")]
use crate::retry::invoke::Invoke;
#[cfg(feature = "async")]
use crate::retry::policy::RetryEvent;
#[cfg(feature = "async")]
use std::future::Future;

/// Applies the retry policy around an invoker.
///
/// The executor only holds the ignore-list. Everything else is read from the
/// request at the start of each call, and all per-call state lives inside the
/// call, so one executor can serve any number of concurrent calls.
///
/// # Example
///
/// ```rust
/// use undertow::{Failure, FailureKind, RequestDescriptor, RetryExecutor};
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use std::time::Duration;
///
/// # tokio_test::block_on(async {
/// let executor = RetryExecutor::ignoring([FailureKind::Status(404)]);
/// let request = RequestDescriptor::get("/orders/7")
///     .with_retries(3)
///     .with_retry_backoff(Duration::from_millis(1));
///
/// let calls = AtomicU32::new(0);
/// let result = executor
///     .execute(&request, |_request: RequestDescriptor| {
///         let n = calls.fetch_add(1, Ordering::SeqCst);
///         async move {
///             if n < 2 {
///                 Err(Failure::connection_reset("peer hung up"))
///             } else {
///                 Ok("order 7")
///             }
///         }
///     })
///     .await;
///
/// assert_eq!(result, Ok("order 7"));
/// assert_eq!(calls.load(Ordering::SeqCst), 3);
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct RetryExecutor<K> {
    ignored: HashSet<K>,
}

impl<K> Default for RetryExecutor<K> {
    fn default() -> Self {
        Self {
            ignored: HashSet::new(),
        }
    }
}

impl<K: Eq + Hash + Debug> RetryExecutor<K> {
    /// Create an executor that ignores no failure kinds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an executor that never retries the given failure kinds.
    pub fn ignoring<I: IntoIterator<Item = K>>(kinds: I) -> Self {
        Self {
            ignored: kinds.into_iter().collect(),
        }
    }

    /// Add a failure kind to the ignore-list.
    pub fn ignore(mut self, kind: K) -> Self {
        self.ignored.insert(kind);
        self
    }

    /// The failure kinds that are never retried.
    pub fn ignored_kinds(&self) -> &HashSet<K> {
        &self.ignored
    }

    /// Returns true if failures of this kind are never retried.
    pub fn is_ignored(&self, kind: &K) -> bool {
        self.ignored.contains(kind)
    }

    /// Check whether a failure of `request` may be retried, budget aside.
    ///
    /// ```rust
    /// use undertow::{Failure, FailureKind, GiveUp, RequestDescriptor, RetryExecutor};
    ///
    /// let executor = RetryExecutor::ignoring([FailureKind::Parse]);
    /// let get = RequestDescriptor::get("/");
    /// let post = RequestDescriptor::post("/");
    ///
    /// assert_eq!(executor.check(&get, &Failure::timeout("t")), Ok(()));
    /// assert_eq!(executor.check(&get, &Failure::parse("p")), Err(GiveUp::Ignored));
    /// assert_eq!(executor.check(&post, &Failure::timeout("t")), Err(GiveUp::NotIdempotent));
    /// ```
    pub fn check<E>(&self, request: &RequestDescriptor, error: &E) -> Result<(), GiveUp>
    where
        E: Classify<Kind = K>,
    {
        if !request.is_retry_eligible() {
            return Err(GiveUp::NotIdempotent);
        }
        if self.is_ignored(&error.kind()) {
            return Err(GiveUp::Ignored);
        }
        Ok(())
    }

    /// Returns true if a failure of `request` may be retried, budget aside.
    pub fn should_retry<E>(&self, request: &RequestDescriptor, error: &E) -> bool
    where
        E: Classify<Kind = K>,
    {
        self.check(request, error).is_ok()
    }

    /// Decide what follows a failed attempt: the delay before the next one,
    /// or the reason to stop. Consumes budget only when retrying.
    fn decide<E>(
        &self,
        request: &RequestDescriptor,
        error: &E,
        state: &mut RetryState,
    ) -> Result<Duration, GiveUp>
    where
        E: Classify<Kind = K>,
    {
        self.check(request, error)?;
        state.next_delay().ok_or(GiveUp::Exhausted)
    }

    /// Run `invoker` against `request`, retrying eligible failures.
    ///
    /// Returns the first success, or the unchanged failure of the last
    /// attempt. The caller's request is never modified.
    #[cfg(feature = "async")]
    pub async fn execute<I>(
        &self,
        request: &RequestDescriptor,
        invoker: I,
    ) -> Result<I::Output, I::Error>
    where
        I: Invoke,
        I::Error: Classify<Kind = K>,
    {
        self.execute_with_hooks(request, invoker, |_| {}).await
    }

    /// Like [`execute`](Self::execute), calling `on_retry` before each
    /// backoff sleep.
    ///
    /// The hook is synchronous and should not block; use it for logging or
    /// metrics.
    ///
    /// ```rust
    /// use undertow::{Failure, RequestDescriptor, RetryEvent, RetryExecutor};
    /// use std::sync::Mutex;
    /// use std::time::Duration;
    ///
    /// # tokio_test::block_on(async {
    /// let request = RequestDescriptor::get("/")
    ///     .with_retries(2)
    ///     .with_retry_backoff(Duration::from_millis(1));
    /// let delays = Mutex::new(Vec::new());
    ///
    /// let result = RetryExecutor::new()
    ///     .execute_with_hooks(
    ///         &request,
    ///         |_: RequestDescriptor| async { Err::<(), _>(Failure::timeout("slow")) },
    ///         |event: &RetryEvent<'_, Failure>| {
    ///             delays.lock().unwrap().push(event.next_delay);
    ///         },
    ///     )
    ///     .await;
    ///
    /// assert_eq!(result, Err(Failure::timeout("slow")));
    /// assert_eq!(
    ///     *delays.lock().unwrap(),
    ///     vec![Duration::from_millis(1), Duration::from_millis(2)]
    /// );
    /// # });
    /// ```
    #[cfg(feature = "async")]
    pub async fn execute_with_hooks<I, H>(
        &self,
        request: &RequestDescriptor,
        mut invoker: I,
        on_retry: H,
    ) -> Result<I::Output, I::Error>
    where
        I: Invoke,
        I::Error: Classify<Kind = K>,
        H: Fn(&RetryEvent<'_, I::Error>),
    {
        let policy = RetryPolicy::from_request(request);

        let attempts = async move {
            let start = tokio::time::Instant::now();
            let mut state = policy.start();
            let mut attempt = 0u32;

            loop {
                attempt += 1;
                let error = match invoker.invoke(request.deep_copy()).await {
                    Ok(value) => return Ok(value),
                    Err(error) => error,
                };

                let delay = match self.decide(request, &error, &mut state) {
                    Ok(delay) => delay,
                    Err(reason) => {
                        #[cfg(feature = "tracing")]
                        tracing::debug!(attempt, kind = ?error.kind(), %reason, "giving up on request");
                        #[cfg(not(feature = "tracing"))]
                        let _ = reason;
                        return Err(error);
                    }
                };

                #[cfg(feature = "tracing")]
                tracing::debug!(attempt, kind = ?error.kind(), ?delay, "retrying request");

                on_retry(&RetryEvent {
                    attempt,
                    error: &error,
                    next_delay: delay,
                    elapsed: start.elapsed(),
                });
                drop(error);

                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
        };

        #[cfg(feature = "tracing")]
        let attempts = {
            use tracing::Instrument as _;
            attempts.instrument(tracing::debug_span!(
                "retry",
                method = %request.method,
                url = %request.url,
                num_retries = policy.max_retries()
            ))
        };

        attempts.await
    }

    /// Like [`execute`](Self::execute), but stops as soon as `signal`
    /// resolves.
    ///
    /// Cancellation drops whatever is in flight, an attempt or a backoff
    /// sleep, and returns [`Interrupted::Cancelled`]. A failure from the
    /// invoker comes back as [`Interrupted::Failed`], unchanged.
    ///
    /// ```rust
    /// use undertow::{Failure, Interrupted, RequestDescriptor, RetryExecutor};
    /// use std::time::Duration;
    ///
    /// # tokio_test::block_on(async {
    /// let request = RequestDescriptor::get("/")
    ///     .with_retries(10)
    ///     .with_retry_backoff(Duration::from_secs(60));
    ///
    /// let result = RetryExecutor::new()
    ///     .execute_until(
    ///         &request,
    ///         |_: RequestDescriptor| async { Err::<(), _>(Failure::timeout("slow")) },
    ///         tokio::time::sleep(Duration::from_millis(5)),
    ///     )
    ///     .await;
    ///
    /// assert_eq!(result, Err(Interrupted::Cancelled));
    /// # });
    /// ```
    #[cfg(feature = "async")]
    pub async fn execute_until<I, S>(
        &self,
        request: &RequestDescriptor,
        invoker: I,
        signal: S,
    ) -> Result<I::Output, Interrupted<I::Error>>
    where
        I: Invoke,
        I::Error: Classify<Kind = K>,
        S: Future<Output = ()>,
    {
        use futures::future::{select, Either};

        let call = self.execute(request, invoker);
        futures::pin_mut!(call);
        futures::pin_mut!(signal);

        match select(call, signal).await {
            Either::Left((result, _)) => result.map_err(Interrupted::Failed),
            Either::Right(((), _)) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(method = %request.method, url = %request.url, "request cancelled");
                Err(Interrupted::Cancelled)
            }
        }
    }

    /// Like [`execute`](Self::execute), bounded by a deadline over the whole
    /// call, retries and backoff included.
    ///
    /// The deadline only exists when the caller asks for one; `execute`
    /// itself has no time limit.
    #[cfg(feature = "async")]
    pub async fn execute_with_timeout<I>(
        &self,
        request: &RequestDescriptor,
        invoker: I,
        duration: Duration,
    ) -> Result<I::Output, Interrupted<I::Error>>
    where
        I: Invoke,
        I::Error: Classify<Kind = K>,
    {
        match tokio::time::timeout(duration, self.execute(request, invoker)).await {
            Ok(result) => result.map_err(Interrupted::Failed),
            Err(_) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(method = %request.method, url = %request.url, ?duration, "request timed out");
                Err(Interrupted::timeout(duration))
            }
        }
    }

    /// Blocking counterpart of [`execute`](Self::execute) for synchronous
    /// invokers.
    ///
    /// Backoff sleeps the calling thread only.
    ///
    /// ```rust
    /// use undertow::{Failure, RequestDescriptor, RetryExecutor};
    /// use std::time::Duration;
    ///
    /// let request = RequestDescriptor::post("/jobs").with_retries(5);
    /// let mut calls = 0;
    ///
    /// let result: Result<(), Failure> = RetryExecutor::new().execute_blocking(&request, |_| {
    ///     calls += 1;
    ///     Err(Failure::timeout("slow"))
    /// });
    ///
    /// // POST without the idempotent flag is never retried
    /// assert_eq!(result, Err(Failure::timeout("slow")));
    /// assert_eq!(calls, 1);
    /// ```
    pub fn execute_blocking<F, T, E>(
        &self,
        request: &RequestDescriptor,
        mut invoker: F,
    ) -> Result<T, E>
    where
        F: FnMut(RequestDescriptor) -> Result<T, E>,
        E: Classify<Kind = K>,
    {
        let policy = RetryPolicy::from_request(request);

        #[cfg(feature = "tracing")]
        let _span = tracing::debug_span!(
            "retry",
            method = %request.method,
            url = %request.url,
            num_retries = policy.max_retries()
        )
        .entered();

        let mut state = policy.start();
        #[cfg(feature = "tracing")]
        let mut attempt = 0u32;

        loop {
            #[cfg(feature = "tracing")]
            {
                attempt += 1;
            }
            let error = match invoker(request.deep_copy()) {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            match self.decide(request, &error, &mut state) {
                Ok(delay) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(attempt, kind = ?error.kind(), ?delay, "retrying request");
                    if !delay.is_zero() {
                        std::thread::sleep(delay);
                    }
                }
                Err(reason) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(attempt, kind = ?error.kind(), %reason, "giving up on request");
                    #[cfg(not(feature = "tracing"))]
                    let _ = reason;
                    return Err(error);
                }
            }
        }
    }
}

/// Retry `invoker` against `request` with no ignored failure kinds.
///
/// Shorthand for `RetryExecutor::new().execute(request, invoker)`.
///
/// ```rust
/// use undertow::{retry, Failure, RequestDescriptor};
///
/// # tokio_test::block_on(async {
/// let request = RequestDescriptor::get("/health");
/// let result = retry(&request, |_: RequestDescriptor| async { Ok::<_, Failure>("up") }).await;
/// assert_eq!(result, Ok("up"));
/// # });
/// ```
#[cfg(feature = "async")]
pub async fn retry<I>(request: &RequestDescriptor, invoker: I) -> Result<I::Output, I::Error>
where
    I: Invoke,
    I::Error: Classify,
{
    RetryExecutor::<<I::Error as Classify>::Kind>::new()
        .execute(request, invoker)
        .await
}
