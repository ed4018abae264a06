//! The downstream capability the executor retries.

use std::future::Future;

use crate::request::RequestDescriptor;

/// Performs one attempt of a request.
///
/// The executor hands every attempt its own copy of the request, so an
/// implementation may mutate the descriptor it receives freely. Failures
/// are signalled through `Err`; the executor decides from the error's
/// [`Classify`](crate::Classify) kind whether another attempt is made.
///
/// Any `FnMut(RequestDescriptor) -> impl Future<Output = Result<T, E>>`
/// closure is an invoker. The future does not have to be `Send`; a call is
/// `Send` whenever the concrete invoker's future is, so it can still be
/// spawned onto a multi-threaded runtime.
///
/// # Example
///
/// ```rust
/// use undertow::{Failure, Invoke, RequestDescriptor};
///
/// # tokio_test::block_on(async {
/// let mut invoker = |request: RequestDescriptor| async move {
///     if request.url.is_empty() {
///         Err(Failure::other("missing url"))
///     } else {
///         Ok(request.url.len())
///     }
/// };
///
/// assert_eq!(invoker.invoke(RequestDescriptor::get("/abc")).await, Ok(4));
/// # });
/// ```
pub trait Invoke {
    /// The value a successful attempt produces.
    type Output;

    /// The failure an attempt can raise.
    type Error;

    /// Run one attempt against the given request copy.
    fn invoke(
        &mut self,
        request: RequestDescriptor,
    ) -> impl Future<Output = Result<Self::Output, Self::Error>>;
}

impl<F, Fut, T, E> Invoke for F
where
    F: FnMut(RequestDescriptor) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    type Output = T;
    type Error = E;

    fn invoke(
        &mut self,
        request: RequestDescriptor,
    ) -> impl Future<Output = Result<T, E>> {
        (self)(request)
    }
}
