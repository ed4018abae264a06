//! Error type for interruptible retries.
//!
//! The plain executor operations never wrap failures. This type is only
//! produced by the operations that add an explicit deadline or cancellation
//! signal on top of the retry loop.

use std::time::Duration;

/// Error returned when a retried call can be interrupted from outside.
///
/// Either the invoker's own failure, passed through untouched, or the
/// interruption that stopped the call.
///
/// # Examples
///
/// ```rust
/// use undertow::{Failure, Interrupted};
/// use std::time::Duration;
///
/// let err: Interrupted<Failure> = Interrupted::timeout(Duration::from_secs(5));
/// assert!(err.is_timeout());
/// assert!(err.into_failure().is_none());
///
/// let err = Interrupted::failed(Failure::timeout("upstream"));
/// assert_eq!(err.into_failure(), Some(Failure::timeout("upstream")));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interrupted<E> {
    /// The caller's deadline passed before the call finished.
    Timeout {
        /// The deadline that was exceeded.
        duration: Duration,
    },
    /// The caller's cancellation signal fired.
    Cancelled,
    /// The call finished with the invoker's failure.
    Failed(E),
}

impl<E> Interrupted<E> {
    /// Create a timeout error.
    pub fn timeout(duration: Duration) -> Self {
        Self::Timeout { duration }
    }

    /// Wrap a failure from the invoker.
    pub fn failed(error: E) -> Self {
        Self::Failed(error)
    }

    /// Returns true if the deadline passed.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns true if the cancellation signal fired.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns true if this carries the invoker's failure.
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Get the invoker's failure if present.
    pub fn into_failure(self) -> Option<E> {
        match self {
            Self::Failed(e) => Some(e),
            Self::Timeout { .. } | Self::Cancelled => None,
        }
    }
}

impl<E: std::fmt::Display> std::fmt::Display for Interrupted<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout { duration } => write!(f, "request timed out after {:?}", duration),
            Self::Cancelled => write!(f, "request cancelled"),
            Self::Failed(e) => write!(f, "{}", e),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for Interrupted<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Timeout { .. } | Self::Cancelled => None,
            Self::Failed(e) => Some(e),
        }
    }
}
