//! Failure kinds and the classification seam used by the retry executor.
//!
//! The executor never inspects an error beyond its kind. Any error type can be
//! retried as long as it implements [`Classify`]; the kind is what the
//! ignore-list is matched against. [`Failure`] is a ready-made tagged error
//! for invokers that have no error type of their own.
//!
//! # Examples
//!
//! ```rust
//! use undertow::{Failure, FailureKind};
//!
//! let err = Failure::timeout("no response after 30s");
//! assert_eq!(err.kind(), FailureKind::Timeout);
//! assert_eq!(err.to_string(), "timeout: no response after 30s");
//! ```

use std::error::Error as StdError;
use std::fmt;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

/// Errors that expose a discriminating kind.
///
/// The kind is matched against the executor's ignore-list. It should be
/// cheap to produce and must not depend on anything but the error itself.
pub trait Classify {
    /// The discriminator.
    type Kind: Eq + Hash + Clone + Debug;

    /// The kind of this error.
    fn kind(&self) -> Self::Kind;
}

/// Discriminator for [`Failure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The request did not complete in time.
    Timeout,
    /// A connection could not be established.
    ConnectionFailed,
    /// An established connection was dropped.
    ConnectionReset,
    /// The server answered with an error status.
    Status(u16),
    /// The response could not be parsed.
    Parse,
    /// Anything else.
    Other,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Timeout => f.write_str("timeout"),
            FailureKind::ConnectionFailed => f.write_str("connection failed"),
            FailureKind::ConnectionReset => f.write_str("connection reset"),
            FailureKind::Status(code) => write!(f, "status {}", code),
            FailureKind::Parse => f.write_str("parse error"),
            FailureKind::Other => f.write_str("error"),
        }
    }
}

/// A tagged failure from one attempt.
#[derive(Debug, Clone)]
pub struct Failure {
    kind: FailureKind,
    message: String,
    source: Option<Arc<dyn StdError + Send + Sync>>,
}

impl Failure {
    /// Create a failure of the given kind.
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// A [`FailureKind::Timeout`] failure.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Timeout, message)
    }

    /// A [`FailureKind::ConnectionFailed`] failure.
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::new(FailureKind::ConnectionFailed, message)
    }

    /// A [`FailureKind::ConnectionReset`] failure.
    pub fn connection_reset(message: impl Into<String>) -> Self {
        Self::new(FailureKind::ConnectionReset, message)
    }

    /// A [`FailureKind::Status`] failure.
    pub fn status(code: u16, message: impl Into<String>) -> Self {
        Self::new(FailureKind::Status(code), message)
    }

    /// A [`FailureKind::Parse`] failure.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Parse, message)
    }

    /// A [`FailureKind::Other`] failure.
    pub fn other(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Other, message)
    }

    /// Attach the underlying cause.
    ///
    /// ```rust
    /// use std::error::Error;
    /// use undertow::Failure;
    ///
    /// let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
    /// let err = Failure::connection_failed("dialing upstream").with_source(io);
    ///
    /// assert_eq!(err.source().map(|s| s.to_string()), Some("refused".to_string()));
    /// ```
    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// The kind of this failure.
    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    /// The message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Classify for Failure {
    type Kind = FailureKind;

    fn kind(&self) -> FailureKind {
        self.kind
    }
}

impl PartialEq for Failure {
    /// Kind and message; the source is not compared.
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.message == other.message
    }
}

impl Eq for Failure {}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl StdError for Failure {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| &**source as &(dyn StdError + 'static))
    }
}
