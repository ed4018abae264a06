//! The mutable request descriptor handed to each attempt.
//!
//! A [`RequestDescriptor`] is owned by the caller. The retry executor only
//! ever borrows it and passes a fresh [`deep_copy`](RequestDescriptor::deep_copy)
//! to every attempt, so whatever an invoker does to its copy stays local to
//! that attempt.
//!
//! Retry behavior is configured per request through [`RequestOptions`]:
//!
//! | field | default | effect |
//! |---|---|---|
//! | `num_retries` | 0 | additional attempts after the first |
//! | `retry_backoff` | 50ms | first delay, doubled after every retry |
//! | `idempotent` | false | makes non-GET requests eligible for retry |
//!
//! # Examples
//!
//! ```rust
//! use undertow::{Method, RequestDescriptor};
//! use std::time::Duration;
//!
//! let request = RequestDescriptor::post("https://api.example.com/orders")
//!     .idempotent(true)
//!     .with_retries(2)
//!     .with_retry_backoff(Duration::from_millis(10));
//!
//! assert_eq!(request.method, Method::Post);
//! assert!(request.is_retry_eligible());
//! assert_eq!(request.options.num_retries(), 2);
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::value::{Mapping, Value};

/// Backoff used when a request does not set `retry_backoff`.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(50);

/// HTTP request method.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    /// `GET`
    Get,
    /// `HEAD`
    Head,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `PATCH`
    Patch,
    /// `DELETE`
    Delete,
    /// `OPTIONS`
    Options,
    /// `TRACE`
    Trace,
    /// `CONNECT`
    Connect,
    /// Any other method.
    ///
    /// Parsing stores these upper-case and never for a standard name. A
    /// hand-built `Other` may hold any spelling; [`is_get`](Method::is_get)
    /// still matches it case-insensitively.
    Other(String),
}

impl Method {
    /// The canonical upper-case name.
    pub fn as_str(&self) -> &str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Options => "OPTIONS",
            Method::Trace => "TRACE",
            Method::Connect => "CONNECT",
            Method::Other(name) => name,
        }
    }

    /// Returns true for `GET`, the only method retried without an explicit
    /// idempotency flag.
    pub fn is_get(&self) -> bool {
        match self {
            Method::Get => true,
            Method::Other(name) => name.eq_ignore_ascii_case("GET"),
            _ => false,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a method name is empty or contains non-token characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodParseError {
    input: String,
}

impl MethodParseError {
    /// The rejected input.
    pub fn input(&self) -> &str {
        &self.input
    }
}

impl fmt::Display for MethodParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid HTTP method: {:?}", self.input)
    }
}

impl std::error::Error for MethodParseError {}

impl FromStr for Method {
    type Err = MethodParseError;

    /// Parse a method name case-insensitively.
    ///
    /// ```rust
    /// use undertow::Method;
    ///
    /// assert_eq!("get".parse::<Method>().unwrap(), Method::Get);
    /// assert_eq!("purge".parse::<Method>().unwrap().as_str(), "PURGE");
    /// assert!("".parse::<Method>().is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            return Err(MethodParseError {
                input: s.to_string(),
            });
        }

        let upper = s.to_ascii_uppercase();
        Ok(match upper.as_str() {
            "GET" => Method::Get,
            "HEAD" => Method::Head,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "PATCH" => Method::Patch,
            "DELETE" => Method::Delete,
            "OPTIONS" => Method::Options,
            "TRACE" => Method::Trace,
            "CONNECT" => Method::Connect,
            _ => Method::Other(upper),
        })
    }
}

/// Per-request retry configuration.
///
/// Every field is optional; the accessors apply the defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RequestOptions {
    /// Maximum additional attempts after the first.
    #[cfg_attr(
        feature = "serde",
        serde(skip_serializing_if = "Option::is_none")
    )]
    pub num_retries: Option<u32>,
    /// Delay before the first retry, in milliseconds when serialized.
    #[cfg_attr(
        feature = "serde",
        serde(
            with = "duration_millis",
            skip_serializing_if = "Option::is_none"
        )
    )]
    pub retry_backoff: Option<Duration>,
    /// Whether a non-GET request may be safely re-executed.
    #[cfg_attr(
        feature = "serde",
        serde(skip_serializing_if = "Option::is_none")
    )]
    pub idempotent: Option<bool>,
}

impl RequestOptions {
    /// Retry budget, defaulting to 0.
    pub fn num_retries(&self) -> u32 {
        self.num_retries.unwrap_or(0)
    }

    /// Initial backoff, defaulting to [`DEFAULT_RETRY_BACKOFF`].
    pub fn retry_backoff(&self) -> Duration {
        self.retry_backoff.unwrap_or(DEFAULT_RETRY_BACKOFF)
    }

    /// Idempotency flag, defaulting to false.
    pub fn is_idempotent(&self) -> bool {
        self.idempotent.unwrap_or(false)
    }
}

/// One HTTP-like request as seen by the retry layer.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RequestDescriptor {
    /// Request method.
    #[cfg_attr(feature = "serde", serde(with = "method_name"))]
    pub method: Method,
    /// Target URL.
    pub url: String,
    /// Request headers.
    #[cfg_attr(feature = "serde", serde(default))]
    pub headers: BTreeMap<String, String>,
    /// Request body.
    #[cfg_attr(feature = "serde", serde(default))]
    pub body: Value,
    /// Retry configuration.
    #[cfg_attr(feature = "serde", serde(default, rename = "request"))]
    pub options: RequestOptions,
    /// Arbitrary caller data travelling with the request.
    #[cfg_attr(feature = "serde", serde(default))]
    pub context: Mapping,
}

impl RequestDescriptor {
    /// Create a request with default options and an empty body.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: BTreeMap::new(),
            body: Value::Null,
            options: RequestOptions::default(),
            context: Mapping::new(),
        }
    }

    /// Create a `GET` request.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    /// Create a `POST` request.
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::Post, url)
    }

    /// Set a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Set the body.
    pub fn with_body(mut self, body: impl Into<Value>) -> Self {
        self.body = body.into();
        self
    }

    /// Attach caller data under `key`.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Set the retry budget.
    pub fn with_retries(mut self, n: u32) -> Self {
        self.options.num_retries = Some(n);
        self
    }

    /// Set the initial backoff.
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.options.retry_backoff = Some(backoff);
        self
    }

    /// Mark the request as safe (or unsafe) to re-execute.
    pub fn idempotent(mut self, idempotent: bool) -> Self {
        self.options.idempotent = Some(idempotent);
        self
    }

    /// Produce a structurally independent copy for one attempt.
    ///
    /// Nested mappings and sequences in the body and context are rebuilt;
    /// opaque payloads are shared.
    pub fn deep_copy(&self) -> Self {
        Self {
            method: self.method.clone(),
            url: self.url.clone(),
            headers: self.headers.clone(),
            body: self.body.deep_copy(),
            options: self.options.clone(),
            context: self
                .context
                .iter()
                .map(|(key, value)| (key.clone(), value.deep_copy()))
                .collect(),
        }
    }

    /// Whether a failure of this request may be retried at all: `GET`, or
    /// explicitly marked idempotent.
    pub fn is_retry_eligible(&self) -> bool {
        self.method.is_get() || self.options.is_idempotent()
    }
}

/// Whole milliseconds. Durations that would not survive the trip are
/// rejected instead of truncated.
#[cfg(feature = "serde")]
mod duration_millis {
    use serde::{ser, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let Some(d) = value else {
            return serializer.serialize_none();
        };
        if d.subsec_nanos() % 1_000_000 != 0 {
            return Err(<S::Error as ser::Error>::custom(format_args!(
                "retry_backoff {:?} is not a whole number of milliseconds",
                d
            )));
        }
        let millis = u64::try_from(d.as_millis()).map_err(|_| {
            <S::Error as ser::Error>::custom(format_args!("retry_backoff {:?} is too large", d))
        })?;
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}

#[cfg(feature = "serde")]
mod method_name {
    use super::Method;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(method: &Method, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(method.as_str())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Method, D::Error>
    where
        D: Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(de::Error::custom)
    }
}
