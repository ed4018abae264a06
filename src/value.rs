//! Structured values carried by a request descriptor.
//!
//! A [`Value`] is a closed set of variant kinds: scalars, ordered sequences,
//! string-keyed mappings, and opaque payloads. Copying a value is structural:
//! mappings and sequences are rebuilt recursively, so a copy can be mutated
//! freely without touching the original.
//!
//! Opaque payloads are the exception. They are shared behind an [`Arc`] and
//! treated as immutable, so copying a value that holds one only bumps a
//! reference count.
//!
//! # Examples
//!
//! ```rust
//! use undertow::Value;
//!
//! let mut original = Value::from_iter([("retries", Value::from(3))]);
//! let copy = original.deep_copy();
//!
//! if let Some(map) = original.as_mapping_mut() {
//!     map.insert("retries".to_string(), Value::from(0));
//! }
//!
//! assert_eq!(copy.get("retries"), Some(&Value::Int(3)));
//! ```

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// An ordered mapping of string keys to values.
pub type Mapping = BTreeMap<String, Value>;

/// A structured value: scalar, sequence, mapping, or opaque payload.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
#[derive(Default)]
pub enum Value {
    /// Absence of a value.
    #[default]
    Null,
    /// A boolean.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// A floating point number.
    Float(f64),
    /// A UTF-8 string.
    String(String),
    /// An ordered sequence of values.
    Sequence(Vec<Value>),
    /// A string-keyed mapping of values.
    Mapping(Mapping),
    /// A payload this crate does not look into.
    ///
    /// Opaque values are shared by reference when copied and compare equal
    /// only to themselves. They cannot be serialized.
    #[cfg_attr(feature = "serde", serde(skip))]
    Opaque(Arc<dyn Any + Send + Sync>),
}

impl Value {
    /// Wrap an arbitrary payload as an opaque value.
    ///
    /// ```rust
    /// use undertow::Value;
    ///
    /// struct Token(u64);
    ///
    /// let value = Value::opaque(Token(7));
    /// assert_eq!(value.downcast_ref::<Token>().map(|t| t.0), Some(7));
    /// ```
    pub fn opaque<T: Any + Send + Sync>(payload: T) -> Self {
        Value::Opaque(Arc::new(payload))
    }

    /// Produce a structurally independent copy.
    ///
    /// Mappings and sequences are copied recursively, scalars are copied, and
    /// opaque payloads are shared.
    pub fn deep_copy(&self) -> Value {
        match self {
            Value::Null => Value::Null,
            Value::Bool(b) => Value::Bool(*b),
            Value::Int(i) => Value::Int(*i),
            Value::Float(f) => Value::Float(*f),
            Value::String(s) => Value::String(s.clone()),
            Value::Sequence(items) => Value::Sequence(items.iter().map(Value::deep_copy).collect()),
            Value::Mapping(map) => Value::Mapping(
                map.iter()
                    .map(|(key, value)| (key.clone(), value.deep_copy()))
                    .collect(),
            ),
            Value::Opaque(payload) => Value::Opaque(Arc::clone(payload)),
        }
    }

    /// Returns true for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns true for [`Value::Opaque`].
    pub fn is_opaque(&self) -> bool {
        matches!(self, Value::Opaque(_))
    }

    /// Borrow as a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Borrow as an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Borrow as a float. Integers are widened.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Borrow as a string slice.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow as a sequence.
    pub fn as_sequence(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// Mutably borrow as a sequence.
    pub fn as_sequence_mut(&mut self) -> Option<&mut Vec<Value>> {
        match self {
            Value::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// Borrow as a mapping.
    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Value::Mapping(map) => Some(map),
            _ => None,
        }
    }

    /// Mutably borrow as a mapping.
    pub fn as_mapping_mut(&mut self) -> Option<&mut Mapping> {
        match self {
            Value::Mapping(map) => Some(map),
            _ => None,
        }
    }

    /// Look up a key when this value is a mapping.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_mapping()?.get(key)
    }

    /// Mutably look up a key when this value is a mapping.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.as_mapping_mut()?.get_mut(key)
    }

    /// Follow a path of mapping keys.
    ///
    /// ```rust
    /// use undertow::Value;
    ///
    /// let value = Value::from_iter([(
    ///     "retry",
    ///     Value::from_iter([("num_retries", Value::from(2))]),
    /// )]);
    ///
    /// assert_eq!(value.pointer(&["retry", "num_retries"]), Some(&Value::Int(2)));
    /// assert_eq!(value.pointer(&["retry", "missing"]), None);
    /// ```
    pub fn pointer(&self, path: &[&str]) -> Option<&Value> {
        path.iter().try_fold(self, |value, key| value.get(key))
    }

    /// Follow a path of mapping keys, mutably.
    pub fn pointer_mut(&mut self, path: &[&str]) -> Option<&mut Value> {
        path.iter().try_fold(self, |value, key| value.get_mut(key))
    }

    /// Downcast an opaque payload.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Value::Opaque(payload) => (**payload).downcast_ref::<T>(),
            _ => None,
        }
    }
}

impl Clone for Value {
    fn clone(&self) -> Self {
        self.deep_copy()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Sequence(a), Value::Sequence(b)) => a == b,
            (Value::Mapping(a), Value::Mapping(b)) => a == b,
            (Value::Opaque(a), Value::Opaque(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Value::Int(i) => f.debug_tuple("Int").field(i).finish(),
            Value::Float(x) => f.debug_tuple("Float").field(x).finish(),
            Value::String(s) => f.debug_tuple("String").field(s).finish(),
            Value::Sequence(items) => f.debug_tuple("Sequence").field(items).finish(),
            Value::Mapping(map) => f.debug_tuple("Mapping").field(map).finish(),
            Value::Opaque(_) => f.write_str("Opaque(..)"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Sequence(items)
    }
}

impl From<Mapping> for Value {
    fn from(map: Mapping) -> Self {
        Value::Mapping(map)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Value {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Value::Mapping(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl FromIterator<Value> for Value {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Value::Sequence(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nested() -> Value {
        Value::from_iter([
            ("name", Value::from("orders")),
            (
                "filters",
                Value::from_iter([
                    ("status", Value::from("open")),
                    ("ids", Value::from(vec![Value::from(1), Value::from(2)])),
                ]),
            ),
        ])
    }

    #[test]
    fn test_deep_copy_is_equal() {
        let value = nested();
        assert_eq!(value.deep_copy(), value);
    }

    #[test]
    fn test_deep_copy_mapping_is_independent() {
        let original = nested();
        let mut copy = original.deep_copy();

        if let Some(Value::String(status)) = copy.pointer_mut(&["filters", "status"]) {
            status.push_str("-mutated");
        }

        assert_eq!(
            original.pointer(&["filters", "status"]),
            Some(&Value::from("open"))
        );
        assert_eq!(
            copy.pointer(&["filters", "status"]),
            Some(&Value::from("open-mutated"))
        );
    }

    #[test]
    fn test_deep_copy_sequence_is_independent() {
        let original = nested();
        let mut copy = original.clone();

        if let Some(ids) = copy
            .pointer_mut(&["filters", "ids"])
            .and_then(Value::as_sequence_mut)
        {
            ids.push(Value::from(3));
        }

        assert_eq!(
            original
                .pointer(&["filters", "ids"])
                .and_then(Value::as_sequence)
                .map(Vec::len),
            Some(2)
        );
        assert_eq!(
            copy.pointer(&["filters", "ids"])
                .and_then(Value::as_sequence)
                .map(Vec::len),
            Some(3)
        );
    }

    #[test]
    fn test_opaque_is_shared_by_reference() {
        let original = Value::opaque(String::from("connection handle"));
        let copy = original.deep_copy();

        match (&original, &copy) {
            (Value::Opaque(a), Value::Opaque(b)) => assert!(Arc::ptr_eq(a, b)),
            _ => panic!("expected opaque values"),
        }
        assert_eq!(original, copy);
    }

    #[test]
    fn test_distinct_opaque_values_are_not_equal() {
        assert_ne!(Value::opaque(1u8), Value::opaque(1u8));
    }

    #[test]
    fn test_downcast_ref() {
        let value = Value::opaque(42u64);
        assert_eq!(value.downcast_ref::<u64>(), Some(&42));
        assert_eq!(value.downcast_ref::<u32>(), None);
        assert_eq!(Value::from(1).downcast_ref::<u64>(), None);
    }

    #[test]
    fn test_scalar_accessors() {
        assert_eq!(Value::from(true).as_bool(), Some(true));
        assert_eq!(Value::from(7).as_i64(), Some(7));
        assert_eq!(Value::from(7).as_f64(), Some(7.0));
        assert_eq!(Value::from(1.5).as_f64(), Some(1.5));
        assert_eq!(Value::from("x").as_str(), Some("x"));
        assert!(Value::from(None::<i64>).is_null());
        assert!(Value::default().is_null());
        assert!(Value::from("x").as_mapping().is_none());
    }

    #[test]
    fn test_debug_hides_opaque_payload() {
        let debug = format!("{:?}", Value::opaque(vec![1, 2, 3]));
        assert_eq!(debug, "Opaque(..)");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serde_json_round_trip() {
        let value = nested();
        let json = serde_json::to_string(&value).unwrap();
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(back, value);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serde_rejects_opaque() {
        let value = Value::from_iter([("handle", Value::opaque(1u8))]);
        assert!(serde_json::to_string(&value).is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serde_reads_null() {
        let value: Value = serde_json::from_str(r#"{"a": null, "b": 1.5}"#).unwrap();
        assert_eq!(value.get("a"), Some(&Value::Null));
        assert_eq!(value.get("b"), Some(&Value::Float(1.5)));
    }
}
