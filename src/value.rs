//! Dynamic state values and paths into them.
//!
//! State is an externally-owned tree that selectors read from. Containers are
//! shared through `Arc`, which gives two snapshots a meaningful notion of
//! *identity*: two arrays or objects are identical only when they are the same
//! allocation, while primitives are identical when their contents are equal.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A node of a state tree.
///
/// Clone is cheap as containers are wrapped by `Arc`.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    /// Absent or null value.
    #[default]
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Floating point value.
    Float(f64),
    /// String value.
    String(Arc<str>),
    /// Shared array.
    Array(Arc<Vec<Value>>),
    /// Shared object with ordered keys.
    Object(Arc<BTreeMap<String, Value>>),
}

impl Value {
    /// Build an array value from its items.
    pub fn array(items: impl IntoIterator<Item = Value>) -> Self {
        Value::Array(Arc::new(items.into_iter().collect()))
    }

    /// Build an object value from key/value pairs.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let state = Value::object([("a", Value::from(1)), ("b", Value::from("x"))]);
    /// ```
    pub fn object<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Object(Arc::new(
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }

    /// Strict identity: primitives by value, containers by allocation.
    ///
    /// This is the comparison used when re-validating recorded state reads.
    pub fn is_identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Arc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Returns true for `Value::Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the boolean if this is a `Bool`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the integer if this is an `Int`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns a float for both `Int` and `Float`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Returns the string slice if this is a `String`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the items if this is an `Array`.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    /// Returns the map if this is an `Object`.
    pub fn as_object(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Look up one path segment: object key, or array index.
    pub fn child(&self, segment: &str) -> Option<&Value> {
        match self {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        }
    }

    /// Walk a path from this value. The empty path returns `self`.
    pub fn at_path(&self, path: &StatePath) -> Option<&Value> {
        path.segments()
            .iter()
            .try_fold(self, |current, segment| current.child(segment))
    }

    /// Return a copy of this object with `key` set to `value`.
    ///
    /// Untouched children keep their identity, so selectors that only read
    /// other keys remain valid against the new snapshot. Non-objects are
    /// replaced by a fresh single-key object.
    #[must_use]
    pub fn with_key(&self, key: impl Into<String>, value: Value) -> Self {
        let mut map = match self {
            Value::Object(map) => BTreeMap::clone(map),
            _ => BTreeMap::new(),
        };
        map.insert(key.into(), value);
        Value::Object(Arc::new(map))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v.into())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(Arc::from(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(Arc::from(v))
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(Arc::new(v))
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::from(s),
            serde_json::Value::Array(items) => Value::array(items.into_iter().map(Value::from)),
            serde_json::Value::Object(map) => {
                Value::object(map.into_iter().map(|(k, v)| (k, Value::from(v))))
            }
        }
    }
}

/// A path into a state tree.
///
/// The empty path denotes the whole state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StatePath(Vec<String>);

impl StatePath {
    /// The path addressing the whole state.
    pub fn root() -> Self {
        Self::default()
    }

    /// Build a path from explicit segments.
    pub fn new<S: Into<String>>(segments: impl IntoIterator<Item = S>) -> Self {
        StatePath(segments.into_iter().map(Into::into).collect())
    }

    /// Parse `"a.b.0"` or `"a.b[0]"`. The empty string is the root path.
    pub fn parse(path: &str) -> Self {
        StatePath(
            path.split(['.', '[', ']'])
                .filter(|segment| !segment.is_empty())
                .map(str::to_owned)
                .collect(),
        )
    }

    /// Returns true if this path addresses the whole state.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// The segments of this path.
    pub fn segments(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for StatePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

impl From<&str> for StatePath {
    fn from(path: &str) -> Self {
        StatePath::parse(path)
    }
}

impl From<String> for StatePath {
    fn from(path: String) -> Self {
        StatePath::parse(&path)
    }
}

impl From<&String> for StatePath {
    fn from(path: &String) -> Self {
        StatePath::parse(path)
    }
}

impl From<usize> for StatePath {
    fn from(index: usize) -> Self {
        StatePath(vec![index.to_string()])
    }
}

impl From<&[&str]> for StatePath {
    fn from(segments: &[&str]) -> Self {
        StatePath::new(segments.iter().copied())
    }
}

impl From<()> for StatePath {
    fn from(_: ()) -> Self {
        StatePath::root()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_identity_of_primitives_and_containers() {
        assert!(Value::from(1).is_identical(&Value::from(1)));
        assert!(Value::from("a").is_identical(&Value::from("a")));
        assert!(!Value::from(1).is_identical(&Value::from(1.0)));

        let list = Value::array([Value::from(1)]);
        assert!(list.is_identical(&list.clone()));
        // Equal contents, different allocation
        assert!(!list.is_identical(&Value::array([Value::from(1)])));
        assert_eq!(list, Value::array([Value::from(1)]));
    }

    #[test]
    fn test_path_parsing() {
        assert_eq!(StatePath::parse("a.b[0]").segments(), ["a", "b", "0"]);
        assert_eq!(StatePath::parse("a.b.0"), StatePath::parse("a.b[0]"));
        assert!(StatePath::parse("").is_root());
        assert_eq!(StatePath::parse("x.y").to_string(), "x.y");
        assert_eq!(StatePath::root().to_string(), "");
    }

    #[test]
    fn test_at_path() {
        let state = Value::from(json!({"a": {"list": [10, 20]}, "b": null}));
        assert_eq!(
            state.at_path(&"a.list[1]".into()).and_then(Value::as_i64),
            Some(20)
        );
        assert_eq!(state.at_path(&"b".into()), Some(&Value::Null));
        assert_eq!(state.at_path(&"missing.deep".into()), None);
        assert!(state.at_path(&StatePath::root()).unwrap().is_identical(&state));
    }

    #[test]
    fn test_with_key_preserves_untouched_children() {
        let state = Value::from(json!({"a": [1, 2], "b": 1}));
        let next = state.with_key("b", Value::from(2));

        assert!(!next.is_identical(&state));
        assert!(next
            .child("a")
            .unwrap()
            .is_identical(state.child("a").unwrap()));
        assert_eq!(next.child("b").and_then(Value::as_i64), Some(2));
    }
}
