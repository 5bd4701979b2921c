//! Selector parameters and parameter keys.
//!
//! Params are deliberately restricted to a primitive, a flat list of
//! primitives, or a flat record. Anything richer belongs in state, not in the
//! address of a cached result.

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

/// A single primitive parameter value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Primitive {
    /// No value.
    #[default]
    Null,
    /// Boolean.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Float.
    Float(f64),
    /// String.
    Str(String),
}

impl Primitive {
    /// Returns the integer if this is an `Int`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Primitive::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the string slice if this is a `Str`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Primitive::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the boolean if this is a `Bool`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Primitive::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

/// A field of a record parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// A primitive field.
    Primitive(Primitive),
    /// A list-of-primitives field.
    List(Vec<Primitive>),
}

impl ParamValue {
    /// Returns the primitive if this field is not a list.
    pub fn as_primitive(&self) -> Option<&Primitive> {
        match self {
            ParamValue::Primitive(p) => Some(p),
            ParamValue::List(_) => None,
        }
    }

    /// Shorthand for `as_primitive().and_then(Primitive::as_i64)`.
    pub fn as_i64(&self) -> Option<i64> {
        self.as_primitive().and_then(Primitive::as_i64)
    }

    /// Shorthand for `as_primitive().and_then(Primitive::as_str)`.
    pub fn as_str(&self) -> Option<&str> {
        self.as_primitive().and_then(Primitive::as_str)
    }
}

/// Parameters of one selector call.
///
/// Record fields keep their insertion order. The default key function
/// serializes them in that order, so `{a, b}` and `{b, a}` address different
/// cache slots; use [`sorted_key_for_params`] when that matters.
#[derive(Debug, Clone, PartialEq)]
pub enum Params {
    /// A single primitive (including "no params", `Primitive::Null`).
    Primitive(Primitive),
    /// A flat list of primitives.
    List(Vec<Primitive>),
    /// A flat record.
    Record(Vec<(String, ParamValue)>),
}

impl Default for Params {
    fn default() -> Self {
        Params::none()
    }
}

impl Params {
    /// The "no params" value.
    pub fn none() -> Self {
        Params::Primitive(Primitive::Null)
    }

    /// Build a record from fields, in order.
    pub fn record<K, V>(fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<ParamValue>,
    {
        Params::Record(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Returns the primitive if these params are a single primitive.
    pub fn as_primitive(&self) -> Option<&Primitive> {
        match self {
            Params::Primitive(p) => Some(p),
            _ => None,
        }
    }

    /// Shorthand for a single integer param.
    pub fn as_i64(&self) -> Option<i64> {
        self.as_primitive().and_then(Primitive::as_i64)
    }

    /// Shorthand for a single string param.
    pub fn as_str(&self) -> Option<&str> {
        self.as_primitive().and_then(Primitive::as_str)
    }

    /// Returns the list items if these params are a list.
    pub fn as_list(&self) -> Option<&[Primitive]> {
        match self {
            Params::List(items) => Some(items),
            _ => None,
        }
    }

    /// Look up a record field by name.
    pub fn field(&self, name: &str) -> Option<&ParamValue> {
        match self {
            Params::Record(fields) => fields.iter().find(|(k, _)| k == name).map(|(_, v)| v),
            _ => None,
        }
    }
}

impl Serialize for Params {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Params::Primitive(p) => p.serialize(serializer),
            Params::List(items) => items.serialize(serializer),
            Params::Record(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (k, v) in fields {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

macro_rules! impl_from_primitive {
    ($($ty:ty => |$v:ident| $body:expr),* $(,)?) => {
        $(
            impl From<$ty> for Primitive {
                fn from($v: $ty) -> Self {
                    $body
                }
            }

            impl From<$ty> for ParamValue {
                fn from(v: $ty) -> Self {
                    ParamValue::Primitive(v.into())
                }
            }

            impl From<$ty> for Params {
                fn from(v: $ty) -> Self {
                    Params::Primitive(v.into())
                }
            }
        )*
    };
}

impl_from_primitive! {
    () => |_v| Primitive::Null,
    bool => |v| Primitive::Bool(v),
    i32 => |v| Primitive::Int(v.into()),
    i64 => |v| Primitive::Int(v),
    u32 => |v| Primitive::Int(v.into()),
    f64 => |v| Primitive::Float(v),
    &str => |v| Primitive::Str(v.to_owned()),
    String => |v| Primitive::Str(v),
}

impl<T: Into<Primitive>> From<Vec<T>> for ParamValue {
    fn from(items: Vec<T>) -> Self {
        ParamValue::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Primitive>> From<Vec<T>> for Params {
    fn from(items: Vec<T>) -> Self {
        Params::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<Primitive> for Params {
    fn from(p: Primitive) -> Self {
        Params::Primitive(p)
    }
}

impl From<&Params> for Params {
    fn from(p: &Params) -> Self {
        p.clone()
    }
}

/// Default parameter key: the JSON serialization of the params.
pub fn json_key_for_params(params: &Params) -> String {
    // Serializing these closed types into a String cannot fail.
    serde_json::to_string(params).unwrap_or_else(|_| format!("{params:?}"))
}

/// Parameter key that ignores record field order.
pub fn sorted_key_for_params(params: &Params) -> String {
    match params {
        Params::Record(fields) => {
            let mut sorted = fields.clone();
            sorted.sort_by(|(a, _), (b, _)| a.cmp(b));
            json_key_for_params(&Params::Record(sorted))
        }
        _ => json_key_for_params(params),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_keys() {
        assert_eq!(json_key_for_params(&Params::none()), "null");
        assert_eq!(json_key_for_params(&6.into()), "6");
        assert_eq!(json_key_for_params(&"a".into()), "\"a\"");
        assert_eq!(json_key_for_params(&vec![1, 2].into()), "[1,2]");
        assert_eq!(
            json_key_for_params(&Params::record([("path", "a")])),
            r#"{"path":"a"}"#
        );
    }

    #[test]
    fn test_structurally_equal_params_share_a_key() {
        let a = Params::record([("multiplier", 10)]);
        let b = Params::record([("multiplier", 10)]);
        assert_eq!(json_key_for_params(&a), json_key_for_params(&b));
    }

    #[test]
    fn test_record_order_sensitivity() {
        let ab = Params::record([("a", 1), ("b", 2)]);
        let ba = Params::record([("b", 2), ("a", 1)]);

        assert_ne!(json_key_for_params(&ab), json_key_for_params(&ba));
        assert_eq!(sorted_key_for_params(&ab), sorted_key_for_params(&ba));
    }

    #[test]
    fn test_field_access() {
        let params = Params::record([
            ("path", ParamValue::from("a")),
            ("ids", ParamValue::from(vec![1, 2])),
        ]);
        assert_eq!(params.field("path").and_then(ParamValue::as_str), Some("a"));
        assert!(params.field("ids").unwrap().as_primitive().is_none());
        assert!(params.field("missing").is_none());
    }
}
