//! Canonical key/value codec
//!
//! Map-like CRDTs identify keys and set elements by their canonical encoding,
//! never by instance identity. Two values are the same entry iff their
//! [`CanonicalKey`]s are equal.

use crate::Result;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

const TAG_NULL: u8 = b'n';
const TAG_BOOL: u8 = b'b';
const TAG_INT: u8 = b'i';
const TAG_UINT: u8 = b'u';
const TAG_FLOAT: u8 = b'f';
const TAG_STRING: u8 = b's';
const TAG_BYTES: u8 = b'x';
const TAG_JSON: u8 = b'j';

/// Deterministic, totally ordered encoding of a value
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalKey(Vec<u8>);

impl CanonicalKey {
    fn tagged(tag: u8, payload: &[u8]) -> Self {
        let mut encoded = Vec::with_capacity(payload.len() + 1);
        encoded.push(tag);
        encoded.extend_from_slice(payload);
        Self(encoded)
    }

    /// Raw encoded bytes, type tag first
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Types usable as map keys or set elements.
pub trait Canonical {
    /// Encode this value canonically
    fn canonical_key(&self) -> CanonicalKey;

    /// Compare two values by their canonical encoding
    fn canonical_eq(&self, other: &Self) -> bool {
        self.canonical_key() == other.canonical_key()
    }
}

impl<T: Canonical + ?Sized> Canonical for &T {
    fn canonical_key(&self) -> CanonicalKey {
        (**self).canonical_key()
    }
}

impl Canonical for str {
    fn canonical_key(&self) -> CanonicalKey {
        CanonicalKey::tagged(TAG_STRING, self.as_bytes())
    }
}

impl Canonical for String {
    fn canonical_key(&self) -> CanonicalKey {
        self.as_str().canonical_key()
    }
}

impl Canonical for bool {
    fn canonical_key(&self) -> CanonicalKey {
        CanonicalKey::tagged(TAG_BOOL, &[u8::from(*self)])
    }
}

macro_rules! canonical_signed {
    ($($t:ty),*) => {$(
        impl Canonical for $t {
            fn canonical_key(&self) -> CanonicalKey {
                CanonicalKey::tagged(TAG_INT, &i64::from(*self).to_be_bytes())
            }
        }
    )*};
}

macro_rules! canonical_unsigned {
    ($($t:ty),*) => {$(
        impl Canonical for $t {
            fn canonical_key(&self) -> CanonicalKey {
                CanonicalKey::tagged(TAG_UINT, &u64::from(*self).to_be_bytes())
            }
        }
    )*};
}

canonical_signed!(i8, i16, i32, i64);
canonical_unsigned!(u8, u16, u32, u64);

impl Canonical for Vec<u8> {
    fn canonical_key(&self) -> CanonicalKey {
        CanonicalKey::tagged(TAG_BYTES, self)
    }
}

impl Canonical for Bytes {
    fn canonical_key(&self) -> CanonicalKey {
        CanonicalKey::tagged(TAG_BYTES, self)
    }
}

impl Canonical for serde_json::Value {
    fn canonical_key(&self) -> CanonicalKey {
        let mut encoded = String::new();
        write_sorted_json(self, &mut encoded);
        CanonicalKey::tagged(TAG_JSON, encoded.as_bytes())
    }
}

/// Compact JSON rendering with object fields sorted by name at every level
fn write_sorted_json(value: &serde_json::Value, out: &mut String) {
    match value {
        serde_json::Value::Object(fields) => {
            let mut fields: Vec<_> = fields.iter().collect();
            fields.sort_unstable_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (name, field)) in fields.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::Value::from(name.as_str()).to_string());
                out.push(':');
                write_sorted_json(field, out);
            }
            out.push('}');
        }
        serde_json::Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_sorted_json(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Canonical key for an application record, via its JSON form.
pub fn canonical_json<T: Serialize>(record: &T) -> Result<CanonicalKey> {
    let value = serde_json::to_value(record)?;
    Ok(value.canonical_key())
}

/// Opaque value stored inside heterogeneous CRDT trees.
///
/// Primitives, byte-encoded records, and JSON-like structures are all treated
/// as comparable tokens through their canonical encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(#[serde(with = "float_repr")] f64),
    String(String),
    Bytes(Bytes),
    Json(serde_json::Value),
}

/// JSON numbers cannot hold NaN or infinities, so those travel as the strings
/// `"NaN"`, `"Infinity"` and `"-Infinity"`.
mod float_repr {
    use serde::{de, Deserialize, Deserializer, Serializer};

    const NAN: &str = "NaN";
    const INFINITY: &str = "Infinity";
    const NEG_INFINITY: &str = "-Infinity";

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Named(String),
    }

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_nan() {
            serializer.serialize_str(NAN)
        } else if *value == f64::INFINITY {
            serializer.serialize_str(INFINITY)
        } else if *value == f64::NEG_INFINITY {
            serializer.serialize_str(NEG_INFINITY)
        } else {
            serializer.serialize_f64(*value)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(value) => Ok(value),
            Repr::Named(name) => match name.as_str() {
                NAN => Ok(f64::NAN),
                INFINITY => Ok(f64::INFINITY),
                NEG_INFINITY => Ok(f64::NEG_INFINITY),
                other => Err(de::Error::invalid_value(
                    de::Unexpected::Str(other),
                    &"a number, \"NaN\", \"Infinity\" or \"-Infinity\"",
                )),
            },
        }
    }
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl Canonical for Value {
    fn canonical_key(&self) -> CanonicalKey {
        match self {
            Value::Null => CanonicalKey::tagged(TAG_NULL, &[]),
            Value::Bool(b) => b.canonical_key(),
            Value::Int(i) => i.canonical_key(),
            Value::Float(f) => {
                let normalized = if f.is_nan() {
                    f64::NAN
                } else if *f == 0.0 {
                    0.0
                } else {
                    *f
                };
                CanonicalKey::tagged(TAG_FLOAT, &normalized.to_bits().to_be_bytes())
            }
            Value::String(s) => s.canonical_key(),
            Value::Bytes(b) => b.canonical_key(),
            Value::Json(json) => json.canonical_key(),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Value::Json(json) => write!(f, "{}", json),
        }
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

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<Bytes> for Value {
    fn from(b: Bytes) -> Self {
        Value::Bytes(b)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        Value::Json(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonical_json_ignores_field_order() {
        let a: serde_json::Value = serde_json::from_str(r#"{"b": 1, "a": [1, 2]}"#).unwrap();
        let b = json!({"a": [1, 2], "b": 1});
        assert!(a.canonical_eq(&b));
    }

    #[test]
    fn test_canonical_distinguishes_types() {
        assert_ne!(Value::Int(1).canonical_key(), Value::String("1".into()).canonical_key());
        assert_ne!(Value::Int(1).canonical_key(), Value::Bool(true).canonical_key());
        assert_ne!(1i64.canonical_key(), 1u64.canonical_key());
    }

    #[test]
    fn test_canonical_value_matches_primitive() {
        assert_eq!(Value::from("key").canonical_key(), "key".canonical_key());
        assert_eq!(Value::Int(42).canonical_key(), 42i32.canonical_key());
        assert_eq!(
            Value::Bytes(Bytes::from_static(b"\x01\x02")).canonical_key(),
            vec![1u8, 2].canonical_key()
        );
    }

    #[test]
    fn test_canonical_float_normalization() {
        assert_eq!(Value::Float(0.0).canonical_key(), Value::Float(-0.0).canonical_key());
        assert_eq!(
            Value::Float(f64::NAN).canonical_key(),
            Value::Float(-f64::NAN).canonical_key()
        );
    }

    #[test]
    fn test_canonical_json_sorts_nested_fields() {
        let value = json!({"b": {"d": 1, "c": "x"}, "a": [{"y": null, "x": true}]});

        assert_eq!(
            value.canonical_key().as_bytes(),
            br#"j{"a":[{"x":true,"y":null}],"b":{"c":"x","d":1}}"#
        );
    }

    #[test]
    fn test_value_float_non_finite_json() {
        for (value, wire) in [
            (f64::INFINITY, json!("Infinity")),
            (f64::NEG_INFINITY, json!("-Infinity")),
            (1.5, json!(1.5)),
        ] {
            let encoded = serde_json::to_value(Value::Float(value)).unwrap();
            assert_eq!(encoded, json!({"type": "float", "value": wire}));
            let decoded: Value = serde_json::from_value(encoded).unwrap();
            assert_eq!(decoded, Value::Float(value));
        }

        let nan = serde_json::to_string(&Value::Float(f64::NAN)).unwrap();
        assert_eq!(nan, r#"{"type":"float","value":"NaN"}"#);
        let decoded: Value = serde_json::from_str(&nan).unwrap();
        assert!(matches!(decoded, Value::Float(x) if x.is_nan()));

        let bogus = serde_json::from_str::<Value>(r#"{"type":"float","value":"nan"}"#);
        assert!(bogus.is_err());
    }

    #[test]
    fn test_canonical_json_record() {
        #[derive(Serialize)]
        struct Record {
            name: &'static str,
            id: u32,
        }

        let key = canonical_json(&Record { name: "x", id: 7 }).unwrap();
        assert_eq!(key, json!({"id": 7, "name": "x"}).canonical_key());
    }
}
