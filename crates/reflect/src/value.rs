//! The dynamic value model consumed by the encoder.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use indexmap::IndexMap;
use serde_json::Value;

use crate::error::ReflectError;

/// An in-memory message value.
///
/// Message values are [`Map`](ProtoValue::Map)s keyed by field name;
/// repeated fields are [`List`](ProtoValue::List)s. JSON crosses the
/// boundary losslessly except for `bytes`, which JSON carries as a
/// standard-alphabet base64 string.
#[derive(Debug, Clone, PartialEq)]
pub enum ProtoValue {
    /// Explicit absence; skipped by the message encoder.
    Null,
    Bool(bool),
    I64(i64),
    U64(u64),
    F64(f64),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<ProtoValue>),
    Map(IndexMap<String, ProtoValue>),
}

impl ProtoValue {
    pub fn as_map(&self) -> Option<&IndexMap<String, ProtoValue>> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[ProtoValue]> {
        match self {
            Self::List(l) => Some(l),
            _ => None,
        }
    }

    /// Coerces a numeric value to `i64`.
    pub fn to_i64(&self, context: &str) -> Result<i64, ReflectError> {
        match self {
            Self::I64(n) => Ok(*n),
            Self::U64(n) if *n <= i64::MAX as u64 => Ok(*n as i64),
            Self::F64(f)
                if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64 =>
            {
                Ok(*f as i64)
            }
            _ => Err(ReflectError::ValueType {
                context: context.to_string(),
                expected: "integer",
            }),
        }
    }

    /// Coerces a non-negative numeric value to `u64`.
    pub fn to_u64(&self, context: &str) -> Result<u64, ReflectError> {
        match self {
            Self::U64(n) => Ok(*n),
            Self::I64(n) if *n >= 0 => Ok(*n as u64),
            Self::F64(f) if f.fract() == 0.0 && *f >= 0.0 && *f <= u64::MAX as f64 => {
                Ok(*f as u64)
            }
            _ => Err(ReflectError::ValueType {
                context: context.to_string(),
                expected: "unsigned integer",
            }),
        }
    }

    /// Coerces a numeric value to `f64`.
    pub fn to_f64(&self, context: &str) -> Result<f64, ReflectError> {
        match self {
            Self::F64(f) => Ok(*f),
            Self::I64(n) => Ok(*n as f64),
            Self::U64(n) => Ok(*n as f64),
            _ => Err(ReflectError::ValueType {
                context: context.to_string(),
                expected: "number",
            }),
        }
    }

    /// Coerces to `bool`; integer 0/1 are accepted.
    pub fn to_bool(&self, context: &str) -> Result<bool, ReflectError> {
        match self {
            Self::Bool(b) => Ok(*b),
            Self::I64(0) | Self::U64(0) => Ok(false),
            Self::I64(1) | Self::U64(1) => Ok(true),
            _ => Err(ReflectError::ValueType {
                context: context.to_string(),
                expected: "bool",
            }),
        }
    }

    /// Coerces to a byte vector. Strings decode as base64 first, falling
    /// back to their raw UTF-8 bytes; lists of integers are taken bytewise.
    pub fn to_bytes(&self, context: &str) -> Result<Vec<u8>, ReflectError> {
        match self {
            Self::Bytes(b) => Ok(b.clone()),
            Self::Str(s) => Ok(BASE64.decode(s).unwrap_or_else(|_| s.as_bytes().to_vec())),
            Self::List(items) => items
                .iter()
                .map(|v| {
                    v.to_u64(context).and_then(|n| {
                        u8::try_from(n).map_err(|_| ReflectError::ValueType {
                            context: context.to_string(),
                            expected: "byte",
                        })
                    })
                })
                .collect(),
            _ => Err(ReflectError::ValueType {
                context: context.to_string(),
                expected: "bytes",
            }),
        }
    }

    /// Converts to JSON. Bytes become base64 strings; map iteration order
    /// is preserved.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::I64(n) => Value::from(*n),
            Self::U64(n) => Value::from(*n),
            Self::F64(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Self::Str(s) => Value::String(s.clone()),
            Self::Bytes(b) => Value::String(BASE64.encode(b)),
            Self::List(items) => Value::Array(items.iter().map(|v| v.to_json()).collect()),
            Self::Map(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

impl From<&Value> for ProtoValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::I64(i)
                } else if let Some(u) = n.as_u64() {
                    Self::U64(u)
                } else {
                    Self::F64(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(s) => Self::Str(s.clone()),
            Value::Array(items) => Self::List(items.iter().map(Self::from).collect()),
            Value::Object(entries) => Self::Map(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), Self::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<Value> for ProtoValue {
    fn from(value: Value) -> Self {
        Self::from(&value)
    }
}
