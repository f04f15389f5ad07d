//! JSON-like intermediate tree between native arguments and wire bytes.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::{Map, Number, Value as JsonValue};

use crate::error::Result;

/// In-memory wire document.
///
/// Objects keep insertion order; equality on objects ignores order. `Bytes`
/// holds raw binary bodies and serializes to JSON as a base64 string.
#[derive(Debug, Clone)]
pub enum WireDocument {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
    Array(Vec<WireDocument>),
    Object(Vec<(String, WireDocument)>),
}

impl WireDocument {
    /// Empty object.
    pub fn object() -> Self {
        Self::Object(Vec::new())
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, key: impl Into<String>, value: WireDocument) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert or replace an object member. No effect on non-object documents.
    pub fn insert(&mut self, key: impl Into<String>, value: WireDocument) {
        if let Self::Object(members) = self {
            let key = key.into();
            match members.iter_mut().find(|(existing, _)| *existing == key) {
                Some((_, slot)) => *slot = value,
                None => members.push((key, value)),
            }
        }
    }

    /// JSON-ish name of the node kind, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Int(_) | Self::UInt(_) => "integer",
            Self::Double(_) => "number",
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
        }
    }

    pub fn get(&self, key: &str) -> Option<&WireDocument> {
        match self {
            Self::Object(members) => members
                .iter()
                .find(|(existing, _)| existing == key)
                .map(|(_, value)| value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            Self::UInt(value) => i64::try_from(*value).ok(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::UInt(value) => Some(*value),
            Self::Int(value) => u64::try_from(*value).ok(),
            _ => None,
        }
    }

    /// Numeric value of any number node.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Double(value) => Some(*value),
            Self::Int(value) => Some(*value as f64),
            Self::UInt(value) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    /// Raw bytes of a string or bytes node.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::String(value) => Some(value.as_bytes()),
            Self::Bytes(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[WireDocument]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&[(String, WireDocument)]> {
        match self {
            Self::Object(members) => Some(members),
            _ => None,
        }
    }

    pub fn from_json(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(value) => Self::Bool(value),
            JsonValue::Number(number) => from_number(&number),
            JsonValue::String(value) => Self::String(value),
            JsonValue::Array(items) => Self::Array(items.into_iter().map(Self::from_json).collect()),
            JsonValue::Object(members) => Self::Object(
                members
                    .into_iter()
                    .map(|(key, value)| (key, Self::from_json(value)))
                    .collect(),
            ),
        }
    }

    /// Convert to a `serde_json` value. Non-finite doubles become `null`.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Null => JsonValue::Null,
            Self::Bool(value) => JsonValue::Bool(*value),
            Self::Int(value) => JsonValue::Number((*value).into()),
            Self::UInt(value) => JsonValue::Number((*value).into()),
            Self::Double(value) => Number::from_f64(*value)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Self::String(value) => JsonValue::String(value.clone()),
            Self::Bytes(value) => JsonValue::String(STANDARD.encode(value)),
            Self::Array(items) => JsonValue::Array(items.iter().map(Self::to_json).collect()),
            Self::Object(members) => {
                let mut map = Map::with_capacity(members.len());
                for (key, value) in members {
                    map.insert(key.clone(), value.to_json());
                }
                JsonValue::Object(map)
            }
        }
    }

    /// Serialize as JSON text.
    pub fn to_vec(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.to_json())?)
    }

    /// Parse JSON text.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let value: JsonValue = serde_json::from_slice(bytes)?;
        Ok(Self::from_json(value))
    }
}

fn from_number(number: &Number) -> WireDocument {
    if let Some(value) = number.as_i64() {
        WireDocument::Int(value)
    } else if let Some(value) = number.as_u64() {
        WireDocument::UInt(value)
    } else {
        WireDocument::Double(number.as_f64().unwrap_or(f64::NAN))
    }
}

fn integer_value(doc: &WireDocument) -> i128 {
    match doc {
        WireDocument::Int(value) => i128::from(*value),
        WireDocument::UInt(value) => i128::from(*value),
        _ => 0,
    }
}

impl PartialEq for WireDocument {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(_) | Self::UInt(_), Self::Int(_) | Self::UInt(_)) => {
                integer_value(self) == integer_value(other)
            }
            (Self::Double(a), Self::Double(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Bytes(a), Self::Bytes(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => {
                a.len() == b.len() && a.iter().all(|(key, value)| other.get(key) == Some(value))
            }
            _ => false,
        }
    }
}

impl From<JsonValue> for WireDocument {
    fn from(value: JsonValue) -> Self {
        Self::from_json(value)
    }
}

impl From<&WireDocument> for JsonValue {
    fn from(doc: &WireDocument) -> Self {
        doc.to_json()
    }
}

impl fmt::Display for WireDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}
