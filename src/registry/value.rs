/// Tagged property values as reported by the platform registry
///
/// Registry property bags are heterogeneous: strings, variant-typed numbers,
/// booleans, raw data and nested dictionaries. Every accessor here is total;
/// a missing key or a value of the wrong kind yields `None` rather than an
/// error, because absence is the normal case for optional sources.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Numeric encodings a registry number can carry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PropertyNumber {
    #[serde(rename = "sint8")]
    SInt8(i8),
    #[serde(rename = "sint16")]
    SInt16(i16),
    #[serde(rename = "sint32")]
    SInt32(i32),
    #[serde(rename = "sint64")]
    SInt64(i64),
    #[serde(rename = "int")]
    Int(i32),
    #[serde(rename = "long_long")]
    LongLong(i64),
    #[serde(rename = "float32")]
    Float32(f32),
    #[serde(rename = "float64")]
    Float64(f64),
}

impl PropertyNumber {
    /// Byte count for capacity fields.
    ///
    /// Only the 64-bit signed and long-long encodings are accepted. Every
    /// other encoding, and negative values, yield `None`.
    pub fn as_byte_count(&self) -> Option<u64> {
        match *self {
            PropertyNumber::SInt64(v) | PropertyNumber::LongLong(v) => u64::try_from(v).ok(),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            PropertyNumber::SInt8(_) => "sint8",
            PropertyNumber::SInt16(_) => "sint16",
            PropertyNumber::SInt32(_) => "sint32",
            PropertyNumber::SInt64(_) => "sint64",
            PropertyNumber::Int(_) => "int",
            PropertyNumber::LongLong(_) => "long_long",
            PropertyNumber::Float32(_) => "float32",
            PropertyNumber::Float64(_) => "float64",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyValue {
    String(String),
    Number(PropertyNumber),
    Bool(bool),
    Bytes(#[serde(with = "hex_bytes")] Vec<u8>),
    Map(PropertyBag),
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::String(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

impl From<PropertyNumber> for PropertyValue {
    fn from(value: PropertyNumber) -> Self {
        PropertyValue::Number(value)
    }
}

impl From<Vec<u8>> for PropertyValue {
    fn from(value: Vec<u8>) -> Self {
        PropertyValue::Bytes(value)
    }
}

impl From<PropertyBag> for PropertyValue {
    fn from(value: PropertyBag) -> Self {
        PropertyValue::Map(value)
    }
}

/// Key/value property dictionary of one registry object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyBag {
    entries: BTreeMap<String, PropertyValue>,
}

impl PropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: &str, value: impl Into<PropertyValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<PropertyValue>) {
        self.entries.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.entries.get(key)
    }

    pub fn get_string(&self, key: &str) -> Option<&str> {
        match self.get(key)? {
            PropertyValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn get_number(&self, key: &str) -> Option<PropertyNumber> {
        match self.get(key)? {
            PropertyValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get(key)? {
            PropertyValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn get_bytes(&self, key: &str) -> Option<&[u8]> {
        match self.get(key)? {
            PropertyValue::Bytes(b) => Some(b.as_slice()),
            _ => None,
        }
    }

    pub fn get_map(&self, key: &str) -> Option<&PropertyBag> {
        match self.get(key)? {
            PropertyValue::Map(m) => Some(m),
            _ => None,
        }
    }

    /// String stored under `map_key` -> `key`.
    pub fn get_nested_string(&self, map_key: &str, key: &str) -> Option<&str> {
        self.get_map(map_key)?.get_string(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, PropertyValue)> for PropertyBag {
    fn from_iter<T: IntoIterator<Item = (String, PropertyValue)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Raw data values travel as hex strings in snapshots.
pub(crate) mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        hex::decode(text.trim()).map_err(serde::de::Error::custom)
    }
}

/// Identify text fields travel as plain strings in snapshots.
pub(crate) mod ascii_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&String::from_utf8_lossy(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        Ok(String::deserialize(deserializer)?.into_bytes())
    }
}
