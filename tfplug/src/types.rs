//! Core type system for tfplug
//!
//! This module provides the value type exchanged with Terraform, the
//! configuration/state maps handed to resources, and diagnostics.

use crate::error::{Result, TfplugError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// msgpack extension type Terraform uses to mark a value as unknown
const UNKNOWN_EXT_TYPE: i8 = 0;

/// Dynamic represents Terraform values that can be of any type
/// Objects and maps are both represented as `Map`
#[derive(Debug, Clone, PartialEq)]
pub enum Dynamic {
    Null,
    Bool(bool),
    /// All numbers are f64 to match Terraform
    Number(f64),
    String(String),
    /// Lists, sets and tuples
    List(Vec<Dynamic>),
    Map(HashMap<String, Dynamic>),
    /// Value not yet known (during planning)
    Unknown,
}

impl Dynamic {
    pub fn as_string(&self) -> Option<&String> {
        match self {
            Dynamic::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Dynamic::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_number().map(|n| n as i64)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Dynamic::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&Vec<Dynamic>> {
        match self {
            Dynamic::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&HashMap<String, Dynamic>> {
        match self {
            Dynamic::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Dynamic::Null)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Dynamic::Unknown)
    }

    pub fn is_known(&self) -> bool {
        !self.is_unknown()
    }

    /// True when neither this value nor anything nested in it is unknown
    pub fn is_fully_known(&self) -> bool {
        match self {
            Dynamic::Unknown => false,
            Dynamic::List(l) => l.iter().all(Dynamic::is_fully_known),
            Dynamic::Map(m) => m.values().all(Dynamic::is_fully_known),
            _ => true,
        }
    }

    /// Replace every unknown, at any depth, with null
    pub fn unknowns_to_null(self) -> Dynamic {
        match self {
            Dynamic::Unknown => Dynamic::Null,
            Dynamic::List(l) => Dynamic::List(l.into_iter().map(Dynamic::unknowns_to_null).collect()),
            Dynamic::Map(m) => Dynamic::Map(
                m.into_iter()
                    .map(|(k, v)| (k, v.unknowns_to_null()))
                    .collect(),
            ),
            other => other,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Dynamic::Null => "null",
            Dynamic::Bool(_) => "bool",
            Dynamic::Number(_) => "number",
            Dynamic::String(_) => "string",
            Dynamic::List(_) => "list",
            Dynamic::Map(_) => "map",
            Dynamic::Unknown => "unknown",
        }
    }

    pub fn string_list<I, S>(items: I) -> Dynamic
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Dynamic::List(
            items
                .into_iter()
                .map(|s| Dynamic::String(s.into()))
                .collect(),
        )
    }

    pub fn string_map<I, K, V>(items: I) -> Dynamic
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Dynamic::Map(
            items
                .into_iter()
                .map(|(k, v)| (k.into(), Dynamic::String(v.into())))
                .collect(),
        )
    }
}

impl From<&str> for Dynamic {
    fn from(s: &str) -> Self {
        Dynamic::String(s.to_string())
    }
}

impl From<String> for Dynamic {
    fn from(s: String) -> Self {
        Dynamic::String(s)
    }
}

impl From<bool> for Dynamic {
    fn from(b: bool) -> Self {
        Dynamic::Bool(b)
    }
}

impl From<i64> for Dynamic {
    fn from(n: i64) -> Self {
        Dynamic::Number(n as f64)
    }
}

impl From<f64> for Dynamic {
    fn from(n: f64) -> Self {
        Dynamic::Number(n)
    }
}

impl<T: Into<Dynamic>> From<Option<T>> for Dynamic {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Dynamic::Null)
    }
}

impl Serialize for Dynamic {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Dynamic::Null => serializer.serialize_unit(),
            Dynamic::Bool(b) => serializer.serialize_bool(*b),
            Dynamic::Number(n) => {
                if n.fract() == 0.0 && *n >= i64::MIN as f64 && *n <= i64::MAX as f64 {
                    serializer.serialize_i64(*n as i64)
                } else {
                    serializer.serialize_f64(*n)
                }
            }
            Dynamic::String(s) => serializer.serialize_str(s),
            Dynamic::List(l) => l.serialize(serializer),
            Dynamic::Map(m) => m.serialize(serializer),
            // rmp_serde writes this newtype as a msgpack extension value
            Dynamic::Unknown => serializer.serialize_newtype_struct(
                rmp_serde::MSGPACK_EXT_STRUCT_NAME,
                &(UNKNOWN_EXT_TYPE, serde_bytes::Bytes::new(&[0])),
            ),
        }
    }
}

impl<'de> Deserialize<'de> for Dynamic {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::{self, Visitor};
        use std::fmt;

        struct DynamicVisitor;

        impl<'de> Visitor<'de> for DynamicVisitor {
            type Value = Dynamic;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a valid Dynamic value")
            }

            fn visit_unit<E: de::Error>(self) -> std::result::Result<Dynamic, E> {
                Ok(Dynamic::Null)
            }

            fn visit_none<E: de::Error>(self) -> std::result::Result<Dynamic, E> {
                Ok(Dynamic::Null)
            }

            fn visit_some<D>(self, deserializer: D) -> std::result::Result<Dynamic, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                Dynamic::deserialize(deserializer)
            }

            fn visit_bool<E: de::Error>(self, value: bool) -> std::result::Result<Dynamic, E> {
                Ok(Dynamic::Bool(value))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> std::result::Result<Dynamic, E> {
                Ok(Dynamic::Number(value as f64))
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> std::result::Result<Dynamic, E> {
                Ok(Dynamic::Number(value as f64))
            }

            fn visit_f64<E: de::Error>(self, value: f64) -> std::result::Result<Dynamic, E> {
                Ok(Dynamic::Number(value))
            }

            fn visit_str<E: de::Error>(self, value: &str) -> std::result::Result<Dynamic, E> {
                Ok(Dynamic::String(value.to_string()))
            }

            fn visit_string<E: de::Error>(self, value: String) -> std::result::Result<Dynamic, E> {
                Ok(Dynamic::String(value))
            }

            // rmp_serde hands msgpack extension values to this method as an
            // (i8, bytes) tuple
            fn visit_newtype_struct<D>(
                self,
                deserializer: D,
            ) -> std::result::Result<Dynamic, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let (ext_type, _data): (i8, serde_bytes::ByteBuf) =
                    Deserialize::deserialize(deserializer)?;
                if ext_type == UNKNOWN_EXT_TYPE {
                    Ok(Dynamic::Unknown)
                } else {
                    Err(de::Error::custom(format!(
                        "unsupported msgpack extension type {}",
                        ext_type
                    )))
                }
            }

            fn visit_seq<V>(self, mut seq: V) -> std::result::Result<Dynamic, V::Error>
            where
                V: de::SeqAccess<'de>,
            {
                let mut vec = Vec::new();
                while let Some(elem) = seq.next_element()? {
                    vec.push(elem);
                }
                Ok(Dynamic::List(vec))
            }

            fn visit_map<V>(self, mut map: V) -> std::result::Result<Dynamic, V::Error>
            where
                V: de::MapAccess<'de>,
            {
                let mut hashmap = HashMap::new();
                while let Some((key, value)) = map.next_entry::<String, Dynamic>()? {
                    hashmap.insert(key, value);
                }
                Ok(Dynamic::Map(hashmap))
            }
        }

        deserializer.deserialize_any(DynamicVisitor)
    }
}

/// Wire encoding helpers. Terraform sends msgpack by default and JSON for
/// stored state.
pub fn decode_msgpack(data: &[u8]) -> Result<Dynamic> {
    if data.is_empty() {
        return Ok(Dynamic::Null);
    }
    rmp_serde::from_slice(data)
        .map_err(|e| TfplugError::DecodingError(format!("msgpack decoding failed: {}", e)))
}

pub fn encode_msgpack(value: &Dynamic) -> Result<Vec<u8>> {
    rmp_serde::to_vec_named(value)
        .map_err(|e| TfplugError::EncodingError(format!("msgpack encoding failed: {}", e)))
}

pub fn decode_json(data: &[u8]) -> Result<Dynamic> {
    if data.is_empty() {
        return Ok(Dynamic::Null);
    }
    serde_json::from_slice(data)
        .map_err(|e| TfplugError::DecodingError(format!("json decoding failed: {}", e)))
}

macro_rules! attribute_values {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq)]
        pub struct $name {
            pub values: HashMap<String, Dynamic>,
        }

        impl $name {
            pub fn new() -> Self {
                Self::default()
            }

            /// Build from a decoded object value; null or non-object values
            /// produce an empty map
            pub fn from_dynamic(value: Dynamic) -> Self {
                match value {
                    Dynamic::Map(values) => Self { values },
                    _ => Self::default(),
                }
            }

            pub fn into_dynamic(self) -> Dynamic {
                Dynamic::Map(self.values)
            }

            pub fn get(&self, name: &str) -> Option<&Dynamic> {
                self.values.get(name)
            }

            /// True when the attribute is present and not yet known
            pub fn is_unknown(&self, name: &str) -> bool {
                self.values.get(name).is_some_and(Dynamic::is_unknown)
            }

            /// Known, non-null string value
            pub fn get_string(&self, name: &str) -> Option<String> {
                self.values
                    .get(name)
                    .and_then(|v| v.as_string())
                    .cloned()
            }

            pub fn get_i64(&self, name: &str) -> Option<i64> {
                self.values.get(name).and_then(|v| v.as_i64())
            }

            pub fn get_bool(&self, name: &str) -> Option<bool> {
                self.values.get(name).and_then(|v| v.as_bool())
            }

            pub fn get_string_list(&self, name: &str) -> Option<Vec<String>> {
                self.values.get(name).and_then(|v| v.as_list()).map(|items| {
                    items
                        .iter()
                        .filter_map(|i| i.as_string().cloned())
                        .collect()
                })
            }

            pub fn get_string_map(&self, name: &str) -> Option<HashMap<String, String>> {
                self.values.get(name).and_then(|v| v.as_map()).map(|items| {
                    items
                        .iter()
                        .filter_map(|(k, v)| v.as_string().map(|s| (k.clone(), s.clone())))
                        .collect()
                })
            }

            /// Elements of a list of objects, each as its own attribute map
            pub fn get_object_list(&self, name: &str) -> Option<Vec<$name>> {
                self.values.get(name).and_then(|v| v.as_list()).map(|items| {
                    items
                        .iter()
                        .filter_map(|i| i.as_map().cloned())
                        .map(|values| $name { values })
                        .collect()
                })
            }

            pub fn set(&mut self, name: &str, value: impl Into<Dynamic>) {
                self.values.insert(name.to_string(), value.into());
            }

            pub fn set_string(&mut self, name: &str, value: impl Into<String>) {
                self.set(name, Dynamic::String(value.into()));
            }

            pub fn set_i64(&mut self, name: &str, value: i64) {
                self.set(name, Dynamic::from(value));
            }

            pub fn set_bool(&mut self, name: &str, value: bool) {
                self.set(name, Dynamic::Bool(value));
            }

            pub fn set_string_list<I, S>(&mut self, name: &str, items: I)
            where
                I: IntoIterator<Item = S>,
                S: Into<String>,
            {
                self.set(name, Dynamic::string_list(items));
            }

            pub fn set_string_map<I, K, V>(&mut self, name: &str, items: I)
            where
                I: IntoIterator<Item = (K, V)>,
                K: Into<String>,
                V: Into<String>,
            {
                self.set(name, Dynamic::string_map(items));
            }

            pub fn set_null(&mut self, name: &str) {
                self.set(name, Dynamic::Null);
            }
        }
    };
}

attribute_values!(
    /// Config represents configuration values
    Config
);

attribute_values!(
    /// State represents resource and data source state values
    State
);

impl From<Config> for State {
    fn from(config: Config) -> Self {
        State {
            values: config.values,
        }
    }
}

/// Diagnostic represents a warning or error reported back to Terraform
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub summary: String,
    pub detail: Option<String>,
    /// Top-level attribute the diagnostic refers to
    pub attribute: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, summary: impl Into<String>, detail: Option<impl Into<String>>) {
        self.errors.push(Diagnostic {
            summary: summary.into(),
            detail: detail.map(Into::into),
            attribute: None,
        });
    }

    pub fn add_warning(&mut self, summary: impl Into<String>, detail: Option<impl Into<String>>) {
        self.warnings.push(Diagnostic {
            summary: summary.into(),
            detail: detail.map(Into::into),
            attribute: None,
        });
    }

    pub fn add_attribute_error(
        &mut self,
        attribute: &str,
        summary: impl Into<String>,
        detail: Option<impl Into<String>>,
    ) {
        self.errors.push(Diagnostic {
            summary: summary.into(),
            detail: detail.map(Into::into),
            attribute: Some(attribute.to_string()),
        });
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_round_trips_through_msgpack_extension() {
        let mut values = HashMap::new();
        values.insert("id".to_string(), Dynamic::Unknown);
        values.insert("name".to_string(), Dynamic::from("tf-clb"));

        let bytes = encode_msgpack(&Dynamic::Map(values.clone())).unwrap();
        assert!(bytes.windows(3).any(|w| w == [0xd4, 0x00, 0x00]));

        let decoded = decode_msgpack(&bytes).unwrap();
        assert_eq!(decoded, Dynamic::Map(values));
    }

    #[test]
    fn decodes_terraform_unknown_marker() {
        // {"id": <unknown>} as Terraform encodes it
        let bytes = [0x81, 0xa2, b'i', b'd', 0xd4, 0x00, 0x00];
        let decoded = decode_msgpack(&bytes).unwrap();
        let map = decoded.as_map().unwrap();
        assert!(map["id"].is_unknown());
    }

    #[test]
    fn empty_and_nil_payloads_decode_to_null() {
        assert!(decode_msgpack(&[]).unwrap().is_null());
        assert!(decode_msgpack(&[0xc0]).unwrap().is_null());
    }

    #[test]
    fn integral_numbers_encode_as_integers() {
        let bytes = encode_msgpack(&Dynamic::Number(80.0)).unwrap();
        assert_eq!(bytes, vec![80]);
        let bytes = encode_msgpack(&Dynamic::Number(1.5)).unwrap();
        assert_eq!(bytes[0], 0xcb);
    }

    #[test]
    fn typed_getters_skip_null_and_unknown() {
        let mut state = State::new();
        state.set_string("name", "web");
        state.set_null("vpc_id");
        state.set("subnet_id", Dynamic::Unknown);
        state.set_i64("project_id", 7);
        state.set_string_map("tags", [("env", "prod")]);

        assert_eq!(state.get_string("name"), Some("web".to_string()));
        assert_eq!(state.get_string("vpc_id"), None);
        assert_eq!(state.get_string("subnet_id"), None);
        assert!(state.is_unknown("subnet_id"));
        assert_eq!(state.get_i64("project_id"), Some(7));
        assert_eq!(
            state.get_string_map("tags").unwrap().get("env"),
            Some(&"prod".to_string())
        );
    }

    #[test]
    fn unknowns_to_null_reaches_nested_values() {
        let value = Dynamic::List(vec![Dynamic::Map(HashMap::from([(
            "a".to_string(),
            Dynamic::Unknown,
        )]))]);
        assert!(!value.is_fully_known());
        let cleaned = value.unknowns_to_null();
        assert!(cleaned.is_fully_known());
    }

    #[test]
    fn diagnostics_collect_errors_and_warnings() {
        let mut diags = Diagnostics::new();
        diags.add_warning("careful", None::<String>);
        assert!(!diags.has_errors());
        diags.add_attribute_error("port", "bad port", Some("must be positive"));
        assert!(diags.has_errors());
        assert_eq!(diags.errors[0].attribute.as_deref(), Some("port"));
    }
}
