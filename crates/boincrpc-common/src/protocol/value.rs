use std::fmt;

use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

pub type Mapping = IndexMap<String, StructuredValue>;

/// In-memory form of an XML fragment exchanged with the daemon.
///
/// A child tag that occurs once under its parent maps to a single value; a tag
/// that occurs several times maps to a [`StructuredValue::Sequence`] holding
/// the occurrences in document order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StructuredValue {
    /// Self-closing element (`<tag/>`). Distinct from a key being absent.
    #[default]
    Empty,
    /// Text content.
    Scalar(String),
    /// Child elements keyed by tag name, in document order.
    Mapping(Mapping),
    /// Repeated sibling elements sharing one tag name.
    Sequence(Vec<StructuredValue>),
}

impl StructuredValue {
    pub fn mapping() -> Self {
        StructuredValue::Mapping(Mapping::new())
    }

    pub fn scalar(text: impl Into<String>) -> Self {
        StructuredValue::Scalar(text.into())
    }

    /// Builds `{key: value}`.
    pub fn single(key: impl Into<String>, value: StructuredValue) -> Self {
        let mut map = Mapping::with_capacity(1);
        map.insert(key.into(), value);
        StructuredValue::Mapping(map)
    }

    pub fn is_empty_element(&self) -> bool {
        matches!(self, StructuredValue::Empty)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            StructuredValue::Scalar(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            StructuredValue::Mapping(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[StructuredValue]> {
        match self {
            StructuredValue::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// Looks up a key when this value is a mapping.
    pub fn get(&self, key: &str) -> Option<&StructuredValue> {
        self.as_mapping().and_then(|map| map.get(key))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Removes and returns a key when this value is a mapping, keeping the
    /// order of the remaining entries.
    pub fn take(&mut self, key: &str) -> Option<StructuredValue> {
        match self {
            StructuredValue::Mapping(map) => map.shift_remove(key),
            _ => None,
        }
    }

    /// Adds a sibling element under `key`.
    ///
    /// The first occurrence is stored as-is; later occurrences turn the entry
    /// into a sequence at the position of the first one. Returns `false` when
    /// this value is not a mapping.
    pub fn push_child(&mut self, key: impl Into<String>, value: StructuredValue) -> bool {
        let StructuredValue::Mapping(map) = self else {
            return false;
        };

        match map.entry(key.into()) {
            indexmap::map::Entry::Vacant(slot) => {
                slot.insert(value);
            }
            indexmap::map::Entry::Occupied(mut slot) => match slot.get_mut() {
                StructuredValue::Sequence(items) => items.push(value),
                existing => {
                    let first = std::mem::replace(existing, StructuredValue::Empty);
                    *existing = StructuredValue::Sequence(vec![first, value]);
                }
            },
        }
        true
    }
}

impl From<&str> for StructuredValue {
    fn from(text: &str) -> Self {
        StructuredValue::Scalar(text.to_string())
    }
}

impl From<String> for StructuredValue {
    fn from(text: String) -> Self {
        StructuredValue::Scalar(text)
    }
}

impl From<Mapping> for StructuredValue {
    fn from(map: Mapping) -> Self {
        StructuredValue::Mapping(map)
    }
}

impl From<Vec<StructuredValue>> for StructuredValue {
    fn from(items: Vec<StructuredValue>) -> Self {
        StructuredValue::Sequence(items)
    }
}

impl<K: Into<String>> FromIterator<(K, StructuredValue)> for StructuredValue {
    fn from_iter<I: IntoIterator<Item = (K, StructuredValue)>>(iter: I) -> Self {
        StructuredValue::Mapping(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl Serialize for StructuredValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            StructuredValue::Empty => serializer.serialize_none(),
            StructuredValue::Scalar(text) => serializer.serialize_str(text),
            StructuredValue::Mapping(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (key, value) in map {
                    out.serialize_entry(key, value)?;
                }
                out.end()
            }
            StructuredValue::Sequence(items) => {
                let mut out = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    out.serialize_element(item)?;
                }
                out.end()
            }
        }
    }
}

/// Compact JSON rendering, used in error messages and logs.
impl fmt::Display for StructuredValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}
