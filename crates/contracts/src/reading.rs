//! Reading - Ingestion input
//!
//! A raw reading is an attribute map; binding it to a [`crate::StreamSchema`]
//! yields a [`Sighting`] with its window key and parsed timestamp.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::{TagId, Timestamp};

/// Reader (location) identifier
pub type LocationId = i64;

/// Raw reading: attribute name -> value
///
/// Attribute names are upper-cased on insertion so they match the
/// case-normalised schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reading {
    attributes: BTreeMap<String, String>,
}

impl Reading {
    /// Create an empty reading
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from name/value pairs
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut reading = Self::new();
        for (name, value) in pairs {
            reading.insert(name.as_ref(), value);
        }
        reading
    }

    /// Insert or replace an attribute
    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        self.attributes.insert(name.to_uppercase(), value.into());
    }

    /// Look up an attribute by (upper-case) name
    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Whether the attribute is present
    pub fn contains(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Number of attributes
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Whether the reading has no attributes
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Iterate attributes in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (idx, (name, value)) in self.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name}={value}")?;
        }
        write!(f, "}}")
    }
}

/// Identity of a dwell window: (object, reader)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WindowKey {
    /// Object (tag) id
    pub object_id: TagId,
    /// Reader id, which is also the location id
    pub reader_id: LocationId,
}

impl WindowKey {
    /// Create a new key
    pub fn new(object_id: impl Into<TagId>, reader_id: LocationId) -> Self {
        Self {
            object_id: object_id.into(),
            reader_id,
        }
    }
}

impl fmt::Display for WindowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{}]", self.object_id, self.reader_id)
    }
}

/// A reading bound to a schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sighting {
    /// Window this reading belongs to
    pub key: WindowKey,
    /// Parsed timestamp attribute
    pub timestamp: Timestamp,
    /// Original attributes, auxiliary ones included
    pub reading: Reading,
}
