//! StreamSchema - parsed stream descriptor
//!
//! A descriptor names a stream and its attributes:
//!
//! ```text
//! STREAM rfid_stream (license_plate varchar # location_id integer # reading_ts timestamp # speed double)
//! ```
//!
//! The first three attributes are, positionally, the object id, the reader id
//! and the timestamp. Names and types are upper-cased on parse.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::{
    ContractError, LocationId, Reading, Sighting, TagId, Timestamp, WindowKey, END_SENTINEL,
    QUIT_SENTINEL,
};

const STREAM_KEYWORD: &str = "STREAM";

/// One declared attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDef {
    /// Upper-cased attribute name
    pub name: String,
    /// Upper-cased declared type (free-form, e.g. `VARCHAR(20)`)
    pub attr_type: String,
}

/// Parsed, immutable stream descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSchema {
    stream: String,
    attributes: Vec<AttributeDef>,
}

impl StreamSchema {
    /// Parse a descriptor string.
    ///
    /// # Errors
    /// [`ContractError::Schema`] when the descriptor is malformed or declares
    /// fewer than three attributes.
    pub fn parse(descriptor: &str) -> Result<Self, ContractError> {
        let fail = |message: &str| ContractError::schema(descriptor, message);
        let text = descriptor.trim();

        let open = text.find('(').ok_or_else(|| fail("missing '('"))?;
        if !text.ends_with(')') {
            return Err(fail("descriptor must end with ')'"));
        }

        let mut header = text[..open].split_whitespace();
        match header.next() {
            Some(kw) if kw.eq_ignore_ascii_case(STREAM_KEYWORD) => {}
            _ => return Err(fail("descriptor must start with STREAM")),
        }
        let stream = header
            .next()
            .ok_or_else(|| fail("missing stream name"))?
            .to_uppercase();
        if header.next().is_some() {
            return Err(fail("unexpected tokens before '('"));
        }
        if stream.contains('"') {
            return Err(fail("stream name must not contain quotes"));
        }

        let body = &text[open + 1..text.len() - 1];
        let mut attributes = Vec::new();
        let mut seen = HashSet::new();
        for (idx, entry) in body.split('#').enumerate() {
            let mut tokens = entry.split_whitespace();
            let name = tokens
                .next()
                .ok_or_else(|| fail(&format!("attribute #{} is empty", idx + 1)))?
                .to_uppercase();
            let attr_type = tokens.collect::<Vec<_>>().join(" ").to_uppercase();
            if attr_type.is_empty() {
                return Err(fail(&format!("attribute '{name}' has no type")));
            }
            if name.contains('"') {
                return Err(fail(&format!("attribute '{name}' must not contain quotes")));
            }
            if name == QUIT_SENTINEL || name == END_SENTINEL {
                return Err(fail(&format!("attribute '{name}' collides with a sentinel")));
            }
            if !seen.insert(name.clone()) {
                return Err(fail(&format!("duplicate attribute '{name}'")));
            }
            attributes.push(AttributeDef { name, attr_type });
        }

        if attributes.len() < 3 {
            return Err(fail(
                "at least three attributes required (object id, reader id, timestamp)",
            ));
        }

        Ok(Self { stream, attributes })
    }

    /// Stream (table) name
    pub fn stream(&self) -> &str {
        &self.stream
    }

    /// All declared attributes, mandatory ones first
    pub fn attributes(&self) -> &[AttributeDef] {
        &self.attributes
    }

    /// Auxiliary attributes (everything after the first three)
    pub fn auxiliary(&self) -> &[AttributeDef] {
        &self.attributes[3..]
    }

    /// Object id attribute name
    pub fn object_attr(&self) -> &str {
        &self.attributes[0].name
    }

    /// Reader id attribute name
    pub fn reader_attr(&self) -> &str {
        &self.attributes[1].name
    }

    /// Timestamp attribute name
    pub fn time_attr(&self) -> &str {
        &self.attributes[2].name
    }

    /// Bind a raw reading to this schema.
    ///
    /// # Errors
    /// [`ContractError::MalformedReading`] if a mandatory attribute is missing,
    /// the reader id is not an integer or the timestamp does not parse.
    pub fn bind(&self, reading: Reading) -> Result<Sighting, ContractError> {
        let object = self.required(&reading, self.object_attr())?;
        let reader = self.required(&reading, self.reader_attr())?;
        let time = self.required(&reading, self.time_attr())?;

        let location: LocationId = reader.trim().parse().map_err(|_| {
            ContractError::malformed(format!(
                "reader id '{}' in attribute {} is not an integer",
                reader,
                self.reader_attr()
            ))
        })?;
        let timestamp = Timestamp::parse(time)?;
        let key = WindowKey::new(TagId::new(object), location);

        Ok(Sighting {
            key,
            timestamp,
            reading,
        })
    }

    fn required<'r>(&self, reading: &'r Reading, attr: &str) -> Result<&'r str, ContractError> {
        reading.get(attr).ok_or_else(|| {
            ContractError::malformed(format!(
                "reading on stream {} is missing attribute {}",
                self.stream, attr
            ))
        })
    }
}

impl FromStr for StreamSchema {
    type Err = ContractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for StreamSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} (", STREAM_KEYWORD, self.stream)?;
        for (idx, attr) in self.attributes.iter().enumerate() {
            if idx > 0 {
                write!(f, " # ")?;
            }
            write!(f, "{} {}", attr.name, attr.attr_type)?;
        }
        write!(f, ")")
    }
}
