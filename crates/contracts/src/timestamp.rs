//! Reading timestamps.
//!
//! Readings carry their time as text. The SQL timestamp form
//! (`2024-03-01 08:15:00.250`) is canonical; ISO-8601 with a `T` separator and
//! RFC 3339 with an offset are also accepted, the latter normalised to UTC.

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::ContractError;

const SQL_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";
const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Parsed reading time, totally ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(NaiveDateTime);

impl Timestamp {
    /// Wrap an already parsed date-time.
    pub fn from_naive(value: NaiveDateTime) -> Self {
        Self(value)
    }

    /// Underlying naive (UTC) date-time.
    pub fn as_naive(&self) -> NaiveDateTime {
        self.0
    }

    /// Parse any accepted textual form.
    pub fn parse(value: &str) -> Result<Self, ContractError> {
        let trimmed = value.trim();
        NaiveDateTime::parse_from_str(trimmed, SQL_FORMAT)
            .or_else(|_| NaiveDateTime::parse_from_str(trimmed, ISO_FORMAT))
            .or_else(|_| DateTime::parse_from_rfc3339(trimmed).map(|dt| dt.naive_utc()))
            .map(Self)
            .map_err(|e| ContractError::malformed(format!("invalid timestamp '{value}': {e}")))
    }
}

impl FromStr for Timestamp {
    type Err = ContractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(SQL_FORMAT))
    }
}

impl Serialize for Timestamp {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
