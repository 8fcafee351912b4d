//! DwellWindow / AppearanceRecord - Condenser state and output

use serde::{Deserialize, Serialize};

use crate::{LocationId, Sighting, TagId, Timestamp, WindowKey};

/// Open dwell interval for one window key
///
/// The first sighting is fixed for the window's lifetime; the last one is
/// overwritten by every later sighting with the same key. A window seen once
/// has no separate last sighting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DwellWindow {
    first: Sighting,
    last: Option<Sighting>,
}

impl DwellWindow {
    /// Open a window on its first sighting
    pub fn open(first: Sighting) -> Self {
        Self { first, last: None }
    }

    /// Record a later sighting with the same key
    pub fn extend(&mut self, sighting: Sighting) {
        self.last = Some(sighting);
    }

    /// Window key
    pub fn key(&self) -> &WindowKey {
        &self.first.key
    }

    /// First sighting
    pub fn first(&self) -> &Sighting {
        &self.first
    }

    /// Last sighting, which is the first one for single-sighting windows
    pub fn last(&self) -> &Sighting {
        self.last.as_ref().unwrap_or(&self.first)
    }

    /// Whether only the opening sighting has been seen
    pub fn is_single_sighting(&self) -> bool {
        self.last.is_none()
    }

    /// Close the window into a record carrying the given sequence number
    pub fn close(self, sequence: u64) -> AppearanceRecord {
        let end = self.last().timestamp;
        AppearanceRecord {
            sequence,
            subject: self.first.key.object_id,
            location: self.first.key.reader_id,
            start: self.first.timestamp,
            end,
        }
    }
}

/// Closed dwell interval handed to sinks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppearanceRecord {
    /// Session-scoped, strictly increasing record number
    pub sequence: u64,
    /// Object (tag) id
    pub subject: TagId,
    /// Reader / location id
    pub location: LocationId,
    /// Timestamp of the first sighting
    pub start: Timestamp,
    /// Timestamp of the last sighting
    pub end: Timestamp,
}

impl AppearanceRecord {
    /// Window key this record was derived from
    pub fn key(&self) -> WindowKey {
        WindowKey::new(self.subject.clone(), self.location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Reading;

    fn sighting(object: &str, reader: LocationId, ts: &str) -> Sighting {
        Sighting {
            key: WindowKey::new(object, reader),
            timestamp: Timestamp::parse(ts).unwrap(),
            reading: Reading::new(),
        }
    }

    #[test]
    fn test_single_sighting_closes_with_equal_bounds() {
        let window = DwellWindow::open(sighting("A", 1, "2024-01-01 00:00:01"));
        assert!(window.is_single_sighting());

        let record = window.close(1);
        assert_eq!(record.start, record.end);
        assert_eq!(record.subject, "A");
        assert_eq!(record.location, 1);
    }

    #[test]
    fn test_extend_only_moves_the_end() {
        let mut window = DwellWindow::open(sighting("A", 1, "2024-01-01 00:00:01"));
        window.extend(sighting("A", 1, "2024-01-01 00:00:02"));
        window.extend(sighting("A", 1, "2024-01-01 00:00:05"));

        let record = window.close(9);
        assert_eq!(record.sequence, 9);
        assert_eq!(record.start.to_string(), "2024-01-01 00:00:01");
        assert_eq!(record.end.to_string(), "2024-01-01 00:00:05");
        assert_eq!(record.key(), WindowKey::new("A", 1));
    }
}
