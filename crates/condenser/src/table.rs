//! CondensationTable - open dwell windows keyed by (object, reader)

use contracts::{DwellWindow, Sighting, WindowKey};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Concurrent map of open windows
///
/// The ingest path and the flush path touch it from different tasks; every
/// operation is safe without an external lock.
#[derive(Debug, Default)]
pub struct CondensationTable {
    windows: DashMap<WindowKey, DwellWindow>,
}

impl CondensationTable {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply the update rule; returns true when a new window was opened
    pub fn observe(&self, sighting: Sighting) -> bool {
        match self.windows.entry(sighting.key.clone()) {
            Entry::Occupied(mut open) => {
                open.get_mut().extend(sighting);
                false
            }
            Entry::Vacant(slot) => {
                slot.insert(DwellWindow::open(sighting));
                true
            }
        }
    }

    /// Remove and return a window
    pub fn take(&self, key: &WindowKey) -> Option<DwellWindow> {
        self.windows.remove(key).map(|(_, window)| window)
    }

    /// Snapshot of the current keys
    pub fn keys(&self) -> Vec<WindowKey> {
        self.windows.iter().map(|e| e.key().clone()).collect()
    }

    /// Copy of one window
    pub fn get(&self, key: &WindowKey) -> Option<DwellWindow> {
        self.windows.get(key).map(|w| w.clone())
    }

    pub fn contains(&self, key: &WindowKey) -> bool {
        self.windows.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{Reading, Timestamp};

    fn sighting(object: &str, reader: i64, ts: &str) -> Sighting {
        Sighting {
            key: WindowKey::new(object, reader),
            timestamp: Timestamp::parse(ts).unwrap(),
            reading: Reading::new(),
        }
    }

    #[test]
    fn test_first_reading_is_fixed() {
        let table = CondensationTable::new();
        assert!(table.observe(sighting("A", 1, "2024-01-01 00:00:01")));
        assert!(!table.observe(sighting("A", 1, "2024-01-01 00:00:02")));
        assert!(!table.observe(sighting("A", 1, "2024-01-01 00:00:03")));

        let window = table.get(&WindowKey::new("A", 1)).unwrap();
        assert_eq!(window.first().timestamp.to_string(), "2024-01-01 00:00:01");
        assert_eq!(window.last().timestamp.to_string(), "2024-01-01 00:00:03");
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_keys_are_independent() {
        let table = CondensationTable::new();
        table.observe(sighting("A", 1, "2024-01-01 00:00:01"));
        table.observe(sighting("A", 2, "2024-01-01 00:00:02"));
        table.observe(sighting("B", 1, "2024-01-01 00:00:03"));
        assert_eq!(table.len(), 3);

        let mut keys = table.keys();
        keys.sort();
        assert_eq!(
            keys,
            vec![WindowKey::new("A", 1), WindowKey::new("A", 2), WindowKey::new("B", 1)]
        );
    }

    #[test]
    fn test_take_removes_once() {
        let table = CondensationTable::new();
        table.observe(sighting("A", 1, "2024-01-01 00:00:01"));
        let key = WindowKey::new("A", 1);

        assert!(table.take(&key).is_some());
        assert!(table.take(&key).is_none());
        assert!(!table.contains(&key));
        assert!(table.is_empty());
    }

    #[test]
    fn test_concurrent_observe() {
        let table = std::sync::Arc::new(CondensationTable::new());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let table = table.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        table.observe(sighting(&format!("T{t}"), i % 5, "2024-01-01 00:00:01"));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(table.len(), 20);
    }
}
