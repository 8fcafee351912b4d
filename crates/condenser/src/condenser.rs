//! Condenser - decides which open windows to close and hands them to the sink

use std::sync::Arc;

use contracts::{AppearanceSink, FlushReport, Sighting, WindowKey};
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, instrument};

use crate::sequence::RecordSequence;
use crate::table::CondensationTable;

/// Eviction engine for one session
///
/// Cloning shares the table, sink and sequence; it is how the periodic flush
/// task and the read loop of a live session reach the same state.
pub struct Condenser<S> {
    table: Arc<CondensationTable>,
    sink: Arc<Mutex<S>>,
    sequence: Arc<RecordSequence>,
    drain_limit: Option<usize>,
}

impl<S> Clone for Condenser<S> {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
            sink: self.sink.clone(),
            sequence: self.sequence.clone(),
            drain_limit: self.drain_limit,
        }
    }
}

impl<S: AppearanceSink> Condenser<S> {
    /// New condenser with an empty table and a fresh record sequence
    ///
    /// `drain_limit`: when set, a flush that leaves at most this many windows
    /// behind evicts them too, protected key included.
    pub fn new(sink: Arc<Mutex<S>>, drain_limit: Option<usize>) -> Self {
        Self {
            table: Arc::new(CondensationTable::new()),
            sink,
            sequence: Arc::new(RecordSequence::new()),
            drain_limit,
        }
    }

    pub fn table(&self) -> &CondensationTable {
        &self.table
    }

    pub fn sequence(&self) -> &RecordSequence {
        &self.sequence
    }

    pub fn drain_limit(&self) -> Option<usize> {
        self.drain_limit
    }

    /// Shared sink handle
    pub fn sink(&self) -> &Arc<Mutex<S>> {
        &self.sink
    }

    /// Apply the update rule for one bound reading
    pub fn observe(&self, sighting: Sighting) -> bool {
        self.table.observe(sighting)
    }

    /// Evict every window except `protected`, then apply the drain exception
    ///
    /// `None` evicts everything. Concurrent flushes are serialised on the sink
    /// lock.
    #[instrument(
        name = "condenser_flush",
        skip(self, protected),
        fields(protected = ?protected.map(ToString::to_string))
    )]
    pub async fn flush(&self, protected: Option<&WindowKey>) -> FlushReport {
        let mut sink = self.sink.lock().await;
        let keys = self.table.keys();
        self.flush_locked(&mut sink, keys, protected).await
    }

    /// Like [`flush`](Self::flush), protecting whatever key `current` holds
    ///
    /// The key is read after the table snapshot. Ingest publishes a key before
    /// inserting its window, so every window in the snapshot that belongs to
    /// the current reading is recognised.
    #[instrument(name = "condenser_flush_current", skip(self, current))]
    pub async fn flush_current(&self, current: &watch::Receiver<Option<WindowKey>>) -> FlushReport {
        let mut sink = self.sink.lock().await;
        let keys = self.table.keys();
        let protected = current.borrow().clone();
        self.flush_locked(&mut sink, keys, protected.as_ref()).await
    }

    async fn flush_locked(
        &self,
        sink: &mut S,
        keys: Vec<WindowKey>,
        protected: Option<&WindowKey>,
    ) -> FlushReport {
        let mut report = FlushReport {
            examined: keys.len(),
            ..Default::default()
        };

        for key in &keys {
            if protected == Some(key) {
                report.protected += 1;
                continue;
            }
            self.evict(sink, key, &mut report).await;
        }

        if let Some(limit) = self.drain_limit {
            let remaining = self.table.len();
            if remaining > 0 && remaining <= limit {
                for key in self.table.keys() {
                    if self.evict(sink, &key, &mut report).await {
                        report.drained += 1;
                    }
                }
            }
        }

        // records buffered by the sink are lost when its flush fails
        if report.emitted > 0 {
            if let Err(e) = sink.flush().await {
                error!(
                    sink = sink.name(),
                    dropped = report.emitted,
                    error = %e,
                    "sink flush failed, records dropped"
                );
                report.failed += report.emitted;
                report.emitted = 0;
            }
        }

        if !report.is_noop() {
            debug!(
                examined = report.examined,
                emitted = report.emitted,
                failed = report.failed,
                drained = report.drained,
                remaining = self.table.len(),
                "flush complete"
            );
        }
        report
    }

    /// Remove one window and append its record; false if it was already gone
    async fn evict(&self, sink: &mut S, key: &WindowKey, report: &mut FlushReport) -> bool {
        let Some(window) = self.table.take(key) else {
            return false;
        };
        let record = window.close(self.sequence.next_id());

        match sink.append(&record).await {
            Ok(()) => {
                report.emitted += 1;
                debug!(
                    sequence = record.sequence,
                    subject = %record.subject,
                    location = record.location,
                    start = %record.start,
                    end = %record.end,
                    "record emitted"
                );
            }
            Err(e) => {
                report.failed += 1;
                error!(
                    sink = sink.name(),
                    sequence = record.sequence,
                    key = %key,
                    error = %e,
                    "append failed, record dropped"
                );
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{AppearanceRecord, ContractError, Reading, Timestamp};

    #[derive(Default)]
    struct RecordingSink {
        records: Vec<AppearanceRecord>,
        appends: usize,
        fail_subject: Option<&'static str>,
        fail_flush: bool,
    }

    impl AppearanceSink for RecordingSink {
        fn name(&self) -> &str {
            "recording"
        }

        async fn append(&mut self, record: &AppearanceRecord) -> Result<(), ContractError> {
            self.appends += 1;
            if self.fail_subject == Some(record.subject.as_str()) {
                return Err(ContractError::sink_write("recording", "rejected"));
            }
            self.records.push(record.clone());
            Ok(())
        }

        async fn flush(&mut self) -> Result<(), ContractError> {
            if self.fail_flush {
                return Err(ContractError::sink_write("recording", "commit failed"));
            }
            Ok(())
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            Ok(())
        }
    }

    fn sighting(object: &str, reader: i64, second: u32) -> Sighting {
        Sighting {
            key: WindowKey::new(object, reader),
            timestamp: Timestamp::parse(&format!("2024-01-01 00:00:{second:02}")).unwrap(),
            reading: Reading::new(),
        }
    }

    fn condenser(drain_limit: Option<usize>) -> Condenser<RecordingSink> {
        Condenser::new(Arc::new(Mutex::new(RecordingSink::default())), drain_limit)
    }

    async fn records(c: &Condenser<RecordingSink>) -> Vec<AppearanceRecord> {
        let mut records = c.sink().lock().await.records.clone();
        records.sort_by(|a, b| a.key().cmp(&b.key()));
        records
    }

    #[tokio::test]
    async fn test_empty_flush_is_noop() {
        let c = condenser(Some(2));
        let report = c.flush(None).await;
        assert!(report.is_noop());
        assert_eq!(c.sink().lock().await.appends, 0);
        assert!(c.table().is_empty());
    }

    #[tokio::test]
    async fn test_final_flush_emits_one_record_per_key() {
        let c = condenser(None);
        c.observe(sighting("A", 1, 1));
        c.observe(sighting("B", 1, 2));
        c.observe(sighting("A", 1, 3));

        let report = c.flush(None).await;
        assert_eq!(report.emitted, 2);
        assert!(c.table().is_empty());

        let records = records(&c).await;
        assert_eq!(records[0].subject, "A");
        assert_eq!(records[0].start.to_string(), "2024-01-01 00:00:01");
        assert_eq!(records[0].end.to_string(), "2024-01-01 00:00:03");
        assert_eq!(records[1].subject, "B");
        assert_eq!(records[1].start, records[1].end);
    }

    #[tokio::test]
    async fn test_protected_key_survives_without_drain() {
        let c = condenser(None);
        c.observe(sighting("A", 1, 1));
        c.observe(sighting("B", 1, 2));
        c.observe(sighting("C", 1, 3));

        let current = WindowKey::new("C", 1);
        let report = c.flush(Some(&current)).await;
        assert_eq!(report.examined, 3);
        assert_eq!(report.emitted, 2);
        assert_eq!(report.protected, 1);
        assert_eq!(report.drained, 0);
        assert!(c.table().contains(&current));
        assert_eq!(c.table().len(), 1);

        let subjects: Vec<_> = records(&c).await.into_iter().map(|r| r.subject).collect();
        assert_eq!(subjects, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_protected_window_is_left_intact() {
        let c = condenser(None);
        c.observe(sighting("C", 1, 1));
        c.observe(sighting("A", 1, 2));
        c.observe(sighting("C", 1, 3));
        c.observe(sighting("C", 1, 5));

        let current = WindowKey::new("C", 1);
        let before = c.table().get(&current).unwrap();
        c.flush(Some(&current)).await;
        let after = c.table().get(&current).unwrap();

        assert_eq!(after, before);
        assert_eq!(after.first().timestamp.to_string(), "2024-01-01 00:00:01");
        assert_eq!(after.last().timestamp.to_string(), "2024-01-01 00:00:05");

        // the next sighting keeps extending the same window
        c.observe(sighting("C", 1, 7));
        c.flush(None).await;
        let records = records(&c).await;
        let record = records.iter().find(|r| r.subject == "C").unwrap();
        assert_eq!(record.start.to_string(), "2024-01-01 00:00:01");
        assert_eq!(record.end.to_string(), "2024-01-01 00:00:07");
    }

    #[tokio::test]
    async fn test_failed_sink_flush_counts_records_as_failed() {
        let c = condenser(None);
        c.sink().lock().await.fail_flush = true;
        c.observe(sighting("A", 1, 1));
        c.observe(sighting("B", 1, 2));

        let report = c.flush(None).await;
        assert_eq!(report.emitted, 0);
        assert_eq!(report.failed, 2);
        assert!(c.table().is_empty());

        c.sink().lock().await.fail_flush = false;
        c.observe(sighting("C", 1, 3));
        let report = c.flush(None).await;
        assert_eq!(report.emitted, 1);
        assert_eq!(report.failed, 0);
    }

    #[tokio::test]
    async fn test_drain_exception_takes_protected_key() {
        let c = condenser(Some(2));
        c.observe(sighting("A", 1, 1));
        c.observe(sighting("B", 1, 2));
        c.observe(sighting("C", 1, 3));

        let report = c.flush(Some(&WindowKey::new("C", 1))).await;
        assert_eq!(report.emitted, 3);
        assert_eq!(report.drained, 1);
        assert!(c.table().is_empty());
    }

    #[tokio::test]
    async fn test_drain_exception_alone_in_table() {
        let c = condenser(Some(1));
        c.observe(sighting("A", 1, 1));
        c.observe(sighting("A", 1, 2));
        let report = c.flush(Some(&WindowKey::new("A", 1))).await;
        assert_eq!(report.protected, 1);
        assert_eq!(report.drained, 1);
        assert!(c.table().is_empty());
    }

    #[tokio::test]
    async fn test_sink_failure_still_removes_window() {
        let c = condenser(None);
        c.sink().lock().await.fail_subject = Some("A");
        c.observe(sighting("A", 1, 1));
        c.observe(sighting("B", 1, 2));

        let report = c.flush(None).await;
        assert_eq!(report.failed, 1);
        assert_eq!(report.emitted, 1);
        assert!(c.table().is_empty());
        assert_eq!(records(&c).await.len(), 1);
    }

    #[tokio::test]
    async fn test_sequences_increase_per_condenser() {
        let c = condenser(None);
        c.observe(sighting("A", 1, 1));
        c.flush(None).await;
        c.observe(sighting("B", 1, 2));
        c.observe(sighting("C", 1, 3));
        c.flush(None).await;

        let mut seqs: Vec<_> = c.sink().lock().await.records.iter().map(|r| r.sequence).collect();
        seqs.sort_unstable();
        assert_eq!(seqs, vec![1, 2, 3]);

        let other = condenser(None);
        other.observe(sighting("A", 1, 1));
        other.flush(None).await;
        assert_eq!(other.sink().lock().await.records[0].sequence, 1);
    }

    #[tokio::test]
    async fn test_reappearing_key_is_split() {
        let c = condenser(None);
        c.observe(sighting("A", 1, 1));
        c.observe(sighting("B", 1, 2));
        c.flush(Some(&WindowKey::new("B", 1))).await;
        c.observe(sighting("A", 1, 3));
        c.flush(None).await;

        let a: Vec<_> = records(&c)
            .await
            .into_iter()
            .filter(|r| r.subject == "A")
            .collect();
        assert_eq!(a.len(), 2);
        let mut starts: Vec<_> = a.iter().map(|r| r.start.to_string()).collect();
        starts.sort();
        assert_eq!(starts, vec!["2024-01-01 00:00:01", "2024-01-01 00:00:03"]);
    }

    #[tokio::test]
    async fn test_flush_current_reads_watch() {
        let c = condenser(None);
        let (tx, rx) = watch::channel(None);
        tx.send_replace(Some(WindowKey::new("B", 1)));
        c.observe(sighting("A", 1, 1));
        c.observe(sighting("B", 1, 2));

        let report = c.flush_current(&rx).await;
        assert_eq!(report.emitted, 1);
        assert!(c.table().contains(&WindowKey::new("B", 1)));
    }
}
