//! # Integration Tests
//!
//! Cross-crate and end-to-end tests.
//!
//! Covers:
//! - Configuration contract (TOML in, runnable components out)
//! - Live sessions over in-memory duplex streams and real TCP
//! - Batch sessions over seeded SQLite databases

#[cfg(test)]
mod contract_tests {
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::SinkType;

    const CONFIG: &str = r#"
[stream]
descriptor = "STREAM RFID_STREAM (LICENSE_PLATE VARCHAR # LOCATION_ID INTEGER # READING_TS TIMESTAMP # SPEED DOUBLE)"

[live]
bind = "127.0.0.1:0"
drain_limit = 0

[batch]
bulk_size = 2

[[sinks]]
name = "appear"
sink_type = "sqlite"
[sinks.params]
path = "appear.db"
"#;

    #[test]
    fn test_reference_config_loads() {
        let blueprint = ConfigLoader::load_from_str(CONFIG, ConfigFormat::Toml).unwrap();
        let schema = blueprint.schema().unwrap();
        assert_eq!(schema.stream(), "RFID_STREAM");
        assert_eq!(schema.object_attr(), "LICENSE_PLATE");
        assert_eq!(blueprint.live.drain_limit(), None);
        assert_eq!(blueprint.live.flush_interval_ms, 5000);
        assert_eq!(blueprint.batch.bulk_size, 2);
        assert_eq!(blueprint.batch.drain_limit(), Some(2));
        assert_eq!(blueprint.sink("appear").unwrap().sink_type, SinkType::Sqlite);

        let toml = ConfigLoader::to_toml(&blueprint).unwrap();
        let again = ConfigLoader::load_from_str(&toml, ConfigFormat::Toml).unwrap();
        assert_eq!(again.stream.descriptor, blueprint.stream.descriptor);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use contracts::{AppearanceRecord, AppearanceSink, StreamSchema};
    use dispatcher::{MemorySink, SinkSet};
    use ingestion::{
        create_stream_table, insert_readings, ReadingGenerator, ReadingGeneratorConfig,
        ReadingSource,
    };
    use rusqlite::Connection;
    use session::{
        BatchSession, BatchSessionConfig, CloseReason, LiveServer, LiveSession, LiveSessionConfig,
        SessionSummary,
    };
    use tokio::io::{AsyncWriteExt, BufReader};
    use tokio::sync::Mutex;
    use tokio_util::sync::CancellationToken;

    const DESCRIPTOR: &str =
        "STREAM rfid (plate varchar # gate integer # seen_at timestamp # speed double)";

    fn schema() -> StreamSchema {
        StreamSchema::parse(DESCRIPTOR).unwrap()
    }

    /// Scheduled flushes never fire during a test
    fn quiet_live() -> LiveSessionConfig {
        LiveSessionConfig {
            flush_delay: Duration::from_secs(3600),
            flush_interval: Duration::from_secs(3600),
            drain_limit: None,
            max_frame_bytes: 1024,
        }
    }

    fn line(plate: &str, gate: i64, second: u32) -> String {
        format!(
            "{{\"plate\":\"{plate}\",\"gate\":{gate},\"seen_at\":\"2024-01-01 00:00:{second:02}\",\"speed\":1.5}}\n"
        )
    }

    fn sorted(mut records: Vec<AppearanceRecord>) -> Vec<AppearanceRecord> {
        records.sort_by(|a, b| a.key().cmp(&b.key()));
        records
    }

    async fn run_live<S: AppearanceSink + 'static>(
        sink: Arc<Mutex<S>>,
        input: String,
    ) -> SessionSummary {
        let (mut client, server) = tokio::io::duplex(4096);
        let session = LiveSession::new(schema(), quiet_live(), sink);
        let task = tokio::spawn(session.run(BufReader::new(server), CancellationToken::new()));
        client.write_all(input.as_bytes()).await.unwrap();
        drop(client);
        task.await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_live_quit_emits_one_record_per_key() {
        let sink = MemorySink::new("mem");
        let input = [line("A", 1, 1), line("B", 1, 2), line("A", 1, 3)].concat() + "{\"QUIT\":1}\n";

        let summary = run_live(Arc::new(Mutex::new(sink.clone())), input).await;
        assert_eq!(summary.close_reason, CloseReason::Quit);

        let records = sorted(sink.records());
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].subject, "A");
        assert_eq!(records[0].location, 1);
        assert_eq!(records[0].start.to_string(), "2024-01-01 00:00:01");
        assert_eq!(records[0].end.to_string(), "2024-01-01 00:00:03");
        assert_eq!(records[1].subject, "B");
        assert_eq!(records[1].start.to_string(), "2024-01-01 00:00:02");
        assert_eq!(records[1].end, records[1].start);
    }

    #[tokio::test]
    async fn test_live_reading_without_reader_is_rejected() {
        let sink = MemorySink::new("mem");
        let input = "{\"plate\":\"A\",\"seen_at\":\"2024-01-01 00:00:01\"}\n{\"QUIT\":1}\n".to_string();

        let summary = run_live(Arc::new(Mutex::new(sink.clone())), input).await;
        assert_eq!(summary.readings_rejected, 1);
        assert_eq!(summary.readings_accepted, 0);
        assert_eq!(summary.records_emitted, 0);
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_live_end_of_run_keeps_session_open() {
        let sink = MemorySink::new("mem");
        let input = [
            line("A", 1, 1),
            "{\"END\":true}\n".to_string(),
            line("A", 1, 4),
            line("A", 1, 6),
            "{\"QUIT\":true}\n".to_string(),
        ]
        .concat();

        let summary = run_live(Arc::new(Mutex::new(sink.clone())), input).await;
        assert_eq!(summary.runs_ended, 1);
        assert_eq!(summary.readings_accepted, 3);

        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].end.to_string(), "2024-01-01 00:00:01");
        assert_eq!(records[1].start.to_string(), "2024-01-01 00:00:04");
        assert_eq!(records[1].end.to_string(), "2024-01-01 00:00:06");
    }

    #[tokio::test]
    async fn test_sink_failure_drops_record_but_not_window() {
        let broken = MemorySink::new("broken");
        let healthy = MemorySink::new("healthy");
        broken.set_failing(true);
        let sinks = SinkSet::new().with(broken.clone()).with(healthy.clone());
        let input = [line("A", 1, 1), line("B", 2, 2)].concat();

        let summary = run_live(Arc::new(Mutex::new(sinks)), input).await;
        assert_eq!(summary.close_reason, CloseReason::Disconnected);
        assert_eq!(summary.records_failed, 2);
        assert_eq!(summary.records_emitted, 0);
        assert!(broken.is_empty());
        assert_eq!(healthy.len(), 2);
    }

    #[tokio::test]
    async fn test_record_sequences_restart_per_session() {
        let sink = MemorySink::new("mem");
        let shared = Arc::new(Mutex::new(sink.clone()));

        run_live(shared.clone(), [line("A", 1, 1), line("B", 1, 2)].concat()).await;
        run_live(shared, [line("C", 1, 3)].concat()).await;

        let sequences: Vec<u64> = sink.records().iter().map(|r| r.sequence).collect();
        let (first, second) = sequences.split_at(2);
        let mut first = first.to_vec();
        first.sort_unstable();
        assert_eq!(first, vec![1, 2]);
        assert_eq!(second, &[1]);
    }

    fn seeded_db(dir: &tempfile::TempDir, rows: &[(&str, i64, u32)]) -> std::path::PathBuf {
        let path = dir.path().join("readings.db");
        let mut conn = Connection::open(&path).unwrap();
        create_stream_table(&conn, &schema()).unwrap();
        let readings = rows.iter().map(|(plate, gate, second)| {
            contracts::Reading::from_pairs([
                ("plate", plate.to_string()),
                ("gate", gate.to_string()),
                ("seen_at", format!("2024-01-01 00:00:{second:02}")),
            ])
        });
        insert_readings(&mut conn, &schema(), readings).unwrap();
        path
    }

    fn batch(
        path: &std::path::Path,
        config: BatchSessionConfig,
        sink: Arc<Mutex<MemorySink>>,
    ) -> BatchSession<MemorySink> {
        let mut source = ReadingSource::from_schema(schema());
        source.open_path(path).unwrap();
        BatchSession::new(source, config, sink)
    }

    fn no_drain(bulk_size: usize) -> BatchSessionConfig {
        BatchSessionConfig {
            bulk_size,
            drain_limit: None,
        }
    }

    #[tokio::test]
    async fn test_batch_threshold_leaves_current_window_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = seeded_db(&dir, &[("C", 1, 3), ("A", 1, 1), ("B", 1, 2)]);
        let sink = MemorySink::new("mem");

        let summary = batch(&path, no_drain(2), Arc::new(Mutex::new(sink.clone())))
            .run(CancellationToken::new())
            .await
            .unwrap();

        // two threshold flushes, then the final one
        assert_eq!(summary.flushes, 3);
        let records = sink.records();
        let subjects: Vec<_> = records.iter().map(|r| r.subject.to_string()).collect();
        assert_eq!(subjects, vec!["A", "B", "C"]);
        let sequences: Vec<_> = records.iter().map(|r| r.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 3]);
        assert_eq!(summary.close_reason, CloseReason::EndOfSource);
    }

    #[tokio::test]
    async fn test_batch_drain_exception_follows_threshold_flush() {
        let dir = tempfile::tempdir().unwrap();
        let path = seeded_db(&dir, &[("C", 1, 3), ("A", 1, 1), ("B", 1, 2)]);
        let sink = MemorySink::new("mem");
        let config = BatchSessionConfig {
            bulk_size: 2,
            ..Default::default()
        };

        let summary = batch(&path, config, Arc::new(Mutex::new(sink.clone())))
            .run(CancellationToken::new())
            .await
            .unwrap();

        // the threshold flush after B drains both windows; C waits for the final flush
        assert_eq!(summary.flushes, 2);
        assert_eq!(summary.drained, 1);
        let subjects: Vec<_> = sink.records().iter().map(|r| r.subject.to_string()).collect();
        assert_eq!(subjects, vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn test_batch_final_flush_matches_distinct_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("generated.db");
        let config = ReadingGeneratorConfig {
            objects: 5,
            readers: 3,
            dwell: 4,
            count: 240,
            ..Default::default()
        };
        let generator = ReadingGenerator::new(schema(), config);
        let expected = generator.distinct_keys();
        {
            let mut conn = Connection::open(&path).unwrap();
            create_stream_table(&conn, &schema()).unwrap();
            insert_readings(&mut conn, &schema(), generator).unwrap();
        }

        let sink = MemorySink::new("mem");
        let summary = batch(&path, no_drain(usize::MAX), Arc::new(Mutex::new(sink.clone())))
            .run(CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.readings_accepted, 240);
        assert_eq!(summary.flushes, 1);
        assert_eq!(sink.len(), expected);
        let mut keys: Vec<_> = sink.records().iter().map(AppearanceRecord::key).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), expected);
    }

    #[tokio::test]
    async fn test_live_server_persists_to_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("appear.db");
        let configs = vec![contracts::SinkConfig {
            name: "appear".to_string(),
            sink_type: contracts::SinkType::Sqlite,
            params: [("path".to_string(), db.display().to_string())].into(),
        }];
        let sinks = dispatcher::create_sink_set(&configs).await.unwrap();

        let sinks = Arc::new(Mutex::new(sinks));
        let server = LiveServer::bind("127.0.0.1:0", schema(), quiet_live(), sinks)
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(server.run(shutdown.clone()));

        let mut client = tokio::net::TcpStream::connect(addr).await.unwrap();
        let input = [line("A", 1, 1), line("B", 2, 2), line("A", 1, 3)].concat();
        client.write_all(input.as_bytes()).await.unwrap();
        client.flush().await.unwrap();

        // shutdown drains the open session
        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown.cancel();
        let summary = task.await.unwrap().unwrap();
        assert_eq!(summary.connections, 1);
        assert_eq!(summary.records_emitted, 2);

        let conn = Connection::open(&db).unwrap();
        let mut stmt = conn
            .prepare("SELECT SUBJECT, LOCATION_ID, START_TS, END_TS FROM APPEAR_TABLE ORDER BY SUBJECT")
            .unwrap();
        let rows: Vec<(String, i64, String, String)> = stmt
            .query_map([], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)))
            .unwrap()
            .map(Result::unwrap)
            .collect();
        assert_eq!(
            rows,
            vec![
                (
                    "A".to_string(),
                    1,
                    "2024-01-01 00:00:01".to_string(),
                    "2024-01-01 00:00:03".to_string()
                ),
                (
                    "B".to_string(),
                    2,
                    "2024-01-01 00:00:02".to_string(),
                    "2024-01-01 00:00:02".to_string()
                ),
            ]
        );
    }
}
