//! Deterministic reading generator
//!
//! Used for tests and demos without a real reader deployment.

use std::collections::HashSet;

use chrono::{Duration, NaiveDate};
use contracts::{Reading, StreamSchema, Timestamp};
use rusqlite::{params_from_iter, Connection};
use tracing::debug;

use crate::error::{IngestionError, Result};

/// Generator configuration
#[derive(Debug, Clone)]
pub struct ReadingGeneratorConfig {
    /// Distinct objects cycled through
    pub objects: usize,

    /// Distinct readers; reader ids start at 1
    pub readers: usize,

    /// Consecutive sightings of one object at one reader before it moves on
    pub dwell: usize,

    /// Total readings produced
    pub count: usize,

    /// Timestamp of the first reading
    pub start: Timestamp,

    /// Gap between consecutive readings (ms)
    pub step_ms: i64,
}

impl Default for ReadingGeneratorConfig {
    fn default() -> Self {
        Self {
            objects: 4,
            readers: 3,
            dwell: 3,
            count: 100,
            start: Timestamp::from_naive(
                NaiveDate::from_ymd_opt(2024, 1, 1)
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
                    .unwrap_or_default(),
            ),
            step_ms: 100,
        }
    }
}

/// Produces readings for a schema in non-decreasing timestamp order
///
/// Objects are interleaved round-robin. Each object stays at a reader for
/// `dwell` of its own sightings, then moves to the next reader.
pub struct ReadingGenerator {
    schema: StreamSchema,
    config: ReadingGeneratorConfig,
    emitted: usize,
}

impl ReadingGenerator {
    /// Create a generator
    pub fn new(schema: StreamSchema, config: ReadingGeneratorConfig) -> Self {
        Self {
            schema,
            config: ReadingGeneratorConfig {
                objects: config.objects.max(1),
                readers: config.readers.max(1),
                dwell: config.dwell.max(1),
                ..config
            },
            emitted: 0,
        }
    }

    /// Distinct (object, reader) keys a full run produces
    ///
    /// This is the record count when the table is only flushed at the end.
    pub fn distinct_keys(&self) -> usize {
        (0..self.config.count)
            .map(|idx| self.placement(idx))
            .collect::<HashSet<_>>()
            .len()
    }

    fn placement(&self, idx: usize) -> (usize, usize) {
        let c = &self.config;
        let object = idx % c.objects;
        let visit = idx / c.objects / c.dwell;
        (object, (object + visit) % c.readers + 1)
    }

    fn reading_at(&self, idx: usize) -> Reading {
        let c = &self.config;
        let (object, reader) = self.placement(idx);
        let ts = Timestamp::from_naive(
            c.start.as_naive() + Duration::milliseconds(c.step_ms * idx as i64),
        );

        let mut reading = Reading::new();
        reading.insert(self.schema.object_attr(), format!("OBJ-{object:04}"));
        reading.insert(self.schema.reader_attr(), reader.to_string());
        reading.insert(self.schema.time_attr(), ts.to_string());
        for (n, attr) in self.schema.auxiliary().iter().enumerate() {
            reading.insert(&attr.name, ((idx + n) % 100).to_string());
        }
        reading
    }
}

impl Iterator for ReadingGenerator {
    type Item = Reading;

    fn next(&mut self) -> Option<Reading> {
        if self.emitted >= self.config.count {
            return None;
        }
        let reading = self.reading_at(self.emitted);
        self.emitted += 1;
        Some(reading)
    }
}

/// Create the stream table for a schema if missing
pub fn create_stream_table(conn: &Connection, schema: &StreamSchema) -> Result<()> {
    let columns = schema
        .attributes()
        .iter()
        .map(|a| format!("\"{}\" {}", a.name, a.attr_type))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!("CREATE TABLE IF NOT EXISTS \"{}\" ({columns})", schema.stream());
    conn.execute(&sql, [])
        .map_err(|e| IngestionError::source_unavailable(schema.stream(), e))?;
    Ok(())
}

/// Insert readings into the stream table; missing attributes become NULL
pub fn insert_readings<I>(conn: &mut Connection, schema: &StreamSchema, readings: I) -> Result<usize>
where
    I: IntoIterator<Item = Reading>,
{
    let names = schema.attributes().iter().map(|a| format!("\"{}\"", a.name));
    let placeholders = (1..=schema.attributes().len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "INSERT INTO \"{}\" ({}) VALUES ({placeholders})",
        schema.stream(),
        names.collect::<Vec<_>>().join(", ")
    );

    let unavailable = |e: rusqlite::Error| IngestionError::source_unavailable(schema.stream(), e);
    let tx = conn.transaction().map_err(unavailable)?;
    let mut inserted = 0;
    {
        let mut stmt = tx.prepare(&sql).map_err(unavailable)?;
        for reading in readings {
            let values = schema
                .attributes()
                .iter()
                .map(|a| reading.get(&a.name).map(str::to_string));
            stmt.execute(params_from_iter(values)).map_err(unavailable)?;
            inserted += 1;
        }
    }
    tx.commit().map_err(unavailable)?;
    debug!(stream = %schema.stream(), inserted, "readings seeded");
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ReadingSource;

    fn schema() -> StreamSchema {
        StreamSchema::parse("STREAM s (plate text # gate integer # ts text # speed real)").unwrap()
    }

    #[test]
    fn test_generator_is_deterministic_and_ordered() {
        let config = ReadingGeneratorConfig {
            count: 20,
            ..Default::default()
        };
        let a: Vec<_> = ReadingGenerator::new(schema(), config.clone()).collect();
        let b: Vec<_> = ReadingGenerator::new(schema(), config).collect();
        assert_eq!(a.len(), 20);
        assert_eq!(a, b);

        let times: Vec<_> = a
            .iter()
            .map(|r| Timestamp::parse(r.get("TS").unwrap()).unwrap())
            .collect();
        assert!(times.windows(2).all(|w| w[0] <= w[1]));
        assert!(a.iter().all(|r| schema().bind(r.clone()).is_ok()));
    }

    #[test]
    fn test_distinct_keys() {
        let config = ReadingGeneratorConfig {
            objects: 2,
            readers: 2,
            dwell: 2,
            count: 10,
            ..Default::default()
        };
        // each object alternates between both readers
        assert_eq!(ReadingGenerator::new(schema(), config).distinct_keys(), 4);

        let config = ReadingGeneratorConfig {
            objects: 3,
            readers: 1,
            count: 10,
            ..Default::default()
        };
        assert_eq!(ReadingGenerator::new(schema(), config).distinct_keys(), 3);
    }

    #[tokio::test]
    async fn test_seeded_table_reads_back() {
        let mut conn = Connection::open_in_memory().unwrap();
        create_stream_table(&conn, &schema()).unwrap();
        let config = ReadingGeneratorConfig {
            count: 12,
            ..Default::default()
        };
        let inserted =
            insert_readings(&mut conn, &schema(), ReadingGenerator::new(schema(), config)).unwrap();
        assert_eq!(inserted, 12);

        let mut source = ReadingSource::from_schema(schema());
        source.open(conn).unwrap();
        let mut count = 0;
        while source.next().await.is_some() {
            count += 1;
        }
        assert_eq!(count, 12);
    }
}
