//! Run statistics printed at the end of a batch run.

use std::time::Duration;

use dispatcher::MetricsSnapshot;
use serde::Serialize;
use session::SessionSummary;

/// Statistics from one `condense` run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    #[serde(flatten)]
    pub session: SessionSummary,

    /// Wall-clock duration of the session
    pub duration_secs: f64,

    /// Successful / failed appends per sink
    pub sinks: Vec<SinkReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SinkReport {
    pub name: String,
    pub written: u64,
    pub failed: u64,
}

impl RunReport {
    pub fn new(
        session: SessionSummary,
        duration: Duration,
        sinks: Vec<(String, MetricsSnapshot)>,
    ) -> Self {
        Self {
            session,
            duration_secs: duration.as_secs_f64(),
            sinks: sinks
                .into_iter()
                .map(|(name, m)| SinkReport {
                    name,
                    written: m.write_count,
                    failed: m.failure_count,
                })
                .collect(),
        }
    }

    /// Readings condensed per second
    pub fn readings_per_sec(&self) -> f64 {
        if self.duration_secs > 0.0 {
            self.session.readings_accepted as f64 / self.duration_secs
        } else {
            0.0
        }
    }

    /// Average readings folded into one record
    pub fn condensation_ratio(&self) -> f64 {
        if self.session.records_emitted > 0 {
            self.session.readings_accepted as f64 / self.session.records_emitted as f64
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        let s = &self.session;
        println!("\n=== Condense Run ===\n");
        println!("Overview");
        println!("   ├─ Duration: {:.2}s", self.duration_secs);
        println!("   ├─ Close reason: {:?}", s.close_reason);
        println!(
            "   ├─ Readings: {} accepted, {} rejected",
            s.readings_accepted, s.readings_rejected
        );
        println!("   ├─ Readings/s: {:.2}", self.readings_per_sec());
        println!(
            "   └─ Readings per record: {:.2}",
            self.condensation_ratio()
        );

        println!("\n{}", s.flush_stats.summary());

        if !self.sinks.is_empty() {
            println!("Sinks");
            for (i, sink) in self.sinks.iter().enumerate() {
                let prefix = if i + 1 == self.sinks.len() { "└─" } else { "├─" };
                println!(
                    "   {} {}: {} written, {} failed",
                    prefix, sink.name, sink.written, sink.failed
                );
            }
        }
        println!();
    }
}
