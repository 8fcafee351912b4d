//! Condenser metrics
//!
//! Prometheus-facing helpers plus an in-memory aggregator for run summaries.

use contracts::FlushReport;
use metrics::{counter, gauge, histogram};

/// What triggered a flush
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTrigger {
    /// Periodic live-mode timer
    Timer,
    /// Batch-mode bulk threshold
    Threshold,
    /// `END` sentinel
    EndOfRun,
    /// Session termination
    Final,
}

impl FlushTrigger {
    /// Metric label value
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timer => "timer",
            Self::Threshold => "threshold",
            Self::EndOfRun => "end_of_run",
            Self::Final => "final",
        }
    }
}

/// Record one flush outcome
///
/// # Example
///
/// ```ignore
/// let report = condenser.flush(Some(&current)).await;
/// observability::record_flush_metrics(&report, FlushTrigger::Timer, table.len());
/// ```
pub fn record_flush_metrics(report: &FlushReport, trigger: FlushTrigger, remaining: usize) {
    counter!("condenser_flushes_total", "trigger" => trigger.as_str()).increment(1);
    counter!("condenser_records_emitted_total").increment(report.emitted as u64);
    if report.failed > 0 {
        counter!("condenser_sink_failures_total").increment(report.failed as u64);
    }
    if report.drained > 0 {
        counter!("condenser_drained_total").increment(report.drained as u64);
    }
    histogram!("condenser_flush_records").record(report.evicted() as f64);
    gauge!("condenser_table_windows").set(remaining as f64);
}

/// Record a single sink append
pub fn record_sink_append(sink_name: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "condenser_sink_appends_total",
        "sink" => sink_name.to_string(),
        "status" => status
    )
    .increment(1);
}

/// Track open live sessions
pub fn record_session_open(open: bool) {
    if open {
        counter!("condenser_sessions_total").increment(1);
        gauge!("condenser_sessions_active").increment(1.0);
    } else {
        gauge!("condenser_sessions_active").decrement(1.0);
    }
}

/// In-memory flush aggregator
#[derive(Debug, Clone, Default)]
pub struct FlushAggregator {
    /// Flushes observed
    pub flushes: u64,
    /// Flushes that evicted nothing
    pub noop_flushes: u64,
    /// Sum of all reports
    pub totals: FlushReport,
    /// Evicted windows per non-empty flush
    pub flush_sizes: RunningStats,
}

impl FlushAggregator {
    /// Create an empty aggregator
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold in one report
    pub fn update(&mut self, report: &FlushReport) {
        self.flushes += 1;
        self.totals += *report;
        if report.is_noop() {
            self.noop_flushes += 1;
        } else {
            self.flush_sizes.push(report.evicted() as f64);
        }
    }

    /// Fold in another aggregator
    pub fn merge(&mut self, other: &FlushAggregator) {
        self.flushes += other.flushes;
        self.noop_flushes += other.noop_flushes;
        self.totals += other.totals;
        self.flush_sizes.merge(&other.flush_sizes);
    }

    /// Summary of everything seen so far
    pub fn summary(&self) -> CondensationSummary {
        let evicted = self.totals.evicted();
        CondensationSummary {
            flushes: self.flushes,
            noop_flushes: self.noop_flushes,
            records_emitted: self.totals.emitted as u64,
            records_failed: self.totals.failed as u64,
            drained: self.totals.drained as u64,
            failure_rate: if evicted > 0 {
                self.totals.failed as f64 / evicted as f64 * 100.0
            } else {
                0.0
            },
            flush_size: StatsSummary::from(&self.flush_sizes),
        }
    }
}

/// Aggregated flush summary
#[derive(Debug, Clone, Default)]
pub struct CondensationSummary {
    pub flushes: u64,
    pub noop_flushes: u64,
    pub records_emitted: u64,
    pub records_failed: u64,
    pub drained: u64,
    pub failure_rate: f64,
    pub flush_size: StatsSummary,
}

impl std::fmt::Display for CondensationSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Condensation Summary ===")?;
        writeln!(f, "Flushes: {} ({} empty)", self.flushes, self.noop_flushes)?;
        writeln!(f, "Records emitted: {}", self.records_emitted)?;
        writeln!(
            f,
            "Records dropped: {} ({:.2}%)",
            self.records_failed, self.failure_rate
        )?;
        writeln!(f, "Drained by exception: {}", self.drained)?;
        writeln!(f, "Windows per flush: {}", self.flush_size)
    }
}

/// Statistics summary
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            return write!(f, "N/A");
        }
        write!(
            f,
            "min={:.1}, max={:.1}, mean={:.2}, std={:.2} (n={})",
            self.min, self.max, self.mean, self.std_dev, self.count
        )
    }
}

/// Online statistics (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// Add a sample
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        if self.count == 1 {
            (self.min, self.max, self.mean, self.m2) = (value, value, value, 0.0);
            return;
        }
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    /// Combine with statistics gathered elsewhere (Chan et al.)
    pub fn merge(&mut self, other: &RunningStats) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = other.clone();
            return;
        }
        let count = self.count + other.count;
        let delta = other.mean - self.mean;
        let (n_a, n_b, n) = (self.count as f64, other.count as f64, count as f64);
        self.mean += delta * n_b / n;
        self.m2 += other.m2 + delta * delta * n_a * n_b / n;
        self.count = count;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            stats.push(v);
        }

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_merge_matches_single_pass() {
        let mut all = RunningStats::default();
        let mut left = RunningStats::default();
        let mut right = RunningStats::default();
        for v in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            all.push(v);
        }
        for v in [2.0, 4.0, 4.0] {
            left.push(v);
        }
        for v in [4.0, 5.0, 5.0, 7.0, 9.0] {
            right.push(v);
        }
        left.merge(&right);

        assert_eq!(left.count(), all.count());
        assert!((left.mean() - all.mean()).abs() < 1e-10);
        assert!((left.variance() - all.variance()).abs() < 1e-10);
        assert!((left.min() - 2.0).abs() < 1e-10);
        assert!((left.max() - 9.0).abs() < 1e-10);

        let mut empty = RunningStats::default();
        empty.merge(&all);
        assert_eq!(empty.count(), 8);
    }

    #[test]
    fn test_aggregator_skips_noop_sizes() {
        let mut agg = FlushAggregator::new();
        agg.update(&FlushReport::default());
        agg.update(&FlushReport {
            examined: 3,
            emitted: 2,
            failed: 1,
            protected: 0,
            drained: 1,
        });
        agg.update(&FlushReport {
            examined: 2,
            emitted: 1,
            protected: 1,
            ..Default::default()
        });

        let summary = agg.summary();
        assert_eq!(summary.flushes, 3);
        assert_eq!(summary.noop_flushes, 1);
        assert_eq!(summary.records_emitted, 3);
        assert_eq!(summary.records_failed, 1);
        assert_eq!(summary.drained, 1);
        assert_eq!(summary.flush_size.count, 2);
        assert!((summary.flush_size.mean - 2.0).abs() < 1e-10);
        assert!((summary.failure_rate - 25.0).abs() < 1e-10);
        assert!(summary.to_string().contains("Records emitted: 3"));
    }

    #[test]
    fn test_empty_summary_display() {
        let summary = FlushAggregator::new().summary();
        assert!(summary.to_string().contains("Windows per flush: N/A"));
    }

    #[test]
    fn test_trigger_labels() {
        assert_eq!(FlushTrigger::Timer.as_str(), "timer");
        assert_eq!(FlushTrigger::Final.as_str(), "final");
    }
}
