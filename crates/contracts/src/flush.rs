//! FlushReport - outcome of one condenser flush

use serde::Serialize;
use std::ops::AddAssign;

/// Counters for a single flush pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FlushReport {
    /// Keys present when the pass started
    pub examined: usize,
    /// Records appended successfully
    pub emitted: usize,
    /// Records dropped because the sink failed
    pub failed: usize,
    /// Keys skipped because they were protected
    pub protected: usize,
    /// Windows evicted by the drain exception
    pub drained: usize,
}

impl FlushReport {
    /// Windows removed from the table, whether or not the sink accepted them
    pub fn evicted(&self) -> usize {
        self.emitted + self.failed
    }

    /// Whether the flush touched nothing
    pub fn is_noop(&self) -> bool {
        self.evicted() == 0
    }
}

impl AddAssign for FlushReport {
    fn add_assign(&mut self, rhs: Self) {
        self.examined += rhs.examined;
        self.emitted += rhs.emitted;
        self.failed += rhs.failed;
        self.protected += rhs.protected;
        self.drained += rhs.drained;
    }
}
