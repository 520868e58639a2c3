//! Progress reporting and cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Overall progress ranges reserved for each orchestration phase.
/// Worksheet-local progress is mapped linearly into the phase's range.
pub(crate) const ANALYZE_RANGE: ProgressRange = ProgressRange::new(0.0, 20.0);
pub(crate) const PROCESS_RANGE: ProgressRange = ProgressRange::new(20.0, 95.0);
pub(crate) const SAVE_RANGE: ProgressRange = ProgressRange::new(95.0, 100.0);

/// A transient progress snapshot, emitted at batch boundaries and
/// phase transitions. Not retained by the library.
#[derive(Debug, Clone)]
pub struct ConversionProgress {
    /// Rows processed so far across the whole workbook.
    pub processed: u64,
    /// Total rows the run will process.
    pub total: u64,
    /// Human-readable label for the current operation.
    pub label: String,
    /// Overall completion in percent, already scaled across phases.
    pub percent: f64,
}

/// Callback sink for progress snapshots.
pub type ProgressSink<'a> = dyn Fn(&ConversionProgress) + 'a;

/// A linear sub-range of the overall progress scale.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ProgressRange {
    low: f64,
    high: f64,
}

impl ProgressRange {
    pub(crate) const fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    /// Map `done / total` into this range. A zero total maps to the
    /// range start.
    pub(crate) fn at(&self, done: u64, total: u64) -> f64 {
        if total == 0 {
            return self.low;
        }
        let ratio = (done as f64 / total as f64).clamp(0.0, 1.0);
        self.low + ratio * (self.high - self.low)
    }
}

/// Cooperative cancellation flag, polled at worksheet and batch
/// boundaries. Cloning shares the underlying flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. The running conversion stops at its next
    /// batch or worksheet boundary.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}
