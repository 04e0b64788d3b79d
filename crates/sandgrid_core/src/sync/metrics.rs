//! # Synchronization Metrics
//!
//! Observational counters for reconciliation passes. Nothing reads these
//! to make decisions.

use std::time::Duration;

/// Statistics from grid/index reconciliation.
///
/// Used for profiling and verifying that batching is working.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SyncMetrics {
    /// Cells reconciled across all passes.
    pub updates_processed: u64,
    /// Running mean pass duration in microseconds.
    pub avg_sync_time_micros: f64,
    /// Largest number of cells reconciled in one pass.
    pub peak_batch_size: usize,
    /// Passes that reconciled at least one cell.
    pub sync_passes: u64,
}

impl SyncMetrics {
    /// Folds one pass into the counters.
    pub fn record(&mut self, batch_size: usize, elapsed: Duration) {
        self.updates_processed += batch_size as u64;
        self.peak_batch_size = self.peak_batch_size.max(batch_size);
        self.sync_passes += 1;

        #[allow(clippy::cast_precision_loss)]
        let passes = self.sync_passes as f64;
        let micros = elapsed.as_secs_f64() * 1_000_000.0;
        self.avg_sync_time_micros += (micros - self.avg_sync_time_micros) / passes;
    }
}
