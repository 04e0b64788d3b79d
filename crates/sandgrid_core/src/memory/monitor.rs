//! # Allocation Monitor
//!
//! Byte accounting keyed by component tag.
//!
//! The monitor is a cheap, cloneable handle. Components receive it through
//! their constructors; [`AllocationMonitor::global`] hands out the lazily
//! created process-wide instance for callers that do not care about
//! isolation.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

/// Shared state behind every handle.
#[derive(Debug, Default)]
struct MonitorState {
    /// Bytes currently attributed to each tag.
    by_tag: BTreeMap<String, usize>,
    /// Sum over all tags.
    current: usize,
    /// Highest value `current` has reached.
    peak: usize,
}

/// Handle to a set of allocation counters.
///
/// Cloning shares the counters. Updates are serialized through a mutex, so a
/// handle may be used from several threads.
#[derive(Clone, Debug, Default)]
pub struct AllocationMonitor {
    state: Arc<Mutex<MonitorState>>,
}

static GLOBAL: OnceLock<AllocationMonitor> = OnceLock::new();

impl AllocationMonitor {
    /// Creates an independent set of counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the process-wide monitor, creating it on first access.
    #[must_use]
    pub fn global() -> Self {
        GLOBAL.get_or_init(Self::new).clone()
    }

    /// Attributes `bytes` to `tag` and raises the peak if needed.
    pub fn track_allocation(&self, tag: &str, bytes: usize) {
        let mut state = self.state.lock();
        *state.by_tag.entry(tag.to_string()).or_insert(0) += bytes;
        state.current += bytes;
        if state.current > state.peak {
            state.peak = state.current;
        }
    }

    /// Releases `bytes` from `tag`. The peak is never lowered.
    ///
    /// Releasing more than was attributed saturates at zero.
    pub fn track_deallocation(&self, tag: &str, bytes: usize) {
        let mut state = self.state.lock();
        let released = match state.by_tag.get_mut(tag) {
            Some(attributed) => {
                let released = bytes.min(*attributed);
                *attributed -= released;
                if *attributed == 0 {
                    state.by_tag.remove(tag);
                }
                released
            }
            None => 0,
        };
        state.current -= released;
    }

    /// Bytes currently attributed across all tags.
    #[must_use]
    pub fn current_usage(&self) -> usize {
        self.state.lock().current
    }

    /// Highest total ever observed.
    #[must_use]
    pub fn peak_usage(&self) -> usize {
        self.state.lock().peak
    }

    /// Bytes currently attributed to `tag`.
    #[must_use]
    pub fn usage_for(&self, tag: &str) -> usize {
        self.state.lock().by_tag.get(tag).copied().unwrap_or(0)
    }

    /// Snapshot of per-tag usage. Tags with nothing attributed are omitted.
    #[must_use]
    pub fn allocation_map(&self) -> BTreeMap<String, usize> {
        self.state.lock().by_tag.clone()
    }

    #[cfg(test)]
    pub(crate) fn reset(&self) {
        *self.state.lock() = MonitorState::default();
    }
}
