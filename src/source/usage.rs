//! Remaining-usage gauge
//!
//! Holds the last value the host reported after a remote call. One gauge per
//! search; sessions of the same search share it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

const UNKNOWN: u64 = u64::MAX;

/// Read-mostly view of the host's remaining usage
#[derive(Debug, Clone)]
pub struct UsageGauge {
    value: Arc<AtomicU64>,
}

impl Default for UsageGauge {
    fn default() -> Self {
        Self {
            value: Arc::new(AtomicU64::new(UNKNOWN)),
        }
    }
}

impl UsageGauge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the latest observed value
    pub fn record(&self, remaining: u64) {
        self.value.store(remaining, Ordering::Relaxed);
    }

    /// Last observed value, `None` before the first remote call
    pub fn get(&self) -> Option<u64> {
        match self.value.load(Ordering::Relaxed) {
            UNKNOWN => None,
            v => Some(v),
        }
    }
}
