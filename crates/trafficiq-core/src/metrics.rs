//! Process-wide pipeline counters.
//!
//! Incremented at the call site; [`Metrics::flush`] emits the current values
//! as one `info!` event.

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    runs_completed: AtomicU64,
    runs_failed: AtomicU64,
    ocr_fallbacks: AtomicU64,
    watchlist_hits: AtomicU64,
    cases_created: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    pub runs_completed: u64,
    pub runs_failed: u64,
    pub ocr_fallbacks: u64,
    pub watchlist_hits: u64,
    pub cases_created: u64,
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            runs_completed: AtomicU64::new(0),
            runs_failed: AtomicU64::new(0),
            ocr_fallbacks: AtomicU64::new(0),
            watchlist_hits: AtomicU64::new(0),
            cases_created: AtomicU64::new(0),
        }
    }

    pub fn inc_runs_completed(&self) {
        self.runs_completed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "runs_completed", "counter incremented");
    }

    pub fn inc_runs_failed(&self) {
        self.runs_failed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "runs_failed", "counter incremented");
    }

    pub fn inc_ocr_fallbacks(&self) {
        self.ocr_fallbacks.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "ocr_fallbacks", "counter incremented");
    }

    pub fn inc_watchlist_hits(&self) {
        self.watchlist_hits.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "watchlist_hits", "counter incremented");
    }

    pub fn inc_cases_created(&self) {
        self.cases_created.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "cases_created", "counter incremented");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            runs_completed: self.runs_completed.load(Ordering::Relaxed),
            runs_failed: self.runs_failed.load(Ordering::Relaxed),
            ocr_fallbacks: self.ocr_fallbacks.load(Ordering::Relaxed),
            watchlist_hits: self.watchlist_hits.load(Ordering::Relaxed),
            cases_created: self.cases_created.load(Ordering::Relaxed),
        }
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        let s = self.snapshot();
        tracing::info!(
            metric = "flush",
            runs_completed = s.runs_completed,
            runs_failed = s.runs_failed,
            ocr_fallbacks = s.ocr_fallbacks,
            watchlist_hits = s.watchlist_hits,
            cases_created = s.cases_created,
        );
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.runs_completed.store(0, Ordering::Relaxed);
        self.runs_failed.store(0, Ordering::Relaxed);
        self.ocr_fallbacks.store(0, Ordering::Relaxed);
        self.watchlist_hits.store(0, Ordering::Relaxed);
        self.cases_created.store(0, Ordering::Relaxed);
    }
}
