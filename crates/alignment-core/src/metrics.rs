//! Global atomic counters for engine observability.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. at the end of a batch).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lightweight atomic counters.
pub struct Metrics {
    analyses_run: AtomicU64,
    companies_scored: AtomicU64,
    exclusions_recorded: AtomicU64,
    regroups_executed: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            analyses_run: AtomicU64::new(0),
            companies_scored: AtomicU64::new(0),
            exclusions_recorded: AtomicU64::new(0),
            regroups_executed: AtomicU64::new(0),
        }
    }

    pub fn inc_analyses(&self) {
        self.analyses_run.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "analyses_run", "counter incremented");
    }

    pub fn add_companies_scored(&self, n: u64) {
        self.companies_scored.fetch_add(n, Ordering::Relaxed);
        tracing::trace!(metric = "companies_scored", n, "counter incremented");
    }

    pub fn add_exclusions(&self, n: u64) {
        self.exclusions_recorded.fetch_add(n, Ordering::Relaxed);
        tracing::trace!(metric = "exclusions_recorded", n, "counter incremented");
    }

    pub fn inc_regroups(&self) {
        self.regroups_executed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "regroups_executed", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            analyses_run = self.analyses_run(),
            companies_scored = self.companies_scored(),
            exclusions_recorded = self.exclusions_recorded(),
            regroups_executed = self.regroups_executed(),
        );
    }

    pub fn analyses_run(&self) -> u64 {
        self.analyses_run.load(Ordering::Relaxed)
    }

    pub fn companies_scored(&self) -> u64 {
        self.companies_scored.load(Ordering::Relaxed)
    }

    pub fn exclusions_recorded(&self) -> u64 {
        self.exclusions_recorded.load(Ordering::Relaxed)
    }

    pub fn regroups_executed(&self) -> u64 {
        self.regroups_executed.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.analyses_run.store(0, Ordering::Relaxed);
        self.companies_scored.store(0, Ordering::Relaxed);
        self.exclusions_recorded.store(0, Ordering::Relaxed);
        self.regroups_executed.store(0, Ordering::Relaxed);
    }
}
