//! Director statistics
//!
//! Process-scoped counters, created fresh at startup and passed explicitly
//! into the director and the status server. Counters are atomic so the
//! dispatch pool and the status server can touch them without locks.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use stockpile_common::DirectiveKind;

/// Live counters for everything the director has done this process
#[derive(Debug, Default)]
pub struct DirectorStats {
    cache_success: AtomicU64,
    cache_failure: AtomicU64,
    eject_success: AtomicU64,
    eject_failure: AtomicU64,
    rate_limited_cache: AtomicU64,
    rate_limited_eject: AtomicU64,
    dry_run_skipped: AtomicU64,
    poll_success: AtomicU64,
    poll_failure: AtomicU64,
    malformed_records: AtomicU64,
    strategy_errors: AtomicU64,
    eligible_nodes: AtomicU64,
    cached_nodes: AtomicU64,
    cache_target: AtomicU64,
}

impl DirectorStats {
    /// Record a successfully dispatched directive
    pub fn record_dispatch_success(&self, kind: DirectiveKind) {
        match kind {
            DirectiveKind::Cache => self.cache_success.fetch_add(1, Ordering::Relaxed),
            DirectiveKind::Eject => self.eject_success.fetch_add(1, Ordering::Relaxed),
        };
    }

    /// Record a directive the node client failed to execute
    pub fn record_dispatch_failure(&self, kind: DirectiveKind) {
        match kind {
            DirectiveKind::Cache => self.cache_failure.fetch_add(1, Ordering::Relaxed),
            DirectiveKind::Eject => self.eject_failure.fetch_add(1, Ordering::Relaxed),
        };
    }

    /// Record a directive dropped by the rate limiter
    pub fn record_rate_limited(&self, kind: DirectiveKind) {
        match kind {
            DirectiveKind::Cache => self.rate_limited_cache.fetch_add(1, Ordering::Relaxed),
            DirectiveKind::Eject => self.rate_limited_eject.fetch_add(1, Ordering::Relaxed),
        };
    }

    /// Record a directive suppressed by dry-run mode
    pub fn record_dry_run_skip(&self) {
        self.dry_run_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful snapshot poll
    pub fn record_poll_success(&self) {
        self.poll_success.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed snapshot poll
    pub fn record_poll_failure(&self) {
        self.poll_failure.fetch_add(1, Ordering::Relaxed);
    }

    /// Record malformed records skipped during snapshot building
    pub fn add_malformed_records(&self, count: u64) {
        self.malformed_records.fetch_add(count, Ordering::Relaxed);
    }

    /// Record a strategy evaluation that produced no directives
    pub fn record_strategy_error(&self) {
        self.strategy_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Update the fleet gauges after a strategy evaluation
    pub fn set_fleet_gauges(&self, eligible: u64, cached: u64, target: u64) {
        self.eligible_nodes.store(eligible, Ordering::Relaxed);
        self.cached_nodes.store(cached, Ordering::Relaxed);
        self.cache_target.store(target, Ordering::Relaxed);
    }

    /// Consistent-enough point-in-time view of all counters
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            cache_success: self.cache_success.load(Ordering::Relaxed),
            cache_failure: self.cache_failure.load(Ordering::Relaxed),
            eject_success: self.eject_success.load(Ordering::Relaxed),
            eject_failure: self.eject_failure.load(Ordering::Relaxed),
            rate_limited_cache: self.rate_limited_cache.load(Ordering::Relaxed),
            rate_limited_eject: self.rate_limited_eject.load(Ordering::Relaxed),
            dry_run_skipped: self.dry_run_skipped.load(Ordering::Relaxed),
            poll_success: self.poll_success.load(Ordering::Relaxed),
            poll_failure: self.poll_failure.load(Ordering::Relaxed),
            malformed_records: self.malformed_records.load(Ordering::Relaxed),
            strategy_errors: self.strategy_errors.load(Ordering::Relaxed),
            eligible_nodes: self.eligible_nodes.load(Ordering::Relaxed),
            cached_nodes: self.cached_nodes.load(Ordering::Relaxed),
            cache_target: self.cache_target.load(Ordering::Relaxed),
        }
    }
}

/// Serializable view of the director counters
#[derive(Clone, Debug, Serialize)]
pub struct StatsSnapshot {
    pub cache_success: u64,
    pub cache_failure: u64,
    pub eject_success: u64,
    pub eject_failure: u64,
    pub rate_limited_cache: u64,
    pub rate_limited_eject: u64,
    pub dry_run_skipped: u64,
    pub poll_success: u64,
    pub poll_failure: u64,
    pub malformed_records: u64,
    pub strategy_errors: u64,
    pub eligible_nodes: u64,
    pub cached_nodes: u64,
    pub cache_target: u64,
}

impl StatsSnapshot {
    /// One-line summary for the per-cycle statistics log
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "cache {}/{} ok/failed, eject {}/{} ok/failed, {} rate-limited, \
             {} dry-run skipped, cached {} of target {}",
            self.cache_success,
            self.cache_failure,
            self.eject_success,
            self.eject_failure,
            self.rate_limited_cache + self.rate_limited_eject,
            self.dry_run_skipped,
            self.cached_nodes,
            self.cache_target,
        )
    }
}
