//! Per-kind directive rate limiting
//!
//! Cache and eject directives are limited independently, each by a fixed
//! window counter. Directives beyond the limit are dropped for the cycle,
//! never queued: the strategy re-derives anything still needed on a later
//! cycle, so a dropped directive costs latency, not correctness.

use parking_lot::Mutex;
use std::time::{Duration, Instant};
use stockpile_common::DirectiveKind;
use stockpile_common::config::DirectorConfig;

/// Fixed-window counter for one directive kind
#[derive(Debug)]
struct RateWindow {
    count: u64,
    window_start: Instant,
    limit: u64,
    period: Duration,
}

impl RateWindow {
    fn new(limit: u64, period: Duration) -> Self {
        Self {
            count: 0,
            window_start: Instant::now(),
            limit,
            period,
        }
    }

    /// Admit one request if the current window has room
    fn allow(&mut self) -> bool {
        if self.window_start.elapsed() >= self.period {
            self.count = 0;
            self.window_start = Instant::now();
        }
        if self.count < self.limit {
            self.count += 1;
            true
        } else {
            false
        }
    }
}

/// Independent fixed windows for cache and eject directives
#[derive(Debug)]
pub struct DirectiveRateLimiter {
    cache: Mutex<RateWindow>,
    eject: Mutex<RateWindow>,
}

impl DirectiveRateLimiter {
    /// Create a limiter with explicit per-kind limits and periods
    #[must_use]
    pub fn new(
        cache_limit: u64,
        cache_period: Duration,
        eject_limit: u64,
        eject_period: Duration,
    ) -> Self {
        Self {
            cache: Mutex::new(RateWindow::new(cache_limit, cache_period)),
            eject: Mutex::new(RateWindow::new(eject_limit, eject_period)),
        }
    }

    /// Create a limiter from the `[director]` configuration section
    #[must_use]
    pub fn from_config(config: &DirectorConfig) -> Self {
        Self::new(
            config.cache_directive_rate_limit,
            config.cache_limiting_period(),
            config.eject_directive_rate_limit,
            config.eject_limiting_period(),
        )
    }

    /// Whether one more directive of this kind may be dispatched now
    ///
    /// An allowed request consumes window budget; a denied one does not.
    pub fn allow(&self, kind: DirectiveKind) -> bool {
        match kind {
            DirectiveKind::Cache => self.cache.lock().allow(),
            DirectiveKind::Eject => self.eject.lock().allow(),
        }
    }
}
