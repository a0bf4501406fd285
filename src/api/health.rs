//! Shared health state for the /health endpoint.
//! Updated by the alert service on every tick, read by the API.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

#[derive(Default)]
pub struct HealthState {
    /// Unix seconds of the last tick that reached the store (0 = none).
    last_tick_at_secs: AtomicU64,
    /// Fetch failures since the last successful fetch.
    consecutive_fetch_failures: AtomicU64,
    has_cycle: AtomicBool,
    last_cycle: AtomicI64,
    alerts_raised: AtomicU64,
}

#[derive(Debug, Serialize)]
pub struct HealthSnapshot {
    pub last_tick_at_secs: Option<u64>,
    pub consecutive_fetch_failures: u64,
    pub last_cycle: Option<i64>,
    pub alerts_raised: u64,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_fetch_ok(&self) {
        self.consecutive_fetch_failures.store(0, Ordering::Relaxed);
    }

    pub fn record_fetch_failure(&self) -> u64 {
        self.consecutive_fetch_failures.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record_tick(&self, cycle: i64, alerted: bool) {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        self.last_tick_at_secs.store(now, Ordering::Relaxed);
        self.last_cycle.store(cycle, Ordering::Relaxed);
        self.has_cycle.store(true, Ordering::Relaxed);
        if alerted {
            self.alerts_raised.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        let last_tick = self.last_tick_at_secs.load(Ordering::Relaxed);
        HealthSnapshot {
            last_tick_at_secs: (last_tick > 0).then_some(last_tick),
            consecutive_fetch_failures: self.consecutive_fetch_failures.load(Ordering::Relaxed),
            last_cycle: self
                .has_cycle
                .load(Ordering::Relaxed)
                .then(|| self.last_cycle.load(Ordering::Relaxed)),
            alerts_raised: self.alerts_raised.load(Ordering::Relaxed),
        }
    }
}
