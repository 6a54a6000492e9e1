use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};

/// Per-component health counters. Every component exposes one; component
/// errors never unwind the Scheduler, they increment a counter here
/// instead.
#[derive(Debug, Default)]
pub struct HealthCounters {
    success: AtomicU64,
    transient_fail: AtomicU64,
    permanent_fail: AtomicU64,
    last_error: std::sync::Mutex<Option<(DateTime<Utc>, String)>>,
}

impl HealthCounters {
    pub fn record_success(&self) {
        self.success.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_transient_fail(&self, error: impl Into<String>) {
        self.transient_fail.fetch_add(1, Ordering::Relaxed);
        *self.last_error.lock().unwrap() = Some((Utc::now(), error.into()));
    }

    pub fn record_permanent_fail(&self, error: impl Into<String>) {
        self.permanent_fail.fetch_add(1, Ordering::Relaxed);
        *self.last_error.lock().unwrap() = Some((Utc::now(), error.into()));
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        HealthSnapshot {
            success: self.success.load(Ordering::Relaxed),
            transient_fail: self.transient_fail.load(Ordering::Relaxed),
            permanent_fail: self.permanent_fail.load(Ordering::Relaxed),
            last_error: self.last_error.lock().unwrap().clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HealthSnapshot {
    pub success: u64,
    pub transient_fail: u64,
    pub permanent_fail: u64,
    pub last_error: Option<(DateTime<Utc>, String)>,
}
