use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

struct Inner {
    expires_at: HashMap<u64, DateTime<Utc>>,
    insertion_order: VecDeque<u64>,
}

/// Bounded, TTL-expiring fingerprint cache. Rejects any candidate whose
/// fingerprint is already present and unexpired. Capacity
/// should be sized `>= 10 * active_strategies`; TTL `>= 2x` the slowest
/// configured timeframe.
pub struct Deduplicator {
    capacity: usize,
    ttl: Duration,
    inner: Mutex<Inner>,
}

impl Deduplicator {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            capacity,
            ttl,
            inner: Mutex::new(Inner {
                expires_at: HashMap::new(),
                insertion_order: VecDeque::new(),
            }),
        }
    }

    /// Returns `true` when `fingerprint` is a fresh (non-duplicate)
    /// arrival and records it; returns `false` when it is a duplicate
    /// still within its TTL.
    pub fn accept(&self, fingerprint: u64, now: DateTime<Utc>) -> bool {
        let mut inner = self.inner.lock().unwrap();
        inner.evict_expired(now, self.ttl);

        if let Some(seen_at) = inner.expires_at.get(&fingerprint) {
            if now - *seen_at < self.ttl {
                return false;
            }
        }

        if inner.expires_at.len() >= self.capacity {
            if let Some(oldest) = inner.insertion_order.pop_front() {
                inner.expires_at.remove(&oldest);
            }
        }
        inner.expires_at.insert(fingerprint, now);
        inner.insertion_order.push_back(fingerprint);
        true
    }
}

impl Inner {
    fn evict_expired(&mut self, now: DateTime<Utc>, ttl: Duration) {
        while let Some(&oldest) = self.insertion_order.front() {
            match self.expires_at.get(&oldest) {
                Some(seen_at) if now - *seen_at >= ttl => {
                    self.expires_at.remove(&oldest);
                    self.insertion_order.pop_front();
                }
                Some(_) => break,
                None => {
                    self.insertion_order.pop_front();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_identical_fingerprint_within_ttl_is_rejected() {
        let dedup = Deduplicator::new(100, Duration::minutes(30));
        let now = Utc::now();
        assert!(dedup.accept(42, now));
        assert!(!dedup.accept(42, now + Duration::minutes(1)));
    }

    #[test]
    fn same_fingerprint_after_ttl_is_accepted_again() {
        let dedup = Deduplicator::new(100, Duration::minutes(30));
        let now = Utc::now();
        assert!(dedup.accept(42, now));
        assert!(dedup.accept(42, now + Duration::minutes(31)));
    }

    #[test]
    fn capacity_evicts_oldest_entry() {
        let dedup = Deduplicator::new(2, Duration::hours(1));
        let now = Utc::now();
        assert!(dedup.accept(1, now));
        assert!(dedup.accept(2, now));
        assert!(dedup.accept(3, now)); // evicts fingerprint 1
        // fingerprint 1 should be treated as fresh again since it was evicted
        assert!(dedup.accept(1, now));
    }
}
