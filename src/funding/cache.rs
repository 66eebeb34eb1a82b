use std::collections::{HashSet, VecDeque};

pub const ALERT_CACHE_CAP: usize = 20_000;

/// Bounded set of composite alert keys guaranteeing at-most-once emission
/// per logical funding event. Entries are never expired by time, only by
/// cap-driven oldest-first eviction or an explicit clear.
#[derive(Debug)]
pub struct AlertCache {
    seen: HashSet<String>,
    order: VecDeque<String>,
    cap: usize,
}

impl Default for AlertCache {
    fn default() -> Self {
        Self::with_cap(ALERT_CACHE_CAP)
    }
}

impl AlertCache {
    pub fn with_cap(cap: usize) -> Self {
        Self {
            seen: HashSet::new(),
            order: VecDeque::new(),
            cap: cap.max(1),
        }
    }

    pub fn key(kind: &str, exchange: &str, symbol: &str, next_time_ms: i64, extra: &str) -> String {
        format!("{kind}:{exchange}:{symbol}:{next_time_ms}:{extra}")
    }

    /// Inserts the key; returns false when it was already present. A false
    /// return is the normal silent-suppression path, not an error.
    pub fn insert(&mut self, key: String) -> bool {
        if self.seen.contains(&key) {
            return false;
        }
        self.seen.insert(key.clone());
        self.order.push_back(key);
        while self.order.len() > self.cap {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        true
    }

    pub fn clear(&mut self) {
        self.seen.clear();
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
