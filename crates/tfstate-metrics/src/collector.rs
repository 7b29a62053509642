//! Request metrics collector.
//!
//! Counters are atomics; a read-mostly map holds one bucket per HTTP
//! method. A method is inserted on first use, after which recording only
//! takes the read guard. Methods outside [`KNOWN_METHODS`] share the
//! [`OTHER_METHOD`] bucket, so the map never grows past a fixed size.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

/// Histogram upper bounds in seconds (the Prometheus client defaults).
pub const DEFAULT_BUCKETS: [f64; 11] = [0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

/// Methods that get their own series: the standard set plus the state
/// protocol's `LOCK` and `UNLOCK`.
pub const KNOWN_METHODS: [&str; 11] = [
    "GET", "HEAD", "POST", "PUT", "DELETE", "CONNECT", "OPTIONS", "TRACE", "PATCH", "LOCK", "UNLOCK",
];

/// Label for any method not in [`KNOWN_METHODS`].
pub const OTHER_METHOD: &str = "OTHER";

/// Metric label for a request method.
pub fn method_label(method: &str) -> &'static str {
    KNOWN_METHODS
        .iter()
        .find(|known| **known == method)
        .copied()
        .unwrap_or(OTHER_METHOD)
}

/// Per-method counters.
struct MethodMetrics {
    /// Request count per response status.
    by_status: Mutex<BTreeMap<u16, u64>>,
    /// Non-cumulative hits per bucket; the last slot is `+Inf`.
    buckets: [AtomicU64; DEFAULT_BUCKETS.len() + 1],
    count: AtomicU64,
    sum_micros: AtomicU64,
}

impl MethodMetrics {
    fn new() -> Self {
        Self {
            by_status: Mutex::new(BTreeMap::new()),
            buckets: std::array::from_fn(|_| AtomicU64::new(0)),
            count: AtomicU64::new(0),
            sum_micros: AtomicU64::new(0),
        }
    }

    fn record(&self, status: u16, elapsed: Duration) {
        *self
            .by_status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(status)
            .or_insert(0) += 1;

        let secs = elapsed.as_secs_f64();
        let slot = DEFAULT_BUCKETS
            .iter()
            .position(|bound| secs <= *bound)
            .unwrap_or(DEFAULT_BUCKETS.len());
        self.buckets[slot].fetch_add(1, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
        self.sum_micros
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    fn snapshot(&self, method: &str) -> MethodSnapshot {
        let mut cumulative = 0;
        let buckets = self
            .buckets
            .iter()
            .map(|b| {
                cumulative += b.load(Ordering::Relaxed);
                cumulative
            })
            .collect();

        MethodSnapshot {
            method: method.to_string(),
            by_status: self
                .by_status
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
            cumulative_buckets: buckets,
            count: self.count.load(Ordering::Relaxed),
            sum_seconds: self.sum_micros.load(Ordering::Relaxed) as f64 / 1_000_000.0,
        }
    }
}

/// Point-in-time view of one method's counters.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodSnapshot {
    pub method: String,
    pub by_status: BTreeMap<u16, u64>,
    /// Cumulative counts aligned with [`DEFAULT_BUCKETS`], then `+Inf`.
    pub cumulative_buckets: Vec<u64>,
    pub count: u64,
    pub sum_seconds: f64,
}

/// Collects request counts and latencies for the HTTP surface.
#[derive(Default)]
pub struct HttpMetrics {
    methods: RwLock<HashMap<&'static str, Arc<MethodMetrics>>>,
}

impl HttpMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one completed request.
    pub fn record(&self, method: &str, status: u16, elapsed: Duration) {
        let label = method_label(method);
        let existing = self
            .methods
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(label)
            .cloned();

        let bucket = match existing {
            Some(bucket) => bucket,
            None => self
                .methods
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .entry(label)
                .or_insert_with(|| Arc::new(MethodMetrics::new()))
                .clone(),
        };
        bucket.record(status, elapsed);
    }

    /// Snapshot every method, sorted by method name.
    pub fn snapshot(&self) -> Vec<MethodSnapshot> {
        let methods = self.methods.read().unwrap_or_else(PoisonError::into_inner);
        let mut snapshots: Vec<MethodSnapshot> =
            methods.iter().map(|(method, m)| m.snapshot(method)).collect();
        snapshots.sort_by(|a, b| a.method.cmp(&b.method));
        snapshots
    }

    /// Total requests recorded under `method`'s label across all statuses.
    pub fn request_count(&self, method: &str) -> u64 {
        self.methods
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(method_label(method))
            .map(|m| m.count.load(Ordering::Relaxed))
            .unwrap_or(0)
    }
}
