use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Thread-safe counters for the trading engine.
#[derive(Debug)]
pub struct EngineMetrics {
    // Counters
    symbols_scanned: AtomicU64,
    setups_found: AtomicU64,
    admissions: AtomicU64,
    rejections: AtomicU64,
    orders_submitted: AtomicU64,
    stop_replacements: AtomicU64,
    force_closes: AtomicU64,
    data_errors: AtomicU64,

    // Timestamps
    inner: RwLock<MetricsInner>,
}

#[derive(Debug)]
struct MetricsInner {
    start_time: Instant,
    last_scan_time: Option<Instant>,
    last_entry_time: Option<Instant>,
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self {
            symbols_scanned: AtomicU64::new(0),
            setups_found: AtomicU64::new(0),
            admissions: AtomicU64::new(0),
            rejections: AtomicU64::new(0),
            orders_submitted: AtomicU64::new(0),
            stop_replacements: AtomicU64::new(0),
            force_closes: AtomicU64::new(0),
            data_errors: AtomicU64::new(0),
            inner: RwLock::new(MetricsInner {
                start_time: Instant::now(),
                last_scan_time: None,
                last_entry_time: None,
            }),
        }
    }

    // --- Increment methods ---

    pub fn inc_symbols_scanned(&self, n: u64) {
        self.symbols_scanned.fetch_add(n, Ordering::Relaxed);
        self.inner.write().last_scan_time = Some(Instant::now());
    }

    pub fn inc_setups_found(&self) {
        self.setups_found.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_admissions(&self) {
        self.admissions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_rejections(&self) {
        self.rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_orders_submitted(&self) {
        self.orders_submitted.fetch_add(1, Ordering::Relaxed);
        self.inner.write().last_entry_time = Some(Instant::now());
    }

    pub fn inc_stop_replacements(&self) {
        self.stop_replacements.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_force_closes(&self) {
        self.force_closes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_data_errors(&self) {
        self.data_errors.fetch_add(1, Ordering::Relaxed);
    }

    // --- Getter methods ---

    pub fn symbols_scanned(&self) -> u64 {
        self.symbols_scanned.load(Ordering::Relaxed)
    }

    pub fn setups_found(&self) -> u64 {
        self.setups_found.load(Ordering::Relaxed)
    }

    pub fn admissions(&self) -> u64 {
        self.admissions.load(Ordering::Relaxed)
    }

    pub fn rejections(&self) -> u64 {
        self.rejections.load(Ordering::Relaxed)
    }

    pub fn orders_submitted(&self) -> u64 {
        self.orders_submitted.load(Ordering::Relaxed)
    }

    pub fn stop_replacements(&self) -> u64 {
        self.stop_replacements.load(Ordering::Relaxed)
    }

    pub fn force_closes(&self) -> u64 {
        self.force_closes.load(Ordering::Relaxed)
    }

    pub fn data_errors(&self) -> u64 {
        self.data_errors.load(Ordering::Relaxed)
    }

    pub fn uptime_secs(&self) -> f64 {
        self.inner.read().start_time.elapsed().as_secs_f64()
    }

    pub fn secs_since_last_scan(&self) -> Option<f64> {
        self.inner
            .read()
            .last_scan_time
            .map(|t| t.elapsed().as_secs_f64())
    }

    /// Generate a snapshot of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            symbols_scanned: self.symbols_scanned(),
            setups_found: self.setups_found(),
            admissions: self.admissions(),
            rejections: self.rejections(),
            orders_submitted: self.orders_submitted(),
            stop_replacements: self.stop_replacements(),
            force_closes: self.force_closes(),
            data_errors: self.data_errors(),
            uptime_secs: self.uptime_secs(),
            secs_since_last_scan: self.secs_since_last_scan(),
        }
    }
}

/// A point-in-time snapshot of engine counters.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub symbols_scanned: u64,
    pub setups_found: u64,
    pub admissions: u64,
    pub rejections: u64,
    pub orders_submitted: u64,
    pub stop_replacements: u64,
    pub force_closes: u64,
    pub data_errors: u64,
    pub uptime_secs: f64,
    pub secs_since_last_scan: Option<f64>,
}

/// Shared metrics handle.
pub type SharedMetrics = Arc<EngineMetrics>;

/// Create a new shared metrics collector.
pub fn create_metrics() -> SharedMetrics {
    Arc::new(EngineMetrics::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let metrics = EngineMetrics::new();
        metrics.inc_symbols_scanned(5);
        metrics.inc_setups_found();
        metrics.inc_admissions();
        metrics.inc_rejections();
        metrics.inc_orders_submitted();
        metrics.inc_stop_replacements();
        metrics.inc_force_closes();
        metrics.inc_data_errors();

        let snap = metrics.snapshot();
        assert_eq!(snap.symbols_scanned, 5);
        assert_eq!(snap.setups_found, 1);
        assert_eq!(snap.admissions, 1);
        assert_eq!(snap.rejections, 1);
        assert_eq!(snap.orders_submitted, 1);
        assert_eq!(snap.stop_replacements, 1);
        assert_eq!(snap.force_closes, 1);
        assert_eq!(snap.data_errors, 1);
    }

    #[test]
    fn scan_timestamp_tracked() {
        let metrics = EngineMetrics::new();
        assert!(metrics.secs_since_last_scan().is_none());
        metrics.inc_symbols_scanned(1);
        assert!(metrics.secs_since_last_scan().is_some());
    }
}
