use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;

/// Counters for a load run.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    // Dispatch
    pub ticks: AtomicU64,
    pub in_flight: AtomicU64,

    // Write outcomes
    pub writes: AtomicU64,
    pub write_errors: AtomicU64,
    pub write_timeouts: AtomicU64,
    pub stale_completions: AtomicU64,

    // Checker
    pub scans: AtomicU64,
    pub reads: AtomicU64,
    pub read_errors: AtomicU64,
    pub missing: AtomicU64,
    pub violations: AtomicU64,

    // Tracker
    pub rate_samples: AtomicU64,

    // Held only for a push or a copy, never across an await.
    latencies: Mutex<LatencyTracker>,
}

/// Bounded sample of write latencies.
#[derive(Debug, Default)]
struct LatencyTracker {
    write_latencies: Vec<Duration>,
    next: usize,
    max_samples: usize,
}

impl LatencyTracker {
    fn new(max_samples: usize) -> Self {
        LatencyTracker {
            write_latencies: Vec::with_capacity(max_samples),
            next: 0,
            max_samples,
        }
    }

    fn record_write(&mut self, duration: Duration) {
        if self.max_samples == 0 {
            return;
        }
        if self.write_latencies.len() < self.max_samples {
            self.write_latencies.push(duration);
        } else {
            self.write_latencies[self.next] = duration;
        }
        self.next = (self.next + 1) % self.max_samples;
    }

    fn write_avg(&self) -> Option<Duration> {
        if self.write_latencies.is_empty() {
            None
        } else {
            let total: Duration = self.write_latencies.iter().sum();
            Some(total / self.write_latencies.len() as u32)
        }
    }

    fn write_p99(&self) -> Option<Duration> {
        percentile(&self.write_latencies, 99)
    }
}

fn percentile(samples: &[Duration], p: usize) -> Option<Duration> {
    if samples.is_empty() {
        return None;
    }
    let mut sorted: Vec<_> = samples.to_vec();
    sorted.sort();
    let idx = (sorted.len() * p / 100).min(sorted.len() - 1);
    Some(sorted[idx])
}

impl EngineMetrics {
    /// Create a new metrics instance.
    pub fn new() -> Self {
        EngineMetrics {
            latencies: Mutex::new(LatencyTracker::new(1000)),
            ..Default::default()
        }
    }

    pub fn record_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn write_started(&self) {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
    }

    pub fn write_finished(&self) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
    }

    /// Record an acknowledged write.
    pub fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed write; `timed_out` also bumps the timeout counter.
    pub fn record_write_error(&self, timed_out: bool) {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.write_errors.fetch_add(1, Ordering::Relaxed);
        if timed_out {
            self.write_timeouts.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_stale_completion(&self) {
        self.stale_completions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write_latency(&self, duration: Duration) {
        self.latencies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .record_write(duration);
    }

    pub fn record_scan(&self) {
        self.scans.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_read(&self) {
        self.reads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_read_error(&self) {
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.read_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_missing(&self) {
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.missing.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_violation(&self) {
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.violations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rate_sample(&self) {
        self.rate_samples.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of the current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let (write_avg, write_p99) = {
            let latencies = self.latencies.lock().unwrap_or_else(|e| e.into_inner());
            (latencies.write_avg(), latencies.write_p99())
        };

        MetricsSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            in_flight: self.in_flight.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            write_errors: self.write_errors.load(Ordering::Relaxed),
            write_timeouts: self.write_timeouts.load(Ordering::Relaxed),
            stale_completions: self.stale_completions.load(Ordering::Relaxed),
            write_latency_avg_ms: write_avg.map(|d| d.as_secs_f64() * 1000.0),
            write_latency_p99_ms: write_p99.map(|d| d.as_secs_f64() * 1000.0),
            scans: self.scans.load(Ordering::Relaxed),
            reads: self.reads.load(Ordering::Relaxed),
            read_errors: self.read_errors.load(Ordering::Relaxed),
            missing: self.missing.load(Ordering::Relaxed),
            violations: self.violations.load(Ordering::Relaxed),
            rate_samples: self.rate_samples.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of metrics.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub ticks: u64,
    pub in_flight: u64,

    pub writes: u64,
    pub write_errors: u64,
    pub write_timeouts: u64,
    pub stale_completions: u64,
    pub write_latency_avg_ms: Option<f64>,
    pub write_latency_p99_ms: Option<f64>,

    pub scans: u64,
    pub reads: u64,
    pub read_errors: u64,
    pub missing: u64,
    pub violations: u64,

    pub rate_samples: u64,
}

impl MetricsSnapshot {
    /// Fraction of completed writes that succeeded over the whole run.
    pub fn overall_success_rate(&self) -> Option<f64> {
        if self.writes == 0 {
            None
        } else {
            Some((self.writes - self.write_errors) as f64 / self.writes as f64)
        }
    }
}

/// Shared metrics instance.
pub type SharedMetrics = Arc<EngineMetrics>;

/// Create a new shared metrics instance.
pub fn create_metrics() -> SharedMetrics {
    Arc::new(EngineMetrics::new())
}
