use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::expected::ExpectedState;
use crate::metrics::SharedMetrics;
use crate::report::{Report, ReportSink, Violation};
use crate::traits::{Key, StoreAdapter, Version};

/// Pause between passes while there is nothing to audit yet.
const IDLE_PAUSE: Duration = Duration::from_millis(10);

/// Verdict for one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyCheck {
    /// The store holds the expected value or a newer one.
    Consistent { actual: Version },
    /// The store holds an older value than the client confirmed.
    Violation(Violation),
    /// The store has no value for the key.
    Missing,
    /// The read failed or timed out.
    ReadFailed(String),
}

/// Totals for one pass over the expected state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub checked: usize,
    pub violations: usize,
    pub missing: usize,
    pub read_errors: usize,
}

/// Background auditor comparing the expected state against the store.
///
/// Each pass reads every key in a snapshot of the [`ExpectedState`] and flags
/// keys where the store returns a strictly smaller value. Equal or larger
/// values are fine: another write may already have moved the key on. Failed
/// reads and absent keys are reported and retried on the next pass.
pub struct ConsistencyChecker {
    store: Arc<dyn StoreAdapter>,
    expected: ExpectedState,
    sink: Arc<dyn ReportSink>,
    metrics: SharedMetrics,
    timeout: Duration,
    scan_pause: Duration,
}

impl ConsistencyChecker {
    pub fn new(
        store: Arc<dyn StoreAdapter>,
        expected: ExpectedState,
        sink: Arc<dyn ReportSink>,
        metrics: SharedMetrics,
        timeout: Duration,
    ) -> Self {
        ConsistencyChecker {
            store,
            expected,
            sink,
            metrics,
            timeout,
            scan_pause: Duration::ZERO,
        }
    }

    /// Sleep this long between full passes. Zero re-scans immediately.
    pub fn with_scan_pause(mut self, pause: Duration) -> Self {
        self.scan_pause = pause;
        self
    }

    /// Read `key` and compare it with `expected`. Reports the verdict.
    pub async fn check_key(&self, key: Key, expected: Version) -> KeyCheck {
        let deadline = Instant::now() + self.timeout;
        let read = tokio::time::timeout_at(deadline, self.store.read(key, deadline)).await;

        let verdict = match read {
            Err(_) => KeyCheck::ReadFailed(format!("read timed out after {:?}", self.timeout)),
            Ok(Err(e)) => KeyCheck::ReadFailed(e.to_string()),
            Ok(Ok(None)) => KeyCheck::Missing,
            Ok(Ok(Some(actual))) if actual < expected => KeyCheck::Violation(Violation {
                key,
                expected,
                actual,
            }),
            Ok(Ok(Some(actual))) => KeyCheck::Consistent { actual },
        };

        match &verdict {
            KeyCheck::Consistent { .. } => self.metrics.record_read(),
            KeyCheck::Violation(v) => {
                self.metrics.record_violation();
                self.sink.report(Report::Violation(*v));
            }
            KeyCheck::Missing => {
                self.metrics.record_missing();
                self.sink.report(Report::Missing { key, expected });
            }
            KeyCheck::ReadFailed(reason) => {
                self.metrics.record_read_error();
                self.sink.report(Report::ReadFailed {
                    key,
                    reason: reason.clone(),
                });
            }
        }

        verdict
    }

    /// One full pass over the current expected state.
    pub async fn scan_once(&self) -> ScanSummary {
        self.scan(None).await
    }

    async fn scan(&self, stop: Option<&watch::Receiver<bool>>) -> ScanSummary {
        let mut summary = ScanSummary::default();

        for (key, expected) in self.expected.snapshot() {
            if stop.is_some_and(|s| *s.borrow()) {
                break;
            }
            summary.checked += 1;
            match self.check_key(key, expected).await {
                KeyCheck::Consistent { .. } => {}
                KeyCheck::Violation(_) => summary.violations += 1,
                KeyCheck::Missing => summary.missing += 1,
                KeyCheck::ReadFailed(_) => summary.read_errors += 1,
            }
        }

        self.metrics.record_scan();
        summary
    }

    /// Re-scan until `shutdown` turns true or its sender is dropped.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(store = self.store.name(), "consistency checker started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let summary = self.scan(Some(&shutdown)).await;
            if summary.violations > 0 {
                debug!(
                    checked = summary.checked,
                    violations = summary.violations,
                    "scan pass found violations"
                );
            }

            let pause = if summary.checked == 0 {
                IDLE_PAUSE.max(self.scan_pause)
            } else {
                self.scan_pause
            };

            if pause.is_zero() {
                if shutdown.has_changed().is_err() {
                    break;
                }
                tokio::task::yield_now().await;
                continue;
            }

            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("consistency checker stopped");
    }
}
