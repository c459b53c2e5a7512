use std::sync::Arc;
use std::time::Duration;

use lagcheck_config::MAX_IN_FLIGHT;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use crate::error::{EngineError, StoreError};
use crate::expected::{ExpectedState, Recorded};
use crate::metrics::SharedMetrics;
use crate::report::{Report, ReportSink};
use crate::sequencer::Sequencer;
use crate::tracker::{IssueTime, Outcome};
use crate::traits::{StoreAdapter, WriteOp};

/// Configuration for the dispatcher.
#[derive(Debug, Clone, Copy)]
pub struct DispatchConfig {
    /// Deadline for each write.
    pub timeout: Duration,
    /// Maximum writes running at once; `submit` waits for a free slot.
    pub max_in_flight: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        DispatchConfig {
            timeout: Duration::from_secs(1),
            max_in_flight: 1024,
        }
    }
}

struct Inner {
    store: Arc<dyn StoreAdapter>,
    sequencer: Sequencer,
    expected: ExpectedState,
    outcomes: UnboundedSender<Outcome>,
    sink: Arc<dyn ReportSink>,
    metrics: SharedMetrics,
    config: DispatchConfig,
    permits: Arc<Semaphore>,
}

/// Turns sequence numbers into concurrent, time-bounded writes.
///
/// Every submitted sequence produces exactly one [`Outcome`] on the outcome
/// channel. Only acknowledged writes reach the [`ExpectedState`].
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn StoreAdapter>,
        sequencer: Sequencer,
        expected: ExpectedState,
        outcomes: UnboundedSender<Outcome>,
        sink: Arc<dyn ReportSink>,
        metrics: SharedMetrics,
        config: DispatchConfig,
    ) -> Result<Self, EngineError> {
        if config.max_in_flight == 0 {
            return Err(EngineError::InvalidArgument(
                "max_in_flight must allow at least one write".to_string(),
            ));
        }
        if config.max_in_flight > MAX_IN_FLIGHT.min(Semaphore::MAX_PERMITS) {
            return Err(EngineError::InvalidArgument(format!(
                "max_in_flight must be at most {}",
                MAX_IN_FLIGHT.min(Semaphore::MAX_PERMITS)
            )));
        }
        if config.timeout.is_zero() {
            return Err(EngineError::InvalidArgument(
                "write timeout must be greater than zero".to_string(),
            ));
        }
        let permits = Arc::new(Semaphore::new(config.max_in_flight));
        Ok(Dispatcher {
            inner: Arc::new(Inner {
                store,
                sequencer,
                expected,
                outcomes,
                sink,
                metrics,
                config,
                permits,
            }),
        })
    }

    /// Start the write for `sequence` in its own task.
    ///
    /// Waits only for an in-flight slot, never for the write itself.
    pub async fn submit(&self, sequence: u64, issued: IssueTime) -> JoinHandle<Outcome> {
        let permit = Arc::clone(&self.inner.permits).acquire_owned().await.ok();
        let inner = Arc::clone(&self.inner);
        let op = inner.sequencer.op_for(sequence);
        tokio::spawn(async move {
            let outcome = perform(&inner, op, issued).await;
            drop(permit);
            outcome
        })
    }

    /// Wait until every submitted write has finished.
    pub async fn drain(&self) {
        // new() caps max_in_flight at u32::MAX
        let all = self.inner.config.max_in_flight as u32;
        if let Ok(permits) = self.inner.permits.acquire_many(all).await {
            drop(permits);
        }
    }
}

async fn perform(inner: &Inner, op: WriteOp, issued: IssueTime) -> Outcome {
    inner.metrics.write_started();
    let started = Instant::now();
    let deadline = started + inner.config.timeout;

    let result = match tokio::time::timeout_at(deadline, inner.store.write(op, deadline)).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout {
            operation: format!("{} write", op.kind),
            key: op.key,
        }),
    };
    inner.metrics.record_write_latency(started.elapsed());

    let outcome = match result {
        Ok(()) => {
            if let Recorded::Stale { current } = inner.expected.record(op.key, op.value) {
                inner.metrics.record_stale_completion();
                debug!(
                    key = op.key,
                    value = op.value,
                    current, "acknowledged after a newer write for the same key"
                );
            }
            inner.metrics.record_write();
            Outcome::success(issued)
        }
        Err(e) => {
            let timed_out = e.is_timeout();
            inner.metrics.record_write_error(timed_out);
            inner.sink.report(Report::WriteFailed {
                op,
                reason: e.to_string(),
                timed_out,
            });
            Outcome::failure(issued)
        }
    };

    inner.metrics.write_finished();
    // The tracker is gone only after shutdown; the outcome is still returned.
    let _ = inner.outcomes.send(outcome);
    outcome
}
