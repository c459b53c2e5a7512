use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::Instant;
use tracing::debug;

use crate::error::EngineError;
use crate::metrics::SharedMetrics;
use crate::report::{Report, ReportSink};

/// When an operation was issued: a monotonic instant for ordering and the
/// matching wall-clock time for printing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IssueTime {
    pub at: Instant,
    pub wall: DateTime<Utc>,
}

impl IssueTime {
    pub fn now() -> Self {
        IssueTime {
            at: Instant::now(),
            wall: Utc::now(),
        }
    }
}

/// Result of one write, tagged with its issue time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub issued: IssueTime,
    pub succeeded: bool,
}

impl Outcome {
    pub fn success(issued: IssueTime) -> Self {
        Outcome {
            issued,
            succeeded: true,
        }
    }

    pub fn failure(issued: IssueTime) -> Self {
        Outcome {
            issued,
            succeeded: false,
        }
    }
}

/// Heap entry ordered by issue instant, then by arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Slot {
    at: Instant,
    arrival: u64,
    succeeded: bool,
}

/// Success ratio over a full window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateSample {
    pub at: DateTime<Utc>,
    pub rate: f64,
    pub window: usize,
}

/// Bounded, issue-time ordered window of outcomes.
///
/// Outcomes may arrive out of issue order because writes complete out of
/// order, so the window is a min-heap on issue time: once it holds more than
/// `capacity` entries, the entry issued earliest goes, even if it was the last
/// one to arrive. The success count is kept as a running tally.
#[derive(Debug)]
pub struct SuccessRateTracker {
    window: BinaryHeap<Reverse<Slot>>,
    capacity: usize,
    successes: usize,
    arrivals: u64,
}

impl SuccessRateTracker {
    pub fn new(capacity: usize) -> Result<Self, EngineError> {
        if capacity == 0 {
            return Err(EngineError::InvalidArgument(
                "window capacity must be greater than zero".to_string(),
            ));
        }
        Ok(SuccessRateTracker {
            window: BinaryHeap::with_capacity(capacity + 1),
            capacity,
            successes: 0,
            arrivals: 0,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn successes(&self) -> usize {
        self.successes
    }

    /// Issue instant of the oldest outcome still in the window.
    pub fn oldest(&self) -> Option<Instant> {
        self.window.peek().map(|Reverse(slot)| slot.at)
    }

    /// Add an outcome. Returns a sample only when an eviction happened, so
    /// nothing is reported while the window is still filling.
    pub fn record(&mut self, outcome: Outcome) -> Option<RateSample> {
        let slot = Slot {
            at: outcome.issued.at,
            arrival: self.arrivals,
            succeeded: outcome.succeeded,
        };
        self.arrivals += 1;
        if slot.succeeded {
            self.successes += 1;
        }
        self.window.push(Reverse(slot));

        if self.window.len() <= self.capacity {
            return None;
        }

        let Reverse(evicted) = self.window.pop()?;
        if evicted.succeeded {
            self.successes -= 1;
        }

        Some(RateSample {
            at: outcome.issued.wall,
            rate: self.successes as f64 / self.window.len() as f64,
            window: self.window.len(),
        })
    }

    /// Drain `outcomes` until every sender is gone, reporting each sample.
    pub async fn run(
        mut self,
        mut outcomes: UnboundedReceiver<Outcome>,
        sink: Arc<dyn ReportSink>,
        metrics: SharedMetrics,
    ) -> Self {
        while let Some(outcome) = outcomes.recv().await {
            if let Some(sample) = self.record(outcome) {
                metrics.record_rate_sample();
                sink.report(Report::SuccessRate {
                    at: sample.at,
                    rate: sample.rate,
                    window: sample.window,
                });
            }
        }
        debug!(arrivals = self.arrivals, "outcome queue closed");
        self
    }
}
