mod checker;
mod dispatcher;
mod engine;
mod error;
mod expected;
mod metrics;
mod report;
mod sequencer;
mod tracker;
mod traits;

pub use checker::{ConsistencyChecker, KeyCheck, ScanSummary};
pub use dispatcher::{DispatchConfig, Dispatcher};
pub use engine::{Engine, EngineConfig, RunSummary};
pub use error::{EngineError, StoreError};
pub use expected::{ExpectedState, Recorded};
pub use metrics::{create_metrics, EngineMetrics, MetricsSnapshot, SharedMetrics};
pub use report::{MemorySink, Report, ReportSink, StdoutSink, Violation};
pub use sequencer::Sequencer;
pub use tracker::{IssueTime, Outcome, RateSample, SuccessRateTracker};
pub use traits::{Key, StoreAdapter, Version, WriteKind, WriteOp};
