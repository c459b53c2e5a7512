use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use lagcheck_config::{LoadConfig, WorkloadKind, MAX_IN_FLIGHT, MAX_RATE};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::checker::ConsistencyChecker;
use crate::dispatcher::{DispatchConfig, Dispatcher};
use crate::error::EngineError;
use crate::expected::ExpectedState;
use crate::metrics::{create_metrics, MetricsSnapshot, SharedMetrics};
use crate::report::ReportSink;
use crate::sequencer::Sequencer;
use crate::tracker::{IssueTime, SuccessRateTracker};
use crate::traits::StoreAdapter;

/// Runtime settings for an [`Engine`].
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Writes issued per second.
    pub rate: u32,
    /// Outcomes kept by the success-rate window.
    pub window: usize,
    /// Deadline for each write and each checker read.
    pub timeout: Duration,
    pub keyspace: u64,
    pub max_in_flight: usize,
    pub workload: WorkloadKind,
    /// Run the consistency checker alongside the writers.
    pub check: bool,
    /// Pause between checker passes.
    pub scan_pause: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig::from(&LoadConfig::default().effective())
    }
}

impl From<&LoadConfig> for EngineConfig {
    fn from(config: &LoadConfig) -> Self {
        EngineConfig {
            rate: config.rate,
            window: config.window,
            timeout: config.timeout.as_duration(),
            keyspace: config.keyspace,
            max_in_flight: config.max_in_flight,
            workload: config.workload,
            check: config.check,
            scan_pause: config.scan_pause.as_duration(),
        }
    }
}

impl EngineConfig {
    /// Validate a loaded configuration and resolve its defaults.
    pub fn from_load_config(config: &LoadConfig) -> Result<Self, EngineError> {
        config.validate_or_err()?;
        Ok(EngineConfig::from(&config.effective()))
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(1) / self.rate.max(1)
    }

    fn dispatch(&self) -> DispatchConfig {
        DispatchConfig {
            timeout: self.timeout,
            max_in_flight: self.max_in_flight,
        }
    }
}

/// Result of a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Ticks issued, which is also the number of writes submitted.
    pub ticks: u64,
    pub metrics: MetricsSnapshot,
}

/// Steady-rate write generator with an eventual-consistency oracle.
///
/// One tick per `1 / rate` seconds derives a write from the tick's sequence
/// number and hands it to the [`Dispatcher`]. Outcomes feed the
/// [`SuccessRateTracker`]; acknowledged writes feed the [`ExpectedState`],
/// which the [`ConsistencyChecker`] audits in the background.
pub struct Engine {
    config: EngineConfig,
    store: Arc<dyn StoreAdapter>,
    sink: Arc<dyn ReportSink>,
    sequencer: Sequencer,
    expected: ExpectedState,
    metrics: SharedMetrics,
    next_sequence: AtomicU64,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn StoreAdapter>,
        sink: Arc<dyn ReportSink>,
    ) -> Result<Self, EngineError> {
        if config.rate == 0 {
            return Err(EngineError::InvalidArgument(
                "rate must be at least one write per second".to_string(),
            ));
        }
        if config.rate > MAX_RATE {
            return Err(EngineError::InvalidArgument(format!(
                "rate must be at most {} writes per second",
                MAX_RATE
            )));
        }
        if config.window == 0 {
            return Err(EngineError::InvalidArgument(
                "window must hold at least one outcome".to_string(),
            ));
        }
        if config.timeout.is_zero() || config.max_in_flight == 0 {
            return Err(EngineError::InvalidArgument(
                "timeout and max_in_flight must be greater than zero".to_string(),
            ));
        }
        if config.max_in_flight > MAX_IN_FLIGHT {
            return Err(EngineError::InvalidArgument(format!(
                "max_in_flight must be at most {}",
                MAX_IN_FLIGHT
            )));
        }
        let sequencer = Sequencer::with_workload(config.keyspace, config.workload)?;

        Ok(Engine {
            config,
            store,
            sink,
            sequencer,
            expected: ExpectedState::new(),
            metrics: create_metrics(),
            next_sequence: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Values confirmed so far. Shared with the running engine.
    pub fn expected(&self) -> &ExpectedState {
        &self.expected
    }

    pub fn metrics(&self) -> &SharedMetrics {
        &self.metrics
    }

    /// Sequence number the next tick will use. Runs continue where the
    /// previous one stopped.
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence.load(Ordering::Relaxed)
    }

    /// A checker over this engine's store and expected state, reporting to `sink`.
    pub fn checker(&self, sink: Arc<dyn ReportSink>) -> ConsistencyChecker {
        ConsistencyChecker::new(
            Arc::clone(&self.store),
            self.expected.clone(),
            sink,
            Arc::clone(&self.metrics),
            self.config.timeout,
        )
        .with_scan_pause(self.config.scan_pause)
    }

    /// Issue writes until `ticks` have been submitted, or forever when `None`.
    ///
    /// Runs on one engine must not overlap.
    ///
    /// A bounded run waits for every in-flight write, lets the tracker drain
    /// the remaining outcomes, then stops the checker before returning.
    pub async fn run(&self, ticks: Option<u64>) -> Result<RunSummary, EngineError> {
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        let tracker = SuccessRateTracker::new(self.config.window)?;
        let dispatcher = Dispatcher::new(
            Arc::clone(&self.store),
            self.sequencer,
            self.expected.clone(),
            outcome_tx,
            Arc::clone(&self.sink),
            Arc::clone(&self.metrics),
            self.config.dispatch(),
        )?;

        let tracker_task = tokio::spawn(tracker.run(
            outcome_rx,
            Arc::clone(&self.sink),
            Arc::clone(&self.metrics),
        ));

        let (stop_tx, stop_rx) = watch::channel(false);
        let checker_task = self
            .config
            .check
            .then(|| tokio::spawn(self.checker(Arc::clone(&self.sink)).run(stop_rx)));

        info!(
            store = self.store.name(),
            rate = self.config.rate,
            window = self.config.window,
            keyspace = self.config.keyspace,
            workload = %self.config.workload,
            check = self.config.check,
            "load engine started"
        );

        let mut interval = tokio::time::interval(self.config.tick_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut issued = 0u64;
        while ticks.map_or(true, |limit| issued < limit) {
            interval.tick().await;
            self.metrics.record_tick();
            let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
            // The handle is dropped: the outcome travels through the channel.
            dispatcher.submit(sequence, IssueTime::now()).await;
            issued += 1;
        }

        dispatcher.drain().await;
        drop(dispatcher);

        if let Err(e) = tracker_task.await {
            warn!("success-rate tracker ended abnormally: {}", e);
        }

        let _ = stop_tx.send(true);
        if let Some(task) = checker_task {
            if let Err(e) = task.await {
                warn!("consistency checker ended abnormally: {}", e);
            }
        }

        let metrics = self.metrics.snapshot();
        info!(
            ticks = issued,
            writes = metrics.writes,
            write_errors = metrics.write_errors,
            violations = metrics.violations,
            "load engine stopped"
        );

        Ok(RunSummary {
            ticks: issued,
            metrics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::report::MemorySink;
    use crate::traits::{Key, Version, WriteOp};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tokio::time::Instant;

    #[derive(Default)]
    struct MapStore {
        data: Mutex<HashMap<Key, Version>>,
    }

    #[async_trait]
    impl StoreAdapter for MapStore {
        fn name(&self) -> &str {
            "map"
        }

        async fn write(&self, op: WriteOp, _deadline: Instant) -> Result<(), StoreError> {
            self.data.lock().unwrap().insert(op.key, op.value);
            Ok(())
        }

        async fn read(&self, key: Key, _deadline: Instant) -> Result<Option<Version>, StoreError> {
            Ok(self.data.lock().unwrap().get(&key).copied())
        }
    }

    fn small_config() -> EngineConfig {
        EngineConfig {
            window: 5,
            keyspace: 4,
            scan_pause: Duration::from_millis(50),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_matches_load_config() {
        let config = EngineConfig::default();
        assert_eq!(config.rate, 10);
        assert_eq!(config.window, 100);
        assert_eq!(config.timeout, Duration::from_secs(1));
        assert_eq!(config.tick_interval(), Duration::from_millis(100));
    }

    #[test]
    fn test_from_load_config_validates() {
        let bad = LoadConfig {
            window: 0,
            ..Default::default()
        };
        assert!(matches!(
            EngineConfig::from_load_config(&bad),
            Err(EngineError::Config(_))
        ));

        let insert_only = LoadConfig {
            workload: WorkloadKind::InsertOnly,
            ..Default::default()
        };
        assert!(!EngineConfig::from_load_config(&insert_only).unwrap().check);
    }

    #[test]
    fn test_new_rejects_zero_keyspace() {
        let config = EngineConfig {
            keyspace: 0,
            ..Default::default()
        };
        let result = Engine::new(config, Arc::new(MapStore::default()), Arc::new(MemorySink::new()));
        assert!(matches!(result, Err(EngineError::InvalidArgument(_))));
    }

    #[test]
    fn test_new_rejects_out_of_range_limits() {
        let store: Arc<dyn StoreAdapter> = Arc::new(MapStore::default());
        let sink: Arc<dyn ReportSink> = Arc::new(MemorySink::new());

        // 2e9 ticks per second would need a sub-nanosecond tick interval
        let too_fast = EngineConfig {
            rate: 2_000_000_000,
            ..Default::default()
        };
        assert!(matches!(
            Engine::new(too_fast, store.clone(), sink.clone()),
            Err(EngineError::InvalidArgument(_))
        ));

        let too_wide = EngineConfig {
            max_in_flight: usize::MAX,
            ..Default::default()
        };
        assert!(matches!(
            Engine::new(too_wide, store.clone(), sink.clone()),
            Err(EngineError::InvalidArgument(_))
        ));

        let at_limit = EngineConfig {
            rate: MAX_RATE,
            ..Default::default()
        };
        let engine = Engine::new(at_limit, store, sink).unwrap();
        assert_eq!(engine.config.tick_interval(), Duration::from_nanos(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_run() {
        let sink = Arc::new(MemorySink::new());
        let engine = Engine::new(small_config(), Arc::new(MapStore::default()), sink.clone()).unwrap();

        let start = Instant::now();
        let summary = engine.run(Some(20)).await.unwrap();

        assert_eq!(summary.ticks, 20);
        assert_eq!(engine.next_sequence(), 20);
        assert_eq!(summary.metrics.writes, 20);
        assert_eq!(summary.metrics.write_errors, 0);
        assert_eq!(summary.metrics.in_flight, 0);
        // first tick fires immediately, the rest every 100ms
        assert!(start.elapsed() >= Duration::from_millis(1900));

        let rates = sink.rates();
        assert_eq!(rates.len(), 15);
        assert!(rates.iter().all(|r| *r == 1.0));

        assert_eq!(engine.expected().len(), 4);
        assert_eq!(engine.expected().get(3), Some(4));
        assert!(sink.violations().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_checker_can_audit_after_run() {
        let engine = Engine::new(
            small_config(),
            Arc::new(MapStore::default()),
            Arc::new(MemorySink::new()),
        )
        .unwrap();
        engine.run(Some(8)).await.unwrap();

        let audit = Arc::new(MemorySink::new());
        let summary = engine.checker(audit.clone()).scan_once().await;
        assert_eq!(summary.checked, 4);
        assert_eq!(summary.violations, 0);
        assert!(audit.reports().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_run_continues_sequence() {
        let engine = Engine::new(
            small_config(),
            Arc::new(MapStore::default()),
            Arc::new(MemorySink::new()),
        )
        .unwrap();
        engine.run(Some(4)).await.unwrap();
        assert_eq!(engine.expected().get(1), Some(0));

        let summary = engine.run(Some(4)).await.unwrap();
        assert_eq!(summary.ticks, 4);
        assert_eq!(engine.next_sequence(), 8);
        assert_eq!(engine.expected().get(1), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_producer_only_skips_checker() {
        let config = EngineConfig {
            check: false,
            ..small_config()
        };
        let engine = Engine::new(config, Arc::new(MapStore::default()), Arc::new(MemorySink::new())).unwrap();
        let summary = engine.run(Some(10)).await.unwrap();
        assert_eq!(summary.metrics.scans, 0);
        assert_eq!(summary.metrics.reads, 0);
    }
}
