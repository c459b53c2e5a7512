use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{debug, error, warn};

use crate::traits::{Key, Version, WriteOp};

/// The store exposed a value older than one it acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Violation {
    pub key: Key,
    pub expected: Version,
    pub actual: Version,
}

/// One event produced by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    /// Rolling success rate over a full window.
    SuccessRate {
        /// Wall-clock issue time of the outcome that triggered the sample.
        at: DateTime<Utc>,
        rate: f64,
        window: usize,
    },
    /// A write failed or timed out.
    WriteFailed {
        op: WriteOp,
        reason: String,
        timed_out: bool,
    },
    /// A checker read failed; retried on the next pass.
    ReadFailed { key: Key, reason: String },
    /// The store has no value for a key the client wrote.
    Missing { key: Key, expected: Version },
    /// The store is behind a confirmed write.
    Violation(Violation),
}

impl Report {
    /// Line printed for reports that form the tool's output contract.
    pub fn contract_line(&self) -> Option<String> {
        match self {
            Report::SuccessRate { at, rate, .. } => Some(format!(
                "TS: [{}], Success Rate: [{:.6}]",
                at.to_rfc3339_opts(SecondsFormat::Secs, true),
                rate
            )),
            Report::Violation(v) => Some(format!(
                "Inconsistency detected: key={} expected={} actual={}",
                v.key, v.expected, v.actual
            )),
            _ => None,
        }
    }
}

/// Destination for engine reports.
pub trait ReportSink: Send + Sync + 'static {
    fn report(&self, report: Report);
}

/// Prints contract lines to stdout and routes failures to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl ReportSink for StdoutSink {
    fn report(&self, report: Report) {
        match &report {
            Report::WriteFailed {
                op,
                reason,
                timed_out,
            } => {
                warn!(
                    key = op.key,
                    value = op.value,
                    kind = %op.kind,
                    timed_out = *timed_out,
                    "write failed: {}",
                    reason
                );
            }
            Report::ReadFailed { key, reason } => {
                debug!(key = *key, "read failed: {}", reason);
            }
            Report::Missing { key, expected } => {
                debug!(key = *key, expected = *expected, "key not visible in store yet");
            }
            Report::Violation(v) => {
                error!(
                    key = v.key,
                    expected = v.expected,
                    actual = v.actual,
                    "store is behind an acknowledged write"
                );
            }
            Report::SuccessRate { .. } => {}
        }

        if let Some(line) = report.contract_line() {
            println!("{}", line);
        }
    }
}

/// Collects reports in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    reports: Mutex<Vec<Report>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All reports received so far.
    pub fn reports(&self) -> Vec<Report> {
        self.reports
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn violations(&self) -> Vec<Violation> {
        self.reports()
            .into_iter()
            .filter_map(|r| match r {
                Report::Violation(v) => Some(v),
                _ => None,
            })
            .collect()
    }

    /// Success-rate samples in emission order.
    pub fn rates(&self) -> Vec<f64> {
        self.reports()
            .into_iter()
            .filter_map(|r| match r {
                Report::SuccessRate { rate, .. } => Some(rate),
                _ => None,
            })
            .collect()
    }

    pub fn write_failures(&self) -> usize {
        self.reports()
            .iter()
            .filter(|r| matches!(r, Report::WriteFailed { .. }))
            .count()
    }
}

impl ReportSink for MemorySink {
    fn report(&self, report: Report) {
        self.reports
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(report);
    }
}
