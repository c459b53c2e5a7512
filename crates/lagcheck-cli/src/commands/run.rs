use std::sync::Arc;

use clap::Args;
use lagcheck_config::{HumanDuration, LoadConfig, WorkloadKind};
use lagcheck_core::{Engine, EngineConfig, StdoutSink};
use tracing::info;

use crate::store::{build_store, FaultOverrides};

#[derive(Args)]
pub struct RunArgs {
    /// Stop after this many ticks (runs until interrupted if omitted)
    #[arg(short, long)]
    ticks: Option<u64>,
    /// Writes per second
    #[arg(short, long)]
    rate: Option<u32>,
    /// Capacity of the success-rate window
    #[arg(short, long)]
    window: Option<usize>,
    /// Number of distinct keys
    #[arg(short, long)]
    keyspace: Option<u64>,
    /// Workload: versioned or insert-only
    #[arg(long)]
    workload: Option<WorkloadKind>,
    /// Only produce writes, skip the consistency checker
    #[arg(long)]
    no_check: bool,
    /// Probability of an injected read or write error (0.0-1.0)
    #[arg(long)]
    error_rate: Option<f64>,
    /// Fail every n-th update
    #[arg(long)]
    fail_every: Option<u64>,
    /// Latency added to every store operation (e.g. 250ms)
    #[arg(long)]
    latency: Option<HumanDuration>,
    /// Seed for injected faults
    #[arg(long)]
    seed: Option<u64>,
}

impl RunArgs {
    fn apply(&self, config: &mut LoadConfig) {
        if let Some(rate) = self.rate {
            config.rate = rate;
        }
        if let Some(window) = self.window {
            config.window = window;
        }
        if let Some(keyspace) = self.keyspace {
            config.keyspace = keyspace;
        }
        if let Some(workload) = self.workload {
            config.workload = workload;
        }
        if self.no_check {
            config.check = false;
        }
    }

    fn faults(&self) -> FaultOverrides {
        FaultOverrides {
            error_rate: self.error_rate,
            fail_every_nth_update: self.fail_every,
            latency: self.latency.map(|d| d.as_duration()),
            seed: self.seed,
        }
    }
}

pub async fn run(mut config: LoadConfig, args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    args.apply(&mut config);
    let engine_config = EngineConfig::from_load_config(&config)?;
    let store = build_store(&config.effective().store, &args.faults())?;
    let engine = Engine::new(engine_config, store, Arc::new(StdoutSink))?;

    let finished = tokio::select! {
        result = engine.run(args.ticks) => Some(result?),
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted, stopping load");
            None
        }
    };

    let metrics = match finished {
        Some(summary) => summary.metrics,
        None => engine.metrics().snapshot(),
    };
    println!("{}", serde_json::to_string_pretty(&metrics)?);

    Ok(())
}
