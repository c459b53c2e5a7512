use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use lagcheck_config::{HumanDuration, StoreConfig};
use lagcheck_core::StoreAdapter;
use lagcheck_sim::{FaultConfig, FaultyStore, MemoryStore};
use tracing::info;

/// Fault settings given on the command line. They win over `store.params`.
#[derive(Debug, Default)]
pub struct FaultOverrides {
    pub error_rate: Option<f64>,
    pub fail_every_nth_update: Option<u64>,
    pub latency: Option<Duration>,
    pub seed: Option<u64>,
}

fn param<T: FromStr>(config: &StoreConfig, name: &str) -> Result<Option<T>, String>
where
    T::Err: ToString,
{
    match config.params.get(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| format!("store param '{}': {}", name, e.to_string())),
    }
}

/// Merge fault settings from `store.params` and the command line.
fn fault_config(config: &StoreConfig, overrides: &FaultOverrides) -> Result<FaultConfig, String> {
    let faults = FaultConfig {
        error_rate: overrides
            .error_rate
            .or(param(config, "error_rate")?)
            .unwrap_or(0.0),
        fail_every_nth_update: overrides
            .fail_every_nth_update
            .or(param(config, "fail_every_nth_update")?),
        latency: overrides
            .latency
            .or(param::<HumanDuration>(config, "latency")?.map(|d| d.as_duration())),
    };
    if !(0.0..=1.0).contains(&faults.error_rate) {
        return Err(format!("error_rate must be within 0.0-1.0, got {}", faults.error_rate));
    }
    Ok(faults)
}

/// Build one of the stores compiled into this binary.
///
/// `memory` is a plain in-process map. `faulty` wraps it with injected
/// errors, latency, and failed updates taken from `store.params`
/// (`error_rate`, `fail_every_nth_update`, `latency`, `seed`) and the
/// command-line overrides. Any override on a `memory` store also wraps it.
pub fn build_store(
    config: &StoreConfig,
    overrides: &FaultOverrides,
) -> Result<Arc<dyn StoreAdapter>, Box<dyn std::error::Error>> {
    if config.kind != "memory" && config.kind != "faulty" {
        return Err(format!(
            "store kind '{}' is not built into this binary (available: memory, faulty)",
            config.kind
        )
        .into());
    }

    let faults = fault_config(config, overrides)?;

    let memory = Arc::new(MemoryStore::new());
    let wants_faults = config.kind == "faulty"
        || faults.error_rate > 0.0
        || faults.fail_every_nth_update.is_some()
        || faults.latency.is_some();
    if !wants_faults {
        return Ok(memory);
    }

    let seed = overrides.seed.or(param(config, "seed")?).unwrap_or(0);
    info!(
        seed,
        error_rate = faults.error_rate,
        fail_every_nth_update = ?faults.fail_every_nth_update,
        latency = ?faults.latency,
        "injecting store faults"
    );
    Ok(Arc::new(FaultyStore::with_seed(memory, seed, faults)))
}
