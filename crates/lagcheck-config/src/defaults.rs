use std::time::Duration;

use crate::types::{HumanDuration, LoadConfig, WorkloadKind};

pub(crate) fn default_rate() -> u32 {
    10
}

pub(crate) fn default_window() -> usize {
    100
}

pub(crate) fn default_timeout() -> HumanDuration {
    HumanDuration(Duration::from_secs(1))
}

pub(crate) fn default_keyspace() -> u64 {
    1000
}

pub(crate) fn default_max_in_flight() -> usize {
    1024
}

pub(crate) fn default_check() -> bool {
    true
}

pub(crate) fn default_store_kind() -> String {
    "memory".to_string()
}

impl LoadConfig {
    /// Apply default inference rules to the configuration.
    /// This mutates the config in place.
    pub fn apply_defaults(&mut self) {
        // 1. Store kind is matched case-insensitively by adapter factories
        let kind = self.store.kind.trim().to_lowercase();
        self.store.kind = if kind.is_empty() {
            default_store_kind()
        } else {
            kind
        };

        // 2. Insert-only never revisits a key, so there is nothing to audit
        if self.workload == WorkloadKind::InsertOnly {
            self.check = false;
        }
    }

    /// Returns a new config with all defaults applied.
    pub fn effective(&self) -> LoadConfig {
        let mut config = self.clone();
        config.apply_defaults();
        config
    }

}
