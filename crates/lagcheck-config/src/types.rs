use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::defaults::{
    default_check, default_keyspace, default_max_in_flight, default_rate, default_store_kind,
    default_timeout, default_window,
};

/// How sequence numbers are turned into store operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WorkloadKind {
    /// `key = seq mod keyspace`, `value = seq div keyspace`; repeated keys carry rising values
    #[default]
    Versioned,
    /// Every tick creates a fresh key with value 0
    InsertOnly,
}

impl FromStr for WorkloadKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "versioned" => Ok(WorkloadKind::Versioned),
            "insert_only" => Ok(WorkloadKind::InsertOnly),
            other => Err(format!("Unknown workload kind: {}", other)),
        }
    }
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkloadKind::Versioned => write!(f, "versioned"),
            WorkloadKind::InsertOnly => write!(f, "insert_only"),
        }
    }
}

/// Human-readable duration (e.g., "200ms", "1s", "5m").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HumanDuration(pub std::time::Duration);

impl Default for HumanDuration {
    fn default() -> Self {
        HumanDuration(std::time::Duration::from_secs(0))
    }
}

impl HumanDuration {
    pub fn as_duration(&self) -> std::time::Duration {
        self.0
    }
}

impl FromStr for HumanDuration {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();

        let (num_str, unit) = if let Some(n) = s.strip_suffix("ms") {
            (n, "ms")
        } else if let Some(n) = s.strip_suffix('s') {
            (n, "s")
        } else if let Some(n) = s.strip_suffix('m') {
            (n, "m")
        } else if let Some(n) = s.strip_suffix('h') {
            (n, "h")
        } else if let Some(n) = s.strip_suffix('d') {
            (n, "d")
        } else {
            return Err(format!("Invalid duration format: {}", s));
        };

        let num: u64 = num_str
            .parse()
            .map_err(|_| format!("Invalid number in duration: {}", s))?;

        let secs_per_unit = match unit {
            "ms" => return Ok(HumanDuration(std::time::Duration::from_millis(num))),
            "s" => 1,
            "m" => 60,
            "h" => 3600,
            _ => 86400,
        };
        let secs = num
            .checked_mul(secs_per_unit)
            .ok_or_else(|| format!("Duration too large: {}", s))?;
        let duration = std::time::Duration::from_secs(secs);

        Ok(HumanDuration(duration))
    }
}

impl fmt::Display for HumanDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let millis = self.0.as_millis();
        let secs = self.0.as_secs();

        // Only collapse to a coarser unit when nothing is lost.
        if millis % 1000 != 0 || millis == 0 {
            write!(f, "{}ms", millis)
        } else if secs % 60 != 0 {
            write!(f, "{}s", secs)
        } else if secs % 3600 != 0 {
            write!(f, "{}m", secs / 60)
        } else if secs % 86400 != 0 {
            write!(f, "{}h", secs / 3600)
        } else {
            write!(f, "{}d", secs / 86400)
        }
    }
}

impl Serialize for HumanDuration {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for HumanDuration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        HumanDuration::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// Connection settings for the store under test.
///
/// The engine never reads these; they are handed to whatever builds the
/// store adapter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoreConfig {
    /// Adapter name, e.g. "memory", "mongodb", "cassandra".
    #[serde(default = "default_store_kind")]
    pub kind: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Adapter-specific extras (database name, TLS flag, consistency level, ...).
    #[serde(default)]
    pub params: IndexMap<String, String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            kind: default_store_kind(),
            endpoint: None,
            user: None,
            password: None,
            params: IndexMap::new(),
        }
    }
}

/// Top-level load generator configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoadConfig {
    /// Write ticks per second.
    #[serde(default = "default_rate")]
    pub rate: u32,
    /// Capacity of the rolling success-rate window.
    #[serde(default = "default_window")]
    pub window: usize,
    /// Timeout applied to every store read and write.
    #[serde(default = "default_timeout")]
    pub timeout: HumanDuration,
    /// Number of distinct keys in the versioned workload.
    #[serde(default = "default_keyspace")]
    pub keyspace: u64,
    /// Upper bound on write tasks running at once.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
    #[serde(default)]
    pub workload: WorkloadKind,
    /// Run the background consistency checker.
    #[serde(default = "default_check")]
    pub check: bool,
    /// Pause between full checker passes.
    #[serde(default)]
    pub scan_pause: HumanDuration,
    #[serde(default)]
    pub store: StoreConfig,
}

impl Default for LoadConfig {
    fn default() -> Self {
        LoadConfig {
            rate: default_rate(),
            window: default_window(),
            timeout: default_timeout(),
            keyspace: default_keyspace(),
            max_in_flight: default_max_in_flight(),
            workload: WorkloadKind::default(),
            check: default_check(),
            scan_pause: HumanDuration::default(),
            store: StoreConfig::default(),
        }
    }
}
