use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use lagcheck_core::{Key, StoreAdapter, StoreError, Version, WriteKind, WriteOp};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Prefix used in error messages to distinguish injected faults from real errors.
pub const FAULT_PREFIX: &str = "[fault-injected]";

/// Configuration for fault injection.
#[derive(Debug, Clone, Default)]
pub struct FaultConfig {
    /// Probability of injecting an error per read or write (0.0-1.0).
    pub error_rate: f64,
    /// Fail every n-th update (1-based count of updates seen).
    pub fail_every_nth_update: Option<u64>,
    /// Added before every operation reaches the inner store.
    pub latency: Option<Duration>,
}

/// Statistics about injected faults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaultStats {
    /// Writes and reads answered with an injected error.
    pub fault_count: usize,
    /// Writes acknowledged without being applied.
    pub lost_writes: usize,
}

/// A store wrapper that injects errors, latency, and lost writes.
pub struct FaultyStore {
    inner: Arc<dyn StoreAdapter>,
    rng: Mutex<ChaCha8Rng>,
    config: FaultConfig,
    updates_seen: AtomicU64,
    failing: StdMutex<HashSet<(Key, Version)>>,
    losing: StdMutex<HashSet<(Key, Version)>>,
    fault_count: AtomicUsize,
    lost_writes: AtomicUsize,
}

impl FaultyStore {
    pub fn new(inner: Arc<dyn StoreAdapter>, rng: ChaCha8Rng, config: FaultConfig) -> Self {
        FaultyStore {
            inner,
            rng: Mutex::new(rng),
            config,
            updates_seen: AtomicU64::new(0),
            failing: StdMutex::new(HashSet::new()),
            losing: StdMutex::new(HashSet::new()),
            fault_count: AtomicUsize::new(0),
            lost_writes: AtomicUsize::new(0),
        }
    }

    pub fn with_seed(inner: Arc<dyn StoreAdapter>, seed: u64, config: FaultConfig) -> Self {
        Self::new(inner, ChaCha8Rng::seed_from_u64(seed), config)
    }

    /// Reject the next write of `value` to `key`.
    pub fn fail_write(&self, key: Key, value: Version) {
        self.failing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert((key, value));
    }

    /// Acknowledge the next write of `value` to `key` without applying it.
    pub fn lose_write(&self, key: Key, value: Version) {
        self.losing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert((key, value));
    }

    pub fn stats(&self) -> FaultStats {
        FaultStats {
            fault_count: self.fault_count.load(Ordering::Relaxed),
            lost_writes: self.lost_writes.load(Ordering::Relaxed),
        }
    }

    /// Roll the RNG and return true if we should inject an error.
    async fn should_inject_error(&self) -> bool {
        if self.config.error_rate <= 0.0 {
            return false;
        }
        let roll: f64 = self.rng.lock().await.gen();
        roll < self.config.error_rate
    }

    /// Count an update and return true if it is one the n-th rule fails.
    fn nth_update_fails(&self, op: &WriteOp) -> bool {
        if op.kind != WriteKind::Update {
            return false;
        }
        match self.config.fail_every_nth_update {
            Some(n) if n > 0 => {
                let seen = self.updates_seen.fetch_add(1, Ordering::Relaxed) + 1;
                seen % n == 0
            }
            _ => false,
        }
    }

    fn take_target(set: &StdMutex<HashSet<(Key, Version)>>, op: &WriteOp) -> bool {
        set.lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&(op.key, op.value))
    }

    /// Generate a random injected error (ConnectionFailed or Timeout).
    async fn injected_error(&self, op: &str, key: Key) -> StoreError {
        self.fault_count.fetch_add(1, Ordering::Relaxed);
        let use_timeout: bool = self.rng.lock().await.gen();
        if use_timeout {
            StoreError::Timeout {
                operation: format!("{} {}", FAULT_PREFIX, op),
                key,
            }
        } else {
            self.connection_failed(op)
        }
    }

    fn connection_failed(&self, op: &str) -> StoreError {
        StoreError::ConnectionFailed {
            store: format!("{} faulty", FAULT_PREFIX),
            source: Box::new(std::io::Error::other(format!(
                "{} connection failed during {}",
                FAULT_PREFIX, op
            ))),
        }
    }

    async fn delay(&self) {
        if let Some(latency) = self.config.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl StoreAdapter for FaultyStore {
    fn name(&self) -> &str {
        "faulty"
    }

    async fn write(&self, op: WriteOp, deadline: Instant) -> Result<(), StoreError> {
        self.delay().await;

        if Self::take_target(&self.failing, &op) || self.nth_update_fails(&op) {
            self.fault_count.fetch_add(1, Ordering::Relaxed);
            return Err(StoreError::Rejected(format!(
                "{} {} of key {} to {}",
                FAULT_PREFIX, op.kind, op.key, op.value
            )));
        }
        if self.should_inject_error().await {
            return Err(self.injected_error("write", op.key).await);
        }
        if Self::take_target(&self.losing, &op) {
            self.lost_writes.fetch_add(1, Ordering::Relaxed);
            return Ok(());
        }
        self.inner.write(op, deadline).await
    }

    async fn read(&self, key: Key, deadline: Instant) -> Result<Option<Version>, StoreError> {
        self.delay().await;

        if self.should_inject_error().await {
            return Err(self.injected_error("read", key).await);
        }
        self.inner.read(key, deadline).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    fn op(sequence: u64, key: Key, value: Version) -> WriteOp {
        WriteOp {
            sequence,
            key,
            value,
            kind: if value == 0 {
                WriteKind::Create
            } else {
                WriteKind::Update
            },
        }
    }

    fn faulty(config: FaultConfig) -> (FaultyStore, Arc<MemoryStore>) {
        let memory = Arc::new(MemoryStore::new());
        (FaultyStore::with_seed(memory.clone(), 7, config), memory)
    }

    #[tokio::test]
    async fn test_every_third_update_fails() {
        let (store, _) = faulty(FaultConfig {
            fail_every_nth_update: Some(3),
            ..Default::default()
        });
        let now = Instant::now();

        for key in 0..9 {
            store.write(op(key, key, 0), now).await.unwrap();
        }
        let mut failed = Vec::new();
        for key in 0..9 {
            failed.push(store.write(op(9 + key, key, 1), now).await.is_err());
        }

        // creates are never counted
        assert_eq!(failed.iter().filter(|f| **f).count(), 3);
        assert!(failed[2] && failed[5] && failed[8]);
        assert_eq!(store.stats().fault_count, 3);
    }

    #[tokio::test]
    async fn test_lost_write_is_acknowledged_but_not_applied() {
        let (store, memory) = faulty(FaultConfig::default());
        let now = Instant::now();
        store.write(op(0, 4, 0), now).await.unwrap();

        store.lose_write(4, 1);
        store.write(op(1, 4, 1), now).await.unwrap();
        assert_eq!(memory.get(4), Some(0));
        assert_eq!(store.stats().lost_writes, 1);

        // one-shot: the same write goes through next time
        store.write(op(2, 4, 1), now).await.unwrap();
        assert_eq!(memory.get(4), Some(1));
    }

    #[tokio::test]
    async fn test_targeted_failure_is_reported() {
        let (store, memory) = faulty(FaultConfig::default());
        store.fail_write(3, 0);

        let err = store.write(op(0, 3, 0), Instant::now()).await.unwrap_err();
        assert!(err.to_string().contains(FAULT_PREFIX));
        assert_eq!(memory.get(3), None);
    }

    #[tokio::test]
    async fn test_error_rate_one_fails_everything() {
        let (store, _) = faulty(FaultConfig {
            error_rate: 1.0,
            ..Default::default()
        });
        let now = Instant::now();
        for i in 0..10 {
            assert!(store.write(op(i, i, 0), now).await.is_err());
            assert!(store.read(i, now).await.is_err());
        }
        assert_eq!(store.stats().fault_count, 20);
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_delays_operations() {
        let (store, _) = faulty(FaultConfig {
            latency: Some(Duration::from_millis(250)),
            ..Default::default()
        });
        let start = Instant::now();
        store.read(1, start).await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_millis(250));
    }
}
