use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use lagcheck_core::{Key, StoreAdapter, StoreError, Version, WriteKind, WriteOp};
use tokio::time::Instant;

/// In-memory store for testing.
///
/// Creates and updates are strict: creating an existing key or updating an
/// absent one is rejected, the way a unique index or `UPDATE ... WHERE` would.
pub struct MemoryStore {
    rows: RwLock<HashMap<Key, Version>>,
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        MemoryStore {
            rows: RwLock::new(HashMap::new()),
        }
    }

    /// Current value for `key`, bypassing the adapter interface.
    pub fn get(&self, key: Key) -> Option<Version> {
        let rows = self.rows.read().unwrap_or_else(|e| e.into_inner());
        rows.get(&key).copied()
    }

    pub fn len(&self) -> usize {
        self.rows.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StoreAdapter for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn write(&self, op: WriteOp, _deadline: Instant) -> Result<(), StoreError> {
        let mut rows = self.rows.write().unwrap_or_else(|e| e.into_inner());

        match op.kind {
            WriteKind::Create => {
                if rows.contains_key(&op.key) {
                    return Err(StoreError::Rejected(format!("duplicate key {}", op.key)));
                }
                rows.insert(op.key, op.value);
            }
            WriteKind::Update => match rows.get_mut(&op.key) {
                Some(value) => *value = op.value,
                None => {
                    return Err(StoreError::Rejected(format!(
                        "no row to update for key {}",
                        op.key
                    )))
                }
            },
        }
        Ok(())
    }

    async fn read(&self, key: Key, _deadline: Instant) -> Result<Option<Version>, StoreError> {
        Ok(self.get(key))
    }
}
