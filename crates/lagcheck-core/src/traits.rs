use std::fmt;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::error::StoreError;

/// Key written by the load generator.
pub type Key = u64;

/// Value stored under a key. For a given key, later writes carry larger values.
pub type Version = u64;

/// Whether a write creates a key or overwrites an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteKind {
    /// First write for the key (INSERT).
    Create,
    /// Later write for the key (UPDATE / REPLACE).
    Update,
}

impl fmt::Display for WriteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteKind::Create => write!(f, "create"),
            WriteKind::Update => write!(f, "update"),
        }
    }
}

/// A single write derived from a sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WriteOp {
    /// Sequence number the operation was derived from.
    pub sequence: u64,
    pub key: Key,
    pub value: Version,
    pub kind: WriteKind,
}

/// Capability the engine needs from a store under test.
///
/// Adapters own connection handling, pooling and query construction. The
/// `deadline` is advisory: the engine enforces it with its own timeout, but
/// adapters should pass it down to their driver so abandoned calls are
/// cancelled server-side too.
#[async_trait]
pub trait StoreAdapter: Send + Sync + 'static {
    /// Short name used in logs.
    fn name(&self) -> &str {
        "store"
    }

    /// Apply a write. `WriteOp::kind` selects create or update semantics.
    async fn write(&self, op: WriteOp, deadline: Instant) -> Result<(), StoreError>;

    /// Read the current value for `key`; `Ok(None)` when the key is absent.
    async fn read(&self, key: Key, deadline: Instant) -> Result<Option<Version>, StoreError>;
}
