use lagcheck_config::WorkloadKind;

use crate::error::EngineError;
use crate::traits::{WriteKind, WriteOp};

/// Deterministic mapping from a tick's sequence number to a write.
///
/// In the versioned workload `key = seq % keyspace` and `value = seq / keyspace`,
/// so every revisit of a key carries a strictly larger value than the last one.
/// That total order per key is what lets the checker flag `store < expected`
/// instead of demanding equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sequencer {
    keyspace: u64,
    workload: WorkloadKind,
}

impl Sequencer {
    /// Versioned sequencer over `keyspace` keys.
    pub fn new(keyspace: u64) -> Result<Self, EngineError> {
        Self::with_workload(keyspace, WorkloadKind::Versioned)
    }

    pub fn with_workload(keyspace: u64, workload: WorkloadKind) -> Result<Self, EngineError> {
        if keyspace == 0 {
            return Err(EngineError::InvalidArgument(
                "keyspace must contain at least one key".to_string(),
            ));
        }
        Ok(Sequencer { keyspace, workload })
    }

    pub fn keyspace(&self) -> u64 {
        self.keyspace
    }

    pub fn workload(&self) -> WorkloadKind {
        self.workload
    }

    /// Derive the write for `sequence`.
    pub fn op_for(&self, sequence: u64) -> WriteOp {
        let (key, value) = match self.workload {
            WorkloadKind::Versioned => (sequence % self.keyspace, sequence / self.keyspace),
            WorkloadKind::InsertOnly => (sequence, 0),
        };
        let kind = if value == 0 {
            WriteKind::Create
        } else {
            WriteKind::Update
        };
        WriteOp {
            sequence,
            key,
            value,
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_pass_is_all_creates() {
        let seq = Sequencer::new(1000).unwrap();
        for s in 0..1000 {
            let op = seq.op_for(s);
            assert_eq!(op.key, s);
            assert_eq!(op.value, 0);
            assert_eq!(op.kind, WriteKind::Create);
        }
    }

    #[test]
    fn test_second_pass_is_first_update() {
        let seq = Sequencer::new(1000).unwrap();
        for s in 1000..2000 {
            let op = seq.op_for(s);
            assert_eq!(op.key, s - 1000);
            assert_eq!(op.value, 1);
            assert_eq!(op.kind, WriteKind::Update);
        }
    }

    #[test]
    fn test_values_strictly_increase_per_key() {
        let seq = Sequencer::new(7).unwrap();
        let mut last = std::collections::HashMap::new();
        for s in 0..200 {
            let op = seq.op_for(s);
            if let Some(prev) = last.insert(op.key, op.value) {
                assert!(op.value > prev, "key {} went {} -> {}", op.key, prev, op.value);
            }
        }
    }

    #[test]
    fn test_insert_only_never_repeats_keys() {
        let seq = Sequencer::with_workload(10, WorkloadKind::InsertOnly).unwrap();
        let op = seq.op_for(12345);
        assert_eq!(op.key, 12345);
        assert_eq!(op.value, 0);
        assert_eq!(op.kind, WriteKind::Create);
    }

    #[test]
    fn test_zero_keyspace_rejected() {
        assert!(matches!(
            Sequencer::new(0),
            Err(EngineError::InvalidArgument(_))
        ));
    }
}
