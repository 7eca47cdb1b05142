//! In-memory decision log implementation

use crate::{DecisionLog, DecisionRecord, Result};
use lockstep_common::{Decision, Timestamp, TxnId};
use parking_lot::Mutex;

/// In-memory decision log for tests and demos
#[derive(Default)]
pub struct MemoryDecisionLog {
    records: Mutex<Vec<DecisionRecord>>,
}

impl MemoryDecisionLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DecisionLog for MemoryDecisionLog {
    fn append_decision(&self, txn_id: TxnId, decision: Decision) -> Result<()> {
        self.records.lock().push(DecisionRecord {
            txn_id,
            decision,
            recorded_at: Timestamp::now(),
        });
        Ok(())
    }

    fn decisions(&self) -> Result<Vec<DecisionRecord>> {
        Ok(self.records.lock().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_decision_log() {
        let log = MemoryDecisionLog::new();
        assert!(log.decisions().unwrap().is_empty());

        log.append_decision(TxnId::new(7), Decision::Commit).unwrap();
        log.append_decision(TxnId::new(8), Decision::Abort).unwrap();

        let records = log.decisions().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].txn_id, TxnId::new(7));
        assert_eq!(records[1].decision, Decision::Abort);
    }
}
