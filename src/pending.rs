//! In-flight transaction registry.
//!
//! Ordered set of transactions awaiting confirmation, keyed by transaction
//! hash and a logical action type. The action type also drives the duplicate
//! guard: while the chain-assigned hash only exists after submission, the
//! action type can be reserved synchronously before the first await point,
//! which is what makes two near-simultaneous clicks collapse into one
//! submission.

use std::collections::HashSet;

use alloy_primitives::B256;

/// Transaction hash as assigned by the chain.
pub type TxHash = B256;

/// One transaction awaiting confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTx {
    /// Chain-assigned hash. Unique; set at submission, never changed.
    pub id: TxHash,
    /// Human-readable description of the action.
    pub label: String,
    /// Logical action category, e.g. `staking` or `bond_mim_frost_lp`.
    pub action_type: String,
}

/// Registry of in-flight transactions plus action-type reservations for
/// workflows that have passed the guard but not yet submitted.
#[derive(Debug, Default)]
pub struct PendingTxns {
    entries: Vec<PendingTx>,
    reserved: HashSet<String>,
}

impl PendingTxns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve an action type. Returns false when a workflow with the same
    /// action type is already reserved or pending; the caller must then
    /// treat the invocation as a no-op.
    pub fn try_reserve(&mut self, action_type: &str) -> bool {
        if self.has_action_type(action_type) {
            return false;
        }
        self.reserved.insert(action_type.to_string())
    }

    /// Drop a reservation that never became a submission.
    pub fn release(&mut self, action_type: &str) {
        self.reserved.remove(action_type);
    }

    /// Promote a reservation into a tracked entry, preserving submission
    /// order.
    pub fn add(&mut self, entry: PendingTx) {
        self.reserved.remove(&entry.action_type);
        self.entries.push(entry);
    }

    /// Remove the entry with the given hash. A no-op when the hash is
    /// unknown, so duplicate cleanup calls are harmless.
    pub fn remove_by_id(&mut self, id: &TxHash) {
        if let Some(pos) = self.entries.iter().position(|e| &e.id == id) {
            self.entries.remove(pos);
        }
    }

    /// Whether a workflow with this action type is reserved or pending.
    pub fn has_action_type(&self, action_type: &str) -> bool {
        self.reserved.contains(action_type)
            || self.entries.iter().any(|e| e.action_type == action_type)
    }

    /// Snapshot of the tracked entries in submission order.
    pub fn list_all(&self) -> Vec<PendingTx> {
        self.entries.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.reserved.is_empty()
    }
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    fn hash(byte: u8) -> TxHash {
        B256::repeat_byte(byte)
    }

    fn entry(byte: u8, action_type: &str) -> PendingTx {
        PendingTx {
            id: hash(byte),
            label: format!("tx {}", byte),
            action_type: action_type.to_string(),
        }
    }

    #[test]
    fn test_reserve_blocks_duplicates() {
        let mut txns = PendingTxns::new();
        assert!(txns.try_reserve("staking"));
        assert!(!txns.try_reserve("staking"));
        assert!(txns.try_reserve("unstaking"));
        assert!(txns.has_action_type("staking"));
    }

    #[test]
    fn test_add_consumes_reservation_and_keeps_guard() {
        let mut txns = PendingTxns::new();
        assert!(txns.try_reserve("staking"));
        txns.add(entry(1, "staking"));

        // Still guarded through the entry itself.
        assert!(!txns.try_reserve("staking"));
        assert!(txns.has_action_type("staking"));

        txns.remove_by_id(&hash(1));
        assert!(txns.try_reserve("staking"));
    }

    #[test]
    fn test_release_frees_the_action_type() {
        let mut txns = PendingTxns::new();
        assert!(txns.try_reserve("wrapping"));
        txns.release("wrapping");
        assert!(txns.try_reserve("wrapping"));
    }

    #[test]
    fn test_list_preserves_submission_order() {
        let mut txns = PendingTxns::new();
        txns.add(entry(1, "staking"));
        txns.add(entry(2, "bond_mim"));
        txns.add(entry(3, "wrapping"));

        let all = txns.list_all();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].id, hash(1));
        assert_eq!(all[2].id, hash(3));

        txns.remove_by_id(&hash(2));
        let all = txns.list_all();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, hash(1));
        assert_eq!(all[1].id, hash(3));
    }

    #[test]
    fn test_remove_unknown_id_is_noop() {
        let mut txns = PendingTxns::new();
        txns.add(entry(1, "staking"));
        txns.remove_by_id(&hash(9));
        txns.remove_by_id(&hash(1));
        txns.remove_by_id(&hash(1));
        assert!(txns.is_empty());
    }
}
