//! Application state.
//!
//! One composed container with clearly scoped mutators instead of ambient
//! global state: the account snapshot, the derived metrics and the pending
//! registry live here and are handed around by `Arc`.
//!
//! Refreshes race: a workflow that settles late must not clobber state
//! written by a newer one. Every refresh takes a sequence number up front
//! and `apply` discards results whose sequence is not newer than the last
//! applied one, so the ordering of requests wins over the ordering of
//! responses.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use alloy_primitives::U256;

use crate::metrics::AppMetrics;
use crate::pending::PendingTxns;

// ============================================
// APPROVAL CONTEXTS
// ============================================

/// Spender contexts an allowance can be granted for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApprovalTarget {
    /// FROST -> staking helper.
    Staking,
    /// sFROST -> staking contract.
    Unstaking,
    /// sFROST -> wrapper.
    Wrapping,
    /// FROST -> redemption contract.
    Redemption,
    /// Bond reserve asset -> bond depository, by bond name.
    Bond(&'static str),
}

impl ApprovalTarget {
    /// Registry action type for the approval workflow itself.
    pub fn action_type(&self) -> String {
        match self {
            ApprovalTarget::Staking => "approve_staking".to_string(),
            ApprovalTarget::Unstaking => "approve_unstaking".to_string(),
            ApprovalTarget::Wrapping => "approve_wrapping".to_string(),
            ApprovalTarget::Redemption => "approve_redeem".to_string(),
            ApprovalTarget::Bond(name) => format!("approve_{}", name),
        }
    }

    pub fn label(&self) -> String {
        match self {
            ApprovalTarget::Staking => "Approve staking".to_string(),
            ApprovalTarget::Unstaking => "Approve unstaking".to_string(),
            ApprovalTarget::Wrapping => "Approve wrapping".to_string(),
            ApprovalTarget::Redemption => "Approve redemption".to_string(),
            ApprovalTarget::Bond(name) => format!("Approve {} bond", name),
        }
    }
}

// ============================================
// ACCOUNT STATE
// ============================================

/// Balances and allowances of the connected account. Replaced wholesale on
/// each successful refresh, never partially mutated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccountState {
    /// Token symbol -> balance in token units.
    pub balances: HashMap<String, f64>,
    /// Spender context -> raw allowance.
    pub allowances: HashMap<ApprovalTarget, U256>,
}

impl AccountState {
    pub fn balance(&self, symbol: &str) -> f64 {
        self.balances.get(symbol).copied().unwrap_or(0.0)
    }

    pub fn allowance(&self, target: &ApprovalTarget) -> U256 {
        self.allowances.get(target).copied().unwrap_or(U256::ZERO)
    }

    /// Whether the intended amount is covered by the current allowance.
    /// A missing allowance counts as zero; a zero intent is never approved.
    pub fn is_approved(&self, target: &ApprovalTarget, intended: U256) -> bool {
        !intended.is_zero() && self.allowance(target) >= intended
    }
}

// ============================================
// VERSIONED SLOT
// ============================================

/// Value guarded by a refresh sequence number.
#[derive(Debug)]
pub struct Versioned<T> {
    next_seq: AtomicU64,
    slot: Mutex<(u64, T)>,
}

impl<T: Clone> Versioned<T> {
    pub fn new(initial: T) -> Self {
        Self {
            next_seq: AtomicU64::new(0),
            slot: Mutex::new((0, initial)),
        }
    }

    /// Take a sequence number for a refresh that is about to start.
    pub fn begin(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Apply a refresh result. Returns false (and changes nothing) when a
    /// newer result has already been applied.
    pub fn apply(&self, seq: u64, value: T) -> bool {
        let mut slot = self.slot.lock().unwrap();
        if seq <= slot.0 {
            return false;
        }
        *slot = (seq, value);
        true
    }

    pub fn get(&self) -> T {
        self.slot.lock().unwrap().1.clone()
    }

    pub fn applied_seq(&self) -> u64 {
        self.slot.lock().unwrap().0
    }
}

// ============================================
// COMPOSED CONTAINER
// ============================================

/// All mutable dashboard state.
#[derive(Debug)]
pub struct AppState {
    pub account: Versioned<AccountState>,
    /// Latest consistent metrics; `None` until the first snapshot lands.
    pub metrics: Versioned<Option<AppMetrics>>,
    /// Std mutex: the guard-and-reserve step must not contain an await.
    pub pending: Mutex<PendingTxns>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            account: Versioned::new(AccountState::default()),
            metrics: Versioned::new(None),
            pending: Mutex::new(PendingTxns::new()),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    fn account_with(symbol: &str, balance: f64) -> AccountState {
        let mut state = AccountState::default();
        state.balances.insert(symbol.to_string(), balance);
        state
    }

    #[test]
    fn test_in_order_refreshes_apply() {
        let store = Versioned::new(AccountState::default());
        let s1 = store.begin();
        let s2 = store.begin();
        assert!(store.apply(s1, account_with("FROST", 1.0)));
        assert!(store.apply(s2, account_with("FROST", 2.0)));
        assert_eq!(store.get().balance("FROST"), 2.0);
    }

    #[test]
    fn test_stale_refresh_is_discarded() {
        let store = Versioned::new(AccountState::default());
        let _s1 = store.begin();
        let s2 = store.begin();
        let s3 = store.begin();

        // The refresh issued last resolves first; the earlier one must not
        // overwrite it no matter how late it arrives.
        assert!(store.apply(s3, account_with("FROST", 3.0)));
        assert!(!store.apply(s2, account_with("FROST", 2.0)));
        assert_eq!(store.get().balance("FROST"), 3.0);
        assert_eq!(store.applied_seq(), s3);
    }

    #[test]
    fn test_allowance_policy() {
        let mut state = AccountState::default();
        state
            .allowances
            .insert(ApprovalTarget::Staking, U256::from(100u64));

        assert!(state.is_approved(&ApprovalTarget::Staking, U256::from(100u64)));
        assert!(state.is_approved(&ApprovalTarget::Staking, U256::from(1u64)));
        assert!(!state.is_approved(&ApprovalTarget::Staking, U256::from(101u64)));
        // Zero intent and unknown context are never approved.
        assert!(!state.is_approved(&ApprovalTarget::Staking, U256::ZERO));
        assert!(!state.is_approved(&ApprovalTarget::Wrapping, U256::from(1u64)));
    }

    #[test]
    fn test_bond_approval_action_types() {
        assert_eq!(
            ApprovalTarget::Bond("mim_frost_lp").action_type(),
            "approve_mim_frost_lp"
        );
        assert_eq!(ApprovalTarget::Staking.action_type(), "approve_staking");
    }
}
