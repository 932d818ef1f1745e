//! Error taxonomy for chain reads and transaction workflows.
//!
//! Wallet providers report failures as loosely structured (code, message)
//! pairs; `classify_rpc_error` maps those onto the small set of outcomes the
//! dashboard can actually act on (rejected in wallet, reverted on chain,
//! wrong network, transport trouble). Unknown reverts keep the raw text for
//! diagnostics.

use thiserror::Error;

// ============================================
// READ ERRORS
// ============================================

/// Failure of a read-only contract call or snapshot assembly.
///
/// A snapshot read is all-or-nothing: one failed sub-read fails the whole
/// refresh cycle so the UI never mixes values from different states.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChainReadError {
    /// Provider unreachable or transport-level failure.
    #[error("provider unreachable: {0}")]
    Transport(String),

    /// The call itself reverted or returned failure.
    #[error("read from {target} failed: {message}")]
    CallFailed { target: String, message: String },

    /// Returned bytes could not be decoded into the expected type.
    #[error("could not decode response from {target}: {message}")]
    Decode { target: String, message: String },

    /// Connected chain id does not match the configured network.
    #[error("connected to chain {actual}, expected chain {expected}")]
    WrongChain { expected: u64, actual: u64 },
}

// ============================================
// REVERT CLASSIFICATION
// ============================================

/// Known on-chain revert causes, mapped from the raw revert string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevertReason {
    /// `ds-math-sub-underflow`: the amount exceeds the account balance.
    AmountExceedsBalance,
    /// `gas required exceeds allowance`: not enough gas token to pay fees.
    InsufficientGasFunds,
    /// `Bond too small`: deposit below the bond contract minimum.
    BondTooSmall,
    /// Anything we do not recognize.
    Other,
}

impl RevertReason {
    /// Human-readable text shown in the error notification.
    pub fn user_message(&self) -> &'static str {
        match self {
            RevertReason::AmountExceedsBalance => {
                "You are trying to use more than your balance"
            }
            RevertReason::InsufficientGasFunds => {
                "Insufficient balance to pay the network fee"
            }
            RevertReason::BondTooSmall => "Bond too small",
            RevertReason::Other => "Something went wrong",
        }
    }

    fn from_revert_text(text: &str) -> Self {
        if text.contains("ds-math-sub-underflow") {
            RevertReason::AmountExceedsBalance
        } else if text.contains("gas required exceeds allowance") {
            RevertReason::InsufficientGasFunds
        } else if text.contains("Bond too small") {
            RevertReason::BondTooSmall
        } else {
            RevertReason::Other
        }
    }
}

// ============================================
// WORKFLOW ERRORS
// ============================================

/// Terminal failure of a user-initiated workflow.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum WorkflowError {
    /// No wallet/provider connected. Checked before any network call.
    #[error("please connect your wallet")]
    ProviderUnavailable,

    /// Connected chain id does not match the expected network. Actionable:
    /// the caller should offer a network switch rather than a generic retry.
    #[error("wrong network: connected to chain {actual}, expected chain {expected}")]
    WrongNetwork { expected: u64, actual: u64 },

    /// User input failed numeric/range validation. Detected before any
    /// network call.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// The user declined to sign in the wallet. Only the user can retry.
    #[error("transaction signature was denied")]
    UserRejected,

    /// On-chain execution failure. `raw` keeps the original revert text.
    #[error("transaction reverted: {raw}")]
    ContractReverted { reason: RevertReason, raw: String },

    /// A read during refresh or pre-submission quoting failed.
    #[error(transparent)]
    ChainRead(#[from] ChainReadError),

    /// The operation's contract is not deployed on the configured network.
    #[error("{0} is not available on this network")]
    Unsupported(String),
}

impl WorkflowError {
    /// Build a classified revert error from the raw revert text.
    pub fn reverted(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        WorkflowError::ContractReverted {
            reason: RevertReason::from_revert_text(&raw),
            raw,
        }
    }
}

// ============================================
// RPC ERROR CLASSIFICATION
// ============================================

/// JSON-RPC error code used by wallets for "user denied signature".
const CODE_USER_REJECTED: i64 = 4001;

/// JSON-RPC error code for internal errors, which carry revert data.
const CODE_INTERNAL: i64 = -32603;

/// Raw failure as reported by the wallet/provider on submit or confirm.
#[derive(Debug, Clone)]
pub struct RpcFailure {
    pub code: Option<i64>,
    pub message: String,
    /// Nested `error.data.message`, when the node attaches revert data.
    pub data_message: Option<String>,
}

impl RpcFailure {
    pub fn new(code: Option<i64>, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data_message: None,
        }
    }

    pub fn with_data(mut self, data_message: impl Into<String>) -> Self {
        self.data_message = Some(data_message.into());
        self
    }
}

/// Map a raw provider failure onto the workflow taxonomy.
///
/// Revert text often arrives as `execution reverted: <reason>`; the reason
/// is whatever follows the last colon.
pub fn classify_rpc_error(failure: &RpcFailure) -> WorkflowError {
    match failure.code {
        Some(CODE_USER_REJECTED) => WorkflowError::UserRejected,
        Some(CODE_INTERNAL) => {
            let raw = failure
                .data_message
                .as_deref()
                .unwrap_or(&failure.message);
            let text = extract_revert_text(raw);
            WorkflowError::ContractReverted {
                reason: RevertReason::from_revert_text(raw),
                raw: text,
            }
        }
        _ => {
            // No recognizable code: if the message itself mentions a denial
            // treat it as a rejection, otherwise assume transport trouble.
            if failure.message.contains("denied transaction signature") {
                WorkflowError::UserRejected
            } else {
                WorkflowError::ChainRead(ChainReadError::Transport(
                    failure.message.clone(),
                ))
            }
        }
    }
}

fn extract_revert_text(raw: &str) -> String {
    match raw.rsplit_once(':') {
        Some((_, tail)) if !tail.trim().is_empty() => tail.trim().to_string(),
        _ => raw.trim().to_string(),
    }
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_rejection_code() {
        let failure = RpcFailure::new(Some(4001), "User denied transaction signature");
        assert_eq!(classify_rpc_error(&failure), WorkflowError::UserRejected);
    }

    #[test]
    fn test_underflow_revert_maps_to_balance_error() {
        let failure = RpcFailure::new(Some(-32603), "execution reverted")
            .with_data("execution reverted: ds-math-sub-underflow");
        match classify_rpc_error(&failure) {
            WorkflowError::ContractReverted { reason, .. } => {
                assert_eq!(reason, RevertReason::AmountExceedsBalance);
            }
            other => panic!("unexpected classification: {:?}", other),
        }
    }

    #[test]
    fn test_bond_too_small_revert() {
        let failure = RpcFailure::new(Some(-32603), "internal error")
            .with_data("execution reverted: Bond too small");
        match classify_rpc_error(&failure) {
            WorkflowError::ContractReverted { reason, raw } => {
                assert_eq!(reason, RevertReason::BondTooSmall);
                assert_eq!(raw, "Bond too small");
            }
            other => panic!("unexpected classification: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_revert_keeps_raw_text() {
        let failure = RpcFailure::new(Some(-32603), "internal error")
            .with_data("execution reverted: TRANSFER_FROM_FAILED");
        match classify_rpc_error(&failure) {
            WorkflowError::ContractReverted { reason, raw } => {
                assert_eq!(reason, RevertReason::Other);
                assert_eq!(raw, "TRANSFER_FROM_FAILED");
            }
            other => panic!("unexpected classification: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_code_is_transport() {
        let failure = RpcFailure::new(None, "connection refused");
        match classify_rpc_error(&failure) {
            WorkflowError::ChainRead(ChainReadError::Transport(msg)) => {
                assert_eq!(msg, "connection refused");
            }
            other => panic!("unexpected classification: {:?}", other),
        }
    }
}
