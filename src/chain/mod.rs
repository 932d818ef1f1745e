//! Provider/signer boundary.
//!
//! Workflows and metrics never touch JSON-RPC directly; they speak to two
//! narrow seams. `ChainReader` covers every read the dashboard needs and
//! `WalletProvider` covers submission and confirmation. `RpcGateway`
//! implements both over HTTP; tests substitute in-memory fakes.

pub mod abi;
pub mod rpc;

pub use rpc::RpcGateway;

use alloy_primitives::{Address, U256};
use async_trait::async_trait;

use crate::bonds::{BondDescriptor, BondQuote};
use crate::error::{ChainReadError, WorkflowError};
use crate::metrics::ProtocolSnapshot;
use crate::pending::TxHash;
use crate::state::AccountState;

// ============================================
// TYPED CALLS
// ============================================

/// Contract invocation a workflow wants signed and submitted. Encoding to
/// calldata happens at the gateway, so workflow logic stays ABI-free.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolCall {
    Approve {
        token: Address,
        spender: Address,
        amount: U256,
    },
    Stake {
        amount: U256,
        recipient: Address,
    },
    Unstake {
        amount: U256,
    },
    Wrap {
        amount: U256,
    },
    Unwrap {
        amount: U256,
    },
    BondDeposit {
        bond: Address,
        amount: U256,
        max_price: U256,
        recipient: Address,
    },
    RedeemSwap {
        amount: U256,
    },
}

/// Terminal state the network reports for a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxStatus {
    Confirmed,
    Reverted { raw: String },
}

// ============================================
// SEAMS
// ============================================

/// Submission half of the wallet boundary.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Connected signing account, `None` in read-only mode.
    fn signer_address(&self) -> Option<Address>;

    /// Chain id the wallet is currently on.
    async fn chain_id(&self) -> Result<u64, ChainReadError>;

    /// Sign and submit; resolves as soon as the network assigns a hash.
    async fn submit(&self, call: ProtocolCall) -> Result<TxHash, WorkflowError>;

    /// Resolve once the transaction settles, however long that takes.
    async fn confirm(&self, tx: TxHash) -> Result<TxStatus, WorkflowError>;
}

/// Read-only accessor for contract state.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// One consistent set of protocol-wide reads. All-or-nothing: a partial
    /// snapshot is an error, never a default-filled struct.
    async fn protocol_snapshot(&self) -> Result<ProtocolSnapshot, ChainReadError>;

    /// Balances and allowances of one account.
    async fn account_state(&self, address: Address) -> Result<AccountState, ChainReadError>;

    /// Quote a bond for the given deposit. `depositor` adds the allowance
    /// the purchase screen needs.
    async fn bond_quote(
        &self,
        bond: &BondDescriptor,
        deposit: U256,
        depositor: Option<Address>,
    ) -> Result<BondQuote, ChainReadError>;
}
