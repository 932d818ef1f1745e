//! Transaction workflows.
//!
//! Every user action runs the same lifecycle: guard, submit, track, wait,
//! clean up, refresh. The pending entry is held by a drop guard so no exit
//! path can leak it, and every terminal state produces exactly one
//! notification. Errors are classified here and never escape unreported;
//! callers get the classified error back for their own flow control.

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, U256};
use tracing::{debug, warn};

use crate::amount::parse_units;
use crate::audit::AuditLog;
use crate::bonds::BondDescriptor;
use crate::chain::{ChainReader, ProtocolCall, TxStatus, WalletProvider};
use crate::config::{addresses, AddressBook, Config, Network, TOKEN_DECIMALS, WRAPPED_DECIMALS};
use crate::error::WorkflowError;
use crate::metrics;
use crate::notify::{messages, Notification, NotificationSink};
use crate::pending::{PendingTx, TxHash};
use crate::state::{AppState, ApprovalTarget};

// ============================================
// CONSTANTS
// ============================================

/// Bond slippage bounds, matching the advanced-settings limits.
const MIN_SLIPPAGE: f64 = 0.001;
const MAX_SLIPPAGE: f64 = 0.5;

// ============================================
// WORKFLOW INPUTS
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StakeDirection {
    Stake,
    Unstake,
}

impl StakeDirection {
    fn action_type(&self) -> &'static str {
        match self {
            StakeDirection::Stake => "staking",
            StakeDirection::Unstake => "unstaking",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            StakeDirection::Stake => "Staking FROST",
            StakeDirection::Unstake => "Unstaking sFROST",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapDirection {
    Wrap,
    Unwrap,
}

impl WrapDirection {
    fn action_type(&self) -> &'static str {
        match self {
            WrapDirection::Wrap => "wrapping",
            WrapDirection::Unwrap => "unwrapping",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            WrapDirection::Wrap => "Wrapping sFROST",
            WrapDirection::Unwrap => "Unwrapping wsFROST",
        }
    }
}

/// Terminal result of a workflow invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Submitted, confirmed, state refreshed.
    Completed { tx: TxHash },
    /// A workflow with the same action type is already in flight; nothing
    /// was submitted.
    AlreadyPending,
}

// ============================================
// ORCHESTRATOR
// ============================================

/// Drives user actions against the wallet and keeps the shared state
/// consistent. The only component that mutates the pending registry or
/// triggers refreshes.
pub struct Orchestrator {
    wallet: Arc<dyn WalletProvider>,
    reader: Arc<dyn ChainReader>,
    state: Arc<AppState>,
    sink: Arc<dyn NotificationSink>,
    book: AddressBook,
    network: Network,
    expected_chain_id: u64,
    confirm_warn: Duration,
    refresh_delay: Duration,
    audit: AuditLog,
}

impl Orchestrator {
    pub fn new(
        config: &Config,
        wallet: Arc<dyn WalletProvider>,
        reader: Arc<dyn ChainReader>,
        state: Arc<AppState>,
        sink: Arc<dyn NotificationSink>,
    ) -> eyre::Result<Self> {
        Ok(Self {
            wallet,
            reader,
            state,
            sink,
            book: addresses(config.network)?,
            network: config.network,
            expected_chain_id: config.expected_chain_id(),
            confirm_warn: Duration::from_secs(config.confirm_warn_secs),
            refresh_delay: Duration::from_secs(config.refresh_delay_secs),
            audit: AuditLog::new(config.audit_log, config.audit_log_path.clone()),
        })
    }

    // ========== Public workflows ==========

    /// Grant an unlimited allowance for the given spender context.
    pub async fn approve(&self, target: ApprovalTarget) -> Result<Outcome, WorkflowError> {
        let action = target.action_type();
        let label = target.label();
        let result = self.approve_flow(&target, &action, &label).await;
        self.seal(&action, &label, result)
    }

    /// Stake FROST or unstake sFROST.
    pub async fn stake(
        &self,
        amount: &str,
        direction: StakeDirection,
    ) -> Result<Outcome, WorkflowError> {
        let result = self.stake_flow(amount, direction).await;
        self.seal(direction.action_type(), direction.label(), result)
    }

    /// Wrap sFROST into wsFROST or back.
    pub async fn wrap(
        &self,
        amount: &str,
        direction: WrapDirection,
    ) -> Result<Outcome, WorkflowError> {
        let result = self.wrap_flow(amount, direction).await;
        self.seal(direction.action_type(), direction.label(), result)
    }

    /// Purchase a bond. `recipient` defaults to the connected account.
    pub async fn bond(
        &self,
        amount: &str,
        bond: &BondDescriptor,
        slippage: f64,
        recipient: Option<Address>,
    ) -> Result<Outcome, WorkflowError> {
        let action = bond.action_type();
        let label = format!("Bonding {}", bond.display_name);
        let result = self.bond_flow(amount, bond, slippage, recipient, &action, &label).await;
        self.seal(&action, &label, result)
    }

    /// Redeem FROST for the fixed reserve payout.
    pub async fn redeem(&self, amount: &str) -> Result<Outcome, WorkflowError> {
        let result = self.redeem_flow(amount).await;
        self.seal("redeem", "Redeeming FROST", result)
    }

    // ========== Flows ==========

    async fn approve_flow(
        &self,
        target: &ApprovalTarget,
        action: &str,
        label: &str,
    ) -> Result<Outcome, WorkflowError> {
        self.connected_account()?;
        self.check_network().await?;

        let (token, spender) = self.approval_pair(target)?;
        let call = ProtocolCall::Approve {
            token,
            spender,
            amount: U256::MAX,
        };
        self.execute(action, label, call).await
    }

    async fn stake_flow(
        &self,
        amount: &str,
        direction: StakeDirection,
    ) -> Result<Outcome, WorkflowError> {
        let account = self.connected_account()?;
        let units = parse_units(amount, TOKEN_DECIMALS)?;
        self.check_network().await?;

        let call = match direction {
            StakeDirection::Stake => ProtocolCall::Stake {
                amount: units,
                recipient: account,
            },
            StakeDirection::Unstake => ProtocolCall::Unstake { amount: units },
        };
        self.execute(direction.action_type(), direction.label(), call)
            .await
    }

    async fn wrap_flow(
        &self,
        amount: &str,
        direction: WrapDirection,
    ) -> Result<Outcome, WorkflowError> {
        self.connected_account()?;
        // The wrapper burns 18-decimal wsFROST on the way out.
        let call = match direction {
            WrapDirection::Wrap => ProtocolCall::Wrap {
                amount: parse_units(amount, TOKEN_DECIMALS)?,
            },
            WrapDirection::Unwrap => ProtocolCall::Unwrap {
                amount: parse_units(amount, WRAPPED_DECIMALS)?,
            },
        };
        self.check_network().await?;
        self.execute(direction.action_type(), direction.label(), call)
            .await
    }

    async fn bond_flow(
        &self,
        amount: &str,
        bond: &BondDescriptor,
        slippage: f64,
        recipient: Option<Address>,
        action: &str,
        label: &str,
    ) -> Result<Outcome, WorkflowError> {
        let account = self.connected_account()?;
        if !(MIN_SLIPPAGE..=MAX_SLIPPAGE).contains(&slippage) {
            return Err(WorkflowError::InvalidAmount(format!(
                "slippage must be between {} and {}",
                MIN_SLIPPAGE, MAX_SLIPPAGE
            )));
        }
        let units = parse_units(amount, bond.reserve_decimals)?;
        self.check_network().await?;

        let bond_addrs = bond
            .addresses(self.network)
            .ok_or_else(|| WorkflowError::Unsupported(format!("{} bond", bond.name)))?;

        // Quote before submitting: the deposit must fit under the payout
        // cap, and the quoted price anchors the slippage bound.
        let quote = self.reader.bond_quote(bond, units, Some(account)).await?;
        if quote.payout_for_deposit > quote.max_payout {
            return Err(WorkflowError::InvalidAmount(
                "deposit exceeds the maximum bond size".to_string(),
            ));
        }

        let raw_price: f64 = quote.raw_price.to_string().parse().unwrap_or(f64::MAX);
        let max_price = U256::from((raw_price * (1.0 + slippage)).round() as u128);

        let call = ProtocolCall::BondDeposit {
            bond: bond_addrs.bond,
            amount: units,
            max_price,
            recipient: recipient.unwrap_or(account),
        };
        self.execute(action, label, call).await
    }

    async fn redeem_flow(&self, amount: &str) -> Result<Outcome, WorkflowError> {
        self.connected_account()?;
        let units = parse_units(amount, TOKEN_DECIMALS)?;
        self.check_network().await?;

        self.execute(
            "redeem",
            "Redeeming FROST",
            ProtocolCall::RedeemSwap { amount: units },
        )
        .await
    }

    // ========== Guards ==========

    fn connected_account(&self) -> Result<Address, WorkflowError> {
        self.wallet
            .signer_address()
            .ok_or(WorkflowError::ProviderUnavailable)
    }

    async fn check_network(&self) -> Result<(), WorkflowError> {
        let actual = self.wallet.chain_id().await?;
        if actual != self.expected_chain_id {
            return Err(WorkflowError::WrongNetwork {
                expected: self.expected_chain_id,
                actual,
            });
        }
        Ok(())
    }

    fn approval_pair(&self, target: &ApprovalTarget) -> Result<(Address, Address), WorkflowError> {
        let book = &self.book;
        Ok(match target {
            ApprovalTarget::Staking => (book.token, book.staking_helper),
            ApprovalTarget::Unstaking => (book.staked_token, book.staking),
            ApprovalTarget::Wrapping => (book.staked_token, book.wrapped_token),
            ApprovalTarget::Redemption => {
                let redemption = book
                    .redemption
                    .ok_or_else(|| WorkflowError::Unsupported("redemption".to_string()))?;
                (book.token, redemption)
            }
            ApprovalTarget::Bond(name) => {
                let bond = crate::bonds::bond_by_name(name)
                    .and_then(|b| b.addresses(self.network))
                    .ok_or_else(|| WorkflowError::Unsupported(format!("{} bond", name)))?;
                (bond.reserve, bond.bond)
            }
        })
    }

    // ========== Lifecycle ==========

    /// Submit one prepared call and drive it to a terminal state.
    async fn execute(
        &self,
        action: &str,
        label: &str,
        call: ProtocolCall,
    ) -> Result<Outcome, WorkflowError> {
        // Guard and reserve in one synchronous step. Nothing may await
        // between the check and the reservation, or two clicks landing in
        // the same scheduler window would both pass.
        {
            let mut pending = self.state.pending.lock().unwrap();
            if !pending.try_reserve(action) {
                debug!("{} already in flight, ignoring", action);
                return Ok(Outcome::AlreadyPending);
            }
        }

        let tx = match self.wallet.submit(call).await {
            Ok(tx) => tx,
            Err(e) => {
                self.state.pending.lock().unwrap().release(action);
                return Err(e);
            }
        };

        self.state.pending.lock().unwrap().add(PendingTx {
            id: tx,
            label: label.to_string(),
            action_type: action.to_string(),
        });
        self.sink.notify(Notification::info(messages::TX_SUBMITTED));

        // The entry leaves the registry on every path out of this block,
        // confirmation, revert or transport failure alike.
        let status = {
            let _cleanup = PendingCleanup {
                state: &self.state,
                id: tx,
            };
            self.wait_confirmed(tx).await
        }?;

        match status {
            TxStatus::Confirmed => {
                self.sink
                    .notify(Notification::success(messages::TX_SUCCESSFUL));
                self.audit.record(action, label, Some(tx), "confirmed", None);
                if let Some(account) = self.wallet.signer_address() {
                    self.refresh_after(account).await;
                }
                Ok(Outcome::Completed { tx })
            }
            TxStatus::Reverted { raw } => Err(WorkflowError::reverted(raw)),
        }
    }

    /// Wait for the network to settle the transaction, nudging the user
    /// once if it takes suspiciously long. The wait itself is unbounded;
    /// a submitted transaction cannot be abandoned.
    async fn wait_confirmed(&self, tx: TxHash) -> Result<TxStatus, WorkflowError> {
        let confirm = self.wallet.confirm(tx);
        tokio::pin!(confirm);
        let warn_after = tokio::time::sleep(self.confirm_warn);
        tokio::pin!(warn_after);
        let mut warned = false;

        loop {
            tokio::select! {
                status = &mut confirm => return status,
                _ = &mut warn_after, if !warned => {
                    warned = true;
                    self.sink
                        .notify(Notification::warning(messages::TX_STILL_PENDING));
                }
            }
        }
    }

    /// Refresh balances/allowances and recompute metrics after a confirmed
    /// transaction. A failed refresh keeps the previous state in place.
    async fn refresh_after(&self, account: Address) {
        self.sink
            .notify(Notification::info(messages::BALANCE_UPDATE_SOON));
        if !self.refresh_delay.is_zero() {
            tokio::time::sleep(self.refresh_delay).await;
        }

        let seq = self.state.account.begin();
        let fresh = match self.reader.account_state(account).await {
            Ok(fresh) => fresh,
            Err(e) => {
                warn!("balance refresh failed: {}", e);
                self.sink
                    .notify(Notification::warning(messages::BALANCE_REFRESH_FAILED));
                return;
            }
        };
        if !self.state.account.apply(seq, fresh) {
            debug!("discarding stale balance refresh (seq {})", seq);
        }

        let metrics_seq = self.state.metrics.begin();
        match self.reader.protocol_snapshot().await {
            Ok(snapshot) => {
                let computed = metrics::compute(&snapshot);
                if !self.state.metrics.apply(metrics_seq, Some(computed)) {
                    debug!("discarding stale metrics refresh (seq {})", metrics_seq);
                }
                self.sink
                    .notify(Notification::info(messages::BALANCE_UPDATED));
            }
            Err(e) => {
                warn!("metrics refresh failed: {}", e);
                self.sink
                    .notify(Notification::warning(messages::BALANCE_REFRESH_FAILED));
            }
        }
    }

    /// Convert a workflow error into its single user-facing notification
    /// and audit record, then hand it back to the caller.
    fn seal(
        &self,
        action: &str,
        label: &str,
        result: Result<Outcome, WorkflowError>,
    ) -> Result<Outcome, WorkflowError> {
        match result {
            Ok(outcome) => Ok(outcome),
            Err(error) => {
                self.sink
                    .notify(Notification::failure(user_text(&error), error.to_string()));
                self.audit.record(
                    action,
                    label,
                    None,
                    outcome_tag(&error),
                    Some(error.to_string()),
                );
                Err(error)
            }
        }
    }
}

/// Removes the pending entry when the confirmation scope is left.
struct PendingCleanup<'a> {
    state: &'a AppState,
    id: TxHash,
}

impl Drop for PendingCleanup<'_> {
    fn drop(&mut self) {
        self.state.pending.lock().unwrap().remove_by_id(&self.id);
    }
}

fn user_text(error: &WorkflowError) -> String {
    match error {
        WorkflowError::ProviderUnavailable => messages::PLEASE_CONNECT_WALLET.to_string(),
        WorkflowError::WrongNetwork { .. } => messages::SWITCH_NETWORK.to_string(),
        WorkflowError::InvalidAmount(reason) => format!("Invalid amount: {}", reason),
        WorkflowError::UserRejected => "Transaction signature was denied".to_string(),
        WorkflowError::ContractReverted { reason, .. } => reason.user_message().to_string(),
        WorkflowError::ChainRead(_) => "Could not reach the network, please retry".to_string(),
        WorkflowError::Unsupported(what) => {
            format!("{} is not available on this network", what)
        }
    }
}

fn outcome_tag(error: &WorkflowError) -> &'static str {
    match error {
        WorkflowError::UserRejected => "rejected",
        WorkflowError::ContractReverted { .. } => "reverted",
        _ => "failed",
    }
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bonds::{bond_by_name, BondQuote, BondReserves};
    use crate::error::{ChainReadError, RevertReason};
    use crate::metrics::{BondSnapshot, EpochInfo, ProtocolSnapshot};
    use crate::notify::{MemorySink, Severity};
    use crate::state::AccountState;
    use alloy_primitives::B256;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tokio::sync::Notify;

    // ========== Fakes ==========

    #[derive(Default)]
    struct MockWallet {
        signer: Option<Address>,
        chain_id: u64,
        submit_error: Option<WorkflowError>,
        revert: Option<String>,
        gate: Option<Arc<Notify>>,
        submits: Mutex<Vec<ProtocolCall>>,
    }

    impl MockWallet {
        fn connected() -> Self {
            Self {
                signer: Some(Address::repeat_byte(0xAA)),
                chain_id: 43114,
                ..Default::default()
            }
        }

        fn submitted(&self) -> Vec<ProtocolCall> {
            self.submits.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl WalletProvider for MockWallet {
        fn signer_address(&self) -> Option<Address> {
            self.signer
        }

        async fn chain_id(&self) -> Result<u64, ChainReadError> {
            Ok(self.chain_id)
        }

        async fn submit(&self, call: ProtocolCall) -> Result<TxHash, WorkflowError> {
            if let Some(error) = &self.submit_error {
                return Err(error.clone());
            }
            let mut submits = self.submits.lock().unwrap();
            submits.push(call);
            Ok(B256::repeat_byte(submits.len() as u8))
        }

        async fn confirm(&self, _tx: TxHash) -> Result<TxStatus, WorkflowError> {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            match &self.revert {
                Some(raw) => Ok(TxStatus::Reverted { raw: raw.clone() }),
                None => Ok(TxStatus::Confirmed),
            }
        }
    }

    struct MockReader {
        account: AccountState,
        snapshot: ProtocolSnapshot,
        quote: BondQuote,
    }

    impl Default for MockReader {
        fn default() -> Self {
            Self {
                account: AccountState {
                    balances: HashMap::from([("FROST".to_string(), 12.5)]),
                    allowances: HashMap::new(),
                },
                snapshot: test_snapshot(),
                quote: BondQuote {
                    raw_price: U256::from(5_000_000_000u64),
                    price_usd: 5.0,
                    payout_for_deposit: 10.0,
                    max_payout: 500.0,
                    purchased_usd: 1_000_000.0,
                    current_debt: 250.0,
                    vesting_term_secs: 432_000,
                    allowance: U256::MAX,
                },
            }
        }
    }

    #[async_trait]
    impl ChainReader for MockReader {
        async fn protocol_snapshot(&self) -> Result<ProtocolSnapshot, ChainReadError> {
            Ok(self.snapshot.clone())
        }

        async fn account_state(&self, _address: Address) -> Result<AccountState, ChainReadError> {
            Ok(self.account.clone())
        }

        async fn bond_quote(
            &self,
            _bond: &BondDescriptor,
            _deposit: U256,
            _depositor: Option<Address>,
        ) -> Result<BondQuote, ChainReadError> {
            Ok(self.quote.clone())
        }
    }

    fn test_snapshot() -> ProtocolSnapshot {
        ProtocolSnapshot {
            raw_market_price: 2e9,
            stable_price_usd: 1.0,
            total_supply: 1_000.0,
            circulating_supply: 800.0,
            current_index: 4.2,
            dao_balance: 0.0,
            epoch: EpochInfo {
                number: 1,
                distribute: 8.0,
                end_time: 1_700_030_000,
            },
            current_block: 1,
            current_block_time: 1_700_000_000,
            bonds: vec![BondSnapshot {
                name: "mim".to_string(),
                kind: crate::bonds::BondKind::Stable,
                reserves: BondReserves {
                    reserve_balance: 1_000.0,
                    lp: None,
                },
                reserve_price_usd: 1.0,
            }],
            redemption: None,
            treasury_adjustment_usd: 0.0,
        }
    }

    struct Harness {
        orchestrator: Arc<Orchestrator>,
        wallet: Arc<MockWallet>,
        state: Arc<AppState>,
        sink: Arc<MemorySink>,
    }

    fn harness(wallet: MockWallet) -> Harness {
        let mut config = Config::default();
        config.refresh_delay_secs = 0;
        config.audit_log = false;

        let wallet = Arc::new(wallet);
        let state = Arc::new(AppState::new());
        let sink = Arc::new(MemorySink::new());
        let orchestrator = Arc::new(
            Orchestrator::new(
                &config,
                wallet.clone(),
                Arc::new(MockReader::default()),
                state.clone(),
                sink.clone(),
            )
            .unwrap(),
        );
        Harness {
            orchestrator,
            wallet,
            state,
            sink,
        }
    }

    // ========== Lifecycle ==========

    #[tokio::test]
    async fn test_stake_happy_path() {
        let h = harness(MockWallet::connected());

        let outcome = h.orchestrator.stake("1.5", StakeDirection::Stake).await.unwrap();
        assert!(matches!(outcome, Outcome::Completed { .. }));

        // The 1.5 FROST input reaches the network as 9-decimal units.
        let submits = h.wallet.submitted();
        assert_eq!(submits.len(), 1);
        match &submits[0] {
            ProtocolCall::Stake { amount, recipient } => {
                assert_eq!(*amount, U256::from(1_500_000_000u64));
                assert_eq!(*recipient, Address::repeat_byte(0xAA));
            }
            other => panic!("unexpected call: {:?}", other),
        }

        // Registry cleaned up, balances refreshed, one success notification.
        assert!(h.state.pending.lock().unwrap().list_all().is_empty());
        assert_eq!(h.state.account.get().balance("FROST"), 12.5);
        assert!(h.state.metrics.get().is_some());
        assert_eq!(h.sink.count(Severity::Success), 1);
        assert_eq!(h.sink.count(Severity::Error), 0);
    }

    #[tokio::test]
    async fn test_duplicate_invocation_is_noop() {
        let mut wallet = MockWallet::connected();
        let gate = Arc::new(Notify::new());
        wallet.gate = Some(gate.clone());
        let h = harness(wallet);

        let first = {
            let orchestrator = h.orchestrator.clone();
            tokio::spawn(async move { orchestrator.stake("1", StakeDirection::Stake).await })
        };
        // Let the first invocation reach the confirmation wait.
        tokio::time::sleep(Duration::from_millis(20)).await;
        let tracked = h.state.pending.lock().unwrap().list_all();
        assert_eq!(tracked.len(), 1);
        assert_eq!(tracked[0].action_type, "staking");
        assert_eq!(tracked[0].label, "Staking FROST");

        let second = h.orchestrator.stake("1", StakeDirection::Stake).await.unwrap();
        assert_eq!(second, Outcome::AlreadyPending);

        gate.notify_one();
        let first = first.await.unwrap().unwrap();
        assert!(matches!(first, Outcome::Completed { .. }));

        // Exactly one submission ever reached the wallet.
        assert_eq!(h.wallet.submitted().len(), 1);
        assert!(h.state.pending.lock().unwrap().list_all().is_empty());
    }

    #[tokio::test]
    async fn test_revert_classifies_and_cleans_up() {
        let mut wallet = MockWallet::connected();
        wallet.revert = Some("Bond too small".to_string());
        let h = harness(wallet);

        let error = h
            .orchestrator
            .stake("1", StakeDirection::Unstake)
            .await
            .unwrap_err();
        match error {
            WorkflowError::ContractReverted { reason, .. } => {
                assert_eq!(reason, RevertReason::BondTooSmall);
            }
            other => panic!("unexpected error: {:?}", other),
        }

        assert!(h.state.pending.lock().unwrap().list_all().is_empty());
        assert_eq!(h.sink.count(Severity::Error), 1);
        assert_eq!(h.sink.count(Severity::Success), 0);
    }

    #[tokio::test]
    async fn test_user_rejection_releases_reservation() {
        let mut wallet = MockWallet::connected();
        wallet.submit_error = Some(WorkflowError::UserRejected);
        let h = harness(wallet);

        let error = h
            .orchestrator
            .stake("1", StakeDirection::Stake)
            .await
            .unwrap_err();
        assert_eq!(error, WorkflowError::UserRejected);

        // Nothing tracked, nothing reserved: the user can retry at once.
        assert!(h.state.pending.lock().unwrap().is_empty());
        assert_eq!(h.sink.count(Severity::Error), 1);
        assert!(h.state.pending.lock().unwrap().try_reserve("staking"));
    }

    // ========== Fail-fast guards ==========

    #[tokio::test]
    async fn test_invalid_amounts_never_submit() {
        let h = harness(MockWallet::connected());

        for bad in ["0", "-1", "", "abc"] {
            let error = h
                .orchestrator
                .stake(bad, StakeDirection::Stake)
                .await
                .unwrap_err();
            assert!(
                matches!(error, WorkflowError::InvalidAmount(_)),
                "expected InvalidAmount for {:?}",
                bad
            );
        }
        assert!(h.wallet.submitted().is_empty());
        assert_eq!(h.sink.count(Severity::Error), 4);
    }

    #[tokio::test]
    async fn test_wrong_network_fails_every_workflow() {
        let mut wallet = MockWallet::connected();
        wallet.chain_id = 1;
        let h = harness(wallet);

        let error = h
            .orchestrator
            .stake("1", StakeDirection::Stake)
            .await
            .unwrap_err();
        assert_eq!(
            error,
            WorkflowError::WrongNetwork {
                expected: 43114,
                actual: 1
            }
        );

        let error = h.orchestrator.redeem("1").await.unwrap_err();
        assert!(matches!(error, WorkflowError::WrongNetwork { .. }));

        let error = h
            .orchestrator
            .approve(ApprovalTarget::Staking)
            .await
            .unwrap_err();
        assert!(matches!(error, WorkflowError::WrongNetwork { .. }));

        assert!(h.wallet.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_disconnected_wallet_fails_fast() {
        let h = harness(MockWallet {
            chain_id: 43114,
            ..Default::default()
        });

        let error = h
            .orchestrator
            .wrap("1", WrapDirection::Wrap)
            .await
            .unwrap_err();
        assert_eq!(error, WorkflowError::ProviderUnavailable);
        assert_eq!(h.sink.count(Severity::Error), 1);
        assert!(h.wallet.submitted().is_empty());
    }

    // ========== Specific workflows ==========

    #[tokio::test]
    async fn test_approve_targets_the_right_pair() {
        let h = harness(MockWallet::connected());

        h.orchestrator
            .approve(ApprovalTarget::Staking)
            .await
            .unwrap();

        let book = addresses(Network::Avalanche).unwrap();
        match &h.wallet.submitted()[0] {
            ProtocolCall::Approve {
                token,
                spender,
                amount,
            } => {
                assert_eq!(*token, book.token);
                assert_eq!(*spender, book.staking_helper);
                assert_eq!(*amount, U256::MAX);
            }
            other => panic!("unexpected call: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unwrap_parses_wrapped_decimals() {
        let h = harness(MockWallet::connected());

        h.orchestrator.wrap("1.5", WrapDirection::Unwrap).await.unwrap();
        match &h.wallet.submitted()[0] {
            ProtocolCall::Unwrap { amount } => {
                assert_eq!(*amount, U256::from(1_500_000_000_000_000_000u128));
            }
            other => panic!("unexpected call: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_bond_applies_slippage_to_quoted_price() {
        let h = harness(MockWallet::connected());
        let bond = bond_by_name("mim_frost_lp").unwrap();

        h.orchestrator.bond("10", bond, 0.01, None).await.unwrap();

        match &h.wallet.submitted()[0] {
            ProtocolCall::BondDeposit {
                amount, max_price, ..
            } => {
                assert_eq!(*amount, U256::from(10u64) * U256::from(10u64).pow(U256::from(18u64)));
                // Quoted raw price 5e9 with 1% headroom.
                assert_eq!(*max_price, U256::from(5_050_000_000u64));
            }
            other => panic!("unexpected call: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_bond_rejects_out_of_range_slippage() {
        let h = harness(MockWallet::connected());
        let bond = bond_by_name("mim_frost_lp").unwrap();

        let error = h.orchestrator.bond("10", bond, 0.9, None).await.unwrap_err();
        assert!(matches!(error, WorkflowError::InvalidAmount(_)));
        assert!(h.wallet.submitted().is_empty());
    }
}
