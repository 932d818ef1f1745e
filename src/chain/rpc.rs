//! Live chain access over JSON-RPC.
//!
//! The protocol snapshot is batched through Multicall3 into a single RPC
//! round instead of ~20 individual calls. The batch runs with
//! `allowFailure: false`: one reverting sub-read reverts the whole call, so
//! a snapshot is either complete or an error, never a mix of old and new
//! values.

use std::str::FromStr;
use std::time::{Duration, Instant};

use alloy_network::EthereumWallet;
use alloy_primitives::{address, Address, U256};
use alloy_provider::{Provider, ProviderBuilder};
use alloy_rpc_types::TransactionRequest;
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::SolCall;
use alloy_transport::TransportError;
use async_trait::async_trait;
use tracing::{debug, info};

use super::abi::{
    IBondDepository, IMulticall3, IPair, IRedemption, IStakedToken, IStaking, IStakingHelper,
    IWrappedToken, IERC20,
};
use super::{ChainReader, ProtocolCall, TxStatus, WalletProvider};
use crate::amount::to_f64;
use crate::bonds::{
    value_reserves, BondAddresses, BondDescriptor, BondQuote, BondReserves, LpReserves, ALL_BONDS,
};
use crate::config::{
    addresses, AddressBook, Config, Network, RESERVE_DECIMALS, TOKEN_DECIMALS, WRAPPED_DECIMALS,
};
use crate::error::{classify_rpc_error, ChainReadError, RpcFailure, WorkflowError};
use crate::metrics::{BondSnapshot, EpochInfo, ProtocolSnapshot, RedemptionSnapshot};
use crate::pending::TxHash;
use crate::price_oracle::PriceOracle;
use crate::state::{AccountState, ApprovalTarget};

// ============================================
// CONSTANTS
// ============================================

/// Multicall3 address (same on all EVM chains).
const MULTICALL3: Address = address!("cA11bde05977b3631167028862bE2a173976CA11");

/// Decimals of pool LP tokens.
const LP_DECIMALS: u8 = 18;

// ============================================
// HELPERS
// ============================================

fn transport(e: impl std::fmt::Display) -> ChainReadError {
    ChainReadError::Transport(e.to_string())
}

fn call3(target: Address, calldata: Vec<u8>) -> IMulticall3::Call3 {
    IMulticall3::Call3 {
        target,
        allowFailure: false,
        callData: calldata.into(),
    }
}

/// Decode one multicall sub-result into the call's return type.
fn decode<C: SolCall>(
    results: &[IMulticall3::Result],
    index: usize,
    target: &str,
) -> Result<C::Return, ChainReadError> {
    let result = results.get(index).ok_or_else(|| ChainReadError::Decode {
        target: target.to_string(),
        message: "missing result".to_string(),
    })?;
    if !result.success {
        return Err(ChainReadError::CallFailed {
            target: target.to_string(),
            message: "call reverted".to_string(),
        });
    }
    C::abi_decode_returns(&result.returnData).map_err(|e| ChainReadError::Decode {
        target: target.to_string(),
        message: e.to_string(),
    })
}

/// Map a provider failure onto the workflow taxonomy, pulling the JSON-RPC
/// error payload out when one is attached.
fn classify_transport_error(err: &TransportError) -> WorkflowError {
    if let Some(payload) = err.as_error_resp() {
        let mut failure = RpcFailure::new(Some(payload.code), payload.message.to_string());
        if let Some(data) = &payload.data {
            failure = failure.with_data(format!("{}", data));
        }
        classify_rpc_error(&failure)
    } else {
        WorkflowError::ChainRead(ChainReadError::Transport(err.to_string()))
    }
}

struct Cursor(usize);

impl Cursor {
    fn next(&mut self) -> usize {
        let i = self.0;
        self.0 += 1;
        i
    }
}

// ============================================
// GATEWAY
// ============================================

/// Reader and submitter over one HTTP endpoint. Providers are built per
/// call from the URL; the handle itself is freely shareable.
pub struct RpcGateway {
    rpc_url: String,
    network: Network,
    book: AddressBook,
    signer: Option<PrivateKeySigner>,
    oracle: PriceOracle,
    treasury_adjustment_usd: f64,
    confirm_poll: Duration,
}

impl RpcGateway {
    pub fn new(config: &Config, oracle: PriceOracle) -> eyre::Result<Self> {
        let book = addresses(config.network)?;

        let signer = match &config.signer_key {
            Some(key) => {
                let signer = PrivateKeySigner::from_str(key.trim_start_matches("0x"))
                    .map_err(|e| eyre::eyre!("failed to parse SIGNER_KEY: {}", e))?;
                info!("Signer loaded: {:?}", signer.address());
                Some(signer)
            }
            None => {
                debug!("No SIGNER_KEY set, running read-only");
                None
            }
        };

        Ok(Self {
            rpc_url: config.rpc_url.clone(),
            network: config.network,
            book,
            signer,
            oracle,
            treasury_adjustment_usd: config.treasury_adjustment_usd,
            confirm_poll: Duration::from_secs(config.confirm_poll_secs),
        })
    }

    fn read_provider(&self) -> Result<impl Provider, ChainReadError> {
        Ok(ProviderBuilder::new().on_http(self.rpc_url.parse().map_err(transport)?))
    }

    /// Execute a Multicall3 batch.
    async fn execute_multicall(
        &self,
        calls: Vec<IMulticall3::Call3>,
    ) -> Result<Vec<IMulticall3::Result>, ChainReadError> {
        if calls.is_empty() {
            return Ok(Vec::new());
        }

        let provider = self.read_provider()?;
        let calldata = IMulticall3::aggregate3Call { calls }.abi_encode();
        let tx = TransactionRequest::default()
            .to(MULTICALL3)
            .input(calldata.into());

        let raw = provider
            .call(tx)
            .await
            .map_err(|e| ChainReadError::CallFailed {
                target: "multicall3".to_string(),
                message: e.to_string(),
            })?;

        IMulticall3::aggregate3Call::abi_decode_returns(&raw).map_err(|e| {
            ChainReadError::Decode {
                target: "multicall3".to_string(),
                message: e.to_string(),
            }
        })
    }

    /// Bonds with a deployment on the configured network.
    fn deployed_bonds(&self) -> Vec<(&'static BondDescriptor, BondAddresses)> {
        ALL_BONDS
            .iter()
            .filter_map(|b| b.addresses(self.network).map(|a| (b, a)))
            .collect()
    }

    /// Queue the reads that value one bond's treasury reserves. LP kinds
    /// need the whole pool picture; single-asset kinds just the balance.
    fn push_reserve_calls(
        &self,
        calls: &mut Vec<IMulticall3::Call3>,
        bond: &BondDescriptor,
        addrs: &BondAddresses,
    ) {
        if bond.kind.is_lp() {
            calls.push(call3(addrs.reserve, IPair::getReservesCall {}.abi_encode()));
            calls.push(call3(addrs.reserve, IPair::token0Call {}.abi_encode()));
            calls.push(call3(addrs.reserve, IPair::totalSupplyCall {}.abi_encode()));
            calls.push(call3(
                addrs.reserve,
                IPair::balanceOfCall {
                    account: self.book.treasury,
                }
                .abi_encode(),
            ));
        } else {
            calls.push(call3(
                addrs.reserve,
                IERC20::balanceOfCall {
                    account: self.book.treasury,
                }
                .abi_encode(),
            ));
        }
    }

    /// Decode the results queued by `push_reserve_calls`.
    fn decode_reserves(
        &self,
        results: &[IMulticall3::Result],
        cur: &mut Cursor,
        bond: &BondDescriptor,
    ) -> Result<BondReserves, ChainReadError> {
        if bond.kind.is_lp() {
            let pool = decode::<IPair::getReservesCall>(results, cur.next(), bond.name)?;
            let token0 = decode::<IPair::token0Call>(results, cur.next(), bond.name)?;
            let lp_supply = decode::<IPair::totalSupplyCall>(results, cur.next(), bond.name)?;
            let lp_balance = decode::<IPair::balanceOfCall>(results, cur.next(), bond.name)?;

            let (protocol_side, reserve_side) = if token0 == self.book.token {
                (pool.reserve0, pool.reserve1)
            } else {
                (pool.reserve1, pool.reserve0)
            };

            Ok(BondReserves {
                reserve_balance: 0.0,
                lp: Some(LpReserves {
                    lp_balance: to_f64(lp_balance, LP_DECIMALS),
                    lp_total_supply: to_f64(lp_supply, LP_DECIMALS),
                    reserve_side: to_f64(
                        U256::from(reserve_side.to::<u128>()),
                        bond.reserve_decimals,
                    ),
                    protocol_side: to_f64(
                        U256::from(protocol_side.to::<u128>()),
                        TOKEN_DECIMALS,
                    ),
                }),
            })
        } else {
            let balance = decode::<IERC20::balanceOfCall>(results, cur.next(), bond.name)?;
            Ok(BondReserves {
                reserve_balance: to_f64(balance, bond.reserve_decimals),
                lp: None,
            })
        }
    }

    /// Resolve a typed call into (target, calldata).
    fn encode_call(&self, call: &ProtocolCall) -> Result<(Address, Vec<u8>), WorkflowError> {
        let book = &self.book;
        Ok(match call {
            ProtocolCall::Approve {
                token,
                spender,
                amount,
            } => (
                *token,
                IERC20::approveCall {
                    spender: *spender,
                    amount: *amount,
                }
                .abi_encode(),
            ),
            ProtocolCall::Stake { amount, recipient } => (
                book.staking_helper,
                IStakingHelper::stakeCall {
                    amount: *amount,
                    recipient: *recipient,
                }
                .abi_encode(),
            ),
            ProtocolCall::Unstake { amount } => (
                book.staking,
                IStaking::unstakeCall {
                    amount: *amount,
                    trigger: true,
                }
                .abi_encode(),
            ),
            ProtocolCall::Wrap { amount } => (
                book.wrapped_token,
                IWrappedToken::wrapCall { amount: *amount }.abi_encode(),
            ),
            ProtocolCall::Unwrap { amount } => (
                book.wrapped_token,
                IWrappedToken::unwrapCall { amount: *amount }.abi_encode(),
            ),
            ProtocolCall::BondDeposit {
                bond,
                amount,
                max_price,
                recipient,
            } => (
                *bond,
                IBondDepository::depositCall {
                    amount: *amount,
                    maxPrice: *max_price,
                    depositor: *recipient,
                }
                .abi_encode(),
            ),
            ProtocolCall::RedeemSwap { amount } => {
                let redemption = book
                    .redemption
                    .ok_or_else(|| WorkflowError::Unsupported("redemption".to_string()))?;
                (
                    redemption,
                    IRedemption::swapCall { amount: *amount }.abi_encode(),
                )
            }
        })
    }
}

// ============================================
// READS
// ============================================

#[async_trait]
impl ChainReader for RpcGateway {
    async fn protocol_snapshot(&self) -> Result<ProtocolSnapshot, ChainReadError> {
        let start = Instant::now();

        // A snapshot taken against the wrong chain would decode cleanly and
        // display nonsense, so the chain id gates everything else.
        let actual = self.read_provider()?.get_chain_id().await.map_err(transport)?;
        let expected = self.network.chain_id();
        if actual != expected {
            return Err(ChainReadError::WrongChain { expected, actual });
        }

        let prices = self.oracle.get_prices().await;
        let book = &self.book;
        let bonds = self.deployed_bonds();

        let mut calls = vec![
            call3(book.market_pair, IPair::getReservesCall {}.abi_encode()),
            call3(book.market_pair, IPair::token0Call {}.abi_encode()),
            call3(book.token, IERC20::totalSupplyCall {}.abi_encode()),
            call3(
                book.staked_token,
                IStakedToken::circulatingSupplyCall {}.abi_encode(),
            ),
            call3(book.staking, IStaking::epochCall {}.abi_encode()),
            call3(book.staking, IStaking::indexCall {}.abi_encode()),
            call3(
                book.token,
                IERC20::balanceOfCall { account: book.dao }.abi_encode(),
            ),
            call3(MULTICALL3, IMulticall3::getBlockNumberCall {}.abi_encode()),
            call3(
                MULTICALL3,
                IMulticall3::getCurrentBlockTimestampCall {}.abi_encode(),
            ),
        ];

        for (bond, addrs) in &bonds {
            self.push_reserve_calls(&mut calls, bond, addrs);
        }

        if let Some(redemption) = book.redemption {
            calls.push(call3(redemption, IRedemption::redeemRateCall {}.abi_encode()));
            calls.push(call3(
                redemption,
                IRedemption::totalRedeemedCall {}.abi_encode(),
            ));
            calls.push(call3(
                book.reserve_token,
                IERC20::balanceOfCall {
                    account: redemption,
                }
                .abi_encode(),
            ));
            calls.push(call3(
                book.token,
                IERC20::balanceOfCall {
                    account: redemption,
                }
                .abi_encode(),
            ));
        }

        let call_count = calls.len();
        let results = self.execute_multicall(calls).await?;
        let mut cur = Cursor(0);

        let pool = decode::<IPair::getReservesCall>(&results, cur.next(), "market pair")?;
        let pair_token0 = decode::<IPair::token0Call>(&results, cur.next(), "market pair")?;
        let total_supply_raw =
            decode::<IERC20::totalSupplyCall>(&results, cur.next(), "token supply")?;
        let circulating_raw =
            decode::<IStakedToken::circulatingSupplyCall>(&results, cur.next(), "staked token")?;
        let epoch = decode::<IStaking::epochCall>(&results, cur.next(), "staking epoch")?;
        let index_raw = decode::<IStaking::indexCall>(&results, cur.next(), "staking index")?;
        let dao_raw = decode::<IERC20::balanceOfCall>(&results, cur.next(), "dao balance")?;
        let block_number =
            decode::<IMulticall3::getBlockNumberCall>(&results, cur.next(), "block number")?;
        let block_time = decode::<IMulticall3::getCurrentBlockTimestampCall>(
            &results,
            cur.next(),
            "block timestamp",
        )?;

        let (frost_reserve, stable_reserve) = if pair_token0 == book.token {
            (pool.reserve0, pool.reserve1)
        } else {
            (pool.reserve1, pool.reserve0)
        };
        let frost_reserve = frost_reserve.to::<u128>() as f64;
        let stable_reserve = stable_reserve.to::<u128>() as f64;
        if frost_reserve == 0.0 {
            return Err(ChainReadError::CallFailed {
                target: "market pair".to_string(),
                message: "pool has no protocol-token reserves".to_string(),
            });
        }
        let raw_market_price = stable_reserve / frost_reserve;

        let mut bond_snaps = Vec::with_capacity(bonds.len());
        for (bond, _addrs) in &bonds {
            let reserve_price_usd = if bond.kind.uses_gas_token_price() {
                prices.gas_usd
            } else {
                prices.stable_usd
            };

            let reserves = self.decode_reserves(&results, &mut cur, bond)?;

            bond_snaps.push(BondSnapshot {
                name: bond.name.to_string(),
                kind: bond.kind,
                reserves,
                reserve_price_usd,
            });
        }

        let redemption = if book.redemption.is_some() {
            let rate = decode::<IRedemption::redeemRateCall>(&results, cur.next(), "redemption")?;
            let total =
                decode::<IRedemption::totalRedeemedCall>(&results, cur.next(), "redemption")?;
            let reserve_available =
                decode::<IERC20::balanceOfCall>(&results, cur.next(), "redemption reserve")?;
            let amount_sent =
                decode::<IERC20::balanceOfCall>(&results, cur.next(), "redemption intake")?;
            Some(RedemptionSnapshot {
                risk_free_value: to_f64(rate, RESERVE_DECIMALS),
                amount_sent: to_f64(amount_sent, TOKEN_DECIMALS),
                reserve_available: to_f64(reserve_available, RESERVE_DECIMALS),
                total_redeemed: to_f64(total, TOKEN_DECIMALS),
            })
        } else {
            None
        };

        let snapshot = ProtocolSnapshot {
            raw_market_price,
            stable_price_usd: prices.stable_usd,
            total_supply: to_f64(total_supply_raw, TOKEN_DECIMALS),
            circulating_supply: to_f64(circulating_raw, TOKEN_DECIMALS),
            current_index: to_f64(index_raw, TOKEN_DECIMALS),
            dao_balance: to_f64(dao_raw, TOKEN_DECIMALS),
            epoch: EpochInfo {
                number: epoch.number.to::<u64>(),
                distribute: to_f64(epoch.distribute, TOKEN_DECIMALS),
                end_time: epoch.endTime as u64,
            },
            current_block: block_number.to::<u64>(),
            current_block_time: block_time.to::<u64>(),
            bonds: bond_snaps,
            redemption,
            treasury_adjustment_usd: self.treasury_adjustment_usd,
        };

        info!(
            "Snapshot assembled: {} reads in {:?} (1 RPC call)",
            call_count,
            start.elapsed()
        );

        Ok(snapshot)
    }

    async fn account_state(&self, address: Address) -> Result<AccountState, ChainReadError> {
        let book = &self.book;
        let bonds = self.deployed_bonds();

        let mut calls = vec![
            call3(book.token, IERC20::balanceOfCall { account: address }.abi_encode()),
            call3(
                book.staked_token,
                IERC20::balanceOfCall { account: address }.abi_encode(),
            ),
            call3(
                book.wrapped_token,
                IERC20::balanceOfCall { account: address }.abi_encode(),
            ),
            call3(
                book.reserve_token,
                IERC20::balanceOfCall { account: address }.abi_encode(),
            ),
            call3(
                book.token,
                IERC20::allowanceCall {
                    owner: address,
                    spender: book.staking_helper,
                }
                .abi_encode(),
            ),
            call3(
                book.staked_token,
                IERC20::allowanceCall {
                    owner: address,
                    spender: book.staking,
                }
                .abi_encode(),
            ),
            call3(
                book.staked_token,
                IERC20::allowanceCall {
                    owner: address,
                    spender: book.wrapped_token,
                }
                .abi_encode(),
            ),
        ];

        if let Some(redemption) = book.redemption {
            calls.push(call3(
                book.token,
                IERC20::allowanceCall {
                    owner: address,
                    spender: redemption,
                }
                .abi_encode(),
            ));
        }
        for (_, addrs) in &bonds {
            calls.push(call3(
                addrs.reserve,
                IERC20::allowanceCall {
                    owner: address,
                    spender: addrs.bond,
                }
                .abi_encode(),
            ));
        }

        let results = self.execute_multicall(calls).await?;
        let mut cur = Cursor(0);

        let mut state = AccountState::default();
        for (symbol, decimals) in [
            ("FROST", TOKEN_DECIMALS),
            ("sFROST", TOKEN_DECIMALS),
            ("wsFROST", WRAPPED_DECIMALS),
            ("MIM", RESERVE_DECIMALS),
        ] {
            let raw = decode::<IERC20::balanceOfCall>(&results, cur.next(), symbol)?;
            state.balances.insert(symbol.to_string(), to_f64(raw, decimals));
        }

        for target in [
            ApprovalTarget::Staking,
            ApprovalTarget::Unstaking,
            ApprovalTarget::Wrapping,
        ] {
            let raw = decode::<IERC20::allowanceCall>(&results, cur.next(), "allowance")?;
            state.allowances.insert(target, raw);
        }
        if book.redemption.is_some() {
            let raw = decode::<IERC20::allowanceCall>(&results, cur.next(), "allowance")?;
            state.allowances.insert(ApprovalTarget::Redemption, raw);
        }
        for (bond, _) in &bonds {
            let raw = decode::<IERC20::allowanceCall>(&results, cur.next(), bond.name)?;
            state
                .allowances
                .insert(ApprovalTarget::Bond(bond.name), raw);
        }

        Ok(state)
    }

    async fn bond_quote(
        &self,
        bond: &BondDescriptor,
        deposit: U256,
        depositor: Option<Address>,
    ) -> Result<BondQuote, ChainReadError> {
        let addrs = bond
            .addresses(self.network)
            .ok_or_else(|| ChainReadError::CallFailed {
                target: bond.name.to_string(),
                message: "not deployed on this network".to_string(),
            })?;

        let prices = self.oracle.get_prices().await;

        let mut calls = vec![
            call3(addrs.bond, IBondDepository::bondPriceCall {}.abi_encode()),
            call3(addrs.bond, IBondDepository::bondPriceInUSDCall {}.abi_encode()),
            call3(addrs.bond, IBondDepository::maxPayoutCall {}.abi_encode()),
            call3(
                addrs.bond,
                IBondDepository::payoutForCall { value: deposit }.abi_encode(),
            ),
            call3(addrs.bond, IBondDepository::termsCall {}.abi_encode()),
            call3(addrs.bond, IBondDepository::currentDebtCall {}.abi_encode()),
        ];
        self.push_reserve_calls(&mut calls, bond, &addrs);
        if let Some(owner) = depositor {
            calls.push(call3(
                addrs.reserve,
                IERC20::allowanceCall {
                    owner,
                    spender: addrs.bond,
                }
                .abi_encode(),
            ));
        }

        let results = self.execute_multicall(calls).await?;
        let mut cur = Cursor(0);

        let raw_price = decode::<IBondDepository::bondPriceCall>(&results, cur.next(), bond.name)?;
        let price_usd =
            decode::<IBondDepository::bondPriceInUSDCall>(&results, cur.next(), bond.name)?;
        let max_payout =
            decode::<IBondDepository::maxPayoutCall>(&results, cur.next(), bond.name)?;
        let payout = decode::<IBondDepository::payoutForCall>(&results, cur.next(), bond.name)?;
        let terms = decode::<IBondDepository::termsCall>(&results, cur.next(), bond.name)?;
        let debt = decode::<IBondDepository::currentDebtCall>(&results, cur.next(), bond.name)?;

        let reserve_price_usd = if bond.kind.uses_gas_token_price() {
            prices.gas_usd
        } else {
            prices.stable_usd
        };
        let reserves = self.decode_reserves(&results, &mut cur, bond)?;
        let purchased_usd = value_reserves(bond.kind, &reserves, reserve_price_usd).treasury_usd;

        let allowance = if depositor.is_some() {
            decode::<IERC20::allowanceCall>(&results, cur.next(), bond.name)?
        } else {
            U256::ZERO
        };

        Ok(BondQuote {
            raw_price,
            price_usd: to_f64(price_usd, RESERVE_DECIMALS),
            payout_for_deposit: to_f64(payout, TOKEN_DECIMALS),
            max_payout: to_f64(max_payout, TOKEN_DECIMALS),
            purchased_usd,
            current_debt: to_f64(debt, TOKEN_DECIMALS),
            vesting_term_secs: terms.vestingTerm.to::<u64>(),
            allowance,
        })
    }
}

// ============================================
// SUBMISSION
// ============================================

#[async_trait]
impl WalletProvider for RpcGateway {
    fn signer_address(&self) -> Option<Address> {
        self.signer.as_ref().map(|s| s.address())
    }

    async fn chain_id(&self) -> Result<u64, ChainReadError> {
        let provider = self.read_provider()?;
        provider.get_chain_id().await.map_err(transport)
    }

    async fn submit(&self, call: ProtocolCall) -> Result<TxHash, WorkflowError> {
        let signer = self
            .signer
            .clone()
            .ok_or(WorkflowError::ProviderUnavailable)?;
        let from = signer.address();
        let (to, calldata) = self.encode_call(&call)?;

        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .on_http(
                self.rpc_url
                    .parse()
                    .map_err(|e| WorkflowError::ChainRead(transport(e)))?,
            );

        let tx = TransactionRequest::default()
            .from(from)
            .to(to)
            .input(calldata.into());

        let pending = provider
            .send_transaction(tx)
            .await
            .map_err(|e| classify_transport_error(&e))?;
        let hash = *pending.tx_hash();

        debug!("Submitted transaction to {:?}: {:?}", to, hash);
        Ok(hash)
    }

    async fn confirm(&self, tx: TxHash) -> Result<TxStatus, WorkflowError> {
        let provider = self.read_provider().map_err(WorkflowError::ChainRead)?;

        loop {
            match provider.get_transaction_receipt(tx).await {
                Ok(Some(receipt)) => {
                    return Ok(if receipt.status() {
                        TxStatus::Confirmed
                    } else {
                        // Receipts carry no revert reason; the raw text is
                        // resolved by the error classifier's fallback arm.
                        TxStatus::Reverted {
                            raw: "execution reverted".to_string(),
                        }
                    });
                }
                Ok(None) => tokio::time::sleep(self.confirm_poll).await,
                Err(e) => return Err(classify_transport_error(&e)),
            }
        }
    }
}

// ============================================
// TESTS
// ============================================
