//! Derived financial metrics.
//!
//! Pure, synchronous transformation of a chain snapshot into the numbers the
//! dashboard displays. Nothing here holds state or performs I/O, so two
//! structurally equal snapshots always produce identical metrics.
//!
//! Anything that could divide by zero or otherwise leave the finite range is
//! an `Option`; `None` is the "unavailable" marker the UI renders as a
//! loading state, never as a garbage number.

use crate::bonds::{value_reserves, BondKind, BondReserves};
use crate::config::EPOCHS_PER_DAY;

// ============================================
// SNAPSHOT TYPES
// ============================================

/// Staking epoch data.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochInfo {
    pub number: u64,
    /// Protocol tokens distributed at the next rebase.
    pub distribute: f64,
    /// Unix time the epoch ends.
    pub end_time: u64,
}

/// Per-bond slice of the snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct BondSnapshot {
    pub name: String,
    pub kind: BondKind,
    pub reserves: BondReserves,
    /// USD price of the bond's reserve asset at snapshot time.
    pub reserve_price_usd: f64,
}

/// Redemption contract state, present when the workflow is active.
#[derive(Debug, Clone, PartialEq)]
pub struct RedemptionSnapshot {
    /// Stablecoin paid out per protocol token.
    pub risk_free_value: f64,
    /// Protocol tokens the connected account has sent in.
    pub amount_sent: f64,
    /// Stablecoin left in the redemption reserve.
    pub reserve_available: f64,
    /// Protocol tokens redeemed across all accounts.
    pub total_redeemed: f64,
}

/// One consistent set of chain reads. Assembled all-or-nothing by the
/// reader; every metric below is a function of this struct alone.
#[derive(Debug, Clone, PartialEq)]
pub struct ProtocolSnapshot {
    /// Market price in reserve-token terms, scaled by 10^9.
    pub raw_market_price: f64,
    /// USD price of the reserve stablecoin.
    pub stable_price_usd: f64,
    /// Protocol token total supply.
    pub total_supply: f64,
    /// Staked-token circulating supply.
    pub circulating_supply: f64,
    /// Current staking index.
    pub current_index: f64,
    /// Protocol tokens held by the DAO.
    pub dao_balance: f64,
    pub epoch: EpochInfo,
    pub current_block: u64,
    pub current_block_time: u64,
    pub bonds: Vec<BondSnapshot>,
    pub redemption: Option<RedemptionSnapshot>,
    /// Manual correction to the risk-free treasury total (config).
    pub treasury_adjustment_usd: f64,
}

// ============================================
// DERIVED METRICS
// ============================================

/// Redemption figures derived from the snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct RedemptionMetrics {
    pub risk_free_value: f64,
    pub amount_sent: f64,
    pub reserve_available: f64,
    pub total_treasury_redeemed: Option<f64>,
}

/// Everything the dashboard displays. Read-only; recomputed wholesale from
/// each snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct AppMetrics {
    pub market_price: Option<f64>,
    pub market_cap: Option<f64>,
    pub staking_tvl: Option<f64>,
    pub total_supply: f64,
    pub circulating_supply: f64,
    pub current_index: f64,
    pub current_block: u64,
    pub current_block_time: u64,
    /// Treasury value with LP positions at half weight.
    pub treasury_balance: f64,
    pub risk_free_value: Option<f64>,
    pub delta_market_price_rfv: Option<f64>,
    pub staking_rebase: Option<f64>,
    pub staking_apy: Option<f64>,
    pub five_day_rate: Option<f64>,
    pub runway_days: Option<f64>,
    /// Unix time of the next rebase.
    pub next_rebase: u64,
    pub redemption: Option<RedemptionMetrics>,
}

fn finite(x: f64) -> Option<f64> {
    x.is_finite().then_some(x)
}

/// Compute all derived metrics from one snapshot.
pub fn compute(snapshot: &ProtocolSnapshot) -> AppMetrics {
    let market_price = snapshot.raw_market_price / 1e9 * snapshot.stable_price_usd;
    let market_cap = snapshot.total_supply * market_price;
    let staking_tvl = snapshot.circulating_supply * market_price;

    // Value every bond's reserves. LP positions count at half weight in the
    // treasury total: the other half of the pool is the protocol's own token
    // and backs nothing.
    let mut treasury_balance = snapshot.treasury_adjustment_usd;
    let mut risk_free_total = 0.0;
    let mut protocol_lp_tokens = 0.0;
    for bond in &snapshot.bonds {
        let v = value_reserves(bond.kind, &bond.reserves, bond.reserve_price_usd);
        treasury_balance += if bond.kind.is_lp() {
            v.treasury_usd / 2.0
        } else {
            v.treasury_usd
        };
        risk_free_total += v.risk_free_usd;
        protocol_lp_tokens += v.protocol_tokens;
    }

    let circulating_adjusted =
        snapshot.total_supply - protocol_lp_tokens - snapshot.dao_balance;
    let risk_free_value = finite(treasury_balance / circulating_adjusted)
        .filter(|_| circulating_adjusted != 0.0);
    let delta_market_price_rfv =
        risk_free_value.and_then(|rfv| finite((rfv - market_price) / rfv * 100.0));

    let staking_rebase = finite(snapshot.epoch.distribute / snapshot.circulating_supply);
    let staking_apy = staking_rebase
        .and_then(|r| finite((1.0 + r).powf(365.0 * EPOCHS_PER_DAY) - 1.0));
    let five_day_rate = staking_rebase
        .and_then(|r| finite((1.0 + r).powf(5.0 * EPOCHS_PER_DAY) - 1.0));

    let runway_days = staking_rebase.and_then(|rebase| {
        if snapshot.circulating_supply <= 0.0 || rebase <= 0.0 {
            return None;
        }
        let ratio = risk_free_total / snapshot.circulating_supply;
        if ratio <= 0.0 {
            return None;
        }
        finite(ratio.ln() / (1.0 + rebase).ln() / EPOCHS_PER_DAY)
    });

    let redemption = snapshot.redemption.as_ref().map(|r| RedemptionMetrics {
        risk_free_value: r.risk_free_value,
        amount_sent: r.amount_sent,
        reserve_available: r.reserve_available,
        total_treasury_redeemed: finite(r.total_redeemed * r.risk_free_value),
    });

    AppMetrics {
        market_price: finite(market_price),
        market_cap: finite(market_cap),
        staking_tvl: finite(staking_tvl),
        total_supply: snapshot.total_supply,
        circulating_supply: snapshot.circulating_supply,
        current_index: snapshot.current_index,
        current_block: snapshot.current_block,
        current_block_time: snapshot.current_block_time,
        treasury_balance,
        risk_free_value,
        delta_market_price_rfv,
        staking_rebase,
        staking_apy,
        five_day_rate,
        runway_days,
        next_rebase: snapshot.epoch.end_time,
        redemption,
    }
}

/// Stablecoin value an account would receive for `balance` protocol tokens
/// at the current redemption rate.
pub fn redeemable_value(balance: f64, redeem_risk_free_value: f64) -> Option<f64> {
    finite(balance * redeem_risk_free_value)
}

/// Seconds until the next rebase, zero once the epoch has ended.
pub fn seconds_to_next_rebase(next_rebase: u64, now: u64) -> u64 {
    next_rebase.saturating_sub(now)
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    fn base_snapshot() -> ProtocolSnapshot {
        ProtocolSnapshot {
            raw_market_price: 2e9,
            stable_price_usd: 1.0,
            total_supply: 1_000.0,
            circulating_supply: 800.0,
            current_index: 4.2,
            dao_balance: 50.0,
            epoch: EpochInfo {
                number: 320,
                distribute: 8.0,
                end_time: 1_700_030_000,
            },
            current_block: 8_000_000,
            current_block_time: 1_700_000_000,
            bonds: vec![
                BondSnapshot {
                    name: "mim".into(),
                    kind: BondKind::Stable,
                    reserves: BondReserves {
                        reserve_balance: 1_200.0,
                        lp: None,
                    },
                    reserve_price_usd: 1.0,
                },
                BondSnapshot {
                    name: "mim_frost_lp".into(),
                    kind: BondKind::Lp,
                    reserves: BondReserves {
                        reserve_balance: 0.0,
                        lp: Some(crate::bonds::LpReserves {
                            lp_balance: 100.0,
                            lp_total_supply: 200.0,
                            reserve_side: 1_600.0,
                            protocol_side: 80.0,
                        }),
                    },
                    reserve_price_usd: 1.0,
                },
            ],
            redemption: None,
            treasury_adjustment_usd: 0.0,
        }
    }

    #[test]
    fn test_metrics_are_deterministic() {
        let s1 = base_snapshot();
        let s2 = s1.clone();
        assert_eq!(s1, s2);
        assert_eq!(compute(&s1), compute(&s2));
    }

    #[test]
    fn test_market_cap_and_tvl() {
        // totalSupply 1000, circulating 800, market price $2.00.
        let m = compute(&base_snapshot());
        assert_eq!(m.market_price, Some(2.0));
        assert_eq!(m.market_cap, Some(2_000.0));
        assert_eq!(m.staking_tvl, Some(1_600.0));
    }

    #[test]
    fn test_rebase_and_apy() {
        // distribute 8 over 800 circulating is a 1% rebase, compounded
        // 3 times a day for a year.
        let m = compute(&base_snapshot());
        let rebase = m.staking_rebase.unwrap();
        assert!((rebase - 0.01).abs() < 1e-12);

        let expected_apy = (1.01f64).powf(365.0 * 3.0) - 1.0;
        assert!((m.staking_apy.unwrap() - expected_apy).abs() < 1e-1);

        let expected_five_day = (1.01f64).powf(15.0) - 1.0;
        assert!((m.five_day_rate.unwrap() - expected_five_day).abs() < 1e-9);
    }

    #[test]
    fn test_treasury_halves_lp_value() {
        // Stable bond: 1200. LP: treasury owns half the pool, full value
        // 1600, halved to 800. Total 2000.
        let m = compute(&base_snapshot());
        assert!((m.treasury_balance - 2_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_risk_free_value_subtracts_protocol_holdings() {
        // Adjusted supply: 1000 - 40 (LP share of FROST) - 50 (DAO) = 910.
        let m = compute(&base_snapshot());
        let rfv = m.risk_free_value.unwrap();
        assert!((rfv - 2_000.0 / 910.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_adjusted_supply_is_unavailable() {
        let mut snapshot = base_snapshot();
        // DAO owns everything that is not protocol-owned LP.
        snapshot.dao_balance = snapshot.total_supply - 40.0;
        let m = compute(&snapshot);
        assert_eq!(m.risk_free_value, None);
        assert_eq!(m.delta_market_price_rfv, None);
    }

    #[test]
    fn test_zero_circulating_supply_is_unavailable() {
        let mut snapshot = base_snapshot();
        snapshot.circulating_supply = 0.0;
        let m = compute(&snapshot);
        assert_eq!(m.staking_rebase, None);
        assert_eq!(m.staking_apy, None);
        assert_eq!(m.runway_days, None);
        assert_eq!(m.staking_tvl, Some(0.0));
    }

    #[test]
    fn test_runway() {
        // Risk-free treasury 2000 over 800 circulating, 1% rebase:
        // ln(2.5) / ln(1.01) / 3 days.
        let m = compute(&base_snapshot());
        let expected = (2.5f64).ln() / (1.01f64).ln() / 3.0;
        assert!((m.runway_days.unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_redemption_metrics() {
        let mut snapshot = base_snapshot();
        snapshot.redemption = Some(RedemptionSnapshot {
            risk_free_value: 0.95,
            amount_sent: 10.0,
            reserve_available: 5_000.0,
            total_redeemed: 100.0,
        });
        let m = compute(&snapshot);
        let r = m.redemption.unwrap();
        assert_eq!(r.total_treasury_redeemed, Some(95.0));
        assert_eq!(redeemable_value(10.0, 0.95), Some(9.5));
    }

    #[test]
    fn test_rebase_countdown_saturates() {
        assert_eq!(seconds_to_next_rebase(100, 40), 60);
        assert_eq!(seconds_to_next_rebase(100, 200), 0);
    }
}
