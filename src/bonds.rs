//! Bond instruments.
//!
//! Static descriptors for every bond the protocol sells, plus the pure
//! treasury valuation for each bond kind. The descriptor table is fixed at
//! process start; everything dynamic (price, discount, payout caps) lives in
//! `BondQuote` views produced on demand and never written back here.

use alloy_primitives::{address, Address, U256};

use crate::config::Network;

// ============================================
// KINDS AND DESCRIPTORS
// ============================================

/// Bond kind, selecting the treasury valuation formula.
///
/// `Custom*` kinds are priced against the gas token instead of the reserve
/// stablecoin; `*Lp` kinds hold pool tokens rather than a single asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BondKind {
    Stable,
    Custom,
    Lp,
    CustomLp,
}

impl BondKind {
    pub fn is_lp(&self) -> bool {
        matches!(self, BondKind::Lp | BondKind::CustomLp)
    }

    /// Priced via the gas token oracle rather than the stablecoin.
    pub fn uses_gas_token_price(&self) -> bool {
        matches!(self, BondKind::Custom | BondKind::CustomLp)
    }
}

impl std::fmt::Display for BondKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BondKind::Stable => write!(f, "stable"),
            BondKind::Custom => write!(f, "custom"),
            BondKind::Lp => write!(f, "lp"),
            BondKind::CustomLp => write!(f, "custom-lp"),
        }
    }
}

/// Contract pair backing a bond on one network.
#[derive(Debug, Clone, Copy)]
pub struct BondAddresses {
    /// Bond depository contract.
    pub bond: Address,
    /// Reserve asset (token or pool) the bond accepts.
    pub reserve: Address,
}

/// Static configuration of one bond instrument. Immutable after start.
#[derive(Debug, Clone)]
pub struct BondDescriptor {
    pub name: &'static str,
    pub display_name: &'static str,
    /// Symbol of the asset the user deposits.
    pub reserve_symbol: &'static str,
    pub kind: BondKind,
    /// Decimals of the deposited asset.
    pub reserve_decimals: u8,
    /// Whether the bond is open for new deposits.
    pub is_active: bool,
    /// Pool page for LP bonds.
    pub lp_url: Option<&'static str>,
    avalanche: BondAddresses,
}

impl BondDescriptor {
    /// Contract addresses on the given network, `None` when not deployed.
    pub fn addresses(&self, network: Network) -> Option<BondAddresses> {
        match network {
            Network::Avalanche => Some(self.avalanche),
            Network::Fuji => None,
        }
    }

    /// Registry key used for pending-transaction action types.
    pub fn action_type(&self) -> String {
        format!("bond_{}", self.name)
    }
}

lazy_static::lazy_static! {
    /// Every bond the protocol has sold, active or not. Inactive bonds stay
    /// listed because their reserves still back the treasury.
    pub static ref ALL_BONDS: Vec<BondDescriptor> = vec![
        BondDescriptor {
            name: "mim",
            display_name: "MIM",
            reserve_symbol: "MIM",
            kind: BondKind::Stable,
            reserve_decimals: 18,
            is_active: false,
            lp_url: None,
            avalanche: BondAddresses {
                bond: address!("587bc7775f88d9a190aa02d30f7df2c9bb183f5d"),
                reserve: address!("130966628846bfd36ff31a822705796e8cb8c18d"),
            },
        },
        BondDescriptor {
            name: "wavax",
            display_name: "wAVAX",
            reserve_symbol: "AVAX",
            kind: BondKind::Custom,
            reserve_decimals: 18,
            is_active: false,
            lp_url: None,
            avalanche: BondAddresses {
                bond: address!("472c18c4079ecb68629f4fba1141172404bfee9c"),
                reserve: address!("b31f66aa3c1e785363f0875a1b74e27b85fd66c7"),
            },
        },
        BondDescriptor {
            name: "mim_frost_lp",
            display_name: "FROST-MIM LP",
            reserve_symbol: "MIM",
            kind: BondKind::Lp,
            reserve_decimals: 18,
            is_active: true,
            lp_url: Some(
                "https://www.traderjoexyz.com/#/pool/0x130966628846BFd36ff31a822705796e8cb8C18D/0x7d1232b90d3f809a54eeaeebc639c62df8a8942f",
            ),
            avalanche: BondAddresses {
                bond: address!("90a08fdf9f433954930f19e97fe9a1b0bdbf5c5f"),
                reserve: address!("425c45adfb53861e5db8f17d9b072ab60d4404d8"),
            },
        },
        BondDescriptor {
            name: "avax_frost_lp",
            display_name: "FROST-AVAX LP",
            reserve_symbol: "AVAX",
            kind: BondKind::CustomLp,
            reserve_decimals: 18,
            is_active: true,
            lp_url: Some(
                "https://traderjoexyz.com/#/pool/AVAX/0x7d1232b90d3f809a54eeaeebc639c62df8a8942f",
            ),
            avalanche: BondAddresses {
                bond: address!("288e6d7f4935c1f4d2862715306d4bdf8dea6592"),
                reserve: address!("a3d2cfe49df9d1ea0dc589b69252e1eddc417d6d"),
            },
        },
    ];
}

/// Look up a bond descriptor by name.
pub fn bond_by_name(name: &str) -> Option<&'static BondDescriptor> {
    ALL_BONDS.iter().find(|b| b.name == name)
}

// ============================================
// TREASURY VALUATION
// ============================================

/// Raw treasury reserve data for one bond, decimal-normalized by the reader.
#[derive(Debug, Clone, PartialEq)]
pub struct BondReserves {
    /// Reserve tokens held by the treasury (single-asset kinds).
    pub reserve_balance: f64,
    /// Pool data, present for LP kinds.
    pub lp: Option<LpReserves>,
}

/// Pool-side data for LP-backed bonds.
#[derive(Debug, Clone, PartialEq)]
pub struct LpReserves {
    /// LP tokens held by the treasury.
    pub lp_balance: f64,
    /// Total LP token supply.
    pub lp_total_supply: f64,
    /// Reserve-asset side of the pool.
    pub reserve_side: f64,
    /// Protocol-token side of the pool.
    pub protocol_side: f64,
}

/// Result of valuing one bond's treasury reserves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BondValuation {
    /// Full market value of the treasury position in USD.
    pub treasury_usd: f64,
    /// Reserve-asset portion in USD, the bond's risk-free contribution.
    pub risk_free_usd: f64,
    /// Protocol tokens owned by the treasury through the position.
    pub protocol_tokens: f64,
}

/// Value one bond's reserves. Pure dispatch on the bond kind; the only real
/// variation between kinds is this formula.
///
/// LP positions report their full market value here. The half-weighting of
/// LP value in the treasury total is applied by the metrics computation,
/// since the excluded half is the protocol's own token.
pub fn value_reserves(
    kind: BondKind,
    reserves: &BondReserves,
    reserve_price_usd: f64,
) -> BondValuation {
    match kind {
        BondKind::Stable | BondKind::Custom => {
            let usd = reserves.reserve_balance * reserve_price_usd;
            BondValuation {
                treasury_usd: usd,
                risk_free_usd: usd,
                protocol_tokens: 0.0,
            }
        }
        BondKind::Lp | BondKind::CustomLp => {
            let lp = match &reserves.lp {
                Some(lp) if lp.lp_total_supply > 0.0 => lp,
                _ => {
                    return BondValuation {
                        treasury_usd: 0.0,
                        risk_free_usd: 0.0,
                        protocol_tokens: 0.0,
                    }
                }
            };
            let share = lp.lp_balance / lp.lp_total_supply;
            let reserve_side_usd = lp.reserve_side * share * reserve_price_usd;
            BondValuation {
                // Both pool sides valued at market; a balanced pool makes
                // the protocol side worth the same as the reserve side.
                treasury_usd: 2.0 * reserve_side_usd,
                risk_free_usd: reserve_side_usd,
                protocol_tokens: lp.protocol_side * share,
            }
        }
    }
}

// ============================================
// DYNAMIC QUOTE VIEW
// ============================================

/// On-demand quote for one bond, assembled from contract reads. Read-only;
/// recomputed per request and never stored on the descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct BondQuote {
    /// Internal bond price, the unit `deposit` compares against.
    pub raw_price: U256,
    /// Bond price in USD.
    pub price_usd: f64,
    /// Payout in protocol tokens for the quoted deposit.
    pub payout_for_deposit: f64,
    /// Largest payout a single bond may mint.
    pub max_payout: f64,
    /// Treasury value of the reserves this bond has taken in, USD.
    pub purchased_usd: f64,
    /// Protocol tokens sold through this bond and still vesting.
    pub current_debt: f64,
    /// Vesting term in seconds.
    pub vesting_term_secs: u64,
    /// Current allowance of the depositor toward the bond contract.
    pub allowance: U256,
}

impl BondQuote {
    /// Discount of the bond price against the market price. Negative when
    /// bonding is more expensive than buying.
    pub fn discount(&self, market_price_usd: f64) -> Option<f64> {
        if self.price_usd <= 0.0 {
            return None;
        }
        let d = (market_price_usd - self.price_usd) / self.price_usd;
        d.is_finite().then_some(d)
    }
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_lookup() {
        assert!(bond_by_name("mim").is_some());
        assert!(bond_by_name("mim_frost_lp").is_some());
        assert!(bond_by_name("unknown").is_none());

        let lp = bond_by_name("mim_frost_lp").unwrap();
        assert!(lp.kind.is_lp());
        assert!(lp.is_active);
        assert_eq!(lp.action_type(), "bond_mim_frost_lp");
    }

    #[test]
    fn test_stable_valuation_is_face_value() {
        let reserves = BondReserves {
            reserve_balance: 1_000_000.0,
            lp: None,
        };
        let v = value_reserves(BondKind::Stable, &reserves, 1.0);
        assert_eq!(v.treasury_usd, 1_000_000.0);
        assert_eq!(v.risk_free_usd, 1_000_000.0);
        assert_eq!(v.protocol_tokens, 0.0);
    }

    #[test]
    fn test_custom_valuation_uses_price() {
        let reserves = BondReserves {
            reserve_balance: 100.0,
            lp: None,
        };
        let v = value_reserves(BondKind::Custom, &reserves, 25.0);
        assert_eq!(v.treasury_usd, 2_500.0);
    }

    #[test]
    fn test_lp_valuation_splits_sides() {
        // Treasury owns half the pool: 50k MIM and 5k FROST on its share.
        let reserves = BondReserves {
            reserve_balance: 0.0,
            lp: Some(LpReserves {
                lp_balance: 500.0,
                lp_total_supply: 1_000.0,
                reserve_side: 100_000.0,
                protocol_side: 10_000.0,
            }),
        };
        let v = value_reserves(BondKind::Lp, &reserves, 1.0);
        assert_eq!(v.risk_free_usd, 50_000.0);
        assert_eq!(v.treasury_usd, 100_000.0);
        assert_eq!(v.protocol_tokens, 5_000.0);
    }

    #[test]
    fn test_lp_valuation_empty_pool() {
        let reserves = BondReserves {
            reserve_balance: 0.0,
            lp: Some(LpReserves {
                lp_balance: 0.0,
                lp_total_supply: 0.0,
                reserve_side: 0.0,
                protocol_side: 0.0,
            }),
        };
        let v = value_reserves(BondKind::Lp, &reserves, 1.0);
        assert_eq!(v.treasury_usd, 0.0);
    }

    #[test]
    fn test_quote_discount() {
        let quote = BondQuote {
            raw_price: U256::from(9_500_000_000u64),
            price_usd: 9.5,
            payout_for_deposit: 10.0,
            max_payout: 500.0,
            purchased_usd: 1_000_000.0,
            current_debt: 250.0,
            vesting_term_secs: 432_000,
            allowance: U256::ZERO,
        };
        let d = quote.discount(10.0).unwrap();
        assert!((d - 0.0526315).abs() < 1e-6);

        let zero_price = BondQuote {
            price_usd: 0.0,
            ..quote
        };
        assert!(zero_price.discount(10.0).is_none());
    }
}
