//! Runtime configuration for the Permafrost dashboard engine.
//!
//! Covers the network address book, token decimal/epoch constants and all
//! tunables for transaction confirmation and refresh behavior. Loadable from
//! environment variables (with `.env` support) or a TOML file.

use alloy_primitives::{address, Address};
use eyre::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

// ============================================
// PROTOCOL CONSTANTS
// ============================================

/// Decimals of the protocol token (FROST) and its staked form (sFROST).
pub const TOKEN_DECIMALS: u8 = 9;

/// Decimals of the wrapped staked token (wsFROST).
pub const WRAPPED_DECIMALS: u8 = 18;

/// Decimals of the reserve stablecoin (MIM).
pub const RESERVE_DECIMALS: u8 = 18;

/// Rebases per day. The staking contract runs a fixed 8-hour epoch.
pub const EPOCHS_PER_DAY: f64 = 3.0;

/// One-off correction to the risk-free treasury total, applied 2021-11-29
/// when the redemption contract was funded outside the bond reserves.
/// TODO: confirm the figure with treasury ops before the next migration.
pub const TREASURY_ADJUSTMENT_USD_2021_11_29: f64 = 18_391_046.0;

// ============================================
// NETWORKS
// ============================================

/// Networks the dashboard knows how to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Avalanche C-Chain mainnet.
    Avalanche,
    /// Fuji testnet.
    Fuji,
}

impl Network {
    pub fn chain_id(&self) -> u64 {
        match self {
            Network::Avalanche => 43114,
            Network::Fuji => 43113,
        }
    }
}

impl Default for Network {
    fn default() -> Self {
        Network::Avalanche
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Network::Avalanche => write!(f, "Avalanche (43114)"),
            Network::Fuji => write!(f, "Fuji (43113)"),
        }
    }
}

// ============================================
// ADDRESS BOOK
// ============================================

/// Protocol contract addresses for one network.
#[derive(Debug, Clone, Copy)]
pub struct AddressBook {
    /// FROST token.
    pub token: Address,
    /// sFROST token.
    pub staked_token: Address,
    /// wsFROST wrapper.
    pub wrapped_token: Address,
    /// Reserve stablecoin (MIM).
    pub reserve_token: Address,
    /// Staking contract (epoch, index, unstake).
    pub staking: Address,
    /// Staking helper (single-call stake).
    pub staking_helper: Address,
    /// Treasury holding the bond reserves.
    pub treasury: Address,
    /// DAO multisig.
    pub dao: Address,
    /// FROST-MIM pool used for the market price.
    pub market_pair: Address,
    /// Fixed-rate redemption contract, when deployed on this network.
    pub redemption: Option<Address>,
}

/// Look up the address book for a network.
pub fn addresses(network: Network) -> Result<AddressBook> {
    match network {
        Network::Avalanche => Ok(AddressBook {
            token: address!("7d1232b90d3f809a54eeaeebc639c62df8a8942f"),
            staked_token: address!("ec874cb1496ba6cc85c84f3b3f85917dba2b7f23"),
            wrapped_token: address!("3a44a3b263acd392e21c872e776f4b9702b1c00f"),
            reserve_token: address!("130966628846bfd36ff31a822705796e8cb8c18d"),
            staking: address!("8d5a3f2c5b198a9e5a754707a9370b27da4f1b68"),
            staking_helper: address!("f1c2bd2a4d03a90bb2facec1a1a2c58c0d20e2e6"),
            treasury: address!("1c46450211cb2646cc1da3c5242422967ed9e04c"),
            dao: address!("9a3e4448ceb44b1e1a9c7e1442b1d3b9a39ab012"),
            market_pair: address!("425c45adfb53861e5db8f17d9b072ab60d4404d8"),
            redemption: Some(address!("5df680a2ea46eeb0894edcdcd9d4d910d2b2c2e9")),
        }),
        Network::Fuji => Err(eyre::eyre!(
            "the protocol is not deployed on {}",
            network
        )),
    }
}

// ============================================
// MAIN CONFIGURATION
// ============================================

/// Runtime configuration for the dashboard engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // ========== Network Settings ==========
    /// RPC endpoint for the configured network.
    pub rpc_url: String,

    /// Target network; every workflow checks the wallet is on it.
    pub network: Network,

    /// Hex private key of the signing account. Absent means read-only mode.
    pub signer_key: Option<String>,

    // ========== Workflow Settings ==========
    /// Default bond slippage tolerance (0.005 = 0.5%).
    pub default_slippage: f64,

    /// Seconds between confirmation polls.
    pub confirm_poll_secs: u64,

    /// Seconds of pending before the "still pending, check the explorer"
    /// notification. The wait itself continues past this.
    pub confirm_warn_secs: u64,

    /// Seconds to let the node settle before the post-confirmation balance
    /// refresh.
    pub refresh_delay_secs: u64,

    // ========== Price Feed ==========
    /// Price API endpoint (CoinGecko-compatible simple/price).
    pub price_api_url: String,

    /// Gas token (AVAX) price used when the price API is unreachable.
    pub gas_token_fallback_usd: f64,

    // ========== Treasury ==========
    /// Manual correction added to the risk-free treasury total.
    /// See `TREASURY_ADJUSTMENT_USD_2021_11_29`.
    pub treasury_adjustment_usd: f64,

    // ========== Audit Log ==========
    /// Enable/disable the settled-workflow audit log.
    pub audit_log: bool,

    /// Path of the JSON-lines audit log.
    pub audit_log_path: String,
}

impl Config {
    /// Load configuration from environment variables and .env file.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            rpc_url: env::var("RPC_URL")
                .unwrap_or_else(|_| "https://api.avax.network/ext/bc/C/rpc".to_string()),
            network: match env::var("NETWORK")
                .unwrap_or_else(|_| "avalanche".to_string())
                .to_lowercase()
                .as_str()
            {
                "fuji" => Network::Fuji,
                _ => Network::Avalanche,
            },
            signer_key: env::var("SIGNER_KEY").ok(),
            default_slippage: env::var("DEFAULT_SLIPPAGE")
                .unwrap_or_else(|_| "0.005".to_string())
                .parse()
                .unwrap_or(0.005),
            confirm_poll_secs: env::var("CONFIRM_POLL_SECS")
                .unwrap_or_else(|_| "2".to_string())
                .parse()
                .unwrap_or(2),
            confirm_warn_secs: env::var("CONFIRM_WARN_SECS")
                .unwrap_or_else(|_| "90".to_string())
                .parse()
                .unwrap_or(90),
            refresh_delay_secs: env::var("REFRESH_DELAY_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),
            price_api_url: env::var("PRICE_API_URL")
                .unwrap_or_else(|_| "https://api.coingecko.com/api/v3/simple/price".to_string()),
            gas_token_fallback_usd: env::var("GAS_TOKEN_FALLBACK_USD")
                .unwrap_or_else(|_| "25.0".to_string())
                .parse()
                .unwrap_or(25.0),
            treasury_adjustment_usd: env::var("TREASURY_ADJUSTMENT_USD")
                .map(|s| s.parse().unwrap_or(TREASURY_ADJUSTMENT_USD_2021_11_29))
                .unwrap_or(TREASURY_ADJUSTMENT_USD_2021_11_29),
            audit_log: env::var("AUDIT_LOG")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
            audit_log_path: env::var("AUDIT_LOG_PATH")
                .unwrap_or_else(|_| "./logs/workflows.log".to_string()),
        })
    }

    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Chain id every workflow must see from the wallet.
    pub fn expected_chain_id(&self) -> u64 {
        self.network.chain_id()
    }

    /// Validate configuration before use.
    pub fn validate(&self) -> Result<()> {
        if self.rpc_url.is_empty() || self.rpc_url.contains("YOUR_API_KEY") {
            return Err(eyre::eyre!("Invalid RPC_URL - please set a valid endpoint"));
        }
        if !(0.0..=0.5).contains(&self.default_slippage) {
            return Err(eyre::eyre!(
                "DEFAULT_SLIPPAGE must be between 0 and 0.5 (currently {})",
                self.default_slippage
            ));
        }
        if self.confirm_poll_secs == 0 {
            return Err(eyre::eyre!("CONFIRM_POLL_SECS must be at least 1"));
        }
        if self.confirm_warn_secs < self.confirm_poll_secs {
            return Err(eyre::eyre!(
                "CONFIRM_WARN_SECS must not be below CONFIRM_POLL_SECS"
            ));
        }
        // Fails when the protocol has no deployment on the network.
        addresses(self.network)?;
        Ok(())
    }

    /// Print configuration summary.
    pub fn print_summary(&self) {
        println!("╔════════════════════════════════════════════════════════════╗");
        println!("║              PERMAFROST - CONFIGURATION                    ║");
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ Network:           {:^40} ║", self.network.to_string());
        println!(
            "║ Signer:            {:^40} ║",
            if self.signer_key.is_some() { "✓ Configured" } else { "✗ Read-only" }
        );
        println!("║ Default Slippage:  {:>38.2}% ║", self.default_slippage * 100.0);
        println!("║ Confirm Poll:      {:>37}s ║", self.confirm_poll_secs);
        println!("║ Pending Warning:   {:>37}s ║", self.confirm_warn_secs);
        println!(
            "║ Audit Log:         {:^40} ║",
            if self.audit_log { "✓ Enabled" } else { "✗ Disabled" }
        );
        println!("╚════════════════════════════════════════════════════════════╝");
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_url: "https://api.avax.network/ext/bc/C/rpc".to_string(),
            network: Network::Avalanche,
            signer_key: None,
            default_slippage: 0.005,
            confirm_poll_secs: 2,
            confirm_warn_secs: 90,
            refresh_delay_secs: 10,
            price_api_url: "https://api.coingecko.com/api/v3/simple/price".to_string(),
            gas_token_fallback_usd: 25.0,
            treasury_adjustment_usd: TREASURY_ADJUSTMENT_USD_2021_11_29,
            audit_log: true,
            audit_log_path: "./logs/workflows.log".to_string(),
        }
    }
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.expected_chain_id(), 43114);
    }

    #[test]
    fn test_slippage_bounds() {
        let mut config = Config::default();
        config.default_slippage = 0.6;
        assert!(config.validate().is_err());
        config.default_slippage = -0.01;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_avalanche_address_book() {
        let book = addresses(Network::Avalanche).unwrap();
        assert!(book.redemption.is_some());
        assert_ne!(book.token, book.staked_token);
    }

    #[test]
    fn test_fuji_has_no_deployment() {
        assert!(addresses(Network::Fuji).is_err());
    }

    #[test]
    fn test_confirm_interval_ordering() {
        let mut config = Config::default();
        config.confirm_warn_secs = 1;
        config.confirm_poll_secs = 5;
        assert!(config.validate().is_err());
    }
}
