//! Reference price oracle.
//!
//! The market price formula needs the USD price of the reserve stablecoin,
//! and custom bonds are valued against the gas token. Both come from a
//! CoinGecko-style simple/price endpoint, cached to stay under rate limits,
//! with conservative fallbacks when the API is unreachable.

use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, trace, warn};

// ============================================
// CONSTANTS
// ============================================

/// Cache duration for prices (avoid hitting rate limits).
const CACHE_DURATION_SECS: u64 = 60;

/// Timeout for API calls.
const API_TIMEOUT_SECS: u64 = 5;

/// Price API id of the reserve stablecoin (MIM).
const STABLE_API_ID: &str = "magic-internet-money";

/// Price API id of the gas token (AVAX).
const GAS_API_ID: &str = "avalanche-2";

/// Sanity band for a stablecoin. Outside it the feed is considered broken.
const MIN_STABLE_USD: f64 = 0.5;
const MAX_STABLE_USD: f64 = 2.0;

/// Stablecoin price used when every source fails.
const FALLBACK_STABLE_USD: f64 = 1.0;

// ============================================
// TYPES
// ============================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PriceSource {
    Api,
    Fallback,
}

impl std::fmt::Display for PriceSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PriceSource::Api => write!(f, "API"),
            PriceSource::Fallback => write!(f, "Fallback"),
        }
    }
}

/// USD prices the metrics computation depends on.
#[derive(Debug, Clone, Copy)]
pub struct Prices {
    pub stable_usd: f64,
    pub gas_usd: f64,
    pub fetched_at: Instant,
    pub source: PriceSource,
}

impl Prices {
    pub fn is_stale(&self) -> bool {
        self.fetched_at.elapsed() > Duration::from_secs(CACHE_DURATION_SECS)
    }
}

#[derive(Debug, Deserialize)]
struct UsdQuote {
    usd: f64,
}

// ============================================
// ORACLE
// ============================================

pub struct PriceOracle {
    http_client: Client,
    api_url: String,
    gas_fallback_usd: f64,
    cache: RwLock<Option<Prices>>,
}

impl PriceOracle {
    pub fn new(api_url: String, gas_fallback_usd: f64) -> Self {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(API_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();

        Self {
            http_client,
            api_url,
            gas_fallback_usd,
            cache: RwLock::new(None),
        }
    }

    /// Get current prices (with caching). Never fails: a broken feed
    /// degrades to the fallback values.
    pub async fn get_prices(&self) -> Prices {
        {
            let cache = self.cache.read().await;
            if let Some(ref prices) = *cache {
                if !prices.is_stale() {
                    trace!(
                        "Using cached prices: stable ${:.4}, gas ${:.2}",
                        prices.stable_usd,
                        prices.gas_usd
                    );
                    return *prices;
                }
            }
        }

        let prices = match self.fetch_from_api().await {
            Ok(prices) => {
                debug!(
                    "Prices from {}: stable ${:.4}, gas ${:.2}",
                    prices.source, prices.stable_usd, prices.gas_usd
                );
                prices
            }
            Err(e) => {
                warn!("Price fetch failed, using fallback values: {}", e);
                self.fallback()
            }
        };

        {
            let mut cache = self.cache.write().await;
            *cache = Some(prices);
        }

        prices
    }

    fn fallback(&self) -> Prices {
        Prices {
            stable_usd: FALLBACK_STABLE_USD,
            gas_usd: self.gas_fallback_usd,
            fetched_at: Instant::now(),
            source: PriceSource::Fallback,
        }
    }

    async fn fetch_from_api(&self) -> eyre::Result<Prices> {
        let url = format!(
            "{}?ids={},{}&vs_currencies=usd",
            self.api_url, STABLE_API_ID, GAS_API_ID
        );

        let response: HashMap<String, UsdQuote> = self
            .http_client
            .get(&url)
            .send()
            .await?
            .json()
            .await?;

        let stable_usd = response
            .get(STABLE_API_ID)
            .map(|q| q.usd)
            .ok_or_else(|| eyre::eyre!("no {} quote in response", STABLE_API_ID))?;
        let gas_usd = response
            .get(GAS_API_ID)
            .map(|q| q.usd)
            .ok_or_else(|| eyre::eyre!("no {} quote in response", GAS_API_ID))?;

        if !(MIN_STABLE_USD..=MAX_STABLE_USD).contains(&stable_usd) {
            return Err(eyre::eyre!(
                "stablecoin quote ${:.4} outside the sanity band",
                stable_usd
            ));
        }

        Ok(Prices {
            stable_usd,
            gas_usd,
            fetched_at: Instant::now(),
            source: PriceSource::Api,
        })
    }
}

// ============================================
// TESTS
// ============================================
