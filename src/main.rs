//! Permafrost dashboard CLI.
//!
//! Run with: cargo run
//!
//! Console rendition of the protocol dashboard: treasury and staking
//! metrics, the bond table, account balances, and the transaction
//! workflows (approve, stake, wrap, bond, redeem) driven by subcommands.

use std::sync::Arc;

use alloy_primitives::{Address, U256};
use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use console::style;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod amount;
mod audit;
mod bonds;
mod chain;
mod config;
mod error;
mod metrics;
mod notify;
mod pending;
mod price_oracle;
mod state;
mod workflows;

use bonds::{bond_by_name, ALL_BONDS};
use chain::{ChainReader, RpcGateway, WalletProvider};
use config::Config;
use notify::{ConsoleSink, LogSink, NotificationSink};
use price_oracle::PriceOracle;
use state::{AppState, ApprovalTarget};
use workflows::{Orchestrator, StakeDirection, WrapDirection};

// ============================================
// CLI
// ============================================

#[derive(Parser)]
#[command(
    name = "permafrost",
    about = "Treasury metrics and transaction engine for the Permafrost dashboard"
)]
struct Cli {
    /// Load configuration from a TOML file instead of the environment.
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Protocol metrics overview
    Dashboard,
    /// Bond table with prices and discounts
    Bonds,
    /// Balances and allowances of the connected account
    Account,
    /// Grant an allowance: staking | unstaking | wrapping | redemption | <bond>
    Approve { target: String },
    /// Stake FROST
    Stake { amount: String },
    /// Unstake sFROST
    Unstake { amount: String },
    /// Wrap sFROST into wsFROST
    Wrap { amount: String },
    /// Unwrap wsFROST back into sFROST
    Unwrap { amount: String },
    /// Purchase a bond
    BondPurchase {
        bond: String,
        amount: String,
        /// Slippage tolerance, e.g. 0.005 for 0.5%
        #[arg(long)]
        slippage: Option<f64>,
        /// Deliver the bond to another address
        #[arg(long)]
        recipient: Option<Address>,
    },
    /// Redeem FROST for the fixed reserve payout
    Redeem { amount: String },
}

fn print_banner() {
    println!();
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").cyan()
    );
    println!(
        "{}",
        style(" ❄  PERMAFROST - Treasury Dashboard").cyan().bold()
    );
    println!(
        "{}",
        style("    Metrics | Bonds | Staking | Wrapping | Redemption").cyan()
    );
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").cyan()
    );
    println!();
}

// ============================================
// FORMATTING
// ============================================

fn usd(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("${:.2}", v),
        None => "n/a".to_string(),
    }
}

fn pct(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.2}%", v * 100.0),
        None => "n/a".to_string(),
    }
}

fn countdown(secs: u64) -> String {
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

// ============================================
// VIEWS
// ============================================

async fn show_dashboard(reader: &dyn ChainReader) -> Result<()> {
    let snapshot = reader.protocol_snapshot().await?;
    let m = metrics::compute(&snapshot);

    println!("{}", style("═══ PROTOCOL ═══").blue().bold());
    println!("  Market price      {}", usd(m.market_price));
    println!("  Market cap        {}", usd(m.market_cap));
    println!("  Staking TVL       {}", usd(m.staking_tvl));
    println!("  Total supply      {:.2} FROST", m.total_supply);
    println!("  Circulating       {:.2} sFROST", m.circulating_supply);
    println!("  Treasury          {}", usd(Some(m.treasury_balance)));
    println!("  Risk-free value   {}", usd(m.risk_free_value));
    println!("  Price vs RFV      {}", pct(m.delta_market_price_rfv.map(|v| v / 100.0)));
    println!();
    println!("{}", style("═══ STAKING ═══").magenta().bold());
    println!("  Current index     {:.2} FROST", m.current_index);
    println!("  Rebase            {}", pct(m.staking_rebase));
    println!("  APY               {}", pct(m.staking_apy));
    println!("  5-day rate        {}", pct(m.five_day_rate));
    match m.runway_days {
        Some(days) => println!("  Runway            {:.1} days", days),
        None => println!("  Runway            n/a"),
    }
    let to_rebase = metrics::seconds_to_next_rebase(m.next_rebase, m.current_block_time);
    println!("  Next rebase in    {}", countdown(to_rebase));

    if let Some(r) = &m.redemption {
        println!();
        println!("{}", style("═══ REDEMPTION ═══").green().bold());
        println!("  Rate              {:.4} MIM per FROST", r.risk_free_value);
        println!("  Reserve left      {}", usd(Some(r.reserve_available)));
        println!("  Sent in           {:.2} FROST", r.amount_sent);
        println!("  Total redeemed    {}", usd(r.total_treasury_redeemed));
    }

    Ok(())
}

async fn show_bonds(reader: &dyn ChainReader, depositor: Option<Address>) -> Result<()> {
    let snapshot = reader.protocol_snapshot().await?;
    let market_price = metrics::compute(&snapshot).market_price;

    let quotes = futures::future::join_all(
        ALL_BONDS
            .iter()
            .map(|bond| reader.bond_quote(bond, U256::ZERO, depositor)),
    )
    .await;

    println!("{}", style("═══ BONDS ═══").blue().bold());
    for (bond, quote) in ALL_BONDS.iter().zip(quotes) {
        let quote = match quote {
            Ok(quote) => quote,
            Err(e) => {
                println!(
                    "  {:16} {}",
                    bond.display_name,
                    style(format!("quote failed: {}", e)).red()
                );
                continue;
            }
        };

        let discount = market_price.and_then(|p| quote.discount(p));
        let status = if bond.is_active {
            style("active").green()
        } else {
            style("closed").dim()
        };
        let approval = if depositor.is_some() && quote.allowance.is_zero() {
            style(" approval required").yellow().to_string()
        } else {
            String::new()
        };
        println!(
            "  {:16} {:10} {:>10} {:>9} {:>8}  purchased {}, max {:.2} FROST, vests {}d{}",
            bond.display_name,
            bond.kind.to_string(),
            usd(Some(quote.price_usd)),
            pct(discount),
            status,
            usd(Some(quote.purchased_usd)),
            quote.max_payout,
            quote.vesting_term_secs / 86_400,
            approval,
        );
        if let Some(url) = bond.lp_url {
            println!("    {} {}", style("pool:").dim(), style(url).dim());
        }
    }

    Ok(())
}

async fn show_account(reader: &dyn ChainReader, address: Address) -> Result<()> {
    let account = reader.account_state(address).await?;
    let snapshot = reader.protocol_snapshot().await?;

    println!("{}", style("═══ ACCOUNT ═══").blue().bold());
    println!("  Address           {:?}", address);
    for symbol in ["FROST", "sFROST", "wsFROST", "MIM"] {
        println!("  {:8}          {:.4}", symbol, account.balance(symbol));
    }

    if let Some(r) = &snapshot.redemption {
        let redeemable = metrics::redeemable_value(account.balance("FROST"), r.risk_free_value);
        println!("  Redeemable for    {}", usd(redeemable));
    }

    println!();
    println!("  Approvals (for one token unit):");
    let targets = [
        ApprovalTarget::Staking,
        ApprovalTarget::Unstaking,
        ApprovalTarget::Wrapping,
        ApprovalTarget::Redemption,
    ];
    for target in targets {
        let granted = account.is_approved(&target, U256::from(1u64));
        println!(
            "  {:18} {}",
            format!("{:?}", target),
            if granted {
                style("granted").green()
            } else {
                style("approval required").yellow()
            }
        );
    }

    Ok(())
}

fn parse_approval_target(input: &str) -> Result<ApprovalTarget> {
    match input.to_lowercase().as_str() {
        "staking" => Ok(ApprovalTarget::Staking),
        "unstaking" => Ok(ApprovalTarget::Unstaking),
        "wrapping" => Ok(ApprovalTarget::Wrapping),
        "redemption" => Ok(ApprovalTarget::Redemption),
        other => match bond_by_name(other) {
            Some(bond) => Ok(ApprovalTarget::Bond(bond.name)),
            None => Err(eyre::eyre!(
                "unknown approval target '{}' (expected staking, unstaking, wrapping, redemption or a bond name)",
                input
            )),
        },
    }
}

// ============================================
// ENTRY POINT
// ============================================

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("permafrost=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };
    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        error!("Please check your .env file");
        return Err(e);
    }

    print_banner();
    config.print_summary();
    println!();

    let oracle = PriceOracle::new(config.price_api_url.clone(), config.gas_token_fallback_usd);
    let gateway = Arc::new(RpcGateway::new(&config, oracle)?);
    let wallet: Arc<dyn WalletProvider> = gateway.clone();
    let reader: Arc<dyn ChainReader> = gateway.clone();
    let state = Arc::new(AppState::new());
    let sink: Arc<dyn NotificationSink> = if console::user_attended() {
        Arc::new(ConsoleSink)
    } else {
        Arc::new(LogSink)
    };

    let orchestrator = Orchestrator::new(&config, wallet.clone(), reader.clone(), state, sink)?;

    let command = cli.command.unwrap_or(Command::Dashboard);
    let workflow_result = match command {
        Command::Dashboard => {
            show_dashboard(reader.as_ref()).await?;
            return Ok(());
        }
        Command::Bonds => {
            show_bonds(reader.as_ref(), wallet.signer_address()).await?;
            return Ok(());
        }
        Command::Account => {
            let address = wallet
                .signer_address()
                .ok_or_else(|| eyre::eyre!("no signer configured, set SIGNER_KEY"))?;
            show_account(reader.as_ref(), address).await?;
            return Ok(());
        }
        Command::Approve { target } => {
            let target = parse_approval_target(&target)?;
            orchestrator.approve(target).await
        }
        Command::Stake { amount } => orchestrator.stake(&amount, StakeDirection::Stake).await,
        Command::Unstake { amount } => orchestrator.stake(&amount, StakeDirection::Unstake).await,
        Command::Wrap { amount } => orchestrator.wrap(&amount, WrapDirection::Wrap).await,
        Command::Unwrap { amount } => orchestrator.wrap(&amount, WrapDirection::Unwrap).await,
        Command::BondPurchase {
            bond,
            amount,
            slippage,
            recipient,
        } => {
            let descriptor = bond_by_name(&bond)
                .ok_or_else(|| eyre::eyre!("unknown bond '{}', try the bonds subcommand", bond))?;
            let slippage = slippage.unwrap_or(config.default_slippage);
            orchestrator.bond(&amount, descriptor, slippage, recipient).await
        }
        Command::Redeem { amount } => orchestrator.redeem(&amount).await,
    };

    // The orchestrator has already reported the outcome through the sink;
    // the exit code is all that is left to propagate.
    if workflow_result.is_err() {
        std::process::exit(1);
    }

    Ok(())
}
