//! Leverage Rebalancer
//!
//! Holds a long position on one Bybit inverse perpetual at a target leverage,
//! adding to it as equity allows, and closes everything once the price
//! reaches a target.

mod api;
mod bot;
mod logging;
mod models;
mod notify;
mod trading;

use std::path::PathBuf;
use std::sync::atomic::Ordering;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use crate::api::{BybitClient, BybitConfig};
use crate::bot::{Bot, BotConfig, RunOutcome};
use crate::notify::{LineNotifier, NoopNotifier, Notifier, RetryPolicy, RetryingNotifier};
use crate::trading::{percent3, Credentials};

/// Leverage rebalancing bot CLI.
#[derive(Parser)]
#[command(name = "rebalancer")]
#[command(about = "Keep a leveraged long position rebalanced until a target price", long_about = None)]
struct Cli {
    /// Parameter file (JSON), re-read on every tick
    param_path: PathBuf,

    /// Log file; created with its directory if missing
    log_path: String,

    /// Credentials file with api_key, api_secret and line_notify_key
    #[arg(short, long, env = "REBALANCER_CREDENTIALS", default_value = "./api_info.json")]
    credentials: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Use the Bybit testnet
    #[arg(long)]
    testnet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    logging::init(&cli.log_level, Some(cli.log_path.as_str()))?;

    let credentials = Credentials::load(&cli.credentials)?;

    let exchange = BybitClient::new(
        BybitConfig::new(credentials.api_key.clone(), credentials.api_secret.clone())
            .with_testnet(cli.testnet),
    )?;
    info!(base_url = %exchange.base_url(), "Exchange client initialized");

    let notifier: Box<dyn Notifier> = if credentials.line_notify_key.is_empty() {
        warn!("No LINE Notify key configured, notifications disabled");
        Box::new(NoopNotifier)
    } else {
        Box::new(LineNotifier::new(credentials.line_notify_key.clone())?)
    };
    let notifier = RetryingNotifier::new(notifier, RetryPolicy::default());

    let mut bot = Bot::new(BotConfig::new(&cli.param_path), exchange, notifier)?;
    bot.initialize().await?;

    // Register shutdown handler
    let shutdown = bot.shutdown_signal();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutdown signal received");
        shutdown.store(true, Ordering::SeqCst);
    });

    match bot.run().await {
        RunOutcome::TargetReached(report) => {
            info!(
                final_balance = ?report.final_balance,
                roe_pct = ?report.roe.and_then(|r| percent3(r).ok()),
                "Target price reached, exiting"
            );
        }
        RunOutcome::Stopped => {
            info!(state = %bot.state(), "Stopped");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_positional_args() {
        let cli = Cli::try_parse_from([
            "rebalancer",
            "params/btc.json",
            "logs/btc.log",
            "--credentials",
            "secrets.json",
            "--testnet",
        ])
        .unwrap();

        assert_eq!(cli.param_path, PathBuf::from("params/btc.json"));
        assert_eq!(cli.log_path, "logs/btc.log");
        assert_eq!(cli.credentials, PathBuf::from("secrets.json"));
        assert_eq!(cli.log_level, "info");
        assert!(cli.testnet);
    }

    #[test]
    fn test_cli_requires_log_path() {
        assert!(Cli::try_parse_from(["rebalancer", "params/btc.json"]).is_err());
    }
}
