//! Bot runner: the rebalancing loop.
//!
//! Handles:
//! - Cancelling stale orders at startup
//! - Re-reading parameters and exchange state every tick
//! - Opening, adding to, and closing the leveraged position
//! - Reporting every order, status and error to the log and the notifier

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};

use crate::api::Exchange;
use crate::models::{OrderResult, OrderSide, PositionState, PredictedPosition};
use crate::notify::{Notifier, RetryingNotifier};
use crate::trading::{
    decide, effective_leverage, percent3, roe, round3, Decision, HoldReason, Params, TickInputs,
};

/// Bot configuration.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Parameter file, re-read every tick
    pub params_path: PathBuf,

    /// Wait between the closing order and the final balance read
    pub settle_delay: Duration,
}

impl BotConfig {
    pub fn new(params_path: impl Into<PathBuf>) -> Self {
        Self {
            params_path: params_path.into(),
            settle_delay: Duration::from_secs(5),
        }
    }
}

/// Result of one tick.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Continue(StatusLine),
    TargetReached(ExitReport),
}

/// How the loop ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    TargetReached(ExitReport),
    Stopped,
}

/// Final account figures after the position was closed.
#[derive(Debug, Clone, PartialEq)]
pub struct ExitReport {
    /// Balance after settlement; `None` if it could not be read
    pub final_balance: Option<Decimal>,
    pub roe: Option<Decimal>,
}

/// Account figures logged after every tick.
///
/// Balance and price are this tick's reads; the position includes buys made
/// this tick, so leverage can lag one fill behind the exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusLine {
    pub price: Decimal,
    pub position: Decimal,
    pub balance: Decimal,
    pub base: String,

    /// ROE in percent, rounded to 3 places
    pub roe_pct: Decimal,
    pub leverage: Decimal,
}

impl StatusLine {
    pub fn new(
        params: &Params,
        price: Decimal,
        balance: Decimal,
        predicted: &PredictedPosition,
    ) -> Result<Self> {
        let position = predicted.predicted();
        let leverage = effective_leverage(position, balance, price)?;
        let roe = roe(params.start_balance, balance)?;

        Ok(Self {
            price,
            position,
            balance,
            base: params.base_currency().to_string(),
            roe_pct: percent3(roe)?,
            leverage: round3(leverage),
        })
    }
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Price: {} | Position: {} USD | Balance: {} {} | ROE: {}% | Effective Leverage: {}x",
            self.price, self.position, self.balance, self.base, self.roe_pct, self.leverage
        )
    }
}

/// Main bot runner.
pub struct Bot<E, N> {
    config: BotConfig,
    exchange: E,
    notifier: RetryingNotifier<N>,

    /// Last successfully loaded parameters
    params: Params,
    state: PositionState,

    shutdown: Arc<AtomicBool>,
}

impl<E: Exchange, N: Notifier> Bot<E, N> {
    /// Create a bot. Fails if the parameter file cannot be loaded.
    pub fn new(config: BotConfig, exchange: E, notifier: RetryingNotifier<N>) -> Result<Self> {
        let params = Params::load(&config.params_path)?;

        Ok(Self {
            config,
            exchange,
            notifier,
            params,
            state: PositionState::Startup,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Get shutdown signal for external control.
    pub fn shutdown_signal(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    pub fn state(&self) -> PositionState {
        self.state
    }

    /// Cancel every open order on the symbol. Errors are fatal.
    pub async fn initialize(&mut self) -> Result<()> {
        let symbol = self.params.exchange_symbol();
        info!(symbol = %symbol, "Cancelling open orders");

        let cancelled = self
            .exchange
            .cancel_all_orders(&symbol)
            .await
            .context("Failed to cancel open orders")?;

        for order in &cancelled {
            let msg = order.summary(&symbol);
            info!("{}", msg);
            self.notify(&msg).await;
        }

        info!(cancelled = cancelled.len(), "Startup complete");
        Ok(())
    }

    /// Main run loop. Tick errors are reported and never end the loop.
    pub async fn run(&mut self) -> RunOutcome {
        info!(
            symbol = %self.params.symbol,
            params = %self.config.params_path.display(),
            "Starting rebalance loop"
        );

        while !self.shutdown.load(Ordering::SeqCst) {
            match self.tick().await {
                Ok(TickOutcome::TargetReached(report)) => {
                    return RunOutcome::TargetReached(report);
                }
                Ok(TickOutcome::Continue(_)) => {}
                Err(e) => self.report_error(&e).await,
            }

            tokio::time::sleep(self.params.poll_interval()).await;
        }

        info!("Shutdown requested, leaving position as is");
        RunOutcome::Stopped
    }

    /// Single iteration of the main loop.
    pub async fn tick(&mut self) -> Result<TickOutcome> {
        debug!("Bot tick");

        let params = Params::load(&self.config.params_path)?;
        self.params = params.clone();

        let symbol = params.exchange_symbol();
        let base = params.base_currency();

        let ticker = self
            .exchange
            .fetch_ticker(&symbol)
            .await
            .context("Failed to fetch ticker")?;
        let balance = self
            .exchange
            .fetch_balance(base)
            .await
            .context("Failed to fetch balance")?;
        let position = self
            .exchange
            .fetch_position(&symbol)
            .await
            .context("Failed to fetch position")?;

        debug!(
            bid = %ticker.bid,
            ask = %ticker.ask,
            spread = %ticker.spread(),
            vwap = ?ticker.vwap,
            funding_rate = %ticker.funding_rate,
            "Ticker"
        );

        self.transition(PositionState::of(position));

        let inputs = TickInputs {
            last_price: ticker.last,
            balance,
            position,
        };
        let mut predicted = PredictedPosition::new(position);

        match decide(&params, &inputs)? {
            Decision::Open { lot } => {
                let order = self
                    .exchange
                    .market_buy(&symbol, lot)
                    .await
                    .context("Failed to open position")?;
                self.report_order(&order).await;
                predicted.record_buy(lot);
                self.transition(PositionState::Leveraged);
            }
            Decision::Add { qty } => {
                let order = self
                    .exchange
                    .market_buy(&symbol, qty)
                    .await
                    .context("Failed to add to position")?;
                self.report_order(&order).await;
                predicted.record_buy(qty);
            }
            Decision::Close { side, qty } => {
                let order = match side {
                    OrderSide::Sell => self.exchange.market_sell(&symbol, qty).await,
                    OrderSide::Buy => self.exchange.market_buy(&symbol, qty).await,
                }
                .context("Failed to close position")?;
                self.report_order(&order).await;

                let report = self.settle(&params).await;
                self.transition(PositionState::TargetReached);
                return Ok(TickOutcome::TargetReached(report));
            }
            Decision::Hold {
                reason: HoldReason::ZeroLot,
            } => {
                warn!(balance = %balance, price = %ticker.last, "Equity too small to open a position");
            }
            Decision::Hold {
                reason: HoldReason::LeverageCapped,
            } => {
                debug!("Next increment would exceed target leverage");
            }
        }

        // Balance is not re-read after an order.
        let status = StatusLine::new(&params, ticker.last, balance, &predicted)?;
        info!("{}", status);

        Ok(TickOutcome::Continue(status))
    }

    /// Wait for the closing fill, then report the final balance.
    async fn settle(&self, params: &Params) -> ExitReport {
        tokio::time::sleep(self.config.settle_delay).await;

        let base = params.base_currency();
        let report = match self.exchange.fetch_balance(base).await {
            Ok(balance) => ExitReport {
                final_balance: Some(balance),
                roe: roe(params.start_balance, balance).ok(),
            },
            Err(e) => {
                warn!(error = %e, "Failed to read final balance");
                ExitReport {
                    final_balance: None,
                    roe: None,
                }
            }
        };

        let mut msg = "Reached target price.\n".to_string();
        match report.final_balance {
            Some(balance) => msg.push_str(&format!("Balance: {} {}", balance, base)),
            None => msg.push_str("Balance: unavailable"),
        }
        if let Some(pct) = report.roe.and_then(|r| percent3(r).ok()) {
            msg.push_str(&format!("\nROE: {}%", pct));
        }

        info!("{}", msg);
        self.notify(&msg).await;

        report
    }

    fn transition(&mut self, next: PositionState) {
        if self.state != next {
            info!(from = %self.state, to = %next, "State change");
            self.state = next;
        }
    }

    async fn report_order(&self, order: &OrderResult) {
        let msg = order.summary();
        info!("{}", msg);
        debug!(order_link_id = %order.order_link_id, "Order acknowledged");
        self.notify(&msg).await;
    }

    async fn report_error(&self, e: &anyhow::Error) {
        error!("Error: {:?}", e);
        self.notify(&format!("Error: {:#}", e)).await;
    }

    /// Prefix with the symbol and send through the retrying notifier.
    async fn notify(&self, msg: &str) {
        let text = format!("{}\n{}", self.params.symbol, msg);
        self.notifier.send(&text).await;
    }
}
