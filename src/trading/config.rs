//! Runtime parameters and API credentials.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;

/// Strategy parameters, re-read from disk on every tick so an operator can
/// tune them live.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Params {
    /// Instrument in `BASE/QUOTE` form, e.g. `BTC/USD`
    pub symbol: String,

    /// Seconds between ticks
    pub sleep_time: Decimal,

    /// Contracts added per incremental buy
    pub order_unit: Decimal,

    /// Maximum position/equity ratio
    pub leverage: Decimal,

    /// Price at which the whole position is closed
    pub target_price: Decimal,

    /// Reference equity for return-on-equity reporting
    pub start_balance: Decimal,
}

impl Params {
    /// Load and validate parameters from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read parameter file {}", path.display()))?;
        let params: Params = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse parameter file {}", path.display()))?;
        params
            .validate()
            .with_context(|| format!("Invalid parameter file {}", path.display()))?;
        Ok(params)
    }

    /// Check that every numeric field is positive and the symbol is well formed.
    pub fn validate(&self) -> Result<()> {
        let (base, quote) = self
            .symbol
            .split_once('/')
            .with_context(|| format!("symbol '{}' is not in BASE/QUOTE form", self.symbol))?;
        if base.is_empty() || quote.is_empty() {
            bail!("symbol '{}' is not in BASE/QUOTE form", self.symbol);
        }

        for (name, value) in [
            ("sleep_time", self.sleep_time),
            ("order_unit", self.order_unit),
            ("leverage", self.leverage),
            ("target_price", self.target_price),
            ("start_balance", self.start_balance),
        ] {
            if value <= Decimal::ZERO {
                bail!("{} must be positive, got {}", name, value);
            }
        }

        if self.sleep_duration().is_none() {
            bail!("sleep_time {} is too large", self.sleep_time);
        }

        Ok(())
    }

    /// Base currency of the symbol; the account balance is held in it.
    pub fn base_currency(&self) -> &str {
        self.symbol.split('/').next().unwrap_or(&self.symbol)
    }

    /// Symbol as the exchange names it (`BTC/USD` -> `BTCUSD`).
    pub fn exchange_symbol(&self) -> String {
        self.symbol.replace('/', "")
    }

    /// Wait between ticks. `validate` rejects values that do not fit a `Duration`.
    pub fn poll_interval(&self) -> Duration {
        self.sleep_duration().unwrap_or(Duration::MAX)
    }

    fn sleep_duration(&self) -> Option<Duration> {
        let secs = self.sleep_time.to_f64()?;
        Duration::try_from_secs_f64(secs).ok()
    }
}

/// Exchange and notification credentials.
#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
    #[serde(default)]
    pub line_notify_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &mask(&self.api_key))
            .field("api_secret", &"***REDACTED***")
            .field("line_notify_key", &"***REDACTED***")
            .finish()
    }
}

impl Credentials {
    /// Load credentials from a JSON file, then apply environment overrides:
    /// - BYBIT_API_KEY
    /// - BYBIT_API_SECRET
    /// - LINE_NOTIFY_KEY
    ///
    /// The file may be absent when both exchange keys come from the environment.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut creds = if path.exists() {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read credentials file {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse credentials file {}", path.display()))?
        } else {
            Credentials {
                api_key: String::new(),
                api_secret: String::new(),
                line_notify_key: String::new(),
            }
        };

        creds.apply_overrides(|key| std::env::var(key).ok());

        if creds.api_key.is_empty() || creds.api_secret.is_empty() {
            bail!(
                "API credentials missing: provide {} or BYBIT_API_KEY/BYBIT_API_SECRET",
                path.display()
            );
        }

        Ok(creds)
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("BYBIT_API_KEY") {
            self.api_key = v;
        }
        if let Some(v) = lookup("BYBIT_API_SECRET") {
            self.api_secret = v;
        }
        if let Some(v) = lookup("LINE_NOTIFY_KEY") {
            self.line_notify_key = v;
        }
    }
}

fn mask(value: &str) -> String {
    let count = value.chars().count();
    if count > 8 {
        let head: String = value.chars().take(4).collect();
        let tail: String = value.chars().skip(count - 4).collect();
        format!("{}...{}", head, tail)
    } else {
        "***REDACTED***".to_string()
    }
}
