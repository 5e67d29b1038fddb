//! Point-in-time market snapshot for the traded instrument.

use rust_decimal::Decimal;
use serde::Serialize;

/// Ticker snapshot. Read once per tick and discarded after the decision.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ticker {
    /// Best bid price
    pub bid: Decimal,

    /// Best ask price
    pub ask: Decimal,

    /// Last traded price
    pub last: Decimal,

    /// 24h volume-weighted average price, if the exchange reported turnover
    pub vwap: Option<Decimal>,

    /// Current funding rate
    pub funding_rate: Decimal,
}

impl Ticker {
    /// Spread between best ask and best bid.
    pub fn spread(&self) -> Decimal {
        self.ask - self.bid
    }
}
