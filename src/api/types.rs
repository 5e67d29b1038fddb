//! Raw Bybit v5 response types and their validating decoders.
//!
//! Numbers arrive as strings and may be empty. Raw structs accept whatever
//! the exchange sends; the `into_*` decoders turn them into domain values and
//! fail with the name of the offending field.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{CancelledOrder, Position, Ticker};

use super::error::{ExchangeError, ExchangeResult};

/// Common envelope around every v5 response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub ret_code: i64,
    #[serde(default)]
    pub ret_msg: String,
    #[serde(default)]
    pub result: serde_json::Value,
}

/// `result` of list-style endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct ListResult<T> {
    #[serde(default = "Vec::new")]
    pub list: Vec<T>,
}

/// Entry from /v5/market/tickers.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickerResponse {
    #[serde(default)]
    pub last_price: String,
    #[serde(default)]
    pub bid1_price: String,
    #[serde(default)]
    pub ask1_price: String,
    #[serde(default)]
    pub volume24h: String,
    #[serde(default)]
    pub turnover24h: String,
    #[serde(default)]
    pub funding_rate: String,
}

impl TickerResponse {
    pub fn into_ticker(self, endpoint: &str) -> ExchangeResult<Ticker> {
        let volume = optional_decimal(endpoint, "volume24h", &self.volume24h)?;
        let turnover = optional_decimal(endpoint, "turnover24h", &self.turnover24h)?;

        // Inverse contracts: volume is in quote units, turnover in base units.
        let vwap = match (volume, turnover) {
            (Some(v), Some(t)) if !t.is_zero() => Some(v / t),
            _ => None,
        };

        Ok(Ticker {
            bid: required_decimal(endpoint, "bid1Price", &self.bid1_price)?,
            ask: required_decimal(endpoint, "ask1Price", &self.ask1_price)?,
            last: required_decimal(endpoint, "lastPrice", &self.last_price)?,
            vwap,
            funding_rate: optional_decimal(endpoint, "fundingRate", &self.funding_rate)?
                .unwrap_or(Decimal::ZERO),
        })
    }
}

/// Account entry from /v5/account/wallet-balance.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletAccount {
    #[serde(default)]
    pub coin: Vec<CoinBalance>,
}

/// Per-coin balance inside a wallet account.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoinBalance {
    pub coin: String,
    #[serde(default)]
    pub wallet_balance: String,
}

impl CoinBalance {
    /// Total wallet balance of the coin.
    pub fn total(&self, endpoint: &str) -> ExchangeResult<Decimal> {
        required_decimal(endpoint, "walletBalance", &self.wallet_balance)
    }
}

/// Entry from /v5/position/list.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionResponse {
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub side: String,
    #[serde(default)]
    pub size: String,
}

impl PositionResponse {
    pub fn into_position(self, endpoint: &str) -> ExchangeResult<Position> {
        let size = optional_decimal(endpoint, "size", &self.size)?.unwrap_or(Decimal::ZERO);
        Ok(Position::from_side(&self.side, size))
    }
}

/// Entry from /v5/order/cancel-all.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelledOrderResponse {
    #[serde(default)]
    pub order_id: String,
    #[serde(default)]
    pub order_link_id: String,
}

impl From<CancelledOrderResponse> for CancelledOrder {
    fn from(r: CancelledOrderResponse) -> Self {
        CancelledOrder {
            order_id: r.order_id,
            order_link_id: r.order_link_id,
        }
    }
}

/// `result` of /v5/order/create.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderResponse {
    #[serde(default)]
    pub order_id: String,
    #[serde(default)]
    pub order_link_id: String,
}

/// Body of /v5/order/create.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderBody {
    pub category: String,
    pub symbol: String,
    pub side: String,
    pub order_type: String,
    pub qty: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_in_force: Option<String>,
    pub order_link_id: String,
}

/// Body of /v5/order/cancel-all.
#[derive(Debug, Clone, Serialize)]
pub struct CancelAllBody {
    pub category: String,
    pub symbol: String,
}

/// Parse a field that must be present.
pub fn required_decimal(endpoint: &str, field: &str, raw: &str) -> ExchangeResult<Decimal> {
    optional_decimal(endpoint, field, raw)?.ok_or_else(|| ExchangeError::MissingField {
        endpoint: endpoint.to_string(),
        field: field.to_string(),
    })
}

/// Parse a field that may be empty.
pub fn optional_decimal(endpoint: &str, field: &str, raw: &str) -> ExchangeResult<Option<Decimal>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .map(Some)
        .map_err(|_| ExchangeError::InvalidField {
            endpoint: endpoint.to_string(),
            field: field.to_string(),
            value: raw.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_ticker_decode() {
        let raw: TickerResponse = serde_json::from_value(serde_json::json!({
            "symbol": "BTCUSD",
            "lastPrice": "50000.5",
            "bid1Price": "50000",
            "ask1Price": "50001",
            "volume24h": "1000000",
            "turnover24h": "20",
            "fundingRate": "0.0001"
        }))
        .unwrap();

        let ticker = raw.into_ticker("tickers").unwrap();
        assert_eq!(ticker.last, dec!(50000.5));
        assert_eq!(ticker.vwap, Some(dec!(50000)));
        assert_eq!(ticker.funding_rate, dec!(0.0001));
    }

    #[test]
    fn test_ticker_missing_last_price() {
        let raw: TickerResponse = serde_json::from_value(serde_json::json!({
            "symbol": "BTCUSD",
            "bid1Price": "50000",
            "ask1Price": "50001"
        }))
        .unwrap();

        let err = raw.into_ticker("tickers").unwrap_err();
        assert!(matches!(err, ExchangeError::MissingField { ref field, .. } if field == "lastPrice"));
        assert_eq!(err.to_string(), "Missing field 'lastPrice' in tickers response");
    }

    #[test]
    fn test_invalid_number() {
        let err = required_decimal("wallet", "walletBalance", "abc").unwrap_err();
        assert!(matches!(err, ExchangeError::InvalidField { .. }));
        assert_eq!(optional_decimal("x", "y", "  ").unwrap(), None);
        assert_eq!(optional_decimal("x", "y", "1e-4").unwrap(), Some(dec!(0.0001)));
    }

    #[test]
    fn test_position_decode() {
        let raw = PositionResponse {
            symbol: "BTCUSD".to_string(),
            side: "Sell".to_string(),
            size: "250".to_string(),
        };
        assert_eq!(raw.into_position("position").unwrap().size(), dec!(-250));

        let flat = PositionResponse {
            symbol: "BTCUSD".to_string(),
            side: "None".to_string(),
            size: "".to_string(),
        };
        assert!(flat.into_position("position").unwrap().is_flat());
    }

    #[test]
    fn test_create_order_body_skips_empty_fields() {
        let body = CreateOrderBody {
            category: "inverse".to_string(),
            symbol: "BTCUSD".to_string(),
            side: "Buy".to_string(),
            order_type: "Market".to_string(),
            qty: "10".to_string(),
            price: None,
            time_in_force: None,
            order_link_id: "link".to_string(),
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["orderType"], "Market");
        assert!(json.get("price").is_none());
        assert!(json.get("timeInForce").is_none());
    }
}
