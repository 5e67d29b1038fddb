//! Order request/result models.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "Buy",
            OrderSide::Sell => "Sell",
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order type as sent to the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderKind {
    Market,
    Limit,
}

impl OrderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderKind::Market => "Market",
            OrderKind::Limit => "Limit",
        }
    }
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request to place an order on the configured symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub side: OrderSide,

    /// Quantity in contracts
    pub qty: Decimal,

    /// Limit price; `None` for market orders
    pub price: Option<Decimal>,

    /// Reject instead of matching immediately (limit orders only)
    pub post_only: bool,
}

impl OrderRequest {
    pub fn market(side: OrderSide, qty: Decimal) -> Self {
        Self {
            side,
            qty,
            price: None,
            post_only: false,
        }
    }

    pub fn limit(side: OrderSide, qty: Decimal, price: Decimal, post_only: bool) -> Self {
        Self {
            side,
            qty,
            price: Some(price),
            post_only,
        }
    }

    pub fn kind(&self) -> OrderKind {
        if self.price.is_some() {
            OrderKind::Limit
        } else {
            OrderKind::Market
        }
    }
}

/// Acknowledgement of a placed order. Only used for reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderResult {
    /// Exchange-assigned order ID
    pub order_id: String,

    /// Client-assigned link ID
    pub order_link_id: String,

    pub symbol: String,
    pub order_type: OrderKind,
    pub side: OrderSide,
    pub qty: Decimal,
}

impl OrderResult {
    /// One-line summary used in logs and notifications.
    pub fn summary(&self) -> String {
        let label = match self.side {
            OrderSide::Buy => "[New Buy Order] ",
            OrderSide::Sell => "[New Sell Order]",
        };
        format!(
            "{} id: {}, symbol: {}, type: {}, side: {}, amount: {}",
            label, self.order_id, self.symbol, self.order_type, self.side, self.qty
        )
    }
}

/// An order removed by a cancel-all request.
#[derive(Debug, Clone, PartialEq)]
pub struct CancelledOrder {
    pub order_id: String,
    pub order_link_id: String,
}

impl CancelledOrder {
    pub fn summary(&self, symbol: &str) -> String {
        format!(
            "[Cancel Order] id: {}, link id: {}, symbol: {}",
            self.order_id, self.order_link_id, symbol
        )
    }
}
