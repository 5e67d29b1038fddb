//! Exchange capability interface consumed by the rebalance loop.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::models::{CancelledOrder, OrderRequest, OrderResult, OrderSide, Position, Ticker};

use super::error::ExchangeResult;

/// Everything the loop needs from a derivatives exchange, for one symbol.
///
/// `symbol` is always the exchange-native name (e.g. `BTCUSD`).
#[async_trait]
pub trait Exchange: Send + Sync {
    /// Current ticker snapshot.
    async fn fetch_ticker(&self, symbol: &str) -> ExchangeResult<Ticker>;

    /// Total balance of one coin.
    async fn fetch_balance(&self, coin: &str) -> ExchangeResult<Decimal>;

    /// Signed position size.
    async fn fetch_position(&self, symbol: &str) -> ExchangeResult<Position>;

    /// Cancel every open order on the symbol.
    async fn cancel_all_orders(&self, symbol: &str) -> ExchangeResult<Vec<CancelledOrder>>;

    /// Place an order.
    async fn create_order(&self, symbol: &str, request: &OrderRequest)
        -> ExchangeResult<OrderResult>;

    async fn market_buy(&self, symbol: &str, qty: Decimal) -> ExchangeResult<OrderResult> {
        self.create_order(symbol, &OrderRequest::market(OrderSide::Buy, qty))
            .await
    }

    async fn market_sell(&self, symbol: &str, qty: Decimal) -> ExchangeResult<OrderResult> {
        self.create_order(symbol, &OrderRequest::market(OrderSide::Sell, qty))
            .await
    }

    async fn limit_buy(
        &self,
        symbol: &str,
        qty: Decimal,
        price: Decimal,
        post_only: bool,
    ) -> ExchangeResult<OrderResult> {
        self.create_order(
            symbol,
            &OrderRequest::limit(OrderSide::Buy, qty, price, post_only),
        )
        .await
    }

    async fn limit_sell(
        &self,
        symbol: &str,
        qty: Decimal,
        price: Decimal,
        post_only: bool,
    ) -> ExchangeResult<OrderResult> {
        self.create_order(
            symbol,
            &OrderRequest::limit(OrderSide::Sell, qty, price, post_only),
        )
        .await
    }
}
