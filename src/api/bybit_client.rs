//! Bybit v5 REST client for inverse perpetual contracts.
//!
//! Handles:
//! - HMAC-SHA256 request signing
//! - Envelope (`retCode`/`retMsg`) checking
//! - Typed decoding of tickers, balances, positions and orders

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{Client, Method, Response};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::Sha256;
use tracing::debug;

use crate::models::{CancelledOrder, OrderKind, OrderRequest, OrderResult, Position, Ticker};

use super::error::{ExchangeError, ExchangeResult};
use super::traits::Exchange;
use super::types::*;

type HmacSha256 = Hmac<Sha256>;

pub const MAINNET_URL: &str = "https://api.bybit.com";
pub const TESTNET_URL: &str = "https://api-testnet.bybit.com";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const CATEGORY: &str = "inverse";
const ACCOUNT_TYPE: &str = "CONTRACT";

/// Bybit client settings.
#[derive(Clone)]
pub struct BybitConfig {
    pub api_key: String,
    pub api_secret: String,
    pub base_url: String,
    /// Receive window in milliseconds
    pub recv_window: u64,
}

impl fmt::Debug for BybitConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BybitConfig")
            .field("api_key", &"***REDACTED***")
            .field("api_secret", &"***REDACTED***")
            .field("base_url", &self.base_url)
            .field("recv_window", &self.recv_window)
            .finish()
    }
}

impl BybitConfig {
    pub fn new(api_key: String, api_secret: String) -> Self {
        Self {
            api_key,
            api_secret,
            base_url: MAINNET_URL.to_string(),
            recv_window: 5000,
        }
    }

    pub fn with_testnet(mut self, testnet: bool) -> Self {
        self.base_url = if testnet { TESTNET_URL } else { MAINNET_URL }.to_string();
        self
    }

    /// Override the base URL (for testing).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Authenticated Bybit client.
pub struct BybitClient {
    http: Client,
    config: BybitConfig,
}

impl BybitClient {
    pub fn new(config: BybitConfig) -> ExchangeResult<Self> {
        let http = Client::builder().timeout(DEFAULT_TIMEOUT).build()?;
        Ok(Self { http, config })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Signature over `timestamp + api_key + recv_window + payload`.
    fn sign(&self, timestamp: i64, payload: &str) -> ExchangeResult<String> {
        let mut mac = HmacSha256::new_from_slice(self.config.api_secret.as_bytes())
            .map_err(|e| ExchangeError::Signing(e.to_string()))?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(self.config.api_key.as_bytes());
        mac.update(self.config.recv_window.to_string().as_bytes());
        mac.update(payload.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    fn build_query(params: &[(&str, String)]) -> String {
        params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Unauthenticated GET.
    async fn public_get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> ExchangeResult<T> {
        let query = Self::build_query(params);
        let url = format!("{}{}?{}", self.config.base_url, endpoint, query);

        debug!(url = %url, "GET");

        let response = self.http.get(&url).send().await?;
        Self::handle_response(endpoint, response).await
    }

    /// Signed GET; the query string is the signed payload.
    async fn signed_get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> ExchangeResult<T> {
        let query = Self::build_query(params);
        let url = format!("{}{}?{}", self.config.base_url, endpoint, query);

        debug!(url = %url, "GET (signed)");

        let response = self
            .authed(Method::GET, &url, &query)?
            .send()
            .await?;
        Self::handle_response(endpoint, response).await
    }

    /// Signed POST; the exact JSON body is the signed payload.
    async fn signed_post<B: Serialize, T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> ExchangeResult<T> {
        let url = format!("{}{}", self.config.base_url, endpoint);
        let body = serde_json::to_string(body).map_err(|source| ExchangeError::Decode {
            endpoint: endpoint.to_string(),
            source,
        })?;

        debug!(url = %url, body = %body, "POST (signed)");

        let response = self
            .authed(Method::POST, &url, &body)?
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await?;
        Self::handle_response(endpoint, response).await
    }

    fn authed(&self, method: Method, url: &str, payload: &str) -> ExchangeResult<reqwest::RequestBuilder> {
        let timestamp = Utc::now().timestamp_millis();
        let signature = self.sign(timestamp, payload)?;

        Ok(self
            .http
            .request(method, url)
            .header("X-BAPI-API-KEY", &self.config.api_key)
            .header("X-BAPI-SIGN", signature)
            .header("X-BAPI-TIMESTAMP", timestamp.to_string())
            .header("X-BAPI-RECV-WINDOW", self.config.recv_window.to_string()))
    }

    /// Check HTTP status and `retCode`, then decode `result`.
    async fn handle_response<T: DeserializeOwned>(
        endpoint: &str,
        response: Response,
    ) -> ExchangeResult<T> {
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(ExchangeError::Http {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body: text,
            });
        }

        let envelope: Envelope =
            serde_json::from_str(&text).map_err(|source| ExchangeError::Decode {
                endpoint: endpoint.to_string(),
                source,
            })?;

        if envelope.ret_code != 0 {
            return Err(ExchangeError::Api {
                endpoint: endpoint.to_string(),
                code: envelope.ret_code,
                message: envelope.ret_msg,
            });
        }

        serde_json::from_value(envelope.result).map_err(|source| ExchangeError::Decode {
            endpoint: endpoint.to_string(),
            source,
        })
    }
}

#[async_trait]
impl Exchange for BybitClient {
    async fn fetch_ticker(&self, symbol: &str) -> ExchangeResult<Ticker> {
        let endpoint = "/v5/market/tickers";
        let result: ListResult<TickerResponse> = self
            .public_get(
                endpoint,
                &[("category", CATEGORY.to_string()), ("symbol", symbol.to_string())],
            )
            .await?;

        result
            .list
            .into_iter()
            .next()
            .ok_or_else(|| ExchangeError::MissingField {
                endpoint: endpoint.to_string(),
                field: "list[0]".to_string(),
            })?
            .into_ticker(endpoint)
    }

    async fn fetch_balance(&self, coin: &str) -> ExchangeResult<Decimal> {
        let endpoint = "/v5/account/wallet-balance";
        let result: ListResult<WalletAccount> = self
            .signed_get(
                endpoint,
                &[
                    ("accountType", ACCOUNT_TYPE.to_string()),
                    ("coin", coin.to_string()),
                ],
            )
            .await?;

        result
            .list
            .iter()
            .flat_map(|account| account.coin.iter())
            .find(|c| c.coin == coin)
            .ok_or_else(|| ExchangeError::MissingField {
                endpoint: endpoint.to_string(),
                field: format!("coin[{}]", coin),
            })?
            .total(endpoint)
    }

    async fn fetch_position(&self, symbol: &str) -> ExchangeResult<Position> {
        let endpoint = "/v5/position/list";
        let result: ListResult<PositionResponse> = self
            .signed_get(
                endpoint,
                &[("category", CATEGORY.to_string()), ("symbol", symbol.to_string())],
            )
            .await?;

        match result.list.into_iter().find(|p| p.symbol == symbol) {
            Some(position) => position.into_position(endpoint),
            None => Ok(Position::FLAT),
        }
    }

    async fn cancel_all_orders(&self, symbol: &str) -> ExchangeResult<Vec<CancelledOrder>> {
        let body = CancelAllBody {
            category: CATEGORY.to_string(),
            symbol: symbol.to_string(),
        };
        let result: ListResult<CancelledOrderResponse> =
            self.signed_post("/v5/order/cancel-all", &body).await?;

        Ok(result.list.into_iter().map(CancelledOrder::from).collect())
    }

    async fn create_order(
        &self,
        symbol: &str,
        request: &OrderRequest,
    ) -> ExchangeResult<OrderResult> {
        let order_type = request.kind();
        let time_in_force = match order_type {
            OrderKind::Limit if request.post_only => Some("PostOnly".to_string()),
            OrderKind::Limit => Some("GTC".to_string()),
            OrderKind::Market => None,
        };

        let body = CreateOrderBody {
            category: CATEGORY.to_string(),
            symbol: symbol.to_string(),
            side: request.side.as_str().to_string(),
            order_type: order_type.as_str().to_string(),
            qty: request.qty.normalize().to_string(),
            price: request.price.map(|p| p.normalize().to_string()),
            time_in_force,
            order_link_id: uuid::Uuid::new_v4().to_string(),
        };

        let endpoint = "/v5/order/create";
        let response: CreateOrderResponse = self.signed_post(endpoint, &body).await?;
        if response.order_id.is_empty() {
            return Err(ExchangeError::MissingField {
                endpoint: endpoint.to_string(),
                field: "orderId".to_string(),
            });
        }

        Ok(OrderResult {
            order_id: response.order_id,
            order_link_id: response.order_link_id,
            symbol: symbol.to_string(),
            order_type,
            side: request.side,
            qty: request.qty,
        })
    }
}
