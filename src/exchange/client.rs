//! Futures REST client.
//!
//! Implements [`HistorySource`] against the USD-margined futures REST API.
//! Exchange metadata is public; fill and order history are signed endpoints.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::config::{AccountSettings, ExchangeSettings};
use crate::exchange::signer::{build_query_string, HmacSigner};
use crate::exchange::types::{ExchangeInfo, OrderRecord, TradeRecord};
use crate::exchange::{ExchangeError, ExchangeResult, HistorySource};

const EXCHANGE_INFO_ENDPOINT: &str = "/fapi/v1/exchangeInfo";
const USER_TRADES_ENDPOINT: &str = "/fapi/v1/userTrades";
const ALL_ORDERS_ENDPOINT: &str = "/fapi/v1/allOrders";

/// Error payload returned by the API on failure.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: i64,
    msg: String,
}

/// REST client bound to one account's credentials.
pub struct FuturesRestClient {
    client: reqwest::Client,
    base_url: String,
    signer: HmacSigner,
    recv_window_ms: u64,
}

impl FuturesRestClient {
    pub fn new(exchange: &ExchangeSettings, account: &AccountSettings) -> ExchangeResult<Self> {
        if account.api_key.is_empty() || account.api_secret.is_empty() {
            return Err(ExchangeError::Configuration(format!(
                "account '{}' is missing API credentials",
                account.name
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(exchange.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: exchange.rest_url.trim_end_matches('/').to_string(),
            signer: HmacSigner::new(&account.api_key, &account.api_secret),
            recv_window_ms: exchange.recv_window_ms,
        })
    }

    /// GET a public (unsigned) endpoint.
    async fn get_public<T: DeserializeOwned>(&self, endpoint: &str) -> ExchangeResult<T> {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!(%url, "GET public");

        let response = self.client.get(&url).send().await?;
        Self::handle_response(response).await
    }

    /// GET a signed endpoint with the given query parameters.
    async fn get_signed<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        mut params: Vec<(String, String)>,
    ) -> ExchangeResult<T> {
        params.push(("recvWindow".to_string(), self.recv_window_ms.to_string()));
        self.signer.sign(&mut params, current_timestamp_ms());

        let url = format!(
            "{}{}?{}",
            self.base_url,
            endpoint,
            build_query_string(&params)
        );
        debug!(endpoint, "GET signed");

        let response = self
            .client
            .get(&url)
            .header(self.signer.api_key_header(), self.signer.api_key())
            .send()
            .await?;
        Self::handle_response(response).await
    }

    async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> ExchangeResult<T> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return match serde_json::from_str::<ApiErrorBody>(&body) {
                Ok(err) => Err(ExchangeError::Api {
                    code: err.code,
                    message: err.msg,
                }),
                Err(_) => Err(ExchangeError::Api {
                    code: status.as_u16() as i64,
                    message: body,
                }),
            };
        }

        serde_json::from_str(&body).map_err(|e| ExchangeError::Parse(e.to_string()))
    }
}

fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[async_trait]
impl HistorySource for FuturesRestClient {
    async fn exchange_info(&self) -> ExchangeResult<ExchangeInfo> {
        self.get_public(EXCHANGE_INFO_ENDPOINT).await
    }

    async fn trades_page(
        &self,
        symbol: &str,
        from_id: u64,
        limit: u32,
    ) -> ExchangeResult<Vec<TradeRecord>> {
        let params = vec![
            ("symbol".to_string(), symbol.to_string()),
            ("fromId".to_string(), from_id.to_string()),
            ("limit".to_string(), limit.to_string()),
        ];
        self.get_signed(USER_TRADES_ENDPOINT, params).await
    }

    async fn orders_page(
        &self,
        symbol: &str,
        from_order_id: u64,
        limit: u32,
    ) -> ExchangeResult<Vec<OrderRecord>> {
        let params = vec![
            ("symbol".to_string(), symbol.to_string()),
            ("orderId".to_string(), from_order_id.to_string()),
            ("limit".to_string(), limit.to_string()),
        ];
        self.get_signed(ALL_ORDERS_ENDPOINT, params).await
    }
}
