//! Terminal bridge connection management.
//!
//! The terminal itself only exposes a Python/MQL API, so a small bridge process next to it
//! serves positions, quotes and order routing as JSON over HTTP. This client is the Rust side.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use hedger_core::{
    AccountSummary, BrokerConfig, BrokerGateway, Direction, GatewayError, MarketOrderRequest,
    OrderResult, Position, SymbolInfo, Tick,
};

/// Bridge client configuration.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Base URL of the bridge (use 127.0.0.1, the bridge binds IPv4 only).
    pub base_url: String,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8228".to_string(),
            request_timeout: Duration::from_secs(5),
        }
    }
}

impl From<&BrokerConfig> for BridgeConfig {
    fn from(config: &BrokerConfig) -> Self {
        Self {
            base_url: config.bridge_url.trim_end_matches('/').to_string(),
            request_timeout: config.request_timeout(),
        }
    }
}

/// HTTP client for the terminal bridge.
pub struct Mt5BridgeClient {
    base: Url,
    http: Client,
}

impl Mt5BridgeClient {
    /// Build a client. Does not touch the network.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the HTTP client cannot be constructed.
    pub fn new(config: BridgeConfig) -> Result<Self> {
        let base = Url::parse(&config.base_url)
            .with_context(|| format!("Invalid bridge URL {}", config.base_url))?;
        if base.cannot_be_a_base() {
            bail!("Bridge URL {} cannot carry a path", config.base_url);
        }
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("Failed to build bridge HTTP client")?;
        Ok(Self { base, http })
    }

    /// Build a client and confirm the bridge reports an attached terminal.
    ///
    /// # Errors
    ///
    /// Returns an error if the bridge is unreachable or the terminal is detached.
    pub async fn connect(config: BridgeConfig) -> Result<Self> {
        info!(url = %config.base_url, "Connecting to terminal bridge");
        let client = Self::new(config)?;
        client
            .get_json::<serde_json::Value>(&["health"])
            .await
            .context("Terminal bridge health check failed")?;
        info!("Connected to terminal bridge");
        Ok(client)
    }

    /// Base URL with `segments` appended, each percent-encoded as a single path segment.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, GatewayError> {
        let response = self
            .http
            .get(self.url(segments))
            .send()
            .await
            .map_err(transport_error)?;
        decode(check_status(response).await?).await
    }

    /// Like [`get_json`](Self::get_json) but a 404 means "no such symbol" rather than failure.
    pub(crate) async fn get_optional<T: DeserializeOwned>(
        &self,
        segments: &[&str],
    ) -> Result<Option<T>, GatewayError> {
        let url = self.url(segments);
        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(transport_error)?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!(path = url.path(), "Bridge returned 404");
            return Ok(None);
        }
        decode(check_status(response).await?).await.map(Some)
    }

    pub(crate) async fn post_json<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> Result<T, GatewayError> {
        let response = self
            .http
            .post(self.url(segments))
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;
        decode(check_status(response).await?).await
    }
}

fn transport_error(err: reqwest::Error) -> GatewayError {
    if err.is_decode() {
        GatewayError::Protocol(err.to_string())
    } else {
        GatewayError::Unavailable(err.to_string())
    }
}

async fn check_status(response: Response) -> Result<Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    warn!(status = status.as_u16(), body = %body, "Bridge request failed");

    Err(match status {
        StatusCode::CONFLICT => GatewayError::Terminal(body),
        s if s.is_server_error() => GatewayError::Unavailable(format!("{s}: {body}")),
        s => GatewayError::Protocol(format!("{s}: {body}")),
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, GatewayError> {
    let bytes = response.bytes().await.map_err(transport_error)?;
    serde_json::from_slice(&bytes).map_err(|e| GatewayError::Protocol(e.to_string()))
}

#[async_trait]
impl BrokerGateway for Mt5BridgeClient {
    async fn list_open_positions(&self) -> Result<Vec<Position>, GatewayError> {
        self.positions().await
    }

    async fn account_summary(&self) -> Result<AccountSummary, GatewayError> {
        self.account().await
    }

    async fn symbol_tick(&self, symbol: &str) -> Result<Option<Tick>, GatewayError> {
        self.tick(symbol).await
    }

    async fn symbol_info(&self, symbol: &str) -> Result<Option<SymbolInfo>, GatewayError> {
        self.symbol(symbol).await
    }

    async fn estimate_margin(
        &self,
        direction: Direction,
        symbol: &str,
        volume: Decimal,
        price: Decimal,
    ) -> Result<Decimal, GatewayError> {
        self.margin(direction, symbol, volume, price).await
    }

    async fn submit_market_order(
        &self,
        request: &MarketOrderRequest,
    ) -> Result<OrderResult, GatewayError> {
        self.send_order(request).await
    }
}
