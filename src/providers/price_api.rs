//! HTTP Price API client
//!
//! `GET {url}/price/{token_address}` with an optional bearer key.
//! The body must carry a positive numeric `price` (number or string).

use alloy_primitives::Address;
use std::time::Duration;
use tracing::debug;

use crate::models::config::PriceApiConfig;
use crate::models::errors::{AppError, AppResult, ErrorCode};
use crate::utils::constants::USER_AGENT;

#[derive(Clone)]
pub struct PriceApiClient {
    client: reqwest::Client,
    config: PriceApiConfig,
}

impl PriceApiClient {
    pub fn new(config: PriceApiConfig, timeout: Duration) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .gzip(true)
            .build()
            .map_err(|e| AppError::with_source(ErrorCode::PriceSourceUnconfigured, "Failed to build HTTP client", e))?;
        Ok(Self { client, config })
    }

    pub fn price_url(&self, token: Address) -> String {
        format!("{}/price/{}", self.config.url.trim_end_matches('/'), token)
    }

    /// USD price of `token`
    pub async fn get_price(&self, token: Address) -> AppResult<f64> {
        let url = self.price_url(token);
        let mut request = self.client.get(&url);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(AppError::price_source_failed(format!(
                "Price API error: {}",
                response.status()
            )));
        }

        let body: serde_json::Value = response.json().await?;
        let price = parse_price_body(&body)?;
        debug!("🌐 Price API: {} = ${}", token, price);
        Ok(price)
    }
}

impl std::fmt::Debug for PriceApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriceApiClient")
            .field("url", &self.config.url)
            .field("authenticated", &self.config.api_key.is_some())
            .finish()
    }
}

/// Extract a positive finite `price` field
pub fn parse_price_body(body: &serde_json::Value) -> AppResult<f64> {
    let price = match body.get("price") {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match price {
        Some(p) if p.is_finite() && p > 0.0 => Ok(p),
        _ => Err(AppError::price_source_failed("Price API returned no usable price")),
    }
}
