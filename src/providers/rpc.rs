//! RPC Client Module - Flare JSON-RPC over HTTP
//!
//! Read-only chain access for price lookups, token metadata and the
//! call-based simulation fallback. One request per call, bounded by the
//! configured per-call timeout. No retries: a failed read is reported to
//! the caller, who falls through to its next source.
//!
//! Everything above this module talks to [`ChainReader`], so tests can
//! swap in an in-memory chain.

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_ENCODING, CONTENT_TYPE, USER_AGENT};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::models::config::GuardConfig;
use crate::models::errors::{AppError, AppResult, ErrorCode};
use crate::utils::constants::{get_chain_name, USER_AGENT as USER_AGENT_CONST};

/// Read-only contract call
#[derive(Debug, Clone, PartialEq)]
pub struct CallRequest {
    pub from: Option<Address>,
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    pub gas: Option<u64>,
}

impl CallRequest {
    pub fn new(to: Address, data: impl Into<Bytes>) -> Self {
        Self {
            from: None,
            to,
            data: data.into(),
            value: U256::ZERO,
            gas: None,
        }
    }

    pub fn with_from(mut self, from: Address) -> Self {
        self.from = Some(from);
        self
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    pub fn with_gas(mut self, gas: u64) -> Self {
        self.gas = Some(gas);
        self
    }

    /// 4-byte selector, if the call data carries one
    pub fn selector(&self) -> Option<[u8; 4]> {
        self.data.get(..4).and_then(|s| s.try_into().ok())
    }

    /// `eth_call` / `eth_estimateGas` call object
    fn to_json(&self) -> serde_json::Value {
        let mut obj = serde_json::json!({
            "to": self.to.to_string(),
            "data": format!("0x{}", hex::encode(&self.data)),
        });
        if let Some(from) = self.from {
            obj["from"] = serde_json::json!(from.to_string());
        }
        if !self.value.is_zero() {
            obj["value"] = serde_json::json!(format!("{:#x}", self.value));
        }
        if let Some(gas) = self.gas {
            obj["gas"] = serde_json::json!(format!("{:#x}", gas));
        }
        obj
    }
}

/// Chain access used by price sources and the simulator
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// `eth_call` against the latest block
    async fn call(&self, request: &CallRequest) -> AppResult<Bytes>;

    /// `eth_estimateGas`
    async fn estimate_gas(&self, request: &CallRequest) -> AppResult<u64>;

    fn chain_id(&self) -> u64;
}

/// ABI-encode `call`, execute it against `to`, decode the return tuple
pub async fn read_contract<C>(reader: &dyn ChainReader, to: Address, call: &C) -> AppResult<C::Return>
where
    C: SolCall + Sync,
{
    let request = CallRequest::new(to, call.abi_encode());
    let output = reader.call(&request).await?;
    if output.is_empty() {
        return Err(AppError::invalid_response(format!(
            "{} returned no data from {}",
            C::SIGNATURE,
            to
        )));
    }
    C::abi_decode_returns(&output, false).map_err(AppError::from)
}

/// HTTP JSON-RPC provider
#[derive(Clone)]
pub struct RpcProvider {
    url: String,
    client: reqwest::Client,
    chain_id: u64,
    network_name: String,
}

impl RpcProvider {
    /// Provider for the configured network and endpoint
    pub fn new(config: &GuardConfig) -> AppResult<Self> {
        Self::with_url(&config.rpc_url, config.chain_id(), config.rpc_timeout)
    }

    pub fn with_url(url: &str, chain_id: u64, timeout: Duration) -> AppResult<Self> {
        if url.trim().is_empty() {
            return Err(AppError::invalid_config("RPC URL is empty"));
        }
        let client = Self::build_client(timeout)?;
        Ok(Self {
            url: url.trim().to_string(),
            client,
            chain_id,
            network_name: get_chain_name(chain_id).to_string(),
        })
    }

    /// HTTP client with default headers and gzip
    fn build_client(timeout: Duration) -> AppResult<reqwest::Client> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_CONST));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip"));

        reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .gzip(true)
            .build()
            .map_err(|e| AppError::with_source(ErrorCode::RpcConnectionFailed, "Failed to build HTTP client", e))
    }

    /// Execute a single JSON-RPC call
    pub async fn request<T: DeserializeOwned>(&self, method: &str, params: serde_json::Value) -> AppResult<T> {
        let payload = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        debug!("📡 {} → {}", method, self.network_name);
        let response = self.client.post(&self.url).json(&payload).send().await?;

        let status = response.status();
        if status.as_u16() == 429 {
            warn!("⏳ Rate limited (HTTP 429) on {}", self.network_name);
            return Err(AppError::new(ErrorCode::RpcRateLimited, "Rate limited (HTTP 429)"));
        }
        if !status.is_success() {
            return Err(AppError::rpc_error(format!("HTTP error: {}", status)));
        }

        let body: RpcResponse<T> = response.json().await?;
        if let Some(error) = body.error {
            return Err(error.into_app_error(method));
        }
        body.result
            .ok_or_else(|| AppError::invalid_response(format!("No result in {} response", method)))
    }

    /// `eth_call` returning raw bytes
    pub async fn eth_call(&self, request: &CallRequest) -> AppResult<Bytes> {
        let params = serde_json::json!([request.to_json(), "latest"]);
        let raw: String = self.request("eth_call", params).await?;
        decode_hex_bytes(&raw)
    }

    /// Endpoint with any query string (API keys) hidden
    pub fn masked_url(&self) -> String {
        match self.url.split_once('?') {
            Some((base, _)) => format!("{}?***HIDDEN***", base),
            None => self.url.clone(),
        }
    }
}

#[async_trait]
impl ChainReader for RpcProvider {
    async fn call(&self, request: &CallRequest) -> AppResult<Bytes> {
        self.eth_call(request).await
    }

    async fn estimate_gas(&self, request: &CallRequest) -> AppResult<u64> {
        let params = serde_json::json!([request.to_json()]);
        let raw: String = self.request("eth_estimateGas", params).await?;
        parse_hex_quantity(&raw)
    }

    fn chain_id(&self) -> u64 {
        self.chain_id
    }
}

impl std::fmt::Debug for RpcProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcProvider")
            .field("url", &self.masked_url())
            .field("chain_id", &self.chain_id)
            .finish()
    }
}

/// JSON-RPC response structure
#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

/// JSON-RPC error structure
#[derive(Debug, Clone, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl RpcError {
    /// HTTP 429 equivalent (-32005) or a rate-limit message
    pub fn is_rate_limit(&self) -> bool {
        self.code == -32005 || self.message.to_lowercase().contains("rate limit")
    }

    /// Execution reverted (code 3 or a revert message)
    pub fn is_revert(&self) -> bool {
        self.code == 3 || self.message.to_lowercase().contains("revert")
    }

    fn into_app_error(self, method: &str) -> AppError {
        if self.is_rate_limit() {
            AppError::new(ErrorCode::RpcRateLimited, self.message)
        } else if self.is_revert() {
            AppError::simulation_reverted(self.message)
        } else {
            AppError::rpc_error(format!("{} failed: {} (code: {})", method, self.message, self.code))
        }
    }
}

/// `0x`-prefixed hex data
pub fn decode_hex_bytes(raw: &str) -> AppResult<Bytes> {
    let stripped = raw.trim().trim_start_matches("0x");
    Ok(Bytes::from(hex::decode(stripped)?))
}

/// `0x`-prefixed hex quantity
pub fn parse_hex_quantity(raw: &str) -> AppResult<u64> {
    let stripped = raw.trim().trim_start_matches("0x");
    if stripped.is_empty() {
        return Err(AppError::invalid_response("Empty hex quantity"));
    }
    u64::from_str_radix(stripped, 16)
        .map_err(|_| AppError::invalid_response(format!("Invalid hex quantity: {}", raw)))
}
