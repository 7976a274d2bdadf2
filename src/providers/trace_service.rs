//! Trace Simulation Service Module
//!
//! Full-trace dry run through the hosted simulation API
//! (`POST {base}/account/{account}/project/{project}/simulate`).
//! The response is reduced to status, gas used and the raw event logs;
//! the simulator turns Transfer logs into token movements.

use alloy_primitives::{Address, Bytes, B256};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::models::config::TraceServiceConfig;
use crate::models::errors::{AppError, AppResult, ErrorCode};
use crate::utils::constants::USER_AGENT;

// ============================================
// REQUEST / RESPONSE TYPES
// ============================================

/// Simulation request body
#[derive(Debug, Clone, Serialize)]
pub struct TraceSimulationRequest {
    pub network_id: String,
    pub from: String,
    pub to: String,
    pub input: String,
    pub gas: u64,
    pub gas_price: String,
    pub value: String,
    pub save: bool,
    pub save_if_fails: bool,
    pub simulation_type: &'static str,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct SimulationEnvelope {
    #[serde(default)]
    transaction: Option<SimulatedTransaction>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct SimulatedTransaction {
    #[serde(default)]
    status: bool,
    #[serde(default)]
    gas_used: u64,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    transaction_info: Option<TransactionInfo>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct TransactionInfo {
    #[serde(default)]
    logs: Vec<SimulatedLog>,
}

/// Log entry as returned by the service. Some deployments nest the
/// fields under `raw`.
#[derive(Debug, Clone, Default, Deserialize)]
struct SimulatedLog {
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    topics: Vec<String>,
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    raw: Option<RawLog>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawLog {
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    topics: Vec<String>,
    #[serde(default)]
    data: Option<String>,
}

/// Parsed event log
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

/// Reduced simulation outcome
#[derive(Debug, Clone, PartialEq)]
pub struct TraceOutcome {
    pub status: bool,
    pub gas_used: u64,
    pub logs: Vec<LogEntry>,
    pub error_message: Option<String>,
}

/// Parse the service's JSON response. A body without a `transaction`
/// object is an invalid response; individual malformed logs are skipped.
pub fn parse_trace_response(body: serde_json::Value) -> AppResult<TraceOutcome> {
    let envelope: SimulationEnvelope = serde_json::from_value(body)?;
    let tx = envelope
        .transaction
        .ok_or_else(|| AppError::invalid_response("Simulation response has no transaction"))?;

    let raw_logs = tx.transaction_info.map(|info| info.logs).unwrap_or_default();
    let total = raw_logs.len();
    let logs: Vec<LogEntry> = raw_logs.into_iter().filter_map(parse_log).collect();
    if logs.len() < total {
        debug!("🔍 Skipped {} malformed simulation logs", total - logs.len());
    }

    Ok(TraceOutcome {
        status: tx.status,
        gas_used: tx.gas_used,
        logs,
        error_message: tx.error_message,
    })
}

fn parse_log(log: SimulatedLog) -> Option<LogEntry> {
    let (address, topics, data) = match log.raw {
        Some(raw) if log.address.is_none() => (raw.address, raw.topics, raw.data),
        _ => (log.address, log.topics, log.data),
    };

    let address = Address::from_str(address?.trim()).ok()?;
    let topics = topics
        .iter()
        .map(|t| B256::from_str(t.trim()).ok())
        .collect::<Option<Vec<_>>>()?;
    let data = data.unwrap_or_default();
    let data = hex::decode(data.trim().trim_start_matches("0x")).ok()?;

    Some(LogEntry {
        address,
        topics,
        data: Bytes::from(data),
    })
}

// ============================================
// CLIENT
// ============================================

/// HTTP client for the trace simulation service
#[derive(Clone)]
pub struct TraceServiceClient {
    client: reqwest::Client,
    config: TraceServiceConfig,
}

impl TraceServiceClient {
    pub fn new(config: TraceServiceConfig, timeout: Duration) -> AppResult<Self> {
        if config.api_key.is_empty() {
            return Err(AppError::missing_api_key("TENDERLY_API_KEY"));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .gzip(true)
            .build()
            .map_err(|e| AppError::with_source(ErrorCode::SimulationUnconfigured, "Failed to build HTTP client", e))?;

        Ok(Self { client, config })
    }

    /// Run one simulation
    pub async fn simulate(&self, request: &TraceSimulationRequest) -> AppResult<TraceOutcome> {
        let url = self.config.simulate_url();
        info!("🧪 Trace simulation: {} → {} (network {})", request.from, request.to, request.network_id);

        let response = self
            .client
            .post(&url)
            .header("X-Access-Key", &self.config.api_key)
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| AppError::with_source(ErrorCode::SimulationFailed, "Simulation request failed", e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!("⚠️ Trace simulation HTTP {}: {}", status, truncate(&text, 200));
            return Err(AppError::simulation_failed(format!("Simulation service returned HTTP {}", status)));
        }

        let body: serde_json::Value = response.json().await?;
        parse_trace_response(body)
    }
}

impl std::fmt::Debug for TraceServiceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceServiceClient")
            .field("account", &self.config.account)
            .field("project", &self.config.project)
            .finish()
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
