//! Dry-run simulation
//!
//! Strategies are tried in order until one produces a result:
//! 1. Full-trace simulation service (transfers decoded from event logs)
//! 2. Read-only `eth_call` against latest state (coarse status only)
//!
//! A strategy returns `Err` when it could not run at all. A revert is a
//! definite outcome and comes back as `Ok` with `status = failed`. The
//! [`Simulator`] never errors; when every strategy fails it reports
//! `status = unknown` with the collected errors.

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::sol;
use async_trait::async_trait;
use dashmap::DashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::core::tokens::{TokenRegistry, DEFAULT_TOKEN_DECIMALS};
use crate::models::config::GuardConfig;
use crate::models::errors::{AppError, AppResult, ErrorCode};
use crate::models::types::{SimulationResult, TokenTransfer, TxRequest};
use crate::providers::rpc::{decode_hex_bytes, read_contract, CallRequest, ChainReader};
use crate::providers::trace_service::{LogEntry, TraceOutcome, TraceServiceClient, TraceSimulationRequest};
use crate::utils::constants::{to_units, DEFAULT_SIMULATION_GAS, TRANSFER_EVENT_TOPIC};

sol! {
    interface IERC20Metadata {
        function decimals() external view returns (uint8);
        function symbol() external view returns (string);
    }
}

/// Symbol reported when a token's metadata cannot be read
pub const UNKNOWN_TOKEN_SYMBOL: &str = "UNKNOWN";

/// One way of dry-running a transaction
#[async_trait]
pub trait SimulationStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn attempt(&self, tx: &TxRequest) -> AppResult<SimulationResult>;
}

// ============================================
// HELPERS
// ============================================

fn parse_address(raw: Option<&str>, field: &str) -> AppResult<Option<Address>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => Address::from_str(s).map(Some).map_err(|_| AppError::invalid_address(field)),
    }
}

/// Gas price used for simulation: legacy price, else the EIP-1559 cap
fn effective_gas_price(tx: &TxRequest) -> U256 {
    tx.gas_price.or(tx.max_fee_per_gas).unwrap_or(U256::ZERO)
}

/// Build the read-only call for `tx`
pub fn call_request_for(tx: &TxRequest) -> AppResult<CallRequest> {
    let to = parse_address(tx.to.as_deref(), "to")?.ok_or_else(AppError::missing_to)?;
    let data = if tx.data.trim().is_empty() { Bytes::new() } else { decode_hex_bytes(&tx.data)? };

    let mut request = CallRequest::new(to, data).with_value(tx.value);
    if let Some(from) = parse_address(tx.from.as_deref(), "from")? {
        request = request.with_from(from);
    }
    if let Some(gas) = tx.gas {
        request = request.with_gas(gas);
    }
    Ok(request)
}

// ============================================
// TRACE SERVICE STRATEGY
// ============================================

/// Full-trace simulation through the external service
pub struct TraceServiceStrategy {
    client: TraceServiceClient,
    reader: Arc<dyn ChainReader>,
    registry: TokenRegistry,
    /// Token address -> (decimals, symbol)
    metadata: DashMap<Address, (u8, String)>,
}

impl TraceServiceStrategy {
    pub fn new(client: TraceServiceClient, reader: Arc<dyn ChainReader>, registry: TokenRegistry) -> Self {
        Self {
            client,
            reader,
            registry,
            metadata: DashMap::new(),
        }
    }

    /// Request body for `tx`. The network id falls back to the reader's chain.
    pub fn build_request(&self, tx: &TxRequest) -> TraceSimulationRequest {
        TraceSimulationRequest {
            network_id: tx.chain_id.unwrap_or_else(|| self.reader.chain_id()).to_string(),
            from: tx.from.clone().unwrap_or_default(),
            to: tx.to.clone().unwrap_or_default(),
            input: if tx.data.trim().is_empty() { "0x".to_string() } else { tx.data.clone() },
            gas: tx.gas.unwrap_or(DEFAULT_SIMULATION_GAS),
            gas_price: effective_gas_price(tx).to_string(),
            value: tx.value.to_string(),
            save: true,
            save_if_fails: true,
            simulation_type: "full",
        }
    }

    /// Convert a service outcome into a simulation result
    pub async fn to_result(&self, outcome: TraceOutcome) -> SimulationResult {
        if !outcome.status {
            let reason = outcome
                .error_message
                .unwrap_or_else(|| "Transaction reverted".to_string());
            return SimulationResult::failed(outcome.gas_used, vec![format!("Simulation failed: {}", reason)]);
        }

        let mut transfers = Vec::new();
        for log in &outcome.logs {
            if let Some(transfer) = self.decode_transfer(log).await {
                transfers.push(transfer);
            }
        }
        debug!("🧪 Trace simulation decoded {} transfer(s)", transfers.len());
        SimulationResult::success(outcome.gas_used, transfers)
    }

    async fn decode_transfer(&self, log: &LogEntry) -> Option<TokenTransfer> {
        if log.topics.len() < 3 || log.topics[0] != TRANSFER_EVENT_TOPIC {
            return None;
        }
        if log.data.len() < 32 {
            warn!("⚠️ Transfer log from {} has short data, skipped", log.address);
            return None;
        }
        let raw_amount = U256::from_be_slice(&log.data[..32]);
        let (decimals, symbol) = self.token_metadata(log.address).await;

        Some(TokenTransfer {
            token: symbol,
            token_address: log.address,
            from: Address::from_word(log.topics[1]),
            to: Address::from_word(log.topics[2]),
            amount: to_units(raw_amount, decimals),
            raw_amount,
        })
    }

    /// Decimals and symbol for a token: registry, then cache, then chain
    async fn token_metadata(&self, token: Address) -> (u8, String) {
        if let Some(info) = self.registry.by_address(&token) {
            return (info.decimals, info.symbol.clone());
        }
        if let Some(entry) = self.metadata.get(&token) {
            return entry.value().clone();
        }

        let decimals = match read_contract(self.reader.as_ref(), token, &IERC20Metadata::decimalsCall {}).await {
            Ok(ret) => ret._0,
            Err(e) => {
                debug!("decimals() failed for {}: {}", token, e);
                DEFAULT_TOKEN_DECIMALS
            }
        };
        let symbol = match read_contract(self.reader.as_ref(), token, &IERC20Metadata::symbolCall {}).await {
            Ok(ret) => ret._0,
            Err(e) => {
                debug!("symbol() failed for {}: {}", token, e);
                UNKNOWN_TOKEN_SYMBOL.to_string()
            }
        };
        self.metadata.insert(token, (decimals, symbol.clone()));
        (decimals, symbol)
    }
}

#[async_trait]
impl SimulationStrategy for TraceServiceStrategy {
    fn name(&self) -> &'static str {
        "trace_service"
    }

    async fn attempt(&self, tx: &TxRequest) -> AppResult<SimulationResult> {
        let request = self.build_request(tx);
        let outcome = self.client.simulate(&request).await?;
        Ok(self.to_result(outcome).await)
    }
}

// ============================================
// CALL FALLBACK STRATEGY
// ============================================

/// `eth_call` against latest state. Success means non-empty, non-zero
/// return data.
pub struct CallFallbackStrategy {
    reader: Arc<dyn ChainReader>,
}

impl CallFallbackStrategy {
    pub fn new(reader: Arc<dyn ChainReader>) -> Self {
        Self { reader }
    }
}

#[async_trait]
impl SimulationStrategy for CallFallbackStrategy {
    fn name(&self) -> &'static str {
        "call_fallback"
    }

    async fn attempt(&self, tx: &TxRequest) -> AppResult<SimulationResult> {
        let request = call_request_for(tx)?;

        let output = match self.reader.call(&request).await {
            Ok(out) => out,
            Err(e) if e.code == ErrorCode::SimulationReverted => {
                return Ok(SimulationResult::failed(0, vec![format!("Simulation reverted: {}", e.message)]));
            }
            Err(e) => return Err(e),
        };

        let gas = match self.reader.estimate_gas(&request).await {
            Ok(g) => g,
            Err(e) => {
                debug!("Gas estimate unavailable: {}", e);
                tx.gas.unwrap_or(0)
            }
        };

        if output.is_empty() || output.iter().all(|b| *b == 0) {
            return Ok(SimulationResult::failed(gas, vec!["Call returned empty or zero data".to_string()]));
        }
        Ok(SimulationResult::success(gas, Vec::new()))
    }
}

// ============================================
// SIMULATOR
// ============================================

/// Ordered simulation strategies
pub struct Simulator {
    strategies: Vec<Arc<dyn SimulationStrategy>>,
    call_timeout: Duration,
}

impl Simulator {
    pub fn new(call_timeout: Duration) -> Self {
        Self {
            strategies: Vec::new(),
            call_timeout,
        }
    }

    pub fn with_strategy(mut self, strategy: impl SimulationStrategy + 'static) -> Self {
        self.strategies.push(Arc::new(strategy));
        self
    }

    /// Trace service when credentials are configured, then `eth_call`
    pub fn from_config(config: &GuardConfig, reader: Arc<dyn ChainReader>) -> Self {
        let mut simulator = Self::new(config.simulation_timeout);

        if let Some(trace_cfg) = config.trace_service.clone() {
            match TraceServiceClient::new(trace_cfg, config.simulation_timeout) {
                Ok(client) => {
                    let registry = TokenRegistry::for_chain(config.chain_id());
                    simulator = simulator.with_strategy(TraceServiceStrategy::new(client, reader.clone(), registry));
                }
                Err(e) => warn!("⚠️ Trace simulation disabled: {}", e),
            }
        }
        simulator.with_strategy(CallFallbackStrategy::new(reader))
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Dry-run `tx`. Never errors.
    pub async fn simulate(&self, tx: &TxRequest) -> SimulationResult {
        let mut errors = Vec::new();

        for strategy in &self.strategies {
            match timeout(self.call_timeout, strategy.attempt(tx)).await {
                Ok(Ok(result)) => {
                    info!(
                        "🧪 Simulation via {}: {:?} (gas {})",
                        strategy.name(),
                        result.status,
                        result.gas_estimate
                    );
                    return result;
                }
                Ok(Err(e)) => {
                    warn!("⚠️ Simulation strategy {} failed: {}", strategy.name(), e);
                    errors.push(format!("{}: {}", strategy.name(), e));
                }
                Err(_) => {
                    warn!("⏱️ Simulation strategy {} timed out", strategy.name());
                    errors.push(format!("{}: timed out after {:?}", strategy.name(), self.call_timeout));
                }
            }
        }

        if errors.is_empty() {
            errors.push("No simulation strategy configured".to_string());
        }
        SimulationResult::unknown(errors)
    }
}

impl std::fmt::Debug for Simulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulator")
            .field("strategies", &self.strategy_names())
            .field("call_timeout", &self.call_timeout)
            .finish()
    }
}
