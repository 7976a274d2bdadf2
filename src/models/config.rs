//! Configuration for the risk gate
//!
//! Values come from environment variables with defaults from
//! utils/constants.rs. No addresses are hardcoded here.

use std::time::Duration;
use tracing::{info, warn};

use crate::models::errors::{AppError, AppResult};
use crate::models::types::RiskLevel;
use crate::utils::constants::{
    get_chain_name, get_default_rpc_url, get_native_symbol, CHAIN_ID_COSTON2, CHAIN_ID_FLARE,
    CHAIN_ID_SONGBIRD, DEFAULT_POOL_FEE_BPS, DEFAULT_PRICE_CACHE_TTL_SECS,
    DEFAULT_RPC_TIMEOUT_SECS, SIMULATION_TIMEOUT_SECS, TENDERLY_API_BASE,
};

/// Supported networks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Network {
    Flare = 14,
    Songbird = 19,
    Coston2 = 114,
}

impl Network {
    pub fn from_id(id: u64) -> Option<Self> {
        match id {
            CHAIN_ID_FLARE => Some(Self::Flare),
            CHAIN_ID_SONGBIRD => Some(Self::Songbird),
            CHAIN_ID_COSTON2 => Some(Self::Coston2),
            _ => None,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "flare" => Some(Self::Flare),
            "songbird" => Some(Self::Songbird),
            "coston2" => Some(Self::Coston2),
            _ => None,
        }
    }

    pub fn chain_id(&self) -> u64 {
        *self as u64
    }

    pub fn name(&self) -> &'static str {
        get_chain_name(self.chain_id())
    }

    pub fn native_symbol(&self) -> &'static str {
        get_native_symbol(self.chain_id())
    }
}

/// External full-trace simulation service credentials
#[derive(Debug, Clone)]
pub struct TraceServiceConfig {
    pub api_key: String,
    pub account: String,
    pub project: String,
    pub base_url: String,
}

impl TraceServiceConfig {
    /// Read `TENDERLY_API_KEY`, `TENDERLY_ACCOUNT`, `TENDERLY_PROJECT`.
    /// All three must be set.
    pub fn from_env() -> Option<Self> {
        let api_key = non_empty_env("TENDERLY_API_KEY")?;
        let account = non_empty_env("TENDERLY_ACCOUNT")?;
        let project = non_empty_env("TENDERLY_PROJECT")?;
        info!("🔑 Trace simulation service configured (key hidden)");
        Some(Self {
            api_key,
            account,
            project,
            base_url: TENDERLY_API_BASE.to_string(),
        })
    }

    pub fn simulate_url(&self) -> String {
        format!(
            "{}/account/{}/project/{}/simulate",
            self.base_url.trim_end_matches('/'),
            self.account,
            self.project
        )
    }
}

/// Optional external HTTP price API
#[derive(Debug, Clone)]
pub struct PriceApiConfig {
    pub url: String,
    pub api_key: Option<String>,
}

impl PriceApiConfig {
    pub fn from_env() -> Option<Self> {
        let url = non_empty_env("PRICE_API_URL")?;
        Some(Self {
            url,
            api_key: non_empty_env("PRICE_API_KEY"),
        })
    }
}

/// Top-level configuration
#[derive(Debug, Clone)]
pub struct GuardConfig {
    pub network: Network,
    pub rpc_url: String,
    /// Per-call timeout for chain reads and price API calls
    pub rpc_timeout: Duration,
    pub simulation_timeout: Duration,
    pub risk_threshold: RiskLevel,
    pub price_cache_ttl_secs: u64,
    pub pool_fee_bps: u32,
    pub trace_service: Option<TraceServiceConfig>,
    pub price_api: Option<PriceApiConfig>,
}

impl GuardConfig {
    /// Strict variant of `Default`: invalid values are errors.
    pub fn from_env() -> AppResult<Self> {
        let network = match non_empty_env("FLARE_NETWORK") {
            Some(name) => Network::from_name(&name)
                .ok_or_else(|| AppError::invalid_config(format!("Unknown network: {}", name)))?,
            None => Network::Flare,
        };
        let risk_threshold = match non_empty_env("RISK_THRESHOLD") {
            Some(v) => v.parse::<RiskLevel>()?,
            None => RiskLevel::Medium,
        };
        let rpc_timeout_secs = parse_env_u64("RPC_TIMEOUT_SECS")?.unwrap_or(DEFAULT_RPC_TIMEOUT_SECS);
        let ttl = parse_env_u64("PRICE_CACHE_TTL_SECS")?.unwrap_or(DEFAULT_PRICE_CACHE_TTL_SECS);

        Ok(Self {
            network,
            rpc_url: non_empty_env("FLARE_RPC_URL")
                .unwrap_or_else(|| get_default_rpc_url(network.chain_id()).to_string()),
            rpc_timeout: Duration::from_secs(rpc_timeout_secs),
            simulation_timeout: Duration::from_secs(SIMULATION_TIMEOUT_SECS),
            risk_threshold,
            price_cache_ttl_secs: ttl,
            pool_fee_bps: DEFAULT_POOL_FEE_BPS,
            trace_service: TraceServiceConfig::from_env(),
            price_api: PriceApiConfig::from_env(),
        })
    }

    /// Offline configuration for a network: no external services.
    pub fn for_network(network: Network) -> Self {
        Self {
            network,
            rpc_url: get_default_rpc_url(network.chain_id()).to_string(),
            rpc_timeout: Duration::from_secs(DEFAULT_RPC_TIMEOUT_SECS),
            simulation_timeout: Duration::from_secs(SIMULATION_TIMEOUT_SECS),
            risk_threshold: RiskLevel::Medium,
            price_cache_ttl_secs: DEFAULT_PRICE_CACHE_TTL_SECS,
            pool_fee_bps: DEFAULT_POOL_FEE_BPS,
            trace_service: None,
            price_api: None,
        }
    }

    pub fn chain_id(&self) -> u64 {
        self.network.chain_id()
    }
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self::from_env().unwrap_or_else(|e| {
            warn!("⚠️ Invalid environment configuration ({}), using defaults", e);
            Self::for_network(Network::Flare)
        })
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_env_u64(key: &str) -> AppResult<Option<u64>> {
    match non_empty_env(key) {
        None => Ok(None),
        Some(v) => v
            .parse::<u64>()
            .map(Some)
            .map_err(|_| AppError::invalid_config(format!("{} must be an integer, got '{}'", key, v))),
    }
}
