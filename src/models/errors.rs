//! Centralized Error Handling Module
//!
//! Every failure carries a unique error code for log correlation.
//! Codes follow the pattern CATEGORY_SPECIFIC_ERROR:
//! - RPC_xxx: chain reads
//! - PRICE_xxx: price discovery
//! - SIM_xxx: dry-run simulation
//! - TX_xxx: malformed transaction input
//! - RISK_xxx: business-rule rejection
//! - CFG_xxx: configuration
//!
//! Each code belongs to exactly one [`ErrorKind`], the user-facing taxonomy.

use std::fmt;

/// Application-wide error type
#[derive(Debug)]
pub struct AppError {
    /// Unique error code for logging/monitoring
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// Optional underlying error
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        code: ErrorCode,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Get error code as string (for logging)
    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }

    pub fn kind(&self) -> ErrorKind {
        self.code.kind()
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Error taxonomy exposed to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Protocol/action undeterminable. Never fatal.
    ClassificationAmbiguous,
    /// Every price tier exhausted
    PriceUnavailable,
    /// Dry run reverted or the simulation service failed
    SimulationFailed,
    /// The single business-rule rejection
    RiskThresholdExceeded,
    /// Missing required fields or sub-floor gas
    MalformedTransaction,
    /// Unexpected programmer error
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClassificationAmbiguous => "classification_ambiguous",
            Self::PriceUnavailable => "price_unavailable",
            Self::SimulationFailed => "simulation_failed",
            Self::RiskThresholdExceeded => "risk_threshold_exceeded",
            Self::MalformedTransaction => "malformed_transaction",
            Self::Internal => "internal",
        }
    }
}

/// Unique error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // ============================================
    // RPC Errors
    // ============================================
    /// RPC connection failed
    RpcConnectionFailed,
    /// RPC request timeout
    RpcTimeout,
    /// RPC rate limited (HTTP 429)
    RpcRateLimited,
    /// RPC returned error response (includes reverts)
    RpcError,
    /// Invalid RPC response
    RpcInvalidResponse,

    // ============================================
    // Price Errors
    // ============================================
    /// A single price tier failed
    PriceSourceFailed,
    /// Tier has no configuration for this network/token
    PriceSourceUnconfigured,
    /// All tiers failed
    PriceUnavailable,
    /// Caller deadline reached before a tier succeeded
    PriceDeadlineExceeded,
    /// Token not in the registry and not a parseable address
    TokenUnresolved,

    // ============================================
    // Simulation Errors
    // ============================================
    /// Simulation reverted
    SimulationReverted,
    /// Simulation failed (generic)
    SimulationFailed,
    /// Trace service not configured
    SimulationUnconfigured,

    // ============================================
    // Transaction Errors
    // ============================================
    /// Missing 'from'
    TxMissingFrom,
    /// Missing 'to'
    TxMissingTo,
    /// Address field not a 20-byte hex address
    TxInvalidAddress,
    /// Gas below floor
    TxGasTooLow,

    // ============================================
    // Risk Errors
    // ============================================
    /// Assessment above caller threshold
    RiskThresholdExceeded,
    /// Classifier could not determine protocol/action
    ClassificationAmbiguous,

    // ============================================
    // Configuration Errors
    // ============================================
    /// Invalid configuration value
    ConfigInvalidValue,
    /// Unsupported chain ID
    ConfigUnsupportedChain,
    /// Missing API key
    ConfigMissingApiKey,

    // ============================================
    // Generic Errors
    // ============================================
    /// Spawned task panicked or was cancelled
    TaskJoinFailed,
    /// Unknown error
    Unknown,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RpcConnectionFailed => "RPC_CONNECTION_FAILED",
            Self::RpcTimeout => "RPC_TIMEOUT",
            Self::RpcRateLimited => "RPC_RATE_LIMITED",
            Self::RpcError => "RPC_ERROR",
            Self::RpcInvalidResponse => "RPC_INVALID_RESPONSE",

            Self::PriceSourceFailed => "PRICE_SOURCE_FAILED",
            Self::PriceSourceUnconfigured => "PRICE_SOURCE_UNCONFIGURED",
            Self::PriceUnavailable => "PRICE_UNAVAILABLE",
            Self::PriceDeadlineExceeded => "PRICE_DEADLINE_EXCEEDED",
            Self::TokenUnresolved => "TOKEN_UNRESOLVED",

            Self::SimulationReverted => "SIM_REVERTED",
            Self::SimulationFailed => "SIM_FAILED",
            Self::SimulationUnconfigured => "SIM_UNCONFIGURED",

            Self::TxMissingFrom => "TX_MISSING_FROM",
            Self::TxMissingTo => "TX_MISSING_TO",
            Self::TxInvalidAddress => "TX_INVALID_ADDRESS",
            Self::TxGasTooLow => "TX_GAS_TOO_LOW",

            Self::RiskThresholdExceeded => "RISK_THRESHOLD_EXCEEDED",
            Self::ClassificationAmbiguous => "RISK_CLASSIFICATION_AMBIGUOUS",

            Self::ConfigInvalidValue => "CFG_INVALID_VALUE",
            Self::ConfigUnsupportedChain => "CFG_UNSUPPORTED_CHAIN",
            Self::ConfigMissingApiKey => "CFG_MISSING_API_KEY",

            Self::TaskJoinFailed => "TASK_JOIN_FAILED",
            Self::Unknown => "UNKNOWN_ERROR",
        }
    }

    /// Taxonomy bucket for this code
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ClassificationAmbiguous => ErrorKind::ClassificationAmbiguous,
            Self::PriceSourceFailed
            | Self::PriceSourceUnconfigured
            | Self::PriceUnavailable
            | Self::PriceDeadlineExceeded
            | Self::TokenUnresolved => ErrorKind::PriceUnavailable,
            Self::RpcConnectionFailed
            | Self::RpcTimeout
            | Self::RpcRateLimited
            | Self::RpcError
            | Self::RpcInvalidResponse
            | Self::SimulationReverted
            | Self::SimulationFailed
            | Self::SimulationUnconfigured => ErrorKind::SimulationFailed,
            Self::TxMissingFrom
            | Self::TxMissingTo
            | Self::TxInvalidAddress
            | Self::TxGasTooLow => ErrorKind::MalformedTransaction,
            Self::RiskThresholdExceeded => ErrorKind::RiskThresholdExceeded,
            Self::ConfigInvalidValue
            | Self::ConfigUnsupportedChain
            | Self::ConfigMissingApiKey
            | Self::TaskJoinFailed
            | Self::Unknown => ErrorKind::Internal,
        }
    }
}

// ============================================
// Convenience constructors
// ============================================

impl AppError {
    pub fn rpc_timeout(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::RpcTimeout, msg)
    }

    pub fn rpc_error(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::RpcError, msg)
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::RpcInvalidResponse, msg)
    }

    pub fn price_source_failed(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::PriceSourceFailed, msg)
    }

    pub fn price_source_unconfigured(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::PriceSourceUnconfigured, msg)
    }

    pub fn price_unavailable(symbol: &str) -> Self {
        Self::new(
            ErrorCode::PriceUnavailable,
            format!("No price source could price {}", symbol),
        )
    }

    pub fn price_deadline_exceeded(symbol: &str) -> Self {
        Self::new(
            ErrorCode::PriceDeadlineExceeded,
            format!("Deadline reached while pricing {}", symbol),
        )
    }

    pub fn token_unresolved(token: &str) -> Self {
        Self::new(ErrorCode::TokenUnresolved, format!("Unknown token: {}", token))
    }

    pub fn simulation_failed(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::SimulationFailed, msg)
    }

    pub fn simulation_reverted(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::SimulationReverted, msg)
    }

    pub fn missing_from() -> Self {
        Self::new(ErrorCode::TxMissingFrom, "Missing 'from' address")
    }

    pub fn missing_to() -> Self {
        Self::new(ErrorCode::TxMissingTo, "Missing 'to' address")
    }

    pub fn invalid_address(field: &str) -> Self {
        Self::new(ErrorCode::TxInvalidAddress, format!("Invalid '{}' address", field))
    }

    pub fn gas_too_low() -> Self {
        Self::new(ErrorCode::TxGasTooLow, "Gas limit too low")
    }

    pub fn risk_threshold_exceeded(
        level: crate::models::types::RiskLevel,
        threshold: crate::models::types::RiskLevel,
    ) -> Self {
        Self::new(
            ErrorCode::RiskThresholdExceeded,
            format!("Risk level {} exceeds threshold {}", level, threshold),
        )
    }

    pub fn classification_ambiguous(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ClassificationAmbiguous, msg)
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigInvalidValue, msg)
    }

    pub fn unsupported_chain(chain_id: u64) -> Self {
        Self::new(
            ErrorCode::ConfigUnsupportedChain,
            format!("Unsupported chain_id: {}", chain_id),
        )
    }

    pub fn missing_api_key(key_name: &str) -> Self {
        Self::new(
            ErrorCode::ConfigMissingApiKey,
            format!("Missing API key: {}", key_name),
        )
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::TaskJoinFailed, msg)
    }
}

// ============================================
// Result type alias
// ============================================

/// Application Result type
pub type AppResult<T> = Result<T, AppError>;

// ============================================
// Conversion from common error types
// ============================================

impl From<eyre::Report> for AppError {
    fn from(err: eyre::Report) -> Self {
        Self::new(ErrorCode::Unknown, err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::with_source(ErrorCode::Unknown, "IO error", err)
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::new(ErrorCode::RpcTimeout, "Request timeout")
        } else if err.is_connect() {
            Self::new(ErrorCode::RpcConnectionFailed, "Connection failed")
        } else if err.status().map(|s| s.as_u16()) == Some(429) {
            Self::new(ErrorCode::RpcRateLimited, "Rate limited (HTTP 429)")
        } else {
            Self::new(ErrorCode::RpcError, err.to_string())
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(ErrorCode::RpcInvalidResponse, "JSON parse error", err)
    }
}

impl From<hex::FromHexError> for AppError {
    fn from(err: hex::FromHexError) -> Self {
        Self::with_source(ErrorCode::RpcInvalidResponse, "Invalid hex data", err)
    }
}

impl From<alloy_sol_types::Error> for AppError {
    fn from(err: alloy_sol_types::Error) -> Self {
        Self::new(ErrorCode::RpcInvalidResponse, format!("ABI decode failed: {}", err))
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::new(ErrorCode::TaskJoinFailed, format!("Task join error: {}", err))
    }
}
