//! Type definitions for the risk gate
//! All core data structures passed between classifier, oracle, scorer,
//! simulator and validator.

use alloy_primitives::{Address, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::models::errors::{AppError, ErrorKind};

// ============================================
// RISK
// ============================================

/// Risk level. The declaration order is the threshold order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            RiskLevel::Low => "🟢",
            RiskLevel::Medium => "🟠",
            RiskLevel::High => "🔴",
            RiskLevel::Critical => "💀",
        }
    }

    /// Band an aggregate score: <0.3 low, <0.6 medium, <0.9 high, else critical
    pub fn from_score(score: f64) -> Self {
        if score < 0.3 {
            RiskLevel::Low
        } else if score < 0.6 {
            RiskLevel::Medium
        } else if score < 0.9 {
            RiskLevel::High
        } else {
            RiskLevel::Critical
        }
    }

    /// True when `self` is strictly above `threshold`
    #[inline]
    pub fn exceeds(&self, threshold: RiskLevel) -> bool {
        *self > threshold
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            "critical" => Ok(RiskLevel::Critical),
            other => Err(AppError::invalid_config(format!(
                "Unknown risk threshold '{}', expected low|medium|high|critical",
                other
            ))),
        }
    }
}

/// A single scored risk factor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFactor {
    pub name: String,
    pub level: RiskLevel,
    /// Score in [0, 1]
    pub score: f64,
    pub description: String,
}

impl RiskFactor {
    pub fn new(name: &str, level: RiskLevel, score: f64, description: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            level,
            score: score.clamp(0.0, 1.0),
            description: description.into(),
        }
    }
}

/// Aggregate level and score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverallRisk {
    pub level: RiskLevel,
    pub score: f64,
}

impl OverallRisk {
    /// Score used when no factor could be evaluated
    pub const DEGRADED_SCORE: f64 = 0.1;

    /// Arithmetic mean of factor scores, banded. Empty input gives the
    /// degraded default (low, 0.1).
    pub fn from_factors(factors: &[RiskFactor]) -> Self {
        if factors.is_empty() {
            return Self {
                level: RiskLevel::Low,
                score: Self::DEGRADED_SCORE,
            };
        }
        let score = factors.iter().map(|f| f.score).sum::<f64>() / factors.len() as f64;
        Self {
            level: RiskLevel::from_score(score),
            score,
        }
    }
}

/// Leveled, explainable assessment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub overall_risk: OverallRisk,
    #[serde(rename = "risk_factors")]
    pub factors: Vec<RiskFactor>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

impl RiskAssessment {
    pub const DEGRADED_WARNING: &'static str =
        "Risk assessment degraded: no risk factors could be evaluated";

    /// Build an assessment whose overall risk is derived from `factors`
    pub fn from_factors(
        factors: Vec<RiskFactor>,
        mut warnings: Vec<String>,
        recommendations: Vec<String>,
    ) -> Self {
        if factors.is_empty() {
            warnings.push(Self::DEGRADED_WARNING.to_string());
        }
        Self {
            overall_risk: OverallRisk::from_factors(&factors),
            factors,
            warnings,
            recommendations,
        }
    }

    /// Fixed medium assessment for calls whose protocol cannot be identified
    pub fn unknown_protocol() -> Self {
        Self {
            overall_risk: OverallRisk {
                level: RiskLevel::Medium,
                score: 0.5,
            },
            factors: vec![RiskFactor::new(
                "unknown_protocol",
                RiskLevel::Medium,
                0.5,
                "Unable to identify protocol for this transaction",
            )],
            warnings: vec!["Transaction to unknown protocol or contract".to_string()],
            recommendations: vec!["Verify the destination contract before proceeding".to_string()],
        }
    }

    pub fn level(&self) -> RiskLevel {
        self.overall_risk.level
    }
}

// ============================================
// CLASSIFICATION
// ============================================

/// Protocol family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolType {
    Dex,
    Lending,
    Staking,
    Token,
    Unknown,
}

impl ProtocolType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolType::Dex => "dex",
            ProtocolType::Lending => "lending",
            ProtocolType::Staking => "staking",
            ProtocolType::Token => "token",
            ProtocolType::Unknown => "unknown",
        }
    }
}

/// Action a call performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Swap,
    AddLiquidity,
    RemoveLiquidity,
    Deposit,
    Withdraw,
    Borrow,
    Repay,
    Stake,
    Unstake,
    ClaimRewards,
    Transfer,
    Approve,
    TransferFrom,
    Unknown,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Swap => "swap",
            Action::AddLiquidity => "add_liquidity",
            Action::RemoveLiquidity => "remove_liquidity",
            Action::Deposit => "deposit",
            Action::Withdraw => "withdraw",
            Action::Borrow => "borrow",
            Action::Repay => "repay",
            Action::Stake => "stake",
            Action::Unstake => "unstake",
            Action::ClaimRewards => "claim_rewards",
            Action::Transfer => "transfer",
            Action::Approve => "approve",
            Action::TransferFrom => "transfer_from",
            Action::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operative token of a call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenRef {
    /// Chain base currency (zero-address sentinel)
    Native,
    Contract(Address),
    Unknown,
}

impl TokenRef {
    pub fn from_address(address: Address) -> Self {
        if address == Address::ZERO {
            TokenRef::Native
        } else {
            TokenRef::Contract(address)
        }
    }

    pub fn address(&self) -> Option<Address> {
        match self {
            TokenRef::Native => Some(Address::ZERO),
            TokenRef::Contract(a) => Some(*a),
            TokenRef::Unknown => None,
        }
    }
}

impl fmt::Display for TokenRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenRef::Native => write!(f, "{}", Address::ZERO),
            TokenRef::Contract(a) => write!(f, "{}", a),
            TokenRef::Unknown => f.write_str("unknown"),
        }
    }
}

impl Serialize for TokenRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Structured description of what a call does
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProtocolCallInfo {
    pub protocol_name: String,
    pub action: Action,
    pub protocol_type: ProtocolType,
    #[serde(rename = "token_address")]
    pub token: TokenRef,
    /// Raw operative amount, `None` when it could not be decoded
    pub amount: Option<U256>,
    /// Output token of a swap path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_out: Option<Address>,
    /// Recipient of an ERC20 transfer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient: Option<Address>,
    /// Minimum output bound of a swap
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_amount_out: Option<U256>,
}

impl ProtocolCallInfo {
    pub const UNKNOWN_PROTOCOL: &'static str = "unknown";

    /// Fully unknown record
    pub fn unknown() -> Self {
        Self {
            protocol_name: Self::UNKNOWN_PROTOCOL.to_string(),
            action: Action::Unknown,
            protocol_type: ProtocolType::Unknown,
            token: TokenRef::Unknown,
            amount: None,
            token_out: None,
            recipient: None,
            min_amount_out: None,
        }
    }

    pub fn is_protocol_known(&self) -> bool {
        self.protocol_name != Self::UNKNOWN_PROTOCOL
    }

    /// Protocol or action identified
    pub fn is_resolved(&self) -> bool {
        self.is_protocol_known() || self.action != Action::Unknown
    }
}

// ============================================
// PRICES
// ============================================

/// Price source tier in fallback order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSourceTier {
    RouterQuote = 1,
    FeedRegistry = 2,
    RoundFeed = 3,
    PoolReserves = 4,
    HttpApi = 5,
    StaticTable = 6,
}

impl PriceSourceTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RouterQuote => "router_quote",
            Self::FeedRegistry => "feed_registry",
            Self::RoundFeed => "round_feed",
            Self::PoolReserves => "pool_reserves",
            Self::HttpApi => "http_api",
            Self::StaticTable => "static_table",
        }
    }
}

/// USD price of a token symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub symbol: String,
    pub price: f64,
    pub source_tier: PriceSourceTier,
    pub timestamp: DateTime<Utc>,
}

/// Quote for a concrete trade
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwapQuote {
    pub amount_out: U256,
    /// Fraction in [0, 1]
    pub price_impact: f64,
    pub source_tier: PriceSourceTier,
}

// ============================================
// SIMULATION
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimulationStatus {
    Success,
    Failed,
    Unknown,
}

/// Decoded ERC20 transfer observed during simulation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenTransfer {
    pub token: String,
    pub token_address: Address,
    pub from: Address,
    pub to: Address,
    /// Human-readable amount (raw / 10^decimals)
    pub amount: f64,
    pub raw_amount: U256,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationResult {
    pub status: SimulationStatus,
    pub gas_estimate: u64,
    pub token_transfers: Vec<TokenTransfer>,
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl SimulationResult {
    pub fn success(gas_estimate: u64, token_transfers: Vec<TokenTransfer>) -> Self {
        Self {
            status: SimulationStatus::Success,
            gas_estimate,
            token_transfers,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Failed run. An empty error list is replaced with a generic message.
    pub fn failed(gas_estimate: u64, mut errors: Vec<String>) -> Self {
        if errors.is_empty() {
            errors.push("Simulation failed: transaction would revert".to_string());
        }
        Self {
            status: SimulationStatus::Failed,
            gas_estimate,
            token_transfers: Vec::new(),
            errors,
            warnings: Vec::new(),
        }
    }

    /// Outcome could not be determined
    pub fn unknown(mut errors: Vec<String>) -> Self {
        if errors.is_empty() {
            errors.push("Simulation unavailable".to_string());
        }
        Self {
            status: SimulationStatus::Unknown,
            gas_estimate: 0,
            token_transfers: Vec::new(),
            errors,
            warnings: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == SimulationStatus::Success
    }
}

// ============================================
// VERDICT
// ============================================

/// Final accept/reject decision for one transaction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationVerdict {
    pub valid: bool,
    pub risk_assessment: RiskAssessment,
    pub simulation: Option<SimulationResult>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    /// Taxonomy kind of each entry in `errors`, same order
    #[serde(skip)]
    pub error_kinds: Vec<ErrorKind>,
}

impl ValidationVerdict {
    pub fn has_error_kind(&self, kind: ErrorKind) -> bool {
        self.error_kinds.contains(&kind)
    }
}

// ============================================
// INPUTS
// ============================================

/// Unsigned transaction as produced by the protocol-wrapper layer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxRequest {
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default, deserialize_with = "de_u256")]
    pub value: U256,
    #[serde(default = "empty_calldata", alias = "input")]
    pub data: String,
    #[serde(default, deserialize_with = "de_opt_u64")]
    pub gas: Option<u64>,
    #[serde(default, deserialize_with = "de_opt_u256")]
    pub gas_price: Option<U256>,
    #[serde(default, deserialize_with = "de_opt_u256")]
    pub max_fee_per_gas: Option<U256>,
    #[serde(default, deserialize_with = "de_opt_u256")]
    pub max_priority_fee_per_gas: Option<U256>,
    #[serde(default, deserialize_with = "de_opt_u64")]
    pub nonce: Option<u64>,
    #[serde(default, deserialize_with = "de_opt_u64")]
    pub chain_id: Option<u64>,
    #[serde(default, rename = "type", deserialize_with = "de_opt_u64")]
    pub tx_type: Option<u64>,
}

fn empty_calldata() -> String {
    "0x".to_string()
}

/// Parameters extracted by the natural-language layer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeIntent {
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub params: IntentParams,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntentParams {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub token_in: Option<String>,
    #[serde(default)]
    pub token_out: Option<String>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub amount: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub amount_in: Option<f64>,
    /// Slippage tolerance in percent
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub slippage: Option<f64>,
}

/// Open portfolio position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub protocol: String,
    #[serde(default)]
    pub leveraged: bool,
    #[serde(default)]
    pub value_usd: f64,
}

// ============================================
// LENIENT NUMERIC DESERIALIZERS
// ============================================

// Numbers arrive through `serde_json::Value` so integers wider than u64
// keep their exact digits (`arbitrary_precision`).

fn parse_u256(raw: Value) -> Result<U256, String> {
    match raw {
        Value::Null => Ok(U256::ZERO),
        Value::Number(n) => {
            let digits = n.to_string();
            U256::from_str_radix(&digits, 10).map_err(|_| format!("not an unsigned integer: {}", digits))
        }
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return Ok(U256::ZERO);
            }
            U256::from_str(s).map_err(|e| format!("invalid integer '{}': {}", s, e))
        }
        other => Err(format!("expected a number or string, got {}", other)),
    }
}

fn de_u256<'de, D: Deserializer<'de>>(d: D) -> Result<U256, D::Error> {
    let raw = Value::deserialize(d)?;
    parse_u256(raw).map_err(serde::de::Error::custom)
}

fn de_opt_u256<'de, D: Deserializer<'de>>(d: D) -> Result<Option<U256>, D::Error> {
    match Option::<Value>::deserialize(d)? {
        None | Some(Value::Null) => Ok(None),
        Some(raw) => parse_u256(raw).map(Some).map_err(serde::de::Error::custom),
    }
}

fn de_opt_u64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
    let Some(v) = de_opt_u256(d)? else {
        return Ok(None);
    };
    u64::try_from(v)
        .map(Some)
        .map_err(|_| serde::de::Error::custom("value does not fit in u64"))
}

fn de_opt_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().trim_end_matches('%').parse::<f64>().ok(),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_level_ordering() {
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::Medium < RiskLevel::High);
        assert!(RiskLevel::High < RiskLevel::Critical);
        assert!(RiskLevel::High.exceeds(RiskLevel::Medium));
        assert!(!RiskLevel::Medium.exceeds(RiskLevel::Medium));
    }

    #[test]
    fn test_risk_level_parse() {
        assert_eq!("MEDIUM".parse::<RiskLevel>().unwrap(), RiskLevel::Medium);
        assert_eq!(" critical ".parse::<RiskLevel>().unwrap(), RiskLevel::Critical);
        assert!("severe".parse::<RiskLevel>().is_err());
    }

    #[test]
    fn test_score_bands() {
        assert_eq!(RiskLevel::from_score(0.0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(0.29), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(0.3), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(0.75), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(0.9), RiskLevel::Critical);
    }

    #[test]
    fn test_empty_factors_degrade() {
        let a = RiskAssessment::from_factors(vec![], vec![], vec![]);
        assert_eq!(a.level(), RiskLevel::Low);
        assert_eq!(a.overall_risk.score, 0.1);
        assert_eq!(a.warnings, vec![RiskAssessment::DEGRADED_WARNING.to_string()]);
    }

    #[test]
    fn test_factor_score_clamped() {
        let f = RiskFactor::new("x", RiskLevel::High, 1.7, "");
        assert_eq!(f.score, 1.0);
    }

    #[test]
    fn test_tx_request_wrapper_shape() {
        let json = serde_json::json!({
            "from": "0x1111111111111111111111111111111111111111",
            "to": "0x9A7B675619d3633304134155c6c976E9b4c1cfB3",
            "value": "0x56bc75e2d63100000",
            "data": "0x",
            "gas": 250000,
            "maxFeePerGas": "25000000000",
            "chainId": "0xe",
            "type": 2
        });
        let tx: TxRequest = serde_json::from_value(json).unwrap();
        assert_eq!(tx.value, U256::from(100_000_000_000_000_000_000u128));
        assert_eq!(tx.gas, Some(250_000));
        assert_eq!(tx.chain_id, Some(14));
        assert_eq!(tx.max_fee_per_gas, Some(U256::from(25_000_000_000u64)));
        assert_eq!(tx.tx_type, Some(2));
    }

    #[test]
    fn test_tx_request_wide_json_integers() {
        let raw = r#"{
            "from": "0x1111111111111111111111111111111111111111",
            "to": "0x9A7B675619d3633304134155c6c976E9b4c1cfB3",
            "value": 100000000000000000000,
            "gasPrice": 123456789012345678901234567890,
            "gas": 250000,
            "chainId": 14
        }"#;
        let tx: TxRequest = serde_json::from_str(raw).unwrap();
        assert_eq!(tx.value, U256::from(100_000_000_000_000_000_000u128));
        assert_eq!(
            tx.gas_price,
            Some(U256::from(123_456_789_012_345_678_901_234_567_890u128))
        );
        assert_eq!(tx.chain_id, Some(14));

        assert!(serde_json::from_str::<TxRequest>(r#"{"value": -1}"#).is_err());
        assert!(serde_json::from_str::<TxRequest>(r#"{"value": 1.5}"#).is_err());
        assert!(serde_json::from_str::<TxRequest>(r#"{"gas": 100000000000000000000}"#).is_err());
    }

    #[test]
    fn test_token_ref_display() {
        assert_eq!(TokenRef::Unknown.to_string(), "unknown");
        assert_eq!(
            TokenRef::Native.to_string(),
            "0x0000000000000000000000000000000000000000"
        );
    }

    #[test]
    fn test_intent_slippage_lenient() {
        let intent: TradeIntent = serde_json::from_value(serde_json::json!({
            "action": "swap",
            "params": {"token_in": "FLR", "token_out": "USDC", "amount": "100", "slippage": "0.5%"}
        }))
        .unwrap();
        assert_eq!(intent.params.slippage, Some(0.5));
        assert_eq!(intent.params.amount, Some(100.0));
    }
}
