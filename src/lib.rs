//! Tx Risk Gate Library
//!
//! Pre-signing risk gate for Flare network transactions:
//! - Protocol/action classification from destination and call data
//! - Tiered USD price discovery with a TTL cache
//! - Explainable heuristic risk scoring
//! - Dry-run simulation and threshold validation

pub mod core;
pub mod models;
pub mod providers;
pub mod utils;

pub use crate::core::{
    PriceOracle, PriceSource, ProtocolClassifier, RiskContext, RiskScorer, SimulationStrategy, Simulator,
    TokenInfo, TokenRegistry, TransactionValidator, ValidationRequest,
};
pub use models::{
    AppError, AppResult, ErrorCode, ErrorKind, GuardConfig, Network, ProtocolCallInfo, RiskAssessment, RiskLevel,
    SimulationResult, TradeIntent, TxRequest, ValidationVerdict,
};
pub use providers::{CallRequest, ChainReader, RpcProvider};
pub use utils::PriceCache;
