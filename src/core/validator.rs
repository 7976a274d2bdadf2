//! Transaction Validator
//!
//! Orchestrates one gate decision:
//! 1. Dry-run (when requested) in a spawned task
//! 2. Classification and scoring, or the caller's own assessment
//! 3. Threshold check, the only business-rule rejection
//! 4. Structural checks on `from`, `to` and gas
//!
//! `valid` is true exactly when no blocking error was collected. Business
//! outcomes never surface as `Err`; only a failed simulation task does.

use alloy_primitives::{Address, U256};
use std::str::FromStr;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::core::classifier::ProtocolClassifier;
use crate::core::price_oracle::PriceOracle;
use crate::core::risk_score::{RiskContext, RiskScorer};
use crate::core::simulator::Simulator;
use crate::core::tokens::TokenRegistry;
use crate::models::config::GuardConfig;
use crate::models::errors::{AppError, AppResult, ErrorKind};
use crate::models::types::{
    Action, Position, ProtocolCallInfo, RiskAssessment, RiskLevel, SimulationResult, TradeIntent, TxRequest,
    ValidationVerdict,
};
use crate::providers::rpc::{ChainReader, RpcProvider};
use crate::utils::constants::MIN_GAS_LIMIT;
use crate::utils::decoder::CalldataDecoder;

/// Inputs of one validation
#[derive(Debug, Clone)]
pub struct ValidationRequest {
    pub tx: TxRequest,
    /// Precomputed assessment; skips classification and scoring
    pub risk_assessment: Option<RiskAssessment>,
    pub simulate: bool,
    pub intent: Option<TradeIntent>,
    pub portfolio: Option<Vec<Position>>,
    /// Pricing stops at the next tier boundary after this instant
    pub deadline: Option<Instant>,
}

impl ValidationRequest {
    pub fn new(tx: TxRequest) -> Self {
        Self {
            tx,
            risk_assessment: None,
            simulate: true,
            intent: None,
            portfolio: None,
            deadline: None,
        }
    }

    pub fn with_assessment(mut self, assessment: RiskAssessment) -> Self {
        self.risk_assessment = Some(assessment);
        self
    }

    pub fn without_simulation(mut self) -> Self {
        self.simulate = false;
        self
    }

    pub fn with_intent(mut self, intent: TradeIntent) -> Self {
        self.intent = Some(intent);
        self
    }

    pub fn with_portfolio(mut self, positions: Vec<Position>) -> Self {
        self.portfolio = Some(positions);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// Blocking errors with their taxonomy kind, kept in step
#[derive(Debug, Default)]
struct ErrorLog {
    messages: Vec<String>,
    kinds: Vec<ErrorKind>,
}

impl ErrorLog {
    fn push(&mut self, kind: ErrorKind, message: impl Into<String>) {
        self.messages.push(message.into());
        self.kinds.push(kind);
    }

    fn push_error(&mut self, err: &AppError) {
        self.push(err.kind(), err.message.clone());
    }
}

pub struct TransactionValidator {
    classifier: ProtocolClassifier,
    scorer: RiskScorer,
    registry: TokenRegistry,
    simulator: Arc<Simulator>,
    oracle: Option<Arc<PriceOracle>>,
    threshold: RiskLevel,
}

impl TransactionValidator {
    pub fn new(chain_id: u64, simulator: Arc<Simulator>, threshold: RiskLevel) -> Self {
        Self {
            classifier: ProtocolClassifier::new(),
            scorer: RiskScorer::new(),
            registry: TokenRegistry::for_chain(chain_id),
            simulator,
            oracle: None,
            threshold,
        }
    }

    /// Price context (USD value, swap impact) from this oracle
    pub fn with_oracle(mut self, oracle: Arc<PriceOracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    /// Full pipeline over JSON-RPC for the configured network
    pub fn from_config(config: &GuardConfig) -> AppResult<Self> {
        let reader: Arc<dyn ChainReader> = Arc::new(RpcProvider::new(config)?);
        Self::from_reader(config, reader)
    }

    pub fn from_reader(config: &GuardConfig, reader: Arc<dyn ChainReader>) -> AppResult<Self> {
        let simulator = Arc::new(Simulator::from_config(config, reader.clone()));
        let oracle = Arc::new(PriceOracle::from_config(config, reader)?);
        info!(
            "🛡️ Validator ready: network={} threshold={} simulation={:?}",
            config.network.name(),
            config.risk_threshold,
            simulator.strategy_names()
        );
        Ok(Self::new(config.chain_id(), simulator, config.risk_threshold).with_oracle(oracle))
    }

    pub fn threshold(&self) -> RiskLevel {
        self.threshold
    }

    pub fn oracle(&self) -> Option<&Arc<PriceOracle>> {
        self.oracle.as_ref()
    }

    /// Validate with an optional precomputed assessment
    pub async fn validate(
        &self,
        tx: &TxRequest,
        risk_assessment: Option<RiskAssessment>,
        simulate: bool,
    ) -> AppResult<ValidationVerdict> {
        let mut request = ValidationRequest::new(tx.clone());
        request.risk_assessment = risk_assessment;
        request.simulate = simulate;
        self.validate_with(request).await
    }

    pub async fn validate_with(&self, request: ValidationRequest) -> AppResult<ValidationVerdict> {
        let validation_id = Uuid::new_v4();
        let span = info_span!("validation", %validation_id);
        self.run(request).instrument(span).await
    }

    async fn run(&self, request: ValidationRequest) -> AppResult<ValidationVerdict> {
        let tx = self.with_defaults(&request.tx);
        let mut warnings = Vec::new();
        let mut errors = ErrorLog::default();

        // 1. Simulation runs alongside scoring
        let simulation_task = if request.simulate {
            let simulator = self.simulator.clone();
            let sim_tx = tx.clone();
            Some(tokio::spawn(async move { simulator.simulate(&sim_tx).await }))
        } else {
            None
        };

        // 2. Assessment
        let assessment = match request.risk_assessment {
            Some(provided) => provided,
            None => {
                self.assess(&tx, request.intent.as_ref(), request.portfolio, request.deadline, &mut warnings)
                    .await
            }
        };

        let simulation: Option<SimulationResult> = match simulation_task {
            Some(handle) => Some(
                handle
                    .await
                    .map_err(|e| AppError::internal(format!("Simulation task failed: {}", e)))?,
            ),
            None => None,
        };
        if let Some(sim) = &simulation {
            if !sim.is_success() {
                for e in &sim.errors {
                    errors.push(ErrorKind::SimulationFailed, e.clone());
                }
            }
            warnings.extend(sim.warnings.iter().cloned());
        }

        // 3. Threshold
        let level = assessment.level();
        if level.exceeds(self.threshold) {
            errors.push_error(&AppError::risk_threshold_exceeded(level, self.threshold));
        }
        warnings.extend(assessment.warnings.iter().cloned());

        // 4. Structural checks
        for err in Self::check_parameters(&tx) {
            errors.push_error(&err);
        }

        let verdict = ValidationVerdict {
            valid: errors.messages.is_empty(),
            risk_assessment: assessment,
            simulation,
            warnings,
            errors: errors.messages,
            error_kinds: errors.kinds,
        };

        if verdict.valid {
            info!("✅ Transaction accepted (risk {} {})", level.emoji(), level);
        } else {
            info!(
                "🚫 Transaction rejected (risk {} {}): {}",
                level.emoji(),
                level,
                verdict.errors.join("; ")
            );
        }
        Ok(verdict)
    }

    /// Classify and score. Unresolved calls get the fixed unknown-protocol
    /// assessment.
    async fn assess(
        &self,
        tx: &TxRequest,
        intent: Option<&TradeIntent>,
        portfolio: Option<Vec<Position>>,
        deadline: Option<Instant>,
        warnings: &mut Vec<String>,
    ) -> RiskAssessment {
        let info = self.classifier.classify_tx(tx);
        if !info.is_resolved() {
            warn!("❓ Could not identify protocol or action for {}", tx.to.as_deref().unwrap_or("<none>"));
            return RiskAssessment::unknown_protocol();
        }

        let mut ctx = RiskContext::new();
        if let Some(intent) = intent {
            warnings.extend(self.intent_warnings(intent));
            if let Some(slippage) = intent.params.slippage {
                ctx = ctx.with_slippage_tolerance(slippage);
            }
        }
        if let Some(positions) = portfolio {
            ctx = ctx.with_portfolio(positions);
        }
        if let Some(oracle) = &self.oracle {
            ctx = self.price_context(oracle, &info, tx, ctx, deadline).await;
        }

        self.scorer.assess_transaction(&info, tx, &ctx)
    }

    /// USD value of the attached native value and of the operative amount
    /// and, for swaps, the price impact
    async fn price_context(
        &self,
        oracle: &PriceOracle,
        info: &ProtocolCallInfo,
        tx: &TxRequest,
        mut ctx: RiskContext,
        deadline: Option<Instant>,
    ) -> RiskContext {
        if !tx.value.is_zero() {
            if let Some(native) = oracle.registry().native() {
                match oracle.usd_value(native, tx.value, deadline).await {
                    Ok(usd) => ctx = ctx.with_native_usd_value(usd),
                    Err(e) => debug!("💸 Native value unpriced, sizing in {}: {}", native.symbol, e),
                }
            }
        }

        let Some(amount) = info.amount else {
            return ctx;
        };
        let Ok(token) = oracle.registry().resolve_ref(&info.token) else {
            return ctx;
        };

        match oracle.usd_value(&token, amount, deadline).await {
            Ok(usd) => ctx = ctx.with_usd_value(usd),
            Err(e) => {
                debug!("💸 USD value unavailable for {}: {}", token.symbol, e);
                ctx = ctx.with_price_unavailable();
            }
        }

        if info.action != Action::Swap {
            return ctx;
        }
        let Some(out_address) = info.token_out else {
            return ctx;
        };
        let token_out = oracle.registry().resolve_address(out_address);
        match oracle.quote_swap_tokens(&token, &token_out, amount, deadline).await {
            Ok(quote) => {
                ctx = ctx.with_price_impact(quote.price_impact);
                let min_out = info.min_amount_out.unwrap_or(U256::ZERO);
                if ctx.slippage_tolerance_pct.is_none() && !min_out.is_zero() {
                    let implied = CalldataDecoder::implied_slippage_pct(quote.amount_out, min_out);
                    ctx = ctx.with_slippage_tolerance(implied);
                }
            }
            Err(e) => debug!("📉 No swap quote for {}→{}: {}", token.symbol, token_out.symbol, e),
        }
        ctx
    }

    /// Intent token strings that match no registry symbol or address
    fn intent_warnings(&self, intent: &TradeIntent) -> Vec<String> {
        let p = &intent.params;
        [&p.token, &p.token_in, &p.token_out]
            .into_iter()
            .flatten()
            .filter(|t| self.registry.resolve(t).is_err())
            .map(|t| format!("Unrecognized token in request: {}", t))
            .collect()
    }

    /// Caller-invisible copy with required defaults filled
    fn with_defaults(&self, tx: &TxRequest) -> TxRequest {
        let mut prepared = tx.clone();
        if prepared.data.trim().is_empty() {
            prepared.data = "0x".to_string();
        }
        if prepared.chain_id.is_none() {
            prepared.chain_id = Some(self.registry.chain_id());
        }
        prepared
    }

    /// Presence and shape of `from`/`to`, gas floor
    pub fn check_parameters(tx: &TxRequest) -> Vec<AppError> {
        let mut errors = Vec::new();
        match tx.from.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            None => errors.push(AppError::missing_from()),
            Some(s) if Address::from_str(s).is_err() => errors.push(AppError::invalid_address("from")),
            Some(_) => {}
        }
        match tx.to.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            None => errors.push(AppError::missing_to()),
            Some(s) if Address::from_str(s).is_err() => errors.push(AppError::invalid_address("to")),
            Some(_) => {}
        }
        if matches!(tx.gas, Some(gas) if gas < MIN_GAS_LIMIT) {
            errors.push(AppError::gas_too_low());
        }
        errors
    }
}

impl std::fmt::Debug for TransactionValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionValidator")
            .field("chain_id", &self.registry.chain_id())
            .field("threshold", &self.threshold)
            .field("simulator", &self.simulator)
            .field("oracle", &self.oracle)
            .finish()
    }
}
