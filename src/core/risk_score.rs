//! Risk Scoring Module
//!
//! Turns classifier output plus optional price and portfolio context into
//! an explainable [`RiskAssessment`]. Each sub-assessment contributes its
//! own factors, warnings and recommendations; they are concatenated in
//! order and the overall level is the banded mean of all factor scores.
//!
//! Factor catalog:
//! - `protocol_safety`: audited protocol vs unknown destination
//! - `slippage_risk`: swaps only, worst of tolerance and price impact
//! - `transaction_size`: larger of the operand's USD value and the attached
//!   native value against fixed bands; MEDIUM when the operand cannot be priced
//! - `protocol_concentration`, `leverage_exposure`: portfolio context only

use std::collections::HashSet;
use tracing::debug;

use crate::models::types::{
    Action, OverallRisk, Position, ProtocolCallInfo, ProtocolType, RiskAssessment, RiskFactor, RiskLevel, TokenRef,
    TxRequest,
};
use crate::utils::constants::{
    is_known_protocol, to_units, LARGE_VALUE_HIGH, LARGE_VALUE_MEDIUM, SLIPPAGE_HIGH_MAX_PCT, SLIPPAGE_LOW_MAX_PCT,
    SLIPPAGE_MEDIUM_MAX_PCT,
};

/// Native currency decimals on every supported network
const NATIVE_DECIMALS: u8 = 18;

/// Optional inputs gathered before scoring
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RiskContext {
    /// Computed price impact as a fraction in [0, 1]
    pub price_impact: Option<f64>,
    /// Requested slippage tolerance in percent
    pub slippage_tolerance_pct: Option<f64>,
    /// USD value of the operative amount
    pub usd_value: Option<f64>,
    /// USD value of the native `value` attached to the call
    pub native_usd_value: Option<f64>,
    /// Every price tier failed for the operative token
    pub price_unavailable: bool,
    pub portfolio: Option<Vec<Position>>,
}

impl RiskContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price_impact(mut self, impact: f64) -> Self {
        self.price_impact = Some(impact.clamp(0.0, 1.0));
        self
    }

    pub fn with_slippage_tolerance(mut self, pct: f64) -> Self {
        self.slippage_tolerance_pct = Some(pct.max(0.0));
        self
    }

    pub fn with_usd_value(mut self, usd: f64) -> Self {
        self.usd_value = Some(usd);
        self
    }

    pub fn with_native_usd_value(mut self, usd: f64) -> Self {
        self.native_usd_value = Some(usd);
        self
    }

    pub fn with_price_unavailable(mut self) -> Self {
        self.price_unavailable = true;
        self
    }

    pub fn with_portfolio(mut self, positions: Vec<Position>) -> Self {
        self.portfolio = Some(positions);
        self
    }
}

/// Factors, warnings and recommendations of one sub-assessment
#[derive(Debug, Default)]
struct Findings {
    factors: Vec<RiskFactor>,
    warnings: Vec<String>,
    recommendations: Vec<String>,
}

impl Findings {
    fn factor(&mut self, factor: RiskFactor) {
        self.factors.push(factor);
    }

    fn warn(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    fn recommend(&mut self, msg: impl Into<String>) {
        self.recommendations.push(msg.into());
    }

    /// Append another sub-assessment without deduplication
    fn absorb(&mut self, other: Findings) {
        self.factors.extend(other.factors);
        self.warnings.extend(other.warnings);
        self.recommendations.extend(other.recommendations);
    }

    fn into_assessment(self) -> RiskAssessment {
        RiskAssessment::from_factors(self.factors, self.warnings, self.recommendations)
    }
}

/// Stateless heuristic scorer
#[derive(Debug, Clone, Default)]
pub struct RiskScorer;

impl RiskScorer {
    pub fn new() -> Self {
        Self
    }

    /// Full assessment of one classified transaction
    pub fn assess_transaction(&self, info: &ProtocolCallInfo, tx: &TxRequest, ctx: &RiskContext) -> RiskAssessment {
        let mut findings = Findings::default();

        findings.absorb(Self::protocol_usage(info, ctx));
        findings.absorb(Self::transaction_parameters(info, tx, ctx));
        if let Some(positions) = ctx.portfolio.as_deref() {
            findings.absorb(Self::portfolio_findings(positions));
        }

        let assessment = findings.into_assessment();
        debug!(
            "{} Risk {} ({:.3}) for {} on {}",
            assessment.level().emoji(),
            assessment.level(),
            assessment.overall_risk.score,
            info.action,
            info.protocol_name
        );
        assessment
    }

    /// Single `protocol_safety` factor for a protocol name
    pub fn assess_protocol(&self, name: &str) -> RiskAssessment {
        let mut findings = Findings::default();
        if is_known_protocol(name) {
            findings.factor(Self::audited_factor());
        } else {
            findings.factor(RiskFactor::new(
                "protocol_safety",
                RiskLevel::Medium,
                0.5,
                "Protocol is not in the audited set",
            ));
            findings.warn(format!("Protocol '{}' is not recognized", name));
            findings.recommend("Verify the protocol before interacting with it");
        }
        findings.into_assessment()
    }

    /// Concentration and leverage of open positions
    pub fn assess_portfolio(&self, positions: &[Position]) -> RiskAssessment {
        let mut findings = Self::portfolio_findings(positions);
        let overall = OverallRisk::from_factors(&findings.factors);
        match overall.level {
            RiskLevel::High | RiskLevel::Critical => {
                findings.recommend("Consider reducing exposure to high-risk positions");
                findings.recommend("Diversify across more protocols to reduce concentration risk");
            }
            RiskLevel::Medium => {
                findings.recommend("Monitor leveraged positions closely");
                findings.recommend("Consider adding more diversification to your portfolio");
            }
            RiskLevel::Low => {}
        }
        findings.into_assessment()
    }

    // ============================================
    // SUB-ASSESSMENTS
    // ============================================

    fn audited_factor() -> RiskFactor {
        RiskFactor::new(
            "protocol_safety",
            RiskLevel::Low,
            0.2,
            "Protocol has been audited and is considered safe",
        )
    }

    fn protocol_usage(info: &ProtocolCallInfo, ctx: &RiskContext) -> Findings {
        let mut findings = Findings::default();

        if info.is_protocol_known() && is_known_protocol(&info.protocol_name) {
            findings.factor(Self::audited_factor());
        } else {
            match info.protocol_type {
                ProtocolType::Dex | ProtocolType::Lending | ProtocolType::Staking => {
                    findings.factor(RiskFactor::new(
                        "protocol_safety",
                        RiskLevel::High,
                        0.7,
                        format!("Unknown {} contract performing {}", info.protocol_type.as_str(), info.action),
                    ));
                    findings.warn("Transaction to unknown protocol or contract");
                    findings.recommend("Verify the destination contract before proceeding");
                }
                ProtocolType::Token | ProtocolType::Unknown => {
                    findings.factor(RiskFactor::new(
                        "protocol_safety",
                        RiskLevel::Medium,
                        0.5,
                        "Unverified token contract",
                    ));
                    findings.warn("Interacting with an unverified contract");
                }
            }
        }

        if info.action == Action::Swap {
            findings.absorb(Self::slippage(ctx));
        }
        findings
    }

    fn slippage(ctx: &RiskContext) -> Findings {
        let mut findings = Findings::default();
        let impact_pct = ctx.price_impact.map(|i| i * 100.0);
        let worst = match (ctx.slippage_tolerance_pct, impact_pct) {
            (Some(t), Some(i)) => Some(t.max(i)),
            (t, i) => t.or(i),
        };

        let Some(pct) = worst else {
            if ctx.price_unavailable {
                findings.factor(RiskFactor::new(
                    "slippage_risk",
                    RiskLevel::High,
                    0.7,
                    "Price impact cannot be bounded without price data",
                ));
                findings.recommend("Set an explicit slippage tolerance");
            } else {
                findings.factor(RiskFactor::new(
                    "slippage_risk",
                    RiskLevel::Medium,
                    0.5,
                    "Potential price impact on swap",
                ));
            }
            return findings;
        };

        let (level, score) = if pct <= SLIPPAGE_LOW_MAX_PCT {
            (RiskLevel::Low, 0.2)
        } else if pct <= SLIPPAGE_MEDIUM_MAX_PCT {
            (RiskLevel::Medium, 0.4)
        } else if pct <= SLIPPAGE_HIGH_MAX_PCT {
            (RiskLevel::High, 0.7)
        } else {
            (RiskLevel::Critical, 0.95)
        };
        findings.factor(RiskFactor::new(
            "slippage_risk",
            level,
            score,
            format!("Expected slippage up to {:.2}%", pct),
        ));
        if level >= RiskLevel::High {
            findings.warn(format!("High slippage: {:.2}%", pct));
            findings.recommend("Reduce trade size or tighten slippage tolerance");
        }
        findings
    }

    fn transaction_parameters(info: &ProtocolCallInfo, tx: &TxRequest, ctx: &RiskContext) -> Findings {
        let mut findings = Findings::default();

        if info.action != Action::Unknown && info.token == TokenRef::Unknown {
            findings.warn(format!("Could not determine the token for this {}", info.action));
        }
        if ctx.price_unavailable {
            findings.warn("Price data unavailable; USD value not assessed");
        }

        let native = match ctx.native_usd_value {
            Some(usd) => (usd, "USD"),
            None => (to_units(tx.value, NATIVE_DECIMALS), "native"),
        };
        let (size, unit) = match ctx.usd_value {
            Some(usd) if usd > native.0 => (usd, "USD"),
            _ => native,
        };
        if size > LARGE_VALUE_HIGH {
            findings.factor(RiskFactor::new(
                "transaction_size",
                RiskLevel::High,
                0.8,
                "Large transaction value",
            ));
            findings.warn(format!("Large transaction: {:.2} {}", size, unit));
            findings.recommend("Consider splitting into smaller transactions");
        } else if size > LARGE_VALUE_MEDIUM {
            findings.factor(RiskFactor::new(
                "transaction_size",
                RiskLevel::Medium,
                0.5,
                "Moderate transaction value",
            ));
        } else if ctx.price_unavailable {
            findings.factor(RiskFactor::new(
                "transaction_size",
                RiskLevel::Medium,
                0.5,
                "Value of the moved token could not be determined",
            ));
            findings.recommend("Confirm the token amount and its value before signing");
        }
        findings
    }

    fn portfolio_findings(positions: &[Position]) -> Findings {
        let mut findings = Findings::default();
        if positions.is_empty() {
            return findings;
        }

        let protocols: HashSet<String> = positions.iter().map(|p| p.protocol.to_ascii_lowercase()).collect();
        match protocols.len() {
            1 => {
                findings.factor(RiskFactor::new(
                    "protocol_concentration",
                    RiskLevel::High,
                    0.8,
                    "All positions are in a single protocol",
                ));
                findings.warn("Portfolio is concentrated in one protocol");
            }
            2 => findings.factor(RiskFactor::new(
                "protocol_concentration",
                RiskLevel::Medium,
                0.5,
                "Positions are concentrated in few protocols",
            )),
            _ => findings.factor(RiskFactor::new(
                "protocol_concentration",
                RiskLevel::Low,
                0.2,
                "Positions are well diversified across protocols",
            )),
        }

        let leveraged = positions.iter().filter(|p| p.leveraged).count();
        if leveraged > 0 {
            let ratio = leveraged as f64 / positions.len() as f64;
            let factor = if ratio > 0.5 {
                findings.warn(format!("{:.0}% of positions are leveraged", ratio * 100.0));
                RiskFactor::new("leverage_exposure", RiskLevel::High, 0.9, "High exposure to leveraged positions")
            } else if ratio > 0.2 {
                RiskFactor::new(
                    "leverage_exposure",
                    RiskLevel::Medium,
                    0.6,
                    "Moderate exposure to leveraged positions",
                )
            } else {
                RiskFactor::new("leverage_exposure", RiskLevel::Low, 0.3, "Low exposure to leveraged positions")
            };
            findings.factor(factor);
        }
        findings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, U256};

    fn swap_info(protocol: &str) -> ProtocolCallInfo {
        ProtocolCallInfo {
            protocol_name: protocol.to_string(),
            action: Action::Swap,
            protocol_type: ProtocolType::Dex,
            token: TokenRef::Native,
            amount: Some(U256::from(100u64)),
            token_out: Some(Address::repeat_byte(0x01)),
            recipient: None,
            min_amount_out: None,
        }
    }

    fn flr(amount: u64) -> U256 {
        U256::from(amount) * U256::from(10u64).pow(U256::from(18u64))
    }

    fn position(protocol: &str, leveraged: bool) -> Position {
        Position { protocol: protocol.to_string(), leveraged, value_usd: 100.0 }
    }

    #[test]
    fn test_known_swap_low_slippage_is_low() {
        let tx = TxRequest { value: flr(100), ..Default::default() };
        let ctx = RiskContext::new().with_slippage_tolerance(0.5);
        let a = RiskScorer::new().assess_transaction(&swap_info("sparkdex"), &tx, &ctx);
        assert_eq!(a.level(), RiskLevel::Low);
        assert_eq!(a.factors.len(), 2);
        assert!((a.overall_risk.score - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_swap_without_data_is_medium_slippage() {
        let a = RiskScorer::new().assess_transaction(&swap_info("sparkdex"), &TxRequest::default(), &RiskContext::new());
        let slip = a.factors.iter().find(|f| f.name == "slippage_risk").unwrap();
        assert_eq!(slip.level, RiskLevel::Medium);
        assert_eq!(slip.description, "Potential price impact on swap");
    }

    #[test]
    fn test_price_unavailable_raises_slippage() {
        let ctx = RiskContext::new().with_price_unavailable();
        let a = RiskScorer::new().assess_transaction(&swap_info("sparkdex"), &TxRequest::default(), &ctx);
        let slip = a.factors.iter().find(|f| f.name == "slippage_risk").unwrap();
        assert_eq!(slip.level, RiskLevel::High);
        assert!(a.warnings.iter().any(|w| w.contains("Price data unavailable")));
    }

    #[test]
    fn test_impact_dominates_tolerance() {
        let ctx = RiskContext::new().with_slippage_tolerance(0.5).with_price_impact(0.12);
        let a = RiskScorer::new().assess_transaction(&swap_info("sparkdex"), &TxRequest::default(), &ctx);
        let slip = a.factors.iter().find(|f| f.name == "slippage_risk").unwrap();
        assert_eq!(slip.level, RiskLevel::Critical);
    }

    #[test]
    fn test_outsized_native_value() {
        let tx = TxRequest { value: flr(10_000_000), ..Default::default() };
        let a = RiskScorer::new().assess_transaction(&swap_info("unknown"), &tx, &RiskContext::new());
        let size = a.factors.iter().find(|f| f.name == "transaction_size").unwrap();
        assert_eq!(size.level, RiskLevel::High);
        // 0.7 + 0.5 + 0.8
        assert_eq!(a.level(), RiskLevel::High);
    }

    #[test]
    fn test_native_value_sized_when_operand_is_small() {
        let tx = TxRequest { value: flr(10_000_000), ..Default::default() };
        let ctx = RiskContext::new().with_usd_value(125.0).with_slippage_tolerance(0.1);
        let a = RiskScorer::new().assess_transaction(&swap_info("sparkdex"), &tx, &ctx);
        let size = a.factors.iter().find(|f| f.name == "transaction_size").unwrap();
        assert_eq!(size.level, RiskLevel::High);
        assert!(a.warnings.iter().any(|w| w.ends_with("native")));

        let priced = RiskContext::new()
            .with_usd_value(125.0)
            .with_native_usd_value(12_500_000.0)
            .with_slippage_tolerance(0.1);
        let a = RiskScorer::new().assess_transaction(&swap_info("sparkdex"), &tx, &priced);
        assert!(a.warnings.iter().any(|w| w == "Large transaction: 12500000.00 USD"));
    }

    #[test]
    fn test_operand_value_sized_when_larger() {
        let tx = TxRequest { value: flr(10), ..Default::default() };
        let ctx = RiskContext::new().with_usd_value(500_000.0).with_slippage_tolerance(0.1);
        let a = RiskScorer::new().assess_transaction(&swap_info("sparkdex"), &tx, &ctx);
        let size = a.factors.iter().find(|f| f.name == "transaction_size").unwrap();
        assert_eq!(size.level, RiskLevel::Medium);
    }

    #[test]
    fn test_unpriced_operand_is_medium_size() {
        let info = ProtocolCallInfo {
            protocol_name: "kinetic".to_string(),
            action: Action::Deposit,
            protocol_type: ProtocolType::Lending,
            token: TokenRef::Contract(Address::repeat_byte(0x77)),
            amount: Some(U256::MAX),
            token_out: None,
            recipient: None,
            min_amount_out: None,
        };
        let ctx = RiskContext::new().with_price_unavailable();
        let a = RiskScorer::new().assess_transaction(&info, &TxRequest::default(), &ctx);
        let size = a.factors.iter().find(|f| f.name == "transaction_size").unwrap();
        assert_eq!(size.level, RiskLevel::Medium);
        assert_eq!(size.score, 0.5);
        // (0.2 + 0.5) / 2
        assert_eq!(a.level(), RiskLevel::Medium);
        assert!(RiskLevel::Medium.exceeds(RiskLevel::Low));
    }

    #[test]
    fn test_unresolved_token_only_warns() {
        let mut info = swap_info("sparkdex");
        info.token = TokenRef::Unknown;
        let a = RiskScorer::new().assess_transaction(&info, &TxRequest::default(), &RiskContext::new().with_slippage_tolerance(0.2));
        assert_eq!(a.level(), RiskLevel::Low);
        assert!(a.warnings.iter().any(|w| w.contains("Could not determine the token")));
    }

    #[test]
    fn test_portfolio_bands() {
        let scorer = RiskScorer::new();
        let single = scorer.assess_portfolio(&[position("kinetic", true), position("Kinetic", true)]);
        assert_eq!(single.factors[0].level, RiskLevel::High);
        assert_eq!(single.factors[1].score, 0.9);
        assert_eq!(single.level(), RiskLevel::High);
        assert_eq!(single.recommendations.len(), 2);

        let spread = scorer.assess_portfolio(&[
            position("kinetic", false),
            position("sparkdex", false),
            position("cyclo", false),
        ]);
        assert_eq!(spread.factors.len(), 1);
        assert_eq!(spread.level(), RiskLevel::Low);

        let empty = scorer.assess_portfolio(&[]);
        assert_eq!(empty.overall_risk.score, 0.1);
    }

    #[test]
    fn test_portfolio_context_concatenates() {
        let ctx = RiskContext::new()
            .with_slippage_tolerance(0.5)
            .with_portfolio(vec![position("sparkdex", false)]);
        let a = RiskScorer::new().assess_transaction(&swap_info("sparkdex"), &TxRequest::default(), &ctx);
        let names: Vec<&str> = a.factors.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["protocol_safety", "slippage_risk", "protocol_concentration"]);
    }

    #[test]
    fn test_assess_protocol() {
        let scorer = RiskScorer::new();
        assert_eq!(scorer.assess_protocol("raindex").level(), RiskLevel::Low);
        let unknown = scorer.assess_protocol("shadyswap");
        assert_eq!(unknown.level(), RiskLevel::Medium);
        assert_eq!(unknown.warnings.len(), 1);
    }

    #[test]
    fn test_deterministic() {
        let ctx = RiskContext::new().with_price_impact(0.02);
        let scorer = RiskScorer::new();
        let a = scorer.assess_transaction(&swap_info("sparkdex"), &TxRequest::default(), &ctx);
        let b = scorer.assess_transaction(&swap_info("sparkdex"), &TxRequest::default(), &ctx);
        assert_eq!(a, b);
    }
}
