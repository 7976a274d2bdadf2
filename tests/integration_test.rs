//! Integration tests for the risk gate pipeline

mod common;

use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;
use chrono::Duration as ChronoDuration;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use common::*;
use tx_risk_gate::core::price_sources::{FeedRegistrySource, PoolReservesSource, RouterQuoteSource, StaticTableSource};
use tx_risk_gate::models::types::{
    Action, IntentParams, PriceSourceTier, ProtocolCallInfo, RiskLevel, SimulationStatus,
};
use tx_risk_gate::utils::clock::ManualClock;
use tx_risk_gate::utils::constants::{get_ftso_registry, CHAIN_ID_FLARE, DEFAULT_POOL_FEE_BPS};
use tx_risk_gate::utils::decoder::SELECTOR_REGISTRY;
use tx_risk_gate::{
    ErrorKind, GuardConfig, Network, PriceCache, PriceOracle, PriceSource, ProtocolClassifier, RiskAssessment,
    SimulationResult, Simulator, TokenRegistry, TradeIntent, TransactionValidator, TxRequest, ValidationRequest,
};

const ALL_LEVELS: [RiskLevel; 4] = [RiskLevel::Low, RiskLevel::Medium, RiskLevel::High, RiskLevel::Critical];

fn static_oracle() -> Arc<PriceOracle> {
    Arc::new(PriceOracle::new(TokenRegistry::for_chain(CHAIN_ID_FLARE), PriceCache::new()).with_source(StaticTableSource))
}

fn validator_with(sim: SimulationResult, threshold: RiskLevel) -> TransactionValidator {
    let simulator = Simulator::new(Duration::from_secs(2)).with_strategy(FixedSimulation(sim));
    TransactionValidator::new(CHAIN_ID_FLARE, Arc::new(simulator), threshold).with_oracle(static_oracle())
}

fn swap_intent(slippage: f64) -> TradeIntent {
    TradeIntent {
        action: "swap".into(),
        protocol: Some("sparkdex".into()),
        params: IntentParams {
            token_in: Some("FLR".into()),
            token_out: Some("USDC".into()),
            amount: Some(100.0),
            slippage: Some(slippage),
            ..Default::default()
        },
    }
}

fn sparkdex_swap_tx() -> TxRequest {
    TxRequest {
        from: Some(SENDER.into()),
        to: Some(SPARKDEX_ROUTER.into()),
        data: swap_calldata(ether(100), addr(WFLR), addr(USDC)),
        gas: Some(250_000),
        ..Default::default()
    }
}

#[test]
fn test_threshold_order_is_total() {
    for (i, a) in ALL_LEVELS.iter().enumerate() {
        for (j, b) in ALL_LEVELS.iter().enumerate() {
            assert_eq!(a.exceeds(*b), i > j, "{} vs {}", a, b);
            // antisymmetric
            assert!(!(a.exceeds(*b) && b.exceeds(*a)));
            for c in ALL_LEVELS.iter() {
                if a.exceeds(*b) && b.exceeds(*c) {
                    assert!(a.exceeds(*c));
                }
            }
        }
    }
}

#[test]
fn test_empty_factors_always_degraded_default() {
    for _ in 0..3 {
        let a = RiskAssessment::from_factors(vec![], vec![], vec![]);
        assert_eq!(a.level(), RiskLevel::Low);
        assert_eq!(a.overall_risk.score, 0.1);
        assert_eq!(a.warnings.len(), 1);
    }
}

#[test]
fn test_every_registered_selector_yields_its_action() {
    let classifier = ProtocolClassifier::new();
    for entry in SELECTOR_REGISTRY.iter() {
        let data = hex_data(entry.selector.to_vec());
        let info = classifier.classify(Some(UNKNOWN_ROUTER), &data, U256::ZERO);
        assert_eq!(info.action, entry.action, "selector {}", entry.selector);
        assert_eq!(info.protocol_name, "unknown");
        assert_ne!(info.action, Action::Unknown);
    }
}

#[test]
fn test_malformed_input_never_panics() {
    let classifier = ProtocolClassifier::new();
    for data in ["", "0x", "0x1", "zz", "0x38ed17", "0x38ed1739zz", "0xa9059cbb0000"] {
        let info = classifier.classify(Some("not-an-address"), data, U256::ZERO);
        assert_eq!(info.protocol_name, "unknown");
    }
    assert_eq!(classifier.classify(None, "0xZZ", U256::ZERO), ProtocolCallInfo::unknown());
}

#[tokio::test]
async fn test_reserves_price_when_router_and_feed_fail() {
    let chain = Arc::new(FakeChain::new(CHAIN_ID_FLARE));
    let pair = addr("0x7777777777777777777777777777777777777777");
    // 1,000 WFLR against 1,250 USDC
    chain.script_pair(
        addr(SPARKDEX_FACTORY),
        pair,
        addr(WFLR),
        1_000_000_000_000_000_000_000,
        1_250_000_000,
    );

    let registry = TokenRegistry::for_chain(CHAIN_ID_FLARE);
    let ftso = get_ftso_registry(CHAIN_ID_FLARE).unwrap();
    let oracle = PriceOracle::new(registry.clone(), PriceCache::new())
        .with_source(RouterQuoteSource::new(chain.clone(), addr(SPARKDEX_ROUTER), registry.clone()))
        .with_source(FeedRegistrySource::new(chain.clone(), ftso))
        .with_source(PoolReservesSource::new(
            chain.clone(),
            addr(SPARKDEX_FACTORY),
            registry.clone(),
            DEFAULT_POOL_FEE_BPS,
        ));

    let quote = oracle.get_price("FLR").await.unwrap();
    assert_eq!(quote.source_tier, PriceSourceTier::PoolReserves);
    assert!((quote.price - 1.25).abs() < 1e-9);
    assert_eq!(oracle.cache().get("FLR").unwrap().price, quote.price);

    // served from cache, no further chain reads
    let calls = chain.call_count();
    let again = oracle.get_price("WFLR").await.unwrap();
    assert_eq!(again.price, quote.price);
    assert_eq!(chain.call_count(), calls);
}

#[tokio::test]
async fn test_reserves_swap_quote_reports_impact() {
    let chain = Arc::new(FakeChain::new(CHAIN_ID_FLARE));
    let pair = addr("0x7777777777777777777777777777777777777777");
    chain.script_pair(
        addr(SPARKDEX_FACTORY),
        pair,
        addr(WFLR),
        1_000_000_000_000_000_000_000,
        1_250_000_000,
    );
    let registry = TokenRegistry::for_chain(CHAIN_ID_FLARE);
    let oracle = PriceOracle::new(registry.clone(), PriceCache::new()).with_source(PoolReservesSource::new(
        chain.clone(),
        addr(SPARKDEX_FACTORY),
        registry,
        DEFAULT_POOL_FEE_BPS,
    ));

    let quote = oracle.quote_swap("WFLR", "USDC", ether(100)).await.unwrap();
    assert_eq!(quote.source_tier, PriceSourceTier::PoolReserves);
    // 10% of the pool plus the 0.3% fee
    assert!(quote.price_impact > 0.09 && quote.price_impact < 0.10);
    assert!(quote.amount_out < U256::from(125_000_000u64));
}

#[tokio::test]
async fn test_reserves_route_through_wrapped_native() {
    let chain = Arc::new(FakeChain::new(CHAIN_ID_FLARE));
    let factory = addr(SPARKDEX_FACTORY);
    let token = addr("0x8888888888888888888888888888888888888888");
    let token_pair = addr("0x7777777777777777777777777777777777777771");
    let wflr_pair = addr("0x7777777777777777777777777777777777777772");

    // no direct token/USDC pool
    chain.script_get_pair(factory, token, addr(USDC), Address::ZERO);
    // 1,000 TOKEN against 2,000 WFLR
    chain.script_get_pair(factory, token, addr(WFLR), token_pair);
    chain.script_reserves(token_pair, token, 1_000_000_000_000_000_000_000, 2_000_000_000_000_000_000_000);
    // 1,000 WFLR against 1,250 USDC
    chain.script_get_pair(factory, addr(WFLR), addr(USDC), wflr_pair);
    chain.script_reserves(wflr_pair, addr(WFLR), 1_000_000_000_000_000_000_000, 1_250_000_000);

    let registry = TokenRegistry::for_chain(CHAIN_ID_FLARE);
    let source = PoolReservesSource::new(chain.clone(), factory, registry.clone(), DEFAULT_POOL_FEE_BPS);
    let info = registry.resolve_address(token);

    let price = source.attempt(&info).await.unwrap();
    assert!((price - 2.5).abs() < 1e-9);

    let usdc = registry.resolve("USDC").unwrap();
    let quote = source.quote_swap(&info, &usdc, ether(10)).await.unwrap();
    // ~1% then ~2% of each pool, plus two 0.3% fees
    assert!(quote.price_impact > 0.03 && quote.price_impact < 0.04, "{}", quote.price_impact);
    assert!(quote.amount_out < U256::from(25_000_000u64));
    assert!(quote.amount_out > U256::from(24_000_000u64));
}

#[tokio::test]
async fn test_feed_registry_falls_back_to_asset_hash() {
    let chain = Arc::new(FakeChain::new(CHAIN_ID_FLARE));
    let ftso = get_ftso_registry(CHAIN_ID_FLARE).unwrap();
    let provider = addr("0x6666666666666666666666666666666666666666");
    chain.respond(
        ftso,
        getCurrentPriceProviderAddressCall::SELECTOR,
        getCurrentPriceProviderAddressCall::abi_encode_returns(&(provider,)),
    );
    // symbol lookup is unscripted and fails; the hash lookup answers 0.25
    chain.respond(
        provider,
        getCurrentPriceFromAssetByHashCall::SELECTOR,
        getCurrentPriceFromAssetByHashCall::abi_encode_returns(&(U256::from(25_000u64), U256::ZERO, U256::from(5u64))),
    );

    let registry = TokenRegistry::for_chain(CHAIN_ID_FLARE);
    let info = registry.resolve_address(addr("0x8888888888888888888888888888888888888888"));
    let price = FeedRegistrySource::new(chain.clone(), ftso).attempt(&info).await.unwrap();
    assert!((price - 0.25).abs() < 1e-12);
    // provider, symbol index, asset hash
    assert_eq!(chain.call_count(), 3);
}

#[tokio::test]
async fn test_router_quote_impact_against_unit_rate() {
    let chain = Arc::new(FakeChain::new(CHAIN_ID_FLARE));
    let router = addr(SPARKDEX_ROUTER);
    let path = vec![addr(WFLR), addr(USDC)];
    // one WFLR quotes 1.25 USDC, a hundred quote 120 USDC
    chain.script_amounts_out(router, ether(1), path.clone(), vec![ether(1), U256::from(1_250_000u64)]);
    chain.script_amounts_out(router, ether(100), path, vec![ether(100), U256::from(120_000_000u64)]);

    let registry = TokenRegistry::for_chain(CHAIN_ID_FLARE);
    let source = RouterQuoteSource::new(chain.clone(), router, registry.clone());
    let wflr = registry.resolve("WFLR").unwrap();
    let usdc = registry.resolve("USDC").unwrap();

    assert!((source.attempt(&wflr).await.unwrap() - 1.25).abs() < 1e-9);

    let quote = source.quote_swap(&wflr, &usdc, ether(100)).await.unwrap();
    assert_eq!(quote.source_tier, PriceSourceTier::RouterQuote);
    assert_eq!(quote.amount_out, U256::from(120_000_000u64));
    // fair output is 125 USDC
    assert!((quote.price_impact - 0.04).abs() < 1e-9);
}

#[tokio::test]
async fn test_concurrent_lookups_share_cache() {
    let (source, calls) = CountingSource::new(PriceSourceTier::StaticTable, Some(2.0));
    let oracle = Arc::new(
        PriceOracle::new(TokenRegistry::for_chain(CHAIN_ID_FLARE), PriceCache::new()).with_source(source),
    );

    let symbols = ["FLR", "WFLR", "USDC"];
    let handles: Vec<_> = (0..24)
        .map(|i| {
            let oracle = oracle.clone();
            let symbol = symbols[i % symbols.len()];
            tokio::spawn(async move { oracle.get_price(symbol).await })
        })
        .collect();
    for handle in handles {
        let quote = handle.await.unwrap().unwrap();
        assert_eq!(quote.price, 2.0);
    }

    // WFLR shares the FLR entry
    assert_eq!(oracle.cache().stats().entries, 2);
    let fetched = calls.load(Ordering::SeqCst);
    assert!((2..=24).contains(&fetched));

    for symbol in symbols {
        oracle.get_price(symbol).await.unwrap();
    }
    assert_eq!(calls.load(Ordering::SeqCst), fetched);
}

#[tokio::test]
async fn test_cache_ttl_boundary() {
    let clock = Arc::new(ManualClock::default());
    let cache = PriceCache::with_clock(300, clock.clone());
    let (source, calls) = CountingSource::new(PriceSourceTier::StaticTable, Some(1.25));
    let oracle = PriceOracle::new(TokenRegistry::for_chain(CHAIN_ID_FLARE), cache).with_source(source);

    oracle.get_price("FLR").await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    clock.advance(ChronoDuration::seconds(299));
    oracle.get_price("FLR").await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    clock.advance(ChronoDuration::seconds(2));
    oracle.get_price("FLR").await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_all_tiers_fail_is_unavailable() {
    let (source, _) = CountingSource::new(PriceSourceTier::HttpApi, None);
    let oracle = PriceOracle::new(TokenRegistry::for_chain(CHAIN_ID_FLARE), PriceCache::new()).with_source(source);
    let err = oracle.get_price("USDT").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PriceUnavailable);
    assert!(oracle.cache().get("USDT").is_none());
}

#[tokio::test]
async fn test_scenario_sparkdex_swap_accepted() {
    let validator = validator_with(SimulationResult::success(180_000, vec![]), RiskLevel::Medium);
    let request = ValidationRequest::new(sparkdex_swap_tx()).with_intent(swap_intent(0.5));

    let verdict = validator.validate_with(request).await.unwrap();
    assert!(verdict.valid, "errors: {:?}", verdict.errors);
    assert!(verdict.errors.is_empty());
    assert_eq!(verdict.simulation.as_ref().unwrap().status, SimulationStatus::Success);
    assert_eq!(verdict.risk_assessment.level(), RiskLevel::Low);

    let json = serde_json::to_value(&verdict).unwrap();
    assert_eq!(json["valid"], true);
    assert_eq!(json["simulation"]["status"], "success");
    assert_eq!(json["risk_assessment"]["overall_risk"]["level"], "low");
    assert!(json["risk_assessment"]["risk_factors"].is_array());
}

#[tokio::test]
async fn test_scenario_outsized_value_unverified_router_rejected() {
    let validator = validator_with(SimulationResult::success(180_000, vec![]), RiskLevel::Medium);
    let tx = TxRequest {
        from: Some(SENDER.into()),
        to: Some(UNKNOWN_ROUTER.into()),
        value: ether(10_000_000),
        data: "0x38ed1739".into(),
        ..Default::default()
    };

    let verdict = validator.validate(&tx, None, true).await.unwrap();
    let size = verdict
        .risk_assessment
        .factors
        .iter()
        .find(|f| f.name == "transaction_size")
        .expect("size factor");
    assert_eq!(size.level, RiskLevel::High);
    assert!(!verdict.valid);
    assert!(verdict.has_error_kind(ErrorKind::RiskThresholdExceeded));
    assert!(verdict
        .errors
        .iter()
        .any(|e| e.starts_with("Risk level high exceeds threshold medium")));
}

#[tokio::test]
async fn test_scenario_outsized_native_value_on_audited_swap() {
    let tx = TxRequest { value: ether(10_000_000), ..sparkdex_swap_tx() };

    let validator = validator_with(SimulationResult::success(180_000, vec![]), RiskLevel::Medium);
    let request = ValidationRequest::new(tx.clone()).with_intent(swap_intent(0.5));
    let verdict = validator.validate_with(request).await.unwrap();

    // the decoded amountIn is only 100 WFLR; the attached value drives the size
    let factors: Vec<(&str, RiskLevel)> = verdict
        .risk_assessment
        .factors
        .iter()
        .map(|f| (f.name.as_str(), f.level))
        .collect();
    assert_eq!(
        factors,
        vec![
            ("protocol_safety", RiskLevel::Low),
            ("slippage_risk", RiskLevel::Low),
            ("transaction_size", RiskLevel::High),
        ]
    );
    // mean of 0.2, 0.2 and 0.8 stays inside the medium band
    assert_eq!(verdict.risk_assessment.level(), RiskLevel::Medium);
    assert!(verdict.valid, "errors: {:?}", verdict.errors);
    assert!(verdict.risk_assessment.warnings.iter().any(|w| w.starts_with("Large transaction")));

    let strict = validator_with(SimulationResult::success(180_000, vec![]), RiskLevel::Low);
    let request = ValidationRequest::new(tx).with_intent(swap_intent(0.5));
    let verdict = strict.validate_with(request).await.unwrap();
    assert!(!verdict.valid);
    assert!(verdict.has_error_kind(ErrorKind::RiskThresholdExceeded));
}

#[tokio::test]
async fn test_unpriced_deposit_is_not_low_risk() {
    let unpriced = Arc::new(PriceOracle::new(TokenRegistry::for_chain(CHAIN_ID_FLARE), PriceCache::new()));
    let simulator = Simulator::new(Duration::from_secs(2)).with_strategy(FixedSimulation(SimulationResult::success(
        90_000,
        vec![],
    )));
    let validator =
        TransactionValidator::new(CHAIN_ID_FLARE, Arc::new(simulator), RiskLevel::Low).with_oracle(unpriced);
    let tx = TxRequest {
        from: Some(SENDER.into()),
        to: Some(KINETIC_POOL.into()),
        data: deposit_calldata(addr("0x7777777777777777777777777777777777777777"), U256::MAX),
        gas: Some(250_000),
        ..Default::default()
    };

    let verdict = validator.validate(&tx, None, false).await.unwrap();
    let size = verdict
        .risk_assessment
        .factors
        .iter()
        .find(|f| f.name == "transaction_size")
        .expect("size factor");
    assert_eq!(size.level, RiskLevel::Medium);
    assert_eq!(verdict.risk_assessment.level(), RiskLevel::Medium);
    assert!(!verdict.valid);
    assert!(verdict.has_error_kind(ErrorKind::RiskThresholdExceeded));
    assert!(verdict
        .risk_assessment
        .warnings
        .contains(&"Price data unavailable; USD value not assessed".to_string()));
}

#[tokio::test]
async fn test_scenario_unknown_call_medium_default() {
    let validator = validator_with(SimulationResult::success(21_000, vec![]), RiskLevel::Medium);
    let tx = TxRequest {
        from: Some(SENDER.into()),
        to: Some("0x5555555555555555555555555555555555555555".into()),
        data: "0xdeadbeef".into(),
        ..Default::default()
    };

    let verdict = validator.validate(&tx, None, true).await.unwrap();
    assert_eq!(verdict.risk_assessment.level(), RiskLevel::Medium);
    assert_eq!(verdict.risk_assessment.factors[0].name, "unknown_protocol");
    assert!(verdict
        .risk_assessment
        .recommendations
        .contains(&"Verify the destination contract before proceeding".to_string()));
    assert!(verdict.valid);
}

#[tokio::test]
async fn test_malformed_transaction_blocks_without_network() {
    let validator = validator_with(SimulationResult::success(21_000, vec![]), RiskLevel::Critical);
    let tx = TxRequest { gas: Some(10_000), ..Default::default() };

    let verdict = validator.validate(&tx, None, false).await.unwrap();
    assert!(!verdict.valid);
    assert_eq!(
        verdict.errors,
        vec!["Missing 'from' address", "Missing 'to' address", "Gas limit too low"]
    );
    assert!(verdict.error_kinds.iter().all(|k| *k == ErrorKind::MalformedTransaction));
}

#[tokio::test]
async fn test_unknown_simulation_blocks() {
    let validator = validator_with(SimulationResult::unknown(vec![]), RiskLevel::Critical);
    let verdict = validator.validate(&sparkdex_swap_tx(), None, true).await.unwrap();
    assert!(!verdict.valid);
    assert!(verdict.has_error_kind(ErrorKind::SimulationFailed));
}

#[tokio::test]
async fn test_identical_inputs_identical_verdicts() {
    let validator = validator_with(SimulationResult::success(180_000, vec![]), RiskLevel::Medium);
    let first = validator.validate(&sparkdex_swap_tx(), None, true).await.unwrap();
    let second = validator.validate(&sparkdex_swap_tx(), None, true).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_pipeline_over_chain_reader() {
    let chain = Arc::new(FakeChain::new(CHAIN_ID_FLARE));
    // router accepts the swap in the read-only dry run
    chain.respond(addr(SPARKDEX_ROUTER), [0x38, 0xed, 0x17, 0x39], vec![1; 64]);

    let config = GuardConfig::for_network(Network::Flare);
    let validator = TransactionValidator::from_reader(&config, chain.clone()).unwrap();
    assert_eq!(
        validator.oracle().unwrap().source_names(),
        vec!["router_quote", "feed_registry", "round_feed", "pool_reserves", "static_table"]
    );

    let request = ValidationRequest::new(sparkdex_swap_tx()).with_intent(swap_intent(0.5));
    let verdict = validator.validate_with(request).await.unwrap();
    let sim = verdict.simulation.as_ref().unwrap();
    assert_eq!(sim.status, SimulationStatus::Success);
    assert_eq!(sim.gas_estimate, 50_000);
    assert!(verdict.valid, "errors: {:?}", verdict.errors);

    // every on-chain tier failed, the static table priced FLR
    let cached = validator.oracle().unwrap().cache().get("FLR").unwrap();
    assert_eq!(cached.source_tier, PriceSourceTier::StaticTable);
}
