//! Shared in-process fakes for integration tests

#![allow(dead_code)]

use alloy_primitives::aliases::U112;
use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{sol, SolCall};
use async_trait::async_trait;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tx_risk_gate::core::price_sources::PriceSource;
use tx_risk_gate::core::simulator::SimulationStrategy;
use tx_risk_gate::core::tokens::TokenInfo;
use tx_risk_gate::models::types::PriceSourceTier;
use tx_risk_gate::providers::rpc::{CallRequest, ChainReader};
use tx_risk_gate::{AppError, AppResult, SimulationResult, TxRequest};

sol! {
    function swapExactTokensForTokens(uint256 amountIn, uint256 amountOutMin, address[] path, address to, uint256 deadline);
    function getPair(address tokenA, address tokenB) returns (address pair);
    function getReserves() returns (uint112 reserve0, uint112 reserve1, uint32 blockTimestampLast);
    function token0() returns (address);
    function getAmountsOut(uint256 amountIn, address[] path) returns (uint256[] amounts);
    function getCurrentPriceProviderAddress() returns (address);
    function getCurrentPriceFromAssetByHash(bytes32 assetHash) returns (uint256 price, uint256 timestamp, uint256 decimals);
}

pub const SPARKDEX_ROUTER: &str = "0x9A7B675619d3633304134155c6c976E9b4c1cfB3";
pub const SPARKDEX_FACTORY: &str = "0x0987654321098765432109876543210987654321";
pub const WFLR: &str = "0x1D80c49BbBCd1C0911346656B529DF9E5c2F783d";
pub const USDC: &str = "0xe3F5a90F9cb311505cd691a46596599aA1A0AD7D";
pub const SENDER: &str = "0x1111111111111111111111111111111111111111";
pub const KINETIC_POOL: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
pub const UNKNOWN_ROUTER: &str = "0x4444444444444444444444444444444444444444";

pub fn addr(raw: &str) -> Address {
    Address::from_str(raw).unwrap()
}

/// `n` whole units at 18 decimals
pub fn ether(n: u64) -> U256 {
    U256::from(n) * U256::from(10u64).pow(U256::from(18u64))
}

pub fn hex_data(bytes: Vec<u8>) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Call data for a two-hop path swap
pub fn swap_calldata(amount_in: U256, token_in: Address, token_out: Address) -> String {
    hex_data(
        swapExactTokensForTokensCall {
            amountIn: amount_in,
            amountOutMin: U256::ZERO,
            path: vec![token_in, token_out],
            to: addr(SENDER),
            deadline: U256::from(u64::MAX),
        }
        .abi_encode(),
    )
}

/// Lending deposit call data: `(address asset, uint256 amount)`
pub fn deposit_calldata(asset: Address, amount: U256) -> String {
    let mut data = vec![0xa0, 0x71, 0x2d, 0x68];
    data.extend_from_slice(asset.into_word().as_slice());
    data.extend_from_slice(&amount.to_be_bytes::<32>());
    hex_data(data)
}

/// Chain with scripted responses keyed by (contract, full call data) or,
/// failing that, (contract, selector). Unscripted calls fail like a revert.
#[derive(Default)]
pub struct FakeChain {
    exact: Mutex<HashMap<(Address, Bytes), Bytes>>,
    responses: Mutex<HashMap<(Address, [u8; 4]), Bytes>>,
    calls: AtomicUsize,
    chain_id: u64,
}

impl FakeChain {
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            ..Default::default()
        }
    }

    pub fn respond(&self, to: Address, selector: [u8; 4], output: Vec<u8>) {
        self.responses.lock().unwrap().insert((to, selector), Bytes::from(output));
    }

    /// Answer only calls to `to` carrying exactly `data`
    pub fn respond_exact(&self, to: Address, data: Vec<u8>, output: Vec<u8>) {
        self.exact.lock().unwrap().insert((to, Bytes::from(data)), Bytes::from(output));
    }

    /// Factory lookup for one ordered token pair; `Address::ZERO` means no pool
    pub fn script_get_pair(&self, factory: Address, a: Address, b: Address, pair: Address) {
        self.respond_exact(
            factory,
            getPairCall { tokenA: a, tokenB: b }.abi_encode(),
            getPairCall::abi_encode_returns(&(pair,)),
        );
    }

    /// Reserves and token0 of a pair contract
    pub fn script_reserves(&self, pair: Address, token0: Address, r0: u128, r1: u128) {
        self.respond(
            pair,
            getReservesCall::SELECTOR,
            getReservesCall::abi_encode_returns(&(U112::from(r0), U112::from(r1), 0u32)),
        );
        self.respond(pair, token0Call::SELECTOR, token0Call::abi_encode_returns(&(token0,)));
    }

    /// Router answer for one `getAmountsOut(amount_in, path)` call
    pub fn script_amounts_out(&self, router: Address, amount_in: U256, path: Vec<Address>, amounts: Vec<U256>) {
        self.respond_exact(
            router,
            getAmountsOutCall { amountIn: amount_in, path }.abi_encode(),
            getAmountsOutCall::abi_encode_returns(&(amounts,)),
        );
    }

    /// Script a V2 pair for `token0`/`token1` behind `factory`
    pub fn script_pair(&self, factory: Address, pair: Address, token0: Address, r0: u128, r1: u128) {
        self.respond(factory, getPairCall::SELECTOR, getPairCall::abi_encode_returns(&(pair,)));
        self.script_reserves(pair, token0, r0, r1);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainReader for FakeChain {
    async fn call(&self, request: &CallRequest) -> AppResult<Bytes> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(out) = self.exact.lock().unwrap().get(&(request.to, request.data.clone())) {
            return Ok(out.clone());
        }
        let selector = request.selector().unwrap_or_default();
        self.responses
            .lock()
            .unwrap()
            .get(&(request.to, selector))
            .cloned()
            .ok_or_else(|| AppError::rpc_error(format!("no scripted response for {}", request.to)))
    }

    async fn estimate_gas(&self, _request: &CallRequest) -> AppResult<u64> {
        Ok(50_000)
    }

    fn chain_id(&self) -> u64 {
        self.chain_id
    }
}

/// Price source with a fixed answer and a call counter
pub struct CountingSource {
    pub tier: PriceSourceTier,
    pub price: Option<f64>,
    pub calls: Arc<AtomicUsize>,
}

impl CountingSource {
    pub fn new(tier: PriceSourceTier, price: Option<f64>) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (Self { tier, price, calls: calls.clone() }, calls)
    }
}

#[async_trait]
impl PriceSource for CountingSource {
    fn tier(&self) -> PriceSourceTier {
        self.tier
    }

    async fn attempt(&self, token: &TokenInfo) -> AppResult<f64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.price
            .ok_or_else(|| AppError::price_source_failed(format!("no price for {}", token.symbol)))
    }
}

/// Simulation strategy with a fixed outcome
pub struct FixedSimulation(pub SimulationResult);

#[async_trait]
impl SimulationStrategy for FixedSimulation {
    fn name(&self) -> &'static str {
        "fixed"
    }

    async fn attempt(&self, _tx: &TxRequest) -> AppResult<SimulationResult> {
        Ok(self.0.clone())
    }
}
