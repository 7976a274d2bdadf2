//! Price sources, one per tier
//!
//! Each source is an independent strategy behind [`PriceSource`]. A source
//! either prices the token or returns an error; the oracle moves on to the
//! next tier on any error.

use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::sol;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::core::tokens::{TokenInfo, TokenRegistry};
use crate::models::errors::{AppError, AppResult};
use crate::models::types::{PriceSourceTier, SwapQuote};
use crate::providers::price_api::PriceApiClient;
use crate::providers::rpc::{read_contract, ChainReader};
use crate::utils::constants::{get_static_price, to_units, u256_to_f64, unit, ROUND_PRICE_FEEDS};

sol! {
    interface IRouter {
        function getAmountsOut(uint256 amountIn, address[] calldata path) external view returns (uint256[] memory amounts);
    }

    interface IFtsoRegistry {
        function getCurrentPriceProviderAddress() external view returns (address);
    }

    interface IFtsoProvider {
        function getFtsoIndex(string memory symbol) external view returns (uint256);
        function getCurrentPriceWithDecimals(uint256 ftsoIndex) external view returns (uint256 _price, uint256 _timestamp, uint256 _decimals);
        function getCurrentPriceFromAssetByHash(bytes32 assetHash) external view returns (uint256 _price, uint256 _timestamp, uint256 _decimals);
    }

    interface IAggregator {
        function latestRoundData() external view returns (uint80 roundId, int256 answer, uint256 startedAt, uint256 updatedAt, uint80 answeredInRound);
        function decimals() external view returns (uint8);
    }

    interface IFactory {
        function getPair(address tokenA, address tokenB) external view returns (address pair);
    }

    interface IPair {
        function getReserves() external view returns (uint112 reserve0, uint112 reserve1, uint32 blockTimestampLast);
        function token0() external view returns (address);
    }
}

/// One tier of the price fallback chain
#[async_trait]
pub trait PriceSource: Send + Sync {
    fn tier(&self) -> PriceSourceTier;

    fn name(&self) -> &'static str {
        self.tier().as_str()
    }

    /// USD price of one whole unit of `token`
    async fn attempt(&self, token: &TokenInfo) -> AppResult<f64>;

    /// Quote a concrete trade. Sources that cannot quote trades keep the default.
    async fn quote_swap(&self, _token_in: &TokenInfo, _token_out: &TokenInfo, _amount_in: U256) -> AppResult<SwapQuote> {
        Err(AppError::price_source_unconfigured(format!("{} cannot quote swaps", self.name())))
    }
}

/// Rate of quoted vs fair output, as a fraction in [0, 1]
pub fn price_impact(fair_out: f64, quoted_out: f64) -> f64 {
    if !fair_out.is_finite() || fair_out <= 0.0 {
        return 0.0;
    }
    ((fair_out - quoted_out) / fair_out).clamp(0.0, 1.0)
}

fn positive(price: f64, source: &str) -> AppResult<f64> {
    if price.is_finite() && price > 0.0 {
        Ok(price)
    } else {
        Err(AppError::price_source_failed(format!("{} returned non-positive price", source)))
    }
}

// ============================================
// TIER 1: ROUTER QUOTE
// ============================================

/// `getAmountsOut` on a V2-style router against the USD stablecoin
pub struct RouterQuoteSource {
    reader: Arc<dyn ChainReader>,
    router: Address,
    registry: TokenRegistry,
}

impl RouterQuoteSource {
    pub fn new(reader: Arc<dyn ChainReader>, router: Address, registry: TokenRegistry) -> Self {
        Self { reader, router, registry }
    }

    async fn amounts_out(&self, amount_in: U256, path: Vec<Address>) -> AppResult<U256> {
        let call = IRouter::getAmountsOutCall { amountIn: amount_in, path };
        let ret = read_contract(self.reader.as_ref(), self.router, &call).await?;
        ret.amounts
            .last()
            .copied()
            .ok_or_else(|| AppError::invalid_response("getAmountsOut returned an empty array"))
    }
}

#[async_trait]
impl PriceSource for RouterQuoteSource {
    fn tier(&self) -> PriceSourceTier {
        PriceSourceTier::RouterQuote
    }

    async fn attempt(&self, token: &TokenInfo) -> AppResult<f64> {
        let usd = self
            .registry
            .usd_quote()
            .ok_or_else(|| AppError::price_source_unconfigured("No USD quote token on this network"))?;
        let base = self.registry.routable_address(token);
        if base == usd.address {
            return Ok(1.0);
        }

        let out = self.amounts_out(unit(token.decimals), vec![base, usd.address]).await?;
        positive(to_units(out, usd.decimals), self.name())
    }

    async fn quote_swap(&self, token_in: &TokenInfo, token_out: &TokenInfo, amount_in: U256) -> AppResult<SwapQuote> {
        let path = vec![
            self.registry.routable_address(token_in),
            self.registry.routable_address(token_out),
        ];
        if path[0] == path[1] {
            return Err(AppError::price_source_failed("Swap path has identical tokens"));
        }

        let quoted = self.amounts_out(amount_in, path.clone()).await?;
        let unit_out = self.amounts_out(unit(token_in.decimals), path).await?;

        // fair = unit rate scaled to the trade size
        let fair = u256_to_f64(unit_out) * to_units(amount_in, token_in.decimals);
        Ok(SwapQuote {
            amount_out: quoted,
            price_impact: price_impact(fair, u256_to_f64(quoted)),
            source_tier: self.tier(),
        })
    }
}

// ============================================
// TIER 2: FEED REGISTRY
// ============================================

/// Index-based price feed registry; symbol lookup first, asset hash second
pub struct FeedRegistrySource {
    reader: Arc<dyn ChainReader>,
    registry: Address,
}

impl FeedRegistrySource {
    pub fn new(reader: Arc<dyn ChainReader>, registry: Address) -> Self {
        Self { reader, registry }
    }

    fn scale(price: U256, decimals: U256) -> AppResult<f64> {
        let decimals: u8 = decimals
            .try_into()
            .map_err(|_| AppError::invalid_response("Feed decimals out of range"))?;
        Ok(to_units(price, decimals))
    }

    async fn by_symbol(&self, provider: Address, symbol: &str) -> AppResult<f64> {
        let index = read_contract(
            self.reader.as_ref(),
            provider,
            &IFtsoProvider::getFtsoIndexCall { symbol: symbol.to_string() },
        )
        .await?
        ._0;
        let ret = read_contract(
            self.reader.as_ref(),
            provider,
            &IFtsoProvider::getCurrentPriceWithDecimalsCall { ftsoIndex: index },
        )
        .await?;
        Self::scale(ret._price, ret._decimals)
    }

    async fn by_asset_hash(&self, provider: Address, token: Address) -> AppResult<f64> {
        let hash = B256::left_padding_from(token.as_slice());
        let ret = read_contract(
            self.reader.as_ref(),
            provider,
            &IFtsoProvider::getCurrentPriceFromAssetByHashCall { assetHash: hash },
        )
        .await?;
        Self::scale(ret._price, ret._decimals)
    }
}

#[async_trait]
impl PriceSource for FeedRegistrySource {
    fn tier(&self) -> PriceSourceTier {
        PriceSourceTier::FeedRegistry
    }

    async fn attempt(&self, token: &TokenInfo) -> AppResult<f64> {
        let provider = read_contract(
            self.reader.as_ref(),
            self.registry,
            &IFtsoRegistry::getCurrentPriceProviderAddressCall {},
        )
        .await?
        ._0;
        if provider == Address::ZERO {
            return Err(AppError::price_source_failed("Feed registry returned no provider"));
        }

        let price = match self.by_symbol(provider, &token.price_symbol).await {
            Ok(p) => p,
            Err(e) => {
                debug!("🔁 Feed symbol lookup failed for {} ({}), trying asset hash", token.price_symbol, e);
                self.by_asset_hash(provider, token.address).await?
            }
        };
        positive(price, self.name())
    }
}

// ============================================
// TIER 3: ROUND FEEDS
// ============================================

/// Round-based `latestRoundData` feeds for an allow-list of majors
pub struct RoundFeedSource {
    reader: Arc<dyn ChainReader>,
    feeds: HashMap<String, Address>,
}

impl RoundFeedSource {
    pub fn new(reader: Arc<dyn ChainReader>) -> Self {
        let feeds = ROUND_PRICE_FEEDS
            .iter()
            .filter_map(|(symbol, addr)| addr.parse::<Address>().ok().map(|a| (symbol.to_string(), a)))
            .collect();
        Self { reader, feeds }
    }
}

#[async_trait]
impl PriceSource for RoundFeedSource {
    fn tier(&self) -> PriceSourceTier {
        PriceSourceTier::RoundFeed
    }

    async fn attempt(&self, token: &TokenInfo) -> AppResult<f64> {
        let feed = self
            .feeds
            .iter()
            .find(|(symbol, _)| symbol.eq_ignore_ascii_case(&token.price_symbol))
            .map(|(_, addr)| *addr)
            .ok_or_else(|| AppError::price_source_unconfigured(format!("No round feed for {}", token.price_symbol)))?;

        let round = read_contract(self.reader.as_ref(), feed, &IAggregator::latestRoundDataCall {}).await?;
        let decimals = read_contract(self.reader.as_ref(), feed, &IAggregator::decimalsCall {}).await?._0;

        if round.answer.is_negative() || round.answer.is_zero() {
            return Err(AppError::price_source_failed("Round feed answer is not positive"));
        }
        positive(to_units(round.answer.into_raw(), decimals), self.name())
    }
}

// ============================================
// TIER 4: POOL RESERVES
// ============================================

/// Constant-product pool reserves from a V2-style factory
pub struct PoolReservesSource {
    reader: Arc<dyn ChainReader>,
    factory: Address,
    registry: TokenRegistry,
    fee_bps: u32,
}

impl PoolReservesSource {
    pub fn new(reader: Arc<dyn ChainReader>, factory: Address, registry: TokenRegistry, fee_bps: u32) -> Self {
        Self {
            reader,
            factory,
            registry,
            fee_bps: fee_bps.min(10_000),
        }
    }

    /// Reserves of the `a`/`b` pair ordered as (reserve_a, reserve_b).
    /// `None` when no pair exists.
    async fn reserves(&self, a: Address, b: Address) -> AppResult<Option<(U256, U256)>> {
        let pair = read_contract(
            self.reader.as_ref(),
            self.factory,
            &IFactory::getPairCall { tokenA: a, tokenB: b },
        )
        .await?
        .pair;
        if pair == Address::ZERO {
            return Ok(None);
        }

        let reserves = read_contract(self.reader.as_ref(), pair, &IPair::getReservesCall {}).await?;
        let token0 = read_contract(self.reader.as_ref(), pair, &IPair::token0Call {}).await?._0;
        let (r0, r1) = (U256::from(reserves.reserve0), U256::from(reserves.reserve1));
        if r0.is_zero() || r1.is_zero() {
            return Err(AppError::price_source_failed("Pool has empty reserves"));
        }
        Ok(Some(if token0 == a { (r0, r1) } else { (r1, r0) }))
    }

    /// Whole units of `b` per whole unit of `a`
    fn spot(r_a: U256, dec_a: u8, r_b: U256, dec_b: u8) -> f64 {
        to_units(r_b, dec_b) / to_units(r_a, dec_a)
    }

    /// Output of a constant-product swap after the pool fee
    pub fn amount_out(amount_in: U256, reserve_in: U256, reserve_out: U256, fee_bps: u32) -> U256 {
        let keep = U256::from(10_000u32 - fee_bps.min(10_000));
        let in_with_fee = amount_in.saturating_mul(keep);
        let numerator = in_with_fee.saturating_mul(reserve_out);
        let denominator = reserve_in.saturating_mul(U256::from(10_000u32)).saturating_add(in_with_fee);
        if denominator.is_zero() {
            U256::ZERO
        } else {
            numerator / denominator
        }
    }

    fn wrapped(&self) -> AppResult<&TokenInfo> {
        self.registry
            .wrapped_native()
            .ok_or_else(|| AppError::price_source_unconfigured("No wrapped native token on this network"))
    }
}

#[async_trait]
impl PriceSource for PoolReservesSource {
    fn tier(&self) -> PriceSourceTier {
        PriceSourceTier::PoolReserves
    }

    async fn attempt(&self, token: &TokenInfo) -> AppResult<f64> {
        let usd = self
            .registry
            .usd_quote()
            .ok_or_else(|| AppError::price_source_unconfigured("No USD quote token on this network"))?;
        let base = self.registry.routable_address(token);
        if base == usd.address {
            return Ok(1.0);
        }

        if let Some((r_base, r_usd)) = self.reserves(base, usd.address).await? {
            return positive(Self::spot(r_base, token.decimals, r_usd, usd.decimals), self.name());
        }

        // one hop through the wrapped native token
        let wrapped = self.wrapped()?;
        if base == wrapped.address {
            return Err(AppError::price_source_failed(format!("No {}/{} pool", wrapped.symbol, usd.symbol)));
        }
        let (r_base, r_w) = self
            .reserves(base, wrapped.address)
            .await?
            .ok_or_else(|| AppError::price_source_failed(format!("No pool for {}", token.symbol)))?;
        let (r_w2, r_usd) = self
            .reserves(wrapped.address, usd.address)
            .await?
            .ok_or_else(|| AppError::price_source_failed(format!("No {}/{} pool", wrapped.symbol, usd.symbol)))?;

        let in_wrapped = Self::spot(r_base, token.decimals, r_w, wrapped.decimals);
        let wrapped_usd = Self::spot(r_w2, wrapped.decimals, r_usd, usd.decimals);
        positive(in_wrapped * wrapped_usd, self.name())
    }

    async fn quote_swap(&self, token_in: &TokenInfo, token_out: &TokenInfo, amount_in: U256) -> AppResult<SwapQuote> {
        let a = self.registry.routable_address(token_in);
        let b = self.registry.routable_address(token_out);
        if a == b {
            return Err(AppError::price_source_failed("Swap path has identical tokens"));
        }

        // (quoted, fair) in raw output units
        let (quoted, fair) = match self.reserves(a, b).await? {
            Some((r_in, r_out)) => {
                let quoted = Self::amount_out(amount_in, r_in, r_out, self.fee_bps);
                let fair = u256_to_f64(amount_in) * u256_to_f64(r_out) / u256_to_f64(r_in);
                (quoted, fair)
            }
            None => {
                let w = self.wrapped()?.address;
                if a == w || b == w {
                    return Err(AppError::price_source_failed("No direct pool for swap"));
                }
                let (r_in, r_w) = self
                    .reserves(a, w)
                    .await?
                    .ok_or_else(|| AppError::price_source_failed("No pool for input token"))?;
                let (r_w2, r_out) = self
                    .reserves(w, b)
                    .await?
                    .ok_or_else(|| AppError::price_source_failed("No pool for output token"))?;
                let mid = Self::amount_out(amount_in, r_in, r_w, self.fee_bps);
                let quoted = Self::amount_out(mid, r_w2, r_out, self.fee_bps);
                let fair = u256_to_f64(amount_in) * (u256_to_f64(r_w) / u256_to_f64(r_in))
                    * (u256_to_f64(r_out) / u256_to_f64(r_w2));
                (quoted, fair)
            }
        };

        Ok(SwapQuote {
            amount_out: quoted,
            price_impact: price_impact(fair, u256_to_f64(quoted)),
            source_tier: self.tier(),
        })
    }
}

// ============================================
// TIER 5: HTTP API
// ============================================

pub struct HttpApiSource {
    client: PriceApiClient,
    registry: TokenRegistry,
}

impl HttpApiSource {
    pub fn new(client: PriceApiClient, registry: TokenRegistry) -> Self {
        Self { client, registry }
    }
}

#[async_trait]
impl PriceSource for HttpApiSource {
    fn tier(&self) -> PriceSourceTier {
        PriceSourceTier::HttpApi
    }

    async fn attempt(&self, token: &TokenInfo) -> AppResult<f64> {
        self.client.get_price(self.registry.routable_address(token)).await
    }
}

// ============================================
// TIER 6: STATIC TABLE
// ============================================

/// Approximate last-resort prices for majors
#[derive(Debug, Default, Clone, Copy)]
pub struct StaticTableSource;

#[async_trait]
impl PriceSource for StaticTableSource {
    fn tier(&self) -> PriceSourceTier {
        PriceSourceTier::StaticTable
    }

    async fn attempt(&self, token: &TokenInfo) -> AppResult<f64> {
        get_static_price(&token.price_symbol)
            .ok_or_else(|| AppError::price_source_unconfigured(format!("No static price for {}", token.price_symbol)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::constants::CHAIN_ID_FLARE;

    #[test]
    fn test_price_impact_bounds() {
        assert_eq!(price_impact(100.0, 100.0), 0.0);
        assert_eq!(price_impact(100.0, 120.0), 0.0);
        assert!((price_impact(100.0, 97.0) - 0.03).abs() < 1e-12);
        assert_eq!(price_impact(0.0, 5.0), 0.0);
        assert_eq!(price_impact(100.0, -50.0), 1.0);
    }

    #[test]
    fn test_amount_out_applies_fee() {
        let r = U256::from(1_000_000u64);
        // 1000 in, 30 bps fee: 1000*9970*1e6 / (1e6*10000 + 1000*9970) = 996
        let out = PoolReservesSource::amount_out(U256::from(1000u64), r, r, 30);
        assert_eq!(out, U256::from(996u64));
        let no_fee = PoolReservesSource::amount_out(U256::from(1000u64), r, r, 0);
        assert_eq!(no_fee, U256::from(999u64));
    }

    #[test]
    fn test_spot_adjusts_decimals() {
        // 1,000 WFLR (18 dec) against 25 USDC (6 dec) = 0.025
        let spot = PoolReservesSource::spot(
            U256::from(10u64).pow(U256::from(21u64)),
            18,
            U256::from(25_000_000u64),
            6,
        );
        assert!((spot - 0.025).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_static_source() {
        let registry = TokenRegistry::for_chain(CHAIN_ID_FLARE);
        let flr = registry.resolve("WFLR").unwrap();
        assert_eq!(StaticTableSource.attempt(&flr).await.unwrap(), 1.25);
        let unlisted = registry.resolve_address(Address::repeat_byte(0x33));
        assert!(StaticTableSource.attempt(&unlisted).await.is_err());
        assert!(StaticTableSource
            .quote_swap(&flr, &unlisted, U256::from(1u64))
            .await
            .is_err());
    }
}
