//! Price Oracle Aggregator
//!
//! Ordered fallback over the six price tiers with a symbol-keyed TTL cache.
//! Each tier is fault-isolated and bounded by the per-call timeout; an
//! optional caller deadline stops the chain at the next tier boundary.
//! When every tier fails the result is `PriceUnavailable`, never zero.

use alloy_primitives::{Address, U256};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

use crate::core::price_sources::{
    FeedRegistrySource, HttpApiSource, PoolReservesSource, PriceSource, RoundFeedSource, RouterQuoteSource,
    StaticTableSource,
};
use crate::core::tokens::{TokenInfo, TokenRegistry};
use crate::models::config::GuardConfig;
use crate::models::errors::{AppError, AppResult};
use crate::models::types::{PriceQuote, SwapQuote};
use crate::providers::price_api::PriceApiClient;
use crate::providers::rpc::ChainReader;
use crate::utils::cache::PriceCache;
use crate::utils::clock::{Clock, SystemClock};
use crate::utils::constants::{get_dex_contracts, get_ftso_registry, to_units, DEFAULT_RPC_TIMEOUT_SECS};

pub struct PriceOracle {
    registry: TokenRegistry,
    sources: Vec<Arc<dyn PriceSource>>,
    cache: PriceCache,
    call_timeout: Duration,
}

impl PriceOracle {
    /// Oracle with no tiers; add them in priority order with [`with_source`](Self::with_source)
    pub fn new(registry: TokenRegistry, cache: PriceCache) -> Self {
        Self {
            registry,
            sources: Vec::new(),
            cache,
            call_timeout: Duration::from_secs(DEFAULT_RPC_TIMEOUT_SECS),
        }
    }

    pub fn with_source(mut self, source: impl PriceSource + 'static) -> Self {
        self.sources.push(Arc::new(source));
        self
    }

    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Standard six-tier chain for the configured network. Tiers without
    /// configuration on this network are left out.
    pub fn from_config(config: &GuardConfig, reader: Arc<dyn ChainReader>) -> AppResult<Self> {
        Self::from_config_with_clock(config, reader, Arc::new(SystemClock))
    }

    pub fn from_config_with_clock(
        config: &GuardConfig,
        reader: Arc<dyn ChainReader>,
        clock: Arc<dyn Clock>,
    ) -> AppResult<Self> {
        let chain_id = config.chain_id();
        let registry = TokenRegistry::for_chain(chain_id);
        let cache = PriceCache::with_clock(config.price_cache_ttl_secs, clock);
        let mut oracle = Self::new(registry.clone(), cache).with_call_timeout(config.rpc_timeout);

        let dex = get_dex_contracts(chain_id);
        if let Some(dex) = dex {
            let router = parse_address(dex.router)?;
            oracle = oracle.with_source(RouterQuoteSource::new(reader.clone(), router, registry.clone()));
        }
        if let Some(ftso) = get_ftso_registry(chain_id) {
            oracle = oracle.with_source(FeedRegistrySource::new(reader.clone(), ftso));
        }
        oracle = oracle.with_source(RoundFeedSource::new(reader.clone()));
        if let Some(dex) = dex {
            let factory = parse_address(dex.factory)?;
            oracle = oracle.with_source(PoolReservesSource::new(
                reader.clone(),
                factory,
                registry.clone(),
                config.pool_fee_bps,
            ));
        }
        if let Some(api) = &config.price_api {
            let client = PriceApiClient::new(api.clone(), config.rpc_timeout)?;
            oracle = oracle.with_source(HttpApiSource::new(client, registry.clone()));
        }
        oracle = oracle.with_source(StaticTableSource);

        info!(
            "💱 Price oracle ready on {}: {} tiers ({})",
            config.network.name(),
            oracle.sources.len(),
            oracle.source_names().join(" → ")
        );
        Ok(oracle)
    }

    pub fn registry(&self) -> &TokenRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &PriceCache {
        &self.cache
    }

    pub fn source_names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// USD price for a symbol or address
    pub async fn get_price(&self, token: &str) -> AppResult<PriceQuote> {
        self.get_price_until(token, None).await
    }

    pub async fn get_price_until(&self, token: &str, deadline: Option<Instant>) -> AppResult<PriceQuote> {
        let info = self.registry.resolve(token)?;
        self.price_token(&info, deadline).await
    }

    /// Price a resolved token: cache first, then each tier in order
    pub async fn price_token(&self, token: &TokenInfo, deadline: Option<Instant>) -> AppResult<PriceQuote> {
        if let Some(quote) = self.cache.get(&token.price_symbol) {
            return Ok(quote);
        }

        for source in &self.sources {
            let budget = self.budget(deadline).ok_or_else(|| {
                warn!("⏰ Deadline reached before {} tier for {}", source.name(), token.price_symbol);
                AppError::price_deadline_exceeded(&token.price_symbol)
            })?;

            match timeout(budget, source.attempt(token)).await {
                Ok(Ok(price)) if price.is_finite() && price > 0.0 => {
                    let quote = PriceQuote {
                        symbol: token.price_symbol.clone(),
                        price,
                        source_tier: source.tier(),
                        timestamp: self.cache.now(),
                    };
                    info!("💲 {} = ${} via {}", quote.symbol, price, source.name());
                    self.cache.set(quote.clone());
                    return Ok(quote);
                }
                Ok(Ok(price)) => {
                    debug!("⏭️ {} returned unusable price {} for {}", source.name(), price, token.price_symbol);
                }
                Ok(Err(e)) => {
                    debug!("⏭️ {} failed for {}: {}", source.name(), token.price_symbol, e);
                }
                Err(_) => {
                    debug!("⏭️ {} timed out after {:?} for {}", source.name(), budget, token.price_symbol);
                }
            }
        }

        warn!("❌ All price tiers failed for {}", token.price_symbol);
        Err(AppError::price_unavailable(&token.price_symbol))
    }

    /// Quote for trading `amount_in` raw units of `token_in` into `token_out`
    pub async fn quote_swap(&self, token_in: &str, token_out: &str, amount_in: U256) -> AppResult<SwapQuote> {
        let token_in = self.registry.resolve(token_in)?;
        let token_out = self.registry.resolve(token_out)?;
        self.quote_swap_tokens(&token_in, &token_out, amount_in, None).await
    }

    pub async fn quote_swap_tokens(
        &self,
        token_in: &TokenInfo,
        token_out: &TokenInfo,
        amount_in: U256,
        deadline: Option<Instant>,
    ) -> AppResult<SwapQuote> {
        for source in &self.sources {
            let budget = self
                .budget(deadline)
                .ok_or_else(|| AppError::price_deadline_exceeded(&token_in.price_symbol))?;

            match timeout(budget, source.quote_swap(token_in, token_out, amount_in)).await {
                Ok(Ok(quote)) => {
                    debug!(
                        "📈 {}→{} impact {:.4}% via {}",
                        token_in.symbol,
                        token_out.symbol,
                        quote.price_impact * 100.0,
                        source.name()
                    );
                    return Ok(quote);
                }
                Ok(Err(e)) => debug!("⏭️ {} cannot quote {}→{}: {}", source.name(), token_in.symbol, token_out.symbol, e),
                Err(_) => debug!("⏭️ {} swap quote timed out", source.name()),
            }
        }
        Err(AppError::price_unavailable(&format!("{}→{}", token_in.symbol, token_out.symbol)))
    }

    /// USD value of a raw token amount
    pub async fn usd_value(&self, token: &TokenInfo, amount: U256, deadline: Option<Instant>) -> AppResult<f64> {
        let quote = self.price_token(token, deadline).await?;
        Ok(to_units(amount, token.decimals) * quote.price)
    }

    /// Time left for the next attempt, `None` once the deadline has passed
    fn budget(&self, deadline: Option<Instant>) -> Option<Duration> {
        match deadline {
            None => Some(self.call_timeout),
            Some(d) => {
                let remaining = d.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    None
                } else {
                    Some(remaining.min(self.call_timeout))
                }
            }
        }
    }
}

impl std::fmt::Debug for PriceOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriceOracle")
            .field("chain_id", &self.registry.chain_id())
            .field("sources", &self.source_names())
            .field("call_timeout", &self.call_timeout)
            .finish()
    }
}

fn parse_address(raw: &str) -> AppResult<Address> {
    Address::from_str(raw).map_err(|_| AppError::invalid_config(format!("Invalid contract address: {}", raw)))
}
