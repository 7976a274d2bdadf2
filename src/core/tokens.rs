//! Per-network token registry
//!
//! Resolves user-facing symbols and contract addresses to
//! `{symbol, address, decimals, price_symbol}`. The native sentinel and
//! the wrapped native token share one price symbol, which is also the
//! price cache key.

use alloy_primitives::Address;
use std::str::FromStr;

use crate::models::errors::{AppError, AppResult};
use crate::models::types::TokenRef;
use crate::utils::constants::{get_token_table, NATIVE_TOKEN};

/// Decimals assumed for contracts outside the registry
pub const DEFAULT_TOKEN_DECIMALS: u8 = 18;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    pub symbol: String,
    pub address: Address,
    pub decimals: u8,
    pub price_symbol: String,
    /// Present in the static registry
    pub listed: bool,
}

impl TokenInfo {
    pub fn is_native(&self) -> bool {
        self.address == NATIVE_TOKEN
    }
}

#[derive(Debug, Clone)]
pub struct TokenRegistry {
    chain_id: u64,
    tokens: Vec<TokenInfo>,
}

impl TokenRegistry {
    /// Registry for a chain from the static token tables
    pub fn for_chain(chain_id: u64) -> Self {
        let tokens = get_token_table(chain_id)
            .iter()
            .filter_map(|t| {
                Address::from_str(t.address).ok().map(|address| TokenInfo {
                    symbol: t.symbol.to_string(),
                    address,
                    decimals: t.decimals,
                    price_symbol: t.price_symbol.to_string(),
                    listed: true,
                })
            })
            .collect();
        Self { chain_id, tokens }
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn tokens(&self) -> &[TokenInfo] {
        &self.tokens
    }

    /// Native currency entry (first table row)
    pub fn native(&self) -> Option<&TokenInfo> {
        self.tokens.iter().find(|t| t.is_native())
    }

    /// Wrapped native entry (second table row)
    pub fn wrapped_native(&self) -> Option<&TokenInfo> {
        self.tokens.get(1)
    }

    /// USD stablecoin used as the quote side
    pub fn usd_quote(&self) -> Option<&TokenInfo> {
        self.by_symbol("USDC")
    }

    pub fn by_symbol(&self, symbol: &str) -> Option<&TokenInfo> {
        let symbol = symbol.trim();
        self.tokens.iter().find(|t| t.symbol.eq_ignore_ascii_case(symbol))
    }

    pub fn by_address(&self, address: &Address) -> Option<&TokenInfo> {
        self.tokens.iter().find(|t| &t.address == address)
    }

    /// Resolve a symbol or `0x` address. Unlisted contract addresses get
    /// default decimals and the address itself as price symbol.
    pub fn resolve(&self, query: &str) -> AppResult<TokenInfo> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::token_unresolved("<empty>"));
        }
        if let Some(info) = self.by_symbol(query) {
            return Ok(info.clone());
        }
        if query.starts_with("0x") || query.starts_with("0X") {
            let address = Address::from_str(query).map_err(|_| AppError::token_unresolved(query))?;
            return Ok(self.resolve_address(address));
        }
        Err(AppError::token_unresolved(query))
    }

    pub fn resolve_address(&self, address: Address) -> TokenInfo {
        if let Some(info) = self.by_address(&address) {
            return info.clone();
        }
        let checksum = address.to_checksum(None);
        TokenInfo {
            symbol: checksum.clone(),
            address,
            decimals: DEFAULT_TOKEN_DECIMALS,
            price_symbol: checksum,
            listed: false,
        }
    }

    pub fn resolve_ref(&self, token: &TokenRef) -> AppResult<TokenInfo> {
        match token.address() {
            Some(address) => Ok(self.resolve_address(address)),
            None => Err(AppError::token_unresolved("unknown")),
        }
    }

    /// Address used on-chain for pricing: the wrapped token stands in for
    /// the native sentinel.
    pub fn routable_address(&self, token: &TokenInfo) -> Address {
        if token.is_native() {
            self.wrapped_native().map(|w| w.address).unwrap_or(token.address)
        } else {
            token.address
        }
    }
}
