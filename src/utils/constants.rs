//! Constants Module - Single Source of Truth
//!
//! Chain ids, contract addresses, token tables, static price fallbacks and
//! every numeric band used by the risk pipeline live here. Other modules
//! read from this file instead of hardcoding values.

use alloy_primitives::{b256, Address, B256, U256};
use std::str::FromStr;

use crate::models::types::ProtocolType;

// ============================================
// APPLICATION CONSTANTS
// ============================================

/// Application name
pub const APP_NAME: &str = "TxRiskGate";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// User-Agent for outbound HTTP requests
pub const USER_AGENT: &str = concat!("TxRiskGate/", env!("CARGO_PKG_VERSION"));

// ============================================
// TIMEOUTS & CACHE
// ============================================

/// Per-call timeout for chain reads (seconds)
pub const DEFAULT_RPC_TIMEOUT_SECS: u64 = 5;

/// Timeout for the trace simulation service (seconds)
pub const SIMULATION_TIMEOUT_SECS: u64 = 10;

/// Price cache TTL (seconds)
pub const DEFAULT_PRICE_CACHE_TTL_SECS: u64 = 300;

// ============================================
// CHAIN IDS
// ============================================

/// Flare mainnet
pub const CHAIN_ID_FLARE: u64 = 14;
/// Songbird canary network
pub const CHAIN_ID_SONGBIRD: u64 = 19;
/// Coston2 testnet
pub const CHAIN_ID_COSTON2: u64 = 114;

pub const SUPPORTED_CHAIN_IDS: [u64; 3] = [CHAIN_ID_FLARE, CHAIN_ID_SONGBIRD, CHAIN_ID_COSTON2];

/// Get chain name
pub fn get_chain_name(chain_id: u64) -> &'static str {
    match chain_id {
        CHAIN_ID_FLARE => "flare",
        CHAIN_ID_SONGBIRD => "songbird",
        CHAIN_ID_COSTON2 => "coston2",
        _ => "unknown",
    }
}

/// Get native token symbol
pub fn get_native_symbol(chain_id: u64) -> &'static str {
    match chain_id {
        CHAIN_ID_SONGBIRD => "SGB",
        CHAIN_ID_COSTON2 => "C2FLR",
        _ => "FLR",
    }
}

/// Public RPC endpoint per chain
pub fn get_default_rpc_url(chain_id: u64) -> &'static str {
    match chain_id {
        CHAIN_ID_SONGBIRD => "https://songbird-api.flare.network/ext/C/rpc",
        CHAIN_ID_COSTON2 => "https://coston2-api.flare.network/ext/C/rpc",
        _ => "https://flare-api.flare.network/ext/C/rpc",
    }
}

#[inline]
pub fn is_chain_supported(chain_id: u64) -> bool {
    SUPPORTED_CHAIN_IDS.contains(&chain_id)
}

// ============================================
// TOKENS
// ============================================

/// Sentinel used in token fields for the chain's base currency
pub const NATIVE_TOKEN: Address = Address::ZERO;

/// Static token table entry
#[derive(Debug, Clone, Copy)]
pub struct TokenEntry {
    pub symbol: &'static str,
    pub address: &'static str,
    pub decimals: u8,
    /// Symbol used for price lookups and as the price cache key
    pub price_symbol: &'static str,
}

const fn token(
    symbol: &'static str,
    address: &'static str,
    decimals: u8,
    price_symbol: &'static str,
) -> TokenEntry {
    TokenEntry { symbol, address, decimals, price_symbol }
}

const FLARE_TOKENS: [TokenEntry; 7] = [
    token("FLR", "0x0000000000000000000000000000000000000000", 18, "FLR"),
    token("WFLR", "0x1D80c49BbBCd1C0911346656B529DF9E5c2F783d", 18, "FLR"),
    token("USDC", "0xe3F5a90F9cb311505cd691a46596599aA1A0AD7D", 6, "USDC"),
    token("USDT", "0xC26F2AbA4C47996AbCA7Db8d8b18B2820F8C0eaa", 6, "USDT"),
    token("DAI", "0x8a4476cF38a7A8Ab7671C7e1633B3F8Cfa95fA29", 18, "DAI"),
    token("WETH", "0x8D5E1225981359591A595D86166F7122A6B3B74d", 18, "ETH"),
    token("WBTC", "0x735a3cD0D1287C4A8bA3cdB793CEf8e0C1eFB127", 8, "BTC"),
];

const SONGBIRD_TOKENS: [TokenEntry; 4] = [
    token("SGB", "0x0000000000000000000000000000000000000000", 18, "SGB"),
    token("WSGB", "0x02f0826ef6aD107Cfc861152B32B52fD11BaB9ED", 18, "SGB"),
    token("USDC", "0xDC42728B0eA910349ed3c6e1c9Dc06b5FB591f98", 6, "USDC"),
    token("USDT", "0xC1aAE51746c2c1e2F9F8d9a3F75b2deAa5C3B2fE", 6, "USDT"),
];

const COSTON2_TOKENS: [TokenEntry; 4] = [
    token("C2FLR", "0x0000000000000000000000000000000000000000", 18, "FLR"),
    token("WC2FLR", "0x1D80c49BbBCd1C0911346656B529DF9E5c2F783d", 18, "FLR"),
    token("USDC", "0xe3F5a90F9cb311505cd691a46596599aA1A0AD7D", 6, "USDC"),
    token("USDT", "0xC26F2AbA4C47996AbCA7Db8d8b18B2820F8C0eaa", 6, "USDT"),
];

/// Token table for a chain (native first, wrapped native second)
pub fn get_token_table(chain_id: u64) -> &'static [TokenEntry] {
    match chain_id {
        CHAIN_ID_SONGBIRD => &SONGBIRD_TOKENS,
        CHAIN_ID_COSTON2 => &COSTON2_TOKENS,
        _ => &FLARE_TOKENS,
    }
}

// ============================================
// KNOWN PROTOCOLS
// ============================================

/// Audited protocol contract
#[derive(Debug, Clone, Copy)]
pub struct ProtocolEntry {
    pub name: &'static str,
    pub address: &'static str,
    pub protocol_type: ProtocolType,
}

pub const KNOWN_PROTOCOLS: [ProtocolEntry; 4] = [
    ProtocolEntry {
        name: "sparkdex",
        address: "0x9A7B675619d3633304134155c6c976E9b4c1cfB3",
        protocol_type: ProtocolType::Dex,
    },
    ProtocolEntry {
        name: "kinetic",
        address: "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266",
        protocol_type: ProtocolType::Lending,
    },
    ProtocolEntry {
        name: "cyclo",
        address: "0x8626f6940E2eb28930eFb4CeF49B2d1F2C9C1199",
        protocol_type: ProtocolType::Staking,
    },
    ProtocolEntry {
        name: "raindex",
        address: "0xdD2FD4581271e230360230F9337D5c0430Bf44C0",
        protocol_type: ProtocolType::Dex,
    },
];

/// Check whether a protocol name belongs to the audited set
pub fn is_known_protocol(name: &str) -> bool {
    KNOWN_PROTOCOLS.iter().any(|p| p.name.eq_ignore_ascii_case(name))
}

// ============================================
// PRICE SOURCES
// ============================================

/// Uniswap-V2 style router + factory used for quotes
#[derive(Debug, Clone, Copy)]
pub struct DexContracts {
    pub name: &'static str,
    pub router: &'static str,
    pub factory: &'static str,
}

pub fn get_dex_contracts(chain_id: u64) -> Option<DexContracts> {
    match chain_id {
        CHAIN_ID_FLARE | CHAIN_ID_COSTON2 => Some(DexContracts {
            name: "sparkdex",
            router: "0x9A7B675619d3633304134155c6c976E9b4c1cfB3",
            factory: "0x0987654321098765432109876543210987654321",
        }),
        _ => None,
    }
}

/// FTSO registry (resolves the current price provider)
pub fn get_ftso_registry(chain_id: u64) -> Option<Address> {
    let addr = match chain_id {
        CHAIN_ID_FLARE => "0xDf37E9878D52C55D6C708DaE1A0D5A9347085F92",
        CHAIN_ID_SONGBIRD => "0x1D21Ec4fd89679A2018E34D1edD3e01d42aD1d73",
        _ => return None,
    };
    Address::from_str(addr).ok()
}

/// Round-based USD price feeds, keyed by price symbol
pub const ROUND_PRICE_FEEDS: [(&str, &str); 3] = [
    ("FLR", "0x9fB3Fad37D35e44220e477DBC53059819233D3f6"),
    ("ETH", "0xE96C81f228bbC41ee027d3F4Fb1aFE0C89a43b90"),
    ("BTC", "0xdBF4E1eDe4710A1EaC3D220480Ab0566296A9d39"),
];

/// Approximate last-resort USD prices
pub const STATIC_USD_PRICES: [(&str, f64); 7] = [
    ("FLR", 1.25),
    ("SGB", 0.02),
    ("USDC", 1.0),
    ("USDT", 1.0),
    ("DAI", 1.0),
    ("ETH", 3500.0),
    ("BTC", 68000.0),
];

pub fn get_static_price(price_symbol: &str) -> Option<f64> {
    STATIC_USD_PRICES
        .iter()
        .find(|(s, _)| s.eq_ignore_ascii_case(price_symbol))
        .map(|(_, p)| *p)
}

/// Constant-product pool fee (basis points)
pub const DEFAULT_POOL_FEE_BPS: u32 = 30;

// ============================================
// SIMULATION
// ============================================

pub const TENDERLY_API_BASE: &str = "https://api.tenderly.co/api/v1";

/// keccak256("Transfer(address,address,uint256)")
pub const TRANSFER_EVENT_TOPIC: B256 =
    b256!("ddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef");

/// Gas limit used when the transaction carries none
pub const DEFAULT_SIMULATION_GAS: u64 = 3_000_000;

// ============================================
// RISK BANDS
// ============================================

/// Minimum gas for any transaction
pub const MIN_GAS_LIMIT: u64 = 21_000;

/// Size bands, compared against USD value or whole native units
pub const LARGE_VALUE_HIGH: f64 = 1_000_000.0;
pub const LARGE_VALUE_MEDIUM: f64 = 100_000.0;

/// Slippage bands (percent)
pub const SLIPPAGE_LOW_MAX_PCT: f64 = 1.0;
pub const SLIPPAGE_MEDIUM_MAX_PCT: f64 = 3.0;
pub const SLIPPAGE_HIGH_MAX_PCT: f64 = 10.0;

// ============================================
// CONVERSION UTILITIES
// ============================================

/// Lossy U256 -> f64
#[inline]
pub fn u256_to_f64(value: U256) -> f64 {
    match u128::try_from(value) {
        Ok(v) => v as f64,
        Err(_) => value.to_string().parse::<f64>().unwrap_or(f64::MAX),
    }
}

/// Convert a raw token amount into whole units
#[inline]
pub fn to_units(amount: U256, decimals: u8) -> f64 {
    u256_to_f64(amount) / 10f64.powi(decimals as i32)
}

/// 10^decimals as U256
#[inline]
pub fn unit(decimals: u8) -> U256 {
    U256::from(10u64).pow(U256::from(decimals))
}
