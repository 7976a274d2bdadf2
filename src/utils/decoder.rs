//! Call-data decoder module
//!
//! Selector registry (selector -> action, protocol type, decode schema)
//! plus one small decode function per schema. Decoding goes through the
//! canonical schema for the action, so any selector mapped to that action
//! decodes the same way.

use alloy_primitives::{fixed_bytes, Address, FixedBytes, U256};
use alloy_sol_types::{sol, SolCall};

use crate::models::types::{Action, ProtocolType, TokenRef};

// Canonical parameter schemas
sol! {
    function swapExactTokensForTokens(
        uint256 amountIn,
        uint256 amountOutMin,
        address[] calldata path,
        address to,
        uint256 deadline
    ) external returns (uint256[] memory amounts);

    function addLiquidity(
        address tokenA,
        address tokenB,
        uint256 amountADesired,
        uint256 amountBDesired,
        uint256 amountAMin,
        uint256 amountBMin,
        address to,
        uint256 deadline
    ) external returns (uint256 amountA, uint256 amountB, uint256 liquidity);

    function removeLiquidity(
        address tokenA,
        address tokenB,
        uint256 liquidity,
        uint256 amountAMin,
        uint256 amountBMin,
        address to,
        uint256 deadline
    ) external returns (uint256 amountA, uint256 amountB);

    function supply(address asset, uint256 amount) external;

    function stake(uint256 amount) external;

    function transfer(address recipient, uint256 amount) external returns (bool);

    function approve(address spender, uint256 amount) external returns (bool);

    function transferFrom(address sender, address recipient, uint256 amount) external returns (bool);
}

/// Which decode function applies to a selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeSchema {
    /// (amountIn, amountOutMin, path, to, deadline)
    PathSwap,
    AddLiquidity,
    RemoveLiquidity,
    /// (asset, amount, ...)
    AssetAmount,
    /// (amount), token is the native sentinel
    AmountOnly,
    Erc20Transfer,
    Erc20Approve,
    Erc20TransferFrom,
    /// Nothing to extract
    NoOperand,
}

/// Registry row
#[derive(Debug, Clone, Copy)]
pub struct SelectorEntry {
    pub selector: FixedBytes<4>,
    pub action: Action,
    pub protocol_type: ProtocolType,
    pub schema: DecodeSchema,
}

const fn entry(
    selector: FixedBytes<4>,
    action: Action,
    protocol_type: ProtocolType,
    schema: DecodeSchema,
) -> SelectorEntry {
    SelectorEntry { selector, action, protocol_type, schema }
}

pub const SELECTOR_REGISTRY: [SelectorEntry; 15] = [
    // DEX
    entry(fixed_bytes!("38ed1739"), Action::Swap, ProtocolType::Dex, DecodeSchema::PathSwap),
    entry(fixed_bytes!("18cbafe5"), Action::Swap, ProtocolType::Dex, DecodeSchema::PathSwap),
    entry(fixed_bytes!("4a25d94a"), Action::Swap, ProtocolType::Dex, DecodeSchema::PathSwap),
    entry(fixed_bytes!("791ac947"), Action::AddLiquidity, ProtocolType::Dex, DecodeSchema::AddLiquidity),
    entry(fixed_bytes!("e8e33700"), Action::RemoveLiquidity, ProtocolType::Dex, DecodeSchema::RemoveLiquidity),
    // Lending
    entry(fixed_bytes!("a0712d68"), Action::Deposit, ProtocolType::Lending, DecodeSchema::AssetAmount),
    entry(fixed_bytes!("852a12e3"), Action::Withdraw, ProtocolType::Lending, DecodeSchema::AssetAmount),
    entry(fixed_bytes!("c04a8a10"), Action::Borrow, ProtocolType::Lending, DecodeSchema::AssetAmount),
    entry(fixed_bytes!("4e4d9fea"), Action::Repay, ProtocolType::Lending, DecodeSchema::AssetAmount),
    // Staking
    entry(fixed_bytes!("a694fc3a"), Action::Stake, ProtocolType::Staking, DecodeSchema::AmountOnly),
    entry(fixed_bytes!("3a4b66f1"), Action::Unstake, ProtocolType::Staking, DecodeSchema::AmountOnly),
    entry(fixed_bytes!("3d18b912"), Action::ClaimRewards, ProtocolType::Staking, DecodeSchema::NoOperand),
    // ERC20
    entry(fixed_bytes!("a9059cbb"), Action::Transfer, ProtocolType::Token, DecodeSchema::Erc20Transfer),
    entry(fixed_bytes!("095ea7b3"), Action::Approve, ProtocolType::Token, DecodeSchema::Erc20Approve),
    entry(fixed_bytes!("23b872dd"), Action::TransferFrom, ProtocolType::Token, DecodeSchema::Erc20TransferFrom),
];

/// Registry row for the first 4 bytes of `calldata`
pub fn lookup_selector(calldata: &[u8]) -> Option<&'static SelectorEntry> {
    if calldata.len() < 4 {
        return None;
    }
    SELECTOR_REGISTRY
        .iter()
        .find(|e| e.selector.as_slice() == &calldata[..4])
}

/// Schema that decodes a given action's arguments
pub fn schema_for_action(action: Action) -> DecodeSchema {
    SELECTOR_REGISTRY
        .iter()
        .find(|e| e.action == action)
        .map(|e| e.schema)
        .unwrap_or(DecodeSchema::NoOperand)
}

/// Parse `0x`-prefixed (or bare) hex call data. `None` on malformed input.
pub fn parse_calldata(data: &str) -> Option<Vec<u8>> {
    let trimmed = data.trim();
    let stripped = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    hex::decode(stripped).ok()
}

/// Substring search for an address inside hex call data
pub fn references_address(calldata_hex: &str, address: &Address) -> bool {
    let needle = hex::encode(address.as_slice());
    calldata_hex.to_ascii_lowercase().contains(&needle)
}

/// Operand extracted from call arguments
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DecodedOperand {
    pub token: Option<TokenRef>,
    pub amount: Option<U256>,
    pub token_out: Option<Address>,
    pub recipient: Option<Address>,
    pub min_amount_out: Option<U256>,
}

/// Call-data decoder
pub struct CalldataDecoder;

impl CalldataDecoder {
    /// Decode the arguments of `calldata` (selector included) with `schema`.
    /// `target` is the destination contract, used as the token for ERC20 calls.
    pub fn decode(schema: DecodeSchema, calldata: &[u8], target: Option<Address>) -> Option<DecodedOperand> {
        if calldata.len() < 4 {
            return None;
        }
        let args = &calldata[4..];

        match schema {
            DecodeSchema::PathSwap => Self::decode_path_swap(args),
            DecodeSchema::AddLiquidity => Self::decode_add_liquidity(args),
            DecodeSchema::RemoveLiquidity => Self::decode_remove_liquidity(args),
            DecodeSchema::AssetAmount => Self::decode_asset_amount(args),
            DecodeSchema::AmountOnly => Self::decode_amount_only(args),
            DecodeSchema::Erc20Transfer => Self::decode_transfer(args, target),
            DecodeSchema::Erc20Approve => Self::decode_approve(args, target),
            DecodeSchema::Erc20TransferFrom => Self::decode_transfer_from(args, target),
            DecodeSchema::NoOperand => None,
        }
    }

    fn decode_path_swap(args: &[u8]) -> Option<DecodedOperand> {
        let call = swapExactTokensForTokensCall::abi_decode_raw(args, false).ok()?;
        let first = *call.path.first()?;
        Some(DecodedOperand {
            token: Some(TokenRef::from_address(first)),
            amount: Some(call.amountIn),
            token_out: if call.path.len() > 1 { call.path.last().copied() } else { None },
            recipient: Some(call.to),
            min_amount_out: Some(call.amountOutMin),
        })
    }

    fn decode_add_liquidity(args: &[u8]) -> Option<DecodedOperand> {
        let call = addLiquidityCall::abi_decode_raw(args, false).ok()?;
        Some(DecodedOperand {
            token: Some(TokenRef::from_address(call.tokenA)),
            amount: Some(call.amountADesired),
            token_out: Some(call.tokenB),
            ..Default::default()
        })
    }

    fn decode_remove_liquidity(args: &[u8]) -> Option<DecodedOperand> {
        let call = removeLiquidityCall::abi_decode_raw(args, false).ok()?;
        Some(DecodedOperand {
            token: Some(TokenRef::from_address(call.tokenA)),
            amount: Some(call.liquidity),
            token_out: Some(call.tokenB),
            ..Default::default()
        })
    }

    fn decode_asset_amount(args: &[u8]) -> Option<DecodedOperand> {
        let call = supplyCall::abi_decode_raw(args, false).ok()?;
        Some(DecodedOperand {
            token: Some(TokenRef::from_address(call.asset)),
            amount: Some(call.amount),
            ..Default::default()
        })
    }

    fn decode_amount_only(args: &[u8]) -> Option<DecodedOperand> {
        let call = stakeCall::abi_decode_raw(args, false).ok()?;
        Some(DecodedOperand {
            token: Some(TokenRef::Native),
            amount: Some(call.amount),
            ..Default::default()
        })
    }

    fn decode_transfer(args: &[u8], target: Option<Address>) -> Option<DecodedOperand> {
        let call = transferCall::abi_decode_raw(args, false).ok()?;
        Some(DecodedOperand {
            token: target.map(TokenRef::from_address),
            amount: Some(call.amount),
            recipient: Some(call.recipient),
            ..Default::default()
        })
    }

    fn decode_approve(args: &[u8], target: Option<Address>) -> Option<DecodedOperand> {
        let call = approveCall::abi_decode_raw(args, false).ok()?;
        Some(DecodedOperand {
            token: target.map(TokenRef::from_address),
            amount: Some(call.amount),
            ..Default::default()
        })
    }

    fn decode_transfer_from(args: &[u8], target: Option<Address>) -> Option<DecodedOperand> {
        let call = transferFromCall::abi_decode_raw(args, false).ok()?;
        Some(DecodedOperand {
            token: target.map(TokenRef::from_address),
            amount: Some(call.amount),
            recipient: Some(call.recipient),
            ..Default::default()
        })
    }

    /// Slippage tolerance implied by a minimum-out bound, in percent
    pub fn implied_slippage_pct(quoted_out: U256, min_amount_out: U256) -> f64 {
        if quoted_out.is_zero() || min_amount_out >= quoted_out {
            return 0.0;
        }
        let diff = quoted_out - min_amount_out;
        // basis points, capped at 100%
        let bps = diff.saturating_mul(U256::from(10_000u64)) / quoted_out;
        let bps: u64 = bps.try_into().unwrap_or(10_000);
        bps.min(10_000) as f64 / 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    const WFLR: Address = address!("1D80c49BbBCd1C0911346656B529DF9E5c2F783d");
    const USDC: Address = address!("e3F5a90F9cb311505cd691a46596599aA1A0AD7D");

    fn with_selector(selector: &str, mut args: Vec<u8>) -> Vec<u8> {
        let mut data = parse_calldata(selector).unwrap();
        data.append(&mut args);
        data
    }

    fn raw_args<C: SolCall>(call: &C) -> Vec<u8> {
        let mut out = Vec::new();
        call.abi_encode_raw(&mut out);
        out
    }

    #[test]
    fn test_registry_is_complete() {
        assert_eq!(SELECTOR_REGISTRY.len(), 15);
        let swap = lookup_selector(&parse_calldata("0x18cbafe5").unwrap()).unwrap();
        assert_eq!(swap.action, Action::Swap);
        assert_eq!(swap.protocol_type, ProtocolType::Dex);
        let claim = lookup_selector(&parse_calldata("0x3d18b912").unwrap()).unwrap();
        assert_eq!(claim.action, Action::ClaimRewards);
        assert!(lookup_selector(&parse_calldata("0xdeadbeef").unwrap()).is_none());
    }

    #[test]
    fn test_short_calldata() {
        assert!(lookup_selector(&[0x38, 0xed, 0x17]).is_none());
        assert!(CalldataDecoder::decode(DecodeSchema::PathSwap, &[0x38], None).is_none());
    }

    #[test]
    fn test_parse_calldata() {
        assert_eq!(parse_calldata("0x"), Some(vec![]));
        assert_eq!(parse_calldata("0XA9"), Some(vec![0xa9]));
        assert!(parse_calldata("0xzz").is_none());
        assert!(parse_calldata("0xabc").is_none());
    }

    #[test]
    fn test_decode_path_swap() {
        let call = swapExactTokensForTokensCall {
            amountIn: U256::from(100u64),
            amountOutMin: U256::from(95u64),
            path: vec![WFLR, USDC],
            to: Address::repeat_byte(0x11),
            deadline: U256::from(1u64),
        };
        let data = with_selector("0x38ed1739", raw_args(&call));
        let op = CalldataDecoder::decode(DecodeSchema::PathSwap, &data, None).unwrap();
        assert_eq!(op.token, Some(TokenRef::Contract(WFLR)));
        assert_eq!(op.amount, Some(U256::from(100u64)));
        assert_eq!(op.token_out, Some(USDC));
        assert_eq!(op.min_amount_out, Some(U256::from(95u64)));
    }

    #[test]
    fn test_decode_transfer_uses_target() {
        let call = transferCall {
            recipient: Address::repeat_byte(0x22),
            amount: U256::from(5u64),
        };
        let data = with_selector("0xa9059cbb", raw_args(&call));
        let op = CalldataDecoder::decode(DecodeSchema::Erc20Transfer, &data, Some(USDC)).unwrap();
        assert_eq!(op.token, Some(TokenRef::Contract(USDC)));
        assert_eq!(op.recipient, Some(Address::repeat_byte(0x22)));
    }

    #[test]
    fn test_decode_stake_is_native() {
        let data = with_selector("0xa694fc3a", raw_args(&stakeCall { amount: U256::from(7u64) }));
        let op = CalldataDecoder::decode(DecodeSchema::AmountOnly, &data, None).unwrap();
        assert_eq!(op.token, Some(TokenRef::Native));
        assert_eq!(op.amount, Some(U256::from(7u64)));
    }

    #[test]
    fn test_truncated_args_fail_cleanly() {
        let data = with_selector("0x38ed1739", vec![0u8; 40]);
        assert!(CalldataDecoder::decode(DecodeSchema::PathSwap, &data, None).is_none());
    }

    #[test]
    fn test_references_address() {
        let data = format!("0xabcdef{}00", hex::encode(WFLR.as_slice()));
        assert!(references_address(&data.to_uppercase(), &WFLR));
        assert!(!references_address(&data, &USDC));
    }

    #[test]
    fn test_implied_slippage() {
        let pct = CalldataDecoder::implied_slippage_pct(U256::from(1000u64), U256::from(970u64));
        assert!((pct - 3.0).abs() < 1e-9);
        assert_eq!(CalldataDecoder::implied_slippage_pct(U256::from(1000u64), U256::from(1000u64)), 0.0);
    }

    #[test]
    fn test_schema_for_action() {
        assert_eq!(schema_for_action(Action::Borrow), DecodeSchema::AssetAmount);
        assert_eq!(schema_for_action(Action::Unknown), DecodeSchema::NoOperand);
    }
}
