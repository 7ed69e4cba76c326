//! On-chain constants for Monad mainnet (chain id 143).

use alloy_primitives::{address, b256, fixed_bytes, Address, FixedBytes, B256};

/// 4-byte function selector.
pub type Selector = FixedBytes<4>;

pub const CHAIN_ID: u64 = 143;
pub const CHAIN_NAME: &str = "monad";

/// `DelegationManager`, the EIP-712 verifying contract for delegations.
pub const DELEGATION_MANAGER: Address = address!("db9B1e94B5b69Df7e401DDbedE43491141047dB3");
pub const DELEGATION_DOMAIN_NAME: &str = "DelegationManager";
pub const DELEGATION_DOMAIN_VERSION: &str = "1";

// Caveat enforcers.
pub const TIMESTAMP_ENFORCER: Address = address!("1046bb45C8d673d4ea75321280DB34899413c069");
pub const LIMITED_CALLS_ENFORCER: Address = address!("04658B29F6b82ed55274221a06Fc97D318E25416");
pub const VALUE_LTE_ENFORCER: Address = address!("92Bf12322527cAA612fd31a0e810472BBB106A8F");
pub const LOGICAL_OR_WRAPPER_ENFORCER: Address =
    address!("E1302607a3251AF54c3a6e69318d6aa07F5eB46c");
pub const ALLOWED_METHODS_ENFORCER: Address = address!("2c21fD0Cb9DC8445CB3fb0DC5E7Bb0Aca01842B5");
pub const ALLOWED_TARGETS_ENFORCER: Address = address!("7F20f61b1f09b08D970938F6fa563634d65c4EeB");
pub const ALLOWED_CALLDATA_ENFORCER: Address =
    address!("c2b0d624c1c4319760C96503BA27C347F3260f55");
pub const NATIVE_TOKEN_TRANSFER_AMOUNT_ENFORCER: Address =
    address!("F71af580b9c3078fbc2BBF16FbB8EEd82b330320");

// Protocol contracts.
pub const WMON: Address = address!("3bd359C1119dA7Da1D913D1C4D2B7c461115433A");
pub const LEVERUP_DIAMOND: Address = address!("ea1b8E4aB7f14F7dCA68c5B214303B13078FC5ec");
pub const DEX_AGGREGATOR: Address = address!("0000000000001fF3684f28c67538d4D072C22734");
pub const NADFUN_ROUTER: Address = address!("6F6B8F1a20703309951a5127c45B49b1CD981A22");

// Tokens.
pub const USDC: Address = address!("754704Bc059F8C67012fEd69BC8A327a5aafb603");
pub const LVUSD: Address = address!("FD44B35139Ae53FFF7d8F2A9869c503D987f00d1");
pub const LVMON: Address = address!("91b81bfbe3A747230F0529Aa28d8b2Bc898E6D56");

/// Tokens always allowed as trading targets, whatever protocols are selected.
pub const BASELINE_TARGETS: [Address; 4] = [WMON, USDC, LVUSD, LVMON];

// ERC-20 selectors.
pub const ERC20_TRANSFER_SELECTOR: Selector = fixed_bytes!("a9059cbb");
pub const APPROVE_SELECTOR: Selector = fixed_bytes!("095ea7b3");

/// `authority` value of a root delegation (no parent).
pub const ROOT_AUTHORITY: B256 =
    b256!("ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff");
/// Salt is never randomised.
pub const ZERO_SALT: B256 = B256::ZERO;

/// Byte offset of the first argument in ERC-20 `transfer` calldata.
pub const TRANSFER_RECIPIENT_OFFSET: u64 = 4;

pub const SECONDS_PER_DAY: u64 = 86_400;
