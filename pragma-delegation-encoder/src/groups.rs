//! Caveat group builders. Every caveat inside a group must hold (AND).

use alloy_primitives::{Address, Bytes, U256};
use pragma_delegation_types::{
    constants::{
        ALLOWED_CALLDATA_ENFORCER, ALLOWED_METHODS_ENFORCER, ALLOWED_TARGETS_ENFORCER,
        APPROVE_SELECTOR, ERC20_TRANSFER_SELECTOR, NATIVE_TOKEN_TRANSFER_AMOUNT_ENFORCER,
        TRANSFER_RECIPIENT_OFFSET,
    },
    Caveat, CaveatGroup, Selector,
};

use crate::encoding::{address_word, encode_u256, pack_addresses, pack_selectors};

/// `AllowedMethodsEnforcer` caveat for the given selectors.
pub fn allowed_methods(selectors: &[Selector]) -> Caveat {
    Caveat::new(ALLOWED_METHODS_ENFORCER, pack_selectors(selectors))
}

/// `AllowedTargetsEnforcer` caveat for the given contracts.
pub fn allowed_targets(targets: &[Address]) -> Caveat {
    Caveat::new(ALLOWED_TARGETS_ENFORCER, pack_addresses(targets))
}

/// `AllowedCalldataEnforcer` caveat: calldata at `offset` must equal `value`.
///
/// Terms: `uint256 offset || value`.
pub fn allowed_calldata(offset: u64, value: &[u8]) -> Caveat {
    let mut terms = Vec::with_capacity(32 + value.len());
    terms.extend_from_slice(&encode_u256(U256::from(offset)));
    terms.extend_from_slice(value);
    Caveat::new(ALLOWED_CALLDATA_ENFORCER, terms)
}

/// `NativeTokenTransferAmountEnforcer` caveat capping the native value of a call.
pub fn native_transfer_amount(max_amount: U256) -> Caveat {
    Caveat::new(NATIVE_TOKEN_TRANSFER_AMOUNT_ENFORCER, Bytes::from(encode_u256(max_amount).to_vec()))
}

/// `approve()` on any target.
pub fn build_approve_group() -> CaveatGroup {
    CaveatGroup::new(vec![allowed_methods(&[APPROVE_SELECTOR])])
}

/// Trading calls: only `targets`, only `selectors`.
pub fn build_trading_group(targets: &[Address], selectors: &[Selector]) -> CaveatGroup {
    CaveatGroup::new(vec![allowed_targets(targets), allowed_methods(selectors)])
}

/// ERC-20 `transfer` whose first argument is exactly `recipient`.
pub fn build_erc20_transfer_group(recipient: Address) -> CaveatGroup {
    CaveatGroup::new(vec![
        allowed_methods(&[ERC20_TRANSFER_SELECTOR]),
        allowed_calldata(TRANSFER_RECIPIENT_OFFSET, &address_word(recipient)),
    ])
}

/// Plain native transfer to `recipient`, at most `max_amount` wei.
pub fn build_native_transfer_group(recipient: Address, max_amount: U256) -> CaveatGroup {
    CaveatGroup::new(vec![allowed_targets(&[recipient]), native_transfer_amount(max_amount)])
}
