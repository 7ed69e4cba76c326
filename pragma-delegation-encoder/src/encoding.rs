//! Fixed-width packing primitives for caveat terms.
//!
//! All multi-byte integers are big-endian. Packed lists carry no length prefix or separators.

use alloy_primitives::{Address, Bytes, U256};
use pragma_delegation_types::Selector;

use crate::errors::{BuildError, DecodeError};

pub const ADDRESS_LEN: usize = 20;
pub const SELECTOR_LEN: usize = 4;
pub const WORD_LEN: usize = 32;

/// Parse a `0x`-prefixed (or bare) 20-byte hex address. Checksums are not enforced.
pub fn parse_address(s: &str) -> Result<Address, BuildError> {
    s.trim()
        .parse::<Address>()
        .map_err(|_| BuildError::InvalidInput(format!("not a 20-byte address: {s}")))
}

/// Parse a `0x`-prefixed (or bare) 4-byte selector.
pub fn parse_selector(s: &str) -> Result<Selector, BuildError> {
    s.trim()
        .parse::<Selector>()
        .map_err(|_| BuildError::InvalidInput(format!("not a 4-byte selector: {s}")))
}

/// Concatenate 20-byte addresses in input order.
pub fn pack_addresses(addresses: &[Address]) -> Bytes {
    let mut buf = Vec::with_capacity(addresses.len() * ADDRESS_LEN);
    for address in addresses {
        buf.extend_from_slice(address.as_slice());
    }
    buf.into()
}

/// Concatenate 4-byte selectors in input order.
pub fn pack_selectors(selectors: &[Selector]) -> Bytes {
    let mut buf = Vec::with_capacity(selectors.len() * SELECTOR_LEN);
    for selector in selectors {
        buf.extend_from_slice(selector.as_slice());
    }
    buf.into()
}

pub fn unpack_addresses(bytes: &[u8]) -> Result<Vec<Address>, DecodeError> {
    if bytes.len() % ADDRESS_LEN != 0 {
        return Err(DecodeError::Misaligned { len: bytes.len(), width: ADDRESS_LEN });
    }
    Ok(bytes.chunks_exact(ADDRESS_LEN).map(Address::from_slice).collect())
}

pub fn unpack_selectors(bytes: &[u8]) -> Result<Vec<Selector>, DecodeError> {
    if bytes.len() % SELECTOR_LEN != 0 {
        return Err(DecodeError::Misaligned { len: bytes.len(), width: SELECTOR_LEN });
    }
    Ok(bytes.chunks_exact(SELECTOR_LEN).map(Selector::from_slice).collect())
}

/// 16-byte big-endian encoding.
pub fn encode_u128(value: u128) -> [u8; 16] {
    value.to_be_bytes()
}

/// 32-byte big-endian word (equivalent to `abi.encode(uint256)`).
pub fn encode_u256(value: U256) -> [u8; WORD_LEN] {
    value.to_be_bytes::<WORD_LEN>()
}

/// Address left-padded with zeroes to a 32-byte word.
pub fn address_word(address: Address) -> [u8; WORD_LEN] {
    let mut word = [0u8; WORD_LEN];
    word[WORD_LEN - ADDRESS_LEN..].copy_from_slice(address.as_slice());
    word
}
