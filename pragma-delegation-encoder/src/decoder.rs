//! Decoders for the terms produced by [`crate::builder`].

use alloy_sol_types::SolValue;
use pragma_delegation_types::CaveatGroup;

use crate::{abi, errors::DecodeError};

/// Inverse of [`crate::builder::encode_logical_or_terms`].
pub fn decode_logical_or_terms(terms: &[u8]) -> Result<Vec<CaveatGroup>, DecodeError> {
    let groups = Vec::<abi::CaveatGroup>::abi_decode(terms, true)
        .map_err(|e| DecodeError::Abi(e.to_string()))?;
    Ok(groups.into_iter().map(CaveatGroup::from).collect())
}

/// Inverse of [`crate::builder::encode_timestamp_terms`]; returns `(after, before)`.
pub fn decode_timestamp_terms(terms: &[u8]) -> Result<(u128, u128), DecodeError> {
    let mut i = 0usize;
    let after = read_u128(terms, &mut i)?;
    let before = read_u128(terms, &mut i)?;
    if i != terms.len() {
        return Err(DecodeError::TrailingBytes);
    }
    Ok((after, before))
}

fn read_u128(bytes: &[u8], i: &mut usize) -> Result<u128, DecodeError> {
    if bytes.len() < *i + 16 {
        return Err(DecodeError::Truncated);
    }
    let mut buf = [0u8; 16];
    buf.copy_from_slice(&bytes[*i..*i + 16]);
    *i += 16;
    Ok(u128::from_be_bytes(buf))
}
