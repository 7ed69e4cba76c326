//! Pragma delegation builder.
//!
//! Turns trading intent (protocols, spend caps, expiry, transfer whitelist) into a root
//! delegation in two parallel forms: the machine-encoded [`UnsignedDelegation`] submitted
//! on-chain after signing, and the EIP-712 [`TypedDelegation`] the delegator signs.

pub mod abi;
pub mod builder;
pub mod decoder;
pub mod encoding;
pub mod errors;
pub mod groups;
pub mod typed_data;


pub use builder::{build_delegation, parse_native_amount, BuiltDelegation, DelegationParams};
pub use errors::{BuildError, DecodeError};
pub use pragma_delegation_types::{Caveat, CaveatGroup, Protocol, SignedDelegation, UnsignedDelegation};
pub use typed_data::{delegation_digest, unsigned_delegation_digest, TypedDelegation};
