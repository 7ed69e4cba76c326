//! Delegation data model (machine form).

use alloy_primitives::{Address, Bytes, B256};
use serde::{Deserialize, Serialize};

use crate::constants::{ROOT_AUTHORITY, ZERO_SALT};

/// One atomic condition checked by an on-chain enforcer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caveat {
    pub enforcer: Address,
    pub terms: Bytes,
    /// Redemption-time arguments; always empty for caveats built here.
    #[serde(default)]
    pub args: Bytes,
}

impl Caveat {
    pub fn new(enforcer: Address, terms: impl Into<Bytes>) -> Self {
        Self { enforcer, terms: terms.into(), args: Bytes::new() }
    }
}

/// Conjunctive bundle of caveats forming one permission profile.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaveatGroup {
    pub caveats: Vec<Caveat>,
}

impl CaveatGroup {
    pub fn new(caveats: Vec<Caveat>) -> Self {
        Self { caveats }
    }
}

/// Root delegation prior to signing.
///
/// Caveat order is significant: `[logical-or, timestamp, limited-calls, value-lte]`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsignedDelegation {
    pub delegate: Address,
    pub delegator: Address,
    pub authority: B256,
    pub salt: B256,
    pub caveats: Vec<Caveat>,
}

impl UnsignedDelegation {
    pub fn root(delegate: Address, delegator: Address, caveats: Vec<Caveat>) -> Self {
        Self { delegate, delegator, authority: ROOT_AUTHORITY, salt: ZERO_SALT, caveats }
    }

    pub fn with_signature(self, signature: Bytes) -> SignedDelegation {
        SignedDelegation { delegation: self, signature }
    }
}

/// Delegation with the delegator's signature attached.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedDelegation {
    #[serde(flatten)]
    pub delegation: UnsignedDelegation,
    pub signature: Bytes,
}
