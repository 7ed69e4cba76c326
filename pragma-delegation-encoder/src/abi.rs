//! Solidity ABI mirrors of the `DelegationManager` caveat structs.
//!
//! Only used to produce and read the `LogicalOrWrapperEnforcer` terms, which are
//! `abi.encode(CaveatGroup[])`.

use alloy_sol_types::sol;
use pragma_delegation_types as types;

sol! {
    struct Caveat {
        address enforcer;
        bytes terms;
        bytes args;
    }

    struct CaveatGroup {
        Caveat[] caveats;
    }
}

impl From<&types::Caveat> for Caveat {
    fn from(c: &types::Caveat) -> Self {
        Self { enforcer: c.enforcer, terms: c.terms.clone(), args: c.args.clone() }
    }
}

impl From<Caveat> for types::Caveat {
    fn from(c: Caveat) -> Self {
        Self { enforcer: c.enforcer, terms: c.terms, args: c.args }
    }
}

impl From<&types::CaveatGroup> for CaveatGroup {
    fn from(g: &types::CaveatGroup) -> Self {
        Self { caveats: g.caveats.iter().map(Caveat::from).collect() }
    }
}

impl From<CaveatGroup> for types::CaveatGroup {
    fn from(g: CaveatGroup) -> Self {
        Self { caveats: g.caveats.into_iter().map(types::Caveat::from).collect() }
    }
}
