//! Shared types for Pragma root delegations: on-chain constants, the protocol registry,
//! and the caveat / delegation data model.

pub mod constants;
pub mod delegation;
pub mod protocols;

pub use constants::Selector;
pub use delegation::{Caveat, CaveatGroup, SignedDelegation, UnsignedDelegation};
pub use protocols::{resolve_protocols, Protocol, UnknownProtocol};
