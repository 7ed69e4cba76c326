//! Static registry of supported protocols and the contracts/selectors each one unlocks.

use core::fmt;
use core::str::FromStr;

use alloy_primitives::{fixed_bytes, Address};
use serde::{Deserialize, Serialize};

use crate::constants::{Selector, DEX_AGGREGATOR, LEVERUP_DIAMOND, NADFUN_ROUTER, WMON};

const LEVERUP_SELECTORS: [Selector; 7] = [
    fixed_bytes!("ca004414"),
    fixed_bytes!("5177fd3b"),
    fixed_bytes!("e1379570"),
    fixed_bytes!("2f745df6"),
    fixed_bytes!("f37afc20"),
    fixed_bytes!("4584eff6"),
    fixed_bytes!("54688625"),
];
const NADFUN_SELECTORS: [Selector; 2] = [fixed_bytes!("6df9e92b"), fixed_bytes!("5de3085d")];
const WMON_SELECTORS: [Selector; 2] = [fixed_bytes!("d0e30db0"), fixed_bytes!("2e1a7d4d")];
const DEX_SELECTORS: [Selector; 2] = [fixed_bytes!("1fff991f"), fixed_bytes!("2213bc0b")];

/// A protocol the session key may trade on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Dex,
    Leverup,
    Nadfun,
    Wmon,
}

impl Protocol {
    pub const ALL: [Protocol; 4] = [Protocol::Dex, Protocol::Leverup, Protocol::Nadfun, Protocol::Wmon];

    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Dex => "dex",
            Protocol::Leverup => "leverup",
            Protocol::Nadfun => "nadfun",
            Protocol::Wmon => "wmon",
        }
    }

    pub fn targets(self) -> &'static [Address] {
        match self {
            Protocol::Dex => &[DEX_AGGREGATOR],
            Protocol::Leverup => &[LEVERUP_DIAMOND],
            Protocol::Nadfun => &[NADFUN_ROUTER],
            Protocol::Wmon => &[WMON],
        }
    }

    pub fn selectors(self) -> &'static [Selector] {
        match self {
            Protocol::Dex => &DEX_SELECTORS,
            Protocol::Leverup => &LEVERUP_SELECTORS,
            Protocol::Nadfun => &NADFUN_SELECTORS,
            Protocol::Wmon => &WMON_SELECTORS,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownProtocol(pub String);

impl fmt::Display for UnknownProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown protocol: {}", self.0)
    }
}

impl std::error::Error for UnknownProtocol {}

impl FromStr for Protocol {
    type Err = UnknownProtocol;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dex" => Ok(Protocol::Dex),
            "leverup" => Ok(Protocol::Leverup),
            "nadfun" => Ok(Protocol::Nadfun),
            "wmon" => Ok(Protocol::Wmon),
            other => Err(UnknownProtocol(other.to_string())),
        }
    }
}

/// Resolve raw protocol identifiers against the registry.
///
/// Unknown identifiers are dropped. If nothing valid remains, every known protocol is selected.
pub fn resolve_protocols<I, S>(raw: I) -> Vec<Protocol>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let valid: Vec<Protocol> = raw
        .into_iter()
        .filter_map(|p| p.as_ref().parse().ok())
        .collect();
    if valid.is_empty() {
        Protocol::ALL.to_vec()
    } else {
        valid
    }
}
