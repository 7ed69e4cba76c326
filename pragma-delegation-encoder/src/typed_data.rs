//! EIP-712 signing payload for a root delegation, and its digest.
//!
//! The typed form drops each caveat's `args` (not part of the signed struct) and renders
//! `salt` as a decimal string. Every field that enters the digest is carried over verbatim
//! from the machine form, so both forms hash to the same value.

use alloy_primitives::{Address, Bytes, FixedBytes, B256, U256};
use pragma_delegation_types::{
    constants::{
        CHAIN_ID, DELEGATION_DOMAIN_NAME, DELEGATION_DOMAIN_VERSION, DELEGATION_MANAGER,
    },
    UnsignedDelegation,
};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

use crate::encoding::address_word;

const DOMAIN_TYPE: &[u8] =
    b"EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";
const DELEGATION_TYPE: &[u8] = b"Delegation(address delegate,address delegator,bytes32 authority,Caveat[] caveats,uint256 salt)Caveat(address enforcer,bytes terms)";
const CAVEAT_TYPE: &[u8] = b"Caveat(address enforcer,bytes terms)";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegationDomain {
    pub name: String,
    pub version: String,
    pub chain_id: u64,
    pub verifying_contract: Address,
}

impl Default for DelegationDomain {
    fn default() -> Self {
        Self {
            name: DELEGATION_DOMAIN_NAME.to_string(),
            version: DELEGATION_DOMAIN_VERSION.to_string(),
            chain_id: CHAIN_ID,
            verifying_contract: DELEGATION_MANAGER,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedField {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

impl TypedField {
    fn new(name: &str, ty: &str) -> Self {
        Self { name: name.to_string(), ty: ty.to_string() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationTypes {
    #[serde(rename = "Delegation")]
    pub delegation: Vec<TypedField>,
    #[serde(rename = "Caveat")]
    pub caveat: Vec<TypedField>,
}

impl Default for DelegationTypes {
    fn default() -> Self {
        Self {
            delegation: vec![
                TypedField::new("delegate", "address"),
                TypedField::new("delegator", "address"),
                TypedField::new("authority", "bytes32"),
                TypedField::new("caveats", "Caveat[]"),
                TypedField::new("salt", "uint256"),
            ],
            caveat: vec![TypedField::new("enforcer", "address"), TypedField::new("terms", "bytes")],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedCaveat {
    pub enforcer: Address,
    pub terms: Bytes,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationMessage {
    pub delegate: Address,
    pub delegator: Address,
    pub authority: B256,
    pub caveats: Vec<TypedCaveat>,
    #[serde(with = "decimal")]
    pub salt: U256,
}

/// `eth_signTypedData_v4` payload for a delegation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedDelegation {
    pub domain: DelegationDomain,
    pub types: DelegationTypes,
    pub primary_type: String,
    pub message: DelegationMessage,
}

impl TypedDelegation {
    pub fn from_unsigned(unsigned: &UnsignedDelegation) -> Self {
        Self {
            domain: DelegationDomain::default(),
            types: DelegationTypes::default(),
            primary_type: "Delegation".to_string(),
            message: DelegationMessage {
                delegate: unsigned.delegate,
                delegator: unsigned.delegator,
                authority: unsigned.authority,
                caveats: unsigned
                    .caveats
                    .iter()
                    .map(|c| TypedCaveat { enforcer: c.enforcer, terms: c.terms.clone() })
                    .collect(),
                salt: U256::from_be_bytes(unsigned.salt.0),
            },
        }
    }
}

fn keccak256_bytes(bytes: &[u8]) -> FixedBytes<32> {
    let mut h = Keccak256::new();
    h.update(bytes);
    let out = h.finalize();
    let mut b = [0u8; 32];
    b.copy_from_slice(out.as_slice());
    FixedBytes(b)
}

pub fn domain_separator(domain: &DelegationDomain) -> B256 {
    let mut buf = Vec::with_capacity(32 * 5);
    buf.extend_from_slice(keccak256_bytes(DOMAIN_TYPE).as_slice());
    buf.extend_from_slice(keccak256_bytes(domain.name.as_bytes()).as_slice());
    buf.extend_from_slice(keccak256_bytes(domain.version.as_bytes()).as_slice());
    buf.extend_from_slice(&U256::from(domain.chain_id).to_be_bytes::<32>());
    buf.extend_from_slice(&address_word(domain.verifying_contract));
    keccak256_bytes(&buf)
}

fn caveat_hash(enforcer: Address, terms: &[u8]) -> B256 {
    let mut buf = Vec::with_capacity(32 * 3);
    buf.extend_from_slice(keccak256_bytes(CAVEAT_TYPE).as_slice());
    buf.extend_from_slice(&address_word(enforcer));
    buf.extend_from_slice(keccak256_bytes(terms).as_slice());
    keccak256_bytes(&buf)
}

fn delegation_struct_hash<'a>(
    delegate: Address,
    delegator: Address,
    authority: B256,
    caveats: impl Iterator<Item = (Address, &'a [u8])>,
    salt: U256,
) -> B256 {
    // Arrays hash as keccak256 of the concatenated element struct hashes.
    let mut caveat_buf = Vec::new();
    for (enforcer, terms) in caveats {
        caveat_buf.extend_from_slice(caveat_hash(enforcer, terms).as_slice());
    }

    let mut buf = Vec::with_capacity(32 * 6);
    buf.extend_from_slice(keccak256_bytes(DELEGATION_TYPE).as_slice());
    buf.extend_from_slice(&address_word(delegate));
    buf.extend_from_slice(&address_word(delegator));
    buf.extend_from_slice(authority.as_slice());
    buf.extend_from_slice(keccak256_bytes(&caveat_buf).as_slice());
    buf.extend_from_slice(&salt.to_be_bytes::<32>());
    keccak256_bytes(&buf)
}

fn eip712_digest(domain_separator: B256, struct_hash: B256) -> B256 {
    let mut buf = Vec::with_capacity(2 + 32 + 32);
    buf.extend_from_slice(b"\x19\x01");
    buf.extend_from_slice(domain_separator.as_slice());
    buf.extend_from_slice(struct_hash.as_slice());
    keccak256_bytes(&buf)
}

/// Digest the delegator signs, computed from the typed payload.
pub fn delegation_digest(typed: &TypedDelegation) -> B256 {
    let m = &typed.message;
    let struct_hash = delegation_struct_hash(
        m.delegate,
        m.delegator,
        m.authority,
        m.caveats.iter().map(|c| (c.enforcer, c.terms.as_ref())),
        m.salt,
    );
    eip712_digest(domain_separator(&typed.domain), struct_hash)
}

/// Digest of the machine form under the default `DelegationManager` domain.
pub fn unsigned_delegation_digest(unsigned: &UnsignedDelegation) -> B256 {
    let struct_hash = delegation_struct_hash(
        unsigned.delegate,
        unsigned.delegator,
        unsigned.authority,
        unsigned.caveats.iter().map(|c| (c.enforcer, c.terms.as_ref())),
        U256::from_be_bytes(unsigned.salt.0),
    );
    eip712_digest(domain_separator(&DelegationDomain::default()), struct_hash)
}

mod decimal {
    use alloy_primitives::U256;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let s = String::deserialize(deserializer)?;
        U256::from_str_radix(&s, 10).map_err(D::Error::custom)
    }
}
