//! Root delegation assembler.
//!
//! Layout of the produced caveats (order is significant to verifiers):
//! 1. `LogicalOrWrapperEnforcer` over `[approve, trading, (erc20 transfer, native transfer)*]`
//! 2. `TimestampEnforcer` (`uint128 after || uint128 before`, packed)
//! 3. `LimitedCallsEnforcer` (`uint256`)
//! 4. `ValueLteEnforcer` (`uint256`, wei)

use alloy_primitives::{utils::parse_ether, Address, Bytes, U256};
use alloy_sol_types::SolValue;
use pragma_delegation_types::{
    constants::{
        APPROVE_SELECTOR, BASELINE_TARGETS, ERC20_TRANSFER_SELECTOR, LIMITED_CALLS_ENFORCER,
        LOGICAL_OR_WRAPPER_ENFORCER, SECONDS_PER_DAY, TIMESTAMP_ENFORCER, VALUE_LTE_ENFORCER,
    },
    resolve_protocols, Caveat, CaveatGroup, Protocol, Selector, UnsignedDelegation,
};

use crate::{
    abi,
    encoding::{encode_u128, encode_u256},
    errors::BuildError,
    groups::{
        build_approve_group, build_erc20_transfer_group, build_native_transfer_group,
        build_trading_group,
    },
    typed_data::TypedDelegation,
};

/// High-level delegation intent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DelegationParams {
    /// Granting smart account.
    pub delegator: Address,
    /// Session key that will redeem the delegation.
    pub delegate: Address,
    /// Empty selects every known protocol.
    pub protocols: Vec<Protocol>,
    pub expiry_days: u64,
    pub max_calls: u64,
    /// Per-transaction native value ceiling, in wei.
    pub max_value_per_tx: U256,
    pub enable_transfers: bool,
    /// `None` whitelists the delegate itself.
    pub transfer_recipients: Option<Vec<Address>>,
}

impl DelegationParams {
    /// Defaults: all protocols, 7 days, 100 calls, 1 MON per tx, transfers to the delegate.
    pub fn new(delegator: Address, delegate: Address) -> Self {
        Self {
            delegator,
            delegate,
            protocols: Vec::new(),
            expiry_days: 7,
            max_calls: 100,
            max_value_per_tx: U256::from(1_000_000_000_000_000_000u128),
            enable_transfers: true,
            transfer_recipients: None,
        }
    }
}

/// Both representations of a freshly built delegation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuiltDelegation {
    pub unsigned: UnsignedDelegation,
    pub typed_data: TypedDelegation,
    /// Protocols after registry resolution.
    pub protocols: Vec<Protocol>,
    /// Unix seconds after which the timestamp caveat fails.
    pub expires_at: u64,
}

/// Convert a decimal amount of the native token to wei.
pub fn parse_native_amount(amount: f64) -> Result<U256, BuildError> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(BuildError::InvalidAmount(format!("{amount} is not a non-negative amount")));
    }
    parse_ether(&amount.to_string()).map_err(|e| BuildError::InvalidAmount(format!("{amount}: {e}")))
}

/// Build the root delegation, with the validity window starting at `issued_at` (unix seconds).
pub fn build_delegation(params: &DelegationParams, issued_at: u64) -> Result<BuiltDelegation, BuildError> {
    if params.expiry_days == 0 {
        return Err(BuildError::InvalidParameter("expiry must be at least one day".into()));
    }
    let expires_at = params
        .expiry_days
        .checked_mul(SECONDS_PER_DAY)
        .and_then(|d| issued_at.checked_add(d))
        .ok_or_else(|| BuildError::InvalidParameter("expiry overflows".into()))?;

    let protocols = resolve_protocols(params.protocols.iter().map(|p| p.as_str()));
    let (targets, selectors) = trading_scope(&protocols);

    let mut groups = vec![build_approve_group(), build_trading_group(&targets, &selectors)];

    if params.enable_transfers {
        let recipients = params
            .transfer_recipients
            .clone()
            .unwrap_or_else(|| vec![params.delegate]);
        for recipient in recipients {
            groups.push(build_erc20_transfer_group(recipient));
            groups.push(build_native_transfer_group(recipient, params.max_value_per_tx));
        }
    }

    let caveats = vec![
        Caveat::new(LOGICAL_OR_WRAPPER_ENFORCER, encode_logical_or_terms(&groups)),
        Caveat::new(TIMESTAMP_ENFORCER, encode_timestamp_terms(0, expires_at as u128)),
        Caveat::new(LIMITED_CALLS_ENFORCER, Bytes::from(encode_u256(U256::from(params.max_calls)).to_vec())),
        Caveat::new(VALUE_LTE_ENFORCER, Bytes::from(encode_u256(params.max_value_per_tx).to_vec())),
    ];

    let unsigned = UnsignedDelegation::root(params.delegate, params.delegator, caveats);
    let typed_data = TypedDelegation::from_unsigned(&unsigned);

    Ok(BuiltDelegation { unsigned, typed_data, protocols, expires_at })
}

/// Targets and selectors of the trading group, deduplicated, baseline first.
fn trading_scope(protocols: &[Protocol]) -> (Vec<Address>, Vec<Selector>) {
    let mut targets: Vec<Address> = BASELINE_TARGETS.to_vec();
    let mut selectors: Vec<Selector> = vec![ERC20_TRANSFER_SELECTOR, APPROVE_SELECTOR];

    for protocol in protocols {
        for target in protocol.targets() {
            if !targets.contains(target) {
                targets.push(*target);
            }
        }
        for selector in protocol.selectors() {
            if !selectors.contains(selector) {
                selectors.push(*selector);
            }
        }
    }
    (targets, selectors)
}

/// `abi.encode(CaveatGroup[])`: the delegation holds if any one group passes.
pub fn encode_logical_or_terms(groups: &[CaveatGroup]) -> Bytes {
    let groups: Vec<abi::CaveatGroup> = groups.iter().map(abi::CaveatGroup::from).collect();
    groups.abi_encode().into()
}

/// `uint128 after || uint128 before`, packed (not two ABI words).
pub fn encode_timestamp_terms(after: u128, before: u128) -> Bytes {
    let mut terms = Vec::with_capacity(32);
    terms.extend_from_slice(&encode_u128(after));
    terms.extend_from_slice(&encode_u128(before));
    terms.into()
}
