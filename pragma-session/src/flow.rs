//! Web-approved delegation flow.
//!
//! Four independently invocable operations. The only ordering the flow itself enforces is that
//! [`DelegationFlow::retrieve_delegation`] needs the remote request to be `approved`; everything
//! else (setup before request, poll until approved) is caller convention.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use alloy_primitives::{Address, Bytes};
use pragma_delegation_encoder::{
    build_delegation, encoding::parse_address, parse_native_amount, DelegationParams,
};
use pragma_delegation_types::{
    constants::SECONDS_PER_DAY, resolve_protocols, Protocol, SignedDelegation, UnsignedDelegation,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::{
    api::{
        ApprovalApi, CreateDelegationRequest, DelegationStatusResponse, RegisterSessionKeyRequest,
        RequestStatus,
    },
    clock::{Clock, SystemClock},
    config::record_wallet,
    error::DelegationError,
    files::write_atomic,
    session_key::SessionKeyStore,
};

const DEFAULT_LABEL: &str = "openclaw-agent";
const DEFAULT_AGENT_TYPE: &str = "pragma";
const DEFAULT_EXPIRY_DAYS: u64 = 7;
const DEFAULT_MAX_CALLS: u64 = 100;
const DEFAULT_MAX_VALUE_PER_TX_MON: f64 = 1.0;
const DEFAULT_BUDGET_USD: f64 = 100.0;
const DEFAULT_BUDGET_MON: f64 = 1.0;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupSessionParams {
    /// Smart account address. Without it the key is only ensured locally.
    #[serde(default)]
    pub sa: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub agent_type: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupSessionOutcome {
    pub address: Address,
    pub registered: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sa: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// A list of names, or a keyword such as `"all"`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Selection {
    Keyword(String),
    List(Vec<String>),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDelegationParams {
    #[serde(default)]
    pub sa: Option<String>,
    /// Default: all protocols.
    #[serde(default)]
    pub protocols: Option<Selection>,
    #[serde(default)]
    pub expiry_days: Option<u64>,
    #[serde(default)]
    pub max_calls: Option<u64>,
    #[serde(default)]
    pub max_value_per_tx_mon: Option<f64>,
    #[serde(default)]
    pub budget_usd: Option<f64>,
    #[serde(default)]
    pub budget_mon: Option<f64>,
    /// `"all"` leaves token selection to the server.
    #[serde(default)]
    pub allowed_tokens: Option<Selection>,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub enable_transfers: Option<bool>,
    /// Default: the session key itself.
    #[serde(default)]
    pub transfer_recipients: Option<Vec<String>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegationTicket {
    pub request_id: String,
    pub approval_url: String,
    pub expires_in: Value,
    pub session_key_address: Address,
    pub protocols: Vec<Protocol>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestIdParams {
    #[serde(default)]
    pub request_id: Option<String>,
}

/// Persisted at `<key dir>/delegations/root/delegation.json`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedDelegationRecord {
    pub request_id: String,
    pub signed_delegation: SignedDelegation,
    pub delegator: Address,
    pub delegate: Address,
    pub duration: Value,
    pub protocols: Value,
    /// Unix epoch milliseconds.
    pub retrieved_at: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievedDelegation {
    pub request_id: String,
    pub storage_path: PathBuf,
    pub delegator: Address,
    pub delegate: Address,
}

pub struct DelegationFlow {
    api: Arc<dyn ApprovalApi>,
    keys: SessionKeyStore,
    config_path: PathBuf,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for DelegationFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelegationFlow").field("config_path", &self.config_path).finish_non_exhaustive()
    }
}

impl DelegationFlow {
    pub fn new(api: Arc<dyn ApprovalApi>, session_key_path: impl Into<PathBuf>, config_path: impl Into<PathBuf>) -> Self {
        Self {
            api,
            keys: SessionKeyStore::new(session_key_path),
            config_path: config_path.into(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn session_keys(&self) -> &SessionKeyStore {
        &self.keys
    }

    /// Ensure a session key exists and, given a smart account, register it remotely.
    ///
    /// Recording the pairing in `config.json` afterwards is best effort: the remote registration
    /// already happened, so a local write failure is only logged.
    pub async fn setup_session(&self, params: SetupSessionParams) -> Result<SetupSessionOutcome, DelegationError> {
        let key = self.keys.ensure(self.clock.as_ref())?;

        let Some(sa) = params.sa.as_deref().filter(|s| !s.is_empty()) else {
            return Ok(SetupSessionOutcome {
                address: key.address,
                registered: false,
                sa: None,
                message: Some(
                    "Session key ready. Provide 'sa' (Smart Account address) to register with the API."
                        .to_string(),
                ),
            });
        };
        let sa = parse_address(sa)?;

        let request = RegisterSessionKeyRequest {
            sa,
            session_key: key.address,
            label: params.label.unwrap_or_else(|| DEFAULT_LABEL.to_string()),
            agent_type: params.agent_type.unwrap_or_else(|| DEFAULT_AGENT_TYPE.to_string()),
        };
        self.api.register_session_key(&request).await?;
        info!(sa = %sa, session_key = %key.address, "registered session key");

        if let Err(e) = record_wallet(&self.config_path, sa, key.address) {
            warn!(path = %self.config_path.display(), error = %e, "failed to record wallet in local config");
        }

        Ok(SetupSessionOutcome { address: key.address, registered: true, sa: Some(sa), message: None })
    }

    /// Build the delegation for the stored session key and submit it for approval.
    pub async fn request_delegation(&self, params: RequestDelegationParams) -> Result<DelegationTicket, DelegationError> {
        let key = self.keys.load()?;
        let sa = params
            .sa
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(DelegationError::MissingParameter("sa (Smart Account address)"))?;
        let delegator = parse_address(sa)?;

        let protocols = match &params.protocols {
            Some(Selection::List(list)) => resolve_protocols(list),
            _ => Protocol::ALL.to_vec(),
        };
        let transfer_recipients = params
            .transfer_recipients
            .as_ref()
            .map(|list| list.iter().map(|a| parse_address(a)).collect::<Result<Vec<_>, _>>())
            .transpose()?;
        let expiry_days = params.expiry_days.unwrap_or(DEFAULT_EXPIRY_DAYS);

        let delegation_params = DelegationParams {
            delegator,
            delegate: key.address,
            protocols,
            expiry_days,
            max_calls: params.max_calls.unwrap_or(DEFAULT_MAX_CALLS),
            max_value_per_tx: parse_native_amount(
                params.max_value_per_tx_mon.unwrap_or(DEFAULT_MAX_VALUE_PER_TX_MON),
            )?,
            enable_transfers: params.enable_transfers.unwrap_or(true),
            transfer_recipients,
        };
        let built = build_delegation(&delegation_params, self.clock.unix_seconds())?;

        let tokens = match params.allowed_tokens {
            Some(Selection::Keyword(k)) if k == "all" => None,
            Some(Selection::Keyword(k)) => Some(Value::String(k)),
            Some(Selection::List(list)) => Some(Value::from(list)),
            None => None,
        };

        let request = CreateDelegationRequest {
            sa: delegator,
            session_key: key.address,
            agent_id: params.agent_id,
            budget: params.budget_usd.unwrap_or(DEFAULT_BUDGET_USD),
            gas_budget: params.budget_mon.unwrap_or(DEFAULT_BUDGET_MON).to_string(),
            tokens,
            duration: expiry_days.saturating_mul(SECONDS_PER_DAY),
            protocols: built.protocols.clone(),
            description: params.description,
            unsigned_delegation: serde_json::to_string(&built.unsigned)?,
            typed_data: serde_json::to_string(&built.typed_data)?,
        };
        let response = self.api.create_delegation_request(&request).await?;
        info!(
            request_id = %response.request_id,
            sa = %delegator,
            expires_at = built.expires_at,
            "delegation request created"
        );

        Ok(DelegationTicket {
            request_id: response.request_id,
            approval_url: response.approval_url,
            expires_in: response.expires_in,
            session_key_address: key.address,
            protocols: built.protocols,
        })
    }

    /// Current remote status, verbatim. No local state is kept between polls.
    pub async fn poll_delegation(&self, params: RequestIdParams) -> Result<DelegationStatusResponse, DelegationError> {
        let request_id = required_request_id(&params)?;
        let status = self.api.delegation_status(request_id).await?;
        info!(request_id, status = %status.status, "polled delegation");
        Ok(status)
    }

    /// Merge the delegator's signature into the approved delegation and store it locally.
    ///
    /// Re-running for the same request rewrites the stored file with identical bytes: an existing
    /// record for the same request and signed delegation keeps its `retrievedAt`.
    pub async fn retrieve_delegation(&self, params: RequestIdParams) -> Result<RetrievedDelegation, DelegationError> {
        let request_id = required_request_id(&params)?;
        let record = self.api.delegation_request(request_id).await?;

        if record.status != RequestStatus::Approved {
            return Err(DelegationError::NotApproved(record.status.to_string()));
        }
        let signature = record
            .signature
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(DelegationError::MissingSignature)?;
        let signature: Bytes = signature
            .parse()
            .map_err(|e| DelegationError::MalformedResponse(format!("signature: {e}")))?;
        let unsigned = parse_unsigned_delegation(&record.unsigned_delegation)?;
        let delegator = record
            .sa
            .ok_or_else(|| DelegationError::MalformedResponse("approved request has no sa".into()))?;
        let delegate = record
            .session_key
            .ok_or_else(|| DelegationError::MalformedResponse("approved request has no sessionKey".into()))?;

        let path = self.keys.delegation_path();
        let signed_delegation = unsigned.with_signature(signature);
        let retrieved_at = match read_stored_record(&path) {
            Some(prev) if prev.request_id == request_id && prev.signed_delegation == signed_delegation => {
                prev.retrieved_at
            }
            _ => self.clock.unix_millis(),
        };

        let stored = SignedDelegationRecord {
            request_id: request_id.to_string(),
            signed_delegation,
            delegator,
            delegate,
            duration: record.duration,
            protocols: record.protocols,
            retrieved_at,
        };

        let bytes = serde_json::to_vec_pretty(&stored)?;
        write_atomic(&path, &bytes, true).map_err(|source| DelegationError::Io { path: path.clone(), source })?;
        info!(request_id, path = %path.display(), "stored signed delegation");

        Ok(RetrievedDelegation {
            request_id: request_id.to_string(),
            storage_path: path,
            delegator,
            delegate,
        })
    }
}

fn required_request_id(params: &RequestIdParams) -> Result<&str, DelegationError> {
    params
        .request_id
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or(DelegationError::MissingParameter("requestId"))
}

fn read_stored_record(path: &Path) -> Option<SignedDelegationRecord> {
    let raw = fs::read(path).ok()?;
    serde_json::from_slice(&raw).ok()
}

fn parse_unsigned_delegation(raw: &Value) -> Result<UnsignedDelegation, DelegationError> {
    let parsed = match raw {
        Value::String(s) => serde_json::from_str(s),
        other => serde_json::from_value(other.clone()),
    };
    parsed.map_err(|e| DelegationError::MalformedResponse(format!("unsignedDelegation: {e}")))
}
