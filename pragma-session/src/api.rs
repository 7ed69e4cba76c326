//! Remote delegation approval API.
//!
//! | call | endpoint |
//! |---|---|
//! | register session key | `POST /session-key/register` |
//! | create request | `POST /delegation/request` |
//! | poll status | `GET /delegation/request/:id/status` |
//! | fetch request | `GET /delegation/request/:id` |
//!
//! Error bodies look like `{ "error": "…" }`.

use std::fmt;

use alloy_primitives::Address;
use async_trait::async_trait;
use pragma_delegation_types::Protocol;
use reqwest::{RequestBuilder, Url};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::DelegationError;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterSessionKeyRequest {
    pub sa: Address,
    pub session_key: Address,
    pub label: String,
    pub agent_type: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDelegationRequest {
    pub sa: Address,
    pub session_key: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    /// Off-chain budget, USD.
    pub budget: f64,
    /// Gas budget in MON, as a decimal string.
    pub gas_budget: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<Value>,
    /// Seconds.
    pub duration: u64,
    pub protocols: Vec<Protocol>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON-encoded `UnsignedDelegation`.
    pub unsigned_delegation: String,
    /// JSON-encoded EIP-712 payload.
    pub typed_data: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDelegationResponse {
    pub request_id: String,
    pub approval_url: String,
    #[serde(default)]
    pub expires_in: Value,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
    Expired,
    #[serde(untagged)]
    Other(String),
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestStatus::Pending => f.write_str("pending"),
            RequestStatus::Approved => f.write_str("approved"),
            RequestStatus::Rejected => f.write_str("rejected"),
            RequestStatus::Expired => f.write_str("expired"),
            RequestStatus::Other(s) => f.write_str(s),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegationStatusResponse {
    pub request_id: String,
    pub status: RequestStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<Value>,
}

/// Server-side record of a delegation request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegationRequestRecord {
    pub status: RequestStatus,
    #[serde(default)]
    pub signature: Option<String>,
    /// JSON string as submitted (some deployments return it already parsed).
    #[serde(default)]
    pub unsigned_delegation: Value,
    /// Only guaranteed once approved.
    #[serde(default)]
    pub sa: Option<Address>,
    #[serde(default)]
    pub session_key: Option<Address>,
    #[serde(default)]
    pub duration: Value,
    #[serde(default)]
    pub protocols: Value,
}

#[derive(Deserialize)]
struct DelegationRequestEnvelope {
    request: DelegationRequestRecord,
}

/// Operations of the approval API. Every call is a fresh remote round trip.
#[async_trait]
pub trait ApprovalApi: Send + Sync {
    async fn register_session_key(&self, req: &RegisterSessionKeyRequest) -> Result<(), DelegationError>;

    async fn create_delegation_request(
        &self,
        req: &CreateDelegationRequest,
    ) -> Result<CreateDelegationResponse, DelegationError>;

    async fn delegation_status(&self, request_id: &str) -> Result<DelegationStatusResponse, DelegationError>;

    async fn delegation_request(&self, request_id: &str) -> Result<DelegationRequestRecord, DelegationError>;
}

/// `reqwest`-backed [`ApprovalApi`]. No timeout is configured; callers bound latency themselves.
#[derive(Clone, Debug)]
pub struct HttpApprovalApi {
    base: Url,
    client: reqwest::Client,
}

impl HttpApprovalApi {
    pub fn new(base_url: &str) -> Result<Self, DelegationError> {
        Self::with_client(base_url, reqwest::Client::builder().build()?)
    }

    pub fn with_client(base_url: &str, client: reqwest::Client) -> Result<Self, DelegationError> {
        let base = Url::parse(base_url)
            .map_err(|e| DelegationError::InvalidParameters(format!("api base {base_url}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(DelegationError::InvalidParameters(format!("api base {base_url} cannot be a base")));
        }
        Ok(Self { base, client })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Append path segments to the base, percent-encoding each one.
    pub fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value, DelegationError> {
        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        let body: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        debug!(status = status.as_u16(), "approval api response");

        if !status.is_success() {
            let message = match body.get("error") {
                Some(Value::String(s)) => s.clone(),
                Some(other) if !other.is_null() => other.to_string(),
                _ => format!("API returned {}", status.as_u16()),
            };
            return Err(DelegationError::Remote { status: status.as_u16(), message });
        }
        Ok(body)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, DelegationError> {
        let body = self.send(request).await?;
        serde_json::from_value(body).map_err(|e| DelegationError::MalformedResponse(e.to_string()))
    }
}

#[async_trait]
impl ApprovalApi for HttpApprovalApi {
    async fn register_session_key(&self, req: &RegisterSessionKeyRequest) -> Result<(), DelegationError> {
        let url = self.endpoint(&["session-key", "register"]);
        self.send(self.client.post(url).json(req)).await?;
        Ok(())
    }

    async fn create_delegation_request(
        &self,
        req: &CreateDelegationRequest,
    ) -> Result<CreateDelegationResponse, DelegationError> {
        let url = self.endpoint(&["delegation", "request"]);
        self.send_json(self.client.post(url).json(req)).await
    }

    async fn delegation_status(&self, request_id: &str) -> Result<DelegationStatusResponse, DelegationError> {
        let url = self.endpoint(&["delegation", "request", request_id, "status"]);
        self.send_json(self.client.get(url)).await
    }

    async fn delegation_request(&self, request_id: &str) -> Result<DelegationRequestRecord, DelegationError> {
        let url = self.endpoint(&["delegation", "request", request_id]);
        let envelope: DelegationRequestEnvelope = self.send_json(self.client.get(url)).await?;
        Ok(envelope.request)
    }
}
