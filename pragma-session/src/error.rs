//! Error taxonomy of the delegation flow.
//!
//! Nothing here is retried internally; retry policy belongs to the caller.

use std::{io, path::PathBuf};

use pragma_delegation_encoder::BuildError;
use thiserror::Error;

use crate::{bridge::BridgeError, session_key::SessionKeyError};

#[derive(Debug, Error)]
pub enum DelegationError {
    #[error("{0} is required")]
    MissingParameter(&'static str),

    /// Parameters that fail to deserialize.
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error(transparent)]
    Build(#[from] BuildError),

    /// No local session key where one is required.
    #[error("session key not found at {}; run setup_session first", .0.display())]
    SignerNotFound(PathBuf),

    #[error(transparent)]
    SessionKey(SessionKeyError),

    /// Non-success response from the approval API.
    #[error("{message}")]
    Remote { status: u16, message: String },

    #[error("Delegation not yet approved (status: {0})")]
    NotApproved(String),

    #[error("Delegation approved but no signature found in API response")]
    MissingSignature,

    #[error("malformed API response: {0}")]
    MalformedResponse(String),

    #[error("request to approval API failed: {0}")]
    Transport(String),

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error("i/o at {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl DelegationError {
    /// Stable code reported to gateway and tool callers.
    pub fn code(&self) -> &'static str {
        match self {
            DelegationError::MissingParameter(_) => "MISSING_PARAM",
            DelegationError::InvalidParameters(_) | DelegationError::Build(_) => "INVALID_PARAM",
            DelegationError::SignerNotFound(_) => "SIGNER_NOT_FOUND",
            DelegationError::Remote { .. } => "API_ERROR",
            DelegationError::NotApproved(_) => "NOT_APPROVED",
            DelegationError::MissingSignature => "NO_SIGNATURE",
            DelegationError::MalformedResponse(_) => "PARSE_ERROR",
            DelegationError::SessionKey(_)
            | DelegationError::Transport(_)
            | DelegationError::Bridge(_)
            | DelegationError::Io { .. }
            | DelegationError::Json(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<SessionKeyError> for DelegationError {
    fn from(e: SessionKeyError) -> Self {
        match e {
            SessionKeyError::NotFound(path) => DelegationError::SignerNotFound(path),
            other => DelegationError::SessionKey(other),
        }
    }
}

impl From<reqwest::Error> for DelegationError {
    fn from(e: reqwest::Error) -> Self {
        DelegationError::Transport(e.to_string())
    }
}
