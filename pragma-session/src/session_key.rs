//! File-backed secp256k1 session key.
//!
//! Stored as `{ "privateKey": "0x…", "address": "0x…", "createdAt": <epoch ms> }` with mode `0600`.
//! The same file is read by the local tool server, so the field names are fixed.

use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
};

use alloy_primitives::Address;
use k256::ecdsa::SigningKey;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use thiserror::Error;
use tracing::info;

use crate::{clock::Clock, files::write_atomic};

#[derive(Debug, Error)]
pub enum SessionKeyError {
    #[error("session key not found at {}", .0.display())]
    NotFound(PathBuf),
    #[error("invalid session key file at {}: {reason}", .path.display())]
    Invalid { path: PathBuf, reason: String },
    #[error("session key i/o at {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionKey {
    /// 32-byte secp256k1 scalar, `0x`-prefixed hex.
    pub private_key: String,
    pub address: Address,
    /// Unix epoch milliseconds.
    pub created_at: u64,
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKey")
            .field("private_key", &"<redacted>")
            .field("address", &self.address)
            .field("created_at", &self.created_at)
            .finish()
    }
}

impl SessionKey {
    /// Fresh key from OS randomness.
    pub fn generate(created_at: u64) -> Self {
        let signing_key = SigningKey::random(&mut rand::rngs::OsRng);
        Self::from_signing_key(&signing_key, created_at)
    }

    pub fn from_signing_key(signing_key: &SigningKey, created_at: u64) -> Self {
        Self {
            private_key: format!("0x{}", hex::encode(signing_key.to_bytes())),
            address: derive_address(signing_key),
            created_at,
        }
    }

    pub fn signing_key(&self) -> Result<SigningKey, String> {
        let raw = self.private_key.strip_prefix("0x").unwrap_or(&self.private_key);
        let bytes = hex::decode(raw).map_err(|e| format!("private key is not hex: {e}"))?;
        SigningKey::from_slice(&bytes).map_err(|_| "private key is not a valid secp256k1 scalar".to_string())
    }

    /// The stored address must be the one derived from the stored key.
    fn check_consistent(&self) -> Result<(), String> {
        let derived = derive_address(&self.signing_key()?);
        if derived != self.address {
            return Err(format!("address {} does not match key (expected {derived})", self.address));
        }
        Ok(())
    }
}

/// Ethereum address: last 20 bytes of keccak256 over the uncompressed public key (sans prefix).
pub fn derive_address(signing_key: &SigningKey) -> Address {
    let point = signing_key.verifying_key().to_encoded_point(false);
    let mut h = Keccak256::new();
    h.update(&point.as_bytes()[1..]);
    let hash = h.finalize();
    Address::from_slice(&hash[12..])
}

/// Partial update of a stored key. A new private key re-derives the address.
#[derive(Clone, Debug, Default)]
pub struct SessionKeyUpdate {
    pub private_key: Option<String>,
    pub created_at: Option<u64>,
}

/// Session key file at a fixed path.
#[derive(Clone, Debug)]
pub struct SessionKeyStore {
    path: PathBuf,
}

impl SessionKeyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `<dir of key file>/delegations/root/delegation.json`
    pub fn delegation_path(&self) -> PathBuf {
        self.path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join("delegations")
            .join("root")
            .join("delegation.json")
    }

    /// Load the key, generating and persisting a new one if the file does not exist.
    pub fn ensure(&self, clock: &dyn Clock) -> Result<SessionKey, SessionKeyError> {
        if self.path.exists() {
            return self.load();
        }
        let key = SessionKey::generate(clock.unix_millis());
        self.write(&key)?;
        info!(path = %self.path.display(), address = %key.address, "generated session key");
        Ok(key)
    }

    pub fn load(&self) -> Result<SessionKey, SessionKeyError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(SessionKeyError::NotFound(self.path.clone()))
            }
            Err(source) => return Err(SessionKeyError::Io { path: self.path.clone(), source }),
        };
        let key: SessionKey = serde_json::from_str(&raw).map_err(|e| self.invalid(e.to_string()))?;
        key.check_consistent().map_err(|reason| self.invalid(reason))?;
        Ok(key)
    }

    pub fn update(&self, update: SessionKeyUpdate) -> Result<SessionKey, SessionKeyError> {
        let mut key = self.load()?;
        if let Some(private_key) = update.private_key {
            let candidate = SessionKey { private_key, ..key.clone() };
            let signing_key = candidate.signing_key().map_err(|reason| self.invalid(reason))?;
            key = SessionKey::from_signing_key(&signing_key, key.created_at);
        }
        if let Some(created_at) = update.created_at {
            key.created_at = created_at;
        }
        self.write(&key)?;
        Ok(key)
    }

    fn write(&self, key: &SessionKey) -> Result<(), SessionKeyError> {
        let bytes = serde_json::to_vec_pretty(key).map_err(|e| self.invalid(e.to_string()))?;
        write_atomic(&self.path, &bytes, true)
            .map_err(|source| SessionKeyError::Io { path: self.path.clone(), source })
    }

    fn invalid(&self, reason: String) -> SessionKeyError {
        SessionKeyError::Invalid { path: self.path.clone(), reason }
    }
}
