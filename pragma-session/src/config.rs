//! Plugin configuration and the shared local `config.json`.
//!
//! `config.json` is also read by the local tool server; keys this crate does not know about
//! are preserved on every read-modify-write.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use alloy_primitives::Address;
use pragma_delegation_types::constants::{CHAIN_ID, CHAIN_NAME};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::{error::DelegationError, files::write_atomic};

pub const DEFAULT_API_BASE: &str = "https://api.pr4gma.xyz";
pub const DEFAULT_CONFIG_PATH: &str = "~/.pragma/config.json";
pub const DEFAULT_SESSION_KEY_PATH: &str = "~/.pragma/session-key.json";

/// Signing mode passed through to the tool server.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Byok,
    X402,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Byok => "byok",
            Mode::X402 => "x402",
        }
    }
}

/// Configuration handed to the plugin by its host.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PluginConfig {
    #[serde(default)]
    pub mode: Option<Mode>,
    #[serde(default)]
    pub config_path: Option<String>,
    #[serde(default)]
    pub session_key_path: Option<String>,
    #[serde(default)]
    pub api_base: Option<String>,
}

impl PluginConfig {
    pub fn config_path(&self) -> PathBuf {
        expand_path(self.config_path.as_deref().unwrap_or(DEFAULT_CONFIG_PATH))
    }

    pub fn session_key_path(&self) -> PathBuf {
        expand_path(self.session_key_path.as_deref().unwrap_or(DEFAULT_SESSION_KEY_PATH))
    }

    pub fn api_base(&self) -> &str {
        self.api_base.as_deref().unwrap_or(DEFAULT_API_BASE)
    }
}

/// Expand a leading `~/` against the home directory.
pub fn expand_path(p: &str) -> PathBuf {
    match p.strip_prefix("~/") {
        Some(rest) => dirs::home_dir().unwrap_or_else(|| PathBuf::from("/tmp")).join(rest),
        None => PathBuf::from(p),
    }
}

fn network() -> Value {
    json!({ "chainId": CHAIN_ID, "name": CHAIN_NAME })
}

fn default_local_config() -> Value {
    json!({ "mode": Mode::X402.as_str(), "network": network() })
}

fn has_expected_network(root: &Value) -> bool {
    root.get("network")
        .and_then(|n| n.get("chainId"))
        .and_then(Value::as_u64)
        == Some(CHAIN_ID)
}

fn read_local_config(path: &Path) -> Result<Option<Value>, DelegationError> {
    match fs::read_to_string(path) {
        Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(DelegationError::Io { path: path.to_path_buf(), source }),
    }
}

fn write_local_config(path: &Path, root: &Value) -> Result<(), DelegationError> {
    let bytes = serde_json::to_vec_pretty(root)?;
    write_atomic(path, &bytes, false).map_err(|source| DelegationError::Io { path: path.to_path_buf(), source })
}

/// Make sure `config.json` exists and points at the right network.
///
/// Missing: created with defaults. Wrong chain id: network replaced. Unparseable: recreated.
pub fn ensure_local_config(path: &Path) -> Result<(), DelegationError> {
    let root = match read_local_config(path) {
        Ok(Some(root)) if root.is_object() => root,
        Ok(None) => {
            debug!(path = %path.display(), "creating local config");
            return write_local_config(path, &default_local_config());
        }
        Ok(Some(_)) | Err(DelegationError::Json(_)) => {
            warn!(path = %path.display(), "local config is corrupt, recreating");
            return write_local_config(path, &default_local_config());
        }
        Err(e) => return Err(e),
    };

    if has_expected_network(&root) {
        return Ok(());
    }
    let mut root = root;
    root["network"] = network();
    write_local_config(path, &root)
}

/// Record the smart account / session key pairing in `config.json`.
pub fn record_wallet(path: &Path, smart_account: Address, session_key: Address) -> Result<(), DelegationError> {
    let mut root = match read_local_config(path)? {
        Some(root) if root.is_object() => root,
        _ => default_local_config(),
    };
    root["wallet"] = json!({
        "smartAccountAddress": smart_account,
        "sessionKeyAddress": session_key,
        "keyId": "file-based",
    });
    if !has_expected_network(&root) {
        root["network"] = network();
    }
    write_local_config(path, &root)
}
