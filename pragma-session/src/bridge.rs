//! Boundary to the local tool server.
//!
//! The transport (child process, protocol framing) belongs to the embedder. This module only
//! fixes what the plugin needs from it: discovery, invocation, and start/stop.

use std::{path::PathBuf, sync::Arc};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    config::{Mode, PluginConfig},
    error::DelegationError,
    host::{AgentTool, PluginHost, ToolResult},
};

/// Tools that need interactive passkey signing and have no headless path.
pub const BLOCKED_TOOLS: [&str; 2] = ["create_root_delegation", "nadfun_create"];

pub const PROXIED_TOOL_PREFIX: &str = "pragma_";

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("tool server not connected")]
    NotConnected,

    /// Process or framing failure in the embedder's transport.
    #[error("tool server transport: {0}")]
    Transport(String),

    #[error("tool {tool} failed: {message}")]
    Tool { tool: String, message: String },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,
}

/// Start/stop capability registered with the host's service registry.
#[async_trait]
pub trait Lifecycle: Send + Sync {
    async fn start(&self) -> Result<(), BridgeError>;

    async fn stop(&self) -> Result<(), BridgeError>;
}

#[async_trait]
pub trait ToolServer: Lifecycle {
    /// Tools discovered on the last successful [`Lifecycle::start`].
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, BridgeError>;

    async fn call_tool(&self, name: &str, args: Map<String, Value>) -> Result<Value, BridgeError>;
}

/// What the tool server process is told about its environment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BridgeConfig {
    pub config_path: PathBuf,
    pub session_key_path: PathBuf,
    pub mode: Option<Mode>,
}

impl BridgeConfig {
    pub fn from_plugin(config: &PluginConfig) -> Self {
        Self {
            config_path: config.config_path(),
            session_key_path: config.session_key_path(),
            mode: config.mode,
        }
    }

    /// Environment variables for the tool server child process.
    pub fn env(&self) -> Vec<(&'static str, String)> {
        let mut env = vec![
            ("PRAGMA_CONFIG_PATH", self.config_path.display().to_string()),
            ("PRAGMA_SIGNER_TYPE", "file".to_string()),
            ("PRAGMA_SESSION_KEY_PATH", self.session_key_path.display().to_string()),
        ];
        if let Some(mode) = self.mode {
            env.push(("PRAGMA_MODE", mode.as_str().to_string()));
        }
        env
    }
}

/// A tool-server tool exposed to the agent under a prefixed name.
pub struct ProxiedTool {
    server: Arc<dyn ToolServer>,
    remote_name: String,
    name: String,
    label: String,
    description: String,
    parameters: Value,
}

impl ProxiedTool {
    pub fn new(server: Arc<dyn ToolServer>, descriptor: ToolDescriptor) -> Self {
        let ToolDescriptor { name, description, input_schema } = descriptor;
        Self {
            server,
            name: format!("{PROXIED_TOOL_PREFIX}{name}"),
            label: format!("Pragma: {name}"),
            description: description.unwrap_or_else(|| name.clone()),
            parameters: input_schema.unwrap_or_else(|| json!({"type": "object", "properties": {}})),
            remote_name: name,
        }
    }

    pub fn remote_name(&self) -> &str {
        &self.remote_name
    }
}

#[async_trait]
impl AgentTool for ProxiedTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Value {
        self.parameters.clone()
    }

    async fn execute(&self, _tool_call_id: &str, params: Value) -> ToolResult {
        let args = match params {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        match self.server.call_tool(&self.remote_name, args).await {
            Ok(result) => ToolResult::success(&result),
            Err(e) => ToolResult::failure(&DelegationError::from(e)),
        }
    }
}

/// Register every discovered tool not in [`BLOCKED_TOOLS`]. Returns the number registered.
pub async fn register_proxied_tools<H: PluginHost + ?Sized>(
    host: &mut H,
    server: Arc<dyn ToolServer>,
) -> Result<usize, BridgeError> {
    let tools = server.list_tools().await?;
    let mut registered = 0;
    for descriptor in tools {
        if BLOCKED_TOOLS.contains(&descriptor.name.as_str()) {
            debug!(tool = %descriptor.name, "skipping tool that needs interactive signing");
            continue;
        }
        let tool = ProxiedTool::new(server.clone(), descriptor);
        debug!(tool = tool.name(), remote = tool.remote_name(), "proxying tool");
        host.register_tool(Arc::new(tool));
        registered += 1;
    }
    info!(registered, "proxied tool server tools");
    Ok(registered)
}
