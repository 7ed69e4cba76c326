//! Plugin entry point.

use std::sync::Arc;

use tracing::info;

use crate::{
    api::{ApprovalApi, HttpApprovalApi},
    bridge::{register_proxied_tools, ToolServer},
    clock::{Clock, SystemClock},
    config::{ensure_local_config, PluginConfig},
    error::DelegationError,
    flow::DelegationFlow,
    host::{register_delegation_methods, PluginHost},
    session_key::SessionKeyStore,
};

pub const PLUGIN_ID: &str = "pragma-openclaw";
pub const SERVICE_ID: &str = "pragma-mcp-bridge";

/// Register the plugin against the production approval API.
///
/// `server` should be configured with [`crate::BridgeConfig::from_plugin`] for the same config.
pub async fn register<H, S>(host: &mut H, config: &PluginConfig, server: Arc<S>) -> Result<Arc<DelegationFlow>, DelegationError>
where
    H: PluginHost + ?Sized,
    S: ToolServer + 'static,
{
    let api = Arc::new(HttpApprovalApi::new(config.api_base())?);
    register_with_api(host, config, server, api, Arc::new(SystemClock)).await
}

/// Registration steps, in order:
/// 1. ensure the session key exists,
/// 2. ensure the shared `config.json` targets the right chain,
/// 3. register the tool server as a host service and start it,
/// 4. proxy its tools,
/// 5. register the delegation gateway methods and tools.
pub async fn register_with_api<H, S>(
    host: &mut H,
    config: &PluginConfig,
    server: Arc<S>,
    api: Arc<dyn ApprovalApi>,
    clock: Arc<dyn Clock>,
) -> Result<Arc<DelegationFlow>, DelegationError>
where
    H: PluginHost + ?Sized,
    S: ToolServer + 'static,
{
    let session_key_path = config.session_key_path();
    let config_path = config.config_path();

    let key = SessionKeyStore::new(&session_key_path).ensure(clock.as_ref())?;
    ensure_local_config(&config_path)?;

    host.register_service(SERVICE_ID, server.clone());
    server.start().await?;
    let proxied = register_proxied_tools(host, server).await?;

    let flow = Arc::new(DelegationFlow::new(api, session_key_path, config_path).with_clock(clock));
    register_delegation_methods(host, flow.clone());

    info!(plugin = PLUGIN_ID, session_key = %key.address, proxied, "plugin registered");
    Ok(flow)
}
