//! Pragma agent plugin core.
//!
//! - [`session_key`]: file-backed secp256k1 session key (the delegate identity).
//! - [`flow`]: the four-step web approval flow (setup, request, poll, retrieve).
//! - [`api`]: client for the remote delegation approval API.
//! - [`host`] / [`bridge`]: boundaries to the embedding agent runtime and the local tool server.
//! - [`plugin`]: wires everything into a host.
//!
//! ```text
//! setup_session ─► request_delegation ─► poll_delegation* ─► retrieve_delegation
//!  (key + register)   (build + submit)     (pending…approved)   (merge signature, persist)
//! ```

pub mod api;
pub mod bridge;
pub mod clock;
pub mod config;
pub mod error;
mod files;
pub mod flow;
pub mod host;
pub mod plugin;
pub mod session_key;

pub use api::{ApprovalApi, HttpApprovalApi, RequestStatus};
pub use bridge::{BridgeConfig, BridgeError, Lifecycle, ToolDescriptor, ToolServer};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{Mode, PluginConfig};
pub use error::DelegationError;
pub use flow::DelegationFlow;
pub use host::{AgentTool, GatewayMethod, HandlerResult, PluginHost, ToolResult};
pub use session_key::{SessionKey, SessionKeyError, SessionKeyStore};
