//! Boundary to the embedding agent runtime.
//!
//! The four flow operations are exposed twice: as gateway methods (`pragma.*`, structured
//! `{ok, data | error}` replies) and as agent tools (`pragma_*`, text content for the model).

use std::sync::Arc;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::warn;

use crate::{bridge::Lifecycle, error::DelegationError, flow::DelegationFlow};

/// Registration surface offered by the host runtime.
pub trait PluginHost {
    fn register_gateway_method(&mut self, name: &str, handler: Arc<dyn GatewayMethod>);

    fn register_tool(&mut self, tool: Arc<dyn AgentTool>);

    fn register_service(&mut self, id: &str, service: Arc<dyn Lifecycle>);
}

#[async_trait]
pub trait GatewayMethod: Send + Sync {
    async fn handle(&self, params: Value) -> HandlerResult;
}

#[async_trait]
pub trait AgentTool: Send + Sync {
    fn name(&self) -> &str;

    fn label(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema of the accepted parameters.
    fn parameters(&self) -> Value;

    async fn execute(&self, tool_call_id: &str, params: Value) -> ToolResult;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerError {
    pub code: String,
    pub message: String,
}

impl From<&DelegationError> for HandlerError {
    fn from(e: &DelegationError) -> Self {
        Self { code: e.code().to_string(), message: e.to_string() }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HandlerResult {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<HandlerError>,
}

impl HandlerResult {
    pub fn success(data: Value) -> Self {
        Self { ok: true, data: Some(data), error: None }
    }

    pub fn failure(e: &DelegationError) -> Self {
        Self { ok: false, data: None, error: Some(e.into()) }
    }
}

impl From<Result<Value, DelegationError>> for HandlerResult {
    fn from(r: Result<Value, DelegationError>) -> Self {
        match r {
            Ok(data) => HandlerResult::success(data),
            Err(e) => HandlerResult::failure(&e),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolContent {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

impl ToolContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self { kind: "text".to_string(), text: text.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub content: Vec<ToolContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ToolResult {
    pub fn success(data: &Value) -> Self {
        Self { content: vec![ToolContent::text(pretty(data))], details: Some(data.clone()) }
    }

    pub fn failure(e: &DelegationError) -> Self {
        let body = json!({"error": e.code(), "message": e.to_string()});
        Self { content: vec![ToolContent::text(pretty(&body))], details: None }
    }
}

impl From<HandlerResult> for ToolResult {
    fn from(r: HandlerResult) -> Self {
        match (r.data, r.error) {
            (_, Some(error)) => {
                let body = json!({"error": error.code, "message": error.message});
                ToolResult { content: vec![ToolContent::text(pretty(&body))], details: None }
            }
            (data, None) => ToolResult::success(&data.unwrap_or(Value::Null)),
        }
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DelegationOp {
    SetupSession,
    RequestDelegation,
    PollDelegation,
    RetrieveDelegation,
}

impl DelegationOp {
    pub const ALL: [DelegationOp; 4] = [
        DelegationOp::SetupSession,
        DelegationOp::RequestDelegation,
        DelegationOp::PollDelegation,
        DelegationOp::RetrieveDelegation,
    ];

    pub fn method_name(self) -> &'static str {
        match self {
            DelegationOp::SetupSession => "pragma.setup_session",
            DelegationOp::RequestDelegation => "pragma.request_delegation",
            DelegationOp::PollDelegation => "pragma.poll_delegation",
            DelegationOp::RetrieveDelegation => "pragma.retrieve_delegation",
        }
    }

    pub fn tool_name(self) -> &'static str {
        match self {
            DelegationOp::SetupSession => "pragma_setup_session",
            DelegationOp::RequestDelegation => "pragma_request_delegation",
            DelegationOp::PollDelegation => "pragma_poll_delegation",
            DelegationOp::RetrieveDelegation => "pragma_retrieve_delegation",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DelegationOp::SetupSession => "Pragma: Setup Session",
            DelegationOp::RequestDelegation => "Pragma: Request Delegation",
            DelegationOp::PollDelegation => "Pragma: Poll Delegation",
            DelegationOp::RetrieveDelegation => "Pragma: Retrieve Delegation",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            DelegationOp::SetupSession => {
                "Register session key with the Pragma API. Pass 'sa' (Smart Account address) to \
                 complete registration. Without 'sa', returns the session key address."
            }
            DelegationOp::RequestDelegation => {
                "Create a delegation request and get an approval URL. The user opens the URL in \
                 their browser to approve trading permissions."
            }
            DelegationOp::PollDelegation => {
                "Check if the user has approved a delegation request. Returns status: pending, \
                 approved, rejected, or expired."
            }
            DelegationOp::RetrieveDelegation => {
                "Retrieve the signed delegation after user approval and store it locally. Must be \
                 called after poll_delegation returns 'approved'."
            }
        }
    }

    pub fn parameters(self) -> Value {
        match self {
            DelegationOp::SetupSession => json!({
                "type": "object",
                "properties": {
                    "sa": {"type": "string", "description": "User's Smart Account address (0x...)"},
                    "label": {"type": "string", "description": "Label for this session key"},
                    "agentType": {"type": "string", "description": "Agent type identifier"}
                }
            }),
            DelegationOp::RequestDelegation => json!({
                "type": "object",
                "required": ["sa"],
                "properties": {
                    "sa": {"type": "string", "description": "User's Smart Account address (0x...)"},
                    "protocols": {
                        "type": "array",
                        "items": {"type": "string", "enum": ["dex", "leverup", "nadfun", "wmon"]},
                        "description": "Allowed protocols. Default: all."
                    },
                    "expiryDays": {"type": "integer", "description": "Delegation duration in days (default: 7)"},
                    "maxCalls": {"type": "integer", "description": "Max on-chain calls, trades and approvals (default: 100)"},
                    "maxValuePerTxMon": {"type": "number", "description": "Max native MON value per transaction (default: 1)"},
                    "budgetUsd": {"type": "number", "description": "Off-chain budget in USD (default: 100)"},
                    "budgetMon": {"type": "number", "description": "Gas budget in MON (default: 1)"},
                    "allowedTokens": {"description": "Allowed tokens array or 'all'"},
                    "agentId": {"type": "string", "description": "Agent identifier"},
                    "description": {"type": "string", "description": "Human-readable delegation description"},
                    "enableTransfers": {"type": "boolean", "description": "Enable ERC20 and native transfer groups (default: true)"},
                    "transferRecipients": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Whitelisted transfer recipients. Default: [session key address]"
                    }
                }
            }),
            DelegationOp::PollDelegation | DelegationOp::RetrieveDelegation => json!({
                "type": "object",
                "required": ["requestId"],
                "properties": {
                    "requestId": {"type": "string", "description": "The delegation request ID from request_delegation"}
                }
            }),
        }
    }

    pub async fn run(self, flow: &DelegationFlow, params: Value) -> Result<Value, DelegationError> {
        let params = if params.is_null() { json!({}) } else { params };
        let data = match self {
            DelegationOp::SetupSession => serde_json::to_value(flow.setup_session(parse(params)?).await?)?,
            DelegationOp::RequestDelegation => {
                serde_json::to_value(flow.request_delegation(parse(params)?).await?)?
            }
            DelegationOp::PollDelegation => serde_json::to_value(flow.poll_delegation(parse(params)?).await?)?,
            DelegationOp::RetrieveDelegation => {
                serde_json::to_value(flow.retrieve_delegation(parse(params)?).await?)?
            }
        };
        Ok(data)
    }
}

fn parse<T: DeserializeOwned>(params: Value) -> Result<T, DelegationError> {
    serde_json::from_value(params).map_err(|e| DelegationError::InvalidParameters(e.to_string()))
}

/// One flow operation, usable as both a gateway method and an agent tool.
pub struct DelegationHandler {
    op: DelegationOp,
    flow: Arc<DelegationFlow>,
}

impl DelegationHandler {
    pub fn new(op: DelegationOp, flow: Arc<DelegationFlow>) -> Self {
        Self { op, flow }
    }

    async fn run(&self, params: Value) -> HandlerResult {
        let result = self.op.run(&self.flow, params).await;
        if let Err(e) = &result {
            warn!(op = self.op.method_name(), code = e.code(), error = %e, "delegation operation failed");
        }
        result.into()
    }
}

#[async_trait]
impl GatewayMethod for DelegationHandler {
    async fn handle(&self, params: Value) -> HandlerResult {
        self.run(params).await
    }
}

#[async_trait]
impl AgentTool for DelegationHandler {
    fn name(&self) -> &str {
        self.op.tool_name()
    }

    fn label(&self) -> &str {
        self.op.label()
    }

    fn description(&self) -> &str {
        self.op.description()
    }

    fn parameters(&self) -> Value {
        self.op.parameters()
    }

    async fn execute(&self, _tool_call_id: &str, params: Value) -> ToolResult {
        self.run(params).await.into()
    }
}

pub fn register_delegation_methods<H: PluginHost + ?Sized>(host: &mut H, flow: Arc<DelegationFlow>) {
    for op in DelegationOp::ALL {
        let handler = Arc::new(DelegationHandler::new(op, flow.clone()));
        host.register_gateway_method(op.method_name(), handler.clone());
        host.register_tool(handler);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_line_up() {
        for op in DelegationOp::ALL {
            let suffix = op.method_name().strip_prefix("pragma.").unwrap();
            assert_eq!(op.tool_name(), format!("pragma_{suffix}"));
            assert_eq!(op.parameters()["type"], "object");
        }
    }

    #[test]
    fn integer_fields_are_declared_integer() {
        let schema = DelegationOp::RequestDelegation.parameters();
        for field in ["expiryDays", "maxCalls"] {
            assert_eq!(schema["properties"][field]["type"], "integer");
            let params = json!({field: 7});
            assert!(serde_json::from_value::<crate::flow::RequestDelegationParams>(params).is_ok());
        }
    }

    #[test]
    fn failures_render_code_and_message() {
        let err = DelegationError::NotApproved("pending".into());

        let gateway = HandlerResult::failure(&err);
        assert_eq!(
            serde_json::to_value(&gateway).unwrap(),
            json!({"ok": false, "error": {"code": "NOT_APPROVED", "message": "Delegation not yet approved (status: pending)"}})
        );

        let tool = ToolResult::from(gateway);
        assert_eq!(tool.details, None);
        let text: Value = serde_json::from_str(&tool.content[0].text).unwrap();
        assert_eq!(text, json!({"error": "NOT_APPROVED", "message": "Delegation not yet approved (status: pending)"}));
    }

    #[test]
    fn success_carries_details() {
        let tool = ToolResult::from(HandlerResult::success(json!({"status": "approved"})));
        assert_eq!(tool.content[0].kind, "text");
        assert_eq!(tool.details, Some(json!({"status": "approved"})));
        assert!(tool.content[0].text.contains("\"status\": \"approved\""));
    }
}
