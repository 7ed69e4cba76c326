#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use pragma_session::{
    api::{
        CreateDelegationRequest, CreateDelegationResponse, DelegationRequestRecord,
        DelegationStatusResponse, RegisterSessionKeyRequest,
    },
    host::AgentTool,
    ApprovalApi, BridgeError, DelegationError, GatewayMethod, Lifecycle, PluginHost, ToolDescriptor,
    ToolServer,
};
use serde_json::{json, Map, Value};

#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    Register(RegisterSessionKeyRequest),
    Create(CreateDelegationRequest),
    Status(String),
    Fetch(String),
}

/// Approval API double: records calls and answers from canned state.
#[derive(Default)]
pub struct FakeApi {
    pub calls: Mutex<Vec<Call>>,
    pub fail_with: Mutex<Option<(u16, String)>>,
    pub records: Mutex<HashMap<String, DelegationRequestRecord>>,
}

impl FakeApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn fail(&self, status: u16, message: &str) {
        *self.fail_with.lock().unwrap() = Some((status, message.to_string()));
    }

    pub fn put_record(&self, request_id: &str, record: DelegationRequestRecord) {
        self.records.lock().unwrap().insert(request_id.to_string(), record);
    }

    fn record(&self, call: Call) -> Result<(), DelegationError> {
        self.calls.lock().unwrap().push(call);
        match self.fail_with.lock().unwrap().clone() {
            Some((status, message)) => Err(DelegationError::Remote { status, message }),
            None => Ok(()),
        }
    }

    fn lookup(&self, request_id: &str) -> Result<DelegationRequestRecord, DelegationError> {
        self.records
            .lock()
            .unwrap()
            .get(request_id)
            .cloned()
            .ok_or_else(|| DelegationError::Remote { status: 404, message: "Request not found".into() })
    }
}

#[async_trait]
impl ApprovalApi for FakeApi {
    async fn register_session_key(&self, req: &RegisterSessionKeyRequest) -> Result<(), DelegationError> {
        self.record(Call::Register(req.clone()))
    }

    async fn create_delegation_request(
        &self,
        req: &CreateDelegationRequest,
    ) -> Result<CreateDelegationResponse, DelegationError> {
        self.record(Call::Create(req.clone()))?;
        Ok(CreateDelegationResponse {
            request_id: "req-1".into(),
            approval_url: "https://app.example/approve/req-1".into(),
            expires_in: json!(900),
        })
    }

    async fn delegation_status(&self, request_id: &str) -> Result<DelegationStatusResponse, DelegationError> {
        self.record(Call::Status(request_id.to_string()))?;
        let record = self.lookup(request_id)?;
        Ok(DelegationStatusResponse { request_id: request_id.to_string(), status: record.status, resolved_at: None })
    }

    async fn delegation_request(&self, request_id: &str) -> Result<DelegationRequestRecord, DelegationError> {
        self.record(Call::Fetch(request_id.to_string()))?;
        self.lookup(request_id)
    }
}

#[derive(Default)]
pub struct FakeHost {
    pub methods: Vec<(String, Arc<dyn GatewayMethod>)>,
    pub tools: Vec<Arc<dyn AgentTool>>,
    pub services: Vec<String>,
}

impl FakeHost {
    pub fn method(&self, name: &str) -> Arc<dyn GatewayMethod> {
        self.methods
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, m)| m.clone())
            .unwrap_or_else(|| panic!("gateway method {name} not registered"))
    }

    pub fn tool(&self, name: &str) -> Arc<dyn AgentTool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .cloned()
            .unwrap_or_else(|| panic!("tool {name} not registered"))
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name().to_string()).collect()
    }
}

impl PluginHost for FakeHost {
    fn register_gateway_method(&mut self, name: &str, handler: Arc<dyn GatewayMethod>) {
        self.methods.push((name.to_string(), handler));
    }

    fn register_tool(&mut self, tool: Arc<dyn AgentTool>) {
        self.tools.push(tool);
    }

    fn register_service(&mut self, id: &str, _service: Arc<dyn Lifecycle>) {
        self.services.push(id.to_string());
    }
}

/// Tool server double with a fixed tool list; `call_tool` echoes its input.
pub struct FakeToolServer {
    pub started: AtomicBool,
    pub fail_start: bool,
    pub tools: Vec<ToolDescriptor>,
}

impl FakeToolServer {
    pub fn failing_start() -> Arc<Self> {
        Arc::new(Self { started: AtomicBool::new(false), fail_start: true, tools: Vec::new() })
    }

    pub fn new(names: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            started: AtomicBool::new(false),
            fail_start: false,
            tools: names
                .iter()
                .map(|n| ToolDescriptor { name: n.to_string(), description: None, input_schema: None })
                .collect(),
        })
    }
}

#[async_trait]
impl Lifecycle for FakeToolServer {
    async fn start(&self) -> Result<(), BridgeError> {
        if self.fail_start {
            return Err(BridgeError::Transport("server binary not found".into()));
        }
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> Result<(), BridgeError> {
        self.started.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl ToolServer for FakeToolServer {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, BridgeError> {
        if !self.started.load(Ordering::SeqCst) {
            return Err(BridgeError::NotConnected);
        }
        Ok(self.tools.clone())
    }

    async fn call_tool(&self, name: &str, args: Map<String, Value>) -> Result<Value, BridgeError> {
        if !self.started.load(Ordering::SeqCst) {
            return Err(BridgeError::NotConnected);
        }
        if !self.tools.iter().any(|t| t.name == name) {
            return Err(BridgeError::Tool { tool: name.to_string(), message: "unknown tool".into() });
        }
        Ok(json!({"tool": name, "args": args}))
    }
}
