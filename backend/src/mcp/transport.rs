//! Per-session protocol state machine.
//!
//! A [`SessionTransport`] is owned by exactly one session. It tracks the
//! handshake, remembers what was negotiated, and dispatches decoded messages
//! to the shared [`CapabilityRegistry`].

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::protocol::{
    error_codes, negotiate_protocol_version, CancelledParams, ClientInfo, InitializeParams,
    JsonRpcRequest, JsonRpcResponse, PromptGetParams, ResourceReadParams, ToolCallParams,
};
use super::registry::{CapabilityError, CapabilityRegistry, ToolOutput};

/// Handshake progress of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    /// Created, `initialize` not yet answered
    AwaitingInitialize,
    /// `initialize` answered, waiting for `notifications/initialized`
    Initialized,
    /// Handshake complete
    Ready,
    /// Torn down; no further messages are processed
    Closed,
}

pub struct SessionTransport {
    session_id: String,
    registry: Arc<CapabilityRegistry>,
    state: TransportState,
    protocol_version: Option<&'static str>,
    client_info: Option<ClientInfo>,
    /// Cancelled when the session closes; aborts in-flight tool calls
    cancel: CancellationToken,
    messages_handled: u64,
}

impl SessionTransport {
    pub fn new(
        session_id: impl Into<String>,
        registry: Arc<CapabilityRegistry>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            registry,
            state: TransportState::AwaitingInitialize,
            protocol_version: None,
            client_info: None,
            cancel,
            messages_handled: 0,
        }
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    /// Whether `initialize` has been answered successfully.
    pub fn is_initialized(&self) -> bool {
        matches!(
            self.state,
            TransportState::Initialized | TransportState::Ready
        )
    }

    pub fn is_closed(&self) -> bool {
        self.state == TransportState::Closed
    }

    pub fn protocol_version(&self) -> Option<&'static str> {
        self.protocol_version
    }

    pub fn client_info(&self) -> Option<&ClientInfo> {
        self.client_info.as_ref()
    }

    pub fn messages_handled(&self) -> u64 {
        self.messages_handled
    }

    /// Close the transport, cancelling any in-flight exchange.
    pub fn close(&mut self) {
        if self.state != TransportState::Closed {
            self.cancel.cancel();
            self.state = TransportState::Closed;
            debug!(
                "MCP session {} transport closed after {} messages",
                self.session_id, self.messages_handled
            );
        }
    }

    /// Process one message. Returns `None` for notifications.
    pub async fn handle_message(&mut self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let id = request.id.clone();
        let is_notification = request.is_notification();

        if self.is_closed() {
            return (!is_notification).then(|| {
                JsonRpcResponse::error(id, error_codes::SESSION_NOT_FOUND, "Session is closed")
            });
        }

        self.messages_handled += 1;
        debug!(
            "MCP session {}: handling method {}",
            self.session_id, request.method
        );

        let response = self.dispatch(request).await;
        if is_notification {
            None
        } else {
            response
        }
    }

    async fn dispatch(&mut self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let id = request.id;
        match request.method.as_str() {
            "initialize" => Some(self.handle_initialize(id, request.params)),
            "notifications/initialized" | "initialized" => {
                if self.state == TransportState::Initialized {
                    self.state = TransportState::Ready;
                }
                None
            }
            "notifications/cancelled" => {
                if let Ok(params) = parse_params::<CancelledParams>(request.params) {
                    debug!(
                        "MCP session {}: client cancelled request {} ({})",
                        self.session_id,
                        params.request_id,
                        params.reason.unwrap_or_default()
                    );
                }
                None
            }
            "ping" => Some(JsonRpcResponse::success(id, json!({}))),
            _ if !self.is_initialized() => Some(JsonRpcResponse::error(
                id,
                error_codes::NOT_INITIALIZED,
                "Session is not initialized",
            )),
            "tools/list" => Some(JsonRpcResponse::success(id, self.registry.list_tools())),
            "tools/call" => Some(self.handle_call_tool(id, request.params).await),
            "resources/list" => Some(JsonRpcResponse::success(
                id,
                self.registry.list_resources(),
            )),
            "resources/read" => Some(
                match parse_params::<ResourceReadParams>(request.params) {
                    Ok(params) => respond(id, self.registry.read_resource(&params.uri)),
                    Err(e) => e.into_response(id),
                },
            ),
            "prompts/list" => Some(JsonRpcResponse::success(id, self.registry.list_prompts())),
            "prompts/get" => Some(match parse_params::<PromptGetParams>(request.params) {
                Ok(params) => respond(id, self.registry.get_prompt(&params.name)),
                Err(e) => e.into_response(id),
            }),
            method => Some(JsonRpcResponse::error(
                id,
                error_codes::METHOD_NOT_FOUND,
                format!("Method not found: {}", method),
            )),
        }
    }

    fn handle_initialize(&mut self, id: Option<Value>, params: Option<Value>) -> JsonRpcResponse {
        if self.state != TransportState::AwaitingInitialize {
            return JsonRpcResponse::error(
                id,
                error_codes::INVALID_REQUEST,
                "Session is already initialized",
            );
        }

        let params = match parse_params::<InitializeParams>(params) {
            Ok(params) => params,
            Err(e) => return e.into_response(id),
        };

        let version = negotiate_protocol_version(params.protocol_version.as_deref());
        self.protocol_version = Some(version);
        self.client_info = params.client_info;
        self.state = TransportState::Initialized;

        info!(
            "MCP session {} initialized (protocol {}, client {})",
            self.session_id,
            version,
            self.client_info
                .as_ref()
                .map(|c| format!("{} {}", c.name, c.version))
                .unwrap_or_else(|| "unknown".to_string())
        );

        let server = self.registry.server_info();
        let mut result = json!({
            "protocolVersion": version,
            "capabilities": self.registry.capabilities(),
            "serverInfo": {
                "name": server.name,
                "version": server.version
            }
        });
        if let Some(instructions) = &server.instructions {
            result["instructions"] = json!(instructions);
        }
        JsonRpcResponse::success(id, result)
    }

    async fn handle_call_tool(&self, id: Option<Value>, params: Option<Value>) -> JsonRpcResponse {
        let params = match parse_params::<ToolCallParams>(params) {
            Ok(params) => params,
            Err(e) => return e.into_response(id),
        };

        let registry = self.registry.clone();
        let cancel = self.cancel.clone();
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!("MCP session {}: tool {} cancelled", self.session_id, params.name);
                return JsonRpcResponse::error(
                    id,
                    error_codes::REQUEST_CANCELLED,
                    "Session closed while the request was in flight",
                );
            }
            result = registry.call_tool(&params.name, params.arguments) => result,
        };

        match result {
            Ok(output) => JsonRpcResponse::success(id, output.to_json()),
            // Delegate failures are tool results, not protocol errors
            Err(CapabilityError::Delegate(message)) => {
                JsonRpcResponse::success(id, ToolOutput::error(message).to_json())
            }
            Err(e) => ParamsError::from(e).into_response(id),
        }
    }
}

/// A request whose parameters or capability input were rejected.
struct ParamsError {
    code: i32,
    message: String,
}

impl ParamsError {
    fn into_response(self, id: Option<Value>) -> JsonRpcResponse {
        JsonRpcResponse::error(id, self.code, self.message)
    }
}

impl From<CapabilityError> for ParamsError {
    fn from(e: CapabilityError) -> Self {
        let code = if e.is_client_error() {
            error_codes::INVALID_PARAMS
        } else {
            error_codes::INTERNAL_ERROR
        };
        Self {
            code,
            message: e.to_string(),
        }
    }
}

fn parse_params<T: DeserializeOwned>(params: Option<Value>) -> Result<T, ParamsError> {
    serde_json::from_value(params.unwrap_or_else(|| json!({}))).map_err(|e| ParamsError {
        code: error_codes::INVALID_PARAMS,
        message: format!("Invalid params: {}", e),
    })
}

fn respond(id: Option<Value>, result: Result<Value, CapabilityError>) -> JsonRpcResponse {
    match result {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(e) => ParamsError::from(e).into_response(id),
    }
}
