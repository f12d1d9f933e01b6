//! Capability registry: the resources, tools and prompts a server advertises.
//!
//! The registry is filled once at startup and then shared read-only by every
//! session, so all sessions advertise identical metadata.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while serving a capability.
#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("Unknown resource: {0}")]
    UnknownResource(String),
    #[error("Unknown prompt: {0}")]
    UnknownPrompt(String),
    /// Input failed the entry's declared contract.
    #[error("Invalid arguments: {0}")]
    InvalidInput(String),
    /// A delegate (e.g. the mail server) failed.
    #[error("{0}")]
    Delegate(String),
    #[error("Failed to encode result: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl CapabilityError {
    /// Whether the caller, not the server, is at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownTool(_)
                | Self::UnknownResource(_)
                | Self::UnknownPrompt(_)
                | Self::InvalidInput(_)
        )
    }
}

/// Deserialize tool arguments and check them against their garde rules.
pub fn parse_arguments<T>(arguments: Option<Value>) -> Result<T, CapabilityError>
where
    T: DeserializeOwned + garde::Validate,
    T::Context: Default,
{
    let arguments = arguments.unwrap_or_else(|| Value::Object(Map::new()));
    let parsed: T = serde_json::from_value(arguments)
        .map_err(|e| CapabilityError::InvalidInput(e.to_string()))?;
    parsed
        .validate()
        .map_err(|report| CapabilityError::InvalidInput(report.to_string().trim().to_string()))?;
    Ok(parsed)
}

/// Result of a tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub text: String,
    /// Tool-level failure, reported to the client as a result with `isError`
    pub is_error: bool,
}

impl ToolOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: true,
        }
    }

    /// MCP `CallToolResult` encoding.
    pub fn to_json(&self) -> Value {
        json!({
            "content": [{ "type": "text", "text": self.text }],
            "isError": self.is_error
        })
    }
}

/// Handler behind a tool entry.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, arguments: Option<Value>) -> Result<ToolOutput, CapabilityError>;
}

/// A callable tool.
#[derive(Clone)]
pub struct ToolEntry {
    pub name: String,
    pub title: String,
    pub description: String,
    /// JSON Schema advertised to clients
    pub input_schema: Value,
    handler: Arc<dyn ToolHandler>,
}

impl ToolEntry {
    pub fn new(
        name: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
        handler: impl ToolHandler + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            title: title.into(),
            description: description.into(),
            input_schema,
            handler: Arc::new(handler),
        }
    }

    fn descriptor(&self) -> Value {
        json!({
            "name": self.name,
            "title": self.title,
            "description": self.description,
            "inputSchema": self.input_schema
        })
    }
}

/// Reader behind a resource entry.
pub type ResourceReader = Arc<dyn Fn() -> Result<String, CapabilityError> + Send + Sync>;

/// A readable, parameterless resource.
#[derive(Clone)]
pub struct ResourceEntry {
    pub uri: String,
    pub name: String,
    pub title: String,
    pub description: String,
    pub mime_type: String,
    reader: ResourceReader,
}

impl ResourceEntry {
    pub fn new(
        uri: impl Into<String>,
        name: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        mime_type: impl Into<String>,
        reader: ResourceReader,
    ) -> Self {
        Self {
            uri: uri.into(),
            name: name.into(),
            title: title.into(),
            description: description.into(),
            mime_type: mime_type.into(),
            reader,
        }
    }

    fn descriptor(&self) -> Value {
        json!({
            "uri": self.uri,
            "name": self.name,
            "title": self.title,
            "description": self.description,
            "mimeType": self.mime_type
        })
    }
}

/// A message produced by a prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptMessage {
    pub role: &'static str,
    pub text: String,
}

/// A prompt template without arguments.
#[derive(Clone)]
pub struct PromptEntry {
    pub name: String,
    pub title: String,
    pub description: String,
    render: fn() -> Vec<PromptMessage>,
}

impl PromptEntry {
    pub fn new(
        name: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        render: fn() -> Vec<PromptMessage>,
    ) -> Self {
        Self {
            name: name.into(),
            title: title.into(),
            description: description.into(),
            render,
        }
    }

    fn descriptor(&self) -> Value {
        json!({
            "name": self.name,
            "title": self.title,
            "description": self.description,
            "arguments": []
        })
    }
}

/// Identification the server reports during `initialize`.
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
    pub instructions: Option<String>,
}

/// Catalog of everything the server can execute.
pub struct CapabilityRegistry {
    server_info: ServerInfo,
    tools: Vec<ToolEntry>,
    resources: Vec<ResourceEntry>,
    prompts: Vec<PromptEntry>,
}

impl CapabilityRegistry {
    pub fn new(server_info: ServerInfo) -> Self {
        Self {
            server_info,
            tools: Vec::new(),
            resources: Vec::new(),
            prompts: Vec::new(),
        }
    }

    pub fn with_tool(mut self, tool: ToolEntry) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn with_resource(mut self, resource: ResourceEntry) -> Self {
        self.resources.push(resource);
        self
    }

    pub fn with_prompt(mut self, prompt: PromptEntry) -> Self {
        self.prompts.push(prompt);
        self
    }

    pub fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    /// Capabilities object for the `initialize` result.
    pub fn capabilities(&self) -> Value {
        let mut caps = Map::new();
        if !self.tools.is_empty() {
            caps.insert("tools".to_string(), json!({ "listChanged": false }));
        }
        if !self.resources.is_empty() {
            caps.insert(
                "resources".to_string(),
                json!({ "subscribe": false, "listChanged": false }),
            );
        }
        if !self.prompts.is_empty() {
            caps.insert("prompts".to_string(), json!({ "listChanged": false }));
        }
        Value::Object(caps)
    }

    pub fn list_tools(&self) -> Value {
        json!({ "tools": self.tools.iter().map(ToolEntry::descriptor).collect::<Vec<_>>() })
    }

    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Option<Value>,
    ) -> Result<ToolOutput, CapabilityError> {
        let tool = self
            .tools
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| CapabilityError::UnknownTool(name.to_string()))?;
        tool.handler.call(arguments).await
    }

    pub fn list_resources(&self) -> Value {
        json!({
            "resources": self.resources.iter().map(ResourceEntry::descriptor).collect::<Vec<_>>()
        })
    }

    pub fn read_resource(&self, uri: &str) -> Result<Value, CapabilityError> {
        let resource = self
            .resources
            .iter()
            .find(|r| r.uri == uri)
            .ok_or_else(|| CapabilityError::UnknownResource(uri.to_string()))?;
        let text = (resource.reader)()?;
        Ok(json!({
            "contents": [{
                "uri": resource.uri,
                "mimeType": resource.mime_type,
                "text": text
            }]
        }))
    }

    pub fn list_prompts(&self) -> Value {
        json!({
            "prompts": self.prompts.iter().map(PromptEntry::descriptor).collect::<Vec<_>>()
        })
    }

    pub fn get_prompt(&self, name: &str) -> Result<Value, CapabilityError> {
        let prompt = self
            .prompts
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| CapabilityError::UnknownPrompt(name.to_string()))?;
        let messages: Vec<Value> = (prompt.render)()
            .into_iter()
            .map(|m| json!({ "role": m.role, "content": { "type": "text", "text": m.text } }))
            .collect();
        Ok(json!({
            "description": prompt.description,
            "messages": messages
        }))
    }
}
