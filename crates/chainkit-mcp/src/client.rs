//! MCP client
//!
//! [`DefaultMcpClient`] performs the `initialize` handshake on build and then
//! exposes the server's tools. Tool failures are reported as text so they can
//! be handed straight back to a model.

use crate::error::{McpError, Result};
use crate::protocol::{
    JsonRpcRequest, ToolDefinition, ToolExecutionRequest, ToolResult, ToolSpecification,
    PROTOCOL_VERSION,
};
use crate::transport::McpTransport;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Returned when a tool call outlives the execution timeout
pub const TIMEOUT_MESSAGE: &str = "There was a timeout executing the tool";

const DEFAULT_TOOL_EXECUTION_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[async_trait]
pub trait McpClient: Send + Sync {
    /// Tools offered by the server
    async fn list_tools(&self) -> Result<Vec<ToolSpecification>>;

    /// Run a tool. Tool-level failures come back as `Ok` text; only
    /// transport failures are errors.
    async fn execute_tool(&self, request: &ToolExecutionRequest) -> Result<String>;

    async fn ping(&self) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

/// Builder for [`DefaultMcpClient`]
pub struct DefaultMcpClientBuilder {
    transport: Arc<dyn McpTransport>,
    client_name: String,
    client_version: String,
    protocol_version: String,
    tool_execution_timeout: Duration,
    request_timeout: Duration,
}

impl DefaultMcpClientBuilder {
    pub fn client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = name.into();
        self
    }

    pub fn client_version(mut self, version: impl Into<String>) -> Self {
        self.client_version = version.into();
        self
    }

    pub fn protocol_version(mut self, version: impl Into<String>) -> Self {
        self.protocol_version = version.into();
        self
    }

    /// Upper bound for `tools/call`
    pub fn tool_execution_timeout(mut self, timeout: Duration) -> Self {
        self.tool_execution_timeout = timeout;
        self
    }

    /// Upper bound for every other request
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Start the transport and run the handshake
    pub async fn build(self) -> Result<DefaultMcpClient> {
        let client = DefaultMcpClient {
            transport: self.transport,
            client_name: self.client_name,
            client_version: self.client_version,
            protocol_version: self.protocol_version,
            tool_execution_timeout: self.tool_execution_timeout,
            request_timeout: self.request_timeout,
            next_id: AtomicU64::new(1),
            server_info: std::sync::OnceLock::new(),
        };
        client.initialize().await?;
        Ok(client)
    }
}

pub struct DefaultMcpClient {
    transport: Arc<dyn McpTransport>,
    client_name: String,
    client_version: String,
    protocol_version: String,
    tool_execution_timeout: Duration,
    request_timeout: Duration,
    next_id: AtomicU64,
    server_info: std::sync::OnceLock<Value>,
}

impl DefaultMcpClient {
    pub fn builder(transport: Arc<dyn McpTransport>) -> DefaultMcpClientBuilder {
        DefaultMcpClientBuilder {
            transport,
            client_name: "chainkit".to_string(),
            client_version: env!("CARGO_PKG_VERSION").to_string(),
            protocol_version: PROTOCOL_VERSION.to_string(),
            tool_execution_timeout: DEFAULT_TOOL_EXECUTION_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// `serverInfo` from the handshake, if the server sent one
    pub fn server_info(&self) -> Option<&Value> {
        self.server_info.get()
    }

    fn next_request(&self, method: &str, params: Option<Value>) -> (u64, JsonRpcRequest) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        (id, JsonRpcRequest::new(id, method, params))
    }

    async fn call(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let (_, request) = self.next_request(method, params);
        let response = tokio::time::timeout(self.request_timeout, self.transport.request(request))
            .await
            .map_err(|_| McpError::Timeout)??;
        response.into_result()
    }

    async fn initialize(&self) -> Result<()> {
        self.transport.start().await?;

        let params = json!({
            "protocolVersion": self.protocol_version,
            "capabilities": {},
            "clientInfo": {
                "name": self.client_name,
                "version": self.client_version
            }
        });
        let result = self.call("initialize", Some(params)).await?;

        if let Some(version) = result.get("protocolVersion").and_then(Value::as_str) {
            if version != self.protocol_version {
                warn!(
                    "MCP server answered with protocol {} (asked for {})",
                    version, self.protocol_version
                );
            }
        }
        if let Some(info) = result.get("serverInfo") {
            let _ = self.server_info.set(info.clone());
        }

        self.transport
            .notify("notifications/initialized", None)
            .await?;
        info!("MCP client initialized");
        Ok(())
    }

    async fn cancel(&self, id: u64) {
        let params = json!({ "requestId": id, "reason": "Timeout" });
        if let Err(e) = self
            .transport
            .notify("notifications/cancelled", Some(params))
            .await
        {
            warn!("Failed to cancel MCP request {}: {}", id, e);
        }
    }
}

#[async_trait]
impl McpClient for DefaultMcpClient {
    async fn list_tools(&self) -> Result<Vec<ToolSpecification>> {
        let result = self.call("tools/list", None).await?;
        let tools = result.get("tools").cloned().unwrap_or_else(|| json!([]));
        let definitions: Vec<ToolDefinition> = serde_json::from_value(tools)?;
        debug!("MCP server lists {} tools", definitions.len());
        Ok(definitions.into_iter().map(Into::into).collect())
    }

    async fn execute_tool(&self, request: &ToolExecutionRequest) -> Result<String> {
        let params = json!({
            "name": request.name,
            "arguments": request.arguments_value()?
        });
        let (id, rpc_request) = self.next_request("tools/call", Some(params));

        let response = match tokio::time::timeout(
            self.tool_execution_timeout,
            self.transport.request(rpc_request),
        )
        .await
        {
            Ok(response) => response?,
            Err(_) => {
                warn!("Tool '{}' timed out", request.name);
                self.cancel(id).await;
                return Ok(TIMEOUT_MESSAGE.to_string());
            }
        };

        match response.into_result() {
            Ok(result) => Ok(tool_result_text(result)?),
            Err(McpError::Rpc { code, message }) => Ok(format!(
                "There was an error executing the tool. Message: {}. Code: {}",
                message, code
            )),
            Err(e) => Err(e),
        }
    }

    async fn ping(&self) -> Result<()> {
        self.call("ping", None).await.map(|_| ())
    }

    async fn close(&self) -> Result<()> {
        self.transport.close().await
    }
}

fn tool_result_text(result: Value) -> Result<String> {
    let result: ToolResult = serde_json::from_value(result)?;
    let text = result.joined_text();
    if result.is_error {
        Ok(format!(
            "There was an error executing the tool. The tool returned: {}",
            text
        ))
    } else {
        Ok(text)
    }
}
