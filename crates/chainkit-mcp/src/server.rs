//! MCP server implementation

use crate::protocol::*;
use anyhow::Result;
use chainkit_core::code::EXECUTE_JAVASCRIPT_TOOL;
use chainkit_core::{
    CodeExecutionEngine, CodeExecutionTool, Config, Judge0Engine, Judge0Language,
    MistralAiChatModelName, MistralAiEmbeddingModelName,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tracing::{debug, info};

const LIST_MODELS_TOOL: &str = "list_models";

pub struct McpServer {
    code_tool: Option<CodeExecutionTool>,
}

impl McpServer {
    /// Without an engine the JavaScript tool is not offered
    pub fn new(engine: Option<Arc<dyn CodeExecutionEngine>>) -> Self {
        Self {
            code_tool: engine.map(|engine| CodeExecutionTool::new(engine).fix_code_if_needed(true)),
        }
    }

    pub async fn run(&self) -> Result<()> {
        let reader = BufReader::new(tokio::io::stdin());
        let writer = BufWriter::new(tokio::io::stdout());
        self.serve(reader, writer).await
    }

    /// Answer newline-delimited requests from `reader` until EOF
    pub async fn serve<R, W>(&self, mut reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut line = String::new();

        loop {
            line.clear();
            let bytes_read = reader.read_line(&mut line).await?;

            if bytes_read == 0 {
                break;
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let request: JsonRpcRequest = match serde_json::from_str(trimmed) {
                Ok(r) => r,
                Err(e) => {
                    let response =
                        JsonRpcResponse::error(None, -32700, &format!("Parse error: {}", e));
                    self.write_response(&mut writer, &response).await?;
                    continue;
                }
            };

            if request.is_notification() {
                debug!("Notification: {}", request.method);
                continue;
            }

            let response = self.handle_request(&request).await;
            self.write_response(&mut writer, &response).await?;
        }

        Ok(())
    }

    async fn write_response<W: AsyncWrite + Unpin>(
        &self,
        writer: &mut W,
        response: &JsonRpcResponse,
    ) -> Result<()> {
        let json = serde_json::to_string(response)?;
        writer.write_all(json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        Ok(())
    }

    async fn handle_request(&self, request: &JsonRpcRequest) -> JsonRpcResponse {
        match request.method.as_str() {
            "initialize" => self.handle_initialize(request),
            "ping" => JsonRpcResponse::success(request.id.clone(), json!({})),
            "tools/list" => self.handle_tools_list(request),
            "tools/call" => self.handle_tools_call(request).await,
            _ => JsonRpcResponse::error(
                request.id.clone(),
                -32601,
                &format!("Method not found: {}", request.method),
            ),
        }
    }

    fn handle_initialize(&self, request: &JsonRpcRequest) -> JsonRpcResponse {
        if let Some(client) = request.params.get("clientInfo") {
            info!("MCP client connected: {}", client);
        }
        let result = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "tools": {}
            },
            "serverInfo": {
                "name": "chainkit",
                "version": env!("CARGO_PKG_VERSION")
            }
        });
        JsonRpcResponse::success(request.id.clone(), result)
    }

    fn tool_definitions(&self) -> Vec<ToolDefinition> {
        let mut tools = Vec::new();
        if let Some(code_tool) = &self.code_tool {
            tools.push(ToolDefinition {
                name: EXECUTE_JAVASCRIPT_TOOL.to_string(),
                description: Some(code_tool.description().to_string()),
                input_schema: code_tool.input_schema(),
            });
        }
        tools.push(ToolDefinition {
            name: LIST_MODELS_TOOL.to_string(),
            description: Some("List the Mistral AI model names and Judge0 languages chainkit knows".to_string()),
            input_schema: json!({ "type": "object", "properties": {} }),
        });
        tools
    }

    fn handle_tools_list(&self, request: &JsonRpcRequest) -> JsonRpcResponse {
        JsonRpcResponse::success(
            request.id.clone(),
            json!({ "tools": self.tool_definitions() }),
        )
    }

    async fn handle_tools_call(&self, request: &JsonRpcRequest) -> JsonRpcResponse {
        let name = request
            .params
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or("");

        let arguments = request
            .params
            .get("arguments")
            .cloned()
            .unwrap_or(json!({}));

        let result = match (name, &self.code_tool) {
            (EXECUTE_JAVASCRIPT_TOOL, Some(code_tool)) => {
                match arguments.get("code").and_then(Value::as_str) {
                    Some(code) => ToolResult::text(code_tool.execute(code).await),
                    None => {
                        return JsonRpcResponse::error(
                            request.id.clone(),
                            -32602,
                            "Invalid params: 'code' must be a string",
                        )
                    }
                }
            }
            (LIST_MODELS_TOOL, _) => ToolResult::text(list_models_text()),
            _ => {
                return JsonRpcResponse::error(
                    request.id.clone(),
                    -32601,
                    &format!("Invalid tool name: {}", name),
                )
            }
        };

        match serde_json::to_value(result) {
            Ok(value) => JsonRpcResponse::success(request.id.clone(), value),
            Err(e) => JsonRpcResponse::error(
                request.id.clone(),
                -32603,
                &format!("Internal error: {}", e),
            ),
        }
    }
}

fn list_models_text() -> String {
    let mut lines = Vec::new();
    lines.push("chat:".to_string());
    lines.extend(
        MistralAiChatModelName::ALL
            .iter()
            .map(|m| format!("  {}", m.as_str())),
    );
    lines.push("embedding:".to_string());
    lines.extend(
        MistralAiEmbeddingModelName::ALL
            .iter()
            .map(|m| format!("  {} ({} dims)", m.as_str(), m.dimension())),
    );
    lines.push("judge0:".to_string());
    lines.extend(
        [Judge0Language::JavaScript, Judge0Language::Python]
            .iter()
            .map(|l| format!("  {}", l)),
    );
    lines.join("\n")
}

/// Serve over stdin/stdout. The JavaScript tool is offered when a Judge0
/// key is configured.
pub async fn start_server(config: &Config) -> Result<()> {
    let engine: Option<Arc<dyn CodeExecutionEngine>> = match config.judge0.api_key {
        Some(_) => Some(Arc::new(Judge0Engine::from_config(&config.judge0)?)),
        None => {
            info!("No Judge0 API key configured; {} disabled", EXECUTE_JAVASCRIPT_TOOL);
            None
        }
    };
    let server = McpServer::new(engine);
    server.run().await
}
