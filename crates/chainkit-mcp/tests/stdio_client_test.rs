//! DefaultMcpClient over a real subprocess speaking line-delimited JSON-RPC

#![cfg(unix)]

use chainkit_mcp::{
    DefaultMcpClient, McpClient, McpError, McpTransport, StdioTransport, ToolExecutionRequest,
    TIMEOUT_MESSAGE,
};
use std::sync::Arc;
use std::time::Duration;

/// A tiny MCP server in POSIX sh. It mixes in a stray log line, a server
/// notification and a server-initiated ping to check the client skips them.
const SCRIPTED_SERVER: &str = r##"
while IFS= read -r line; do
  id=$(printf '%s' "$line" | sed -n 's/^{"jsonrpc":"2.0","id":\([0-9]*\),.*/\1/p')
  case "$line" in
    *'"method":"initialize"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"protocolVersion":"2024-11-05","capabilities":{"tools":{}},"serverInfo":{"name":"scripted","version":"1.0"}}}\n' "$id" ;;
    *'"method":"notifications/'*) ;;
    *'"method":"ping"'*)
      echo 'server warming up'
      printf '{"jsonrpc":"2.0","method":"notifications/message","params":{"level":"info"}}\n'
      printf '{"jsonrpc":"2.0","id":%s,"result":{}}\n' "$id" ;;
    *'"method":"tools/list"'*)
      printf '{"jsonrpc":"2.0","id":"srv-1","method":"ping"}\n'
      printf '{"jsonrpc":"2.0","id":%s,"result":{"tools":[{"name":"echoString","description":"Echoes a string","inputSchema":{"type":"object","properties":{"input":{"type":"string"}},"required":["input"]}},{"name":"longOperation","inputSchema":{"type":"object","properties":{}}}]}}\n' "$id" ;;
    *'"name":"echoString"'*)
      input=$(printf '%s' "$line" | sed -n 's/.*"input":"\([^"]*\)".*/\1/p')
      printf '{"jsonrpc":"2.0","id":%s,"result":{"content":[{"type":"text","text":"%s"}]}}\n' "$id" "$input" ;;
    *'"name":"echoInteger"'*)
      printf '{"jsonrpc":"2.0","id":%s,"error":{"code":-32603,"message":"Internal error"}}\n' "$id" ;;
    *'"name":"businessError"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"content":[{"type":"text","text":"business error"}],"isError":true}}\n' "$id" ;;
    *'"name":"greeting"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"content":[{"type":"text","text":"%s"}]}}\n' "$id" "$GREETING" ;;
    *'"name":"longOperation"'*)
      sleep 5
      printf '{"jsonrpc":"2.0","id":%s,"result":{"content":[{"type":"text","text":"done"}]}}\n' "$id" ;;
    *'"method":"tools/call"'*)
      name=$(printf '%s' "$line" | sed -n 's/.*"name":"\([^"]*\)".*/\1/p')
      printf '{"jsonrpc":"2.0","id":%s,"error":{"code":-32601,"message":"Invalid tool name: %s"}}\n' "$id" "$name" ;;
    *) ;;
  esac
done
"##;

async fn connect() -> DefaultMcpClient {
    let transport = StdioTransport::builder()
        .command(["sh", "-c", SCRIPTED_SERVER])
        .environment([("GREETING", "hello from env")])
        .log_events(true)
        .build()
        .unwrap();

    DefaultMcpClient::builder(Arc::new(transport))
        .tool_execution_timeout(Duration::from_millis(500))
        .request_timeout(Duration::from_secs(5))
        .build()
        .await
        .unwrap()
}

async fn call(client: &DefaultMcpClient, name: &str, arguments: &str) -> String {
    client
        .execute_tool(&ToolExecutionRequest::new(name, arguments))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_handshake_and_list_tools() {
    let client = connect().await;
    assert_eq!(client.server_info().unwrap()["name"], "scripted");

    let tools = client.list_tools().await.unwrap();
    let names: Vec<_> = tools.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["echoString", "longOperation"]);
    assert_eq!(tools[0].parameters["required"][0], "input");
    assert!(tools[1].description.is_none());

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_tool_results() {
    let client = connect().await;

    assert_eq!(call(&client, "echoString", r#"{"input":"abc"}"#).await, "abc");
    assert_eq!(
        call(&client, "businessError", "").await,
        "There was an error executing the tool. The tool returned: business error"
    );
    assert_eq!(
        call(&client, "echoInteger", r#"{"input":"abc"}"#).await,
        "There was an error executing the tool. Message: Internal error. Code: -32603"
    );
    assert_eq!(
        call(&client, "thisToolDoesNotExist", "{}").await,
        "There was an error executing the tool. Message: Invalid tool name: thisToolDoesNotExist. Code: -32601"
    );
    assert_eq!(call(&client, "greeting", "").await, "hello from env");

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_ping_skips_noise() {
    let client = connect().await;
    client.ping().await.unwrap();
    // Still in sync after the stray lines
    assert_eq!(call(&client, "echoString", r#"{"input":"xyz"}"#).await, "xyz");
    client.close().await.unwrap();
}

#[tokio::test]
async fn test_long_operation_times_out() {
    let client = connect().await;
    assert_eq!(call(&client, "longOperation", "").await, TIMEOUT_MESSAGE);
    client.close().await.unwrap();
}

#[tokio::test]
async fn test_transport_lifecycle() {
    let transport = StdioTransport::builder()
        .command(["sh", "-c", "cat > /dev/null"])
        .build()
        .unwrap();

    let early = transport
        .request(chainkit_mcp::protocol::JsonRpcRequest::new(1, "ping", None))
        .await;
    assert!(matches!(early, Err(McpError::NotStarted)));

    transport.start().await.unwrap();
    transport.close().await.unwrap();
    let late = transport.notify("notifications/initialized", None).await;
    assert!(matches!(late, Err(McpError::Closed)));

    assert!(matches!(
        StdioTransport::builder().build(),
        Err(McpError::SpawnFailed(_))
    ));
}

#[tokio::test]
async fn test_spawn_failure() {
    let transport = StdioTransport::builder()
        .command(["/definitely/not/a/real/binary"])
        .build()
        .unwrap();
    let err = DefaultMcpClient::builder(Arc::new(transport))
        .build()
        .await
        .err()
        .unwrap();
    assert!(matches!(err, McpError::SpawnFailed(_)));
}
