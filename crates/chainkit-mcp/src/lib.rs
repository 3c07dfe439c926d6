//! chainkit MCP
//!
//! Model Context Protocol client over a subprocess's stdio, plus a small
//! stdio server exposing chainkit's own tools.

pub mod client;
pub mod error;
pub mod protocol;
pub mod server;
pub mod transport;

pub use client::{DefaultMcpClient, DefaultMcpClientBuilder, McpClient, TIMEOUT_MESSAGE};
pub use error::{McpError, Result};
pub use protocol::{
    Content, ToolExecutionRequest, ToolResult, ToolSpecification, PROTOCOL_VERSION,
};
pub use server::{start_server, McpServer};
pub use transport::{McpTransport, StdioTransport, StdioTransportBuilder};
