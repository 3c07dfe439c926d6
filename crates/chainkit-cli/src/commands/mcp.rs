//! MCP command

use crate::app::{McpAction, McpArgs, McpTarget, OutputFormat};
use crate::output::{json, print_table, terminal, Table};
use anyhow::Result;
use chainkit_core::{ChainkitError, Config};
use chainkit_mcp::{
    DefaultMcpClient, McpClient, StdioTransport, ToolExecutionRequest, ToolSpecification,
};
use std::sync::Arc;
use std::time::Duration;

pub async fn run(args: McpArgs, config: &Config, format: OutputFormat) -> Result<()> {
    match args.action {
        McpAction::Serve => chainkit_mcp::start_server(config).await,
        McpAction::Tools { target } => {
            let client = connect(&target, config, None).await?;
            let tools = client.list_tools().await;
            client.close().await?;
            print_tools(&tools?, format)
        }
        McpAction::Call {
            tool,
            args,
            timeout,
            target,
        } => {
            let client = connect(&target, config, Some(Duration::from_secs(timeout))).await?;
            let output = client
                .execute_tool(&ToolExecutionRequest::new(tool, args))
                .await;
            client.close().await?;
            let output = output?;

            match format {
                OutputFormat::Json => {
                    print!("{}", json::format_value(&serde_json::json!({ "output": output }))?)
                }
                _ => println!("{}", output),
            }
            Ok(())
        }
    }
}

async fn connect(
    target: &McpTarget,
    config: &Config,
    tool_timeout: Option<Duration>,
) -> Result<DefaultMcpClient> {
    let mut builder = StdioTransport::builder().log_events(target.log_events);

    builder = match (&target.server, target.command.is_empty()) {
        (Some(name), true) => {
            let server = config.mcp_server(name)?;
            builder
                .command(server.command.iter().cloned())
                .environment(server.env.clone())
                .log_events(target.log_events || server.log_events)
        }
        (None, false) => builder.command(target.command.iter().cloned()),
        (Some(_), false) => {
            return Err(ChainkitError::InvalidInput(
                "give either --server or a command after --, not both".to_string(),
            )
            .into())
        }
        (None, true) => {
            return Err(ChainkitError::InvalidInput(
                "give --server <name> or a command after --".to_string(),
            )
            .into())
        }
    };

    let mut client = DefaultMcpClient::builder(Arc::new(builder.build()?))
        .client_name("chainkit-cli")
        .client_version(env!("CARGO_PKG_VERSION"));
    if let Some(timeout) = tool_timeout {
        client = client.tool_execution_timeout(timeout);
    }
    Ok(client.build().await?)
}

fn print_tools(tools: &[ToolSpecification], format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        print!("{}", json::format_value(&tools)?);
        return Ok(());
    }

    if format == OutputFormat::Cli && tools.is_empty() {
        terminal::print_highlight("Server offers no tools", termcolor::Color::Yellow)?;
        return Ok(());
    }

    let mut table = Table::new(vec!["name", "description"]);
    for tool in tools {
        table.push(vec![
            tool.name.clone(),
            tool.description.clone().unwrap_or_default(),
        ]);
    }
    print_table(&table, format)
}
