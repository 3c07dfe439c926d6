//! chainkit CLI
//!
//! Model clients, metadata-filtered embedding stores, Judge0 code execution
//! and MCP tools from the command line.

use anyhow::Result;
use chainkit_core::error::exit_codes;
use chainkit_core::{ChainkitError, Config};
use chainkit_mcp::McpError;
use clap::Parser;

mod app;
mod commands;
mod output;

use app::{Cli, Commands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries results and the MCP stream
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(cli).await {
        eprintln!("Error: {:#}", err);
        std::process::exit(exit_code(&err));
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;

    match cli.command {
        Commands::Models(args) => commands::models::run(args, cli.format).await,
        Commands::Filter(args) => commands::filter::run(args, cli.format).await,
        Commands::Exec(args) => commands::exec::run(args, &config).await,
        Commands::Chat(args) => commands::chat::run(args, &config, cli.verbose).await,
        Commands::Store(args) => commands::store::run(args, &config, cli.format).await,
        Commands::Mcp(args) => commands::mcp::run(args, &config, cli.format).await,
    }
}

fn exit_code(err: &anyhow::Error) -> i32 {
    if let Some(err) = err.downcast_ref::<ChainkitError>() {
        err.exit_code()
    } else if let Some(err) = err.downcast_ref::<McpError>() {
        err.exit_code()
    } else {
        exit_codes::GENERAL_ERROR
    }
}
