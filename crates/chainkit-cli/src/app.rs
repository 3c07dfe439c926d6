//! CLI argument definitions

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "chainkit")]
#[command(
    author,
    version,
    about = "Model clients, metadata-filtered embedding stores, remote code execution and MCP tools"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "cli")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List known model names and Judge0 languages
    Models(ModelsArgs),

    /// Parse a metadata filter expression
    Filter(FilterArgs),

    /// Run code through Judge0
    Exec(ExecArgs),

    /// One-shot chat completion
    Chat(ChatArgs),

    /// Manage the embedding store
    Store(StoreArgs),

    /// Talk to MCP servers, or serve chainkit's tools
    Mcp(McpArgs),
}

#[derive(Args)]
pub struct ModelsArgs {
    /// Only show one provider
    #[arg(long, value_enum, default_value = "all")]
    pub provider: ModelProvider,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModelProvider {
    All,
    Mistral,
    Judge0,
}

#[derive(Args)]
pub struct FilterArgs {
    /// Filter expression, e.g. "genre = 'fiction' AND year >= 2000"
    pub expression: String,

    /// Evaluate against this metadata (key=value, repeatable)
    #[arg(short = 'm', long = "metadata", value_name = "KEY=VALUE")]
    pub metadata: Vec<String>,
}

#[derive(Args)]
pub struct ExecArgs {
    /// Source file; reads stdin when omitted
    pub file: Option<PathBuf>,

    /// Language (javascript, python); defaults to the configured one
    #[arg(short, long)]
    pub language: Option<String>,

    /// Wrap the last statement in console.log when nothing is printed
    #[arg(long)]
    pub fix: bool,
}

#[derive(Args)]
pub struct ChatArgs {
    /// Prompt
    #[arg(required = true)]
    pub prompt: Vec<String>,

    /// System message
    #[arg(short, long)]
    pub system: Option<String>,

    /// Model service to use
    #[arg(long, value_enum, default_value = "openai")]
    pub provider: ChatProvider,

    /// Model name (Mistral names are checked)
    #[arg(long)]
    pub model: Option<String>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ChatProvider {
    /// Any OpenAI-compatible endpoint from the config
    Openai,
    Mistral,
}

#[derive(Args)]
pub struct StoreArgs {
    /// Store database (defaults to the user data directory)
    #[arg(long, global = true, env = "CHAINKIT_STORE")]
    pub store: Option<PathBuf>,

    #[command(subcommand)]
    pub action: StoreAction,
}

#[derive(Subcommand)]
pub enum StoreAction {
    /// Embed and add a text segment
    Add {
        text: String,

        /// Metadata field (key=value, repeatable)
        #[arg(short = 'm', long = "metadata", value_name = "KEY=VALUE")]
        metadata: Vec<String>,

        /// Use this embedding instead of calling the model (comma separated)
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
        vector: Option<Vec<f32>>,
    },
    /// Find the closest segments
    Search {
        /// Query text; optional with --vector
        query: Option<String>,

        /// Query embedding (comma separated)
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
        vector: Option<Vec<f32>>,

        /// Maximum results
        #[arg(short = 'n', long, default_value = "3")]
        max_results: usize,

        /// Minimum relevance score (0..1)
        #[arg(long, default_value = "0")]
        min_score: f64,

        /// Metadata filter expression
        #[arg(short, long)]
        filter: Option<String>,
    },
    /// Remove entries by id or by filter
    #[command(alias = "rm")]
    Remove {
        ids: Vec<String>,

        /// Remove everything matching this filter
        #[arg(short, long)]
        filter: Option<String>,
    },
}

#[derive(Args)]
pub struct McpArgs {
    #[command(subcommand)]
    pub action: McpAction,
}

#[derive(Args)]
pub struct McpTarget {
    /// Server name from the config file
    #[arg(short, long)]
    pub server: Option<String>,

    /// Log protocol traffic and server stderr
    #[arg(long)]
    pub log_events: bool,

    /// Ad-hoc server command, after `--`
    #[arg(last = true)]
    pub command: Vec<String>,
}

#[derive(Subcommand)]
pub enum McpAction {
    /// List a server's tools
    Tools {
        #[command(flatten)]
        target: McpTarget,
    },
    /// Call a tool
    Call {
        /// Tool name
        tool: String,

        /// Arguments as a JSON object
        #[arg(short, long, default_value = "{}")]
        args: String,

        /// Tool execution timeout in seconds
        #[arg(long, default_value = "60")]
        timeout: u64,

        #[command(flatten)]
        target: McpTarget,
    },
    /// Serve chainkit's tools over stdio
    Serve,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Cli,
    Json,
    Csv,
}
