//! Configuration management

use crate::error::{ChainkitError, Result};
use crate::model_names::Judge0Language;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Environment variable naming an alternate config file
pub const CONFIG_ENV_VAR: &str = "CHAINKIT_CONFIG";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Chat and embedding service
    #[serde(default)]
    pub model_service: ModelServiceConfig,

    /// Judge0 code execution service
    #[serde(default)]
    pub judge0: Judge0Config,

    /// MCP servers launched over stdio, keyed by name
    #[serde(default)]
    pub mcp_servers: BTreeMap<String, McpServerConfig>,
}

/// OpenAI-compatible model service configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelServiceConfig {
    /// Base URL, including the API version prefix (e.g. `.../v1`)
    #[serde(default = "default_model_url")]
    pub url: String,

    /// Model name for chat completions
    #[serde(default = "default_chat_model")]
    pub model: String,

    /// Model name for embeddings
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Embedding dimensions (defaults to the client's when unset)
    #[serde(default)]
    pub embedding_dimensions: Option<usize>,

    /// API key (optional, for authenticated services)
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default)]
    pub max_tokens: Option<u32>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Headers added to every request, overriding defaults
    #[serde(default)]
    pub custom_headers: BTreeMap<String, String>,

    #[serde(default)]
    pub log_requests: bool,
}

impl Default for ModelServiceConfig {
    fn default() -> Self {
        Self {
            url: default_model_url(),
            model: default_chat_model(),
            embedding_model: default_embedding_model(),
            embedding_dimensions: None,
            api_key: None,
            temperature: default_temperature(),
            max_tokens: None,
            timeout_secs: default_timeout(),
            custom_headers: BTreeMap::new(),
            log_requests: false,
        }
    }
}

fn default_model_url() -> String {
    "http://localhost:8000/v1".to_string()
}

fn default_chat_model() -> String {
    "meta-llama/Llama-3.1-8B-Instruct".to_string()
}

fn default_embedding_model() -> String {
    "sentence-transformers/all-MiniLM-L6-v2".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_timeout() -> u64 {
    30
}

/// Judge0 configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Judge0Config {
    #[serde(default = "default_judge0_url")]
    pub url: String,

    /// RapidAPI key
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub language: Judge0Language,

    #[serde(default = "default_judge0_timeout")]
    pub timeout_secs: u64,
}

impl Default for Judge0Config {
    fn default() -> Self {
        Self {
            url: default_judge0_url(),
            api_key: None,
            language: Judge0Language::default(),
            timeout_secs: default_judge0_timeout(),
        }
    }
}

fn default_judge0_url() -> String {
    "https://judge0-ce.p.rapidapi.com".to_string()
}

fn default_judge0_timeout() -> u64 {
    10
}

/// A stdio MCP server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct McpServerConfig {
    /// Program followed by its arguments
    pub command: Vec<String>,

    /// Extra environment for the server process
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Log traffic and server stderr
    #[serde(default)]
    pub log_events: bool,
}

impl Config {
    /// Load config from `CHAINKIT_CONFIG` or the default path, then apply
    /// environment overrides
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_ENV_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| Self::default_path());

        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            tracing::debug!("No config at {}, using defaults", path.display());
            Config::default()
        };

        config.apply_env_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Load config from an explicit file, without environment overrides
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Save config to default path
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get default config path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(crate::CONFIG_DIR_NAME)
            .join("config.yml")
    }

    /// Overlay values from the environment. `lookup` returns the value of a
    /// variable, if set.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("CHAINKIT_LLM_URL") {
            self.model_service.url = url;
        }
        if let Some(model) = lookup("CHAINKIT_LLM_MODEL") {
            self.model_service.model = model;
        }
        if let Some(model) = lookup("CHAINKIT_EMBEDDING_MODEL") {
            self.model_service.embedding_model = model;
        }
        if let Some(dims) = lookup("CHAINKIT_EMBEDDING_DIMS").and_then(|s| s.parse().ok()) {
            self.model_service.embedding_dimensions = Some(dims);
        }
        if let Some(key) = lookup("CHAINKIT_LLM_API_KEY") {
            self.model_service.api_key = Some(key);
        }
        if let Some(key) = lookup("JUDGE0_API_KEY") {
            self.judge0.api_key = Some(key);
        }
    }

    /// Look up a configured MCP server
    pub fn mcp_server(&self, name: &str) -> Result<&McpServerConfig> {
        self.mcp_servers.get(name).ok_or_else(|| {
            ChainkitError::Config(format!("No MCP server named '{}' is configured", name))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = r#"
model_service:
  url: https://api.example.com/v1
  custom_headers:
    x-team: search
judge0:
  language: python
mcp_servers:
  everything:
    command: ["npx", "-y", "@modelcontextprotocol/server-everything"]
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.model_service.url, "https://api.example.com/v1");
        assert_eq!(config.model_service.timeout_secs, 30);
        assert_eq!(
            config.model_service.custom_headers.get("x-team").map(String::as_str),
            Some("search")
        );
        assert_eq!(config.judge0.language, Judge0Language::Python);
        assert_eq!(config.judge0.url, "https://judge0-ce.p.rapidapi.com");

        let server = config.mcp_server("everything").unwrap();
        assert_eq!(server.command[0], "npx");
        assert!(!server.log_events);
        assert!(config.mcp_server("missing").is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("CHAINKIT_LLM_URL", "http://gpu:9000/v1"),
            ("CHAINKIT_EMBEDDING_DIMS", "768"),
            ("JUDGE0_API_KEY", "secret"),
        ]);

        let mut config = Config::default();
        config.apply_env_overrides(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.model_service.url, "http://gpu:9000/v1");
        assert_eq!(config.model_service.embedding_dimensions, Some(768));
        assert_eq!(config.judge0.api_key.as_deref(), Some("secret"));
        assert_eq!(config.model_service.model, default_chat_model());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.yml");

        let mut config = Config::default();
        config.model_service.log_requests = true;
        config.mcp_servers.insert(
            "local".to_string(),
            McpServerConfig {
                command: vec!["./server".to_string()],
                env: BTreeMap::from([("DEBUG".to_string(), "1".to_string())]),
                log_events: true,
            },
        );

        config.save_to(&path).unwrap();
        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }
}
