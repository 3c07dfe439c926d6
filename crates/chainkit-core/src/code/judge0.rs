//! Judge0 code execution engine
//!
//! Submits source code to a Judge0 instance (RapidAPI hosted by default) and
//! waits for the run to finish in the same request.

use super::CodeExecutionEngine;
use crate::config::Judge0Config;
use crate::error::{ChainkitError, Result};
use crate::model_names::Judge0Language;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Judge0 status id for a successful run
const ACCEPTED: u32 = 3;

/// Returned when a run succeeds without writing to stdout
pub const NO_OUTPUT_MESSAGE: &str = "No result: nothing was printed out to the console";

const SUBMISSIONS_QUERY: &str = "/submissions?base64_encoded=true&wait=true&fields=*";

#[derive(Debug, Serialize)]
struct Submission {
    language_id: u32,
    source_code: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubmissionResult {
    #[serde(default)]
    pub stdout: Option<String>,
    pub status: SubmissionStatus,
    #[serde(default)]
    pub compile_output: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubmissionStatus {
    pub id: u32,
    #[serde(default)]
    pub description: String,
}

/// Runs code on Judge0
pub struct Judge0Engine {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
    language: Judge0Language,
}

impl Judge0Engine {
    /// `timeout` bounds the whole call, connect through response body
    pub fn new(api_key: impl Into<String>, language: Judge0Language, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http_client,
            base_url: "https://judge0-ce.p.rapidapi.com".to_string(),
            api_key: api_key.into(),
            language,
        })
    }

    pub fn from_config(config: &Judge0Config) -> Result<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            ChainkitError::Config(
                "Judge0 API key missing: set judge0.api_key or JUDGE0_API_KEY".to_string(),
            )
        })?;

        Ok(Self::new(
            api_key,
            config.language,
            Duration::from_secs(config.timeout_secs),
        )?
        .with_base_url(&config.url))
    }

    /// Point at a self-hosted instance
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn language(&self) -> Judge0Language {
        self.language
    }
}

#[async_trait]
impl CodeExecutionEngine for Judge0Engine {
    async fn execute(&self, code: &str) -> Result<String> {
        let submission = Submission {
            language_id: self.language.id(),
            source_code: STANDARD.encode(code),
        };

        let url = format!("{}{}", self.base_url, SUBMISSIONS_QUERY);
        tracing::debug!("Submitting {} bytes of {} to {}", code.len(), self.language.name(), url);

        let response = self
            .http_client
            .post(&url)
            .header("X-RapidAPI-Key", &self.api_key)
            .json(&submission)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ChainkitError::ExternalError(format!(
                "Judge0 error (HTTP {}): {}",
                status, body
            )));
        }

        let result: SubmissionResult = serde_json::from_str(&body)?;
        interpret(result)
    }
}

/// Turn a finished submission into the text handed back to the caller
pub(crate) fn interpret(result: SubmissionResult) -> Result<String> {
    if result.status.id != ACCEPTED {
        let mut error = result.status.description;
        if let Some(compile_output) = result.compile_output.filter(|s| !s.trim().is_empty()) {
            error.push('\n');
            error.push_str(&decode_mime(&compile_output)?);
        }
        return Ok(error);
    }

    match result.stdout {
        Some(stdout) => Ok(decode_mime(&stdout)?.trim().to_string()),
        None => Ok(NO_OUTPUT_MESSAGE.to_string()),
    }
}

/// Decode base64 that may be wrapped across lines
fn decode_mime(encoded: &str) -> Result<String> {
    let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = STANDARD.decode(compact)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(json: &str) -> SubmissionResult {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_accepted_decodes_and_trims_stdout() {
        let encoded = STANDARD.encode("6.0\n");
        let output = interpret(result(&format!(
            r#"{{"stdout": "{}", "status": {{"id": 3, "description": "Accepted"}}}}"#,
            encoded
        )))
        .unwrap();
        assert_eq!(output, "6.0");
    }

    #[test]
    fn test_accepted_tolerates_wrapped_base64() {
        let text = "a".repeat(100);
        let encoded = STANDARD.encode(&text);
        let wrapped = format!("{}\\n{}\\n", &encoded[..76], &encoded[76..]);

        let output = interpret(result(&format!(
            r#"{{"stdout": "{}", "status": {{"id": 3, "description": "Accepted"}}}}"#,
            wrapped
        )))
        .unwrap();
        assert_eq!(output, text);
    }

    #[test]
    fn test_accepted_without_stdout() {
        let output = interpret(result(
            r#"{"stdout": null, "status": {"id": 3, "description": "Accepted"}}"#,
        ))
        .unwrap();
        assert_eq!(output, NO_OUTPUT_MESSAGE);
    }

    #[test]
    fn test_failure_appends_compile_output() {
        let encoded = STANDARD.encode("SyntaxError: Unexpected token");
        let output = interpret(result(&format!(
            r#"{{"stdout": null, "status": {{"id": 6, "description": "Compilation Error"}}, "compile_output": "{}"}}"#,
            encoded
        )))
        .unwrap();
        assert_eq!(output, "Compilation Error\nSyntaxError: Unexpected token");
    }

    #[test]
    fn test_failure_ignores_blank_compile_output() {
        let output = interpret(result(
            r#"{"status": {"id": 11, "description": "Runtime Error (NZEC)"}, "compile_output": "  "}"#,
        ))
        .unwrap();
        assert_eq!(output, "Runtime Error (NZEC)");

        let output = interpret(result(
            r#"{"status": {"id": 5, "description": "Time Limit Exceeded"}}"#,
        ))
        .unwrap();
        assert_eq!(output, "Time Limit Exceeded");
    }

    #[test]
    fn test_invalid_base64_is_an_error() {
        let err = interpret(result(
            r#"{"stdout": "not base64!", "status": {"id": 3, "description": "Accepted"}}"#,
        ))
        .unwrap_err();
        assert!(matches!(err, ChainkitError::Base64(_)));
    }

    #[test]
    fn test_from_config_requires_key() {
        let config = Judge0Config::default();
        assert!(matches!(
            Judge0Engine::from_config(&config),
            Err(ChainkitError::Config(_))
        ));

        let config = Judge0Config {
            api_key: Some("key".to_string()),
            url: "http://localhost:2358/".to_string(),
            ..Judge0Config::default()
        };
        let engine = Judge0Engine::from_config(&config).unwrap();
        assert_eq!(engine.base_url, "http://localhost:2358");
        assert_eq!(engine.language(), Judge0Language::JavaScript);
    }
}
