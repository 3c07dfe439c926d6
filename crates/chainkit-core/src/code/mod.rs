//! Remote code execution
//!
//! A [`CodeExecutionEngine`] runs source code somewhere else and returns what
//! it printed. [`CodeExecutionTool`] adapts an engine for use as a model tool,
//! where failures must come back as text instead of errors.

mod judge0;

pub use judge0::{Judge0Engine, NO_OUTPUT_MESSAGE};

use crate::error::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

/// Executes code and returns its console output
#[async_trait]
pub trait CodeExecutionEngine: Send + Sync {
    async fn execute(&self, code: &str) -> Result<String>;
}

/// Name under which the JavaScript tool is exposed
pub const EXECUTE_JAVASCRIPT_TOOL: &str = "execute_javascript";

/// Tool wrapper around an engine
pub struct CodeExecutionTool {
    engine: Arc<dyn CodeExecutionEngine>,
    fix_code_if_needed: bool,
}

impl CodeExecutionTool {
    pub fn new(engine: Arc<dyn CodeExecutionEngine>) -> Self {
        Self {
            engine,
            fix_code_if_needed: false,
        }
    }

    /// Wrap the last statement in `console.log` when it does not print
    pub fn fix_code_if_needed(mut self, fix: bool) -> Self {
        self.fix_code_if_needed = fix;
        self
    }

    pub fn description(&self) -> &'static str {
        "MUST be used for accurate calculations: math, sorting, filtering, aggregating, string processing, etc"
    }

    /// JSON schema of the tool arguments
    pub fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "code": {
                    "type": "string",
                    "description": "JavaScript code to execute, result MUST be printed to console"
                }
            },
            "required": ["code"]
        })
    }

    /// Run the code. Engine failures are logged and their message returned.
    pub async fn execute(&self, code: &str) -> String {
        let code = if self.fix_code_if_needed {
            fix_if_no_log_to_console(code)
        } else {
            code.to_string()
        };

        match self.engine.execute(&code).await {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!("Error during code execution: {}", e);
                e.to_string()
            }
        }
    }
}

/// Statements that cannot be wrapped in `console.log(..)`
const UNWRAPPABLE_PREFIXES: &[&str] = &[
    "console.log", "//", "let ", "const ", "var ", "function ", "class ", "return ", "import ",
];

/// Make the last line print its value
///
/// Only the final line is wrapped, as a whole. Lines that end a block or
/// cannot be an expression are left alone.
pub fn fix_if_no_log_to_console(code: &str) -> String {
    let code = code.trim_end();
    let (head, last) = match code.rsplit_once('\n') {
        Some((head, last)) => (Some(head), last),
        None => (None, code),
    };

    let statement = last.trim();
    if statement.is_empty()
        || statement.ends_with('}')
        || UNWRAPPABLE_PREFIXES
            .iter()
            .any(|prefix| statement.starts_with(prefix))
    {
        return code.to_string();
    }

    let indent = &last[..last.len() - last.trim_start().len()];
    let logged = format!(
        "{}console.log({});",
        indent,
        statement.trim_end_matches(';').trim_end()
    );
    match head {
        Some(head) => format!("{}\n{}", head, logged),
        None => logged,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChainkitError;
    use std::sync::Mutex;

    struct RecordingEngine {
        seen: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl CodeExecutionEngine for RecordingEngine {
        async fn execute(&self, code: &str) -> Result<String> {
            self.seen.lock().unwrap().push(code.to_string());
            if self.fail {
                Err(ChainkitError::ExternalError("connection refused".to_string()))
            } else {
                Ok("42".to_string())
            }
        }
    }

    fn engine(fail: bool) -> Arc<RecordingEngine> {
        Arc::new(RecordingEngine {
            seen: Mutex::new(Vec::new()),
            fail,
        })
    }

    #[tokio::test]
    async fn test_tool_returns_output() {
        let engine = engine(false);
        let tool = CodeExecutionTool::new(engine.clone());
        assert_eq!(tool.execute("console.log(6 * 7)").await, "42");
        assert_eq!(engine.seen.lock().unwrap()[0], "console.log(6 * 7)");
    }

    #[tokio::test]
    async fn test_tool_turns_errors_into_text() {
        let tool = CodeExecutionTool::new(engine(true));
        let output = tool.execute("1 + 1").await;
        assert!(output.contains("connection refused"));
    }

    #[tokio::test]
    async fn test_tool_fixes_code_when_enabled() {
        let engine = engine(false);
        let tool = CodeExecutionTool::new(engine.clone()).fix_code_if_needed(true);
        tool.execute("const x = 6;\nx * 7;").await;
        assert_eq!(
            engine.seen.lock().unwrap()[0],
            "const x = 6;\nconsole.log(x * 7);"
        );
    }

    #[test]
    fn test_fix_if_no_log_to_console() {
        assert_eq!(fix_if_no_log_to_console("2 + 2"), "console.log(2 + 2);");
        assert_eq!(
            fix_if_no_log_to_console("Math.max(1, 2)"),
            "console.log(Math.max(1, 2));"
        );
        assert_eq!(fix_if_no_log_to_console("Math.sqrt(16)"), "console.log(Math.sqrt(16));");
        assert_eq!(
            fix_if_no_log_to_console("let a = 1;\nconsole.log(a);\n"),
            "let a = 1;\nconsole.log(a);"
        );
        assert_eq!(
            fix_if_no_log_to_console("let a = [3, 1];\na.sort();"),
            "let a = [3, 1];\nconsole.log(a.sort());"
        );
        assert_eq!(
            fix_if_no_log_to_console("if (x) {\n  y = 2 * x;\n  y + 1;"),
            "if (x) {\n  y = 2 * x;\n  console.log(y + 1);"
        );
    }

    #[test]
    fn test_fix_leaves_unwrappable_last_lines() {
        for code in [
            "function f() {\n  return 1;\n}",
            "let x = 1;\n// done",
            "const total = 2 + 2;",
            "",
        ] {
            assert_eq!(fix_if_no_log_to_console(code), code);
        }
    }
}
