//! Exec command

use crate::app::ExecArgs;
use anyhow::{Context, Result};
use chainkit_core::{CodeExecutionEngine, CodeExecutionTool, Config, Judge0Engine, Judge0Language};
use std::io::Read;
use std::sync::Arc;

pub async fn run(args: ExecArgs, config: &Config) -> Result<()> {
    let code = match &args.file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut code = String::new();
            std::io::stdin().read_to_string(&mut code)?;
            code
        }
    };

    let mut judge0 = config.judge0.clone();
    if let Some(language) = &args.language {
        judge0.language = language.parse::<Judge0Language>()?;
    }

    let engine: Arc<dyn CodeExecutionEngine> = Arc::new(Judge0Engine::from_config(&judge0)?);
    let output = if args.fix {
        CodeExecutionTool::new(engine)
            .fix_code_if_needed(true)
            .execute(&code)
            .await
    } else {
        engine.execute(&code).await?
    };

    println!("{}", output);
    Ok(())
}
