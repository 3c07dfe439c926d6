//! Models command

use crate::app::{ModelProvider, ModelsArgs, OutputFormat};
use crate::output::{print_table, Table};
use anyhow::Result;
use chainkit_core::{Judge0Language, MistralAiChatModelName, MistralAiEmbeddingModelName};

pub async fn run(args: ModelsArgs, format: OutputFormat) -> Result<()> {
    let mut table = Table::new(vec!["provider", "kind", "name", "detail"]);

    if matches!(args.provider, ModelProvider::All | ModelProvider::Mistral) {
        for model in MistralAiChatModelName::ALL {
            table.push(vec![
                "mistral".to_string(),
                "chat".to_string(),
                model.as_str().to_string(),
                String::new(),
            ]);
        }
        for model in MistralAiEmbeddingModelName::ALL {
            table.push(vec![
                "mistral".to_string(),
                "embedding".to_string(),
                model.as_str().to_string(),
                format!("{} dims", model.dimension()),
            ]);
        }
    }

    if matches!(args.provider, ModelProvider::All | ModelProvider::Judge0) {
        for language in [Judge0Language::JavaScript, Judge0Language::Python] {
            table.push(vec![
                "judge0".to_string(),
                "language".to_string(),
                language.name().to_string(),
                format!("id {}", language.id()),
            ]);
        }
    }

    print_table(&table, format)
}
