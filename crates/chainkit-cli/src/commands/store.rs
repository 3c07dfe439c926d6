//! Store command

use super::parse_metadata;
use crate::app::{OutputFormat, StoreAction, StoreArgs};
use crate::output::{json, print_table, Table};
use anyhow::Result;
use chainkit_core::{
    parse_filter, ChainkitError, Config, Embedding, EmbeddingModel, EmbeddingSearchRequest,
    EmbeddingStore, OpenAiCompatibleClient, SqliteEmbeddingStore, TextSegment,
};

pub async fn run(args: StoreArgs, config: &Config, format: OutputFormat) -> Result<()> {
    let path = args.store.unwrap_or_else(SqliteEmbeddingStore::default_path);
    let store = SqliteEmbeddingStore::open(&path)?;
    tracing::debug!("Using store {}", path.display());

    match args.action {
        StoreAction::Add {
            text,
            metadata,
            vector,
        } => {
            let segment = TextSegment::with_metadata(text, parse_metadata(&metadata)?);
            let embedding = match vector {
                Some(vector) => Embedding::new(vector),
                None => embedder(config)?.embed(&segment.text).await?,
            };

            let id = store.add_segment(embedding, segment).await?;
            println!("{}", id);
        }
        StoreAction::Search {
            query,
            vector,
            max_results,
            min_score,
            filter,
        } => {
            let embedding = match (vector, query) {
                (Some(vector), _) => Embedding::new(vector),
                (None, Some(query)) => embedder(config)?.embed(&query).await?,
                (None, None) => {
                    return Err(ChainkitError::InvalidInput(
                        "give a query or --vector".to_string(),
                    )
                    .into())
                }
            };

            let mut request = EmbeddingSearchRequest::builder(embedding)
                .max_results(max_results)
                .min_score(min_score);
            if let Some(expression) = filter {
                request = request.filter(parse_filter(&expression)?);
            }
            let result = store.search(&request.build()?).await?;

            if format == OutputFormat::Json {
                let matches: Vec<serde_json::Value> = result
                    .matches
                    .iter()
                    .map(|m| {
                        serde_json::json!({
                            "id": m.id,
                            "score": m.score,
                            "text": m.embedded.as_ref().map(|s| s.text.as_str()),
                            "metadata": m.embedded.as_ref().map(|s| &s.metadata.fields),
                        })
                    })
                    .collect();
                print!("{}", json::format_value(&matches)?);
            } else {
                let mut table = Table::new(vec!["score", "id", "text", "metadata"]);
                for m in &result.matches {
                    let (text, metadata) = match &m.embedded {
                        Some(segment) => (segment.text.clone(), render_metadata(segment)),
                        None => (String::new(), String::new()),
                    };
                    table.push(vec![format!("{:.4}", m.score), m.id.clone(), text, metadata]);
                }
                print_table(&table, format)?;
            }
        }
        StoreAction::Remove { ids, filter } => {
            if ids.is_empty() && filter.is_none() {
                return Err(ChainkitError::InvalidInput(
                    "give ids to remove or --filter".to_string(),
                )
                .into());
            }

            let mut removed = 0;
            for id in &ids {
                if store.remove(id).await? {
                    removed += 1;
                } else {
                    tracing::warn!("No entry with id {}", id);
                }
            }
            if let Some(expression) = filter {
                removed += store.remove_all_matching(&parse_filter(&expression)?).await?;
            }
            println!("Removed {} entries", removed);
        }
    }
    Ok(())
}

fn embedder(config: &Config) -> Result<impl EmbeddingModel> {
    Ok(OpenAiCompatibleClient::from_config(&config.model_service)?)
}

fn render_metadata(segment: &TextSegment) -> String {
    segment
        .metadata
        .fields
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join(" ")
}
