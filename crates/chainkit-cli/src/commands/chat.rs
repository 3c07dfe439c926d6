//! Chat command

use crate::app::{ChatArgs, ChatProvider};
use anyhow::Result;
use chainkit_core::{
    ChainkitError, ChatMessage, ChatModel, Config, MistralAiChatModelName, MistralAiClient,
    OpenAiCompatibleClient,
};
use std::time::Duration;

pub async fn run(args: ChatArgs, config: &Config, verbose: bool) -> Result<()> {
    let mut messages = Vec::new();
    if let Some(system) = &args.system {
        messages.push(ChatMessage::system(system));
    }
    messages.push(ChatMessage::user(args.prompt.join(" ")));

    let service = &config.model_service;
    let model: Box<dyn ChatModel> = match args.provider {
        ChatProvider::Openai => {
            let mut service = service.clone();
            if let Some(model) = args.model {
                service.model = model;
            }
            service.log_requests |= verbose;
            Box::new(OpenAiCompatibleClient::from_config(&service)?)
        }
        ChatProvider::Mistral => {
            let api_key = service.api_key.clone().ok_or_else(|| {
                ChainkitError::Config(
                    "Mistral AI needs an API key: set model_service.api_key or CHAINKIT_LLM_API_KEY"
                        .to_string(),
                )
            })?;
            let name = match args.model {
                Some(model) => model.parse::<MistralAiChatModelName>()?,
                None => MistralAiChatModelName::MistralSmallLatest,
            };
            let mut builder = MistralAiClient::builder(api_key)
                .model_name(name)
                .temperature(service.temperature)
                .timeout(Duration::from_secs(service.timeout_secs))
                .log_requests(service.log_requests || verbose);
            if let Some(max_tokens) = service.max_tokens {
                builder = builder.max_tokens(max_tokens);
            }
            for (name, value) in &service.custom_headers {
                builder = builder.custom_header(name, value);
            }
            Box::new(builder.build()?)
        }
    };

    tracing::debug!("Chatting with {}", model.model_name());
    let reply = model.chat(messages).await?;
    println!("{}", reply);
    Ok(())
}
