use anyhow::{Context, Result};
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tally::agent::Agent;
use tally::math::math_registry;
use tally::providers::configs::{OllamaProviderConfig, OpenAiProviderConfig, ProviderConfig};
use tally::providers::factory::{self, ProviderType};
use tally::providers::{ollama, openai};
use tally::registry::ToolRegistry;
use tally::remote::{remote_registry, ToolProviderClient};

use crate::AgentOptions;

pub fn provider_config(options: &AgentOptions) -> Result<ProviderConfig> {
    match options.provider {
        ProviderType::OpenAi => {
            let api_key = options.api_key.clone().context(
                "API key must be provided via --api-key or OPENAI_API_KEY environment variable",
            )?;
            Ok(ProviderConfig::OpenAi(OpenAiProviderConfig {
                host: options
                    .host
                    .clone()
                    .unwrap_or_else(|| openai::OPENAI_HOST.to_string()),
                api_key,
                model: options
                    .model
                    .clone()
                    .unwrap_or_else(|| openai::OPENAI_MODEL.to_string()),
                temperature: Some(0.0),
                max_tokens: None,
            }))
        }
        ProviderType::Ollama => Ok(ProviderConfig::Ollama(OllamaProviderConfig {
            host: options
                .host
                .clone()
                .unwrap_or_else(|| ollama::OLLAMA_HOST.to_string()),
            model: options
                .model
                .clone()
                .unwrap_or_else(|| ollama::OLLAMA_MODEL.to_string()),
            temperature: Some(0.0),
            max_tokens: None,
        })),
    }
}

/// The remote provider's tools when a URL is configured, otherwise the math tools
pub async fn tool_registry(options: &AgentOptions) -> Result<ToolRegistry> {
    match &options.tools_url {
        Some(url) => {
            let client = Arc::new(ToolProviderClient::new(url.clone())?);
            remote_registry(client)
                .await
                .with_context(|| format!("Failed to load tools from {}", url))
        }
        None => Ok(math_registry()?),
    }
}

pub async fn build_agent(options: &AgentOptions) -> Result<Agent> {
    let provider = factory::get_provider(provider_config(options)?)?;
    let registry = tool_registry(options).await?;

    let mut agent =
        Agent::new(provider, Arc::new(registry)).with_max_iterations(options.max_iterations);
    if let Some(secs) = options.timeout {
        agent = agent.with_timeout(Duration::from_secs(secs));
    }
    if let Some(path) = &options.system_prompt {
        let template = fs::read_to_string(path)
            .with_context(|| format!("Failed to read system prompt {}", path.display()))?;
        agent = agent.with_system_prompt(template);
    }
    // Surface template errors before the first question
    agent.system_prompt()?;

    Ok(agent)
}
