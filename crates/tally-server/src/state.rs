use anyhow::Result;
use std::sync::Arc;
use tally::agent::Agent;
use tally::math::math_registry;
use tally::providers::factory;
use tally::registry::ToolRegistry;
use tally::remote::{remote_registry, ToolProviderClient};
use tracing::info;

use crate::configuration::Settings;
use crate::records::{Assistant, Run, SharedThread};
use crate::store::{MemoryStore, Store};

/// Where the agent's tools are served from
#[derive(Clone)]
pub enum ToolSource {
    Local,
    Remote(Arc<ToolProviderClient>),
}

impl ToolSource {
    pub fn describe(&self) -> String {
        match self {
            ToolSource::Local => "local".to_string(),
            ToolSource::Remote(client) => client.host().to_string(),
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<Agent>,
    pub tools: ToolSource,
    pub assistants: Arc<dyn Store<Assistant>>,
    pub threads: Arc<dyn Store<SharedThread>>,
    pub runs: Arc<dyn Store<Run>>,
    pub api_key: Option<String>,
}

impl AppState {
    pub fn new(agent: Agent, tools: ToolSource) -> Self {
        Self {
            agent: Arc::new(agent),
            tools,
            assistants: Arc::new(MemoryStore::new("Assistant")),
            threads: Arc::new(MemoryStore::new("Thread")),
            runs: Arc::new(MemoryStore::new("Run")),
            api_key: None,
        }
    }

    /// Require this key on the API routes
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    /// Build the provider and tool registry described by the settings
    pub async fn from_settings(settings: Settings) -> Result<Self> {
        let (registry, tools): (ToolRegistry, ToolSource) = match &settings.tools.url {
            Some(url) => {
                let client = Arc::new(ToolProviderClient::new(url.clone())?);
                (remote_registry(client.clone()).await?, ToolSource::Remote(client))
            }
            None => (math_registry()?, ToolSource::Local),
        };
        info!(tools = ?registry.names(), source = %tools.describe(), "tools loaded");

        let provider = factory::get_provider(settings.provider.into_config())?;
        let mut agent = Agent::new(provider, Arc::new(registry))
            .with_max_iterations(settings.agent.max_iterations);
        if let Some(timeout) = settings.agent.timeout() {
            agent = agent.with_timeout(timeout);
        }

        Ok(Self::new(agent, tools).with_api_key(settings.server.api_key))
    }
}
