use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::errors::{ToolError, ToolResult};
use crate::models::tool::Tool;
use crate::registry::{ToolHandler, ToolRegistry};

pub const TOOLS_HOST: &str = "http://localhost:5000";

#[derive(Debug, Deserialize)]
struct ToolListing {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(alias = "inputSchema", default)]
    input_schema: Value,
}

/// Client for a tool provider speaking the `/tools` HTTP protocol
pub struct ToolProviderClient {
    client: Client,
    host: String,
}

impl ToolProviderClient {
    pub fn new<S: Into<String>>(host: S) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            client,
            host: host.into(),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.host.trim_end_matches('/'), path)
    }

    pub async fn health(&self) -> Result<Value> {
        let response = self.client.get(self.url("/health")).send().await?;
        if !response.status().is_success() {
            return Err(anyhow!("Health check failed: {}", response.status()));
        }
        Ok(response.json().await?)
    }

    /// Fetch the tool definitions the provider publishes. Accepts both
    /// `{"tools": [...]}` and a bare list.
    pub async fn list_tools(&self) -> Result<Vec<Tool>> {
        let response = self.client.get(self.url("/tools")).send().await?;
        if !response.status().is_success() {
            return Err(anyhow!("Listing tools failed: {}", response.status()));
        }
        let body: Value = response.json().await?;
        let listing = match body {
            Value::Object(mut map) => map.remove("tools").unwrap_or(Value::Array(vec![])),
            other => other,
        };
        let listings: Vec<ToolListing> = serde_json::from_value(listing)?;

        listings
            .into_iter()
            .map(|t| Tool::from_input_schema(t.name, t.description, &t.input_schema))
            .collect()
    }

    /// Execute a tool on the provider, mapping HTTP status codes onto tool errors
    pub async fn call(&self, name: &str, arguments: &Map<String, Value>) -> ToolResult<Value> {
        debug!(tool = name, host = %self.host, "calling remote tool");
        let response = self
            .client
            .post(self.url("/tools/call"))
            .json(&json!({
                "tool_name": name,
                "arguments": arguments,
            }))
            .send()
            .await
            .map_err(|e| ToolError::Execution(format!("Error calling {} tool: {}", name, e)))?;

        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);
        let message = body
            .get("error")
            .and_then(|e| e.as_str())
            .map(String::from)
            .unwrap_or_else(|| format!("tool provider returned {}", status));

        match status {
            s if s.is_success() => body
                .get("result")
                .cloned()
                .ok_or_else(|| ToolError::Execution("tool provider response had no result".into())),
            StatusCode::NOT_FOUND => Err(ToolError::NotFound {
                name: name.to_string(),
                available: body
                    .get("available_tools")
                    .and_then(|a| a.as_array())
                    .map(|a| a.iter().filter_map(|v| v.as_str().map(String::from)).collect())
                    .unwrap_or_default(),
            }),
            StatusCode::BAD_REQUEST => {
                let message = message
                    .strip_prefix("Invalid arguments: ")
                    .map(String::from)
                    .unwrap_or(message);
                Err(ToolError::invalid_arguments(message, Vec::new()))
            }
            _ => Err(ToolError::Execution(message)),
        }
    }
}

/// Handler forwarding calls for one tool to a remote provider
pub struct RemoteTool {
    client: Arc<ToolProviderClient>,
    name: String,
}

impl RemoteTool {
    pub fn new<S: Into<String>>(client: Arc<ToolProviderClient>, name: S) -> Self {
        Self {
            client,
            name: name.into(),
        }
    }
}

#[async_trait]
impl ToolHandler for RemoteTool {
    async fn call(&self, arguments: &Map<String, Value>) -> ToolResult<Value> {
        self.client.call(&self.name, arguments).await
    }
}

/// Build a registry from everything a remote provider publishes
pub async fn remote_registry(client: Arc<ToolProviderClient>) -> Result<ToolRegistry> {
    let tools = client.list_tools().await?;
    let mut registry = ToolRegistry::new();
    for tool in tools {
        let handler = Arc::new(RemoteTool::new(client.clone(), tool.name.clone()));
        registry.register(tool, handler)?;
    }
    info!(host = %client.host(), tools = ?registry.names(), "loaded remote tools");
    Ok(registry)
}
