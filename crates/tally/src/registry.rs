use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::{RegistryError, ToolResult};
use crate::models::tool::Tool;

/// Executes one tool. Arguments have already been validated against the tool's
/// parameters when this is called.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, arguments: &Map<String, Value>) -> ToolResult<Value>;
}

/// A tool definition together with the handler that runs it
#[derive(Clone)]
pub struct RegisteredTool {
    pub definition: Tool,
    pub handler: Arc<dyn ToolHandler>,
}

/// Name keyed collection of tools, kept in registration order.
///
/// The registry is built at startup and then shared read-only (`Arc<ToolRegistry>`)
/// between any number of concurrent agent runs.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        definition: Tool,
        handler: Arc<dyn ToolHandler>,
    ) -> Result<(), RegistryError> {
        if !is_valid_tool_name(&definition.name) {
            return Err(RegistryError::InvalidName(definition.name));
        }
        if self.index.contains_key(&definition.name) {
            return Err(RegistryError::DuplicateTool(definition.name));
        }
        self.index.insert(definition.name.clone(), self.tools.len());
        self.tools.push(RegisteredTool {
            definition,
            handler,
        });
        Ok(())
    }

    /// Builder form of [`ToolRegistry::register`]
    pub fn with_tool(
        mut self,
        definition: Tool,
        handler: Arc<dyn ToolHandler>,
    ) -> Result<Self, RegistryError> {
        self.register(definition, handler)?;
        Ok(self)
    }

    pub fn lookup(&self, name: &str) -> Result<&RegisteredTool, RegistryError> {
        self.index
            .get(name)
            .map(|&i| &self.tools[i])
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    /// All tool definitions in registration order
    pub fn describe_all(&self) -> Vec<Tool> {
        self.tools.iter().map(|t| t.definition.clone()).collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.definition.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Names must survive the model's function naming rules unchanged, so a call
/// can always be routed back to the tool that was offered
pub fn is_valid_tool_name(name: &str) -> bool {
    (1..=64).contains(&name.len())
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
