use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors produced while invoking a single tool. These are reported back to the
/// model as tool results and never end an agent run.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum ToolError {
    #[error("Tool '{name}' not found. Available tools: {}", available.join(", "))]
    NotFound { name: String, available: Vec<String> },

    #[error("Invalid arguments: {message}")]
    InvalidArguments {
        message: String,
        parameters: Vec<String>,
    },

    #[error("Tool execution failed: {0}")]
    Execution(String),
}

impl ToolError {
    pub fn invalid_arguments<S: Into<String>>(message: S, parameters: Vec<String>) -> Self {
        ToolError::InvalidArguments {
            message: message.into(),
            parameters,
        }
    }

    /// Short machine readable tag for the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::NotFound { .. } => "not_found",
            ToolError::InvalidArguments { .. } => "invalid_arguments",
            ToolError::Execution(_) => "execution_error",
        }
    }
}

pub type ToolResult<T> = Result<T, ToolError>;

/// Errors that end an agent run.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AgentError {
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("No final answer after {0} model round trips")]
    LoopExceeded(usize),

    #[error("Run timed out after {0:?}")]
    Timeout(Duration),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AgentResult<T> = Result<T, AgentError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("Tool already registered: {0}")]
    DuplicateTool(String),

    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid tool name '{0}': use 1 to 64 letters, digits, '_' or '-'")]
    InvalidName(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_lists_available_tools() {
        let error = ToolError::NotFound {
            name: "divide".to_string(),
            available: vec!["add".to_string(), "subtract".to_string()],
        };
        assert_eq!(
            error.to_string(),
            "Tool 'divide' not found. Available tools: add, subtract"
        );
        assert_eq!(error.kind(), "not_found");
    }

    #[test]
    fn test_tool_error_serialization() -> anyhow::Result<()> {
        let error = ToolError::invalid_arguments("missing required parameter: b", vec!["b".into()]);
        let serialized = serde_json::to_string(&error)?;
        let deserialized: ToolError = serde_json::from_str(&serialized)?;
        assert_eq!(error, deserialized);
        Ok(())
    }
}
