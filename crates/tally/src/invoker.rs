use futures::FutureExt;
use serde_json::{Map, Value};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::errors::{ToolError, ToolResult};
use crate::models::message::ToolResultMessage;
use crate::models::tool::{Tool, ToolCall};
use crate::registry::ToolRegistry;

/// Runs tool calls against a registry. Every failure is turned into a tool result
/// so the model can see it and correct itself.
#[derive(Clone)]
pub struct ToolInvoker {
    registry: Arc<ToolRegistry>,
}

impl ToolInvoker {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Execute a model issued tool call and wrap the outcome for the conversation
    pub async fn invoke(&self, tool_call: &ToolCall) -> ToolResultMessage {
        let result = self
            .call(&tool_call.name, &tool_call.arguments)
            .await
            .map(|value| render_value(&value));

        match &result {
            Ok(text) => debug!(tool = %tool_call.name, id = %tool_call.id, result = %text, "tool call succeeded"),
            Err(e) => warn!(tool = %tool_call.name, id = %tool_call.id, kind = e.kind(), error = %e, "tool call failed"),
        }

        ToolResultMessage::new(tool_call.id.clone(), tool_call.name.clone(), result)
    }

    /// Look up, validate and execute a tool, returning its raw value
    pub async fn call(&self, name: &str, arguments: &Value) -> ToolResult<Value> {
        let tool = self
            .registry
            .lookup(name)
            .map_err(|_| ToolError::NotFound {
                name: name.to_string(),
                available: self.registry.names(),
            })?;

        let arguments = validate_arguments(&tool.definition, arguments)?;

        match AssertUnwindSafe(tool.handler.call(arguments))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(panic) => Err(ToolError::Execution(panic_message(panic.as_ref()))),
        }
    }
}

/// Check arguments against a tool's declared parameters
pub fn validate_arguments<'a>(tool: &Tool, arguments: &'a Value) -> ToolResult<&'a Map<String, Value>> {
    let arguments = arguments.as_object().ok_or_else(|| {
        ToolError::invalid_arguments(
            format!("arguments for '{}' must be a JSON object", tool.name),
            Vec::new(),
        )
    })?;

    let missing: Vec<String> = tool
        .parameters
        .iter()
        .filter(|p| p.required && !arguments.contains_key(&p.name))
        .map(|p| p.name.clone())
        .collect();
    if !missing.is_empty() {
        return Err(ToolError::invalid_arguments(
            format!("missing required parameter(s): {}", missing.join(", ")),
            missing,
        ));
    }

    let unexpected: Vec<String> = arguments
        .keys()
        .filter(|k| tool.parameter(k).is_none())
        .cloned()
        .collect();
    if !unexpected.is_empty() {
        return Err(ToolError::invalid_arguments(
            format!("unexpected parameter(s): {}", unexpected.join(", ")),
            unexpected,
        ));
    }

    let mismatched: Vec<_> = tool
        .parameters
        .iter()
        .filter(|p| arguments.get(&p.name).is_some_and(|v| !p.kind.accepts(v)))
        .collect();
    if !mismatched.is_empty() {
        let described: Vec<String> = mismatched
            .iter()
            .map(|p| format!("{} (expected {})", p.name, p.kind.as_str()))
            .collect();
        return Err(ToolError::invalid_arguments(
            format!("wrong type for parameter(s): {}", described.join(", ")),
            mismatched.iter().map(|p| p.name.clone()).collect(),
        ));
    }

    Ok(arguments)
}

/// Tool results are shown to the model as text; strings are not quoted
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "tool handler panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tool::{Parameter, ParameterType};
    use crate::registry::ToolHandler;
    use async_trait::async_trait;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl ToolHandler for Echo {
        async fn call(&self, arguments: &Map<String, Value>) -> ToolResult<Value> {
            Ok(arguments["message"].clone())
        }
    }

    struct Failing;

    #[async_trait]
    impl ToolHandler for Failing {
        async fn call(&self, _arguments: &Map<String, Value>) -> ToolResult<Value> {
            Err(ToolError::Execution("disk on fire".to_string()))
        }
    }

    struct Panicking;

    #[async_trait]
    impl ToolHandler for Panicking {
        async fn call(&self, _arguments: &Map<String, Value>) -> ToolResult<Value> {
            panic!("handler exploded")
        }
    }

    fn invoker() -> ToolInvoker {
        let mut registry = ToolRegistry::new();
        registry
            .register(
                Tool::new(
                    "echo",
                    "Echoes back the input",
                    vec![
                        Parameter::required("message", ParameterType::String, "What to echo"),
                        Parameter::optional("times", ParameterType::Integer, "Repeat count"),
                    ],
                ),
                Arc::new(Echo),
            )
            .unwrap();
        registry
            .register(Tool::new("fail", "Always fails", vec![]), Arc::new(Failing))
            .unwrap();
        registry
            .register(Tool::new("panic", "Always panics", vec![]), Arc::new(Panicking))
            .unwrap();
        ToolInvoker::new(Arc::new(registry))
    }

    #[tokio::test]
    async fn test_invoke_success() {
        let call = ToolCall::new("1", "echo", json!({"message": "hello"}));
        let result = invoker().invoke(&call).await;
        assert_eq!(result.tool_call_id, "1");
        assert_eq!(result.tool_name, "echo");
        assert_eq!(result.result, Ok("hello".to_string()));
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let call = ToolCall::new("7", "divide", json!({}));
        let result = invoker().invoke(&call).await;
        assert_eq!(result.tool_call_id, "7");
        match result.result {
            Err(ToolError::NotFound { ref name, ref available }) => {
                assert_eq!(name, "divide");
                assert_eq!(*available, vec!["echo", "fail", "panic"]);
            }
            other => panic!("Expected NotFound, got {:?}", other),
        }
        assert!(result.content().contains("echo, fail, panic"));
    }

    #[tokio::test]
    async fn test_missing_required_argument() {
        let call = ToolCall::new("1", "echo", json!({"times": 2}));
        match invoker().invoke(&call).await.result {
            Err(ToolError::InvalidArguments { parameters, .. }) => {
                assert_eq!(parameters, vec!["message"]);
            }
            other => panic!("Expected InvalidArguments, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unexpected_argument() {
        let call = ToolCall::new("1", "echo", json!({"message": "x", "volume": 11}));
        match invoker().invoke(&call).await.result {
            Err(ToolError::InvalidArguments { parameters, message }) => {
                assert_eq!(parameters, vec!["volume"]);
                assert!(message.contains("unexpected"));
            }
            other => panic!("Expected InvalidArguments, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_wrong_argument_type() {
        let call = ToolCall::new("1", "echo", json!({"message": 5}));
        match invoker().invoke(&call).await.result {
            Err(ToolError::InvalidArguments { parameters, message }) => {
                assert_eq!(parameters, vec!["message"]);
                assert!(message.contains("expected string"));
            }
            other => panic!("Expected InvalidArguments, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_arguments_not_an_object() {
        let call = ToolCall::new("1", "echo", Value::String("{broken".into()));
        let result = invoker().invoke(&call).await;
        assert!(matches!(
            result.result,
            Err(ToolError::InvalidArguments { .. })
        ));
    }

    #[tokio::test]
    async fn test_handler_error_is_wrapped() {
        let call = ToolCall::new("1", "fail", json!({}));
        let result = invoker().invoke(&call).await;
        assert_eq!(
            result.result,
            Err(ToolError::Execution("disk on fire".to_string()))
        );
    }

    #[tokio::test]
    async fn test_handler_panic_is_caught() {
        let call = ToolCall::new("1", "panic", json!({}));
        let result = invoker().invoke(&call).await;
        assert_eq!(
            result.result,
            Err(ToolError::Execution("handler exploded".to_string()))
        );
    }

    #[test]
    fn test_render_value() {
        assert_eq!(render_value(&json!("plain")), "plain");
        assert_eq!(render_value(&json!(42)), "42");
        assert_eq!(render_value(&json!({"a": 1})), r#"{"a":1}"#);
    }
}
