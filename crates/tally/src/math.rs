//! The arithmetic tools: `add`, `subtract` and `multiply`, each over two numbers `a` and `b`.
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Arc;

use crate::errors::{RegistryError, ToolError, ToolResult};
use crate::models::tool::{Parameter, ParameterType, Tool};
use crate::registry::{ToolHandler, ToolRegistry};

pub fn add(a: f64, b: f64) -> f64 {
    a + b
}

pub fn subtract(a: f64, b: f64) -> f64 {
    a - b
}

pub fn multiply(a: f64, b: f64) -> f64 {
    a * b
}

/// A tool handler applying a binary operation to the `a` and `b` arguments
pub struct BinaryOp {
    op: fn(f64, f64) -> f64,
}

impl BinaryOp {
    pub fn new(op: fn(f64, f64) -> f64) -> Self {
        Self { op }
    }
}

#[async_trait]
impl ToolHandler for BinaryOp {
    async fn call(&self, arguments: &Map<String, Value>) -> ToolResult<Value> {
        let operand = |name: &str| {
            arguments.get(name).and_then(Value::as_f64).ok_or_else(|| {
                ToolError::invalid_arguments(
                    format!("parameter '{}' must be a number", name),
                    vec![name.to_string()],
                )
            })
        };
        number_value((self.op)(operand("a")?, operand("b")?))
    }
}

/// Integral results are reported as integers so `15 + 27` reads as `42`
fn number_value(x: f64) -> ToolResult<Value> {
    const MAX_EXACT: f64 = 9_007_199_254_740_992.0; // 2^53

    if !x.is_finite() {
        return Err(ToolError::Execution(format!(
            "result is not a finite number: {}",
            x
        )));
    }
    if x.fract() == 0.0 && x.abs() <= MAX_EXACT {
        Ok(json!(x as i64))
    } else {
        Ok(json!(x))
    }
}

fn operands(first: &str, second: &str) -> Vec<Parameter> {
    vec![
        Parameter::required("a", ParameterType::Number, first),
        Parameter::required("b", ParameterType::Number, second),
    ]
}

/// Tool definitions and handlers for the arithmetic tools
pub fn math_tools() -> Vec<(Tool, Arc<dyn ToolHandler>)> {
    vec![
        (
            Tool::new(
                "add",
                "Add two numbers together",
                operands("First number", "Second number"),
            ),
            Arc::new(BinaryOp::new(add)),
        ),
        (
            Tool::new(
                "subtract",
                "Subtract second number from first number",
                operands("First number (minuend)", "Second number (subtrahend)"),
            ),
            Arc::new(BinaryOp::new(subtract)),
        ),
        (
            Tool::new(
                "multiply",
                "Multiply two numbers together",
                operands("First number", "Second number"),
            ),
            Arc::new(BinaryOp::new(multiply)),
        ),
    ]
}

pub fn register_math_tools(registry: &mut ToolRegistry) -> Result<(), RegistryError> {
    for (definition, handler) in math_tools() {
        registry.register(definition, handler)?;
    }
    Ok(())
}

/// A registry holding only the arithmetic tools
pub fn math_registry() -> Result<ToolRegistry, RegistryError> {
    let mut registry = ToolRegistry::new();
    register_math_tools(&mut registry)?;
    Ok(registry)
}
