use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// The JSON type a tool parameter accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    Number,
    Integer,
    String,
    Boolean,
    Object,
    Array,
}

impl ParameterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterType::Number => "number",
            ParameterType::Integer => "integer",
            ParameterType::String => "string",
            ParameterType::Boolean => "boolean",
            ParameterType::Object => "object",
            ParameterType::Array => "array",
        }
    }

    /// Whether a JSON value is acceptable for this type
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            ParameterType::Number => value.is_number(),
            ParameterType::Integer => {
                value.is_i64()
                    || value.is_u64()
                    || value.as_f64().is_some_and(|v| v.fract() == 0.0)
            }
            ParameterType::String => value.is_string(),
            ParameterType::Boolean => value.is_boolean(),
            ParameterType::Object => value.is_object(),
            ParameterType::Array => value.is_array(),
        }
    }

    fn parse(name: &str) -> Option<Self> {
        match name {
            "number" => Some(ParameterType::Number),
            "integer" => Some(ParameterType::Integer),
            "string" => Some(ParameterType::String),
            "boolean" => Some(ParameterType::Boolean),
            "object" => Some(ParameterType::Object),
            "array" => Some(ParameterType::Array),
            _ => None,
        }
    }
}

/// A single named parameter of a tool
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ParameterType,
    pub description: String,
    pub required: bool,
}

impl Parameter {
    pub fn required<N, D>(name: N, kind: ParameterType, description: D) -> Self
    where
        N: Into<String>,
        D: Into<String>,
    {
        Parameter {
            name: name.into(),
            kind,
            description: description.into(),
            required: true,
        }
    }

    pub fn optional<N, D>(name: N, kind: ParameterType, description: D) -> Self
    where
        N: Into<String>,
        D: Into<String>,
    {
        Parameter {
            required: false,
            ..Parameter::required(name, kind, description)
        }
    }
}

/// A tool that can be used by a model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tool {
    /// The name of the tool, unique within a registry
    pub name: String,
    /// A description of what the tool does
    pub description: String,
    /// Parameters that the tool accepts, in declaration order
    pub parameters: Vec<Parameter>,
}

impl Tool {
    /// Create a new tool with the given name and description
    pub fn new<N, D>(name: N, description: D, parameters: Vec<Parameter>) -> Self
    where
        N: Into<String>,
        D: Into<String>,
    {
        Tool {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }

    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// The JSON schema object describing this tool's arguments
    pub fn input_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .parameters
            .iter()
            .map(|p| {
                (
                    p.name.clone(),
                    json!({
                        "type": p.kind.as_str(),
                        "description": p.description,
                    }),
                )
            })
            .collect();

        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// The schema presented to a model: name, description and parameters
    pub fn to_schema(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "parameters": self.input_schema(),
        })
    }

    /// Build a tool from a JSON schema object as published by a tool provider
    pub fn from_input_schema<N, D>(name: N, description: D, schema: &Value) -> Result<Self>
    where
        N: Into<String>,
        D: Into<String>,
    {
        let name = name.into();
        let properties = match schema.get("properties") {
            Some(Value::Object(properties)) => properties.clone(),
            Some(_) => return Err(anyhow!("Schema for '{}' has non-object properties", name)),
            None => Map::new(),
        };
        let required: Vec<&str> = schema
            .get("required")
            .and_then(|r| r.as_array())
            .map(|r| r.iter().filter_map(|v| v.as_str()).collect())
            .unwrap_or_default();

        let mut parameters = Vec::with_capacity(properties.len());
        for (param, spec) in &properties {
            let type_name = spec.get("type").and_then(|t| t.as_str()).unwrap_or("string");
            let kind = ParameterType::parse(type_name).ok_or_else(|| {
                anyhow!(
                    "Unsupported type '{}' for parameter '{}' of '{}'",
                    type_name,
                    param,
                    name
                )
            })?;
            let description = spec
                .get("description")
                .and_then(|d| d.as_str())
                .unwrap_or_default();
            parameters.push(Parameter {
                name: param.clone(),
                kind,
                description: description.to_string(),
                required: required.contains(&param.as_str()),
            });
        }

        Ok(Tool::new(name, description, parameters))
    }
}

/// A tool call request made by the model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    /// Correlation id, echoed by the matching tool result
    pub id: String,
    /// The name of the tool to execute
    pub name: String,
    /// The arguments for the execution, normally a JSON object
    pub arguments: Value,
}

impl ToolCall {
    pub fn new<I: Into<String>, S: Into<String>>(id: I, name: S, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// Arguments in the textual form used by chat completion APIs. Argument text
    /// the model produced but that was not valid JSON is replayed verbatim.
    pub fn arguments_text(&self) -> String {
        match &self.arguments {
            Value::String(raw) => raw.clone(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add_tool() -> Tool {
        Tool::new(
            "add",
            "Add two numbers together",
            vec![
                Parameter::required("a", ParameterType::Number, "First number"),
                Parameter::required("b", ParameterType::Number, "Second number"),
            ],
        )
    }

    #[test]
    fn test_input_schema() {
        let schema = add_tool().input_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["a"]["type"], "number");
        assert_eq!(schema["properties"]["b"]["description"], "Second number");
        assert_eq!(schema["required"], json!(["a", "b"]));
    }

    #[test]
    fn test_to_schema() {
        let schema = add_tool().to_schema();
        assert_eq!(schema["name"], "add");
        assert_eq!(schema["description"], "Add two numbers together");
        assert_eq!(schema["parameters"]["required"], json!(["a", "b"]));
    }

    #[test]
    fn test_from_input_schema() -> Result<()> {
        let schema = json!({
            "type": "object",
            "properties": {
                "a": {"type": "number", "description": "First number"},
                "note": {"type": "string"}
            },
            "required": ["a"]
        });
        let tool = Tool::from_input_schema("annotate", "Annotate a number", &schema)?;
        assert_eq!(tool.parameters.len(), 2);
        assert!(tool.parameter("a").unwrap().required);
        assert!(!tool.parameter("note").unwrap().required);
        assert_eq!(tool.parameter("note").unwrap().kind, ParameterType::String);
        Ok(())
    }

    #[test]
    fn test_from_input_schema_unknown_type() {
        let schema = json!({"properties": {"x": {"type": "complex"}}});
        let result = Tool::from_input_schema("weird", "", &schema);
        assert!(result.unwrap_err().to_string().contains("Unsupported type"));
    }

    #[test]
    fn test_parameter_type_accepts() {
        assert!(ParameterType::Number.accepts(&json!(1.5)));
        assert!(!ParameterType::Number.accepts(&json!("1.5")));
        assert!(ParameterType::Integer.accepts(&json!(3)));
        assert!(ParameterType::Integer.accepts(&json!(3.0)));
        assert!(!ParameterType::Integer.accepts(&json!(3.5)));
        assert!(ParameterType::Boolean.accepts(&json!(true)));
    }

    #[test]
    fn test_arguments_text() {
        let call = ToolCall::new("1", "add", json!({"a": 1}));
        assert_eq!(call.arguments_text(), r#"{"a":1}"#);

        let raw = ToolCall::new("2", "add", Value::String("{not json".into()));
        assert_eq!(raw.arguments_text(), "{not json");
    }
}
