use anyhow::{anyhow, Result};
use regex::Regex;
use serde_json::{json, Map, Value};

use super::base::Usage;
use crate::models::message::{AssistantMessage, Message};
use crate::models::tool::{Tool, ToolCall};

/// Convert internal Message format to OpenAI's API message specification
pub fn messages_to_openai_spec(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .map(|message| match message {
            Message::User(user) => json!({
                "role": "user",
                "content": user.text,
            }),
            Message::Assistant(assistant) => {
                let mut converted = json!({ "role": "assistant" });
                converted["content"] = if assistant.text.is_empty() {
                    Value::Null
                } else {
                    json!(assistant.text)
                };
                if assistant.has_tool_calls() {
                    let tool_calls: Vec<Value> = assistant
                        .tool_calls
                        .iter()
                        .map(|call| {
                            json!({
                                "id": call.id,
                                "type": "function",
                                "function": {
                                    "name": sanitize_function_name(&call.name),
                                    "arguments": call.arguments_text(),
                                }
                            })
                        })
                        .collect();
                    converted["tool_calls"] = json!(tool_calls);
                }
                converted
            }
            // A tool error is shown as output so the model can interpret the error message
            Message::Tool(result) => json!({
                "role": "tool",
                "tool_call_id": result.tool_call_id,
                "name": sanitize_function_name(&result.tool_name),
                "content": result.content(),
            }),
        })
        .collect()
}

/// Convert internal Tool format to OpenAI's API tool specification
pub fn tools_to_openai_spec(tools: &[Tool]) -> Result<Vec<Value>> {
    let mut tool_names = std::collections::HashSet::new();
    let mut result = Vec::new();

    for tool in tools {
        if !tool_names.insert(&tool.name) {
            return Err(anyhow!("Duplicate tool name: {}", tool.name));
        }

        let mut function = tool.to_schema();
        function["name"] = json!(sanitize_function_name(&tool.name));
        result.push(json!({
            "type": "function",
            "function": function,
        }));
    }

    Ok(result)
}

/// Build a chat completion payload with the system prompt as the first message
pub fn openai_payload(
    model: &str,
    system: &str,
    messages: &[Message],
    tools: &[Tool],
    temperature: Option<f32>,
    max_tokens: Option<i32>,
) -> Result<Value> {
    let mut messages_array = vec![json!({
        "role": "system",
        "content": system
    })];
    messages_array.extend(messages_to_openai_spec(messages));

    let mut payload = Map::new();
    payload.insert("model".to_string(), json!(model));
    payload.insert("messages".to_string(), json!(messages_array));

    let tools_spec = tools_to_openai_spec(tools)?;
    if !tools_spec.is_empty() {
        payload.insert("tools".to_string(), json!(tools_spec));
    }
    if let Some(temp) = temperature {
        payload.insert("temperature".to_string(), json!(temp));
    }
    if let Some(tokens) = max_tokens {
        payload.insert("max_tokens".to_string(), json!(tokens));
    }

    Ok(Value::Object(payload))
}

/// Convert OpenAI's API response to an assistant message
pub fn openai_response_to_message(response: &Value) -> Result<AssistantMessage> {
    let original = response
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .ok_or_else(|| anyhow!("Malformed response: missing choices[0].message"))?;

    let mut message = AssistantMessage::new();

    if let Some(text) = original.get("content").and_then(|c| c.as_str()) {
        message = message.with_text(text);
    }

    if let Some(tool_calls) = original.get("tool_calls").and_then(|t| t.as_array()) {
        for (index, tool_call) in tool_calls.iter().enumerate() {
            let id = tool_call["id"]
                .as_str()
                .map(String::from)
                .unwrap_or_else(|| format!("call_{}", index));
            let function_name = tool_call["function"]["name"]
                .as_str()
                .ok_or_else(|| anyhow!("Malformed response: tool call {} has no name", id))?;

            // Argument text that is not valid JSON is kept as-is and reported back
            // to the model as invalid arguments by the invoker
            let arguments = match &tool_call["function"]["arguments"] {
                Value::String(raw) if raw.trim().is_empty() => json!({}),
                Value::String(raw) => {
                    serde_json::from_str::<Value>(raw).unwrap_or_else(|_| json!(raw))
                }
                Value::Null => json!({}),
                other => other.clone(),
            };

            message = message.with_tool_call(ToolCall::new(id, function_name, arguments));
        }
    }

    Ok(message)
}

pub fn get_openai_usage(data: &Value) -> Usage {
    let Some(usage) = data.get("usage") else {
        return Usage::default();
    };

    let read = |key: &str| usage.get(key).and_then(|v| v.as_i64()).map(|v| v as i32);
    let input_tokens = read("prompt_tokens");
    let output_tokens = read("completion_tokens");
    let total_tokens = read("total_tokens").or_else(|| match (input_tokens, output_tokens) {
        (Some(input), Some(output)) => Some(input + output),
        _ => None,
    });

    Usage::new(input_tokens, output_tokens, total_tokens)
}

/// Turn a chat completion body into a message, surfacing API errors
pub fn handle_openai_response(response: &Value) -> Result<(AssistantMessage, Usage)> {
    if let Some(error) = response.get("error") {
        if let Some(err) = check_openai_context_length_error(error) {
            return Err(err.into());
        }
        return Err(anyhow!("OpenAI API error: {}", error));
    }

    let message = openai_response_to_message(response)?;
    Ok((message, get_openai_usage(response)))
}

pub fn sanitize_function_name(name: &str) -> String {
    let re = Regex::new(r"[^a-zA-Z0-9_-]").unwrap();
    re.replace_all(name, "_").to_string()
}

#[derive(Debug, thiserror::Error)]
#[error("Context length exceeded. Message: {0}")]
pub struct ContextLengthExceededError(String);

pub fn check_openai_context_length_error(error: &Value) -> Option<ContextLengthExceededError> {
    let code = error.get("code")?.as_str()?;
    if code == "context_length_exceeded" || code == "string_above_max_length" {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("Unknown error")
            .to_string();
        Some(ContextLengthExceededError(message))
    } else {
        None
    }
}
