use super::role::Role;
use super::tool::ToolCall;
use crate::errors::ToolResult;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

fn now() -> i64 {
    Utc::now().timestamp()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserMessage {
    pub text: String,
    #[serde(default = "now")]
    pub created: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantMessage {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default = "now")]
    pub created: i64,
}

impl Default for AssistantMessage {
    fn default() -> Self {
        AssistantMessage::new()
    }
}

impl AssistantMessage {
    /// Create an empty assistant message with the current timestamp
    pub fn new() -> Self {
        AssistantMessage {
            text: String::new(),
            tool_calls: Vec::new(),
            created: now(),
        }
    }

    /// Set the text of the message, appending to any text already present
    pub fn with_text<S: Into<String>>(mut self, text: S) -> Self {
        self.text.push_str(&text.into());
        self
    }

    /// Add a tool call to the message
    pub fn with_tool_call(mut self, tool_call: ToolCall) -> Self {
        self.tool_calls.push(tool_call);
        self
    }

    /// Any tool call means the model wants another turn, whatever text came with it
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResultMessage {
    pub tool_call_id: String,
    pub tool_name: String,
    pub result: ToolResult<String>,
    #[serde(default = "now")]
    pub created: i64,
}

impl ToolResultMessage {
    pub fn new<I: Into<String>, N: Into<String>>(
        tool_call_id: I,
        tool_name: N,
        result: ToolResult<String>,
    ) -> Self {
        ToolResultMessage {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            result,
            created: now(),
        }
    }

    /// The text shown to the model for this result
    pub fn content(&self) -> String {
        match &self.result {
            Ok(text) => text.clone(),
            Err(e) => format!("Error: {}", e),
        }
    }

    pub fn is_error(&self) -> bool {
        self.result.is_err()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
/// A message to or from an LLM
pub enum Message {
    User(UserMessage),
    Assistant(AssistantMessage),
    Tool(ToolResultMessage),
}

impl Message {
    /// Create a new user message with the current timestamp
    pub fn user<S: Into<String>>(text: S) -> Self {
        Message::User(UserMessage {
            text: text.into(),
            created: now(),
        })
    }

    pub fn role(&self) -> Role {
        match self {
            Message::User(_) => Role::User,
            Message::Assistant(_) => Role::Assistant,
            Message::Tool(_) => Role::Tool,
        }
    }

    pub fn created(&self) -> i64 {
        match self {
            Message::User(m) => m.created,
            Message::Assistant(m) => m.created,
            Message::Tool(m) => m.created,
        }
    }

    /// The text of the message as a person would read it
    pub fn text(&self) -> String {
        match self {
            Message::User(m) => m.text.clone(),
            Message::Assistant(m) => m.text.clone(),
            Message::Tool(m) => m.content(),
        }
    }

    pub fn as_assistant(&self) -> Option<&AssistantMessage> {
        if let Message::Assistant(ref message) = self {
            Some(message)
        } else {
            None
        }
    }

    pub fn as_tool_result(&self) -> Option<&ToolResultMessage> {
        if let Message::Tool(ref message) = self {
            Some(message)
        } else {
            None
        }
    }

    /// Parse a loosely shaped `{role, content}` object as sent by simple chat clients
    pub fn from_chat_json(value: &Value) -> Option<Message> {
        let role = value.get("role")?.as_str()?;
        let content = value.get("content")?.as_str()?;
        match role {
            "user" | "human" => Some(Message::user(content)),
            "assistant" | "ai" => Some(AssistantMessage::new().with_text(content).into()),
            _ => None,
        }
    }
}

impl From<AssistantMessage> for Message {
    fn from(message: AssistantMessage) -> Self {
        Message::Assistant(message)
    }
}

impl From<ToolResultMessage> for Message {
    fn from(message: ToolResultMessage) -> Self {
        Message::Tool(message)
    }
}
