use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};

use crate::models::message::{AssistantMessage, Message};
use crate::models::tool::ToolCall;

/// The ordered message history of one conversation. Messages are only ever appended.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<M: Into<Message>>(&mut self, message: M) {
        self.messages.push(message.into());
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }

    /// The most recent assistant message that requested no tools, if the
    /// conversation ends with one
    pub fn final_answer(&self) -> Option<&AssistantMessage> {
        self.last()
            .and_then(|m| m.as_assistant())
            .filter(|m| !m.has_tool_calls())
    }

    /// Tool calls of the latest assistant message that have no result yet
    pub fn pending_tool_calls(&self) -> Vec<ToolCall> {
        let Some(turn) = self.messages.iter().rposition(|m| m.as_assistant().is_some()) else {
            return Vec::new();
        };
        let answered: Vec<&str> = self.messages[turn + 1..]
            .iter()
            .filter_map(|m| m.as_tool_result())
            .map(|r| r.tool_call_id.as_str())
            .collect();
        self.messages[turn]
            .as_assistant()
            .map(|assistant| {
                assistant
                    .tool_calls
                    .iter()
                    .filter(|call| !answered.contains(&call.id.as_str()))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Write one message per line
    pub fn write_jsonl<W: Write>(&self, writer: W) -> Result<()> {
        let mut writer = std::io::BufWriter::new(writer);
        for message in &self.messages {
            serde_json::to_writer(&mut writer, message)?;
            writeln!(writer)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Read one message per line, skipping blank lines
    pub fn read_jsonl<R: BufRead>(reader: R) -> Result<Self> {
        let mut messages = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            messages.push(serde_json::from_str::<Message>(&line)?);
        }
        Ok(Self { messages })
    }
}

impl From<Vec<Message>> for Conversation {
    fn from(messages: Vec<Message>) -> Self {
        Self { messages }
    }
}

impl IntoIterator for Conversation {
    type Item = Message;
    type IntoIter = std::vec::IntoIter<Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.into_iter()
    }
}

impl<'a> IntoIterator for &'a Conversation {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ToolError;
    use crate::models::message::ToolResultMessage;
    use crate::models::tool::ToolCall;
    use serde_json::json;

    fn sample() -> Conversation {
        let mut conversation = Conversation::new();
        conversation.push(Message::user("What is 15 plus 27? Then divide by 2"));
        conversation.push(
            AssistantMessage::new()
                .with_tool_call(ToolCall::new("call_1", "add", json!({"a": 15, "b": 27.5})))
                .with_tool_call(ToolCall::new("call_2", "divide", json!({"a": 42, "b": 2}))),
        );
        conversation.push(ToolResultMessage::new("call_1", "add", Ok("42.5".into())));
        conversation.push(ToolResultMessage::new(
            "call_2",
            "divide",
            Err(ToolError::NotFound {
                name: "divide".into(),
                available: vec!["add".into()],
            }),
        ));
        conversation.push(AssistantMessage::new().with_text("The sum is 42.5"));
        conversation
    }

    #[test]
    fn test_json_round_trip() -> Result<()> {
        let conversation = sample();
        let json = conversation.to_json()?;
        let parsed = Conversation::from_json(&json)?;
        assert_eq!(conversation, parsed);
        Ok(())
    }

    #[test]
    fn test_jsonl_round_trip() -> Result<()> {
        let conversation = sample();
        let mut buffer = Vec::new();
        conversation.write_jsonl(&mut buffer)?;
        assert_eq!(String::from_utf8(buffer.clone())?.lines().count(), 5);

        let parsed = Conversation::read_jsonl(buffer.as_slice())?;
        assert_eq!(conversation, parsed);
        Ok(())
    }

    #[test]
    fn test_pending_tool_calls() {
        assert!(sample().pending_tool_calls().is_empty());

        let mut conversation = Conversation::new();
        conversation.push(Message::user("Add and multiply"));
        conversation.push(
            AssistantMessage::new()
                .with_tool_call(ToolCall::new("call_1", "add", json!({"a": 1, "b": 2})))
                .with_tool_call(ToolCall::new("call_2", "multiply", json!({"a": 3, "b": 4}))),
        );
        conversation.push(ToolResultMessage::new("call_1", "add", Ok("3".into())));

        let pending: Vec<String> = conversation
            .pending_tool_calls()
            .into_iter()
            .map(|call| call.id)
            .collect();
        assert_eq!(pending, vec!["call_2"]);
    }

    #[test]
    fn test_final_answer() {
        let conversation = sample();
        assert_eq!(conversation.final_answer().unwrap().text, "The sum is 42.5");

        let mut pending = Conversation::new();
        pending.push(Message::user("hi"));
        assert!(pending.final_answer().is_none());
    }
}
