use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tally::{
    agent::Agent,
    conversation::Conversation,
    errors::{AgentError, ToolError, ToolResult},
    math::math_registry,
    models::{
        message::{AssistantMessage, Message},
        role::Role,
        tool::{Tool, ToolCall},
    },
    providers::{
        base::{Provider, Usage},
        mock::MockProvider,
    },
    registry::{ToolHandler, ToolRegistry},
};

fn math_agent(provider: impl Provider + 'static) -> Agent {
    Agent::new(Box::new(provider), Arc::new(math_registry().unwrap()))
}

fn tool_call(id: &str, name: &str, arguments: serde_json::Value) -> AssistantMessage {
    AssistantMessage::new().with_tool_call(ToolCall::new(id, name, arguments))
}

/// Requests a tool on every call and never answers
struct LoopingProvider {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Provider for LoopingProvider {
    async fn complete(
        &self,
        _system: &str,
        _messages: &[Message],
        _tools: &[Tool],
    ) -> Result<(AssistantMessage, Usage)> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok((
            tool_call(&format!("call_{}", n), "add", json!({"a": n, "b": 1})),
            Usage::default(),
        ))
    }
}

/// Adds the two numbers named in the user's question, then reports the result
struct QuestionProvider;

#[async_trait]
impl Provider for QuestionProvider {
    async fn complete(
        &self,
        _system: &str,
        messages: &[Message],
        _tools: &[Tool],
    ) -> Result<(AssistantMessage, Usage)> {
        if let Some(result) = messages.last().and_then(|m| m.as_tool_result()) {
            // Yield so concurrent runs interleave
            tokio::task::yield_now().await;
            return Ok((
                AssistantMessage::new().with_text(format!("The answer is {}", result.content())),
                Usage::default(),
            ));
        }

        let question = messages
            .first()
            .map(|m| m.text())
            .ok_or_else(|| anyhow!("empty conversation"))?;
        let numbers: Vec<i64> = question
            .split_whitespace()
            .filter_map(|word| word.trim_end_matches('?').parse().ok())
            .collect();
        Ok((
            tool_call("1", "add", json!({"a": numbers[0], "b": numbers[1]})),
            Usage::default(),
        ))
    }
}

struct SlowProvider;

#[async_trait]
impl Provider for SlowProvider {
    async fn complete(
        &self,
        _system: &str,
        _messages: &[Message],
        _tools: &[Tool],
    ) -> Result<(AssistantMessage, Usage)> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok((AssistantMessage::new().with_text("too late"), Usage::default()))
    }
}

/// A tool that never finishes in time
struct SleepTool;

#[async_trait]
impl ToolHandler for SleepTool {
    async fn call(&self, _arguments: &Map<String, Value>) -> ToolResult<Value> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(json!("woke up"))
    }
}

/// Requests one tool, then fails on the next call
struct FlakyProvider {
    calls: AtomicUsize,
}

#[async_trait]
impl Provider for FlakyProvider {
    async fn complete(
        &self,
        _system: &str,
        _messages: &[Message],
        _tools: &[Tool],
    ) -> Result<(AssistantMessage, Usage)> {
        match self.calls.fetch_add(1, Ordering::SeqCst) {
            0 => Ok((
                tool_call("1", "multiply", json!({"a": 6, "b": 7})),
                Usage::default(),
            )),
            _ => Err(anyhow!("connection refused")),
        }
    }
}

#[tokio::test]
async fn test_add_sequence() -> Result<()> {
    let provider = MockProvider::new(vec![
        tool_call("call_1", "add", json!({"a": 15, "b": 27})),
        AssistantMessage::new().with_text("15 plus 27 is 42."),
    ]);
    let agent = math_agent(provider.clone());

    let outcome = agent.run("What is 15 plus 27?").await?;

    assert_eq!(outcome.final_text, "15 plus 27 is 42.");
    let messages = outcome.conversation.messages();
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[0].role(), Role::User);
    assert_eq!(messages[0].text(), "What is 15 plus 27?");
    let result = messages[2].as_tool_result().unwrap();
    assert_eq!(result.tool_call_id, "call_1");
    assert_eq!(result.content(), "42");
    assert_eq!(provider.requests().len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_multiple_tool_calls_in_one_turn() -> Result<()> {
    let provider = MockProvider::new(vec![
        AssistantMessage::new()
            .with_tool_call(ToolCall::new("a", "add", json!({"a": 1, "b": 2})))
            .with_tool_call(ToolCall::new("b", "subtract", json!({"a": 10, "b": 4})))
            .with_tool_call(ToolCall::new("c", "multiply", json!({"a": 3, "b": 5}))),
        AssistantMessage::new().with_text("3, 6 and 15"),
    ]);
    let agent = math_agent(provider.clone());

    let outcome = agent.run("Do some sums").await?;

    let results: Vec<(String, String)> = outcome
        .conversation
        .iter()
        .filter_map(|m| m.as_tool_result())
        .map(|r| (r.tool_call_id.clone(), r.content()))
        .collect();
    assert_eq!(
        results,
        vec![
            ("a".to_string(), "3".to_string()),
            ("b".to_string(), "6".to_string()),
            ("c".to_string(), "15".to_string()),
        ]
    );
    // All three results are visible to the second model call
    assert_eq!(provider.requests()[1].len(), 5);
    Ok(())
}

#[tokio::test]
async fn test_loop_exceeded_after_exact_number_of_calls() {
    let calls = Arc::new(AtomicUsize::new(0));
    let agent = math_agent(LoopingProvider {
        calls: calls.clone(),
    })
    .with_max_iterations(3);

    let failure = agent.run("Count forever").await.unwrap_err();

    assert_eq!(failure.error, AgentError::LoopExceeded(3));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    // user + 3 x (assistant + tool result)
    assert_eq!(failure.conversation.len(), 7);
    assert_eq!(failure.conversation.last().map(|m| m.role()), Some(Role::Tool));
}

#[tokio::test]
async fn test_unknown_tool_is_not_fatal() -> Result<()> {
    let provider = MockProvider::new(vec![
        tool_call("1", "divide", json!({"a": 2, "b": 1})),
        AssistantMessage::new().with_text("I cannot divide."),
    ]);
    let agent = math_agent(provider.clone());

    let outcome = agent.run("What is 2 divided by 1?").await?;

    assert_eq!(outcome.final_text, "I cannot divide.");
    let result = outcome.conversation.messages()[2].as_tool_result().unwrap();
    match &result.result {
        Err(ToolError::NotFound { name, available }) => {
            assert_eq!(name, "divide");
            assert_eq!(available, &vec!["add", "subtract", "multiply"]);
        }
        other => panic!("Expected NotFound, got {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn test_missing_argument_is_reported_to_model() -> Result<()> {
    let provider = MockProvider::new(vec![
        tool_call("1", "add", json!({"a": 15})),
        tool_call("2", "add", json!({"a": 15, "b": 27})),
        AssistantMessage::new().with_text("42"),
    ]);
    let agent = math_agent(provider.clone());

    let outcome = agent.run("What is 15 plus 27?").await?;

    assert_eq!(outcome.final_text, "42");
    let results: Vec<_> = outcome
        .conversation
        .iter()
        .filter_map(|m| m.as_tool_result())
        .collect();
    assert!(results[0].is_error());
    assert!(results[0].content().contains("missing required parameter(s): b"));
    assert_eq!(results[1].result, Ok("42".to_string()));
    Ok(())
}

#[tokio::test]
async fn test_unparseable_arguments_are_reported() -> Result<()> {
    let provider = MockProvider::new(vec![
        tool_call("1", "add", json!("{\"a\": 15,")),
        AssistantMessage::new().with_text("Sorry"),
    ]);
    let agent = math_agent(provider);

    let outcome = agent.run("What is 15 plus 27?").await?;

    let result = outcome.conversation.messages()[2].as_tool_result().unwrap();
    assert!(matches!(
        result.result,
        Err(ToolError::InvalidArguments { .. })
    ));
    Ok(())
}

#[tokio::test]
async fn test_concurrent_runs_are_isolated() -> Result<()> {
    let agent = math_agent(QuestionProvider);

    let (first, second) = tokio::join!(
        agent.run("What is 15 plus 27?"),
        agent.run("What is 100 plus 1?")
    );
    let (first, second) = (first?, second?);

    assert_eq!(first.final_text, "The answer is 42");
    assert_eq!(second.final_text, "The answer is 101");
    assert_eq!(first.conversation.len(), 4);
    assert_eq!(second.conversation.len(), 4);
    assert_eq!(first.conversation.messages()[0].text(), "What is 15 plus 27?");
    assert_eq!(second.conversation.messages()[0].text(), "What is 100 plus 1?");
    Ok(())
}

#[tokio::test]
async fn test_conversation_survives_serialization() -> Result<()> {
    let provider = MockProvider::new(vec![
        tool_call("1", "add", json!({"a": 15, "b": 27})),
        AssistantMessage::new().with_text("42"),
        AssistantMessage::new().with_text("Still 42"),
    ]);
    let agent = math_agent(provider.clone());

    let outcome = agent.run("What is 15 plus 27?").await?;
    let restored = Conversation::from_json(&outcome.conversation.to_json()?)?;
    assert_eq!(restored, outcome.conversation);

    let mut buffer = Vec::new();
    restored.write_jsonl(&mut buffer)?;
    let resumed = Conversation::read_jsonl(buffer.as_slice())?;

    let next = agent.reply(resumed, "Are you sure?").await?;
    assert_eq!(next.final_text, "Still 42");
    assert_eq!(next.conversation.len(), 6);
    assert_eq!(provider.requests()[2].len(), 5);
    Ok(())
}

#[tokio::test]
async fn test_timeout_returns_partial_conversation() {
    let agent = math_agent(SlowProvider).with_timeout(Duration::from_millis(50));

    let failure = agent.run("Hello?").await.unwrap_err();

    assert_eq!(failure.error, AgentError::Timeout(Duration::from_millis(50)));
    assert_eq!(failure.conversation.len(), 1);
    assert_eq!(failure.conversation.messages()[0].role(), Role::User);
}

#[tokio::test]
async fn test_timeout_during_tool_call_closes_open_calls() -> Result<()> {
    let registry = math_registry()?
        .with_tool(Tool::new("sleep", "Sleep for a while", vec![]), Arc::new(SleepTool))?;
    let provider = MockProvider::new(vec![
        AssistantMessage::new()
            .with_tool_call(ToolCall::new("call_1", "add", json!({"a": 1, "b": 2})))
            .with_tool_call(ToolCall::new("call_2", "sleep", json!({}))),
        AssistantMessage::new().with_text("Sorry, that took too long."),
    ]);
    let agent = Agent::new(Box::new(provider.clone()), Arc::new(registry))
        .with_timeout(Duration::from_millis(100));

    let failure = agent.run("Add, then sleep").await.unwrap_err();

    assert_eq!(failure.error, AgentError::Timeout(Duration::from_millis(100)));
    assert!(failure.conversation.pending_tool_calls().is_empty());
    let results: Vec<_> = failure
        .conversation
        .iter()
        .filter_map(|m| m.as_tool_result())
        .collect();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].result, Ok("3".to_string()));
    assert_eq!(results[1].tool_call_id, "call_2");
    assert!(matches!(results[1].result, Err(ToolError::Execution(_))));

    // The saved conversation is still valid to continue
    let next = agent.reply(failure.conversation, "Never mind").await?;
    assert_eq!(next.final_text, "Sorry, that took too long.");
    let roles: Vec<Role> = provider.requests()[1].iter().map(|m| m.role()).collect();
    assert_eq!(
        roles,
        vec![Role::User, Role::Assistant, Role::Tool, Role::Tool, Role::User]
    );
    Ok(())
}

#[tokio::test]
async fn test_resuming_closes_calls_left_open() -> Result<()> {
    let provider = MockProvider::new(vec![AssistantMessage::new().with_text("Hello again")]);
    let agent = math_agent(provider.clone());

    let mut saved = Conversation::new();
    saved.push(Message::user("What is 1 plus 2?"));
    saved.push(tool_call("call_1", "add", json!({"a": 1, "b": 2})));

    let outcome = agent.reply(saved, "Hello?").await?;

    let request = &provider.requests()[0];
    assert_eq!(request.len(), 4);
    let result = request[2].as_tool_result().unwrap();
    assert_eq!(result.tool_call_id, "call_1");
    assert!(result.is_error());
    assert_eq!(request[3].text(), "Hello?");
    assert_eq!(outcome.conversation.len(), 5);
    Ok(())
}

#[tokio::test]
async fn test_model_failure_keeps_partial_conversation() {
    let agent = math_agent(FlakyProvider {
        calls: AtomicUsize::new(0),
    });

    let failure = agent.run("What is 6 times 7?").await.unwrap_err();

    match &failure.error {
        AgentError::ModelUnavailable(message) => assert!(message.contains("connection refused")),
        other => panic!("Expected ModelUnavailable, got {:?}", other),
    }
    assert_eq!(failure.conversation.len(), 3);
    let result = failure.conversation.messages()[2].as_tool_result().unwrap();
    assert_eq!(result.content(), "42");
}

#[tokio::test]
async fn test_run_conversation_returns_final_text() -> Result<()> {
    let agent = math_agent(MockProvider::new(vec![
        AssistantMessage::new().with_text("Hello there")
    ]));
    assert_eq!(agent.run_conversation("Hi").await?, "Hello there");
    Ok(())
}
