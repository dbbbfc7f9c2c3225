use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::conversation::Conversation;
use crate::errors::{AgentError, AgentResult, ToolError};
use crate::invoker::ToolInvoker;
use crate::models::message::{Message, ToolResultMessage};
use crate::prompt_template::{render_system_prompt, SYSTEM_PROMPT};
use crate::providers::base::Provider;
use crate::registry::ToolRegistry;

pub const DEFAULT_MAX_ITERATIONS: usize = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopState {
    AwaitingModel,
    ExecutingTools,
    Done,
    Failed,
}

/// A finished run: the final answer and everything that led to it
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub final_text: String,
    pub conversation: Conversation,
}

/// A failed run keeps the conversation as far as it got
#[derive(Debug, Clone, Error)]
#[error("{error}")]
pub struct RunFailure {
    pub error: AgentError,
    pub conversation: Conversation,
}

/// Agent drives a model through tool calls until it produces a final answer
pub struct Agent {
    invoker: ToolInvoker,
    provider: Box<dyn Provider>,
    max_iterations: usize,
    timeout: Option<Duration>,
    system_prompt: String,
}

impl Agent {
    /// Create a new Agent with the specified provider and tools
    pub fn new(provider: Box<dyn Provider>, registry: Arc<ToolRegistry>) -> Self {
        Self {
            invoker: ToolInvoker::new(registry),
            provider,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            timeout: None,
            system_prompt: SYSTEM_PROMPT.to_string(),
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Bound the whole run, model calls and tool calls included
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Replace the system prompt template. It is rendered with `tools` in context.
    pub fn with_system_prompt<S: Into<String>>(mut self, template: S) -> Self {
        self.system_prompt = template.into();
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        self.invoker.registry()
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub fn system_prompt(&self) -> AgentResult<String> {
        render_system_prompt(&self.system_prompt, &self.registry().describe_all())
            .map_err(|e| AgentError::Internal(format!("failed to render system prompt: {}", e)))
    }

    /// Answer a single question in a fresh conversation
    pub async fn run(&self, user_text: &str) -> Result<RunOutcome, RunFailure> {
        self.reply(Conversation::new(), user_text).await
    }

    /// Continue an existing conversation with another user turn
    pub async fn reply(
        &self,
        mut conversation: Conversation,
        user_text: &str,
    ) -> Result<RunOutcome, RunFailure> {
        // A conversation saved by an interrupted run may still have open calls
        close_pending_tool_calls(&mut conversation, "interrupted before a result was recorded");
        conversation.push(Message::user(user_text));

        let result = match self.system_prompt() {
            Ok(system) => match self.timeout {
                Some(limit) => {
                    match tokio::time::timeout(limit, self.drive(&system, &mut conversation))
                        .await
                    {
                        Ok(result) => result,
                        Err(_) => Err(AgentError::Timeout(limit)),
                    }
                }
                None => self.drive(&system, &mut conversation).await,
            },
            Err(e) => Err(e),
        };

        match result {
            Ok(final_text) => Ok(RunOutcome {
                final_text,
                conversation,
            }),
            Err(error) => {
                close_pending_tool_calls(&mut conversation, &error.to_string());
                error!(state = ?LoopState::Failed, %error, messages = conversation.len(), "run failed");
                Err(RunFailure {
                    error,
                    conversation,
                })
            }
        }
    }

    /// Answer a single question, keeping only the final text
    pub async fn run_conversation(&self, user_text: &str) -> AgentResult<String> {
        self.run(user_text)
            .await
            .map(|outcome| outcome.final_text)
            .map_err(|failure| failure.error)
    }

    async fn drive(&self, system: &str, conversation: &mut Conversation) -> AgentResult<String> {
        let tools = self.registry().describe_all();
        let mut round_trips = 0;

        loop {
            if round_trips >= self.max_iterations {
                return Err(AgentError::LoopExceeded(self.max_iterations));
            }
            round_trips += 1;

            debug!(state = ?LoopState::AwaitingModel, round_trip = round_trips, "calling model");
            let (reply, usage) = self
                .provider
                .complete(system, conversation.messages(), &tools)
                .await
                .map_err(|e| AgentError::ModelUnavailable(e.to_string()))?;
            debug!(?usage, tool_calls = reply.tool_calls.len(), "model replied");

            if !reply.has_tool_calls() {
                let final_text = reply.text.clone();
                conversation.push(reply);
                info!(state = ?LoopState::Done, round_trips, "run finished");
                return Ok(final_text);
            }

            let tool_calls = reply.tool_calls.clone();
            conversation.push(reply);

            debug!(state = ?LoopState::ExecutingTools, count = tool_calls.len(), "executing tool calls");
            for tool_call in &tool_calls {
                let result = self.invoker.invoke(tool_call).await;
                conversation.push(result);
            }
        }
    }
}

/// Give every unanswered tool call of the last turn an error result, so the
/// history stays valid to send back to the model
fn close_pending_tool_calls(conversation: &mut Conversation, reason: &str) {
    for call in conversation.pending_tool_calls() {
        warn!(tool = %call.name, id = %call.id, %reason, "closing unanswered tool call");
        conversation.push(ToolResultMessage::new(
            call.id,
            call.name,
            Err(ToolError::Execution(reason.to_string())),
        ));
    }
}
