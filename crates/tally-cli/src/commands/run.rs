use anyhow::Result;
use tally::agent::{Agent, RunFailure, RunOutcome};
use tally::conversation::Conversation;

use crate::agent_builder::build_agent;
use crate::render;
use crate::session_file::{ensure_session_dir, load_conversation, persist_conversation, session_path};
use crate::AgentOptions;

/// Ask one question, optionally inside a saved session
pub async fn execute(options: &AgentOptions, text: &str, session: Option<&str>) -> Result<()> {
    let agent = build_agent(options).await?;

    let session_file = match session {
        Some(name) => Some(session_path(&ensure_session_dir()?, name)?),
        None => None,
    };
    let conversation = match &session_file {
        Some(path) => load_conversation(path)?,
        None => Conversation::new(),
    };

    let result = ask(&agent, conversation, text).await;

    if let Some(path) = &session_file {
        let conversation = match &result {
            Ok(outcome) => &outcome.conversation,
            Err(failure) => &failure.conversation,
        };
        persist_conversation(path, conversation)?;
    }

    let outcome = result?;
    render::print_markdown(&outcome.final_text)?;
    Ok(())
}

/// Run one turn and show the tool calls it made
pub async fn ask(
    agent: &Agent,
    conversation: Conversation,
    text: &str,
) -> Result<RunOutcome, RunFailure> {
    let start = conversation.len();
    let result = agent.reply(conversation, text).await;

    let messages = match &result {
        Ok(outcome) => outcome.conversation.messages(),
        Err(failure) => failure.conversation.messages(),
    };
    if let Err(e) = render::print_tool_activity(&messages[start.min(messages.len())..]) {
        tracing::warn!("failed to render tool activity: {}", e);
    }

    result
}
