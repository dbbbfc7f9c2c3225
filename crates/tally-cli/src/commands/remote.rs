use anyhow::{anyhow, bail, Result};
use cliclack::{input, spinner};
use console::style;
use serde_json::json;
use std::slice;
use tally::api::client::ApiClient;
use tally::api::types::{AssistantRequest, Run, RunStatus, ThreadRequest};
use tally::models::message::Message;

use crate::render;
use crate::{RemoteCommand, RemoteOptions};

const ASSISTANT_NAME: &str = "Math Assistant";

pub async fn execute(options: &RemoteOptions, command: RemoteCommand) -> Result<()> {
    let client = ApiClient::new(options.server.clone(), options.server_key.clone())?;

    match command {
        RemoteCommand::Run {
            text,
            thread,
            assistant,
        } => {
            let thread_id = open_thread(&client, thread).await?;
            let run = client.ask(&thread_id, assistant.as_deref(), &text).await?;
            let answer = run_answer(&run)?;
            render::print_markdown(&answer)
        }
        RemoteCommand::Session { thread, assistant } => session(&client, thread, assistant).await,
        RemoteCommand::Assistants => list_assistants(&client).await,
        RemoteCommand::History { thread } => history(&client, &thread).await,
    }
}

/// Reuse a thread, or start one and tell the user its id so it can be continued
async fn open_thread(client: &ApiClient, thread: Option<String>) -> Result<String> {
    match thread {
        Some(thread_id) => Ok(thread_id),
        None => {
            let thread = client.create_thread(&ThreadRequest::default()).await?;
            render::print_note(&format!("thread {}", thread.thread_id));
            Ok(thread.thread_id)
        }
    }
}

/// The final answer of a finished run
fn run_answer(run: &Run) -> Result<String> {
    match run.status {
        RunStatus::Success => Ok(run.output.clone().unwrap_or_default()),
        RunStatus::Error => Err(anyhow!(
            "Run {} failed: {}",
            run.run_id,
            run.error.as_deref().unwrap_or("unknown error")
        )),
        RunStatus::Pending => bail!("Run {} has not finished", run.run_id),
    }
}

async fn session(
    client: &ApiClient,
    thread: Option<String>,
    assistant: Option<String>,
) -> Result<()> {
    // An assistant created for this session is removed again when it ends
    let (assistant_id, created) = match assistant {
        Some(assistant_id) => (client.get_assistant(&assistant_id).await?.assistant_id, false),
        None => {
            let request = AssistantRequest {
                metadata: Some(json!({ "client": "tally" })),
                ..AssistantRequest::named(ASSISTANT_NAME)
            };
            (client.create_assistant(&request).await?.assistant_id, true)
        }
    };
    let thread_id = open_thread(client, thread).await?;

    println!(
        "tally remote session on {} {}",
        style(client.host()).cyan(),
        style("- type \"exit\" to end the session").dim()
    );
    render::print_note(&format!("assistant {}", assistant_id));
    println!();

    loop {
        let message_text: String = match input("Message:").placeholder("").multiline().interact() {
            Ok(text) => text,
            Err(_) => break,
        };

        let trimmed = message_text.trim();
        if ["exit", "quit"].iter().any(|word| trimmed.eq_ignore_ascii_case(word)) {
            break;
        }
        if trimmed.is_empty() {
            continue;
        }

        let spin = spinner();
        spin.start("awaiting reply");
        let result = client.ask(&thread_id, Some(&assistant_id), trimmed).await;
        spin.stop("");

        match result.and_then(|run| run_answer(&run)) {
            Ok(answer) => render::print_markdown(&answer)?,
            Err(e) => eprintln!("{}", style(format!("Error: {}", e)).red()),
        }
        println!();
    }

    if created {
        if let Err(e) = client.delete_assistant(&assistant_id).await {
            tracing::warn!(%assistant_id, "failed to delete session assistant: {}", e);
        }
    }
    render::print_note(&format!("continue with --thread {}", thread_id));
    Ok(())
}

async fn list_assistants(client: &ApiClient) -> Result<()> {
    let assistants = client.list_assistants().await?;
    if assistants.is_empty() {
        render::print_note("no assistants");
    }
    for assistant in assistants {
        println!(
            "{}  {} {}",
            style(&assistant.assistant_id).bold(),
            assistant.name,
            style(assistant.created_at.format("%Y-%m-%d %H:%M:%S")).dim()
        );
    }
    Ok(())
}

async fn history(client: &ApiClient, thread_id: &str) -> Result<()> {
    let state = client.get_thread_state(thread_id).await?;
    for message in state.values.messages.iter() {
        match message {
            Message::User(user) => println!("{} {}", style("You:").cyan().bold(), user.text),
            Message::Assistant(assistant) if !assistant.text.is_empty() => {
                render::print_markdown(&assistant.text)?;
                render::print_tool_activity(slice::from_ref(message))?;
            }
            _ => render::print_tool_activity(slice::from_ref(message))?,
        }
    }
    Ok(())
}
