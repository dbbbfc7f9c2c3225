use anyhow::Result;
use cliclack::{input, spinner};
use console::style;

use crate::agent_builder::build_agent;
use crate::commands::run::ask;
use crate::render;
use crate::session_file::{ensure_session_dir, load_conversation, persist_conversation, session_path};
use crate::AgentOptions;

pub async fn execute(options: &AgentOptions, name: Option<String>) -> Result<()> {
    let name = match name {
        Some(name) => name,
        None => input("Session name:").placeholder("math").interact()?,
    };
    let session_file = session_path(&ensure_session_dir()?, &name)?;
    let mut conversation = load_conversation(&session_file)?;

    let agent = build_agent(options).await?;

    println!(
        "tally session {} {}",
        style(&name).cyan(),
        style("- type \"exit\" to end the session").dim()
    );
    if !conversation.is_empty() {
        render::print_note(&format!(
            "resumed {} messages from {}",
            conversation.len(),
            session_file.display()
        ));
    }
    println!();

    loop {
        let message_text: String = match input("Message:").placeholder("").multiline().interact() {
            Ok(text) => text,
            // Ctrl-C or Esc ends the session
            Err(_) => break,
        };

        if message_text.trim().eq_ignore_ascii_case("exit") {
            break;
        }
        if message_text.trim().is_empty() {
            continue;
        }

        let spin = spinner();
        spin.start("awaiting reply");
        let result = ask(&agent, conversation, &message_text).await;
        spin.stop("");

        conversation = match result {
            Ok(outcome) => {
                render::print_markdown(&outcome.final_text)?;
                outcome.conversation
            }
            Err(failure) => {
                eprintln!("{}", style(format!("Error: {}", failure.error)).red());
                failure.conversation
            }
        };
        persist_conversation(&session_file, &conversation)?;
        println!();
    }

    render::print_note(&format!("session saved to {}", session_file.display()));
    Ok(())
}
