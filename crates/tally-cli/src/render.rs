use anyhow::{anyhow, Result};
use bat::WrappingMode;
use console::style;
use tally::models::message::Message;

const THEME: &str = "GitHub";

fn print_block(content: &str, name: &str, language: &str) -> Result<()> {
    bat::PrettyPrinter::new()
        .input(bat::Input::from_bytes(content.as_bytes()).name(name))
        .theme(THEME)
        .language(language)
        .grid(true)
        .header(true)
        .wrapping_mode(WrappingMode::Character)
        .print()
        .map_err(|e| anyhow!("Failed to render output: {}", e))?;
    Ok(())
}

/// Print model text as markdown
pub fn print_markdown(content: &str) -> Result<()> {
    bat::PrettyPrinter::new()
        .input(bat::Input::from_bytes(content.as_bytes()))
        .theme(THEME)
        .language("Markdown")
        .wrapping_mode(WrappingMode::Character)
        .print()
        .map_err(|e| anyhow!("Failed to render output: {}", e))?;
    println!();
    Ok(())
}

/// Show the tool traffic of a turn: each call and what came back
pub fn print_tool_activity(messages: &[Message]) -> Result<()> {
    for message in messages {
        match message {
            Message::Assistant(assistant) => {
                for call in &assistant.tool_calls {
                    let arguments = serde_json::to_string_pretty(&call.arguments)?;
                    print_block(&arguments, &format!("Tool Request: {}", call.name), "JSON")?;
                }
            }
            Message::Tool(result) if result.is_error() => {
                println!("{}", style(result.content()).red());
            }
            Message::Tool(result) => {
                print_block(&result.content(), "Tool Response:", "JSON")?;
            }
            Message::User(_) => {}
        }
    }
    Ok(())
}

pub fn print_note(note: &str) {
    println!("{}", style(note).dim());
}
