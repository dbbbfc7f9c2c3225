use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use tera::{Context, Error as TeraError, Tera};

use crate::models::tool::Tool;

/// The built-in system prompt, rendered with the available tools
pub const SYSTEM_PROMPT: &str = include_str!("prompts/system.md");

#[derive(Serialize)]
struct PromptTools<'a> {
    tools: &'a [Tool],
}

pub fn load_prompt<T: Serialize>(template: &str, context_data: &T) -> Result<String, TeraError> {
    let mut tera = Tera::default();
    tera.add_raw_template("inline_template", template)?;
    let context = Context::from_serialize(context_data)?;
    let rendered = tera.render("inline_template", &context)?;
    Ok(rendered)
}

pub fn load_prompt_file<T: Serialize>(
    template_file: impl Into<PathBuf>,
    context_data: &T,
) -> Result<String, TeraError> {
    let template_path = template_file.into();
    let template_content = fs::read_to_string(&template_path).map_err(|e| {
        TeraError::chain(
            format!("Failed to read template file {}", template_path.display()),
            e,
        )
    })?;
    load_prompt(&template_content, context_data)
}

/// Render a system prompt template, exposing the tool list as `tools`
pub fn render_system_prompt(template: &str, tools: &[Tool]) -> Result<String, TeraError> {
    load_prompt(template, &PromptTools { tools })
}
