use anyhow::Result;
use console::style;

use crate::agent_builder::tool_registry;
use crate::AgentOptions;

pub async fn execute(options: &AgentOptions) -> Result<()> {
    let registry = tool_registry(options).await?;
    let source = options.tools_url.as_deref().unwrap_or("built-in");
    println!("{} {}", style("Tools from").dim(), style(source).cyan());

    for tool in registry.describe_all() {
        println!("\n{}  {}", style(&tool.name).bold(), tool.description);
        for parameter in &tool.parameters {
            let required = if parameter.required { "required" } else { "optional" };
            println!(
                "  {} ({}, {}) {}",
                parameter.name,
                parameter.kind.as_str(),
                style(required).dim(),
                parameter.description
            );
        }
    }
    Ok(())
}
