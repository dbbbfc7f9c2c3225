mod agent_builder;
mod commands;
mod render;
mod session_file;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tally::agent::DEFAULT_MAX_ITERATIONS;
use tally::api::client::API_HOST;
use tally::providers::factory::ProviderType;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Ask a language model questions it answers with tools", long_about = None)]
struct Cli {
    #[command(flatten)]
    options: AgentOptions,

    #[command(subcommand)]
    command: Command,
}

/// How to build the agent, shared by every subcommand
#[derive(Args, Debug, Clone)]
pub struct AgentOptions {
    /// Provider option (openai or ollama)
    #[arg(short, long, global = true, default_value = "openai", value_parser = parse_provider_type)]
    pub provider: ProviderType,

    /// OpenAI API key
    #[arg(long, global = true, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Provider host, defaults to the provider's public endpoint
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Model to use
    #[arg(short, long, global = true)]
    pub model: Option<String>,

    /// Tool provider URL; without it the built-in math tools are used
    #[arg(long, global = true, env = "TALLY_TOOLS_URL")]
    pub tools_url: Option<String>,

    /// Maximum model round trips per question
    #[arg(long, global = true, default_value_t = DEFAULT_MAX_ITERATIONS)]
    pub max_iterations: usize,

    /// Give up on a question after this many seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Template file replacing the built-in system prompt
    #[arg(long, global = true)]
    pub system_prompt: Option<PathBuf>,
}

fn parse_provider_type(value: &str) -> Result<ProviderType, String> {
    value.parse().map_err(|e: anyhow::Error| e.to_string())
}

#[derive(Subcommand)]
enum Command {
    /// Ask a single question
    Run {
        /// The question
        text: String,

        /// Resume and persist this named session
        #[arg(short, long)]
        session: Option<String>,
    },

    /// Start or resume an interactive session
    Session {
        /// Name for the session
        #[arg(short, long)]
        name: Option<String>,
    },

    /// List the available tools
    Tools,

    /// Talk to a running tallyd server instead of a local agent
    Remote {
        #[command(flatten)]
        connection: RemoteOptions,

        #[command(subcommand)]
        command: RemoteCommand,
    },
}

/// Where the tallyd server is and how to authenticate
#[derive(Args, Debug, Clone)]
pub struct RemoteOptions {
    /// Server URL
    #[arg(long, env = "TALLY_SERVER_URL", default_value = API_HOST)]
    pub server: String,

    /// API key the server requires, sent as a bearer token
    #[arg(long, env = "TALLY_API_KEY", hide_env_values = true)]
    pub server_key: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum RemoteCommand {
    /// Ask a single question on a thread
    Run {
        /// The question
        text: String,

        /// Continue this thread instead of starting a new one
        #[arg(long)]
        thread: Option<String>,

        /// Run as this assistant
        #[arg(long)]
        assistant: Option<String>,
    },

    /// Chat on a thread interactively
    Session {
        /// Continue this thread instead of starting a new one
        #[arg(long)]
        thread: Option<String>,

        /// Use this assistant instead of creating one for the session
        #[arg(long)]
        assistant: Option<String>,
    },

    /// List the server's assistants
    Assistants,

    /// Show the messages of a thread
    History {
        /// Thread id
        thread: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run { text, session } => {
            commands::run::execute(&cli.options, &text, session.as_deref()).await
        }
        Command::Session { name } => commands::session::execute(&cli.options, name).await,
        Command::Tools => commands::tools::execute(&cli.options).await,
        Command::Remote {
            connection,
            command,
        } => commands::remote::execute(&connection, command).await,
    }
}
