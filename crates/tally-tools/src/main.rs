use anyhow::Result;
use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Serve the arithmetic tools over HTTP", long_about = None)]
struct Cli {
    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: IpAddr,

    /// Port to listen on
    #[arg(short, long, default_value_t = 5000)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let addr = SocketAddr::new(cli.host, cli.port);

    info!(service = tally_tools::SERVICE_NAME, %addr, "tool server starting");
    info!("endpoints: GET /health, GET /tools, POST /tools/call, POST /tools/<name>");

    let routes = tally_tools::math_routes()?;
    warp::serve(routes).run(addr).await;
    Ok(())
}
