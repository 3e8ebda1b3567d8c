use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use suggest_merger::build_app;
use suggest_merger::config::Config;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// Fans a suggest query out to the shard servers and answers with the
/// freshest non-empty reply.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Json config file listing the shard suggest urls
    #[arg(long, default_value = "./merger.json")]
    config: PathBuf,

    /// Host to bind to
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(long, default_value_t = 8081)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();

    let config = Config::load(&args.config)?;
    info!(shards = config.shard_urls.len(), "config loaded");

    let app = build_app(&config)?;
    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .context("cannot parse the listen address")?;
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "merger listening");
    axum::serve(listener, app).await?;
    Ok(())
}
