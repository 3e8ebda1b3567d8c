use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use suggest_core::load_suggest;
use suggest_server::build_app;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
struct Args {
    /// Suggest index file
    #[arg(long, default_value = "./suggest.bin")]
    suggest: PathBuf,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
    /// Fold Cyrillic lookalike letters into Latin before the trie walk
    #[arg(long, default_value_t = false)]
    equal_shaped_normalize: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();

    let data = load_suggest(&args.suggest)?;
    tracing::info!(
        suggest = %args.suggest.display(),
        version = data.version,
        items = data.items.len(),
        "index loaded"
    );
    let app = build_app(data, args.equal_shaped_normalize);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
