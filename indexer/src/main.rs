use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use suggest_core::{
    build_sharded, build_suggest_data, load_items, save_suggest, version_stamp,
    ShardedBuildParams,
};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "suggest-indexer")]
#[command(about = "Build weight-ranked suggest indexes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build one index file from a tab-separated corpus
    Build {
        /// Corpus file: original text, weight and a json payload per line
        #[arg(long)]
        input: PathBuf,
        /// Output index file
        #[arg(long)]
        suggest: PathBuf,
        /// How many items a prefix may answer with
        #[arg(long, default_value_t = 10)]
        max_items_per_prefix: usize,
        /// Weight multiplier for word-boundary suffix entries
        #[arg(long, default_value_t = 1e-5)]
        suffix_factor: f32,
        /// Index full texts only
        #[arg(long, default_value_t = false)]
        without_suffixes: bool,
    },
    /// Partition a sorted corpus by leading character and build one index
    /// file per shard, all sharing a version stamp
    BuildSharded {
        /// Corpus file, sorted by its first character
        #[arg(long)]
        input: PathBuf,
        /// Output stem: shard N lands next to it as <stem>_<N>.<ext>
        #[arg(long)]
        suggest: PathBuf,
        /// Number of shards
        #[arg(long)]
        shards: usize,
        /// Parallel build workers
        #[arg(long, default_value_t = 4)]
        workers: usize,
        #[arg(long, default_value_t = 10)]
        max_items_per_prefix: usize,
        #[arg(long, default_value_t = 1e-5)]
        suffix_factor: f32,
        #[arg(long, default_value_t = false)]
        without_suffixes: bool,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            input,
            suggest,
            max_items_per_prefix,
            suffix_factor,
            without_suffixes,
        } => build_single(
            &input,
            &suggest,
            max_items_per_prefix,
            suffix_factor,
            without_suffixes,
        ),
        Commands::BuildSharded {
            input,
            suggest,
            shards,
            workers,
            max_items_per_prefix,
            suffix_factor,
            without_suffixes,
        } => build_sharded(&ShardedBuildParams {
            input,
            output: suggest,
            shard_count: shards,
            workers,
            max_items_per_prefix,
            suffix_factor,
            without_suffixes,
        }),
    }
}

fn build_single(
    input: &Path,
    suggest: &Path,
    max_items_per_prefix: usize,
    suffix_factor: f32,
    without_suffixes: bool,
) -> Result<()> {
    let items = load_items(input)?;
    tracing::info!(items = items.len(), "corpus loaded");

    let mut data = build_suggest_data(&items, max_items_per_prefix, suffix_factor, without_suffixes);
    data.version = version_stamp()?;
    save_suggest(suggest, &data)?;

    tracing::info!(
        suggest = %suggest.display(),
        version = data.version,
        "index written"
    );
    Ok(())
}
