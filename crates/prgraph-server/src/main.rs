//! prgraph binary.
//!
//! `prgraph serve` reads `config.toml` (or the path given with `--config`),
//! opens the SQLite store when one is configured, and serves the JSON API.
//! `prgraph analyze --input <file>` runs one extraction and prints the
//! analysis as JSON.

use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use prgraph_core::conversation::RawConversation;
use prgraph_server::{ServerConfig, build_app, build_service};
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Turn pull-request conversations into knowledge graphs")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml", env = "PRGRAPH_CONFIG")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Serve the HTTP API.
  Serve,

  /// Analyze one conversation file and print the result.
  Analyze {
    /// JSON file holding a raw conversation.
    #[arg(short, long)]
    input: PathBuf,

    /// Use keyword rules only, never the analyzer.
    #[arg(long)]
    offline: bool,

    /// Also write the analysis to the configured store.
    #[arg(long)]
    persist: bool,
  },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();
  let cfg = ServerConfig::load(&cli.config)?;

  match cli.command {
    Command::Serve => serve(cfg).await,
    Command::Analyze { input, offline, persist } => analyze(cfg, input, offline, persist).await,
  }
}

async fn serve(cfg: ServerConfig) -> anyhow::Result<()> {
  let app = build_app(&cfg).await?;
  let address = cfg.address();

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;
  Ok(())
}

async fn analyze(
  cfg: ServerConfig,
  input: PathBuf,
  offline: bool,
  persist: bool,
) -> anyhow::Result<()> {
  let text = tokio::fs::read_to_string(&input)
    .await
    .with_context(|| format!("failed to read {input:?}"))?;
  let raw: RawConversation =
    serde_json::from_str(&text).with_context(|| format!("{input:?} is not a conversation"))?;

  let service = build_service(&cfg, offline, persist).await?;
  let analysis = service.create_from_raw(raw).await?;

  println!("{}", serde_json::to_string_pretty(&*analysis)?);
  Ok(())
}
