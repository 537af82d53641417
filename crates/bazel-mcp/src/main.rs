//! bazel-mcp Server
//!
//! Exposes Bazel queries, builds and tests to Claude and other AI assistants
//! via the Model Context Protocol (MCP).
//!
//! Usage:
//!   bazel-mcp [--bazel bazelisk] [--timeout-secs 600]
//!
//! The server communicates over stdio using JSON-RPC 2.0.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use bazel_mcp::{config, Handler, McpServer};

#[derive(Parser)]
#[command(name = "bazel-mcp")]
#[command(about = "MCP server for Bazel dependency queries, builds and tests")]
#[command(version)]
#[command(after_help = "\
TOOLS:
    reverse-dependencies    Targets that depend on a target or file
    deps                    Dependencies of a target or file
    sources                 Source files behind a target or file
    build                   bazel build <target>
    test                    bazel test <target>

CONFIGURATION:
    Settings are read from ~/.config/bazel-mcp/config.json (or --config),
    then BAZEL_MCP_BAZEL / BAZEL_MCP_TIMEOUT_SECS, then the flags below.
    Logs go to stderr; set RUST_LOG or --log-level to adjust.")]
struct Cli {
    /// Path to a JSON config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Bazel binary to run
    #[arg(long)]
    bazel: Option<String>,

    /// Kill bazel invocations after this many seconds (0 disables)
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Log filter, e.g. "debug" or "bazel_mcp=trace" (overrides RUST_LOG)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging to stderr (stdout is for MCP protocol)
    let filter = match &cli.log_level {
        Some(level) => EnvFilter::try_new(level)?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut cfg = config::load_config(cli.config.as_deref())?;
    cfg.apply_env(|key| std::env::var(key).ok())?;
    if let Some(bazel) = cli.bazel {
        cfg.bazel = bazel;
    }
    if let Some(secs) = cli.timeout_secs {
        cfg.timeout_secs = Some(secs);
    }

    tracing::info!(
        "Starting bazel-mcp server (bazel: {}, timeout: {:?})",
        cfg.bazel,
        cfg.timeout()
    );

    let mut server = McpServer::new(Handler::new(cfg.runner()));
    server.run().await?;

    Ok(())
}
