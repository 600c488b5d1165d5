//! HotMCP server - tools 디렉토리를 hot-reload하는 MCP 서버 (stdio)

use anyhow::Context;
use clap::Parser;
use hotmcp_cli::{init_tracing, shutdown_signal};
use hotmcp_core::HotReloadServer;
use hotmcp_foundation::HotReloadConfig;
use std::path::PathBuf;
use tracing::info;

/// Hot-reload MCP server over stdio
#[derive(Parser, Debug)]
#[command(name = "hotmcp-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory containing tool manifests (overrides config)
    #[arg(long)]
    tools_dir: Option<PathBuf>,

    /// Config file (default: ./hot-reload.json if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // 슈퍼바이저가 stderr를 읽으므로 색상 코드 없이 출력
    init_tracing(args.debug, false);

    let mut config =
        HotReloadConfig::load_with(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(dir) = args.tools_dir {
        config.tools_dir = dir;
    }

    let server = HotReloadServer::new(config).context("Failed to create server")?;

    tokio::select! {
        result = server.run_stdio() => result.context("MCP server failed")?,
        _ = shutdown_signal() => {
            // 블로킹 stdin 읽기가 런타임 종료를 막으므로 바로 종료
            info!("Server stopped");
            std::process::exit(0);
        }
    }

    info!("Server stopped");
    Ok(())
}
