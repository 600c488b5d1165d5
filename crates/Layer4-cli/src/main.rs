//! HotMCP launcher - 자식 MCP 서버를 실행하고 파일 변경 시 재시작

use anyhow::Context;
use hotmcp_cli::{build_command, init_tracing, parse_args, shutdown_signal, stderr_ansi};
use hotmcp_foundation::HotReloadConfig;
use hotmcp_task::{RestartSupervisor, SupervisorConfig};
use tracing::{debug, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = parse_args(std::env::args().skip(1));
    init_tracing(false, stderr_ansi());

    let mut config = HotReloadConfig::load().context("Failed to load configuration")?;
    for pattern in &args.include {
        if !config.include.contains(pattern) {
            config.include.push(pattern.clone());
        }
    }

    let command = build_command(&args);
    info!("Command: {}", command.display());
    if !config.include.is_empty() {
        info!("Include patterns: {}", config.include.join(", "));
    }
    if !args.raw.is_empty() {
        debug!("Unused arguments: {}", args.raw.join(" "));
    }

    let base_dir = std::env::current_dir().context("Failed to resolve working directory")?;
    let mut supervisor =
        RestartSupervisor::new(SupervisorConfig::from_config(command, base_dir, &config));

    // 자식 시작 실패는 Err → exit 1
    let code = supervisor.run(shutdown_signal()).await?;
    std::process::exit(code);
}
