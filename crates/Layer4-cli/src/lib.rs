//! HotMCP CLI - 두 실행 파일이 공유하는 부분
//!
//! - `hotmcp`: 슈퍼바이저 (자식 서버 실행 + 재시작)
//! - `hotmcp-server`: hot-reload MCP 서버 (stdio)

pub mod args;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub use args::{build_command, parse_args, LauncherArgs};

/// tracing 초기화. 로그는 항상 stderr (stdout은 MCP 전용)
pub fn init_tracing(debug: bool, ansi: bool) {
    let log_level = if debug { "debug" } else { "info" };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_ansi(ansi)
                .with_writer(std::io::stderr),
        )
        .init();
}

/// stderr가 터미널일 때만 색상 사용 (`NO_COLOR`가 설정되면 끔)
pub fn stderr_ansi() -> bool {
    use std::io::IsTerminal;
    ansi_enabled(std::io::stderr().is_terminal(), std::env::var_os("NO_COLOR"))
}

fn ansi_enabled(is_terminal: bool, no_color: Option<std::ffi::OsString>) -> bool {
    is_terminal && no_color.map_or(true, |v| v.is_empty())
}

/// Ctrl+C 또는 SIGTERM 대기
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
