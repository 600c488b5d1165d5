//! HotReload Server - 레지스트리, 감시자, MCP 서버 연결
//!
//! 두 감시 범위는 서로 섞이지 않습니다:
//! - tools 디렉토리: 모든 이벤트가 reload로 이어짐 (debounce 없음)
//! - include 패턴: reload 없이 dirty 표시 + stderr 신호 + 클라이언트 알림

use crate::mcp::{DirtyNotice, McpServer, ServerInfo};
use crate::registry::ToolRegistry;
use hotmcp_foundation::{
    write_dirty_line, DirtyState, HotReloadConfig, PathWatcher, Result, WatchEvent,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

// ============================================================================
// HotReloadServer
// ============================================================================

/// hot-reload MCP 서버
pub struct HotReloadServer {
    config: HotReloadConfig,

    /// 상대 경로 (tools 디렉토리, include 패턴) 기준 디렉토리
    base_dir: PathBuf,

    registry: Arc<ToolRegistry>,
    dirty: Arc<DirtyState>,
    mcp: McpServer,
}

impl HotReloadServer {
    /// 작업 디렉토리 기준으로 생성
    pub fn new(config: HotReloadConfig) -> Result<Self> {
        let base_dir = std::env::current_dir()?;
        Ok(Self::with_base_dir(config, base_dir))
    }

    pub fn with_base_dir(config: HotReloadConfig, base_dir: impl Into<PathBuf>) -> Self {
        let registry = Arc::new(ToolRegistry::new().with_call_timeout(config.call_timeout()));
        let dirty = Arc::new(DirtyState::new());
        let mcp = McpServer::new(
            ServerInfo::new(&config.name, &config.version),
            Arc::clone(&registry),
            Arc::clone(&dirty),
        );

        Self {
            config,
            base_dir: base_dir.into(),
            registry,
            dirty,
            mcp,
        }
    }

    pub fn config(&self) -> &HotReloadConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn dirty(&self) -> &Arc<DirtyState> {
        &self.dirty
    }

    pub fn mcp(&self) -> &McpServer {
        &self.mcp
    }

    /// tools 디렉토리 (절대 경로면 그대로)
    pub fn tools_dir(&self) -> PathBuf {
        self.base_dir.join(&self.config.tools_dir)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// 초기 로드 후 감시 시작. 반환된 핸들을 drop하면 감시가 멈춥니다.
    pub async fn start(&self) -> Result<WatchHandle> {
        let tools_dir = self.tools_dir();
        info!("Tools directory: {}", tools_dir.display());

        // 클라이언트 연결 전이므로 변경 알림은 버려짐
        self.registry.reload(&tools_dir).await?;

        let mut handle = WatchHandle::default();

        // 디렉토리가 없으면 생성될 때까지 상위 디렉토리를 감시
        if !tools_dir.is_dir() {
            warn!(
                "Tools directory not found: {}, waiting for it to be created",
                tools_dir.display()
            );
        }
        let (tx, rx) = mpsc::unbounded_channel();
        handle.watchers.push(PathWatcher::directory(&tools_dir, tx)?);
        handle.tasks.push(tokio::spawn(reload_loop(
            Arc::clone(&self.registry),
            tools_dir,
            rx,
        )));

        if !self.config.include.is_empty() {
            info!("Include patterns: {}", self.config.include.join(", "));
            let (tx, rx) = mpsc::unbounded_channel();
            handle
                .watchers
                .push(PathWatcher::patterns(&self.config.include, &self.base_dir, tx)?);
            handle.tasks.push(tokio::spawn(dirty_loop(
                Arc::clone(&self.dirty),
                self.mcp.clone(),
                self.base_dir.clone(),
                rx,
            )));
        }

        Ok(handle)
    }

    /// 감시를 시작하고 주어진 스트림으로 MCP 처리 (입력이 끝날 때까지)
    pub async fn run<R, W>(&self, reader: R, writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let _watch = self.start().await?;
        self.mcp.serve(reader, writer).await
    }

    /// stdin/stdout으로 실행
    pub async fn run_stdio(&self) -> Result<()> {
        self.run(tokio::io::stdin(), tokio::io::stdout()).await
    }
}

// ============================================================================
// WatchHandle
// ============================================================================

/// 감시자와 이벤트 처리 task 묶음
#[derive(Default)]
pub struct WatchHandle {
    watchers: Vec<PathWatcher>,
    tasks: Vec<JoinHandle<()>>,
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

// ============================================================================
// Event loops
// ============================================================================

/// tools 디렉토리 이벤트 → reload (이벤트 순서대로 하나씩)
async fn reload_loop(
    registry: Arc<ToolRegistry>,
    tools_dir: PathBuf,
    mut rx: mpsc::UnboundedReceiver<WatchEvent>,
) {
    while let Some(event) = rx.recv().await {
        info!("Tool {}: {}, reloading...", event.kind, display_name(&event.path));
        if let Err(e) = registry.reload(&tools_dir).await {
            error!("Reload failed: {}", e);
        }
    }
}

/// include 패턴 이벤트 → dirty 표시 + stderr 신호 + 클라이언트 알림
async fn dirty_loop(
    dirty: Arc<DirtyState>,
    mcp: McpServer,
    base_dir: PathBuf,
    mut rx: mpsc::UnboundedReceiver<WatchEvent>,
) {
    let base_dir = base_dir.canonicalize().unwrap_or(base_dir);

    while let Some(event) = rx.recv().await {
        let path = event.path.strip_prefix(&base_dir).unwrap_or(&event.path);

        // 로그 필터와 무관하게 슈퍼바이저가 볼 수 있도록 stderr에 직접 기록
        if let Err(e) = write_dirty_line(&mut std::io::stderr().lock(), event.kind, path) {
            error!("Failed to write dirty signal: {}", e);
        }

        if dirty.mark() {
            debug!("Server marked dirty");
        }
        mcp.notify_dirty(&DirtyNotice::include_changed(
            event.kind.to_string(),
            path.display().to_string(),
        ));
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
