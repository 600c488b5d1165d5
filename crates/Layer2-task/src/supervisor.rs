//! Restart Supervisor - 파일 변경 시 자식 서버를 재시작
//!
//! 하나의 `select!` 루프가 모든 입력을 순서대로 처리합니다:
//! - 종료 신호 → 감시 해제, 자식 종료, exit 0
//! - 자식 자체 종료 → 같은 종료 코드로 전파 (재시작 안 함)
//! - 현재 세대 자식의 stderr 마커 줄 → 재시작 트리거
//! - include 패턴 이벤트 → 재시작 트리거
//! - debounce 만료 → SIGTERM/SIGKILL 후 새 자식 시작 (이 사이 종료 신호가 오면 새 자식 없이 종료)
//!
//! 트리거는 dirty 플래그로 합쳐집니다. 플래그가 꺼져 있을 때의 첫 트리거만
//! debounce 타이머를 시작하고, 재시작이 시작될 때 플래그를 소비합니다.
//! 재시작 중 도착한 트리거는 채널에 쌓였다가 재시작 후 다음 사이클을 예약합니다.

use crate::process::{exit_code, ChildCommand, ChildLine, SupervisedChild};
use crate::state::{DirtySource, SupervisorEvent, SupervisorState};
use hotmcp_foundation::{
    is_dirty_signal, DirtyState, HotReloadConfig, PathWatcher, RestartConfig, Result, WatchEvent,
};
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tracing::{debug, error, info};

/// 이벤트 채널 버퍼 크기
const EVENT_CAPACITY: usize = 64;

// ============================================================================
// SupervisorConfig
// ============================================================================

/// 슈퍼바이저 설정
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// 자식 명령
    pub command: ChildCommand,

    /// include 패턴 (자식에게도 환경 변수로 전달)
    pub include: Vec<String>,

    /// 패턴 기준 디렉토리이자 자식의 작업 디렉토리
    pub base_dir: PathBuf,

    /// debounce / 유예 시간
    pub restart: RestartConfig,
}

impl SupervisorConfig {
    pub fn new(command: ChildCommand, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            command,
            include: Vec::new(),
            base_dir: base_dir.into(),
            restart: RestartConfig::default(),
        }
    }

    /// 통합 설정에서 include 패턴과 재시작 정책을 가져옴
    pub fn from_config(
        command: ChildCommand,
        base_dir: impl Into<PathBuf>,
        config: &HotReloadConfig,
    ) -> Self {
        Self::new(command, base_dir)
            .with_include(config.include.clone())
            .with_restart(config.restart.clone())
    }

    pub fn with_include(mut self, include: Vec<String>) -> Self {
        self.include = include;
        self
    }

    pub fn with_restart(mut self, restart: RestartConfig) -> Self {
        self.restart = restart;
        self
    }

    pub fn debounce(&self) -> Duration {
        self.restart.debounce()
    }

    pub fn grace_timeout(&self) -> Duration {
        self.restart.grace_timeout()
    }

    fn include_env_value(&self) -> Option<String> {
        if self.include.is_empty() {
            None
        } else {
            Some(self.include.join(","))
        }
    }
}

// ============================================================================
// RestartSupervisor
// ============================================================================

/// 루프 한 번에서 처리할 입력
enum Step {
    Shutdown,
    Exited(Result<ExitStatus>),
    Line(ChildLine),
    Include(WatchEvent),
    Restart,
}

/// 자식 프로세스 재시작 슈퍼바이저
pub struct RestartSupervisor {
    config: SupervisorConfig,
    state: SupervisorState,
    dirty: Arc<DirtyState>,
    events: broadcast::Sender<SupervisorEvent>,

    /// 마지막으로 시작한 자식의 세대
    generation: u64,
}

impl RestartSupervisor {
    pub fn new(config: SupervisorConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            config,
            state: SupervisorState::Stopped,
            dirty: Arc::new(DirtyState::new()),
            events,
            generation: 0,
        }
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    /// 재시작 대기 중인 트리거가 있는지
    pub fn dirty(&self) -> &Arc<DirtyState> {
        &self.dirty
    }

    /// 이벤트 구독 (run 이전에 호출해야 첫 Spawned를 받음)
    pub fn subscribe(&self) -> broadcast::Receiver<SupervisorEvent> {
        self.events.subscribe()
    }

    /// shutdown이 완료되거나 자식이 스스로 종료할 때까지 실행
    ///
    /// 반환값은 프로세스 종료 코드. 자식 시작 실패는 Err
    pub async fn run<F>(&mut self, shutdown: F) -> Result<i32>
    where
        F: Future<Output = ()>,
    {
        info!("Starting: {}", self.config.command.display());

        let (line_tx, mut lines) = mpsc::unbounded_channel::<ChildLine>();
        let (watch_tx, mut watch_rx) = mpsc::unbounded_channel::<WatchEvent>();

        let mut watcher = if self.config.include.is_empty() {
            drop(watch_tx);
            None
        } else {
            info!("Watching include patterns: {}", self.config.include.join(", "));
            Some(PathWatcher::patterns(
                &self.config.include,
                &self.config.base_dir,
                watch_tx,
            )?)
        };

        let mut child = self.spawn(&line_tx)?;
        let mut deadline: Option<Instant> = None;

        tokio::pin!(shutdown);

        loop {
            let step = tokio::select! {
                _ = &mut shutdown => Step::Shutdown,
                status = child.wait() => Step::Exited(status),
                Some(line) = lines.recv() => Step::Line(line),
                Some(event) = watch_rx.recv() => Step::Include(event),
                _ = debounce_elapsed(deadline) => Step::Restart,
            };

            match step {
                Step::Shutdown => {
                    info!("Shutting down...");
                    watcher.take();
                    if let Err(e) = child.terminate(self.config.grace_timeout()).await {
                        error!("Failed to stop child: {}", e);
                    }
                    self.stop();
                    return Ok(0);
                }
                Step::Exited(status) => {
                    let code = exit_code(&status?);
                    info!("Process exited with code {}", code);
                    self.emit(SupervisorEvent::ChildExited { code });
                    self.stop();
                    return Ok(code);
                }
                Step::Line(line) => {
                    // 종료 중인 이전 세대의 출력은 무시
                    if line.generation == self.generation && is_dirty_signal(&line.text) {
                        self.trigger(DirtySource::Marker(line.text), &mut deadline);
                    }
                }
                Step::Include(event) => {
                    info!("Include file {}: {}", event.kind, event.path.display());
                    self.trigger(DirtySource::Include(event.path), &mut deadline);
                }
                Step::Restart => {
                    deadline = None;
                    if self.stop_for_restart(&mut child, &mut shutdown).await? {
                        // 재시작 도중 종료 요청: 새 자식 없이 Restarting → Stopped
                        watcher.take();
                        self.stop();
                        return Ok(0);
                    }
                    child = self.spawn(&line_tx)?;
                }
            }
        }
    }

    // ========================================================================
    // Internal
    // ========================================================================

    fn spawn(&mut self, lines: &mpsc::UnboundedSender<ChildLine>) -> Result<SupervisedChild> {
        let generation = self.generation + 1;
        let include = self.config.include_env_value();

        let child = SupervisedChild::spawn(
            &self.config.command,
            include.as_deref(),
            &self.config.base_dir,
            generation,
            lines.clone(),
        )?;

        self.generation = generation;
        self.set_state(SupervisorState::Running);
        info!(pid = child.pid(), generation, "Child started");
        self.emit(SupervisorEvent::Spawned {
            pid: child.pid(),
            generation,
        });
        Ok(child)
    }

    /// 트리거 기록. 새로 dirty가 된 경우에만 debounce 시작
    fn trigger(&mut self, source: DirtySource, deadline: &mut Option<Instant>) {
        if !self.dirty.mark() {
            debug!("Restart already pending, coalescing {}", source);
            return;
        }

        info!("Restart required: {}", source);
        self.emit(SupervisorEvent::DirtyDetected { source });

        *deadline = Some(Instant::now() + self.config.debounce());
        self.emit(SupervisorEvent::RestartScheduled);
    }

    /// 재시작을 위해 현재 자식을 종료
    ///
    /// 유예 시간 동안에도 shutdown을 감시합니다. shutdown이 오면 자식 종료를
    /// 끝까지 마친 뒤 `true`를 반환하고, 이때 종료 실패는 로그만 남깁니다.
    async fn stop_for_restart<F>(
        &mut self,
        child: &mut SupervisedChild,
        shutdown: &mut Pin<&mut F>,
    ) -> Result<bool>
    where
        F: Future<Output = ()>,
    {
        self.dirty.take();
        self.set_state(SupervisorState::Restarting);
        info!("Restarting process...");

        let pid = child.pid();
        let terminate = child.terminate(self.config.grace_timeout());
        tokio::pin!(terminate);

        let (result, shutting_down) = tokio::select! {
            result = &mut terminate => (result, false),
            _ = shutdown.as_mut() => {
                info!("Shutting down during restart...");
                (terminate.await, true)
            }
        };

        match result {
            Ok(forced) => {
                if forced {
                    self.emit(SupervisorEvent::ForceKilled { pid });
                }
            }
            Err(e) if shutting_down => error!("Failed to stop child: {}", e),
            Err(e) => return Err(e),
        }

        Ok(shutting_down)
    }

    fn stop(&mut self) {
        self.set_state(SupervisorState::Stopped);
        self.emit(SupervisorEvent::Stopped);
    }

    fn set_state(&mut self, state: SupervisorState) {
        if self.state != state {
            debug!("Supervisor state: {} -> {}", self.state, state);
            self.state = state;
        }
    }

    fn emit(&self, event: SupervisorEvent) {
        // 구독자가 없으면 버려짐
        let _ = self.events.send(event);
    }
}

async fn debounce_elapsed(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
