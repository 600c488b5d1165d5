//! Supervised child process
//!
//! - stdin/stdout은 상속 (MCP 클라이언트와 자식이 직접 통신)
//! - stderr는 파이프로 받아 줄 단위로 슈퍼바이저 stderr에 전달하고,
//!   세대(generation) 번호를 붙여 슈퍼바이저 루프로 보냄
//! - 종료: SIGTERM → 유예 시간 → SIGKILL

use hotmcp_foundation::{Error, Result, INCLUDE_ENV};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// 기본 자식 실행 파일 이름
pub const DEFAULT_SERVER_BIN: &str = "hotmcp-server";

// ============================================================================
// ChildCommand
// ============================================================================

/// 자식 프로세스 명령
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl ChildCommand {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// 번들 서버: 현재 실행 파일 옆의 `hotmcp-server`, 없으면 PATH에서 검색
    pub fn default_server() -> Self {
        let sibling = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join(server_file_name())))
            .filter(|path| path.is_file());

        Self::new(
            sibling.unwrap_or_else(|| PathBuf::from(server_file_name())),
            Vec::new(),
        )
    }

    /// 로그용 한 줄 표현
    pub fn display(&self) -> String {
        std::iter::once(self.program.display().to_string())
            .chain(self.args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn server_file_name() -> String {
    format!("{}{}", DEFAULT_SERVER_BIN, std::env::consts::EXE_SUFFIX)
}

// ============================================================================
// ChildLine
// ============================================================================

/// 자식 stderr 한 줄 (어느 세대의 자식인지 포함)
#[derive(Debug, Clone)]
pub struct ChildLine {
    pub generation: u64,
    pub text: String,
}

// ============================================================================
// SupervisedChild
// ============================================================================

/// 실행 중인 자식 프로세스
pub struct SupervisedChild {
    child: Child,
    pid: u32,
    generation: u64,
}

impl SupervisedChild {
    /// 자식 시작. include 패턴은 환경 변수로 전달
    pub fn spawn(
        command: &ChildCommand,
        include: Option<&str>,
        cwd: &Path,
        generation: u64,
        lines: mpsc::UnboundedSender<ChildLine>,
    ) -> Result<Self> {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .current_dir(cwd)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(include) = include {
            cmd.env(INCLUDE_ENV, include);
        }

        let mut child = cmd.spawn().map_err(|e| {
            Error::Process(format!(
                "Failed to spawn {}: {}",
                command.program.display(),
                e
            ))
        })?;

        let pid = child.id().unwrap_or_default();

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut reader = BufReader::new(stderr).lines();
                while let Ok(Some(text)) = reader.next_line().await {
                    forward_line(&text);
                    if lines.send(ChildLine { generation, text }).is_err() {
                        break;
                    }
                }
                debug!(generation, "Child stderr closed");
            });
        }

        Ok(Self {
            child,
            pid,
            generation,
        })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// 종료 대기 (cancel-safe)
    pub async fn wait(&mut self) -> Result<ExitStatus> {
        self.child
            .wait()
            .await
            .map_err(|e| Error::Process(format!("Failed to wait for child {}: {}", self.pid, e)))
    }

    /// SIGTERM 후 유예 시간 동안 대기, 넘기면 SIGKILL
    ///
    /// 강제 종료했으면 true
    pub async fn terminate(&mut self, grace: Duration) -> Result<bool> {
        self.send_sigterm();

        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(status) => {
                let status = status
                    .map_err(|e| Error::Process(format!("Failed to wait for child: {}", e)))?;
                debug!(pid = self.pid, "Child exited: {}", status);
                Ok(false)
            }
            Err(_) => {
                warn!(
                    "Child {} did not exit within {}ms, killing",
                    self.pid,
                    grace.as_millis()
                );
                self.child
                    .kill()
                    .await
                    .map_err(|e| Error::Process(format!("Failed to kill child: {}", e)))?;
                Ok(true)
            }
        }
    }

    /// Send graceful termination signal
    #[cfg(unix)]
    fn send_sigterm(&self) {
        // 이미 회수된 자식이면 id()가 None
        if let Some(pid) = self.child.id() {
            // SAFETY: pid는 아직 회수되지 않은 자식 프로세스
            let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
            if rc != 0 {
                warn!("Failed to send SIGTERM to {}: {}", pid, std::io::Error::last_os_error());
            }
        }
    }

    #[cfg(not(unix))]
    fn send_sigterm(&self) {
        // SIGTERM이 없으므로 유예 후 kill로 처리
        debug!("Graceful termination not supported, waiting for grace period");
    }
}

/// 자식 종료 상태 → 슈퍼바이저 종료 코드
///
/// 시그널로 죽은 경우 Unix 관례대로 128 + signal
pub fn exit_code(status: &ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    1
}

/// 자식 stderr 한 줄을 슈퍼바이저 stderr로 전달
fn forward_line(text: &str) {
    let mut stderr = std::io::stderr().lock();
    let _ = writeln!(stderr, "{}", text);
}
