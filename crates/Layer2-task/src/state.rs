//! Supervisor state machine + 관찰 가능한 이벤트

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// 슈퍼바이저 상태
///
/// ```text
/// Stopped ──start──▶ Running ──debounce──▶ Restarting ──spawn──▶ Running
///    ▲                  │                       │
///    └──shutdown / 자식 자체 종료───────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SupervisorState {
    Stopped,
    Running,
    Restarting,
}

impl SupervisorState {
    pub fn is_running(&self) -> bool {
        matches!(self, SupervisorState::Running)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            SupervisorState::Stopped => "stopped",
            SupervisorState::Running => "running",
            SupervisorState::Restarting => "restarting",
        }
    }
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// 재시작 트리거 출처
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DirtySource {
    /// 자식 stderr의 마커 줄
    Marker(String),

    /// 슈퍼바이저 자신의 include 패턴 감시
    Include(PathBuf),
}

impl fmt::Display for DirtySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirtySource::Marker(_) => write!(f, "child dirty signal"),
            DirtySource::Include(path) => write!(f, "include change ({})", path.display()),
        }
    }
}

/// 슈퍼바이저 이벤트 (broadcast)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SupervisorEvent {
    /// 자식 프로세스 시작
    Spawned { pid: u32, generation: u64 },

    /// 재시작 트리거 감지 (dirty 플래그가 새로 켜졌을 때만)
    DirtyDetected { source: DirtySource },

    /// debounce 타이머 시작
    RestartScheduled,

    /// 유예 시간 안에 종료하지 않아 강제 종료
    ForceKilled { pid: u32 },

    /// 자식이 스스로 종료 (종료 코드 전파)
    ChildExited { code: i32 },

    /// 슈퍼바이저 종료
    Stopped,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display() {
        assert_eq!(SupervisorState::Restarting.to_string(), "restarting");
        assert!(SupervisorState::Running.is_running());
        assert!(!SupervisorState::Stopped.is_running());
    }

    #[test]
    fn test_source_display() {
        let source = DirtySource::Include(PathBuf::from("src/app.conf"));
        assert_eq!(source.to_string(), "include change (src/app.conf)");
    }
}
