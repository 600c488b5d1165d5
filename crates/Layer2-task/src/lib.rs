//! # hotmcp-task
//!
//! Restart supervisor for HotMCP.
//! 자식 서버 프로세스를 실행하고, 파일 변경 시 재시작합니다.
//!
//! ## Features
//!
//! - 자식 stderr의 dirty 마커 감지 (현재 세대만)
//! - include 패턴 직접 감시
//! - debounce로 여러 트리거를 한 번의 재시작으로 합침
//! - SIGTERM → 유예 시간 → SIGKILL
//! - 자식이 스스로 종료하면 종료 코드 전파

pub mod process;
pub mod state;
pub mod supervisor;

pub use process::{exit_code, ChildCommand, ChildLine, SupervisedChild, DEFAULT_SERVER_BIN};
pub use state::{DirtySource, SupervisorEvent, SupervisorState};
pub use supervisor::{RestartSupervisor, SupervisorConfig};
