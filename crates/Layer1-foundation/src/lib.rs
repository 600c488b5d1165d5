//! # hotmcp-foundation
//!
//! Foundation layer for HotMCP:
//! - Error: 공통 에러 타입 (`Error`, `Result`)
//! - Config: 통합 설정 (HotReloadConfig, RestartConfig)
//! - Watch: 경로/패턴 감시자 (notify + glob)
//! - Signal: 서버 ↔ 슈퍼바이저 dirty 신호 규약
//! - Dirty: 재시작 필요 여부 플래그 (DirtyState)
//!
//! ## 아키텍처
//!
//! ```text
//! ┌──────────────────────┐   stderr (marker line)   ┌──────────────────────┐
//! │  hotmcp-server       │ ───────────────────────▶ │  hotmcp (supervisor) │
//! │  ├── ToolRegistry    │                          │  ├── debounce        │
//! │  ├── PathWatcher(×2) │ ◀─────────────────────── │  ├── SIGTERM/SIGKILL │
//! │  └── McpServer       │   MCP_HOT_RELOAD_INCLUDE │  └── PathWatcher     │
//! └──────────────────────┘                          └──────────────────────┘
//! ```

pub mod config;
pub mod dirty;
pub mod error;
pub mod signal;
pub mod watch;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Result};

// ============================================================================
// Config (설정)
// ============================================================================
pub use config::{
    parse_include_env, HotReloadConfig, RestartConfig, CONFIG_FILE, INCLUDE_ENV, TOOLS_DIR_ENV,
};

// ============================================================================
// Signal (프로세스 간 dirty 신호)
// ============================================================================
pub use dirty::DirtyState;
pub use signal::{dirty_line, is_dirty_signal, write_dirty_line, DIRTY_MARKER};

// ============================================================================
// Watch (파일 감시)
// ============================================================================
pub use watch::{PathWatcher, WatchEvent, WatchEventKind};
