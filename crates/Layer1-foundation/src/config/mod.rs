//! Config - 통합 설정 관리
//!
//! - `hot_reload.rs` - HotReloadConfig / RestartConfig

mod hot_reload;

pub use hot_reload::{
    parse_include_env, HotReloadConfig, RestartConfig, CONFIG_FILE, INCLUDE_ENV, TOOLS_DIR_ENV,
};
