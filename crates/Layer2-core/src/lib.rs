//! hotmcp-core: Core Runtime for HotMCP
//!
//! Layer2 - tool 레지스트리와 MCP 서버 레이어
//!
//! # 주요 모듈
//!
//! - `tool`: tool 매니페스트, handler, 디렉토리 로더
//! - `registry`: hot-swap 레지스트리 (스냅샷 교체 + diff + 이벤트)
//! - `mcp`: MCP (JSON-RPC 2.0 over stdio) 서버
//! - `server`: 레지스트리 + 감시자 + MCP 서버 조립
//!
//! # 사용 예시
//!
//! ```ignore
//! use hotmcp_core::HotReloadServer;
//! use hotmcp_foundation::HotReloadConfig;
//!
//! let server = HotReloadServer::new(HotReloadConfig::load()?)?;
//! server.run_stdio().await?;
//! ```

pub mod mcp;
pub mod registry;
pub mod server;
pub mod tool;

// Re-exports: Tool
pub use tool::{
    InputSchema, NativeHandler, ToolDefinition, ToolHandler, ToolLoader, ToolOutput,
};

// Re-exports: Registry
pub use registry::{
    diff, DiffResult, RegistryEvent, RegistryEventHandler, RegistrySnapshot, ToolRegistry,
};

// Re-exports: MCP
pub use mcp::{DirtyNotice, McpServer, McpTool, McpToolResult, Notifier, ServerInfo};

// Re-exports: Server
pub use server::{HotReloadServer, WatchHandle};

// Re-exports: Foundation
pub use hotmcp_foundation::DirtyState;
