//! MCP Server - Model Context Protocol 연동
//!
//! 레지스트리의 tool을 stdio 위의 MCP 서버로 노출합니다.
//!
//! ## 기능
//! - `initialize` / `ping` / `tools/list` / `tools/call`
//! - `notifications/tools/list_changed` (tool 집합 변경 시)
//! - `server/dirty` (재시작이 필요한 변경 발생 시)
//!
//! ## 참고
//! - https://modelcontextprotocol.io/

mod notifier;
mod server;
mod transport;
mod types;

pub use notifier::{Notifier, SERVER_DIRTY, TOOLS_LIST_CHANGED};
pub use server::McpServer;
pub use transport::{
    write_message, JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
    JSONRPC_VERSION,
};
pub use types::{
    DirtyNotice, InitializeResult, McpContent, McpTool, McpToolCall, McpToolResult, ServerInfo,
    PROTOCOL_VERSION,
};
