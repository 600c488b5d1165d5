//! MCP Server - 레지스트리를 MCP(JSON-RPC 2.0)로 노출
//!
//! 요청마다 별도 task에서 처리하므로 느린 handler가 다른 요청을 막지 않습니다.
//! 응답과 알림은 하나의 writer task가 순서대로 기록합니다.

use super::notifier::Notifier;
use super::transport::{
    write_message, JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
};
use super::types::{DirtyNotice, InitializeResult, McpTool, McpToolCall, McpToolResult, ServerInfo};
use crate::registry::ToolRegistry;
use hotmcp_foundation::{DirtyState, Error, Result};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// 입력 종료 후 남은 응답을 기다리는 최대 시간
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// McpServer
// ============================================================================

/// MCP 서버 (복제 시 같은 상태 공유)
#[derive(Clone)]
pub struct McpServer {
    info: ServerInfo,
    registry: Arc<ToolRegistry>,
    dirty: Arc<DirtyState>,
    notifier: Notifier,
}

impl McpServer {
    /// 서버 생성. 레지스트리의 `ToolsChanged` 이벤트를 클라이언트로 전달합니다.
    pub fn new(info: ServerInfo, registry: Arc<ToolRegistry>, dirty: Arc<DirtyState>) -> Self {
        let notifier = Notifier::new();
        registry.add_handler(Arc::new(notifier.clone()));

        Self {
            info,
            registry,
            dirty,
            notifier,
        }
    }

    pub fn info(&self) -> &ServerInfo {
        &self.info
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// 현재 스냅샷의 tool 목록 (dirty면 클라이언트에 재시작 필요 알림)
    pub fn list_tools(&self) -> Vec<McpTool> {
        if self.dirty.is_dirty() {
            warn!("Server is dirty, restart required for include pattern changes");
            self.notifier.dirty(&DirtyNotice::pending_restart());
        }

        self.registry
            .list()
            .iter()
            .map(|tool| McpTool::from(tool.as_ref()))
            .collect()
    }

    /// tool 호출
    ///
    /// 없는 tool만 `Err(ToolNotFound)`이고, handler 실패는 `isError` 결과로 돌아옵니다.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<McpToolResult> {
        match self.registry.call(name, arguments).await {
            Ok(output) => Ok(McpToolResult::success(output.into_text())),
            Err(e @ Error::ToolNotFound(_)) => Err(e),
            Err(e) => {
                warn!(tool = %name, "Tool call failed: {}", e);
                Ok(McpToolResult::error(format!("Error: {}", e.detail())))
            }
        }
    }

    /// 클라이언트에 dirty 알림
    pub fn notify_dirty(&self, notice: &DirtyNotice) -> bool {
        self.notifier.dirty(notice)
    }

    // ========================================================================
    // JSON-RPC
    // ========================================================================

    /// 메시지 한 줄 처리. 알림이면 None
    pub async fn handle_message(&self, line: &str) -> Option<JsonRpcResponse> {
        let request: JsonRpcRequest = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(e) => return self.reject(line, e),
        };

        let Some(id) = request.id.clone() else {
            debug!("Notification received: {}", request.method);
            return None;
        };

        debug!("Request received: {} (id: {})", request.method, id);
        let response = match self.dispatch(&request.method, request.params).await {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(error) => JsonRpcResponse::failure(id, error),
        };
        Some(response)
    }

    fn reject(&self, line: &str, e: serde_json::Error) -> Option<JsonRpcResponse> {
        match serde_json::from_str::<Value>(line) {
            // method 없는 객체 (클라이언트의 응답 등)
            Ok(Value::Object(obj)) if !obj.contains_key("method") => {
                debug!("Ignoring message without method");
                None
            }
            Ok(value) => {
                let id = value.get("id").cloned().unwrap_or(Value::Null);
                Some(JsonRpcResponse::failure(id, JsonRpcError::invalid_request()))
            }
            Err(_) => {
                warn!("Failed to parse message: {}", e);
                Some(JsonRpcResponse::failure(Value::Null, JsonRpcError::parse_error()))
            }
        }
    }

    async fn dispatch(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> std::result::Result<Value, JsonRpcError> {
        match method {
            "initialize" => to_result(&InitializeResult::new(&self.info)),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({ "tools": self.list_tools() })),
            "tools/call" => {
                let call: McpToolCall = serde_json::from_value(params.unwrap_or(Value::Null))
                    .map_err(|e| JsonRpcError::invalid_params(format!("Invalid params: {}", e)))?;

                match self.call_tool(&call.name, call.arguments).await {
                    Ok(result) => to_result(&result),
                    Err(e) => Err(JsonRpcError::invalid_params(e.to_string())),
                }
            }
            other => Err(JsonRpcError::method_not_found(other)),
        }
    }

    // ========================================================================
    // Serve
    // ========================================================================

    /// 줄 단위 JSON-RPC 처리 (입력이 끝날 때까지)
    ///
    /// 처리하는 동안 알림 채널이 연결되고, 종료 시 해제됩니다.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (response_tx, response_rx) = mpsc::unbounded_channel::<JsonRpcResponse>();
        let (notify_tx, notify_rx) = mpsc::unbounded_channel::<JsonRpcNotification>();
        self.notifier.attach(notify_tx);

        let writer_task = tokio::spawn(write_loop(writer, response_rx, notify_rx));
        info!("MCP server ready: {} v{}", self.info.name, self.info.version);

        let mut lines = BufReader::new(reader).lines();
        let result = loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    let server = self.clone();
                    let tx = response_tx.clone();
                    tokio::spawn(async move {
                        if let Some(response) = server.handle_message(&line).await {
                            let _ = tx.send(response);
                        }
                    });
                }
                Ok(None) => break Ok(()),
                Err(e) => break Err(Error::Io(e)),
            }
        };

        info!("Client disconnected");
        self.notifier.detach();
        drop(response_tx);

        if tokio::time::timeout(DRAIN_TIMEOUT, writer_task).await.is_err() {
            warn!("Pending responses not flushed within {:?}", DRAIN_TIMEOUT);
        }
        result
    }
}

async fn write_loop<W>(
    mut writer: W,
    mut responses: mpsc::UnboundedReceiver<JsonRpcResponse>,
    mut notifications: mpsc::UnboundedReceiver<JsonRpcNotification>,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        let written = tokio::select! {
            Some(response) = responses.recv() => write_message(&mut writer, &response).await,
            Some(notification) = notifications.recv() => write_message(&mut writer, &notification).await,
            else => break,
        };

        if let Err(e) = written {
            error!("Failed to write to client: {}", e);
            break;
        }
    }
}

fn to_result<T: Serialize>(value: &T) -> std::result::Result<Value, JsonRpcError> {
    serde_json::to_value(value).map_err(|e| JsonRpcError::internal_error(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::{ToolDefinition, ToolHandler};
    use crate::registry::RegistrySnapshot;

    async fn server_with_echo() -> McpServer {
        let registry = Arc::new(ToolRegistry::new());
        let mut snapshot = RegistrySnapshot::new(1);
        snapshot.insert(ToolDefinition::new("echo", ToolHandler::template("Echo: {{message}}")));
        registry.install(snapshot).await;
        McpServer::new(ServerInfo::new("test", "0.0.0"), registry, Arc::new(DirtyState::new()))
    }

    async fn request(server: &McpServer, line: &str) -> Value {
        let response = server.handle_message(line).await.expect("response");
        serde_json::to_value(response).unwrap()
    }

    #[tokio::test]
    async fn test_initialize_and_ping() {
        let server = server_with_echo().await;
        let value = request(&server, r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#).await;
        assert_eq!(value["result"]["serverInfo"]["name"], "test");

        let value = request(&server, r#"{"jsonrpc":"2.0","id":"p","method":"ping"}"#).await;
        assert_eq!(value["id"], "p");
        assert_eq!(value["result"], json!({}));
    }

    #[tokio::test]
    async fn test_call_echo() {
        let server = server_with_echo().await;
        let value = request(
            &server,
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"echo","arguments":{"message":"hi"}}}"#,
        )
        .await;
        assert_eq!(
            value["result"],
            json!({ "content": [{ "type": "text", "text": "Echo: hi" }] })
        );
    }

    #[tokio::test]
    async fn test_handler_failure_is_error_result() {
        let server = server_with_echo().await;
        let value = request(
            &server,
            r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"echo","arguments":{}}}"#,
        )
        .await;
        assert_eq!(value["result"]["isError"], json!(true));
        assert_eq!(
            value["result"]["content"][0]["text"],
            "Error: Missing template argument: message"
        );
    }

    #[tokio::test]
    async fn test_unknown_tool_is_protocol_error() {
        let server = server_with_echo().await;
        let value = request(
            &server,
            r#"{"jsonrpc":"2.0","id":4,"method":"tools/call","params":{"name":"nonexistent"}}"#,
        )
        .await;
        assert_eq!(value["error"]["code"], JsonRpcError::INVALID_PARAMS);
        assert_eq!(value["error"]["message"], "Tool not found: nonexistent");
        assert!(server.registry().contains("echo"));
    }

    #[tokio::test]
    async fn test_protocol_errors() {
        let server = server_with_echo().await;

        let value = request(&server, "{ not json").await;
        assert_eq!(value["error"]["code"], JsonRpcError::PARSE_ERROR);
        assert_eq!(value["id"], Value::Null);

        let value = request(&server, r#"{"jsonrpc":"2.0","id":5,"method":"resources/list"}"#).await;
        assert_eq!(value["error"]["code"], JsonRpcError::METHOD_NOT_FOUND);

        let value = request(&server, r#"[1, 2]"#).await;
        assert_eq!(value["error"]["code"], JsonRpcError::INVALID_REQUEST);
    }

    #[tokio::test]
    async fn test_notifications_get_no_response() {
        let server = server_with_echo().await;
        assert!(server
            .handle_message(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
            .await
            .is_none());
        assert!(server
            .handle_message(r#"{"jsonrpc":"2.0","id":9,"result":{}}"#)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_list_tools_when_dirty() {
        let registry = Arc::new(ToolRegistry::new());
        let dirty = Arc::new(DirtyState::new());
        let server = McpServer::new(ServerInfo::new("t", "0"), registry, Arc::clone(&dirty));

        let (tx, mut rx) = mpsc::unbounded_channel();
        server.notifier().attach(tx);

        assert!(server.list_tools().is_empty());
        assert!(rx.try_recv().is_err());

        dirty.mark();
        assert!(server.list_tools().is_empty());
        let note = rx.try_recv().unwrap();
        assert_eq!(note.method, "server/dirty");
        assert_eq!(
            note.params.unwrap()["message"],
            "Server restart required due to include pattern file changes"
        );
    }
}
