//! MCP Types - MCP 관련 타입 정의

use crate::tool::{InputSchema, ToolDefinition};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 지원하는 MCP 프로토콜 버전
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// 서버가 제공하는 도구 정보
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpTool {
    /// 도구 이름
    pub name: String,

    /// 도구 설명
    pub description: String,

    /// 입력 스키마 (JSON Schema)
    #[serde(rename = "inputSchema")]
    pub input_schema: InputSchema,
}

impl From<&ToolDefinition> for McpTool {
    fn from(tool: &ToolDefinition) -> Self {
        Self {
            name: tool.name.clone(),
            description: tool.description.clone(),
            input_schema: tool.input_schema.clone(),
        }
    }
}

/// `tools/call` 파라미터
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpToolCall {
    /// 도구 이름
    pub name: String,

    /// 인자
    #[serde(default)]
    pub arguments: Value,
}

/// 도구 실행 결과
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpToolResult {
    /// 결과 콘텐츠
    pub content: Vec<McpContent>,

    /// handler 실패 여부
    #[serde(rename = "isError", default, skip_serializing_if = "is_false")]
    pub is_error: bool,
}

/// MCP 콘텐츠
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum McpContent {
    /// 텍스트 콘텐츠
    Text { text: String },
}

impl McpToolResult {
    /// 성공 결과 생성
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            is_error: false,
            content: vec![McpContent::Text { text: text.into() }],
        }
    }

    /// 오류 결과 생성
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            is_error: true,
            content: vec![McpContent::Text { text: text.into() }],
        }
    }

    /// 텍스트 결과 추출
    pub fn text(&self) -> Option<&str> {
        self.content.iter().map(|c| match c {
            McpContent::Text { text } => text.as_str(),
        }).next()
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

// ============================================================================
// initialize
// ============================================================================

/// 서버 정보
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

impl ServerInfo {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

/// `initialize` 응답
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub protocol_version: String,
    pub capabilities: Value,
    pub server_info: ServerInfo,
}

impl InitializeResult {
    pub fn new(info: &ServerInfo) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: serde_json::json!({ "tools": { "listChanged": true } }),
            server_info: info.clone(),
        }
    }
}

// ============================================================================
// server/dirty
// ============================================================================

/// `server/dirty` 알림 파라미터
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirtyNotice {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    pub message: String,
}

impl DirtyNotice {
    /// include 파일 이벤트 발생 시
    pub fn include_changed(event: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            event: Some(event.into()),
            path: Some(path.into()),
            message: "Server restart required".to_string(),
        }
    }

    /// dirty 상태에서 tools/list 요청 시
    pub fn pending_restart() -> Self {
        Self {
            event: None,
            path: None,
            message: "Server restart required due to include pattern file changes".to_string(),
        }
    }
}
