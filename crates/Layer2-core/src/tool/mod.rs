//! Tool System - 디렉토리에서 로드되는 tool 정의
//!
//! ## 아키텍처
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  ToolLoader                                                  │
//! │  └── load(dir) - *.json / *.toml / *.yaml → RegistrySnapshot │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ToolDefinition                                              │
//! │  ├── name / description / inputSchema                        │
//! │  ├── source + fingerprint (diff 기준)                        │
//! │  └── invoke(args) - required 검사 후 handler 실행            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ToolHandler                                                 │
//! │  ├── template - "Echo: {{message}}"                          │
//! │  ├── command  - 외부 프로그램 (stdin JSON)                   │
//! │  └── value    - 고정 JSON                                    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 매니페스트 예시
//!
//! ```json
//! {
//!   "name": "echo",
//!   "description": "Echo back the input message",
//!   "inputSchema": {
//!     "type": "object",
//!     "properties": { "message": { "type": "string" } },
//!     "required": ["message"]
//!   },
//!   "handler": { "type": "template", "template": "Echo: {{message}}" }
//! }
//! ```

mod definition;
mod handler;
mod loader;

pub use definition::{InputSchema, ToolDefinition, DEFAULT_DESCRIPTION};
pub use handler::{
    CommandSpec, NativeHandler, OutputFormat, ToolHandler, ToolOutput, ARGUMENTS_ENV, ARG_ENV_PREFIX,
    TOOL_NAME_ENV,
};
pub use loader::{
    fingerprint, is_manifest_file, load_definition, ManifestError, SkippedModule, ToolLoader,
    MANIFEST_EXTENSIONS,
};
