//! Tool Handler - 매니페스트에 선언된 handler 실행
//!
//! - `template`: `{{key}}` 치환 (문자열 결과)
//! - `command`: 외부 프로그램 실행 (인자는 stdin JSON + 환경 변수)
//! - `value`: 고정 값 반환
//! - `native`: 코드로 등록한 클로저

use super::definition::ToolDefinition;
use chrono::{Local, SecondsFormat, Utc};
use futures::future::BoxFuture;
use hotmcp_foundation::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// 인자 JSON 전체를 담는 환경 변수
pub const ARGUMENTS_ENV: &str = "MCP_TOOL_ARGUMENTS";

/// 호출된 tool 이름을 담는 환경 변수
pub const TOOL_NAME_ENV: &str = "MCP_TOOL_NAME";

/// 스칼라 인자별 환경 변수 접두어 (`MCP_ARG_<KEY>`)
pub const ARG_ENV_PREFIX: &str = "MCP_ARG_";

lazy_static::lazy_static! {
    static ref PLACEHOLDER: Regex =
        Regex::new(r"\{\{\s*(@?[A-Za-z0-9_.\-]+)(?:\?([^}]*))?\s*\}\}").unwrap();
}

// ============================================================================
// ToolHandler
// ============================================================================

/// handler 선언 (`type` 태그로 구분)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolHandler {
    /// 문자열 템플릿
    Template { template: String },

    /// 외부 명령
    Command(CommandSpec),

    /// 고정 값
    Value { value: Value },

    /// 코드로 등록하는 handler (매니페스트에서는 사용 불가)
    #[serde(skip)]
    Native(NativeHandler),
}

impl ToolHandler {
    pub fn template(template: impl Into<String>) -> Self {
        Self::Template {
            template: template.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Template { .. } => "template",
            Self::Command(_) => "command",
            Self::Value { .. } => "value",
            Self::Native(_) => "native",
        }
    }

    /// handler 실행 (인자는 이미 검증된 상태)
    pub async fn invoke(&self, tool: &ToolDefinition, args: Map<String, Value>) -> Result<ToolOutput> {
        match self {
            Self::Template { template } => render_template(template, &args, tool)
                .map(ToolOutput::Text)
                .map_err(|message| Error::tool_execution(&tool.name, message)),
            Self::Value { value } => Ok(ToolOutput::Json(value.clone())),
            Self::Command(spec) => spec.run(tool, args).await,
            Self::Native(handler) => (handler.0)(args).await,
        }
    }
}

// ============================================================================
// NativeHandler
// ============================================================================

type NativeFn = dyn Fn(Map<String, Value>) -> BoxFuture<'static, Result<ToolOutput>> + Send + Sync;

/// Rust 클로저 handler
#[derive(Clone)]
pub struct NativeHandler(Arc<NativeFn>);

impl NativeHandler {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Map<String, Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ToolOutput>> + Send + 'static,
    {
        Self(Arc::new(
            move |args: Map<String, Value>| -> BoxFuture<'static, Result<ToolOutput>> {
                Box::pin(f(args))
            },
        ))
    }
}

impl fmt::Debug for NativeHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NativeHandler")
    }
}

impl PartialEq for NativeHandler {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

// ============================================================================
// ToolOutput
// ============================================================================

/// handler 결과
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    Text(String),
    Json(Value),
}

impl ToolOutput {
    /// 클라이언트에 보낼 텍스트 (문자열은 그대로, 그 외는 pretty JSON)
    pub fn into_text(self) -> String {
        match self {
            ToolOutput::Text(text) | ToolOutput::Json(Value::String(text)) => text,
            ToolOutput::Json(value) => {
                serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())
            }
        }
    }
}

// ============================================================================
// Template
// ============================================================================

fn render_template(
    template: &str,
    args: &Map<String, Value>,
    tool: &ToolDefinition,
) -> std::result::Result<String, String> {
    let mut rendered = String::with_capacity(template.len());
    let mut last = 0;

    for caps in PLACEHOLDER.captures_iter(template) {
        let Some(whole) = caps.get(0) else { continue };
        rendered.push_str(&template[last..whole.start()]);
        last = whole.end();

        let key = &caps[1];
        if let Some(name) = key.strip_prefix('@') {
            rendered.push_str(&builtin_variable(name)?);
            continue;
        }

        let value = args
            .get(key)
            .filter(|v| !v.is_null())
            .or_else(|| tool.input_schema.default_for(key));

        match caps.get(2) {
            // `{{flag?text}}` - 인자가 참일 때만 text
            Some(text) => {
                if value.map_or(false, is_truthy) {
                    rendered.push_str(text.as_str());
                }
            }
            None => match value {
                Some(Value::String(s)) => rendered.push_str(s),
                Some(other) => rendered.push_str(&other.to_string()),
                None => return Err(format!("Missing template argument: {}", key)),
            },
        }
    }

    rendered.push_str(&template[last..]);
    Ok(rendered)
}

fn builtin_variable(name: &str) -> std::result::Result<String, String> {
    match name {
        "time" => Ok(Local::now().format("%H:%M:%S").to_string()),
        "date" => Ok(Local::now().format("%Y-%m-%d").to_string()),
        "iso" => Ok(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        "unix" => Ok(Utc::now().timestamp().to_string()),
        other => Err(format!("Unknown template variable: @{}", other)),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

// ============================================================================
// Command
// ============================================================================

/// `command` handler 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandSpec {
    /// 실행 파일 (상대 경로는 매니페스트 디렉토리 기준) 또는 셸 스크립트
    pub command: String,

    #[serde(default)]
    pub args: Vec<String>,

    /// `sh -c` (Windows: `cmd /C`)로 실행
    #[serde(default)]
    pub shell: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    #[serde(default)]
    pub output: OutputFormat,

    #[serde(default)]
    pub env: HashMap<String, String>,
}

/// stdout 해석 방식
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl CommandSpec {
    async fn run(&self, tool: &ToolDefinition, args: Map<String, Value>) -> Result<ToolOutput> {
        let base_dir = tool.base_dir();
        let mut cmd = self.build(&tool.name, base_dir);

        let payload = Value::Object(args.clone()).to_string();
        cmd.current_dir(base_dir)
            .env(TOOL_NAME_ENV, &tool.name)
            .env(ARGUMENTS_ENV, &payload)
            .envs(arg_env(&args))
            .envs(&self.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(tool = %tool.name, command = %self.command, "Executing tool command");

        let mut child = cmd.spawn().map_err(|e| {
            Error::tool_execution(
                &tool.name,
                format!("Failed to execute command '{}': {}", self.command, e),
            )
        })?;

        // stdin을 읽지 않는 프로그램도 막히지 않도록 별도 task에서 기록
        if let Some(mut stdin) = child.stdin.take() {
            tokio::spawn(async move {
                let _ = stdin.write_all(payload.as_bytes()).await;
            });
        }

        let output = match self.timeout_secs {
            Some(secs) => tokio::time::timeout(Duration::from_secs(secs), child.wait_with_output())
                .await
                .map_err(|_| Error::Timeout(format!("Command timed out after {}s", secs)))?,
            None => child.wait_with_output().await,
        }
        .map_err(|e| Error::tool_execution(&tool.name, e.to_string()))?;

        let stdout = String::from_utf8_lossy(&output.stdout);

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = if stderr.trim().is_empty() {
                format!("Command failed with exit code: {:?}", output.status.code())
            } else {
                stderr.trim().to_string()
            };
            warn!(tool = %tool.name, "Tool command failed: {}", message);
            return Err(Error::tool_execution(&tool.name, message));
        }

        match self.output {
            OutputFormat::Text => Ok(ToolOutput::Text(
                stdout.trim_end_matches(&['\r', '\n'][..]).to_string(),
            )),
            OutputFormat::Json => serde_json::from_str(stdout.trim())
                .map(ToolOutput::Json)
                .map_err(|e| Error::tool_execution(&tool.name, format!("Invalid JSON output: {}", e))),
        }
    }

    fn build(&self, tool_name: &str, base_dir: &Path) -> Command {
        if self.shell {
            let mut cmd = if cfg!(windows) {
                let mut cmd = Command::new("cmd");
                cmd.arg("/C").arg(&self.command);
                cmd
            } else {
                // $0 = tool 이름, $1.. = args
                let mut cmd = Command::new("sh");
                cmd.arg("-c").arg(&self.command).arg(tool_name);
                cmd
            };
            cmd.args(&self.args);
            cmd
        } else {
            let mut cmd = Command::new(resolve_program(&self.command, base_dir));
            cmd.args(&self.args);
            cmd
        }
    }
}

/// `./run.sh` 같은 상대 경로는 매니페스트 디렉토리 기준으로 해석
fn resolve_program(command: &str, base_dir: &Path) -> PathBuf {
    let path = Path::new(command);
    if path.is_relative() && path.components().count() > 1 {
        base_dir.join(path)
    } else {
        path.to_path_buf()
    }
}

/// 스칼라 인자를 `MCP_ARG_<KEY>` 형태로 노출
fn arg_env(args: &Map<String, Value>) -> Vec<(String, String)> {
    args.iter()
        .filter_map(|(key, value)| {
            let value = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => return None,
            };
            let key: String = key
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
                .collect();
            Some((format!("{}{}", ARG_ENV_PREFIX, key), value))
        })
        .collect()
}
