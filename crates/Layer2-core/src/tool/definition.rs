//! Tool Definition - 호출 가능한 tool 하나
//!
//! 로더가 디렉토리를 스캔할 때마다 새로 만들어지며, 생성 이후에는 변경되지 않습니다.
//! reload 시 같은 이름의 tool은 교체(remove-old-add-new)될 뿐 수정되지 않습니다.

use super::handler::{ToolHandler, ToolOutput};
use hotmcp_foundation::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// description이 없을 때 보고되는 기본값
pub const DEFAULT_DESCRIPTION: &str = "No description";

// ============================================================================
// InputSchema
// ============================================================================

/// JSON-Schema 형태의 입력 스키마 (type / properties / required)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSchema {
    #[serde(rename = "type", default = "default_schema_type")]
    pub schema_type: String,

    #[serde(default)]
    pub properties: Map<String, Value>,

    #[serde(default)]
    pub required: Vec<String>,

    /// 그 외 JSON-Schema 키워드 (additionalProperties 등)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for InputSchema {
    fn default() -> Self {
        Self {
            schema_type: default_schema_type(),
            properties: Map::new(),
            required: Vec::new(),
            extra: Map::new(),
        }
    }
}

impl InputSchema {
    /// 속성의 `default` 값
    pub fn default_for(&self, key: &str) -> Option<&Value> {
        self.properties.get(key).and_then(|prop| prop.get("default"))
    }

    /// 인자 검증 후 객체로 정규화 (null → 빈 객체)
    pub fn validate(&self, arguments: Value) -> Result<Map<String, Value>> {
        let args = match arguments {
            Value::Null => Map::new(),
            Value::Object(map) => map,
            other => {
                return Err(Error::InvalidInput(format!(
                    "Arguments must be an object, got {}",
                    json_type_name(&other)
                )))
            }
        };

        if let Some(missing) = self
            .required
            .iter()
            .find(|key| args.get(key.as_str()).map_or(true, Value::is_null))
        {
            return Err(Error::InvalidInput(format!(
                "Missing required argument: {}",
                missing
            )));
        }

        Ok(args)
    }
}

fn default_schema_type() -> String {
    "object".to_string()
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// ToolDefinition
// ============================================================================

/// 로드된 tool 정의
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    /// 스냅샷 내 고유 키 (diff 기준)
    pub name: String,
    pub description: String,
    pub input_schema: InputSchema,
    pub handler: ToolHandler,

    /// 정의를 읽어온 파일
    pub source: PathBuf,

    /// 원본 바이트의 SHA-256 (hex)
    pub fingerprint: String,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, handler: ToolHandler) -> Self {
        Self {
            name: name.into(),
            description: DEFAULT_DESCRIPTION.to_string(),
            input_schema: InputSchema::default(),
            handler,
            source: PathBuf::new(),
            fingerprint: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_schema(mut self, schema: InputSchema) -> Self {
        self.input_schema = schema;
        self
    }

    pub fn with_source(mut self, source: impl Into<PathBuf>, fingerprint: impl Into<String>) -> Self {
        self.source = source.into();
        self.fingerprint = fingerprint.into();
        self
    }

    /// 정의 파일이 있는 디렉토리 (command handler의 작업 디렉토리)
    pub fn base_dir(&self) -> &Path {
        self.source.parent().unwrap_or_else(|| Path::new("."))
    }

    /// 인자 검증 후 handler 실행
    pub async fn invoke(&self, arguments: Value) -> Result<ToolOutput> {
        let args = self.input_schema.validate(arguments)?;
        self.handler.invoke(self, args).await
    }
}
