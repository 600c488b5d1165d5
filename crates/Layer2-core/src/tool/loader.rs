//! Tool Loader - 디렉토리의 tool 매니페스트 로드
//!
//! 매 로드마다 파일을 디스크에서 새로 읽고 파싱합니다 (메모이제이션 없음).
//! 지원 확장자: `json`, `toml`, `yaml`, `yml`. `.`으로 시작하는 파일은 무시합니다.
//!
//! 개별 파일의 실패는 로그를 남기고 건너뛰며, 디렉토리 자체를 읽지 못하면
//! 빈 스냅샷을 반환합니다. 로드 전체가 에러로 끝나는 경우는 없습니다.

use super::definition::{InputSchema, ToolDefinition, DEFAULT_DESCRIPTION};
use super::handler::ToolHandler;
use crate::registry::RegistrySnapshot;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// 인식하는 매니페스트 확장자
pub const MANIFEST_EXTENSIONS: &[&str] = &["json", "toml", "yaml", "yml"];

// ============================================================================
// ManifestError
// ============================================================================

/// 매니페스트 하나를 읽는 동안의 에러
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Failed to read file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Invalid {format} manifest: {message}")]
    Parse { format: &'static str, message: String },

    #[error("Missing 'name' field")]
    MissingName,

    #[error("Missing 'handler' field")]
    MissingHandler,
}

/// 로드에서 제외된 파일
#[derive(Debug, Clone)]
pub struct SkippedModule {
    pub path: PathBuf,
    pub reason: String,
}

// ============================================================================
// ToolManifest - 파일 형식
// ============================================================================

/// 디스크 상의 매니페스트 (필수 필드 검증 전)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolManifest {
    name: Option<String>,
    description: Option<String>,
    input_schema: Option<InputSchema>,
    handler: Option<ToolHandler>,
}

impl ToolManifest {
    fn parse(bytes: &[u8], extension: &str) -> Result<Self, ManifestError> {
        let text = String::from_utf8_lossy(bytes);
        let parse_err = |format: &'static str, message: String| ManifestError::Parse { format, message };

        match extension {
            "json" => serde_json::from_str(&text).map_err(|e| parse_err("json", e.to_string())),
            "toml" => toml::from_str(&text).map_err(|e| parse_err("toml", e.to_string())),
            _ => serde_yaml::from_str(&text).map_err(|e| parse_err("yaml", e.to_string())),
        }
    }

    fn into_definition(self, source: &Path, fingerprint: String) -> Result<ToolDefinition, ManifestError> {
        let name = self
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .ok_or(ManifestError::MissingName)?;
        let handler = self.handler.ok_or(ManifestError::MissingHandler)?;

        Ok(ToolDefinition::new(name, handler)
            .with_description(self.description.unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()))
            .with_schema(self.input_schema.unwrap_or_default())
            .with_source(source, fingerprint))
    }
}

// ============================================================================
// ToolLoader
// ============================================================================

/// 디렉토리 → RegistrySnapshot
#[derive(Debug, Clone, Default)]
pub struct ToolLoader;

impl ToolLoader {
    pub fn new() -> Self {
        Self
    }

    /// 디렉토리 바로 아래의 매니페스트를 모두 로드
    ///
    /// 파일명 사전순으로 처리하며, 같은 이름의 tool은 나중 파일이 이깁니다.
    pub fn load(&self, dir: &Path, generation: u64) -> RegistrySnapshot {
        let mut snapshot = RegistrySnapshot::new(generation);

        let files = match eligible_files(dir) {
            Ok(files) => files,
            Err(e) => {
                warn!("Error loading tools from {}: {}", dir.display(), e);
                return snapshot;
            }
        };

        for path in files {
            match load_definition(&path) {
                Ok(definition) => {
                    let name = definition.name.clone();
                    info!("Loaded tool: {}", name);
                    if let Some(previous) = snapshot.insert(definition) {
                        warn!(
                            "Duplicate tool '{}': {} overrides {}",
                            name,
                            path.display(),
                            previous.source.display()
                        );
                    }
                }
                Err(e) => {
                    warn!("Failed to load tool {}: {}", path.display(), e);
                    snapshot.record_skipped(path, e.to_string());
                }
            }
        }

        debug!(generation, count = snapshot.len(), "Tool load finished");
        snapshot
    }
}

/// 단일 매니페스트 파일 로드
pub fn load_definition(path: &Path) -> Result<ToolDefinition, ManifestError> {
    let bytes = std::fs::read(path)?;
    let extension = manifest_extension(path).unwrap_or("json");
    let fingerprint = fingerprint(&bytes);

    ToolManifest::parse(&bytes, extension)?.into_definition(path, fingerprint)
}

/// 원본 바이트의 SHA-256 hex
pub fn fingerprint(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// 로드 대상 파일인지 확인 (숨김 파일 제외 + 확장자)
pub fn is_manifest_file(path: &Path) -> bool {
    let hidden = path
        .file_name()
        .and_then(|n| n.to_str())
        .map_or(true, |n| n.starts_with('.'));
    !hidden && manifest_extension(path).is_some()
}

fn manifest_extension(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    MANIFEST_EXTENSIONS.iter().copied().find(|e| *e == ext)
}

fn eligible_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_manifest_file(path))
        .collect();
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}
