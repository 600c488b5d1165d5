//! HotReload Config - 통합 설정
//!
//! 기본값 ← `hot-reload.json` ← 환경 변수 순서로 병합

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 설정 파일명 (작업 디렉토리 기준)
pub const CONFIG_FILE: &str = "hot-reload.json";

/// include 패턴 목록을 자식 프로세스에 전달하는 환경 변수 (콤마 구분)
pub const INCLUDE_ENV: &str = "MCP_HOT_RELOAD_INCLUDE";

/// tools 디렉토리 override 환경 변수
pub const TOOLS_DIR_ENV: &str = "MCP_HOT_RELOAD_TOOLS_DIR";

// ============================================================================
// HotReload Config (통합)
// ============================================================================

/// HotMCP 통합 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HotReloadConfig {
    /// initialize 응답에 보고되는 서버 이름
    #[serde(default = "default_name")]
    pub name: String,

    /// 서버 버전
    #[serde(default = "default_version")]
    pub version: String,

    /// hot-swap 대상 tools 디렉토리
    #[serde(default = "default_tools_dir")]
    pub tools_dir: PathBuf,

    /// 재시작이 필요한 파일 패턴
    #[serde(default)]
    pub include: Vec<String>,

    /// tool 호출 제한 시간 (없으면 무제한)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_timeout_ms: Option<u64>,

    /// 재시작 정책
    #[serde(default)]
    pub restart: RestartConfig,
}

impl Default for HotReloadConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            version: default_version(),
            tools_dir: default_tools_dir(),
            include: Vec::new(),
            call_timeout_ms: None,
            restart: RestartConfig::default(),
        }
    }
}

impl HotReloadConfig {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Load
    // ========================================================================

    /// 작업 디렉토리의 설정 파일 + 환경 변수 병합 로드
    pub fn load() -> Result<Self> {
        Self::load_with(None)
    }

    /// 명시적 설정 파일 경로로 로드 (없으면 작업 디렉토리의 기본 파일)
    ///
    /// 명시된 파일이 없으면 에러, 기본 파일이 없으면 기본값을 사용합니다.
    pub fn load_with(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::new();

        match path {
            Some(path) => config.merge(Self::from_file(path)?),
            None => {
                let default_path = Path::new(CONFIG_FILE);
                if default_path.exists() {
                    config.merge(Self::from_file(default_path)?);
                }
            }
        }

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// 파일에서 설정 로드
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            Error::Config(format!("Invalid config at {}: {}", path.display(), e))
        })
    }

    /// 환경 변수 적용 (조회 함수 주입)
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(INCLUDE_ENV) {
            let patterns = parse_include_env(&raw);
            if !patterns.is_empty() {
                self.include = patterns;
            }
        }
        if let Some(dir) = lookup(TOOLS_DIR_ENV) {
            if !dir.trim().is_empty() {
                self.tools_dir = PathBuf::from(dir.trim());
            }
        }
    }

    // ========================================================================
    // Merge
    // ========================================================================

    /// 다른 설정과 병합 (other가 우선)
    pub fn merge(&mut self, other: HotReloadConfig) {
        if other.name != default_name() {
            self.name = other.name;
        }
        if other.version != default_version() {
            self.version = other.version;
        }
        if other.tools_dir != default_tools_dir() {
            self.tools_dir = other.tools_dir;
        }
        for pattern in other.include {
            if !self.include.contains(&pattern) {
                self.include.push(pattern);
            }
        }
        if other.call_timeout_ms.is_some() {
            self.call_timeout_ms = other.call_timeout_ms;
        }
        self.restart.merge(other.restart);
    }

    // ========================================================================
    // Builder
    // ========================================================================

    pub fn tools_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.tools_dir = dir.into();
        self
    }

    pub fn include(mut self, pattern: impl Into<String>) -> Self {
        self.include.push(pattern.into());
        self
    }

    pub fn call_timeout_ms(mut self, ms: u64) -> Self {
        self.call_timeout_ms = Some(ms);
        self
    }

    /// tool 호출 제한 시간
    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout_ms.map(Duration::from_millis)
    }
}

// ============================================================================
// Restart Config
// ============================================================================

/// 슈퍼바이저 재시작 정책
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestartConfig {
    /// 첫 트리거 이후 재시작까지 대기 (ms)
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// SIGTERM 이후 SIGKILL까지 유예 (ms)
    #[serde(default = "default_grace_timeout_ms")]
    pub grace_timeout_ms: u64,
}

impl Default for RestartConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            grace_timeout_ms: default_grace_timeout_ms(),
        }
    }
}

impl RestartConfig {
    fn merge(&mut self, other: RestartConfig) {
        if other.debounce_ms != default_debounce_ms() {
            self.debounce_ms = other.debounce_ms;
        }
        if other.grace_timeout_ms != default_grace_timeout_ms() {
            self.grace_timeout_ms = other.grace_timeout_ms;
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn grace_timeout(&self) -> Duration {
        Duration::from_millis(self.grace_timeout_ms)
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// `MCP_HOT_RELOAD_INCLUDE` 값 파싱 (콤마 구분, 공백 제거, 빈 항목 무시)
pub fn parse_include_env(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect()
}

fn default_name() -> String {
    "hot-reload-mcp".to_string()
}

fn default_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_tools_dir() -> PathBuf {
    PathBuf::from("tools")
}

fn default_debounce_ms() -> u64 {
    1000
}

fn default_grace_timeout_ms() -> u64 {
    5000
}
