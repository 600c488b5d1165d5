//! Registry Snapshot - 특정 시점의 tool 이름 → 정의 매핑
//!
//! 스냅샷은 완성된 뒤에만 레지스트리에 설치되며, 설치 이후에는 변경되지 않습니다.

use crate::tool::{SkippedModule, ToolDefinition};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

// ============================================================================
// RegistrySnapshot
// ============================================================================

/// 레지스트리 스냅샷
#[derive(Debug, Clone)]
pub struct RegistrySnapshot {
    /// 로드 순번 (레지스트리가 부여)
    pub generation: u64,

    /// 생성 시간
    pub created_at: DateTime<Utc>,

    tools: HashMap<String, Arc<ToolDefinition>>,

    /// 로드에 실패한 파일들
    skipped: Vec<SkippedModule>,
}

impl RegistrySnapshot {
    pub fn new(generation: u64) -> Self {
        Self {
            generation,
            created_at: Utc::now(),
            tools: HashMap::new(),
            skipped: Vec::new(),
        }
    }

    /// 빈 스냅샷 (generation 0)
    pub fn empty() -> Self {
        Self::new(0)
    }

    /// 정의 추가 (같은 이름이 있으면 교체하고 이전 정의 반환)
    pub fn insert(&mut self, definition: ToolDefinition) -> Option<Arc<ToolDefinition>> {
        self.tools
            .insert(definition.name.clone(), Arc::new(definition))
    }

    pub(crate) fn record_skipped(&mut self, path: PathBuf, reason: String) {
        self.skipped.push(SkippedModule { path, reason });
    }

    pub fn get(&self, name: &str) -> Option<Arc<ToolDefinition>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// 이름 목록 (정렬)
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// 정의 목록 (이름순)
    pub fn list(&self) -> Vec<Arc<ToolDefinition>> {
        let mut tools: Vec<Arc<ToolDefinition>> = self.tools.values().cloned().collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        tools
    }

    /// 이름별 fingerprint
    pub fn fingerprint(&self, name: &str) -> Option<&str> {
        self.tools.get(name).map(|t| t.fingerprint.as_str())
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&String, &Arc<ToolDefinition>)> {
        self.tools.iter()
    }

    pub fn skipped(&self) -> &[SkippedModule] {
        &self.skipped
    }
}

impl Default for RegistrySnapshot {
    fn default() -> Self {
        Self::empty()
    }
}
