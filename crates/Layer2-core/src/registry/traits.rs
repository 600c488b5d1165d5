//! Registry Traits - 레지스트리 이벤트와 핸들러

use super::diff::DiffResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// ============================================================================
// RegistryEvent - 레지스트리 변경 이벤트
// ============================================================================

/// 레지스트리 변경 이벤트
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RegistryEvent {
    /// 새 스냅샷 설치됨 (diff가 비어 있어도 발행)
    Reloaded { generation: u64, tool_count: usize },

    /// tool 집합이 바뀜 (diff가 비어 있지 않을 때만)
    ToolsChanged { generation: u64, diff: DiffResult },
}

impl RegistryEvent {
    pub fn generation(&self) -> u64 {
        match self {
            Self::Reloaded { generation, .. } | Self::ToolsChanged { generation, .. } => *generation,
        }
    }

    pub fn is_tools_changed(&self) -> bool {
        matches!(self, Self::ToolsChanged { .. })
    }
}

// ============================================================================
// RegistryEventHandler - 이벤트 핸들러 trait
// ============================================================================

/// 레지스트리 이벤트 핸들러
#[async_trait]
pub trait RegistryEventHandler: Send + Sync {
    /// 핸들러 이름
    fn name(&self) -> &str;

    /// 이벤트 처리
    async fn handle(&self, event: &RegistryEvent);
}
