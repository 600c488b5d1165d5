//! # Tool Registry
//!
//! hot-swap 가능한 tool 레지스트리
//!
//! ## 설계 원칙
//!
//! 1. **Snapshot Swap**: 완성된 스냅샷만 설치, 읽기는 항상 스냅샷 하나 전체
//! 2. **Event-driven**: diff가 비어 있지 않을 때만 `ToolsChanged` 발행
//!
//! ## 아키텍처
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      ToolRegistry                            │
//! │  RwLock<Arc<RegistrySnapshot>>                               │
//! │     ▲ install(new)        │ snapshot() / get() / list()      │
//! │     │                     ▼                                  │
//! │  ToolLoader::load(dir)   readers (Arc clone)                 │
//! │                                                              │
//! │  diff(old, new) ──▶ RegistryEvent ──▶ broadcast + handlers   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 사용 예시
//!
//! ```ignore
//! let registry = ToolRegistry::new();
//! registry.add_handler(Arc::new(notifier));
//!
//! let changes = registry.reload(Path::new("tools")).await?;
//! let output = registry.call("echo", json!({ "message": "hi" })).await?;
//! ```

mod diff;
mod dynamic;
mod snapshot;
mod traits;

pub use diff::{diff, DiffResult};
pub use dynamic::ToolRegistry;
pub use snapshot::RegistrySnapshot;
pub use traits::{RegistryEvent, RegistryEventHandler};
