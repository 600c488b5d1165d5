//! Tool Registry - hot-swap 가능한 tool 레지스트리
//!
//! 현재 스냅샷을 `Arc`로 보관하고 reload 시 완성된 새 스냅샷으로 한 번에 교체합니다.
//! 읽기 쪽은 항상 하나의 스냅샷 전체를 보며, 교체 중인 상태를 관찰할 수 없습니다.
//!
//! 동시에 진행된 reload는 완료 순서대로 설치됩니다 (마지막 설치가 이김).
//! 각 reload의 diff는 자신이 실제로 교체한 스냅샷을 기준으로 계산됩니다.

use super::diff::{diff, DiffResult};
use super::snapshot::RegistrySnapshot;
use super::traits::{RegistryEvent, RegistryEventHandler};
use crate::tool::{ToolDefinition, ToolLoader, ToolOutput};
use futures::FutureExt;
use hotmcp_foundation::{Error, Result};
use parking_lot::RwLock;
use serde_json::Value;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info};

// ============================================================================
// ToolRegistry
// ============================================================================

/// tool 레지스트리
pub struct ToolRegistry {
    /// 현재 스냅샷 (교체 단위)
    current: RwLock<Arc<RegistrySnapshot>>,

    loader: ToolLoader,

    /// 마지막으로 발급한 generation
    generation: AtomicU64,

    /// tool 호출 제한 시간 (없으면 무제한)
    call_timeout: Option<Duration>,

    /// 이벤트 채널
    event_tx: broadcast::Sender<RegistryEvent>,

    /// 이벤트 핸들러
    handlers: RwLock<Vec<Arc<dyn RegistryEventHandler>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(64);
        Self {
            current: RwLock::new(Arc::new(RegistrySnapshot::empty())),
            loader: ToolLoader::new(),
            generation: AtomicU64::new(0),
            call_timeout: None,
            event_tx,
            handlers: RwLock::new(Vec::new()),
        }
    }

    pub fn with_call_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.call_timeout = timeout;
        self
    }

    // ========================================================================
    // 이벤트
    // ========================================================================

    /// 이벤트 핸들러 등록
    pub fn add_handler(&self, handler: Arc<dyn RegistryEventHandler>) {
        debug!("Registry handler added: {}", handler.name());
        self.handlers.write().push(handler);
    }

    /// 이벤트 구독
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.event_tx.subscribe()
    }

    async fn emit_event(&self, event: RegistryEvent) {
        // 수신자가 없으면 에러지만 무시
        let _ = self.event_tx.send(event.clone());

        let handlers: Vec<Arc<dyn RegistryEventHandler>> = self.handlers.read().clone();
        for handler in handlers {
            handler.handle(&event).await;
        }
    }

    // ========================================================================
    // 조회
    // ========================================================================

    /// 현재 스냅샷
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        Arc::clone(&*self.current.read())
    }

    /// 모든 tool (이름순)
    pub fn list(&self) -> Vec<Arc<ToolDefinition>> {
        self.snapshot().list()
    }

    /// tool 조회
    pub fn get(&self, name: &str) -> Result<Arc<ToolDefinition>> {
        self.snapshot()
            .get(name)
            .ok_or_else(|| Error::ToolNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.snapshot().contains(name)
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    // ========================================================================
    // Reload
    // ========================================================================

    /// 디렉토리를 다시 로드하고 스냅샷 교체
    pub async fn reload(&self, dir: &Path) -> Result<DiffResult> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let loader = self.loader.clone();
        let dir = dir.to_path_buf();

        let snapshot = tokio::task::spawn_blocking(move || loader.load(&dir, generation))
            .await
            .map_err(|e| Error::Internal(format!("Tool load task failed: {}", e)))?;

        Ok(self.install(snapshot).await)
    }

    /// 완성된 스냅샷 설치
    ///
    /// diff가 비어 있지 않으면 `ToolsChanged`를 발행합니다.
    pub async fn install(&self, snapshot: RegistrySnapshot) -> DiffResult {
        let generation = snapshot.generation;
        let tool_count = snapshot.len();
        let next = Arc::new(snapshot);

        let previous = {
            let mut current = self.current.write();
            std::mem::replace(&mut *current, Arc::clone(&next))
        };
        let changes = diff(&previous, &next);
        drop(previous);

        self.emit_event(RegistryEvent::Reloaded {
            generation,
            tool_count,
        })
        .await;

        if !changes.is_empty() {
            info!("Tools updated - {}", changes);
            self.emit_event(RegistryEvent::ToolsChanged {
                generation,
                diff: changes.clone(),
            })
            .await;
        }

        changes
    }

    // ========================================================================
    // Call
    // ========================================================================

    /// tool 호출
    ///
    /// 없는 tool은 `ToolNotFound`, handler 실패/패닉은 `ToolExecution`,
    /// 제한 시간 초과는 `Timeout`으로 돌아옵니다. 레지스트리 상태는 바뀌지 않습니다.
    pub async fn call(&self, name: &str, arguments: Value) -> Result<ToolOutput> {
        let tool = self.get(name)?;
        let invocation = AssertUnwindSafe(tool.invoke(arguments)).catch_unwind();

        let outcome = match self.call_timeout {
            Some(limit) => tokio::time::timeout(limit, invocation).await.map_err(|_| {
                Error::Timeout(format!(
                    "Tool '{}' timed out after {}ms",
                    name,
                    limit.as_millis()
                ))
            })?,
            None => invocation.await,
        };

        outcome.unwrap_or_else(|panic| {
            let message = panic_message(panic.as_ref());
            error!(tool = %name, "Tool handler panicked: {}", message);
            Err(Error::tool_execution(name, message))
        })
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "Tool handler panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::{NativeHandler, ToolHandler};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;
    use tempfile::tempdir;

    fn write_tool(dir: &Path, file: &str, name: &str, template: &str) {
        std::fs::write(
            dir.join(file),
            json!({
                "name": name,
                "handler": { "type": "template", "template": template }
            })
            .to_string(),
        )
        .unwrap();
    }

    /// 받은 이벤트를 기록하는 핸들러
    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<RegistryEvent>>,
    }

    #[async_trait]
    impl RegistryEventHandler for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        async fn handle(&self, event: &RegistryEvent) {
            self.events.lock().push(event.clone());
        }
    }

    impl Recorder {
        fn tools_changed(&self) -> Vec<DiffResult> {
            self.events
                .lock()
                .iter()
                .filter_map(|e| match e {
                    RegistryEvent::ToolsChanged { diff, .. } => Some(diff.clone()),
                    _ => None,
                })
                .collect()
        }
    }

    #[tokio::test]
    async fn test_reload_idempotent() {
        let dir = tempdir().unwrap();
        write_tool(dir.path(), "echo.json", "echo", "Echo: {{message}}");

        let registry = ToolRegistry::new();
        let recorder = Arc::new(Recorder::default());
        registry.add_handler(recorder.clone());

        let first = registry.reload(dir.path()).await.unwrap();
        assert_eq!(first.added.len(), 1);

        let second = registry.reload(dir.path()).await.unwrap();
        assert!(second.is_empty());
        let third = registry.reload(dir.path()).await.unwrap();
        assert!(third.is_empty());

        assert_eq!(recorder.tools_changed().len(), 1);
        assert_eq!(registry.snapshot().generation, 3);
    }

    #[tokio::test]
    async fn test_edit_reported_as_changed() {
        let dir = tempdir().unwrap();
        write_tool(dir.path(), "echo.json", "echo", "v1");

        let registry = ToolRegistry::new();
        registry.reload(dir.path()).await.unwrap();

        write_tool(dir.path(), "echo.json", "echo", "v2");
        let changes = registry.reload(dir.path()).await.unwrap();
        assert!(changes.added.is_empty());
        assert!(changes.changed.contains("echo"));

        let out = registry.call("echo", json!({})).await.unwrap();
        assert_eq!(out.into_text(), "v2");
    }

    #[tokio::test]
    async fn test_call_unknown_tool() {
        let registry = ToolRegistry::new();
        let before = registry.snapshot();

        let err = registry.call("nonexistent", json!({})).await.unwrap_err();
        assert!(matches!(err, Error::ToolNotFound(ref name) if name == "nonexistent"));
        assert!(Arc::ptr_eq(&before, &registry.snapshot()));
    }

    #[tokio::test]
    async fn test_panicking_handler_is_contained() {
        let mut snapshot = RegistrySnapshot::new(1);
        snapshot.insert(ToolDefinition::new(
            "boom",
            ToolHandler::Native(NativeHandler::new(|args| async move {
                if args.is_empty() {
                    panic!("handler exploded");
                }
                Ok(ToolOutput::Text("unreachable".to_string()))
            })),
        ));
        snapshot.insert(ToolDefinition::new("ok", ToolHandler::template("fine")));

        let registry = ToolRegistry::new();
        registry.install(snapshot).await;

        let err = registry.call("boom", json!({})).await.unwrap_err();
        assert_eq!(err.detail(), "handler exploded");

        assert_eq!(registry.call("ok", json!({})).await.unwrap().into_text(), "fine");
        let err = registry.call("boom", json!({})).await.unwrap_err();
        assert!(matches!(err, Error::ToolExecution { .. }));
    }

    #[tokio::test]
    async fn test_call_timeout() {
        let mut snapshot = RegistrySnapshot::new(1);
        snapshot.insert(ToolDefinition::new(
            "slow",
            ToolHandler::Native(NativeHandler::new(|_| async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(ToolOutput::Text("late".to_string()))
            })),
        ));

        let registry = ToolRegistry::new().with_call_timeout(Some(Duration::from_millis(50)));
        registry.install(snapshot).await;

        let err = registry.call("slow", json!({})).await.unwrap_err();
        assert_eq!(err.detail(), "Tool 'slow' timed out after 50ms");
    }

    #[tokio::test]
    async fn test_broadcast_events() {
        let dir = tempdir().unwrap();
        write_tool(dir.path(), "a.json", "a", "a");

        let registry = ToolRegistry::new();
        let mut rx = registry.subscribe();
        registry.reload(dir.path()).await.unwrap();

        assert_eq!(
            rx.recv().await.unwrap(),
            RegistryEvent::Reloaded {
                generation: 1,
                tool_count: 1
            }
        );
        assert!(rx.recv().await.unwrap().is_tools_changed());
    }

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn Any + Send> = Box::new("static str");
        assert_eq!(panic_message(boxed.as_ref()), "static str");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");
        let boxed: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(boxed.as_ref()), "Tool handler panicked");
    }
}
