//! Notifier - 연결된 클라이언트로 알림 전달
//!
//! 클라이언트 채널은 stdio 전송이 동작하는 동안에만 존재합니다.
//! 채널이 없을 때의 알림은 큐에 쌓이지 않고 버려집니다.

use super::transport::JsonRpcNotification;
use super::types::DirtyNotice;
use crate::registry::{RegistryEvent, RegistryEventHandler};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// tool 목록 변경 알림
pub const TOOLS_LIST_CHANGED: &str = "notifications/tools/list_changed";

/// 재시작 필요 알림
pub const SERVER_DIRTY: &str = "server/dirty";

/// 클라이언트 알림 채널 (복제 시 같은 채널 공유)
#[derive(Clone, Default)]
pub struct Notifier {
    channel: Arc<RwLock<Option<mpsc::UnboundedSender<JsonRpcNotification>>>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// 클라이언트 채널 연결
    pub fn attach(&self, tx: mpsc::UnboundedSender<JsonRpcNotification>) {
        *self.channel.write() = Some(tx);
    }

    /// 클라이언트 채널 해제
    pub fn detach(&self) {
        self.channel.write().take();
    }

    pub fn is_attached(&self) -> bool {
        self.channel.read().is_some()
    }

    /// 알림 전송. 전달되지 않았으면 false
    pub fn notify(&self, method: &str, params: Option<Value>) -> bool {
        let Some(tx) = self.channel.read().clone() else {
            debug!("No client attached, dropping notification: {}", method);
            return false;
        };

        if tx.send(JsonRpcNotification::new(method, params)).is_err() {
            warn!("Client channel closed, dropping notification: {}", method);
            self.detach();
            return false;
        }
        true
    }

    pub fn tools_changed(&self) -> bool {
        self.notify(TOOLS_LIST_CHANGED, None)
    }

    pub fn dirty(&self, notice: &DirtyNotice) -> bool {
        match serde_json::to_value(notice) {
            Ok(params) => self.notify(SERVER_DIRTY, Some(params)),
            Err(e) => {
                warn!("Failed to serialize dirty notice: {}", e);
                false
            }
        }
    }
}

#[async_trait]
impl RegistryEventHandler for Notifier {
    fn name(&self) -> &str {
        "mcp-notifier"
    }

    async fn handle(&self, event: &RegistryEvent) {
        if event.is_tools_changed() {
            self.tools_changed();
        }
    }
}
