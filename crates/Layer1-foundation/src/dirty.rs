//! Dirty State - 재시작이 필요한 변경이 있었는지 나타내는 플래그
//!
//! false로 시작해 include 패턴 이벤트에서 true가 되고,
//! 재시작 사이클이 시작될 때만 false로 돌아갑니다.

use std::sync::atomic::{AtomicBool, Ordering};

/// 프로세스당 하나의 dirty 플래그
#[derive(Debug, Default)]
pub struct DirtyState {
    dirty: AtomicBool,
}

impl DirtyState {
    pub fn new() -> Self {
        Self::default()
    }

    /// dirty로 표시. false → true 전환이면 true 반환
    pub fn mark(&self) -> bool {
        !self.dirty.swap(true, Ordering::SeqCst)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    /// 재시작 사이클 시작 시 소비. 이전 값이 true였으면 true 반환
    pub fn take(&self) -> bool {
        self.dirty.swap(false, Ordering::SeqCst)
    }
}
