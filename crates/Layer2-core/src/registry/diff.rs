//! Snapshot Diff - 두 스냅샷 사이의 변경 집합
//!
//! - added: 새 스냅샷에만 있는 이름
//! - removed: 이전 스냅샷에만 있는 이름
//! - changed: 양쪽에 있고 원본 fingerprint가 다른 이름

use super::snapshot::RegistrySnapshot;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// 스냅샷 변경 집합
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffResult {
    pub added: BTreeSet<String>,
    pub removed: BTreeSet<String>,
    pub changed: BTreeSet<String>,
}

impl DiffResult {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

impl fmt::Display for DiffResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Added: {}, Removed: {}, Changed: {}",
            self.added.len(),
            self.removed.len(),
            self.changed.len()
        )
    }
}

/// `old` → `new` 변경 계산
pub fn diff(old: &RegistrySnapshot, new: &RegistrySnapshot) -> DiffResult {
    let mut result = DiffResult::default();

    for (name, tool) in new.iter() {
        match old.fingerprint(name) {
            None => {
                result.added.insert(name.clone());
            }
            Some(previous) if previous != tool.fingerprint => {
                result.changed.insert(name.clone());
            }
            Some(_) => {}
        }
    }

    for (name, _) in old.iter() {
        if !new.contains(name) {
            result.removed.insert(name.clone());
        }
    }

    result
}
