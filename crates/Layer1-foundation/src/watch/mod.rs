//! Path Watcher - notify 기반 파일 감시
//!
//! 두 가지 감시 범위를 제공합니다:
//! - `directory`: 디렉토리 바로 아래 파일 (hot-swap 대상, 비재귀)
//! - `patterns`: glob 패턴 목록 (재시작 대상)
//!
//! 감시 시작 이후의 변경만 보고합니다. 이벤트는 tokio 채널로 전달됩니다.

use crate::{Error, Result};
use glob::{MatchOptions, Pattern};
use notify::event::{ModifyKind, RenameMode};
use notify::{Config, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, info};

// ============================================================================
// WatchEvent
// ============================================================================

/// 변경 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchEventKind {
    Add,
    Change,
    Remove,
}

impl fmt::Display for WatchEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchEventKind::Add => write!(f, "add"),
            WatchEventKind::Change => write!(f, "change"),
            WatchEventKind::Remove => write!(f, "remove"),
        }
    }
}

/// 감시 이벤트
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub kind: WatchEventKind,
    pub path: PathBuf,
}

impl WatchEvent {
    pub fn new(kind: WatchEventKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }
}

// ============================================================================
// PathWatcher
// ============================================================================

/// 파일 감시자. drop 시 감시가 중단됩니다.
pub struct PathWatcher {
    _watcher: RecommendedWatcher,
    roots: Vec<PathBuf>,
}

impl PathWatcher {
    /// 디렉토리 바로 아래 파일의 추가/변경/삭제 감시
    ///
    /// 디렉토리가 아직 없으면 존재하는 가장 가까운 상위 디렉토리를 재귀 감시하다가
    /// 디렉토리 자체의 생성도 이벤트로 보고합니다.
    pub fn directory(dir: &Path, tx: mpsc::UnboundedSender<WatchEvent>) -> Result<Self> {
        let (target, root) = resolve_missing(dir)?;

        let filter_dir = target.clone();
        let mut watcher = create_watcher(tx, move |path| {
            path == filter_dir || path.parent() == Some(filter_dir.as_path())
        })?;

        if root == target {
            watcher.watch(&root, RecursiveMode::NonRecursive)?;
            info!(path = %root.display(), "Watching directory");
        } else {
            watcher.watch(&root, RecursiveMode::Recursive)?;
            info!(
                path = %target.display(),
                root = %root.display(),
                "Directory not found, watching parent until it is created"
            );
        }

        Ok(Self {
            _watcher: watcher,
            roots: vec![root],
        })
    }

    /// glob 패턴 감시 (상대 패턴은 `base` 기준)
    pub fn patterns(
        patterns: &[String],
        base: &Path,
        tx: mpsc::UnboundedSender<WatchEvent>,
    ) -> Result<Self> {
        let base = base.canonicalize().unwrap_or_else(|_| base.to_path_buf());

        let mut compiled = Vec::with_capacity(patterns.len());
        // root -> recursive 여부
        let mut roots: BTreeMap<PathBuf, bool> = BTreeMap::new();

        for raw in patterns {
            let spec = PatternSpec::compile(raw, &base)?;
            let recursive = roots.entry(spec.root.clone()).or_insert(false);
            *recursive |= spec.recursive;
            compiled.push(spec.pattern);
        }

        let mut watcher = create_watcher(tx, move |path| {
            compiled
                .iter()
                .any(|p| p.matches_path_with(path, match_options()))
        })?;

        for (root, recursive) in &roots {
            let mode = if *recursive {
                RecursiveMode::Recursive
            } else {
                RecursiveMode::NonRecursive
            };
            watcher.watch(root, mode)?;
            debug!(root = %root.display(), recursive, "Watching pattern root");
        }

        info!(patterns = %patterns.join(", "), "Watching include patterns");

        Ok(Self {
            _watcher: watcher,
            roots: roots.into_keys().collect(),
        })
    }

    /// 실제로 감시 중인 디렉토리 목록
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }
}

/// (정규화된 대상 경로, 실제 감시할 존재하는 디렉토리)
fn resolve_missing(dir: &Path) -> Result<(PathBuf, PathBuf)> {
    let mut root = dir.to_path_buf();
    let mut missing: Vec<std::ffi::OsString> = Vec::new();

    while !root.is_dir() {
        let name = root.file_name().map(|n| n.to_os_string());
        let parent = root.parent().map(|p| {
            if p.as_os_str().is_empty() {
                PathBuf::from(".")
            } else {
                p.to_path_buf()
            }
        });
        match (name, parent) {
            (Some(name), Some(parent)) => {
                missing.push(name);
                root = parent;
            }
            _ => {
                return Err(Error::Watch(format!(
                    "no existing parent for {}",
                    dir.display()
                )))
            }
        }
    }

    let root = root
        .canonicalize()
        .map_err(|e| Error::Watch(format!("failed to resolve {}: {}", root.display(), e)))?;
    let target = missing.iter().rev().fold(root.clone(), |acc, name| acc.join(name));
    Ok((target, root))
}

fn create_watcher<F>(tx: mpsc::UnboundedSender<WatchEvent>, accept: F) -> Result<RecommendedWatcher>
where
    F: Fn(&Path) -> bool + Send + 'static,
{
    let watcher = RecommendedWatcher::new(
        move |res: notify::Result<notify::Event>| match res {
            Ok(event) => {
                for ev in map_notify_event(&event) {
                    if accept(&ev.path) {
                        let _ = tx.send(ev);
                    }
                }
            }
            Err(e) => debug!("watch error: {}", e),
        },
        Config::default(),
    )?;
    Ok(watcher)
}

// ============================================================================
// Pattern 처리
// ============================================================================

/// 컴파일된 패턴과 감시 루트
struct PatternSpec {
    pattern: Pattern,
    root: PathBuf,
    recursive: bool,
}

impl PatternSpec {
    fn compile(raw: &str, base: &Path) -> Result<Self> {
        let raw_path = Path::new(raw);
        let pattern_str = if raw_path.is_absolute() {
            raw.to_string()
        } else {
            let escaped = Pattern::escape(&base.to_string_lossy());
            format!("{}{}{}", escaped, std::path::MAIN_SEPARATOR, raw)
        };

        let pattern = Pattern::new(&pattern_str)
            .map_err(|e| Error::Watch(format!("invalid pattern '{}': {}", raw, e)))?;

        let absolute = if raw_path.is_absolute() {
            raw_path.to_path_buf()
        } else {
            base.join(raw_path)
        };

        // 메타 문자가 나오기 전까지의 경로가 감시 루트
        let components: Vec<Component<'_>> = absolute.components().collect();
        let first_glob = components
            .iter()
            .position(|c| has_glob_meta(&c.as_os_str().to_string_lossy()));

        let (mut root, rest) = match first_glob {
            Some(idx) => (
                components[..idx].iter().collect::<PathBuf>(),
                components.len() - idx,
            ),
            None => (
                absolute.parent().map(Path::to_path_buf).unwrap_or_else(|| base.to_path_buf()),
                1,
            ),
        };
        let mut recursive = rest > 1 || raw.contains("**");

        // 아직 없는 디렉토리면 존재하는 상위 디렉토리를 재귀 감시
        while !root.exists() {
            match root.parent() {
                Some(parent) => {
                    root = parent.to_path_buf();
                    recursive = true;
                }
                None => break,
            }
        }

        Ok(Self {
            pattern,
            root,
            recursive,
        })
    }
}

fn has_glob_meta(s: &str) -> bool {
    s.contains(&['*', '?', '[', '{'][..])
}

fn match_options() -> MatchOptions {
    MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: false,
    }
}

/// notify 이벤트를 WatchEvent 목록으로 변환 (Access 등은 무시)
fn map_notify_event(event: &notify::Event) -> Vec<WatchEvent> {
    let kind = match &event.kind {
        EventKind::Create(_) => WatchEventKind::Add,
        EventKind::Modify(ModifyKind::Name(mode)) => match mode {
            RenameMode::To => WatchEventKind::Add,
            RenameMode::From => WatchEventKind::Remove,
            RenameMode::Both if event.paths.len() >= 2 => {
                return vec![
                    WatchEvent::new(WatchEventKind::Remove, event.paths[0].clone()),
                    WatchEvent::new(WatchEventKind::Add, event.paths[1].clone()),
                ];
            }
            _ => WatchEventKind::Change,
        },
        EventKind::Modify(_) => WatchEventKind::Change,
        EventKind::Remove(_) => WatchEventKind::Remove,
        _ => return Vec::new(),
    };

    event
        .paths
        .iter()
        .map(|p| WatchEvent::new(kind, p.clone()))
        .collect()
}
