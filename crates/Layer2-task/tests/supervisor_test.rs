//! Supervisor 통합 테스트 - 실제 sh 자식 프로세스로 재시작 흐름 검증
//!
//! `cargo test -p hotmcp-task --test supervisor_test -- --nocapture`

#![cfg(unix)]

use hotmcp_foundation::{Error, RestartConfig};
use hotmcp_task::{
    ChildCommand, DirtySource, RestartSupervisor, SupervisorConfig, SupervisorEvent,
};
use std::path::Path;
use std::time::Duration;
use tempfile::tempdir;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;

const WAIT: Duration = Duration::from_secs(10);

/// 실행 중인 슈퍼바이저 (테스트 핸들)
struct Running {
    events: broadcast::Receiver<SupervisorEvent>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<hotmcp_foundation::Result<i32>>,
}

impl Running {
    fn start(config: SupervisorConfig) -> Self {
        let mut supervisor = RestartSupervisor::new(config);
        let events = supervisor.subscribe();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            supervisor
                .run(async move {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        Self {
            events,
            shutdown: Some(shutdown_tx),
            handle,
        }
    }

    async fn next(&mut self) -> SupervisorEvent {
        let event = tokio::time::timeout(WAIT, self.events.recv())
            .await
            .expect("timed out waiting for supervisor event")
            .expect("event channel closed");
        println!("event: {:?}", event);
        event
    }

    /// 해당 세대의 Spawned까지 읽고, 그 사이 이벤트를 반환
    async fn until_spawned(&mut self, generation: u64) -> (u32, Vec<SupervisorEvent>) {
        let mut seen = Vec::new();
        loop {
            match self.next().await {
                SupervisorEvent::Spawned { pid, generation: g } if g == generation => {
                    return (pid, seen)
                }
                other => seen.push(other),
            }
        }
    }

    /// 주어진 시간 동안 추가 Spawned가 없어야 함
    async fn assert_no_respawn(&mut self, quiet: Duration) {
        let respawned = tokio::time::timeout(quiet, async {
            loop {
                if let Ok(SupervisorEvent::Spawned { generation, .. }) = self.events.recv().await {
                    return generation;
                }
            }
        })
        .await;
        assert!(respawned.is_err(), "unexpected restart: {:?}", respawned);
    }

    async fn shutdown(mut self) -> i32 {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        tokio::time::timeout(WAIT, self.handle)
            .await
            .expect("supervisor did not stop")
            .unwrap()
            .unwrap()
    }

    async fn exit_code(self) -> i32 {
        let Running { handle, shutdown, .. } = self;
        let code = tokio::time::timeout(WAIT, handle)
            .await
            .expect("supervisor did not exit")
            .unwrap()
            .unwrap();
        drop(shutdown);
        code
    }
}

fn sh_config(dir: &Path, script: &str) -> SupervisorConfig {
    SupervisorConfig::new(
        ChildCommand::new("sh", vec!["-c".to_string(), script.to_string()]),
        dir,
    )
    .with_restart(RestartConfig {
        debounce_ms: 200,
        grace_timeout_ms: 2000,
    })
}

#[tokio::test]
async fn test_double_marker_restarts_once() {
    let dir = tempdir().unwrap();
    // 첫 세대만 마커를 두 번 출력
    let script = "if [ ! -f guard ]; then touch guard; \
                  echo 'a.conf changed, marking server as dirty' >&2; \
                  echo 'b.conf changed, marking server as dirty' >&2; \
                  fi; exec sleep 30";

    let mut running = Running::start(sh_config(dir.path(), script));
    running.until_spawned(1).await;

    let (_, between) = running.until_spawned(2).await;
    let detected = between
        .iter()
        .filter(|e| matches!(e, SupervisorEvent::DirtyDetected { source: DirtySource::Marker(_) }))
        .count();
    let scheduled = between
        .iter()
        .filter(|e| matches!(e, SupervisorEvent::RestartScheduled))
        .count();
    assert_eq!(detected, 1);
    assert_eq!(scheduled, 1);

    running.assert_no_respawn(Duration::from_millis(800)).await;
    assert_eq!(running.shutdown().await, 0);
}

#[tokio::test]
async fn test_force_kill_when_child_ignores_sigterm() {
    let dir = tempdir().unwrap();
    let script = "if [ ! -f guard ]; then touch guard; trap '' TERM; \
                  echo 'x marking server as dirty' >&2; \
                  fi; exec sleep 30";

    let mut config = sh_config(dir.path(), script);
    config.restart.grace_timeout_ms = 300;

    let mut running = Running::start(config);
    let (first_pid, _) = running.until_spawned(1).await;

    let (second_pid, between) = running.until_spawned(2).await;
    assert!(between.contains(&SupervisorEvent::ForceKilled { pid: first_pid }));
    assert_ne!(first_pid, second_pid);

    assert_eq!(running.shutdown().await, 0);
}

#[tokio::test]
async fn test_include_edit_restarts_once() {
    let dir = tempdir().unwrap();
    let config = sh_config(dir.path(), "exec sleep 30").with_include(vec!["*.conf".to_string()]);

    let mut running = Running::start(config);
    let (first_pid, _) = running.until_spawned(1).await;

    std::fs::write(dir.path().join("app.conf"), "level = 2").unwrap();

    let (second_pid, between) = running.until_spawned(2).await;
    assert!(between.iter().any(|e| matches!(
        e,
        SupervisorEvent::DirtyDetected { source: DirtySource::Include(path) }
            if path.ends_with("app.conf")
    )));
    assert_ne!(first_pid, second_pid);

    running.assert_no_respawn(Duration::from_millis(800)).await;
    assert_eq!(running.shutdown().await, 0);
}

#[tokio::test]
async fn test_unsolicited_exit_propagates_code() {
    let dir = tempdir().unwrap();
    let mut running = Running::start(sh_config(dir.path(), "exit 3"));

    running.until_spawned(1).await;
    assert_eq!(running.next().await, SupervisorEvent::ChildExited { code: 3 });
    assert_eq!(running.next().await, SupervisorEvent::Stopped);
    assert_eq!(running.exit_code().await, 3);
}

#[tokio::test]
async fn test_signal_exit_maps_to_128_plus_signal() {
    let dir = tempdir().unwrap();
    let running = Running::start(sh_config(dir.path(), "kill -9 $$"));
    assert_eq!(running.exit_code().await, 137);
}

#[tokio::test]
async fn test_spawn_failure_is_error() {
    let dir = tempdir().unwrap();
    let config = SupervisorConfig::new(
        ChildCommand::new("/nonexistent/hotmcp-missing-binary", Vec::new()),
        dir.path(),
    );

    let mut supervisor = RestartSupervisor::new(config);
    let result = supervisor.run(std::future::pending()).await;
    assert!(matches!(result, Err(Error::Process(_))));
}

#[tokio::test]
async fn test_shutdown_stops_stubborn_child() {
    let dir = tempdir().unwrap();
    let mut config = sh_config(dir.path(), "trap '' TERM; exec sleep 30");
    config.restart.grace_timeout_ms = 300;

    let mut running = Running::start(config);
    running.until_spawned(1).await;

    let mut events = running.events.resubscribe();
    assert_eq!(running.shutdown().await, 0);
    assert_eq!(events.recv().await.unwrap(), SupervisorEvent::Stopped);
}

#[tokio::test]
async fn test_shutdown_during_restart_skips_respawn() {
    let dir = tempdir().unwrap();
    let script = "if [ ! -f guard ]; then touch guard; trap '' TERM; \
                  echo 'x marking server as dirty' >&2; \
                  fi; exec sleep 30";

    let mut config = sh_config(dir.path(), script);
    config.restart.debounce_ms = 100;
    config.restart.grace_timeout_ms = 1500;

    let mut running = Running::start(config);
    let (first_pid, _) = running.until_spawned(1).await;
    loop {
        if running.next().await == SupervisorEvent::RestartScheduled {
            break;
        }
    }

    // debounce가 지나 첫 자식의 유예 시간 대기 중일 때 종료 요청
    tokio::time::sleep(Duration::from_millis(400)).await;
    let mut events = running.events.resubscribe();
    assert_eq!(running.shutdown().await, 0);

    let mut after = Vec::new();
    loop {
        let event = events.recv().await.unwrap();
        after.push(event.clone());
        if event == SupervisorEvent::Stopped {
            break;
        }
    }
    assert!(after.contains(&SupervisorEvent::ForceKilled { pid: first_pid }));
    assert!(
        !after.iter().any(|e| matches!(e, SupervisorEvent::Spawned { .. })),
        "replacement child spawned after shutdown: {:?}",
        after
    );
}
