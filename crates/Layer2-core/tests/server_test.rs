//! HotReloadServer 통합 테스트 - 실제 파일 감시 + JSON-RPC 스트림
//!
//! `cargo test -p hotmcp-core --test server_test`

use hotmcp_core::mcp::{SERVER_DIRTY, TOOLS_LIST_CHANGED};
use hotmcp_core::HotReloadServer;
use hotmcp_foundation::HotReloadConfig;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines, ReadHalf, WriteHalf};

const WAIT: Duration = Duration::from_secs(10);

/// 테스트용 MCP 클라이언트 (duplex 스트림 한쪽)
struct Client {
    lines: Lines<BufReader<ReadHalf<DuplexStream>>>,
    writer: WriteHalf<DuplexStream>,
}

impl Client {
    fn start(server: Arc<HotReloadServer>) -> Self {
        let (client_io, server_io) = tokio::io::duplex(64 * 1024);
        let (server_read, server_write) = tokio::io::split(server_io);
        tokio::spawn(async move {
            server.run(server_read, server_write).await.unwrap();
        });

        let (read, writer) = tokio::io::split(client_io);
        Self {
            lines: BufReader::new(read).lines(),
            writer,
        }
    }

    async fn send(&mut self, message: Value) {
        let mut line = message.to_string();
        line.push('\n');
        self.writer.write_all(line.as_bytes()).await.unwrap();
        self.writer.flush().await.unwrap();
    }

    async fn next(&mut self) -> Value {
        let line = tokio::time::timeout(WAIT, self.lines.next_line())
            .await
            .expect("timed out waiting for server output")
            .unwrap()
            .expect("server closed the stream");
        serde_json::from_str(&line).unwrap()
    }

    /// 원하는 method의 알림이 올 때까지 읽기 (다른 메시지는 건너뜀)
    async fn wait_for_notification(&mut self, method: &str) -> Value {
        loop {
            let message = self.next().await;
            println!("<- {}", message);
            if message["method"] == method {
                return message;
            }
        }
    }

    /// id에 해당하는 응답이 올 때까지 읽기
    async fn wait_for_response(&mut self, id: i64) -> Value {
        loop {
            let message = self.next().await;
            println!("<- {}", message);
            if message["id"] == id {
                return message;
            }
        }
    }

    async fn initialize(&mut self) {
        self.send(json!({ "jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {} }))
            .await;
        let response = self.wait_for_response(1).await;
        assert_eq!(response["result"]["protocolVersion"], "2024-11-05");
        assert_eq!(response["result"]["capabilities"]["tools"]["listChanged"], true);
    }
}

fn write_tool(dir: &Path, file: &str, name: &str) {
    std::fs::write(
        dir.join(file),
        json!({
            "name": name,
            "handler": { "type": "template", "template": format!("{} ok", name) }
        })
        .to_string(),
    )
    .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_initialize_list_and_call() {
    let base = tempdir().unwrap();
    let tools = base.path().join("tools");
    std::fs::create_dir(&tools).unwrap();
    write_tool(&tools, "echo.json", "echo");

    let server = Arc::new(HotReloadServer::with_base_dir(
        HotReloadConfig::default().tools_dir("tools"),
        base.path(),
    ));
    let mut client = Client::start(server);
    client.initialize().await;

    client
        .send(json!({ "jsonrpc": "2.0", "id": 2, "method": "tools/list" }))
        .await;
    let listed = client.wait_for_response(2).await;
    assert_eq!(listed["result"]["tools"][0]["name"], "echo");
    assert_eq!(listed["result"]["tools"][0]["description"], "No description");

    client
        .send(json!({
            "jsonrpc": "2.0", "id": 3, "method": "tools/call",
            "params": { "name": "echo", "arguments": {} }
        }))
        .await;
    let called = client.wait_for_response(3).await;
    assert_eq!(called["result"]["content"][0]["text"], "echo ok");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_file_removal_sends_list_changed() {
    let base = tempdir().unwrap();
    let tools = base.path().join("tools");
    std::fs::create_dir(&tools).unwrap();
    write_tool(&tools, "echo.json", "echo");
    write_tool(&tools, "time.json", "time");

    let server = Arc::new(HotReloadServer::with_base_dir(
        HotReloadConfig::default().tools_dir("tools"),
        base.path(),
    ));
    let mut client = Client::start(Arc::clone(&server));
    client.initialize().await;

    std::fs::remove_file(tools.join("time.json")).unwrap();
    client.wait_for_notification(TOOLS_LIST_CHANGED).await;

    assert!(server.registry().contains("echo"));
    assert!(!server.registry().contains("time"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_include_change_marks_dirty() {
    let base = tempdir().unwrap();
    std::fs::create_dir(base.path().join("tools")).unwrap();
    write_tool(&base.path().join("tools"), "echo.json", "echo");

    let server = Arc::new(HotReloadServer::with_base_dir(
        HotReloadConfig::default().tools_dir("tools").include("*.conf"),
        base.path(),
    ));
    let mut client = Client::start(Arc::clone(&server));
    client.initialize().await;
    assert!(!server.dirty().is_dirty());

    std::fs::write(base.path().join("app.conf"), "level = 1").unwrap();
    let notice = client.wait_for_notification(SERVER_DIRTY).await;
    assert_eq!(notice["params"]["path"], "app.conf");
    assert_eq!(notice["params"]["message"], "Server restart required");
    assert!(server.dirty().is_dirty());

    // include 변경은 reload를 일으키지 않음
    assert_eq!(server.registry().snapshot().generation, 1);

    // dirty 상태의 목록 요청은 재시작 필요 알림을 함께 보냄
    client
        .send(json!({ "jsonrpc": "2.0", "id": 2, "method": "tools/list" }))
        .await;
    let pending = "Server restart required due to include pattern file changes";
    loop {
        let notice = client.wait_for_notification(SERVER_DIRTY).await;
        // 같은 파일의 후속 include 이벤트가 먼저 올 수 있음
        if notice["params"]["message"] == pending {
            break;
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tools_dir_created_after_start_is_loaded() {
    let base = tempdir().unwrap();
    let server = HotReloadServer::with_base_dir(
        HotReloadConfig::default().tools_dir("tools"),
        base.path(),
    );

    let _watch = server.start().await.unwrap();
    assert!(server.registry().snapshot().is_empty());
    tokio::time::sleep(Duration::from_millis(100)).await;

    let tools = base.path().join("tools");
    std::fs::create_dir(&tools).unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    write_tool(&tools, "echo.json", "echo");

    tokio::time::timeout(WAIT, async {
        while !server.registry().contains("echo") {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await
    .expect("tool in newly created directory was not loaded");
}
