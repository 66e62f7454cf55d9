//! MCP 会话测试
//!
//! 模拟一个 agent 客户端：握手、列出工具、依次调用每个工具

use fs_sandbox::mcp::{McpServer, ServerInfo};
use fs_sandbox::sandbox::{SandboxService, SandboxSettings};
use fs_sandbox::tools::ToolDispatcher;
use serde_json::{json, Value};
use tempfile::TempDir;

fn request(id: u64, method: &str, params: Value) -> String {
    json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params }).to_string()
}

fn tool_call(id: u64, name: &str, arguments: Value) -> String {
    request(id, "tools/call", json!({ "name": name, "arguments": arguments }))
}

fn create_server(root: &std::path::Path, read_only: bool) -> McpServer {
    let service = SandboxService::from_settings(&SandboxSettings {
        root: root.to_path_buf(),
        read_only,
        ..Default::default()
    })
    .unwrap();
    let info = ServerInfo {
        name: "file-server".to_string(),
        version: "1.0.0".to_string(),
        instructions: Some("Sandboxed file access".to_string()),
    };
    McpServer::new(ToolDispatcher::new(service), info)
}

async fn run_raw(server: &McpServer, input: &[u8]) -> Vec<Value> {
    let mut output = Vec::new();
    server.run(input, &mut output).await.unwrap();

    String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

async fn run_session(root: &std::path::Path, read_only: bool, lines: &[String]) -> Vec<Value> {
    let server = create_server(root, read_only);
    let input = lines.join("\n") + "\n";
    run_raw(&server, input.as_bytes()).await
}

#[tokio::test]
async fn test_full_session() {
    let temp = TempDir::new().unwrap();

    let lines = vec![
        request(1, "initialize", json!({ "protocolVersion": "2024-11-05", "capabilities": {} })),
        json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }).to_string(),
        request(2, "tools/list", json!({})),
        tool_call(3, "create_directory", json!({ "path": "docs" })),
        tool_call(4, "write_file", json!({ "path": "docs/readme.md", "content": "hello" })),
        tool_call(5, "read_file", json!({ "path": "docs/readme.md" })),
        tool_call(6, "list_files", json!({ "path": "docs" })),
        tool_call(7, "delete_file", json!({ "path": "docs/readme.md" })),
        tool_call(8, "delete_file", json!({ "path": "docs" })),
    ];
    let responses = run_session(temp.path(), false, &lines).await;

    // 通知没有响应
    assert_eq!(responses.len(), 8);
    let ids: Vec<_> = responses.iter().map(|r| r["id"].as_u64().unwrap()).collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5, 6, 7, 8]);

    assert_eq!(responses[0]["result"]["serverInfo"]["name"], "file-server");
    assert_eq!(responses[0]["result"]["instructions"], "Sandboxed file access");

    let names: Vec<_> = responses[1]["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(
        names,
        vec!["list_files", "read_file", "write_file", "create_directory", "delete_file"]
    );

    for response in &responses[2..] {
        assert_eq!(response["result"]["isError"], false, "{response}");
    }
    assert_eq!(responses[4]["result"]["content"][0]["text"], "hello");

    let entries = &responses[5]["result"]["structuredContent"]["result"]["entries"];
    assert_eq!(entries[0]["name"], "readme.md");
    assert_eq!(entries[0]["type"], "file");
    assert_eq!(entries[0]["size_bytes"], 5);

    assert!(!temp.path().join("docs").exists());
}

#[tokio::test]
async fn test_tool_failures_are_results() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("keep.txt"), "data").unwrap();

    let lines = vec![
        tool_call(1, "write_file", json!({ "path": "keep.txt", "content": "x" })),
        tool_call(2, "read_file", json!({ "path": "../outside.txt" })),
        tool_call(3, "rename_file", json!({ "path": "keep.txt" })),
        tool_call(4, "read_file", json!({})),
        tool_call(5, "read_file", json!({ "path": "keep.txt" })),
    ];
    let responses = run_session(temp.path(), true, &lines).await;
    assert_eq!(responses.len(), 5);

    let kinds: Vec<_> = responses[..4]
        .iter()
        .map(|r| {
            assert!(r.get("error").is_none());
            assert_eq!(r["result"]["isError"], true);
            r["result"]["structuredContent"]["error"]["kind"]
                .as_str()
                .unwrap()
                .to_string()
        })
        .collect();
    assert_eq!(
        kinds,
        vec!["read_only", "outside_sandbox", "unknown_tool", "invalid_arguments"]
    );

    // 失败不影响后续调用
    assert_eq!(responses[4]["result"]["isError"], false);
    assert_eq!(responses[4]["result"]["content"][0]["text"], "data");
    assert_eq!(
        std::fs::read_to_string(temp.path().join("keep.txt")).unwrap(),
        "data"
    );
}

#[tokio::test]
async fn test_non_utf8_input_keeps_serving() {
    let temp = TempDir::new().unwrap();
    let server = create_server(temp.path(), false);

    let mut input = b"\xff\xfe garbage\n".to_vec();
    input.extend_from_slice(request(1, "ping", json!({})).as_bytes());
    input.push(b'\n');
    input.extend_from_slice(b"{\"path\": \"\xc3\x28\"}\n");
    let write = tool_call(2, "write_file", json!({ "path": "ok.txt", "content": "ok" }));
    input.extend_from_slice(write.as_bytes());
    input.push(b'\n');

    let responses = run_raw(&server, &input).await;

    assert_eq!(responses.len(), 4);
    assert_eq!(responses[0]["error"]["code"], -32700);
    assert_eq!(responses[1]["id"], 1);
    assert!(responses[1]["result"].is_object());
    assert_eq!(responses[2]["error"]["code"], -32700);
    assert_eq!(responses[3]["id"], 2);
    assert_eq!(responses[3]["result"]["isError"], false);
    assert_eq!(
        std::fs::read_to_string(temp.path().join("ok.txt")).unwrap(),
        "ok"
    );
}
