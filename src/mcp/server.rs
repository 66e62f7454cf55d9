//! MCP stdio 服务器
//!
//! 从 stdin 按行读取 JSON-RPC 消息，处理后把响应按行写到 stdout。
//! 日志只写 stderr，stdout 专用于协议消息
//!
//! 支持的方法：
//! - `initialize`
//! - `ping`
//! - `tools/list`
//! - `tools/call`
//! - `notifications/*`（不响应）

use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use crate::mcp::protocol::{self, RpcError, PROTOCOL_VERSION};
use crate::tools::{tool_definitions, ToolDispatcher};

/// 服务器自描述信息，在 `initialize` 中返回
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
    pub instructions: Option<String>,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            instructions: None,
        }
    }
}

/// MCP 服务器
#[derive(Debug, Clone)]
pub struct McpServer {
    dispatcher: ToolDispatcher,
    info: ServerInfo,
}

impl McpServer {
    pub fn new(dispatcher: ToolDispatcher, info: ServerInfo) -> Self {
        Self { dispatcher, info }
    }

    /// 在 stdin/stdout 上运行，直到 stdin 关闭
    pub async fn serve_stdio(&self) -> std::io::Result<()> {
        self.run(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .await
    }

    /// 在任意读写流上运行，直到读到 EOF
    ///
    /// 单条消息处理失败只会产生一条错误响应，不会中断循环
    pub async fn run<R, W>(&self, mut reader: R, mut writer: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!(name = %self.info.name, version = %self.info.version, "MCP 服务器开始监听 stdio");

        let mut buffer = Vec::new();
        loop {
            buffer.clear();
            if reader.read_until(b'\n', &mut buffer).await? == 0 {
                break;
            }

            // 非 UTF-8 的行按解析错误回复，不中断循环
            let response = match std::str::from_utf8(&buffer) {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    self.process_message(line).await
                }
                Err(e) => {
                    warn!(error = %e, "收到非 UTF-8 消息");
                    Some(RpcError::parse_error(format!("Invalid UTF-8: {e}")).to_json(None))
                }
            };

            if let Some(response) = response {
                let mut encoded = response.to_string();
                encoded.push('\n');
                writer.write_all(encoded.as_bytes()).await?;
                writer.flush().await?;
            }
        }

        info!("stdin 已关闭，MCP 服务器退出");
        Ok(())
    }

    /// 处理一条 JSON-RPC 消息
    ///
    /// 通知和客户端发来的响应不需要回复，返回 None
    pub async fn process_message(&self, message: &str) -> Option<Value> {
        let request: Value = match serde_json::from_str(message) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "无法解析 JSON-RPC 消息");
                return Some(RpcError::parse_error(format!("Invalid JSON: {e}")).to_json(None));
            }
        };

        let Some(object) = request.as_object() else {
            return Some(RpcError::invalid_request("Request must be a JSON object").to_json(None));
        };

        let id = object.get("id").cloned();
        let Some(method) = object.get("method").and_then(Value::as_str) else {
            // 客户端对我们请求的响应，忽略
            if object.contains_key("result") || object.contains_key("error") {
                return None;
            }
            return Some(RpcError::invalid_request("Missing method").to_json(id));
        };

        let params = object.get("params").cloned().unwrap_or(Value::Null);

        let Some(id) = id else {
            debug!(method = method, "收到通知");
            return None;
        };

        debug!(method = method, "处理 JSON-RPC 请求");

        match self.call_method(method, params).await {
            Ok(result) => Some(protocol::success(id, result)),
            Err(e) => Some(e.to_json(Some(id))),
        }
    }

    async fn call_method(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        match method {
            "initialize" => Ok(self.initialize_result()),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({ "tools": tool_definitions() })),
            "tools/call" => self.call_tool(params).await,
            _ => Err(RpcError::method_not_found(method)),
        }
    }

    fn initialize_result(&self) -> Value {
        let mut result = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "tools": { "listChanged": false }
            },
            "serverInfo": {
                "name": self.info.name,
                "version": self.info.version,
            },
        });
        if let Some(instructions) = &self.info.instructions {
            result["instructions"] = json!(instructions);
        }
        result
    }

    async fn call_tool(&self, params: Value) -> Result<Value, RpcError> {
        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| RpcError::invalid_params("tools/call requires a string 'name'"))?;
        let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);

        let response = self.dispatcher.call(name, arguments).await;

        Ok(json!({
            "content": [
                { "type": "text", "text": response.to_text() }
            ],
            "structuredContent": response.to_json(),
            "isError": response.is_error(),
        }))
    }
}
