//! MCP 传输层
//!
//! 基于 JSON-RPC 2.0 的 stdio 服务器，把 `tools/call` 转发给 [`crate::tools::ToolDispatcher`]

pub mod protocol;
pub mod server;

pub use server::{McpServer, ServerInfo};
