//! fs-sandbox 库入口
//!
//! 为 AI 代理提供限制在单个根目录内的文件操作，并通过 MCP 工具暴露。
//!
//! # 使用示例
//! ```rust,no_run
//! use fs_sandbox::sandbox::{SandboxService, SandboxSettings};
//! use fs_sandbox::tools::ToolDispatcher;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let service = SandboxService::from_settings(&SandboxSettings::default())?;
//! let dispatcher = ToolDispatcher::new(service);
//! let response = dispatcher
//!     .call("list_files", serde_json::json!({ "path": "." }))
//!     .await;
//! println!("{}", response.to_text());
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod infra;
pub mod mcp;
pub mod service;
pub mod tools;

/// Sandbox 沙箱模块
///
/// 路径解析、策略检查和文件操作
pub mod sandbox;
