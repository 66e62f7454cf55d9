//! 工具调用模块
//!
//! 把外部 agent 的工具调用（工具名 + JSON 参数）映射到沙箱文件操作：
//! - definitions：工具定义和输入 JSON Schema
//! - dispatcher：参数解析、调用分发、结果/错误序列化

pub mod definitions;
pub mod dispatcher;

use serde::{Deserialize, Serialize};

pub use definitions::{tool_definitions, ToolDefinition};
pub use dispatcher::{ToolDispatcher, ToolError, ToolErrorBody, ToolResponse};

/// 对外暴露的工具名
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    ListFiles,
    ReadFile,
    WriteFile,
    CreateDirectory,
    DeleteFile,
}

impl ToolName {
    /// 全部工具，按 `tools/list` 的返回顺序
    pub const ALL: [ToolName; 5] = [
        ToolName::ListFiles,
        ToolName::ReadFile,
        ToolName::WriteFile,
        ToolName::CreateDirectory,
        ToolName::DeleteFile,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::ListFiles => "list_files",
            ToolName::ReadFile => "read_file",
            ToolName::WriteFile => "write_file",
            ToolName::CreateDirectory => "create_directory",
            ToolName::DeleteFile => "delete_file",
        }
    }

    /// 按名称查找工具，未知名称返回 None
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.as_str() == name)
    }
}

impl std::fmt::Display for ToolName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
