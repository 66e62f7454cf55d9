//! 工具定义
//!
//! `tools/list` 返回的工具描述，`input_schema` 是 JSON Schema

use serde::Serialize;
use serde_json::{json, Value};

use crate::tools::ToolName;

/// 单个工具的定义
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

/// 所有工具的定义
pub fn tool_definitions() -> Vec<ToolDefinition> {
    ToolName::ALL.into_iter().map(definition).collect()
}

fn definition(tool: ToolName) -> ToolDefinition {
    let (description, schema) = match tool {
        ToolName::ListFiles => (
            "List files and directories in a given path",
            path_schema("Directory path to list (relative to sandbox, defaults to '.')", false),
        ),
        ToolName::ReadFile => (
            "Read the contents of a UTF-8 text file",
            path_schema("File path to read (relative to sandbox)", true),
        ),
        ToolName::WriteFile => (
            "Write content to a file, creating parent directories and replacing any existing file",
            json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "File path to write (relative to sandbox)"
                    },
                    "content": {
                        "type": "string",
                        "description": "Content to write to the file"
                    }
                },
                "required": ["path", "content"]
            }),
        ),
        ToolName::CreateDirectory => (
            "Create a directory and any missing parents; succeeds if it already exists",
            path_schema("Directory path to create (relative to sandbox)", true),
        ),
        ToolName::DeleteFile => (
            "Delete a file or an empty directory",
            path_schema("File or directory path to delete (relative to sandbox)", true),
        ),
    };

    ToolDefinition {
        name: tool.as_str(),
        description,
        input_schema: schema,
    }
}

fn path_schema(description: &str, required: bool) -> Value {
    let required: Vec<&str> = if required { vec!["path"] } else { Vec::new() };
    json!({
        "type": "object",
        "properties": {
            "path": {
                "type": "string",
                "description": description
            }
        },
        "required": required
    })
}
