//! 工具调用分发器
//!
//! 负责：
//! 1. 根据工具名和 JSON 参数构造 [`OperationRequest`]
//! 2. 调用 [`SandboxService`] 执行
//! 3. 把结果或错误转换为结构化的 [`ToolResponse`]
//!
//! 任何失败都以 `ToolResponse::Failure` 返回，不会 panic，也不会影响后续调用
//!
//! # 使用示例
//! ```rust,ignore
//! let dispatcher = ToolDispatcher::new(service);
//!
//! let response = dispatcher
//!     .call("write_file", json!({"path": "a.txt", "content": "hi"}))
//!     .await;
//! assert!(!response.is_error());
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::sandbox::{ErrorKind, OperationRequest, OperationResult, SandboxError, SandboxService};
use crate::tools::ToolName;

/// 工具调用错误
#[derive(Error, Debug)]
pub enum ToolError {
    /// 未知的工具名
    #[error("未知工具: {name}")]
    UnknownTool {
        /// 调用方传入的工具名
        name: String,
    },

    /// 参数缺失或类型错误
    #[error("工具 {tool} 参数错误: {message}")]
    InvalidArguments {
        /// 工具名
        tool: ToolName,
        /// 错误描述
        message: String,
    },

    /// 沙箱操作失败
    #[error(transparent)]
    Sandbox(#[from] SandboxError),
}

impl ToolError {
    /// 错误类别
    pub fn kind(&self) -> ErrorKind {
        match self {
            ToolError::UnknownTool { .. } => ErrorKind::UnknownTool,
            ToolError::InvalidArguments { .. } => ErrorKind::InvalidArguments,
            ToolError::Sandbox(e) => e.kind(),
        }
    }
}

/// 返回给调用方的错误结构
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolErrorBody {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&ToolError> for ToolErrorBody {
    fn from(e: &ToolError) -> Self {
        Self {
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

/// 工具调用结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolResponse {
    Success(OperationResult),
    Failure(ToolErrorBody),
}

impl ToolResponse {
    pub fn is_error(&self) -> bool {
        matches!(self, ToolResponse::Failure(_))
    }

    /// 面向 agent 的文本形式
    pub fn to_text(&self) -> String {
        match self {
            ToolResponse::Success(result) => result.to_text(),
            ToolResponse::Failure(error) => format!("Error: {}", error.message),
        }
    }

    /// 结构化 JSON 形式
    ///
    /// 成功：`{"ok": true, "result": ...}`；失败：`{"ok": false, "error": {"kind", "message"}}`
    pub fn to_json(&self) -> Value {
        match self {
            ToolResponse::Success(result) => json!({ "ok": true, "result": result }),
            ToolResponse::Failure(error) => json!({ "ok": false, "error": error }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ListArgs {
    #[serde(default = "default_list_path")]
    path: String,
}

fn default_list_path() -> String {
    ".".to_string()
}

#[derive(Debug, Deserialize)]
struct PathArgs {
    path: String,
}

#[derive(Debug, Deserialize)]
struct WriteArgs {
    path: String,
    content: String,
}

/// 工具调用分发器
#[derive(Debug, Clone)]
pub struct ToolDispatcher {
    service: SandboxService,
}

impl ToolDispatcher {
    /// 创建分发器
    pub fn new(service: SandboxService) -> Self {
        Self { service }
    }

    /// 底层沙箱服务
    pub fn service(&self) -> &SandboxService {
        &self.service
    }

    /// 执行一次工具调用
    ///
    /// # 参数说明
    /// * `name` - 工具名，如 `read_file`
    /// * `arguments` - JSON 参数对象，`null` 视为空对象
    pub async fn call(&self, name: &str, arguments: Value) -> ToolResponse {
        debug!(tool = name, "收到工具调用");

        match self.try_call(name, arguments).await {
            Ok(result) => {
                info!(tool = name, "工具调用成功");
                ToolResponse::Success(result)
            }
            Err(e) => {
                if let ToolError::Sandbox(sandbox_err) = &e {
                    if sandbox_err.is_security_error() {
                        warn!(
                            tool = name,
                            level = sandbox_err.security_level(),
                            kind = %sandbox_err.kind(),
                            error = %sandbox_err,
                            "安全策略拒绝了工具调用"
                        );
                    } else {
                        info!(tool = name, kind = %sandbox_err.kind(), error = %sandbox_err, "工具调用失败");
                    }
                } else {
                    warn!(tool = name, error = %e, "工具调用无效");
                }
                ToolResponse::Failure(ToolErrorBody::from(&e))
            }
        }
    }

    async fn try_call(&self, name: &str, arguments: Value) -> Result<OperationResult, ToolError> {
        let request = parse_request(name, arguments)?;
        debug!(
            tool = name,
            operation = %request.kind(),
            path = request.path(),
            "执行沙箱操作"
        );
        Ok(self.service.execute(request).await?)
    }
}

/// 把工具名和参数解析为操作请求
pub fn parse_request(name: &str, arguments: Value) -> Result<OperationRequest, ToolError> {
    let tool = ToolName::parse(name).ok_or_else(|| ToolError::UnknownTool {
        name: name.to_string(),
    })?;

    let arguments = match arguments {
        Value::Null => Value::Object(Default::default()),
        other => other,
    };

    let invalid = |e: serde_json::Error| ToolError::InvalidArguments {
        tool,
        message: e.to_string(),
    };

    let request = match tool {
        ToolName::ListFiles => {
            let args: ListArgs = serde_json::from_value(arguments).map_err(invalid)?;
            OperationRequest::List { path: args.path }
        }
        ToolName::ReadFile => {
            let args: PathArgs = serde_json::from_value(arguments).map_err(invalid)?;
            OperationRequest::Read { path: args.path }
        }
        ToolName::WriteFile => {
            let args: WriteArgs = serde_json::from_value(arguments).map_err(invalid)?;
            OperationRequest::Write {
                path: args.path,
                content: args.content,
            }
        }
        ToolName::CreateDirectory => {
            let args: PathArgs = serde_json::from_value(arguments).map_err(invalid)?;
            OperationRequest::Mkdir { path: args.path }
        }
        ToolName::DeleteFile => {
            let args: PathArgs = serde_json::from_value(arguments).map_err(invalid)?;
            OperationRequest::Delete { path: args.path }
        }
    };

    Ok(request)
}
