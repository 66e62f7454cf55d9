//! Sandbox 模块错误定义
//!
//! 定义沙箱环境相关的错误类型，使用 thiserror 进行错误定义
//!
//! 错误分三层：
//! - [`PathError`]：路径解析失败（无效路径、越界）
//! - [`PolicyError`]：策略检查失败（只读、扩展名、大小、非空目录）
//! - [`SandboxError`]：文件操作层的统一错误，包含以上两类
//!
//! 所有错误消息只引用调用方传入的路径或沙箱内的相对路径，
//! 不会泄露沙箱外的绝对路径
//!
//! # 使用示例
//! ```rust,ignore
//! use fs_sandbox::sandbox::{PathError, SandboxError};
//!
//! match result {
//!     Ok(_) => println!("操作成功"),
//!     Err(SandboxError::Path(PathError::OutsideSandbox { path })) => {
//!         println!("检测到路径越界: {}", path);
//!     }
//!     Err(e) => println!("其他错误: {}", e),
//! }
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sandbox::types::{format_size, OperationKind};

/// 错误类别
///
/// 稳定的机器可读错误码，随错误一起返回给调用方
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidPath,
    OutsideSandbox,
    NotFound,
    NotADirectory,
    NotAFile,
    AlreadyExistsNotADirectory,
    NotTextFile,
    ReadOnly,
    ExtensionNotAllowed,
    TooLarge,
    DirectoryNotEmpty,
    RootProtected,
    IoError,
    UnknownTool,
    InvalidArguments,
}

impl ErrorKind {
    /// snake_case 形式的错误码
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidPath => "invalid_path",
            ErrorKind::OutsideSandbox => "outside_sandbox",
            ErrorKind::NotFound => "not_found",
            ErrorKind::NotADirectory => "not_a_directory",
            ErrorKind::NotAFile => "not_a_file",
            ErrorKind::AlreadyExistsNotADirectory => "already_exists_not_a_directory",
            ErrorKind::NotTextFile => "not_text_file",
            ErrorKind::ReadOnly => "read_only",
            ErrorKind::ExtensionNotAllowed => "extension_not_allowed",
            ErrorKind::TooLarge => "too_large",
            ErrorKind::DirectoryNotEmpty => "directory_not_empty",
            ErrorKind::RootProtected => "root_protected",
            ErrorKind::IoError => "io_error",
            ErrorKind::UnknownTool => "unknown_tool",
            ErrorKind::InvalidArguments => "invalid_arguments",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn human_size(bytes: &u64) -> String {
    format_size(*bytes)
}

/// 路径解析错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    /// 路径为空、格式错误或无法规范化
    #[error("无效路径 '{path}': {reason}")]
    InvalidPath {
        /// 调用方传入的路径
        path: String,
        /// 失败原因
        reason: String,
    },

    /// 路径超出沙箱范围
    ///
    /// 只回显调用方传入的原始字符串，不回显规范化后的路径
    #[error("路径超出沙箱范围: '{path}'")]
    OutsideSandbox {
        /// 调用方传入的路径
        path: String,
    },
}

impl PathError {
    pub(crate) fn invalid(path: &str, reason: impl Into<String>) -> Self {
        PathError::InvalidPath {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

/// 策略检查错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    /// 只读模式下的修改操作
    #[error("服务处于只读模式，不允许{operation}")]
    ReadOnly {
        /// 被拒绝的操作
        operation: OperationKind,
    },

    /// 扩展名不在允许列表中
    #[error("不允许的文件扩展名: {}", .extension.as_deref().unwrap_or("(无扩展名)"))]
    ExtensionNotAllowed {
        /// 小写扩展名，没有扩展名时为 None
        extension: Option<String>,
    },

    /// 文件超过最大限制
    #[error("文件超过最大限制 {}（实际 {}）", human_size(.limit), human_size(.size))]
    TooLarge {
        /// 实际大小（字节）
        size: u64,
        /// 限制（字节）
        limit: u64,
    },

    /// 目录非空，拒绝删除
    #[error("目录非空: '{path}'")]
    DirectoryNotEmpty {
        /// 沙箱内的相对路径
        path: String,
    },

    /// 试图删除沙箱根目录
    #[error("不允许删除沙箱根目录")]
    RootProtected,
}

/// 沙箱错误类型
///
/// 包含沙箱文件操作过程中可能出现的所有错误类型
#[derive(Error, Debug)]
pub enum SandboxError {
    /// 路径解析失败
    #[error(transparent)]
    Path(#[from] PathError),

    /// 策略检查失败
    #[error(transparent)]
    Policy(#[from] PolicyError),

    /// 文件或目录不存在
    #[error("路径不存在: '{path}'")]
    NotFound {
        /// 沙箱内的相对路径
        path: String,
    },

    /// 需要目录但不是目录
    #[error("不是目录: '{path}'")]
    NotADirectory {
        /// 沙箱内的相对路径
        path: String,
    },

    /// 需要普通文件但不是普通文件
    #[error("不是文件: '{path}'")]
    NotAFile {
        /// 沙箱内的相对路径
        path: String,
    },

    /// 目标已存在且不是目录
    #[error("路径已存在且不是目录: '{path}'")]
    AlreadyExistsNotADirectory {
        /// 沙箱内的相对路径
        path: String,
    },

    /// 文件内容不是合法的 UTF-8 文本
    #[error("文件包含非 UTF-8 内容: '{path}'")]
    NotTextFile {
        /// 沙箱内的相对路径
        path: String,
    },

    /// 文件操作错误
    ///
    /// 底层文件系统操作失败
    #[error("文件操作失败 '{path}': {source}")]
    Io {
        /// 沙箱内的相对路径
        path: String,
        /// 原始 IO 错误
        #[source]
        source: std::io::Error,
    },
}

impl SandboxError {
    pub(crate) fn io(path: &str, source: std::io::Error) -> Self {
        SandboxError::Io {
            path: path.to_string(),
            source,
        }
    }

    /// 错误类别
    pub fn kind(&self) -> ErrorKind {
        match self {
            SandboxError::Path(PathError::InvalidPath { .. }) => ErrorKind::InvalidPath,
            SandboxError::Path(PathError::OutsideSandbox { .. }) => ErrorKind::OutsideSandbox,
            SandboxError::Policy(PolicyError::ReadOnly { .. }) => ErrorKind::ReadOnly,
            SandboxError::Policy(PolicyError::ExtensionNotAllowed { .. }) => {
                ErrorKind::ExtensionNotAllowed
            }
            SandboxError::Policy(PolicyError::TooLarge { .. }) => ErrorKind::TooLarge,
            SandboxError::Policy(PolicyError::DirectoryNotEmpty { .. }) => {
                ErrorKind::DirectoryNotEmpty
            }
            SandboxError::Policy(PolicyError::RootProtected) => ErrorKind::RootProtected,
            SandboxError::NotFound { .. } => ErrorKind::NotFound,
            SandboxError::NotADirectory { .. } => ErrorKind::NotADirectory,
            SandboxError::NotAFile { .. } => ErrorKind::NotAFile,
            SandboxError::AlreadyExistsNotADirectory { .. } => {
                ErrorKind::AlreadyExistsNotADirectory
            }
            SandboxError::NotTextFile { .. } => ErrorKind::NotTextFile,
            SandboxError::Io { .. } => ErrorKind::IoError,
        }
    }

    /// 检查是否为安全相关错误
    ///
    /// 安全相关错误包括路径越界、只读模式下的修改、被拒绝的扩展名等
    ///
    /// # 返回值
    /// 如果是安全相关错误返回 true
    pub fn is_security_error(&self) -> bool {
        matches!(
            self,
            SandboxError::Path(PathError::OutsideSandbox { .. })
                | SandboxError::Policy(PolicyError::ReadOnly { .. })
                | SandboxError::Policy(PolicyError::ExtensionNotAllowed { .. })
                | SandboxError::Policy(PolicyError::RootProtected)
        )
    }

    /// 获取错误的安全等级
    ///
    /// 用于日志记录
    ///
    /// # 返回值
    /// 错误的安全等级字符串
    pub fn security_level(&self) -> &'static str {
        match self {
            SandboxError::Path(PathError::OutsideSandbox { .. }) => "HIGH",
            SandboxError::Policy(PolicyError::RootProtected) => "HIGH",
            SandboxError::Policy(PolicyError::ReadOnly { .. }) => "MEDIUM",
            SandboxError::Policy(PolicyError::ExtensionNotAllowed { .. }) => "LOW",
            _ => "INFO",
        }
    }
}

/// 沙箱配置错误
///
/// 只在启动阶段构造 [`crate::sandbox::SandboxConfig`] 时出现
#[derive(Error, Debug)]
pub enum SandboxConfigError {
    /// 沙箱根目录创建或规范化失败
    #[error("创建沙箱根目录失败: {:?}", .path)]
    RootCreationFailed {
        /// 配置中的根目录
        path: std::path::PathBuf,
        /// 原始错误
        source: std::io::Error,
    },

    /// 沙箱根目录不是目录
    #[error("沙箱根目录不是目录: {:?}", .path)]
    RootNotDirectory {
        /// 规范化后的根目录
        path: std::path::PathBuf,
    },

    /// 最大文件大小为 0
    #[error("max_file_size 必须大于 0")]
    ZeroMaxFileSize,
}

/// 沙箱操作结果类型
///
/// 统一所有沙箱操作的返回类型
pub type SandboxResult<T> = Result<T, SandboxError>;
