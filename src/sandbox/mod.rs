//! Sandbox 模块
//!
//! 提供安全的文件操作沙箱功能，所有操作都被限制在同一个根目录内
//!
//! # 主要功能
//! - **路径隔离**：任意路径字符串要么解析为沙箱内的规范路径，要么被拒绝
//! - **符号链接验证**：规范化时跟随符号链接，指向沙箱外的链接无法被利用
//! - **策略检查**：只读模式、写入扩展名允许列表、文件大小限制
//! - **文件操作**：列出、读取、写入、创建目录、删除
//!
//! # 使用示例
//! ```rust,no_run
//! use fs_sandbox::sandbox::{SandboxService, SandboxSettings};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let service = SandboxService::from_settings(&SandboxSettings::default())?;
//!
//! service.write_file("documents/test.txt", "Hello").await?;
//! let content = service.read_file("documents/test.txt").await?;
//! let entries = service.list_files("documents").await?;
//! # Ok(())
//! # }
//! ```
//!
//! # 配置项
//! ```toml
//! [sandbox]
//! root = "sandbox"
//! read_only = false
//! allowed_extensions = [".txt", ".md", ".json"]
//! max_file_size = 10485760
//! ```

// 模块子模块
pub mod types;          // 类型定义
pub mod errors;         // 错误定义
pub mod path;           // 路径解析
pub mod policy;         // 策略检查
pub mod service;        // 沙箱服务

// 重新导出主要类型
pub use types::{
    format_size,
    DeletedKind,
    EntryKind,
    OperationKind,
    OperationRequest,
    OperationResult,
    ResolvedPath,
    SandboxConfig,
    SandboxEntry,
    SandboxSettings,
};

pub use errors::{
    ErrorKind,
    PathError,
    PolicyError,
    SandboxConfigError,
    SandboxError,
    SandboxResult,
};

pub use service::SandboxService;
