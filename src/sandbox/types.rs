//! Sandbox 模块类型定义
//!
//! 提供沙箱环境相关的类型定义，包括配置、解析后的路径、操作请求与结果等
//!
//! # 使用示例
//! ```rust,no_run
//! use fs_sandbox::sandbox::{SandboxConfig, SandboxSettings};
//!
//! let config = SandboxConfig::from_settings(&SandboxSettings::default())?;
//! println!("沙箱根目录: {:?}", config.root());
//! # Ok::<(), fs_sandbox::sandbox::SandboxConfigError>(())
//! ```

use std::collections::BTreeSet;
use std::num::NonZeroU64;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::sandbox::errors::SandboxConfigError;

/// 沙箱配置（原始形式）
///
/// 直接来自配置文件，尚未校验。只能通过 [`SandboxConfig::from_settings`]
/// 转换为运行时使用的 [`SandboxConfig`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxSettings {
    /// 沙箱根目录路径
    ///
    /// 不存在时会在启动阶段递归创建，默认为 `./sandbox`
    #[serde(default = "default_root", alias = "sandbox_path")]
    pub root: PathBuf,

    /// 是否只读
    ///
    /// 为 true 时拒绝所有写入、创建目录、删除操作
    #[serde(default)]
    pub read_only: bool,

    /// 允许写入的文件扩展名
    ///
    /// 大小写不敏感，可以带或不带前导 `.`
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,

    /// 单个文件最大字节数
    ///
    /// 读取时比较磁盘上的文件大小，写入时比较内容长度
    #[serde(default = "default_max_file_size", alias = "max_file_size_bytes")]
    pub max_file_size: u64,
}

impl Default for SandboxSettings {
    fn default() -> Self {
        Self {
            root: default_root(),
            read_only: false,
            allowed_extensions: default_allowed_extensions(),
            max_file_size: default_max_file_size(),
        }
    }
}

/// 默认沙箱根目录
fn default_root() -> PathBuf {
    PathBuf::from("sandbox")
}

/// 默认允许的扩展名（文本类文件）
fn default_allowed_extensions() -> Vec<String> {
    [
        ".txt", ".md", ".json", ".yaml", ".yml", ".toml", ".csv", ".log", ".xml", ".html",
        ".css", ".js", ".ts", ".py", ".rs",
    ]
    .iter()
    .map(|ext| ext.to_string())
    .collect()
}

/// 默认最大文件大小（10MB）
fn default_max_file_size() -> u64 {
    10 * 1024 * 1024
}

/// 沙箱配置
///
/// 进程启动时构造一次，之后不可变。所有路径解析和策略检查都只读取它
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// 规范化后的沙箱根目录
    root: PathBuf,
    read_only: bool,
    allowed_extensions: BTreeSet<String>,
    max_file_size: NonZeroU64,
}

impl SandboxConfig {
    /// 校验配置并构造 `SandboxConfig`
    ///
    /// 根目录不存在时递归创建，然后规范化为绝对路径
    ///
    /// # 错误
    /// - 根目录无法创建或无法规范化
    /// - 根目录存在但不是目录
    /// - `max_file_size` 为 0
    pub fn from_settings(settings: &SandboxSettings) -> Result<Self, SandboxConfigError> {
        let max_file_size =
            NonZeroU64::new(settings.max_file_size).ok_or(SandboxConfigError::ZeroMaxFileSize)?;

        if !settings.root.exists() {
            std::fs::create_dir_all(&settings.root).map_err(|source| {
                SandboxConfigError::RootCreationFailed {
                    path: settings.root.clone(),
                    source,
                }
            })?;
        }

        let root = dunce::canonicalize(&settings.root).map_err(|source| {
            SandboxConfigError::RootCreationFailed {
                path: settings.root.clone(),
                source,
            }
        })?;

        if !root.is_dir() {
            return Err(SandboxConfigError::RootNotDirectory { path: root });
        }

        Ok(Self {
            root,
            read_only: settings.read_only,
            allowed_extensions: normalize_extensions(&settings.allowed_extensions),
            max_file_size,
        })
    }

    /// 规范化后的沙箱根目录
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 是否只读
    pub fn read_only(&self) -> bool {
        self.read_only
    }

    /// 允许写入的扩展名集合（小写，带前导 `.`）
    pub fn allowed_extensions(&self) -> &BTreeSet<String> {
        &self.allowed_extensions
    }

    /// 单个文件最大字节数
    pub fn max_file_size(&self) -> u64 {
        self.max_file_size.get()
    }

    /// 扩展名是否在允许列表中
    ///
    /// `extension` 应为小写并带前导 `.`
    pub fn is_extension_allowed(&self, extension: &str) -> bool {
        self.allowed_extensions.contains(extension)
    }
}

/// 统一扩展名格式：去空白、小写、补前导 `.`，丢弃空项
fn normalize_extensions(extensions: &[String]) -> BTreeSet<String> {
    extensions
        .iter()
        .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
        .filter(|ext| !ext.is_empty())
        .map(|ext| format!(".{ext}"))
        .collect()
}

/// 解析后的安全路径
///
/// 只能由 [`crate::sandbox::path::resolve`] 构造，`absolute` 一定是沙箱根目录本身
/// 或其后代
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    absolute: PathBuf,
    relative_display: String,
}

impl ResolvedPath {
    pub(crate) fn new(absolute: PathBuf, root: &Path) -> Self {
        let relative_display = match absolute.strip_prefix(root) {
            Ok(rel) if rel.as_os_str().is_empty() => ".".to_string(),
            Ok(rel) => rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/"),
            // 调用方保证 absolute 在 root 之内
            Err(_) => ".".to_string(),
        };

        Self {
            absolute,
            relative_display,
        }
    }

    /// 规范化后的绝对路径
    pub fn absolute(&self) -> &Path {
        &self.absolute
    }

    /// 相对沙箱根目录的显示路径，仅用于面向用户的消息
    pub fn relative_display(&self) -> &str {
        &self.relative_display
    }

    /// 是否就是沙箱根目录
    pub fn is_root(&self) -> bool {
        self.relative_display == "."
    }

    /// 小写的文件扩展名（带前导 `.`），没有扩展名时返回 None
    ///
    /// `.env` 这类点文件视为没有扩展名
    pub fn extension(&self) -> Option<String> {
        self.absolute
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
    }
}

/// 沙箱操作类型
///
/// 表示可以在沙箱中执行的操作类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// 列出目录
    List,
    /// 读取文件
    Read,
    /// 写入文件
    Write,
    /// 创建目录
    Mkdir,
    /// 删除文件/目录
    Delete,
}

impl OperationKind {
    /// 是否为修改类操作
    pub fn is_mutation(&self) -> bool {
        match self {
            OperationKind::Write | OperationKind::Mkdir | OperationKind::Delete => true,
            OperationKind::List | OperationKind::Read => false,
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationKind::List => write!(f, "列出目录"),
            OperationKind::Read => write!(f, "读取"),
            OperationKind::Write => write!(f, "写入"),
            OperationKind::Mkdir => write!(f, "创建目录"),
            OperationKind::Delete => write!(f, "删除"),
        }
    }
}

/// 沙箱操作请求
///
/// `path` 来自调用方，不可信
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationRequest {
    List { path: String },
    Read { path: String },
    Write { path: String, content: String },
    Mkdir { path: String },
    Delete { path: String },
}

impl OperationRequest {
    /// 请求对应的操作类型
    pub fn kind(&self) -> OperationKind {
        match self {
            OperationRequest::List { .. } => OperationKind::List,
            OperationRequest::Read { .. } => OperationKind::Read,
            OperationRequest::Write { .. } => OperationKind::Write,
            OperationRequest::Mkdir { .. } => OperationKind::Mkdir,
            OperationRequest::Delete { .. } => OperationKind::Delete,
        }
    }

    /// 请求中的原始路径
    pub fn path(&self) -> &str {
        match self {
            OperationRequest::List { path }
            | OperationRequest::Read { path }
            | OperationRequest::Write { path, .. }
            | OperationRequest::Mkdir { path }
            | OperationRequest::Delete { path } => path,
        }
    }
}

/// 目录条目类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    #[serde(rename = "file")]
    File,
    #[serde(rename = "dir")]
    Directory,
    Symlink,
}

impl EntryKind {
    fn label(&self) -> &'static str {
        match self {
            EntryKind::File => "file",
            EntryKind::Directory => "dir",
            EntryKind::Symlink => "link",
        }
    }
}

/// 文件/目录条目信息
///
/// 用于列出目录内容时返回的条目信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxEntry {
    /// 条目名称
    pub name: String,

    /// 条目类型
    #[serde(rename = "type")]
    pub kind: EntryKind,

    /// 文件大小（字节），目录为 0
    pub size_bytes: u64,

    /// 最后修改时间
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
}

impl SandboxEntry {
    /// 从 `tokio::fs::DirEntry` 创建条目
    ///
    /// 使用不跟随符号链接的元数据，符号链接按链接本身报告
    ///
    /// # 错误
    /// 如果获取文件元数据失败，返回错误
    pub async fn from_dir_entry(dir_entry: &tokio::fs::DirEntry) -> Result<Self, std::io::Error> {
        let metadata = tokio::fs::symlink_metadata(dir_entry.path()).await?;
        let name = dir_entry.file_name().to_string_lossy().into_owned();

        let file_type = metadata.file_type();
        let kind = if file_type.is_symlink() {
            EntryKind::Symlink
        } else if file_type.is_dir() {
            EntryKind::Directory
        } else {
            EntryKind::File
        };

        let size_bytes = match kind {
            EntryKind::Directory => 0,
            EntryKind::File | EntryKind::Symlink => metadata.len(),
        };

        Ok(Self {
            name,
            kind,
            size_bytes,
            modified: metadata.modified().ok().map(DateTime::<Utc>::from),
        })
    }
}

/// 被删除对象的类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletedKind {
    File,
    Directory,
    Symlink,
}

/// 沙箱操作结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OperationResult {
    /// 目录列表，按名称升序
    Listing {
        path: String,
        entries: Vec<SandboxEntry>,
    },
    /// 文件文本内容
    Content { path: String, content: String },
    /// 写入完成
    Written { path: String, bytes_written: u64 },
    /// 目录已存在或已创建
    DirectoryCreated { path: String, created: bool },
    /// 删除完成
    Deleted { path: String, kind: DeletedKind },
}

impl OperationResult {
    /// 面向 agent 的文本形式
    pub fn to_text(&self) -> String {
        match self {
            OperationResult::Listing { path, entries } => {
                let mut text = format!("Contents of {path}:");
                if entries.is_empty() {
                    text.push_str("\n(empty)");
                }
                for entry in entries {
                    let size = match entry.kind {
                        EntryKind::Directory => "-".to_string(),
                        EntryKind::File | EntryKind::Symlink => entry.size_bytes.to_string(),
                    };
                    text.push_str(&format!(
                        "\n{:4} {:>10} {}",
                        entry.kind.label(),
                        size,
                        entry.name
                    ));
                }
                text
            }
            OperationResult::Content { content, .. } => content.clone(),
            OperationResult::Written {
                path,
                bytes_written,
            } => format!("File written successfully: {path} ({bytes_written} bytes)"),
            OperationResult::DirectoryCreated { path, created: true } => {
                format!("Directory created successfully: {path}")
            }
            OperationResult::DirectoryCreated {
                path,
                created: false,
            } => format!("Directory already exists: {path}"),
            OperationResult::Deleted {
                path,
                kind: DeletedKind::Directory,
            } => format!("Directory deleted successfully: {path}"),
            OperationResult::Deleted { path, .. } => format!("File deleted successfully: {path}"),
        }
    }
}

/// 字节数的可读形式，如 `10.0 MB`
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];

    if bytes < 1024 {
        return format!("{bytes} B");
    }

    let mut value = bytes as f64 / 1024.0;
    let mut unit = UNITS[0];
    for next in &UNITS[1..] {
        if value < 1024.0 {
            break;
        }
        value /= 1024.0;
        unit = next;
    }
    format!("{value:.1} {unit}")
}
