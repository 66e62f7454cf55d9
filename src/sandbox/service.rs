//! Sandbox 服务模块
//!
//! 提供沙箱内的五种文件操作，每个操作都按 解析路径 → 策略检查 → 文件系统操作 → 组装结果
//! 的顺序执行。策略检查失败时不会触碰文件系统
//!
//! # 功能特性
//! - 列出目录（按名称排序）
//! - 读取 UTF-8 文本文件（先按磁盘大小检查限制）
//! - 写入文件（自动创建父目录，临时文件 + rename 原子替换）
//! - 创建目录（幂等）
//! - 删除文件或空目录（不提供递归删除）
//!
//! # 使用示例
//! ```rust,no_run
//! use fs_sandbox::sandbox::{SandboxService, SandboxSettings};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let service = SandboxService::from_settings(&SandboxSettings::default())?;
//!
//! // 写入文件
//! service.write_file("test.txt", "hello").await?;
//!
//! // 读取文件
//! let content = service.read_file("test.txt").await?;
//!
//! // 列出目录
//! let entries = service.list_files(".").await?;
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info};

use crate::sandbox::errors::{PolicyError, SandboxConfigError, SandboxError, SandboxResult};
use crate::sandbox::path;
use crate::sandbox::policy;
use crate::sandbox::types::{
    DeletedKind, OperationKind, OperationRequest, OperationResult, ResolvedPath, SandboxConfig,
    SandboxEntry, SandboxSettings,
};

/// 临时文件序号，保证同一进程内并发写入的临时文件名不冲突
static TEMP_FILE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// 沙箱服务
///
/// 不持有任何可变状态，可以随意 clone 并在多个任务间并发调用
#[derive(Debug, Clone)]
pub struct SandboxService {
    /// 沙箱配置
    config: Arc<SandboxConfig>,
}

impl SandboxService {
    /// 使用已校验的配置创建沙箱服务
    pub fn new(config: SandboxConfig) -> Self {
        info!(
            root = %config.root().display(),
            read_only = config.read_only(),
            max_file_size = config.max_file_size(),
            "初始化沙箱服务"
        );

        Self {
            config: Arc::new(config),
        }
    }

    /// 从原始配置创建沙箱服务
    ///
    /// # 错误
    /// 根目录无法创建、不是目录或大小限制为 0 时返回错误
    pub fn from_settings(settings: &SandboxSettings) -> Result<Self, SandboxConfigError> {
        Ok(Self::new(SandboxConfig::from_settings(settings)?))
    }

    /// 获取沙箱配置
    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// 执行一个操作请求
    pub async fn execute(&self, request: OperationRequest) -> SandboxResult<OperationResult> {
        match request {
            OperationRequest::List { path } => self.list_files(&path).await,
            OperationRequest::Read { path } => self.read_file(&path).await,
            OperationRequest::Write { path, content } => self.write_file(&path, &content).await,
            OperationRequest::Mkdir { path } => self.create_directory(&path).await,
            OperationRequest::Delete { path } => self.delete(&path).await,
        }
    }

    /// 解析路径并执行不依赖文件内容的策略检查
    fn authorize(
        &self,
        user_path: &str,
        kind: OperationKind,
        payload_size: Option<u64>,
    ) -> SandboxResult<ResolvedPath> {
        let resolved = path::resolve(&self.config, user_path)?;
        policy::check(&self.config, &resolved, kind, payload_size)?;
        Ok(resolved)
    }

    // ==================== 目录操作 API ====================

    /// 列出目录内容
    ///
    /// 条目按名称字节序升序排列（区分大小写）
    pub async fn list_files(&self, user_path: &str) -> SandboxResult<OperationResult> {
        let resolved = self.authorize(user_path, OperationKind::List, None)?;
        let rel = resolved.relative_display();

        debug!(path = rel, "列出目录");

        let metadata = tokio::fs::metadata(resolved.absolute())
            .await
            .map_err(|e| map_io_error(rel, e))?;
        if !metadata.is_dir() {
            return Err(SandboxError::NotADirectory {
                path: rel.to_string(),
            });
        }

        let mut entries = Vec::new();
        let mut read_dir = tokio::fs::read_dir(resolved.absolute())
            .await
            .map_err(|e| map_io_error(rel, e))?;

        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|e| SandboxError::io(rel, e))?
        {
            let entry = SandboxEntry::from_dir_entry(&entry)
                .await
                .map_err(|e| SandboxError::io(rel, e))?;
            entries.push(entry);
        }

        // 按名称排序
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(OperationResult::Listing {
            path: rel.to_string(),
            entries,
        })
    }

    /// 创建目录
    ///
    /// 递归创建整条目录链；目录已存在时视为成功
    pub async fn create_directory(&self, user_path: &str) -> SandboxResult<OperationResult> {
        let resolved = self.authorize(user_path, OperationKind::Mkdir, None)?;
        let rel = resolved.relative_display();

        match tokio::fs::metadata(resolved.absolute()).await {
            Ok(metadata) if metadata.is_dir() => {
                debug!(path = rel, "目录已存在");
                return Ok(OperationResult::DirectoryCreated {
                    path: rel.to_string(),
                    created: false,
                });
            }
            Ok(_) => {
                return Err(SandboxError::AlreadyExistsNotADirectory {
                    path: rel.to_string(),
                });
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(SandboxError::io(rel, e)),
        }

        tokio::fs::create_dir_all(resolved.absolute())
            .await
            .map_err(|e| SandboxError::io(rel, e))?;

        info!(path = rel, "目录已创建");

        Ok(OperationResult::DirectoryCreated {
            path: rel.to_string(),
            created: true,
        })
    }

    // ==================== 文件操作 API ====================

    /// 读取文件内容
    ///
    /// 先用磁盘上的文件大小做限制检查，再读取内容；内容必须是合法 UTF-8
    pub async fn read_file(&self, user_path: &str) -> SandboxResult<OperationResult> {
        let resolved = path::resolve(&self.config, user_path)?;
        let rel = resolved.relative_display();

        let metadata = tokio::fs::metadata(resolved.absolute())
            .await
            .map_err(|e| map_io_error(rel, e))?;
        if !metadata.is_file() {
            return Err(SandboxError::NotAFile {
                path: rel.to_string(),
            });
        }

        policy::check(
            &self.config,
            &resolved,
            OperationKind::Read,
            Some(metadata.len()),
        )?;

        debug!(path = rel, size = metadata.len(), "读取文件");

        // 读取期间文件可能变大，最多只读 limit + 1 字节
        let limit = self.config.max_file_size();
        let file = tokio::fs::File::open(resolved.absolute())
            .await
            .map_err(|e| map_io_error(rel, e))?;
        let mut buffer = Vec::with_capacity(metadata.len().min(limit) as usize);
        file.take(limit.saturating_add(1))
            .read_to_end(&mut buffer)
            .await
            .map_err(|e| SandboxError::io(rel, e))?;

        let size = buffer.len() as u64;
        if size > limit {
            return Err(PolicyError::TooLarge { size, limit }.into());
        }

        let content = String::from_utf8(buffer).map_err(|_| SandboxError::NotTextFile {
            path: rel.to_string(),
        })?;

        Ok(OperationResult::Content {
            path: rel.to_string(),
            content,
        })
    }

    /// 写入文件内容
    ///
    /// 如果文件不存在则创建，存在则整体覆盖。缺失的父目录会被递归创建
    pub async fn write_file(&self, user_path: &str, content: &str) -> SandboxResult<OperationResult> {
        let bytes = content.as_bytes();
        let resolved = self.authorize(user_path, OperationKind::Write, Some(bytes.len() as u64))?;
        let rel = resolved.relative_display();

        match tokio::fs::metadata(resolved.absolute()).await {
            Ok(metadata) if metadata.is_dir() => {
                return Err(SandboxError::NotAFile {
                    path: rel.to_string(),
                });
            }
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(SandboxError::io(rel, e)),
        }

        // 确保父目录存在
        if let Some(parent) = resolved.absolute().parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SandboxError::io(rel, e))?;
        }

        write_atomically(resolved.absolute(), bytes)
            .await
            .map_err(|e| SandboxError::io(rel, e))?;

        info!(path = rel, size = bytes.len(), "文件已写入");

        Ok(OperationResult::Written {
            path: rel.to_string(),
            bytes_written: bytes.len() as u64,
        })
    }

    // ==================== 删除操作 API ====================

    /// 删除文件或空目录
    ///
    /// 符号链接只删除链接本身；非空目录拒绝删除；目标不存在返回 `NotFound`
    pub async fn delete(&self, user_path: &str) -> SandboxResult<OperationResult> {
        let resolved = path::resolve_no_follow(&self.config, user_path)?;
        policy::check(&self.config, &resolved, OperationKind::Delete, None)?;
        let rel = resolved.relative_display();

        let metadata = tokio::fs::symlink_metadata(resolved.absolute())
            .await
            .map_err(|e| map_io_error(rel, e))?;
        let file_type = metadata.file_type();

        let kind = if file_type.is_symlink() {
            tokio::fs::remove_file(resolved.absolute())
                .await
                .map_err(|e| SandboxError::io(rel, e))?;
            DeletedKind::Symlink
        } else if file_type.is_dir() {
            let mut read_dir = tokio::fs::read_dir(resolved.absolute())
                .await
                .map_err(|e| map_io_error(rel, e))?;
            let has_entries = read_dir
                .next_entry()
                .await
                .map_err(|e| SandboxError::io(rel, e))?
                .is_some();
            if has_entries {
                return Err(PolicyError::DirectoryNotEmpty {
                    path: rel.to_string(),
                }
                .into());
            }

            tokio::fs::remove_dir(resolved.absolute())
                .await
                .map_err(|e| SandboxError::io(rel, e))?;
            DeletedKind::Directory
        } else {
            tokio::fs::remove_file(resolved.absolute())
                .await
                .map_err(|e| SandboxError::io(rel, e))?;
            DeletedKind::File
        };

        info!(path = rel, kind = ?kind, "已删除");

        Ok(OperationResult::Deleted {
            path: rel.to_string(),
            kind,
        })
    }
}

/// `NotFound` 单独映射，其余归为 IO 错误
fn map_io_error(rel: &str, e: std::io::Error) -> SandboxError {
    if e.kind() == std::io::ErrorKind::NotFound {
        SandboxError::NotFound {
            path: rel.to_string(),
        }
    } else {
        SandboxError::io(rel, e)
    }
}

/// 写入同目录下的隐藏临时文件，落盘后 rename 覆盖目标
///
/// 覆盖已有文件时沿用原文件的权限位。任何一步失败都会删除临时文件，目标文件保持原样
async fn write_atomically(target: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let temp = temp_path_for(target);
    let existing_permissions = tokio::fs::metadata(target)
        .await
        .ok()
        .map(|metadata| metadata.permissions());

    let result = async {
        let mut file = tokio::fs::File::create(&temp).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        drop(file);
        if let Some(permissions) = existing_permissions {
            tokio::fs::set_permissions(&temp, permissions).await?;
        }
        tokio::fs::rename(&temp, target).await
    }
    .await;

    if result.is_err() {
        if let Err(e) = tokio::fs::remove_file(&temp).await {
            debug!(error = %e, "清理临时文件失败");
        }
    }

    result
}

fn temp_path_for(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let seq = TEMP_FILE_COUNTER.fetch_add(1, Ordering::Relaxed);
    target.with_file_name(format!(".{name}.{}.{seq}.tmp", std::process::id()))
}
