//! Sandbox 策略检查
//!
//! 在路径解析成功之后、真正访问文件系统之前执行，按顺序检查（第一个失败即返回）：
//! 1. 只读模式下拒绝修改类操作
//! 2. 拒绝删除沙箱根目录
//! 3. 写入时检查扩展名允许列表（读取不过滤扩展名）
//! 4. 读写时检查大小限制
//!
//! 删除目录时的“必须为空”检查需要读取目录，由文件操作层完成

use tracing::warn;

use crate::sandbox::errors::PolicyError;
use crate::sandbox::types::{OperationKind, ResolvedPath, SandboxConfig};

/// 执行策略检查
///
/// # 参数说明
/// * `config` - 沙箱配置
/// * `resolved` - 已通过边界验证的路径
/// * `kind` - 操作类型
/// * `payload_size` - 写入时为内容长度，读取时为磁盘上的文件大小；其他操作为 None
pub fn check(
    config: &SandboxConfig,
    resolved: &ResolvedPath,
    kind: OperationKind,
    payload_size: Option<u64>,
) -> Result<(), PolicyError> {
    if kind.is_mutation() && config.read_only() {
        warn!(operation = ?kind, path = resolved.relative_display(), "只读模式拒绝修改操作");
        return Err(PolicyError::ReadOnly { operation: kind });
    }

    if kind == OperationKind::Delete && resolved.is_root() {
        warn!("拒绝删除沙箱根目录");
        return Err(PolicyError::RootProtected);
    }

    if kind == OperationKind::Write {
        let extension = resolved.extension();
        let allowed = extension
            .as_deref()
            .is_some_and(|ext| config.is_extension_allowed(ext));
        if !allowed {
            warn!(
                path = resolved.relative_display(),
                extension = ?extension,
                "扩展名不在允许列表中"
            );
            return Err(PolicyError::ExtensionNotAllowed { extension });
        }
    }

    if matches!(kind, OperationKind::Write | OperationKind::Read) {
        if let Some(size) = payload_size {
            let limit = config.max_file_size();
            if size > limit {
                return Err(PolicyError::TooLarge { size, limit });
            }
        }
    }

    Ok(())
}
