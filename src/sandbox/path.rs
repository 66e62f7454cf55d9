//! Sandbox 路径解析
//!
//! 把调用方传入的任意路径字符串解析为沙箱内的规范绝对路径，或者拒绝它
//!
//! # 安全特性
//! - 路径规范化：使用 `canonicalize` 解析 `.`、`..` 和符号链接
//! - 边界验证：按路径组件比较，`/srv/sandboxevil` 不会被当成 `/srv/sandbox` 的子路径
//! - 不存在的目标：规范化已存在的最长前缀，再拼回不存在的部分后重新验证
//! - 悬空符号链接一律拒绝，避免通过它写到沙箱外
//! - 沙箱外的路径无论是否存在、是否是目录，都只报告“超出沙箱范围”
//!
//! # 使用示例
//! ```rust,no_run
//! use fs_sandbox::sandbox::{path, SandboxConfig, SandboxSettings};
//!
//! let config = SandboxConfig::from_settings(&SandboxSettings::default())?;
//!
//! // 沙箱内路径
//! let resolved = path::resolve(&config, "docs/notes.txt")?;
//! assert!(resolved.absolute().starts_with(config.root()));
//!
//! // 路径遍历
//! assert!(path::resolve(&config, "../../etc/passwd").is_err());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::ffi::OsString;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};

use crate::sandbox::errors::PathError;
use crate::sandbox::types::{ResolvedPath, SandboxConfig};

/// 解析并验证路径
///
/// 1. 空路径、包含 NUL 的路径直接拒绝
/// 2. 相对路径以沙箱根为基准，绝对路径按字面处理
/// 3. 规范化（跟随符号链接）
/// 4. 验证结果是根目录本身或其后代
///
/// # 错误
/// - [`PathError::InvalidPath`]：输入格式错误或无法规范化
/// - [`PathError::OutsideSandbox`]：规范化后的路径在沙箱外
pub fn resolve(config: &SandboxConfig, user_path: &str) -> Result<ResolvedPath, PathError> {
    resolve_in(config.root(), user_path)
}

/// 解析路径，但最后一个组件如果是符号链接则不跟随
///
/// 父目录照常规范化并验证边界，最后一个组件是符号链接时返回链接本身的路径。
/// 用于删除操作：删除链接而不是链接指向的目标
pub fn resolve_no_follow(config: &SandboxConfig, user_path: &str) -> Result<ResolvedPath, PathError> {
    let root = config.root();
    let requested = Path::new(user_path);

    if let (Some(Component::Normal(name)), Some(parent)) =
        (requested.components().next_back(), requested.parent())
    {
        let parent_str = parent.to_string_lossy();
        let parent_input = if parent_str.is_empty() { "." } else { parent_str.as_ref() };
        if let Ok(parent) = resolve_in(root, parent_input) {
            let candidate = parent.absolute().join(name);
            let is_symlink = std::fs::symlink_metadata(&candidate)
                .map(|m| m.file_type().is_symlink())
                .unwrap_or(false);
            if is_symlink {
                return Ok(ResolvedPath::new(candidate, root));
            }
        }
    }

    resolve_in(root, user_path)
}

/// 以给定的（已规范化的）根目录解析路径
pub(crate) fn resolve_in(root: &Path, user_path: &str) -> Result<ResolvedPath, PathError> {
    if user_path.trim().is_empty() {
        return Err(PathError::invalid(user_path, "路径为空"));
    }
    if user_path.contains('\0') {
        return Err(PathError::invalid(user_path, "路径包含 NUL 字符"));
    }

    let requested = Path::new(user_path);
    let joined = if requested.is_absolute() {
        requested.to_path_buf()
    } else {
        root.join(requested)
    };

    let canonical = match canonicalize_lenient(&joined) {
        Ok(canonical) => canonical,
        Err(failure) => {
            // 失败位置在沙箱外时不给出具体原因，避免泄露沙箱外的目录结构
            let inside = failure
                .anchor
                .as_deref()
                .is_some_and(|anchor| anchor.starts_with(root));
            if !inside {
                return Err(outside_sandbox(user_path));
            }
            debug!(path = user_path, reason = %failure.reason, "路径规范化失败");
            return Err(PathError::invalid(user_path, failure.reason));
        }
    };

    if !canonical.starts_with(root) {
        return Err(outside_sandbox(user_path));
    }

    let resolved = ResolvedPath::new(canonical, root);
    debug!(
        requested_path = user_path,
        relative = resolved.relative_display(),
        "路径验证通过"
    );
    Ok(resolved)
}

fn outside_sandbox(user_path: &str) -> PathError {
    warn!(requested_path = user_path, "路径超出沙箱范围");
    PathError::OutsideSandbox {
        path: user_path.to_string(),
    }
}

/// 规范化失败
struct CanonicalizeFailure {
    /// 面向用户的原因，不包含绝对路径
    reason: String,
    /// 失败位置之上最深的可规范化祖先，用于判断失败发生在沙箱内还是沙箱外
    anchor: Option<PathBuf>,
}

impl CanonicalizeFailure {
    fn at(path: &Path, reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            anchor: deepest_canonical_ancestor(path),
        }
    }
}

/// 逐级向上，返回第一个能规范化的祖先
fn deepest_canonical_ancestor(path: &Path) -> Option<PathBuf> {
    let mut current = path.to_path_buf();
    while current.pop() {
        if let Ok(canonical) = dunce::canonicalize(&current) {
            return Some(canonical);
        }
    }
    None
}

/// 规范化可能不存在的路径
///
/// 从完整路径开始逐级向上，找到第一个能 `canonicalize` 的前缀，
/// 再把剩余的（不存在的）普通组件拼回去
fn canonicalize_lenient(path: &Path) -> Result<PathBuf, CanonicalizeFailure> {
    let mut existing = path.to_path_buf();
    let mut missing: Vec<OsString> = Vec::new();

    let base = loop {
        match dunce::canonicalize(&existing) {
            Ok(canonical) => break canonical,
            Err(e) if e.kind() == IoErrorKind::NotFound => {
                // lstat 能看到但 canonicalize 失败：悬空的符号链接
                if std::fs::symlink_metadata(&existing).is_ok() {
                    return Err(CanonicalizeFailure::at(&existing, "符号链接指向不存在的目标"));
                }

                match existing.components().next_back() {
                    Some(Component::Normal(name)) => {
                        missing.push(name.to_os_string());
                        existing.pop();
                    }
                    Some(Component::CurDir) => {
                        existing.pop();
                    }
                    Some(Component::ParentDir) => {
                        return Err(CanonicalizeFailure::at(
                            &existing,
                            "'..' 位于不存在的路径组件之后",
                        ));
                    }
                    _ => return Err(CanonicalizeFailure::at(&existing, "路径不存在")),
                }
            }
            Err(e) => return Err(CanonicalizeFailure::at(&existing, describe_io_error(&e))),
        }
    };

    Ok(missing.iter().rev().fold(base, |acc, name| acc.join(name)))
}

/// 把规范化失败的 IO 错误转成不含路径的描述
fn describe_io_error(e: &std::io::Error) -> String {
    match e.kind() {
        IoErrorKind::PermissionDenied => "无权限访问路径中的目录".to_string(),
        IoErrorKind::NotADirectory => "路径中间的组件不是目录".to_string(),
        kind => format!("无法解析路径: {kind}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sandbox() -> (TempDir, PathBuf) {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("sandbox");
        std::fs::create_dir_all(&root).unwrap();
        let root = dunce::canonicalize(&root).unwrap();
        (temp, root)
    }

    #[test]
    fn test_valid_relative_path() {
        let (_temp, root) = sandbox();
        std::fs::write(root.join("file.txt"), b"x").unwrap();

        let resolved = resolve_in(&root, "file.txt").unwrap();
        assert_eq!(resolved.absolute(), root.join("file.txt"));
        assert_eq!(resolved.relative_display(), "file.txt");
    }

    #[test]
    fn test_root_itself() {
        let (_temp, root) = sandbox();

        for input in [".", "./", "sub/..", "./././"] {
            if input == "sub/.." {
                std::fs::create_dir_all(root.join("sub")).unwrap();
            }
            let resolved = resolve_in(&root, input).unwrap();
            assert_eq!(resolved.absolute(), root.as_path(), "input: {input}");
            assert!(resolved.is_root());
        }
    }

    #[test]
    fn test_empty_path() {
        let (_temp, root) = sandbox();

        assert!(matches!(
            resolve_in(&root, ""),
            Err(PathError::InvalidPath { .. })
        ));
        assert!(matches!(
            resolve_in(&root, "   "),
            Err(PathError::InvalidPath { .. })
        ));
        assert!(matches!(
            resolve_in(&root, "a\0b"),
            Err(PathError::InvalidPath { .. })
        ));
    }

    #[test]
    fn test_path_traversal_attempt() {
        let (_temp, root) = sandbox();

        let result = resolve_in(&root, "../../etc/passwd");
        assert!(matches!(result, Err(PathError::OutsideSandbox { .. })));

        let result = resolve_in(&root, "..");
        assert!(matches!(result, Err(PathError::OutsideSandbox { .. })));
    }

    #[test]
    fn test_absolute_paths() {
        let (_temp, root) = sandbox();
        std::fs::write(root.join("inside.txt"), b"x").unwrap();

        let inside = root.join("inside.txt");
        let resolved = resolve_in(&root, inside.to_str().unwrap()).unwrap();
        assert_eq!(resolved.relative_display(), "inside.txt");

        let result = resolve_in(&root, "/etc/passwd");
        assert!(matches!(result, Err(PathError::OutsideSandbox { .. })));
    }

    #[test]
    fn test_sibling_with_common_prefix() {
        let (temp, root) = sandbox();
        let evil = temp.path().join("sandboxevil");
        std::fs::create_dir_all(&evil).unwrap();
        std::fs::write(evil.join("secret.txt"), b"x").unwrap();

        let result = resolve_in(&root, "../sandboxevil/secret.txt");
        assert!(matches!(result, Err(PathError::OutsideSandbox { .. })));

        let absolute = dunce::canonicalize(evil.join("secret.txt")).unwrap();
        let result = resolve_in(&root, absolute.to_str().unwrap());
        assert!(matches!(result, Err(PathError::OutsideSandbox { .. })));
    }

    #[test]
    fn test_nonexistent_target() {
        let (_temp, root) = sandbox();

        let resolved = resolve_in(&root, "new/deeper/file.txt").unwrap();
        assert_eq!(resolved.absolute(), root.join("new").join("deeper").join("file.txt"));
        assert_eq!(resolved.relative_display(), "new/deeper/file.txt");
    }

    #[test]
    fn test_parent_after_missing_component() {
        let (_temp, root) = sandbox();

        let result = resolve_in(&root, "missing/../../etc/passwd");
        assert!(matches!(result, Err(PathError::InvalidPath { .. })));
    }

    #[test]
    fn test_outside_failures_do_not_leak_structure() {
        let (temp, root) = sandbox();
        let outside = temp.path().join("outside");
        std::fs::create_dir_all(&outside).unwrap();
        std::fs::write(outside.join("secret.txt"), b"secret").unwrap();

        // 无论沙箱外的文件是否存在、是否是目录，结果都一样
        for input in [
            "../outside/secret.txt/x",
            "../outside/nosuch.txt/x",
            "../outside/nosuchdir/../secret.txt",
            "../outside/secret.txt/../../sandbox/a.txt",
        ] {
            let result = resolve_in(&root, input);
            assert!(
                matches!(result, Err(PathError::OutsideSandbox { .. })),
                "input: {input}, result: {result:?}"
            );
        }

        let absolute = format!("{}/x", outside.join("secret.txt").display());
        let result = resolve_in(&root, &absolute);
        assert!(matches!(result, Err(PathError::OutsideSandbox { .. })));
    }

    #[test]
    fn test_file_used_as_directory() {
        let (_temp, root) = sandbox();
        std::fs::write(root.join("file.txt"), b"x").unwrap();

        let result = resolve_in(&root, "file.txt/child.txt");
        assert!(matches!(result, Err(PathError::InvalidPath { .. })));
    }

    #[test]
    fn test_backslash_is_plain_character() {
        let (_temp, root) = sandbox();

        let result = resolve_in(&root, "..\\..\\etc\\passwd");
        if cfg!(windows) {
            assert!(matches!(result, Err(PathError::OutsideSandbox { .. })));
        } else {
            let resolved = result.unwrap();
            assert!(resolved.absolute().starts_with(&root));
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_escape() {
        use std::os::unix::fs::symlink;

        let (temp, root) = sandbox();
        let outside = temp.path().join("outside");
        std::fs::create_dir_all(&outside).unwrap();
        std::fs::write(outside.join("secret.txt"), b"secret").unwrap();
        symlink(&outside, root.join("escape")).unwrap();

        let result = resolve_in(&root, "escape/secret.txt");
        assert!(matches!(result, Err(PathError::OutsideSandbox { .. })));

        // 不存在的文件也不能经由符号链接写到沙箱外
        let result = resolve_in(&root, "escape/new.txt");
        assert!(matches!(result, Err(PathError::OutsideSandbox { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_inside_sandbox() {
        use std::os::unix::fs::symlink;

        let (_temp, root) = sandbox();
        std::fs::create_dir_all(root.join("real")).unwrap();
        std::fs::write(root.join("real").join("a.txt"), b"x").unwrap();
        symlink(root.join("real"), root.join("alias")).unwrap();

        let resolved = resolve_in(&root, "alias/a.txt").unwrap();
        assert_eq!(resolved.absolute(), root.join("real").join("a.txt"));
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_symlink() {
        use std::os::unix::fs::symlink;

        let (temp, root) = sandbox();
        symlink(temp.path().join("nowhere.txt"), root.join("dangling.txt")).unwrap();

        let result = resolve_in(&root, "dangling.txt");
        assert!(matches!(result, Err(PathError::InvalidPath { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_loop() {
        use std::os::unix::fs::symlink;

        let (_temp, root) = sandbox();
        symlink(root.join("b"), root.join("a")).unwrap();
        symlink(root.join("a"), root.join("b")).unwrap();

        let result = resolve_in(&root, "a/file.txt");
        assert!(matches!(result, Err(PathError::InvalidPath { .. })));
    }
}
