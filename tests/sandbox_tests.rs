//! 沙箱端到端测试
//!
//! 通过公开 API 验证路径隔离、策略检查和文件操作

use fs_sandbox::sandbox::{
    path, OperationResult, PathError, PolicyError, SandboxConfig, SandboxError, SandboxService,
    SandboxSettings,
};
use proptest::prelude::*;
use std::path::Path;
use tempfile::TempDir;

fn service_with(root: &Path, configure: impl FnOnce(&mut SandboxSettings)) -> SandboxService {
    let mut settings = SandboxSettings {
        root: root.to_path_buf(),
        ..Default::default()
    };
    configure(&mut settings);
    SandboxService::from_settings(&settings).unwrap()
}

#[tokio::test]
async fn test_create_directory_twice_succeeds() {
    let temp = TempDir::new().unwrap();
    let service = service_with(temp.path(), |_| {});

    let first = service.create_directory("a/b/c").await.unwrap();
    let second = service.create_directory("a/b/c").await.unwrap();

    assert!(matches!(first, OperationResult::DirectoryCreated { created: true, .. }));
    assert!(matches!(second, OperationResult::DirectoryCreated { created: false, .. }));
    assert!(temp.path().join("a/b/c").is_dir());
}

#[tokio::test]
async fn test_write_then_read() {
    let temp = TempDir::new().unwrap();
    let service = service_with(temp.path(), |_| {});

    service
        .write_file("notes/today.md", "# 今日\n- 测试\n")
        .await
        .unwrap();
    let result = service.read_file("notes/today.md").await.unwrap();

    assert_eq!(
        result,
        OperationResult::Content {
            path: "notes/today.md".to_string(),
            content: "# 今日\n- 测试\n".to_string(),
        }
    );
}

#[tokio::test]
async fn test_write_size_boundary() {
    let temp = TempDir::new().unwrap();
    let service = service_with(temp.path(), |s| s.max_file_size = 8);

    assert!(service.write_file("exact.txt", "12345678").await.is_ok());

    let err = service.write_file("over.txt", "123456789").await.unwrap_err();
    assert!(matches!(
        err,
        SandboxError::Policy(PolicyError::TooLarge { size: 9, limit: 8 })
    ));
    assert!(!temp.path().join("over.txt").exists());
}

#[tokio::test]
async fn test_delete_directory_rules() {
    let temp = TempDir::new().unwrap();
    let service = service_with(temp.path(), |_| {});

    service.write_file("full/keep.txt", "x").await.unwrap();
    service.create_directory("empty").await.unwrap();

    let err = service.delete("full").await.unwrap_err();
    assert!(matches!(
        err,
        SandboxError::Policy(PolicyError::DirectoryNotEmpty { .. })
    ));
    assert!(temp.path().join("full/keep.txt").exists());

    service.delete("empty").await.unwrap();
    assert!(!temp.path().join("empty").exists());
}

#[tokio::test]
async fn test_traversal_outside_sandbox() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("root");
    let service = service_with(&root, |_| {});

    let err = service.read_file("../../etc/passwd").await.unwrap_err();
    assert!(matches!(
        err,
        SandboxError::Path(PathError::OutsideSandbox { .. })
    ));
}

#[tokio::test]
async fn test_read_only_mode() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("existing.txt"), "old").unwrap();
    let service = service_with(temp.path(), |s| s.read_only = true);

    let err = service.write_file("existing.txt", "new").await.unwrap_err();
    assert!(matches!(
        err,
        SandboxError::Policy(PolicyError::ReadOnly { .. })
    ));

    let result = service.read_file("existing.txt").await.unwrap();
    assert!(matches!(result, OperationResult::Content { content, .. } if content == "old"));
}

#[tokio::test]
async fn test_extension_not_allowed() {
    let temp = TempDir::new().unwrap();
    let service = service_with(temp.path(), |s| {
        s.allowed_extensions = vec![".txt".to_string(), ".json".to_string()]
    });

    let err = service.write_file("a.exe", "MZ").await.unwrap_err();
    assert!(matches!(
        err,
        SandboxError::Policy(PolicyError::ExtensionNotAllowed { .. })
    ));
    assert!(service.write_file("A.JSON", "{}").await.is_ok());
}

#[tokio::test]
async fn test_list_sorted_by_name() {
    let temp = TempDir::new().unwrap();
    let service = service_with(temp.path(), |_| {});

    service.write_file("b.txt", "b").await.unwrap();
    service.write_file("a.txt", "a").await.unwrap();
    service.create_directory("sub").await.unwrap();

    let OperationResult::Listing { entries, .. } = service.list_files(".").await.unwrap() else {
        panic!("expected listing");
    };
    let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["a.txt", "b.txt", "sub"]);
}

#[tokio::test]
async fn test_sibling_prefix_not_inside() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("sandbox");
    let sibling = temp.path().join("sandboxevil");
    std::fs::create_dir_all(&sibling).unwrap();
    std::fs::write(sibling.join("secret.txt"), "s").unwrap();
    let service = service_with(&root, |_| {});

    let err = service
        .read_file(sibling.join("secret.txt").to_str().unwrap())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SandboxError::Path(PathError::OutsideSandbox { .. })
    ));
}

#[cfg(unix)]
#[tokio::test]
async fn test_symlink_escape_rejected() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("root");
    let outside = temp.path().join("outside");
    std::fs::create_dir_all(&root).unwrap();
    std::fs::create_dir_all(&outside).unwrap();
    std::fs::write(outside.join("secret.txt"), "s").unwrap();
    std::os::unix::fs::symlink(&outside, root.join("link")).unwrap();
    let service = service_with(&root, |_| {});

    for result in [
        service.read_file("link/secret.txt").await,
        service.write_file("link/new.txt", "x").await,
        service.list_files("link").await,
    ] {
        assert!(matches!(
            result,
            Err(SandboxError::Path(PathError::OutsideSandbox { .. }))
        ));
    }
    assert!(!outside.join("new.txt").exists());

    // 删除链接本身是允许的，目标不受影响
    service.delete("link").await.unwrap();
    assert!(outside.join("secret.txt").exists());
}

#[cfg(unix)]
#[tokio::test]
async fn test_dangling_symlink_rejected() {
    let temp = TempDir::new().unwrap();
    std::os::unix::fs::symlink(temp.path().join("nowhere"), temp.path().join("dangling")).unwrap();
    let service = service_with(temp.path(), |_| {});

    let err = service.write_file("dangling", "x").await.unwrap_err();
    assert!(matches!(
        err,
        SandboxError::Path(PathError::InvalidPath { .. })
    ));
}

/// 构造测试用的目录树
///
/// ```text
/// tmp/
///   outside/secret.txt
///   root/
///     dir/file.txt
///     escape -> ../outside      (unix)
///     inner  -> dir             (unix)
///     chain  -> escape          (unix)
/// ```
fn build_tree(temp: &TempDir) -> SandboxConfig {
    let root = temp.path().join("root");
    let outside = temp.path().join("outside");
    std::fs::create_dir_all(root.join("dir")).unwrap();
    std::fs::create_dir_all(&outside).unwrap();
    std::fs::write(root.join("dir/file.txt"), "f").unwrap();
    std::fs::write(outside.join("secret.txt"), "s").unwrap();

    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(&outside, root.join("escape")).unwrap();
        std::os::unix::fs::symlink(root.join("dir"), root.join("inner")).unwrap();
        std::os::unix::fs::symlink(root.join("escape"), root.join("chain")).unwrap();
    }

    SandboxConfig::from_settings(&SandboxSettings {
        root,
        ..Default::default()
    })
    .unwrap()
}

fn segment() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("..".to_string()),
        Just(".".to_string()),
        Just(String::new()),
        Just("dir".to_string()),
        Just("file.txt".to_string()),
        Just("escape".to_string()),
        Just("inner".to_string()),
        Just("chain".to_string()),
        Just("outside".to_string()),
        Just("..\\..".to_string()),
        "[a-c]{1,3}",
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn resolved_paths_stay_inside_root(
        prefix in 0u8..3,
        segments in prop::collection::vec(segment(), 1..6),
    ) {
        let temp = TempDir::new().unwrap();
        let config = build_tree(&temp);
        let root = config.root().to_path_buf();

        let tail = segments.join("/");
        let user_path = match prefix {
            0 => tail,
            1 => format!("/{tail}"),
            _ => format!("{}/{tail}", root.display()),
        };

        for result in [
            path::resolve(&config, &user_path),
            path::resolve_no_follow(&config, &user_path),
        ] {
            match result {
                Ok(resolved) => {
                    prop_assert!(
                        resolved.absolute().starts_with(&root),
                        "{user_path} resolved to {:?}",
                        resolved.absolute()
                    );
                    // 已存在的目标，真实位置同样必须在根目录内
                    if let Ok(real) = dunce::canonicalize(resolved.absolute()) {
                        let is_link = std::fs::symlink_metadata(resolved.absolute())
                            .map(|m| m.file_type().is_symlink())
                            .unwrap_or(false);
                        if !is_link {
                            prop_assert!(real.starts_with(&root));
                        }
                    }
                }
                Err(PathError::InvalidPath { .. }) | Err(PathError::OutsideSandbox { .. }) => {}
            }
        }
    }
}
