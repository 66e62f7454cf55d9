//! CLI 程序执行模块
//!
//! 加载配置、初始化日志，然后执行对应的子命令

use tracing::{error, info};

use crate::cli::{Args, Commands};
use crate::infra::config::{Config, ConfigLoader};
use crate::infra::error::Result;
use crate::infra::logging;
use crate::sandbox::SandboxConfig;
use crate::service::FsSandboxService;

/// 运行 CLI 程序
///
/// # 参数说明
/// * `args` - 已解析的命令行参数
pub async fn run(args: Args) -> Result<()> {
    let command = args.command.unwrap_or(Commands::Serve);

    if command == Commands::Version {
        println!("{} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let mut config = ConfigLoader::new().load(&args.config).await?;
    config.apply_overrides(&args.overrides());

    match command {
        Commands::Check => check_config(&args.config, &config),
        _ => {
            logging::init(&config.logging_config()?)?;
            info!(version = env!("CARGO_PKG_VERSION"), "fs-sandbox 启动");
            run_service(config).await
        }
    }
}

/// 启动 MCP 服务，直到 stdin 关闭或收到关闭信号
pub async fn run_service(config: Config) -> Result<()> {
    let service = FsSandboxService::new(config);

    if let Err(e) = service.start().await {
        error!(error = %e, "服务运行出错");
        return Err(e);
    }

    info!("服务退出");
    Ok(())
}

/// 检查配置文件是否有效
///
/// 根目录不存在时只提示，不会创建
pub fn check_config(config_path: &str, config: &Config) -> Result<()> {
    println!("验证配置文件: {}", config_path);

    config.logging_config()?;

    let settings = &config.sandbox;
    if settings.max_file_size == 0 {
        println!("配置验证失败: max_file_size 必须大于 0");
        return Err(crate::sandbox::SandboxConfigError::ZeroMaxFileSize.into());
    }

    if settings.root.exists() {
        let sandbox = SandboxConfig::from_settings(settings)?;
        println!("- 沙箱根目录: {}", sandbox.root().display());
    } else {
        println!(
            "- 沙箱根目录: {}（不存在，启动时将自动创建）",
            settings.root.display()
        );
    }

    println!("- 只读模式: {}", settings.read_only);
    println!("- 允许的扩展名: {}", settings.allowed_extensions.join(", "));
    println!(
        "- 最大文件大小: {}",
        crate::sandbox::format_size(settings.max_file_size)
    );
    println!("配置验证成功!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::SandboxSettings;
    use tempfile::TempDir;

    #[test]
    fn test_check_config_valid() {
        let temp = TempDir::new().unwrap();
        let config = Config {
            sandbox: SandboxSettings {
                root: temp.path().to_path_buf(),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(check_config("fs-sandbox.toml", &config).is_ok());
    }

    #[test]
    fn test_check_config_missing_root_not_created() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("later");
        let config = Config {
            sandbox: SandboxSettings {
                root: root.clone(),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(check_config("fs-sandbox.toml", &config).is_ok());
        assert!(!root.exists());
    }

    #[test]
    fn test_check_config_root_is_file() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("root.txt");
        std::fs::write(&file, "x").unwrap();
        let config = Config {
            sandbox: SandboxSettings {
                root: file,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(check_config("fs-sandbox.toml", &config).is_err());
    }
}
