//! 配置管理系统模块
//!
//! 本模块负责加载和管理系统配置。
//!
//! 支持 TOML（默认）和 JSON 两种格式，按文件扩展名选择。JSON 格式同时兼容
//! 旧版扁平结构（顶层 `sandbox_path` / `max_file_size` 等字段）。
//! 字符串中的 `${VAR_NAME}` 会被替换为环境变量的值。
//!
//! # 配置示例
//! ```toml
//! [server]
//! name = "fs-sandbox"
//!
//! [sandbox]
//! root = "${HOME}/agent-sandbox"
//! read_only = false
//! allowed_extensions = [".txt", ".md", ".json"]
//! max_file_size = 10485760
//!
//! [logging]
//! level = "info"
//! format = "default"
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::infra::error::Error;
use crate::infra::logging::{LogFormat, LogLevel, LoggingConfig};
use crate::mcp::ServerInfo;
use crate::sandbox::SandboxSettings;

/// 主配置结构
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// 服务信息
    #[serde(default)]
    pub server: ServerConfig,
    /// 沙箱配置
    #[serde(default)]
    pub sandbox: SandboxSettings,
    /// 日志配置
    #[serde(default)]
    pub logging: LoggingSection,
}

/// 服务信息配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServerConfig {
    /// 服务名称（`initialize` 中返回）
    pub name: Option<String>,
    /// 服务版本
    pub version: Option<String>,
    /// 服务描述，作为 instructions 返回给客户端
    pub description: Option<String>,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoggingSection {
    /// 日志级别
    pub level: Option<String>,
    /// 日志格式：default / json
    pub format: Option<String>,
}

/// 旧版 JSON 配置（扁平结构）
#[derive(Debug, Clone, Deserialize)]
struct LegacyConfig {
    name: Option<String>,
    version: Option<String>,
    description: Option<String>,
    sandbox_path: PathBuf,
    max_file_size: Option<u64>,
    allowed_extensions: Option<Vec<String>>,
    #[serde(default)]
    read_only: bool,
}

impl From<LegacyConfig> for Config {
    fn from(legacy: LegacyConfig) -> Self {
        let defaults = SandboxSettings::default();
        Self {
            server: ServerConfig {
                name: legacy.name,
                version: legacy.version,
                description: legacy.description,
            },
            sandbox: SandboxSettings {
                root: legacy.sandbox_path,
                read_only: legacy.read_only,
                allowed_extensions: legacy
                    .allowed_extensions
                    .unwrap_or(defaults.allowed_extensions),
                max_file_size: legacy.max_file_size.unwrap_or(defaults.max_file_size),
            },
            logging: LoggingSection::default(),
        }
    }
}

/// 命令行覆盖项
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// 覆盖沙箱根目录
    pub root: Option<PathBuf>,
    /// 强制只读
    pub read_only: bool,
    /// 覆盖最大文件大小
    pub max_file_size: Option<u64>,
    /// 详细日志
    pub verbose: bool,
}

impl Config {
    /// 应用命令行覆盖项
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(root) = &overrides.root {
            self.sandbox.root = root.clone();
        }
        if overrides.read_only {
            self.sandbox.read_only = true;
        }
        if let Some(max) = overrides.max_file_size {
            self.sandbox.max_file_size = max;
        }
        if overrides.verbose {
            self.logging.level = Some("debug".to_string());
        }
    }

    /// MCP `initialize` 返回的服务信息
    pub fn server_info(&self) -> ServerInfo {
        let defaults = ServerInfo::default();
        ServerInfo {
            name: self.server.name.clone().unwrap_or(defaults.name),
            version: self.server.version.clone().unwrap_or(defaults.version),
            instructions: self.server.description.clone(),
        }
    }

    /// 日志系统配置
    ///
    /// # 错误
    /// 级别或格式无法识别时返回配置错误
    pub fn logging_config(&self) -> Result<LoggingConfig, Error> {
        let mut config = LoggingConfig::default();
        if let Some(level) = &self.logging.level {
            config.level = level.parse::<LogLevel>().map_err(Error::Config)?;
        }
        if let Some(format) = &self.logging.format {
            config.format = format.parse::<LogFormat>().map_err(Error::Config)?;
        }
        Ok(config)
    }
}

/// 配置加载器
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader;

impl ConfigLoader {
    /// 创建新的配置加载器
    pub fn new() -> Self {
        Self
    }

    /// 加载配置
    ///
    /// 文件不存在时返回默认配置
    pub async fn load(&self, path: &str) -> Result<Config, Error> {
        tracing::info!(path = path, "加载配置文件");

        // 检查文件是否存在
        if !Path::new(path).exists() {
            tracing::warn!(path = path, "配置文件不存在，使用默认配置");
            return Ok(Config::default());
        }

        // 读取文件内容
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::Config(format!("读取配置文件失败: {}", e)))?;

        let is_json = Path::new(path)
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let mut config = if is_json {
            self.parse_json(&content)?
        } else {
            self.parse_toml(&content)?
        };

        // 环境变量替换
        self.substitute_env_vars(&mut config)?;

        tracing::info!("配置加载成功");
        Ok(config)
    }

    /// 解析 TOML 配置
    pub fn parse_toml(&self, content: &str) -> Result<Config, Error> {
        toml::from_str(content).map_err(|e| Error::Config(format!("解析配置文件失败: {}", e)))
    }

    /// 解析 JSON 配置，兼容旧版扁平结构
    pub fn parse_json(&self, content: &str) -> Result<Config, Error> {
        let value: serde_json::Value = serde_json::from_str(content)
            .map_err(|e| Error::Config(format!("解析配置文件失败: {}", e)))?;

        if value.get("sandbox_path").is_some() {
            tracing::debug!("检测到旧版 JSON 配置格式");
            let legacy: LegacyConfig = serde_json::from_value(value)
                .map_err(|e| Error::Config(format!("解析配置文件失败: {}", e)))?;
            return Ok(legacy.into());
        }

        serde_json::from_value(value).map_err(|e| Error::Config(format!("解析配置文件失败: {}", e)))
    }

    /// 替换环境变量
    ///
    /// 将 `${VAR_NAME}` 格式的字符串替换为对应的环境变量值，未定义的变量保持原样
    fn substitute_env_vars(&self, config: &mut Config) -> Result<(), Error> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}")
            .map_err(|e| Error::Config(format!("环境变量模式无效: {}", e)))?;
        let replace = |input: &str| -> String {
            re.replace_all(input, |caps: &regex::Captures| {
                let var_name = &caps[1];
                env::var(var_name).unwrap_or_else(|_| caps[0].to_string())
            })
            .into_owned()
        };

        for field in [
            &mut config.server.name,
            &mut config.server.version,
            &mut config.server.description,
            &mut config.logging.level,
            &mut config.logging.format,
        ]
        .into_iter()
        .flatten()
        {
            *field = replace(field);
        }

        let root = config.sandbox.root.to_string_lossy().into_owned();
        config.sandbox.root = PathBuf::from(replace(&root));

        for ext in &mut config.sandbox.allowed_extensions {
            *ext = replace(ext);
        }

        Ok(())
    }
}
