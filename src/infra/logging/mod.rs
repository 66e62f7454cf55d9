//! 日志系统模块
//!
//! 本模块提供了统一的日志记录功能，使用 `tracing` 库实现。
//!
//! 日志只写 stderr：stdout 由 MCP 协议独占，任何日志输出到 stdout 都会破坏消息流。

use std::str::FromStr;
use tracing::{info, Level};

use crate::infra::error::Error;

/// 日志级别
///
/// 从低到高：Trace < Debug < Info < Warn < Error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// 最详细的日志级别（调试用）
    Trace,
    /// 调试信息
    Debug,
    /// 一般信息
    Info,
    /// 警告
    Warn,
    /// 错误
    Error,
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("未知的日志级别: {}", other)),
        }
    }
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

/// 日志格式
///
/// 日志的输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// 默认格式（人类可读）
    Default,
    /// JSON 格式（机器可读）
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "default" | "text" | "pretty" => Ok(LogFormat::Default),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("未知的日志格式: {}", other)),
        }
    }
}

/// 日志配置
///
/// 配置日志系统的行为
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// 日志级别
    pub level: LogLevel,
    /// 日志格式
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    /// 默认配置
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Default,
        }
    }
}

/// 初始化日志系统
///
/// # 参数说明
/// * `config` - 日志配置
///
/// # 错误
/// 全局 subscriber 已被设置时返回 [`Error::Logging`]
pub fn init(config: &LoggingConfig) -> Result<(), Error> {
    let level_filter: Level = config.level.into();

    let builder = tracing_subscriber::fmt()
        .with_max_level(level_filter)
        .with_writer(std::io::stderr)
        .with_ansi(false);

    let result = match config.format {
        LogFormat::Default => tracing::subscriber::set_global_default(builder.finish()),
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish()),
    };
    result.map_err(|e| Error::Logging(format!("设置全局日志 subscriber 失败: {}", e)))?;

    info!(level = ?config.level, format = ?config.format, "日志系统初始化完成");
    Ok(())
}
