//! 基础设施模块
//!
//! 提供底层支持功能，包括：
//! - config/：配置加载（TOML / JSON，环境变量替换）
//! - logging/：日志系统（stderr）
//! - error/：错误处理

pub mod config;
pub mod logging;
pub mod error;
