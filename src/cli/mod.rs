//! CLI 命令行入口模块
//!
//! 本模块负责：
//! 1. 解析命令行参数（clap）
//! 2. 把命令行覆盖项合并进配置
//! 3. 分发子命令
//!
//! # 使用示例
//! ```bash
//! fs-sandbox --config fs-sandbox.toml --verbose serve
//! fs-sandbox --root ./workspace --read-only
//! fs-sandbox check
//! ```

pub mod program;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::infra::config::ConfigOverrides;

/// 命令行参数
#[derive(Parser, Debug)]
#[command(name = "fs-sandbox")]
#[command(version)]
#[command(about = "为 AI 代理提供沙箱化文件访问的 MCP 服务器", long_about = None)]
pub struct Args {
    /// 配置文件路径（.toml 或 .json）
    #[arg(short, long, default_value = "fs-sandbox.toml")]
    pub config: String,

    /// 是否启用 verbose 模式（显示 DEBUG 日志）
    #[arg(short, long)]
    pub verbose: bool,

    /// 覆盖沙箱根目录
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// 以只读模式运行
    #[arg(long)]
    pub read_only: bool,

    /// 覆盖单个文件的最大字节数
    #[arg(long)]
    pub max_file_size: Option<u64>,

    /// 子命令
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// 子命令
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// 在 stdio 上启动 MCP 服务（默认）
    Serve,
    /// 检查配置文件是否有效
    Check,
    /// 显示版本信息
    Version,
}

impl Args {
    /// 命令行中的配置覆盖项
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            root: self.root.clone(),
            read_only: self.read_only,
            max_file_size: self.max_file_size,
            verbose: self.verbose,
        }
    }
}
