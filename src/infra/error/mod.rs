//! 错误处理模块

use crate::sandbox::SandboxConfigError;

/// 错误类型
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("配置错误: {0}")]
    Config(String),

    #[error("沙箱错误: {0}")]
    Sandbox(#[from] SandboxConfigError),

    #[error("日志初始化错误: {0}")]
    Logging(String),

    #[error("IO 错误: {0}")]
    Io(String),
}

/// 结果类型
pub type Result<T> = std::result::Result<T, Error>;

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}
