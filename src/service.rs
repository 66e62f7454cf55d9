//! 服务模块
//!
//! 负责 MCP 文件服务的完整生命周期管理：
//! 构建沙箱 → 构建工具分发器 → 在 stdio 上运行 MCP 服务器 → 关闭。

use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncWrite, BufReader};
use tokio::signal;
use tokio::sync::{broadcast, RwLock};
use tracing::{info, warn};

use crate::infra::config::Config;
use crate::infra::error::{Error, Result};
use crate::mcp::McpServer;
use crate::sandbox::SandboxService;
use crate::tools::ToolDispatcher;

/// 服务状态
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceStatus {
    Initializing,
    Running,
    Stopping,
    Stopped,
    Error(String),
}

/// fs-sandbox 服务
#[derive(Clone)]
pub struct FsSandboxService {
    config: Arc<Config>,
    status: Arc<RwLock<ServiceStatus>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl FsSandboxService {
    pub fn new(config: Config) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config: Arc::new(config),
            status: Arc::new(RwLock::new(ServiceStatus::Initializing)),
            shutdown_tx,
        }
    }

    /// 在 stdin/stdout 上运行服务
    pub async fn start(&self) -> Result<()> {
        self.run_with(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .await
    }

    /// 在给定的读写流上运行服务
    ///
    /// 以下任一情况发生时返回：输入流结束、收到 Ctrl+C、调用了 [`Self::stop`]
    pub async fn run_with<R, W>(&self, reader: R, writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!("开始启动服务...");

        let server = match self.build_server() {
            Ok(server) => server,
            Err(e) => {
                *self.status.write().await = ServiceStatus::Error(e.to_string());
                return Err(e);
            }
        };

        // 先订阅，避免错过启动期间发出的关闭信号
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        *self.status.write().await = ServiceStatus::Running;

        let outcome = tokio::select! {
            result = server.run(reader, writer) => result.map_err(Error::from),
            _ = signal::ctrl_c() => {
                warn!("收到 Ctrl+C 信号，准备关闭服务...");
                Ok(())
            }
            _ = shutdown_rx.recv() => {
                info!("收到停止信号");
                Ok(())
            }
        };

        match &outcome {
            Ok(()) => {
                *self.status.write().await = ServiceStatus::Stopped;
                info!("服务已停止");
            }
            Err(e) => {
                *self.status.write().await = ServiceStatus::Error(e.to_string());
            }
        }

        outcome
    }

    /// 构建沙箱、工具分发器和 MCP 服务器
    fn build_server(&self) -> Result<McpServer> {
        let sandbox = SandboxService::from_settings(&self.config.sandbox)?;
        let sandbox_config = sandbox.config();
        info!(
            root = %sandbox_config.root().display(),
            read_only = sandbox_config.read_only(),
            max_file_size = sandbox_config.max_file_size(),
            extensions = sandbox_config.allowed_extensions().len(),
            "沙箱已就绪"
        );

        let dispatcher = ToolDispatcher::new(sandbox);
        Ok(McpServer::new(dispatcher, self.config.server_info()))
    }

    pub async fn stop(&self) {
        info!("正在停止服务...");

        *self.status.write().await = ServiceStatus::Stopping;

        let _ = self.shutdown_tx.send(());

        info!("停止信号已发送");
    }

    pub async fn status(&self) -> ServiceStatus {
        self.status.read().await.clone()
    }
}
