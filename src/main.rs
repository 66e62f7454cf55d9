//! fs-sandbox 主入口

use clap::Parser;
use std::process::ExitCode;

use fs_sandbox::cli::{program, Args};

// 主函数
#[tokio::main]
async fn main() -> ExitCode {
    // 加载 .env 文件
    dotenv::dotenv().ok();

    let args = Args::parse();

    match program::run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("fs-sandbox: {}", e);
            ExitCode::FAILURE
        }
    }
}
