use anyhow::Context;
use std::path::Path;
use std::sync::Arc;
use syncbridge::{config::AppConfig, logging, server, service::SyncService};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path =
        std::env::var("SYNCBRIDGE_CONFIG").unwrap_or_else(|_| "config.json".to_string());
    let config = AppConfig::load(Path::new(&config_path));

    // guard 保持到进程结束，保证文件日志完整落盘
    let _log_guard = logging::init(&config.log);

    info!("syncbridge v{} 启动", env!("CARGO_PKG_VERSION"));

    let service = Arc::new(
        SyncService::new(
            config.data_root.clone(),
            config.scan.clone(),
            config.compare,
        )
        .context("初始化同步服务失败")?,
    );

    let app = server::router(service);
    let listener = tokio::net::TcpListener::bind(&config.listen)
        .await
        .with_context(|| format!("监听地址绑定失败: {}", config.listen))?;
    info!("HTTP 服务监听 {}", config.listen);

    axum::serve(listener, app).await.context("HTTP 服务异常退出")?;
    Ok(())
}
