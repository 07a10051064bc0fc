use std::future::IntoFuture;
use std::sync::Arc;

use rsvp_photos::features::photos::{LocalBlobStore, PhotoStore};
use rsvp_photos::{AppConfig, AppState, ShutdownManager, build_router};

#[tokio::main]
async fn main() {
    // Load config
    if let Err(e) = AppConfig::init_global() {
        eprintln!("Config init failed: {e}");
        std::process::exit(1);
    }
    let config = AppConfig::global();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("rsvp_photos={},tower_http=info", config.logging.level).into()
            }),
        )
        .init();

    let shutdown_manager = ShutdownManager::new();
    if let Err(e) = shutdown_manager.start_signal_handler() {
        tracing::error!("信号处理器启动失败: {}", e);
        std::process::exit(1);
    }

    let photo_store =
        match PhotoStore::connect_sqlite(&config.storage.sqlite_path, config.storage.sqlite_wal)
            .await
        {
            Ok(s) => s,
            Err(e) => {
                tracing::error!("Photo store init failed: {}", e);
                std::process::exit(1);
            }
        };
    if let Err(e) = photo_store.init_schema().await {
        tracing::error!("Photo store schema init failed: {}", e);
        std::process::exit(1);
    }

    // ServeDir 需要挂载目录存在
    for dir in [&config.blob.dir, &config.upload.tmp_dir] {
        if let Err(e) = tokio::fs::create_dir_all(dir).await {
            tracing::error!("Create directory {} failed: {}", dir, e);
            std::process::exit(1);
        }
    }

    if config.admin.tokens.is_empty() {
        tracing::warn!("未配置管理员令牌，清空接口已禁用");
    }

    let app_state = AppState {
        photo_store: Arc::new(photo_store),
        blob_store: Arc::new(LocalBlobStore::from_config(&config.blob)),
        upload: Arc::new(config.upload.clone()),
        admin_tokens: Arc::new(config.admin.tokens.clone()),
    };
    let app = build_router(app_state, config);

    let addr = config.server_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("Bind address failed {}: {}", addr, e);
            std::process::exit(1);
        });

    tracing::info!("Server: http://{}", addr);
    tracing::info!("Docs: http://{}/docs", addr);
    tracing::info!("Health: http://{}/health", addr);
    tracing::info!("Photos API: http://{}{}/photos", addr, config.api.prefix);
    tracing::info!("Blobs: {} -> {}", config.blob.mount_path, config.blob.dir);

    let shutdown_timeout = config.shutdown.timeout_duration();
    let signal = shutdown_manager.clone();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let reason = signal.wait().await;
            tracing::info!("接收到退出信号: {:?}，开始优雅关闭HTTP服务器...", reason);
        })
        .into_future();

    // 收到信号后最多再等 timeout_secs 让在途请求结束
    let forced = async {
        shutdown_manager.wait().await;
        tokio::time::sleep(shutdown_timeout).await;
    };

    tokio::select! {
        res = server => {
            if let Err(e) = res {
                tracing::error!("服务器运行错误: {}", e);
                std::process::exit(1);
            }
            tracing::info!("服务器已优雅关闭");
        }
        _ = forced => {
            tracing::warn!("优雅退出超时（{}秒），强制退出", config.shutdown.timeout_secs);
        }
    }
}
