//! 优雅退出
//!
//! 监听 SIGINT / SIGTERM（Windows 下为 Ctrl+C），通知 HTTP 服务停止接收新连接。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tokio::sync::Notify;
use tracing::{debug, info};

/// 退出原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// Ctrl+C
    Interrupt,
    /// SIGTERM
    Terminate,
    /// 应用主动退出
    Application,
}

#[derive(Debug, thiserror::Error)]
pub enum ShutdownError {
    #[error("信号设置失败: {0}")]
    SignalSetup(String),
}

#[derive(Debug, Default)]
struct ShutdownInner {
    notify: Notify,
    reason: Mutex<Option<ShutdownReason>>,
    triggered: AtomicBool,
}

/// 退出信号协调器，可克隆后分发给各个任务。
#[derive(Debug, Clone, Default)]
pub struct ShutdownManager {
    inner: Arc<ShutdownInner>,
}

impl ShutdownManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// 触发退出；重复触发只保留第一次的原因。
    pub fn trigger(&self, reason: ShutdownReason) {
        if self
            .inner
            .triggered
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("重复的退出信号被忽略");
            return;
        }
        info!("触发优雅退出: {:?}", reason);
        if let Ok(mut guard) = self.inner.reason.lock() {
            *guard = Some(reason);
        }
        self.inner.notify.notify_waiters();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.inner.triggered.load(Ordering::SeqCst)
    }

    /// 等待退出信号。先触发后等待时立即返回。
    pub async fn wait(&self) -> ShutdownReason {
        let notified = self.inner.notify.notified();
        if !self.is_shutting_down() {
            notified.await;
        }
        self.inner
            .reason
            .lock()
            .ok()
            .and_then(|g| *g)
            .unwrap_or(ShutdownReason::Application)
    }

    /// 启动后台信号监听任务
    pub fn start_signal_handler(&self) -> Result<(), ShutdownError> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};

            let mut sigint = signal(SignalKind::interrupt())
                .map_err(|e| ShutdownError::SignalSetup(e.to_string()))?;
            let mut sigterm = signal(SignalKind::terminate())
                .map_err(|e| ShutdownError::SignalSetup(e.to_string()))?;
            let manager = self.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = sigint.recv() => manager.trigger(ShutdownReason::Interrupt),
                    _ = sigterm.recv() => manager.trigger(ShutdownReason::Terminate),
                }
            });
        }

        #[cfg(not(unix))]
        {
            let manager = self.clone();
            tokio::spawn(async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!("监听 Ctrl+C 失败: {}", e);
                    return;
                }
                manager.trigger(ShutdownReason::Interrupt);
            });
        }

        Ok(())
    }
}
