/// 统一错误处理模块
pub mod error;

/// 配置模块
pub mod config;

/// CORS 层构建
pub mod cors;

/// 请求 ID 中间件
pub mod request_id;

/// 功能聚合模块
pub mod features;

/// 应用状态聚合模块
pub mod state;

/// 优雅退出管理模块
pub mod shutdown;

/// OpenAPI 文档
pub mod openapi;

/// 路由装配
pub mod app;

// 导出常用类型供外部使用
pub use app::build_router;
pub use config::AppConfig;
pub use error::AppError;
pub use shutdown::{ShutdownManager, ShutdownReason};
pub use state::AppState;
