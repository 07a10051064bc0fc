//! 路由与中间件装配（main 与集成测试共用）

use std::any::Any;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Request, State},
    http::{HeaderValue, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
};
use tower_http::{catch_panic::CatchPanicLayer, services::ServeDir};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    config::AppConfig,
    cors::{CorsAllowValues, build_cors_layer, cors_allow_middleware},
    error::AppError,
    features::{health, photos},
    openapi::ApiDoc,
    request_id::request_id_middleware,
    state::AppState,
};

/// 构建完整应用路由
pub fn build_router(state: AppState, config: &AppConfig) -> Router {
    let api = photos::create_photos_router(&config.upload);

    let mut app = Router::<AppState>::new().route("/health", get(health::health_check));
    // axum 不允许在根路径 nest，前缀为空时直接合并
    let prefix = config.api.prefix.trim_end_matches('/');
    app = if prefix.is_empty() {
        app.merge(api)
    } else {
        app.nest(prefix, api)
    };

    let mount: Arc<str> = Arc::from(config.blob.mount_path.trim_end_matches('/'));
    let mut app = app
        .nest_service(&mount, ServeDir::new(&config.blob.dir))
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(state)
        .layer(middleware::from_fn_with_state(
            mount,
            blob_cache_control_middleware,
        ))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(middleware::from_fn_with_state(
            Arc::new(CorsAllowValues::from_config(&config.cors)),
            cors_allow_middleware,
        ))
        .layer(middleware::from_fn(request_id_middleware));

    if let Some(cors) = build_cors_layer(&config.cors) {
        app = app.layer(cors);
    }
    app
}

/// 照片对象文件名带时间戳与随机后缀，内容不会变化，可长期缓存。
async fn blob_cache_control_middleware(
    State(mount): State<Arc<str>>,
    req: Request,
    next: Next,
) -> Response {
    let is_blob = req.uri().path().starts_with(&*mount);
    let mut res = next.run(req).await;
    if is_blob
        && res.status().is_success()
        && res.headers().get(header::CACHE_CONTROL).is_none()
    {
        res.headers_mut().insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static("public, max-age=604800, immutable"),
        );
    }
    res
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    tracing::error!(panic = %detail, "请求处理发生 panic");
    AppError::Internal(detail).into_response()
}
