pub mod blob;
pub mod handler;
pub mod models;
pub mod storage;
pub mod upload;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get},
};

use crate::{config::UploadConfig, state::AppState};

pub use blob::{BlobStore, LocalBlobStore};
pub use handler::{clear_photos, delete_photo, list_photos, upload_photo};
pub use models::PhotoRecord;
pub use storage::PhotoStore;

/// 照片路由：同一路径按方法分发，未注册的方法统一 405（`OPTIONS` 由全局中间件应答）。
///
/// 请求体上限按单文件上限放宽 1 MiB，真正的文件大小在解析时逐块校验。
pub fn create_photos_router(upload: &UploadConfig) -> Router<AppState> {
    Router::new()
        .route(
            "/photos",
            get(handler::list_photos)
                .post(handler::upload_photo)
                .delete(handler::delete_photo)
                .fallback(handler::method_not_allowed),
        )
        .route(
            "/admin/photos",
            delete(handler::clear_photos)
                .fallback(handler::method_not_allowed),
        )
        .layer(DefaultBodyLimit::max(upload.request_body_limit()))
}
