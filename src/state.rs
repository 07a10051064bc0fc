use std::sync::Arc;

use crate::config::UploadConfig;
use crate::features::photos::{blob::BlobStore, storage::PhotoStore};

/// 聚合的应用共享状态
#[derive(Clone)]
pub struct AppState {
    /// 照片列表 + 计数器
    pub photo_store: Arc<PhotoStore>,
    /// 照片对象存储
    pub blob_store: Arc<dyn BlobStore>,
    /// 上传限制与默认值
    pub upload: Arc<UploadConfig>,
    /// 管理员令牌（为空则管理接口关闭）
    pub admin_tokens: Arc<Vec<String>>,
}
