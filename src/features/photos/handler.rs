//! 照片 API 处理模块：上传 / 列表 / 删除单张 / 清空

use axum::{
    body::Bytes,
    extract::{Multipart, Query, State, multipart::MultipartRejection},
    http::{HeaderMap, Method},
    response::Json,
};
use chrono::Utc;

use crate::{error::AppError, state::AppState};

use super::blob::{BlobAccess, PutOptions};
use super::models::{
    ClearPhotosResponse, DeletePhotoRequest, MessageResponse, PhotoListResponse, PhotoRecord,
    UploadResponse, id_from_url, iso_timestamp,
};
use super::upload::{UploadForm, storage_filename};

/// 管理员令牌请求头
pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// 给失败结果打上操作上下文并记录日志
fn log_failure(context: &'static str) -> impl Fn(AppError) -> AppError {
    move |e| {
        if e.is_client_error() {
            tracing::warn!(target: "rsvp_photos::photos", context, error = %e, "请求被拒绝");
        } else {
            tracing::error!(target: "rsvp_photos::photos", context, error = %e, "照片操作失败");
        }
        e
    }
}

/// 获取全部照片
#[utoipa::path(
    get,
    path = "/photos",
    summary = "照片列表",
    description = "返回全部照片记录，最新上传的在前。",
    responses(
        (status = 200, description = "照片列表", body = PhotoListResponse),
        (status = 500, description = "列表存储读取失败", body = crate::error::ErrorBody)
    ),
    tag = "Photos"
)]
pub async fn list_photos(State(state): State<AppState>) -> Result<Json<PhotoListResponse>, AppError> {
    let photos: Vec<PhotoRecord> = state
        .photo_store
        .range_all()
        .await
        .map_err(|e| log_failure("photos.list")(e.into()))?
        .into_iter()
        .map(|p| p.record)
        .collect();

    tracing::debug!(count = photos.len(), "照片列表已读取");
    Ok(Json(PhotoListResponse {
        success: true,
        count: photos.len(),
        photos,
    }))
}

/// 上传照片
#[utoipa::path(
    post,
    path = "/photos",
    summary = "上传照片",
    description = "multipart/form-data：`photo` 文件（JPEG/PNG/WebP，≤10MB）、`guestName`、可选 `eventType`。",
    request_body(content = super::models::UploadPhotoForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "上传成功", body = UploadResponse),
        (status = 400, description = "缺少文件/姓名为空/类型不允许", body = crate::error::ErrorBody),
        (status = 413, description = "文件过大", body = crate::error::ErrorBody),
        (status = 500, description = "解析/对象存储/列表存储失败", body = crate::error::ErrorBody)
    ),
    tag = "Photos"
)]
pub async fn upload_photo(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, AppError> {
    let result = async {
        let multipart = multipart.map_err(|e| {
            AppError::Validation(format!("Expected multipart/form-data: {}", e.body_text()))
        })?;
        let mut form = UploadForm::parse(multipart, &state.upload).await?;
        let outcome = store_upload(&state, &form).await;
        form.cleanup().await;
        outcome
    }
    .await;

    result.map(Json).map_err(log_failure("photos.upload"))
}

/// 校验通过后：先写对象，成功后再写列表与计数器
async fn store_upload(state: &AppState, form: &UploadForm) -> Result<UploadResponse, AppError> {
    let upload = form.validate(&state.upload)?;

    let bytes = tokio::fs::read(&upload.file.path)
        .await
        .map_err(|e| AppError::Multipart(format!("read tmp file: {e}")))?;

    let now = Utc::now();
    let name = storage_filename(
        &upload.guest_name,
        upload.file.original_name.as_deref(),
        now.timestamp_millis(),
    );
    let blob = state
        .blob_store
        .put(
            &name,
            Bytes::from(bytes),
            PutOptions {
                access: BlobAccess::Public,
                content_type: upload.mimetype.clone(),
            },
        )
        .await?;

    let record = PhotoRecord {
        id: id_from_url(&blob.url),
        url: blob.url,
        filename: upload.file.original_name.clone().unwrap_or(name),
        guest_name: upload.guest_name.clone(),
        event_type: upload.event_type.clone(),
        uploaded_at: iso_timestamp(now),
        size: upload.file.size,
        mimetype: upload.mimetype.clone(),
    };

    if let Err(e) = state.photo_store.push_front(&record).await {
        // 对象不回滚：记录下来便于人工清理
        tracing::error!(url = %record.url, error = %e, "对象已写入但列表写入失败");
        return Err(e.into());
    }

    tracing::info!(
        photo_id = %record.id,
        guest_name = %record.guest_name,
        size = record.size,
        "照片上传成功"
    );
    Ok(UploadResponse {
        success: true,
        message: "Photo uploaded successfully".to_string(),
        photo: record,
    })
}

/// 删除单张照片
#[utoipa::path(
    delete,
    path = "/photos",
    summary = "删除照片",
    description = "按 photoId 删除：与 id 完全相等或包含于 url 的第一条记录。photoId 取自 JSON 请求体，缺省时取查询参数。",
    params(("photoId" = Option<String>, Query, description = "请求体未提供时使用")),
    request_body(content = DeletePhotoRequest, content_type = "application/json"),
    responses(
        (status = 200, description = "删除成功", body = MessageResponse),
        (status = 400, description = "缺少 photoId / 请求体不是合法 JSON", body = crate::error::ErrorBody),
        (status = 404, description = "照片不存在", body = crate::error::ErrorBody),
        (status = 500, description = "列表存储失败", body = crate::error::ErrorBody)
    ),
    tag = "Photos"
)]
pub async fn delete_photo(
    State(state): State<AppState>,
    query: Option<Query<DeletePhotoRequest>>,
    body: Bytes,
) -> Result<Json<MessageResponse>, AppError> {
    let result = async {
        let ident = photo_id_from(query.map(|Query(q)| q), &body)?;

        let found = state
            .photo_store
            .find_first(&ident)
            .await?
            .ok_or_else(|| AppError::NotFound("Photo not found".to_string()))?;

        if let Err(e) = state.blob_store.del(&found.record.url).await {
            tracing::warn!(photo_id = %found.record.id, error = %e, "对象删除失败，继续移除记录");
        }

        if !state.photo_store.remove_entry(found.seq).await? {
            tracing::warn!(photo_id = %found.record.id, "记录已被并发移除");
        }

        tracing::info!(photo_id = %found.record.id, "照片已删除");
        Ok::<_, AppError>(MessageResponse {
            success: true,
            message: "Photo deleted successfully".to_string(),
        })
    }
    .await;

    result.map(Json).map_err(log_failure("photos.delete"))
}

/// 请求体 `{photoId}` 优先，其次查询参数；去除空白后不能为空
fn photo_id_from(query: Option<DeletePhotoRequest>, body: &[u8]) -> Result<String, AppError> {
    let from_body = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        serde_json::from_slice::<DeletePhotoRequest>(body)
            .map_err(|e| AppError::Validation(format!("Invalid JSON body: {e}")))?
            .photo_id
    };

    [from_body, query.and_then(|q| q.photo_id)]
        .into_iter()
        .flatten()
        .map(|s| s.trim().to_string())
        .find(|s| !s.is_empty())
        .ok_or_else(|| AppError::Validation("Photo ID is required".to_string()))
}

/// 清空全部照片（管理端）
#[utoipa::path(
    delete,
    path = "/admin/photos",
    summary = "清空全部照片",
    description = "需要在 Header 中提供 X-Admin-Token，令牌来源于 config.admin.tokens。逐个删除对象（失败只记日志），随后清空列表与计数器。",
    params(("X-Admin-Token" = String, Header, description = "管理员令牌（config.admin.tokens）")),
    security(("AdminToken" = [])),
    responses(
        (status = 200, description = "已清空", body = ClearPhotosResponse),
        (status = 401, description = "管理员令牌缺失/无效", body = crate::error::ErrorBody),
        (status = 403, description = "未配置管理员令牌，接口关闭", body = crate::error::ErrorBody),
        (status = 500, description = "列表存储失败", body = crate::error::ErrorBody)
    ),
    tag = "Photos"
)]
pub async fn clear_photos(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ClearPhotosResponse>, AppError> {
    let result = async {
        require_admin(&state.admin_tokens, &headers)?;

        let snapshot = state.photo_store.range_all().await?;
        let mut blob_failures = 0usize;
        for photo in &snapshot {
            if let Err(e) = state.blob_store.del(&photo.record.url).await {
                blob_failures += 1;
                tracing::warn!(photo_id = %photo.record.id, error = %e, "对象删除失败");
            }
        }

        let max_seq = snapshot.iter().map(|p| p.seq).max().unwrap_or(0);
        state.photo_store.clear_through(max_seq).await?;

        tracing::info!(
            deleted = snapshot.len(),
            blob_failures,
            "照片已全部清空"
        );
        Ok::<_, AppError>(ClearPhotosResponse {
            success: true,
            message: "All photos deleted".to_string(),
            deleted_count: snapshot.len(),
        })
    }
    .await;

    result.map(Json).map_err(log_failure("photos.clear"))
}

pub(crate) fn require_admin(tokens: &[String], headers: &HeaderMap) -> Result<(), AppError> {
    if tokens.iter().all(|t| t.trim().is_empty()) {
        return Err(AppError::Forbidden("Admin endpoint is disabled".into()));
    }
    let provided = headers
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .trim();
    if provided.is_empty() {
        return Err(AppError::Auth("Missing admin token".into()));
    }
    if !tokens.iter().any(|t| t.trim() == provided) {
        return Err(AppError::Auth("Invalid admin token".into()));
    }
    Ok(())
}

/// 未注册的方法统一返回 405 + `{error}`
pub async fn method_not_allowed(method: Method) -> AppError {
    log_failure("photos.dispatch")(AppError::MethodNotAllowed(method.to_string()))
}
