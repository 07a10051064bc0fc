use axum::{extract::State, http::StatusCode, response::Json};
use serde::Serialize;

use crate::state::AppState;

/// 健康检查响应
#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// 服务状态：healthy / degraded
    #[schema(example = "healthy")]
    pub status: String,
    /// 服务名称
    #[schema(example = "rsvp-photos")]
    pub service: String,
    /// 当前版本（Cargo package version）
    #[schema(example = "0.1.0")]
    pub version: String,
    /// 计数器中的照片数量；列表存储不可用时为空
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_count: Option<i64>,
}

#[utoipa::path(
    get,
    path = "/health",
    summary = "健康检查",
    description = "用于探活的健康检查端点，返回服务状态、版本与照片计数。列表存储不可用时状态为 degraded。",
    responses((status = 200, description = "服务存活", body = HealthResponse)),
    tag = "Health"
)]
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let (status, photo_count) = match state.photo_store.count().await {
        Ok(n) => ("healthy", Some(n)),
        Err(e) => {
            tracing::warn!(error = %e, "健康检查：列表存储不可用");
            ("degraded", None)
        }
    };
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: status.to_string(),
            service: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            photo_count,
        }),
    )
}
