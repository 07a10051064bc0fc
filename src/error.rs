use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// 应用统一错误类型
#[derive(Error, Debug)]
pub enum AppError {
    /// 参数校验错误（缺少文件、姓名为空、类型不允许等）
    #[error("{0}")]
    Validation(String),

    /// 上传文件超过大小上限
    #[error("{0}")]
    PayloadTooLarge(String),

    /// 资源不存在
    #[error("{0}")]
    NotFound(String),

    /// 不支持的请求方法
    #[error("Method {0} not allowed")]
    MethodNotAllowed(String),

    /// 认证失败（管理员令牌缺失/无效）
    #[error("{0}")]
    Auth(String),

    /// 禁止访问
    #[error("{0}")]
    Forbidden(String),

    /// 表单解析错误（读取请求体/写临时文件失败）
    #[error("表单解析错误: {0}")]
    Multipart(String),

    /// 对象存储错误
    #[error("对象存储错误: {0}")]
    Blob(#[from] BlobError),

    /// 列表存储错误
    #[error("列表存储错误: {0}")]
    Store(#[from] StoreError),

    /// 内部服务器错误
    #[error("内部错误: {0}")]
    Internal(String),
}

/// 对象存储错误类型
#[derive(Error, Debug)]
pub enum BlobError {
    /// I/O 错误
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 对象 URL 无法解析为本存储的对象
    #[error("无效的对象地址: {0}")]
    InvalidUrl(String),

    /// 不支持的访问级别等
    #[error("不支持的功能: {0}")]
    Unsupported(String),
}

/// 列表存储错误类型
#[derive(Error, Debug)]
pub enum StoreError {
    /// 数据库错误
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    /// 列表中的条目无法反序列化
    #[error("条目反序列化失败: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// 统一错误响应体。
///
/// `error` 为面向用户的可读信息；下游故障只返回概括性文案，细节仅写入日志。
#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    /// 恒为 false
    #[schema(example = false)]
    pub success: bool,
    /// 可读错误信息
    #[schema(example = "Guest name is required")]
    pub error: String,
    /// 稳定的错误码，用于程序化处理
    #[schema(example = "VALIDATION_FAILED")]
    pub code: String,
    /// 请求追踪 ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Multipart(_)
            | AppError::Blob(_)
            | AppError::Store(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn stable_code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_FAILED",
            AppError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::MethodNotAllowed(_) => "METHOD_NOT_ALLOWED",
            AppError::Auth(_) => "UNAUTHORIZED",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::Multipart(_) => "UPLOAD_PARSE_FAILED",
            AppError::Blob(_) => "BLOB_STORE_ERROR",
            AppError::Store(_) => "LIST_STORE_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 是否属于客户端输入错误（4xx）
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    fn public_message(&self) -> String {
        if self.is_client_error() {
            self.to_string()
        } else {
            "Internal server error".to_string()
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody {
            success: false,
            error: self.public_message(),
            code: self.stable_code().to_string(),
            request_id: crate::request_id::current_request_id(),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_keep_their_message() {
        let e = AppError::Validation("Guest name is required".into());
        assert_eq!(e.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(e.public_message(), "Guest name is required");
    }

    #[test]
    fn downstream_errors_hide_details() {
        let e = AppError::Blob(BlobError::InvalidUrl("http://x/../etc".into()));
        assert_eq!(e.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(e.public_message(), "Internal server error");
        assert_eq!(e.stable_code(), "BLOB_STORE_ERROR");
    }

    #[test]
    fn method_not_allowed_names_the_method() {
        let e = AppError::MethodNotAllowed("PATCH".into());
        assert_eq!(e.status_code(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(e.to_string(), "Method PATCH not allowed");
    }
}
