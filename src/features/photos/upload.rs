//! 上传表单解析：把文件字段落盘到临时文件，同时收集文本字段

use axum::extract::multipart::{Field, Multipart, MultipartError};
use axum::http::StatusCode;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::config::UploadConfig;
use crate::error::AppError;

pub const FIELD_PHOTO: &str = "photo";
pub const FIELD_GUEST_NAME: &str = "guestName";
pub const FIELD_EVENT_TYPE: &str = "eventType";

/// 解析阶段落盘的上传文件
#[derive(Debug)]
pub struct SpooledFile {
    pub path: PathBuf,
    pub size: u64,
    /// 表单中声明的 Content-Type
    pub mimetype: Option<String>,
    pub original_name: Option<String>,
}

impl SpooledFile {
    /// 尽力删除临时文件，失败只记日志
    pub async fn cleanup(self) {
        if let Err(e) = tokio::fs::remove_file(&self.path).await {
            tracing::warn!(path = %self.path.display(), error = %e, "临时文件清理失败");
        }
    }
}

/// 解析后的上传表单
#[derive(Debug, Default)]
pub struct UploadForm {
    pub file: Option<SpooledFile>,
    pub guest_name: Option<String>,
    pub event_type: Option<String>,
}

/// 校验通过后的上传内容
#[derive(Debug)]
pub struct ValidatedUpload<'a> {
    pub file: &'a SpooledFile,
    pub guest_name: String,
    pub event_type: String,
    pub mimetype: String,
}

impl UploadForm {
    /// 逐字段读取 multipart。
    ///
    /// 文件边读边写入 `tmp_dir`，超过 `max_file_size` 立即中止；最多接受一个文件。
    /// 出错时自行清理已落盘的临时文件。
    pub async fn parse(mut multipart: Multipart, cfg: &UploadConfig) -> Result<Self, AppError> {
        let mut form = UploadForm::default();
        let result = form.read_fields(&mut multipart, cfg).await;
        if let Err(e) = result {
            form.cleanup().await;
            return Err(e);
        }
        Ok(form)
    }

    async fn read_fields(
        &mut self,
        multipart: &mut Multipart,
        cfg: &UploadConfig,
    ) -> Result<(), AppError> {
        while let Some(field) = multipart.next_field().await.map_err(map_multipart_error)? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                FIELD_PHOTO => {
                    if self.file.is_some() {
                        return Err(AppError::Validation(
                            "Only one photo can be uploaded per request".into(),
                        ));
                    }
                    self.file = spool_field(field, cfg).await?;
                }
                FIELD_GUEST_NAME => {
                    self.guest_name = Some(field.text().await.map_err(map_multipart_error)?);
                }
                FIELD_EVENT_TYPE => {
                    self.event_type = Some(field.text().await.map_err(map_multipart_error)?);
                }
                other => {
                    tracing::debug!(field = other, "忽略未知表单字段");
                    // 未读取的字段会在 next_field 时被跳过
                }
            }
        }
        Ok(())
    }

    /// 按顺序校验：文件存在且非空 → 姓名非空 → 类型白名单 → 大小上限
    pub fn validate(&self, cfg: &UploadConfig) -> Result<ValidatedUpload<'_>, AppError> {
        let file = match &self.file {
            Some(f) if f.size > 0 => f,
            _ => return Err(AppError::Validation("No photo uploaded".into())),
        };

        let guest_name = self.guest_name.as_deref().map(str::trim).unwrap_or("");
        if guest_name.is_empty() {
            return Err(AppError::Validation("Guest name is required".into()));
        }

        let mimetype = file.mimetype.as_deref().unwrap_or("").trim().to_ascii_lowercase();
        if !cfg.is_allowed_mime(&mimetype) {
            return Err(AppError::Validation(
                "Invalid file type. Only JPEG, PNG, and WebP images are allowed".into(),
            ));
        }

        if file.size > cfg.max_file_size {
            return Err(too_large(cfg));
        }

        let event_type = self
            .event_type
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(cfg.default_event_type.as_str())
            .to_string();

        Ok(ValidatedUpload {
            file,
            guest_name: guest_name.to_string(),
            event_type,
            mimetype,
        })
    }

    pub async fn cleanup(&mut self) {
        if let Some(file) = self.file.take() {
            file.cleanup().await;
        }
    }
}

/// 生成对象名：姓名仅保留 ASCII 字母数字，拼接毫秒时间戳与原扩展名
pub fn storage_filename(guest_name: &str, original_name: Option<&str>, timestamp_ms: i64) -> String {
    let mut sanitized: String = guest_name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    if sanitized.is_empty() {
        sanitized.push_str("guest");
    }
    format!("{sanitized}_{timestamp_ms}.{}", file_extension(original_name))
}

fn file_extension(original_name: Option<&str>) -> String {
    original_name
        .and_then(|n| n.rsplit_once('.'))
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty() && ext.bytes().all(|b| b.is_ascii_alphanumeric()))
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| "jpg".to_string())
}

fn too_large(cfg: &UploadConfig) -> AppError {
    AppError::PayloadTooLarge(format!(
        "File too large. Maximum size is {}MB",
        cfg.max_file_size / (1024 * 1024)
    ))
}

fn map_multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(e.body_text())
    } else if e.status().is_client_error() {
        AppError::Validation(format!("Malformed upload: {}", e.body_text()))
    } else {
        AppError::Multipart(e.body_text())
    }
}

async fn spool_field(
    mut field: Field<'_>,
    cfg: &UploadConfig,
) -> Result<Option<SpooledFile>, AppError> {
    let original_name = field.file_name().map(str::to_string);
    let mimetype = field.content_type().map(str::to_string);

    let dir = Path::new(&cfg.tmp_dir);
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| AppError::Multipart(format!("create tmp dir: {e}")))?;
    let path = dir.join(format!("upload-{}.part", Uuid::new_v4().simple()));
    let mut spooled = SpooledFile {
        path,
        size: 0,
        mimetype,
        original_name,
    };

    let written = write_chunks(&mut field, &mut spooled, cfg).await;
    match written {
        Ok(()) => Ok(Some(spooled)),
        Err(e) => {
            spooled.cleanup().await;
            Err(e)
        }
    }
}

async fn write_chunks(
    field: &mut Field<'_>,
    spooled: &mut SpooledFile,
    cfg: &UploadConfig,
) -> Result<(), AppError> {
    let mut out = tokio::fs::File::create(&spooled.path)
        .await
        .map_err(|e| AppError::Multipart(format!("create tmp file: {e}")))?;
    while let Some(chunk) = field.chunk().await.map_err(map_multipart_error)? {
        spooled.size += chunk.len() as u64;
        if spooled.size > cfg.max_file_size {
            return Err(too_large(cfg));
        }
        out.write_all(&chunk)
            .await
            .map_err(|e| AppError::Multipart(format!("write tmp file: {e}")))?;
    }
    out.flush()
        .await
        .map_err(|e| AppError::Multipart(format!("flush tmp file: {e}")))?;
    Ok(())
}
