use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// 照片记录（列表存储中的单个条目，亦即对外返回的数据结构）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "id": "JaneDoe_1760875200000-a1B2c3D4.png",
    "url": "https://photos.example.com/blobs/JaneDoe_1760875200000-a1B2c3D4.png",
    "filename": "IMG_0042.png",
    "guestName": "Jane Doe",
    "eventType": "wedding",
    "uploadedAt": "2026-10-19T12:00:00.000Z",
    "size": 1024,
    "mimetype": "image/png"
}))]
pub struct PhotoRecord {
    /// 对象 URL 的最后一段
    pub id: String,
    /// 对象公开访问地址
    pub url: String,
    /// 原始文件名
    pub filename: String,
    /// 上传者姓名（已去除首尾空白）
    pub guest_name: String,
    /// 活动类型
    pub event_type: String,
    /// 上传时间（ISO-8601，毫秒精度）
    pub uploaded_at: String,
    /// 文件大小（字节）
    pub size: u64,
    /// MIME 类型
    pub mimetype: String,
}

impl PhotoRecord {
    /// 删除时的匹配规则：id 完全相等，或 url 包含该标识
    pub fn matches(&self, ident: &str) -> bool {
        self.id == ident || self.url.contains(ident)
    }
}

/// 取 URL 路径的最后一段作为照片 id（忽略查询串与片段）
pub fn id_from_url(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(path)
        .to_string()
}

/// 与 JS `Date.prototype.toISOString` 一致的时间格式
pub fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// 照片列表响应
#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PhotoListResponse {
    pub success: bool,
    /// 最新上传的在前
    pub photos: Vec<PhotoRecord>,
    pub count: usize,
}

/// 上传成功响应
#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    #[schema(example = "Photo uploaded successfully")]
    pub message: String,
    pub photo: PhotoRecord,
}

/// 上传表单（仅用于 OpenAPI 文档）
#[derive(Debug, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadPhotoForm {
    /// 照片文件
    #[schema(value_type = String, format = Binary)]
    pub photo: Vec<u8>,
    /// 上传者姓名
    pub guest_name: String,
    /// 活动类型，缺省为 wedding
    pub event_type: Option<String>,
}

/// 删除单张照片请求
#[derive(Debug, Default, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeletePhotoRequest {
    /// 照片 id，或其 url 中的任意片段
    #[serde(default)]
    pub photo_id: Option<String>,
}

/// 通用成功响应
#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub success: bool,
    #[schema(example = "Photo deleted successfully")]
    pub message: String,
}

/// 清空响应
#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClearPhotosResponse {
    pub success: bool,
    pub message: String,
    /// 清空前列表中的条目数
    pub deleted_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> PhotoRecord {
        PhotoRecord {
            id: "JaneDoe_1700000000000-abcd1234.png".into(),
            url: "http://localhost/blobs/JaneDoe_1700000000000-abcd1234.png".into(),
            filename: "me.png".into(),
            guest_name: "Jane Doe".into(),
            event_type: "wedding".into(),
            uploaded_at: "2023-11-14T22:13:20.000Z".into(),
            size: 1024,
            mimetype: "image/png".into(),
        }
    }

    #[test]
    fn serializes_as_camel_case() {
        let v = serde_json::to_value(sample()).expect("serialize");
        assert_eq!(v["guestName"], "Jane Doe");
        assert_eq!(v["eventType"], "wedding");
        assert_eq!(v["uploadedAt"], "2023-11-14T22:13:20.000Z");
        assert_eq!(v["mimetype"], "image/png");
        assert!(v.get("guest_name").is_none());
    }

    #[test]
    fn matches_by_id_or_url_fragment() {
        let p = sample();
        assert!(p.matches("JaneDoe_1700000000000-abcd1234.png"));
        assert!(p.matches("1700000000000-abcd"));
        assert!(!p.matches("JohnDoe"));
    }

    #[test]
    fn id_is_last_url_segment() {
        assert_eq!(id_from_url("https://cdn.example.com/a/b/c.jpg"), "c.jpg");
        assert_eq!(id_from_url("https://cdn.example.com/a/c.jpg?v=1"), "c.jpg");
        assert_eq!(id_from_url("c.jpg"), "c.jpg");
    }

    #[test]
    fn timestamp_has_millis_and_z() {
        let at = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        assert_eq!(iso_timestamp(at), "2023-11-14T22:13:20.123Z");
    }
}
