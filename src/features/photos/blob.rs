//! 对象存储抽象与本地目录实现

use async_trait::async_trait;
use axum::body::Bytes;
use rand::{Rng, distributions::Alphanumeric};
use std::path::{Path, PathBuf};

use crate::config::BlobConfig;
use crate::error::BlobError;

use super::models::id_from_url;

/// 对象访问级别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobAccess {
    Public,
    Private,
}

/// 写入选项
#[derive(Debug, Clone)]
pub struct PutOptions {
    pub access: BlobAccess,
    pub content_type: String,
}

/// 写入结果
#[derive(Debug, Clone)]
pub struct PutBlobResult {
    /// 对外可访问地址
    pub url: String,
    /// 存储内的对象名（可能带随机后缀）
    pub pathname: String,
}

/// 对象存储：按名写入、按 URL 删除
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, name: &str, body: Bytes, opts: PutOptions)
    -> Result<PutBlobResult, BlobError>;

    async fn del(&self, url: &str) -> Result<(), BlobError>;
}

/// 本地目录对象存储，配合静态文件服务对外暴露
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
    public_base_url: String,
    random_suffix: bool,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: &str, random_suffix: bool) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            random_suffix,
        }
    }

    pub fn from_config(cfg: &BlobConfig) -> Self {
        Self::new(&cfg.dir, &cfg.public_base_url, cfg.random_suffix)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_key(&self, name: &str) -> String {
        if !self.random_suffix {
            return name.to_string();
        }
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(8)
            .map(char::from)
            .collect();
        match name.rsplit_once('.') {
            Some((stem, ext)) => format!("{stem}-{suffix}.{ext}"),
            None => format!("{name}-{suffix}"),
        }
    }
}

/// 对象名只允许单段安全字符，杜绝 `..` 与目录穿越
fn is_safe_key(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= 255
        && !key.starts_with('.')
        && key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(
        &self,
        name: &str,
        body: Bytes,
        opts: PutOptions,
    ) -> Result<PutBlobResult, BlobError> {
        if opts.access != BlobAccess::Public {
            return Err(BlobError::Unsupported("本地对象存储仅支持 public 访问".into()));
        }
        let key = self.object_key(name);
        if !is_safe_key(&key) {
            return Err(BlobError::InvalidUrl(key));
        }

        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(self.root.join(&key), &body).await?;

        tracing::debug!(
            key = %key,
            size = body.len(),
            content_type = %opts.content_type,
            "对象已写入"
        );
        Ok(PutBlobResult {
            url: format!("{}/{}", self.public_base_url, key),
            pathname: key,
        })
    }

    async fn del(&self, url: &str) -> Result<(), BlobError> {
        if !url.starts_with(&self.public_base_url) {
            return Err(BlobError::InvalidUrl(url.to_string()));
        }
        let key = id_from_url(url);
        if !is_safe_key(&key) {
            return Err(BlobError::InvalidUrl(url.to_string()));
        }
        match tokio::fs::remove_file(self.root.join(&key)).await {
            Ok(()) => Ok(()),
            // 已不存在视为删除成功
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_root() -> PathBuf {
        std::env::temp_dir().join(format!("rsvp-photos-blob-{}", uuid::Uuid::new_v4().simple()))
    }

    fn png() -> PutOptions {
        PutOptions {
            access: BlobAccess::Public,
            content_type: "image/png".into(),
        }
    }

    #[test]
    fn safe_key_rules() {
        assert!(is_safe_key("JaneDoe_1700000000000-abCD1234.png"));
        assert!(!is_safe_key(""));
        assert!(!is_safe_key(".."));
        assert!(!is_safe_key("a/b.png"));
        assert!(!is_safe_key(".hidden"));
    }

    #[test]
    fn random_suffix_goes_before_extension() {
        let store = LocalBlobStore::new("/tmp/unused", "http://h/blobs/", true);
        let key = store.object_key("Jane_1.png");
        assert!(key.starts_with("Jane_1-"));
        assert!(key.ends_with(".png"));
        assert_eq!(key.len(), "Jane_1-".len() + 8 + ".png".len());
    }

    #[tokio::test]
    async fn put_then_del_roundtrip_on_disk() {
        let root = temp_root();
        let store = LocalBlobStore::new(&root, "http://h/blobs", false);

        let res = store
            .put("Jane_1.png", Bytes::from_static(b"png-bytes"), png())
            .await
            .expect("put");
        assert_eq!(res.url, "http://h/blobs/Jane_1.png");
        assert_eq!(res.pathname, "Jane_1.png");
        assert!(root.join("Jane_1.png").exists());

        store.del(&res.url).await.expect("del");
        assert!(!root.join("Jane_1.png").exists());
        // 重复删除不报错
        store.del(&res.url).await.expect("del twice");

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn del_rejects_foreign_or_traversal_urls() {
        let store = LocalBlobStore::new(temp_root(), "http://h/blobs", false);
        assert!(store.del("http://other/blobs/a.png").await.is_err());
        assert!(store.del("http://h/blobs/..").await.is_err());
    }

    #[tokio::test]
    async fn private_access_is_unsupported() {
        let store = LocalBlobStore::new(temp_root(), "http://h/blobs", false);
        let opts = PutOptions {
            access: BlobAccess::Private,
            content_type: "image/png".into(),
        };
        let err = store
            .put("a.png", Bytes::from_static(b"x"), opts)
            .await
            .expect_err("private put should fail");
        assert!(matches!(err, BlobError::Unsupported(_)));
    }
}
