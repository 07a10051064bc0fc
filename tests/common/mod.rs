#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, Bytes, to_bytes},
    http::{Request, Response, header},
};
use tower::ServiceExt;

use rsvp_photos::config::{AppConfig, UploadConfig};
use rsvp_photos::error::BlobError;
use rsvp_photos::features::photos::PhotoStore;
use rsvp_photos::features::photos::blob::{BlobStore, PutBlobResult, PutOptions};
use rsvp_photos::{AppState, build_router};

pub const ADMIN_TOKEN: &str = "test-admin";
pub const BLOB_BASE: &str = "https://blob.test/photos";
const BOUNDARY: &str = "----rsvp-test-boundary";

/// 内存对象存储，可切换为删除失败
#[derive(Default)]
pub struct MemoryBlobStore {
    objects: Mutex<HashMap<String, Bytes>>,
    pub fail_deletes: AtomicBool,
    pub fail_puts: AtomicBool,
    pub puts: AtomicUsize,
    pub deletes: AtomicUsize,
}

impl MemoryBlobStore {
    pub fn contains(&self, url: &str) -> bool {
        self.objects.lock().unwrap().contains_key(url)
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(
        &self,
        name: &str,
        body: Bytes,
        _opts: PutOptions,
    ) -> Result<PutBlobResult, BlobError> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(BlobError::Io(std::io::Error::other("blob put refused")));
        }
        let n = self.puts.fetch_add(1, Ordering::SeqCst);
        // 模拟随机后缀，保证同名上传不会覆盖
        let pathname = match name.rsplit_once('.') {
            Some((stem, ext)) => format!("{stem}-t{n}.{ext}"),
            None => format!("{name}-t{n}"),
        };
        let url = format!("{BLOB_BASE}/{pathname}");
        self.objects.lock().unwrap().insert(url.clone(), body);
        Ok(PutBlobResult { url, pathname })
    }

    async fn del(&self, url: &str) -> Result<(), BlobError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(BlobError::Io(std::io::Error::other("blob delete refused")));
        }
        self.objects.lock().unwrap().remove(url);
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub photo_store: Arc<PhotoStore>,
    pub blobs: Arc<MemoryBlobStore>,
    pub tmp_dir: PathBuf,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_admin_tokens(vec![ADMIN_TOKEN.to_string()]).await
    }

    pub async fn with_admin_tokens(tokens: Vec<String>) -> Self {
        let tmp_dir = std::env::temp_dir().join(format!("rsvp-photos-{}", uuid::Uuid::new_v4()));
        let mut config = AppConfig::default();
        config.upload = UploadConfig {
            tmp_dir: tmp_dir.to_string_lossy().into_owned(),
            ..UploadConfig::default()
        };
        config.blob.dir = tmp_dir.join("blobs").to_string_lossy().into_owned();

        let photo_store = Arc::new(PhotoStore::in_memory().await.expect("in-memory store"));
        let blobs = Arc::new(MemoryBlobStore::default());
        let state = AppState {
            photo_store: photo_store.clone(),
            blob_store: blobs.clone(),
            upload: Arc::new(config.upload.clone()),
            admin_tokens: Arc::new(tokens),
        };
        Self {
            router: build_router(state, &config),
            photo_store,
            blobs,
            tmp_dir,
        }
    }

    pub async fn send(&self, req: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(req).await.expect("call app")
    }

    /// 临时目录中残留的上传分片数量
    pub fn leftover_parts(&self) -> usize {
        std::fs::read_dir(&self.tmp_dir)
            .map(|entries| {
                entries
                    .filter_map(Result::ok)
                    .filter(|e| e.file_name().to_string_lossy().ends_with(".part"))
                    .count()
            })
            .unwrap_or(0)
    }

    pub async fn upload(&self, guest: &str, file_name: &str, mime: &str, data: &[u8]) -> serde_json::Value {
        let body = MultipartBody::new()
            .file("photo", file_name, mime, data)
            .text("guestName", guest)
            .finish();
        let resp = self.send(body.into_request("/api/photos")).await;
        assert_eq!(resp.status(), 200, "upload should succeed");
        read_json(resp).await
    }
}

/// 手工拼装 multipart/form-data 请求体
#[derive(Default)]
pub struct MultipartBody {
    buf: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.buf.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, mime: &str, data: &[u8]) -> Self {
        self.buf.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: {mime}\r\n\r\n"
            )
            .as_bytes(),
        );
        self.buf.extend_from_slice(data);
        self.buf.extend_from_slice(b"\r\n");
        self
    }

    pub fn finish(mut self) -> Self {
        self.buf
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        self
    }

    pub fn into_request(self, uri: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(self.buf))
            .expect("build multipart request")
    }
}

pub async fn read_json(resp: Response<Body>) -> serde_json::Value {
    let body = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("parse json")
}

pub fn json_delete(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("build delete request")
}
