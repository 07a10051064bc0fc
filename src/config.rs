use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 全局配置单例
static CONFIG: OnceCell<AppConfig> = OnceCell::new();

/// 单个文件大小上限（10 MiB）
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    pub host: String,
    /// 监听端口
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别（未设置 RUST_LOG 时生效）
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// API 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API 路由前缀
    pub prefix: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            prefix: "/api".to_string(),
        }
    }
}

/// CORS 配置
///
/// 默认全开放：RSVP 前端与本服务通常不同源部署。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// 是否启用 CORS
    #[serde(default = "CorsConfig::default_enabled")]
    pub enabled: bool,
    /// 允许的 Origin 列表（支持 "*" 表示任意）
    #[serde(default = "CorsConfig::default_origins")]
    pub allowed_origins: Vec<String>,
    /// 允许的方法列表（支持 "*" 表示任意）
    #[serde(default = "CorsConfig::default_methods")]
    pub allowed_methods: Vec<String>,
    /// 允许的请求头列表（支持 "*" 表示任意）
    #[serde(default = "CorsConfig::default_headers")]
    pub allowed_headers: Vec<String>,
    /// 暴露的响应头列表（支持 "*" 表示任意）
    #[serde(default)]
    pub expose_headers: Vec<String>,
    /// 是否允许携带凭证（Cookie/Authorization）
    #[serde(default)]
    pub allow_credentials: bool,
    /// 预检缓存时间（秒）
    #[serde(default)]
    pub max_age_secs: Option<u64>,
}

impl CorsConfig {
    fn default_enabled() -> bool {
        true
    }

    fn default_origins() -> Vec<String> {
        vec!["*".to_string()]
    }

    fn default_methods() -> Vec<String> {
        ["GET", "POST", "DELETE", "OPTIONS"]
            .iter()
            .map(|m| m.to_string())
            .collect()
    }

    /// 管理端需要 `X-Admin-Token`，客户端可透传 `X-Request-Id`
    fn default_headers() -> Vec<String> {
        ["Content-Type", "X-Admin-Token", "X-Request-Id"]
            .iter()
            .map(|h| h.to_string())
            .collect()
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            allowed_origins: Self::default_origins(),
            allowed_methods: Self::default_methods(),
            allowed_headers: Self::default_headers(),
            expose_headers: Vec::new(),
            allow_credentials: false,
            max_age_secs: None,
        }
    }
}

/// 列表存储配置（SQLite）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite 文件路径
    #[serde(default = "StorageConfig::default_sqlite_path")]
    pub sqlite_path: String,
    /// 是否启用 WAL
    #[serde(default = "StorageConfig::default_sqlite_wal")]
    pub sqlite_wal: bool,
}

impl StorageConfig {
    fn default_sqlite_path() -> String {
        "./data/photos.db".to_string()
    }
    fn default_sqlite_wal() -> bool {
        true
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            sqlite_path: Self::default_sqlite_path(),
            sqlite_wal: Self::default_sqlite_wal(),
        }
    }
}

/// 对象存储配置（本地目录 + 静态挂载）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobConfig {
    /// 对象文件存放目录
    #[serde(default = "BlobConfig::default_dir")]
    pub dir: String,
    /// 对外可访问的基础 URL（不含末尾 `/`），返回给前端的 url 以此为前缀
    #[serde(default = "BlobConfig::default_public_base_url")]
    pub public_base_url: String,
    /// 静态资源挂载路径
    #[serde(default = "BlobConfig::default_mount_path")]
    pub mount_path: String,
    /// 是否在对象名中追加随机后缀
    #[serde(default = "BlobConfig::default_random_suffix")]
    pub random_suffix: bool,
}

impl BlobConfig {
    fn default_dir() -> String {
        "./data/blobs".to_string()
    }
    fn default_public_base_url() -> String {
        "http://127.0.0.1:3000/blobs".to_string()
    }
    fn default_mount_path() -> String {
        "/blobs".to_string()
    }
    fn default_random_suffix() -> bool {
        true
    }
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            dir: Self::default_dir(),
            public_base_url: Self::default_public_base_url(),
            mount_path: Self::default_mount_path(),
            random_suffix: Self::default_random_suffix(),
        }
    }
}

/// 上传配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// 单个文件大小上限（字节）
    #[serde(default = "UploadConfig::default_max_file_size")]
    pub max_file_size: u64,
    /// 允许的 MIME 类型
    #[serde(default = "UploadConfig::default_allowed_mime_types")]
    pub allowed_mime_types: Vec<String>,
    /// 未提供 eventType 时使用的默认值
    #[serde(default = "UploadConfig::default_event_type")]
    pub default_event_type: String,
    /// 表单解析时的临时文件目录
    #[serde(default = "UploadConfig::default_tmp_dir")]
    pub tmp_dir: String,
}

impl UploadConfig {
    fn default_max_file_size() -> u64 {
        DEFAULT_MAX_FILE_SIZE
    }
    fn default_allowed_mime_types() -> Vec<String> {
        ["image/jpeg", "image/jpg", "image/png", "image/webp"]
            .iter()
            .map(|m| m.to_string())
            .collect()
    }
    fn default_event_type() -> String {
        "wedding".to_string()
    }
    fn default_tmp_dir() -> String {
        std::env::temp_dir()
            .join("rsvp-photos")
            .to_string_lossy()
            .into_owned()
    }

    /// 判断 MIME 类型是否在白名单内（忽略大小写）
    pub fn is_allowed_mime(&self, mime: &str) -> bool {
        self.allowed_mime_types
            .iter()
            .any(|m| m.eq_ignore_ascii_case(mime.trim()))
    }

    /// 整个请求体的上限：文件上限再预留 1 MiB 给其它字段与 multipart 边界
    pub fn request_body_limit(&self) -> usize {
        usize::try_from(self.max_file_size.saturating_add(1024 * 1024)).unwrap_or(usize::MAX)
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size: Self::default_max_file_size(),
            allowed_mime_types: Self::default_allowed_mime_types(),
            default_event_type: Self::default_event_type(),
            tmp_dir: Self::default_tmp_dir(),
        }
    }
}

/// 管理端配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    /// 管理员令牌列表（Header: X-Admin-Token）；为空则管理接口整体关闭
    #[serde(
        default = "AdminConfig::default_tokens",
        alias = "admin-tokens",
        alias = "adminTokens"
    )]
    pub tokens: Vec<String>,
}

impl AdminConfig {
    fn default_tokens() -> Vec<String> {
        if let Ok(raw) = std::env::var("APP_ADMIN_TOKENS") {
            return raw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        Vec::new()
    }
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            tokens: Self::default_tokens(),
        }
    }
}

/// 优雅退出配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownConfig {
    /// 优雅退出超时时间（秒）
    #[serde(default = "ShutdownConfig::default_timeout")]
    pub timeout_secs: u64,
}

impl ShutdownConfig {
    fn default_timeout() -> u64 {
        30
    }

    /// 获取优雅退出超时时间
    pub fn timeout_duration(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            timeout_secs: Self::default_timeout(),
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub api: ApiConfig,
    /// CORS 配置
    #[serde(default)]
    pub cors: CorsConfig,
    /// 列表存储配置
    #[serde(default)]
    pub storage: StorageConfig,
    /// 对象存储配置
    #[serde(default)]
    pub blob: BlobConfig,
    /// 上传配置
    #[serde(default)]
    pub upload: UploadConfig,
    /// 管理端配置
    #[serde(default)]
    pub admin: AdminConfig,
    /// 优雅退出配置
    #[serde(default)]
    pub shutdown: ShutdownConfig,
}

impl AppConfig {
    /// 从配置文件加载配置（文件可缺省），支持环境变量覆盖
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::get_config_path();

        tracing::info!("正在从 {:?} 加载配置文件", config_path);

        let builder = ConfigBuilder::builder()
            .add_source(File::from(config_path).required(false))
            // 环境变量覆盖，例如：APP_SERVER__PORT=8080、APP_UPLOAD__MAX_FILE_SIZE=1048576
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        builder.try_deserialize()
    }

    /// 获取全局配置单例
    pub fn global() -> &'static AppConfig {
        CONFIG.get().expect("配置未初始化，请先调用 init_global()")
    }

    /// 初始化全局配置
    pub fn init_global() -> Result<&'static AppConfig, ConfigError> {
        let config = Self::load()?;
        CONFIG
            .set(config)
            .map_err(|_| ConfigError::Message("配置已经被初始化".to_string()))?;
        Ok(Self::global())
    }

    /// 获取配置文件路径（APP_CONFIG_PATH 优先）
    fn get_config_path() -> PathBuf {
        std::env::var("APP_CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"))
    }

    /// 获取服务器监听地址
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
