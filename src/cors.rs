use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};

use crate::config::CorsConfig;

/// 配置项解析结果：是否包含 "*"，以及其余合法值
struct Parsed<T> {
    any: bool,
    values: Vec<T>,
}

/// 根据配置构建 CORS 中间件；未启用或配置无效时返回 None
pub fn build_cors_layer(cors: &CorsConfig) -> Option<CorsLayer> {
    if !cors.enabled {
        return None;
    }

    let origins = parse_list("allowed_origins", &cors.allowed_origins, |v| {
        HeaderValue::from_str(v).ok()
    });
    if !origins.any && origins.values.is_empty() {
        tracing::warn!("CORS 已启用但 allowed_origins 为空，已跳过启用");
        return None;
    }
    let methods = parse_list("allowed_methods", &cors.allowed_methods, |v| {
        Method::from_bytes(v.to_ascii_uppercase().as_bytes()).ok()
    });
    let headers = parse_list("allowed_headers", &cors.allowed_headers, parse_header_name);
    let expose = parse_list("expose_headers", &cors.expose_headers, parse_header_name);

    if cors.allow_credentials && (origins.any || methods.any || headers.any || expose.any) {
        tracing::error!("CORS 配置无效：allow_credentials=true 不能与 \"*\" 同时使用，已跳过启用");
        return None;
    }

    let mut layer = CorsLayer::new();
    layer = if origins.any {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(origins.values)
    };
    if methods.any {
        layer = layer.allow_methods(Any);
    } else if !methods.values.is_empty() {
        layer = layer.allow_methods(methods.values);
    }
    if headers.any {
        layer = layer.allow_headers(Any);
    } else if !headers.values.is_empty() {
        layer = layer.allow_headers(headers.values);
    }
    if expose.any {
        layer = layer.expose_headers(Any);
    } else if !expose.values.is_empty() {
        layer = layer.expose_headers(expose.values);
    }
    if cors.allow_credentials {
        layer = layer.allow_credentials(true);
    }
    if let Some(secs) = cors.max_age_secs
        && secs > 0
    {
        layer = layer.max_age(Duration::from_secs(secs));
    }

    Some(layer)
}

/// 需要出现在每个响应上的 allow-methods / allow-headers 值。
///
/// `CorsLayer` 只在带 `Access-Control-Request-Method` 的预检上写这两个头，
/// 普通 `OPTIONS` 与其余响应由 [`cors_allow_middleware`] 补齐。
#[derive(Debug, Clone, Default)]
pub struct CorsAllowValues {
    methods: Option<HeaderValue>,
    headers: Option<HeaderValue>,
}

impl CorsAllowValues {
    /// CORS 关闭时两项均为空
    pub fn from_config(cors: &CorsConfig) -> Self {
        if !cors.enabled {
            return Self::default();
        }
        let methods = parse_list("allowed_methods", &cors.allowed_methods, |v| {
            Method::from_bytes(v.to_ascii_uppercase().as_bytes()).ok()
        });
        let headers = parse_list("allowed_headers", &cors.allowed_headers, parse_header_name);
        Self {
            methods: join_values(methods, |m| m.as_str().to_string()),
            headers: join_values(headers, |h| h.as_str().to_string()),
        }
    }

    /// 只补缺失的头，已由 `CorsLayer` 写入的保持原样
    pub fn apply(&self, headers: &mut HeaderMap) {
        if let Some(v) = &self.methods {
            headers
                .entry(header::ACCESS_CONTROL_ALLOW_METHODS)
                .or_insert_with(|| v.clone());
        }
        if let Some(v) = &self.headers {
            headers
                .entry(header::ACCESS_CONTROL_ALLOW_HEADERS)
                .or_insert_with(|| v.clone());
        }
    }
}

fn join_values<T>(parsed: Parsed<T>, render: impl Fn(&T) -> String) -> Option<HeaderValue> {
    let joined = if parsed.any {
        "*".to_string()
    } else {
        parsed.values.iter().map(render).collect::<Vec<_>>().join(",")
    };
    if joined.is_empty() {
        return None;
    }
    HeaderValue::from_str(&joined).ok()
}

/// 任意路径的 `OPTIONS` 直接返回空 200；所有响应补齐 allow-methods / allow-headers。
pub async fn cors_allow_middleware(
    State(allow): State<Arc<CorsAllowValues>>,
    req: Request,
    next: Next,
) -> Response {
    let mut res = if req.method() == Method::OPTIONS {
        StatusCode::OK.into_response()
    } else {
        next.run(req).await
    };
    allow.apply(res.headers_mut());
    res
}

fn parse_header_name(v: &str) -> Option<HeaderName> {
    HeaderName::from_bytes(v.to_ascii_lowercase().as_bytes()).ok()
}

fn parse_list<T>(label: &str, raw: &[String], parse: impl Fn(&str) -> Option<T>) -> Parsed<T> {
    let mut out = Parsed {
        any: false,
        values: Vec::new(),
    };
    for value in raw.iter().map(|s| s.trim()).filter(|s| !s.is_empty()) {
        if value == "*" {
            out.any = true;
            continue;
        }
        match parse(value) {
            Some(v) => out.values.push(v),
            None => tracing::warn!("CORS {} 含无效值: {}", label, value),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{CorsAllowValues, build_cors_layer, parse_list};
    use axum::http::{HeaderMap, header};
    use crate::config::CorsConfig;
    use axum::http::Method;

    #[test]
    fn disabled_config_builds_nothing() {
        let cors = CorsConfig {
            enabled: false,
            ..CorsConfig::default()
        };
        assert!(build_cors_layer(&cors).is_none());
    }

    #[test]
    fn skips_when_origins_empty() {
        let cors = CorsConfig {
            allowed_origins: Vec::new(),
            ..CorsConfig::default()
        };
        assert!(build_cors_layer(&cors).is_none());
    }

    #[test]
    fn rejects_credentials_with_wildcard() {
        let cors = CorsConfig {
            allow_credentials: true,
            ..CorsConfig::default()
        };
        assert!(build_cors_layer(&cors).is_none());
    }

    #[test]
    fn default_config_builds_layer() {
        assert!(build_cors_layer(&CorsConfig::default()).is_some());
    }

    #[test]
    fn methods_are_normalized_and_invalid_dropped() {
        let input = vec![
            "get".to_string(),
            " DELETE ".to_string(),
            "bad method".to_string(),
        ];
        let parsed = parse_list("allowed_methods", &input, |v| {
            Method::from_bytes(v.to_ascii_uppercase().as_bytes()).ok()
        });
        assert!(!parsed.any);
        assert_eq!(parsed.values, vec![Method::GET, Method::DELETE]);
    }

    #[test]
    fn allow_values_follow_config() {
        let mut headers = HeaderMap::new();
        CorsAllowValues::from_config(&CorsConfig::default()).apply(&mut headers);
        assert_eq!(
            headers[header::ACCESS_CONTROL_ALLOW_METHODS],
            "GET,POST,DELETE,OPTIONS"
        );
        assert_eq!(
            headers[header::ACCESS_CONTROL_ALLOW_HEADERS],
            "content-type,x-admin-token,x-request-id"
        );
    }

    #[test]
    fn allow_values_keep_existing_and_skip_when_disabled() {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, "x-custom".parse().unwrap());
        CorsAllowValues::from_config(&CorsConfig::default()).apply(&mut headers);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_HEADERS], "x-custom");

        let disabled = CorsConfig {
            enabled: false,
            ..CorsConfig::default()
        };
        let mut headers = HeaderMap::new();
        CorsAllowValues::from_config(&disabled).apply(&mut headers);
        assert!(headers.is_empty());
    }
}
