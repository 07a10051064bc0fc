use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::openapi::server::{ServerBuilder, ServerVariableBuilder};
use utoipa::{Modify, OpenApi};

/// 在 OpenAPI 中注入 `X-Admin-Token` 的安全定义，供管理端接口复用。
struct AdminTokenSecurity;

impl Modify for AdminTokenSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "AdminToken",
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("X-Admin-Token"))),
        );
    }
}

/// 业务接口挂在 `config.api.prefix` 下，`/health` 不带前缀。
struct ApiServers;

impl Modify for ApiServers {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let api = ServerBuilder::new()
            .url("{api_prefix}")
            .description(Some("照片接口（默认 /api）"))
            .parameter(
                "api_prefix",
                ServerVariableBuilder::new()
                    .default_value("/api")
                    .description(Some("对应 config.api.prefix（可通过 APP_API__PREFIX 覆盖）")),
            )
            .build();
        let root = ServerBuilder::new()
            .url("/")
            .description(Some("根路径（/health）"))
            .build();

        openapi.servers = Some(vec![api, root]);
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::features::health::handler::health_check,
        crate::features::photos::handler::list_photos,
        crate::features::photos::handler::upload_photo,
        crate::features::photos::handler::delete_photo,
        crate::features::photos::handler::clear_photos,
    ),
    components(schemas(
        crate::error::ErrorBody,
        crate::features::health::handler::HealthResponse,
        crate::features::photos::models::PhotoRecord,
        crate::features::photos::models::PhotoListResponse,
        crate::features::photos::models::UploadPhotoForm,
        crate::features::photos::models::UploadResponse,
        crate::features::photos::models::DeletePhotoRequest,
        crate::features::photos::models::MessageResponse,
        crate::features::photos::models::ClearPhotosResponse,
    )),
    modifiers(&AdminTokenSecurity, &ApiServers),
    tags(
        (name = "Photos", description = "Guest photo APIs"),
        (name = "Health", description = "Health APIs"),
    ),
    info(
        title = "RSVP Photos API",
        version = "0.1.0",
        description = "Wedding RSVP guest photo service (Axum)"
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::ApiDoc;
    use utoipa::OpenApi;

    #[test]
    fn openapi_lists_photo_paths() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/photos"));
        assert!(doc.paths.paths.contains_key("/admin/photos"));
        assert!(doc.paths.paths.contains_key("/health"));
    }
}
