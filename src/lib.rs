use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub mod gallery;
pub mod login;
pub mod startup_checks;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub app: AppConfig,
    pub storage: StorageConfig,
    pub admin: AdminConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub cors: CorsConfig,
}

/// Cross-origin access for a separately hosted admin front end. `"*"` in
/// `allow_origins` allows any origin.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CorsConfig {
    pub allow_origins: Vec<String>,
    #[serde(default = "default_cors_max_age")]
    pub max_age: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_origins: vec!["*".to_string()],
            max_age: default_cors_max_age(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub name: String,
    pub log_level: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    pub upload_directory: PathBuf,
    #[serde(default = "default_public_path_prefix")]
    pub public_path_prefix: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AdminConfig {
    pub username: String,
    pub password: String,
    pub token_secret: String,
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: u64,
}

fn default_public_path_prefix() -> String {
    "/uploads".to_string()
}

fn default_token_ttl_hours() -> u64 {
    24
}

fn default_cors_max_age() -> u64 {
    3600
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
                cors: CorsConfig::default(),
            },
            app: AppConfig {
                name: "Showcase".to_string(),
                log_level: "info".to_string(),
            },
            storage: StorageConfig {
                upload_directory: PathBuf::from("public/uploads"),
                public_path_prefix: default_public_path_prefix(),
            },
            admin: AdminConfig {
                username: "admin".to_string(),
                password: "change-me".to_string(),
                token_secret: "change-me-in-production".to_string(),
                token_ttl_hours: default_token_ttl_hours(),
            },
        }
    }
}

use axum::{
    Router,
    http::{HeaderName, HeaderValue, Method, header},
    routing::{delete, get, patch, post},
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

#[derive(Clone)]
pub struct AppState {
    pub gallery: gallery::SharedGallery,
    pub config: Config,
}

pub async fn create_app(config: Config) -> Router {
    let gallery = Arc::new(gallery::Gallery::new(&config.storage));
    create_app_with_gallery(config, gallery)
}

/// Build the router around an already constructed gallery, so callers can
/// pick non-default upload limits.
pub fn create_app_with_gallery(config: Config, gallery: gallery::SharedGallery) -> Router {
    let upload_body_limit = gallery::upload_body_limit(gallery.limits());
    let uploads_route = format!(
        "/{}/{{filename}}",
        config.storage.public_path_prefix.trim_matches('/')
    );

    let cors = cors_layer(&config.server.cors);

    let app_state = AppState {
        gallery,
        config: config.clone(),
    };

    Router::new()
        .route(
            "/upload",
            post(gallery::upload_handler).layer(upload_body_limit),
        )
        .route("/gallery", get(gallery::gallery_handler))
        .route("/gallery/public", get(gallery::public_gallery_handler))
        .route("/gallery/public/all", get(gallery::public_gallery_handler))
        .route("/gallery/delete", delete(gallery::delete_handler))
        .route("/gallery/bulk-delete", post(gallery::bulk_delete_handler))
        .route("/gallery/{id}", delete(gallery::delete_by_id_handler))
        .route(
            "/gallery/{id}/toggle-public",
            patch(gallery::toggle_public_handler),
        )
        .route("/gallery/{id}/like", post(gallery::like_handler))
        .route("/admin/login", post(login::login_handler))
        .route(&uploads_route, get(gallery::serve_upload_handler))
        .layer(cors)
        .layer(security_header(header::X_CONTENT_TYPE_OPTIONS, "nosniff"))
        .layer(security_header(header::X_FRAME_OPTIONS, "DENY"))
        .layer(security_header(header::X_XSS_PROTECTION, "1; mode=block"))
        .layer(security_header(
            header::REFERRER_POLICY,
            "strict-origin-when-cross-origin",
        ))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    let method = request.method();
                    let uri = request.uri();
                    let matched_path = request
                        .extensions()
                        .get::<axum::extract::MatchedPath>()
                        .map(|matched_path| matched_path.as_str());

                    tracing::info_span!(
                        "http_request",
                        method = %method,
                        uri = %uri,
                        matched_path,
                    )
                })
                .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
                    let method = request.method();
                    let uri = request.uri();
                    let user_agent = request
                        .headers()
                        .get("user-agent")
                        .and_then(|h| h.to_str().ok())
                        .unwrap_or("-");

                    tracing::info!(
                        target: "access_log",
                        method = %method,
                        path = %uri.path(),
                        user_agent = %user_agent,
                        "request"
                    );
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     _span: &tracing::Span| {
                        let status = response.status();
                        let size = response
                            .headers()
                            .get("content-length")
                            .and_then(|h| h.to_str().ok())
                            .unwrap_or("-");

                        tracing::info!(
                            target: "access_log",
                            status = %status,
                            size = %size,
                            latency_ms = %latency.as_millis(),
                            "response"
                        );
                    },
                ),
        )
        .with_state(app_state)
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins = if config.allow_origins.iter().any(|origin| origin == "*") {
        AllowOrigin::any()
    } else {
        let parsed: Vec<HeaderValue> = config
            .allow_origins
            .iter()
            .filter_map(|origin| match origin.parse::<HeaderValue>() {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .max_age(Duration::from_secs(config.max_age))
}

fn security_header(name: HeaderName, value: &'static str) -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::overriding(name, HeaderValue::from_static(value))
}
