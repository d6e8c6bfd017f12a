use crate::db;
use anyhow::{Context, Result, anyhow};
use axum::{
    Extension, Router,
    body::Body,
    extract::MatchedPath,
    http::{
        HeaderName, HeaderValue, Method, Request,
        header::{AUTHORIZATION, CONTENT_DISPOSITION, CONTENT_TYPE},
    },
    routing::{get, options},
};
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{Span, info, info_span};
use ulid::Ulid;
use url::Url;
use utoipa_axum::router::OpenApiRouter;

pub(crate) mod handlers;
// OpenAPI router wiring and route registration live in openapi.rs.
mod openapi;

pub use handlers::auth::{AuthConfig, AuthState, PasswordHasher};
pub use handlers::backup::BackupConfig;
pub use openapi::openapi;

/// Body limit for `POST /api/restore`; other routes keep axum's 2 MiB default.
pub const MAX_UPLOAD_BYTES: usize = 256 * 1024 * 1024;

/// Build the API router with all documented routes registered.
#[must_use]
pub fn router() -> OpenApiRouter {
    openapi::api_router()
}

/// Everything the HTTP layer needs at runtime.
#[derive(Clone, Debug)]
pub struct AppContext {
    pub pool: SqlitePool,
    pub auth: Arc<AuthState>,
    pub backup: BackupConfig,
    /// Exact allowed CORS origin; `None` allows any origin.
    pub cors_origin: Option<String>,
}

/// Build the complete application: documented routes, `/`, `OPTIONS /health`,
/// the `OpenAPI` document and every layer.
///
/// # Errors
/// Returns an error if the CORS origin is not a valid URL.
pub fn app(context: AppContext) -> Result<Router> {
    let cors = cors_layer(context.cors_origin.as_deref())?;

    // Build the router from OpenAPI-wired routes, then extend it with non-doc routes like `/` and
    // preflight-only `OPTIONS /health`.
    let (router, spec) = router().split_for_parts();
    let spec = Arc::new(spec);
    let app = router
        .route("/", get(handlers::root::root))
        .route("/health", options(handlers::health::health))
        .route(
            "/api-docs/openapi.json",
            get(move || {
                let spec = spec.clone();
                async move { axum::Json(spec.as_ref().clone()) }
            }),
        )
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(Extension(context.auth))
                .layer(Extension(context.backup))
                .layer(Extension(context.pool)),
        );

    Ok(app)
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, context: AppContext) -> Result<()> {
    let (users, tasks) = db::counts(&context.pool).await?;
    info!("Database ready: {users} users, {tasks} tasks");

    let app = app(context)?;

    let listener = TcpListener::bind(format!("::0:{port}"))
        .await
        .with_context(|| format!("Failed to bind port {port}"))?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {err}");
            }
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

fn cors_layer(origin: Option<&str>) -> Result<CorsLayer> {
    let layer = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .expose_headers([CONTENT_DISPOSITION])
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ]);

    Ok(match origin {
        Some(origin) => layer.allow_origin(AllowOrigin::exact(cors_origin(origin)?)),
        None => layer.allow_origin(Any),
    })
}

fn cors_origin(base_url: &str) -> Result<HeaderValue> {
    let parsed = Url::parse(base_url).with_context(|| format!("Invalid CORS origin: {base_url}"))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| anyhow!("CORS origin must include a valid host: {base_url}"))?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build CORS origin header")
}
