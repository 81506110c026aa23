pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method, Request},
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, patch, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use service_core::error::AppError;
use service_core::middleware::{
    metrics::metrics_middleware,
    rate_limit::{ip_rate_limit_middleware, IpRateLimiter},
    security_headers::security_headers_middleware,
    tracing::request_id_middleware,
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::config::DebtConfig;
use crate::services::{AuthService, Database, JwtService, StatisticsService, Storage};

#[derive(Clone)]
pub struct AppState {
    pub config: DebtConfig,
    pub db: Database,
    pub jwt: JwtService,
    pub auth: AuthService,
    pub statistics: StatisticsService,
    pub storage: Arc<dyn Storage>,
    pub metrics: PrometheusHandle,
    pub signin_rate_limiter: IpRateLimiter,
    pub ip_rate_limiter: IpRateLimiter,
}

pub async fn build_router(state: AppState) -> Result<Router, AppError> {
    // Sign-in routes with their own, stricter limiter
    let signin_limiter = state.signin_rate_limiter.clone();
    let signin_routes = Router::new()
        .route("/admin/signin", post(handlers::admin::signin))
        .route("/store/signin", post(handlers::store::signin))
        .layer(from_fn_with_state(signin_limiter, ip_rate_limit_middleware));

    // Uploads get a body limit slightly above the file limit for multipart framing
    let upload_limit = state.config.uploads.max_bytes + 64 * 1024;
    let upload_routes = Router::new()
        .route("/debtor/:id/image", post(handlers::debtor::upload_image))
        .route("/debt/image/:id", post(handlers::debt::upload_image))
        .layer(DefaultBodyLimit::max(upload_limit));

    let protected_routes = Router::new()
        // Admin
        .route("/admin/logout", post(handlers::admin::logout))
        .route("/admin/createAdmin", post(handlers::admin::create_admin))
        .route("/admin/createStore", post(handlers::admin::create_store))
        .route("/admin", get(handlers::admin::list_admins))
        .route(
            "/admin/:id",
            get(handlers::admin::get_admin)
                .patch(handlers::admin::update_admin)
                .delete(handlers::admin::delete_admin),
        )
        // Store
        .route("/store/logout", post(handlers::store::logout))
        .route("/store", get(handlers::store::list_stores))
        .route(
            "/store/likes",
            get(handlers::store::list_likes).post(handlers::store::like_debtor),
        )
        .route("/store/likes/:debtor_id", delete(handlers::store::unlike_debtor))
        .route(
            "/store/:id",
            get(handlers::store::get_store)
                .patch(handlers::store::update_store)
                .delete(handlers::store::delete_store),
        )
        .route("/store/:id/passcode", post(handlers::store::add_passcode))
        .route("/store/:id/due-payments", get(handlers::store::due_payments))
        .route("/store/:id/main-menu", get(handlers::store::main_menu))
        .route("/store/:id/late-payments", get(handlers::store::late_payments))
        // Debtor
        .route(
            "/debtor",
            get(handlers::debtor::list_debtors).post(handlers::debtor::create_debtor),
        )
        .route("/debtor/by-phone/:phone", get(handlers::debtor::find_by_phone))
        .route("/debtor/images", post(handlers::debtor::add_image))
        .route("/debtor/images/:image_id", delete(handlers::debtor::remove_image))
        .route("/debtor/phones", post(handlers::debtor::add_phone))
        .route("/debtor/phones/:phone_id", delete(handlers::debtor::remove_phone))
        .route(
            "/debtor/:id",
            get(handlers::debtor::get_debtor)
                .patch(handlers::debtor::update_debtor)
                .delete(handlers::debtor::delete_debtor),
        )
        .route("/debtor/:id/total-debt", get(handlers::debtor::total_debt))
        .route("/debtor/:id/images", get(handlers::debtor::list_images))
        .route("/debtor/:id/phones", get(handlers::debtor::list_phones))
        // Debt
        .route(
            "/debt",
            get(handlers::debt::list_debts).post(handlers::debt::create_debt),
        )
        .route("/debt/find-pagination", get(handlers::debt::list_debts_page))
        .route("/debt/images/:id", get(handlers::debt::list_images))
        .route(
            "/debt/:id",
            get(handlers::debt::get_debt)
                .patch(handlers::debt::update_debt)
                .delete(handlers::debt::delete_debt),
        )
        // Payment
        .route(
            "/payment",
            get(handlers::payment::list_payments).post(handlers::payment::create_payment),
        )
        .route("/payment/between", get(handlers::payment::list_between))
        .route("/payment/type/:type", get(handlers::payment::list_by_type))
        .route(
            "/payment/debt/:debt_id",
            get(handlers::payment::list_by_debt).delete(handlers::payment::delete_by_debt),
        )
        .route(
            "/payment/:id",
            get(handlers::payment::get_payment).patch(handlers::payment::update_payment),
        )
        .route("/payment/:id/type", patch(handlers::payment::update_payment_type))
        .merge(upload_routes)
        .layer(from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    // Create global IP rate limiter
    let ip_limiter = state.ip_rate_limiter.clone();

    let app = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics))
        // Refresh is authenticated by the HttpOnly cookie, not a bearer token
        .route("/admin/refresh-token", post(handlers::admin::refresh))
        .route("/store/refresh-token", post(handlers::store::refresh))
        .merge(signin_routes)
        .merge(protected_routes)
        .with_state(state.clone())
        // Global IP rate limiting
        .layer(from_fn_with_state(ip_limiter, ip_rate_limit_middleware))
        // Add metrics middleware
        .layer(from_fn(metrics_middleware))
        // Add tracing layer
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
            let request_id = request
                .headers()
                .get("x-request-id")
                .and_then(|value| value.to_str().ok())
                .unwrap_or("-");

            tracing::info_span!(
                "http_request",
                request_id = %request_id,
                method = %request.method(),
                uri = %request.uri(),
                version = ?request.version(),
            )
        }))
        // Add tracing middleware for request_id
        .layer(from_fn(request_id_middleware))
        // Add security headers middleware
        .layer(from_fn(security_headers_middleware))
        // Add CORS layer
        .layer(cors_layer(&state.config.security.allowed_origins));

    Ok(app)
}

/// Credentials are only allowed with an explicit origin list; `*` opens CORS
/// without cookies.
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    if allowed_origins.iter().any(|o| o == "*") {
        return layer.allow_origin(AllowOrigin::any());
    }

    let origins = allowed_origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!("Invalid CORS origin '{}': {}. Skipping.", o, e);
                None
            }
        })
        .collect::<Vec<HeaderValue>>();

    layer
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
}
