use debt_service::{
    build_router,
    config::DebtConfig,
    services::{AuthService, Database, JwtService, LocalStorage, StatisticsService},
    AppState,
};
use secrecy::ExposeSecret;
use service_core::middleware::rate_limit::create_ip_rate_limiter;
use service_core::observability::logging::{init_metrics_recorder, init_tracing};
use std::{net::SocketAddr, sync::Arc};
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), service_core::error::AppError> {
    // Load configuration - fail fast if invalid
    let config = DebtConfig::from_env()?;

    init_tracing(&config.service_name, &config.log_level);
    let metrics = init_metrics_recorder().map_err(service_core::error::AppError::InternalError)?;

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting debt service"
    );

    let db = Database::new(
        config.database.url.expose_secret(),
        config.database.max_connections,
        config.database.min_connections,
    )
    .await?;
    db.run_migrations().await?;
    tracing::info!("Database initialized successfully");

    let jwt = JwtService::new(&config.jwt);
    let auth = AuthService::new(db.clone(), jwt.clone());
    let statistics = StatisticsService::new(db.clone());

    if let Some(bootstrap) = &config.bootstrap {
        auth.bootstrap_super_admin(bootstrap).await?;
    }

    let storage = LocalStorage::new(&config.uploads.dir).await?;
    tracing::info!(dir = %config.uploads.dir, "Upload storage ready");

    let signin_rate_limiter = create_ip_rate_limiter(
        config.rate_limit.signin_attempts,
        config.rate_limit.signin_window_seconds,
    );
    let ip_rate_limiter = create_ip_rate_limiter(
        config.rate_limit.global_ip_limit,
        config.rate_limit.global_ip_window_seconds,
    );
    tracing::info!("Rate limiters initialized: Sign-in and Global IP");

    let state = AppState {
        config: config.clone(),
        db,
        jwt,
        auth,
        statistics,
        storage: Arc::new(storage),
        metrics,
        signin_rate_limiter,
        ip_rate_limiter,
    };
    let app = build_router(state).await?;

    let addr = config.common.socket_addr();

    let service_span = tracing::info_span!(
        "service",
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
    );
    let _guard = service_span.enter();

    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
