use std::sync::Arc;

use axum::{Router, extract::State, http::StatusCode, response::Response, routing::get};
use tower_http::trace::TraceLayer;

use gatekey::core::auth::{
    ApiState, AuthService, AuthSettings, JwtService, PasswordHasher, auth_api_router,
};
use gatekey::core::config::AppConfig;
use gatekey::core::db::repositories::{
    PgPasswordResetRepository, PgRefreshTokenRepository, PgUserRepository, RefreshTokenRepository,
};
use gatekey::core::db::{self, DbConfig, PgPool};
use gatekey::core::mail::LogMailer;
use gatekey::core::response;
use gatekey::core::users::users_api_router;

#[tokio::main]
async fn main() {
    // Load .env file (if exists)
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load application config from environment variables
    let config = AppConfig::from_env();
    let db_config = DbConfig::from_env().unwrap();
    let jwt = JwtService::from_env().unwrap();

    tracing::info!(
        "Config loaded: environment={}, default_role={}",
        config.environment,
        config.default_user_role
    );

    // Connect to PostgreSQL and apply pending migrations
    let pool = db::create_pool_with_migrations(&db_config).await.unwrap();

    let auth = Arc::new(AuthService::new(
        Arc::new(PgUserRepository::new(pool.clone())),
        Arc::new(PgRefreshTokenRepository::new(pool.clone())),
        Arc::new(PgPasswordResetRepository::new(pool.clone())),
        Arc::new(LogMailer::default()),
        jwt,
        PasswordHasher::from_env(),
        AuthSettings::from(&config),
    ));
    let state = ApiState::new(auth);

    // Sweep expired refresh sessions at startup and then hourly
    let session_sweeper = PgRefreshTokenRepository::new(pool.clone());
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(3600));
        loop {
            ticker.tick().await;
            match session_sweeper.delete_expired().await {
                Ok(0) => {}
                Ok(removed) => tracing::info!(removed, "expired refresh tokens deleted"),
                Err(err) => tracing::error!(error = %err, "refresh token cleanup failed"),
            }
        }
    });

    // Build the application router
    let app = Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler).with_state(pool))
        .merge(auth_api_router(state.clone()))
        .merge(users_api_router(state))
        .fallback(fallback_handler)
        .layer(TraceLayer::new_for_http());

    tracing::info!("listening on http://{}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .unwrap();
    axum::serve(listener, app.into_make_service())
        .await
        .unwrap();
}

/// GET /
/// Service identity for probes and API discovery
async fn index_handler() -> Response {
    response::success(serde_json::json!({
        "name": "gatekey",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "ok",
    }))
}

/// GET /health
/// Liveness check including database connectivity
async fn health_handler(State(pool): State<PgPool>) -> Response {
    match db::health_check(&pool).await {
        Ok(()) => response::success(serde_json::json!({
            "status": "ok",
            "database": "up",
        })),
        Err(err) => {
            tracing::error!(error = %err, "health check failed");
            response::error(
                StatusCode::SERVICE_UNAVAILABLE,
                "SERVICE_UNAVAILABLE",
                "Service temporarily unavailable",
            )
        }
    }
}

async fn fallback_handler() -> Response {
    response::not_found("Route not found")
}
