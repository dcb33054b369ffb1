//! HTTP API: маршрутизация и состояние приложения.

pub mod admin_routes;
pub mod agent_routes;
pub mod auth_routes;
pub mod group_routes;
pub mod mapping_routes;
pub mod middleware;
pub mod proxy_routes;
pub mod rate_limit;
pub mod server_routes;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use rate_limit::RateLimiter;
use sea_orm::{ConnectionTrait, DatabaseConnection};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Общее состояние приложения.
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub jwt_secret: String,
    pub jwt_ttl_hours: u64,
    pub admin_username: String,
    pub admin_password_hash: String,
    /// Окно, в течение которого сервер без контакта ещё считается активным
    pub staleness_window: chrono::Duration,
    pub rate_limiter: RateLimiter,
}

/// Построить маршрутизатор Axum.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Лимит применяется только к агентам: админка ходит редко и под JWT
    let limiter = state.rate_limiter.clone();
    let agent = agent_routes::routes().layer(axum::middleware::from_fn(move |req, next| {
        let limiter = limiter.clone();
        rate_limit::rate_limit_middleware(limiter, req, next)
    }));

    let api = Router::new()
        .merge(auth_routes::routes())
        .merge(server_routes::routes())
        .merge(proxy_routes::routes())
        .merge(mapping_routes::routes())
        .merge(group_routes::routes())
        .merge(agent)
        .nest("/admin", admin_routes::routes());

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health: проверка доступности БД.
async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    let db_ok = state.db.execute_unprepared("SELECT 1").await.is_ok();
    Json(serde_json::json!({
        "status": if db_ok { "ok" } else { "error" },
        "database": db_ok,
        "service": "proxyctl-server"
    }))
}
