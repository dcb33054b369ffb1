//! Маршруты аутентификации администратора.

use crate::api::middleware::{self, AdminUser};
use crate::api::AppState;
use crate::config::verify_password;
use crate::error::AppError;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub username: String,
    pub expires_at: usize,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/me", get(me))
}

/// POST /api/v1/auth/login: вход администратора.
async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let user_ok = req.username == state.admin_username;
    let password_ok = verify_password(&req.password, &state.admin_password_hash);
    if !(user_ok && password_ok) {
        tracing::warn!("Неудачная попытка входа для пользователя: {}", req.username);
        return Err(AppError::Unauthorized("Неверные учётные данные".into()));
    }

    let token =
        middleware::create_admin_token(&req.username, &state.jwt_secret, state.jwt_ttl_hours)?;
    tracing::info!("Администратор {} вошёл в систему", req.username);

    Ok(Json(LoginResponse { token }))
}

/// GET /api/v1/auth/me: текущий администратор.
async fn me(AdminUser(claims): AdminUser) -> Json<MeResponse> {
    Json(MeResponse {
        username: claims.sub,
        expires_at: claims.exp,
    })
}
