//! Экстракторы аутентификации: JWT администратора и токен агента.

use crate::api::AppState;
use crate::error::AppError;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use serde::{Deserialize, Serialize};

/// Claims JWT-токена администратора.
#[derive(Debug, Serialize, Deserialize)]
pub struct AdminClaims {
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
}

/// Экстрактор аутентифицированного администратора.
pub struct AdminUser(pub AdminClaims);

impl AdminUser {
    /// Имя администратора для журнала аудита.
    pub fn actor(&self) -> &str {
        &self.0.sub
    }
}

/// Статический токен агента из заголовка Authorization.
///
/// Экстрактор только достаёт токен; сверка с `servers.agent_token`
/// выполняется в сервисе синхронизации.
pub struct AgentToken(pub String);

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(parts)?;
        let claims = decode_token::<AdminClaims>(token, &state.jwt_secret)?;
        Ok(AdminUser(claims))
    }
}

impl FromRequestParts<AppState> for AgentToken {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(parts)?;
        Ok(AgentToken(token.to_string()))
    }
}

/// Создать JWT-токен администратора.
pub fn create_admin_token(
    username: &str,
    jwt_secret: &str,
    ttl_hours: u64,
) -> Result<String, AppError> {
    let now = chrono::Utc::now().timestamp() as usize;
    let claims = AdminClaims {
        sub: username.to_string(),
        exp: now + (ttl_hours as usize) * 3600,
        iat: now,
    };
    encode_token(&claims, jwt_secret)
}

// ── Вспомогательные функции ──────────────────────────────────────────────────

fn extract_bearer_token(parts: &Parts) -> Result<&str, AppError> {
    parts
        .headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Отсутствует заголовок Authorization".into()))?
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Unauthorized("Ожидается Bearer токен".into()))
}

fn decode_token<T: serde::de::DeserializeOwned>(
    token: &str,
    jwt_secret: &str,
) -> Result<T, AppError> {
    let key = jsonwebtoken::DecodingKey::from_secret(jwt_secret.as_bytes());
    let validation = jsonwebtoken::Validation::default();
    jsonwebtoken::decode::<T>(token, &key, &validation)
        .map(|d| d.claims)
        .map_err(|e| AppError::Unauthorized(format!("Невалидный токен: {e}")))
}

fn encode_token<T: serde::Serialize>(claims: &T, jwt_secret: &str) -> Result<String, AppError> {
    let key = jsonwebtoken::EncodingKey::from_secret(jwt_secret.as_bytes());
    jsonwebtoken::encode(&jsonwebtoken::Header::default(), claims, &key)
        .map_err(|e| AppError::Internal(format!("Ошибка создания токена: {e}")))
}
