//! Ошибки сервисов и их отображение в HTTP.
//!
//! Каждый вариант соответствует одному коду ответа. Тело всегда
//! `{"error": "..."}`; подробности `Internal` остаются в логе.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// Отклоняется до любой записи в БД
    #[error("Неверный запрос: {0}")]
    InvalidInput(String),

    #[error("Не найдено: {0}")]
    NotFound(String),

    /// Upstream-прокси маппинга отсутствует или принадлежит другому серверу
    #[error("Неверная ссылка: {0}")]
    InvalidReference(String),

    /// JWT администратора или токен агента. Не раскрывает, существует ли сервер
    #[error("Не авторизован: {0}")]
    Unauthorized(String),

    /// Удаление блокируется зависимыми строками или имя занято
    #[error("Конфликт: {0}")]
    Conflict(String),

    #[error("Слишком много запросов")]
    TooManyRequests,

    #[error("Внутренняя ошибка: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::InvalidInput(m) => (StatusCode::BAD_REQUEST, m.clone()),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
            AppError::InvalidReference(m) => (StatusCode::BAD_REQUEST, m.clone()),
            AppError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, m.clone()),
            AppError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
            AppError::TooManyRequests => (
                StatusCode::TOO_MANY_REQUESTS,
                "Слишком много запросов".to_string(),
            ),
            AppError::Internal(detail) => {
                tracing::error!("Внутренняя ошибка: {detail}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Внутренняя ошибка сервера".to_string(),
                )
            }
        };
        (status, axum::Json(json!({ "error": message }))).into_response()
    }
}

impl From<sea_orm::DbErr> for AppError {
    fn from(e: sea_orm::DbErr) -> Self {
        AppError::Internal(e.to_string())
    }
}
