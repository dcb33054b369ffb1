//! Маршруты агентов: pull конфигурации и ack применения.
//!
//! Аутентификация статическим токеном сервера, не JWT администратора.

use crate::api::middleware::AgentToken;
use crate::api::AppState;
use crate::error::AppError;
use crate::services::sync_service::{self, AckData, PullOutcome};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct PullQuery {
    #[serde(default)]
    pub since: i64,
}

#[derive(Debug, Deserialize)]
pub struct AckRequest {
    pub version: Option<i64>,
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AckResponse {
    pub accepted: bool,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/agents/{server_id}/pull", get(pull))
        .route("/agents/{server_id}/ack", post(ack))
}

/// GET /api/v1/agents/{server_id}/pull?since=N
///
/// 204: версия агента актуальна, 200: полный снимок конфигурации.
async fn pull(
    State(state): State<AppState>,
    AgentToken(token): AgentToken,
    Path(server_id): Path<i32>,
    Query(query): Query<PullQuery>,
) -> Result<Response, AppError> {
    let outcome = sync_service::pull(&state.db, server_id, &token, query.since, Utc::now()).await?;
    Ok(match outcome {
        PullOutcome::NoChange => StatusCode::NO_CONTENT.into_response(),
        PullOutcome::Snapshot(payload) => Json(payload).into_response(),
    })
}

/// POST /api/v1/agents/{server_id}/ack
///
/// Тело разбирается после проверки токена: чужой агент получает 401,
/// а не ошибку формата.
async fn ack(
    State(state): State<AppState>,
    AgentToken(token): AgentToken,
    Path(server_id): Path<i32>,
    body: Result<Json<AckRequest>, JsonRejection>,
) -> Result<Json<AckResponse>, AppError> {
    sync_service::authenticate_agent(&state.db, server_id, &token).await?;

    let Json(req) = body.map_err(|e| {
        AppError::InvalidInput(format!("Некорректное тело ack: {}", e.body_text()))
    })?;
    let data = AckData {
        version: req.version,
        status: req.status,
    };
    sync_service::record_ack(&state.db, server_id, data, Utc::now()).await?;
    Ok(Json(AckResponse { accepted: true }))
}
