//! Административные маршруты: сводка и журнал аудита.

use crate::api::middleware::AdminUser;
use crate::api::AppState;
use crate::error::AppError;
use crate::services::{audit_service, liveness_service};
use crate::views::AuditView;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const DEFAULT_AUDIT_LIMIT: u64 = 100;
const MAX_AUDIT_LIMIT: u64 = 1000;

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub servers: u64,
    pub proxies: u64,
    pub mappings: u64,
    pub active_servers: u64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub limit: Option<u64>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/summary", get(get_summary))
        .route("/audit", get(get_audit))
}

/// GET /api/v1/admin/summary: количество записей и активных серверов.
async fn get_summary(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<SummaryResponse>, AppError> {
    let now = Utc::now();
    let summary = liveness_service::summary(&state.db, now, state.staleness_window).await?;

    Ok(Json(SummaryResponse {
        servers: summary.servers,
        proxies: summary.proxies,
        mappings: summary.mappings,
        active_servers: summary.active_servers,
        timestamp: now,
    }))
}

/// GET /api/v1/admin/audit?limit=: последние записи журнала.
async fn get_audit(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<AuditQuery>,
) -> Result<Json<Vec<AuditView>>, AppError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_AUDIT_LIMIT)
        .clamp(1, MAX_AUDIT_LIMIT);
    let rows = audit_service::recent(&state.db, limit).await?;
    Ok(Json(rows.into_iter().map(AuditView::from).collect()))
}
