//! Маршруты прокси: CRUD, перемещение между группами.

use crate::api::middleware::AdminUser;
use crate::api::AppState;
use crate::error::AppError;
use crate::services::proxy_service::{self, NewProxy, ProxyChanges};
use crate::views::ProxyView;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct CreateProxyRequest {
    pub server_id: Option<i32>,
    pub group_id: Option<i32>,
    pub label: String,
    #[serde(rename = "type")]
    pub proxy_type: String,
    pub host: String,
    pub port: i64,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl CreateProxyRequest {
    /// Преобразовать в данные сервиса. `server_id` из пути имеет приоритет.
    pub fn into_new(self, server_id: Option<i32>) -> NewProxy {
        NewProxy {
            server_id: server_id.or(self.server_id),
            group_id: self.group_id,
            label: self.label,
            proxy_type: self.proxy_type,
            host: self.host,
            port: self.port,
            username: self.username,
            password: self.password,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateProxyRequest {
    pub label: Option<String>,
    #[serde(rename = "type")]
    pub proxy_type: Option<String>,
    pub host: Option<String>,
    pub port: Option<i64>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub health: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProxyListQuery {
    pub server_id: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct MoveRequest {
    pub group_id: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct BulkMoveRequest {
    pub proxy_ids: Vec<i32>,
    pub group_id: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct BulkMoveResponse {
    pub moved: u64,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/proxies", get(list_proxies).post(create_proxy))
        // Статический сегмент раньше `{id}`
        .route("/proxies/bulk-move", put(bulk_move))
        .route(
            "/proxies/{id}",
            get(get_proxy).patch(update_proxy).delete(delete_proxy),
        )
        .route("/proxies/{id}/group", put(move_to_group))
}

/// GET /api/v1/proxies[?server_id=]
async fn list_proxies(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<ProxyListQuery>,
) -> Result<Json<Vec<ProxyView>>, AppError> {
    let proxies = proxy_service::list_proxies(&state.db, query.server_id).await?;
    Ok(Json(proxies.iter().map(ProxyView::from).collect()))
}

/// POST /api/v1/proxies
async fn create_proxy(
    State(state): State<AppState>,
    admin: AdminUser,
    Json(req): Json<CreateProxyRequest>,
) -> Result<(StatusCode, Json<ProxyView>), AppError> {
    let model = proxy_service::create_proxy(&state.db, admin.actor(), req.into_new(None)).await?;
    Ok((StatusCode::CREATED, Json(ProxyView::from(&model))))
}

/// GET /api/v1/proxies/{id}
async fn get_proxy(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i32>,
) -> Result<Json<ProxyView>, AppError> {
    let model = proxy_service::get_proxy(&state.db, id).await?;
    Ok(Json(ProxyView::from(&model)))
}

/// PATCH /api/v1/proxies/{id}
async fn update_proxy(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<i32>,
    Json(req): Json<UpdateProxyRequest>,
) -> Result<Json<ProxyView>, AppError> {
    let changes = ProxyChanges {
        label: req.label,
        proxy_type: req.proxy_type,
        host: req.host,
        port: req.port,
        username: req.username,
        password: req.password,
        health: req.health,
    };
    let model = proxy_service::update_proxy(&state.db, admin.actor(), id, changes).await?;
    Ok(Json(ProxyView::from(&model)))
}

/// DELETE /api/v1/proxies/{id}
async fn delete_proxy(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    proxy_service::delete_proxy(&state.db, admin.actor(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/v1/proxies/{id}/group
async fn move_to_group(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<i32>,
    Json(req): Json<MoveRequest>,
) -> Result<Json<ProxyView>, AppError> {
    let model = proxy_service::move_to_group(&state.db, admin.actor(), id, req.group_id).await?;
    Ok(Json(ProxyView::from(&model)))
}

/// PUT /api/v1/proxies/bulk-move
async fn bulk_move(
    State(state): State<AppState>,
    admin: AdminUser,
    Json(req): Json<BulkMoveRequest>,
) -> Result<Json<BulkMoveResponse>, AppError> {
    let moved =
        proxy_service::bulk_move(&state.db, admin.actor(), &req.proxy_ids, req.group_id).await?;
    Ok(Json(BulkMoveResponse { moved }))
}
