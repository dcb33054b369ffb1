//! Маршруты серверов: CRUD, вложенные прокси и маппинги.

use crate::api::mapping_routes::CreateMappingRequest;
use crate::api::middleware::AdminUser;
use crate::api::proxy_routes::CreateProxyRequest;
use crate::api::AppState;
use crate::error::AppError;
use crate::services::server_service::{self, NewServer, ServerChanges};
use crate::services::{liveness_service, mapping_service, proxy_service};
use crate::views::{MappingView, ProxyView, ServerView};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

// ── Типы запросов/ответов ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateServerRequest {
    pub name: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub wan_iface: String,
    #[serde(default)]
    pub lan_iface: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateServerRequest {
    pub name: Option<String>,
    pub tags: Option<Vec<String>>,
    pub wan_iface: Option<String>,
    pub lan_iface: Option<String>,
}

/// Ответ на создание: единственное место, где возвращается токен агента.
#[derive(Debug, Serialize)]
pub struct ServerCreated {
    #[serde(flatten)]
    pub server: ServerView,
    pub agent_token: String,
}

#[derive(Debug, Serialize)]
pub struct ServerDetail {
    #[serde(flatten)]
    pub server: ServerView,
    pub active: bool,
    pub proxies: Vec<ProxyView>,
    pub mappings: Vec<MappingView>,
}

#[derive(Debug, Serialize)]
pub struct DeleteServerResponse {
    pub deleted: bool,
    pub mappings_deleted: u64,
    pub proxies_detached: u64,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/servers", get(list_servers).post(create_server))
        .route(
            "/servers/{id}",
            get(get_server).patch(update_server).delete(delete_server),
        )
        .route(
            "/servers/{id}/proxies",
            get(list_server_proxies).post(create_server_proxy),
        )
        .route(
            "/servers/{id}/mappings",
            get(list_server_mappings).post(create_server_mapping),
        )
}

// ── Обработчики ──────────────────────────────────────────────────────────────

/// GET /api/v1/servers
async fn list_servers(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<ServerView>>, AppError> {
    let servers = server_service::list_servers(&state.db).await?;
    Ok(Json(servers.iter().map(ServerView::from).collect()))
}

/// POST /api/v1/servers: создать сервер и выпустить токен агента.
async fn create_server(
    State(state): State<AppState>,
    admin: AdminUser,
    Json(req): Json<CreateServerRequest>,
) -> Result<(StatusCode, Json<ServerCreated>), AppError> {
    let model = server_service::create_server(
        &state.db,
        admin.actor(),
        NewServer {
            name: req.name,
            tags: req.tags,
            wan_iface: req.wan_iface,
            lan_iface: req.lan_iface,
        },
    )
    .await?;

    let body = ServerCreated {
        server: ServerView::from(&model),
        agent_token: model.agent_token,
    };
    Ok((StatusCode::CREATED, Json(body)))
}

/// GET /api/v1/servers/{id}: сервер с его прокси и маппингами.
async fn get_server(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i32>,
) -> Result<Json<ServerDetail>, AppError> {
    let server = server_service::get_server(&state.db, id).await?;
    let proxies = proxy_service::list_proxies(&state.db, Some(id)).await?;
    let mappings = mapping_service::list_mappings(&state.db, Some(id)).await?;

    let active = liveness_service::is_active(&server, chrono::Utc::now(), state.staleness_window);

    Ok(Json(ServerDetail {
        server: ServerView::from(&server),
        active,
        proxies: proxies.iter().map(ProxyView::from).collect(),
        mappings: mappings
            .iter()
            .map(|(m, p)| MappingView::new(m, p.as_ref()))
            .collect(),
    }))
}

/// PATCH /api/v1/servers/{id}
async fn update_server(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<i32>,
    Json(req): Json<UpdateServerRequest>,
) -> Result<Json<ServerView>, AppError> {
    let updated = server_service::update_server(
        &state.db,
        admin.actor(),
        id,
        ServerChanges {
            name: req.name,
            tags: req.tags,
            wan_iface: req.wan_iface,
            lan_iface: req.lan_iface,
        },
    )
    .await?;
    Ok(Json(ServerView::from(&updated)))
}

/// DELETE /api/v1/servers/{id}: каскадное удаление.
async fn delete_server(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<i32>,
) -> Result<Json<DeleteServerResponse>, AppError> {
    let report = server_service::delete_server(&state.db, admin.actor(), id).await?;
    Ok(Json(DeleteServerResponse {
        deleted: true,
        mappings_deleted: report.mappings_deleted,
        proxies_detached: report.proxies_detached,
    }))
}

/// GET /api/v1/servers/{id}/proxies
async fn list_server_proxies(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i32>,
) -> Result<Json<Vec<ProxyView>>, AppError> {
    server_service::get_server(&state.db, id).await?;
    let proxies = proxy_service::list_proxies(&state.db, Some(id)).await?;
    Ok(Json(proxies.iter().map(ProxyView::from).collect()))
}

/// POST /api/v1/servers/{id}/proxies: прокси, привязанный к серверу из пути.
async fn create_server_proxy(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<i32>,
    Json(req): Json<CreateProxyRequest>,
) -> Result<(StatusCode, Json<ProxyView>), AppError> {
    let model = proxy_service::create_proxy(&state.db, admin.actor(), req.into_new(Some(id))).await?;
    Ok((StatusCode::CREATED, Json(ProxyView::from(&model))))
}

/// GET /api/v1/servers/{id}/mappings
async fn list_server_mappings(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i32>,
) -> Result<Json<Vec<MappingView>>, AppError> {
    server_service::get_server(&state.db, id).await?;
    let mappings = mapping_service::list_mappings(&state.db, Some(id)).await?;
    Ok(Json(
        mappings
            .iter()
            .map(|(m, p)| MappingView::new(m, p.as_ref()))
            .collect(),
    ))
}

/// POST /api/v1/servers/{id}/mappings
async fn create_server_mapping(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<i32>,
    Json(req): Json<CreateMappingRequest>,
) -> Result<(StatusCode, Json<MappingView>), AppError> {
    let model =
        mapping_service::create_mapping(&state.db, admin.actor(), req.into_new(Some(id))?).await?;
    Ok((StatusCode::CREATED, Json(MappingView::from(&model))))
}
