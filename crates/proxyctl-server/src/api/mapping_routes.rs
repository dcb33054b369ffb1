//! Маршруты маппингов.

use crate::api::middleware::AdminUser;
use crate::api::AppState;
use crate::error::AppError;
use crate::services::mapping_service::{self, MappingChanges, NewMapping};
use crate::views::MappingView;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct CreateMappingRequest {
    pub server_id: Option<i32>,
    pub client_cidr: String,
    pub dst_ports: Vec<i64>,
    pub upstream_proxy_id: i32,
    pub enabled: Option<bool>,
    #[serde(default)]
    pub notes: String,
}

impl CreateMappingRequest {
    /// `server_id` из пути имеет приоритет над телом запроса.
    pub fn into_new(self, server_id: Option<i32>) -> Result<NewMapping, AppError> {
        let server_id = server_id
            .or(self.server_id)
            .ok_or_else(|| AppError::InvalidInput("server_id обязателен".into()))?;
        Ok(NewMapping {
            server_id,
            client_cidr: self.client_cidr,
            dst_ports: self.dst_ports,
            upstream_proxy_id: self.upstream_proxy_id,
            enabled: self.enabled,
            notes: self.notes,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateMappingRequest {
    pub client_cidr: Option<String>,
    pub dst_ports: Option<Vec<i64>>,
    pub upstream_proxy_id: Option<i32>,
    pub enabled: Option<bool>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MappingListQuery {
    pub server_id: Option<i32>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/mappings", get(list_mappings).post(create_mapping))
        .route(
            "/mappings/{id}",
            get(get_mapping).patch(update_mapping).delete(delete_mapping),
        )
}

/// GET /api/v1/mappings[?server_id=]
async fn list_mappings(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<MappingListQuery>,
) -> Result<Json<Vec<MappingView>>, AppError> {
    let rows = mapping_service::list_mappings(&state.db, query.server_id).await?;
    Ok(Json(
        rows.iter()
            .map(|(m, p)| MappingView::new(m, p.as_ref()))
            .collect(),
    ))
}

/// POST /api/v1/mappings
async fn create_mapping(
    State(state): State<AppState>,
    admin: AdminUser,
    Json(req): Json<CreateMappingRequest>,
) -> Result<(StatusCode, Json<MappingView>), AppError> {
    let model =
        mapping_service::create_mapping(&state.db, admin.actor(), req.into_new(None)?).await?;
    Ok((StatusCode::CREATED, Json(MappingView::from(&model))))
}

/// GET /api/v1/mappings/{id}
async fn get_mapping(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i32>,
) -> Result<Json<MappingView>, AppError> {
    let (mapping, upstream) = mapping_service::get_mapping(&state.db, id).await?;
    Ok(Json(MappingView::new(&mapping, upstream.as_ref())))
}

/// PATCH /api/v1/mappings/{id}
async fn update_mapping(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<i32>,
    Json(req): Json<UpdateMappingRequest>,
) -> Result<Json<MappingView>, AppError> {
    let changes = MappingChanges {
        client_cidr: req.client_cidr,
        dst_ports: req.dst_ports,
        upstream_proxy_id: req.upstream_proxy_id,
        enabled: req.enabled,
        notes: req.notes,
    };
    let model = mapping_service::update_mapping(&state.db, admin.actor(), id, changes).await?;
    Ok(Json(MappingView::from(&model)))
}

/// DELETE /api/v1/mappings/{id}
async fn delete_mapping(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    mapping_service::delete_mapping(&state.db, admin.actor(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}
