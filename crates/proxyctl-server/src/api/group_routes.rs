//! Маршруты групп прокси.

use crate::api::middleware::AdminUser;
use crate::api::AppState;
use crate::error::AppError;
use crate::services::group_service::{self, GroupData};
use crate::views::GroupView;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct GroupRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl From<GroupRequest> for GroupData {
    fn from(req: GroupRequest) -> Self {
        GroupData {
            name: req.name,
            description: req.description,
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/groups", get(list_groups).post(create_group))
        .route("/groups/{id}", put(update_group).delete(delete_group))
}

/// GET /api/v1/groups: группы с числом прокси.
async fn list_groups(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<GroupView>>, AppError> {
    let groups = group_service::list_groups(&state.db).await?;
    Ok(Json(
        groups
            .iter()
            .map(|(g, count)| GroupView::new(g, *count))
            .collect(),
    ))
}

/// POST /api/v1/groups
async fn create_group(
    State(state): State<AppState>,
    admin: AdminUser,
    Json(req): Json<GroupRequest>,
) -> Result<(StatusCode, Json<GroupView>), AppError> {
    let model = group_service::create_group(&state.db, admin.actor(), req.into()).await?;
    Ok((StatusCode::CREATED, Json(GroupView::new(&model, 0))))
}

/// PUT /api/v1/groups/{id}
async fn update_group(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<i32>,
    Json(req): Json<GroupRequest>,
) -> Result<Json<GroupView>, AppError> {
    let (model, count) =
        group_service::update_group(&state.db, admin.actor(), id, req.into()).await?;
    Ok(Json(GroupView::new(&model, count)))
}

/// DELETE /api/v1/groups/{id}
async fn delete_group(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    group_service::delete_group(&state.db, admin.actor(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}
