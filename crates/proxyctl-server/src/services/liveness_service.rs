//! Живость агентов.
//!
//! `status`/`last_seen_at` пишутся только как побочный эффект успешных
//! pull/ack. Обратно в `offline` статус никто не переводит: устаревание
//! вычисляется при чтении.

use crate::error::AppError;
use chrono::{DateTime, Duration, Utc};
use proxyctl_entities::mappings::Entity as MappingEntity;
use proxyctl_entities::proxies::Entity as ProxyEntity;
use proxyctl_entities::servers::{Column, Entity as ServerEntity, Model};
use proxyctl_entities::ServerStatus;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter,
};

/// Отметить сервер онлайн и обновить `last_seen_at`.
pub async fn mark_seen<C: ConnectionTrait>(
    conn: &C,
    server_id: i32,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    let result = ServerEntity::update_many()
        .col_expr(Column::Status, Expr::value(ServerStatus::Online))
        .col_expr(Column::LastSeenAt, Expr::value(Some(now)))
        .filter(Column::Id.eq(server_id))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        return Err(AppError::NotFound(format!("Сервер не найден: {server_id}")));
    }
    Ok(())
}

/// Активен ли сервер: `status == online` ИЛИ последний контакт внутри окна.
pub fn is_active(server: &Model, now: DateTime<Utc>, window: Duration) -> bool {
    server.status == ServerStatus::Online
        || server
            .last_seen_at
            .is_some_and(|seen| seen > now - window)
}

/// Сводка по реестру.
pub struct Summary {
    pub servers: u64,
    pub proxies: u64,
    pub mappings: u64,
    pub active_servers: u64,
}

/// Посчитать сводку. Активность оценивается тем же правилом, что и [`is_active`].
pub async fn summary(
    db: &DatabaseConnection,
    now: DateTime<Utc>,
    window: Duration,
) -> Result<Summary, AppError> {
    let servers = ServerEntity::find().count(db).await?;
    let proxies = ProxyEntity::find().count(db).await?;
    let mappings = MappingEntity::find().count(db).await?;

    let cutoff = now - window;
    let active_servers = ServerEntity::find()
        .filter(
            Condition::any()
                .add(Column::Status.eq(ServerStatus::Online))
                .add(Column::LastSeenAt.gt(cutoff)),
        )
        .count(db)
        .await?;

    Ok(Summary {
        servers,
        proxies,
        mappings,
        active_servers,
    })
}
