//! Счётчик версии конфигурации сервера.
//!
//! Инкремент выполняется одним выражением `config_version = config_version + 1`
//! на стороне БД: параллельные мутации не теряют обновлений, а вызов внутри
//! транзакции фиксируется вместе с изменением строки.

use crate::error::AppError;
use proxyctl_entities::servers::{Column, Entity as ServerEntity};
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QuerySelect, UpdateMany};
use std::collections::BTreeSet;

/// Запрос инкремента: `UPDATE servers SET config_version = config_version + 1`.
pub(crate) fn increment_query(server_id: i32) -> UpdateMany<ServerEntity> {
    ServerEntity::update_many()
        .col_expr(
            Column::ConfigVersion,
            Expr::col(Column::ConfigVersion).add(1),
        )
        .filter(Column::Id.eq(server_id))
}

/// Атомарно увеличить версию конфигурации сервера на 1.
pub async fn increment<C: ConnectionTrait>(conn: &C, server_id: i32) -> Result<(), AppError> {
    let result = increment_query(server_id).exec(conn).await?;

    if result.rows_affected == 0 {
        return Err(AppError::NotFound(format!("Сервер не найден: {server_id}")));
    }
    Ok(())
}

/// Увеличить версию каждого сервера из набора ровно один раз.
pub async fn increment_each<C: ConnectionTrait>(
    conn: &C,
    server_ids: &BTreeSet<i32>,
) -> Result<(), AppError> {
    for server_id in server_ids {
        increment(conn, *server_id).await?;
    }
    Ok(())
}

/// Текущая версия конфигурации сервера.
pub async fn current_version<C: ConnectionTrait>(conn: &C, server_id: i32) -> Result<i64, AppError> {
    ServerEntity::find_by_id(server_id)
        .select_only()
        .column(Column::ConfigVersion)
        .into_tuple::<i64>()
        .one(conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Сервер не найден: {server_id}")))
}
