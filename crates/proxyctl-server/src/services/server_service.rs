//! Сервис серверов: создание с выпуском токена агента, обновление,
//! транзакционное каскадное удаление.

use crate::error::AppError;
use crate::services::audit_service::{self, AuditEntry};
use crate::services::validation::require_non_empty;
use crate::views::ServerView;
use chrono::Utc;
use proxyctl_entities::mappings::{self, Entity as MappingEntity};
use proxyctl_entities::proxies::{self, Entity as ProxyEntity};
use proxyctl_entities::servers::{encode_tags, ActiveModel, Column, Entity as ServerEntity, Model};
use proxyctl_entities::ServerStatus;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection,
    DatabaseTransaction, EntityTrait, QueryFilter, QueryOrder, TransactionTrait,
};

/// Данные для создания сервера.
pub struct NewServer {
    pub name: String,
    pub tags: Vec<String>,
    pub wan_iface: String,
    pub lan_iface: String,
}

/// Частичное обновление сервера. Поля `None` не меняются.
#[derive(Default)]
pub struct ServerChanges {
    pub name: Option<String>,
    pub tags: Option<Vec<String>>,
    pub wan_iface: Option<String>,
    pub lan_iface: Option<String>,
}

/// Итог каскадного удаления.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CascadeReport {
    pub mappings_deleted: u64,
    pub proxies_detached: u64,
}

/// Сгенерировать токен агента: 32 случайных байта в hex.
pub fn generate_agent_token() -> Result<String, AppError> {
    let mut buf = [0u8; 32];
    getrandom::fill(&mut buf)
        .map_err(|e| AppError::Internal(format!("Ошибка генерации токена агента: {e}")))?;
    Ok(hex::encode(buf))
}

/// Создать сервер: версия 0, статус offline, новый токен агента.
pub async fn create_server(
    db: &DatabaseConnection,
    actor: &str,
    data: NewServer,
) -> Result<Model, AppError> {
    require_non_empty("name", &data.name)?;

    let now = Utc::now();
    let token = generate_agent_token()?;

    let txn = db.begin().await?;
    let model = ActiveModel {
        name: Set(data.name),
        tags: Set(encode_tags(&data.tags)),
        wan_iface: Set(data.wan_iface),
        lan_iface: Set(data.lan_iface),
        last_seen_at: Set(None),
        status: Set(ServerStatus::Offline),
        agent_token: Set(token),
        config_version: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    audit_service::record(
        &txn,
        AuditEntry::new(actor, "create", "server", model.id).after(&ServerView::from(&model))?,
    )
    .await?;
    txn.commit().await?;

    tracing::info!("Создан сервер {} ({})", model.id, model.name);
    Ok(model)
}

pub async fn list_servers(db: &DatabaseConnection) -> Result<Vec<Model>, AppError> {
    let servers = ServerEntity::find()
        .order_by_asc(Column::Id)
        .all(db)
        .await?;
    Ok(servers)
}

pub async fn get_server(db: &DatabaseConnection, server_id: i32) -> Result<Model, AppError> {
    find_server(db, server_id).await
}

/// Найти сервер на соединении или внутри транзакции.
pub async fn find_server<C: ConnectionTrait>(conn: &C, server_id: i32) -> Result<Model, AppError> {
    ServerEntity::find_by_id(server_id)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Сервер не найден: {server_id}")))
}

/// Обновить описательные поля сервера. Версию конфигурации не меняет:
/// эти поля не входят в payload агента.
pub async fn update_server(
    db: &DatabaseConnection,
    actor: &str,
    server_id: i32,
    changes: ServerChanges,
) -> Result<Model, AppError> {
    if let Some(name) = &changes.name {
        require_non_empty("name", name)?;
    }

    let txn = db.begin().await?;
    let record = find_server(&txn, server_id).await?;
    let before = ServerView::from(&record);

    let mut model: ActiveModel = record.into();
    if let Some(name) = changes.name {
        model.name = Set(name);
    }
    if let Some(tags) = changes.tags {
        model.tags = Set(encode_tags(&tags));
    }
    if let Some(wan) = changes.wan_iface {
        model.wan_iface = Set(wan);
    }
    if let Some(lan) = changes.lan_iface {
        model.lan_iface = Set(lan);
    }
    model.updated_at = Set(Utc::now());
    let updated = model.update(&txn).await?;

    audit_service::record(
        &txn,
        AuditEntry::new(actor, "update", "server", server_id)
            .before(&before)?
            .after(&ServerView::from(&updated))?,
    )
    .await?;
    txn.commit().await?;

    Ok(updated)
}

/// Удалить сервер одной транзакцией: маппинги сервера удаляются, прокси
/// отвязываются (`server_id = NULL`), затем удаляется сама строка сервера.
/// Ошибка любого шага откатывает всё.
pub async fn delete_server(
    db: &DatabaseConnection,
    actor: &str,
    server_id: i32,
) -> Result<CascadeReport, AppError> {
    let txn = db.begin().await?;

    match cascade_delete(&txn, actor, server_id).await {
        Ok(report) => {
            txn.commit().await?;
            tracing::info!(
                "Сервер {server_id} удалён: маппингов удалено {}, прокси отвязано {}",
                report.mappings_deleted,
                report.proxies_detached
            );
            Ok(report)
        }
        Err(e) => {
            if let Err(rollback_err) = txn.rollback().await {
                tracing::error!("Не удалось откатить удаление сервера {server_id}: {rollback_err}");
            } else {
                tracing::warn!("Удаление сервера {server_id} откачено: {e}");
            }
            Err(e)
        }
    }
}

async fn cascade_delete(
    txn: &DatabaseTransaction,
    actor: &str,
    server_id: i32,
) -> Result<CascadeReport, AppError> {
    let record = find_server(txn, server_id).await?;

    // 1. Маппинги сервера
    let deleted = MappingEntity::delete_many()
        .filter(mappings::Column::ServerId.eq(server_id))
        .exec(txn)
        .await?;

    // 2. Отвязка прокси
    let detached = ProxyEntity::update_many()
        .col_expr(proxies::Column::ServerId, Expr::value(Option::<i32>::None))
        .col_expr(proxies::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(proxies::Column::ServerId.eq(server_id))
        .exec(txn)
        .await?;

    // 3. Сам сервер
    let removed = ServerEntity::delete_by_id(server_id).exec(txn).await?;
    if removed.rows_affected == 0 {
        return Err(AppError::NotFound(format!("Сервер не найден: {server_id}")));
    }

    let report = CascadeReport {
        mappings_deleted: deleted.rows_affected,
        proxies_detached: detached.rows_affected,
    };

    let mut entry =
        AuditEntry::new(actor, "delete", "server", server_id).before(&ServerView::from(&record))?;
    entry.after = Some(serde_json::json!({
        "mappings_deleted": report.mappings_deleted,
        "proxies_detached": report.proxies_detached,
    }));
    audit_service::record(txn, entry).await?;

    Ok(report)
}
