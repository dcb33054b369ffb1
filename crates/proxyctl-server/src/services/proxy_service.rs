//! Сервис прокси. Каждая мутация прокси, привязанного к серверу,
//! увеличивает версию конфигурации этого сервера в той же транзакции.

use crate::error::AppError;
use crate::services::audit_service::{self, AuditEntry};
use crate::services::validation::{parse_health, parse_proxy_type, require_non_empty, validate_port};
use crate::services::{server_service, version_service};
use crate::views::ProxyView;
use chrono::Utc;
use proxyctl_entities::mappings::{self, Entity as MappingEntity};
use proxyctl_entities::proxies::{ActiveModel, Column, Entity as ProxyEntity, Model};
use proxyctl_entities::proxy_groups::Entity as GroupEntity;
use proxyctl_entities::ProxyHealth;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, TransactionTrait,
};
use std::collections::BTreeSet;

/// Данные для создания прокси.
pub struct NewProxy {
    pub server_id: Option<i32>,
    pub group_id: Option<i32>,
    pub label: String,
    pub proxy_type: String,
    pub host: String,
    pub port: i64,
    pub username: String,
    pub password: String,
}

/// Частичное обновление прокси. Привязка к серверу задаётся только при создании.
#[derive(Default)]
pub struct ProxyChanges {
    pub label: Option<String>,
    pub proxy_type: Option<String>,
    pub host: Option<String>,
    pub port: Option<i64>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub health: Option<String>,
}

pub async fn list_proxies(
    db: &DatabaseConnection,
    server_id: Option<i32>,
) -> Result<Vec<Model>, AppError> {
    let mut query = ProxyEntity::find().order_by_asc(Column::Id);
    if let Some(id) = server_id {
        query = query.filter(Column::ServerId.eq(id));
    }
    Ok(query.all(db).await?)
}

pub async fn get_proxy(db: &DatabaseConnection, proxy_id: i32) -> Result<Model, AppError> {
    ProxyEntity::find_by_id(proxy_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Прокси не найден: {proxy_id}")))
}

/// Создать прокси. Здоровье при создании всегда `unknown`.
pub async fn create_proxy(
    db: &DatabaseConnection,
    actor: &str,
    data: NewProxy,
) -> Result<Model, AppError> {
    require_non_empty("label", &data.label)?;
    require_non_empty("host", &data.host)?;
    let proxy_type = parse_proxy_type(&data.proxy_type)?;
    let port = validate_port(data.port)?;

    let txn = db.begin().await?;

    if let Some(server_id) = data.server_id {
        server_service::find_server(&txn, server_id).await?;
    }
    if let Some(group_id) = data.group_id {
        ensure_group(&txn, group_id).await?;
    }

    let now = Utc::now();
    let model = ActiveModel {
        server_id: Set(data.server_id),
        group_id: Set(data.group_id),
        label: Set(data.label),
        proxy_type: Set(proxy_type),
        host: Set(data.host),
        port: Set(i32::from(port)),
        username: Set(data.username),
        password: Set(data.password),
        health: Set(ProxyHealth::Unknown),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    if let Some(server_id) = model.server_id {
        version_service::increment(&txn, server_id).await?;
    }
    audit_service::record(
        &txn,
        AuditEntry::new(actor, "create", "proxy", model.id).after(&ProxyView::from(&model))?,
    )
    .await?;
    txn.commit().await?;

    tracing::info!("Создан прокси {} (сервер: {:?})", model.id, model.server_id);
    Ok(model)
}

pub async fn update_proxy(
    db: &DatabaseConnection,
    actor: &str,
    proxy_id: i32,
    changes: ProxyChanges,
) -> Result<Model, AppError> {
    if let Some(label) = &changes.label {
        require_non_empty("label", label)?;
    }
    if let Some(host) = &changes.host {
        require_non_empty("host", host)?;
    }
    let proxy_type = changes.proxy_type.as_deref().map(parse_proxy_type).transpose()?;
    let port = changes.port.map(validate_port).transpose()?;
    let health = changes.health.as_deref().map(parse_health).transpose()?;

    let txn = db.begin().await?;
    let record = find_proxy(&txn, proxy_id).await?;
    let before = ProxyView::from(&record);

    let mut model: ActiveModel = record.into();
    if let Some(label) = changes.label {
        model.label = Set(label);
    }
    if let Some(t) = proxy_type {
        model.proxy_type = Set(t);
    }
    if let Some(host) = changes.host {
        model.host = Set(host);
    }
    if let Some(p) = port {
        model.port = Set(i32::from(p));
    }
    if let Some(username) = changes.username {
        model.username = Set(username);
    }
    if let Some(password) = changes.password {
        model.password = Set(password);
    }
    if let Some(h) = health {
        model.health = Set(h);
    }
    model.updated_at = Set(Utc::now());
    let updated = model.update(&txn).await?;

    if let Some(server_id) = updated.server_id {
        version_service::increment(&txn, server_id).await?;
    }
    audit_service::record(
        &txn,
        AuditEntry::new(actor, "update", "proxy", proxy_id)
            .before(&before)?
            .after(&ProxyView::from(&updated))?,
    )
    .await?;
    txn.commit().await?;

    Ok(updated)
}

/// Удалить прокси. Прокси, на который ссылается маппинг, удалить нельзя.
pub async fn delete_proxy(
    db: &DatabaseConnection,
    actor: &str,
    proxy_id: i32,
) -> Result<(), AppError> {
    let txn = db.begin().await?;
    let record = find_proxy(&txn, proxy_id).await?;

    let referencing = MappingEntity::find()
        .filter(mappings::Column::UpstreamProxyId.eq(proxy_id))
        .count(&txn)
        .await?;
    if referencing > 0 {
        return Err(AppError::Conflict(format!(
            "Прокси {proxy_id} используется в {referencing} маппинг(ах). Сначала удалите их"
        )));
    }

    ProxyEntity::delete_by_id(proxy_id).exec(&txn).await?;

    if let Some(server_id) = record.server_id {
        version_service::increment(&txn, server_id).await?;
    }
    audit_service::record(
        &txn,
        AuditEntry::new(actor, "delete", "proxy", proxy_id).before(&ProxyView::from(&record))?,
    )
    .await?;
    txn.commit().await?;

    tracing::info!("Прокси {proxy_id} удалён");
    Ok(())
}

/// Переместить прокси в группу (`None` убирает из группы).
pub async fn move_to_group(
    db: &DatabaseConnection,
    actor: &str,
    proxy_id: i32,
    group_id: Option<i32>,
) -> Result<Model, AppError> {
    let txn = db.begin().await?;
    let record = find_proxy(&txn, proxy_id).await?;
    if let Some(group_id) = group_id {
        ensure_group(&txn, group_id).await?;
    }
    let before = ProxyView::from(&record);

    let mut model: ActiveModel = record.into();
    model.group_id = Set(group_id);
    model.updated_at = Set(Utc::now());
    let updated = model.update(&txn).await?;

    if let Some(server_id) = updated.server_id {
        version_service::increment(&txn, server_id).await?;
    }
    audit_service::record(
        &txn,
        AuditEntry::new(actor, "move", "proxy", proxy_id)
            .before(&before)?
            .after(&ProxyView::from(&updated))?,
    )
    .await?;
    txn.commit().await?;

    Ok(updated)
}

/// Переместить несколько прокси в группу одной транзакцией.
///
/// Все идентификаторы должны существовать. Версия каждого затронутого
/// сервера увеличивается ровно один раз. Возвращает число перемещённых прокси.
pub async fn bulk_move(
    db: &DatabaseConnection,
    actor: &str,
    proxy_ids: &[i32],
    group_id: Option<i32>,
) -> Result<u64, AppError> {
    let ids: BTreeSet<i32> = proxy_ids.iter().copied().collect();
    if ids.is_empty() {
        return Err(AppError::InvalidInput("Не указаны proxy_ids".into()));
    }

    let txn = db.begin().await?;
    if let Some(group_id) = group_id {
        ensure_group(&txn, group_id).await?;
    }

    let found = ProxyEntity::find()
        .filter(Column::Id.is_in(ids.iter().copied()))
        .all(&txn)
        .await?;
    if found.len() != ids.len() {
        let present: BTreeSet<i32> = found.iter().map(|p| p.id).collect();
        let missing: Vec<i32> = ids.difference(&present).copied().collect();
        return Err(AppError::NotFound(format!("Прокси не найдены: {missing:?}")));
    }

    let moved = ProxyEntity::update_many()
        .col_expr(Column::GroupId, Expr::value(group_id))
        .col_expr(Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(Column::Id.is_in(ids.iter().copied()))
        .exec(&txn)
        .await?;

    let affected: BTreeSet<i32> = found.iter().filter_map(|p| p.server_id).collect();
    version_service::increment_each(&txn, &affected).await?;

    let entry = AuditEntry {
        actor: actor.to_string(),
        action: "bulk_move",
        resource: "proxies".to_string(),
        before: None,
        after: Some(serde_json::json!({
            "proxy_ids": ids.iter().collect::<Vec<_>>(),
            "group_id": group_id,
            "servers": affected.iter().collect::<Vec<_>>(),
        })),
    };
    audit_service::record(&txn, entry).await?;
    txn.commit().await?;

    tracing::info!(
        "Перемещено {} прокси в группу {:?}, затронуто серверов: {}",
        moved.rows_affected,
        group_id,
        affected.len()
    );
    Ok(moved.rows_affected)
}

async fn find_proxy<C: ConnectionTrait>(conn: &C, proxy_id: i32) -> Result<Model, AppError> {
    ProxyEntity::find_by_id(proxy_id)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Прокси не найден: {proxy_id}")))
}

async fn ensure_group<C: ConnectionTrait>(conn: &C, group_id: i32) -> Result<(), AppError> {
    GroupEntity::find_by_id(group_id)
        .one(conn)
        .await?
        .map(|_| ())
        .ok_or_else(|| AppError::NotFound(format!("Группа не найдена: {group_id}")))
}
