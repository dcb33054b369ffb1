//! Сервис маппингов клиентского трафика на upstream-прокси.
//!
//! Маппинг всегда принадлежит серверу, поэтому любая его мутация
//! увеличивает версию конфигурации сервера в той же транзакции.

use crate::error::AppError;
use crate::services::audit_service::{self, AuditEntry};
use crate::services::validation::{require_non_empty, validate_dst_ports};
use crate::services::{server_service, version_service};
use crate::views::MappingView;
use chrono::Utc;
use proxyctl_entities::mappings::{encode_ports, ActiveModel, Column, Entity as MappingEntity, Model};
use proxyctl_entities::proxies::{self, Entity as ProxyEntity};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, QueryFilter, QueryOrder, TransactionTrait,
};

/// Данные для создания маппинга.
pub struct NewMapping {
    pub server_id: i32,
    pub client_cidr: String,
    pub dst_ports: Vec<i64>,
    pub upstream_proxy_id: i32,
    pub enabled: Option<bool>,
    pub notes: String,
}

#[derive(Default)]
pub struct MappingChanges {
    pub client_cidr: Option<String>,
    pub dst_ports: Option<Vec<i64>>,
    pub upstream_proxy_id: Option<i32>,
    pub enabled: Option<bool>,
    pub notes: Option<String>,
}

/// Маппинг вместе с его upstream-прокси.
pub type MappingWithUpstream = (Model, Option<proxies::Model>);

pub async fn list_mappings(
    db: &DatabaseConnection,
    server_id: Option<i32>,
) -> Result<Vec<MappingWithUpstream>, AppError> {
    let mut query = MappingEntity::find()
        .find_also_related(ProxyEntity)
        .order_by_asc(Column::Id);
    if let Some(id) = server_id {
        query = query.filter(Column::ServerId.eq(id));
    }
    Ok(query.all(db).await?)
}

pub async fn get_mapping(
    db: &DatabaseConnection,
    mapping_id: i32,
) -> Result<MappingWithUpstream, AppError> {
    MappingEntity::find_by_id(mapping_id)
        .find_also_related(ProxyEntity)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Маппинг не найден: {mapping_id}")))
}

pub async fn create_mapping(
    db: &DatabaseConnection,
    actor: &str,
    data: NewMapping,
) -> Result<Model, AppError> {
    require_non_empty("client_cidr", &data.client_cidr)?;
    let ports = validate_dst_ports(&data.dst_ports)?;

    let txn = db.begin().await?;
    server_service::find_server(&txn, data.server_id).await?;
    check_upstream(&txn, data.upstream_proxy_id, data.server_id).await?;

    let now = Utc::now();
    let model = ActiveModel {
        server_id: Set(data.server_id),
        client_cidr: Set(data.client_cidr),
        dst_ports: Set(encode_ports(&ports)),
        upstream_proxy_id: Set(data.upstream_proxy_id),
        enabled: Set(data.enabled.unwrap_or(true)),
        notes: Set(data.notes),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    version_service::increment(&txn, model.server_id).await?;
    audit_service::record(
        &txn,
        AuditEntry::new(actor, "create", "mapping", model.id).after(&MappingView::from(&model))?,
    )
    .await?;
    txn.commit().await?;

    tracing::info!("Создан маппинг {} (сервер {})", model.id, model.server_id);
    Ok(model)
}

pub async fn update_mapping(
    db: &DatabaseConnection,
    actor: &str,
    mapping_id: i32,
    changes: MappingChanges,
) -> Result<Model, AppError> {
    if let Some(cidr) = &changes.client_cidr {
        require_non_empty("client_cidr", cidr)?;
    }
    let ports = changes
        .dst_ports
        .as_deref()
        .map(validate_dst_ports)
        .transpose()?;

    let txn = db.begin().await?;
    let record = find_mapping(&txn, mapping_id).await?;
    if let Some(proxy_id) = changes.upstream_proxy_id {
        check_upstream(&txn, proxy_id, record.server_id).await?;
    }
    let before = MappingView::from(&record);

    let mut model: ActiveModel = record.into();
    if let Some(cidr) = changes.client_cidr {
        model.client_cidr = Set(cidr);
    }
    if let Some(ports) = ports {
        model.dst_ports = Set(encode_ports(&ports));
    }
    if let Some(proxy_id) = changes.upstream_proxy_id {
        model.upstream_proxy_id = Set(proxy_id);
    }
    if let Some(enabled) = changes.enabled {
        model.enabled = Set(enabled);
    }
    if let Some(notes) = changes.notes {
        model.notes = Set(notes);
    }
    model.updated_at = Set(Utc::now());
    let updated = model.update(&txn).await?;

    version_service::increment(&txn, updated.server_id).await?;
    audit_service::record(
        &txn,
        AuditEntry::new(actor, "update", "mapping", mapping_id)
            .before(&before)?
            .after(&MappingView::from(&updated))?,
    )
    .await?;
    txn.commit().await?;

    Ok(updated)
}

pub async fn delete_mapping(
    db: &DatabaseConnection,
    actor: &str,
    mapping_id: i32,
) -> Result<(), AppError> {
    let txn = db.begin().await?;
    let record = find_mapping(&txn, mapping_id).await?;

    MappingEntity::delete_by_id(mapping_id).exec(&txn).await?;
    version_service::increment(&txn, record.server_id).await?;
    audit_service::record(
        &txn,
        AuditEntry::new(actor, "delete", "mapping", mapping_id)
            .before(&MappingView::from(&record))?,
    )
    .await?;
    txn.commit().await?;

    tracing::info!("Маппинг {mapping_id} удалён (сервер {})", record.server_id);
    Ok(())
}

async fn find_mapping<C: ConnectionTrait>(conn: &C, mapping_id: i32) -> Result<Model, AppError> {
    MappingEntity::find_by_id(mapping_id)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Маппинг не найден: {mapping_id}")))
}

/// Upstream-прокси должен существовать и принадлежать тому же серверу.
async fn check_upstream<C: ConnectionTrait>(
    conn: &C,
    proxy_id: i32,
    server_id: i32,
) -> Result<(), AppError> {
    let owned = ProxyEntity::find_by_id(proxy_id)
        .filter(proxies::Column::ServerId.eq(server_id))
        .one(conn)
        .await?;
    match owned {
        Some(_) => Ok(()),
        None => Err(AppError::InvalidReference(format!(
            "Upstream-прокси {proxy_id} не найден или принадлежит другому серверу"
        ))),
    }
}
