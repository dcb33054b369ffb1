//! Сервис групп прокси. Группы не входят в счётчик версий: изменение
//! самой группы не меняет конфигурацию агента.

use crate::error::AppError;
use crate::services::audit_service::{self, AuditEntry};
use crate::services::validation::require_non_empty;
use crate::views::GroupView;
use chrono::Utc;
use proxyctl_entities::proxies::{self, Entity as ProxyEntity};
use proxyctl_entities::proxy_groups::{ActiveModel, Column, Entity as GroupEntity, Model};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, TransactionTrait,
};

pub struct GroupData {
    pub name: String,
    pub description: String,
}

/// Группы с числом прокси в каждой.
pub async fn list_groups(db: &DatabaseConnection) -> Result<Vec<(Model, u64)>, AppError> {
    let groups = GroupEntity::find()
        .order_by_asc(Column::Id)
        .all(db)
        .await?;

    let mut result = Vec::with_capacity(groups.len());
    for group in groups {
        let count = count_proxies(db, group.id).await?;
        result.push((group, count));
    }
    Ok(result)
}

pub async fn create_group(
    db: &DatabaseConnection,
    actor: &str,
    data: GroupData,
) -> Result<Model, AppError> {
    require_non_empty("name", &data.name)?;

    let txn = db.begin().await?;
    ensure_name_free(&txn, &data.name, None).await?;

    let now = Utc::now();
    let model = ActiveModel {
        name: Set(data.name),
        description: Set(data.description),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    audit_service::record(
        &txn,
        AuditEntry::new(actor, "create", "group", model.id).after(&GroupView::new(&model, 0))?,
    )
    .await?;
    txn.commit().await?;

    Ok(model)
}

pub async fn update_group(
    db: &DatabaseConnection,
    actor: &str,
    group_id: i32,
    data: GroupData,
) -> Result<(Model, u64), AppError> {
    require_non_empty("name", &data.name)?;

    let txn = db.begin().await?;
    let record = find_group(&txn, group_id).await?;
    ensure_name_free(&txn, &data.name, Some(group_id)).await?;
    let count = count_proxies(&txn, group_id).await?;
    let before = GroupView::new(&record, count);

    let mut model: ActiveModel = record.into();
    model.name = Set(data.name);
    model.description = Set(data.description);
    model.updated_at = Set(Utc::now());
    let updated = model.update(&txn).await?;

    audit_service::record(
        &txn,
        AuditEntry::new(actor, "update", "group", group_id)
            .before(&before)?
            .after(&GroupView::new(&updated, count))?,
    )
    .await?;
    txn.commit().await?;

    Ok((updated, count))
}

/// Удалить группу. Группа с прокси не удаляется: сначала нужно их перенести.
pub async fn delete_group(
    db: &DatabaseConnection,
    actor: &str,
    group_id: i32,
) -> Result<(), AppError> {
    let txn = db.begin().await?;
    let record = find_group(&txn, group_id).await?;

    let count = count_proxies(&txn, group_id).await?;
    if count > 0 {
        return Err(AppError::Conflict(format!(
            "В группе {group_id} есть прокси ({count}). Перенесите их в другую группу"
        )));
    }

    GroupEntity::delete_by_id(group_id).exec(&txn).await?;
    audit_service::record(
        &txn,
        AuditEntry::new(actor, "delete", "group", group_id).before(&GroupView::new(&record, 0))?,
    )
    .await?;
    txn.commit().await?;

    Ok(())
}

async fn find_group<C: ConnectionTrait>(conn: &C, group_id: i32) -> Result<Model, AppError> {
    GroupEntity::find_by_id(group_id)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Группа не найдена: {group_id}")))
}

async fn count_proxies<C: ConnectionTrait>(conn: &C, group_id: i32) -> Result<u64, AppError> {
    let count = ProxyEntity::find()
        .filter(proxies::Column::GroupId.eq(group_id))
        .count(conn)
        .await?;
    Ok(count)
}

async fn ensure_name_free<C: ConnectionTrait>(
    conn: &C,
    name: &str,
    except: Option<i32>,
) -> Result<(), AppError> {
    let existing = GroupEntity::find()
        .filter(Column::Name.eq(name))
        .one(conn)
        .await?;
    match existing {
        Some(g) if Some(g.id) != except => Err(AppError::Conflict(format!(
            "Группа с именем {name} уже существует"
        ))),
        _ => Ok(()),
    }
}
