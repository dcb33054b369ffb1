//! Журнал аудита: запись внутри транзакции мутации и чтение последних записей.

use crate::error::AppError;
use chrono::Utc;
use proxyctl_entities::audit_logs::{ActiveModel, Column, Entity as AuditEntity, Model};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ConnectionTrait, DatabaseConnection, EntityTrait,
    QueryOrder, QuerySelect,
};
use serde::Serialize;

/// Данные одной записи аудита.
pub struct AuditEntry {
    pub actor: String,
    pub action: &'static str,
    pub resource: String,
    pub before: Option<serde_json::Value>,
    pub after: Option<serde_json::Value>,
}

impl AuditEntry {
    pub fn new(actor: &str, action: &'static str, kind: &str, id: i32) -> Self {
        Self {
            actor: actor.to_string(),
            action,
            resource: format!("{kind}:{id}"),
            before: None,
            after: None,
        }
    }

    pub fn before<T: Serialize>(mut self, value: &T) -> Result<Self, AppError> {
        self.before = Some(snapshot(value)?);
        Ok(self)
    }

    pub fn after<T: Serialize>(mut self, value: &T) -> Result<Self, AppError> {
        self.after = Some(snapshot(value)?);
        Ok(self)
    }
}

/// Снимок для before/after. Ошибка сериализации обрывает мутацию,
/// чтобы в журнал не попала запись без снимка.
fn snapshot<T: Serialize>(value: &T) -> Result<serde_json::Value, AppError> {
    serde_json::to_value(value)
        .map_err(|e| AppError::Internal(format!("Ошибка сериализации снимка аудита: {e}")))
}

/// Записать событие аудита на переданном соединении или транзакции.
pub async fn record<C: ConnectionTrait>(conn: &C, entry: AuditEntry) -> Result<(), AppError> {
    let model = ActiveModel {
        actor: Set(entry.actor),
        action: Set(entry.action.to_string()),
        resource: Set(entry.resource),
        before: Set(entry.before),
        after: Set(entry.after),
        created_at: Set(Utc::now()),
        ..Default::default()
    };
    model.insert(conn).await?;
    Ok(())
}

/// Последние записи аудита, новые первыми.
pub async fn recent(db: &DatabaseConnection, limit: u64) -> Result<Vec<Model>, AppError> {
    let rows = AuditEntity::find()
        .order_by_desc(Column::Id)
        .limit(limit)
        .all(db)
        .await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn unserializable_snapshot_is_an_error() {
        // JSON не допускает составных ключей
        let mut bad = BTreeMap::new();
        bad.insert((1, 2), "x");

        let err = AuditEntry::new("admin", "update", "proxy", 1)
            .after(&bad)
            .err()
            .expect("ожидалась ошибка сериализации");
        assert!(matches!(err, AppError::Internal(_)));

        let entry = AuditEntry::new("admin", "update", "proxy", 1)
            .before(&serde_json::json!({ "port": 80 }))
            .unwrap();
        assert_eq!(entry.before, Some(serde_json::json!({ "port": 80 })));
        assert_eq!(entry.resource, "proxy:1");
    }
}
