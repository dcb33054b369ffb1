//! Протокол синхронизации агентов: pull/ack.
//!
//! Агент присылает последнюю известную версию. Если она не меньше текущей,
//! ответ: «нет изменений». Иначе отдаётся полный снимок прокси и маппингов
//! сервера вместе с текущей версией; агент заменяет свою конфигурацию
//! целиком и подтверждает применение через ack.

use crate::error::AppError;
use crate::services::audit_service::{self, AuditEntry};
use crate::services::{liveness_service, version_service};
use crate::views::{AgentMapping, AgentProxy, PullPayload};
use chrono::{DateTime, Utc};
use proxyctl_entities::mappings::{self, Entity as MappingEntity};
use proxyctl_entities::proxies::{self, Entity as ProxyEntity};
use proxyctl_entities::servers::{Entity as ServerEntity, Model as ServerModel};
use sea_orm::{
    AccessMode, ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait,
    IsolationLevel, QueryFilter, QueryOrder, TransactionTrait,
};
use subtle::ConstantTimeEq;

/// Результат pull.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullOutcome {
    NoChange,
    Snapshot(PullPayload),
}

/// Тело ack. Без любого из полей ack отклоняется с `InvalidInput`.
pub struct AckData {
    pub version: Option<i64>,
    pub status: Option<String>,
}

const AUTH_FAILED: &str = "Неверный токен агента";

/// Проверить токен агента для сервера.
///
/// Отсутствующий сервер и неверный токен дают одну и ту же ошибку,
/// чтобы не раскрывать существование сервера.
pub async fn authenticate_agent(
    db: &DatabaseConnection,
    server_id: i32,
    token: &str,
) -> Result<ServerModel, AppError> {
    let Some(server) = ServerEntity::find_by_id(server_id).one(db).await? else {
        tracing::warn!("Агент обратился к несуществующему серверу {server_id}");
        return Err(AppError::Unauthorized(AUTH_FAILED.into()));
    };

    let matches: bool = server
        .agent_token
        .as_bytes()
        .ct_eq(token.as_bytes())
        .into();
    if !matches {
        tracing::warn!("Неверный токен агента для сервера {server_id}");
        return Err(AppError::Unauthorized(AUTH_FAILED.into()));
    }

    Ok(server)
}

/// Pull конфигурации агентом.
pub async fn pull(
    db: &DatabaseConnection,
    server_id: i32,
    token: &str,
    since_version: i64,
    now: DateTime<Utc>,
) -> Result<PullOutcome, AppError> {
    authenticate_agent(db, server_id, token).await?;

    // Единственный сигнал живости: каждый успешный pull
    liveness_service::mark_seen(db, server_id, now).await?;

    // Версия и строки читаются из одного снимка
    let (isolation, access) = snapshot_config(db.get_database_backend());
    let txn = db.begin_with_config(isolation, access).await?;

    let current = version_service::current_version(&txn, server_id).await?;
    if since_version >= current {
        txn.commit().await?;
        tracing::debug!("Pull {server_id}: версия {since_version} актуальна");
        return Ok(PullOutcome::NoChange);
    }

    let payload = load_snapshot(&txn, server_id, current).await?;
    txn.commit().await?;

    tracing::debug!(
        "Pull {server_id}: {since_version} -> {current} (прокси: {}, маппингов: {})",
        payload.proxies.len(),
        payload.mappings.len()
    );
    Ok(PullOutcome::Snapshot(payload))
}

/// Подтверждение применения конфигурации агентом.
pub async fn ack(
    db: &DatabaseConnection,
    server_id: i32,
    token: &str,
    data: AckData,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    authenticate_agent(db, server_id, token).await?;
    record_ack(db, server_id, data, now).await
}

/// Проверить и записать ack уже аутентифицированного агента.
pub async fn record_ack(
    db: &DatabaseConnection,
    server_id: i32,
    data: AckData,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    let version = data
        .version
        .ok_or_else(|| AppError::InvalidInput("version обязателен".into()))?;
    let status = data
        .status
        .ok_or_else(|| AppError::InvalidInput("status обязателен".into()))?;
    if version < 0 {
        return Err(AppError::InvalidInput(format!(
            "Недопустимая версия: {version}"
        )));
    }

    let txn = db.begin().await?;
    liveness_service::mark_seen(&txn, server_id, now).await?;

    let entry = AuditEntry::new(&format!("agent:{server_id}"), "ack", "server", server_id)
        .after(&serde_json::json!({ "version": version, "status": status }))?;
    audit_service::record(&txn, entry).await?;
    txn.commit().await?;

    tracing::debug!("Ack {server_id}: версия {version}, статус {status}");
    Ok(())
}

/// Полный набор прокси и маппингов сервера, упорядоченный по id.
pub async fn load_snapshot<C: ConnectionTrait>(
    conn: &C,
    server_id: i32,
    version: i64,
) -> Result<PullPayload, AppError> {
    let proxies = ProxyEntity::find()
        .filter(proxies::Column::ServerId.eq(server_id))
        .order_by_asc(proxies::Column::Id)
        .all(conn)
        .await?;

    let rows = MappingEntity::find()
        .find_also_related(ProxyEntity)
        .filter(mappings::Column::ServerId.eq(server_id))
        .order_by_asc(mappings::Column::Id)
        .all(conn)
        .await?;

    let mut agent_mappings = Vec::with_capacity(rows.len());
    for (mapping, upstream) in rows {
        let upstream = upstream.ok_or_else(|| {
            AppError::Internal(format!(
                "У маппинга {} нет upstream-прокси {}",
                mapping.id, mapping.upstream_proxy_id
            ))
        })?;
        agent_mappings.push(AgentMapping::new(&mapping, &upstream));
    }

    Ok(PullPayload {
        version,
        proxies: proxies.iter().map(AgentProxy::from).collect(),
        mappings: agent_mappings,
    })
}

/// Параметры транзакции снимка. SQLite не поддерживает уровни изоляции,
/// но его транзакция уже читает согласованный снимок.
fn snapshot_config(backend: DbBackend) -> (Option<IsolationLevel>, Option<AccessMode>) {
    match backend {
        DbBackend::Sqlite => (None, None),
        _ => (
            Some(IsolationLevel::RepeatableRead),
            Some(AccessMode::ReadOnly),
        ),
    }
}
