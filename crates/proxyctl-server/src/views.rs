//! Представления сущностей для ответов API и снимков аудита.
//!
//! Секреты попадают только в [`AgentProxy`]; административные
//! представления их не содержат.

use chrono::{DateTime, Utc};
use proxyctl_entities::{audit_logs, mappings, proxies, proxy_groups, servers};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct ServerView {
    pub id: i32,
    pub name: String,
    pub tags: Vec<String>,
    pub wan_iface: String,
    pub lan_iface: String,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub status: &'static str,
    pub config_version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&servers::Model> for ServerView {
    fn from(m: &servers::Model) -> Self {
        Self {
            id: m.id,
            name: m.name.clone(),
            tags: m.tag_list(),
            wan_iface: m.wan_iface.clone(),
            lan_iface: m.lan_iface.clone(),
            last_seen_at: m.last_seen_at,
            status: m.status.as_str(),
            config_version: m.config_version,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProxyView {
    pub id: i32,
    pub server_id: Option<i32>,
    pub group_id: Option<i32>,
    pub label: String,
    #[serde(rename = "type")]
    pub proxy_type: &'static str,
    pub host: String,
    pub port: i32,
    pub username: String,
    pub has_password: bool,
    pub health: &'static str,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&proxies::Model> for ProxyView {
    fn from(m: &proxies::Model) -> Self {
        Self {
            id: m.id,
            server_id: m.server_id,
            group_id: m.group_id,
            label: m.label.clone(),
            proxy_type: m.proxy_type.as_str(),
            host: m.host.clone(),
            port: m.port,
            username: m.username.clone(),
            has_password: !m.password.is_empty(),
            health: m.health.as_str(),
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MappingView {
    pub id: i32,
    pub server_id: i32,
    pub client_cidr: String,
    pub dst_ports: Vec<u16>,
    pub upstream_proxy_id: i32,
    pub enabled: bool,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_proxy: Option<ProxyView>,
}

impl MappingView {
    pub fn new(m: &mappings::Model, upstream: Option<&proxies::Model>) -> Self {
        Self {
            id: m.id,
            server_id: m.server_id,
            client_cidr: m.client_cidr.clone(),
            dst_ports: m.port_list(),
            upstream_proxy_id: m.upstream_proxy_id,
            enabled: m.enabled,
            notes: m.notes.clone(),
            created_at: m.created_at,
            updated_at: m.updated_at,
            upstream_proxy: upstream.map(ProxyView::from),
        }
    }
}

impl From<&mappings::Model> for MappingView {
    fn from(m: &mappings::Model) -> Self {
        MappingView::new(m, None)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupView {
    pub id: i32,
    pub name: String,
    pub description: String,
    pub proxy_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GroupView {
    pub fn new(m: &proxy_groups::Model, proxy_count: u64) -> Self {
        Self {
            id: m.id,
            name: m.name.clone(),
            description: m.description.clone(),
            proxy_count,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditView {
    pub id: i32,
    pub actor: String,
    pub action: String,
    pub resource: String,
    pub before: Option<serde_json::Value>,
    pub after: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl From<audit_logs::Model> for AuditView {
    fn from(m: audit_logs::Model) -> Self {
        Self {
            id: m.id,
            actor: m.actor,
            action: m.action,
            resource: m.resource,
            before: m.before,
            after: m.after,
            created_at: m.created_at,
        }
    }
}

// ── Payload агента ───────────────────────────────────────────────────────────

/// Прокси в конфигурации агента. Содержит пароль: агенту он нужен для
/// подключения к upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentProxy {
    pub id: i32,
    pub group_id: Option<i32>,
    pub label: String,
    #[serde(rename = "type")]
    pub proxy_type: String,
    pub host: String,
    pub port: i32,
    pub username: String,
    pub password: String,
    pub health: String,
}

impl From<&proxies::Model> for AgentProxy {
    fn from(m: &proxies::Model) -> Self {
        Self {
            id: m.id,
            group_id: m.group_id,
            label: m.label.clone(),
            proxy_type: m.proxy_type.as_str().to_string(),
            host: m.host.clone(),
            port: m.port,
            username: m.username.clone(),
            password: m.password.clone(),
            health: m.health.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentMapping {
    pub id: i32,
    pub client_cidr: String,
    pub dst_ports: Vec<u16>,
    pub upstream_proxy_id: i32,
    pub enabled: bool,
    pub notes: String,
    pub upstream_proxy: AgentProxy,
}

impl AgentMapping {
    pub fn new(m: &mappings::Model, upstream: &proxies::Model) -> Self {
        Self {
            id: m.id,
            client_cidr: m.client_cidr.clone(),
            dst_ports: m.port_list(),
            upstream_proxy_id: m.upstream_proxy_id,
            enabled: m.enabled,
            notes: m.notes.clone(),
            upstream_proxy: AgentProxy::from(upstream),
        }
    }
}

/// Полный снимок конфигурации сервера для агента.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullPayload {
    pub version: i64,
    pub proxies: Vec<AgentProxy>,
    pub mappings: Vec<AgentMapping>,
}
