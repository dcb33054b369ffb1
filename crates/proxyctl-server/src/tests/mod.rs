//! Интеграционные тесты на SQLite в памяти с реальными миграциями.

mod cascade;
mod concurrency;
mod sync;

use crate::services::mapping_service::{self, NewMapping};
use crate::services::proxy_service::{self, NewProxy};
use crate::services::server_service::{self, NewServer};
use crate::services::version_service;
use proxyctl_entities::{mappings, proxies, servers};
use proxyctl_migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};

pub(crate) const ADMIN: &str = "admin";

/// Одно соединение: у каждой `sqlite::memory:` своя база.
pub(crate) async fn test_db() -> DatabaseConnection {
    let mut opts = ConnectOptions::new("sqlite::memory:");
    opts.max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let db = Database::connect(opts).await.unwrap();
    Migrator::up(&db, None).await.unwrap();
    db
}

/// Файловая база с пулом из нескольких соединений: транзакции реально
/// пересекаются. `TempDir` удерживает файл до конца теста.
pub(crate) async fn file_db() -> (tempfile::TempDir, DatabaseConnection) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}?mode=rwc", dir.path().join("proxyctl.db").display());
    let db = crate::connect(&url).await.unwrap();
    (dir, db)
}

pub(crate) async fn make_server(db: &DatabaseConnection, name: &str) -> servers::Model {
    server_service::create_server(
        db,
        ADMIN,
        NewServer {
            name: name.to_string(),
            tags: vec!["edge".to_string(), "msk".to_string()],
            wan_iface: "eth0".to_string(),
            lan_iface: "eth1".to_string(),
        },
    )
    .await
    .unwrap()
}

pub(crate) fn new_proxy(server_id: Option<i32>, label: &str) -> NewProxy {
    NewProxy {
        server_id,
        group_id: None,
        label: label.to_string(),
        proxy_type: "socks5".to_string(),
        host: "198.51.100.10".to_string(),
        port: 1080,
        username: "user".to_string(),
        password: "s3cret".to_string(),
    }
}

pub(crate) async fn make_proxy(
    db: &DatabaseConnection,
    server_id: Option<i32>,
    label: &str,
) -> proxies::Model {
    proxy_service::create_proxy(db, ADMIN, new_proxy(server_id, label))
        .await
        .unwrap()
}

pub(crate) fn new_mapping(server_id: i32, upstream_proxy_id: i32) -> NewMapping {
    NewMapping {
        server_id,
        client_cidr: "10.0.0.0/24".to_string(),
        dst_ports: vec![80, 443],
        upstream_proxy_id,
        enabled: None,
        notes: String::new(),
    }
}

pub(crate) async fn make_mapping(
    db: &DatabaseConnection,
    server_id: i32,
    upstream_proxy_id: i32,
) -> mappings::Model {
    mapping_service::create_mapping(db, ADMIN, new_mapping(server_id, upstream_proxy_id))
        .await
        .unwrap()
}

pub(crate) async fn version(db: &DatabaseConnection, server_id: i32) -> i64 {
    version_service::current_version(db, server_id).await.unwrap()
}
