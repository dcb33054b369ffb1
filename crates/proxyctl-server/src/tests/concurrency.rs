//! Параллельные мутации и pull на базе с несколькими соединениями.

use super::*;
use crate::services::sync_service::{self, PullOutcome};
use chrono::Utc;
use proxyctl_entities::proxies::{self as proxy, Entity as ProxyEntity};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use tokio::task::JoinSet;

async fn proxies_of(db: &DatabaseConnection, server_id: i32) -> i64 {
    let count = ProxyEntity::find()
        .filter(proxy::Column::ServerId.eq(server_id))
        .count(db)
        .await
        .unwrap();
    count as i64
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_increments_are_not_lost() {
    let (_dir, db) = file_db().await;
    let s = make_server(&db, "s").await;
    const BUMPS: i64 = 32;

    let mut tasks = JoinSet::new();
    for _ in 0..BUMPS {
        let db = db.clone();
        let server_id = s.id;
        tasks.spawn(async move {
            tokio::task::yield_now().await;
            version_service::increment(&db, server_id).await
        });
    }
    while let Some(res) = tasks.join_next().await {
        res.unwrap().unwrap();
    }

    assert_eq!(version(&db, s.id).await, BUMPS);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_mutations_match_committed_rows() {
    let (_dir, db) = file_db().await;
    let s = make_server(&db, "s").await;
    const WRITERS: usize = 16;

    let mut tasks = JoinSet::new();
    for i in 0..WRITERS {
        let db = db.clone();
        let server_id = s.id;
        tasks.spawn(async move {
            proxy_service::create_proxy(&db, ADMIN, new_proxy(Some(server_id), &format!("p{i}")))
                .await
                .is_ok()
        });
    }

    let mut committed = 0;
    while let Some(res) = tasks.join_next().await {
        if res.unwrap() {
            committed += 1;
        }
    }

    // Откаченная из-за блокировки транзакция не оставляет ни строки, ни инкремента
    assert!(committed > 0);
    assert_eq!(proxies_of(&db, s.id).await, committed);
    assert_eq!(version(&db, s.id).await, committed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn pull_never_sees_version_without_its_rows() {
    let (_dir, db) = file_db().await;
    let s = make_server(&db, "s").await;
    const WRITERS: usize = 12;
    const READERS: usize = 12;

    let mut writers = JoinSet::new();
    for i in 0..WRITERS {
        let db = db.clone();
        let server_id = s.id;
        writers.spawn(async move {
            let _ = proxy_service::create_proxy(
                &db,
                ADMIN,
                new_proxy(Some(server_id), &format!("w{i}")),
            )
            .await;
        });
    }

    let mut readers = JoinSet::new();
    for _ in 0..READERS {
        let db = db.clone();
        let server_id = s.id;
        let token = s.agent_token.clone();
        readers.spawn(async move {
            match sync_service::pull(&db, server_id, &token, 0, Utc::now()).await {
                Ok(PullOutcome::Snapshot(payload)) => Some(payload),
                _ => None,
            }
        });
    }

    while let Some(res) = writers.join_next().await {
        res.unwrap();
    }
    while let Some(res) = readers.join_next().await {
        // Каждое создание прокси даёт ровно +1: версия равна числу строк
        if let Some(payload) = res.unwrap() {
            assert_eq!(payload.version, payload.proxies.len() as i64);
        }
    }

    let last = sync_service::pull(&db, s.id, &s.agent_token, 0, Utc::now())
        .await
        .unwrap();
    match last {
        PullOutcome::Snapshot(payload) => {
            assert_eq!(payload.version, proxies_of(&db, s.id).await);
            assert_eq!(payload.proxies.len() as i64, payload.version);
        }
        PullOutcome::NoChange => assert_eq!(proxies_of(&db, s.id).await, 0),
    }
}
