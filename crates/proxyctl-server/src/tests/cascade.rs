//! Каскадное удаление сервера и откат при сбое на каждом шаге.

use super::*;
use crate::error::AppError;
use crate::services::audit_service;
use proxyctl_entities::mappings::Entity as MappingEntity;
use proxyctl_entities::proxies::Entity as ProxyEntity;
use proxyctl_entities::servers::Entity as ServerEntity;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter};

struct Fixture {
    target: servers::Model,
    other: servers::Model,
    target_proxies: Vec<i32>,
}

/// Два сервера, у целевого два прокси и два маппинга, у второго по одному.
async fn fixture(db: &DatabaseConnection) -> Fixture {
    let target = make_server(db, "target").await;
    let other = make_server(db, "other").await;

    let a = make_proxy(db, Some(target.id), "a").await;
    let b = make_proxy(db, Some(target.id), "b").await;
    make_mapping(db, target.id, a.id).await;
    make_mapping(db, target.id, b.id).await;

    let c = make_proxy(db, Some(other.id), "c").await;
    make_mapping(db, other.id, c.id).await;

    Fixture {
        target: server_service::get_server(db, target.id).await.unwrap(),
        other,
        target_proxies: vec![a.id, b.id],
    }
}

async fn mapping_count(db: &DatabaseConnection, server_id: i32) -> u64 {
    MappingEntity::find()
        .filter(mappings::Column::ServerId.eq(server_id))
        .count(db)
        .await
        .unwrap()
}

#[tokio::test]
async fn delete_server_cascades_and_detaches() {
    let db = test_db().await;
    let f = fixture(&db).await;

    let report = server_service::delete_server(&db, ADMIN, f.target.id)
        .await
        .unwrap();
    assert_eq!(report.mappings_deleted, 2);
    assert_eq!(report.proxies_detached, 2);

    assert!(ServerEntity::find_by_id(f.target.id)
        .one(&db)
        .await
        .unwrap()
        .is_none());
    assert_eq!(mapping_count(&db, f.target.id).await, 0);
    for id in &f.target_proxies {
        let p = ProxyEntity::find_by_id(*id).one(&db).await.unwrap().unwrap();
        assert_eq!(p.server_id, None, "прокси {id} должен быть отвязан");
    }

    // Чужие строки не тронуты
    assert_eq!(mapping_count(&db, f.other.id).await, 1);
    assert_eq!(version(&db, f.other.id).await, 2);

    let last = &audit_service::recent(&db, 1).await.unwrap()[0];
    assert_eq!(last.action, "delete");
    assert_eq!(last.resource, format!("server:{}", f.target.id));

    let err = server_service::delete_server(&db, ADMIN, f.target.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

/// Триггер, обрывающий соответствующий шаг каскада.
async fn inject_failure(db: &DatabaseConnection, trigger: &str) {
    db.execute_unprepared(trigger).await.unwrap();
}

async fn assert_rolled_back(db: &DatabaseConnection, f: &Fixture) {
    let server = ServerEntity::find_by_id(f.target.id)
        .one(db)
        .await
        .unwrap()
        .expect("сервер должен остаться");
    assert_eq!(server, f.target);
    assert_eq!(mapping_count(db, f.target.id).await, 2);
    for id in &f.target_proxies {
        let p = ProxyEntity::find_by_id(*id).one(db).await.unwrap().unwrap();
        assert_eq!(p.server_id, Some(f.target.id));
    }
    let last = &audit_service::recent(db, 1).await.unwrap()[0];
    assert_ne!(last.action, "delete");
}

#[tokio::test]
async fn failure_while_deleting_mappings_rolls_back() {
    let db = test_db().await;
    let f = fixture(&db).await;
    inject_failure(
        &db,
        "CREATE TRIGGER fail_mappings BEFORE DELETE ON mappings \
         BEGIN SELECT RAISE(ABORT, 'injected'); END;",
    )
    .await;

    let err = server_service::delete_server(&db, ADMIN, f.target.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Internal(_)));
    assert_rolled_back(&db, &f).await;
}

#[tokio::test]
async fn failure_while_detaching_proxies_rolls_back() {
    let db = test_db().await;
    let f = fixture(&db).await;
    inject_failure(
        &db,
        "CREATE TRIGGER fail_detach BEFORE UPDATE OF server_id ON proxies \
         BEGIN SELECT RAISE(ABORT, 'injected'); END;",
    )
    .await;

    let err = server_service::delete_server(&db, ADMIN, f.target.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Internal(_)));
    assert_rolled_back(&db, &f).await;
}

#[tokio::test]
async fn failure_while_deleting_server_row_rolls_back() {
    let db = test_db().await;
    let f = fixture(&db).await;
    inject_failure(
        &db,
        "CREATE TRIGGER fail_server BEFORE DELETE ON servers \
         BEGIN SELECT RAISE(ABORT, 'injected'); END;",
    )
    .await;

    let err = server_service::delete_server(&db, ADMIN, f.target.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Internal(_)));
    assert_rolled_back(&db, &f).await;
}
