//! Протокол pull/ack и живость серверов.

use super::*;
use crate::error::AppError;
use crate::services::liveness_service;
use crate::services::sync_service::{self, AckData, PullOutcome};
use crate::views::{AgentMapping, AgentProxy, PullPayload};
use chrono::{Duration, Utc};
use proxyctl_entities::audit_logs::{self, Entity as AuditEntity};
use proxyctl_entities::servers::Entity as ServerEntity;
use proxyctl_entities::ServerStatus;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, QueryFilter};

fn snapshot(outcome: PullOutcome) -> PullPayload {
    match outcome {
        PullOutcome::Snapshot(payload) => payload,
        PullOutcome::NoChange => panic!("ожидался снимок, получено NoChange"),
    }
}

#[tokio::test]
async fn end_to_end_scenario() {
    let db = test_db().await;
    let s1 = make_server(&db, "s1").await;
    assert_eq!(s1.config_version, 0);

    let p1 = make_proxy(&db, Some(s1.id), "p1").await;
    assert_eq!(version(&db, s1.id).await, 1);

    let m1 = make_mapping(&db, s1.id, p1.id).await;
    assert_eq!(version(&db, s1.id).await, 2);

    let now = Utc::now();
    let payload = snapshot(
        sync_service::pull(&db, s1.id, &s1.agent_token, 0, now)
            .await
            .unwrap(),
    );
    assert_eq!(
        payload,
        PullPayload {
            version: 2,
            proxies: vec![AgentProxy::from(&p1)],
            mappings: vec![AgentMapping::new(&m1, &p1)],
        }
    );
    assert_eq!(payload.mappings[0].dst_ports, vec![80, 443]);
    assert_eq!(payload.mappings[0].client_cidr, "10.0.0.0/24");

    let outcome = sync_service::pull(&db, s1.id, &s1.agent_token, 2, now)
        .await
        .unwrap();
    assert_eq!(outcome, PullOutcome::NoChange);

    mapping_service::delete_mapping(&db, ADMIN, m1.id).await.unwrap();
    assert_eq!(version(&db, s1.id).await, 3);

    let payload = snapshot(
        sync_service::pull(&db, s1.id, &s1.agent_token, 2, now)
            .await
            .unwrap(),
    );
    assert_eq!(payload.version, 3);
    assert_eq!(payload.proxies, vec![AgentProxy::from(&p1)]);
    assert!(payload.mappings.is_empty());
}

#[tokio::test]
async fn pull_ahead_of_server_is_no_change() {
    let db = test_db().await;
    let s = make_server(&db, "s").await;
    make_proxy(&db, Some(s.id), "p").await;

    for since in [1, 2, 100] {
        let outcome = sync_service::pull(&db, s.id, &s.agent_token, since, Utc::now())
            .await
            .unwrap();
        assert_eq!(outcome, PullOutcome::NoChange, "since = {since}");
    }
}

#[tokio::test]
async fn repeated_stale_pull_is_byte_identical() {
    let db = test_db().await;
    let s = make_server(&db, "s").await;
    let a = make_proxy(&db, Some(s.id), "a").await;
    let b = make_proxy(&db, Some(s.id), "b").await;
    make_mapping(&db, s.id, b.id).await;
    make_mapping(&db, s.id, a.id).await;

    let first = snapshot(
        sync_service::pull(&db, s.id, &s.agent_token, 0, Utc::now())
            .await
            .unwrap(),
    );
    let second = snapshot(
        sync_service::pull(&db, s.id, &s.agent_token, 0, Utc::now())
            .await
            .unwrap(),
    );

    assert_eq!(
        serde_json::to_vec(&first).unwrap(),
        serde_json::to_vec(&second).unwrap()
    );
    // Порядок по id
    let ids: Vec<i32> = first.proxies.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![a.id, b.id]);
}

#[tokio::test]
async fn snapshot_contains_exactly_the_server_rows() {
    let db = test_db().await;
    let s1 = make_server(&db, "s1").await;
    let s2 = make_server(&db, "s2").await;

    let keep = make_proxy(&db, Some(s1.id), "keep").await;
    let gone = make_proxy(&db, Some(s1.id), "gone").await;
    let other = make_proxy(&db, Some(s2.id), "other").await;
    make_proxy(&db, None, "floating").await;

    let m_keep = make_mapping(&db, s1.id, keep.id).await;
    make_mapping(&db, s2.id, other.id).await;

    proxy_service::delete_proxy(&db, ADMIN, gone.id).await.unwrap();
    let keep = proxy_service::update_proxy(
        &db,
        ADMIN,
        keep.id,
        proxy_service::ProxyChanges {
            port: Some(3128),
            proxy_type: Some("http".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let payload = snapshot(
        sync_service::pull(&db, s1.id, &s1.agent_token, 0, Utc::now())
            .await
            .unwrap(),
    );

    let direct_proxies = proxy_service::list_proxies(&db, Some(s1.id)).await.unwrap();
    let direct_mappings = mapping_service::list_mappings(&db, Some(s1.id)).await.unwrap();

    assert_eq!(
        payload.proxies,
        direct_proxies.iter().map(AgentProxy::from).collect::<Vec<_>>()
    );
    assert_eq!(payload.mappings.len(), direct_mappings.len());
    assert_eq!(payload.proxies, vec![AgentProxy::from(&keep)]);
    assert_eq!(payload.mappings, vec![AgentMapping::new(&m_keep, &keep)]);
    assert_eq!(payload.proxies[0].port, 3128);
    assert_eq!(payload.proxies[0].password, "s3cret");
    assert_eq!(payload.version, version(&db, s1.id).await);
}

#[tokio::test]
async fn wrong_token_is_rejected_without_side_effects() {
    let db = test_db().await;
    let s = make_server(&db, "s").await;

    let err = sync_service::pull(&db, s.id, "not-the-token", 0, Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)));

    // Несуществующий сервер даёт ту же ошибку
    let missing = sync_service::pull(&db, s.id + 100, &s.agent_token, 0, Utc::now())
        .await
        .unwrap_err();
    assert_eq!(missing.to_string(), err.to_string());

    let err = sync_service::ack(
        &db,
        s.id,
        "",
        AckData {
            version: Some(0),
            status: Some("ok".into()),
        },
        Utc::now(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)));

    let stored = server_service::get_server(&db, s.id).await.unwrap();
    assert_eq!(stored.status, ServerStatus::Offline);
    assert_eq!(stored.last_seen_at, None);
}

#[tokio::test]
async fn pull_marks_server_online_even_without_changes() {
    let db = test_db().await;
    let s = make_server(&db, "s").await;
    let now = Utc::now();

    let outcome = sync_service::pull(&db, s.id, &s.agent_token, 0, now)
        .await
        .unwrap();
    assert_eq!(outcome, PullOutcome::NoChange);

    let stored = server_service::get_server(&db, s.id).await.unwrap();
    assert_eq!(stored.status, ServerStatus::Online);
    assert_eq!(
        stored.last_seen_at.map(|t| t.timestamp_millis()),
        Some(now.timestamp_millis())
    );
    // Живость не меняет версию
    assert_eq!(stored.config_version, 0);
}

#[tokio::test]
async fn ack_records_audit_and_liveness() {
    let db = test_db().await;
    let s = make_server(&db, "s").await;
    let now = Utc::now();

    sync_service::ack(
        &db,
        s.id,
        &s.agent_token,
        AckData {
            version: Some(0),
            status: Some("applied".into()),
        },
        now,
    )
    .await
    .unwrap();

    let stored = server_service::get_server(&db, s.id).await.unwrap();
    assert_eq!(stored.status, ServerStatus::Online);
    assert!(stored.last_seen_at.is_some());

    let acks = AuditEntity::find()
        .filter(audit_logs::Column::Action.eq("ack"))
        .all(&db)
        .await
        .unwrap();
    assert_eq!(acks.len(), 1);
    assert_eq!(acks[0].actor, format!("agent:{}", s.id));
    assert_eq!(
        acks[0].after,
        Some(serde_json::json!({ "version": 0, "status": "applied" }))
    );
}

#[tokio::test]
async fn ack_requires_version_and_status() {
    let db = test_db().await;
    let s = make_server(&db, "s").await;

    for data in [
        AckData {
            version: None,
            status: Some("ok".into()),
        },
        AckData {
            version: Some(1),
            status: None,
        },
        AckData {
            version: Some(-1),
            status: Some("ok".into()),
        },
    ] {
        let err = sync_service::ack(&db, s.id, &s.agent_token, data, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    let stored = server_service::get_server(&db, s.id).await.unwrap();
    assert_eq!(stored.status, ServerStatus::Offline);
    let acks = AuditEntity::find()
        .filter(audit_logs::Column::Action.eq("ack"))
        .all(&db)
        .await
        .unwrap();
    assert!(acks.is_empty());
}

#[tokio::test]
async fn summary_judges_activity_at_read_time() {
    let db = test_db().await;
    let now = Utc::now();
    let window = Duration::seconds(300);

    let online = make_server(&db, "online").await;
    let never = make_server(&db, "never").await;
    let recent = make_server(&db, "recent").await;
    let stale = make_server(&db, "stale").await;

    sync_service::pull(&db, online.id, &online.agent_token, 0, now)
        .await
        .unwrap();

    for (server, seen) in [
        (&recent, now - Duration::seconds(10)),
        (&stale, now - Duration::hours(1)),
    ] {
        let mut model: servers::ActiveModel = ServerEntity::find_by_id(server.id)
            .one(&db)
            .await
            .unwrap()
            .unwrap()
            .into();
        model.status = Set(ServerStatus::Offline);
        model.last_seen_at = Set(Some(seen));
        model.update(&db).await.unwrap();
    }

    let summary = liveness_service::summary(&db, now, window).await.unwrap();
    assert_eq!(summary.servers, 4);
    assert_eq!(summary.active_servers, 2);

    let conn = &db;
    let by_id = |id| async move { server_service::get_server(conn, id).await.unwrap() };
    assert!(liveness_service::is_active(&by_id(online.id).await, now, window));
    assert!(!liveness_service::is_active(&by_id(never.id).await, now, window));
    assert!(liveness_service::is_active(&by_id(recent.id).await, now, window));
    assert!(!liveness_service::is_active(&by_id(stale.id).await, now, window));

    // Тот же online-сервер через час всё ещё активен: статус хранится,
    // а не сбрасывается по таймеру
    let later = now + Duration::hours(1);
    assert!(liveness_service::is_active(&by_id(online.id).await, later, window));
}
