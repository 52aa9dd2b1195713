//! `PgSessionStore` against a migrated database.
//!
//! Run with `QUEUEHUB_DATABASE_URL` set and `-- --ignored`.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashMap;

use serde_json::json;
use time::{Duration, OffsetDateTime};
use tower_sessions::SessionStore;
use tower_sessions::session::{Id, Record};
use uuid::Uuid;

use queuehub_integration_tests::live_pool;
use queuehub_server::db::PgSessionStore;
use queuehub_server::models::{User, session_keys};
use queuehub_server::services::AuthService;

fn record(expires_in: Duration) -> Record {
    Record {
        id: Id::default(),
        data: HashMap::new(),
        expiry_date: OffsetDateTime::now_utc() + expires_in,
    }
}

fn signed_in(user: &User, expires_in: Duration) -> Record {
    let mut record = record(expires_in);
    record.data.insert(
        session_keys::CURRENT_USER.to_owned(),
        json!({ "id": user.id, "email": user.email, "name": user.name, "role": "admin" }),
    );
    record
}

async fn fresh_user(pool: &sqlx::PgPool) -> User {
    let unique = Uuid::new_v4().simple().to_string();
    AuthService::new(pool)
        .create_admin(
            &format!("ops-{unique}@example.com"),
            "Session Test",
            "correct-horse-42",
        )
        .await
        .unwrap()
}

#[tokio::test]
#[ignore = "needs a migrated database"]
async fn test_expired_session_is_not_loaded() {
    let store = PgSessionStore::new(live_pool().await);
    let expired = record(Duration::minutes(-5));
    store.set(&expired).await.unwrap();

    assert!(store.get(&expired.id).await.unwrap().is_none());
    assert!(store.load(&expired.id).await.unwrap().is_none());

    let live = record(Duration::hours(1));
    store.set(&live).await.unwrap();
    assert_eq!(store.get(&live.id).await.unwrap().unwrap().id, live.id);
}

#[tokio::test]
#[ignore = "needs a migrated database"]
async fn test_touch_only_extends_live_sessions() {
    let store = PgSessionStore::new(live_pool().await);
    let later = OffsetDateTime::now_utc() + Duration::days(1);

    let expired = record(Duration::minutes(-5));
    store.set(&expired).await.unwrap();
    assert!(!store.touch(&expired.id, later).await.unwrap());
    assert!(store.get(&expired.id).await.unwrap().is_none());

    assert!(!store.touch(&Id::default(), later).await.unwrap());

    let live = record(Duration::minutes(5));
    store.set(&live).await.unwrap();
    assert!(store.touch(&live.id, later).await.unwrap());
    let loaded = store.get(&live.id).await.unwrap().unwrap();
    assert!(loaded.expiry_date > live.expiry_date + Duration::hours(1));
}

#[tokio::test]
#[ignore = "needs a migrated database"]
async fn test_destroy_for_user_leaves_other_users_alone() {
    let pool = live_pool().await;
    let store = PgSessionStore::new(pool.clone());
    let alice = fresh_user(&pool).await;
    let bob = fresh_user(&pool).await;

    let first = signed_in(&alice, Duration::hours(1));
    let second = signed_in(&alice, Duration::hours(1));
    let other = signed_in(&bob, Duration::hours(1));
    for r in [&first, &second, &other] {
        store.set(r).await.unwrap();
    }

    assert_eq!(store.destroy_for_user(alice.id).await.unwrap(), 2);
    assert!(store.get(&first.id).await.unwrap().is_none());
    assert!(store.get(&second.id).await.unwrap().is_none());
    assert!(store.get(&other.id).await.unwrap().is_some());
}

#[tokio::test]
#[ignore = "needs a migrated database"]
async fn test_destroy_other_sessions_keeps_current() {
    let pool = live_pool().await;
    let store = PgSessionStore::new(pool.clone());
    let user = fresh_user(&pool).await;

    let current = signed_in(&user, Duration::hours(1));
    let stale = signed_in(&user, Duration::hours(1));
    store.set(&current).await.unwrap();
    store.set(&stale).await.unwrap();

    assert_eq!(store.destroy_other_sessions(user.id, &current.id).await.unwrap(), 1);
    assert!(store.get(&current.id).await.unwrap().is_some());
    assert!(store.get(&stale.id).await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "needs a migrated database"]
async fn test_create_picks_new_id_on_collision() {
    let store = PgSessionStore::new(live_pool().await);
    let mut existing = record(Duration::hours(1));
    existing
        .data
        .insert("marker".to_owned(), json!("existing"));
    store.set(&existing).await.unwrap();

    let mut incoming = record(Duration::hours(1));
    incoming.id = existing.id;
    incoming.data.insert("marker".to_owned(), json!("incoming"));
    store.create(&mut incoming).await.unwrap();

    assert_ne!(incoming.id, existing.id);
    let kept = store.get(&existing.id).await.unwrap().unwrap();
    assert_eq!(kept.data["marker"], "existing");
    let created = store.get(&incoming.id).await.unwrap().unwrap();
    assert_eq!(created.data["marker"], "incoming");
}
