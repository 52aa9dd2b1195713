//! End-to-end flows against a running server.
//!
//! Requires `QUEUEHUB_TEST_URL` pointing at a server with a migrated
//! database. Run with `cargo test -p queuehub-integration-tests -- --ignored`.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use futures::{SinkExt, StreamExt, future::join_all};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message as WsMessage};
use uuid::Uuid;

use queuehub_integration_tests::live_pool;
use queuehub_server::services::AuthService;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const PASSWORD: &str = "correct-horse-42";

fn base_url() -> String {
    std::env::var("QUEUEHUB_TEST_URL").unwrap_or_else(|_| "http://localhost:3000".to_owned())
}

/// A cookie-keeping client with its own `X-Forwarded-For` address, so
/// parallel tests don't share a rate-limit bucket.
fn client() -> Client {
    let bytes = Uuid::new_v4().into_bytes();
    let ip = format!("10.{}.{}.{}", bytes[0], bytes[1], bytes[2]);
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert("x-forwarded-for", ip.parse().unwrap());
    Client::builder()
        .cookie_store(true)
        .default_headers(headers)
        .build()
        .unwrap()
}

/// Sign up a fresh merchant and return a client holding its session.
async fn signup(plan: &str) -> (Client, Value) {
    let client = client();
    let unique = Uuid::new_v4().simple().to_string();
    let response = client
        .post(format!("{}/api/auth/signup", base_url()))
        .json(&json!({
            "account": {
                "email": format!("owner-{unique}@example.com"),
                "password": PASSWORD,
                "name": "Test Owner",
            },
            "business": {
                "name": format!("Test Shop {}", &unique[..8]),
                "plan": plan,
            },
            "branch": { "name": "Main" },
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    (client, response.json().await.unwrap())
}

async fn login(email: &str, password: &str) -> (Client, StatusCode) {
    let client = client();
    let status = client
        .post(format!("{}/api/auth/login", base_url()))
        .json(&json!({ "email": email, "password": password }))
        .send()
        .await
        .unwrap()
        .status();
    (client, status)
}

async fn me_status(client: &Client) -> StatusCode {
    client
        .get(format!("{}/api/auth/me", base_url()))
        .send()
        .await
        .unwrap()
        .status()
}

async fn walk_in(client: &Client, queue_id: i64, name: &str) -> Value {
    let response = client
        .post(format!("{}/api/merchant/queues/{queue_id}/tickets", base_url()))
        .json(&json!({ "customer_name": name }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    response.json().await.unwrap()
}

async fn set_ticket_status(client: &Client, ticket_id: &Value, status: &str) -> reqwest::Response {
    client
        .post(format!("{}/api/merchant/tickets/{ticket_id}/status", base_url()))
        .json(&json!({ "status": status }))
        .send()
        .await
        .unwrap()
}

async fn call_next(client: &Client, queue_id: i64) -> Value {
    client
        .post(format!("{}/api/merchant/queues/{queue_id}/call-next", base_url()))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

/// Open a relay socket and join `room`.
async fn subscribe(room: &str) -> Socket {
    let url = format!("{}/ws", base_url().replacen("http", "ws", 1));
    let (mut socket, _) = connect_async(url).await.unwrap();
    socket
        .send(WsMessage::text(json!({ "type": "join", "room": room }).to_string()))
        .await
        .unwrap();
    let joined = next_frame(&mut socket).await.expect("join acknowledged");
    assert_eq!(joined["type"], "joined");
    assert_eq!(joined["room"], room);
    socket
}

/// The next JSON frame, or `None` if nothing arrives within two seconds.
async fn next_frame(socket: &mut Socket) -> Option<Value> {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(2), socket.next())
            .await
            .ok()??
            .unwrap();
        if let WsMessage::Text(text) = frame {
            return Some(serde_json::from_str(text.as_str()).unwrap());
        }
    }
}

async fn create_queue(client: &Client, branch_id: &Value, name: &str) -> reqwest::Response {
    client
        .post(format!("{}/api/merchant/queues", base_url()))
        .json(&json!({ "branch_id": branch_id, "name": name, "avg_service_minutes": 3 }))
        .send()
        .await
        .unwrap()
}

#[tokio::test]
#[ignore = "needs a running server and database"]
async fn test_customer_joins_and_gets_called() {
    let (owner, account) = signup("pro").await;
    let branch_id = &account["branch"]["id"];

    let queue: Value = create_queue(&owner, branch_id, "Counter")
        .await
        .json()
        .await
        .unwrap();
    let queue_id = queue["id"].as_i64().unwrap();

    // Customer joins anonymously.
    let customer = client();
    let ticket: Value = customer
        .post(format!("{}/api/public/queues/{queue_id}/join", base_url()))
        .json(&json!({ "customer_name": "Rosa" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(ticket["number"], 1);
    assert_eq!(ticket["status"], "waiting");
    assert_eq!(ticket["position"], 0);
    let token = ticket["token"].as_str().unwrap().to_owned();

    // Merchant calls the next ticket.
    let called: Value = owner
        .post(format!("{}/api/merchant/queues/{queue_id}/call-next", base_url()))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(called["ticket"]["number"], 1);
    assert_eq!(called["ticket"]["status"], "called");

    let status: Value = customer
        .get(format!("{}/api/public/tickets/{token}", base_url()))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["status"], "called");

    // Nobody else is waiting.
    let empty: Value = owner
        .post(format!("{}/api/merchant/queues/{queue_id}/call-next", base_url()))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(empty["ticket"].is_null());
}

#[tokio::test]
#[ignore = "needs a running server and database"]
async fn test_paused_queue_rejects_customers() {
    let (owner, account) = signup("free").await;
    let queue: Value = create_queue(&owner, &account["branch"]["id"], "Desk")
        .await
        .json()
        .await
        .unwrap();
    let queue_id = queue["id"].as_i64().unwrap();

    let response = owner
        .post(format!("{}/api/merchant/queues/{queue_id}/status", base_url()))
        .json(&json!({ "status": "paused" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = client()
        .post(format!("{}/api/public/queues/{queue_id}/join", base_url()))
        .json(&json!({ "customer_name": "Late" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore = "needs a running server and database"]
async fn test_free_plan_queue_limit() {
    let (owner, account) = signup("free").await;
    let branch_id = &account["branch"]["id"];

    for name in ["One", "Two"] {
        assert_eq!(
            create_queue(&owner, branch_id, name).await.status(),
            StatusCode::CREATED
        );
    }
    assert_eq!(
        create_queue(&owner, branch_id, "Three").await.status(),
        StatusCode::FORBIDDEN
    );
}

#[tokio::test]
#[ignore = "needs a running server and database"]
async fn test_tenants_cannot_see_each_other() {
    let (first, account) = signup("pro").await;
    let queue: Value = create_queue(&first, &account["branch"]["id"], "Private")
        .await
        .json()
        .await
        .unwrap();
    let queue_id = queue["id"].as_i64().unwrap();

    let (second, _) = signup("pro").await;
    let response = second
        .get(format!("{}/api/merchant/queues/{queue_id}", base_url()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "needs a running server and database"]
async fn test_logout_ends_session() {
    let (owner, _) = signup("free").await;
    let me = owner
        .get(format!("{}/api/auth/me", base_url()))
        .send()
        .await
        .unwrap();
    assert_eq!(me.status(), StatusCode::OK);

    let logout = owner
        .post(format!("{}/api/auth/logout", base_url()))
        .send()
        .await
        .unwrap();
    assert_eq!(logout.status(), StatusCode::NO_CONTENT);

    let me = owner
        .get(format!("{}/api/auth/me", base_url()))
        .send()
        .await
        .unwrap();
    assert_eq!(me.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "needs a running server and database"]
async fn test_call_next_on_empty_queue_returns_null() {
    let (owner, account) = signup("free").await;
    let queue: Value = create_queue(&owner, &account["branch"]["id"], "Quiet")
        .await
        .json()
        .await
        .unwrap();

    let response = call_next(&owner, queue["id"].as_i64().unwrap()).await;
    assert_eq!(response, json!({ "ticket": null }));
}

#[tokio::test]
#[ignore = "needs a running server and database"]
async fn test_requeue_then_no_show() {
    let (owner, account) = signup("pro").await;
    let queue: Value = create_queue(&owner, &account["branch"]["id"], "Counter")
        .await
        .json()
        .await
        .unwrap();
    let queue_id = queue["id"].as_i64().unwrap();
    let ticket = walk_in(&owner, queue_id, "Ines").await;

    let called = call_next(&owner, queue_id).await;
    assert_eq!(called["ticket"]["id"], ticket["id"]);

    // Requeue: the customer stepped away.
    let response = set_ticket_status(&owner, &ticket["id"], "waiting").await;
    assert_eq!(response.status(), StatusCode::OK);
    let requeued: Value = response.json().await.unwrap();
    assert_eq!(requeued["status"], "waiting");

    let called = call_next(&owner, queue_id).await;
    assert_eq!(called["ticket"]["id"], ticket["id"]);

    let response = set_ticket_status(&owner, &ticket["id"], "no_show").await;
    assert_eq!(response.status(), StatusCode::OK);
    let gone: Value = response.json().await.unwrap();
    assert_eq!(gone["status"], "no_show");
    assert!(!gone["finished_at"].is_null());
}

#[tokio::test]
#[ignore = "needs a running server and database"]
async fn test_invalid_transition_conflicts() {
    let (owner, account) = signup("pro").await;
    let queue: Value = create_queue(&owner, &account["branch"]["id"], "Counter")
        .await
        .json()
        .await
        .unwrap();
    let ticket = walk_in(&owner, queue["id"].as_i64().unwrap(), "Omar").await;

    // Waiting tickets must be called before they can be completed.
    let response = set_ticket_status(&owner, &ticket["id"], "completed").await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = set_ticket_status(&owner, &ticket["id"], "cancelled").await;
    assert_eq!(response.status(), StatusCode::OK);

    // Terminal tickets stay put.
    let response = set_ticket_status(&owner, &ticket["id"], "waiting").await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore = "needs a running server and database"]
async fn test_password_change_signs_out_other_sessions() {
    let (owner, account) = signup("free").await;
    let email = account["user"]["email"].as_str().unwrap().to_owned();
    let (laptop, status) = login(&email, PASSWORD).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me_status(&laptop).await, StatusCode::OK);

    let response = owner
        .post(format!("{}/api/auth/password", base_url()))
        .json(&json!({ "current_password": PASSWORD, "new_password": "battery-staple-77" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    assert_eq!(me_status(&owner).await, StatusCode::OK);
    assert_eq!(me_status(&laptop).await, StatusCode::UNAUTHORIZED);
    assert_eq!(login(&email, PASSWORD).await.1, StatusCode::UNAUTHORIZED);
    assert_eq!(login(&email, "battery-staple-77").await.1, StatusCode::OK);
}

#[tokio::test]
#[ignore = "needs a running server and database"]
async fn test_suspension_signs_out_and_blocks_login() {
    let (owner, account) = signup("free").await;
    let email = account["user"]["email"].as_str().unwrap().to_owned();
    let merchant_id = &account["merchant"]["id"];

    let admin_email = format!("admin-{}@example.com", Uuid::new_v4().simple());
    AuthService::new(&live_pool().await)
        .create_admin(&admin_email, "Ops", PASSWORD)
        .await
        .unwrap();
    let (admin, status) = login(&admin_email, PASSWORD).await;
    assert_eq!(status, StatusCode::OK);

    let response = admin
        .post(format!("{}/api/admin/merchants/{merchant_id}/status", base_url()))
        .json(&json!({ "status": "suspended" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(me_status(&owner).await, StatusCode::UNAUTHORIZED);
    assert_eq!(login(&email, PASSWORD).await.1, StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore = "needs a running server and database"]
async fn test_concurrent_queue_creates_respect_plan_limit() {
    let (owner, account) = signup("free").await;
    let branch_id = &account["branch"]["id"];

    let names: Vec<String> = (0..6).map(|i| format!("Rush {i}")).collect();
    let responses = join_all(names.iter().map(|name| create_queue(&owner, branch_id, name))).await;

    let created = responses
        .iter()
        .filter(|r| r.status() == StatusCode::CREATED)
        .count();
    let refused = responses
        .iter()
        .filter(|r| r.status() == StatusCode::FORBIDDEN)
        .count();
    assert_eq!(created, 2);
    assert_eq!(refused, 4);
}

#[tokio::test]
#[ignore = "needs a running server and database"]
async fn test_analytics_totals_match_daily_series() {
    let (owner, account) = signup("pro").await;
    let queue: Value = create_queue(&owner, &account["branch"]["id"], "Counter")
        .await
        .json()
        .await
        .unwrap();
    let queue_id = queue["id"].as_i64().unwrap();
    for name in ["Ana", "Ben", "Cleo"] {
        walk_in(&owner, queue_id, name).await;
    }

    let analytics: Value = owner
        .get(format!("{}/api/merchant/analytics?days=7", base_url()))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let daily = analytics["daily"].as_array().unwrap();
    assert_eq!(daily.len(), 7);
    let from_series: i64 = daily.iter().map(|d| d["issued"].as_i64().unwrap()).sum();
    assert_eq!(analytics["totals"]["issued"], 3);
    assert_eq!(from_series, 3);
}

#[tokio::test]
#[ignore = "needs a running server and database"]
async fn test_queue_room_receives_new_tickets() {
    let (owner, account) = signup("pro").await;
    let queue: Value = create_queue(&owner, &account["branch"]["id"], "Counter")
        .await
        .json()
        .await
        .unwrap();
    let queue_id = queue["id"].as_i64().unwrap();

    let mut socket = subscribe(&format!("queue:{queue_id}")).await;

    let response = client()
        .post(format!("{}/api/public/queues/{queue_id}/join", base_url()))
        .json(&json!({ "customer_name": "Rosa" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let event = next_frame(&mut socket).await.expect("ticket_created relayed");
    assert_eq!(event["type"], "ticket_created");
    assert_eq!(event["queue_id"], queue_id);
    assert_eq!(event["ticket"]["number"], 1);
    assert_eq!(event["waiting_count"], 1);
}

#[tokio::test]
#[ignore = "needs a running server and database"]
async fn test_ticket_message_reaches_only_that_ticket() {
    let (owner, account) = signup("pro").await;
    let queue: Value = create_queue(&owner, &account["branch"]["id"], "Counter")
        .await
        .json()
        .await
        .unwrap();
    let queue_id = queue["id"].as_i64().unwrap();
    let ticket = walk_in(&owner, queue_id, "Yusuf").await;
    let token = ticket["public_token"].as_str().unwrap();

    let mut queue_socket = subscribe(&format!("queue:{queue_id}")).await;
    let mut ticket_socket = subscribe(&format!("ticket:{token}")).await;

    let response = owner
        .post(format!("{}/api/merchant/queues/{queue_id}/messages", base_url()))
        .json(&json!({ "ticket_id": ticket["id"], "body": "Please come to desk 3" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let event = next_frame(&mut ticket_socket).await.expect("message relayed");
    assert_eq!(event["type"], "message");
    assert_eq!(event["ticket_number"], ticket["number"]);
    assert_eq!(event["body"], "Please come to desk 3");

    assert!(next_frame(&mut queue_socket).await.is_none());
}
