//! Router tests through the full middleware stack.
//!
//! None of these requests reach the database.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use serde_json::json;
use tower::ServiceExt;

use queuehub_integration_tests::{body_json, body_text, get, post_json, test_app};

// =============================================================================
// Pages
// =============================================================================

#[tokio::test]
async fn test_health() {
    let response = test_app().oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "ok");
}

#[tokio::test]
async fn test_readiness_reports_unreachable_database() {
    let response = test_app().oneshot(get("/health/ready")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_home_page() {
    let response = test_app().oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("QueueHub"));
    assert!(html.contains("Call the next customer"));
}

#[tokio::test]
async fn test_pricing_lists_every_plan() {
    let html = body_text(test_app().oneshot(get("/pricing")).await.unwrap()).await;
    for name in ["Starter", "Pro", "Enterprise"] {
        assert!(html.contains(name), "missing plan {name}");
    }
    assert!(html.contains("/signup?plan=pro"));
}

#[tokio::test]
async fn test_signup_page_carries_plan_to_dashboard() {
    let html = body_text(test_app().oneshot(get("/signup?plan=enterprise")).await.unwrap()).await;
    assert!(html.contains("http://localhost:5173/signup?plan=enterprise"));

    let html = body_text(test_app().oneshot(get("/signup?plan=platinum")).await.unwrap()).await;
    assert!(html.contains("http://localhost:5173/signup\""));
}

#[tokio::test]
async fn test_dashboard_redirects_to_login_without_session() {
    let response = test_app().oneshot(get("/dashboard")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()["location"], "/login");
}

#[tokio::test]
async fn test_login_page_renders_without_session() {
    let response = test_app().oneshot(get("/login")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("http://localhost:5173/login"));
}

#[tokio::test]
async fn test_unknown_path_is_html_404() {
    let response = test_app().oneshot(get("/no-such-page")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(body_text(response).await.contains("Page not found"));
}

// =============================================================================
// Middleware
// =============================================================================

#[tokio::test]
async fn test_security_headers_applied() {
    let response = test_app().oneshot(get("/features")).await.unwrap();
    let headers = response.headers();
    assert_eq!(headers["x-frame-options"], "DENY");
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert!(headers.contains_key("content-security-policy"));
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let mut request = get("/health");
    request
        .headers_mut()
        .insert("x-request-id", "trace-abc-123".parse().unwrap());
    let response = test_app().oneshot(request).await.unwrap();
    assert_eq!(response.headers()["x-request-id"], "trace-abc-123");
}

#[tokio::test]
async fn test_request_id_generated_when_missing() {
    let response = test_app().oneshot(get("/health")).await.unwrap();
    assert!(!response.headers()["x-request-id"].is_empty());
}

// =============================================================================
// API access control
// =============================================================================

#[tokio::test]
async fn test_merchant_api_requires_session() {
    let response = test_app()
        .oneshot(get("/api/merchant/queues"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "authentication required");
}

#[tokio::test]
async fn test_admin_api_requires_session() {
    let response = test_app()
        .oneshot(get("/api/admin/merchants?page=1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_me_without_session() {
    let response = test_app().oneshot(get("/api/auth/me")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_rejects_malformed_body() {
    let response = test_app()
        .oneshot(post_json("/api/auth/login", &json!({ "email": "a@b.co" })))
        .await
        .unwrap();
    assert!(response.status().is_client_error());
}

// =============================================================================
// Public API
// =============================================================================

#[tokio::test]
async fn test_invalid_ticket_token_is_not_found() {
    let response = test_app()
        .oneshot(get("/api/public/tickets/not-a-token"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "Ticket not found");
}

#[tokio::test]
async fn test_invalid_slug_is_not_found() {
    let response = test_app()
        .oneshot(get("/api/public/m/Not_A_Slug"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_join_rejects_blank_name() {
    let response = test_app()
        .oneshot(post_json(
            "/api/public/queues/1/join",
            &json!({ "customer_name": "   " }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
