//! Platform admin API (`/api/admin`).
//!
//! ```text
//! GET  /merchants?search=&status=&page=&per_page=
//! GET  /merchants/{id}
//! POST /merchants/{id}/status         suspending signs the merchant's users out
//! POST /merchants/{id}/plan
//! GET  /users?role=&page=&per_page=
//! POST /users/{id}/revoke-sessions
//! GET  /activity?merchant_id=&action=&page=&per_page=
//! GET  /analytics
//! GET  /realtime                      relay room statistics
//! ```

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument};

use queuehub_core::{MerchantId, MerchantStatus, PlanTier, UserId, UserRole};

use crate::db::activity::ActivityFilter;
use crate::db::merchants::MerchantFilter;
use crate::db::{ActivityRepository, MerchantRepository, UserRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::activity::actions;
use crate::models::{
    ActivityEntry, Merchant, MerchantDetail, NewActivity, Page, PageQuery, PlatformAnalytics,
    User,
};
use crate::realtime::HubStats;
use crate::routes::api::{non_blank, record_activity};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/merchants", get(list_merchants))
        .route("/merchants/{id}", get(merchant_detail))
        .route("/merchants/{id}/status", post(set_merchant_status))
        .route("/merchants/{id}/plan", post(set_merchant_plan))
        .route("/users", get(list_users))
        .route("/users/{id}/revoke-sessions", post(revoke_sessions))
        .route("/activity", get(list_activity))
        .route("/analytics", get(analytics))
        .route("/realtime", get(realtime_stats))
}

#[derive(Debug, Deserialize)]
pub struct MerchantListQuery {
    pub search: Option<String>,
    pub status: Option<MerchantStatus>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct UserListQuery {
    pub role: Option<UserRole>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct ActivityListQuery {
    pub merchant_id: Option<MerchantId>,
    pub action: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    pub status: MerchantStatus,
}

#[derive(Debug, Deserialize)]
pub struct SetPlanRequest {
    pub plan: PlanTier,
}

#[derive(Debug, Serialize)]
pub struct RevokeSessionsResponse {
    pub revoked: u64,
}

#[instrument(skip_all)]
async fn list_merchants(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<MerchantListQuery>,
) -> Result<Json<Page<Merchant>>> {
    let page = PageQuery {
        page: query.page,
        per_page: query.per_page,
    };
    let filter = MerchantFilter {
        search: non_blank(query.search.as_deref()),
        status: query.status,
    };
    let (items, total) = MerchantRepository::new(state.pool())
        .list(&filter, page)
        .await?;
    Ok(Json(Page::new(items, page, total)))
}

#[instrument(skip_all)]
async fn merchant_detail(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<MerchantId>,
) -> Result<Json<MerchantDetail>> {
    Ok(Json(MerchantRepository::new(state.pool()).detail(id).await?))
}

#[instrument(skip_all, fields(merchant_id = %id))]
async fn set_merchant_status(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<MerchantId>,
    Json(request): Json<SetStatusRequest>,
) -> Result<Json<Merchant>> {
    let merchant = MerchantRepository::new(state.pool())
        .set_status(id, request.status)
        .await?;

    if !merchant.status.allows_login() {
        let revoked = state.sessions().destroy_for_merchant(id).await?;
        info!(revoked, "Signed out users of suspended merchant");
    }

    record_activity(
        &state,
        NewActivity::new(actions::MERCHANT_STATUS_CHANGED, "merchant", id.as_i32())
            .merchant(id)
            .by(admin.id)
            .details(json!({ "status": merchant.status })),
    )
    .await;

    Ok(Json(merchant))
}

#[instrument(skip_all, fields(merchant_id = %id))]
async fn set_merchant_plan(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<MerchantId>,
    Json(request): Json<SetPlanRequest>,
) -> Result<Json<Merchant>> {
    let merchant = MerchantRepository::new(state.pool())
        .set_plan(id, request.plan)
        .await?;

    record_activity(
        &state,
        NewActivity::new(actions::MERCHANT_PLAN_CHANGED, "merchant", id.as_i32())
            .merchant(id)
            .by(admin.id)
            .details(json!({ "plan": merchant.plan })),
    )
    .await;

    Ok(Json(merchant))
}

#[instrument(skip_all)]
async fn list_users(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<UserListQuery>,
) -> Result<Json<Page<User>>> {
    let page = PageQuery {
        page: query.page,
        per_page: query.per_page,
    };
    let (items, total) = UserRepository::new(state.pool())
        .list(query.role, page)
        .await?;
    Ok(Json(Page::new(items, page, total)))
}

#[instrument(skip_all, fields(user_id = %id))]
async fn revoke_sessions(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<UserId>,
) -> Result<Json<RevokeSessionsResponse>> {
    let user = UserRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    let revoked = state.sessions().destroy_for_user(user.id).await?;

    let mut entry = NewActivity::new(actions::SESSIONS_REVOKED, "user", id.as_i32())
        .by(admin.id)
        .details(json!({ "revoked": revoked }));
    if let Some(merchant_id) = user.merchant_id {
        entry = entry.merchant(merchant_id);
    }
    record_activity(&state, entry).await;

    Ok(Json(RevokeSessionsResponse { revoked }))
}

#[instrument(skip_all)]
async fn list_activity(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<ActivityListQuery>,
) -> Result<Json<Page<ActivityEntry>>> {
    let page = PageQuery {
        page: query.page,
        per_page: query.per_page,
    };
    let filter = ActivityFilter {
        merchant_id: query.merchant_id,
        action: non_blank(query.action.as_deref()),
    };
    let (items, total) = ActivityRepository::new(state.pool())
        .list(&filter, page)
        .await?;
    Ok(Json(Page::new(items, page, total)))
}

async fn analytics(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<PlatformAnalytics>> {
    let analytics = state.analytics().platform().await?;
    Ok(Json(analytics.as_ref().clone()))
}

async fn realtime_stats(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Json<HubStats> {
    Json(state.hub().stats().await)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_merchant_list_query_from_urlencoded() {
        let uri: axum::http::Uri = "/merchants?search=cafe&status=suspended&page=2"
            .parse()
            .unwrap();
        let Query(query) = Query::<MerchantListQuery>::try_from_uri(&uri).unwrap();
        assert_eq!(query.search.as_deref(), Some("cafe"));
        assert_eq!(query.status, Some(MerchantStatus::Suspended));
        assert_eq!(query.page, Some(2));
        assert_eq!(query.per_page, None);
    }

    #[test]
    fn test_plan_request() {
        let req: SetPlanRequest = serde_json::from_str(r#"{"plan":"enterprise"}"#).unwrap();
        assert_eq!(req.plan, PlanTier::Enterprise);
    }
}
