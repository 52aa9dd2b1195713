//! The merchant's audit trail.

use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;

use crate::db::ActivityRepository;
use crate::db::activity::ActivityFilter;
use crate::error::Result;
use crate::middleware::RequireMerchant;
use crate::models::{ActivityEntry, Page, PageQuery};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ActivityQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub action: Option<String>,
}

pub async fn index(
    State(state): State<AppState>,
    ctx: RequireMerchant,
    Query(query): Query<ActivityQuery>,
) -> Result<Json<Page<ActivityEntry>>> {
    let page = PageQuery {
        page: query.page,
        per_page: query.per_page,
    };
    let filter = ActivityFilter {
        merchant_id: Some(ctx.merchant_id),
        action: query.action.filter(|a| !a.is_empty()),
    };
    let (items, total) = ActivityRepository::new(state.pool())
        .list(&filter, page)
        .await?;
    Ok(Json(Page::new(items, page, total)))
}
