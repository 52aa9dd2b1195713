//! Dashboard statistics for the signed-in merchant.

use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;
use tracing::instrument;

use crate::error::Result;
use crate::middleware::RequireMerchant;
use crate::models::MerchantAnalytics;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AnalyticsQuery {
    /// Length of the daily series, clamped by [`MerchantAnalytics::clamp_days`].
    pub days: Option<u32>,
}

#[instrument(skip_all, fields(merchant_id = %ctx.merchant_id))]
pub async fn show(
    State(state): State<AppState>,
    ctx: RequireMerchant,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<MerchantAnalytics>> {
    let days = MerchantAnalytics::clamp_days(query.days);
    let analytics = state.analytics().merchant(ctx.merchant_id, days).await?;
    Ok(Json(analytics.as_ref().clone()))
}
