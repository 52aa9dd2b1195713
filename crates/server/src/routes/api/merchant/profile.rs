//! Merchant profile.

use axum::{Json, extract::State};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use crate::db::MerchantRepository;
use crate::error::Result;
use crate::middleware::RequireMerchant;
use crate::models::activity::actions;
use crate::models::{Merchant, NewActivity};
use crate::routes::api::{non_blank, record_activity};
use crate::state::AppState;

use super::{require_owner, required_name};

/// `PATCH /profile` body. Omitted fields are left unchanged.
#[derive(Debug, Deserialize)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
}

#[instrument(skip_all, fields(merchant_id = %ctx.merchant_id))]
pub async fn show(State(state): State<AppState>, ctx: RequireMerchant) -> Result<Json<Merchant>> {
    Ok(Json(
        MerchantRepository::new(state.pool())
            .get(ctx.merchant_id)
            .await?,
    ))
}

#[instrument(skip_all, fields(merchant_id = %ctx.merchant_id))]
pub async fn update(
    State(state): State<AppState>,
    ctx: RequireMerchant,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<Merchant>> {
    require_owner(&ctx)?;
    let name = update
        .name
        .as_deref()
        .map(|n| required_name("business name", n))
        .transpose()?;
    let phone = non_blank(update.phone.as_deref());

    let merchant = MerchantRepository::new(state.pool())
        .update_profile(ctx.merchant_id, name.as_deref(), phone.as_deref())
        .await?;

    record_activity(
        &state,
        NewActivity::new(actions::PROFILE_UPDATED, "merchant", ctx.merchant_id.as_i32())
            .merchant(ctx.merchant_id)
            .by(ctx.user.id)
            .details(json!({ "name": name, "phone": phone })),
    )
    .await;

    Ok(Json(merchant))
}
