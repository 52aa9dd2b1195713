//! Staff accounts of a merchant. Only the owner manages them.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use queuehub_core::UserId;

use crate::db::UserRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireMerchant;
use crate::models::activity::actions;
use crate::models::{NewActivity, User};
use crate::routes::api::record_activity;
use crate::services::AuthService;
use crate::state::AppState;

use super::require_owner;

#[derive(Debug, Deserialize)]
pub struct CreateStaffRequest {
    pub email: String,
    pub name: String,
    pub password: String,
}

#[instrument(skip_all, fields(merchant_id = %ctx.merchant_id))]
pub async fn index(
    State(state): State<AppState>,
    ctx: RequireMerchant,
) -> Result<Json<Vec<User>>> {
    Ok(Json(
        UserRepository::new(state.pool())
            .list_for_merchant(ctx.merchant_id)
            .await?,
    ))
}

#[instrument(skip_all, fields(merchant_id = %ctx.merchant_id))]
pub async fn create(
    State(state): State<AppState>,
    ctx: RequireMerchant,
    Json(request): Json<CreateStaffRequest>,
) -> Result<(StatusCode, Json<User>)> {
    require_owner(&ctx)?;
    let user = AuthService::new(state.pool())
        .create_staff(
            ctx.merchant_id,
            &request.email,
            &request.name,
            &request.password,
        )
        .await?;

    record_activity(
        &state,
        NewActivity::new(actions::STAFF_INVITED, "user", user.id.as_i32())
            .merchant(ctx.merchant_id)
            .by(ctx.user.id)
            .details(json!({ "email": user.email })),
    )
    .await;

    Ok((StatusCode::CREATED, Json(user)))
}

/// Remove a staff user. Their sessions are deleted with the user row.
#[instrument(skip_all, fields(merchant_id = %ctx.merchant_id))]
pub async fn destroy(
    State(state): State<AppState>,
    ctx: RequireMerchant,
    Path(id): Path<UserId>,
) -> Result<StatusCode> {
    require_owner(&ctx)?;
    if !UserRepository::new(state.pool())
        .delete_staff(ctx.merchant_id, id)
        .await?
    {
        return Err(AppError::NotFound("Staff member not found".to_string()));
    }

    record_activity(
        &state,
        NewActivity::new(actions::STAFF_REMOVED, "user", id.as_i32())
            .merchant(ctx.merchant_id)
            .by(ctx.user.id),
    )
    .await;

    Ok(StatusCode::NO_CONTENT)
}
