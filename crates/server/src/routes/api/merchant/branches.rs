//! Branch management.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use queuehub_core::{BranchId, PlanTier};

use crate::db::branches::{BranchChanges, NewBranch};
use crate::db::BranchRepository;
use crate::error::Result;
use crate::middleware::RequireMerchant;
use crate::models::activity::actions;
use crate::models::{Branch, NewActivity};
use crate::routes::api::{non_blank, record_activity};
use crate::state::AppState;

use super::{require_owner, required_name, within_plan};

#[derive(Debug, Deserialize)]
pub struct CreateBranchRequest {
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: String,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateBranchRequest {
    pub name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub phone: Option<String>,
    pub is_active: Option<bool>,
}

#[instrument(skip_all, fields(merchant_id = %ctx.merchant_id))]
pub async fn index(
    State(state): State<AppState>,
    ctx: RequireMerchant,
) -> Result<Json<Vec<Branch>>> {
    Ok(Json(
        BranchRepository::new(state.pool())
            .list(ctx.merchant_id)
            .await?,
    ))
}

#[instrument(skip_all, fields(merchant_id = %ctx.merchant_id))]
pub async fn create(
    State(state): State<AppState>,
    ctx: RequireMerchant,
    Json(request): Json<CreateBranchRequest>,
) -> Result<(StatusCode, Json<Branch>)> {
    require_owner(&ctx)?;
    let name = required_name("branch name", &request.name)?;

    let outcome = BranchRepository::new(state.pool())
        .create(
            ctx.merchant_id,
            &NewBranch {
                name,
                address: request.address.trim().to_string(),
                city: request.city.trim().to_string(),
                phone: non_blank(request.phone.as_deref()),
            },
        )
        .await?;
    let branch = within_plan(outcome, "branch(es)", PlanTier::max_branches)?;

    record_activity(
        &state,
        NewActivity::new(actions::BRANCH_CREATED, "branch", branch.id.as_i32())
            .merchant(ctx.merchant_id)
            .by(ctx.user.id)
            .details(json!({ "name": branch.name })),
    )
    .await;

    Ok((StatusCode::CREATED, Json(branch)))
}

#[instrument(skip_all, fields(merchant_id = %ctx.merchant_id))]
pub async fn show(
    State(state): State<AppState>,
    ctx: RequireMerchant,
    Path(id): Path<BranchId>,
) -> Result<Json<Branch>> {
    Ok(Json(
        BranchRepository::new(state.pool())
            .get(ctx.merchant_id, id)
            .await?,
    ))
}

#[instrument(skip_all, fields(merchant_id = %ctx.merchant_id))]
pub async fn update(
    State(state): State<AppState>,
    ctx: RequireMerchant,
    Path(id): Path<BranchId>,
    Json(request): Json<UpdateBranchRequest>,
) -> Result<Json<Branch>> {
    require_owner(&ctx)?;
    let changes = BranchChanges {
        name: request
            .name
            .as_deref()
            .map(|n| required_name("branch name", n))
            .transpose()?,
        address: request.address.map(|a| a.trim().to_string()),
        city: request.city.map(|c| c.trim().to_string()),
        phone: non_blank(request.phone.as_deref()),
        is_active: request.is_active,
    };

    let branch = BranchRepository::new(state.pool())
        .update(ctx.merchant_id, id, &changes)
        .await?;

    record_activity(
        &state,
        NewActivity::new(actions::BRANCH_UPDATED, "branch", branch.id.as_i32())
            .merchant(ctx.merchant_id)
            .by(ctx.user.id)
            .details(json!({ "is_active": branch.is_active })),
    )
    .await;

    Ok(Json(branch))
}

/// Refused with 409 while any of the branch's queues is open.
#[instrument(skip_all, fields(merchant_id = %ctx.merchant_id))]
pub async fn destroy(
    State(state): State<AppState>,
    ctx: RequireMerchant,
    Path(id): Path<BranchId>,
) -> Result<StatusCode> {
    require_owner(&ctx)?;
    BranchRepository::new(state.pool())
        .delete(ctx.merchant_id, id)
        .await?;

    record_activity(
        &state,
        NewActivity::new(actions::BRANCH_DELETED, "branch", id.as_i32())
            .merchant(ctx.merchant_id)
            .by(ctx.user.id),
    )
    .await;

    Ok(StatusCode::NO_CONTENT)
}
