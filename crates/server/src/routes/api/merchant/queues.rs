//! Queue setup and open/pause/close.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use queuehub_core::{BranchId, PlanTier, QueueId, QueueStatus};

use crate::db::queues::{NewQueue, QueueChanges};
use crate::db::{QueueRepository, RepositoryError};
use crate::error::{AppError, Result};
use crate::middleware::RequireMerchant;
use crate::models::activity::actions;
use crate::models::{NewActivity, Queue, QueueWithCounts};
use crate::routes::api::record_activity;
use crate::services::QueueService;
use crate::state::AppState;

use super::{double_option, require_owner, required_name, within_plan};

/// Bounds of `avg_service_minutes`.
const SERVICE_MINUTES: std::ops::RangeInclusive<i32> = 1..=240;
const DEFAULT_SERVICE_MINUTES: i32 = 5;

#[derive(Debug, Deserialize)]
pub struct QueueListQuery {
    pub branch_id: Option<BranchId>,
}

#[derive(Debug, Deserialize)]
pub struct CreateQueueRequest {
    pub branch_id: BranchId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub avg_service_minutes: Option<i32>,
    pub max_size: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateQueueRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub avg_service_minutes: Option<i32>,
    /// `null` removes the cap.
    #[serde(default, deserialize_with = "double_option")]
    pub max_size: Option<Option<i32>>,
}

#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    pub status: QueueStatus,
}

fn validate_service_minutes(minutes: i32) -> Result<i32> {
    if SERVICE_MINUTES.contains(&minutes) {
        Ok(minutes)
    } else {
        Err(AppError::BadRequest(format!(
            "avg_service_minutes must be between {} and {}",
            SERVICE_MINUTES.start(),
            SERVICE_MINUTES.end()
        )))
    }
}

fn validate_max_size(max_size: Option<i32>) -> Result<Option<i32>> {
    match max_size {
        Some(n) if n < 1 => Err(AppError::BadRequest(
            "max_size must be at least 1".to_string(),
        )),
        other => Ok(other),
    }
}

#[instrument(skip_all, fields(merchant_id = %ctx.merchant_id))]
pub async fn index(
    State(state): State<AppState>,
    ctx: RequireMerchant,
    Query(query): Query<QueueListQuery>,
) -> Result<Json<Vec<QueueWithCounts>>> {
    Ok(Json(
        QueueRepository::new(state.pool())
            .list(ctx.merchant_id, query.branch_id)
            .await?,
    ))
}

#[instrument(skip_all, fields(merchant_id = %ctx.merchant_id))]
pub async fn create(
    State(state): State<AppState>,
    ctx: RequireMerchant,
    Json(request): Json<CreateQueueRequest>,
) -> Result<(StatusCode, Json<Queue>)> {
    require_owner(&ctx)?;
    let new = NewQueue {
        branch_id: request.branch_id,
        name: required_name("queue name", &request.name)?,
        description: request.description.trim().to_string(),
        avg_service_minutes: validate_service_minutes(
            request.avg_service_minutes.unwrap_or(DEFAULT_SERVICE_MINUTES),
        )?,
        max_size: validate_max_size(request.max_size)?,
    };

    let outcome = QueueRepository::new(state.pool())
        .create(ctx.merchant_id, &new)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => {
                AppError::NotFound("Branch not found".to_string())
            }
            other => other.into(),
        })?;
    let queue = within_plan(outcome, "queue(s)", PlanTier::max_queues)?;

    record_activity(
        &state,
        NewActivity::new(actions::QUEUE_CREATED, "queue", queue.id.as_i32())
            .merchant(ctx.merchant_id)
            .by(ctx.user.id)
            .details(json!({ "name": queue.name, "branch_id": queue.branch_id })),
    )
    .await;

    Ok((StatusCode::CREATED, Json(queue)))
}

#[instrument(skip_all, fields(merchant_id = %ctx.merchant_id))]
pub async fn show(
    State(state): State<AppState>,
    ctx: RequireMerchant,
    Path(id): Path<QueueId>,
) -> Result<Json<QueueWithCounts>> {
    Ok(Json(
        QueueRepository::new(state.pool())
            .get_with_counts(ctx.merchant_id, id)
            .await?,
    ))
}

#[instrument(skip_all, fields(merchant_id = %ctx.merchant_id))]
pub async fn update(
    State(state): State<AppState>,
    ctx: RequireMerchant,
    Path(id): Path<QueueId>,
    Json(request): Json<UpdateQueueRequest>,
) -> Result<Json<Queue>> {
    require_owner(&ctx)?;
    let changes = QueueChanges {
        name: request
            .name
            .as_deref()
            .map(|n| required_name("queue name", n))
            .transpose()?,
        description: request.description.map(|d| d.trim().to_string()),
        avg_service_minutes: request
            .avg_service_minutes
            .map(validate_service_minutes)
            .transpose()?,
        max_size: request.max_size.map(validate_max_size).transpose()?,
    };

    let queue = QueueRepository::new(state.pool())
        .update(ctx.merchant_id, id, &changes)
        .await?;
    QueueService::new(state.pool(), state.hub())
        .publish_queue_updated(&queue)
        .await?;

    record_activity(
        &state,
        NewActivity::new(actions::QUEUE_UPDATED, "queue", queue.id.as_i32())
            .merchant(ctx.merchant_id)
            .by(ctx.user.id),
    )
    .await;

    Ok(Json(queue))
}

/// Open, pause or close a queue. Staff may do this.
#[instrument(skip_all, fields(merchant_id = %ctx.merchant_id))]
pub async fn set_status(
    State(state): State<AppState>,
    ctx: RequireMerchant,
    Path(id): Path<QueueId>,
    Json(request): Json<SetStatusRequest>,
) -> Result<Json<Queue>> {
    let queue = QueueService::new(state.pool(), state.hub())
        .set_status(ctx.merchant_id, id, request.status)
        .await?;

    record_activity(
        &state,
        NewActivity::new(actions::QUEUE_STATUS_CHANGED, "queue", queue.id.as_i32())
            .merchant(ctx.merchant_id)
            .by(ctx.user.id)
            .details(json!({ "status": queue.status })),
    )
    .await;

    Ok(Json(queue))
}

/// Refused with 409 while the queue still has active tickets.
#[instrument(skip_all, fields(merchant_id = %ctx.merchant_id))]
pub async fn destroy(
    State(state): State<AppState>,
    ctx: RequireMerchant,
    Path(id): Path<QueueId>,
) -> Result<StatusCode> {
    require_owner(&ctx)?;
    QueueRepository::new(state.pool())
        .delete(ctx.merchant_id, id)
        .await?;

    record_activity(
        &state,
        NewActivity::new(actions::QUEUE_DELETED, "queue", id.as_i32())
            .merchant(ctx.merchant_id)
            .by(ctx.user.id),
    )
    .await;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_service_minutes_bounds() {
        assert!(validate_service_minutes(1).is_ok());
        assert!(validate_service_minutes(240).is_ok());
        assert!(validate_service_minutes(0).is_err());
        assert!(validate_service_minutes(241).is_err());
    }

    #[test]
    fn test_max_size_must_be_positive() {
        assert_eq!(validate_max_size(None).ok(), Some(None));
        assert_eq!(validate_max_size(Some(5)).ok(), Some(Some(5)));
        assert!(validate_max_size(Some(0)).is_err());
    }

    #[test]
    fn test_update_request_max_size() {
        let req: UpdateQueueRequest =
            serde_json::from_str(r#"{"name":"Pharmacy","max_size":null}"#).unwrap();
        assert_eq!(req.max_size, Some(None));
        assert_eq!(req.name.as_deref(), Some("Pharmacy"));
    }
}
