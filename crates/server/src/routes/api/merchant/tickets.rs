//! Serving customers: walk-ins, calling the next ticket and moving tickets
//! through their lifecycle.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::instrument;

use queuehub_core::{QueueId, TicketId, TicketStatus};

use crate::db::{QueueRepository, TicketRepository};
use crate::error::Result;
use crate::middleware::RequireMerchant;
use crate::models::activity::actions;
use crate::models::{NewActivity, Ticket};
use crate::routes::api::record_activity;
use crate::services::{JoinRequest, QueueService};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct TicketListQuery {
    pub status: Option<TicketStatus>,
}

#[derive(Debug, Deserialize)]
pub struct SetTicketStatusRequest {
    pub status: TicketStatus,
}

/// `POST /queues/{id}/call-next` response; `ticket` is `null` when nobody waits.
#[derive(Debug, Serialize)]
pub struct CallNextResponse {
    pub ticket: Option<Ticket>,
}

#[instrument(skip_all, fields(merchant_id = %ctx.merchant_id))]
pub async fn index(
    State(state): State<AppState>,
    ctx: RequireMerchant,
    Path(queue_id): Path<QueueId>,
    Query(query): Query<TicketListQuery>,
) -> Result<Json<Vec<Ticket>>> {
    QueueRepository::new(state.pool())
        .get(ctx.merchant_id, queue_id)
        .await?;
    Ok(Json(
        TicketRepository::new(state.pool())
            .list(ctx.merchant_id, queue_id, query.status)
            .await?,
    ))
}

/// Add a customer at the counter. The queue must be open; the cap doesn't apply.
#[instrument(skip_all, fields(merchant_id = %ctx.merchant_id))]
pub async fn walk_in(
    State(state): State<AppState>,
    ctx: RequireMerchant,
    Path(queue_id): Path<QueueId>,
    Json(request): Json<JoinRequest>,
) -> Result<(StatusCode, Json<Ticket>)> {
    let ticket = QueueService::new(state.pool(), state.hub())
        .walk_in(ctx.merchant_id, queue_id, &request)
        .await?;

    record_activity(
        &state,
        NewActivity::new(actions::TICKET_WALK_IN, "ticket", ticket.id.as_i32())
            .merchant(ctx.merchant_id)
            .by(ctx.user.id)
            .details(json!({ "queue_id": queue_id, "number": ticket.number })),
    )
    .await;

    Ok((StatusCode::CREATED, Json(ticket)))
}

#[instrument(skip_all, fields(merchant_id = %ctx.merchant_id))]
pub async fn call_next(
    State(state): State<AppState>,
    ctx: RequireMerchant,
    Path(queue_id): Path<QueueId>,
) -> Result<Json<CallNextResponse>> {
    let ticket = QueueService::new(state.pool(), state.hub())
        .call_next(ctx.merchant_id, queue_id)
        .await?;

    if let Some(ticket) = &ticket {
        record_activity(
            &state,
            NewActivity::new(actions::TICKET_CALLED, "ticket", ticket.id.as_i32())
                .merchant(ctx.merchant_id)
                .by(ctx.user.id)
                .details(json!({ "queue_id": queue_id, "number": ticket.number })),
        )
        .await;
    }

    Ok(Json(CallNextResponse { ticket }))
}

#[instrument(skip_all, fields(merchant_id = %ctx.merchant_id))]
pub async fn show(
    State(state): State<AppState>,
    ctx: RequireMerchant,
    Path(id): Path<TicketId>,
) -> Result<Json<Ticket>> {
    Ok(Json(
        TicketRepository::new(state.pool())
            .get(ctx.merchant_id, id)
            .await?,
    ))
}

/// Serve, complete, cancel, mark no-show or requeue a ticket.
#[instrument(skip_all, fields(merchant_id = %ctx.merchant_id))]
pub async fn set_status(
    State(state): State<AppState>,
    ctx: RequireMerchant,
    Path(id): Path<TicketId>,
    Json(request): Json<SetTicketStatusRequest>,
) -> Result<Json<Ticket>> {
    let (ticket, previous) = QueueService::new(state.pool(), state.hub())
        .transition(ctx.merchant_id, id, request.status)
        .await?;

    record_activity(
        &state,
        NewActivity::new(actions::TICKET_STATUS_CHANGED, "ticket", ticket.id.as_i32())
            .merchant(ctx.merchant_id)
            .by(ctx.user.id)
            .details(json!({ "from": previous, "to": ticket.status })),
    )
    .await;

    Ok(Json(ticket))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_status_request_accepts_snake_case() {
        let req: SetTicketStatusRequest = serde_json::from_str(r#"{"status":"no_show"}"#).unwrap();
        assert_eq!(req.status, TicketStatus::NoShow);
        assert!(serde_json::from_str::<SetTicketStatusRequest>(r#"{"status":"gone"}"#).is_err());
    }
}
