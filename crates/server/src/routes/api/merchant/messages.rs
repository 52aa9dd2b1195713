//! Merchant-to-customer messages.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use queuehub_core::{QueueId, TicketId};

use crate::db::{MessageRepository, QueueRepository};
use crate::error::Result;
use crate::middleware::RequireMerchant;
use crate::models::activity::actions;
use crate::models::{Message, NewActivity};
use crate::routes::api::record_activity;
use crate::services::QueueService;
use crate::state::AppState;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

#[derive(Debug, Deserialize)]
pub struct MessageListQuery {
    pub limit: Option<i64>,
}

/// Leave `ticket_id` out to broadcast to everyone in the queue.
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub ticket_id: Option<TicketId>,
    pub body: String,
}

#[instrument(skip_all, fields(merchant_id = %ctx.merchant_id))]
pub async fn index(
    State(state): State<AppState>,
    ctx: RequireMerchant,
    Path(queue_id): Path<QueueId>,
    Query(query): Query<MessageListQuery>,
) -> Result<Json<Vec<Message>>> {
    QueueRepository::new(state.pool())
        .get(ctx.merchant_id, queue_id)
        .await?;
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    Ok(Json(
        MessageRepository::new(state.pool())
            .list_recent(ctx.merchant_id, queue_id, limit)
            .await?,
    ))
}

#[instrument(skip_all, fields(merchant_id = %ctx.merchant_id))]
pub async fn create(
    State(state): State<AppState>,
    ctx: RequireMerchant,
    Path(queue_id): Path<QueueId>,
    Json(request): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<Message>)> {
    let message = QueueService::new(state.pool(), state.hub())
        .send_message(
            ctx.merchant_id,
            ctx.user.id,
            queue_id,
            request.ticket_id,
            &request.body,
        )
        .await?;

    record_activity(
        &state,
        NewActivity::new(actions::MESSAGE_SENT, "message", message.id.as_i32())
            .merchant(ctx.merchant_id)
            .by(ctx.user.id)
            .details(json!({ "queue_id": queue_id, "ticket_id": message.ticket_id })),
    )
    .await;

    Ok((StatusCode::CREATED, Json(message)))
}
