//! Unauthenticated customer API (`/api/public`).
//!
//! Customers find a merchant by slug, join an open queue and follow their
//! ticket with the opaque token handed out on join. Ticket tokens are the
//! only credential; the merchant-side numeric ids never appear here.
//!
//! ```text
//! GET  /m/{slug}                  merchant page: active branches, open queues
//! POST /queues/{id}/join          take a ticket (201)
//! GET  /tickets/{token}           position and estimated wait
//! POST /tickets/{token}/cancel    leave the queue
//! ```

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

use queuehub_core::{BranchId, QueueId, QueueStatus, Slug};

use crate::db::{
    BranchRepository, MerchantRepository, QueueRepository, RepositoryError, TicketRepository,
};
use crate::error::{AppError, Result};
use crate::models::{Branch, Merchant, PublicTicket, QueueWithCounts};
use crate::services::{JoinRequest, QueueService};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/m/{slug}", get(merchant_page))
        .route("/queues/{id}/join", post(join))
        .route("/tickets/{token}", get(ticket))
        .route("/tickets/{token}/cancel", post(cancel))
}

/// What customers see of a merchant.
#[derive(Debug, Serialize)]
pub struct PublicMerchant {
    pub name: String,
    pub slug: Slug,
    pub phone: Option<String>,
    pub branches: Vec<PublicBranch>,
    pub queues: Vec<PublicQueue>,
}

#[derive(Debug, Serialize)]
pub struct PublicBranch {
    pub id: BranchId,
    pub name: String,
    pub address: String,
    pub city: String,
    pub phone: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PublicQueue {
    pub id: QueueId,
    pub branch_id: BranchId,
    pub name: String,
    pub description: String,
    pub status: QueueStatus,
    pub waiting_count: i64,
    /// Wait for someone joining now.
    pub estimated_wait_minutes: i64,
    /// `false` once the queue reached its size cap.
    pub accepting: bool,
}

impl From<Branch> for PublicBranch {
    fn from(branch: Branch) -> Self {
        Self {
            id: branch.id,
            name: branch.name,
            address: branch.address,
            city: branch.city,
            phone: branch.phone,
        }
    }
}

impl From<QueueWithCounts> for PublicQueue {
    fn from(q: QueueWithCounts) -> Self {
        let active = q.waiting_count + q.called_count + q.serving_count;
        Self {
            estimated_wait_minutes: q.queue.estimated_wait_minutes(q.waiting_count),
            accepting: q.queue.status.accepts_tickets() && !q.queue.is_full(active),
            id: q.queue.id,
            branch_id: q.queue.branch_id,
            name: q.queue.name,
            description: q.queue.description,
            status: q.queue.status,
            waiting_count: q.waiting_count,
        }
    }
}

impl PublicMerchant {
    fn new(merchant: Merchant, branches: Vec<Branch>, queues: Vec<QueueWithCounts>) -> Self {
        Self {
            name: merchant.name,
            slug: merchant.slug,
            phone: merchant.phone,
            branches: branches
                .into_iter()
                .filter(|b| b.is_active)
                .map(PublicBranch::from)
                .collect(),
            queues: queues.into_iter().map(PublicQueue::from).collect(),
        }
    }
}

fn merchant_not_found() -> AppError {
    AppError::NotFound("Merchant not found".to_string())
}

fn ticket_not_found() -> AppError {
    AppError::NotFound("Ticket not found".to_string())
}

/// Unknown, malformed and suspended merchants all read as 404.
#[instrument(skip(state))]
async fn merchant_page(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<PublicMerchant>> {
    let slug = Slug::parse(&slug).map_err(|_| merchant_not_found())?;
    let merchant = MerchantRepository::new(state.pool())
        .get_by_slug(&slug)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => merchant_not_found(),
            other => other.into(),
        })?;
    if !merchant.status.accepts_customers() {
        return Err(merchant_not_found());
    }

    let branches = BranchRepository::new(state.pool())
        .list(merchant.id)
        .await?;
    let queues = QueueRepository::new(state.pool())
        .list_public(merchant.id)
        .await?;

    Ok(Json(PublicMerchant::new(merchant, branches, queues)))
}

#[instrument(skip(state, request))]
async fn join(
    State(state): State<AppState>,
    Path(queue_id): Path<QueueId>,
    Json(request): Json<JoinRequest>,
) -> Result<(StatusCode, Json<PublicTicket>)> {
    let ticket = QueueService::new(state.pool(), state.hub())
        .join(queue_id, &request)
        .await?;
    let public = TicketRepository::new(state.pool())
        .get_public(ticket.public_token)
        .await?;
    Ok((StatusCode::CREATED, Json(public)))
}

#[instrument(skip(state))]
async fn ticket(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<PublicTicket>> {
    let token = Uuid::parse_str(&token).map_err(|_| ticket_not_found())?;
    let ticket = TicketRepository::new(state.pool())
        .get_public(token)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => ticket_not_found(),
            other => other.into(),
        })?;
    Ok(Json(ticket))
}

#[instrument(skip(state))]
async fn cancel(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<PublicTicket>> {
    let token = Uuid::parse_str(&token).map_err(|_| ticket_not_found())?;
    QueueService::new(state.pool(), state.hub())
        .cancel_by_token(token)
        .await?;
    let ticket = TicketRepository::new(state.pool())
        .get_public(token)
        .await?;
    Ok(Json(ticket))
}
