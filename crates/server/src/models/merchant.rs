//! Merchant (tenant) domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use queuehub_core::{Email, MerchantId, MerchantStatus, PlanTier, Slug};

/// A tenant business.
#[derive(Debug, Clone, Serialize)]
pub struct Merchant {
    pub id: MerchantId,
    pub name: String,
    pub slug: Slug,
    /// Contact address, the owner's login email at signup.
    pub email: Email,
    pub phone: Option<String>,
    pub status: MerchantStatus,
    pub plan: PlanTier,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Merchant with resource counts, for the admin detail view.
#[derive(Debug, Clone, Serialize)]
pub struct MerchantDetail {
    #[serde(flatten)]
    pub merchant: Merchant,
    pub branch_count: i64,
    pub queue_count: i64,
    pub user_count: i64,
    pub ticket_count: i64,
}
