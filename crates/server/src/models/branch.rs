//! Branch domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use queuehub_core::{BranchId, MerchantId};

/// A physical location of a merchant.
#[derive(Debug, Clone, Serialize)]
pub struct Branch {
    pub id: BranchId,
    pub merchant_id: MerchantId,
    pub name: String,
    pub address: String,
    pub city: String,
    pub phone: Option<String>,
    /// Inactive branches are hidden from the public merchant page.
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
