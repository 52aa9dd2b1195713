//! Branch repository. Every query is scoped by merchant.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use queuehub_core::{BranchId, MerchantId};

use super::{PlanLimited, RepositoryError, merchants};
use crate::models::Branch;

pub(crate) const BRANCH_COLUMNS: &str =
    "id, merchant_id, name, address, city, phone, is_active, created_at, updated_at";

#[derive(sqlx::FromRow)]
pub(crate) struct BranchRow {
    id: i32,
    merchant_id: i32,
    name: String,
    address: String,
    city: String,
    phone: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<BranchRow> for Branch {
    fn from(r: BranchRow) -> Self {
        Self {
            id: BranchId::new(r.id),
            merchant_id: MerchantId::new(r.merchant_id),
            name: r.name,
            address: r.address,
            city: r.city,
            phone: r.phone,
            is_active: r.is_active,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

/// Fields of a new branch.
#[derive(Debug, Clone)]
pub struct NewBranch {
    pub name: String,
    pub address: String,
    pub city: String,
    pub phone: Option<String>,
}

/// Partial update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct BranchChanges {
    pub name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub phone: Option<String>,
    pub is_active: Option<bool>,
}

/// Repository for branch database operations.
pub struct BranchRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> BranchRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All branches of a merchant.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, merchant_id: MerchantId) -> Result<Vec<Branch>, RepositoryError> {
        let rows = sqlx::query_as::<_, BranchRow>(&format!(
            "SELECT {BRANCH_COLUMNS} FROM queuehub.branch WHERE merchant_id = $1 ORDER BY id"
        ))
        .bind(merchant_id.as_i32())
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(Branch::from).collect())
    }

    /// Get one branch of a merchant.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no such branch belongs to the merchant.
    pub async fn get(
        &self,
        merchant_id: MerchantId,
        id: BranchId,
    ) -> Result<Branch, RepositoryError> {
        sqlx::query_as::<_, BranchRow>(&format!(
            "SELECT {BRANCH_COLUMNS} FROM queuehub.branch WHERE id = $1 AND merchant_id = $2"
        ))
        .bind(id.as_i32())
        .bind(merchant_id.as_i32())
        .fetch_optional(self.pool)
        .await?
        .map(Branch::from)
        .ok_or(RepositoryError::NotFound)
    }

    /// Insert a branch if the merchant's plan allows another one.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the merchant doesn't exist.
    pub async fn create(
        &self,
        merchant_id: MerchantId,
        new: &NewBranch,
    ) -> Result<PlanLimited<Branch>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let plan = merchants::lock_plan(&mut *tx, merchant_id).await?;
        let existing = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM queuehub.branch WHERE merchant_id = $1",
        )
        .bind(merchant_id.as_i32())
        .fetch_one(&mut *tx)
        .await?;
        if !plan.allows_another_branch(existing) {
            return Ok(PlanLimited::LimitReached { plan, existing });
        }

        let row = sqlx::query_as::<_, BranchRow>(&format!(
            r"
            INSERT INTO queuehub.branch (merchant_id, name, address, city, phone)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {BRANCH_COLUMNS}
            "
        ))
        .bind(merchant_id.as_i32())
        .bind(&new.name)
        .bind(&new.address)
        .bind(&new.city)
        .bind(new.phone.as_deref())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(PlanLimited::Created(row.into()))
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no such branch belongs to the merchant.
    pub async fn update(
        &self,
        merchant_id: MerchantId,
        id: BranchId,
        changes: &BranchChanges,
    ) -> Result<Branch, RepositoryError> {
        sqlx::query_as::<_, BranchRow>(&format!(
            r"
            UPDATE queuehub.branch SET
                name = COALESCE($3, name),
                address = COALESCE($4, address),
                city = COALESCE($5, city),
                phone = COALESCE($6, phone),
                is_active = COALESCE($7, is_active),
                updated_at = NOW()
            WHERE id = $1 AND merchant_id = $2
            RETURNING {BRANCH_COLUMNS}
            "
        ))
        .bind(id.as_i32())
        .bind(merchant_id.as_i32())
        .bind(changes.name.as_deref())
        .bind(changes.address.as_deref())
        .bind(changes.city.as_deref())
        .bind(changes.phone.as_deref())
        .bind(changes.is_active)
        .fetch_optional(self.pool)
        .await?
        .map(Branch::from)
        .ok_or(RepositoryError::NotFound)
    }

    /// Delete a branch unless it still has open queues.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no such branch belongs to the merchant.
    /// Returns `RepositoryError::Conflict` if any of its queues is open.
    pub async fn delete(&self, merchant_id: MerchantId, id: BranchId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let exists = sqlx::query_scalar::<_, i32>(
            "SELECT id FROM queuehub.branch WHERE id = $1 AND merchant_id = $2 FOR UPDATE",
        )
        .bind(id.as_i32())
        .bind(merchant_id.as_i32())
        .fetch_optional(&mut *tx)
        .await?;
        if exists.is_none() {
            return Err(RepositoryError::NotFound);
        }

        let open_queues = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM queuehub.queue WHERE branch_id = $1 AND status = 'open'",
        )
        .bind(id.as_i32())
        .fetch_one(&mut *tx)
        .await?;
        if open_queues > 0 {
            return Err(RepositoryError::Conflict(format!(
                "branch has {open_queues} open queue(s); close them first"
            )));
        }

        sqlx::query("DELETE FROM queuehub.branch WHERE id = $1")
            .bind(id.as_i32())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}
