//! Merchant (tenant) repository, including the signup transaction.

use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::{PgConnection, PgPool};

use queuehub_core::{Email, MerchantId, MerchantStatus, PlanTier, Slug, UserRole};

use super::branches::{BRANCH_COLUMNS, BranchRow};
use super::users::UserRow;
use super::{RepositoryError, activity, limit_offset};
use crate::models::activity::actions;
use crate::models::{Branch, Merchant, MerchantDetail, NewActivity, PageQuery, User};

const MERCHANT_COLUMNS: &str =
    "id, name, slug, email, phone, status, plan, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct MerchantRow {
    id: i32,
    name: String,
    slug: String,
    email: String,
    phone: Option<String>,
    status: MerchantStatus,
    plan: PlanTier,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<MerchantRow> for Merchant {
    type Error = RepositoryError;

    fn try_from(r: MerchantRow) -> Result<Self, Self::Error> {
        let slug = Slug::parse(&r.slug).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid slug in database: {e}"))
        })?;
        let email = Email::parse(&r.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;
        Ok(Self {
            id: MerchantId::new(r.id),
            name: r.name,
            slug,
            email,
            phone: r.phone,
            status: r.status,
            plan: r.plan,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct MerchantCountsRow {
    #[sqlx(flatten)]
    merchant: MerchantRow,
    branch_count: i64,
    queue_count: i64,
    user_count: i64,
    ticket_count: i64,
}

/// Everything the signup wizard collects, already validated.
#[derive(Debug)]
pub struct NewAccount<'a> {
    pub business_name: &'a str,
    pub slug: &'a Slug,
    pub phone: Option<&'a str>,
    pub plan: PlanTier,
    pub owner_email: &'a Email,
    pub owner_name: &'a str,
    pub password_hash: &'a str,
    pub branch_name: &'a str,
    pub branch_address: &'a str,
    pub branch_city: &'a str,
}

/// Rows created by a successful signup.
#[derive(Debug)]
pub struct CreatedAccount {
    pub merchant: Merchant,
    pub owner: User,
    pub branch: Branch,
}

/// Admin list filters.
#[derive(Debug, Default, Clone)]
pub struct MerchantFilter {
    /// Case-insensitive substring of name, email or slug.
    pub search: Option<String>,
    pub status: Option<MerchantStatus>,
}

/// Lock the merchant row until the transaction ends and read its plan.
///
/// Plan-limited inserts take this lock first, so concurrent inserts for one
/// merchant count and insert one at a time.
pub(crate) async fn lock_plan(
    conn: &mut PgConnection,
    id: MerchantId,
) -> Result<PlanTier, RepositoryError> {
    sqlx::query_scalar::<_, PlanTier>(
        "SELECT plan FROM queuehub.merchant WHERE id = $1 FOR UPDATE",
    )
    .bind(id.as_i32())
    .fetch_optional(conn)
    .await?
    .ok_or(RepositoryError::NotFound)
}

/// Repository for merchant database operations.
pub struct MerchantRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> MerchantRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a merchant by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the merchant doesn't exist.
    pub async fn get(&self, id: MerchantId) -> Result<Merchant, RepositoryError> {
        sqlx::query_as::<_, MerchantRow>(&format!(
            "SELECT {MERCHANT_COLUMNS} FROM queuehub.merchant WHERE id = $1"
        ))
        .bind(id.as_i32())
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?
        .try_into()
    }

    /// Get a merchant by its public slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no merchant has this slug.
    pub async fn get_by_slug(&self, slug: &Slug) -> Result<Merchant, RepositoryError> {
        sqlx::query_as::<_, MerchantRow>(&format!(
            "SELECT {MERCHANT_COLUMNS} FROM queuehub.merchant WHERE slug = $1"
        ))
        .bind(slug.as_str())
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?
        .try_into()
    }

    /// Whether a slug is already taken.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn slug_exists(&self, slug: &Slug) -> Result<bool, RepositoryError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM queuehub.merchant WHERE slug = $1)",
        )
        .bind(slug.as_str())
        .fetch_one(self.pool)
        .await?;
        Ok(exists)
    }

    /// First free slug among `base`, `base-2`, `base-3`, ...
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if no free suffix is found.
    pub async fn available_slug(&self, base: &Slug) -> Result<Slug, RepositoryError> {
        if !self.slug_exists(base).await? {
            return Ok(base.clone());
        }
        for n in 2..=100 {
            let candidate = base.with_suffix(n);
            if !self.slug_exists(&candidate).await? {
                return Ok(candidate);
            }
        }
        Err(RepositoryError::Conflict(format!(
            "no free slug for '{base}'"
        )))
    }

    /// Create merchant, owner user, first branch and the signup audit entry
    /// in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email or slug is taken.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create_account(
        &self,
        new: &NewAccount<'_>,
    ) -> Result<CreatedAccount, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let merchant: Merchant = sqlx::query_as::<_, MerchantRow>(&format!(
            r"
            INSERT INTO queuehub.merchant (name, slug, email, phone, plan)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {MERCHANT_COLUMNS}
            "
        ))
        .bind(new.business_name)
        .bind(new.slug.as_str())
        .bind(new.owner_email.as_str())
        .bind(new.phone)
        .bind(new.plan)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::from_unique(e, "business URL is already taken"))?
        .try_into()?;

        let owner: User = sqlx::query_as::<_, UserRow>(
            r"
            INSERT INTO queuehub.user (email, name, password_hash, role, merchant_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, email, name, role, merchant_id, last_login_at, created_at, updated_at
            ",
        )
        .bind(new.owner_email.as_str())
        .bind(new.owner_name)
        .bind(new.password_hash)
        .bind(UserRole::Merchant)
        .bind(merchant.id.as_i32())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::from_unique(e, "email already exists"))?
        .try_into()?;

        let branch: Branch = sqlx::query_as::<_, BranchRow>(&format!(
            r"
            INSERT INTO queuehub.branch (merchant_id, name, address, city)
            VALUES ($1, $2, $3, $4)
            RETURNING {BRANCH_COLUMNS}
            "
        ))
        .bind(merchant.id.as_i32())
        .bind(new.branch_name)
        .bind(new.branch_address)
        .bind(new.branch_city)
        .fetch_one(&mut *tx)
        .await?
        .into();

        let entry = NewActivity::new(actions::SIGNUP, "merchant", merchant.id.as_i32())
            .merchant(merchant.id)
            .by(owner.id)
            .details(json!({ "slug": merchant.slug, "plan": merchant.plan }));
        activity::insert(&mut *tx, &entry).await?;

        tx.commit().await?;

        Ok(CreatedAccount {
            merchant,
            owner,
            branch,
        })
    }

    /// Update name and phone.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the merchant doesn't exist.
    pub async fn update_profile(
        &self,
        id: MerchantId,
        name: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Merchant, RepositoryError> {
        sqlx::query_as::<_, MerchantRow>(&format!(
            r"
            UPDATE queuehub.merchant SET
                name = COALESCE($2, name),
                phone = COALESCE($3, phone),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {MERCHANT_COLUMNS}
            "
        ))
        .bind(id.as_i32())
        .bind(name)
        .bind(phone)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?
        .try_into()
    }

    /// Change the lifecycle status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the merchant doesn't exist.
    pub async fn set_status(
        &self,
        id: MerchantId,
        status: MerchantStatus,
    ) -> Result<Merchant, RepositoryError> {
        sqlx::query_as::<_, MerchantRow>(&format!(
            r"
            UPDATE queuehub.merchant SET status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {MERCHANT_COLUMNS}
            "
        ))
        .bind(id.as_i32())
        .bind(status)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?
        .try_into()
    }

    /// Change the subscription plan.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the merchant doesn't exist.
    pub async fn set_plan(&self, id: MerchantId, plan: PlanTier) -> Result<Merchant, RepositoryError> {
        sqlx::query_as::<_, MerchantRow>(&format!(
            r"
            UPDATE queuehub.merchant SET plan = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {MERCHANT_COLUMNS}
            "
        ))
        .bind(id.as_i32())
        .bind(plan)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?
        .try_into()
    }

    /// Page through merchants for the admin dashboard, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: &MerchantFilter,
        page: PageQuery,
    ) -> Result<(Vec<Merchant>, i64), RepositoryError> {
        let (limit, offset) = limit_offset(page.page(), page.per_page());
        let pattern = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", escape_like(s)));

        let rows = sqlx::query_as::<_, MerchantRow>(&format!(
            r"
            SELECT {MERCHANT_COLUMNS} FROM queuehub.merchant
            WHERE ($1::text IS NULL OR name ILIKE $1 OR email ILIKE $1 OR slug ILIKE $1)
              AND ($2::queuehub.merchant_status IS NULL OR status = $2)
            ORDER BY created_at DESC, id DESC
            LIMIT $3 OFFSET $4
            "
        ))
        .bind(pattern.as_deref())
        .bind(filter.status)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(
            r"
            SELECT COUNT(*) FROM queuehub.merchant
            WHERE ($1::text IS NULL OR name ILIKE $1 OR email ILIKE $1 OR slug ILIKE $1)
              AND ($2::queuehub.merchant_status IS NULL OR status = $2)
            ",
        )
        .bind(pattern.as_deref())
        .bind(filter.status)
        .fetch_one(self.pool)
        .await?;

        let merchants = rows
            .into_iter()
            .map(Merchant::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((merchants, total))
    }

    /// Merchant with branch, queue, user and ticket counts.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the merchant doesn't exist.
    pub async fn detail(&self, id: MerchantId) -> Result<MerchantDetail, RepositoryError> {
        let row = sqlx::query_as::<_, MerchantCountsRow>(
            r"
            SELECT m.id, m.name, m.slug, m.email, m.phone, m.status, m.plan,
                   m.created_at, m.updated_at,
                   (SELECT COUNT(*) FROM queuehub.branch b WHERE b.merchant_id = m.id) AS branch_count,
                   (SELECT COUNT(*) FROM queuehub.queue q WHERE q.merchant_id = m.id) AS queue_count,
                   (SELECT COUNT(*) FROM queuehub.user u WHERE u.merchant_id = m.id) AS user_count,
                   (SELECT COUNT(*) FROM queuehub.ticket t WHERE t.merchant_id = m.id) AS ticket_count
            FROM queuehub.merchant m
            WHERE m.id = $1
            ",
        )
        .bind(id.as_i32())
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(MerchantDetail {
            merchant: row.merchant.try_into()?,
            branch_count: row.branch_count,
            queue_count: row.queue_count,
            user_count: row.user_count,
            ticket_count: row.ticket_count,
        })
    }
}

/// Escape `%`, `_` and `\` for use inside an `ILIKE` pattern.
fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("cafe"), "cafe");
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }
}
