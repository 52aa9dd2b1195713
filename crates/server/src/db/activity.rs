//! Activity log repository.

use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool};

use queuehub_core::{ActivityLogId, MerchantId, UserId};

use super::{RepositoryError, limit_offset};
use crate::models::{ActivityEntry, NewActivity, PageQuery};

#[derive(sqlx::FromRow)]
struct ActivityRow {
    id: i32,
    merchant_id: Option<i32>,
    user_id: Option<i32>,
    action: String,
    entity_type: String,
    entity_id: Option<i32>,
    details: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl From<ActivityRow> for ActivityEntry {
    fn from(r: ActivityRow) -> Self {
        Self {
            id: ActivityLogId::new(r.id),
            merchant_id: r.merchant_id.map(MerchantId::new),
            user_id: r.user_id.map(UserId::new),
            action: r.action,
            entity_type: r.entity_type,
            entity_id: r.entity_id,
            details: r.details,
            created_at: r.created_at,
        }
    }
}

/// Filters for listing activity.
#[derive(Debug, Default, Clone)]
pub struct ActivityFilter {
    pub merchant_id: Option<MerchantId>,
    pub action: Option<String>,
}

/// Insert an entry using any executor, so callers can log inside a transaction.
pub(crate) async fn insert<'e, E>(executor: E, entry: &NewActivity) -> Result<(), sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query(
        r"
        INSERT INTO queuehub.activity_log
            (merchant_id, user_id, action, entity_type, entity_id, details)
        VALUES ($1, $2, $3, $4, $5, $6)
        ",
    )
    .bind(entry.merchant_id.map(|id| id.as_i32()))
    .bind(entry.user_id.map(|id| id.as_i32()))
    .bind(entry.action)
    .bind(entry.entity_type)
    .bind(entry.entity_id)
    .bind(&entry.details)
    .execute(executor)
    .await?;
    Ok(())
}

/// Repository for the audit trail.
pub struct ActivityRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ActivityRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Record an entry.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn record(&self, entry: &NewActivity) -> Result<(), RepositoryError> {
        insert(self.pool, entry).await?;
        Ok(())
    }

    /// Page through entries, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: &ActivityFilter,
        page: PageQuery,
    ) -> Result<(Vec<ActivityEntry>, i64), RepositoryError> {
        let (limit, offset) = limit_offset(page.page(), page.per_page());
        let merchant_id = filter.merchant_id.map(|id| id.as_i32());

        let rows = sqlx::query_as::<_, ActivityRow>(
            r"
            SELECT id, merchant_id, user_id, action, entity_type, entity_id, details, created_at
            FROM queuehub.activity_log
            WHERE ($1::int IS NULL OR merchant_id = $1)
              AND ($2::text IS NULL OR action = $2)
            ORDER BY created_at DESC, id DESC
            LIMIT $3 OFFSET $4
            ",
        )
        .bind(merchant_id)
        .bind(filter.action.as_deref())
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(
            r"
            SELECT COUNT(*) FROM queuehub.activity_log
            WHERE ($1::int IS NULL OR merchant_id = $1)
              AND ($2::text IS NULL OR action = $2)
            ",
        )
        .bind(merchant_id)
        .bind(filter.action.as_deref())
        .fetch_one(self.pool)
        .await?;

        Ok((rows.into_iter().map(ActivityEntry::from).collect(), total))
    }
}
