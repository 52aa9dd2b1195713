//! `PostgreSQL` session store for tower-sessions.
//!
//! Sessions live in `queuehub.session`. The logged-in user's id is copied out
//! of the session data into its own column so every session of a user can be
//! revoked at once (force logout, password change, merchant suspension).

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use time::OffsetDateTime;
use tower_sessions::SessionStore;
use tower_sessions::session::{Id, Record};
use tower_sessions::session_store;

use queuehub_core::UserId;

use super::RepositoryError;
use crate::models::session_keys;

#[derive(sqlx::FromRow)]
struct SessionRow {
    data: serde_json::Value,
    expiry_date: DateTime<Utc>,
}

/// Session store backed by the `queuehub.session` table.
#[derive(Debug, Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    /// Create a store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Load a live session.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails and
    /// `RepositoryError::DataCorruption` if the stored data can't be decoded.
    pub async fn get(&self, id: &Id) -> Result<Option<Record>, RepositoryError> {
        let row = sqlx::query_as::<_, SessionRow>(
            "SELECT data, expiry_date FROM queuehub.session WHERE id = $1 AND expiry_date > NOW()",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let data: HashMap<String, serde_json::Value> = serde_json::from_value(row.data)
            .map_err(|e| RepositoryError::DataCorruption(format!("invalid session data: {e}")))?;

        Ok(Some(Record {
            id: *id,
            data,
            expiry_date: to_offset(row.expiry_date)?,
        }))
    }

    /// Insert or replace a session.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the upsert fails.
    pub async fn set(&self, record: &Record) -> Result<(), RepositoryError> {
        let data = serde_json::to_value(&record.data)
            .map_err(|e| RepositoryError::DataCorruption(format!("unencodable session: {e}")))?;

        sqlx::query(
            r"
            INSERT INTO queuehub.session (id, user_id, data, expiry_date)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET
                user_id = EXCLUDED.user_id,
                data = EXCLUDED.data,
                expiry_date = EXCLUDED.expiry_date
            ",
        )
        .bind(record.id.to_string())
        .bind(session_user_id(record).map(|id| id.as_i32()))
        .bind(data)
        .bind(to_chrono(record.expiry_date)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Delete a session.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn destroy(&self, id: &Id) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM queuehub.session WHERE id = $1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Push back the expiry of a live session without rewriting its data.
    ///
    /// Returns whether a live session was found.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn touch(&self, id: &Id, expiry_date: OffsetDateTime) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE queuehub.session SET expiry_date = $2 WHERE id = $1 AND expiry_date > NOW()",
        )
        .bind(id.to_string())
        .bind(to_chrono(expiry_date)?)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Revoke every session of a user. Returns the number removed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn destroy_for_user(&self, user_id: UserId) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM queuehub.session WHERE user_id = $1")
            .bind(user_id.as_i32())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Revoke every session of a user except `keep`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn destroy_other_sessions(
        &self,
        user_id: UserId,
        keep: &Id,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM queuehub.session WHERE user_id = $1 AND id <> $2")
            .bind(user_id.as_i32())
            .bind(keep.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Revoke the sessions of every user of a merchant.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn destroy_for_merchant(
        &self,
        merchant_id: queuehub_core::MerchantId,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r"
            DELETE FROM queuehub.session s
            USING queuehub.user u
            WHERE s.user_id = u.id AND u.merchant_id = $1
            ",
        )
        .bind(merchant_id.as_i32())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Purge expired sessions. Returns the number removed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete_expired(&self) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM queuehub.session WHERE expiry_date <= NOW()")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn id_exists(&self, id: &Id) -> Result<bool, RepositoryError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM queuehub.session WHERE id = $1)",
        )
        .bind(id.to_string())
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// Spawn a task that purges expired sessions every `period`.
    pub fn spawn_cleanup(self, period: std::time::Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                match self.delete_expired().await {
                    Ok(0) => {}
                    Ok(n) => tracing::info!(removed = n, "Purged expired sessions"),
                    Err(e) => tracing::warn!(error = %e, "Session cleanup failed"),
                }
            }
        })
    }
}

impl From<RepositoryError> for session_store::Error {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::DataCorruption(msg) => Self::Decode(msg),
            other => Self::Backend(other.to_string()),
        }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn create(&self, record: &mut Record) -> session_store::Result<()> {
        while self.id_exists(&record.id).await? {
            record.id = Id::default();
        }
        self.set(record).await?;
        Ok(())
    }

    async fn save(&self, record: &Record) -> session_store::Result<()> {
        self.set(record).await?;
        Ok(())
    }

    async fn load(&self, session_id: &Id) -> session_store::Result<Option<Record>> {
        Ok(self.get(session_id).await?)
    }

    async fn delete(&self, session_id: &Id) -> session_store::Result<()> {
        self.destroy(session_id).await?;
        Ok(())
    }
}

/// The user id stored under [`session_keys::CURRENT_USER`], if any.
fn session_user_id(record: &Record) -> Option<UserId> {
    record
        .data
        .get(session_keys::CURRENT_USER)?
        .get("id")?
        .as_i64()
        .and_then(|id| i32::try_from(id).ok())
        .map(UserId::new)
}

fn to_chrono(t: OffsetDateTime) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::from_timestamp(t.unix_timestamp(), t.nanosecond())
        .ok_or_else(|| RepositoryError::DataCorruption(format!("expiry out of range: {t}")))
}

fn to_offset(t: DateTime<Utc>) -> Result<OffsetDateTime, RepositoryError> {
    OffsetDateTime::from_unix_timestamp(t.timestamp())
        .map(|base| base + time::Duration::nanoseconds(i64::from(t.timestamp_subsec_nanos())))
        .map_err(|e| RepositoryError::DataCorruption(format!("expiry out of range: {e}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(data: HashMap<String, serde_json::Value>) -> Record {
        Record {
            id: Id::default(),
            data,
            expiry_date: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn test_session_user_id_extracted_from_current_user() {
        let mut data = HashMap::new();
        data.insert(
            session_keys::CURRENT_USER.to_owned(),
            json!({ "id": 42, "email": "a@b.co", "name": "A", "role": "staff", "merchant_id": 1 }),
        );
        assert_eq!(session_user_id(&record(data)), Some(UserId::new(42)));
    }

    #[test]
    fn test_anonymous_session_has_no_user() {
        assert_eq!(session_user_id(&record(HashMap::new())), None);

        let mut data = HashMap::new();
        data.insert(session_keys::CURRENT_USER.to_owned(), json!({ "id": "nope" }));
        assert_eq!(session_user_id(&record(data)), None);
    }

    #[test]
    fn test_expiry_conversion_preserves_instant() {
        let now = OffsetDateTime::now_utc();
        let back = to_offset(to_chrono(now).unwrap()).unwrap();
        assert_eq!(back, now);
    }

    #[test]
    fn test_corrupt_data_maps_to_decode_error() {
        let err: session_store::Error = RepositoryError::DataCorruption("bad".to_owned()).into();
        assert!(matches!(err, session_store::Error::Decode(_)));
        let err: session_store::Error = RepositoryError::NotFound.into();
        assert!(matches!(err, session_store::Error::Backend(_)));
    }
}
