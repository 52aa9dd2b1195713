//! Cached dashboard analytics.
//!
//! Merchant analytics are cached for 30 seconds per `(merchant, days)` and
//! platform analytics for 60 seconds, using `moka`.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sqlx::PgPool;
use tracing::{debug, instrument};

use queuehub_core::MerchantId;

use crate::db::{AnalyticsRepository, RepositoryError};
use crate::models::{MerchantAnalytics, PlatformAnalytics};

const MERCHANT_TTL: Duration = Duration::from_secs(30);
const PLATFORM_TTL: Duration = Duration::from_secs(60);

/// Analytics with short-lived caches in front of the database.
#[derive(Clone)]
pub struct AnalyticsService {
    inner: Arc<AnalyticsServiceInner>,
}

struct AnalyticsServiceInner {
    pool: PgPool,
    merchant: Cache<(MerchantId, u32), Arc<MerchantAnalytics>>,
    platform: Cache<(), Arc<PlatformAnalytics>>,
}

impl AnalyticsService {
    /// Create the service with empty caches.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        let merchant = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(MERCHANT_TTL)
            .build();
        let platform = Cache::builder()
            .max_capacity(1)
            .time_to_live(PLATFORM_TTL)
            .build();

        Self {
            inner: Arc::new(AnalyticsServiceInner {
                pool,
                merchant,
                platform,
            }),
        }
    }

    /// Analytics of one merchant over `days` days (already clamped).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    #[instrument(skip(self), fields(merchant_id = %merchant_id))]
    pub async fn merchant(
        &self,
        merchant_id: MerchantId,
        days: u32,
    ) -> Result<Arc<MerchantAnalytics>, RepositoryError> {
        let key = (merchant_id, days);
        if let Some(cached) = self.inner.merchant.get(&key).await {
            debug!("Cache hit for merchant analytics");
            return Ok(cached);
        }

        let analytics = Arc::new(
            AnalyticsRepository::new(&self.inner.pool)
                .merchant(merchant_id, days)
                .await?,
        );
        self.inner.merchant.insert(key, Arc::clone(&analytics)).await;
        Ok(analytics)
    }

    /// Platform-wide analytics.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    #[instrument(skip(self))]
    pub async fn platform(&self) -> Result<Arc<PlatformAnalytics>, RepositoryError> {
        if let Some(cached) = self.inner.platform.get(&()).await {
            debug!("Cache hit for platform analytics");
            return Ok(cached);
        }

        let analytics = Arc::new(AnalyticsRepository::new(&self.inner.pool).platform().await?);
        self.inner.platform.insert((), Arc::clone(&analytics)).await;
        Ok(analytics)
    }
}
