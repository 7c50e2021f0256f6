//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sqlx::PgPool;
use tracing::debug;

use meridian_db::models::CategoryWithCount;
use meridian_db::{CategoryRepository, RepositoryError, SettingsRepository, StoreSettings};

use crate::config::StorefrontConfig;
use crate::payments::{PaymentError, PaymentsClient};
use crate::services::email::EmailService;

/// How long settings and the category list are served from memory.
const CACHE_TTL: Duration = Duration::from_secs(60);

/// Error building application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("payments client: {0}")]
    Payments(#[from] PaymentError),
    #[error("email transport: {0}")]
    Email(#[from] lettre::transport::smtp::Error),
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
enum CacheKey {
    Settings,
    Categories,
}

#[derive(Debug, Clone)]
enum CacheValue {
    Settings(Arc<StoreSettings>),
    Categories(Arc<Vec<CategoryWithCount>>),
}

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    payments: PaymentsClient,
    email: Option<EmailService>,
    cache: Cache<CacheKey, CacheValue>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the payments client or SMTP transport cannot be built.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, StateError> {
        let payments = PaymentsClient::new(&config.payments)?;
        let email = config.email.as_ref().map(EmailService::new).transpose()?;
        if email.is_none() {
            tracing::warn!("SMTP_HOST not set, order emails are disabled");
        }

        let cache = Cache::builder()
            .max_capacity(16)
            .time_to_live(CACHE_TTL)
            .build();

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                payments,
                email,
                cache,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    #[must_use]
    pub fn payments(&self) -> &PaymentsClient {
        &self.inner.payments
    }

    /// Email service, if SMTP is configured.
    #[must_use]
    pub fn email(&self) -> Option<&EmailService> {
        self.inner.email.as_ref()
    }

    /// Store settings, cached for a minute.
    ///
    /// # Errors
    ///
    /// Returns an error if settings cannot be loaded.
    pub async fn store_settings(&self) -> Result<Arc<StoreSettings>, RepositoryError> {
        if let Some(CacheValue::Settings(settings)) = self.inner.cache.get(&CacheKey::Settings).await
        {
            debug!("Cache hit for settings");
            return Ok(settings);
        }

        let settings = Arc::new(SettingsRepository::new(self.pool()).store_settings().await?);
        self.inner
            .cache
            .insert(CacheKey::Settings, CacheValue::Settings(Arc::clone(&settings)))
            .await;
        Ok(settings)
    }

    /// Categories with active product counts for navigation, cached for a minute.
    ///
    /// # Errors
    ///
    /// Returns an error if categories cannot be loaded.
    pub async fn nav_categories(&self) -> Result<Arc<Vec<CategoryWithCount>>, RepositoryError> {
        if let Some(CacheValue::Categories(categories)) =
            self.inner.cache.get(&CacheKey::Categories).await
        {
            debug!("Cache hit for categories");
            return Ok(categories);
        }

        let categories = Arc::new(CategoryRepository::new(self.pool()).list(true).await?);
        self.inner
            .cache
            .insert(
                CacheKey::Categories,
                CacheValue::Categories(Arc::clone(&categories)),
            )
            .await;
        Ok(categories)
    }
}
