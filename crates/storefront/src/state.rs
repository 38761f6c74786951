//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::clock::{Clock, SystemClock};
use crate::config::StorefrontConfig;
use crate::db::Stores;
use crate::services::catalog::CatalogService;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like the stores and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    stores: Stores,
    catalog: CatalogService,
    clock: Arc<dyn Clock>,
    pool: Option<PgPool>,
}

impl AppState {
    /// State backed by `PostgreSQL`.
    #[must_use]
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Self {
        let stores = Stores::postgres(&pool);
        Self::build(config, stores, Arc::new(SystemClock), Some(pool))
    }

    /// State over arbitrary stores and clock, with no database pool.
    ///
    /// Used by tests and local tooling running against the in-memory backend.
    #[must_use]
    pub fn with_stores(config: StorefrontConfig, stores: Stores, clock: Arc<dyn Clock>) -> Self {
        Self::build(config, stores, clock, None)
    }

    fn build(
        config: StorefrontConfig,
        stores: Stores,
        clock: Arc<dyn Clock>,
        pool: Option<PgPool>,
    ) -> Self {
        let catalog = CatalogService::new(stores.products.clone(), config.cache.catalog_ttl);
        Self {
            inner: Arc::new(AppStateInner {
                config,
                stores,
                catalog,
                clock,
                pool,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn stores(&self) -> &Stores {
        &self.inner.stores
    }

    /// Cached product reads.
    #[must_use]
    pub fn catalog(&self) -> &CatalogService {
        &self.inner.catalog
    }

    #[must_use]
    pub fn clock(&self) -> &dyn Clock {
        self.inner.clock.as_ref()
    }

    /// The database pool, when running against `PostgreSQL`.
    #[must_use]
    pub fn pool(&self) -> Option<&PgPool> {
        self.inner.pool.as_ref()
    }
}
