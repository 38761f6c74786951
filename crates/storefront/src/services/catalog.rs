//! Product catalog with an in-process cache.
//!
//! Reads go through a `moka` cache (TTL from config). Every write goes
//! through this service and drops the whole cache, so a product edit is
//! visible on the next read.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tracing::{debug, instrument};

use marigold_core::ProductId;

use crate::db::{ProductStore, RepositoryError};
use crate::models::product::{Product, ProductInput};

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
enum CacheKey {
    Product(ProductId),
    Listing,
}

#[derive(Debug, Clone)]
enum CacheValue {
    Product(Box<Product>),
    Listing(Arc<Vec<Product>>),
}

/// Cached access to the catalog.
#[derive(Clone)]
pub struct CatalogService {
    inner: Arc<CatalogInner>,
}

struct CatalogInner {
    products: Arc<dyn ProductStore>,
    cache: Cache<CacheKey, CacheValue>,
}

impl CatalogService {
    #[must_use]
    pub fn new(products: Arc<dyn ProductStore>, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(ttl)
            .build();

        Self {
            inner: Arc::new(CatalogInner { products, cache }),
        }
    }

    /// Active products, newest first.
    ///
    /// # Errors
    ///
    /// Returns a `RepositoryError` if the store fails.
    #[instrument(skip(self))]
    pub async fn list_products(&self) -> Result<Arc<Vec<Product>>, RepositoryError> {
        if let Some(CacheValue::Listing(products)) = self.inner.cache.get(&CacheKey::Listing).await
        {
            debug!("Cache hit for product listing");
            return Ok(products);
        }

        let products = Arc::new(self.inner.products.list_products(false).await?);
        self.inner
            .cache
            .insert(CacheKey::Listing, CacheValue::Listing(Arc::clone(&products)))
            .await;

        Ok(products)
    }

    /// A product by ID, active or not.
    ///
    /// # Errors
    ///
    /// Returns a `RepositoryError` if the store fails.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let key = CacheKey::Product(id);
        if let Some(CacheValue::Product(product)) = self.inner.cache.get(&key).await {
            debug!("Cache hit for product");
            return Ok(Some(*product));
        }

        let Some(product) = self.inner.products.get_product(id).await? else {
            return Ok(None);
        };
        self.inner
            .cache
            .insert(key, CacheValue::Product(Box::new(product.clone())))
            .await;

        Ok(Some(product))
    }

    /// A product shoppers may see and buy.
    ///
    /// # Errors
    ///
    /// Returns a `RepositoryError` if the store fails.
    pub async fn get_active_product(
        &self,
        id: ProductId,
    ) -> Result<Option<Product>, RepositoryError> {
        Ok(self.get_product(id).await?.filter(|p| p.active))
    }

    /// # Errors
    ///
    /// Returns a `RepositoryError` if the store fails.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_product(&self, input: &ProductInput) -> Result<Product, RepositoryError> {
        let product = self.inner.products.create_product(input).await?;
        self.invalidate_all().await;
        Ok(product)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for an unknown product.
    #[instrument(skip(self, input), fields(product_id = %id))]
    pub async fn update_product(
        &self,
        id: ProductId,
        input: &ProductInput,
    ) -> Result<Product, RepositoryError> {
        let product = self.inner.products.update_product(id, input).await?;
        self.invalidate_all().await;
        Ok(product)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for an unknown product.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn delete_product(&self, id: ProductId) -> Result<(), RepositoryError> {
        self.inner.products.delete_product(id).await?;
        self.invalidate_all().await;
        Ok(())
    }

    /// Invalidate all cached data.
    pub async fn invalidate_all(&self) {
        self.inner.cache.invalidate_all();
        self.inner.cache.run_pending_tasks().await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::db::MemoryBackend;

    fn input(name: &str, cents: i64) -> ProductInput {
        ProductInput {
            name: name.into(),
            description: String::new(),
            price: Decimal::new(cents, 2),
            discount_percent: None,
            image_url: None,
            active: true,
        }
    }

    fn catalog(backend: &Arc<MemoryBackend>) -> CatalogService {
        CatalogService::new(backend.clone(), Duration::from_secs(300))
    }

    #[tokio::test]
    async fn test_writes_through_service_invalidate_cache() {
        let backend = Arc::new(MemoryBackend::new());
        let catalog = catalog(&backend);
        let product = catalog.create_product(&input("Tea", 500)).await.unwrap();
        assert_eq!(catalog.list_products().await.unwrap().len(), 1);
        assert_eq!(
            catalog.get_product(product.id).await.unwrap().unwrap().name,
            "Tea"
        );

        let updated = catalog
            .update_product(product.id, &input("Green tea", 650))
            .await
            .unwrap();
        assert_eq!(
            catalog.get_product(product.id).await.unwrap(),
            Some(updated)
        );

        catalog.delete_product(product.id).await.unwrap();
        assert!(catalog.list_products().await.unwrap().is_empty());
        assert!(catalog.get_product(product.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reads_are_cached_until_invalidated() {
        let backend = Arc::new(MemoryBackend::new());
        let catalog = catalog(&backend);
        let product = catalog.create_product(&input("Tea", 500)).await.unwrap();
        catalog.get_product(product.id).await.unwrap();

        // A write that bypasses the service is not seen until invalidation.
        backend
            .update_product(product.id, &input("Changed", 500))
            .await
            .unwrap();
        assert_eq!(
            catalog.get_product(product.id).await.unwrap().unwrap().name,
            "Tea"
        );

        catalog.invalidate_all().await;
        assert_eq!(
            catalog.get_product(product.id).await.unwrap().unwrap().name,
            "Changed"
        );
    }

    #[tokio::test]
    async fn test_inactive_products_are_hidden() {
        let backend = Arc::new(MemoryBackend::new());
        let catalog = catalog(&backend);
        let hidden = catalog
            .create_product(&ProductInput {
                active: false,
                ..input("Retired", 100)
            })
            .await
            .unwrap();

        assert!(catalog.list_products().await.unwrap().is_empty());
        assert!(catalog.get_active_product(hidden.id).await.unwrap().is_none());
        assert!(catalog.get_product(hidden.id).await.unwrap().is_some());
    }
}
