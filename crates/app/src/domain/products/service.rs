//! Products service.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use mockall::automock;
use tracing::warn;

use crate::{
    cache::{Cache, keys},
    database::Db,
    domain::products::{
        errors::ProductsServiceError,
        records::{SkuId, SkuRecord, SpuRecord},
        repository::PgProductsRepository,
        specifications::Specifications,
    },
};

#[derive(Clone)]
pub struct PgProductsService {
    db: Db,
    cache: Arc<dyn Cache>,
    repository: PgProductsRepository,
    specification_ttl: Duration,
}

impl std::fmt::Debug for PgProductsService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgProductsService")
            .field("specification_ttl", &self.specification_ttl)
            .finish_non_exhaustive()
    }
}

impl PgProductsService {
    #[must_use]
    pub fn new(db: Db, cache: Arc<dyn Cache>, specification_ttl: Duration) -> Self {
        Self {
            db,
            cache,
            repository: PgProductsRepository::new(),
            specification_ttl,
        }
    }
}

#[async_trait]
impl ProductsService for PgProductsService {
    async fn get_sku(&self, sku: SkuId) -> Result<SkuRecord, ProductsServiceError> {
        let mut tx = self.db.begin().await?;

        let record = self.repository.get_sku(&mut tx, sku).await?;

        tx.commit().await?;

        Ok(record)
    }

    async fn get_spu_of_sku(&self, sku: SkuId) -> Result<SpuRecord, ProductsServiceError> {
        let mut tx = self.db.begin().await?;

        let record = self.repository.get_spu_of_sku(&mut tx, sku).await?;

        tx.commit().await?;

        Ok(record)
    }

    async fn specifications(&self, sku: SkuId) -> Result<Specifications, ProductsServiceError> {
        let key = keys::specification(sku);

        match self.cache.get(&key).await {
            Ok(Some(document)) => {
                return Specifications::parse(&document)
                    .map_err(ProductsServiceError::MalformedSpecification);
            }
            Ok(None) => {}
            Err(source) => warn!(sku = %sku, error = %source, "specification cache read failed"),
        }

        let mut tx = self.db.begin().await?;

        let document = self.repository.get_specification(&mut tx, sku).await?;

        tx.commit().await?;

        let specifications =
            Specifications::parse(&document).map_err(ProductsServiceError::MalformedSpecification)?;

        if let Err(source) = self
            .cache
            .set(&key, &document, self.specification_ttl)
            .await
        {
            warn!(sku = %sku, error = %source, "failed to cache specification");
        }

        Ok(specifications)
    }
}

#[automock]
#[async_trait]
pub trait ProductsService: Send + Sync {
    /// Retrieve a SKU with its current stock.
    async fn get_sku(&self, sku: SkuId) -> Result<SkuRecord, ProductsServiceError>;

    /// Retrieve the product a SKU belongs to.
    async fn get_spu_of_sku(&self, sku: SkuId) -> Result<SpuRecord, ProductsServiceError>;

    /// The specification set declared for a SKU's product, served from cache when possible.
    async fn specifications(&self, sku: SkuId) -> Result<Specifications, ProductsServiceError>;
}
