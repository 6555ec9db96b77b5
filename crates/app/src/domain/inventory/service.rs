//! Inventory ledger.
//!
//! Every mutation is one optimistic cycle: read `stock` and `version`, validate,
//! then write predicated on the version read. A write that matches no row lost a
//! race and the whole cycle runs again under the retry policy.

use async_trait::async_trait;
use mockall::automock;
use sqlx::{Postgres, Transaction};
use tracing::debug;

use crate::{
    database::Db,
    domain::inventory::{
        errors::{InventoryError, StockRejection},
        records::{StockKey, StockRecord},
        repository::PgInventoryRepository,
    },
    retry::{ConflictRetry, RetryPolicy},
};

#[derive(Debug, Clone)]
pub struct PgInventoryLedger {
    db: Db,
    repository: PgInventoryRepository,
    retry: RetryPolicy,
}

impl PgInventoryLedger {
    #[must_use]
    pub fn new(db: Db, retry: RetryPolicy) -> Self {
        Self {
            db,
            repository: PgInventoryRepository::new(),
            retry,
        }
    }

    /// Validate that `quantity` units could be taken right now, inside `tx`.
    pub(crate) async fn check_in(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        key: StockKey,
        quantity: i32,
    ) -> Result<StockRecord, InventoryError> {
        ensure_positive(quantity)?;

        let record = self
            .repository
            .get_stock(tx, key)
            .await?
            .ok_or(StockRejection::UnknownSku)?;

        if !record.listed {
            return Err(StockRejection::Delisted.into());
        }

        if record.stock < quantity {
            return Err(StockRejection::Insufficient {
                requested: quantity,
                available: record.stock,
            }
            .into());
        }

        Ok(record)
    }

    /// Take `quantity` units inside `tx`. Returns the row as written.
    pub(crate) async fn decrement_in(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        key: StockKey,
        quantity: i32,
    ) -> Result<StockRecord, InventoryError> {
        let mut retry = ConflictRetry::new(&self.retry);

        loop {
            let read = self.check_in(tx, key, quantity).await?;

            if let Some(written) = self
                .repository
                .compare_and_set(tx, key, &read, read.stock - quantity, quantity)
                .await?
            {
                debug!(%key, quantity, stock = written.stock, "stock decremented");

                return Ok(written);
            }

            retry.conflicted().await?;
        }
    }

    /// Give `quantity` units back inside `tx`.
    ///
    /// Unknown and delisted rows are rejected so reclaim paths can skip them.
    pub(crate) async fn increment_in(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        key: StockKey,
        quantity: i32,
    ) -> Result<StockRecord, InventoryError> {
        ensure_positive(quantity)?;

        let mut retry = ConflictRetry::new(&self.retry);

        loop {
            let read = self
                .repository
                .get_stock(tx, key)
                .await?
                .ok_or(StockRejection::UnknownSku)?;

            if !read.listed {
                return Err(StockRejection::Delisted.into());
            }

            let stock = read
                .stock
                .checked_add(quantity)
                .ok_or(InventoryError::InvalidQuantity(quantity))?;

            if let Some(written) = self
                .repository
                .compare_and_set(tx, key, &read, stock, -quantity)
                .await?
            {
                debug!(%key, quantity, stock = written.stock, "stock incremented");

                return Ok(written);
            }

            retry.conflicted().await?;
        }
    }
}

fn ensure_positive(quantity: i32) -> Result<(), InventoryError> {
    if quantity <= 0 {
        return Err(InventoryError::InvalidQuantity(quantity));
    }

    Ok(())
}

#[async_trait]
impl InventoryLedger for PgInventoryLedger {
    async fn check(&self, key: StockKey, quantity: i32) -> Result<StockRecord, InventoryError> {
        let mut tx = self.db.begin().await?;

        let record = self.check_in(&mut tx, key, quantity).await?;

        tx.commit().await?;

        Ok(record)
    }

    async fn decrement(&self, key: StockKey, quantity: i32) -> Result<StockRecord, InventoryError> {
        let mut tx = self.db.begin().await?;

        let record = self.decrement_in(&mut tx, key, quantity).await?;

        tx.commit().await?;

        Ok(record)
    }

    async fn increment(&self, key: StockKey, quantity: i32) -> Result<StockRecord, InventoryError> {
        let mut tx = self.db.begin().await?;

        let record = self.increment_in(&mut tx, key, quantity).await?;

        tx.commit().await?;

        Ok(record)
    }
}

#[automock]
#[async_trait]
pub trait InventoryLedger: Send + Sync {
    /// Check that `quantity` units are available on a listed row, without taking them.
    async fn check(&self, key: StockKey, quantity: i32) -> Result<StockRecord, InventoryError>;

    /// Take `quantity` units.
    async fn decrement(&self, key: StockKey, quantity: i32) -> Result<StockRecord, InventoryError>;

    /// Return `quantity` units to a listed row.
    async fn increment(&self, key: StockKey, quantity: i32) -> Result<StockRecord, InventoryError>;
}

#[cfg(test)]
mod tests {
    use futures::future::join_all;
    use testresult::TestResult;

    use crate::{
        domain::products::records::SkuId,
        test::{TestContext, helpers},
    };

    use super::*;

    #[tokio::test]
    async fn decrement_takes_stock_and_bumps_version() -> TestResult {
        let ctx = TestContext::new().await;
        let sku = helpers::seed_sku(&ctx, 5).await;

        let written = ctx.inventory.decrement(StockKey::Sku(sku), 2).await?;

        assert_eq!(written.stock, 3);
        assert_eq!(written.version, 1);
        assert_eq!(helpers::stock_of(&ctx, sku).await, 3);

        Ok(())
    }

    #[tokio::test]
    async fn decrement_beyond_stock_is_rejected_without_mutation() -> TestResult {
        let ctx = TestContext::new().await;
        let sku = helpers::seed_sku(&ctx, 2).await;

        let result = ctx.inventory.decrement(StockKey::Sku(sku), 3).await;

        assert!(
            matches!(
                result,
                Err(InventoryError::Rejected(StockRejection::Insufficient {
                    requested: 3,
                    available: 2
                }))
            ),
            "expected Insufficient, got {result:?}"
        );
        assert_eq!(helpers::stock_of(&ctx, sku).await, 2);

        Ok(())
    }

    #[tokio::test]
    async fn delisted_sku_is_rejected() {
        let ctx = TestContext::new().await;
        let sku = helpers::seed_sku(&ctx, 2).await;
        helpers::delist(&ctx, sku).await;

        let result = ctx.inventory.check(StockKey::Sku(sku), 1).await;

        assert!(
            matches!(result, Err(InventoryError::Rejected(StockRejection::Delisted))),
            "expected Delisted, got {result:?}"
        );
    }

    #[tokio::test]
    async fn unknown_sku_is_rejected() {
        let ctx = TestContext::new().await;

        let result = ctx
            .inventory
            .decrement(StockKey::Sku(SkuId::from_i64(404)), 1)
            .await;

        assert!(
            matches!(result, Err(InventoryError::Rejected(StockRejection::UnknownSku))),
            "expected UnknownSku, got {result:?}"
        );
    }

    #[tokio::test]
    async fn non_positive_quantity_is_rejected() {
        let ctx = TestContext::new().await;
        let sku = helpers::seed_sku(&ctx, 2).await;

        let result = ctx.inventory.increment(StockKey::Sku(sku), 0).await;

        assert!(
            matches!(result, Err(InventoryError::InvalidQuantity(0))),
            "expected InvalidQuantity, got {result:?}"
        );
    }

    #[tokio::test]
    async fn increment_on_delisted_sku_is_skipped() -> TestResult {
        let ctx = TestContext::new().await;
        let sku = helpers::seed_sku(&ctx, 2).await;
        helpers::delist(&ctx, sku).await;

        let result = ctx.inventory.increment(StockKey::Sku(sku), 1).await;

        assert!(
            matches!(result, Err(InventoryError::Rejected(StockRejection::Delisted))),
            "expected Delisted, got {result:?}"
        );
        assert_eq!(helpers::stock_of(&ctx, sku).await, 2);

        Ok(())
    }

    #[tokio::test]
    async fn concurrent_decrements_never_oversell() -> TestResult {
        let ctx = TestContext::new().await;
        let sku = helpers::seed_sku(&ctx, 5).await;

        let attempts = (0..20).map(|_| {
            let ledger = ctx.inventory.clone();

            tokio::spawn(async move { ledger.decrement(StockKey::Sku(sku), 1).await })
        });

        let mut succeeded = 0;

        for outcome in join_all(attempts).await {
            match outcome? {
                Ok(_) => succeeded += 1,
                Err(InventoryError::Rejected(StockRejection::Insufficient { .. })) => {}
                Err(other) => return Err(format!("unexpected failure: {other:?}").into()),
            }
        }

        assert_eq!(succeeded, 5);
        assert_eq!(helpers::stock_of(&ctx, sku).await, 0);

        Ok(())
    }

    #[tokio::test]
    async fn seckill_decrement_counts_the_sale() -> TestResult {
        let ctx = TestContext::new().await;
        let item = helpers::seed_seckill_sku(&ctx, 3).await;

        let written = ctx.inventory.decrement(StockKey::Seckill(item), 1).await?;

        assert_eq!(written.stock, 2);
        assert_eq!(helpers::seckill_sale_of(&ctx, item).await, 1);

        Ok(())
    }
}
