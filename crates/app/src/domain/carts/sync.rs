//! Applies cart row changes captured from the replication log to the cart cache.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, warn};

use crate::{
    domain::carts::{CartsService, CartsServiceError, records::CartEntryRecord},
    messaging::{MessageHandler, Outcome, Queue},
};

pub struct CartCacheSyncHandler {
    carts: Arc<dyn CartsService>,
    queue: Queue,
}

impl std::fmt::Debug for CartCacheSyncHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartCacheSyncHandler")
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}

impl CartCacheSyncHandler {
    /// Consumer for inserted and updated rows.
    #[must_use]
    pub fn upserts(carts: Arc<dyn CartsService>) -> Self {
        Self {
            carts,
            queue: Queue::CartCacheUpsert,
        }
    }

    /// Consumer for deleted rows.
    #[must_use]
    pub fn deletes(carts: Arc<dyn CartsService>) -> Self {
        Self {
            carts,
            queue: Queue::CartCacheDelete,
        }
    }
}

fn is_transient(error: &CartsServiceError) -> bool {
    matches!(
        error,
        CartsServiceError::Sql(_) | CartsServiceError::Cache(_) | CartsServiceError::Products(_)
    )
}

#[async_trait]
impl MessageHandler for CartCacheSyncHandler {
    fn queue(&self) -> Queue {
        self.queue
    }

    async fn handle(&self, payload: &[u8]) -> Outcome {
        let entry: CartEntryRecord = match serde_json::from_slice(payload) {
            Ok(entry) => entry,
            Err(source) => {
                warn!(queue = %self.queue, error = %source, "undecodable cart change");
                return Outcome::Discard;
            }
        };

        let user = entry.user_id;
        let sku = entry.sku_id;

        let result = if self.queue == Queue::CartCacheDelete {
            self.carts
                .evict_cached_line(user, sku, entry.specification)
                .await
        } else {
            self.carts.refresh_cached_line(entry).await
        };

        match result {
            Ok(()) => {
                debug!(queue = %self.queue, user = %user, sku = %sku, "cart cache synced");
                Outcome::Ack
            }
            Err(source) if is_transient(&source) => {
                error!(queue = %self.queue, user = %user, error = %source, "cart cache sync failed");
                Outcome::Retry
            }
            Err(source) => {
                warn!(queue = %self.queue, user = %user, sku = %sku, error = %source, "cart change not cacheable");
                Outcome::Ack
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use jiff::Timestamp;
    use testresult::TestResult;

    use crate::{
        domain::{carts::MockCartsService, products::records::SkuId},
        ids::UserId,
    };

    use super::*;

    fn payload() -> TestResult<Vec<u8>> {
        Ok(serde_json::to_vec(&CartEntryRecord {
            user_id: UserId::from_i64(7),
            sku_id: SkuId::from_i64(3),
            specification: "red".to_string(),
            count: 2,
            selected: false,
            version: 0,
            created_at: Timestamp::UNIX_EPOCH,
        })?)
    }

    #[tokio::test]
    async fn upserts_refresh_the_cached_line() -> TestResult {
        let mut carts = MockCartsService::new();

        carts
            .expect_refresh_cached_line()
            .once()
            .withf(|entry| entry.count == 2)
            .return_once(|_| Ok(()));
        carts.expect_evict_cached_line().never();

        let handler = CartCacheSyncHandler::upserts(Arc::new(carts));

        assert_eq!(handler.handle(&payload()?).await, Outcome::Ack);

        Ok(())
    }

    #[tokio::test]
    async fn deletes_evict_the_cached_line() -> TestResult {
        let mut carts = MockCartsService::new();

        carts
            .expect_evict_cached_line()
            .once()
            .withf(|user, sku, specification| {
                user.into_i64() == 7 && sku.into_i64() == 3 && specification == "red"
            })
            .return_once(|_, _, _| Ok(()));

        let handler = CartCacheSyncHandler::deletes(Arc::new(carts));

        assert_eq!(handler.handle(&payload()?).await, Outcome::Ack);

        Ok(())
    }

    #[tokio::test]
    async fn rows_for_vanished_skus_are_dropped() -> TestResult {
        let mut carts = MockCartsService::new();

        carts
            .expect_refresh_cached_line()
            .once()
            .return_once(|_| Err(CartsServiceError::UnknownSku));

        let handler = CartCacheSyncHandler::upserts(Arc::new(carts));

        assert_eq!(handler.handle(&payload()?).await, Outcome::Ack);

        Ok(())
    }

    #[tokio::test]
    async fn storage_failures_are_retried() -> TestResult {
        let mut carts = MockCartsService::new();

        carts
            .expect_refresh_cached_line()
            .once()
            .return_once(|_| Err(CartsServiceError::Sql(sqlx::Error::PoolTimedOut)));

        let handler = CartCacheSyncHandler::upserts(Arc::new(carts));

        assert_eq!(handler.handle(&payload()?).await, Outcome::Retry);

        Ok(())
    }
}
