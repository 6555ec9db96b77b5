//! Asynchronous cart cleanup after checkout.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::{
    domain::carts::{CartsService, models::CartCleanup},
    messaging::{MessageHandler, Outcome, Queue},
};

pub struct CartCleanupHandler {
    carts: Arc<dyn CartsService>,
}

impl std::fmt::Debug for CartCleanupHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartCleanupHandler").finish_non_exhaustive()
    }
}

impl CartCleanupHandler {
    #[must_use]
    pub fn new(carts: Arc<dyn CartsService>) -> Self {
        Self { carts }
    }
}

#[async_trait]
impl MessageHandler for CartCleanupHandler {
    fn queue(&self) -> Queue {
        Queue::CartCleanup
    }

    async fn handle(&self, payload: &[u8]) -> Outcome {
        let cleanup: CartCleanup = match serde_json::from_slice(payload) {
            Ok(cleanup) => cleanup,
            Err(source) => {
                warn!(error = %source, "undecodable cart cleanup");
                return Outcome::Discard;
            }
        };

        match self
            .carts
            .remove_lines(cleanup.user_id, cleanup.lines)
            .await
        {
            Ok(removed) => {
                info!(user = %cleanup.user_id, removed, "cart lines cleaned up");
                Outcome::Ack
            }
            Err(source) => {
                error!(user = %cleanup.user_id, error = %source, "cart cleanup failed");
                Outcome::Retry
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use crate::domain::{
        carts::{CartsServiceError, MockCartsService, models::CartLineRef},
        products::records::SkuId,
    };
    use crate::ids::UserId;

    use super::*;

    fn payload() -> TestResult<Vec<u8>> {
        Ok(serde_json::to_vec(&CartCleanup {
            user_id: UserId::from_i64(1),
            lines: vec![CartLineRef {
                sku_id: SkuId::from_i64(2),
                specification: "red".to_string(),
            }],
        })?)
    }

    #[tokio::test]
    async fn removes_listed_lines() -> TestResult {
        let mut carts = MockCartsService::new();

        carts
            .expect_remove_lines()
            .once()
            .withf(|user, lines| user.into_i64() == 1 && lines.len() == 1)
            .return_once(|_, _| Ok(1));

        let handler = CartCleanupHandler::new(Arc::new(carts));

        assert_eq!(handler.handle(&payload()?).await, Outcome::Ack);

        Ok(())
    }

    #[tokio::test]
    async fn storage_failure_is_retried() -> TestResult {
        let mut carts = MockCartsService::new();

        carts
            .expect_remove_lines()
            .once()
            .return_once(|_, _| Err(CartsServiceError::Sql(sqlx::Error::PoolTimedOut)));

        let handler = CartCleanupHandler::new(Arc::new(carts));

        assert_eq!(handler.handle(&payload()?).await, Outcome::Retry);

        Ok(())
    }

    #[tokio::test]
    async fn garbage_is_discarded() {
        let mut carts = MockCartsService::new();
        carts.expect_remove_lines().never();

        let handler = CartCleanupHandler::new(Arc::new(carts));

        assert_eq!(handler.handle(b"not json").await, Outcome::Discard);
    }
}
