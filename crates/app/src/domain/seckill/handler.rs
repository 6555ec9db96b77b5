//! Seckill purchase queue consumer.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, warn};

use crate::{
    domain::seckill::{SeckillService, models::SeckillRequest},
    messaging::{MessageHandler, Outcome, Queue},
};

pub struct SeckillPurchaseHandler {
    seckill: Arc<dyn SeckillService>,
}

impl std::fmt::Debug for SeckillPurchaseHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeckillPurchaseHandler").finish_non_exhaustive()
    }
}

impl SeckillPurchaseHandler {
    #[must_use]
    pub fn new(seckill: Arc<dyn SeckillService>) -> Self {
        Self { seckill }
    }
}

#[async_trait]
impl MessageHandler for SeckillPurchaseHandler {
    fn queue(&self) -> Queue {
        Queue::SeckillRequests
    }

    async fn handle(&self, payload: &[u8]) -> Outcome {
        let request: SeckillRequest = match serde_json::from_slice(payload) {
            Ok(request) => request,
            Err(source) => {
                warn!(error = %source, "undecodable seckill request");
                return Outcome::Discard;
            }
        };

        // Sold out and contended requests are final; only infrastructure failures retry.
        match self.seckill.purchase(request).await {
            Ok(_) => Outcome::Ack,
            Err(source) => {
                error!(
                    user = %request.user_id,
                    sku = %request.seckill_sku_id,
                    error = %source,
                    "seckill purchase failed"
                );
                Outcome::Retry
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use crate::{
        domain::seckill::{
            MockSeckillService, SeckillError, models::PurchaseOutcome, records::SeckillSkuId,
        },
        ids::UserId,
    };

    use super::*;

    fn payload() -> TestResult<Vec<u8>> {
        Ok(serde_json::to_vec(&SeckillRequest {
            user_id: UserId::from_i64(1),
            seckill_sku_id: SeckillSkuId::from_i64(2),
        })?)
    }

    #[tokio::test]
    async fn sold_out_requests_are_acknowledged() -> TestResult {
        let mut seckill = MockSeckillService::new();

        seckill
            .expect_purchase()
            .once()
            .withf(|request| request.seckill_sku_id.into_i64() == 2)
            .return_once(|_| Ok(PurchaseOutcome::SoldOut));

        let handler = SeckillPurchaseHandler::new(Arc::new(seckill));

        assert_eq!(handler.handle(&payload()?).await, Outcome::Ack);

        Ok(())
    }

    #[tokio::test]
    async fn storage_failures_are_retried() -> TestResult {
        let mut seckill = MockSeckillService::new();

        seckill
            .expect_purchase()
            .once()
            .return_once(|_| Err(SeckillError::Sql(sqlx::Error::PoolTimedOut)));

        let handler = SeckillPurchaseHandler::new(Arc::new(seckill));

        assert_eq!(handler.handle(&payload()?).await, Outcome::Retry);

        Ok(())
    }

    #[tokio::test]
    async fn garbage_is_discarded() {
        let mut seckill = MockSeckillService::new();
        seckill.expect_purchase().never();

        let handler = SeckillPurchaseHandler::new(Arc::new(seckill));

        assert_eq!(handler.handle(b"[]").await, Outcome::Discard);
    }
}
