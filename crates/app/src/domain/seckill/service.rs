//! Seckill service.
//!
//! Admission runs two gates before anything touches stock: a per-user cooldown
//! key and a global token bucket. Admitted requests go onto a bounded queue; a
//! full queue means the sale is effectively over. The purchase consumer drains
//! that queue one request at a time.

use std::sync::Arc;

use async_trait::async_trait;
use mockall::automock;
use tracing::{debug, info, warn};

use crate::{
    cache::{Cache, keys},
    database::Db,
    domain::{
        inventory::{InventoryError, PgInventoryLedger, StockRejection, records::StockKey},
        seckill::{
            errors::SeckillError,
            models::{PurchaseOutcome, SeckillRequest},
            records::{SeckillPurchaseRecord, SeckillSkuId, SeckillSkuRecord},
            repository::PgSeckillRepository,
        },
    },
    ids::UserId,
    messaging::{MessageBroker, OutboundMessage, Queue},
    rate_limit::TokenBucket,
    settings::SeckillSettings,
};

#[derive(Clone)]
pub struct PgSeckillService {
    db: Db,
    cache: Arc<dyn Cache>,
    broker: Arc<dyn MessageBroker>,
    bucket: Arc<TokenBucket>,
    ledger: PgInventoryLedger,
    repository: PgSeckillRepository,
    settings: SeckillSettings,
}

impl std::fmt::Debug for PgSeckillService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgSeckillService")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl PgSeckillService {
    #[must_use]
    pub fn new(
        db: Db,
        cache: Arc<dyn Cache>,
        broker: Arc<dyn MessageBroker>,
        ledger: PgInventoryLedger,
        settings: SeckillSettings,
    ) -> Self {
        Self {
            db,
            cache,
            broker,
            bucket: Arc::new(TokenBucket::new(
                settings.bucket_rate,
                settings.bucket_capacity,
            )),
            ledger,
            repository: PgSeckillRepository::new(),
            settings,
        }
    }

    /// Bound for the request queue: the configured value, or twice the stock
    /// currently on sale.
    ///
    /// # Errors
    ///
    /// Returns an error when the stock total cannot be read.
    pub async fn queue_capacity(db: &Db, settings: &SeckillSettings) -> Result<u32, SeckillError> {
        if let Some(capacity) = settings.queue_capacity {
            return Ok(capacity.max(1));
        }

        let mut tx = db.begin().await?;

        let total = PgSeckillRepository::new().total_stock(&mut tx).await?;

        tx.commit().await?;

        Ok(u32::try_from(total.saturating_mul(2))
            .unwrap_or(u32::MAX)
            .max(1))
    }
}

#[async_trait]
impl SeckillService for PgSeckillService {
    async fn list_skus(&self) -> Result<Vec<SeckillSkuRecord>, SeckillError> {
        let mut tx = self.db.begin().await?;

        let skus = self.repository.list_skus(&mut tx).await?;

        tx.commit().await?;

        Ok(skus)
    }

    async fn admit(&self, user: UserId, sku: SeckillSkuId) -> Result<(), SeckillError> {
        if !self
            .cache
            .set_nx(
                &keys::seckill_user(user),
                &sku.to_string(),
                self.settings.cooldown(),
            )
            .await?
        {
            debug!(user = %user, sku = %sku, "seckill request during cooldown");
            return Err(SeckillError::CoolingDown);
        }

        if !self
            .bucket
            .take_max_duration(1, self.settings.max_wait())
            .await
        {
            warn!(user = %user, sku = %sku, "seckill admission bucket exhausted");
            return Err(SeckillError::TooManyRequests);
        }

        let mut tx = self.db.begin().await?;

        let record = match self.repository.get_sku(&mut tx, sku).await {
            Ok(record) => record,
            Err(sqlx::Error::RowNotFound) => return Err(SeckillError::UnknownSku),
            Err(error) => return Err(error.into()),
        };

        tx.commit().await?;

        if record.stock <= 0 {
            return Err(SeckillError::Finished);
        }

        let request = SeckillRequest {
            user_id: user,
            seckill_sku_id: sku,
        };

        self.broker
            .publish(OutboundMessage::json(Queue::SeckillRequests, &request)?)
            .await?;

        info!(user = %user, sku = %sku, "seckill request queued");

        Ok(())
    }

    async fn purchase(&self, request: SeckillRequest) -> Result<PurchaseOutcome, SeckillError> {
        let SeckillRequest {
            user_id: user,
            seckill_sku_id: sku,
        } = request;

        let mut tx = self.db.begin().await?;

        let written = match self.ledger.decrement_in(&mut tx, StockKey::Seckill(sku), 1).await {
            Ok(written) => written,
            Err(InventoryError::Rejected(StockRejection::Insufficient { .. })) => {
                warn!(user = %user, sku = %sku, "seckill unsuccessful, stock exhausted");
                return Ok(PurchaseOutcome::SoldOut);
            }
            Err(InventoryError::RetriesExhausted(exhausted)) => {
                warn!(
                    user = %user,
                    sku = %sku,
                    attempts = exhausted.attempts,
                    "seckill unsuccessful, stock exhausted"
                );
                return Ok(PurchaseOutcome::Contended);
            }
            Err(InventoryError::Rejected(_)) => {
                warn!(user = %user, sku = %sku, "seckill request for unknown item");
                return Ok(PurchaseOutcome::UnknownSku);
            }
            Err(error) => return Err(error.into()),
        };

        // A redelivered request rolls its decrement back here.
        if self
            .repository
            .insert_purchase(&mut tx, sku, user)
            .await?
            .is_none()
        {
            debug!(user = %user, sku = %sku, "seckill request already fulfilled");
            return Ok(PurchaseOutcome::AlreadyPurchased);
        }

        tx.commit().await?;

        info!(user = %user, sku = %sku, remaining = written.stock, "seckill purchase succeeded");

        Ok(PurchaseOutcome::Purchased {
            remaining: written.stock,
        })
    }

    async fn purchase_status(
        &self,
        user: UserId,
        sku: SeckillSkuId,
    ) -> Result<Option<SeckillPurchaseRecord>, SeckillError> {
        let mut tx = self.db.begin().await?;

        let purchase = self.repository.find_purchase(&mut tx, sku, user).await?;

        tx.commit().await?;

        Ok(purchase)
    }
}

#[automock]
#[async_trait]
pub trait SeckillService: Send + Sync {
    /// Every item currently on flash sale.
    async fn list_skus(&self) -> Result<Vec<SeckillSkuRecord>, SeckillError>;

    /// Pass a purchase request through the admission gates and queue it.
    ///
    /// Success means queued, not purchased; see [`SeckillService::purchase_status`].
    async fn admit(&self, user: UserId, sku: SeckillSkuId) -> Result<(), SeckillError>;

    /// Take one unit for a queued request.
    async fn purchase(&self, request: SeckillRequest) -> Result<PurchaseOutcome, SeckillError>;

    /// The user's won unit of `sku`, if any.
    async fn purchase_status(
        &self,
        user: UserId,
        sku: SeckillSkuId,
    ) -> Result<Option<SeckillPurchaseRecord>, SeckillError>;
}
