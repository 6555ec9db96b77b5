//! Order lifecycle service.
//!
//! `pending_payment` moves to `awaiting_shipment` on payment or to `expired`
//! when its timeout is delivered first. Every transition is a compare-and-set
//! on the order version, so a payment and a timeout racing each other settle
//! on exactly one outcome.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use mockall::automock;
use sqlx::{Postgres, Transaction};
use tracing::{debug, info, warn};

use crate::{
    database::Db,
    domain::{
        inventory::{InventoryError, PgInventoryLedger, StockRejection, records::StockKey},
        lifecycle::{errors::LifecycleError, models::TimeoutOutcome, scheduler::TimeoutScheduler},
        orders::{
            records::{OrderNumber, OrderRecord, OrderStatus, PayStatus},
            repository::PgOrdersRepository,
        },
    },
    ids::UserId,
    messaging::MessageBroker,
    retry::{ConflictRetry, RetryPolicy},
};

#[derive(Clone)]
pub struct PgLifecycleService {
    db: Db,
    ledger: PgInventoryLedger,
    scheduler: TimeoutScheduler,
    repository: PgOrdersRepository,
    retry: RetryPolicy,
}

impl std::fmt::Debug for PgLifecycleService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgLifecycleService")
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}

/// Stock handed back by one reclaim pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Reclaim {
    reclaimed: usize,
    skipped: usize,
}

impl PgLifecycleService {
    #[must_use]
    pub fn new(
        db: Db,
        broker: Arc<dyn MessageBroker>,
        ledger: PgInventoryLedger,
        retry: RetryPolicy,
        payment_window: Duration,
    ) -> Self {
        Self {
            db,
            ledger,
            scheduler: TimeoutScheduler::new(broker, payment_window),
            repository: PgOrdersRepository::new(),
            retry,
        }
    }

    /// Return every line of `order` to stock inside `tx`.
    ///
    /// Lines whose SKU was removed or delisted since the order was placed are
    /// skipped; there is no catalog entry left to restore.
    async fn reclaim(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        order: OrderNumber,
    ) -> Result<Reclaim, LifecycleError> {
        let mut items = self.repository.list_items(tx, order).await?;
        items.sort_by_key(|item| item.sku_id);

        let mut reclaim = Reclaim::default();

        for item in &items {
            match self
                .ledger
                .increment_in(tx, StockKey::Sku(item.sku_id), item.product_quantity)
                .await
            {
                Ok(_) => reclaim.reclaimed += 1,
                Err(InventoryError::Rejected(
                    rejection @ (StockRejection::UnknownSku | StockRejection::Delisted),
                )) => {
                    info!(order = %order, sku = %item.sku_id, %rejection, "skipping reclaim");
                    reclaim.skipped += 1;
                }
                Err(error) => return Err(error.into()),
            }
        }

        Ok(reclaim)
    }
}

#[async_trait]
impl LifecycleService for PgLifecycleService {
    async fn schedule_timeout(&self, order: OrderNumber) -> Result<(), LifecycleError> {
        Ok(self.scheduler.schedule(order).await?)
    }

    async fn handle_timeout(&self, order: OrderNumber) -> Result<TimeoutOutcome, LifecycleError> {
        let mut retry = ConflictRetry::new(&self.retry);

        loop {
            let mut tx = self.db.begin().await?;

            let Some(read) = self.repository.find_order(&mut tx, order).await? else {
                info!(order = %order, "timeout for unknown order");
                return Ok(TimeoutOutcome::UnknownOrder);
            };

            match read.order_status {
                OrderStatus::PendingPayment => {}
                OrderStatus::Expired => {
                    debug!(order = %order, "order already expired");
                    return Ok(TimeoutOutcome::AlreadyExpired);
                }
                status => {
                    debug!(order = %order, ?status, "order settled before timeout");
                    return Ok(TimeoutOutcome::AlreadySettled { status });
                }
            }

            if self
                .repository
                .transition(&mut tx, &read, OrderStatus::Expired, read.pay_status)
                .await?
                .is_none()
            {
                drop(tx);
                retry.conflicted().await?;
                continue;
            }

            let Reclaim { reclaimed, skipped } = self.reclaim(&mut tx, order).await?;

            tx.commit().await?;

            info!(order = %order, reclaimed, skipped, "order expired");

            return Ok(TimeoutOutcome::Expired { reclaimed, skipped });
        }
    }

    async fn confirm_payment(
        &self,
        user: UserId,
        order: OrderNumber,
    ) -> Result<OrderRecord, LifecycleError> {
        let mut retry = ConflictRetry::new(&self.retry);

        loop {
            let mut tx = self.db.begin().await?;

            let read = self.repository.get_user_order(&mut tx, user, order).await?;

            if read.order_status != OrderStatus::PendingPayment {
                return Err(LifecycleError::NotPayable(read.order_status));
            }

            if read.past_due {
                warn!(order = %order, "payment after window closed");
                return Err(LifecycleError::PastDue);
            }

            let Some(paid) = self
                .repository
                .transition(&mut tx, &read, OrderStatus::AwaitingShipment, PayStatus::Paid)
                .await?
            else {
                drop(tx);
                retry.conflicted().await?;
                continue;
            };

            tx.commit().await?;

            info!(user = %user, order = %order, pay_money = %paid.pay_money, "order paid");

            return Ok(paid);
        }
    }

    async fn delete_order(&self, user: UserId, order: OrderNumber) -> Result<(), LifecycleError> {
        let mut retry = ConflictRetry::new(&self.retry);

        loop {
            let mut tx = self.db.begin().await?;

            let read = self.repository.get_user_order(&mut tx, user, order).await?;

            let reclaim = if read.order_status == OrderStatus::PendingPayment {
                self.reclaim(&mut tx, order).await?
            } else {
                Reclaim::default()
            };

            if !self.repository.delete_order(&mut tx, &read).await? {
                drop(tx);
                retry.conflicted().await?;
                continue;
            }

            tx.commit().await?;

            info!(
                user = %user,
                order = %order,
                status = ?read.order_status,
                reclaimed = reclaim.reclaimed,
                "order deleted"
            );

            return Ok(());
        }
    }
}

#[automock]
#[async_trait]
pub trait LifecycleService: Send + Sync {
    /// Schedule the payment-window timeout for a freshly submitted order.
    async fn schedule_timeout(&self, order: OrderNumber) -> Result<(), LifecycleError>;

    /// Expire `order` if it is still pending payment, returning its stock.
    ///
    /// Safe to call any number of times for the same order.
    async fn handle_timeout(&self, order: OrderNumber) -> Result<TimeoutOutcome, LifecycleError>;

    /// Record a successful payment for a pending order still inside its window.
    async fn confirm_payment(
        &self,
        user: UserId,
        order: OrderNumber,
    ) -> Result<OrderRecord, LifecycleError>;

    /// Delete an order and its items. A pending order's stock is reclaimed first.
    async fn delete_order(&self, user: UserId, order: OrderNumber) -> Result<(), LifecycleError>;
}
